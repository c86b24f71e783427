//! # contract: the remote wiki API seam
//!
//! This module defines the [`WikiApi`] trait, the only place where lawbot talks
//! to a MediaWiki installation, together with the plain data types that cross it.
//!
//! ## Interface & Extensibility
//! - The `lawbot` binary crate implements the trait over HTTP with `reqwest`.
//! - Tests use the `mockall`-generated [`MockWikiApi`] or a hand-written fake.
//! - Implementations are responsible for the transport only: cookies, query
//!   encoding and JSON decoding. Login sequencing, token caching and every
//!   decision about revisions belong to the callers in this crate.
//!
//! ## Mocking & Testing
//! - The trait is annotated for `mockall`; enable `test-export-mocks` (on by
//!   default) to use [`MockWikiApi`] from integration tests of other crates.

use async_trait::async_trait;
use mockall::automock;

use crate::error::ApiError;

/// Bot credentials for the `action=login` handshake.
#[derive(Clone)]
pub struct Credentials {
    pub username: String,
    pub password: String,
}

impl std::fmt::Debug for Credentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Credentials")
            .field("username", &self.username)
            .field("password", &"<redacted>")
            .finish()
    }
}

/// The `login` object of an `action=login` response.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LoginResponse {
    /// `Success`, `NeedToken`, `Failed`, ...
    pub result: String,
    /// Continuation token handed out when the first phase does not succeed.
    pub token: Option<String>,
    pub reason: Option<String>,
}

impl LoginResponse {
    pub fn is_success(&self) -> bool {
        self.result == "Success"
    }
}

/// One entry of a `list=categorymembers` listing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CategoryMember {
    pub title: String,
    pub page_id: Option<u64>,
}

/// One batch of category members plus the continuation marker, if any.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CategoryBatch {
    pub members: Vec<CategoryMember>,
    pub continue_from: Option<String>,
}

/// An immutable version of a page as tracked by the wiki.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Revision {
    pub revision_id: u64,
    pub timestamp: String,
    pub author: String,
    pub comment: String,
    pub content: String,
}

/// One entry of the `pages` map of a `prop=revisions` query.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PageRevisions {
    pub page_id: Option<u64>,
    pub title: String,
    pub missing: bool,
    /// Newest first.
    pub revisions: Vec<Revision>,
}

/// Parameters of an `action=edit` request. Built fresh for every edit.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EditRequest {
    pub title: String,
    pub section: u32,
    pub text: String,
    pub summary: String,
    pub token: String,
    pub content_format: String,
    pub content_model: String,
}

/// The `edit` object of an `action=edit` response.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EditResponse {
    pub result: Option<String>,
    pub page_id: Option<u64>,
    pub title: Option<String>,
    pub old_revision_id: Option<u64>,
    pub new_revision_id: Option<u64>,
    pub no_change: bool,
}

/// What a successful publish reports back for logging.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PublishReceipt {
    pub title: String,
    pub page_id: Option<u64>,
    pub new_revision_id: Option<u64>,
    pub no_change: bool,
}

/// Trait for talking to one MediaWiki installation.
///
/// Implementors keep whatever cookie state the server hands out; the session
/// manager relies on that state persisting between calls on the same value.
#[cfg_attr(any(test, feature = "test-export-mocks"), automock)]
#[async_trait]
pub trait WikiApi: Send + Sync {
    /// `action=login`. `login_token` is `None` for the first phase of the handshake.
    async fn login(
        &self,
        credentials: &Credentials,
        login_token: Option<String>,
    ) -> Result<LoginResponse, ApiError>;

    /// `action=query&meta=tokens&type=<kind>`. `Ok(None)` when the response
    /// carries no `<kind>token` field.
    async fn fetch_token(&self, kind: &str) -> Result<Option<String>, ApiError>;

    /// `list=categorymembers`, newest modification first.
    async fn category_members(
        &self,
        category: &str,
        continue_from: Option<String>,
    ) -> Result<CategoryBatch, ApiError>;

    /// `prop=revisions` limited to the latest revision of `title`.
    async fn revisions(&self, title: &str) -> Result<Vec<PageRevisions>, ApiError>;

    /// `action=edit`.
    async fn edit(&self, request: EditRequest) -> Result<EditResponse, ApiError>;

    /// `index.php?action=raw`. `Ok(None)` when the page does not exist.
    async fn raw_text(&self, title: &str) -> Result<Option<String>, ApiError>;
}
