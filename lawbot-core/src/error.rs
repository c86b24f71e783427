//! Error types for lawbot-core.
//!
//! Every component has its own error enum; [`SyncError`] wraps them for the
//! per-title outcome. [`ParseError`] never leaves the idempotency gate.

use thiserror::Error;

/// Transport-level failures reported by a [`crate::contract::WikiApi`] implementation.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ApiError {
    /// The request never produced a response (DNS, TLS, connection reset, ...).
    #[error("network error: {0}")]
    Network(String),

    /// The server answered with an unexpected HTTP status.
    #[error("unexpected HTTP status {status} from {url}")]
    Status { status: u16, url: String },

    /// The response body could not be decoded.
    #[error("could not decode response: {0}")]
    Decode(String),

    /// The API answered with an `error` object.
    #[error("remote error {code}: {message}")]
    Remote { code: String, message: String },
}

/// Failures of the login handshake or token retrieval.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum AuthError {
    #[error("login rejected: {0}")]
    LoginRejected(String),

    #[error("remote did not supply a '{0}' token")]
    TokenUnavailable(String),

    #[error("authentication request failed: {0}")]
    Api(#[from] ApiError),
}

/// Failures while resolving titles or fetching revisions.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum FetchError {
    #[error("page not found: {0}")]
    PageNotFound(String),

    #[error("title '{title}' resolved to several pages: {page_ids:?}")]
    Ambiguous { title: String, page_ids: Vec<u64> },

    #[error("fetch request failed: {0}")]
    Network(#[from] ApiError),
}

/// Failures of the external transform pipeline.
#[derive(Debug, Error)]
pub enum TransformError {
    #[error("transform stage {index} failed: {diagnostic}")]
    StageFailed { index: usize, diagnostic: String },

    #[error("could not spawn transform stage {index} ({program}): {source}")]
    ProcessSpawnFailed {
        index: usize,
        program: String,
        #[source]
        source: std::io::Error,
    },

    #[error("transform stage {index} produced output that is not valid UTF-8")]
    InvalidOutput { index: usize },

    #[error("I/O error while running transform stage {index}: {source}")]
    Io {
        index: usize,
        #[source]
        source: std::io::Error,
    },

    #[error("a transform pipeline needs at least one stage")]
    EmptyPipeline,
}

/// Failures while committing a page edit.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum PublishError {
    #[error("edit rejected ({code}): {message}")]
    Rejected { code: String, message: String },

    #[error("publish request failed: {0}")]
    Network(ApiError),

    #[error("could not obtain edit token: {0}")]
    Auth(#[from] AuthError),
}

impl From<ApiError> for PublishError {
    fn from(e: ApiError) -> Self {
        match e {
            ApiError::Remote { code, message } => PublishError::Rejected { code, message },
            other => PublishError::Network(other),
        }
    }
}

/// The comment of a destination revision carries no provenance tag.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ParseError {
    #[error("malformed provenance tag: {0:?}")]
    MalformedProvenanceTag(String),
}

/// Why a single title's synchronisation failed.
#[derive(Debug, Error)]
pub enum SyncError {
    #[error(transparent)]
    Auth(#[from] AuthError),

    #[error(transparent)]
    Fetch(#[from] FetchError),

    #[error(transparent)]
    Transform(#[from] TransformError),

    #[error(transparent)]
    Publish(#[from] PublishError),

    /// The batch was cancelled while this title was in flight.
    #[error("cancelled before the title finished")]
    Cancelled,
}
