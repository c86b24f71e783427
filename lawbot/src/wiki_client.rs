#![doc = "MediaWiki HTTP client: implements the core `WikiApi` contract over reqwest."]
//
//! # Wiki client (CLI <-> Core)
//!
//! This module bridges the [`lawbot_core::contract::WikiApi`] abstraction to a real
//! MediaWiki installation. [`HttpWikiClient`] keeps a cookie store, so the session
//! established by `action=login` is reused by every later request made through the
//! same value.
//!
//! - All endpoints live under `/w/api.php`, except the raw page fetch which uses
//!   `/w/index.php?action=raw`.
//! - Every response is checked for an `error` object before being decoded; such
//!   objects surface as [`ApiError::Remote`].
//! - Request parameters are built fresh for every call.

use async_trait::async_trait;
use reqwest::{Response, StatusCode};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::Value;
use std::collections::BTreeMap;

use lawbot_core::contract::{
    CategoryBatch, CategoryMember, Credentials, EditRequest, EditResponse, LoginResponse,
    PageRevisions, Revision, WikiApi,
};
use lawbot_core::error::ApiError;

const API_PATH: &str = "/w/api.php";
const INDEX_PATH: &str = "/w/index.php";

pub struct HttpWikiClient {
    http: reqwest::Client,
    api_url: String,
    index_url: String,
}

impl HttpWikiClient {
    /// `host` is a bare host name (`he.wikisource.org`, https is assumed) or a
    /// base URL with scheme.
    pub fn new(host: &str) -> Result<Self, ApiError> {
        let base = base_url(host);
        let http = reqwest::Client::builder()
            .cookie_store(true)
            .user_agent(concat!("lawbot/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| {
                tracing::error!(error = ?e, "Failed to build HTTP client");
                ApiError::Network(e.to_string())
            })?;
        tracing::info!(base = %base, "Initialized wiki client");
        Ok(Self {
            http,
            api_url: format!("{base}{API_PATH}"),
            index_url: format!("{base}{INDEX_PATH}"),
        })
    }

    pub fn api_url(&self) -> &str {
        &self.api_url
    }

    pub fn index_url(&self) -> &str {
        &self.index_url
    }

    async fn get_api<T: DeserializeOwned>(&self, params: &[(&str, String)]) -> Result<T, ApiError> {
        let response = self
            .http
            .get(&self.api_url)
            .query(&[("format", "json")])
            .query(params)
            .send()
            .await
            .map_err(network)?;
        decode(response).await
    }

    async fn post_api<T: DeserializeOwned>(&self, form: &[(&str, String)]) -> Result<T, ApiError> {
        let mut body: Vec<(&str, String)> = vec![("format", "json".to_string())];
        body.extend(form.iter().cloned());
        let response = self
            .http
            .post(&self.api_url)
            .form(&body)
            .send()
            .await
            .map_err(network)?;
        decode(response).await
    }
}

pub fn base_url(host: &str) -> String {
    let host = host.trim().trim_end_matches('/');
    if host.starts_with("http://") || host.starts_with("https://") {
        host.to_string()
    } else {
        format!("https://{host}")
    }
}

fn network(e: reqwest::Error) -> ApiError {
    tracing::error!(error = ?e, "Wiki request failed");
    ApiError::Network(e.to_string())
}

async fn decode<T: DeserializeOwned>(response: Response) -> Result<T, ApiError> {
    let status = response.status();
    let url = response.url().to_string();
    if !status.is_success() {
        tracing::error!(status = status.as_u16(), url = %url, "Unexpected HTTP status");
        return Err(ApiError::Status {
            status: status.as_u16(),
            url,
        });
    }
    let value: Value = response
        .json()
        .await
        .map_err(|e| ApiError::Decode(e.to_string()))?;
    decode_value(value, &url)
}

/// Surfaces a MediaWiki `error` object as [`ApiError::Remote`], else decodes `value`.
fn decode_value<T: DeserializeOwned>(value: Value, url: &str) -> Result<T, ApiError> {
    if let Some(error) = value.get("error") {
        let code = error.get("code").and_then(Value::as_str).unwrap_or("unknown");
        let message = error.get("info").and_then(Value::as_str).unwrap_or_default();
        tracing::warn!(code, message, url = %url, "Wiki API returned an error");
        return Err(ApiError::Remote {
            code: code.to_string(),
            message: message.to_string(),
        });
    }
    serde_json::from_value(value).map_err(|e| ApiError::Decode(e.to_string()))
}

#[derive(Deserialize)]
struct LoginEnvelope {
    login: LoginBody,
}

#[derive(Deserialize)]
struct LoginBody {
    result: String,
    token: Option<String>,
    reason: Option<String>,
}

#[derive(Deserialize)]
struct TokensEnvelope {
    query: TokensQuery,
}

#[derive(Deserialize)]
struct TokensQuery {
    #[serde(default)]
    tokens: BTreeMap<String, String>,
}

impl TokensEnvelope {
    fn take(mut self, kind: &str) -> Option<String> {
        let tokens = &mut self.query.tokens;
        tokens.remove(&format!("{kind}token")).or_else(|| {
            // Newer MediaWiki versions fold the edit token into the csrf token.
            (kind == "edit")
                .then(|| tokens.remove("csrftoken"))
                .flatten()
        })
    }
}

#[derive(Deserialize)]
struct CategoryEnvelope {
    #[serde(rename = "continue")]
    continuation: Option<CategoryContinue>,
    #[serde(default)]
    query: Option<CategoryQuery>,
}

#[derive(Deserialize)]
struct CategoryContinue {
    cmcontinue: Option<String>,
}

#[derive(Deserialize)]
struct CategoryQuery {
    #[serde(default)]
    categorymembers: Vec<CategoryMemberBody>,
}

#[derive(Deserialize)]
struct CategoryMemberBody {
    title: String,
    pageid: Option<u64>,
}

impl CategoryEnvelope {
    fn into_batch(self) -> CategoryBatch {
        let members = self
            .query
            .map(|q| q.categorymembers)
            .unwrap_or_default()
            .into_iter()
            .map(|m| CategoryMember {
                title: m.title,
                page_id: m.pageid,
            })
            .collect();
        CategoryBatch {
            members,
            continue_from: self.continuation.and_then(|c| c.cmcontinue),
        }
    }
}

#[derive(Deserialize)]
struct RevisionsEnvelope {
    #[serde(default)]
    query: Option<RevisionsQuery>,
}

#[derive(Deserialize)]
struct RevisionsQuery {
    #[serde(default)]
    pages: BTreeMap<String, PageBody>,
}

#[derive(Deserialize)]
struct PageBody {
    pageid: Option<u64>,
    #[serde(default)]
    title: String,
    missing: Option<Value>,
    invalid: Option<Value>,
    #[serde(default)]
    revisions: Vec<RevisionBody>,
}

#[derive(Deserialize)]
struct RevisionBody {
    revid: u64,
    #[serde(default)]
    timestamp: String,
    #[serde(default)]
    user: String,
    #[serde(default)]
    comment: String,
    #[serde(rename = "*", default)]
    content: String,
}

impl RevisionsEnvelope {
    fn into_pages(self) -> Vec<PageRevisions> {
        let pages = self.query.map(|q| q.pages).unwrap_or_default();
        pages
            .into_values()
            .map(|page| PageRevisions {
                page_id: page.pageid,
                title: page.title,
                missing: page.missing.is_some() || page.invalid.is_some(),
                revisions: page
                    .revisions
                    .into_iter()
                    .map(|r| Revision {
                        revision_id: r.revid,
                        timestamp: r.timestamp,
                        author: r.user,
                        comment: r.comment,
                        content: r.content,
                    })
                    .collect(),
            })
            .collect()
    }
}

#[derive(Deserialize)]
struct EditEnvelope {
    edit: EditBody,
}

#[derive(Deserialize)]
struct EditBody {
    result: Option<String>,
    pageid: Option<u64>,
    title: Option<String>,
    oldrevid: Option<u64>,
    newrevid: Option<u64>,
    nochange: Option<Value>,
}

impl EditEnvelope {
    fn into_response(self) -> EditResponse {
        let edit = self.edit;
        EditResponse {
            result: edit.result,
            page_id: edit.pageid,
            title: edit.title,
            old_revision_id: edit.oldrevid,
            new_revision_id: edit.newrevid,
            no_change: edit.nochange.is_some(),
        }
    }
}

#[async_trait]
impl WikiApi for HttpWikiClient {
    async fn login(
        &self,
        credentials: &Credentials,
        login_token: Option<String>,
    ) -> Result<LoginResponse, ApiError> {
        tracing::info!(
            user = %credentials.username,
            with_token = login_token.is_some(),
            "Submitting login"
        );
        let mut form = vec![
            ("action", "login".to_string()),
            ("lgname", credentials.username.clone()),
            ("lgpassword", credentials.password.clone()),
        ];
        if let Some(token) = login_token {
            form.push(("lgtoken", token));
        }
        let envelope: LoginEnvelope = self.post_api(&form).await?;
        tracing::debug!(result = %envelope.login.result, "Login response received");
        Ok(LoginResponse {
            result: envelope.login.result,
            token: envelope.login.token,
            reason: envelope.login.reason,
        })
    }

    async fn fetch_token(&self, kind: &str) -> Result<Option<String>, ApiError> {
        let params = [
            ("action", "query".to_string()),
            ("meta", "tokens".to_string()),
            ("type", kind.to_string()),
        ];
        let envelope: TokensEnvelope = self.get_api(&params).await?;
        let token = envelope.take(kind);
        tracing::debug!(kind, found = token.is_some(), "Token response received");
        Ok(token)
    }

    async fn category_members(
        &self,
        category: &str,
        continue_from: Option<String>,
    ) -> Result<CategoryBatch, ApiError> {
        let mut params = vec![
            ("action", "query".to_string()),
            ("list", "categorymembers".to_string()),
            ("cmtitle", format!("category:{category}")),
            ("cmsort", "timestamp".to_string()),
            ("cmdir", "desc".to_string()),
            ("cmlimit", "max".to_string()),
        ];
        if let Some(from) = continue_from {
            params.push(("cmcontinue", from));
        }
        let envelope: CategoryEnvelope = self.get_api(&params).await?;
        Ok(envelope.into_batch())
    }

    async fn revisions(&self, title: &str) -> Result<Vec<PageRevisions>, ApiError> {
        let params = [
            ("action", "query".to_string()),
            ("prop", "revisions".to_string()),
            ("titles", title.to_string()),
            ("rvprop", "ids|timestamp|user|comment|content".to_string()),
            ("rvlimit", "1".to_string()),
        ];
        let envelope: RevisionsEnvelope = self.get_api(&params).await?;
        Ok(envelope.into_pages())
    }

    async fn edit(&self, request: EditRequest) -> Result<EditResponse, ApiError> {
        let form = [
            ("action", "edit".to_string()),
            ("title", request.title),
            ("section", request.section.to_string()),
            ("text", request.text),
            ("summary", request.summary),
            ("contentformat", request.content_format),
            ("contentmodel", request.content_model),
            // MediaWiki expects the token as the last field.
            ("token", request.token),
        ];
        let envelope: EditEnvelope = self.post_api(&form).await?;
        Ok(envelope.into_response())
    }

    async fn raw_text(&self, title: &str) -> Result<Option<String>, ApiError> {
        let response = self
            .http
            .get(&self.index_url)
            .query(&[("action", "raw"), ("title", title)])
            .send()
            .await
            .map_err(network)?;
        let status = response.status();
        if status == StatusCode::NOT_FOUND {
            tracing::debug!(title, "Raw fetch: page does not exist");
            return Ok(None);
        }
        if !status.is_success() {
            return Err(ApiError::Status {
                status: status.as_u16(),
                url: response.url().to_string(),
            });
        }
        let text = response.text().await.map_err(network)?;
        Ok(Some(text))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn base_url_defaults_to_https() {
        assert_eq!(base_url("he.wikisource.org"), "https://he.wikisource.org");
        assert_eq!(base_url(" he.wikisource.org/ "), "https://he.wikisource.org");
        assert_eq!(base_url("http://localhost:8080/"), "http://localhost:8080");
        assert_eq!(base_url("https://wiki.test"), "https://wiki.test");
    }

    #[test]
    fn error_object_becomes_remote_error() {
        let value = json!({
            "error": { "code": "badtoken", "info": "Invalid CSRF token." }
        });
        let decoded: Result<EditEnvelope, ApiError> = decode_value(value, "https://wiki.test");
        assert!(matches!(
            decoded,
            Err(ApiError::Remote { ref code, ref message })
                if code == "badtoken" && message == "Invalid CSRF token."
        ));
    }

    #[test]
    fn unexpected_shape_is_a_decode_error() {
        let decoded: Result<EditEnvelope, ApiError> =
            decode_value(json!({ "batchcomplete": "" }), "https://wiki.test");
        assert!(matches!(decoded, Err(ApiError::Decode(_))));
    }

    #[test]
    fn login_body_is_decoded() {
        let envelope: LoginEnvelope = decode_value(
            json!({ "login": { "result": "NeedToken", "token": "abc+\\" } }),
            "https://wiki.test",
        )
        .unwrap();
        assert_eq!(envelope.login.result, "NeedToken");
        assert_eq!(envelope.login.token.as_deref(), Some("abc+\\"));
        assert_eq!(envelope.login.reason, None);
    }

    #[test]
    fn edit_token_falls_back_to_csrf_token() {
        let envelope: TokensEnvelope = serde_json::from_value(json!({
            "batchcomplete": "",
            "query": { "tokens": { "csrftoken": "csrf+\\" } }
        }))
        .unwrap();
        assert_eq!(envelope.take("edit").as_deref(), Some("csrf+\\"));
    }

    #[test]
    fn named_token_wins_and_other_kinds_do_not_fall_back() {
        let both = json!({
            "query": { "tokens": { "edittoken": "edit+\\", "csrftoken": "csrf+\\" } }
        });
        let envelope: TokensEnvelope = serde_json::from_value(both.clone()).unwrap();
        assert_eq!(envelope.take("edit").as_deref(), Some("edit+\\"));

        let envelope: TokensEnvelope = serde_json::from_value(both).unwrap();
        assert_eq!(envelope.take("patrol"), None);
    }

    #[test]
    fn category_continuation_is_extracted() {
        let envelope: CategoryEnvelope = serde_json::from_value(json!({
            "continue": { "cmcontinue": "20240301|123", "continue": "-||" },
            "query": { "categorymembers": [
                { "pageid": 7, "ns": 0, "title": "Law A" },
                { "ns": 0, "title": "Law B" }
            ] }
        }))
        .unwrap();
        let batch = envelope.into_batch();
        assert_eq!(batch.continue_from.as_deref(), Some("20240301|123"));
        assert_eq!(
            batch.members,
            vec![
                CategoryMember {
                    title: "Law A".to_string(),
                    page_id: Some(7),
                },
                CategoryMember {
                    title: "Law B".to_string(),
                    page_id: None,
                },
            ]
        );
    }

    #[test]
    fn last_category_batch_has_no_continuation() {
        let envelope: CategoryEnvelope =
            serde_json::from_value(json!({ "batchcomplete": "" })).unwrap();
        assert_eq!(envelope.into_batch(), CategoryBatch::default());
    }

    #[test]
    fn revision_content_is_read_from_star_key() {
        let envelope: RevisionsEnvelope = serde_json::from_value(json!({
            "query": { "pages": { "42": {
                "pageid": 42,
                "ns": 0,
                "title": "Law/source",
                "revisions": [{
                    "revid": 12345,
                    "parentid": 12000,
                    "user": "Editor",
                    "timestamp": "2024-03-01T10:00:00Z",
                    "comment": "fix typo",
                    "contentformat": "text/x-wiki",
                    "contentmodel": "wikitext",
                    "*": "raw text"
                }]
            } } }
        }))
        .unwrap();
        let pages = envelope.into_pages();
        assert_eq!(pages.len(), 1);
        assert_eq!(pages[0].page_id, Some(42));
        assert!(!pages[0].missing);
        assert_eq!(
            pages[0].revisions,
            vec![Revision {
                revision_id: 12345,
                timestamp: "2024-03-01T10:00:00Z".to_string(),
                author: "Editor".to_string(),
                comment: "fix typo".to_string(),
                content: "raw text".to_string(),
            }]
        );
    }

    #[test]
    fn missing_and_invalid_pages_are_missing() {
        let envelope: RevisionsEnvelope = serde_json::from_value(json!({
            "query": { "pages": {
                "-1": { "ns": 0, "title": "Nowhere", "missing": "" },
                "-2": { "title": "Bad|Title", "invalid": "", "invalidreason": "x" }
            } }
        }))
        .unwrap();
        let pages = envelope.into_pages();
        assert_eq!(pages.len(), 2);
        assert!(pages.iter().all(|p| p.missing && p.revisions.is_empty()));
        assert!(pages.iter().all(|p| p.page_id.is_none()));
    }

    #[test]
    fn edit_result_maps_nochange_flag() {
        let envelope: EditEnvelope = serde_json::from_value(json!({
            "edit": {
                "result": "Success",
                "pageid": 77,
                "title": "Law",
                "contentmodel": "wikitext",
                "nochange": ""
            }
        }))
        .unwrap();
        let response = envelope.into_response();
        assert_eq!(response.result.as_deref(), Some("Success"));
        assert_eq!(response.page_id, Some(77));
        assert_eq!(response.new_revision_id, None);
        assert!(response.no_change);
    }
}
