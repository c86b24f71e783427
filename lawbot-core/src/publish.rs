//! Publishing transformed text to a destination page.

use tracing::{error, info};

use crate::contract::{EditRequest, PublishReceipt, Revision, WikiApi};
use crate::error::PublishError;
use crate::provenance;
use crate::session::SessionManager;

pub const EDIT_TOKEN: &str = "edit";
pub const CONTENT_FORMAT: &str = "text/x-wiki";
pub const CONTENT_MODEL: &str = "wikitext";

pub struct Publisher<'s, A> {
    session: &'s SessionManager<A>,
    footer: String,
}

impl<'s, A: WikiApi> Publisher<'s, A> {
    /// `footer` is the category marker line appended to every page.
    pub fn new(session: &'s SessionManager<A>, footer: impl Into<String>) -> Self {
        Self {
            session,
            footer: footer.into(),
        }
    }

    /// Page text as it will be submitted: `text`, a line break, the footer.
    pub fn compose(&self, text: &str) -> String {
        let separator = if text.is_empty() || text.ends_with('\n') {
            ""
        } else {
            "\n"
        };
        format!("{text}{separator}{}\n", self.footer)
    }

    /// Replaces section 0 of `destination` with `text`, tagging the edit with
    /// the source revision it was built from.
    pub async fn publish(
        &self,
        destination: &str,
        text: &str,
        source: &Revision,
    ) -> Result<PublishReceipt, PublishError> {
        let token = self.session.token(EDIT_TOKEN).await?;
        let request = EditRequest {
            title: destination.to_string(),
            section: 0,
            text: self.compose(text),
            summary: provenance::build(source.revision_id, &source.comment),
            token,
            content_format: CONTENT_FORMAT.to_string(),
            content_model: CONTENT_MODEL.to_string(),
        };

        info!(
            title = destination,
            revision_id = source.revision_id,
            bytes = request.text.len(),
            "[PUBLISH] Submitting edit"
        );
        let response = self.session.api().edit(request).await.map_err(|e| {
            error!(title = destination, error = %e, "[PUBLISH][ERROR] Edit request failed");
            PublishError::from(e)
        })?;

        if let Some(result) = response.result.as_deref().filter(|r| *r != "Success") {
            error!(title = destination, result, "[PUBLISH][ERROR] Edit was not accepted");
            return Err(PublishError::Rejected {
                code: "edit-failed".to_string(),
                message: result.to_string(),
            });
        }

        let receipt = PublishReceipt {
            title: response.title.unwrap_or_else(|| destination.to_string()),
            page_id: response.page_id,
            new_revision_id: response.new_revision_id,
            no_change: response.no_change,
        };
        info!(
            title = %receipt.title,
            page_id = ?receipt.page_id,
            new_revision_id = ?receipt.new_revision_id,
            no_change = receipt.no_change,
            "[PUBLISH] Edit saved"
        );
        Ok(receipt)
    }
}
