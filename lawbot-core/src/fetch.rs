//! Work-list resolution and revision retrieval.

use std::collections::HashSet;

use tracing::{debug, info, warn};

use crate::contract::{Revision, WikiApi};
use crate::error::FetchError;
use crate::session::SessionManager;

/// Reads pages through a borrowed session.
pub struct RevisionFetcher<'s, A> {
    session: &'s SessionManager<A>,
}

impl<'s, A: WikiApi> RevisionFetcher<'s, A> {
    pub fn new(session: &'s SessionManager<A>) -> Self {
        Self { session }
    }

    /// Explicit titles win when there are any (caller order, duplicates
    /// dropped); otherwise the members of `category`, most recently modified
    /// first. An empty category is an empty work list.
    pub async fn resolve_titles(
        &self,
        explicit: &[String],
        category: &str,
    ) -> Result<Vec<String>, FetchError> {
        if !explicit.is_empty() {
            let mut seen = HashSet::new();
            let titles: Vec<String> = explicit
                .iter()
                .filter(|t| seen.insert(t.as_str()))
                .cloned()
                .collect();
            info!(count = titles.len(), "[FETCH] Using explicit titles");
            return Ok(titles);
        }

        let mut titles = Vec::new();
        let mut continue_from = None;
        loop {
            let batch = self
                .session
                .api()
                .category_members(category, continue_from.take())
                .await?;
            debug!(
                category,
                batch = batch.members.len(),
                more = batch.continue_from.is_some(),
                "[FETCH] Category batch received"
            );
            titles.extend(batch.members.into_iter().map(|m| m.title));
            match batch.continue_from {
                Some(next) if !next.is_empty() => continue_from = Some(next),
                _ => break,
            }
        }
        info!(category, count = titles.len(), "[FETCH] Resolved category members");
        Ok(titles)
    }

    /// The newest revision of `title`.
    pub async fn latest_revision(&self, title: &str) -> Result<Revision, FetchError> {
        let pages = self.session.api().revisions(title).await?;

        let mut found: Vec<_> = pages
            .into_iter()
            .filter(|p| !p.missing && !p.revisions.is_empty())
            .collect();

        let page_ids: HashSet<u64> = found.iter().filter_map(|p| p.page_id).collect();
        if page_ids.len() > 1 {
            let mut page_ids: Vec<u64> = page_ids.into_iter().collect();
            page_ids.sort_unstable();
            warn!(title, ?page_ids, "[FETCH] Title resolved to several pages");
            return Err(FetchError::Ambiguous {
                title: title.to_string(),
                page_ids,
            });
        }

        let Some(page) = found.first_mut() else {
            debug!(title, "[FETCH] Page has no revisions");
            return Err(FetchError::PageNotFound(title.to_string()));
        };
        let revision = page.revisions.swap_remove(0);
        debug!(
            title,
            revision_id = revision.revision_id,
            timestamp = %revision.timestamp,
            "[FETCH] Latest revision"
        );
        Ok(revision)
    }

    /// Like [`Self::latest_revision`], but a missing page is `None`.
    pub async fn destination_revision(&self, title: &str) -> Result<Option<Revision>, FetchError> {
        match self.latest_revision(title).await {
            Ok(revision) => Ok(Some(revision)),
            Err(FetchError::PageNotFound(_)) => Ok(None),
            Err(e) => Err(e),
        }
    }

    /// Plain page text via `index.php?action=raw`; needs no login.
    pub async fn raw_text(&self, title: &str) -> Result<String, FetchError> {
        self.session
            .api()
            .raw_text(title)
            .await?
            .ok_or_else(|| FetchError::PageNotFound(title.to_string()))
    }
}
