//! Idempotency gate: decides from the destination's edit comment whether a
//! title needs to be synchronised again.
//!
//! The decision compares revision ids only. Every content change on the
//! source produces a new revision id, so no content hashing is done.

use tracing::debug;

use crate::contract::Revision;
use crate::provenance;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SkipDecision {
    Proceed,
    Skip(String),
}

pub const UP_TO_DATE: &str = "already up to date";

pub fn should_sync(source: &Revision, destination: Option<&Revision>, force: bool) -> SkipDecision {
    if force {
        return SkipDecision::Proceed;
    }
    let Some(destination) = destination else {
        return SkipDecision::Proceed;
    };

    match provenance::parse(&destination.comment) {
        Ok((tagged, _)) if tagged == source.revision_id => {
            SkipDecision::Skip(UP_TO_DATE.to_string())
        }
        Ok((tagged, _)) => {
            debug!(
                tagged,
                source = source.revision_id,
                "[GATE] Destination built from another revision"
            );
            SkipDecision::Proceed
        }
        Err(e) => {
            // Not bot-managed yet, or edited by hand since.
            debug!(error = %e, "[GATE] No provenance tag on destination");
            SkipDecision::Proceed
        }
    }
}
