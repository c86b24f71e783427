//! Provenance tags: `[<source revision id>] <original comment>`.
//!
//! The tag is written into the summary of every edit the bot publishes and
//! read back by the idempotency gate to find out which source revision a
//! destination page was built from.

use std::sync::OnceLock;

use regex::Regex;

use crate::error::ParseError;

fn tag_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| {
        Regex::new(r"^\[(\d+)\](?: (.*))?$").expect("provenance tag pattern is valid")
    })
}

/// Builds the edit summary for a destination page.
///
/// An empty original comment yields just `[<id>]`.
pub fn build(revision_id: u64, comment: &str) -> String {
    if comment.is_empty() {
        format!("[{revision_id}]")
    } else {
        format!("[{revision_id}] {comment}")
    }
}

/// Splits an edit summary into the embedded source revision id and the
/// original comment.
pub fn parse(summary: &str) -> Result<(u64, String), ParseError> {
    let malformed = || ParseError::MalformedProvenanceTag(summary.to_string());
    let captures = tag_pattern().captures(summary).ok_or_else(malformed)?;
    let revision_id = captures[1].parse::<u64>().map_err(|_| malformed())?;
    let comment = captures
        .get(2)
        .map(|m| m.as_str().to_string())
        .unwrap_or_default();
    Ok((revision_id, comment))
}
