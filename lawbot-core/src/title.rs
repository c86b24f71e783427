//! Source/destination title derivation. Pure string functions, no I/O.

/// The two page names involved in synchronising one title.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TitlePair {
    /// Page holding the raw input text (carries the suffix).
    pub source: String,
    /// Published page (suffix stripped).
    pub destination: String,
}

/// Naming convention linking source pages to destination pages.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TitleScheme {
    suffix: String,
}

impl TitleScheme {
    pub fn new(suffix: impl Into<String>) -> Self {
        Self {
            suffix: suffix.into(),
        }
    }

    pub fn suffix(&self) -> &str {
        &self.suffix
    }

    pub fn is_source(&self, title: &str) -> bool {
        !self.suffix.is_empty() && title.ends_with(&self.suffix)
    }

    pub fn append_suffix(&self, title: &str) -> String {
        format!("{title}{}", self.suffix)
    }

    /// Removes one trailing suffix; titles without it are returned unchanged.
    pub fn strip_suffix<'t>(&self, title: &'t str) -> &'t str {
        if self.suffix.is_empty() {
            return title;
        }
        title.strip_suffix(self.suffix.as_str()).unwrap_or(title)
    }

    /// Accepts either form of a title and returns both.
    pub fn decompose(&self, title: &str) -> TitlePair {
        if self.is_source(title) {
            TitlePair {
                source: title.to_string(),
                destination: self.strip_suffix(title).to_string(),
            }
        } else {
            TitlePair {
                source: self.append_suffix(title),
                destination: title.to_string(),
            }
        }
    }
}
