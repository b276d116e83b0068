//! Query string construction.

/// Builds a URL query string from optional parameters.
///
/// Absent and blank values are skipped; keys and values are percent-encoded.
#[derive(Debug, Clone, Default)]
pub struct QueryBuilder {
    pairs: Vec<(String, String)>,
}

impl QueryBuilder {
    #[must_use]
    pub const fn new() -> Self {
        Self { pairs: Vec::new() }
    }

    /// Append `key` when `value` is present and not blank.
    #[must_use]
    pub fn param<V: ToString>(mut self, key: &str, value: Option<V>) -> Self {
        if let Some(value) = value.map(|v| v.to_string())
            && !value.trim().is_empty()
        {
            self.pairs.push((key.to_string(), value));
        }
        self
    }

    /// `?`-prefixed query, or an empty string when nothing was appended.
    #[must_use]
    pub fn build(&self) -> String {
        if self.pairs.is_empty() {
            return String::new();
        }
        let query = self
            .pairs
            .iter()
            .map(|(key, value)| {
                format!("{}={}", urlencoding::encode(key), urlencoding::encode(value))
            })
            .collect::<Vec<_>>()
            .join("&");
        format!("?{query}")
    }
}
