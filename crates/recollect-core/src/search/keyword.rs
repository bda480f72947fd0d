//! Keyword matching
//!
//! Graded substring matching over title and content, case-insensitive:
//! - 1.0 when the whole query is a substring of title or content
//! - 0.8 when every whitespace-separated token appears in title or content
//! - 0.5 when the query has enough tokens and enough of them appear (fuzzy)

/// Whole query found verbatim
pub const EXACT_MATCH: f32 = 1.0;
/// Every token found
pub const ALL_TOKENS_MATCH: f32 = 0.8;
/// Fuzzy fallback
pub const FUZZY_MATCH: f32 = 0.5;

/// A prepared keyword query
#[derive(Debug, Clone)]
pub struct KeywordMatcher {
    needle: String,
    tokens: Vec<String>,
    fuzzy_min_tokens: usize,
    fuzzy_token_ratio: f64,
}

impl KeywordMatcher {
    pub fn new(query: &str, fuzzy_min_tokens: usize, fuzzy_token_ratio: f64) -> Self {
        let needle = query.to_lowercase();
        let tokens = needle.split_whitespace().map(str::to_string).collect();
        Self {
            needle,
            tokens,
            fuzzy_min_tokens,
            fuzzy_token_ratio,
        }
    }

    /// Match quality of a node, or `None` if it does not match
    pub fn quality(&self, title: &str, content: &str) -> Option<f32> {
        let title = title.to_lowercase();
        let content = content.to_lowercase();

        if title.contains(&self.needle) || content.contains(&self.needle) {
            return Some(EXACT_MATCH);
        }

        let found = self
            .tokens
            .iter()
            .filter(|t| title.contains(t.as_str()) || content.contains(t.as_str()))
            .count();

        if found == self.tokens.len() {
            Some(ALL_TOKENS_MATCH)
        } else if self.tokens.len() >= self.fuzzy_min_tokens
            && found as f64 >= self.tokens.len() as f64 * self.fuzzy_token_ratio
        {
            Some(FUZZY_MATCH)
        } else {
            None
        }
    }

    /// Plain substring test used by the degraded search path
    pub fn is_substring(&self, title: &str, content: &str) -> bool {
        title.to_lowercase().contains(&self.needle) || content.to_lowercase().contains(&self.needle)
    }
}
