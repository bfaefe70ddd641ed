use serde::{Deserialize, Serialize};

/// Default theme when none is supplied.
pub const DEFAULT_THEME: &str = "fantasy";
/// Default target length in words.
pub const DEFAULT_WORD_COUNT: usize = 300;

/// What the caller asked for. The theme is kept exactly as typed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GenerationRequest {
    pub theme: String,
    pub word_count: usize,
}

impl GenerationRequest {
    pub fn new(theme: impl Into<String>, word_count: usize) -> Self {
        Self {
            theme: theme.into(),
            word_count,
        }
    }
}

impl Default for GenerationRequest {
    fn default() -> Self {
        Self::new(DEFAULT_THEME, DEFAULT_WORD_COUNT)
    }
}

/// A finished story, as emitted on stdout.
///
/// `theme` echoes the request verbatim rather than the table key that was
/// matched, so `"SciFi"` and `"western"` are reported as given.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoryResult {
    pub story: String,
    pub word_count: usize,
    pub theme: String,
}

impl StoryResult {
    /// Build a result, counting whitespace-delimited words in `story`.
    pub fn new(story: String, theme: impl Into<String>) -> Self {
        let word_count = story.split_whitespace().count();
        Self {
            story,
            word_count,
            theme: theme.into(),
        }
    }
}
