//! Story Engine — themed short-story generation.
//!
//! Seeds a text-generation model with a fixed opening sentence per theme,
//! then shapes the raw continuation into paragraphs trimmed to a word budget.

pub mod core;
pub mod schema;
