/// Story formatting — paragraph segmentation and word-budget trimming.

use rand::Rng;

/// Separator the raw model output is split on.
const SENTENCE_SEPARATOR: &str = ". ";
/// Separator placed between paragraphs.
const PARAGRAPH_SEPARATOR: &str = "\n\n";
/// A paragraph is flushed once it holds this many sentences.
pub const MAX_SENTENCES_PER_PARAGRAPH: usize = 3;
/// Chance of an early paragraph break after any sentence.
pub const PARAGRAPH_BREAK_PROBABILITY: f64 = 0.2;

/// Split raw text into paragraphs.
///
/// Sentences are accumulated until the paragraph holds
/// [`MAX_SENTENCES_PER_PARAGRAPH`] of them, or a break is rolled with
/// `break_probability`. Each paragraph is its sentences joined by `". "`
/// with a trailing `"."`.
pub fn into_paragraphs<R: Rng>(
    text: &str,
    rng: &mut R,
    break_probability: f64,
) -> Vec<String> {
    let mut paragraphs = Vec::new();
    let mut current: Vec<&str> = Vec::new();

    for sentence in text.split(SENTENCE_SEPARATOR) {
        current.push(sentence);
        if current.len() >= MAX_SENTENCES_PER_PARAGRAPH || rng.gen::<f64>() < break_probability {
            paragraphs.push(close_paragraph(&current));
            current.clear();
        }
    }

    if !current.is_empty() {
        paragraphs.push(close_paragraph(&current));
    }

    paragraphs
}

fn close_paragraph(sentences: &[&str]) -> String {
    let mut paragraph = sentences.join(SENTENCE_SEPARATOR);
    paragraph.push('.');
    paragraph
}

/// Reformat raw model output into a blank-line separated story.
pub fn format_story<R: Rng>(text: &str, rng: &mut R) -> String {
    into_paragraphs(text, rng, PARAGRAPH_BREAK_PROBABILITY).join(PARAGRAPH_SEPARATOR)
}

/// Trim `story` to at most `word_count` words.
///
/// Stories already within budget are returned untouched, paragraph breaks
/// included. Longer ones are cut, re-joined with single spaces, and given a
/// closing period if the cut left them without one.
pub fn trim_to_word_count(story: String, word_count: usize) -> String {
    let words: Vec<&str> = story.split_whitespace().collect();
    if words.len() <= word_count {
        return story;
    }

    let mut trimmed = words[..word_count].join(" ");
    if !trimmed.ends_with('.') {
        trimmed.push('.');
    }
    trimmed
}
