/// Markov chain text generator — training, serialization, and prompt continuation.

use rand::distributions::WeightedIndex;
use rand::prelude::Distribution;
use rand::rngs::StdRng;
use rustc_hash::FxHashMap;
use serde::{Deserialize, Serialize};
use std::path::Path;
use thiserror::Error;

use crate::core::backend::{GenerationError, GenerationParams, TextGenerator};

#[derive(Debug, Error)]
pub enum MarkovError {
    #[error("no data for generation (model is empty)")]
    NoData,
    #[error("n-gram depth must be 2-4, got {0}")]
    InvalidOrder(usize),
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("RON deserialization error: {0}")]
    Ron(#[from] ron::error::SpannedError),
    #[error("RON serialization error: {0}")]
    RonSerialize(#[from] ron::Error),
}

/// Special token marking sentence start.
const SENTENCE_START: &str = "<S>";
/// Special token marking sentence end.
const SENTENCE_END: &str = "</S>";

/// Punctuation characters that are tokenized as separate tokens.
const SENTENCE_ENDERS: &[char] = &['.', '!', '?'];
const PUNCTUATION: &[char] = &['.', '!', '?', ',', ';', ':', '"'];

type TransitionTable = FxHashMap<Vec<String>, Vec<(String, u32)>>;

/// A trained Markov model storing n-gram transition counts.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct MarkovModel {
    /// N-gram depth (e.g., 2 for bigrams, 3 for trigrams).
    pub n: usize,
    /// Transition table: n-gram prefix → [(next_token, count)].
    pub transitions: TransitionTable,
}

/// Knobs for a single continuation.
#[derive(Debug, Clone, PartialEq)]
pub struct Sampling {
    /// Stop once the output (prompt included) holds this many tokens.
    pub max_tokens: usize,
    /// Probabilities are raised to `1 / temperature`; `<= 0` means greedy.
    pub temperature: f64,
    /// Keep only the most likely tokens whose mass reaches this value.
    pub top_p: f64,
    /// Forbid any n-gram of this size from appearing twice; 0 disables.
    pub no_repeat_ngram_size: usize,
}

impl From<&GenerationParams> for Sampling {
    fn from(params: &GenerationParams) -> Self {
        Self {
            max_tokens: params.max_length,
            temperature: params.temperature,
            top_p: params.top_p,
            no_repeat_ngram_size: params.no_repeat_ngram_size,
        }
    }
}

impl MarkovModel {
    fn start_state(&self) -> Vec<String> {
        vec![SENTENCE_START.to_string(); self.n - 1]
    }

    /// Continue `prompt` until `sampling.max_tokens` tokens are produced or
    /// the chain runs dry.
    ///
    /// The chain state is seeded with the prompt's trailing tokens. A state
    /// the model never saw backs off to a fresh sentence start.
    pub fn continue_from(
        &self,
        prompt: &str,
        rng: &mut StdRng,
        sampling: &Sampling,
    ) -> Result<String, MarkovError> {
        if !(2..=4).contains(&self.n) {
            return Err(MarkovError::InvalidOrder(self.n));
        }
        if self.transitions.is_empty() {
            return Err(MarkovError::NoData);
        }

        let start = self.start_state();
        let mut output = tokenize(prompt);
        let mut state = start.clone();
        for tok in &output {
            slide(&mut state, tok.clone());
        }
        if !self.transitions.contains_key(&state) {
            state = start.clone();
        }

        // Sentence ends don't emit tokens, so bound the walk separately.
        for _ in 0..(sampling.max_tokens * 3 + 10) {
            if output.len() >= sampling.max_tokens {
                break;
            }

            let next = self
                .transitions
                .get(&state)
                .and_then(|options| sample_next(options, &output, sampling, rng));

            let next = match next {
                Some(tok) => tok,
                None if state == start => break,
                None => {
                    state = start.clone();
                    continue;
                }
            };

            if next == SENTENCE_END {
                state = start.clone();
                continue;
            }

            output.push(next.clone());
            slide(&mut state, next);
        }

        Ok(reassemble_tokens(&output))
    }
}

/// Slide the state window forward by one token.
fn slide(state: &mut Vec<String>, tok: String) {
    state.push(tok);
    state.remove(0);
}

/// Pick the next token from `options`, honoring the sampling settings.
fn sample_next(
    options: &[(String, u32)],
    output: &[String],
    sampling: &Sampling,
    rng: &mut StdRng,
) -> Option<String> {
    let total: u32 = options.iter().map(|(_, count)| count).sum();
    if total == 0 {
        return None;
    }

    let mut candidates: Vec<(&str, f64)> = options
        .iter()
        .filter(|(tok, _)| {
            tok == SENTENCE_END || !repeats_ngram(output, tok, sampling.no_repeat_ngram_size)
        })
        .map(|(tok, count)| (tok.as_str(), *count as f64 / total as f64))
        .collect();

    if candidates.is_empty() {
        return None;
    }

    // Most likely first; ties keep table order.
    candidates.sort_by(|a, b| b.1.total_cmp(&a.1));

    if sampling.temperature <= 0.0 {
        return Some(candidates[0].0.to_string());
    }

    let exponent = 1.0 / sampling.temperature;
    for candidate in &mut candidates {
        candidate.1 = candidate.1.powf(exponent);
    }
    let mass: f64 = candidates.iter().map(|(_, w)| w).sum();

    if sampling.top_p < 1.0 {
        let mut cumulative = 0.0;
        let mut keep = 0;
        for (_, weight) in &candidates {
            cumulative += weight / mass;
            keep += 1;
            if cumulative >= sampling.top_p {
                break;
            }
        }
        candidates.truncate(keep.max(1));
    }

    let weights: Vec<f64> = candidates.iter().map(|(_, w)| *w).collect();
    let dist = WeightedIndex::new(&weights).ok()?;
    Some(candidates[dist.sample(rng)].0.to_string())
}

/// Would appending `next` repeat an n-gram of `size` already in `output`?
fn repeats_ngram(output: &[String], next: &str, size: usize) -> bool {
    if size == 0 || output.len() + 1 < size {
        return false;
    }
    let prefix = &output[output.len() + 1 - size..];
    output
        .windows(size)
        .any(|window| window[..size - 1] == *prefix && window[size - 1] == next)
}

/// Reassemble tokens into natural text (attach punctuation to previous word).
fn reassemble_tokens(tokens: &[String]) -> String {
    let mut result = String::new();
    for (i, tok) in tokens.iter().enumerate() {
        if i > 0 && !is_punctuation(tok) {
            result.push(' ');
        }
        result.push_str(tok);
    }
    result
}

fn is_punctuation(tok: &str) -> bool {
    let mut chars = tok.chars();
    matches!((chars.next(), chars.next()), (Some(c), None) if PUNCTUATION.contains(&c))
}

/// Trains Markov models from raw text.
pub struct MarkovTrainer;

impl MarkovTrainer {
    /// Train a Markov model from raw text with the given n-gram depth.
    ///
    /// Each non-empty line is tokenized and split into sentences; every
    /// sentence contributes its padded n-gram windows.
    pub fn train(text: &str, n: usize) -> Result<MarkovModel, MarkovError> {
        if !(2..=4).contains(&n) {
            return Err(MarkovError::InvalidOrder(n));
        }

        let mut transitions = TransitionTable::default();

        for line in text.lines() {
            let trimmed = line.trim();
            if trimmed.is_empty() {
                continue;
            }

            let tokens = tokenize(trimmed);
            for sentence in split_into_sentences(&tokens) {
                let mut padded = vec![SENTENCE_START.to_string(); n - 1];
                padded.extend(sentence);
                padded.push(SENTENCE_END.to_string());

                for window in padded.windows(n) {
                    add_transition(&mut transitions, window[..n - 1].to_vec(), &window[n - 1]);
                }
            }
        }

        Ok(MarkovModel { n, transitions })
    }
}

/// Add a transition to a transition table, incrementing the count.
fn add_transition(table: &mut TransitionTable, prefix: Vec<String>, next: &str) {
    let entries = table.entry(prefix).or_default();
    if let Some(entry) = entries.iter_mut().find(|(tok, _)| tok == next) {
        entry.1 += 1;
    } else {
        entries.push((next.to_string(), 1));
    }
}

/// Tokenize text: split on whitespace, separate punctuation as individual tokens.
fn tokenize(text: &str) -> Vec<String> {
    let mut tokens = Vec::new();
    for word in text.split_whitespace() {
        let mut remaining = word;
        while let Some(first) = remaining.chars().next() {
            if PUNCTUATION.contains(&first) {
                tokens.push(first.to_string());
                remaining = &remaining[first.len_utf8()..];
                continue;
            }

            // Find end of word (before punctuation)
            if let Some(pos) = remaining.find(|c: char| PUNCTUATION.contains(&c)) {
                tokens.push(remaining[..pos].to_string());
                remaining = &remaining[pos..];
            } else {
                tokens.push(remaining.to_string());
                break;
            }
        }
    }
    tokens
}

/// Split a token sequence into sentences at sentence-ending punctuation.
fn split_into_sentences(tokens: &[String]) -> Vec<Vec<String>> {
    let mut sentences = Vec::new();
    let mut current = Vec::new();

    for tok in tokens {
        current.push(tok.clone());
        if tok.len() == 1 && tok.starts_with(SENTENCE_ENDERS) {
            sentences.push(std::mem::take(&mut current));
        }
    }

    // Don't discard trailing tokens without sentence ender
    if !current.is_empty() {
        sentences.push(current);
    }

    sentences
}

/// Save a MarkovModel to a RON file.
pub fn save_model(model: &MarkovModel, path: &Path) -> Result<(), MarkovError> {
    let serialized = ron::ser::to_string_pretty(model, ron::ser::PrettyConfig::default())?;
    std::fs::write(path, serialized)?;
    Ok(())
}

/// Load a MarkovModel from a RON file.
pub fn load_model(path: &Path) -> Result<MarkovModel, MarkovError> {
    let contents = std::fs::read_to_string(path)?;
    let model: MarkovModel = ron::from_str(&contents)?;
    Ok(model)
}

/// A [`MarkovModel`] behind the generator interface, for offline runs.
pub struct MarkovGenerator {
    model: MarkovModel,
    rng: StdRng,
}

impl MarkovGenerator {
    pub fn new(model: MarkovModel, rng: StdRng) -> Self {
        Self { model, rng }
    }
}

impl TextGenerator for MarkovGenerator {
    fn generate(
        &mut self,
        prompt: &str,
        params: &GenerationParams,
    ) -> Result<Vec<String>, GenerationError> {
        let sampling = Sampling::from(params);
        tracing::debug!(
            n = self.model.n,
            max_tokens = sampling.max_tokens,
            "continuing prompt with markov model"
        );

        (0..params.num_return_sequences.max(1))
            .map(|_| {
                self.model
                    .continue_from(prompt, &mut self.rng, &sampling)
                    .map_err(GenerationError::from)
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;

    fn train_test_corpus() -> MarkovModel {
        let corpus = std::fs::read_to_string("tests/fixtures/story_corpus.txt").unwrap();
        MarkovTrainer::train(&corpus, 2).unwrap()
    }

    fn sampling(max_tokens: usize) -> Sampling {
        Sampling {
            max_tokens,
            temperature: 0.9,
            top_p: 0.9,
            no_repeat_ngram_size: 2,
        }
    }

    #[test]
    fn tokenize_basic() {
        let tokens = tokenize("Hello, world.");
        assert_eq!(tokens, vec!["Hello", ",", "world", "."]);
    }

    #[test]
    fn tokenize_keeps_apostrophes_in_words() {
        let tokens = tokenize("She didn't say \"why?\"");
        assert_eq!(tokens, vec!["She", "didn't", "say", "\"", "why", "?", "\""]);
    }

    #[test]
    fn reassemble_attaches_punctuation() {
        let tokens = vec![
            "Hello".to_string(),
            ",".to_string(),
            "world".to_string(),
            ".".to_string(),
        ];
        assert_eq!(reassemble_tokens(&tokens), "Hello, world.");
    }

    #[test]
    fn prompts_survive_tokenize_round_trip() {
        for theme in crate::schema::theme::Theme::ALL {
            let prompt = theme.opening();
            assert_eq!(reassemble_tokens(&tokenize(prompt)), prompt);
        }
    }

    #[test]
    fn train_creates_transitions() {
        let model = train_test_corpus();
        assert_eq!(model.n, 2);
        assert!(!model.transitions.is_empty());
        assert!(model.transitions.contains_key(&vec![SENTENCE_START.to_string()]));
    }

    #[test]
    fn train_rejects_bad_order() {
        assert!(matches!(
            MarkovTrainer::train("Some text.", 5),
            Err(MarkovError::InvalidOrder(5))
        ));
        assert!(matches!(
            MarkovTrainer::train("Some text.", 1),
            Err(MarkovError::InvalidOrder(1))
        ));
    }

    #[test]
    fn continuation_starts_with_prompt() {
        let model = train_test_corpus();
        let mut rng = StdRng::seed_from_u64(42);
        let prompt = "The colony on Mars received a mysterious signal from deep space that";

        let text = model.continue_from(prompt, &mut rng, &sampling(60)).unwrap();
        assert!(text.starts_with(prompt), "got: {}", text);
        assert!(text.len() > prompt.len(), "expected a continuation");
    }

    #[test]
    fn continuation_respects_token_budget() {
        let model = train_test_corpus();
        for seed in 0..20 {
            let mut rng = StdRng::seed_from_u64(seed);
            let text = model
                .continue_from("The night was", &mut rng, &sampling(25))
                .unwrap();
            assert!(tokenize(&text).len() <= 25, "seed {}: {}", seed, text);
        }
    }

    #[test]
    fn continuation_deterministic() {
        let model = train_test_corpus();
        let mut rng1 = StdRng::seed_from_u64(7);
        let mut rng2 = StdRng::seed_from_u64(7);

        let a = model.continue_from("Once", &mut rng1, &sampling(40)).unwrap();
        let b = model.continue_from("Once", &mut rng2, &sampling(40)).unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn no_repeated_bigrams_in_continuation() {
        let model = train_test_corpus();
        let prompt_len = tokenize("The door").len();
        for seed in 0..20 {
            let mut rng = StdRng::seed_from_u64(seed);
            let text = model
                .continue_from("The door", &mut rng, &sampling(80))
                .unwrap();
            let tokens = tokenize(&text);
            // Every bigram that ends in generated text is new at that point.
            for i in prompt_len.max(1)..tokens.len() {
                let pair = &tokens[i - 1..=i];
                let earlier = tokens[..i].windows(2).any(|w| w == pair);
                assert!(!earlier, "seed {}: repeated {:?} in {}", seed, pair, text);
            }
        }
    }

    #[test]
    fn greedy_sampling_is_seed_independent() {
        let model = train_test_corpus();
        let greedy = Sampling {
            temperature: 0.0,
            ..sampling(30)
        };
        let a = model
            .continue_from("The", &mut StdRng::seed_from_u64(1), &greedy)
            .unwrap();
        let b = model
            .continue_from("The", &mut StdRng::seed_from_u64(99), &greedy)
            .unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn unseen_prompt_backs_off_to_sentence_start() {
        let model = train_test_corpus();
        let mut rng = StdRng::seed_from_u64(3);
        let text = model
            .continue_from("Zyzzyva quux", &mut rng, &sampling(30))
            .unwrap();
        assert!(text.starts_with("Zyzzyva quux "), "got: {}", text);
    }

    #[test]
    fn empty_model_has_no_data() {
        let model = MarkovModel {
            n: 2,
            transitions: TransitionTable::default(),
        };
        let mut rng = StdRng::seed_from_u64(1);
        assert!(matches!(
            model.continue_from("Hi", &mut rng, &sampling(10)),
            Err(MarkovError::NoData)
        ));
    }

    #[test]
    fn repeats_ngram_detection() {
        let output: Vec<String> = ["a", "b", "c", "a"].iter().map(|s| s.to_string()).collect();
        assert!(repeats_ngram(&output, "b", 2));
        assert!(!repeats_ngram(&output, "c", 2));
        assert!(!repeats_ngram(&output, "b", 0));
        assert!(repeats_ngram(&output, "c", 1));
        assert!(!repeats_ngram(&output, "d", 1));
    }

    #[test]
    fn nucleus_keeps_only_dominant_token() {
        let options = vec![("common".to_string(), 98), ("rare".to_string(), 2)];
        let narrow = Sampling {
            temperature: 1.0,
            top_p: 0.5,
            no_repeat_ngram_size: 0,
            max_tokens: 10,
        };
        for seed in 0..30 {
            let mut rng = StdRng::seed_from_u64(seed);
            assert_eq!(
                sample_next(&options, &[], &narrow, &mut rng).as_deref(),
                Some("common")
            );
        }
    }

    #[test]
    fn generator_returns_requested_sequences() {
        let mut generator = MarkovGenerator::new(train_test_corpus(), StdRng::seed_from_u64(5));
        let params = GenerationParams {
            num_return_sequences: 3,
            ..GenerationParams::for_word_count(20)
        };
        let texts = generator.generate("The old house", &params).unwrap();
        assert_eq!(texts.len(), 3);
        assert!(texts.iter().all(|t| t.starts_with("The old house")));
    }

    #[test]
    fn save_and_load_model() {
        let model = train_test_corpus();
        let path = std::path::PathBuf::from("target/test_story_markov_model.ron");
        let _ = std::fs::create_dir_all("target");

        save_model(&model, &path).unwrap();
        let loaded = load_model(&path).unwrap();

        assert_eq!(loaded.n, model.n);
        assert_eq!(loaded.transitions.len(), model.transitions.len());

        let _ = std::fs::remove_file(&path);
    }
}
