/// Text-generation backends — the seam between story shaping and the model.

use rand::rngs::StdRng;
use rand::SeedableRng;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use thiserror::Error;

use crate::core::inference::{InferenceClient, DEFAULT_ENDPOINT, DEFAULT_MODEL};
use crate::core::markov::{self, MarkovError, MarkovGenerator};

#[derive(Debug, Error)]
pub enum GenerationError {
    #[error("network error: {0}")]
    Network(String),
    #[error("inference API error (status {status}): {message}")]
    Api { status: u16, message: String },
    #[error("failed to parse model response: {0}")]
    Parse(String),
    #[error("model returned no generated text")]
    EmptyOutput,
    #[error("markov model error: {0}")]
    Markov(#[from] MarkovError),
    #[error("invalid backend configuration: {0}")]
    Config(String),
}

/// Roughly how many words one token covers.
const WORDS_PER_TOKEN: f64 = 0.75;
/// Extra tokens on top of the converted word target.
const LENGTH_PADDING: usize = 20;

/// Sampling and length parameters passed to a generator.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GenerationParams {
    /// Upper bound on total tokens, prompt included.
    pub max_length: usize,
    pub num_return_sequences: usize,
    pub temperature: f64,
    /// Nucleus-sampling threshold.
    pub top_p: f64,
    /// Size of n-grams that may not occur twice; 0 disables the check.
    pub no_repeat_ngram_size: usize,
}

impl GenerationParams {
    /// Derive a token budget from a word target and attach the fixed
    /// sampling settings used for stories.
    pub fn for_word_count(word_count: usize) -> Self {
        let max_length = (word_count as f64 / WORDS_PER_TOKEN).round() as usize + LENGTH_PADDING;
        Self {
            max_length,
            ..Self::default()
        }
    }
}

impl Default for GenerationParams {
    fn default() -> Self {
        Self {
            max_length: LENGTH_PADDING,
            num_return_sequences: 1,
            temperature: 0.9,
            top_p: 0.9,
            no_repeat_ngram_size: 2,
        }
    }
}

/// Anything that continues a prompt.
///
/// Returned candidates contain the prompt followed by the continuation.
pub trait TextGenerator {
    fn generate(
        &mut self,
        prompt: &str,
        params: &GenerationParams,
    ) -> Result<Vec<String>, GenerationError>;
}

/// Which generator to load for a run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Backend {
    /// Hosted Hugging Face inference for `model`.
    Inference {
        model: String,
        endpoint: String,
        api_token: Option<String>,
    },
    /// Local Markov model read from a RON file.
    Markov { model_path: PathBuf, seed: Option<u64> },
}

impl Backend {
    /// Hosted `gpt2` at the public endpoint.
    pub fn gpt2() -> Self {
        Self::Inference {
            model: DEFAULT_MODEL.to_string(),
            endpoint: DEFAULT_ENDPOINT.to_string(),
            api_token: None,
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            Self::Inference { .. } => "inference",
            Self::Markov { .. } => "markov",
        }
    }

    /// Build the generator. Failures here count as generation failures.
    pub fn load(&self) -> Result<Box<dyn TextGenerator>, GenerationError> {
        match self {
            Self::Inference {
                model,
                endpoint,
                api_token,
            } => {
                let client = InferenceClient::new(model.clone(), endpoint.clone())?
                    .with_api_token(api_token.clone());
                Ok(Box::new(client))
            }
            Self::Markov { model_path, seed } => {
                let model = markov::load_model(model_path)?;
                let rng = match seed {
                    Some(seed) => StdRng::seed_from_u64(*seed),
                    None => StdRng::from_entropy(),
                };
                Ok(Box::new(MarkovGenerator::new(model, rng)))
            }
        }
    }
}

impl Default for Backend {
    fn default() -> Self {
        Self::gpt2()
    }
}
