//! Minimal Hugging Face Inference API client for the text-generation task.
//!
//! Requests are blocking: a story run makes exactly one call and has nothing
//! else to do while it waits.

use reqwest::blocking::Client;
use reqwest::header::{HeaderMap, HeaderValue, AUTHORIZATION, CONTENT_TYPE};
use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::core::backend::{GenerationError, GenerationParams, TextGenerator};

pub const DEFAULT_ENDPOINT: &str = "https://api-inference.huggingface.co";
pub const DEFAULT_MODEL: &str = "gpt2";

/// Environment variable holding the bearer token.
pub const API_TOKEN_VAR: &str = "HF_API_TOKEN";
/// Environment variable overriding [`DEFAULT_ENDPOINT`].
pub const ENDPOINT_VAR: &str = "HF_INFERENCE_ENDPOINT";

/// Hosted model client.
#[derive(Clone)]
pub struct InferenceClient {
    client: Client,
    model: String,
    endpoint: String,
    api_token: Option<String>,
}

impl InferenceClient {
    pub fn new(
        model: impl Into<String>,
        endpoint: impl Into<String>,
    ) -> Result<Self, GenerationError> {
        // First calls may wait on a cold model load.
        let client = Client::builder()
            .timeout(Duration::from_secs(120))
            .connect_timeout(Duration::from_secs(30))
            .build()
            .map_err(|e| GenerationError::Config(format!("failed to build HTTP client: {e}")))?;

        Ok(Self {
            client,
            model: model.into(),
            endpoint: endpoint.into(),
            api_token: None,
        })
    }

    pub fn with_api_token(mut self, token: Option<String>) -> Self {
        self.api_token = token.filter(|t| !t.is_empty());
        self
    }

    pub fn url(&self) -> String {
        format!("{}/models/{}", self.endpoint.trim_end_matches('/'), self.model)
    }

    fn build_headers(&self) -> Result<HeaderMap, GenerationError> {
        let mut headers = HeaderMap::new();
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
        if let Some(token) = &self.api_token {
            headers.insert(
                AUTHORIZATION,
                HeaderValue::from_str(&format!("Bearer {token}"))
                    .map_err(|e| GenerationError::Config(format!("invalid API token: {e}")))?,
            );
        }
        Ok(headers)
    }
}

impl TextGenerator for InferenceClient {
    fn generate(
        &mut self,
        prompt: &str,
        params: &GenerationParams,
    ) -> Result<Vec<String>, GenerationError> {
        let url = self.url();
        tracing::debug!(%url, max_length = params.max_length, "requesting hosted generation");

        let response = self
            .client
            .post(&url)
            .headers(self.build_headers()?)
            .json(&ApiRequest::new(prompt, params))
            .send()
            .map_err(|e| GenerationError::Network(e.to_string()))?;

        let status = response.status();
        let body = response
            .text()
            .map_err(|e| GenerationError::Network(e.to_string()))?;

        if !status.is_success() {
            return Err(GenerationError::Api {
                status: status.as_u16(),
                message: error_message(&body),
            });
        }

        parse_response(&body)
    }
}

// ============================================================================
// Wire types
// ============================================================================

#[derive(Debug, Serialize)]
struct ApiRequest<'a> {
    inputs: &'a str,
    parameters: ApiParameters,
}

#[derive(Debug, Serialize)]
struct ApiParameters {
    max_length: usize,
    num_return_sequences: usize,
    temperature: f64,
    top_p: f64,
    no_repeat_ngram_size: usize,
    do_sample: bool,
    return_full_text: bool,
}

impl<'a> ApiRequest<'a> {
    fn new(prompt: &'a str, params: &GenerationParams) -> Self {
        Self {
            inputs: prompt,
            parameters: ApiParameters {
                max_length: params.max_length,
                num_return_sequences: params.num_return_sequences,
                temperature: params.temperature,
                top_p: params.top_p,
                no_repeat_ngram_size: params.no_repeat_ngram_size,
                do_sample: true,
                return_full_text: true,
            },
        }
    }
}

#[derive(Debug, Deserialize)]
struct ApiCandidate {
    generated_text: String,
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum ApiResponse {
    Candidates(Vec<ApiCandidate>),
    Error { error: String },
}

fn parse_response(body: &str) -> Result<Vec<String>, GenerationError> {
    let parsed: ApiResponse =
        serde_json::from_str(body).map_err(|e| GenerationError::Parse(e.to_string()))?;

    match parsed {
        ApiResponse::Candidates(candidates) if candidates.is_empty() => {
            Err(GenerationError::EmptyOutput)
        }
        ApiResponse::Candidates(candidates) => Ok(candidates
            .into_iter()
            .map(|c| c.generated_text)
            .collect()),
        // Model-loading and rate-limit notices can arrive with a 200.
        ApiResponse::Error { error } => Err(GenerationError::Api {
            status: 200,
            message: error,
        }),
    }
}

/// Pull the `error` field out of a failure body, or fall back to the raw text.
fn error_message(body: &str) -> String {
    #[derive(Deserialize)]
    struct ErrorBody {
        error: String,
    }

    serde_json::from_str::<ErrorBody>(body)
        .map(|b| b.error)
        .unwrap_or_else(|_| body.to_string())
}
