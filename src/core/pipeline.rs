/// The story pipeline: theme → prompt → model → paragraphs → word budget.
///
/// Generation failures never escape; they are logged and turned into a
/// fallback story that carries the error message.

use rand::rngs::StdRng;
use rand::SeedableRng;

use crate::core::backend::{Backend, GenerationError, GenerationParams, TextGenerator};
use crate::core::format::{format_story, trim_to_word_count};
use crate::schema::story::{GenerationRequest, StoryResult};
use crate::schema::theme::Theme;

/// Opening of the story returned when generation fails.
const FALLBACK_STORY: &str = "Once upon a time, there was an error in story generation.";

/// Where the generator comes from.
enum Source {
    /// Loaded on each run, inside the failure boundary.
    Backend(Backend),
    /// Supplied directly (for testing without a model).
    Ready(Box<dyn TextGenerator>),
}

/// Produces themed stories. Built via `StoryGenerator::builder()`.
pub struct StoryGenerator {
    source: Source,
    rng: StdRng,
}

/// Builder for constructing a `StoryGenerator`.
pub struct StoryGeneratorBuilder {
    backend: Backend,
    generator: Option<Box<dyn TextGenerator>>,
    seed: Option<u64>,
}

impl StoryGenerator {
    pub fn builder() -> StoryGeneratorBuilder {
        StoryGeneratorBuilder {
            backend: Backend::default(),
            generator: None,
            seed: None,
        }
    }

    /// Generate a story for `request`. Always returns a story.
    pub fn generate(&mut self, request: &GenerationRequest) -> StoryResult {
        let story = match self.try_generate(request) {
            Ok(story) => story,
            Err(e) => {
                tracing::error!(error = %e, "Error generating story: {}", e);
                fallback_story(&e)
            }
        };
        StoryResult::new(story, request.theme.clone())
    }

    /// Generate a story, surfacing any generation error.
    pub fn try_generate(&mut self, request: &GenerationRequest) -> Result<String, GenerationError> {
        let theme = Theme::resolve(&request.theme);
        let prompt = theme.opening();
        let params = GenerationParams::for_word_count(request.word_count);
        tracing::debug!(
            requested = %request.theme,
            %theme,
            max_length = params.max_length,
            "generating story"
        );

        let raw = {
            let mut loaded;
            let generator: &mut dyn TextGenerator = match &mut self.source {
                Source::Ready(generator) => generator.as_mut(),
                Source::Backend(backend) => {
                    tracing::debug!(backend = backend.name(), "loading text generator");
                    loaded = backend.load()?;
                    loaded.as_mut()
                }
            };
            generator
                .generate(prompt, &params)?
                .into_iter()
                .next()
                .ok_or(GenerationError::EmptyOutput)?
        };

        let story = format_story(&raw, &mut self.rng);
        Ok(trim_to_word_count(story, request.word_count))
    }
}

impl StoryGeneratorBuilder {
    pub fn backend(mut self, backend: Backend) -> Self {
        self.backend = backend;
        self
    }

    /// Seed the paragraph-break randomness.
    pub fn seed(mut self, seed: u64) -> Self {
        self.seed = Some(seed);
        self
    }

    /// Provide a generator directly (for testing without a model).
    pub fn with_generator(mut self, generator: Box<dyn TextGenerator>) -> Self {
        self.generator = Some(generator);
        self
    }

    pub fn build(self) -> StoryGenerator {
        let source = match self.generator {
            Some(generator) => Source::Ready(generator),
            None => Source::Backend(self.backend),
        };
        let rng = match self.seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        };
        StoryGenerator { source, rng }
    }
}

/// The story told when the model could not be used. Ends with a period
/// like any other story.
pub fn fallback_story(error: &GenerationError) -> String {
    let mut story = format!("{FALLBACK_STORY} {error}");
    if !story.ends_with('.') {
        story.push('.');
    }
    story
}
