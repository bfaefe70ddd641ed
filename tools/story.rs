/// Story — generate a themed short story.
///
/// Usage: story [--theme <name>] [--words <n>] [--output <file>]
///              [--backend inference|markov] [--model <id>] [--endpoint <url>]
///              [--markov-model <file.ron>] [--seed <n>] [--list-themes]
///
/// Prints `{"story": ..., "word_count": ..., "theme": ...}` on stdout, or
/// writes the bare story to `--output`. Logs go to stderr (`RUST_LOG`).
use std::path::PathBuf;

use anyhow::Context;
use clap::{Parser, ValueEnum};
use story_engine::core::backend::Backend;
use story_engine::core::inference::{self, DEFAULT_ENDPOINT, DEFAULT_MODEL};
use story_engine::core::pipeline::StoryGenerator;
use story_engine::schema::story::{GenerationRequest, DEFAULT_THEME, DEFAULT_WORD_COUNT};
use story_engine::schema::theme::{Theme, ThemeInfo};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

const DEFAULT_LOG_FILTER: &str = "warn";
const FAILURE_LOG_FILTER: &str = "story_engine=error";

#[derive(Debug, Parser)]
#[command(name = "story")]
#[command(version, about = "Generate a themed story", long_about = None)]
struct Cli {
    /// Theme of the story
    #[arg(long, default_value = DEFAULT_THEME)]
    theme: String,

    /// Target word count
    #[arg(long, default_value_t = DEFAULT_WORD_COUNT)]
    words: usize,

    /// Output file path (optional)
    #[arg(long)]
    output: Option<PathBuf>,

    /// Text-generation backend
    #[arg(long, value_enum, default_value_t = BackendKind::Inference)]
    backend: BackendKind,

    /// Hosted model id
    #[arg(long, default_value = DEFAULT_MODEL)]
    model: String,

    /// Inference API base URL [default: $HF_INFERENCE_ENDPOINT or the public API]
    #[arg(long)]
    endpoint: Option<String>,

    /// Markov model file, required by the markov backend
    #[arg(long, required_if_eq("backend", "markov"))]
    markov_model: Option<PathBuf>,

    /// Seed for paragraph breaks and local sampling
    #[arg(long)]
    seed: Option<u64>,

    /// Print the theme table as JSON and exit
    #[arg(long)]
    list_themes: bool,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum)]
enum BackendKind {
    Inference,
    Markov,
}

impl Cli {
    fn backend(&self) -> Backend {
        match self.backend {
            BackendKind::Inference => Backend::Inference {
                model: self.model.clone(),
                endpoint: self
                    .endpoint
                    .clone()
                    .or_else(|| std::env::var(inference::ENDPOINT_VAR).ok())
                    .unwrap_or_else(|| DEFAULT_ENDPOINT.to_string()),
                api_token: std::env::var(inference::API_TOKEN_VAR).ok(),
            },
            BackendKind::Markov => Backend::Markov {
                model_path: self.markov_model.clone().unwrap_or_default(),
                seed: self.seed,
            },
        }
    }
}

fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    // Generation failures are always reported; an explicit `story_engine`
    // directive in RUST_LOG still takes precedence.
    let directives = std::env::var("RUST_LOG")
        .ok()
        .filter(|v| !v.trim().is_empty())
        .unwrap_or_else(|| DEFAULT_LOG_FILTER.to_string());
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_new(format!("{FAILURE_LOG_FILTER},{directives}"))
                .unwrap_or_else(|_| DEFAULT_LOG_FILTER.into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let cli = Cli::parse();

    if cli.list_themes {
        let themes: Vec<ThemeInfo> = Theme::ALL.into_iter().map(ThemeInfo::from).collect();
        println!("{}", serde_json::to_string_pretty(&themes)?);
        return Ok(());
    }

    let mut builder = StoryGenerator::builder().backend(cli.backend());
    if let Some(seed) = cli.seed {
        builder = builder.seed(seed);
    }
    let mut generator = builder.build();

    let request = GenerationRequest::new(cli.theme.clone(), cli.words);
    let result = generator.generate(&request);

    match &cli.output {
        Some(path) => {
            std::fs::write(path, &result.story)
                .with_context(|| format!("failed to write story to '{}'", path.display()))?;
            tracing::info!(path = %path.display(), words = result.word_count, "story written");
        }
        None => println!("{}", serde_json::to_string(&result)?),
    }

    Ok(())
}
