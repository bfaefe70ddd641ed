/// Corpus Trainer — trains Markov models for the offline story backend.
///
/// Usage: corpus_trainer --input <file.txt> --output <model.ron> --ngram <2|3|4>
use std::path::PathBuf;

use anyhow::Context;
use clap::Parser;
use story_engine::core::markov::{save_model, MarkovTrainer};

#[derive(Debug, Parser)]
#[command(name = "corpus_trainer")]
#[command(version, about = "Train a Markov model from a text corpus", long_about = None)]
struct Cli {
    /// Plain-text corpus, one or more sentences per line
    #[arg(long)]
    input: PathBuf,

    /// Where to write the RON model
    #[arg(long)]
    output: PathBuf,

    /// N-gram depth
    #[arg(long, default_value_t = 2, value_parser = clap::value_parser!(u64).range(2..=4))]
    ngram: u64,
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let text = std::fs::read_to_string(&cli.input)
        .with_context(|| format!("failed to read input file '{}'", cli.input.display()))?;

    println!("Training {}-gram model from '{}'...", cli.ngram, cli.input.display());
    let model = MarkovTrainer::train(&text, cli.ngram as usize)?;

    let transition_count: usize = model.transitions.values().map(|v| v.len()).sum();
    println!(
        "Model trained: {} unique prefixes, {} transitions",
        model.transitions.len(),
        transition_count
    );

    save_model(&model, &cli.output)
        .with_context(|| format!("failed to save model to '{}'", cli.output.display()))?;

    println!("Model saved to '{}'", cli.output.display());
    Ok(())
}
