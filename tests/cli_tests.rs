/// CLI tests — drive the `story` binary end to end with the offline backend.

use std::path::PathBuf;
use std::process::{Command, Output};

use story_engine::core::markov::{save_model, MarkovTrainer};
use story_engine::schema::story::StoryResult;

fn tmp(name: &str) -> PathBuf {
    PathBuf::from(env!("CARGO_TARGET_TMPDIR")).join(name)
}

fn trained_model(name: &str) -> PathBuf {
    let corpus = std::fs::read_to_string("tests/fixtures/story_corpus.txt").unwrap();
    let model = MarkovTrainer::train(&corpus, 2).unwrap();
    let path = tmp(name);
    save_model(&model, &path).unwrap();
    path
}

fn story(args: &[&str]) -> Output {
    Command::new(env!("CARGO_BIN_EXE_story"))
        .args(args)
        .env_remove("RUST_LOG")
        .output()
        .expect("failed to run story binary")
}

fn stdout_json(output: &Output) -> StoryResult {
    serde_json::from_slice(&output.stdout).unwrap_or_else(|e| {
        panic!(
            "stdout is not a story result ({}): {}",
            e,
            String::from_utf8_lossy(&output.stdout)
        )
    })
}

#[test]
fn prints_json_result() {
    let model = trained_model("cli_json_model.ron");
    let output = story(&[
        "--theme",
        "SciFi",
        "--words",
        "10",
        "--backend",
        "markov",
        "--markov-model",
        model.to_str().unwrap(),
        "--seed",
        "4",
    ]);

    assert!(output.status.success());
    let result = stdout_json(&output);
    assert_eq!(result.theme, "SciFi");
    assert_eq!(result.word_count, 10);
    assert!(result.story.starts_with("The colony on Mars"));
}

#[test]
fn writes_raw_story_to_file() {
    let model = trained_model("cli_file_model.ron");
    let out = tmp("cli_story.txt");
    std::fs::write(&out, "stale contents that must be replaced").unwrap();

    let output = story(&[
        "--theme",
        "horror",
        "--words",
        "25",
        "--backend",
        "markov",
        "--markov-model",
        model.to_str().unwrap(),
        "--output",
        out.to_str().unwrap(),
    ]);

    assert!(output.status.success());
    assert!(output.stdout.is_empty());
    let text = std::fs::read_to_string(&out).unwrap();
    assert!(text.starts_with("The old house at the end of the street"));
    assert!(text.split_whitespace().count() <= 25);
    assert!(!text.contains("stale"));
}

#[test]
fn missing_model_still_emits_json_and_succeeds() {
    let output = story(&[
        "--words",
        "50",
        "--backend",
        "markov",
        "--markov-model",
        tmp("cli_missing_model.ron").to_str().unwrap(),
    ]);

    assert!(output.status.success());
    let result = stdout_json(&output);
    assert_eq!(result.theme, "fantasy");
    assert!(result
        .story
        .starts_with("Once upon a time, there was an error in story generation."));
    assert!(result.story.contains("IO error"));
    assert!(result.story.ends_with('.'), "{:?}", result.story);

    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("Error generating story"), "stderr: {}", stderr);
}

#[test]
fn generation_failure_reaches_stderr_with_logging_off() {
    let output = Command::new(env!("CARGO_BIN_EXE_story"))
        .args([
            "--backend",
            "markov",
            "--markov-model",
            tmp("cli_missing_model_quiet.ron").to_str().unwrap(),
        ])
        .env("RUST_LOG", "off")
        .output()
        .expect("failed to run story binary");

    assert!(output.status.success());
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("Error generating story"), "stderr: {}", stderr);
    assert!(stdout_json(&output).story.contains("IO error"));
}

#[test]
fn lists_themes() {
    let output = story(&["--list-themes"]);
    assert!(output.status.success());

    let themes: Vec<serde_json::Value> = serde_json::from_slice(&output.stdout).unwrap();
    assert_eq!(themes.len(), 7);
    assert_eq!(themes[0]["name"], "fantasy");
    assert_eq!(themes[1]["name"], "scifi");
}

#[test]
fn markov_backend_requires_model_path() {
    let output = story(&["--backend", "markov"]);
    assert!(!output.status.success());
}
