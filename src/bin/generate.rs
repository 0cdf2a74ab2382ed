//! Console front end for greedy generation.
//!
//! Reads a prompt and a token budget (from flags, or interactively when they
//! are not given), runs the ONNX decoder until the budget is spent or the
//! model emits end-of-sequence, and prints the decoded answer.

use anyhow::{Context, Result};
use clap::{Parser, ValueEnum};
use indicatif::{ProgressBar, ProgressStyle};
use onnx_generate::generation::TokenBudget;
use onnx_generate::{Config, Completion, OnnxEngine, Pipeline, Tokenizer, Vocabulary};
use std::io::{self, BufRead, Write};
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(author, version, about)]
struct Args {
    /// Path to a JSON config file
    #[arg(long)]
    config: Option<PathBuf>,

    /// Directory holding the vocabulary and the model
    #[arg(long)]
    resources: Option<PathBuf>,

    /// Vocabulary file, overriding the configured one
    #[arg(long)]
    vocab: Option<PathBuf>,

    /// ONNX model file, overriding the configured one
    #[arg(long)]
    model: Option<PathBuf>,

    /// Prompt text; asked for on stdin when omitted
    #[arg(long)]
    prompt: Option<String>,

    /// Maximum number of tokens to generate; asked for on stdin when omitted
    #[arg(long)]
    max_tokens: Option<String>,

    /// End-of-sequence token id
    #[arg(long, conflicts_with = "no_eos")]
    eos_token: Option<u32>,

    /// Never stop early on an end-of-sequence token
    #[arg(long)]
    no_eos: bool,

    /// Progress indicator shown while generating
    #[arg(long, value_enum, default_value_t = ProgressMode::Percent)]
    progress: ProgressMode,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum)]
enum ProgressMode {
    /// "Generating: 40%"
    Percent,
    /// "Generating..." with animated dots
    Dots,
    None,
}

impl ProgressMode {
    fn bar(self) -> Result<ProgressBar> {
        let bar = match self {
            ProgressMode::Percent => {
                let bar = ProgressBar::new(0);
                bar.set_style(ProgressStyle::with_template("Generating: {percent}%")?);
                bar
            }
            ProgressMode::Dots => {
                let bar = ProgressBar::new_spinner();
                bar.set_style(
                    ProgressStyle::with_template("Generating{spinner}")?
                        .tick_strings(&["", ".", "..", "...", "..."]),
                );
                bar
            }
            ProgressMode::None => ProgressBar::hidden(),
        };
        Ok(bar)
    }
}

/// Application wiring the loaded resources to the console.
struct GenerateApp<'v> {
    pipeline: Pipeline<'v, OnnxEngine>,
    progress: ProgressMode,
}

impl<'v> GenerateApp<'v> {
    fn new(
        config: &Config,
        vocab: &'v Vocabulary,
        engine: OnnxEngine,
        progress: ProgressMode,
    ) -> Self {
        let tokenizer = Tokenizer::new(vocab)
            .with_separator(config.separator_token_id)
            .with_unknown_marker(config.unknown_token.clone());
        let pipeline = Pipeline::new(tokenizer, engine)
            .with_cleanup(config.cleanup())
            .with_options(config.generation_options());
        Self { pipeline, progress }
    }

    fn generate(&mut self, prompt: &str, budget: &str) -> Result<Completion> {
        let mut bar = self.progress.bar()?;
        let completion = self.pipeline.run(prompt, budget, &mut bar)?;
        Ok(completion)
    }
}

fn ask(label: &str) -> Result<String> {
    print!("{label}");
    io::stdout().flush()?;
    let mut line = String::new();
    io::stdin()
        .lock()
        .read_line(&mut line)
        .context("failed to read from stdin")?;
    Ok(line.trim_end_matches(&['\r', '\n'][..]).to_string())
}

fn load_config(args: &Args) -> Result<Config> {
    let mut config = match &args.config {
        Some(path) => Config::load(path)
            .with_context(|| format!("failed to load config {}", path.display()))?,
        None => Config::default(),
    };
    if let Some(dir) = &args.resources {
        config.resource_dir = dir.clone();
    }
    if let Some(id) = args.eos_token {
        config.eos_token_id = Some(id);
    }
    if args.no_eos {
        config.eos_token_id = None;
    }
    Ok(config)
}

fn main() -> Result<()> {
    env_logger::init();
    let args = Args::parse();
    let config = load_config(&args)?;

    let vocab_path = args.vocab.clone().unwrap_or_else(|| config.vocab_path());
    let vocab = Vocabulary::load(&vocab_path).context("failed to load the vocabulary")?;

    let prompt = match args.prompt {
        Some(prompt) => prompt,
        None => ask("Prompt (English only): ")?,
    };
    let budget = match args.max_tokens {
        Some(budget) => budget,
        None => ask("Max tokens: ")?,
    };
    // The model is loaded only once the budget is known to be valid.
    TokenBudget::parse(&budget)?;

    let model_path = args.model.clone().unwrap_or_else(|| config.model_path());
    let engine = OnnxEngine::load(&model_path).context("failed to start the model, try again")?;
    let mut app = GenerateApp::new(&config, &vocab, engine, args.progress);

    let completion = app.generate(&prompt, &budget)?;
    println!("\nPrompt: {}\nResponse: {}", completion.prompt, completion.response);
    Ok(())
}
