// ============================================================
// Layer 1 — CLI / Presentation Layer
// ============================================================
// Entry point for all user interaction, parsed with `clap`.
// All business logic is delegated to Layer 2 (application).
//
// Two commands are supported:
//   1. `train` — trains a parser for a benchmark
//   2. `parse` — loads a checkpoint and parses one sentence
//
// Reference: Rust Book §7 (Modules), §12 (CLI programs)

pub mod commands;

use anyhow::Result;
use clap::Parser;
use commands::{Commands, ParseArgs, TrainArgs};

#[derive(Parser, Debug)]
#[command(
    name = "nl2tt",
    version,
    about = "Train a grammar-constrained seq2seq semantic parser, then parse sentences."
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

impl Cli {
    /// Route the subcommand to its use case.
    pub fn run(self) -> Result<()> {
        match self.command {
            Commands::Train(args) => run_train(args),
            Commands::Parse(args) => run_parse(args),
        }
    }
}

fn run_train(args: TrainArgs) -> Result<()> {
    use crate::application::train_use_case::TrainUseCase;

    tracing::info!("Starting '{}' training on '{}'", args.benchmark, args.train_file);
    TrainUseCase::new(args.into()).execute()?;

    println!("Training complete. Checkpoint saved.");
    Ok(())
}

fn run_parse(args: ParseArgs) -> Result<()> {
    use crate::application::parse_use_case::ParseUseCase;
    use crate::domain::traits::SentenceParser;

    let parser = ParseUseCase::new(&args.checkpoint_dir)?;
    let program = parser.parse(&args.sentence)?;
    println!("{program}");
    Ok(())
}
