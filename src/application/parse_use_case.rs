// ============================================================
// Layer 2 — Parse Use Case
// ============================================================
// Rebuilds everything training saved in the checkpoint
// directory and parses sentences with it:
//
//   run_config.json  → benchmark + grammar file → grammar
//   tokenizer.json   → input vocabulary
//   model_config.json + model_epoch_N → model weights
//
// The grammar is rebuilt from the same file the model was
// trained with, so output ids line up with the checkpoint.

use anyhow::{Context, Result};
use std::path::Path;

use crate::application::setup::{Benchmark, ParserConfig};
use crate::domain::traits::SentenceParser;
use crate::infra::{checkpoint::CheckpointManager, tokenizer_store::TokenizerStore};
use crate::ml::inferencer::{InferBackend, Inferencer};

pub struct ParseUseCase {
    inferencer: Inferencer<InferBackend>,
}

impl ParseUseCase {
    pub fn new(checkpoint_dir: impl AsRef<Path>) -> Result<Self> {
        let checkpoint_dir = checkpoint_dir.as_ref();
        let ckpt = CheckpointManager::new(checkpoint_dir);
        let run = ckpt.load_run_config()?;

        let benchmark: Benchmark = run.benchmark.parse()?;
        let grammar = benchmark
            .load_grammar(run.grammar.as_deref().map(Path::new))
            .context("Cannot rebuild the grammar the model was trained with")?;
        let parser = ParserConfig::new(benchmark, ckpt.load_model_config()?, grammar)?;

        let vocab = TokenizerStore::new(checkpoint_dir).load()?;
        if vocab.len() != parser.model.dictionary_size {
            anyhow::bail!(
                "Saved vocabulary has {} words but the model expects {}",
                vocab.len(),
                parser.model.dictionary_size
            );
        }

        let inferencer = Inferencer::from_checkpoint(&ckpt, vocab, parser.grammar)?;
        Ok(Self { inferencer })
    }
}

impl SentenceParser for ParseUseCase {
    fn parse(&self, sentence: &str) -> Result<String> {
        self.inferencer.predict_text(sentence)
    }
}
