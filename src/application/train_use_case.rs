// ============================================================
// Layer 2 — TrainUseCase
// ============================================================
// Orchestrates the full training pipeline in order:
//
//   Step 1: Benchmark, grammar, dictionary, embeddings (setup)
//   Step 2: Load TSV training examples                 (Layer 4 - data)
//   Step 3: Encode to padded id sequences              (Layer 4 - data)
//   Step 4: Dev set from file, or split off training   (Layer 4 - data)
//   Step 5: Save configs and input vocabulary          (Layer 6 - infra)
//   Step 6: Run training loop                          (Layer 5 - ml)
//
// Reference: Burn Book §5 (Training)

use anyhow::Result;
use serde::{Deserialize, Serialize};
use std::path::Path;

use crate::application::setup::initialize;
use crate::data::{
    dataset::{encode_examples, Seq2SeqDataset},
    loader::TsvExampleLoader,
    splitter::split_train_dev,
};
use crate::domain::traits::ExampleSource;
use crate::infra::{
    checkpoint::CheckpointManager,
    metrics::MetricsLogger,
    tokenizer_store::TokenizerStore,
};
use crate::ml::config::Hyperparameters;
use crate::ml::trainer::run_training;

// ─── Training Configuration ──────────────────────────────────────────────────
// Everything needed to repeat a run. Saved as run_config.json so the
// parser knows which benchmark and grammar file the model was trained on.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrainConfig {
    pub benchmark:      String,
    pub dictionary:     String,
    pub embeddings:     Option<String>,
    pub grammar:        Option<String>,
    pub train_file:     String,
    pub dev_file:       Option<String>,
    pub checkpoint_dir: String,
    /// Share of the training file held out when there is no dev file
    pub dev_fraction:   f64,
    pub seed:           u64,
    pub hyper:          Hyperparameters,
}

impl Default for TrainConfig {
    fn default() -> Self {
        Self {
            benchmark:      "tt".to_string(),
            dictionary:     "input_words.txt".to_string(),
            embeddings:     None,
            grammar:        None,
            train_file:     "train.tsv".to_string(),
            dev_file:       None,
            checkpoint_dir: "checkpoints".to_string(),
            dev_fraction:   0.1,
            seed:           42,
            hyper:          Hyperparameters::default(),
        }
    }
}

// ─── TrainUseCase ─────────────────────────────────────────────────────────────
pub struct TrainUseCase {
    config: TrainConfig,
}

impl TrainUseCase {
    pub fn new(config: TrainConfig) -> Self {
        Self { config }
    }

    /// Execute the full training pipeline end to end
    pub fn execute(&self) -> Result<()> {
        let cfg = &self.config;

        // ── Step 1: Configuration, grammar, vocabulary, embeddings ───────────
        let (parser, vocab, embeddings) = initialize(
            &cfg.benchmark,
            Path::new(&cfg.dictionary),
            cfg.embeddings.as_deref().map(Path::new),
            cfg.grammar.as_deref().map(Path::new),
            cfg.hyper.clone(),
            cfg.seed,
        )?;
        let grammar = parser.grammar.as_ref();
        let max_length = parser.model.max_length;

        // ── Step 2–3: Load and encode training examples ──────────────────────
        let examples = TsvExampleLoader::new(&cfg.train_file).load_all()?;
        let samples = encode_examples(&examples, &vocab, grammar, max_length)?;

        // ── Step 4: Dev set ──────────────────────────────────────────────────
        let (train_samples, dev_samples) = match &cfg.dev_file {
            Some(path) => {
                let dev_examples = TsvExampleLoader::new(path).load_all()?;
                (samples, encode_examples(&dev_examples, &vocab, grammar, max_length)?)
            }
            None => split_train_dev(samples, 1.0 - cfg.dev_fraction, cfg.seed),
        };
        if train_samples.is_empty() {
            anyhow::bail!("No usable training examples in '{}'", cfg.train_file);
        }
        tracing::info!(
            "Split: {} train, {} dev",
            train_samples.len(),
            dev_samples.len()
        );

        // ── Step 5: Persist what the parser needs to rebuild the model ───────
        let ckpt_manager = CheckpointManager::new(&cfg.checkpoint_dir);
        ckpt_manager.save_run_config(cfg)?;
        ckpt_manager.save_model_config(&parser.model)?;
        TokenizerStore::new(&cfg.checkpoint_dir).save(&vocab)?;
        let metrics = MetricsLogger::new(&cfg.checkpoint_dir)?;

        // ── Step 6: Run training loop (Layer 5) ──────────────────────────────
        run_training(
            &parser.model,
            grammar,
            &embeddings,
            Seq2SeqDataset::new(train_samples),
            Seq2SeqDataset::new(dev_samples),
            cfg.seed,
            &ckpt_manager,
            &metrics,
        )
    }
}
