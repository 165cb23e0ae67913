// ============================================================
// Layer 6 — Checkpoint Manager
// ============================================================
// Saves and restores model weights using Burn's CompactRecorder.
//
// What gets saved:
//   1. Model weights (.mpk.gz file)  — after every epoch
//   2. latest_epoch.json             — which epoch was last saved
//   3. run_config.json               — paths, seed, hyperparameters
//   4. model_config.json             — the assembled Seq2SeqConfig
//
// The parser needs both configs: run_config.json says which
// benchmark and grammar file to rebuild, model_config.json gives
// the exact layer sizes to rebuild the model before loading the
// weights into it.
//
// File naming convention:
//   checkpoints/
//     model_epoch_1.mpk.gz
//     model_epoch_2.mpk.gz
//     ...
//     latest_epoch.json
//     run_config.json
//     model_config.json
//
// Reference: Burn Book §5 (Records and Checkpointing)

use anyhow::{Context, Result};
use std::{fs, path::{Path, PathBuf}};
use burn::{
    config::Config,
    prelude::*,
    record::{CompactRecorder, Recorder},
};

use crate::application::train_use_case::TrainConfig;
use crate::ml::config::Seq2SeqConfig;
use crate::ml::model::Seq2SeqModel;

const LATEST_EPOCH: &str = "latest_epoch.json";
const RUN_CONFIG:   &str = "run_config.json";
const MODEL_CONFIG: &str = "model_config.json";

/// Manages saving and loading of checkpoints in one directory.
pub struct CheckpointManager {
    dir: PathBuf,
}

impl CheckpointManager {
    /// Creates the directory if it doesn't already exist.
    pub fn new(dir: impl AsRef<Path>) -> Self {
        let dir = dir.as_ref().to_path_buf();
        fs::create_dir_all(&dir).ok();
        Self { dir }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Write `{dir}/model_epoch_{epoch}.mpk.gz` and move the latest pointer.
    pub fn save_model<B: Backend>(&self, model: &Seq2SeqModel<B>, epoch: usize) -> Result<()> {
        // Recorder adds the extension
        let path = self.dir.join(format!("model_epoch_{epoch}"));

        CompactRecorder::new()
            .record(model.clone().into_record(), path.clone())
            .with_context(|| format!("Failed to save checkpoint to '{}'", path.display()))?;

        fs::write(self.dir.join(LATEST_EPOCH), serde_json::to_string(&epoch)?)
            .with_context(|| format!("Failed to write {LATEST_EPOCH}"))?;

        tracing::debug!("Saved checkpoint: epoch {}", epoch);
        Ok(())
    }

    /// Restore the latest saved weights into `model`.
    /// The architecture must match the one that was saved.
    pub fn load_model<B: Backend>(
        &self,
        model:  Seq2SeqModel<B>,
        device: &B::Device,
    ) -> Result<Seq2SeqModel<B>> {
        let epoch = self.latest_epoch()?;
        let path  = self.dir.join(format!("model_epoch_{epoch}"));

        tracing::info!("Loading checkpoint from epoch {}", epoch);

        let record = CompactRecorder::new()
            .load(path.clone(), device)
            .with_context(|| {
                format!("Cannot load checkpoint '{}'. Have you trained the model first?", path.display())
            })?;

        Ok(model.load_record(record))
    }

    pub fn save_run_config(&self, cfg: &TrainConfig) -> Result<()> {
        let path = self.dir.join(RUN_CONFIG);
        fs::write(&path, serde_json::to_string_pretty(cfg)?)
            .with_context(|| format!("Cannot write config to '{}'", path.display()))?;
        tracing::debug!("Saved run config to '{}'", path.display());
        Ok(())
    }

    pub fn load_run_config(&self) -> Result<TrainConfig> {
        let path = self.dir.join(RUN_CONFIG);
        let json = fs::read_to_string(&path).with_context(|| {
            format!(
                "Cannot read config from '{}'. Make sure you have run 'train' before 'parse'.",
                path.display()
            )
        })?;
        serde_json::from_str(&json).with_context(|| format!("Invalid run config '{}'", path.display()))
    }

    pub fn save_model_config(&self, cfg: &Seq2SeqConfig) -> Result<()> {
        let path = self.dir.join(MODEL_CONFIG);
        cfg.save(&path)
            .with_context(|| format!("Cannot write model config to '{}'", path.display()))
    }

    pub fn load_model_config(&self) -> Result<Seq2SeqConfig> {
        let path = self.dir.join(MODEL_CONFIG);
        Seq2SeqConfig::load(&path)
            .map_err(|e| anyhow::anyhow!("Cannot load model config '{}': {e}", path.display()))
    }

    /// Epoch number of the most recent checkpoint.
    pub fn latest_epoch(&self) -> Result<usize> {
        let s = fs::read_to_string(self.dir.join(LATEST_EPOCH))
            .with_context(|| format!("Cannot find '{LATEST_EPOCH}'. Have you run 'train' first?"))?;
        Ok(serde_json::from_str::<usize>(&s)?)
    }
}
