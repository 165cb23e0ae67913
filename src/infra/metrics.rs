// ============================================================
// Layer 6 — Metrics Logger
// ============================================================
// Records training metrics to a CSV file after each epoch.
//
// Metrics recorded per epoch:
//   - epoch:        the epoch number (1, 2, 3, ...)
//   - train_loss:   mean batch loss (cross-entropy + L2)
//   - dev_loss:     mean teacher-forced cross-entropy on dev
//   - dev_accuracy: fraction of dev sentences whose decoded
//                   program equals the gold program exactly
//
// Output file: checkpoints/metrics.csv
//
// Example CSV output:
//   epoch,train_loss,dev_loss,dev_accuracy
//   1,4.812300,3.901200,0.021000
//   2,2.977100,2.644300,0.118000
//   ...
//
// If dev_loss rises while train_loss keeps falling the model
// is overfitting; dev_accuracy is the number to report.
//
// Reference: Rust Book §12 (I/O and File Handling)

use anyhow::Result;
use std::{
    fs::{self, OpenOptions},
    io::Write,
    path::{Path, PathBuf},
};
use serde::{Deserialize, Serialize};

const HEADER: &str = "epoch,train_loss,dev_loss,dev_accuracy";

/// One row of metrics data for a single training epoch
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EpochMetrics {
    pub epoch: usize,

    /// Includes the L2 penalty
    pub train_loss: f64,

    pub dev_loss: f64,

    /// Range: [0.0, 1.0]
    pub dev_accuracy: f64,
}

impl EpochMetrics {
    pub fn new(epoch: usize, train_loss: f64, dev_loss: f64, dev_accuracy: f64) -> Self {
        Self { epoch, train_loss, dev_loss, dev_accuracy }
    }

    /// True if this epoch beat the previous best dev accuracy
    pub fn is_improvement(&self, best_accuracy: f64) -> bool {
        self.dev_accuracy > best_accuracy
    }
}

/// Appends epoch metrics to `{dir}/metrics.csv`.
pub struct MetricsLogger {
    csv_path: PathBuf,
}

impl MetricsLogger {
    /// Writes the CSV header if the file doesn't exist yet, so a resumed
    /// run keeps appending to the same log.
    pub fn new(dir: impl AsRef<Path>) -> Result<Self> {
        let dir = dir.as_ref();
        fs::create_dir_all(dir)?;

        let csv_path = dir.join("metrics.csv");
        if !csv_path.exists() {
            let mut f = fs::File::create(&csv_path)?;
            writeln!(f, "{HEADER}")?;
            tracing::debug!("Created metrics CSV: '{}'", csv_path.display());
        }

        Ok(Self { csv_path })
    }

    pub fn log(&self, m: &EpochMetrics) -> Result<()> {
        let mut f = OpenOptions::new().append(true).open(&self.csv_path)?;

        writeln!(
            f,
            "{},{:.6},{:.6},{:.6}",
            m.epoch, m.train_loss, m.dev_loss, m.dev_accuracy,
        )?;

        tracing::debug!(
            "Logged epoch {} metrics: train_loss={:.4}, dev_loss={:.4}, dev_accuracy={:.4}",
            m.epoch,
            m.train_loss,
            m.dev_loss,
            m.dev_accuracy,
        );
        Ok(())
    }

    pub fn csv_path(&self) -> &Path {
        &self.csv_path
    }
}
