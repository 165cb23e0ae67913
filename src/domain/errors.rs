// ============================================================
// Layer 3 — Typed Errors
// ============================================================
// Two families of failure are fatal and callers need to tell
// them apart from ordinary I/O errors:
//
//   SetupError → bad configuration detected before training starts
//   LossError  → a degenerate batch or a diverged model detected
//                while computing the training loss
//
// Everything else in the application flows through anyhow.

use thiserror::Error;

/// Invalid configuration. Always aborts the run.
#[derive(Debug, Error)]
pub enum SetupError {
    #[error("Invalid RNN cell type '{0}' (expected lstm, gru or basic-tanh)")]
    UnknownCellType(String),

    #[error("Invalid benchmark '{0}' (expected tt or geo)")]
    UnknownBenchmark(String),

    #[error("Grammar and model disagree on {what}: grammar={grammar}, config={config}")]
    GrammarMismatch {
        what:    &'static str,
        grammar: usize,
        config:  usize,
    },

    #[error("Embedding width {found} on line {line} does not match embed_size {expected}")]
    EmbeddingWidth {
        line:     usize,
        expected: usize,
        found:    usize,
    },

    #[error("Malformed grammar rule on line {line}: {reason}")]
    MalformedRule { line: usize, reason: String },
}

/// A loss invariant failed. Training must stop.
#[derive(Debug, Error, PartialEq)]
pub enum LossError {
    #[error("Output length mask selects no position in the batch")]
    EmptyOutputMask,

    #[error("Masked loss is not strictly positive (max per-position loss {0})")]
    NonPositiveLoss(f32),

    #[error("Example {0} predicts the end token at the first output position")]
    EmptyPrediction(usize),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_setup_error_display() {
        let err = SetupError::UnknownCellType("rnn".to_string());
        assert!(format!("{}", err).contains("rnn"));

        let err = SetupError::GrammarMismatch { what: "output_size", grammar: 10, config: 12 };
        let msg = format!("{}", err);
        assert!(msg.contains("output_size"));
        assert!(msg.contains("grammar=10"));
    }

    #[test]
    fn test_loss_error_display() {
        let err = LossError::EmptyPrediction(3);
        assert!(format!("{}", err).contains("Example 3"));
        assert!(format!("{}", LossError::EmptyOutputMask).contains("no position"));
    }
}
