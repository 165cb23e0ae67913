// ============================================================
// Layer 5 — Model Configuration
// ============================================================
// One immutable configuration value is passed to every model
// constructor. Defaults are the hyperparameters the parser was
// tuned with:
//
//   max_length 60, keep-probability 0.7, 300-d embeddings and
//   hidden states, batches of 256, 40 epochs, lr 1e-3, a single
//   LSTM layer with attention, L2 coefficient 0.005.
//
// The four fields without defaults (dictionary_size, output_size,
// start, end) are only known after the dictionary and grammar
// have been loaded (see application::setup).

use burn::prelude::*;
use serde::{Deserialize, Serialize};
use std::{fmt, str::FromStr};

use crate::domain::errors::SetupError;

/// Recurrent cell used by every encoder and decoder layer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum RnnCellType {
    #[serde(rename = "lstm")]
    Lstm,
    #[serde(rename = "gru")]
    Gru,
    #[serde(rename = "basic-tanh")]
    BasicTanh,
}

impl RnnCellType {
    /// Number of stacked gate blocks in the cell's weight matrices.
    pub fn gates(self) -> usize {
        match self {
            RnnCellType::Lstm      => 4,
            RnnCellType::Gru       => 3,
            RnnCellType::BasicTanh => 1,
        }
    }

    pub fn has_cell_state(self) -> bool {
        matches!(self, RnnCellType::Lstm)
    }
}

impl FromStr for RnnCellType {
    type Err = SetupError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "lstm"       => Ok(RnnCellType::Lstm),
            "gru"        => Ok(RnnCellType::Gru),
            "basic-tanh" => Ok(RnnCellType::BasicTanh),
            other        => Err(SetupError::UnknownCellType(other.to_string())),
        }
    }
}

impl fmt::Display for RnnCellType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            RnnCellType::Lstm      => "lstm",
            RnnCellType::Gru       => "gru",
            RnnCellType::BasicTanh => "basic-tanh",
        };
        f.write_str(name)
    }
}

#[derive(Config, Debug)]
pub struct Seq2SeqConfig {
    /// Number of input words (rows of the input embedding matrix)
    pub dictionary_size: usize,
    /// Number of output tokens, as reported by the grammar
    pub output_size: usize,
    /// Start token id, as reported by the grammar
    pub start: usize,
    /// End token id, as reported by the grammar
    pub end: usize,

    /// Padded length of every input and output sequence
    #[config(default = 60)]
    pub max_length: usize,
    /// Keep-probability for dropout on recurrent layer outputs
    #[config(default = 0.7)]
    pub dropout: f64,
    #[config(default = 300)]
    pub embed_size: usize,
    #[config(default = 300)]
    pub hidden_size: usize,
    #[config(default = 256)]
    pub batch_size: usize,
    #[config(default = 40)]
    pub n_epochs: usize,
    #[config(default = 1e-3)]
    pub lr: f64,
    #[config(default = false)]
    pub train_input_embeddings: bool,
    #[config(default = false)]
    pub train_output_embeddings: bool,
    /// Width of trained output embeddings; one-hot embeddings use
    /// `output_size` instead
    #[config(default = 50)]
    pub output_embed_size: usize,
    #[config(default = "RnnCellType::Lstm")]
    pub rnn_cell_type: RnnCellType,
    #[config(default = 1)]
    pub rnn_layers: usize,
    #[config(default = true)]
    pub apply_attention: bool,
    #[config(default = 0.005)]
    pub l2_regularization: f64,
}

impl Seq2SeqConfig {
    /// Width of the vectors the decoder consumes for each output token.
    pub fn output_embed_width(&self) -> usize {
        if self.train_output_embeddings {
            self.output_embed_size
        } else {
            self.output_size
        }
    }
}

// ─── Hyperparameters ──────────────────────────────────────────────────────────
/// The tunable part of [`Seq2SeqConfig`], chosen before the dictionary and
/// grammar are loaded. Defaults match the `#[config(default)]` values above.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Hyperparameters {
    pub max_length:              usize,
    pub dropout:                 f64,
    pub embed_size:              usize,
    pub hidden_size:             usize,
    pub batch_size:              usize,
    pub n_epochs:                usize,
    pub lr:                      f64,
    pub train_input_embeddings:  bool,
    pub train_output_embeddings: bool,
    pub output_embed_size:       usize,
    pub rnn_cell_type:           RnnCellType,
    pub rnn_layers:              usize,
    pub apply_attention:         bool,
    pub l2_regularization:       f64,
}

impl Default for Hyperparameters {
    fn default() -> Self {
        Self {
            max_length:              60,
            dropout:                 0.7,
            embed_size:              300,
            hidden_size:             300,
            batch_size:              256,
            n_epochs:                40,
            lr:                      1e-3,
            train_input_embeddings:  false,
            train_output_embeddings: false,
            output_embed_size:       50,
            rnn_cell_type:           RnnCellType::Lstm,
            rnn_layers:              1,
            apply_attention:         true,
            l2_regularization:       0.005,
        }
    }
}

impl Hyperparameters {
    /// Complete the configuration with the sizes and ids that come from the
    /// dictionary and the grammar. One-hot output embeddings take the width
    /// of the output vocabulary.
    pub fn into_config(self, dictionary_size: usize, output_size: usize, start: usize, end: usize) -> Seq2SeqConfig {
        let output_embed_size = if self.train_output_embeddings {
            self.output_embed_size
        } else {
            output_size
        };
        Seq2SeqConfig::new(dictionary_size, output_size, start, end)
            .with_max_length(self.max_length)
            .with_dropout(self.dropout)
            .with_embed_size(self.embed_size)
            .with_hidden_size(self.hidden_size)
            .with_batch_size(self.batch_size)
            .with_n_epochs(self.n_epochs)
            .with_lr(self.lr)
            .with_train_input_embeddings(self.train_input_embeddings)
            .with_train_output_embeddings(self.train_output_embeddings)
            .with_output_embed_size(output_embed_size)
            .with_rnn_cell_type(self.rnn_cell_type)
            .with_rnn_layers(self.rnn_layers)
            .with_apply_attention(self.apply_attention)
            .with_l2_regularization(self.l2_regularization)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_hyperparameters_match_config_defaults() {
        let from_hyper = Hyperparameters::default().into_config(100, 20, 1, 0);
        let direct = Seq2SeqConfig::new(100, 20, 1, 0).with_output_embed_size(20);
        assert_eq!(
            serde_json::to_value(&from_hyper).unwrap(),
            serde_json::to_value(&direct).unwrap()
        );
    }

    #[test]
    fn test_defaults_match_tuned_hyperparameters() {
        let cfg = Seq2SeqConfig::new(100, 20, 1, 0);
        assert_eq!(cfg.max_length, 60);
        assert_eq!(cfg.hidden_size, 300);
        assert_eq!(cfg.rnn_cell_type, RnnCellType::Lstm);
        assert!((cfg.dropout - 0.7).abs() < 1e-12);
        assert!(cfg.apply_attention);
    }

    #[test]
    fn test_one_hot_output_width() {
        let cfg = Seq2SeqConfig::new(100, 20, 1, 0);
        assert_eq!(cfg.output_embed_width(), 20);
        let cfg = cfg.with_train_output_embeddings(true);
        assert_eq!(cfg.output_embed_width(), 50);
    }

    #[test]
    fn test_cell_type_parse() {
        assert_eq!("gru".parse::<RnnCellType>().unwrap(), RnnCellType::Gru);
        assert_eq!("basic-tanh".parse::<RnnCellType>().unwrap(), RnnCellType::BasicTanh);
        assert!(matches!(
            "rnn".parse::<RnnCellType>(),
            Err(SetupError::UnknownCellType(name)) if name == "rnn"
        ));
        assert_eq!(RnnCellType::Lstm.to_string(), "lstm");
    }
}
