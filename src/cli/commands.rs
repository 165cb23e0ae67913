// ============================================================
// Layer 1 — CLI Commands and Arguments
// ============================================================
// Defines the two subcommands, `train` and `parse`, and all
// their flags. Hyperparameter defaults match
// Hyperparameters::default().
//
// Reference: Rust Book §12 (Building a CLI Program)

use clap::{Args, Subcommand};

use crate::application::train_use_case::TrainConfig;
use crate::ml::config::{Hyperparameters, RnnCellType};

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Train a parser for a benchmark
    Train(TrainArgs),

    /// Parse a sentence with a trained checkpoint
    Parse(ParseArgs),
}

/// All arguments for the `train` command.
#[derive(Args, Debug)]
pub struct TrainArgs {
    /// Benchmark: tt (ThingTalk) or geo (Geoqueries)
    #[arg(long, default_value = "tt")]
    pub benchmark: String,

    /// Input dictionary, one word per line
    #[arg(long)]
    pub dictionary: String,

    /// GloVe-style embeddings; random vectors if omitted
    #[arg(long)]
    pub embeddings: Option<String>,

    /// Thingpedia rules (tt) or output token list (geo)
    #[arg(long)]
    pub grammar: Option<String>,

    /// Training examples: sentence<TAB>program per line
    #[arg(long)]
    pub train_file: String,

    /// Dev examples; split off the training file if omitted
    #[arg(long)]
    pub dev_file: Option<String>,

    #[arg(long, default_value = "checkpoints")]
    pub checkpoint_dir: String,

    #[arg(long, default_value_t = 0.1)]
    pub dev_fraction: f64,

    #[arg(long, default_value_t = 42)]
    pub seed: u64,

    /// Maximum sentence and program length
    #[arg(long, default_value_t = 60)]
    pub max_length: usize,

    /// Keep probability of the recurrent outputs during training
    #[arg(long, default_value_t = 0.7)]
    pub dropout: f64,

    #[arg(long, default_value_t = 300)]
    pub embed_size: usize,

    #[arg(long, default_value_t = 300)]
    pub hidden_size: usize,

    #[arg(long, default_value_t = 256)]
    pub batch_size: usize,

    #[arg(long, default_value_t = 40)]
    pub epochs: usize,

    #[arg(long, default_value_t = 1e-3)]
    pub lr: f64,

    /// Fine-tune the pretrained input embeddings
    #[arg(long)]
    pub train_input_embeddings: bool,

    /// Learn output embeddings instead of one-hot vectors
    #[arg(long)]
    pub train_output_embeddings: bool,

    /// Width of learned output embeddings
    #[arg(long, default_value_t = 50)]
    pub output_embed_size: usize,

    /// lstm, gru or basic-tanh
    #[arg(long, default_value = "lstm")]
    pub rnn_cell_type: RnnCellType,

    #[arg(long, default_value_t = 1)]
    pub rnn_layers: usize,

    /// Disable Luong attention in the decoder
    #[arg(long)]
    pub no_attention: bool,

    #[arg(long, default_value_t = 0.005)]
    pub l2_regularization: f64,
}

/// The boundary between Layer 1 and Layer 2: the application layer
/// never sees clap types.
impl From<TrainArgs> for TrainConfig {
    fn from(a: TrainArgs) -> Self {
        TrainConfig {
            benchmark:      a.benchmark,
            dictionary:     a.dictionary,
            embeddings:     a.embeddings,
            grammar:        a.grammar,
            train_file:     a.train_file,
            dev_file:       a.dev_file,
            checkpoint_dir: a.checkpoint_dir,
            dev_fraction:   a.dev_fraction,
            seed:           a.seed,
            hyper: Hyperparameters {
                max_length:              a.max_length,
                dropout:                 a.dropout,
                embed_size:              a.embed_size,
                hidden_size:             a.hidden_size,
                batch_size:              a.batch_size,
                n_epochs:                a.epochs,
                lr:                      a.lr,
                train_input_embeddings:  a.train_input_embeddings,
                train_output_embeddings: a.train_output_embeddings,
                output_embed_size:       a.output_embed_size,
                rnn_cell_type:           a.rnn_cell_type,
                rnn_layers:              a.rnn_layers,
                apply_attention:         !a.no_attention,
                l2_regularization:       a.l2_regularization,
            },
        }
    }
}

/// All arguments for the `parse` command
#[derive(Args, Debug)]
pub struct ParseArgs {
    /// The sentence to parse (already tokenised, placeholders kept)
    #[arg(long)]
    pub sentence: String,

    /// Directory where checkpoints were saved during training
    #[arg(long, default_value = "checkpoints")]
    pub checkpoint_dir: String,
}

// ─── Unit Tests ───────────────────────────────────────────────────────────────
#[cfg(test)]
mod tests {
    use super::*;
    use crate::cli::Cli;
    use clap::Parser;

    #[test]
    fn test_train_defaults_match_hyperparameters() {
        let cli = Cli::try_parse_from([
            "nl2tt", "train", "--dictionary", "dict.txt", "--train-file", "train.tsv",
        ])
        .unwrap();
        let Commands::Train(args) = cli.command else { panic!("expected train") };
        let cfg = TrainConfig::from(args);
        assert_eq!(cfg.hyper, Hyperparameters::default());
        assert_eq!(cfg.benchmark, "tt");
        assert!(cfg.dev_file.is_none());
    }

    #[test]
    fn test_train_flags_reach_config() {
        let cli = Cli::try_parse_from([
            "nl2tt", "train", "--benchmark", "geo", "--dictionary", "d", "--train-file", "t",
            "--rnn-cell-type", "gru", "--no-attention", "--epochs", "3",
        ])
        .unwrap();
        let Commands::Train(args) = cli.command else { panic!("expected train") };
        let cfg = TrainConfig::from(args);
        assert_eq!(cfg.hyper.rnn_cell_type, RnnCellType::Gru);
        assert!(!cfg.hyper.apply_attention);
        assert_eq!(cfg.hyper.n_epochs, 3);
    }

    #[test]
    fn test_bad_cell_type_is_rejected() {
        let result = Cli::try_parse_from([
            "nl2tt", "train", "--dictionary", "d", "--train-file", "t", "--rnn-cell-type", "rnn",
        ]);
        assert!(result.is_err());
    }
}
