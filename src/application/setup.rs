// ============================================================
// Layer 2 — Setup
// ============================================================
// Assembles everything a run needs before any tensor exists:
//
//   benchmark name ──▶ Benchmark ──▶ grammar (Arc<dyn Grammar>)
//   dictionary file ─▶ InputVocabulary
//   embeddings file ─▶ EmbeddingMatrix (aligned to the vocabulary)
//   Hyperparameters + sizes/ids ──▶ Seq2SeqConfig
//
// Every check here is fatal: an unknown benchmark or cell type,
// or a grammar that disagrees with the model configuration,
// stops the run before training starts.

use anyhow::Result;
use std::{
    fmt,
    path::{Path, PathBuf},
    str::FromStr,
    sync::Arc,
};

use crate::data::{
    dictionary::InputVocabulary,
    embeddings::{load_embeddings, EmbeddingMatrix},
};
use crate::domain::errors::SetupError;
use crate::domain::grammar::Grammar;
use crate::grammar::{SimpleGrammar, ThingtalkGrammar};
use crate::ml::config::{Hyperparameters, Seq2SeqConfig};

// ─── Benchmark ────────────────────────────────────────────────────────────────
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Benchmark {
    /// ThingTalk programs, grammar compiled from Thingpedia rules
    Thingtalk,
    /// Geoqueries, flat output token list
    Geo,
}

impl Benchmark {
    pub fn name(self) -> &'static str {
        match self {
            Benchmark::Thingtalk => "tt",
            Benchmark::Geo => "geo",
        }
    }

    /// Grammar file used when none is given on the command line.
    pub fn default_grammar_path(self) -> PathBuf {
        match self {
            Benchmark::Thingtalk => PathBuf::from("thingpedia.txt"),
            Benchmark::Geo => PathBuf::from("geoqueries/output_tokens.txt"),
        }
    }

    pub fn load_grammar(self, path: Option<&Path>) -> Result<Arc<dyn Grammar>> {
        let path = path.map(Path::to_path_buf).unwrap_or_else(|| self.default_grammar_path());
        let grammar: Arc<dyn Grammar> = match self {
            Benchmark::Thingtalk => Arc::new(ThingtalkGrammar::from_file(&path)?),
            Benchmark::Geo => Arc::new(SimpleGrammar::from_file(&path)?),
        };
        Ok(grammar)
    }
}

impl FromStr for Benchmark {
    type Err = SetupError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "tt" | "thingtalk" => Ok(Benchmark::Thingtalk),
            "geo" | "geoqueries" => Ok(Benchmark::Geo),
            other => Err(SetupError::UnknownBenchmark(other.to_string())),
        }
    }
}

impl fmt::Display for Benchmark {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

// ─── ParserConfig ─────────────────────────────────────────────────────────────
/// Model configuration together with the grammar it was sized for.
#[derive(Clone)]
pub struct ParserConfig {
    pub benchmark: Benchmark,
    pub model:     Seq2SeqConfig,
    pub grammar:   Arc<dyn Grammar>,
}

impl fmt::Debug for ParserConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ParserConfig")
            .field("benchmark", &self.benchmark)
            .field("model", &self.model)
            .field("output_size", &self.grammar.output_size())
            .finish()
    }
}

impl ParserConfig {
    /// Pair a model configuration with a grammar, checking that they agree
    /// on the output vocabulary size and the start/end ids.
    pub fn new(benchmark: Benchmark, model: Seq2SeqConfig, grammar: Arc<dyn Grammar>) -> Result<Self, SetupError> {
        let checks = [
            ("output_size", grammar.output_size(), model.output_size),
            ("start", grammar.start(), model.start),
            ("end", grammar.end(), model.end),
        ];
        for (what, grammar, config) in checks {
            if grammar != config {
                return Err(SetupError::GrammarMismatch { what, grammar, config });
            }
        }
        Ok(Self { benchmark, model, grammar })
    }
}

// ─── initialize ───────────────────────────────────────────────────────────────
/// Assemble a run. Without an embeddings file every dictionary row is
/// drawn at random from `seed`.
pub fn initialize(
    benchmark: &str,
    input_words: &Path,
    embedding_file: Option<&Path>,
    grammar_path: Option<&Path>,
    hyper: Hyperparameters,
    seed: u64,
) -> Result<(ParserConfig, InputVocabulary, EmbeddingMatrix)> {
    let benchmark: Benchmark = benchmark.parse()?;
    let grammar = benchmark.load_grammar(grammar_path)?;
    let vocab = InputVocabulary::load(input_words, benchmark.name())?;

    let embeddings = match embedding_file {
        Some(path) => load_embeddings(path, &vocab, hyper.embed_size, seed)?,
        None => {
            tracing::warn!("No embeddings file given, using random input embeddings");
            EmbeddingMatrix::random(vocab.len(), hyper.embed_size, seed)
        }
    };

    let model = hyper.into_config(vocab.len(), grammar.output_size(), grammar.start(), grammar.end());
    let config = ParserConfig::new(benchmark, model, grammar)?;

    tracing::info!(
        "Configured '{}' parser: {} input words, {} output tokens, {:?} x{} hidden {}{}",
        benchmark,
        config.model.dictionary_size,
        config.model.output_size,
        config.model.rnn_cell_type,
        config.model.rnn_layers,
        config.model.hidden_size,
        if config.model.apply_attention { ", attention" } else { "" },
    );
    Ok((config, vocab, embeddings))
}
