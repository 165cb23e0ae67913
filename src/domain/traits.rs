// ============================================================
// Layer 3 — Core Traits (Abstractions)
// ============================================================
// The application layer programs against these traits so the
// data source and the parser implementation can be swapped:
//
//   ExampleSource  → TsvExampleLoader (tab separated dataset files)
//   SentenceParser → ParseUseCase (checkpointed seq2seq model)
//
// The Grammar trait lives in domain::grammar next to the
// vocabulary it owns.

use anyhow::Result;
use crate::domain::example::ParseExample;

// ─── ExampleSource ────────────────────────────────────────────────────────────
/// Any component that can produce labelled sentence → program pairs.
pub trait ExampleSource {
    fn load_all(&self) -> Result<Vec<ParseExample>>;
}

// ─── SentenceParser ───────────────────────────────────────────────────────────
/// Any component that maps a sentence to a program string.
pub trait SentenceParser {
    fn parse(&self, sentence: &str) -> Result<String>;
}
