// ============================================================
// Layer 3 — Domain Layer
// ============================================================
// Plain Rust types and traits describing what the parser works
// with. No burn tensors, no file I/O here.
//
//   example.rs → a sentence/program training pair
//   grammar.rs → the Grammar trait, GrammarState, OutputVocabulary
//   errors.rs  → typed fatal errors (setup, loss invariants)
//   traits.rs  → ExampleSource / SentenceParser seams

pub mod example;

pub mod grammar;

pub mod errors;

pub mod traits;
