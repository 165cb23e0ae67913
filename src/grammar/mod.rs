// ============================================================
// Grammar Layer — Concrete Output Grammars
// ============================================================
// Implementations of domain::grammar::Grammar:
//
//   automaton.rs → FiniteStateGrammar, the transition-table
//                  automaton every grammar compiles to
//   simple.rs    → SimpleGrammar, flat token list (Geoqueries)
//   thingtalk.rs → ThingtalkGrammar, compiled from Thingpedia
//                  rule lines (one rule per line)

pub mod automaton;

pub mod simple;

pub mod thingtalk;

pub use automaton::FiniteStateGrammar;
pub use simple::SimpleGrammar;
pub use thingtalk::ThingtalkGrammar;
