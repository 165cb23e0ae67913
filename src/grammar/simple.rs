// ============================================================
// Grammar — Simple Flat Token Grammar
// ============================================================
// Used for benchmarks whose output language has no structure we
// want to enforce (e.g. Geoqueries logical forms). The output
// vocabulary comes from a text file, one token per line.
//
// Accepted language:  token+
//   - any grammar token may follow any grammar token
//   - the end token is legal only after at least one token
//   - the start token is never legal

use anyhow::{Context, Result};
use std::{fs, path::Path};

use crate::domain::grammar::{Grammar, GrammarState, OutputVocabulary, END_ID, START_ID};
use crate::grammar::automaton::FiniteStateGrammar;

#[derive(Debug, Clone)]
pub struct SimpleGrammar {
    inner: FiniteStateGrammar,
}

impl SimpleGrammar {
    /// Load the output tokens from `path`, one per line. Blank lines are
    /// skipped and repeated tokens keep their first position.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let text = fs::read_to_string(path)
            .with_context(|| format!("Cannot read output tokens from '{}'", path.display()))?;

        let grammar = Self::from_tokens(text.lines().map(str::trim).filter(|l| !l.is_empty()));
        tracing::info!(
            "Loaded simple grammar from '{}' ({} output tokens)",
            path.display(),
            grammar.output_size()
        );
        Ok(grammar)
    }

    pub fn from_tokens<I, S>(tokens: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let vocab = OutputVocabulary::new(tokens);
        let grammar_ids: Vec<usize> = (0..vocab.len())
            .filter(|&id| id != END_ID && id != START_ID)
            .collect();

        let mut builder = FiniteStateGrammar::builder(vocab);
        let start = builder.initial();
        let body = builder.add_state();
        for &id in &grammar_ids {
            builder.add_transition_id(start, id, body);
            builder.add_transition_id(body, id, body);
        }
        builder.accept(body);

        Self { inner: builder.build() }
    }
}

impl Grammar for SimpleGrammar {
    fn vocabulary(&self) -> &OutputVocabulary {
        self.inner.vocabulary()
    }

    fn initial_state(&self) -> GrammarState {
        self.inner.initial_state()
    }

    fn valid_tokens(&self, state: GrammarState) -> &[usize] {
        self.inner.valid_tokens(state)
    }

    fn advance(&self, state: GrammarState, token: usize) -> Option<GrammarState> {
        self.inner.advance(state, token)
    }
}

// ─── Unit Tests ───────────────────────────────────────────────────────────────
#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_first_token_cannot_be_end_or_start() {
        let g = SimpleGrammar::from_tokens(["answer", "(", ")", "state"]);
        let first = g.valid_next(&[]);
        assert_eq!(first.len(), 4);
        assert!(!first.contains(&END_ID));
        assert!(!first.contains(&START_ID));
    }

    #[test]
    fn test_end_allowed_after_one_token() {
        let g = SimpleGrammar::from_tokens(["answer", "state"]);
        let answer = g.vocabulary().id("answer").unwrap();
        let next = g.valid_next(&[answer]);
        assert!(next.contains(&END_ID));
        assert!(next.contains(&answer));
        assert!(!next.contains(&START_ID));
    }

    #[test]
    fn test_from_file_skips_blank_and_duplicate_lines() {
        let mut f = tempfile::NamedTempFile::new().unwrap();
        writeln!(f, "answer\n\n  state \nanswer").unwrap();

        let g = SimpleGrammar::from_file(f.path()).unwrap();
        assert_eq!(g.output_size(), 4);
        assert_eq!(g.vocabulary().id("state"), Some(3));
    }

    #[test]
    fn test_missing_file_is_an_error() {
        assert!(SimpleGrammar::from_file("/nonexistent/output_tokens.txt").is_err());
    }
}
