// ============================================================
// Grammar — Finite-State Automaton
// ============================================================
// Both concrete grammars compile down to a deterministic
// automaton over output token ids:
//
//   state ──token──▶ state
//
// The set of legal next tokens for each state is precomputed
// and stored sorted, so the per-step validity query during
// decoding is a slice lookup and advancing is one hash lookup.
//
// A state "accepts" when it has a transition on the end token
// to the shared terminal state (which has no transitions).
//
// Reference: Rust Book §8 (HashMap), Hopcroft & Ullman (DFA)

use std::collections::HashMap;

use crate::domain::grammar::{Grammar, GrammarState, OutputVocabulary, END_ID};

/// A grammar backed by an explicit transition table.
#[derive(Debug, Clone)]
pub struct FiniteStateGrammar {
    vocab:       OutputVocabulary,
    transitions: Vec<HashMap<usize, usize>>,
    valid:       Vec<Vec<usize>>,
    initial:     usize,
}

impl FiniteStateGrammar {
    pub fn builder(vocab: OutputVocabulary) -> FiniteStateGrammarBuilder {
        FiniteStateGrammarBuilder::new(vocab)
    }

    pub fn num_states(&self) -> usize {
        self.transitions.len()
    }
}

impl Grammar for FiniteStateGrammar {
    fn vocabulary(&self) -> &OutputVocabulary {
        &self.vocab
    }

    fn initial_state(&self) -> GrammarState {
        GrammarState::new(self.initial)
    }

    fn valid_tokens(&self, state: GrammarState) -> &[usize] {
        self.valid
            .get(state.index())
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    fn advance(&self, state: GrammarState, token: usize) -> Option<GrammarState> {
        self.transitions
            .get(state.index())?
            .get(&token)
            .map(|&next| GrammarState::new(next))
    }
}

// ─── Builder ──────────────────────────────────────────────────────────────────
/// Incrementally assembles a [`FiniteStateGrammar`].
///
/// State 0 is the initial state. Tokens are interned into the
/// vocabulary as transitions mention them.
#[derive(Debug)]
pub struct FiniteStateGrammarBuilder {
    vocab:       OutputVocabulary,
    transitions: Vec<HashMap<usize, usize>>,
    terminal:    Option<usize>,
}

impl FiniteStateGrammarBuilder {
    pub fn new(vocab: OutputVocabulary) -> Self {
        Self {
            vocab,
            transitions: vec![HashMap::new()],
            terminal:    None,
        }
    }

    pub fn initial(&self) -> usize {
        0
    }

    pub fn add_state(&mut self) -> usize {
        self.transitions.push(HashMap::new());
        self.transitions.len() - 1
    }

    pub fn vocabulary(&self) -> &OutputVocabulary {
        &self.vocab
    }

    /// Add `from --token--> to`, interning `token` into the vocabulary.
    /// Returns false (and keeps the existing edge) if `from` already moves
    /// to a different state on that token.
    pub fn add_transition(&mut self, from: usize, token: &str, to: usize) -> bool {
        let id = self.vocab.insert(token);
        self.add_transition_id(from, id, to)
    }

    pub fn add_transition_id(&mut self, from: usize, token: usize, to: usize) -> bool {
        assert!(from < self.transitions.len(), "unknown state {from}");
        assert!(to < self.transitions.len(), "unknown state {to}");
        match self.transitions[from].get(&token) {
            Some(&existing) => existing == to,
            None => {
                self.transitions[from].insert(token, to);
                true
            }
        }
    }

    /// Allow the program to end in `state`.
    pub fn accept(&mut self, state: usize) {
        let terminal = match self.terminal {
            Some(t) => t,
            None => {
                let t = self.add_state();
                self.terminal = Some(t);
                t
            }
        };
        self.add_transition_id(state, END_ID, terminal);
    }

    pub fn build(self) -> FiniteStateGrammar {
        let valid = self
            .transitions
            .iter()
            .map(|edges| {
                let mut ids: Vec<usize> = edges.keys().copied().collect();
                ids.sort_unstable();
                ids
            })
            .collect();

        FiniteStateGrammar {
            vocab:       self.vocab,
            transitions: self.transitions,
            valid,
            initial:     0,
        }
    }
}
