// ============================================================
// Layer 3 — Grammar Abstraction
// ============================================================
// The decoder never picks freely from the output vocabulary at
// inference time. Instead, at every step it asks a Grammar which
// output tokens are legal continuations of what it has emitted so
// far, and only chooses among those.
//
// A Grammar owns:
//   - the output vocabulary (token string <-> id)
//   - the designated start (<<GO>>) and end (<<EOS>>) ids
//   - an opaque per-decode state that moves forward one token
//     at a time
//
// Output vocabulary layout (shared by every grammar):
//   id 0 → <<EOS>>   end of program
//   id 1 → <<GO>>    fed to the decoder before the first token
//   id 2.. → grammar tokens in a stable order
//
// Reference: Rust Book §10 (Traits), §17 (Trait Objects)

use std::collections::HashMap;
use std::fmt::Debug;

/// Surface form of the end-of-program token.
pub const END_TOKEN: &str = "<<EOS>>";

/// Surface form of the start token fed to the first decoder step.
pub const START_TOKEN: &str = "<<GO>>";

/// Id of [`END_TOKEN`] in every [`OutputVocabulary`].
pub const END_ID: usize = 0;

/// Id of [`START_TOKEN`] in every [`OutputVocabulary`].
pub const START_ID: usize = 1;

// ─── OutputVocabulary ─────────────────────────────────────────────────────────
/// Bidirectional mapping between output tokens and ids.
#[derive(Debug, Clone)]
pub struct OutputVocabulary {
    tokens: Vec<String>,
    ids:    HashMap<String, usize>,
}

impl OutputVocabulary {
    /// Build a vocabulary from grammar tokens. The end and start tokens are
    /// always placed first; duplicates keep their first position.
    pub fn new<I, S>(grammar_tokens: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut vocab = Self { tokens: Vec::new(), ids: HashMap::new() };
        vocab.insert(END_TOKEN);
        vocab.insert(START_TOKEN);
        for token in grammar_tokens {
            vocab.insert(token);
        }
        vocab
    }

    /// Add a token if it is not present yet and return its id.
    pub fn insert(&mut self, token: impl Into<String>) -> usize {
        let token = token.into();
        if let Some(&id) = self.ids.get(&token) {
            return id;
        }
        let id = self.tokens.len();
        self.ids.insert(token.clone(), id);
        self.tokens.push(token);
        id
    }

    pub fn id(&self, token: &str) -> Option<usize> {
        self.ids.get(token).copied()
    }

    pub fn token(&self, id: usize) -> Option<&str> {
        self.tokens.get(id).map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.tokens.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tokens.is_empty()
    }

    /// Render a decoded id sequence, stopping at the end token.
    pub fn render(&self, ids: &[usize]) -> String {
        ids.iter()
            .take_while(|&&id| id != END_ID)
            .map(|&id| self.token(id).unwrap_or("<<?>>"))
            .collect::<Vec<_>>()
            .join(" ")
    }
}

// ─── GrammarState ─────────────────────────────────────────────────────────────
/// Opaque position of one in-progress decode inside a grammar.
///
/// Created by [`Grammar::initial_state`], moved forward by
/// [`Grammar::advance`], dropped when the decode for that example ends.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct GrammarState(usize);

impl GrammarState {
    pub(crate) fn new(index: usize) -> Self {
        Self(index)
    }

    pub(crate) fn index(self) -> usize {
        self.0
    }
}

// ─── Grammar ──────────────────────────────────────────────────────────────────
/// An output grammar that can answer "which tokens may come next?".
///
/// Implementations:
///   - SimpleGrammar     → flat token grammar (any token, then end)
///   - ThingtalkGrammar  → automaton compiled from Thingpedia rules
///   - FiniteStateGrammar → the shared automaton both are built on
///
/// `valid_tokens` is called once per output token, per example, per
/// batch, so it must be a lookup rather than a computation.
pub trait Grammar: Debug + Send + Sync {
    fn vocabulary(&self) -> &OutputVocabulary;

    fn initial_state(&self) -> GrammarState;

    /// Sorted ids that are legal next in `state`. Empty means the grammar
    /// has no continuation and the decode for that example must stop.
    fn valid_tokens(&self, state: GrammarState) -> &[usize];

    /// Move `state` forward by `token`. `None` if `token` is not legal.
    fn advance(&self, state: GrammarState, token: usize) -> Option<GrammarState>;

    fn output_size(&self) -> usize {
        self.vocabulary().len()
    }

    fn start(&self) -> usize {
        START_ID
    }

    fn end(&self) -> usize {
        END_ID
    }

    /// Valid next tokens after replaying `emitted` from the initial state.
    /// Returns an empty list if the prefix itself is not in the grammar.
    fn valid_next(&self, emitted: &[usize]) -> Vec<usize> {
        let mut state = self.initial_state();
        for &token in emitted {
            match self.advance(state, token) {
                Some(next) => state = next,
                None       => return Vec::new(),
            }
        }
        self.valid_tokens(state).to_vec()
    }

    /// Whether a full program (without the end token) is accepted.
    fn accepts(&self, program: &[usize]) -> bool {
        self.valid_next(program).contains(&self.end())
    }
}
