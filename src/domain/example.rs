// ============================================================
// Layer 3 — ParseExample Domain Type
// ============================================================
// One supervised pair for semantic parsing:
//   - a natural-language sentence (already tokenised, space separated)
//   - the target program as a space separated list of output tokens
//
// Example (ThingTalk):
//   sentence: "send QUOTED_STRING_0 to USERNAME_0 on twitter"
//   program:  "action tt:twitter.send_direct_message to is USERNAME_0
//              message is QUOTED_STRING_0"
//
// Entity placeholders (QUOTED_STRING_0, NUMBER_1, ...) appear in both
// sides; the converter that produced the data already replaced the
// literal values.

/// A labelled sentence → program pair.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParseExample {
    /// Input sentence, whitespace tokenised
    pub sentence: String,

    /// Target program, whitespace tokenised, without the end token
    pub program: String,
}

impl ParseExample {
    pub fn new(sentence: impl Into<String>, program: impl Into<String>) -> Self {
        Self {
            sentence: sentence.into(),
            program:  program.into(),
        }
    }

    /// Program tokens in order
    pub fn program_tokens(&self) -> impl Iterator<Item = &str> {
        self.program.split_whitespace()
    }
}
