// ============================================================
// Layer 4 — Input Dictionary
// ============================================================
// Maps input words to ids for the encoder's embedding lookup.
//
//   id 0 → <<PAD>>   padding, all-zero embedding row
//   id 1 → <<UNK>>   every word not in the dictionary
//   id 2.. → dictionary words in file order
//
// The vocabulary is a `tokenizers` WordLevel model with a
// whitespace-split pre-tokenizer and no normaliser, so the
// sentence is split exactly on whitespace and case is kept
// (placeholders such as QUOTED_STRING_0 are matched verbatim).
//
// Dictionary file: one entry per line, the word is the first
// whitespace-separated field (extra fields such as counts are
// ignored).

use anyhow::{Context, Result};
use std::{fs, path::Path};
use tokenizers::Tokenizer;

pub const PAD_TOKEN: &str = "<<PAD>>";
pub const UNK_TOKEN: &str = "<<UNK>>";
pub const PAD_ID: u32 = 0;
pub const UNK_ID: u32 = 1;

#[derive(Clone)]
pub struct InputVocabulary {
    tokenizer: Tokenizer,
    size:      usize,
}

impl std::fmt::Debug for InputVocabulary {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("InputVocabulary").field("size", &self.size).finish()
    }
}

impl InputVocabulary {
    /// Read a dictionary file. `benchmark` is only used for logging.
    pub fn load(path: impl AsRef<Path>, benchmark: &str) -> Result<Self> {
        let path = path.as_ref();
        let text = fs::read_to_string(path)
            .with_context(|| format!("Cannot read dictionary '{}'", path.display()))?;

        let words = text
            .lines()
            .filter_map(|line| line.split_whitespace().next());
        let vocab = Self::from_words(words)?;

        tracing::info!(
            "{} words in dictionary for benchmark '{}' ({})",
            vocab.len(),
            benchmark,
            path.display()
        );
        Ok(vocab)
    }

    /// Build a vocabulary from words in order. Repeats and the special
    /// tokens themselves are skipped.
    pub fn from_words<I, S>(words: I) -> Result<Self>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut vocab = serde_json::json!({
            PAD_TOKEN: PAD_ID,
            UNK_TOKEN: UNK_ID,
        });
        let mut next_id = UNK_ID + 1;
        for word in words {
            let word = word.as_ref();
            if vocab.get(word).is_none() {
                vocab[word] = serde_json::json!(next_id);
                next_id += 1;
            }
        }

        let tokenizer_json = serde_json::json!({
            "version": "1.0",
            "truncation": null,
            "padding": null,
            "added_tokens": [
                {"id": PAD_ID, "content": PAD_TOKEN, "single_word": false, "lstrip": false, "rstrip": false, "normalized": false, "special": true},
                {"id": UNK_ID, "content": UNK_TOKEN, "single_word": false, "lstrip": false, "rstrip": false, "normalized": false, "special": true}
            ],
            "normalizer": null,
            "pre_tokenizer": {
                "type": "WhitespaceSplit"
            },
            "post_processor": null,
            "decoder": null,
            "model": {
                "type": "WordLevel",
                "vocab": vocab,
                "unk_token": UNK_TOKEN
            }
        });

        let bytes = serde_json::to_vec(&tokenizer_json)?;
        let tokenizer = Tokenizer::from_bytes(bytes)
            .map_err(|e| anyhow::anyhow!("Cannot build input tokenizer: {e}"))?;
        Self::from_tokenizer(tokenizer)
    }

    /// Wrap a previously saved tokenizer, checking the special ids.
    pub fn from_tokenizer(tokenizer: Tokenizer) -> Result<Self> {
        if tokenizer.token_to_id(PAD_TOKEN) != Some(PAD_ID)
            || tokenizer.token_to_id(UNK_TOKEN) != Some(UNK_ID)
        {
            anyhow::bail!("Input tokenizer must map {PAD_TOKEN} to {PAD_ID} and {UNK_TOKEN} to {UNK_ID}");
        }
        let size = tokenizer.get_vocab_size(true);
        Ok(Self { tokenizer, size })
    }

    pub fn len(&self) -> usize {
        self.size
    }

    pub fn is_empty(&self) -> bool {
        self.size == 0
    }

    pub fn id(&self, word: &str) -> Option<u32> {
        self.tokenizer.token_to_id(word)
    }

    /// Split on whitespace and map each word to its id (<<UNK>> if unknown).
    pub fn encode(&self, sentence: &str) -> Result<Vec<u32>> {
        let encoding = self
            .tokenizer
            .encode(sentence, false)
            .map_err(|e| anyhow::anyhow!("Cannot tokenise '{sentence}': {e}"))?;
        Ok(encoding.get_ids().to_vec())
    }

    pub fn tokenizer(&self) -> &Tokenizer {
        &self.tokenizer
    }
}
