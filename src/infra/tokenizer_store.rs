// ============================================================
// Layer 6 — Tokenizer Store
// ============================================================
// Persists the input vocabulary next to the checkpoints so the
// parser sees exactly the word → id mapping the model was
// trained with, even if the dictionary file changes later.
//
// The vocabulary is a tokenizers WordLevel model, so it is saved
// in the HuggingFace tokenizer JSON format and reloaded with
// Tokenizer::from_file.

use anyhow::Result;
use std::path::{Path, PathBuf};
use tokenizers::Tokenizer;

use crate::data::dictionary::InputVocabulary;

pub struct TokenizerStore {
    dir: PathBuf,
}

impl TokenizerStore {
    pub fn new(dir: impl AsRef<Path>) -> Self {
        Self { dir: dir.as_ref().to_path_buf() }
    }

    fn path(&self) -> PathBuf {
        self.dir.join("tokenizer.json")
    }

    pub fn save(&self, vocab: &InputVocabulary) -> Result<()> {
        std::fs::create_dir_all(&self.dir)?;
        let path = self.path();
        vocab
            .tokenizer()
            .save(&path, true)
            .map_err(|e| anyhow::anyhow!("Cannot write tokenizer to '{}': {e}", path.display()))?;
        tracing::info!("Saved input vocabulary ({} words) to '{}'", vocab.len(), path.display());
        Ok(())
    }

    /// Load a previously saved vocabulary
    pub fn load(&self) -> Result<InputVocabulary> {
        let path = self.path();
        let tokenizer = Tokenizer::from_file(&path)
            .map_err(|e| anyhow::anyhow!("Cannot load tokenizer from '{}': {}", path.display(), e))?;
        InputVocabulary::from_tokenizer(tokenizer)
    }
}

// ─── Unit Tests ───────────────────────────────────────────────────────────────
#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_save_then_load_keeps_ids() {
        let dir = tempfile::tempdir().unwrap();
        let store = TokenizerStore::new(dir.path());
        let vocab = InputVocabulary::from_words(["show", "me", "QUOTED_STRING_0"]).unwrap();
        store.save(&vocab).unwrap();

        let loaded = store.load().unwrap();
        assert_eq!(loaded.len(), vocab.len());
        assert_eq!(
            loaded.encode("show me QUOTED_STRING_0 now").unwrap(),
            vocab.encode("show me QUOTED_STRING_0 now").unwrap()
        );
    }

    #[test]
    fn test_load_without_save_fails() {
        let dir = tempfile::tempdir().unwrap();
        assert!(TokenizerStore::new(dir.path()).load().is_err());
    }
}
