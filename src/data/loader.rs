// ============================================================
// Layer 4 — Dataset Loader
// ============================================================
// Loads sentence/program pairs from a tab-separated file, the
// format the dataset converter writes:
//
//   <sentence>\t<program>
//
// Both sides are already whitespace tokenised. Lines without a
// tab, or with an empty side, are skipped with a warning rather
// than failing the whole file.
//
// Reference: Rust Book §9 (Error Handling)
//            Rust Book §12 (I/O and File Handling)

use anyhow::{Context, Result};
use std::{fs, path::PathBuf};

use crate::domain::example::ParseExample;
use crate::domain::traits::ExampleSource;

/// Reads [`ParseExample`]s from one TSV file.
pub struct TsvExampleLoader {
    path: PathBuf,
}

impl TsvExampleLoader {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

impl ExampleSource for TsvExampleLoader {
    fn load_all(&self) -> Result<Vec<ParseExample>> {
        let text = fs::read_to_string(&self.path)
            .with_context(|| format!("Cannot read dataset '{}'", self.path.display()))?;

        let mut examples = Vec::new();
        let mut skipped = 0usize;
        for (index, line) in text.lines().enumerate() {
            if line.trim().is_empty() {
                continue;
            }
            match parse_line(line) {
                Some(example) => examples.push(example),
                None => {
                    skipped += 1;
                    tracing::warn!(
                        "Skipping malformed line {} of '{}'",
                        index + 1,
                        self.path.display()
                    );
                }
            }
        }

        tracing::info!(
            "Loaded {} examples from '{}' ({} skipped)",
            examples.len(),
            self.path.display(),
            skipped
        );
        Ok(examples)
    }
}

fn parse_line(line: &str) -> Option<ParseExample> {
    let (sentence, program) = line.split_once('\t')?;
    let (sentence, program) = (sentence.trim(), program.trim());
    if sentence.is_empty() || program.is_empty() {
        return None;
    }
    Some(ParseExample::new(sentence, program))
}
