// ============================================================
// Layer 4 — Pretrained Word Embeddings
// ============================================================
// Reads GloVe-style text vectors:
//
//   <word> <v1> <v2> ... <vD>
//
// and builds one row per dictionary id. Rows for words the file
// does not cover are drawn from N(0, 1/√D) with a seeded RNG, so
// the same dictionary and seed always produce the same matrix.
// The <<PAD>> row is all zeros.
//
// Only lines whose word is in the dictionary are parsed, so
// large vector files are streamed rather than held in memory.

use anyhow::{Context, Result};
use rand::{rngs::StdRng, SeedableRng};
use rand_distr::{Distribution, Normal};
use std::{
    fs::File,
    io::{BufRead, BufReader},
    path::Path,
};

use crate::data::dictionary::{InputVocabulary, PAD_ID};
use crate::domain::errors::SetupError;

/// Dense row-major `rows × width` matrix of input embeddings.
#[derive(Debug, Clone, PartialEq)]
pub struct EmbeddingMatrix {
    rows:   usize,
    width:  usize,
    values: Vec<f32>,
}

impl EmbeddingMatrix {
    /// Random N(0, 1/√width) rows with a zero padding row.
    pub fn random(rows: usize, width: usize, seed: u64) -> Self {
        let mut rng = StdRng::seed_from_u64(seed);
        let mut values = vec![0.0f32; rows * width];
        if let Ok(normal) = Normal::new(0.0f32, 1.0 / (width as f32).sqrt()) {
            for v in values.iter_mut() {
                *v = normal.sample(&mut rng);
            }
        }
        let mut matrix = Self { rows, width, values };
        matrix.zero_row(PAD_ID as usize);
        matrix
    }

    pub fn rows(&self) -> usize {
        self.rows
    }

    pub fn width(&self) -> usize {
        self.width
    }

    pub fn values(&self) -> &[f32] {
        &self.values
    }

    fn set_row(&mut self, id: usize, row: &[f32]) {
        self.values[id * self.width..(id + 1) * self.width].copy_from_slice(row);
    }

    fn zero_row(&mut self, id: usize) {
        if id < self.rows {
            self.values[id * self.width..(id + 1) * self.width].fill(0.0);
        }
    }
}

/// Load vectors for every word of `vocab` from a GloVe text file.
pub fn load_embeddings(
    path: impl AsRef<Path>,
    vocab: &InputVocabulary,
    width: usize,
    seed: u64,
) -> Result<EmbeddingMatrix> {
    let path = path.as_ref();
    let file = File::open(path)
        .with_context(|| format!("Cannot open embeddings '{}'", path.display()))?;

    let mut matrix = EmbeddingMatrix::random(vocab.len(), width, seed);
    let mut found = 0usize;

    for (index, line) in BufReader::new(file).lines().enumerate() {
        let line = line.with_context(|| format!("Cannot read '{}'", path.display()))?;
        let mut fields = line.split_whitespace();
        let Some(word) = fields.next() else { continue };
        let Some(id) = vocab.id(word) else { continue };
        if id == PAD_ID {
            continue;
        }

        let row: Vec<f32> = fields
            .map(|v| v.parse::<f32>())
            .collect::<std::result::Result<_, _>>()
            .with_context(|| format!("Bad number on line {} of '{}'", index + 1, path.display()))?;
        if row.len() != width {
            return Err(SetupError::EmbeddingWidth {
                line:     index + 1,
                expected: width,
                found:    row.len(),
            }
            .into());
        }
        matrix.set_row(id as usize, &row);
        found += 1;
    }

    tracing::info!(
        "Embeddings: {}/{} dictionary words found in '{}'",
        found,
        vocab.len(),
        path.display()
    );
    Ok(matrix)
}

// ─── Unit Tests ───────────────────────────────────────────────────────────────
#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn vocab() -> InputVocabulary {
        InputVocabulary::from_words(["go", "stop"]).unwrap()
    }

    fn row(m: &EmbeddingMatrix, id: usize) -> &[f32] {
        &m.values()[id * m.width()..(id + 1) * m.width()]
    }

    #[test]
    fn test_random_is_seeded_and_pads_with_zeros() {
        let a = EmbeddingMatrix::random(4, 3, 11);
        let b = EmbeddingMatrix::random(4, 3, 11);
        assert_eq!(a, b);
        assert_eq!(a.values().len(), 12);
        assert_eq!(row(&a, 0), &[0.0, 0.0, 0.0]);
        assert!(row(&a, 2).iter().any(|&v| v != 0.0));
    }

    #[test]
    fn test_load_fills_known_rows() {
        let mut f = tempfile::NamedTempFile::new().unwrap();
        writeln!(f, "go 0.5 0.25 1.0\nunrelated 9 9 9\nstop -1 0 2").unwrap();

        let m = load_embeddings(f.path(), &vocab(), 3, 1).unwrap();
        assert_eq!(m.rows(), 4);
        assert_eq!(row(&m, 2), &[0.5, 0.25, 1.0]);
        assert_eq!(row(&m, 3), &[-1.0, 0.0, 2.0]);
        assert_eq!(row(&m, 0), &[0.0, 0.0, 0.0]);
    }

    #[test]
    fn test_wrong_width_is_a_setup_error() {
        let mut f = tempfile::NamedTempFile::new().unwrap();
        writeln!(f, "go 0.5 0.25").unwrap();

        let err = load_embeddings(f.path(), &vocab(), 3, 1).unwrap_err();
        let setup = err.downcast_ref::<SetupError>().unwrap();
        assert!(matches!(setup, SetupError::EmbeddingWidth { line: 1, expected: 3, found: 2 }));
    }
}
