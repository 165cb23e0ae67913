// ============================================================
// Layer 4 — Train/Dev Splitter
// ============================================================
// Used when no separate dev file is given: shuffle the training
// samples with a seeded RNG and hold the tail out for evaluation.
//
// Shuffling before splitting keeps both sets representative when
// the dataset file is sorted (e.g. all rules before all queries).
// The seed makes the split reproducible across runs, so a resumed
// training run evaluates on the same dev set.
//
// Uses Fisher-Yates shuffle via rand::seq::SliceRandom.
//
// Reference: rand crate documentation

use rand::{rngs::StdRng, seq::SliceRandom, SeedableRng};

/// Shuffle `samples` with `seed` and split into (train, dev).
///
/// `train_fraction` is rounded to the nearest sample and clamped to the
/// number of samples.
pub fn split_train_dev<T>(mut samples: Vec<T>, train_fraction: f64, seed: u64) -> (Vec<T>, Vec<T>) {
    let mut rng = StdRng::seed_from_u64(seed);
    samples.shuffle(&mut rng);

    let total    = samples.len();
    let split_at = ((total as f64) * train_fraction).round() as usize;
    let split_at = split_at.min(total);

    let dev = samples.split_off(split_at);

    tracing::debug!(
        "Dataset split: {} training, {} dev (seed {})",
        samples.len(),
        dev.len(),
        seed,
    );

    (samples, dev)
}

// ─── Unit Tests ───────────────────────────────────────────────────────────────
#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_correct_split_sizes() {
        let items: Vec<usize> = (0..100).collect();
        let (train, dev) = split_train_dev(items, 0.9, 3);
        assert_eq!(train.len(), 90);
        assert_eq!(dev.len(), 10);
    }

    #[test]
    fn test_split_is_reproducible() {
        let a = split_train_dev((0..50).collect::<Vec<usize>>(), 0.8, 42);
        let b = split_train_dev((0..50).collect::<Vec<usize>>(), 0.8, 42);
        assert_eq!(a, b);
    }

    #[test]
    fn test_all_items_preserved() {
        let (mut train, dev) = split_train_dev((0..37).collect::<Vec<usize>>(), 0.7, 1);
        train.extend(dev);
        train.sort_unstable();
        assert_eq!(train, (0..37).collect::<Vec<_>>());
    }

    #[test]
    fn test_empty_dataset() {
        let (train, dev) = split_train_dev(Vec::<usize>::new(), 0.9, 0);
        assert!(train.is_empty());
        assert!(dev.is_empty());
    }
}
