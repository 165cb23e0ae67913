// ============================================================
// Layer 4 — Seq2Seq Batcher
// ============================================================
// Stacks padded samples into tensors on the target device:
//
//   Input:  N Seq2SeqSamples, each side padded to length L
//   Output: Seq2SeqBatch with id tensors [N, L] and length
//           tensors [N]
//
//   Ids are flattened row by row, then reshaped:
//   [s1_t1, ..., s1_tL, s2_t1, ..., sN_tL] → [N, L]
//
// The training loop slices its own shuffled batches, so this is a
// plain method rather than a DataLoader plug-in.
//
// Reference: Burn Book §4 (Batcher)

use burn::prelude::*;

use crate::data::dataset::Seq2SeqSample;

// ─── Seq2SeqBatch ─────────────────────────────────────────────────────────────
#[derive(Debug, Clone)]
pub struct Seq2SeqBatch<B: Backend> {
    /// [batch, L]
    pub input_ids:      Tensor<B, 2, Int>,
    /// [batch]
    pub input_lengths:  Tensor<B, 1, Int>,
    /// [batch, L], end token ids as padding
    pub output_ids:     Tensor<B, 2, Int>,
    /// [batch], counting the end token
    pub output_lengths: Tensor<B, 1, Int>,
}

// ─── Seq2SeqBatcher ───────────────────────────────────────────────────────────
#[derive(Clone, Debug)]
pub struct Seq2SeqBatcher<B: Backend> {
    pub device: B::Device,
}

impl<B: Backend> Seq2SeqBatcher<B> {
    pub fn new(device: B::Device) -> Self {
        Self { device }
    }

    /// Stack samples. All samples must share one padded length.
    pub fn batch(&self, items: &[Seq2SeqSample]) -> Seq2SeqBatch<B> {
        let (input_ids, input_lengths) =
            self.inputs(items.iter().map(|s| (s.input_ids.as_slice(), s.input_length)));
        let (output_ids, output_lengths) =
            self.inputs(items.iter().map(|s| (s.output_ids.as_slice(), s.output_length)));
        Seq2SeqBatch { input_ids, input_lengths, output_ids, output_lengths }
    }

    /// Stack padded id rows and their true lengths.
    pub fn inputs<'a, I>(&self, rows: I) -> (Tensor<B, 2, Int>, Tensor<B, 1, Int>)
    where
        I: IntoIterator<Item = (&'a [u32], usize)>,
    {
        let mut flat: Vec<i32> = Vec::new();
        let mut lengths: Vec<i32> = Vec::new();
        let mut width = 0usize;
        for (ids, length) in rows {
            width = ids.len();
            flat.extend(ids.iter().map(|&x| x as i32));
            lengths.push(length as i32);
        }
        assert_eq!(flat.len(), lengths.len() * width, "rows must share one padded length");

        let ids = Tensor::<B, 1, Int>::from_ints(flat.as_slice(), &self.device)
            .reshape([lengths.len(), width]);
        let lengths = Tensor::<B, 1, Int>::from_ints(lengths.as_slice(), &self.device);
        (ids, lengths)
    }
}

// ─── Unit Tests ───────────────────────────────────────────────────────────────
#[cfg(test)]
mod tests {
    use super::*;
    use burn::backend::NdArray;

    fn sample(input: &[u32], output: &[u32], output_length: usize) -> Seq2SeqSample {
        Seq2SeqSample {
            input_ids:     input.to_vec(),
            input_length:  input.iter().filter(|&&x| x != 0).count(),
            output_ids:    output.to_vec(),
            output_length,
        }
    }

    #[test]
    fn test_batch_shapes_and_values() {
        let batcher = Seq2SeqBatcher::<NdArray>::new(Default::default());
        let batch = batcher.batch(&[
            sample(&[2, 3, 0], &[4, 0, 0], 2),
            sample(&[5, 0, 0], &[6, 7, 0], 3),
        ]);

        assert_eq!(batch.input_ids.dims(), [2, 3]);
        assert_eq!(batch.output_ids.dims(), [2, 3]);
        let lengths: Vec<i64> = batch.input_lengths.into_data().convert::<i64>().to_vec().unwrap();
        assert_eq!(lengths, vec![2, 1]);
        let outputs: Vec<i64> = batch.output_ids.into_data().convert::<i64>().to_vec().unwrap();
        assert_eq!(outputs, vec![4, 0, 0, 6, 7, 0]);
    }

    #[test]
    #[should_panic(expected = "rows must share one padded length")]
    fn test_ragged_rows_panic() {
        let batcher = Seq2SeqBatcher::<NdArray>::new(Default::default());
        batcher.batch(&[sample(&[2, 3, 0], &[4, 0, 0], 2), sample(&[5, 0], &[6, 0], 2)]);
    }
}
