// ============================================================
// Layer 5 — Luong Attention
// ============================================================
// Dot-product attention over the encoder outputs:
//
//   score[t, s] = h_dec[t] · h_enc[s]
//   α[t, :]     = masked_softmax(score[t, :], input_length)
//   ctx[t]      = Σ_s α[t, s] · h_enc[s]
//   h̃[t]        = tanh(V1·h_dec[t] + V2·ctx[t])
//
// Positions at or beyond an example's input length receive
// exactly zero weight, so padding can never leak into ctx.
//
// Reference: Luong, Pham & Manning (2015)

use burn::{
    nn::{Initializer, Linear, LinearConfig},
    prelude::*,
    tensor::activation::softmax,
};

/// Score given to masked positions before the softmax.
pub const MASKED_SCORE: f32 = -1.0e9;

/// [batch, max_len] boolean mask: true where `position < length`.
pub fn sequence_mask<B: Backend>(lengths: Tensor<B, 1, Int>, max_len: usize) -> Tensor<B, 2, Bool> {
    let [batch] = lengths.dims();
    let device = lengths.device();
    let positions = Tensor::<B, 1, Int>::arange(0..max_len as i64, &device)
        .unsqueeze::<2>()
        .expand([batch, max_len]);
    positions.lower(lengths.reshape([batch, 1]).expand([batch, max_len]))
}

/// Softmax over the last axis that only covers the first `length`
/// positions of each row.
///
/// scores: [batch, steps, positions], lengths: [batch]
/// Each row sums to 1 over its valid positions; masked positions are 0.
pub fn length_masked_softmax<B: Backend>(scores: Tensor<B, 3>, lengths: Tensor<B, 1, Int>) -> Tensor<B, 3> {
    let [batch, steps, positions] = scores.dims();
    let valid = sequence_mask(lengths, positions)
        .reshape([batch, 1, positions])
        .expand([batch, steps, positions]);
    let filled = scores.mask_fill(valid.clone().bool_not(), MASKED_SCORE);
    softmax(filled, 2) * valid.float()
}

#[derive(Module, Debug)]
pub struct LuongAttention<B: Backend> {
    /// V1: applied to the decoder output
    pub decoder_proj: Linear<B>,
    /// V2: applied to the context vector
    pub context_proj: Linear<B>,
}

impl<B: Backend> LuongAttention<B> {
    pub fn new(d_hidden: usize, device: &B::Device) -> Self {
        let linear = || {
            LinearConfig::new(d_hidden, d_hidden)
                .with_bias(false)
                .with_initializer(Initializer::XavierUniform { gain: 1.0 })
                .init(device)
        };
        Self { decoder_proj: linear(), context_proj: linear() }
    }

    /// decoder_states: [batch, steps, H], encoder_states: [batch, src, H]
    /// → attended states [batch, steps, H]
    pub fn forward(
        &self,
        decoder_states: Tensor<B, 3>,
        encoder_states: Tensor<B, 3>,
        input_lengths: Tensor<B, 1, Int>,
    ) -> Tensor<B, 3> {
        let scores = decoder_states
            .clone()
            .matmul(encoder_states.clone().swap_dims(1, 2));
        let weights = length_masked_softmax(scores, input_lengths);
        let context = weights.matmul(encoder_states);

        (self.decoder_proj.forward(decoder_states) + self.context_proj.forward(context)).tanh()
    }

    pub fn weight_penalty(&self) -> Tensor<B, 1> {
        self.decoder_proj.weight.val().powf_scalar(2.0).sum()
            + self.context_proj.weight.val().powf_scalar(2.0).sum()
    }
}

// ─── Unit Tests ───────────────────────────────────────────────────────────────
#[cfg(test)]
mod tests {
    use super::*;
    use burn::backend::NdArray;

    type TestBackend = NdArray;

    fn to_vec<const D: usize>(t: Tensor<TestBackend, D>) -> Vec<f32> {
        t.into_data().convert::<f32>().to_vec::<f32>().unwrap()
    }

    #[test]
    fn test_sequence_mask() {
        let device = Default::default();
        let lengths = Tensor::<TestBackend, 1, Int>::from_ints([1, 3], &device);
        let mask: Vec<bool> = sequence_mask(lengths, 4).into_data().to_vec::<bool>().unwrap();
        assert_eq!(mask, vec![true, false, false, false, true, true, true, false]);
    }

    #[test]
    fn test_masked_softmax_rows_sum_to_one() {
        let device = Default::default();
        let scores = Tensor::<TestBackend, 3>::from_floats(
            [[[1.0, 2.0, 3.0, 4.0]], [[0.5, -1.0, 7.0, 2.0]]],
            &device,
        );
        let lengths = Tensor::<TestBackend, 1, Int>::from_ints([2, 4], &device);
        let probs = to_vec(length_masked_softmax(scores, lengths));

        let first: f32 = probs[0..4].iter().sum();
        let second: f32 = probs[4..8].iter().sum();
        assert!((first - 1.0).abs() < 1e-5);
        assert!((second - 1.0).abs() < 1e-5);
        assert_eq!(probs[2], 0.0);
        assert_eq!(probs[3], 0.0);
    }

    #[test]
    fn test_masked_positions_do_not_change_weights() {
        let device = Default::default();
        let lengths = Tensor::<TestBackend, 1, Int>::from_ints([2], &device);
        let a = Tensor::<TestBackend, 3>::from_floats([[[1.0, 2.0, 3.0]]], &device);
        let b = Tensor::<TestBackend, 3>::from_floats([[[1.0, 2.0, -50.0]]], &device);
        let pa = to_vec(length_masked_softmax(a, lengths.clone()));
        let pb = to_vec(length_masked_softmax(b, lengths));
        for (x, y) in pa.iter().zip(&pb) {
            assert!((x - y).abs() < 1e-6);
        }
    }

    #[test]
    fn test_attention_ignores_padded_encoder_states() {
        let device = Default::default();
        let attention = LuongAttention::<TestBackend>::new(3, &device);
        let lengths = Tensor::<TestBackend, 1, Int>::from_ints([2], &device);
        let decoder = Tensor::<TestBackend, 3>::ones([1, 2, 3], &device);

        let base = Tensor::<TestBackend, 3>::from_floats(
            [[[0.1, 0.2, 0.3], [0.4, 0.5, 0.6], [0.0, 0.0, 0.0]]],
            &device,
        );
        let noisy = Tensor::<TestBackend, 3>::from_floats(
            [[[0.1, 0.2, 0.3], [0.4, 0.5, 0.6], [9.0, -9.0, 4.0]]],
            &device,
        );

        let a = to_vec(attention.forward(decoder.clone(), base, lengths.clone()));
        let b = to_vec(attention.forward(decoder, noisy, lengths));
        for (x, y) in a.iter().zip(&b) {
            assert!((x - y).abs() < 1e-6);
        }
    }
}
