// ============================================================
// Layer 5 — Sequence Loss
// ============================================================
// Masked token-level cross-entropy, summed over the batch:
//
//   loss = Σ_b Σ_{t < len_b} −log softmax(logits[b, t])[y[b, t]]
//
// Logits are first padded (with zeros) or truncated along the
// time axis to the padded output length, so decoders that stop
// early still line up with the gold sequence.
//
// `sequence_loss` also checks three sanity conditions that a
// correctly wired training step always satisfies. A violation
// means the batch or the model is broken, and training must stop.

use burn::{prelude::*, tensor::activation::log_softmax};

use crate::domain::errors::LossError;
use crate::ml::attention::sequence_mask;

/// Pad (with zeros) or truncate logits along the time axis to `length`.
pub fn pad_or_truncate<B: Backend>(logits: Tensor<B, 3>, length: usize) -> Tensor<B, 3> {
    let [batch, steps, vocab] = logits.dims();
    if steps >= length {
        return logits.slice([0..batch, 0..length, 0..vocab]);
    }
    let padding = Tensor::zeros([batch, length - steps, vocab], &logits.device());
    Tensor::cat(vec![logits, padding], 1)
}

/// Per-position masked cross-entropy.
///
/// logits: [batch, L, V], targets: [batch, L], lengths: [batch]
/// → (losses [batch, L] with zeros past each length, mask [batch, L])
pub fn masked_cross_entropy<B: Backend>(
    logits: Tensor<B, 3>,
    targets: Tensor<B, 2, Int>,
    lengths: Tensor<B, 1, Int>,
) -> (Tensor<B, 2>, Tensor<B, 2>) {
    let [batch, steps] = targets.dims();
    let logits = pad_or_truncate(logits, steps);

    let log_probs = log_softmax(logits, 2);
    let picked = log_probs
        .gather(2, targets.reshape([batch, steps, 1]))
        .reshape([batch, steps]);
    let mask = sequence_mask(lengths, steps).float();
    (picked.neg() * mask.clone(), mask)
}

/// Summed masked cross-entropy with the training sanity checks:
///   - at least one output position is unmasked
///   - at least one position has a strictly positive loss
///   - no example's first-step argmax is the end token
pub fn sequence_loss<B: Backend>(
    logits: Tensor<B, 3>,
    targets: Tensor<B, 2, Int>,
    lengths: Tensor<B, 1, Int>,
    end: usize,
) -> Result<Tensor<B, 1>, LossError> {
    let [batch, steps] = targets.dims();
    let [_, _, vocab] = logits.dims();
    let logits = pad_or_truncate(logits, steps.max(1));
    let first_step = logits.clone().slice([0..batch, 0..1, 0..vocab]).reshape([batch, vocab]);

    let (losses, mask) = masked_cross_entropy(logits, targets, lengths);

    let unmasked: f32 = mask.sum().into_scalar().elem();
    if unmasked <= 0.0 {
        return Err(LossError::EmptyOutputMask);
    }

    let worst: f32 = losses.clone().max().into_scalar().elem();
    if worst <= 0.0 {
        return Err(LossError::NonPositiveLoss(worst));
    }

    let first_tokens = first_step
        .argmax(1)
        .into_data()
        .convert::<i64>()
        .to_vec::<i64>()
        .unwrap_or_default();
    if let Some(example) = first_tokens.iter().position(|&t| t == end as i64) {
        return Err(LossError::EmptyPrediction(example));
    }

    Ok(losses.sum())
}
