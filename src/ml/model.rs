// ============================================================
// Layer 5 — Sequence-to-Sequence Parser Model
// ============================================================
// Sentence in, program out:
//
//   input ids ──Encoder──▶ states ──Decoder──▶ logits [batch, L, V]
//
// Training feeds the gold program (teacher forcing) and returns
// logits for the loss. Inference decodes greedily, one token at
// a time, restricted to the tokens the grammar allows next
// (see `forward_inference` in decoding.rs).
//
// Objective = masked sequence cross-entropy
//           + l2_regularization · Σ‖W‖² / 2
// where W ranges over the recurrent gate weights, the attention
// projections and the output projection. Embeddings and biases
// are not regularised.

use burn::prelude::*;

use crate::data::embeddings::EmbeddingMatrix;
use crate::domain::errors::LossError;
use crate::ml::config::Seq2SeqConfig;
use crate::ml::decoder::Decoder;
use crate::ml::encoder::{Encoder, EncoderOutput};
use crate::ml::loss::sequence_loss;

impl Seq2SeqConfig {
    /// Build a freshly initialised model. `pretrained` must have
    /// `dictionary_size` rows of width `embed_size`.
    pub fn init<B: Backend>(&self, pretrained: &EmbeddingMatrix, device: &B::Device) -> Seq2SeqModel<B> {
        Seq2SeqModel {
            encoder:           Encoder::new(self, pretrained, device),
            decoder:           Decoder::new(self, device),
            max_length:        self.max_length,
            start:             self.start,
            end:               self.end,
            keep_prob:         self.dropout,
            l2_regularization: self.l2_regularization,
        }
    }

    /// Seed the backend RNG, then [`init`](Self::init). Equal seeds give
    /// equal weights.
    pub fn init_seeded<B: Backend>(
        &self,
        pretrained: &EmbeddingMatrix,
        seed: u64,
        device: &B::Device,
    ) -> Seq2SeqModel<B> {
        B::seed(device, seed);
        self.init(pretrained, device)
    }
}

#[derive(Module, Debug)]
pub struct Seq2SeqModel<B: Backend> {
    pub encoder:           Encoder<B>,
    pub decoder:           Decoder<B>,
    pub max_length:        usize,
    pub start:             usize,
    pub end:               usize,
    pub keep_prob:         f64,
    pub l2_regularization: f64,
}

impl<B: Backend> Seq2SeqModel<B> {
    pub fn encode(
        &self,
        input_ids: Tensor<B, 2, Int>,
        input_lengths: Tensor<B, 1, Int>,
        keep_prob: f64,
    ) -> EncoderOutput<B> {
        self.encoder.forward(input_ids, input_lengths, keep_prob)
    }

    /// Teacher-forced logits [batch, L, V].
    ///
    /// The decoder input at step t is the gold token at t-1, with the
    /// start token at step 0. Dropout follows `keep_prob`; pass 1.0 for
    /// evaluation.
    pub fn forward_train(
        &self,
        input_ids: Tensor<B, 2, Int>,
        input_lengths: Tensor<B, 1, Int>,
        output_ids: Tensor<B, 2, Int>,
        output_lengths: Tensor<B, 1, Int>,
        keep_prob: f64,
    ) -> Tensor<B, 3> {
        let encoded = self.encode(input_ids, input_lengths, keep_prob);
        let decoder_inputs = shift_right(output_ids, self.start);
        self.decoder.forward_train(decoder_inputs, output_lengths, &encoded, keep_prob)
    }

    /// Full training objective for one batch: masked cross-entropy with the
    /// training sanity checks, plus the L2 penalty.
    pub fn loss(
        &self,
        input_ids: Tensor<B, 2, Int>,
        input_lengths: Tensor<B, 1, Int>,
        output_ids: Tensor<B, 2, Int>,
        output_lengths: Tensor<B, 1, Int>,
    ) -> Result<Tensor<B, 1>, LossError> {
        let logits = self.forward_train(
            input_ids,
            input_lengths,
            output_ids.clone(),
            output_lengths.clone(),
            self.keep_prob,
        );
        let data_loss = sequence_loss(logits, output_ids, output_lengths, self.end)?;
        Ok(data_loss + self.l2_penalty())
    }

    /// l2_regularization · Σ‖W‖² / 2
    pub fn l2_penalty(&self) -> Tensor<B, 1> {
        let squared = self.encoder.rnn.weight_penalty() + self.decoder.weight_penalty();
        squared.mul_scalar(self.l2_regularization / 2.0)
    }
}

/// [y0, y1, .., y_{L-1}] → [start, y0, .., y_{L-2}]
pub fn shift_right<B: Backend>(output_ids: Tensor<B, 2, Int>, start: usize) -> Tensor<B, 2, Int> {
    let [batch, steps] = output_ids.dims();
    let device = output_ids.device();
    let starts = Tensor::<B, 2, Int>::ones([batch, 1], &device).mul_scalar(start as i64);
    if steps <= 1 {
        return starts;
    }
    let prefix = output_ids.slice([0..batch, 0..steps - 1]);
    Tensor::cat(vec![starts, prefix], 1)
}
