// ============================================================
// Layer 5 — Sentence Encoder
// ============================================================
// input ids [batch, L] ──embedding──▶ [batch, L, E]
//                     ──stacked rnn──▶ [batch, L, H] + final state
//
// The input embedding matrix starts from pretrained word vectors
// and is frozen unless `train_input_embeddings` is set.

use burn::{
    module::Param,
    nn::{Embedding, EmbeddingConfig},
    prelude::*,
    tensor::TensorData,
};

use crate::data::embeddings::EmbeddingMatrix;
use crate::ml::cell::{RnnState, StackedRnn};
use crate::ml::config::Seq2SeqConfig;

/// Everything the decoder needs from the encoder.
#[derive(Debug, Clone)]
pub struct EncoderOutput<B: Backend> {
    /// [batch, L, H], zero past each input length
    pub hidden_states: Tensor<B, 3>,
    /// State after each example's last real input word
    pub final_state:   RnnState<B>,
    /// [batch]
    pub lengths:       Tensor<B, 1, Int>,
}

#[derive(Module, Debug)]
pub struct Encoder<B: Backend> {
    pub embedding: Embedding<B>,
    pub rnn:       StackedRnn<B>,
}

impl<B: Backend> Encoder<B> {
    pub fn new(config: &Seq2SeqConfig, pretrained: &EmbeddingMatrix, device: &B::Device) -> Self {
        assert_eq!(
            pretrained.rows(),
            config.dictionary_size,
            "embedding rows must equal dictionary_size"
        );
        assert_eq!(
            pretrained.width(),
            config.embed_size,
            "embedding width must equal embed_size"
        );
        let mut embedding = EmbeddingConfig::new(config.dictionary_size, config.embed_size).init(device);
        let weights = Tensor::<B, 2>::from_data(
            TensorData::new(pretrained.values().to_vec(), [pretrained.rows(), pretrained.width()]),
            device,
        );
        embedding.weight = Param::from_tensor(weights);
        if !config.train_input_embeddings {
            embedding = embedding.no_grad();
        }

        let rnn = StackedRnn::new(
            config.rnn_cell_type,
            config.rnn_layers,
            config.embed_size,
            config.hidden_size,
            device,
        );
        Self { embedding, rnn }
    }

    pub fn forward(
        &self,
        input_ids: Tensor<B, 2, Int>,
        lengths: Tensor<B, 1, Int>,
        keep_prob: f64,
    ) -> EncoderOutput<B> {
        let [batch, _] = input_ids.dims();
        let device = input_ids.device();
        let embedded = self.embedding.forward(input_ids);
        let initial = self.rnn.zero_state(batch, &device);
        let (hidden_states, final_state) =
            self.rnn.forward_sequence(embedded, lengths.clone(), initial, keep_prob);
        EncoderOutput { hidden_states, final_state, lengths }
    }
}
