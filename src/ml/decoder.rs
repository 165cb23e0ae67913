// ============================================================
// Layer 5 — Program Decoder
// ============================================================
// The decoder is seeded with the encoder's final state and runs
// in one of two modes:
//
//   training  → the whole gold sequence (shifted right by the
//               start token) is fed in at once (teacher forcing)
//   inference → one token at a time, driven from forward_inference
//               so the grammar can pick each next token
//
// Per step:
//   e_t    = OutputEmbed(y_{t-1})
//   h_t    = RNN(e_t, h_{t-1})
//   h̃_t    = Attention(h_t, encoder)   (or h_t without attention)
//   logits = U·h̃_t + b_y
//
// Output embeddings are one-hot (a frozen identity matrix) unless
// `train_output_embeddings` is set.

use burn::{
    module::Param,
    nn::{Embedding, EmbeddingConfig, Initializer, Linear, LinearConfig},
    prelude::*,
    tensor::TensorData,
};

use crate::ml::attention::LuongAttention;
use crate::ml::cell::{CellState, RnnState, StackedRnn};
use crate::ml::config::Seq2SeqConfig;
use crate::ml::encoder::EncoderOutput;

#[derive(Module, Debug)]
pub struct Decoder<B: Backend> {
    pub embedding:  Embedding<B>,
    pub rnn:        StackedRnn<B>,
    pub attention:  Option<LuongAttention<B>>,
    pub projection: Linear<B>,
}

impl<B: Backend> Decoder<B> {
    pub fn new(config: &Seq2SeqConfig, device: &B::Device) -> Self {
        let embed_width = config.output_embed_width();
        let embedding = if config.train_output_embeddings {
            EmbeddingConfig::new(config.output_size, embed_width)
                .with_initializer(Initializer::XavierUniform { gain: 1.0 })
                .init(device)
        } else {
            let mut one_hot = EmbeddingConfig::new(config.output_size, embed_width).init(device);
            one_hot.weight = Param::from_tensor(identity::<B>(config.output_size, device));
            one_hot.no_grad()
        };

        let rnn = StackedRnn::new(
            config.rnn_cell_type,
            config.rnn_layers,
            embed_width,
            config.hidden_size,
            device,
        );
        let attention = config
            .apply_attention
            .then(|| LuongAttention::new(config.hidden_size, device));

        let mut projection = LinearConfig::new(config.hidden_size, config.output_size)
            .with_initializer(Initializer::XavierUniform { gain: 1.0 })
            .init(device);
        projection.bias = Some(Param::from_tensor(Tensor::zeros([config.output_size], device)));

        Self { embedding, rnn, attention, projection }
    }

    /// Teacher-forced pass.
    ///
    /// inputs: [batch, L] (start token followed by the gold prefix),
    /// lengths: [batch] → logits [batch, L, output_size]
    pub fn forward_train(
        &self,
        inputs: Tensor<B, 2, Int>,
        lengths: Tensor<B, 1, Int>,
        encoder: &EncoderOutput<B>,
        keep_prob: f64,
    ) -> Tensor<B, 3> {
        let embedded = self.embedding.forward(inputs);
        let (states, _) =
            self.rnn.forward_sequence(embedded, lengths, encoder.final_state.clone(), keep_prob);
        self.project(states, encoder)
    }

    /// One inference step. previous: [batch] → (logits [batch, output_size], next state)
    pub fn step(
        &self,
        previous: Tensor<B, 1, Int>,
        state: &[CellState<B>],
        encoder: &EncoderOutput<B>,
    ) -> (Tensor<B, 2>, RnnState<B>) {
        let [batch] = previous.dims();
        let embedded = self.embedding.forward(previous.reshape([batch, 1]));
        let [_, _, width] = embedded.dims();
        let (output, next) = self.rnn.step(embedded.reshape([batch, width]), state, 1.0);

        let hidden = self.rnn.hidden_size();
        let logits = self.project(output.reshape([batch, 1, hidden]), encoder);
        let [_, _, vocab] = logits.dims();
        (logits.reshape([batch, vocab]), next)
    }

    /// Sum of squared weights of U, V1, V2 and the recurrent gates.
    pub fn weight_penalty(&self) -> Tensor<B, 1> {
        let mut penalty = self.projection.weight.val().powf_scalar(2.0).sum() + self.rnn.weight_penalty();
        if let Some(attention) = &self.attention {
            penalty = penalty + attention.weight_penalty();
        }
        penalty
    }

    fn project(&self, states: Tensor<B, 3>, encoder: &EncoderOutput<B>) -> Tensor<B, 3> {
        let attended = match &self.attention {
            Some(attention) => attention.forward(
                states,
                encoder.hidden_states.clone(),
                encoder.lengths.clone(),
            ),
            None => states,
        };
        self.projection.forward(attended)
    }
}

fn identity<B: Backend>(size: usize, device: &B::Device) -> Tensor<B, 2> {
    let mut values = vec![0.0f32; size * size];
    for i in 0..size {
        values[i * size + i] = 1.0;
    }
    Tensor::from_data(TensorData::new(values, [size, size]), device)
}
