// ============================================================
// Layer 5 — Inferencer
// ============================================================
// Sentence in, program out:
//
//   "show me my emails"
//        │ InputVocabulary::encode + pad to max_length
//        ▼
//   [1, L] ids, [1] length
//        │ Seq2SeqModel::forward_inference (grammar-constrained)
//        ▼
//   DecodedProgram → "query tt:gmail.inbox"
//
// Runs on the plain Wgpu backend (no autodiff), so dropout is
// disabled.

use anyhow::Result;
use burn::prelude::*;
use std::sync::Arc;

use crate::data::{
    batcher::Seq2SeqBatcher,
    dataset::encode_sentence,
    dictionary::InputVocabulary,
    embeddings::EmbeddingMatrix,
};
use crate::domain::grammar::Grammar;
use crate::infra::checkpoint::CheckpointManager;
use crate::ml::config::Seq2SeqConfig;
use crate::ml::decoding::DecodedProgram;
use crate::ml::model::Seq2SeqModel;

pub type InferBackend = burn::backend::Wgpu;

pub struct Inferencer<B: Backend> {
    model:   Seq2SeqModel<B>,
    vocab:   InputVocabulary,
    grammar: Arc<dyn Grammar>,
    device:  B::Device,
}

impl Inferencer<InferBackend> {
    /// Rebuild the model from `model_config.json` and load the latest weights.
    pub fn from_checkpoint(
        ckpt_manager: &CheckpointManager,
        vocab: InputVocabulary,
        grammar: Arc<dyn Grammar>,
    ) -> Result<Self> {
        let device = burn::backend::wgpu::WgpuDevice::default();
        let config: Seq2SeqConfig = ckpt_manager.load_model_config()?;

        // Every parameter is overwritten by the checkpoint record.
        let placeholder = EmbeddingMatrix::random(config.dictionary_size, config.embed_size, 0);
        let model: Seq2SeqModel<InferBackend> = config.init(&placeholder, &device);
        let model = ckpt_manager.load_model(model, &device)?;
        tracing::info!("Model loaded from checkpoint");

        Ok(Self::new(model, vocab, grammar, device))
    }
}

impl<B: Backend> Inferencer<B> {
    pub fn new(model: Seq2SeqModel<B>, vocab: InputVocabulary, grammar: Arc<dyn Grammar>, device: B::Device) -> Self {
        Self { model, vocab, grammar, device }
    }

    /// Decode one sentence.
    pub fn predict(&self, sentence: &str) -> Result<DecodedProgram> {
        let (ids, length) = encode_sentence(sentence, &self.vocab, self.model.max_length)?;
        if length == 0 {
            anyhow::bail!("Cannot parse an empty sentence");
        }

        let batcher = Seq2SeqBatcher::<B>::new(self.device.clone());
        let (input_ids, input_lengths) = batcher.inputs([(ids.as_slice(), length)]);

        let mut prediction = self.model.forward_inference(input_ids, input_lengths, self.grammar.as_ref());
        let [_, steps, _] = prediction.logits.dims();
        let program = prediction
            .programs
            .pop()
            .ok_or_else(|| anyhow::anyhow!("Decoder returned no program"))?;

        tracing::debug!("'{}' → {:?} ({:?} after {} steps)", sentence, program.tokens, program.status, steps);
        Ok(program)
    }

    /// Decode one sentence and render it as output tokens.
    pub fn predict_text(&self, sentence: &str) -> Result<String> {
        let program = self.predict(sentence)?;
        if !program.is_complete() {
            tracing::warn!("Decoding of '{}' stopped early ({:?})", sentence, program.status);
        }
        Ok(self.grammar.vocabulary().render(&program.tokens))
    }
}
