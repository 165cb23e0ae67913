// ============================================================
// Layer 4 — Encoded Dataset
// ============================================================
// Turns ParseExamples into fixed-length id sequences:
//
//   input_ids   [L]  dictionary ids, padded with <<PAD>> (0)
//   output_ids  [L]  program ids + <<EOS>>, padded with <<EOS>>
//
// plus the true length of each side. The output length counts
// the end token.
//
// Examples are dropped (with a warning) when the program uses a
// token outside the grammar's vocabulary or does not fit in L
// steps once the end token is appended. Sentences longer than L
// are truncated.

use crate::data::dictionary::{InputVocabulary, PAD_ID};
use crate::domain::example::ParseExample;
use crate::domain::grammar::Grammar;

/// One encoded, padded training sample.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Seq2SeqSample {
    pub input_ids:     Vec<u32>,
    pub input_length:  usize,
    pub output_ids:    Vec<u32>,
    pub output_length: usize,
}

impl Seq2SeqSample {
    /// Program ids without the end token.
    pub fn program(&self) -> Vec<usize> {
        self.output_ids[..self.output_length.saturating_sub(1)]
            .iter()
            .map(|&id| id as usize)
            .collect()
    }
}

/// Encode a sentence alone (for parsing) into padded ids + length.
pub fn encode_sentence(
    sentence: &str,
    vocab: &InputVocabulary,
    max_length: usize,
) -> anyhow::Result<(Vec<u32>, usize)> {
    let mut ids = vocab.encode(sentence)?;
    if ids.len() > max_length {
        tracing::debug!("Truncating sentence of {} words to {}", ids.len(), max_length);
        ids.truncate(max_length);
    }
    let length = ids.len();
    ids.resize(max_length, PAD_ID);
    Ok((ids, length))
}

/// Encode one example, or `None` if it cannot be represented.
pub fn encode_example(
    example: &ParseExample,
    vocab: &InputVocabulary,
    grammar: &dyn Grammar,
    max_length: usize,
) -> anyhow::Result<Option<Seq2SeqSample>> {
    let (input_ids, input_length) = encode_sentence(&example.sentence, vocab, max_length)?;

    let mut output_ids = Vec::with_capacity(max_length);
    for token in example.program_tokens() {
        match grammar.vocabulary().id(token) {
            Some(id) => output_ids.push(id as u32),
            None => {
                tracing::warn!("Skipping '{}': unknown output token '{}'", example.sentence, token);
                return Ok(None);
            }
        }
    }
    output_ids.push(grammar.end() as u32);

    if output_ids.len() > max_length {
        tracing::warn!(
            "Skipping '{}': program of {} tokens exceeds max_length {}",
            example.sentence,
            output_ids.len(),
            max_length
        );
        return Ok(None);
    }
    let output_length = output_ids.len();
    output_ids.resize(max_length, grammar.end() as u32);

    Ok(Some(Seq2SeqSample { input_ids, input_length, output_ids, output_length }))
}

/// Encode a list of examples, dropping the ones that cannot be represented.
pub fn encode_examples(
    examples: &[ParseExample],
    vocab: &InputVocabulary,
    grammar: &dyn Grammar,
    max_length: usize,
) -> anyhow::Result<Vec<Seq2SeqSample>> {
    let mut samples = Vec::with_capacity(examples.len());
    let mut outside_grammar = 0usize;
    for example in examples {
        if let Some(sample) = encode_example(example, vocab, grammar, max_length)? {
            if !grammar.accepts(&sample.program()) {
                outside_grammar += 1;
            }
            samples.push(sample);
        }
    }
    if outside_grammar > 0 {
        tracing::warn!("{} gold programs are not accepted by the grammar", outside_grammar);
    }
    tracing::info!("Encoded {}/{} examples", samples.len(), examples.len());
    Ok(samples)
}

pub struct Seq2SeqDataset {
    samples: Vec<Seq2SeqSample>,
}

impl Seq2SeqDataset {
    pub fn new(samples: Vec<Seq2SeqSample>) -> Self {
        Self { samples }
    }

    pub fn samples(&self) -> &[Seq2SeqSample] {
        &self.samples
    }
}
