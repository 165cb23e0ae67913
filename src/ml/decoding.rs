// ============================================================
// Layer 5 — Grammar-Constrained Greedy Decoding
// ============================================================
// At every step, for every example still decoding:
//
//   1. ask the grammar which tokens may come next
//   2. pick the highest-scoring of those (ties → lowest id)
//   3. feed it back into the decoder and advance the grammar
//
// An example stops when it emits the end token (Completed), when
// the grammar offers no continuation (GrammarExhausted), or after
// max_length steps (MaxLength). Stopped examples keep feeding the
// end token so the batch can step in lockstep; the loop exits
// early once every example has stopped.
//
// The returned logits have every token the grammar did not allow
// at that step filled with MASKED_SCORE.

use burn::{prelude::*, tensor::TensorData};

use crate::domain::grammar::{Grammar, GrammarState};
use crate::ml::attention::MASKED_SCORE;
use crate::ml::model::Seq2SeqModel;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DecodeStatus {
    /// The end token was chosen
    Completed,
    /// The grammar had no legal continuation
    GrammarExhausted,
    /// max_length tokens were produced without reaching the end token
    MaxLength,
}

/// One decoded program (without the end token).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DecodedProgram {
    pub tokens: Vec<usize>,
    pub status: DecodeStatus,
}

impl DecodedProgram {
    pub fn is_complete(&self) -> bool {
        self.status == DecodeStatus::Completed
    }
}

pub struct Prediction<B: Backend> {
    /// [batch, steps, output_size]; steps ≤ max_length
    pub logits:   Tensor<B, 3>,
    pub programs: Vec<DecodedProgram>,
}

/// Highest-scoring id among `valid`. Ties go to the lowest id; NaN scores
/// are never chosen.
pub fn select_token(scores: &[f32], valid: &[usize]) -> Option<usize> {
    let mut best: Option<(usize, f32)> = None;
    for &id in valid {
        let Some(&score) = scores.get(id) else { continue };
        if score.is_nan() {
            continue;
        }
        match best {
            Some((best_id, best_score)) if score < best_score || (score == best_score && id > best_id) => {}
            _ => best = Some((id, score)),
        }
    }
    best.map(|(id, _)| id)
}

/// Per-example decoding progress.
struct Cursor {
    state:   GrammarState,
    tokens:  Vec<usize>,
    status:  Option<DecodeStatus>,
}

impl Cursor {
    fn new(grammar: &dyn Grammar) -> Self {
        Self { state: grammar.initial_state(), tokens: Vec::new(), status: None }
    }

    /// Choose this example's next token from its row of `scores` and mark
    /// the ids it was allowed to pick in `allowed`. Returns the id to feed
    /// back into the decoder.
    fn step(&mut self, example: usize, scores: &[f32], grammar: &dyn Grammar, allowed: &mut [bool]) -> usize {
        let end = grammar.end();
        if self.status.is_some() {
            allowed[end] = true;
            return end;
        }

        let valid = grammar.valid_tokens(self.state);
        let next = select_token(scores, valid)
            .and_then(|token| grammar.advance(self.state, token).map(|s| (token, s)));
        match next {
            None => {
                tracing::debug!(
                    "Example {} exhausted the grammar after {:?}",
                    example,
                    grammar.vocabulary().render(&self.tokens)
                );
                allowed[end] = true;
                self.status = Some(DecodeStatus::GrammarExhausted);
                end
            }
            Some((token, next_state)) => {
                let allowed_len = allowed.len();
                for &id in valid.iter().filter(|&&id| id < allowed_len) {
                    allowed[id] = true;
                }
                if token == end {
                    self.status = Some(DecodeStatus::Completed);
                } else {
                    self.tokens.push(token);
                    self.state = next_state;
                }
                token
            }
        }
    }
}

impl<B: Backend> Seq2SeqModel<B> {
    /// Greedy decode of a batch, restricted to grammar-valid tokens.
    pub fn forward_inference(
        &self,
        input_ids: Tensor<B, 2, Int>,
        input_lengths: Tensor<B, 1, Int>,
        grammar: &dyn Grammar,
    ) -> Prediction<B> {
        let [batch, _] = input_ids.dims();
        let device = input_ids.device();
        let encoded = self.encode(input_ids, input_lengths, 1.0);
        let mut state = encoded.final_state.clone();
        let mut cursors: Vec<Cursor> = (0..batch).map(|_| Cursor::new(grammar)).collect();
        let mut previous = vec![grammar.start() as i32; batch];
        let mut step_logits = Vec::with_capacity(self.max_length);

        for _ in 0..self.max_length {
            let prev = Tensor::<B, 1, Int>::from_ints(previous.as_slice(), &device);
            let (logits, next_state) = self.decoder.step(prev, &state, &encoded);
            state = next_state;

            let [_, vocab] = logits.dims();
            let scores = logits
                .clone()
                .into_data()
                .convert::<f32>()
                .to_vec::<f32>()
                .unwrap_or_default();
            let mut allowed = vec![false; batch * vocab];

            for (b, cursor) in cursors.iter_mut().enumerate() {
                let row = b * vocab..(b + 1) * vocab;
                let row_scores = scores.get(row.clone()).unwrap_or(&[]);
                previous[b] = cursor.step(b, row_scores, grammar, &mut allowed[row]) as i32;
            }

            let allowed = Tensor::<B, 2, Bool>::from_data(TensorData::new(allowed, [batch, vocab]), &device);
            step_logits.push(logits.mask_fill(allowed.bool_not(), MASKED_SCORE));

            if cursors.iter().all(|c| c.status.is_some()) {
                break;
            }
        }

        let programs = cursors
            .into_iter()
            .map(|c| DecodedProgram {
                tokens: c.tokens,
                status: c.status.unwrap_or(DecodeStatus::MaxLength),
            })
            .collect();

        let logits = if step_logits.is_empty() {
            Tensor::zeros([batch, 0, grammar.output_size()], &device)
        } else {
            Tensor::stack(step_logits, 1)
        };
        tracing::debug!("Decoded {} examples in {} steps", batch, logits.dims()[1]);

        Prediction { logits, programs }
    }
}

// ─── Unit Tests ───────────────────────────────────────────────────────────────
#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::embeddings::EmbeddingMatrix;
    use burn::module::Param;

    use crate::domain::grammar::{OutputVocabulary, END_ID};
    use crate::grammar::automaton::tests::toy_grammar;
    use crate::grammar::{FiniteStateGrammar, SimpleGrammar};
    use crate::ml::model::tests::{tiny_config, tiny_embeddings, TestBackend};

    #[test]
    fn test_select_token_respects_valid_set() {
        let scores = [9.0, 1.0, 3.0, 5.0];
        assert_eq!(select_token(&scores, &[1, 2]), Some(2));
        assert_eq!(select_token(&scores, &[]), None);
        assert_eq!(select_token(&scores, &[7]), None);
    }

    #[test]
    fn test_select_token_ties_go_to_lowest_id() {
        let scores = [0.0, 2.0, 2.0, 2.0];
        assert_eq!(select_token(&scores, &[3, 1, 2]), Some(1));
    }

    #[test]
    fn test_select_token_skips_nan() {
        let scores = [0.0, 5.0, f32::NAN, 1.0];
        assert_eq!(select_token(&scores, &[1, 2, 3]), Some(1));
        assert_eq!(select_token(&scores, &[2]), None);
    }

    /// <<EOS>>, <<GO>>, a, c, x
    ///   start --a--> dead   (no way out, not accepting)
    ///   start --c--> done   (accepting)
    ///   start --x--> dead
    fn dead_end_grammar() -> FiniteStateGrammar {
        let mut b = FiniteStateGrammar::builder(OutputVocabulary::new(["a", "c", "x"]));
        let start = b.initial();
        let dead = b.add_state();
        let done = b.add_state();
        b.add_transition(start, "a", dead);
        b.add_transition(start, "x", dead);
        b.add_transition(start, "c", done);
        b.accept(done);
        b.build()
    }

    /// One-hot score row favouring `token`.
    fn favouring(token: usize, vocab: usize) -> Vec<f32> {
        let mut row = vec![0.0; vocab];
        row[token] = 10.0;
        row
    }

    #[test]
    fn test_exhausted_example_does_not_stop_the_batch() {
        let grammar = dead_end_grammar();
        let vocab = grammar.output_size();
        let a = grammar.vocabulary().id("a").unwrap();
        let c = grammar.vocabulary().id("c").unwrap();
        let mut cursors = vec![Cursor::new(&grammar), Cursor::new(&grammar)];

        // step 1: row 0 walks into the dead end, row 1 takes the good branch
        let mut allowed = vec![false; vocab];
        assert_eq!(cursors[0].step(0, &favouring(a, vocab), &grammar, &mut allowed), a);
        let mut allowed = vec![false; vocab];
        assert_eq!(cursors[1].step(1, &favouring(c, vocab), &grammar, &mut allowed), c);

        // step 2: row 0 has nothing legal, row 1 can still end
        let mut allowed = vec![false; vocab];
        assert_eq!(cursors[0].step(0, &favouring(a, vocab), &grammar, &mut allowed), END_ID);
        assert_eq!(cursors[0].status, Some(DecodeStatus::GrammarExhausted));
        assert_eq!(allowed.iter().filter(|&&ok| ok).count(), 1);
        assert!(allowed[END_ID]);

        assert_eq!(cursors[1].status, None);
        let mut allowed = vec![false; vocab];
        assert_eq!(cursors[1].step(1, &favouring(a, vocab), &grammar, &mut allowed), END_ID);
        assert_eq!(cursors[1].status, Some(DecodeStatus::Completed));
        assert_eq!(cursors[1].tokens, vec![c]);

        // finished rows keep feeding the end token
        let mut allowed = vec![false; vocab];
        assert_eq!(cursors[0].step(0, &favouring(c, vocab), &grammar, &mut allowed), END_ID);
        assert_eq!(cursors[0].tokens, vec![a]);
    }

    #[test]
    fn test_forward_inference_reports_grammar_exhaustion() {
        // start --a--> dead: every decode is stuck after one token
        let mut b = FiniteStateGrammar::builder(OutputVocabulary::new(["a", "b", "c"]));
        let start = b.initial();
        let dead = b.add_state();
        b.add_transition(start, "a", dead);
        let grammar = b.build();
        let a = grammar.vocabulary().id("a").unwrap();

        let device = Default::default();
        let cfg = tiny_config(grammar.output_size());
        let model: Seq2SeqModel<TestBackend> = cfg.init(&tiny_embeddings(&cfg), &device);
        let ids = Tensor::<TestBackend, 1, Int>::from_ints([2, 3, 4, 0, 0, 5, 1, 0, 0, 0], &device)
            .reshape([2, 5]);
        let lengths = Tensor::<TestBackend, 1, Int>::from_ints([3, 2], &device);
        let prediction = model.forward_inference(ids, lengths, &grammar);

        for program in &prediction.programs {
            assert_eq!(program.status, DecodeStatus::GrammarExhausted);
            assert_eq!(program.tokens, vec![a]);
            assert!(!program.is_complete());
        }
        // the loop stops once both rows are stuck
        assert_eq!(prediction.logits.dims()[1], 2);
    }

    #[test]
    fn test_forward_inference_stops_at_max_length() {
        let grammar = SimpleGrammar::from_tokens(["go", "stop"]);
        let device = Default::default();
        let cfg = tiny_config(grammar.output_size()).with_max_length(2);
        let mut model: Seq2SeqModel<TestBackend> = cfg.init(&tiny_embeddings(&cfg), &device);

        // never prefer the end token
        let mut bias = vec![0.0f32; grammar.output_size()];
        bias[END_ID] = -100.0;
        model.decoder.projection.bias = Some(Param::from_tensor(Tensor::from_data(
            TensorData::new(bias, [grammar.output_size()]),
            &device,
        )));

        let ids = Tensor::<TestBackend, 1, Int>::from_ints([2, 3], &device).reshape([1, 2]);
        let lengths = Tensor::<TestBackend, 1, Int>::from_ints([2], &device);
        let prediction = model.forward_inference(ids, lengths, &grammar);

        let program = &prediction.programs[0];
        assert_eq!(program.status, DecodeStatus::MaxLength);
        assert_eq!(program.tokens.len(), 2);
        assert!(grammar.valid_next(&program.tokens).contains(&END_ID));
    }

    #[test]
    fn test_untrained_model_only_emits_grammar_programs() {
        let device = Default::default();
        let grammar = toy_grammar();
        for seed in 0..4u64 {
            let cfg = tiny_config(grammar.output_size());
            let embeddings = EmbeddingMatrix::random(cfg.dictionary_size, cfg.embed_size, seed);
            let model: Seq2SeqModel<TestBackend> = cfg.init(&embeddings, &device);

            let ids = Tensor::<TestBackend, 1, Int>::from_ints([2, 3, 4, 0, 0, 5, 1, 0, 0, 0], &device)
                .reshape([2, 5]);
            let lengths = Tensor::<TestBackend, 1, Int>::from_ints([3, 2], &device);
            let prediction = model.forward_inference(ids, lengths, &grammar);

            for program in &prediction.programs {
                assert_eq!(program.status, DecodeStatus::Completed);
                assert!(grammar.accepts(&program.tokens), "rejected {:?}", program.tokens);
            }
        }
    }

    #[test]
    fn test_masked_logits_only_allow_valid_tokens() {
        let device = Default::default();
        let grammar = toy_grammar();
        let cfg = tiny_config(grammar.output_size());
        let model: Seq2SeqModel<TestBackend> = cfg.init(&tiny_embeddings(&cfg), &device);

        let ids = Tensor::<TestBackend, 1, Int>::from_ints([2, 3, 0, 0, 0], &device).reshape([1, 5]);
        let lengths = Tensor::<TestBackend, 1, Int>::from_ints([2], &device);
        let prediction = model.forward_inference(ids, lengths, &grammar);

        let [_, steps, vocab] = prediction.logits.dims();
        assert!(steps >= 2);
        let first: Vec<f32> = prediction
            .logits
            .slice([0..1, 0..1, 0..vocab])
            .into_data()
            .to_vec::<f32>()
            .unwrap();
        let allowed: Vec<usize> = grammar.valid_next(&[]);
        for (id, &score) in first.iter().enumerate() {
            assert_eq!(score > MASKED_SCORE / 2.0, allowed.contains(&id), "token {id}");
        }
        assert!(first[END_ID] <= MASKED_SCORE / 2.0);
    }
}
