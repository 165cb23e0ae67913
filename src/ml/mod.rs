// ============================================================
// Layer 5 — ML / Model Layer (Burn)
// ============================================================
// All tensor code lives here. The other layers hand in id
// vectors and get back losses, checkpoints and token ids.
//
//   config.rs     — Seq2SeqConfig (burn Config) and the
//                   serialisable Hyperparameters it is built from
//
//   cell.rs       — LSTM / GRU / tanh recurrent cells and the
//                   stacked, length-masked RNN they form
//
//   attention.rs  — Luong attention over encoder states with a
//                   length-masked softmax
//
//   encoder.rs    — pretrained embeddings + stacked RNN
//
//   decoder.rs    — output embeddings, stacked RNN seeded with
//                   the encoder state, attention, projection
//
//   model.rs      — Seq2SeqModel: teacher-forced forward pass,
//                   loss with L2 penalty
//
//   decoding.rs   — greedy grammar-constrained inference
//
//   loss.rs       — masked sequence cross-entropy and the
//                   sanity checks that abort training
//
//   trainer.rs    — RMSProp step, epoch loop, dev evaluation
//
//   inferencer.rs — loads a checkpoint and parses sentences
//
// Reference: Burn Book §3 (Building Blocks)
//            Burn Book §5 (Training)
//            Luong et al. (2015) Effective Approaches to
//            Attention-based Neural Machine Translation

/// Model configuration and hyperparameters
pub mod config;

/// Recurrent cells
pub mod cell;

/// Luong attention
pub mod attention;

/// Sentence encoder
pub mod encoder;

/// Program decoder
pub mod decoder;

/// Encoder-decoder model
pub mod model;

/// Grammar-constrained decoding
pub mod decoding;

/// Sequence loss
pub mod loss;

/// Training loop with evaluation and checkpointing
pub mod trainer;

/// Inference engine — loads checkpoint and parses sentences
pub mod inferencer;
