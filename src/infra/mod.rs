// ============================================================
// Layer 6 — Infrastructure Layer
// ============================================================
// Everything that touches the checkpoint directory:
//
//   checkpoint.rs      — Saving and loading model weights
//                        with Burn's CompactRecorder, plus the
//                        run and model configs as JSON so the
//                        parser can rebuild the model.
//
//   tokenizer_store.rs — Input vocabulary persistence, so
//                        training and parsing share one
//                        word → id mapping.
//
//   metrics.rs         — Per-epoch loss and dev accuracy
//                        appended to a CSV file.
//
// Reference: Rust Book §7 (Modules)
//            Burn Book §5 (Checkpointing)

/// Model checkpoint saving and loading
pub mod checkpoint;

/// Input vocabulary saving and loading
pub mod tokenizer_store;

/// Training metrics CSV logger
pub mod metrics;
