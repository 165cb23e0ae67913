// ============================================================
// Layer 4 — Data Pipeline
// ============================================================
// Everything from files on disk to tensor batches.
//
//   dictionary file ──▶ InputVocabulary  (word → id)
//   vectors file    ──▶ EmbeddingMatrix  (id → pretrained row)
//
//   train/dev .tsv
//       │
//       ▼
//   TsvExampleLoader  → sentence/program pairs
//       │
//       ▼
//   encode_examples   → padded ids + lengths (Seq2SeqDataset)
//       │
//       ▼
//   split_train_dev   → held-out dev set when none is given
//       │
//       ▼
//   Seq2SeqBatcher    → [batch, L] tensors for the model
//
// Reference: Burn Book §4 (Datasets)
//            Rust Book §13 (Iterators and Closures)

/// Input word dictionary backed by a WordLevel tokenizer
pub mod dictionary;

/// Pretrained GloVe-style input embeddings
pub mod embeddings;

/// Tab-separated dataset files
pub mod loader;

/// Encoding examples into padded id sequences
pub mod dataset;

/// Stacking samples into tensor batches
pub mod batcher;

/// Seeded train/dev split
pub mod splitter;
