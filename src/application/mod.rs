// ============================================================
// Layer 2 — Application / Use Cases
// ============================================================
// Orchestrates the other layers to accomplish one goal
// (training a parser or parsing a sentence).
//
// Rules for this layer:
//   - No tensor code here (that's Layer 5)
//   - No printing here (that's Layer 1)
//   - Only workflow coordination
//
// Reference: Clean Architecture pattern
//            Rust Book §7 (Module System)

// Benchmark selection and configuration assembly
pub mod setup;

// The training workflow
pub mod train_use_case;

// The sentence parsing workflow
pub mod parse_use_case;
