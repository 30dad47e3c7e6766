//! ijwi-lib — Speech service engine.
//!
//! Model resolution and download, ONNX inference, the synthesis pipeline,
//! service lifecycle, and HTTP API. Depends on ijwi-core for pure types,
//! the tokenizer, and WAV framing.

pub mod config;
pub mod engine;
pub mod error;
pub mod hub;
pub mod model;
pub mod server;
pub mod service;

// Re-export ijwi-core for convenience
pub use ijwi_core;
