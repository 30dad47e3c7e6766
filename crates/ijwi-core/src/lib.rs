//! ijwi-core — Pure types, tokenizer, and audio framing.
//!
//! No async runtime, no I/O, no platform dependencies.

pub mod tokenizer;
pub mod types;
pub mod wav;
