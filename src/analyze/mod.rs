// src/analyze/mod.rs
//! Article analysis: the language-model classify + extract step.

pub mod extractor;

pub use extractor::{build_extractor, DynExtractor, SightingExtractor, SightingVerdict};
