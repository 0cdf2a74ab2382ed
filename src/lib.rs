//! Greedy text generation over an ONNX decoder.
//!
//! The library exposes the pieces used by the `generate` binary: the
//! vocabulary and tokenizer, the numeric helpers, the engine boundary with its
//! tract-backed implementation, and the generation pipeline.

pub mod config;
pub mod engine;
pub mod error;
pub mod generation;
pub mod numeric;
pub mod onnx;
pub mod tokenizer;
pub mod vocab;

pub use config::Config;
pub use engine::{InferenceEngine, ModelInputs};
pub use error::{EngineError, GenerateError, LoadError, NumericError};
pub use generation::{Completion, Pipeline, Progress, RunState, StopReason};
pub use onnx::OnnxEngine;
pub use tokenizer::{Cleanup, Tokenizer};
pub use vocab::Vocabulary;
