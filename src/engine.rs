//! Boundary to the external inference engine.
//!
//! An engine receives the running context as two `[1, seq_len]` tensors and
//! returns logits shaped `[1, seq_len, vocab_size]`. Only the last position is
//! used by the generation loop.

use crate::error::EngineError;
use ndarray::{s, Array2, Array3, ArrayView1};

pub const INPUT_IDS: &str = "input_ids";
pub const ATTENTION_MASK: &str = "attention_mask";
pub const LOGITS: &str = "logits";

/// Named input tensors for one forward pass.
#[derive(Debug, Clone, PartialEq)]
pub struct ModelInputs {
    pub input_ids: Array2<i64>,
    pub attention_mask: Array2<i64>,
}

impl ModelInputs {
    /// Build inputs from the full context. Every position is attended to.
    pub fn from_context(tokens: &[u32]) -> Self {
        let len = tokens.len();
        let input_ids = Array2::from_shape_fn((1, len), |(_, i)| i64::from(tokens[i]));
        let attention_mask = Array2::ones((1, len));
        Self {
            input_ids,
            attention_mask,
        }
    }

    pub fn seq_len(&self) -> usize {
        self.input_ids.ncols()
    }

    /// Look up an input tensor by its graph name.
    pub fn get(&self, name: &str) -> Option<&Array2<i64>> {
        match name {
            INPUT_IDS => Some(&self.input_ids),
            ATTENTION_MASK => Some(&self.attention_mask),
            _ => None,
        }
    }
}

/// A loaded model able to run one forward pass at a time.
pub trait InferenceEngine {
    fn run(&mut self, inputs: &ModelInputs) -> Result<Array3<f32>, EngineError>;
}

impl<E: InferenceEngine + ?Sized> InferenceEngine for Box<E> {
    fn run(&mut self, inputs: &ModelInputs) -> Result<Array3<f32>, EngineError> {
        (**self).run(inputs)
    }
}

/// Scores for the final sequence position of a `[1, seq_len, vocab]` output.
pub fn last_position_logits(logits: &Array3<f32>) -> Result<ArrayView1<'_, f32>, EngineError> {
    let (batch, seq, vocab) = logits.dim();
    if batch != 1 || seq == 0 || vocab == 0 {
        return Err(EngineError::UnexpectedOutput(format!(
            "expected shape [1, seq_len, vocab], got {:?}",
            logits.shape()
        )));
    }
    Ok(logits.slice(s![0, seq - 1, ..]))
}
