//! Softmax and argmax over a row of logits.

use crate::error::NumericError;
use ndarray::{Array1, ArrayView1};

/// Numerically stable softmax: the maximum is subtracted before `exp`.
pub fn softmax(scores: ArrayView1<'_, f32>) -> Result<Array1<f32>, NumericError> {
    if scores.is_empty() {
        return Err(NumericError::EmptyInput);
    }
    let max = scores.iter().cloned().fold(f32::NEG_INFINITY, f32::max);
    let exps = scores.mapv(|v| (v - max).exp());
    let sum: f32 = exps.sum();
    if !sum.is_finite() || sum <= 0.0 {
        return Err(NumericError::Degenerate);
    }
    Ok(exps / sum)
}

/// Index of the first maximum. Ties keep the earliest index.
pub fn argmax(scores: ArrayView1<'_, f32>) -> Result<usize, NumericError> {
    let mut iter = scores.iter().enumerate();
    let (mut best, mut best_val) = match iter.next() {
        Some((i, &v)) => (i, v),
        None => return Err(NumericError::EmptyInput),
    };
    for (i, &v) in iter {
        if v > best_val {
            best = i;
            best_val = v;
        }
    }
    Ok(best)
}
