//! ONNX decoder executed with tract.
//!
//! The model file is memory-mapped and parsed once. Graph inputs are bound by
//! name, so the order in which the exporter declared them does not matter.

use crate::engine::{InferenceEngine, ModelInputs, ATTENTION_MASK, INPUT_IDS, LOGITS};
use crate::error::{EngineError, LoadError};
use memmap2::MmapOptions;
use ndarray::Array3;
use std::fs::File;
use std::path::Path;
use tract_onnx::prelude::*;

pub struct OnnxEngine {
    plan: TypedRunnableModel<TypedModel>,
    input_names: Vec<String>,
    output_index: usize,
}

impl OnnxEngine {
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, LoadError> {
        let path = path.as_ref();
        if !path.exists() {
            return Err(LoadError::NotFound(path.to_path_buf()));
        }
        let io_err = |source| LoadError::Io {
            path: path.to_path_buf(),
            source,
        };
        let file = File::open(path).map_err(io_err)?;
        let mmap = unsafe { MmapOptions::new().map(&file).map_err(io_err)? };

        let session = |e: TractError| EngineError::Session(format!("{e:#}"));
        let model = tract_onnx::onnx()
            .model_for_read(&mut &mmap[..])
            .map_err(session)?;

        let input_names = Self::input_names(&model)?;
        let output_index = Self::output_index(&model)?;

        let plan = model
            .into_optimized()
            .and_then(|m| m.into_runnable())
            .map_err(session)?;

        log::info!(
            "loaded {} (inputs: {:?}, output #{})",
            path.display(),
            input_names,
            output_index
        );
        Ok(Self {
            plan,
            input_names,
            output_index,
        })
    }

    fn input_names(model: &InferenceModel) -> Result<Vec<String>, EngineError> {
        let outlets = model
            .input_outlets()
            .map_err(|e| EngineError::Session(format!("{e:#}")))?;
        let names: Vec<String> = outlets
            .iter()
            .map(|o| model.node(o.node).name.clone())
            .collect();

        if !names.iter().any(|n| n == INPUT_IDS) {
            return Err(EngineError::MissingInput(INPUT_IDS.to_string()));
        }
        if !names.iter().any(|n| n == ATTENTION_MASK) {
            log::warn!("model has no {ATTENTION_MASK:?} input; it will not be fed");
        }
        if let Some(extra) = names
            .iter()
            .find(|n| n.as_str() != INPUT_IDS && n.as_str() != ATTENTION_MASK)
        {
            return Err(EngineError::UnsupportedInput(extra.clone()));
        }
        Ok(names)
    }

    fn output_index(model: &InferenceModel) -> Result<usize, EngineError> {
        let outlets = model
            .output_outlets()
            .map_err(|e| EngineError::Session(format!("{e:#}")))?;
        if outlets.is_empty() {
            return Err(EngineError::UnexpectedOutput("model has no outputs".into()));
        }
        let named = outlets.iter().position(|o| {
            model.outlet_label(*o) == Some(LOGITS) || model.node(o.node).name == LOGITS
        });
        Ok(named.unwrap_or_else(|| {
            log::warn!("no output named {LOGITS:?}, reading the first output");
            0
        }))
    }
}

impl InferenceEngine for OnnxEngine {
    fn run(&mut self, inputs: &ModelInputs) -> Result<Array3<f32>, EngineError> {
        let seq_len = inputs.seq_len();
        let mut feeds: TVec<TValue> = tvec!();
        for name in &self.input_names {
            let array = inputs
                .get(name)
                .ok_or_else(|| EngineError::UnsupportedInput(name.clone()))?;
            let data: Vec<i64> = array.iter().copied().collect();
            let tensor = Tensor::from_shape(&[1, seq_len], &data)
                .map_err(|e| EngineError::Inference(format!("{e:#}")))?;
            feeds.push(tensor.into());
        }

        let outputs = self
            .plan
            .run(feeds)
            .map_err(|e| EngineError::Inference(format!("{e:#}")))?;
        let output = outputs.get(self.output_index).ok_or_else(|| {
            EngineError::UnexpectedOutput(format!("missing output #{}", self.output_index))
        })?;
        let view = output
            .to_array_view::<f32>()
            .map_err(|e| EngineError::UnexpectedOutput(format!("{e:#}")))?;

        let shape = view.shape().to_vec();
        if shape.len() != 3 {
            return Err(EngineError::UnexpectedOutput(format!(
                "expected a rank-3 logits tensor, got shape {:?}",
                shape
            )));
        }
        Array3::from_shape_vec((shape[0], shape[1], shape[2]), view.iter().copied().collect())
            .map_err(|e| EngineError::UnexpectedOutput(e.to_string()))
    }
}
