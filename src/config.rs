//! Runtime configuration.
//!
//! Every field has a default matching the bundled TinyLlama export, so a JSON
//! config file only needs to name what it changes.

use crate::error::LoadError;
use crate::generation::{GenerationOptions, DEFAULT_EOS_ID};
use crate::tokenizer::{Cleanup, Replacement, DEFAULT_SEPARATOR_ID, UNKNOWN_TOKEN};
use serde::Deserialize;
use std::path::{Path, PathBuf};

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Config {
    /// Directory the vocabulary and model paths are resolved against.
    pub resource_dir: PathBuf,
    pub vocab_file: PathBuf,
    pub model_file: PathBuf,
    pub separator_token_id: u32,
    pub eos_token_id: Option<u32>,
    pub unknown_token: String,
    /// Substitutions applied to decoded text, in order.
    pub replacements: Vec<Replacement>,
    pub preamble: Option<String>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            resource_dir: PathBuf::from("res").join("TinyLlama"),
            vocab_file: PathBuf::from("vocab.json"),
            model_file: PathBuf::from("onnx").join("decoder_model.onnx"),
            separator_token_id: DEFAULT_SEPARATOR_ID,
            eos_token_id: Some(DEFAULT_EOS_ID),
            unknown_token: UNKNOWN_TOKEN.to_string(),
            replacements: Cleanup::default().rules().to_vec(),
            preamble: None,
        }
    }
}

impl Config {
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, LoadError> {
        let path = path.as_ref();
        if !path.exists() {
            return Err(LoadError::NotFound(path.to_path_buf()));
        }
        let text = std::fs::read_to_string(path).map_err(|source| LoadError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        serde_json::from_str(&text).map_err(|source| LoadError::Parse {
            what: path.display().to_string(),
            source,
        })
    }

    pub fn vocab_path(&self) -> PathBuf {
        self.resource_dir.join(&self.vocab_file)
    }

    pub fn model_path(&self) -> PathBuf {
        self.resource_dir.join(&self.model_file)
    }

    pub fn cleanup(&self) -> Cleanup {
        Cleanup::new(self.replacements.clone())
    }

    pub fn generation_options(&self) -> GenerationOptions {
        GenerationOptions {
            eos_token_id: self.eos_token_id,
            preamble: self.preamble.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    #[test]
    fn test_defaults() {
        let config = Config::default();
        assert_eq!(config.vocab_path(), Path::new("res/TinyLlama/vocab.json"));
        assert_eq!(
            config.model_path(),
            Path::new("res/TinyLlama/onnx/decoder_model.onnx")
        );
        assert_eq!(config.separator_token_id, 13);
        assert_eq!(config.eos_token_id, Some(2));
        assert_eq!(config.cleanup(), Cleanup::default());
    }

    #[test]
    fn test_partial_file_keeps_defaults() {
        let mut file = NamedTempFile::new().unwrap();
        write!(
            file,
            r#"{{
                "resource_dir": "/opt/models/gpt2",
                "eos_token_id": null,
                "replacements": [{{"from": "Ġ", "to": " "}}]
            }}"#
        )
        .unwrap();

        let config = Config::load(file.path()).unwrap();
        assert_eq!(config.vocab_path(), Path::new("/opt/models/gpt2/vocab.json"));
        assert_eq!(config.eos_token_id, None);
        assert_eq!(config.separator_token_id, 13);
        assert_eq!(config.cleanup().apply("\u{0120}hi"), " hi");
        assert_eq!(config.generation_options().eos_token_id, None);
    }

    #[test]
    fn test_unknown_field_rejected() {
        let mut file = NamedTempFile::new().unwrap();
        write!(file, r#"{{"max_tokens": 5}}"#).unwrap();
        assert!(matches!(Config::load(file.path()), Err(LoadError::Parse { .. })));
    }

    #[test]
    fn test_missing_file() {
        assert!(matches!(
            Config::load("/nonexistent/onnx-generate.json"),
            Err(LoadError::NotFound(_))
        ));
    }
}
