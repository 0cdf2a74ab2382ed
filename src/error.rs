//! Error types shared by the library components.

use std::path::PathBuf;
use thiserror::Error;

/// Failure to resolve or parse a bundled resource.
#[derive(Error, Debug)]
pub enum LoadError {
    #[error("resource not found: {}", .0.display())]
    NotFound(PathBuf),

    #[error("failed to read {}: {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse {what}: {source}")]
    Parse {
        what: String,
        #[source]
        source: serde_json::Error,
    },

    #[error("token id {id} is assigned to both {first:?} and {second:?}")]
    DuplicateId {
        id: u32,
        first: String,
        second: String,
    },

    #[error("token {token:?} is assigned to both {first} and {second}")]
    DuplicateToken {
        token: String,
        first: u32,
        second: u32,
    },

    #[error(transparent)]
    Engine(#[from] EngineError),
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum NumericError {
    #[error("empty input")]
    EmptyInput,

    #[error("scores do not form a distribution")]
    Degenerate,
}

#[derive(Error, Debug)]
pub enum EngineError {
    #[error("failed to create inference session: {0}")]
    Session(String),

    #[error("inference failed: {0}")]
    Inference(String),

    #[error("model has no input named {0:?}")]
    MissingInput(String),

    #[error("model expects an input named {0:?} which is never provided")]
    UnsupportedInput(String),

    #[error("unexpected model output: {0}")]
    UnexpectedOutput(String),
}

/// Errors surfaced by a generation request.
#[derive(Error, Debug)]
pub enum GenerateError {
    #[error("invalid token budget {0:?}: expected a positive integer")]
    InvalidBudget(String),

    #[error("prompt produced no tokens")]
    EmptyPrompt,

    #[error(transparent)]
    Engine(#[from] EngineError),

    #[error(transparent)]
    Numeric(#[from] NumericError),
}
