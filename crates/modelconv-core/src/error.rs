//! Error types for the conversion pipeline.
//!
//! Each collaborator has its own leaf enum; [`ConvertError`] unifies them so
//! pipeline stages can use `?`, and [`LaunchError`] pins a failure to the
//! [`Stage`] it happened in.

use std::io;
use std::path::PathBuf;

use thiserror::Error;

use crate::pipeline::Stage;

#[derive(Debug, Error)]
pub enum ConvertError {
    #[error("Invalid URI {uri}: {source}")]
    InvalidUri {
        uri: String,
        #[source]
        source: url::ParseError,
    },

    #[error("cannot resolve path {}: {source}", .path.display())]
    UnresolvablePath {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("Load error: {0}")]
    Load(#[from] LoadError),

    #[error("Transformation error: {0}")]
    Transformation(#[from] EngineError),

    #[error("Extraction error: {0}")]
    Extraction(#[from] ExtractError),

    #[error("Schema error: {0}")]
    Schema(#[from] SchemaError),

    #[error("Handle store error: {0}")]
    Store(#[from] StoreError),
}

/// Violations of the data model: unknown names and values that do not fit
/// the declared feature.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum SchemaError {
    #[error("unknown type '{name}'")]
    UnknownType { name: String },

    #[error("duplicate type '{name}'")]
    DuplicateType { name: String },

    #[error("type '{type_name}' has no feature '{feature}'")]
    UnknownFeature { type_name: String, feature: String },

    #[error("inheritance cycle through type '{name}'")]
    InheritanceCycle { name: String },

    #[error("feature '{feature}' expects {expected}")]
    ValueMismatch { feature: String, expected: String },

    #[error("feature '{feature}' references unknown element {target}")]
    DanglingReference { feature: String, target: String },

    #[error("no element {id} in model")]
    UnknownElement { id: String },

    #[error("duplicate element id '{id}'")]
    DuplicateElement { id: String },
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum StoreError {
    #[error("unknown or released handle {0}")]
    UnknownHandle(u64),

    #[error("schema handle {0} has not been populated")]
    SchemaNotPopulated(u64),

    #[error("schema handle {0} is already populated")]
    SchemaAlreadyPopulated(u64),
}

#[derive(Debug, Error)]
pub enum LoadError {
    #[error("failed to read {}: {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("malformed document {}: {source}", .path.display())]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("invalid content in {}: {source}", .path.display())]
    Invalid {
        path: PathBuf,
        #[source]
        source: SchemaError,
    },

    #[error(transparent)]
    Store(#[from] StoreError),
}

/// Failure reported by a transformation engine. The message is surfaced
/// verbatim to the caller.
#[derive(Debug, Error)]
pub enum EngineError {
    #[error("{0}")]
    Failed(String),

    #[error("failed to open program {}: {source}", .path.display())]
    Program {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("malformed program: {0}")]
    MalformedProgram(#[from] serde_json::Error),

    #[error(transparent)]
    Schema(#[from] SchemaError),

    #[error(transparent)]
    Store(#[from] StoreError),
}

#[derive(Debug, Error)]
pub enum ExtractError {
    #[error("cannot open {} for writing: {source}", .path.display())]
    Open {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("cannot move finished document into place at {}: {source}", .path.display())]
    Persist {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("write failed: {0}")]
    Io(#[from] io::Error),

    #[error("nesting depth exceeded at feature '{feature}' (max: {max_depth})")]
    DepthExceeded { feature: String, max_depth: usize },

    #[error(transparent)]
    Schema(#[from] SchemaError),

    #[error(transparent)]
    Store(#[from] StoreError),
}

/// A failed [`crate::Pipeline::launch`]: the stage that failed and why.
#[derive(Debug, Error)]
#[error("{stage} failed: {source}")]
pub struct LaunchError {
    pub stage: Stage,
    #[source]
    pub source: ConvertError,
}

impl LaunchError {
    pub fn new(stage: Stage, source: impl Into<ConvertError>) -> Self {
        Self {
            stage,
            source: source.into(),
        }
    }
}
