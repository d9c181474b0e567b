//! Configuration for a conversion run.
//!
//! ## Serialization Format
//!
//! Fields are serialized in `kebab-case` (e.g., `src-model`, `max-depth`).
//! This naming convention is part of the contract for launch files.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Root type used when none is configured.
pub const DEFAULT_ROOT_TYPE: &str = "Root";

/// Everything one [`crate::Pipeline::launch`] needs to locate its inputs and
/// output.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct LaunchRequest {
    /// Source model file.
    pub src_model: PathBuf,
    /// Source schema file.
    pub src_schema: PathBuf,
    /// Name the program uses for the source schema.
    pub src_schema_name: String,
    /// Output document path.
    pub dst_model: PathBuf,
    /// Destination schema file.
    pub dst_schema: PathBuf,
    /// Name the program uses for the destination schema.
    pub dst_schema_name: String,
    /// Compiled transformation program.
    pub program: PathBuf,
}

impl LaunchRequest {
    /// Resolve relative file paths against `base`, e.g. the directory of the
    /// launch file they were read from. Absolute paths are kept.
    pub fn relative_to(mut self, base: &Path) -> Self {
        for path in [
            &mut self.src_model,
            &mut self.src_schema,
            &mut self.dst_model,
            &mut self.dst_schema,
            &mut self.program,
        ] {
            if path.is_relative() {
                *path = base.join(&*path);
            }
        }
        self
    }
}

/// Open option bag passed to [`crate::Extractor::extract`].
///
/// No keys are interpreted yet; the bag is accepted and ignored so callers
/// can pass forward-looking settings (e.g. `pretty`) without breaking.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ExtractOptions {
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl ExtractOptions {
    pub fn is_empty(&self) -> bool {
        self.extra.is_empty()
    }
}

/// Open parameter bag for [`crate::TransformationEngine`] calls.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct EngineParams {
    #[serde(flatten)]
    pub values: Map<String, Value>,
}

/// Settings of the JSON extractor itself (as opposed to per-call options).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case", default)]
pub struct ExtractorConfig {
    /// Type whose instances become top-level entries. Default: `Root`.
    pub root_type: String,
    /// Maximum reference nesting depth before extraction fails
    /// (stack overflow and cycle guard). Default: 512.
    pub max_depth: usize,
}

impl Default for ExtractorConfig {
    fn default() -> Self {
        Self {
            root_type: DEFAULT_ROOT_TYPE.to_string(),
            max_depth: 512,
        }
    }
}
