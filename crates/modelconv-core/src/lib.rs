//! # modelconv-core
//!
//! Converts a source model into a target model with a transformation
//! program, then streams the target model out as a JSON document.
//!
//! - [`Pipeline`] sequences loading, transformation and extraction and
//!   releases every store handle on every exit path.
//! - [`JsonExtractor`] walks a model schema-first and writes JSON without
//!   building the document in memory.
//! - [`HandleStore`], [`Injector`], [`TransformationEngine`] and
//!   [`Extractor`] are the seams; [`MemoryStore`], [`JsonInjector`] and
//!   [`MappingEngine`] are the bundled implementations.
//!
//! ## Example
//!
//! ```rust,no_run
//! use modelconv_core::{launch, JsonExtractor, JsonInjector, LaunchRequest};
//!
//! let request = LaunchRequest {
//!     src_model: "input/M-Vehicle.json".into(),
//!     src_schema: "input/ProbeVehicle.schema.json".into(),
//!     src_schema_name: "ProbeVehicle".into(),
//!     dst_model: "outFIWARE.json".into(),
//!     dst_schema: "input/Fiware.schema.json".into(),
//!     dst_schema_name: "Fiware".into(),
//!     program: "Probe2Fiware.program.json".into(),
//! };
//! launch(&request, &JsonInjector::new(), &JsonExtractor::new()).unwrap();
//! ```

pub mod config;
pub mod engine;
pub mod error;
pub mod extract;
pub mod inject;
pub mod model;
pub mod pipeline;
pub mod schema;
pub mod store;
pub mod uri;

pub use config::{EngineParams, ExtractOptions, ExtractorConfig, LaunchRequest, DEFAULT_ROOT_TYPE};
pub use engine::{LaunchMode, MappingEngine, NullProgress, ProgressSink, TransformationEngine};
pub use error::{ConvertError, EngineError, ExtractError, LaunchError, LoadError, SchemaError, StoreError};
pub use extract::{Destination, Extractor, JsonExtractor};
pub use inject::{Injector, JsonInjector};
pub use model::{Element, ElementId, FeatureValue, Model, Scalar};
pub use pipeline::{HandleScope, Pipeline, Stage};
pub use schema::{Feature, FeatureKind, Multiplicity, Schema, TypeDef, ValueKind};
pub use store::{Handle, HandleStore, MemoryStore, ModelHandle, SchemaHandle};
pub use uri::{file_uri, resolve_file_uri, to_file_path};

/// Run one conversion with a fresh [`MemoryStore`] and [`MappingEngine`].
pub fn launch(
    request: &LaunchRequest,
    injector: &dyn Injector,
    extractor: &dyn Extractor,
) -> Result<(), LaunchError> {
    Pipeline::new(MemoryStore::new(), MappingEngine::new()).launch(request, injector, extractor)
}
