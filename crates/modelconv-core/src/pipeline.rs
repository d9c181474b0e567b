//! Pipeline orchestration: load, transform, extract, release.
//!
//! [`Pipeline::launch`] runs the stages in order, each blocking until done:
//!
//! | Stage            | Work                                                  |
//! |------------------|-------------------------------------------------------|
//! | `SchemasLoading` | resolve URIs, create + inject both schemas            |
//! | `ModelsLoading`  | create + inject the source model, create the target   |
//! | `Transforming`   | bind IN/OUT models, run the program                   |
//! | `Extracting`     | serialize the target model                            |
//! | `Released`       | all handles released (terminal)                       |
//!
//! Every handle is acquired through a [`HandleScope`], whose `Drop` releases
//! each one exactly once, so cleanup also runs when a stage fails.

use std::fmt;
use std::fs::File;
use std::io::BufReader;

use crate::config::{EngineParams, ExtractOptions, LaunchRequest};
use crate::engine::{LaunchMode, NullProgress, TransformationEngine};
use crate::error::{ConvertError, EngineError, LaunchError, StoreError};
use crate::extract::{Destination, Extractor};
use crate::inject::Injector;
use crate::store::{Handle, HandleStore, ModelHandle, SchemaHandle};
use crate::uri::resolve_file_uri;

/// Role label of the source model.
pub const IN_LABEL: &str = "IN";
/// Role label of the target model.
pub const OUT_LABEL: &str = "OUT";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    Idle,
    SchemasLoading,
    ModelsLoading,
    Transforming,
    Extracting,
    Released,
    Failed,
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Stage::Idle => "idle",
            Stage::SchemasLoading => "loading schemas",
            Stage::ModelsLoading => "loading models",
            Stage::Transforming => "transforming",
            Stage::Extracting => "extracting",
            Stage::Released => "released",
            Stage::Failed => "failed",
        })
    }
}

// ---------------------------------------------------------------------------
// HandleScope
// ---------------------------------------------------------------------------

/// Exclusive borrow of a store that releases every handle it created when
/// dropped, most recent first.
pub struct HandleScope<'s, S: HandleStore> {
    store: &'s mut S,
    acquired: Vec<Handle>,
}

impl<'s, S: HandleStore> HandleScope<'s, S> {
    pub fn new(store: &'s mut S) -> Self {
        Self {
            store,
            acquired: Vec::new(),
        }
    }

    pub fn new_schema(&mut self) -> SchemaHandle {
        let handle = self.store.new_schema();
        self.acquired.push(handle.into());
        handle
    }

    pub fn new_model(&mut self, schema: SchemaHandle) -> Result<ModelHandle, StoreError> {
        let handle = self.store.new_model(schema)?;
        self.acquired.push(handle.into());
        Ok(handle)
    }

    pub fn store(&self) -> &S {
        &*self.store
    }

    pub fn store_mut(&mut self) -> &mut S {
        &mut *self.store
    }
}

impl<S: HandleStore> Drop for HandleScope<'_, S> {
    fn drop(&mut self) {
        for handle in self.acquired.drain(..).rev() {
            self.store.release(handle);
        }
    }
}

// ---------------------------------------------------------------------------
// Pipeline
// ---------------------------------------------------------------------------

/// Owns a handle store and an engine; runs one launch at a time.
pub struct Pipeline<S, E> {
    store: S,
    engine: E,
    state: Stage,
}

fn at<E: Into<ConvertError>>(stage: Stage) -> impl FnOnce(E) -> LaunchError {
    move |e| LaunchError::new(stage, e)
}

fn enter(state: &mut Stage, next: Stage) {
    tracing::debug!(from = %*state, to = %next, "pipeline stage");
    *state = next;
}

impl<S: HandleStore, E: TransformationEngine> Pipeline<S, E> {
    pub fn new(store: S, engine: E) -> Self {
        Self {
            store,
            engine,
            state: Stage::Idle,
        }
    }

    /// `Released` after a successful launch, `Failed` after a failed one.
    pub fn state(&self) -> Stage {
        self.state
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn engine(&self) -> &E {
        &self.engine
    }

    /// Load both schemas and the source model, run the program into a fresh
    /// target model, and extract it to `request.dst_model`.
    ///
    /// All four handles are released before this returns, whatever the
    /// outcome. On failure the error names the stage that failed.
    pub fn launch(
        &mut self,
        request: &LaunchRequest,
        injector: &dyn Injector,
        extractor: &dyn Extractor,
    ) -> Result<(), LaunchError> {
        self.state = Stage::Idle;
        match self.run(request, injector, extractor) {
            Ok(()) => {
                enter(&mut self.state, Stage::Released);
                tracing::info!(output = %request.dst_model.display(), "conversion finished");
                Ok(())
            }
            Err(err) => {
                tracing::warn!(stage = %err.stage, error = %err.source, "conversion failed");
                enter(&mut self.state, Stage::Failed);
                Err(err)
            }
        }
    }

    fn run(
        &mut self,
        request: &LaunchRequest,
        injector: &dyn Injector,
        extractor: &dyn Extractor,
    ) -> Result<(), LaunchError> {
        let Self { store, engine, state } = self;

        enter(state, Stage::SchemasLoading);
        let stage = Stage::SchemasLoading;
        let src_schema_uri = resolve_file_uri(&request.src_schema).map_err(at(stage))?;
        let dst_schema_uri = resolve_file_uri(&request.dst_schema).map_err(at(stage))?;
        let src_model_uri = resolve_file_uri(&request.src_model).map_err(at(stage))?;
        let dst_model_uri = resolve_file_uri(&request.dst_model).map_err(at(stage))?;

        let mut scope = HandleScope::new(store);

        let src_schema = scope.new_schema();
        injector
            .inject(scope.store_mut(), src_schema.into(), &src_schema_uri)
            .map_err(at(stage))?;
        let dst_schema = scope.new_schema();
        injector
            .inject(scope.store_mut(), dst_schema.into(), &dst_schema_uri)
            .map_err(at(stage))?;

        enter(state, Stage::ModelsLoading);
        let stage = Stage::ModelsLoading;
        let src_model = scope.new_model(src_schema).map_err(at(stage))?;
        injector
            .inject(scope.store_mut(), src_model.into(), &src_model_uri)
            .map_err(at(stage))?;
        let dst_model = scope.new_model(dst_schema).map_err(at(stage))?;

        enter(state, Stage::Transforming);
        let stage = Stage::Transforming;
        let params = EngineParams::default();
        engine.initialize(&params);
        engine.add_in_model(src_model, IN_LABEL, &request.src_schema_name);
        engine.add_out_model(dst_model, OUT_LABEL, &request.dst_schema_name);
        let program = File::open(&request.program)
            .map_err(|source| EngineError::Program {
                path: request.program.clone(),
                source,
            })
            .map_err(at(stage))?;
        engine
            .launch(
                scope.store_mut(),
                LaunchMode::Run,
                &mut NullProgress,
                &params,
                &mut BufReader::new(program),
            )
            .map_err(at(stage))?;

        enter(state, Stage::Extracting);
        let stage = Stage::Extracting;
        extractor
            .extract(
                scope.store(),
                dst_model,
                Destination::uri(&dst_model_uri),
                &ExtractOptions::default(),
            )
            .map_err(at(stage))?;

        // Dropping the scope releases all four handles.
        drop(scope);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::{Schema, TypeDef};
    use crate::store::MemoryStore;

    #[test]
    fn test_scope_releases_in_reverse_order() {
        let mut store = MemoryStore::new();
        {
            let mut scope = HandleScope::new(&mut store);
            let s = scope.new_schema();
            scope
                .store_mut()
                .populate_schema(s, Schema::new("S", vec![TypeDef::new("Root")]).unwrap())
                .unwrap();
            scope.new_model(s).unwrap();
            assert_eq!(scope.store().live_handles(), 2);
        }
        assert_eq!(store.live_handles(), 0);
    }

    #[test]
    fn test_scope_releases_on_early_return() {
        fn fails(store: &mut MemoryStore) -> Result<(), StoreError> {
            let mut scope = HandleScope::new(store);
            let s = scope.new_schema();
            // Not populated: creating a model fails
            scope.new_model(s)?;
            Ok(())
        }
        let mut store = MemoryStore::new();
        assert!(fails(&mut store).is_err());
        assert_eq!(store.live_handles(), 0);
    }

    #[test]
    fn test_stage_display() {
        assert_eq!(Stage::SchemasLoading.to_string(), "loading schemas");
        assert_eq!(Stage::Transforming.to_string(), "transforming");
    }
}
