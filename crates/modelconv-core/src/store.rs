//! Handle store: owns schemas and models behind opaque typed handles.
//!
//! The pipeline only ever sees [`SchemaHandle`]s and [`ModelHandle`]s; the
//! injector, engine and extractor reach the data through a [`HandleStore`].

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use crate::error::StoreError;
use crate::model::Model;
use crate::schema::Schema;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SchemaHandle(u64);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ModelHandle(u64);

impl SchemaHandle {
    pub fn new(id: u64) -> Self {
        Self(id)
    }

    pub fn id(self) -> u64 {
        self.0
    }
}

impl ModelHandle {
    pub fn new(id: u64) -> Self {
        Self(id)
    }

    pub fn id(self) -> u64 {
        self.0
    }
}

/// Either kind of handle, for operations that accept both.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Handle {
    Schema(SchemaHandle),
    Model(ModelHandle),
}

impl From<SchemaHandle> for Handle {
    fn from(h: SchemaHandle) -> Self {
        Handle::Schema(h)
    }
}

impl From<ModelHandle> for Handle {
    fn from(h: ModelHandle) -> Self {
        Handle::Model(h)
    }
}

impl fmt::Display for Handle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Handle::Schema(h) => write!(f, "schema#{}", h.0),
            Handle::Model(h) => write!(f, "model#{}", h.0),
        }
    }
}

/// Creates, populates and releases schemas and models.
pub trait HandleStore {
    /// A new, empty schema handle.
    fn new_schema(&mut self) -> SchemaHandle;

    /// Fill an empty schema handle. A schema is populated at most once.
    fn populate_schema(&mut self, handle: SchemaHandle, schema: Schema) -> Result<(), StoreError>;

    fn schema(&self, handle: SchemaHandle) -> Result<&Schema, StoreError>;

    /// A new, empty model bound to the (already populated) `schema`.
    fn new_model(&mut self, schema: SchemaHandle) -> Result<ModelHandle, StoreError>;

    fn model(&self, handle: ModelHandle) -> Result<&Model, StoreError>;

    fn model_mut(&mut self, handle: ModelHandle) -> Result<&mut Model, StoreError>;

    /// Drop the data behind `handle`. Releasing an unknown handle is a no-op.
    fn release(&mut self, handle: Handle);
}

enum SchemaSlot {
    Empty,
    Populated(Arc<Schema>),
}

/// In-memory [`HandleStore`]. Handle ids are never reused.
#[derive(Default)]
pub struct MemoryStore {
    next_id: u64,
    schemas: HashMap<u64, SchemaSlot>,
    models: HashMap<u64, Model>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of live (unreleased) handles.
    pub fn live_handles(&self) -> usize {
        self.schemas.len() + self.models.len()
    }

    fn next(&mut self) -> u64 {
        self.next_id += 1;
        self.next_id
    }
}

impl HandleStore for MemoryStore {
    fn new_schema(&mut self) -> SchemaHandle {
        let id = self.next();
        self.schemas.insert(id, SchemaSlot::Empty);
        SchemaHandle(id)
    }

    fn populate_schema(&mut self, handle: SchemaHandle, schema: Schema) -> Result<(), StoreError> {
        let slot = self
            .schemas
            .get_mut(&handle.0)
            .ok_or(StoreError::UnknownHandle(handle.0))?;
        if matches!(slot, SchemaSlot::Populated(_)) {
            return Err(StoreError::SchemaAlreadyPopulated(handle.0));
        }
        *slot = SchemaSlot::Populated(Arc::new(schema));
        Ok(())
    }

    fn schema(&self, handle: SchemaHandle) -> Result<&Schema, StoreError> {
        match self.schemas.get(&handle.0) {
            Some(SchemaSlot::Populated(schema)) => Ok(schema.as_ref()),
            Some(SchemaSlot::Empty) => Err(StoreError::SchemaNotPopulated(handle.0)),
            None => Err(StoreError::UnknownHandle(handle.0)),
        }
    }

    fn new_model(&mut self, schema: SchemaHandle) -> Result<ModelHandle, StoreError> {
        let schema = match self.schemas.get(&schema.0) {
            Some(SchemaSlot::Populated(s)) => Arc::clone(s),
            Some(SchemaSlot::Empty) => return Err(StoreError::SchemaNotPopulated(schema.0)),
            None => return Err(StoreError::UnknownHandle(schema.0)),
        };
        let id = self.next();
        self.models.insert(id, Model::new(schema));
        Ok(ModelHandle(id))
    }

    fn model(&self, handle: ModelHandle) -> Result<&Model, StoreError> {
        self.models
            .get(&handle.0)
            .ok_or(StoreError::UnknownHandle(handle.0))
    }

    fn model_mut(&mut self, handle: ModelHandle) -> Result<&mut Model, StoreError> {
        self.models
            .get_mut(&handle.0)
            .ok_or(StoreError::UnknownHandle(handle.0))
    }

    fn release(&mut self, handle: Handle) {
        let released = match handle {
            Handle::Schema(h) => self.schemas.remove(&h.0).is_some(),
            Handle::Model(h) => self.models.remove(&h.0).is_some(),
        };
        if released {
            tracing::debug!(%handle, "released");
        } else {
            tracing::warn!(%handle, "release of unknown handle ignored");
        }
    }
}
