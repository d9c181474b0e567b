//! In-memory model: an arena of typed elements bound to one schema.
//!
//! Elements are addressed by [`ElementId`]; reference features store ids, so
//! reference targets stay owned by the model rather than by the referencing
//! element. Every value is checked against its feature when it is set.

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use serde_json::Number;

use crate::error::SchemaError;
use crate::schema::{Feature, FeatureKind, Schema, ValueKind};

/// Index of an element within its [`Model`]. Ids follow creation order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ElementId(usize);

impl fmt::Display for ElementId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// A single attribute value.
#[derive(Debug, Clone, PartialEq)]
pub enum Scalar {
    Number(Number),
    Text(String),
    Bool(bool),
}

impl Scalar {
    /// Convert a JSON scalar; arrays, objects and null have no scalar form.
    pub fn from_json(value: &serde_json::Value) -> Option<Self> {
        match value {
            serde_json::Value::Number(n) => Some(Scalar::Number(n.clone())),
            serde_json::Value::String(s) => Some(Scalar::Text(s.clone())),
            serde_json::Value::Bool(b) => Some(Scalar::Bool(*b)),
            _ => None,
        }
    }

    fn fits(&self, kind: ValueKind) -> bool {
        match kind {
            ValueKind::Number => matches!(self, Scalar::Number(_)),
            ValueKind::String => matches!(self, Scalar::Text(_)),
            ValueKind::Other => true,
        }
    }
}

/// Natural text form: numbers and booleans as JSON prints them, text as-is.
impl fmt::Display for Scalar {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Scalar::Number(n) => write!(f, "{n}"),
            Scalar::Text(s) => f.write_str(s),
            Scalar::Bool(b) => write!(f, "{b}"),
        }
    }
}

impl From<i64> for Scalar {
    fn from(v: i64) -> Self {
        Scalar::Number(v.into())
    }
}

impl From<u64> for Scalar {
    fn from(v: u64) -> Self {
        Scalar::Number(v.into())
    }
}

impl From<bool> for Scalar {
    fn from(v: bool) -> Self {
        Scalar::Bool(v)
    }
}

impl From<&str> for Scalar {
    fn from(v: &str) -> Self {
        Scalar::Text(v.to_string())
    }
}

impl From<String> for Scalar {
    fn from(v: String) -> Self {
        Scalar::Text(v)
    }
}

/// The content of one feature slot. Absent slots are simply not stored.
#[derive(Debug, Clone, PartialEq)]
pub enum FeatureValue {
    Scalar(Scalar),
    Scalars(Vec<Scalar>),
    Element(ElementId),
    Elements(Vec<ElementId>),
}

#[derive(Debug, Clone)]
pub struct Element {
    type_name: String,
    values: HashMap<String, FeatureValue>,
}

impl Element {
    pub fn type_name(&self) -> &str {
        &self.type_name
    }

    /// The value of `feature`, or `None` when it is null.
    pub fn get(&self, feature: &str) -> Option<&FeatureValue> {
        self.values.get(feature)
    }
}

#[derive(Debug, Clone)]
pub struct Model {
    schema: Arc<Schema>,
    elements: Vec<Element>,
}

impl Model {
    /// An empty model bound to `schema` for its whole lifetime.
    pub fn new(schema: Arc<Schema>) -> Self {
        Self {
            schema,
            elements: Vec::new(),
        }
    }

    pub fn schema(&self) -> &Schema {
        &self.schema
    }

    pub fn len(&self) -> usize {
        self.elements.len()
    }

    pub fn is_empty(&self) -> bool {
        self.elements.is_empty()
    }

    /// Create an element of `type_name` with every feature null.
    pub fn create(&mut self, type_name: &str) -> Result<ElementId, SchemaError> {
        if !self.schema.contains_type(type_name) {
            return Err(SchemaError::UnknownType {
                name: type_name.to_string(),
            });
        }
        self.elements.push(Element {
            type_name: type_name.to_string(),
            values: HashMap::new(),
        });
        Ok(ElementId(self.elements.len() - 1))
    }

    pub fn element(&self, id: ElementId) -> Option<&Element> {
        self.elements.get(id.0)
    }

    /// All elements in creation order.
    pub fn elements(&self) -> impl Iterator<Item = (ElementId, &Element)> {
        self.elements.iter().enumerate().map(|(i, e)| (ElementId(i), e))
    }

    /// Ids of elements whose type is `type_name` or a subtype of it, in
    /// creation order.
    pub fn elements_of_kind(&self, type_name: &str) -> Result<Vec<ElementId>, SchemaError> {
        if !self.schema.contains_type(type_name) {
            return Err(SchemaError::UnknownType {
                name: type_name.to_string(),
            });
        }
        Ok(self
            .elements()
            .filter(|(_, e)| self.schema.is_kind_of(&e.type_name, type_name))
            .map(|(id, _)| id)
            .collect())
    }

    /// Set `feature` on element `id` after checking the value against the
    /// feature's kind, value kind and multiplicity.
    pub fn set(&mut self, id: ElementId, feature: &str, value: FeatureValue) -> Result<(), SchemaError> {
        let type_name = self
            .element(id)
            .ok_or_else(|| SchemaError::UnknownElement { id: id.to_string() })?
            .type_name
            .clone();
        let descriptor = self.schema.feature(&type_name, feature)?;
        self.check(descriptor, &value)?;
        self.elements[id.0].values.insert(feature.to_string(), value);
        Ok(())
    }

    /// Reset `feature` on element `id` to null.
    pub fn unset(&mut self, id: ElementId, feature: &str) -> Result<(), SchemaError> {
        let element = self
            .elements
            .get_mut(id.0)
            .ok_or_else(|| SchemaError::UnknownElement { id: id.to_string() })?;
        element.values.remove(feature);
        Ok(())
    }

    fn check(&self, feature: &Feature, value: &FeatureValue) -> Result<(), SchemaError> {
        let mismatch = |expected: String| SchemaError::ValueMismatch {
            feature: feature.name.clone(),
            expected,
        };
        match (&feature.kind, feature.is_many(), value) {
            (FeatureKind::Attribute { value: kind }, false, FeatureValue::Scalar(s)) => {
                if !s.fits(*kind) {
                    return Err(mismatch(format!("a single {kind:?} value")));
                }
            }
            (FeatureKind::Attribute { value: kind }, true, FeatureValue::Scalars(items)) => {
                if !items.iter().all(|s| s.fits(*kind)) {
                    return Err(mismatch(format!("a list of {kind:?} values")));
                }
            }
            (FeatureKind::Reference { target }, false, FeatureValue::Element(id)) => {
                self.check_target(feature, target, *id)?;
            }
            (FeatureKind::Reference { target }, true, FeatureValue::Elements(ids)) => {
                for id in ids {
                    self.check_target(feature, target, *id)?;
                }
            }
            (FeatureKind::Attribute { value: kind }, many, _) => {
                return Err(mismatch(if many {
                    format!("a list of {kind:?} values")
                } else {
                    format!("a single {kind:?} value")
                }));
            }
            (FeatureKind::Reference { target }, many, _) => {
                return Err(mismatch(if many {
                    format!("a list of {target} elements")
                } else {
                    format!("a single {target} element")
                }));
            }
        }
        Ok(())
    }

    fn check_target(&self, feature: &Feature, target: &str, id: ElementId) -> Result<(), SchemaError> {
        let element = self.element(id).ok_or_else(|| SchemaError::DanglingReference {
            feature: feature.name.clone(),
            target: id.to_string(),
        })?;
        if !self.schema.is_kind_of(&element.type_name, target) {
            return Err(SchemaError::ValueMismatch {
                feature: feature.name.clone(),
                expected: format!("{target} elements, found {}", element.type_name),
            });
        }
        Ok(())
    }
}
