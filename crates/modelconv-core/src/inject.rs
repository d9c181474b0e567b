//! Injectors populate store handles from files.
//!
//! [`JsonInjector`] reads two JSON document shapes:
//!
//! ```json
//! { "name": "Fiware",
//!   "types": [ { "name": "Root", "supertypes": [],
//!                "features": [ { "name": "label", "kind": "attribute", "value": "string" },
//!                              { "name": "items", "kind": "reference", "target": "Item",
//!                                "multiplicity": "multi" } ] } ] }
//! ```
//!
//! ```json
//! { "elements": [ { "id": "r1", "type": "Root", "values": { "label": "x", "items": ["i1"] } },
//!                 { "id": "i1", "type": "Item" } ] }
//! ```
//!
//! References are element ids; a `null` value leaves the feature unset.

use std::collections::HashMap;
use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::error::{LoadError, SchemaError};
use crate::model::{ElementId, FeatureValue, Model, Scalar};
use crate::schema::{Feature, FeatureKind, Schema, TypeDef};
use crate::store::{Handle, HandleStore};
use crate::uri::to_file_path;

/// Populates a schema or model handle from the resource at `uri`.
pub trait Injector {
    fn inject(&self, store: &mut dyn HandleStore, handle: Handle, uri: &str) -> Result<(), LoadError>;
}

/// On-disk schema document.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SchemaDocument {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub types: Vec<TypeDef>,
}

/// On-disk model document.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ModelDocument {
    #[serde(default)]
    pub elements: Vec<ElementDocument>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ElementDocument {
    pub id: String,
    #[serde(rename = "type")]
    pub type_name: String,
    #[serde(default)]
    pub values: Map<String, Value>,
}

/// [`Injector`] for the JSON schema and model documents above.
#[derive(Debug, Clone, Copy, Default)]
pub struct JsonInjector;

impl JsonInjector {
    pub fn new() -> Self {
        Self
    }
}

impl Injector for JsonInjector {
    fn inject(&self, store: &mut dyn HandleStore, handle: Handle, uri: &str) -> Result<(), LoadError> {
        let path = to_file_path(uri);
        let bytes = fs::read(&path).map_err(|source| LoadError::Io {
            path: path.clone(),
            source,
        })?;

        match handle {
            Handle::Schema(h) => {
                let schema = parse_schema(&bytes, &path)?;
                tracing::debug!(
                    path = %path.display(),
                    schema = schema.name(),
                    types = schema.types().len(),
                    "schema loaded"
                );
                store.populate_schema(h, schema)?;
            }
            Handle::Model(h) => {
                let doc: ModelDocument = serde_json::from_slice(&bytes).map_err(|source| LoadError::Parse {
                    path: path.clone(),
                    source,
                })?;
                let model = store.model_mut(h)?;
                populate_model(model, &doc).map_err(|source| LoadError::Invalid {
                    path: path.clone(),
                    source,
                })?;
                tracing::debug!(path = %path.display(), elements = model.len(), "model loaded");
            }
        }
        Ok(())
    }
}

/// Parse and validate a schema document.
pub fn parse_schema(bytes: &[u8], path: &Path) -> Result<Schema, LoadError> {
    let doc: SchemaDocument = serde_json::from_slice(bytes).map_err(|source| LoadError::Parse {
        path: path.to_path_buf(),
        source,
    })?;
    Schema::new(doc.name, doc.types).map_err(|source| LoadError::Invalid {
        path: path.to_path_buf(),
        source,
    })
}

/// Add the elements of `doc` to `model`.
///
/// Elements are created first so references may point forward.
pub fn populate_model(model: &mut Model, doc: &ModelDocument) -> Result<(), SchemaError> {
    let mut ids: HashMap<&str, ElementId> = HashMap::with_capacity(doc.elements.len());
    for element in &doc.elements {
        let id = model.create(&element.type_name)?;
        if ids.insert(element.id.as_str(), id).is_some() {
            return Err(SchemaError::DuplicateElement {
                id: element.id.clone(),
            });
        }
    }

    for element in &doc.elements {
        let id = ids[element.id.as_str()];
        for (name, raw) in &element.values {
            if raw.is_null() {
                continue;
            }
            let feature = model.schema().feature(&element.type_name, name)?.clone();
            let value = decode_value(&feature, raw, &ids)?;
            model.set(id, name, value)?;
        }
    }
    Ok(())
}

/// Turn a raw JSON value into the shape `feature` declares.
fn decode_value(
    feature: &Feature,
    raw: &Value,
    ids: &HashMap<&str, ElementId>,
) -> Result<FeatureValue, SchemaError> {
    let mismatch = |expected: &str| SchemaError::ValueMismatch {
        feature: feature.name.clone(),
        expected: expected.to_string(),
    };
    let resolve = |v: &Value| -> Result<ElementId, SchemaError> {
        let key = v.as_str().ok_or_else(|| mismatch("element id strings"))?;
        ids.get(key).copied().ok_or_else(|| SchemaError::DanglingReference {
            feature: feature.name.clone(),
            target: key.to_string(),
        })
    };

    match (&feature.kind, feature.is_many()) {
        (FeatureKind::Attribute { .. }, false) => Scalar::from_json(raw)
            .map(FeatureValue::Scalar)
            .ok_or_else(|| mismatch("a scalar")),
        (FeatureKind::Attribute { .. }, true) => {
            let items = raw.as_array().ok_or_else(|| mismatch("an array of scalars"))?;
            items
                .iter()
                .map(|v| Scalar::from_json(v).ok_or_else(|| mismatch("an array of scalars")))
                .collect::<Result<Vec<_>, _>>()
                .map(FeatureValue::Scalars)
        }
        (FeatureKind::Reference { .. }, false) => resolve(raw).map(FeatureValue::Element),
        (FeatureKind::Reference { .. }, true) => {
            let items = raw.as_array().ok_or_else(|| mismatch("an array of element ids"))?;
            items
                .iter()
                .map(resolve)
                .collect::<Result<Vec<_>, _>>()
                .map(FeatureValue::Elements)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::{Multiplicity, ValueKind};
    use serde_json::json;
    use std::sync::Arc;

    fn schema() -> Arc<Schema> {
        Arc::new(
            Schema::new(
                "ProbeVehicle",
                vec![
                    TypeDef::new("Root")
                        .with_feature(Feature::attribute("name", ValueKind::String, Multiplicity::Single))
                        .with_feature(Feature::reference("probes", "Sensor", Multiplicity::Multi)),
                    TypeDef::new("Sensor")
                        .with_feature(Feature::attribute("speed", ValueKind::Number, Multiplicity::Single)),
                ],
            )
            .unwrap(),
        )
    }

    fn doc(value: Value) -> ModelDocument {
        serde_json::from_value(value).unwrap()
    }

    #[test]
    fn test_forward_references_resolve() {
        let mut model = Model::new(schema());
        populate_model(
            &mut model,
            &doc(json!({
                "elements": [
                    { "id": "r", "type": "Root", "values": { "name": "V1", "probes": ["p1", "p2"] } },
                    { "id": "p1", "type": "Sensor", "values": { "speed": 42 } },
                    { "id": "p2", "type": "Sensor", "values": { "speed": null } }
                ]
            })),
        )
        .unwrap();

        assert_eq!(model.len(), 3);
        let (root, element) = model.elements().next().unwrap();
        assert_eq!(element.type_name(), "Root");
        match element.get("probes") {
            Some(FeatureValue::Elements(ids)) => assert_eq!(ids.len(), 2),
            other => panic!("unexpected probes value: {other:?}"),
        }
        let p2 = model.elements().nth(2).unwrap().1;
        assert!(p2.get("speed").is_none());
        assert_eq!(model.elements_of_kind("Root").unwrap(), vec![root]);
    }

    #[test]
    fn test_dangling_reference() {
        let mut model = Model::new(schema());
        let err = populate_model(
            &mut model,
            &doc(json!({ "elements": [ { "id": "r", "type": "Root", "values": { "probes": ["nope"] } } ] })),
        )
        .unwrap_err();
        assert_eq!(
            err,
            SchemaError::DanglingReference {
                feature: "probes".to_string(),
                target: "nope".to_string()
            }
        );
    }

    #[test]
    fn test_duplicate_ids_rejected() {
        let mut model = Model::new(schema());
        let err = populate_model(
            &mut model,
            &doc(json!({ "elements": [ { "id": "a", "type": "Sensor" }, { "id": "a", "type": "Sensor" } ] })),
        )
        .unwrap_err();
        assert!(matches!(err, SchemaError::DuplicateElement { .. }));
    }

    #[test]
    fn test_unknown_feature_rejected() {
        let mut model = Model::new(schema());
        let err = populate_model(
            &mut model,
            &doc(json!({ "elements": [ { "id": "a", "type": "Sensor", "values": { "colour": "red" } } ] })),
        )
        .unwrap_err();
        assert!(matches!(err, SchemaError::UnknownFeature { .. }));
    }

    #[test]
    fn test_parse_schema_reports_malformed_json() {
        let err = parse_schema(b"{ not json", Path::new("broken.json")).unwrap_err();
        assert!(matches!(err, LoadError::Parse { .. }));
        assert!(err.to_string().contains("broken.json"));
    }
}
