//! Schema definitions: types and their ordered features.
//!
//! A [`Schema`] is validated once at construction. Inheritance is flattened
//! up front so [`Schema::features_in_declaration_order`] is a slice lookup,
//! with supertype features first (in supertype declaration order) followed by
//! the type's own features.

use std::collections::{HashMap, HashSet};

use serde::{Deserialize, Serialize};

use crate::error::SchemaError;

// ---------------------------------------------------------------------------
// Feature descriptors
// ---------------------------------------------------------------------------

/// Value kind of an attribute feature.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ValueKind {
    /// Written as an unquoted JSON number.
    Number,
    String,
    /// Booleans and anything else with a natural text form.
    Other,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Multiplicity {
    #[default]
    Single,
    Multi,
}

/// Attribute (scalar) or reference (to other elements) slot.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "kebab-case")]
pub enum FeatureKind {
    Attribute { value: ValueKind },
    Reference { target: String },
}

/// A named, typed slot on a type.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Feature {
    pub name: String,
    #[serde(flatten)]
    pub kind: FeatureKind,
    #[serde(default)]
    pub multiplicity: Multiplicity,
}

impl Feature {
    pub fn attribute(name: impl Into<String>, value: ValueKind, multiplicity: Multiplicity) -> Self {
        Self {
            name: name.into(),
            kind: FeatureKind::Attribute { value },
            multiplicity,
        }
    }

    pub fn reference(
        name: impl Into<String>,
        target: impl Into<String>,
        multiplicity: Multiplicity,
    ) -> Self {
        Self {
            name: name.into(),
            kind: FeatureKind::Reference {
                target: target.into(),
            },
            multiplicity,
        }
    }

    pub fn is_many(&self) -> bool {
        self.multiplicity == Multiplicity::Multi
    }

    pub fn is_reference(&self) -> bool {
        matches!(self.kind, FeatureKind::Reference { .. })
    }

    /// The attribute value kind, or `None` for references.
    pub fn value_kind(&self) -> Option<ValueKind> {
        match self.kind {
            FeatureKind::Attribute { value } => Some(value),
            FeatureKind::Reference { .. } => None,
        }
    }
}

/// A type as declared: its direct supertypes and own features.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TypeDef {
    pub name: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub supertypes: Vec<String>,
    #[serde(default)]
    pub features: Vec<Feature>,
}

impl TypeDef {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            supertypes: Vec::new(),
            features: Vec::new(),
        }
    }

    pub fn with_supertype(mut self, name: impl Into<String>) -> Self {
        self.supertypes.push(name.into());
        self
    }

    pub fn with_feature(mut self, feature: Feature) -> Self {
        self.features.push(feature);
        self
    }
}

// ---------------------------------------------------------------------------
// Schema
// ---------------------------------------------------------------------------

#[derive(Debug, Clone)]
pub struct Schema {
    name: String,
    types: Vec<TypeDef>,
    index: HashMap<String, usize>,
    /// Flattened features per type, same order as `types`.
    all_features: Vec<Vec<Feature>>,
    /// Each type's name plus the names of all its transitive supertypes.
    ancestors: Vec<HashSet<String>>,
}

#[derive(Clone, Copy, PartialEq)]
enum Mark {
    Unvisited,
    InProgress,
    Done,
}

impl Schema {
    /// Validate `types` and build a schema.
    ///
    /// Fails on duplicate type names, unknown supertypes or reference
    /// targets, and inheritance cycles.
    pub fn new(name: impl Into<String>, types: Vec<TypeDef>) -> Result<Self, SchemaError> {
        let mut index = HashMap::with_capacity(types.len());
        for (i, ty) in types.iter().enumerate() {
            if index.insert(ty.name.clone(), i).is_some() {
                return Err(SchemaError::DuplicateType {
                    name: ty.name.clone(),
                });
            }
        }

        for ty in &types {
            for sup in &ty.supertypes {
                if !index.contains_key(sup) {
                    return Err(SchemaError::UnknownType { name: sup.clone() });
                }
            }
            for feature in &ty.features {
                if let FeatureKind::Reference { target } = &feature.kind {
                    if !index.contains_key(target) {
                        return Err(SchemaError::UnknownType {
                            name: target.clone(),
                        });
                    }
                }
            }
        }

        let mut marks = vec![Mark::Unvisited; types.len()];
        let mut all_features = vec![Vec::new(); types.len()];
        let mut ancestors = vec![HashSet::new(); types.len()];
        for i in 0..types.len() {
            linearize(i, &types, &index, &mut marks, &mut all_features, &mut ancestors)?;
        }

        Ok(Self {
            name: name.into(),
            types,
            index,
            all_features,
            ancestors,
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn types(&self) -> &[TypeDef] {
        &self.types
    }

    pub fn contains_type(&self, name: &str) -> bool {
        self.index.contains_key(name)
    }

    /// All features of `type_name`, inherited ones included, in declaration
    /// order.
    pub fn features_in_declaration_order(&self, type_name: &str) -> Result<&[Feature], SchemaError> {
        self.index
            .get(type_name)
            .map(|&i| self.all_features[i].as_slice())
            .ok_or_else(|| SchemaError::UnknownType {
                name: type_name.to_string(),
            })
    }

    /// Look up one feature of `type_name` (inherited features included).
    pub fn feature(&self, type_name: &str, feature: &str) -> Result<&Feature, SchemaError> {
        self.features_in_declaration_order(type_name)?
            .iter()
            .find(|f| f.name == feature)
            .ok_or_else(|| SchemaError::UnknownFeature {
                type_name: type_name.to_string(),
                feature: feature.to_string(),
            })
    }

    /// True if `type_name` is `ancestor` or inherits from it.
    pub fn is_kind_of(&self, type_name: &str, ancestor: &str) -> bool {
        self.index
            .get(type_name)
            .is_some_and(|&i| self.ancestors[i].contains(ancestor))
    }
}

/// Depth-first flattening of one type's inheritance chain.
fn linearize(
    i: usize,
    types: &[TypeDef],
    index: &HashMap<String, usize>,
    marks: &mut [Mark],
    all_features: &mut [Vec<Feature>],
    ancestors: &mut [HashSet<String>],
) -> Result<(), SchemaError> {
    match marks[i] {
        Mark::Done => return Ok(()),
        Mark::InProgress => {
            return Err(SchemaError::InheritanceCycle {
                name: types[i].name.clone(),
            })
        }
        Mark::Unvisited => {}
    }
    marks[i] = Mark::InProgress;

    let mut features: Vec<Feature> = Vec::new();
    let mut seen: HashSet<String> = HashSet::new();
    let mut names: HashSet<String> = HashSet::from([types[i].name.clone()]);

    for sup in &types[i].supertypes {
        let s = index[sup];
        linearize(s, types, index, marks, all_features, ancestors)?;
        for feature in &all_features[s] {
            if seen.insert(feature.name.clone()) {
                features.push(feature.clone());
            }
        }
        names.extend(ancestors[s].iter().cloned());
    }
    for feature in &types[i].features {
        if seen.insert(feature.name.clone()) {
            features.push(feature.clone());
        }
    }

    all_features[i] = features;
    ancestors[i] = names;
    marks[i] = Mark::Done;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn vehicle_schema() -> Schema {
        Schema::new(
            "ProbeVehicle",
            vec![
                TypeDef::new("Named").with_feature(Feature::attribute(
                    "name",
                    ValueKind::String,
                    Multiplicity::Single,
                )),
                TypeDef::new("Vehicle")
                    .with_supertype("Named")
                    .with_feature(Feature::attribute("speed", ValueKind::Number, Multiplicity::Single))
                    .with_feature(Feature::reference("probes", "Sensor", Multiplicity::Multi)),
                TypeDef::new("Sensor").with_feature(Feature::attribute(
                    "value",
                    ValueKind::Number,
                    Multiplicity::Single,
                )),
            ],
        )
        .unwrap()
    }

    #[test]
    fn test_inherited_features_come_first() {
        let schema = vehicle_schema();
        let names: Vec<&str> = schema
            .features_in_declaration_order("Vehicle")
            .unwrap()
            .iter()
            .map(|f| f.name.as_str())
            .collect();
        assert_eq!(names, vec!["name", "speed", "probes"]);
    }

    #[test]
    fn test_is_kind_of() {
        let schema = vehicle_schema();
        assert!(schema.is_kind_of("Vehicle", "Named"));
        assert!(schema.is_kind_of("Vehicle", "Vehicle"));
        assert!(!schema.is_kind_of("Sensor", "Named"));
        assert!(!schema.is_kind_of("Missing", "Named"));
    }

    #[test]
    fn test_unknown_type_lookup() {
        let schema = vehicle_schema();
        assert_eq!(
            schema.features_in_declaration_order("Root").unwrap_err(),
            SchemaError::UnknownType {
                name: "Root".to_string()
            }
        );
    }

    #[test]
    fn test_diamond_inheritance_dedups_features() {
        let schema = Schema::new(
            "S",
            vec![
                TypeDef::new("Base").with_feature(Feature::attribute("id", ValueKind::String, Multiplicity::Single)),
                TypeDef::new("Left").with_supertype("Base"),
                TypeDef::new("Right")
                    .with_supertype("Base")
                    .with_feature(Feature::attribute("r", ValueKind::Other, Multiplicity::Single)),
                TypeDef::new("Both").with_supertype("Left").with_supertype("Right"),
            ],
        )
        .unwrap();
        let names: Vec<&str> = schema
            .features_in_declaration_order("Both")
            .unwrap()
            .iter()
            .map(|f| f.name.as_str())
            .collect();
        assert_eq!(names, vec!["id", "r"]);
    }

    #[test]
    fn test_inheritance_cycle_rejected() {
        let err = Schema::new(
            "S",
            vec![
                TypeDef::new("A").with_supertype("B"),
                TypeDef::new("B").with_supertype("A"),
            ],
        )
        .unwrap_err();
        assert!(matches!(err, SchemaError::InheritanceCycle { .. }));
    }

    #[test]
    fn test_duplicate_and_dangling_types_rejected() {
        let dup = Schema::new("S", vec![TypeDef::new("A"), TypeDef::new("A")]).unwrap_err();
        assert!(matches!(dup, SchemaError::DuplicateType { .. }));

        let dangling = Schema::new(
            "S",
            vec![TypeDef::new("A").with_feature(Feature::reference("b", "B", Multiplicity::Single))],
        )
        .unwrap_err();
        assert_eq!(
            dangling,
            SchemaError::UnknownType {
                name: "B".to_string()
            }
        );
    }

    #[test]
    fn test_feature_serde_shape() {
        let feature: Feature = serde_json::from_str(
            r#"{"name":"children","kind":"reference","target":"Child","multiplicity":"multi"}"#,
        )
        .unwrap();
        assert!(feature.is_reference());
        assert!(feature.is_many());

        let attr: Feature =
            serde_json::from_str(r#"{"name":"speed","kind":"attribute","value":"number"}"#).unwrap();
        assert_eq!(attr.value_kind(), Some(ValueKind::Number));
        assert_eq!(attr.multiplicity, Multiplicity::Single);
    }
}
