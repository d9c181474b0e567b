//! Transformation engines run a compiled program against bound models.
//!
//! The pipeline only depends on [`TransformationEngine`]. [`MappingEngine`]
//! is a small reference engine whose "compiled program" is a JSON list of
//! type-to-type rules:
//!
//! ```json
//! { "module": "Probe2Fiware", "in": "ProbeVehicle", "out": "Fiware",
//!   "rules": [ { "name": "Vehicle2Root", "from": "Vehicle", "to": "Root",
//!                "bindings": [ { "target": "label", "source": "name" } ] } ] }
//! ```
//!
//! Each rule creates one target element per source element of its `from`
//! type (subtypes included). Attribute bindings copy values; reference
//! bindings follow trace links from source elements to the target elements
//! created for them, dropping references no rule matched.

use std::collections::HashMap;
use std::io::Read;

use serde::{Deserialize, Serialize};

use crate::config::EngineParams;
use crate::error::EngineError;
use crate::model::{ElementId, FeatureValue, Model};
use crate::schema::Feature;
use crate::store::{HandleStore, ModelHandle};

/// How the engine should run a program.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum LaunchMode {
    #[default]
    Run,
    /// Same result as `Run`, with per-element tracing.
    Debug,
}

/// Receives progress notifications from an engine.
pub trait ProgressSink {
    fn begin(&mut self, _task: &str, _total: usize) {}
    fn worked(&mut self, _units: usize) {}
    fn done(&mut self) {}
}

/// Discards all progress notifications.
#[derive(Debug, Clone, Copy, Default)]
pub struct NullProgress;

impl ProgressSink for NullProgress {}

pub trait TransformationEngine {
    /// Reset the engine and apply `params`.
    fn initialize(&mut self, params: &EngineParams);

    /// Bind a source model under `label`, typed by the schema the program
    /// calls `schema_name`.
    fn add_in_model(&mut self, model: ModelHandle, label: &str, schema_name: &str);

    /// Bind a target model under `label`.
    fn add_out_model(&mut self, model: ModelHandle, label: &str, schema_name: &str);

    /// Execute `program` synchronously against the bound models.
    fn launch(
        &mut self,
        store: &mut dyn HandleStore,
        mode: LaunchMode,
        progress: &mut dyn ProgressSink,
        params: &EngineParams,
        program: &mut dyn Read,
    ) -> Result<(), EngineError>;
}

// ---------------------------------------------------------------------------
// Program format
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Program {
    #[serde(default)]
    pub module: String,
    /// Schema name of the source model.
    #[serde(rename = "in")]
    pub input: String,
    /// Schema name of the target model.
    #[serde(rename = "out")]
    pub output: String,
    #[serde(default)]
    pub rules: Vec<Rule>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Rule {
    pub name: String,
    pub from: String,
    pub to: String,
    #[serde(default)]
    pub bindings: Vec<Binding>,
}

/// `target <- source`, evaluated on each matched source element.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Binding {
    pub target: String,
    pub source: String,
}

// ---------------------------------------------------------------------------
// MappingEngine
// ---------------------------------------------------------------------------

#[derive(Debug, Clone)]
struct ModelBinding {
    handle: ModelHandle,
    label: String,
    schema_name: String,
}

/// Reference [`TransformationEngine`] for the rule format above.
#[derive(Debug, Default)]
pub struct MappingEngine {
    inputs: Vec<ModelBinding>,
    outputs: Vec<ModelBinding>,
}

/// A value to write once all target elements exist.
enum Pending {
    Value(FeatureValue),
    /// Source elements still to be resolved through the trace.
    Refs { ids: Vec<ElementId>, many: bool },
}

impl MappingEngine {
    pub fn new() -> Self {
        Self::default()
    }

    fn bound(bindings: &[ModelBinding], schema_name: &str, role: &str) -> Result<ModelHandle, EngineError> {
        bindings
            .iter()
            .find(|b| b.schema_name == schema_name)
            .map(|b| b.handle)
            .ok_or_else(|| {
                EngineError::Failed(format!(
                    "program expects an {role} model typed '{schema_name}', but none is bound"
                ))
            })
    }
}

impl TransformationEngine for MappingEngine {
    fn initialize(&mut self, params: &EngineParams) {
        self.inputs.clear();
        self.outputs.clear();
        if !params.values.is_empty() {
            tracing::debug!(keys = params.values.len(), "mapping engine ignores parameters");
        }
    }

    fn add_in_model(&mut self, model: ModelHandle, label: &str, schema_name: &str) {
        self.inputs.push(ModelBinding {
            handle: model,
            label: label.to_string(),
            schema_name: schema_name.to_string(),
        });
    }

    fn add_out_model(&mut self, model: ModelHandle, label: &str, schema_name: &str) {
        self.outputs.push(ModelBinding {
            handle: model,
            label: label.to_string(),
            schema_name: schema_name.to_string(),
        });
    }

    fn launch(
        &mut self,
        store: &mut dyn HandleStore,
        mode: LaunchMode,
        progress: &mut dyn ProgressSink,
        _params: &EngineParams,
        program: &mut dyn Read,
    ) -> Result<(), EngineError> {
        let program: Program = serde_json::from_reader(program)?;
        let src = Self::bound(&self.inputs, &program.input, "IN")?;
        let dst = Self::bound(&self.outputs, &program.output, "OUT")?;
        tracing::debug!(
            module = %program.module,
            rules = program.rules.len(),
            inputs = ?self.inputs.iter().map(|b| b.label.as_str()).collect::<Vec<_>>(),
            outputs = ?self.outputs.iter().map(|b| b.label.as_str()).collect::<Vec<_>>(),
            "launching program"
        );

        progress.begin(&program.module, program.rules.len());

        // Match rules and plan every write while only the source is borrowed.
        let source = store.model(src)?;
        let target_schema = store.model(dst)?.schema().clone();
        let mut matches: Vec<(usize, ElementId)> = Vec::new();
        for (r, rule) in program.rules.iter().enumerate() {
            check_rule(rule, source, &target_schema)?;
            let matched = source.elements_of_kind(&rule.from)?;
            if matched.is_empty() {
                tracing::warn!(rule = %rule.name, from = %rule.from, "rule matched no elements");
            }
            matches.extend(matched.into_iter().map(|id| (r, id)));
            progress.worked(1);
        }

        let mut plan: Vec<(usize, String, Pending)> = Vec::new();
        for (m, &(r, src_id)) in matches.iter().enumerate() {
            let rule = &program.rules[r];
            let Some(element) = source.element(src_id) else {
                continue;
            };
            for binding in &rule.bindings {
                let Some(value) = element.get(&binding.source) else {
                    continue;
                };
                let target_feature = target_schema.feature(&rule.to, &binding.target)?;
                let pending = match value.clone() {
                    FeatureValue::Scalar(s) if target_feature.is_many() => {
                        Pending::Value(FeatureValue::Scalars(vec![s]))
                    }
                    FeatureValue::Element(id) => Pending::Refs {
                        ids: vec![id],
                        many: target_feature.is_many(),
                    },
                    FeatureValue::Elements(ids) => Pending::Refs {
                        ids,
                        many: target_feature.is_many(),
                    },
                    other => Pending::Value(other),
                };
                plan.push((m, binding.target.clone(), pending));
            }
        }

        // Create target elements; the first rule to match a source element
        // owns its trace link.
        let target: &mut Model = store.model_mut(dst)?;
        let mut created: Vec<ElementId> = Vec::with_capacity(matches.len());
        let mut trace: HashMap<ElementId, ElementId> = HashMap::new();
        for &(r, src_id) in &matches {
            let rule = &program.rules[r];
            let id = target.create(&rule.to)?;
            trace.entry(src_id).or_insert(id);
            created.push(id);
            if mode == LaunchMode::Debug {
                tracing::debug!(rule = %rule.name, source = %src_id, target = %id, "element created");
            }
        }

        for (m, feature, pending) in plan {
            let value = match pending {
                Pending::Value(v) => v,
                Pending::Refs { ids, many } => {
                    let resolved: Vec<ElementId> = ids.iter().filter_map(|id| trace.get(id).copied()).collect();
                    if resolved.len() < ids.len() {
                        tracing::debug!(
                            feature = %feature,
                            dropped = ids.len() - resolved.len(),
                            "unresolved references dropped"
                        );
                    }
                    match (many, resolved.as_slice()) {
                        (true, _) => FeatureValue::Elements(resolved),
                        (false, [single]) => FeatureValue::Element(*single),
                        (false, _) => continue,
                    }
                }
            };
            target.set(created[m], &feature, value)?;
        }

        progress.done();
        tracing::debug!(created = created.len(), "program finished");
        Ok(())
    }
}

/// Static checks of a rule against both schemas.
fn check_rule(rule: &Rule, source: &Model, target_schema: &crate::schema::Schema) -> Result<(), EngineError> {
    if !target_schema.contains_type(&rule.to) {
        return Err(EngineError::Failed(format!(
            "rule '{}': unknown target type '{}'",
            rule.name, rule.to
        )));
    }
    for binding in &rule.bindings {
        let from: &Feature = source.schema().feature(&rule.from, &binding.source)?;
        let to: &Feature = target_schema.feature(&rule.to, &binding.target)?;
        if from.is_reference() != to.is_reference() {
            return Err(EngineError::Failed(format!(
                "rule '{}': cannot bind {} '{}' to {} '{}'",
                rule.name,
                kind_name(from),
                from.name,
                kind_name(to),
                to.name
            )));
        }
        if from.is_many() && !to.is_many() {
            return Err(EngineError::Failed(format!(
                "rule '{}': cannot assign multi-valued '{}' to single-valued '{}'",
                rule.name, from.name, to.name
            )));
        }
    }
    Ok(())
}

fn kind_name(feature: &Feature) -> &'static str {
    if feature.is_reference() {
        "reference"
    } else {
        "attribute"
    }
}
