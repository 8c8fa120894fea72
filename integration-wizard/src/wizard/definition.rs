// Wizard shape: ordered steps with defaults and validators, plus the aggregate form.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::BTreeMap;
use std::sync::Arc;

use crate::form::{lookup, StoreError};
use crate::payload::{AssemblyError, StepReader};
use crate::validation::StepValidator;

#[derive(Clone)]
pub struct StepSpec {
    pub name: String,
    pub title: String,
    pub defaults: Value,
    pub list_paths: Vec<String>,
    pub validator: Arc<dyn StepValidator>,
}

impl StepSpec {
    pub fn new<V>(name: &str, title: &str, defaults: Value, validator: V) -> Self
    where
        V: StepValidator + 'static,
    {
        Self {
            name: name.to_string(),
            title: title.to_string(),
            defaults,
            list_paths: Vec::new(),
            validator: Arc::new(validator),
        }
    }

    /// Declares repeatable row lists whose row identity the store tracks.
    pub fn with_lists(mut self, paths: &[&str]) -> Self {
        self.list_paths = paths.iter().map(|p| p.to_string()).collect();
        self
    }
}

impl std::fmt::Debug for StepSpec {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StepSpec")
            .field("name", &self.name)
            .field("title", &self.title)
            .field("list_paths", &self.list_paths)
            .finish_non_exhaustive()
    }
}

#[derive(Debug, Clone)]
pub struct WizardDefinition {
    steps: Vec<StepSpec>,
}

impl WizardDefinition {
    pub fn new(steps: Vec<StepSpec>) -> Self {
        Self { steps }
    }

    pub fn steps(&self) -> &[StepSpec] {
        &self.steps
    }

    pub fn len(&self) -> usize {
        self.steps.len()
    }

    pub fn is_empty(&self) -> bool {
        self.steps.is_empty()
    }

    pub fn step(&self, index: usize) -> Option<&StepSpec> {
        self.steps.get(index)
    }

    pub fn index_of(&self, name: &str) -> Option<usize> {
        self.steps.iter().position(|s| s.name == name)
    }

    /// Aggregate form made of every step's defaults.
    pub fn default_form(&self) -> AggregateForm {
        let mut form = AggregateForm::default();
        for step in &self.steps {
            form.insert(&step.name, step.defaults.clone());
        }
        form
    }
}

/// Step name -> that step's latest raw snapshot.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct AggregateForm(BTreeMap<String, Value>);

impl AggregateForm {
    pub fn new() -> Self {
        Self::default()
    }

    /// Parses `{ "<step>": { ... }, ... }`.
    pub fn from_json(value: Value) -> Result<Self, StoreError> {
        match value {
            Value::Object(map) => {
                let mut form = Self::new();
                for (step, values) in map {
                    if !values.is_object() {
                        return Err(StoreError::NotAnObject {
                            found: crate::form::store::json_kind(&values).to_string(),
                        });
                    }
                    form.0.insert(step, values);
                }
                Ok(form)
            }
            other => Err(StoreError::NotAnObject {
                found: crate::form::store::json_kind(&other).to_string(),
            }),
        }
    }

    pub fn insert(&mut self, step: &str, values: Value) {
        self.0.insert(step.to_string(), values);
    }

    pub fn get(&self, step: &str) -> Option<&Value> {
        self.0.get(step)
    }

    pub fn value(&self, step: &str, path: &str) -> Option<&Value> {
        self.0.get(step).and_then(|v| lookup(v, path))
    }

    pub fn steps(&self) -> impl Iterator<Item = (&str, &Value)> {
        self.0.iter().map(|(k, v)| (k.as_str(), v))
    }

    pub fn reader<'a>(&'a self, step: &'a str) -> Result<StepReader<'a>, AssemblyError> {
        self.0
            .get(step)
            .map(|values| StepReader::new(step, values))
            .ok_or_else(|| AssemblyError::UnknownStep(step.to_string()))
    }

    /// Overlays `other` onto `self` step by step, merging nested objects.
    pub fn merge(&mut self, other: AggregateForm) {
        for (step, values) in other.0 {
            match self.0.get_mut(&step) {
                Some(existing) => merge_values(existing, values),
                None => {
                    self.0.insert(step, values);
                }
            }
        }
    }

    pub fn to_json(&self) -> Value {
        Value::Object(
            self.0
                .iter()
                .map(|(k, v)| (k.clone(), v.clone()))
                .collect::<Map<String, Value>>(),
        )
    }
}

/// Objects merge key by key; anything else in `overlay` replaces `base`.
pub fn merge_values(base: &mut Value, overlay: Value) {
    match (base, overlay) {
        (Value::Object(base_map), Value::Object(overlay_map)) => {
            for (key, value) in overlay_map {
                match base_map.get_mut(&key) {
                    Some(slot) => merge_values(slot, value),
                    None => {
                        base_map.insert(key, value);
                    }
                }
            }
        }
        (slot, value) => *slot = value,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::validation::RuleSet;
    use serde_json::json;

    #[test]
    fn default_form_holds_every_step() {
        let def = WizardDefinition::new(vec![
            StepSpec::new("company", "Company", json!({ "companyName": "" }), RuleSet::new()),
            StepSpec::new("approval", "Approval", json!({ "autoApprove": false }), RuleSet::new()),
        ]);
        let form = def.default_form();
        assert_eq!(form.value("approval", "autoApprove"), Some(&json!(false)));
        assert_eq!(def.index_of("approval"), Some(1));
        assert_eq!(def.index_of("review"), None);
    }

    #[test]
    fn merge_keeps_defaults_the_overlay_does_not_mention() {
        let mut form = AggregateForm::new();
        form.insert(
            "connection",
            json!({ "connectionType": "SFTP", "sftp": { "host": "a", "port": 22 }, "s3": { "region": "us-east-1" } }),
        );
        let mut overlay = AggregateForm::new();
        overlay.insert("connection", json!({ "sftp": { "host": "b" } }));
        form.merge(overlay);

        assert_eq!(form.value("connection", "sftp.host"), Some(&json!("b")));
        assert_eq!(form.value("connection", "sftp.port"), Some(&json!(22)));
        assert_eq!(form.value("connection", "s3.region"), Some(&json!("us-east-1")));
    }

    #[test]
    fn from_json_requires_objects() {
        assert!(AggregateForm::from_json(json!({ "basicInfo": { "a": 1 } })).is_ok());
        assert!(AggregateForm::from_json(json!({ "basicInfo": 3 })).is_err());
        assert!(AggregateForm::from_json(json!([])).is_err());
    }

    #[test]
    fn reader_rejects_unknown_steps() {
        let form = AggregateForm::new();
        assert_eq!(
            form.reader("schedule").unwrap_err(),
            AssemblyError::UnknownStep("schedule".into())
        );
    }
}
