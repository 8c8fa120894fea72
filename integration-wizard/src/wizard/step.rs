// One live step: its store, validator and UI flags.

use async_trait::async_trait;
use serde_json::Value;
use std::collections::BTreeMap;
use std::sync::Arc;

use super::definition::{merge_values, StepSpec};
use crate::form::{RowId, StepDataStore, StoreError};
use crate::models::state::StepState;
use crate::validation::{FieldValidationError, StepValidation, StepValidator};

/// What the controller needs from a step: its data and a way to validate it.
#[async_trait]
pub trait StepHandle: Send + Sync {
    fn name(&self) -> &str;

    /// Owned snapshot of the step's values.
    fn data(&self) -> Value;

    fn validator(&self) -> Arc<dyn StepValidator>;

    async fn validate(&self) -> StepValidation {
        self.validator().validate(&self.data()).await
    }
}

pub struct FormStep {
    name: String,
    store: StepDataStore,
    validator: Arc<dyn StepValidator>,
    valid: bool,
    touched: bool,
    errors: BTreeMap<String, String>,
}

impl FormStep {
    pub fn from_spec(spec: &StepSpec) -> Result<Self, StoreError> {
        Self::with_values(spec, None)
    }

    /// Seeds the step from its defaults, with `values` merged on top when given.
    pub fn with_values(spec: &StepSpec, values: Option<Value>) -> Result<Self, StoreError> {
        let mut seeded = spec.defaults.clone();
        if let Some(values) = values {
            merge_values(&mut seeded, values);
        }
        let lists: Vec<&str> = spec.list_paths.iter().map(String::as_str).collect();
        Ok(Self {
            name: spec.name.clone(),
            store: StepDataStore::with_defaults(seeded, &lists)?,
            validator: Arc::clone(&spec.validator),
            valid: false,
            touched: false,
            errors: BTreeMap::new(),
        })
    }

    pub fn store(&self) -> &StepDataStore {
        &self.store
    }

    pub fn revision(&self) -> u64 {
        self.store.revision()
    }

    pub fn is_valid(&self) -> bool {
        self.valid
    }

    pub fn is_touched(&self) -> bool {
        self.touched
    }

    pub fn errors(&self) -> &BTreeMap<String, String> {
        &self.errors
    }

    /// Writes one field and re-checks it. Returns the field's current error, if any.
    pub fn set_value(
        &mut self,
        path: &str,
        value: Value,
    ) -> Result<Option<FieldValidationError>, StoreError> {
        self.store.set_value(path, value)?;
        self.changed();
        Ok(self.refresh_field(path))
    }

    pub fn append_row(&mut self, list_path: &str, row: Value) -> Result<RowId, StoreError> {
        let id = self.store.append_row(list_path, row)?;
        self.changed();
        self.refresh_list(list_path);
        Ok(id)
    }

    pub fn remove_row(&mut self, list_path: &str, index: usize) -> Result<(RowId, Value), StoreError> {
        let removed = self.store.remove_row(list_path, index)?;
        self.changed();
        self.refresh_list(list_path);
        Ok(removed)
    }

    /// Replaces all values (edit-mode rehydration). Clears field errors.
    pub fn reset(&mut self, values: Value) -> Result<(), StoreError> {
        self.store.reset(values)?;
        self.valid = false;
        self.errors.clear();
        Ok(())
    }

    /// Records a full validation result computed against this step's data.
    pub fn apply_result(&mut self, result: &StepValidation) {
        self.valid = result.is_valid();
        self.errors = result.error_map();
    }

    /// Marks the step invalid with a step-level message (e.g. validator timeout).
    pub fn fail_with(&mut self, message: &str) {
        self.valid = false;
        self.errors.insert(self.name.clone(), message.to_string());
    }

    pub fn state(&self) -> StepState {
        StepState {
            name: self.name.clone(),
            data: self.store.snapshot(),
            valid: self.valid,
            touched: self.touched,
            errors: self.errors.clone(),
        }
    }

    fn changed(&mut self) {
        self.touched = true;
        self.valid = false;
        self.errors.remove(&self.name);
    }

    fn refresh_field(&mut self, path: &str) -> Option<FieldValidationError> {
        let error = self.validator.validate_field(path, &self.store.snapshot());
        match &error {
            Some(e) => {
                self.errors.insert(path.to_string(), e.message.clone());
            }
            None => {
                self.errors.remove(path);
            }
        }
        error
    }

    fn refresh_list(&mut self, list_path: &str) {
        // Row indices shifted; row errors come back on the next full validation.
        let prefix = format!("{}.", list_path);
        self.errors.retain(|k, _| !k.starts_with(&prefix));
        self.refresh_field(list_path);
    }
}

#[async_trait]
impl StepHandle for FormStep {
    fn name(&self) -> &str {
        &self.name
    }

    fn data(&self) -> Value {
        self.store.snapshot()
    }

    fn validator(&self) -> Arc<dyn StepValidator> {
        Arc::clone(&self.validator)
    }
}

impl std::fmt::Debug for FormStep {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FormStep")
            .field("name", &self.name)
            .field("revision", &self.store.revision())
            .field("valid", &self.valid)
            .field("touched", &self.touched)
            .field("errors", &self.errors)
            .finish_non_exhaustive()
    }
}
