// Typed reads out of a step's raw form values.
//
// Form inputs are loosely typed: numbers may arrive as text, toggles as "true". Readers
// normalize that once so assemblers can stay declarative.

use serde_json::Value;

use super::AssemblyError;
use crate::form::lookup;
use crate::validation::rules::{as_number, as_text, is_empty};

#[derive(Debug, Clone, Copy)]
pub struct StepReader<'a> {
    step: &'a str,
    values: &'a Value,
}

impl<'a> StepReader<'a> {
    pub fn new(step: &'a str, values: &'a Value) -> Self {
        Self { step, values }
    }

    pub fn step(&self) -> &'a str {
        self.step
    }

    pub fn value(&self, path: &str) -> Option<&'a Value> {
        lookup(self.values, path)
    }

    /// Required text. Empty values are reported as missing.
    pub fn text(&self, path: &str) -> Result<String, AssemblyError> {
        self.opt_text(path).ok_or_else(|| self.missing(path))
    }

    pub fn opt_text(&self, path: &str) -> Option<String> {
        let value = self.value(path);
        if is_empty(value) {
            return None;
        }
        value.map(as_text)
    }

    pub fn text_or(&self, path: &str, default: &str) -> String {
        self.opt_text(path).unwrap_or_else(|| default.to_string())
    }

    pub fn flag(&self, path: &str) -> bool {
        match self.value(path) {
            Some(Value::Bool(b)) => *b,
            Some(Value::String(s)) => s == "true",
            _ => false,
        }
    }

    pub fn number(&self, path: &str) -> Result<u64, AssemblyError> {
        self.opt_number(path)?.ok_or_else(|| self.missing(path))
    }

    pub fn opt_number(&self, path: &str) -> Result<Option<u64>, AssemblyError> {
        let value = self.value(path);
        if is_empty(value) {
            return Ok(None);
        }
        let value = value.unwrap_or(&Value::Null);
        match as_number(value) {
            Some(n) if n >= 0.0 && n.fract() == 0.0 => Ok(Some(n as u64)),
            _ => Err(AssemblyError::Malformed {
                field: self.qualified(path),
                reason: format!("expected a whole number, got {}", value),
            }),
        }
    }

    /// Rows of a repeatable list; a missing list reads as empty.
    pub fn rows(&self, path: &str) -> Vec<StepReader<'a>> {
        match self.value(path) {
            Some(Value::Array(items)) => items
                .iter()
                .map(|row| StepReader::new(self.step, row))
                .collect(),
            _ => Vec::new(),
        }
    }

    pub fn unsupported(&self, path: &str, value: &str) -> AssemblyError {
        AssemblyError::UnsupportedValue {
            field: self.qualified(path),
            value: value.to_string(),
        }
    }

    fn missing(&self, path: &str) -> AssemblyError {
        AssemblyError::MissingField {
            step: self.step.to_string(),
            field: path.to_string(),
        }
    }

    fn qualified(&self, path: &str) -> String {
        format!("{}.{}", self.step, path)
    }
}
