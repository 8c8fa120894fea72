// Submission payloads: the write-once output of a flow's assembler.

pub mod reader;

pub use reader::StepReader;

use serde::Serialize;
use serde_json::Value;
use std::fmt;
use thiserror::Error;

use crate::flows::FlowKind;
use crate::utils::logging::mask_secrets_in_json;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AssemblyError {
    #[error("step '{step}' is missing required field '{field}'")]
    MissingField { step: String, field: String },

    #[error("'{field}' has unsupported value '{value}'")]
    UnsupportedValue { field: String, value: String },

    #[error("'{field}' is malformed: {reason}")]
    Malformed { field: String, reason: String },

    #[error("form has no step named '{0}'")]
    UnknownStep(String),

    #[error("failed to encode payload: {0}")]
    Encode(String),
}

impl From<serde_json::Error> for AssemblyError {
    fn from(e: serde_json::Error) -> Self {
        AssemblyError::Encode(e.to_string())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum HttpMethod {
    Post,
    Put,
    Patch,
}

impl HttpMethod {
    pub fn as_str(&self) -> &'static str {
        match self {
            HttpMethod::Post => "POST",
            HttpMethod::Put => "PUT",
            HttpMethod::Patch => "PATCH",
        }
    }
}

impl fmt::Display for HttpMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "mode", rename_all = "camelCase")]
pub enum SubmitTarget {
    Create,
    Update { id: String },
}

/// Backend-shaped request body plus the route it goes to. Immutable once built.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SubmissionPayload {
    kind: FlowKind,
    target: SubmitTarget,
    body: Value,
}

impl SubmissionPayload {
    pub fn new(kind: FlowKind, target: SubmitTarget, body: Value) -> Self {
        Self { kind, target, body }
    }

    pub fn kind(&self) -> FlowKind {
        self.kind
    }

    pub fn target(&self) -> &SubmitTarget {
        &self.target
    }

    pub fn body(&self) -> &Value {
        &self.body
    }

    pub fn method(&self) -> HttpMethod {
        match self.target {
            SubmitTarget::Create => HttpMethod::Post,
            SubmitTarget::Update { .. } => self.kind.update_method(),
        }
    }

    pub fn path(&self) -> String {
        match &self.target {
            SubmitTarget::Create => format!("/{}", self.kind.endpoint()),
            SubmitTarget::Update { id } => format!("/{}/{}", self.kind.endpoint(), id),
        }
    }

    /// Body with every secret-bearing value masked, for logs and transcripts.
    pub fn masked_body(&self) -> Value {
        mask_secrets_in_json(&self.body)
    }
}
