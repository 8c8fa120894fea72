// Concrete wizard flows.
//
// Each flow bundles its step definitions (defaults + rule sets), the assembler that turns
// the aggregate form into the backend body, and the inverse used to open a record for
// editing.

pub mod approval_request;
pub mod client;
pub mod file_upload;
pub mod graphql;
pub mod rest_api;

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;
use thiserror::Error;

use crate::payload::{AssemblyError, HttpMethod, SubmissionPayload, SubmitTarget};
use crate::wizard::{AggregateForm, WizardDefinition};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum FlowKind {
    FileUpload,
    RestApi,
    Graphql,
    Client,
    ApprovalRequest,
}

impl FlowKind {
    pub const ALL: [FlowKind; 5] = [
        FlowKind::FileUpload,
        FlowKind::RestApi,
        FlowKind::Graphql,
        FlowKind::Client,
        FlowKind::ApprovalRequest,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            FlowKind::FileUpload => "file-upload",
            FlowKind::RestApi => "rest-api",
            FlowKind::Graphql => "graphql",
            FlowKind::Client => "client",
            FlowKind::ApprovalRequest => "approval-request",
        }
    }

    /// Backend collection the flow writes to.
    pub fn endpoint(&self) -> &'static str {
        match self {
            FlowKind::FileUpload => "file-integration",
            FlowKind::RestApi => "rest-api-integration",
            FlowKind::Graphql => "graphql-integration",
            FlowKind::Client => "client",
            FlowKind::ApprovalRequest => "production-approval-request",
        }
    }

    pub fn update_method(&self) -> HttpMethod {
        match self {
            FlowKind::FileUpload => HttpMethod::Patch,
            _ => HttpMethod::Put,
        }
    }
}

impl fmt::Display for FlowKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("unknown flow '{0}' (expected one of: file-upload, rest-api, graphql, client, approval-request)")]
pub struct UnknownFlow(pub String);

impl FromStr for FlowKind {
    type Err = UnknownFlow;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let wanted = s.trim().to_ascii_lowercase();
        FlowKind::ALL
            .into_iter()
            .find(|k| k.as_str() == wanted)
            .ok_or_else(|| UnknownFlow(s.to_string()))
    }
}

/// Title/detail pairs shown after a submit attempt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FlowMessages {
    pub created: (String, String),
    pub updated: (String, String),
    pub failed: (String, String),
}

impl Default for FlowMessages {
    fn default() -> Self {
        Self {
            created: (
                "Integration created successfully".into(),
                "You can now use this integration in your workflows".into(),
            ),
            updated: ("Integration updated successfully".into(), String::new()),
            failed: ("Error saving integration".into(), "Please try again".into()),
        }
    }
}

pub trait IntegrationFlow: Send + Sync {
    fn kind(&self) -> FlowKind;

    fn definition(&self) -> WizardDefinition;

    /// Pure transform from the aggregate form to the backend request body.
    fn assemble_body(&self, form: &AggregateForm) -> Result<Value, AssemblyError>;

    /// Maps a backend record onto the aggregate form (edit mode).
    fn hydrate(&self, record: &Value) -> Result<AggregateForm, AssemblyError>;

    fn messages(&self) -> FlowMessages {
        FlowMessages::default()
    }

    /// Values a proof run fills in where defaults are blank.
    fn sample_overrides(&self) -> AggregateForm {
        AggregateForm::new()
    }

    fn assemble(&self, form: &AggregateForm) -> Result<SubmissionPayload, AssemblyError> {
        self.assemble_for(form, SubmitTarget::Create)
    }

    fn assemble_for(
        &self,
        form: &AggregateForm,
        target: SubmitTarget,
    ) -> Result<SubmissionPayload, AssemblyError> {
        let body = self.assemble_body(form)?;
        Ok(SubmissionPayload::new(self.kind(), target, body))
    }
}

pub fn flow_for(kind: FlowKind) -> Arc<dyn IntegrationFlow> {
    match kind {
        FlowKind::FileUpload => Arc::new(file_upload::FileUploadFlow),
        FlowKind::RestApi => Arc::new(rest_api::RestApiFlow),
        FlowKind::Graphql => Arc::new(graphql::GraphqlFlow),
        FlowKind::Client => Arc::new(client::ClientFlow),
        FlowKind::ApprovalRequest => Arc::new(approval_request::ApprovalRequestFlow),
    }
}

/// Backend responses wrap records as `{ "data": { ... } }`; accept both shapes.
pub fn unwrap_record(value: &Value) -> &Value {
    match value.get("data") {
        Some(inner) if inner.is_object() => inner,
        _ => value,
    }
}
