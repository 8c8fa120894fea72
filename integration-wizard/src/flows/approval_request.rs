// Production approval request: a single-step form.

use serde_json::{json, Value};

use super::{FlowKind, FlowMessages, IntegrationFlow};
use crate::models::requests::ProductionApprovalRequest;
use crate::models::responses::{decode_record, ApprovalRequestRecord};
use crate::payload::AssemblyError;
use crate::validation::{Rule, RuleSet};
use crate::wizard::{AggregateForm, StepSpec, WizardDefinition};

pub const REQUEST: &str = "request";

pub const REQUEST_TYPES: &[&str] = &[
    "API Release",
    "Service Update",
    "Configuration Change",
    "Database Migration",
];
pub const ENVIRONMENTS: &[&str] = &["Production", "Staging", "QA"];

#[derive(Debug, Default, Clone, Copy)]
pub struct ApprovalRequestFlow;

impl IntegrationFlow for ApprovalRequestFlow {
    fn kind(&self) -> FlowKind {
        FlowKind::ApprovalRequest
    }

    fn definition(&self) -> WizardDefinition {
        let rules = RuleSet::new()
            .field(
                "name",
                [
                    Rule::required("Request name is required"),
                    Rule::min_length(5, "Request name must be at least 5 characters"),
                ],
            )
            .field(
                "type",
                [
                    Rule::required("Request type is required"),
                    Rule::one_of(REQUEST_TYPES, "Unsupported request type"),
                ],
            )
            .field(
                "environment",
                [
                    Rule::required("Environment is required"),
                    Rule::one_of(ENVIRONMENTS, "Unsupported environment"),
                ],
            )
            .field(
                "description",
                [
                    Rule::required("Description is required"),
                    Rule::min_length(10, "Description must be at least 10 characters"),
                ],
            )
            .field(
                "changes",
                [
                    Rule::required("Changes are required"),
                    Rule::min_length(5, "Changes must be at least 5 characters"),
                ],
            );

        WizardDefinition::new(vec![StepSpec::new(
            REQUEST,
            "Request",
            json!({
                "name": "",
                "type": "",
                "environment": "Production",
                "description": "",
                "changes": "",
                "dependencies": ""
            }),
            rules,
        )])
    }

    fn assemble_body(&self, form: &AggregateForm) -> Result<Value, AssemblyError> {
        let request = form.reader(REQUEST)?;
        let body = ProductionApprovalRequest {
            name: request.text("name")?,
            kind: request.text("type")?,
            environment: request.text("environment")?,
            description: request.text("description")?,
            changes: request.text("changes")?,
            dependencies: request.text_or("dependencies", ""),
        };
        Ok(serde_json::to_value(body)?)
    }

    fn hydrate(&self, record: &Value) -> Result<AggregateForm, AssemblyError> {
        let record: ApprovalRequestRecord = decode_record(record)?;
        let mut form = AggregateForm::new();
        form.insert(
            REQUEST,
            json!({
                "name": record.name,
                "type": record.kind,
                "environment": record.environment,
                "description": record.description,
                "changes": record.changes,
                "dependencies": record.dependencies.unwrap_or_default()
            }),
        );
        Ok(form)
    }

    fn messages(&self) -> FlowMessages {
        FlowMessages {
            created: (
                "Approval request submitted".into(),
                "Reviewers have been notified of your request".into(),
            ),
            updated: ("Approval request updated".into(), String::new()),
            failed: ("Error submitting request".into(), "Please try again".into()),
        }
    }

    fn sample_overrides(&self) -> AggregateForm {
        let mut form = AggregateForm::new();
        form.insert(
            REQUEST,
            json!({
                "name": "Release shareholder API v2",
                "type": "API Release",
                "description": "Promote the v2 shareholder endpoints to production.",
                "changes": "New pagination, deprecated v1 search"
            }),
        );
        form
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::validation::StepValidator;

    #[tokio::test]
    async fn minimum_lengths_apply() {
        let def = ApprovalRequestFlow.definition();
        let step = def.step(0).unwrap();
        let values = json!({
            "name": "Rel",
            "type": "Hotfix",
            "environment": "QA",
            "description": "short",
            "changes": "bump"
        });
        let errors = step.validator.validate(&values).await.error_map();
        assert_eq!(errors["name"], "Request name must be at least 5 characters");
        assert_eq!(errors["type"], "Unsupported request type");
        assert_eq!(errors["description"], "Description must be at least 10 characters");
        assert_eq!(errors["changes"], "Changes must be at least 5 characters");
        assert!(!errors.contains_key("environment"));
    }

    #[test]
    fn dependencies_default_to_empty() {
        let mut form = ApprovalRequestFlow.definition().default_form();
        form.merge(ApprovalRequestFlow.sample_overrides());
        let body = ApprovalRequestFlow.assemble_body(&form).unwrap();
        assert_eq!(body["dependencies"], json!(""));
        assert_eq!(body["type"], json!("API Release"));
        assert_eq!(body["environment"], json!("Production"));
    }
}
