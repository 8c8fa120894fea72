// Step validation: field errors, step results and the async validator seam.

pub mod rules;

pub use rules::{Condition, FormatRule, Rule, RuleKind, RuleSet};

use async_trait::async_trait;
use serde::Serialize;
use serde_json::Value;
use std::collections::BTreeMap;
use thiserror::Error;

/// One field, one rule, one message.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Error)]
#[serde(rename_all = "camelCase")]
#[error("{field}: {message}")]
pub struct FieldValidationError {
    pub field: String,
    pub rule: RuleKind,
    pub message: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("step '{step}' has {} invalid field(s)", .errors.len())]
pub struct StepValidationError {
    pub step: String,
    pub errors: Vec<FieldValidationError>,
}

impl StepValidationError {
    pub fn error_map(&self) -> BTreeMap<String, String> {
        to_error_map(&self.errors)
    }
}

/// Result of validating a whole step.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct StepValidation {
    pub errors: Vec<FieldValidationError>,
}

impl StepValidation {
    pub fn valid() -> Self {
        Self::default()
    }

    pub fn from_errors(errors: Vec<FieldValidationError>) -> Self {
        Self { errors }
    }

    pub fn is_valid(&self) -> bool {
        self.errors.is_empty()
    }

    /// Field path -> message, the shape the UI renders inline.
    pub fn error_map(&self) -> BTreeMap<String, String> {
        to_error_map(&self.errors)
    }

    pub fn into_result(self, step: &str) -> Result<(), StepValidationError> {
        if self.errors.is_empty() {
            Ok(())
        } else {
            Err(StepValidationError {
                step: step.to_string(),
                errors: self.errors,
            })
        }
    }
}

fn to_error_map(errors: &[FieldValidationError]) -> BTreeMap<String, String> {
    errors
        .iter()
        .map(|e| (e.field.clone(), e.message.clone()))
        .collect()
}

/// Validator for one step's values.
///
/// `validate` may suspend (remote uniqueness checks, schema resolution); the controller
/// awaits it outside of any borrow of the wizard state.
#[async_trait]
pub trait StepValidator: Send + Sync {
    /// On-change validation of a single field.
    fn validate_field(&self, field: &str, values: &Value) -> Option<FieldValidationError>;

    /// Full validation, run before advancing.
    async fn validate(&self, values: &Value) -> StepValidation;
}

#[async_trait]
impl StepValidator for RuleSet {
    fn validate_field(&self, field: &str, values: &Value) -> Option<FieldValidationError> {
        self.evaluate_field(field, values)
    }

    async fn validate(&self, values: &Value) -> StepValidation {
        StepValidation::from_errors(self.evaluate(values))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn connection_rules() -> RuleSet {
        RuleSet::new()
            .field("connectionType", [Rule::required("Connection type is required")])
            .when(Condition::equals("connectionType", "S3"), |s| {
                s.field(
                    "s3.bucketName",
                    [
                        Rule::required("Bucket name is required"),
                        Rule::format(FormatRule::BucketName),
                    ],
                )
                .field(
                    "s3.authMethod",
                    [Rule::required("Authentication method is required")],
                )
                .when(Condition::equals("s3.authMethod", "IAM Role"), |s| {
                    s.field(
                        "s3.arn",
                        [
                            Rule::required("IAM Role ARN is required"),
                            Rule::format(FormatRule::Arn),
                        ],
                    )
                })
            })
    }

    #[tokio::test]
    async fn rule_set_validates_as_step_validator() {
        let validator: &dyn StepValidator = &connection_rules();
        let result = validator
            .validate(&json!({
                "connectionType": "S3",
                "s3": { "bucketName": "My-Bucket", "authMethod": "IAM Role", "arn": "arn:aws:iam::12345:role/X" }
            }))
            .await;

        assert!(!result.is_valid());
        let map = result.error_map();
        assert!(map["s3.bucketName"].contains("lowercase"));
        assert!(map["s3.arn"].starts_with("Invalid ARN format"));
    }

    #[tokio::test]
    async fn valid_step_has_no_errors() {
        let result = connection_rules()
            .validate(&json!({
                "connectionType": "S3",
                "s3": {
                    "bucketName": "shareholder-data",
                    "authMethod": "IAM Role",
                    "arn": "arn:aws:iam::123456789012:role/S3Access"
                }
            }))
            .await;
        assert!(result.is_valid());
        assert!(result.into_result("connection").is_ok());
    }

    #[test]
    fn into_result_carries_step_name() {
        let err = StepValidation::from_errors(vec![FieldValidationError {
            field: "integrationName".into(),
            rule: RuleKind::Required,
            message: "Integration name is required".into(),
        }])
        .into_result("fileSettings")
        .unwrap_err();
        assert_eq!(err.step, "fileSettings");
        assert_eq!(err.to_string(), "step 'fileSettings' has 1 invalid field(s)");
        assert_eq!(
            err.error_map().get("integrationName").map(String::as_str),
            Some("Integration name is required")
        );
    }

    #[test]
    fn field_validation_is_on_change_only() {
        let rules = connection_rules();
        let values = json!({ "connectionType": "S3", "s3": { "authMethod": "IAM Role" } });
        assert!(rules.validate_field("s3.arn", &values).is_some());
        assert!(rules.validate_field("s3.authMethod", &values).is_none());
    }
}
