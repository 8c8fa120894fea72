// Client onboarding: company profile, integration preferences, approval options.

use serde_json::{json, Value};

use super::{FlowKind, FlowMessages, IntegrationFlow};
use crate::models::requests::{
    ClientApprovalRequest, ClientIntegrationRequest, ClientRequest, CompanyRequest, ContactRequest,
};
use crate::models::responses::{decode_record, ClientRecord};
use crate::payload::AssemblyError;
use crate::validation::{FormatRule, Rule, RuleSet};
use crate::wizard::{AggregateForm, StepSpec, WizardDefinition};

pub const COMPANY: &str = "company";
pub const INTEGRATION: &str = "integration";
pub const APPROVAL: &str = "approval";

#[derive(Debug, Default, Clone, Copy)]
pub struct ClientFlow;

impl IntegrationFlow for ClientFlow {
    fn kind(&self) -> FlowKind {
        FlowKind::Client
    }

    fn definition(&self) -> WizardDefinition {
        WizardDefinition::new(vec![
            StepSpec::new(
                COMPANY,
                "Company",
                json!({
                    "companyName": "",
                    "industry": "",
                    "companySize": "",
                    "address": "",
                    "contactName": "",
                    "contactEmail": ""
                }),
                RuleSet::new()
                    .field("companyName", [Rule::required("Company name is required")])
                    .field("industry", [Rule::required("Industry is required")])
                    .field("contactName", [Rule::required("Contact name is required")])
                    .field(
                        "contactEmail",
                        [Rule::required("Email is required"), Rule::format(FormatRule::Email)],
                    ),
            ),
            StepSpec::new(
                INTEGRATION,
                "Integration",
                json!({
                    "integrationType": "rest",
                    "baseUrl": "",
                    "authMethod": "oauth2",
                    "dataFormat": "json",
                    "rateLimit": ""
                }),
                RuleSet::new()
                    .field(
                        "integrationType",
                        [
                            Rule::required("Integration type is required"),
                            Rule::one_of(&["rest", "graphql", "file"], "Unsupported integration type"),
                        ],
                    )
                    .field(
                        "baseUrl",
                        [Rule::required("Base URL is required"), Rule::format(FormatRule::LooseUrl)],
                    )
                    .field(
                        "authMethod",
                        [
                            Rule::required("Authentication method is required"),
                            Rule::one_of(&["oauth2", "apikey", "basic"], "Unsupported authentication method"),
                        ],
                    )
                    .field(
                        "dataFormat",
                        [Rule::one_of(&["json", "xml"], "Data format must be json or xml")],
                    )
                    .field(
                        "rateLimit",
                        [
                            Rule::integer("Rate limit must be a whole number"),
                            Rule::min(1.0, "Rate limit must be at least 1"),
                        ],
                    ),
            ),
            StepSpec::new(
                APPROVAL,
                "Approval",
                json!({ "autoApprove": false, "sendWelcomeEmail": false }),
                RuleSet::new(),
            ),
        ])
    }

    fn assemble_body(&self, form: &AggregateForm) -> Result<Value, AssemblyError> {
        let company = form.reader(COMPANY)?;
        let integration = form.reader(INTEGRATION)?;
        let approval = form.reader(APPROVAL)?;

        let request = ClientRequest {
            company: CompanyRequest {
                name: company.text("companyName")?,
                industry: company.text("industry")?,
                size: company.opt_text("companySize"),
                address: company.opt_text("address"),
                contact: ContactRequest {
                    name: company.text("contactName")?,
                    email: company.text("contactEmail")?,
                },
            },
            integration: ClientIntegrationRequest {
                kind: integration.text("integrationType")?,
                base_url: integration.text("baseUrl")?,
                auth_method: integration.text("authMethod")?,
                data_format: integration.text_or("dataFormat", "json"),
                rate_limit: integration.opt_number("rateLimit")?,
            },
            approval: ClientApprovalRequest {
                auto_approve: approval.flag("autoApprove"),
                send_welcome_email: approval.flag("sendWelcomeEmail"),
            },
        };
        Ok(serde_json::to_value(request)?)
    }

    fn hydrate(&self, record: &Value) -> Result<AggregateForm, AssemblyError> {
        let record: ClientRecord = decode_record(record)?;
        let mut form = AggregateForm::new();
        form.insert(
            COMPANY,
            json!({
                "companyName": record.company.name,
                "industry": record.company.industry,
                "companySize": record.company.size.unwrap_or_default(),
                "address": record.company.address.unwrap_or_default(),
                "contactName": record.company.contact.name,
                "contactEmail": record.company.contact.email
            }),
        );

        let mut integration = json!({
            "integrationType": record.integration.kind,
            "baseUrl": record.integration.base_url,
            "authMethod": record.integration.auth_method,
            "rateLimit": record.integration.rate_limit.map_or(Value::String(String::new()), Value::from)
        });
        if !record.integration.data_format.is_empty() {
            integration["dataFormat"] = json!(record.integration.data_format);
        }
        form.insert(INTEGRATION, integration);

        form.insert(
            APPROVAL,
            json!({
                "autoApprove": record.approval.auto_approve,
                "sendWelcomeEmail": record.approval.send_welcome_email
            }),
        );
        Ok(form)
    }

    fn messages(&self) -> FlowMessages {
        FlowMessages {
            created: (
                "Client created successfully".into(),
                "The client is ready to be connected to integrations".into(),
            ),
            updated: ("Client updated successfully".into(), String::new()),
            failed: ("Error saving client".into(), "Please try again".into()),
        }
    }

    fn sample_overrides(&self) -> AggregateForm {
        let mut form = AggregateForm::new();
        form.insert(
            COMPANY,
            json!({
                "companyName": "Northwind Registry",
                "industry": "Financial Services",
                "contactName": "Alex Doe",
                "contactEmail": "alex.doe@northwind.example"
            }),
        );
        form.insert(INTEGRATION, json!({ "baseUrl": "api.northwind.example/v2" }));
        form
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::validation::StepValidator;

    fn filled_form() -> AggregateForm {
        let mut form = ClientFlow.definition().default_form();
        form.merge(ClientFlow.sample_overrides());
        form
    }

    #[tokio::test]
    async fn required_fields_block_regardless_of_order() {
        let def = ClientFlow.definition();
        let validator = &def.step(0).unwrap().validator;

        let mut company = def.step(0).unwrap().defaults.clone();
        company["contactEmail"] = json!("alex@northwind.example");
        company["companyName"] = json!("Northwind");
        let errors = validator.validate(&company).await.error_map();
        assert_eq!(
            errors.keys().map(String::as_str).collect::<Vec<_>>(),
            vec!["contactName", "industry"]
        );

        company["contactEmail"] = json!("not-an-email");
        assert_eq!(
            validator.validate(&company).await.error_map()["contactEmail"],
            "Invalid email address"
        );
    }

    #[tokio::test]
    async fn rate_limit_is_optional_but_checked() {
        let def = ClientFlow.definition();
        let validator = &def.step(1).unwrap().validator;
        let mut integration = filled_form().get(INTEGRATION).cloned().unwrap();
        assert!(validator.validate(&integration).await.is_valid());

        integration["rateLimit"] = json!("0");
        assert_eq!(
            validator.validate(&integration).await.error_map()["rateLimit"],
            "Rate limit must be at least 1"
        );
    }

    #[tokio::test]
    async fn approval_step_is_always_valid() {
        let def = ClientFlow.definition();
        let step = def.step(2).unwrap();
        assert!(step.validator.validate(&json!({})).await.is_valid());
    }

    #[test]
    fn payload_groups_sections() {
        let mut form = filled_form();
        let mut overlay = AggregateForm::new();
        overlay.insert(INTEGRATION, json!({ "rateLimit": "250" }));
        overlay.insert(APPROVAL, json!({ "sendWelcomeEmail": true }));
        form.merge(overlay);

        let body = ClientFlow.assemble_body(&form).unwrap();
        assert_eq!(
            body,
            json!({
                "company": {
                    "name": "Northwind Registry",
                    "industry": "Financial Services",
                    "size": null,
                    "address": null,
                    "contact": { "name": "Alex Doe", "email": "alex.doe@northwind.example" }
                },
                "integration": {
                    "type": "rest",
                    "baseUrl": "api.northwind.example/v2",
                    "authMethod": "oauth2",
                    "dataFormat": "json",
                    "rateLimit": 250
                },
                "approval": { "autoApprove": false, "sendWelcomeEmail": true }
            })
        );

        let mut form = ClientFlow.definition().default_form();
        form.merge(ClientFlow.hydrate(&body).unwrap());
        assert_eq!(ClientFlow.assemble_body(&form).unwrap(), body);
    }
}
