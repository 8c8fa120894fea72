// GraphQL integration: endpoint basics, SDL schema, security and complexity limits.

use serde_json::{json, Value};

use super::{FlowKind, IntegrationFlow};
use crate::models::requests::{
    GraphqlIntegrationRequest, GraphqlSchemaDesignRequest, GraphqlSecurityRequest,
};
use crate::models::responses::{decode_record, GraphqlIntegrationRecord};
use crate::payload::AssemblyError;
use crate::validation::{FormatRule, Rule, RuleSet};
use crate::wizard::{AggregateForm, StepSpec, WizardDefinition};

pub const BASIC_INFO: &str = "basicInfo";
pub const SCHEMA_DESIGN: &str = "schemaDesign";
pub const SECURITY: &str = "security";
pub const REVIEW: &str = "review";

#[derive(Debug, Default, Clone, Copy)]
pub struct GraphqlFlow;

impl IntegrationFlow for GraphqlFlow {
    fn kind(&self) -> FlowKind {
        FlowKind::Graphql
    }

    fn definition(&self) -> WizardDefinition {
        WizardDefinition::new(vec![
            StepSpec::new(
                BASIC_INFO,
                "Basic Info",
                json!({
                    "integrationName": "",
                    "graphqlEndpoint": "",
                    "introspectionEnabled": false,
                    "environment": "",
                    "status": "draft",
                    "updateFrequency": "realtime"
                }),
                basic_info_rules(),
            ),
            StepSpec::new(
                SCHEMA_DESIGN,
                "Schema Design",
                json!({ "type": "SDL", "schemaDesign": "" }),
                RuleSet::new()
                    .field(
                        "type",
                        [
                            Rule::required("Schema type is required"),
                            Rule::one_of(&["SDL"], "Only SDL schemas are supported"),
                        ],
                    )
                    .field(
                        "schemaDesign",
                        [
                            Rule::required("Schema design is required"),
                            Rule::min_length(10, "Schema design must be at least 10 characters"),
                        ],
                    ),
            ),
            StepSpec::new(
                SECURITY,
                "Security & Complexity",
                json!({
                    "authenticationMethod": "JWT",
                    "maxQueryDepth": 10,
                    "maxQueryCost": 1000,
                    "rateLimit": 100,
                    "timeout": 30
                }),
                security_rules(),
            ),
            StepSpec::new(REVIEW, "Review", json!({}), RuleSet::new()),
        ])
    }

    fn assemble_body(&self, form: &AggregateForm) -> Result<Value, AssemblyError> {
        let basic = form.reader(BASIC_INFO)?;
        let schema = form.reader(SCHEMA_DESIGN)?;
        let security = form.reader(SECURITY)?;

        let request = GraphqlIntegrationRequest {
            name: basic.text("integrationName")?,
            url: basic.text("graphqlEndpoint")?,
            is_introspection_enabled: basic.flag("introspectionEnabled"),
            status: basic.text("status")?,
            environment: basic.text("environment")?,
            update_frequency: basic.text("updateFrequency")?,
            schema_design: GraphqlSchemaDesignRequest {
                kind: schema.text_or("type", "SDL"),
                schema_design: schema.text("schemaDesign")?,
            },
            security: GraphqlSecurityRequest {
                authentication_method: security.text("authenticationMethod")?,
                max_query_depth: security.number("maxQueryDepth")?,
                max_query_cost: security.number("maxQueryCost")?,
                rate_limit: security.number("rateLimit")?,
                timeout: security.number("timeout")?,
            },
        };
        Ok(serde_json::to_value(request)?)
    }

    fn hydrate(&self, record: &Value) -> Result<AggregateForm, AssemblyError> {
        let record: GraphqlIntegrationRecord = decode_record(record)?;
        let mut form = AggregateForm::new();

        let mut basic = json!({
            "integrationName": record.name,
            "graphqlEndpoint": record.url,
            "introspectionEnabled": record.is_introspection_enabled,
            "status": record.status
        });
        if let Some(environment) = record.environment {
            basic["environment"] = json!(environment);
        }
        if let Some(frequency) = record.update_frequency {
            basic["updateFrequency"] = json!(frequency);
        }
        form.insert(BASIC_INFO, basic);

        if let Some(design) = record.schema_design {
            form.insert(
                SCHEMA_DESIGN,
                json!({ "type": design.kind, "schemaDesign": design.schema_design }),
            );
        }
        if let Some(security) = record.security {
            form.insert(
                SECURITY,
                json!({
                    "authenticationMethod": security.authentication_method,
                    "maxQueryDepth": security.max_query_depth,
                    "maxQueryCost": security.max_query_cost,
                    "rateLimit": security.rate_limit,
                    "timeout": security.timeout
                }),
            );
        }
        Ok(form)
    }

    fn sample_overrides(&self) -> AggregateForm {
        let mut form = AggregateForm::new();
        form.insert(
            BASIC_INFO,
            json!({
                "integrationName": "Shareholder Graph",
                "graphqlEndpoint": "https://api.yourplatform.com/graphql",
                "environment": "staging"
            }),
        );
        form.insert(
            SCHEMA_DESIGN,
            json!({ "schemaDesign": "type Shareholder { id: ID! name: String! shares: Int }" }),
        );
        form
    }
}

fn basic_info_rules() -> RuleSet {
    RuleSet::new()
        .field(
            "integrationName",
            [
                Rule::required("Integration name is required"),
                Rule::min_length(3, "Name must be at least 3 characters"),
            ],
        )
        .field(
            "graphqlEndpoint",
            [
                Rule::required("GraphQL endpoint is required"),
                Rule::format(FormatRule::GraphqlEndpoint),
            ],
        )
        .field("environment", [Rule::required("Environment is required")])
        .field(
            "status",
            [
                Rule::required("Status is required"),
                Rule::one_of(&["active", "inactive", "draft"], "Unsupported status"),
            ],
        )
        .field(
            "updateFrequency",
            [
                Rule::required("Update frequency is required"),
                Rule::one_of(
                    &["realtime", "hourly", "daily", "weekly"],
                    "Unsupported update frequency",
                ),
            ],
        )
}

fn bounded(required: &str, min: f64, max: f64, range: &str) -> [Rule; 4] {
    [
        Rule::required(required),
        Rule::integer("Must be a whole number"),
        Rule::min(min, range),
        Rule::max(max, range),
    ]
}

fn security_rules() -> RuleSet {
    RuleSet::new()
        .field(
            "authenticationMethod",
            [
                Rule::required("Authentication method is required"),
                Rule::one_of(&["JWT", "APIKey", "OAuth2"], "Unsupported authentication method"),
            ],
        )
        .field(
            "maxQueryDepth",
            bounded("Max query depth is required", 1.0, 50.0, "Must be between 1-50"),
        )
        .field(
            "maxQueryCost",
            bounded("Max query cost is required", 1.0, 100_000.0, "Must be between 1-100000"),
        )
        .field(
            "rateLimit",
            bounded("Rate limit is required", 1.0, 10_000.0, "Must be between 1-10000"),
        )
        .field(
            "timeout",
            bounded("Timeout is required", 1.0, 300.0, "Must be between 1-300 seconds"),
        )
}
