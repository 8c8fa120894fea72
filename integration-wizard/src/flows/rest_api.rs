// REST API integration: endpoint basics, authentication, data schema.

use serde_json::{json, Map, Value};
use std::collections::BTreeMap;

use super::{FlowKind, IntegrationFlow};
use crate::models::requests::{
    FieldDetailRequest, QueryParamsRequest, RestApiIntegrationRequest, RestAuthenticationRequest,
    SchemaRequest,
};
use crate::models::responses::{decode_record, RestApiIntegrationRecord};
use crate::payload::{AssemblyError, StepReader};
use crate::validation::{Condition, FormatRule, Rule, RuleSet};
use crate::wizard::{AggregateForm, StepSpec, WizardDefinition};

pub const BASIC_INFO: &str = "basicInfo";
pub const AUTHENTICATION: &str = "authentication";
pub const DATA_SCHEMA: &str = "dataSchema";
pub const REVIEW: &str = "review";

const FIELD_NAME_PATTERN: &str = r"^[A-Za-z_][A-Za-z0-9_]*$";
const FIELD_TYPES: &[&str] = &["string", "number", "boolean", "date", "array", "object"];

#[derive(Debug, Default, Clone, Copy)]
pub struct RestApiFlow;

impl IntegrationFlow for RestApiFlow {
    fn kind(&self) -> FlowKind {
        FlowKind::RestApi
    }

    fn definition(&self) -> WizardDefinition {
        WizardDefinition::new(vec![
            StepSpec::new(
                BASIC_INFO,
                "Basic Info",
                json!({
                    "integrationName": "",
                    "dataFormat": "JSON",
                    "updateFrequency": "",
                    "baseUrl": "",
                    "restMethod": "",
                    "environment": "",
                    "isActive": false,
                    "queryParams": {
                        "limit": { "enabled": false, "value": 10 },
                        "offset": { "enabled": false, "value": 0 }
                    }
                }),
                basic_info_rules(),
            ),
            StepSpec::new(
                AUTHENTICATION,
                "Authentication",
                json!({
                    "authMethod": "oauth2",
                    "grantType": "client_credentials",
                    "scopes": "read:shareholders",
                    "tokenUrl": "https://api.yourplatform.com/oauth/token",
                    "clientId": "",
                    "clientSecret": "",
                    "authUrl": "",
                    "redirectUri": "https://portal.yourcompany.com/callback",
                    "headerName": "",
                    "apiKeyValue": "",
                    "username": "",
                    "password": ""
                }),
                authentication_rules(),
            ),
            StepSpec::new(
                DATA_SCHEMA,
                "Data Schema",
                json!({
                    "resourceName": "Shareholders",
                    "endpointPath": "/shareholders",
                    "fields": [
                        { "name": "id", "type": "string", "required": true, "description": "Unique identifier" },
                        { "name": "name", "type": "string", "required": true, "description": "Shareholder's full name" }
                    ]
                }),
                data_schema_rules(),
            )
            .with_lists(&["fields"]),
            StepSpec::new(REVIEW, "Review", json!({}), RuleSet::new()),
        ])
    }

    fn assemble_body(&self, form: &AggregateForm) -> Result<Value, AssemblyError> {
        let basic = form.reader(BASIC_INFO)?;
        let auth = form.reader(AUTHENTICATION)?;
        let schema = form.reader(DATA_SCHEMA)?;

        let mut header_params = BTreeMap::new();
        header_params.insert("Content-Type".to_string(), "application/json".to_string());

        let request = RestApiIntegrationRequest {
            name: basic.text("integrationName")?,
            data_format: basic.text("dataFormat")?,
            update_frequency: basic.text("updateFrequency")?,
            advance_options: "caching".to_string(),
            url: basic.text("baseUrl")?,
            method: basic.text("restMethod")?,
            body: Map::new(),
            query_params: QueryParamsRequest {
                limit: enabled_param(&basic, "limit")?,
                offset: enabled_param(&basic, "offset")?,
            },
            header_params,
            environment: basic.text("environment")?,
            status: if basic.flag("isActive") {
                "active".to_string()
            } else {
                "inactive".to_string()
            },
            authentication: authentication(&auth)?,
            schema: SchemaRequest {
                resource_name: schema.text("resourceName")?,
                endpoint_path: schema.text("endpointPath")?,
                field_details: schema
                    .rows("fields")
                    .iter()
                    .map(|row| {
                        Ok(FieldDetailRequest {
                            name: row.text("name")?,
                            field_type: row.text("type")?,
                            description: row.text_or("description", ""),
                            is_required: row.flag("required"),
                        })
                    })
                    .collect::<Result<Vec<_>, AssemblyError>>()?,
            },
        };
        Ok(serde_json::to_value(request)?)
    }

    fn hydrate(&self, record: &Value) -> Result<AggregateForm, AssemblyError> {
        let record: RestApiIntegrationRecord = decode_record(record)?;
        let mut form = AggregateForm::new();

        let limit = record.query_params.get("limit");
        let offset = record.query_params.get("offset");
        form.insert(
            BASIC_INFO,
            json!({
                "integrationName": record.name,
                "dataFormat": record.data_format,
                "updateFrequency": record.update_frequency,
                "baseUrl": record.url,
                "restMethod": record.method,
                "environment": record.environment,
                "isActive": record.status == "active",
                "queryParams": {
                    "limit": { "enabled": truthy(limit), "value": param_value(limit) },
                    "offset": { "enabled": truthy(offset), "value": param_value(offset) }
                }
            }),
        );

        if let Some(auth) = record.authentication {
            let mut values = Map::new();
            values.insert(
                "authMethod".into(),
                json!(auth_method_from_backend(&auth.authentication_type)),
            );
            let optional = [
                ("grantType", auth.grant_type.filter(|g| g != "none")),
                ("tokenUrl", auth.token_url),
                ("clientId", auth.client_id),
                ("clientSecret", auth.client_secret),
                ("authUrl", auth.auth_url),
                ("redirectUri", auth.redirect_uri),
                ("headerName", auth.header_name),
                ("apiKeyValue", auth.api_key),
                ("username", auth.username),
                ("password", auth.password),
                ("scopes", auth.scope),
            ];
            for (key, value) in optional {
                if let Some(value) = value {
                    values.insert(key.into(), Value::String(value));
                }
            }
            form.insert(AUTHENTICATION, Value::Object(values));
        }

        if let Some(schema) = record.schema {
            let fields: Vec<Value> = schema
                .field_details
                .into_iter()
                .map(|f| {
                    json!({
                        "name": f.name,
                        "type": f.field_type,
                        "required": f.is_required,
                        "description": f.description.unwrap_or_default()
                    })
                })
                .collect();
            form.insert(
                DATA_SCHEMA,
                json!({
                    "resourceName": schema.resource_name,
                    "endpointPath": schema.endpoint_path,
                    "fields": fields
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
                "integrationName": "Shareholder Registry Sync",
                "updateFrequency": "daily",
                "baseUrl": "https://api.yourplatform.com/v1",
                "restMethod": "GET",
                "environment": "staging",
                "isActive": true,
                "queryParams": { "limit": { "enabled": true } }
            }),
        );
        form.insert(
            AUTHENTICATION,
            json!({ "clientId": "registry-sync", "clientSecret": "s3cr3t-client-value" }),
        );
        form
    }
}

fn basic_info_rules() -> RuleSet {
    RuleSet::new()
        .field("integrationName", [Rule::required("Integration name is required")])
        .field(
            "dataFormat",
            [
                Rule::required("Data format is required"),
                Rule::one_of(&["JSON", "XML"], "Data format must be JSON or XML"),
            ],
        )
        .field("updateFrequency", [Rule::required("Update frequency is required")])
        .field(
            "baseUrl",
            [Rule::required("Base URL is required"), Rule::format(FormatRule::Url)],
        )
        .field(
            "restMethod",
            [
                Rule::required("REST method is required"),
                Rule::one_of(&["GET", "POST", "PUT", "PATCH", "DELETE"], "Unsupported REST method"),
            ],
        )
        .field(
            "environment",
            [
                Rule::required("Environment is required"),
                Rule::one_of(&["development", "staging", "production"], "Unsupported environment"),
            ],
        )
        .when(Condition::is_true("queryParams.limit.enabled"), |s| {
            s.field(
                "queryParams.limit.value",
                [
                    Rule::required("Limit value is required"),
                    Rule::min(1.0, "Limit must be at least 1"),
                ],
            )
        })
        .when(Condition::is_true("queryParams.offset.enabled"), |s| {
            s.field(
                "queryParams.offset.value",
                [
                    Rule::required("Offset value is required"),
                    Rule::min(0.0, "Offset must be at least 0"),
                ],
            )
        })
}

fn authentication_rules() -> RuleSet {
    RuleSet::new()
        .field(
            "authMethod",
            [
                Rule::required("Authentication method is required"),
                Rule::one_of(&["oauth2", "apikey", "basic"], "Unsupported authentication method"),
            ],
        )
        .when(Condition::equals("authMethod", "oauth2"), |s| {
            s.field(
                "tokenUrl",
                [Rule::required("Token URL is required"), Rule::format(FormatRule::Url)],
            )
            .field(
                "grantType",
                [
                    Rule::required("Grant type is required"),
                    Rule::one_of(
                        &["client_credentials", "authorization_code"],
                        "Unsupported grant type",
                    ),
                ],
            )
            .field("clientId", [Rule::required("Client ID is required")])
            .field("clientSecret", [Rule::required("Client Secret is required")])
            .when(Condition::equals("grantType", "authorization_code"), |s| {
                s.field(
                    "authUrl",
                    [
                        Rule::required("Authorization URL is required"),
                        Rule::format(FormatRule::Url),
                    ],
                )
                .field(
                    "redirectUri",
                    [Rule::required("Redirect URI is required"), Rule::format(FormatRule::Url)],
                )
            })
            .when(Condition::equals("grantType", "client_credentials"), |s| {
                s.field("redirectUri", [Rule::format(FormatRule::Url)])
            })
        })
        .when(Condition::equals("authMethod", "apikey"), |s| {
            s.field("headerName", [Rule::required("Header name is required")])
                .field("apiKeyValue", [Rule::required("API key value is required")])
        })
        .when(Condition::equals("authMethod", "basic"), |s| {
            s.field("username", [Rule::required("Username is required")])
                .field("password", [Rule::required("Password is required")])
        })
}

fn data_schema_rules() -> RuleSet {
    RuleSet::new()
        .field("resourceName", [Rule::required("Resource name is required")])
        .field("endpointPath", [Rule::required("Endpoint path is required")])
        .field("fields", [Rule::min_items(1, "At least one field is required")])
        .each("fields", |row| {
            row.field(
                "name",
                [
                    Rule::required("Field name is required"),
                    Rule::pattern(
                        FIELD_NAME_PATTERN,
                        "Field name may only contain letters, numbers and underscores",
                    ),
                ],
            )
                .field(
                    "type",
                    [
                        Rule::required("Field type is required"),
                        Rule::one_of(FIELD_TYPES, "Unsupported field type"),
                    ],
                )
        })
}

/// The parameter's value when its toggle is on; `None` otherwise, whatever the store holds.
fn enabled_param(basic: &StepReader<'_>, name: &str) -> Result<Option<u64>, AssemblyError> {
    if !basic.flag(&format!("queryParams.{}.enabled", name)) {
        return Ok(None);
    }
    basic.number(&format!("queryParams.{}.value", name)).map(Some)
}

fn authentication(auth: &StepReader<'_>) -> Result<RestAuthenticationRequest, AssemblyError> {
    let method = auth.text("authMethod")?;
    let request = match method.as_str() {
        "oauth2" => {
            let grant_type = auth.text("grantType")?;
            let auth_url = if grant_type == "authorization_code" {
                Some(auth.text("authUrl")?)
            } else {
                None
            };
            RestAuthenticationRequest {
                name: "OAuth2".to_string(),
                authentication_type: "OAuth2".to_string(),
                grant_type: Some(grant_type),
                client_id: Some(auth.text("clientId")?),
                client_secret: Some(auth.text("clientSecret")?),
                token_url: Some(auth.text("tokenUrl")?),
                auth_url,
                redirect_uri: auth.opt_text("redirectUri"),
                ..Default::default()
            }
        }
        "apikey" => RestAuthenticationRequest {
            name: "APIKey".to_string(),
            authentication_type: "APIKey".to_string(),
            header_name: Some(auth.text("headerName")?),
            api_key: Some(auth.text("apiKeyValue")?),
            ..Default::default()
        },
        "basic" => RestAuthenticationRequest {
            name: "Basic".to_string(),
            authentication_type: "Basic".to_string(),
            username: Some(auth.text("username")?),
            password: Some(auth.text("password")?),
            ..Default::default()
        },
        other => return Err(auth.unsupported("authMethod", other)),
    };
    Ok(request)
}

fn auth_method_from_backend(authentication_type: &str) -> &'static str {
    match authentication_type.to_ascii_lowercase().as_str() {
        "apikey" => "apikey",
        "basic" => "basic",
        _ => "oauth2",
    }
}

/// Loose truthiness of a stored query parameter: `0`, `""`, `false` and `null` read as off.
fn truthy(value: Option<&Value>) -> bool {
    match value {
        None | Some(Value::Null) => false,
        Some(Value::Bool(b)) => *b,
        Some(Value::Number(n)) => n.as_f64().map_or(false, |f| f != 0.0),
        Some(Value::String(s)) => !s.is_empty(),
        Some(_) => true,
    }
}

fn param_value(value: Option<&Value>) -> Value {
    if truthy(value) {
        value.cloned().unwrap_or(Value::Null)
    } else {
        Value::String(String::new())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::validation::StepValidator;

    fn filled_form() -> AggregateForm {
        let mut form = RestApiFlow.definition().default_form();
        form.merge(RestApiFlow.sample_overrides());
        form
    }

    async fn step_errors(index: usize, values: &Value) -> BTreeMap<String, String> {
        let def = RestApiFlow.definition();
        def.step(index).unwrap().validator.validate(values).await.error_map()
    }

    #[test]
    fn disabled_query_param_is_null_despite_stale_value() {
        let mut form = filled_form();
        let mut overlay = AggregateForm::new();
        overlay.insert(
            BASIC_INFO,
            json!({ "queryParams": { "limit": { "enabled": false, "value": 50 }, "offset": { "enabled": true, "value": "20" } } }),
        );
        form.merge(overlay);

        let body = RestApiFlow.assemble_body(&form).unwrap();
        assert_eq!(body["queryParams"], json!({ "limit": null, "offset": 20 }));
    }

    #[test]
    fn oauth2_payload_has_only_oauth_keys() {
        let body = RestApiFlow.assemble_body(&filled_form()).unwrap();
        assert_eq!(
            body["authentication"],
            json!({
                "name": "OAuth2",
                "authenticationType": "OAuth2",
                "grantType": "client_credentials",
                "clientId": "registry-sync",
                "clientSecret": "s3cr3t-client-value",
                "tokenUrl": "https://api.yourplatform.com/oauth/token",
                "redirectUri": "https://portal.yourcompany.com/callback"
            })
        );
        assert_eq!(body["status"], json!("active"));
        assert_eq!(body["advanceOptions"], json!("caching"));
        assert_eq!(body["headerParams"], json!({ "Content-Type": "application/json" }));
        assert_eq!(body["schema"]["fieldDetails"][1]["isRequired"], json!(true));
    }

    #[test]
    fn apikey_payload_drops_oauth_keys() {
        let mut form = filled_form();
        let mut overlay = AggregateForm::new();
        overlay.insert(
            AUTHENTICATION,
            json!({ "authMethod": "apikey", "headerName": "X-API-Key", "apiKeyValue": "k-123456789" }),
        );
        form.merge(overlay);

        let auth = &RestApiFlow.assemble_body(&form).unwrap()["authentication"];
        assert_eq!(auth["headerName"], json!("X-API-Key"));
        assert_eq!(auth["apiKey"], json!("k-123456789"));
        assert!(auth.get("clientSecret").is_none());
        assert!(auth.get("tokenUrl").is_none());
    }

    #[tokio::test]
    async fn grant_type_drives_redirect_requirements() {
        let mut auth = filled_form().get(AUTHENTICATION).cloned().unwrap();
        assert!(step_errors(1, &auth).await.is_empty());

        auth["redirectUri"] = json!("");
        assert!(step_errors(1, &auth).await.is_empty());
        auth["redirectUri"] = json!("not a url");
        assert_eq!(step_errors(1, &auth).await["redirectUri"], "Please enter a valid URL");

        auth["grantType"] = json!("authorization_code");
        auth["redirectUri"] = json!("");
        let errors = step_errors(1, &auth).await;
        assert_eq!(errors["authUrl"], "Authorization URL is required");
        assert_eq!(errors["redirectUri"], "Redirect URI is required");
    }

    #[tokio::test]
    async fn limit_rules_follow_toggle() {
        let mut basic = filled_form().get(BASIC_INFO).cloned().unwrap();
        basic["queryParams"]["limit"]["value"] = json!(0);
        assert_eq!(
            step_errors(0, &basic).await["queryParams.limit.value"],
            "Limit must be at least 1"
        );

        basic["queryParams"]["limit"]["enabled"] = json!(false);
        assert!(step_errors(0, &basic).await.is_empty());
    }

    #[tokio::test]
    async fn schema_rows_are_checked_individually() {
        let mut schema = filled_form().get(DATA_SCHEMA).cloned().unwrap();
        schema["fields"][1]["type"] = json!("uuid");
        schema["fields"][0]["name"] = json!("share count");
        let errors = step_errors(2, &schema).await;
        assert_eq!(errors["fields.1.type"], "Unsupported field type");
        assert_eq!(
            errors["fields.0.name"],
            "Field name may only contain letters, numbers and underscores"
        );

        schema["fields"] = json!([]);
        assert_eq!(
            step_errors(2, &schema).await["fields"],
            "At least one field is required"
        );
    }

    #[test]
    fn hydrate_maps_backend_record() {
        let record = json!({
            "id": "r-9",
            "name": "Registry",
            "dataFormat": "JSON",
            "updateFrequency": "hourly",
            "url": "https://api.example.com",
            "method": "GET",
            "queryParams": { "limit": 25, "offset": null },
            "environment": "production",
            "status": "inactive",
            "authentication": {
                "authenticationType": "OAuth2",
                "grantType": "client_credentials",
                "clientId": "cid",
                "clientSecret": "csecret",
                "tokenUrl": "https://api.example.com/token",
                "redirectUri": null
            },
            "schema": {
                "resourceName": "Holders",
                "endpointPath": "/holders",
                "fieldDetails": [ { "name": "id", "type": "string", "isRequired": true } ]
            }
        });

        let mut form = RestApiFlow.definition().default_form();
        form.merge(RestApiFlow.hydrate(&record).unwrap());

        assert_eq!(
            form.value(BASIC_INFO, "queryParams"),
            Some(&json!({ "limit": { "enabled": true, "value": 25 }, "offset": { "enabled": false, "value": "" } }))
        );
        assert_eq!(form.value(BASIC_INFO, "isActive"), Some(&json!(false)));
        assert_eq!(form.value(AUTHENTICATION, "authMethod"), Some(&json!("oauth2")));
        // Absent in the record, so the default survives.
        assert_eq!(
            form.value(AUTHENTICATION, "redirectUri"),
            Some(&json!("https://portal.yourcompany.com/callback"))
        );
        assert_eq!(
            form.value(DATA_SCHEMA, "fields"),
            Some(&json!([{ "name": "id", "type": "string", "required": true, "description": "" }]))
        );

        let body = RestApiFlow.assemble_body(&form).unwrap();
        assert_eq!(body["queryParams"], json!({ "limit": 25, "offset": null }));
        assert_eq!(body["authentication"]["clientSecret"], json!("csecret"));
    }
}
