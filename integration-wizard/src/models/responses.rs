// Backend response models
//
// Records are read leniently: every field defaults, and the nullable ones are `Option`,
// so a partially-populated record still opens in edit mode with step defaults filling gaps.

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;

use crate::payload::AssemblyError;

// =========================
// Generic wrapper
// =========================

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ApiResponse<T> {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<T>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

impl<T> ApiResponse<T> {
    pub fn ok(data: T) -> Self {
        Self {
            success: true,
            data: Some(data),
            error: None,
            message: None,
        }
    }

    pub fn ok_with_message(data: T, message: impl Into<String>) -> Self {
        Self {
            success: true,
            data: Some(data),
            error: None,
            message: Some(message.into()),
        }
    }

    pub fn fail(message: impl Into<String>) -> Self {
        Self {
            success: false,
            data: None,
            error: Some(message.into()),
            message: None,
        }
    }
}

/// Decodes a backend record, reporting shape problems as a malformed `record`.
pub fn decode_record<T: DeserializeOwned>(value: &Value) -> Result<T, AssemblyError> {
    serde_json::from_value(value.clone()).map_err(|e| AssemblyError::Malformed {
        field: "record".to_string(),
        reason: e.to_string(),
    })
}

// =========================
// File upload
// =========================

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct FileIntegrationRecord {
    pub id: String,
    pub name: String,
    pub file_format: String,
    pub file_name_pattern: String,
    pub is_header_row_included: bool,
    pub transfer_frequency: String,
    pub time_of_day: String,
    pub time_zone: String,
    pub after_successful_transfer_action: String,
    pub after_failed_transfer_action: String,
    pub url: String,
    pub ftp: Option<FtpDetailsRecord>,
    pub amazon_s3_details: Option<AmazonS3DetailsRecord>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct FtpDetailsRecord {
    pub host: String,
    pub port: Option<u64>,
    #[serde(rename = "type")]
    pub protocol: String,
    pub username: String,
    pub ftp_authentication: Option<FtpAuthenticationRecord>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct FtpAuthenticationRecord {
    #[serde(rename = "type")]
    pub kind: String,
    pub password: Option<String>,
    pub ssh_key: Option<String>,
    pub passphrase: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct AmazonS3DetailsRecord {
    pub region: String,
    pub bucket_name: String,
    pub folder_path: Option<String>,
    pub amazon_s3_authentication: Option<AmazonS3AuthenticationRecord>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct AmazonS3AuthenticationRecord {
    pub authentication_method: String,
    #[serde(rename = "ARN")]
    pub arn: Option<String>,
    pub access_key: Option<String>,
    pub secret_key: Option<String>,
}

// =========================
// REST API
// =========================

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct RestApiIntegrationRecord {
    pub id: String,
    pub name: String,
    pub data_format: String,
    pub update_frequency: String,
    pub url: String,
    pub method: String,
    pub query_params: BTreeMap<String, Value>,
    pub environment: String,
    pub status: String,
    pub authentication: Option<AuthenticationRecord>,
    pub schema: Option<SchemaRecord>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct AuthenticationRecord {
    pub name: Option<String>,
    pub authentication_type: String,
    pub grant_type: Option<String>,
    pub scope: Option<String>,
    pub token_url: Option<String>,
    pub auth_url: Option<String>,
    pub redirect_uri: Option<String>,
    pub client_id: Option<String>,
    pub client_secret: Option<String>,
    pub header_name: Option<String>,
    pub api_key: Option<String>,
    pub username: Option<String>,
    pub password: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct SchemaRecord {
    pub resource_name: String,
    pub endpoint_path: String,
    pub field_details: Vec<FieldDetailRecord>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct FieldDetailRecord {
    pub name: String,
    #[serde(rename = "type")]
    pub field_type: String,
    pub description: Option<String>,
    pub is_required: bool,
}

// =========================
// GraphQL
// =========================

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct GraphqlIntegrationRecord {
    pub id: String,
    pub name: String,
    pub url: String,
    pub is_introspection_enabled: bool,
    pub status: String,
    pub environment: Option<String>,
    pub update_frequency: Option<String>,
    #[serde(rename = "graphQlSchemaDesign")]
    pub schema_design: Option<GraphqlSchemaDesignRecord>,
    #[serde(rename = "graphQlSecurityAndComplexity")]
    pub security: Option<GraphqlSecurityRecord>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct GraphqlSchemaDesignRecord {
    #[serde(rename = "type")]
    pub kind: String,
    pub schema_design: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct GraphqlSecurityRecord {
    pub authentication_method: String,
    pub max_query_depth: u64,
    pub max_query_cost: u64,
    pub rate_limit: u64,
    pub timeout: u64,
}

// =========================
// Client onboarding
// =========================

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ClientRecord {
    pub id: String,
    pub company: CompanyRecord,
    pub integration: ClientIntegrationRecord,
    pub approval: ClientApprovalRecord,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct CompanyRecord {
    pub name: String,
    pub industry: String,
    pub size: Option<String>,
    pub address: Option<String>,
    pub contact: ContactRecord,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ContactRecord {
    pub name: String,
    pub email: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ClientIntegrationRecord {
    #[serde(rename = "type")]
    pub kind: String,
    pub base_url: String,
    pub auth_method: String,
    pub data_format: String,
    pub rate_limit: Option<u64>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ClientApprovalRecord {
    pub auto_approve: bool,
    pub send_welcome_email: bool,
}

// =========================
// Production approval request
// =========================

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ApprovalRequestRecord {
    pub id: String,
    pub name: String,
    #[serde(rename = "type")]
    pub kind: String,
    pub environment: String,
    pub description: String,
    pub changes: String,
    pub dependencies: Option<String>,
}
