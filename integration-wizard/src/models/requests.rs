// Backend request bodies
//
// Field names and nesting follow what the integration service accepts. Branch objects
// (`ftp` / `amazonS3Details`, per-method auth keys) are `Option` + skip so an unselected
// branch is absent rather than `null`.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

// =========================
// File upload
// =========================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FileIntegrationRequest {
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
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ftp: Option<FtpDetailsRequest>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub amazon_s3_details: Option<AmazonS3DetailsRequest>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FtpDetailsRequest {
    pub host: String,
    pub port: u64,
    pub username: String,
    /// SFTP | FTP | FTPS
    #[serde(rename = "type")]
    pub protocol: String,
    pub ftp_authentication: FtpAuthenticationRequest,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FtpAuthenticationRequest {
    /// "ssh" | "password"
    #[serde(rename = "type")]
    pub kind: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ssh_key: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub passphrase: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub password: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AmazonS3DetailsRequest {
    pub region: String,
    pub bucket_name: String,
    pub folder_path: String,
    pub amazon_s3_authentication: AmazonS3AuthenticationRequest,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AmazonS3AuthenticationRequest {
    /// "IAM Role" | "IAM"
    pub authentication_method: String,
    #[serde(rename = "ARN", skip_serializing_if = "Option::is_none")]
    pub arn: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub access_key: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub secret_key: Option<String>,
}

// =========================
// REST API
// =========================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RestApiIntegrationRequest {
    pub name: String,
    pub data_format: String,
    pub update_frequency: String,
    pub advance_options: String,
    pub url: String,
    pub method: String,
    pub body: serde_json::Map<String, serde_json::Value>,
    pub query_params: QueryParamsRequest,
    pub header_params: BTreeMap<String, String>,
    pub environment: String,
    pub status: String,
    pub authentication: RestAuthenticationRequest,
    pub schema: SchemaRequest,
}

/// Disabled parameters serialize as `null`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QueryParamsRequest {
    pub limit: Option<u64>,
    pub offset: Option<u64>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RestAuthenticationRequest {
    pub name: String,
    /// "OAuth2" | "APIKey" | "Basic"
    pub authentication_type: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub grant_type: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub client_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub client_secret: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub token_url: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub auth_url: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub redirect_uri: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub header_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub username: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub password: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SchemaRequest {
    pub resource_name: String,
    pub endpoint_path: String,
    pub field_details: Vec<FieldDetailRequest>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FieldDetailRequest {
    pub name: String,
    #[serde(rename = "type")]
    pub field_type: String,
    pub description: String,
    pub is_required: bool,
}

// =========================
// GraphQL
// =========================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GraphqlIntegrationRequest {
    pub name: String,
    pub url: String,
    pub is_introspection_enabled: bool,
    pub status: String,
    pub environment: String,
    pub update_frequency: String,
    #[serde(rename = "graphQlSchemaDesign")]
    pub schema_design: GraphqlSchemaDesignRequest,
    #[serde(rename = "graphQlSecurityAndComplexity")]
    pub security: GraphqlSecurityRequest,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GraphqlSchemaDesignRequest {
    #[serde(rename = "type")]
    pub kind: String,
    pub schema_design: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GraphqlSecurityRequest {
    pub authentication_method: String,
    pub max_query_depth: u64,
    pub max_query_cost: u64,
    pub rate_limit: u64,
    /// Seconds.
    pub timeout: u64,
}

// =========================
// Client onboarding
// =========================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ClientRequest {
    pub company: CompanyRequest,
    pub integration: ClientIntegrationRequest,
    pub approval: ClientApprovalRequest,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CompanyRequest {
    pub name: String,
    pub industry: String,
    pub size: Option<String>,
    pub address: Option<String>,
    pub contact: ContactRequest,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ContactRequest {
    pub name: String,
    pub email: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ClientIntegrationRequest {
    #[serde(rename = "type")]
    pub kind: String,
    pub base_url: String,
    pub auth_method: String,
    pub data_format: String,
    pub rate_limit: Option<u64>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ClientApprovalRequest {
    pub auto_approve: bool,
    pub send_welcome_email: bool,
}

// =========================
// Production approval request
// =========================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProductionApprovalRequest {
    pub name: String,
    #[serde(rename = "type")]
    pub kind: String,
    pub environment: String,
    pub description: String,
    pub changes: String,
    pub dependencies: String,
}
