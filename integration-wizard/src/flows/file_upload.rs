// File upload integration: file settings, SFTP/S3 connection, transfer schedule.

use serde_json::{json, Value};

use super::{FlowKind, FlowMessages, IntegrationFlow};
use crate::models::requests::{
    AmazonS3AuthenticationRequest, AmazonS3DetailsRequest, FileIntegrationRequest,
    FtpAuthenticationRequest, FtpDetailsRequest,
};
use crate::models::responses::{decode_record, FileIntegrationRecord};
use crate::payload::{AssemblyError, StepReader};
use crate::validation::{Condition, FormatRule, Rule, RuleSet};
use crate::wizard::{AggregateForm, StepSpec, WizardDefinition};

pub const FILE_SETTINGS: &str = "fileSettings";
pub const CONNECTION: &str = "connection";
pub const SCHEDULE: &str = "schedule";
pub const REVIEW: &str = "review";

#[derive(Debug, Default, Clone, Copy)]
pub struct FileUploadFlow;

impl IntegrationFlow for FileUploadFlow {
    fn kind(&self) -> FlowKind {
        FlowKind::FileUpload
    }

    fn definition(&self) -> WizardDefinition {
        WizardDefinition::new(vec![
            StepSpec::new(
                FILE_SETTINGS,
                "File Settings",
                json!({
                    "integrationName": "Daily Shareholder File Upload",
                    "fileFormat": "CSV",
                    "fileNamingPattern": "shareholders_YYYYMMDD",
                    "includeHeaderRow": true
                }),
                file_settings_rules(),
            ),
            StepSpec::new(
                CONNECTION,
                "Connection",
                json!({
                    "connectionType": "SFTP",
                    "sftp": {
                        "host": "sftp.yourplatform.com",
                        "port": 22,
                        "protocol": "SFTP",
                        "username": "ftpuser",
                        "authenticationType": "SSH Key",
                        "sshKey": "",
                        "password": "",
                        "passphrase": ""
                    },
                    "s3": {
                        "region": "us-east-1",
                        "bucketName": "shareholder-data",
                        "folderPath": "incoming/data/",
                        "authMethod": "IAM Role",
                        "arn": "arn:aws:iam::123456789012:role/S3Access",
                        "accessKey": "",
                        "secretKey": ""
                    }
                }),
                connection_rules(),
            ),
            StepSpec::new(
                SCHEDULE,
                "Schedule",
                json!({
                    "frequency": "Daily",
                    "dayOfWeek": 1,
                    "dayOfMonth": 1,
                    "time": "02:00",
                    "timezone": "UTC",
                    "archiveAfterTransfer": true,
                    "retryOnFailure": false,
                    "retryInterval": 30,
                    "retryCount": 3
                }),
                schedule_rules(),
            ),
            StepSpec::new(REVIEW, "Review", json!({}), RuleSet::new()),
        ])
    }

    fn assemble_body(&self, form: &AggregateForm) -> Result<Value, AssemblyError> {
        let settings = form.reader(FILE_SETTINGS)?;
        let connection = form.reader(CONNECTION)?;
        let schedule = form.reader(SCHEDULE)?;

        let connection_type = connection.text("connectionType")?;
        let (url, ftp, amazon_s3_details) = match connection_type.as_str() {
            "SFTP" => {
                let ftp = ftp_details(&connection)?;
                (ftp.host.clone(), Some(ftp), None)
            }
            "S3" => {
                let s3 = s3_details(&connection)?;
                let url = format!("s3://{}/{}", s3.bucket_name, s3.folder_path);
                (url, None, Some(s3))
            }
            other => return Err(connection.unsupported("connectionType", other)),
        };

        let request = FileIntegrationRequest {
            name: settings.text("integrationName")?,
            file_format: settings.text("fileFormat")?,
            file_name_pattern: settings.text("fileNamingPattern")?,
            is_header_row_included: settings.flag("includeHeaderRow"),
            transfer_frequency: schedule.text("frequency")?.to_lowercase(),
            time_of_day: schedule.text("time")?,
            time_zone: schedule.text("timezone")?,
            after_successful_transfer_action: if schedule.flag("archiveAfterTransfer") {
                "archive".to_string()
            } else {
                "notify".to_string()
            },
            after_failed_transfer_action: if schedule.flag("retryOnFailure") {
                "retry".to_string()
            } else {
                "notify".to_string()
            },
            url,
            ftp,
            amazon_s3_details,
        };
        Ok(serde_json::to_value(request)?)
    }

    fn hydrate(&self, record: &Value) -> Result<AggregateForm, AssemblyError> {
        let record: FileIntegrationRecord = decode_record(record)?;
        let mut form = AggregateForm::new();

        form.insert(
            FILE_SETTINGS,
            json!({
                "integrationName": record.name,
                "fileFormat": record.file_format,
                "fileNamingPattern": record.file_name_pattern,
                "includeHeaderRow": record.is_header_row_included
            }),
        );

        let connection = match (record.ftp, record.amazon_s3_details) {
            (Some(ftp), _) => {
                let auth = ftp.ftp_authentication.unwrap_or_default();
                let auth_type = if auth.kind.eq_ignore_ascii_case("password") {
                    "Password"
                } else {
                    "SSH Key"
                };
                let protocol = if ftp.protocol.is_empty() {
                    "SFTP".to_string()
                } else {
                    ftp.protocol
                };
                json!({
                    "connectionType": "SFTP",
                    "sftp": {
                        "host": ftp.host,
                        "port": ftp.port.unwrap_or(22),
                        "protocol": protocol,
                        "username": ftp.username,
                        "authenticationType": auth_type,
                        "sshKey": auth.ssh_key.unwrap_or_default(),
                        "password": auth.password.unwrap_or_default(),
                        "passphrase": auth.passphrase.unwrap_or_default()
                    }
                })
            }
            (None, Some(s3)) => {
                let auth = s3.amazon_s3_authentication.unwrap_or_default();
                let method = if auth.authentication_method == "IAM Role" {
                    "IAM Role"
                } else {
                    "Access Key"
                };
                json!({
                    "connectionType": "S3",
                    "s3": {
                        "region": s3.region,
                        "bucketName": s3.bucket_name,
                        "folderPath": s3.folder_path.unwrap_or_default(),
                        "authMethod": method,
                        "arn": auth.arn.unwrap_or_default(),
                        "accessKey": auth.access_key.unwrap_or_default(),
                        "secretKey": auth.secret_key.unwrap_or_default()
                    }
                })
            }
            (None, None) => {
                return Err(AssemblyError::Malformed {
                    field: "record".to_string(),
                    reason: "neither ftp nor amazonS3Details is set".to_string(),
                })
            }
        };
        form.insert(CONNECTION, connection);

        form.insert(
            SCHEDULE,
            json!({
                "frequency": title_case(&record.transfer_frequency),
                "time": record.time_of_day,
                "timezone": record.time_zone,
                "archiveAfterTransfer": record.after_successful_transfer_action.eq_ignore_ascii_case("archive"),
                "retryOnFailure": record.after_failed_transfer_action.eq_ignore_ascii_case("retry")
            }),
        );
        Ok(form)
    }

    fn messages(&self) -> FlowMessages {
        FlowMessages {
            created: (
                "File upload integration created successfully!".into(),
                "Your integration will begin processing files according to the schedule you defined."
                    .into(),
            ),
            updated: ("File upload integration updated successfully!".into(), String::new()),
            failed: (
                "Failed to create file upload integration".into(),
                "Please check your connection details and try again.".into(),
            ),
        }
    }

    fn sample_overrides(&self) -> AggregateForm {
        let mut form = AggregateForm::new();
        form.insert(
            CONNECTION,
            json!({ "sftp": { "sshKey": "ssh-rsa AAAAB3NzaC1yc2EAAAADAQABAAABAQ smoke@integration-wizard" } }),
        );
        form
    }
}

fn file_settings_rules() -> RuleSet {
    RuleSet::new()
        .field(
            "integrationName",
            [
                Rule::required("Integration name is required"),
                Rule::min_length(3, "Name must be at least 3 characters"),
            ],
        )
        .field(
            "fileFormat",
            [
                Rule::required("File format is required"),
                Rule::one_of(&["CSV", "JSON", "XML", "Excel"], "Unsupported file format"),
            ],
        )
        .field(
            "fileNamingPattern",
            [
                Rule::required("File naming pattern is required"),
                Rule::format(FormatRule::FileNamingPattern),
            ],
        )
}

fn connection_rules() -> RuleSet {
    RuleSet::new()
        .field(
            "connectionType",
            [
                Rule::required("Connection type is required"),
                Rule::one_of(&["SFTP", "S3"], "Connection type must be SFTP or S3"),
            ],
        )
        .when(Condition::equals("connectionType", "SFTP"), |s| {
            s.field("sftp.host", [Rule::required("Host is required")])
                .field(
                    "sftp.port",
                    [Rule::required("Port is required"), Rule::format(FormatRule::Port)],
                )
                .field(
                    "sftp.protocol",
                    [
                        Rule::required("Type is required"),
                        Rule::one_of(&["SFTP", "FTP", "FTPS"], "Type must be SFTP, FTP or FTPS"),
                    ],
                )
                .field("sftp.username", [Rule::required("Username is required")])
                .field(
                    "sftp.authenticationType",
                    [
                        Rule::required("Authentication type is required"),
                        Rule::one_of(&["SSH Key", "Password"], "Unsupported authentication type"),
                    ],
                )
                .when(Condition::equals("sftp.authenticationType", "SSH Key"), |s| {
                    s.field("sftp.sshKey", [Rule::required("SSH Key is required")])
                })
                .when(Condition::equals("sftp.authenticationType", "Password"), |s| {
                    s.field("sftp.password", [Rule::required("Password is required")])
                })
        })
        .when(Condition::equals("connectionType", "S3"), |s| {
            s.field("s3.region", [Rule::required("Region is required")])
                .field(
                    "s3.bucketName",
                    [
                        Rule::required("Bucket name is required"),
                        Rule::format(FormatRule::BucketName),
                    ],
                )
                .field(
                    "s3.authMethod",
                    [
                        Rule::required("Authentication method is required"),
                        Rule::one_of(&["IAM Role", "Access Key"], "Unsupported authentication method"),
                    ],
                )
                .when(Condition::equals("s3.authMethod", "IAM Role"), |s| {
                    s.field(
                        "s3.arn",
                        [Rule::required("ARN is required"), Rule::format(FormatRule::Arn)],
                    )
                })
                .when(Condition::equals("s3.authMethod", "Access Key"), |s| {
                    s.field("s3.accessKey", [Rule::required("Access Key is required")])
                        .field("s3.secretKey", [Rule::required("Secret Key is required")])
                })
        })
}

fn schedule_rules() -> RuleSet {
    RuleSet::new()
        .field(
            "frequency",
            [
                Rule::required("Frequency is required"),
                Rule::one_of(&["Daily", "Weekly", "Monthly"], "Unsupported frequency"),
            ],
        )
        .when(Condition::equals("frequency", "Weekly"), |s| {
            s.field(
                "dayOfWeek",
                [
                    Rule::required("Day of week is required"),
                    Rule::integer("Day of week must be a whole number"),
                    Rule::min(0.0, "Must be between 0-6"),
                    Rule::max(6.0, "Must be between 0-6"),
                ],
            )
        })
        .when(Condition::equals("frequency", "Monthly"), |s| {
            s.field(
                "dayOfMonth",
                [
                    Rule::required("Day of month is required"),
                    Rule::integer("Day of month must be a whole number"),
                    Rule::min(1.0, "Must be between 1-31"),
                    Rule::max(31.0, "Must be between 1-31"),
                ],
            )
        })
        .field(
            "time",
            [Rule::required("Time is required"), Rule::format(FormatRule::TimeHhMm)],
        )
        .field("timezone", [Rule::required("Timezone is required")])
        .when(Condition::is_true("retryOnFailure"), |s| {
            s.field(
                "retryInterval",
                [
                    Rule::required("Retry interval is required"),
                    Rule::min(1.0, "Minimum 1 minute"),
                    Rule::max(1440.0, "Maximum 1440 minutes (24 hours)"),
                ],
            )
            .field(
                "retryCount",
                [
                    Rule::required("Retry count is required"),
                    Rule::min(1.0, "Minimum 1 retry"),
                    Rule::max(10.0, "Maximum 10 retries"),
                ],
            )
        })
}

fn ftp_details(connection: &StepReader<'_>) -> Result<FtpDetailsRequest, AssemblyError> {
    let auth_type = connection.text("sftp.authenticationType")?;
    let ftp_authentication = match auth_type.as_str() {
        "SSH Key" => FtpAuthenticationRequest {
            kind: "ssh".to_string(),
            ssh_key: Some(connection.text("sftp.sshKey")?),
            passphrase: connection.opt_text("sftp.passphrase"),
            password: None,
        },
        "Password" => FtpAuthenticationRequest {
            kind: "password".to_string(),
            ssh_key: None,
            passphrase: None,
            password: Some(connection.text("sftp.password")?),
        },
        other => return Err(connection.unsupported("sftp.authenticationType", other)),
    };

    Ok(FtpDetailsRequest {
        host: connection.text("sftp.host")?,
        port: connection.number("sftp.port")?,
        username: connection.text("sftp.username")?,
        protocol: connection.text("sftp.protocol")?,
        ftp_authentication,
    })
}

fn s3_details(connection: &StepReader<'_>) -> Result<AmazonS3DetailsRequest, AssemblyError> {
    let method = connection.text("s3.authMethod")?;
    let amazon_s3_authentication = match method.as_str() {
        "IAM Role" => AmazonS3AuthenticationRequest {
            authentication_method: "IAM Role".to_string(),
            arn: Some(connection.text("s3.arn")?),
            access_key: None,
            secret_key: None,
        },
        "Access Key" => AmazonS3AuthenticationRequest {
            authentication_method: "IAM".to_string(),
            arn: None,
            access_key: Some(connection.text("s3.accessKey")?),
            secret_key: Some(connection.text("s3.secretKey")?),
        },
        other => return Err(connection.unsupported("s3.authMethod", other)),
    };

    Ok(AmazonS3DetailsRequest {
        region: connection.text("s3.region")?,
        bucket_name: connection.text("s3.bucketName")?,
        folder_path: connection.text_or("s3.folderPath", ""),
        amazon_s3_authentication,
    })
}

/// "daily" -> "Daily"
fn title_case(s: &str) -> String {
    let lower = s.to_lowercase();
    let mut chars = lower.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}
