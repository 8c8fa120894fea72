// Input validation utilities
//
// Format checks shared by the step rule sets. Each returns the user-facing message on failure
// so the caller can surface it inline next to the field.

use once_cell::sync::Lazy;
use regex::Regex;

type CachedRegex = Lazy<Result<Regex, regex::Error>>;

static BUCKET_RE: CachedRegex = Lazy::new(|| Regex::new(r"^[a-z0-9][a-z0-9.-]{1,61}[a-z0-9]$"));
static IPV4_LIKE_RE: CachedRegex = Lazy::new(|| Regex::new(r"^(?:[0-9]+\.){3}[0-9]+$"));
static ARN_RE: CachedRegex =
    Lazy::new(|| Regex::new(r"^arn:aws:iam::[0-9]{12}:role/[A-Za-z0-9_+=,.@-]+$"));
static TIME_RE: CachedRegex = Lazy::new(|| Regex::new(r"^([01]?[0-9]|2[0-3]):[0-5][0-9]$"));
static DATE_PLACEHOLDER_RE: CachedRegex = Lazy::new(|| Regex::new(r"YYYY|MM|DD|HH|mm|SS"));
static EMAIL_RE: CachedRegex =
    Lazy::new(|| Regex::new(r"(?i)^[A-Z0-9._%+-]+@[A-Z0-9.-]+\.[A-Z]{2,}$"));
static LOOSE_URL_RE: CachedRegex = Lazy::new(|| {
    Regex::new(r"^(https?://)?([0-9a-z.-]+)\.([a-z.]{2,6})[/A-Za-z0-9_ .-]*/?$")
});

const FILE_PATTERN_INVALID_CHARS: [char; 7] = ['<', '>', ':', '"', '|', '?', '*'];

fn compiled(re: &'static CachedRegex, name: &str) -> Result<&'static Regex, String> {
    Lazy::force(re)
        .as_ref()
        .map_err(|e| format!("Internal error: failed to compile {} regex: {}", name, e))
}

/// Validate a TCP port (1-65535).
pub fn validate_port(port: f64) -> Result<(), String> {
    if port.fract() != 0.0 || !(1.0..=65535.0).contains(&port) {
        return Err("Port must be between 1-65535".to_string());
    }
    Ok(())
}

/// Validate an S3 bucket name.
pub fn validate_bucket_name(name: &str) -> Result<(), String> {
    if !compiled(&BUCKET_RE, "bucket name")?.is_match(name) {
        return Err("Bucket name must be between 3 and 63 characters, contain only lowercase letters, numbers, periods, and hyphens".to_string());
    }
    if name.contains("..") {
        return Err("Bucket name cannot contain consecutive periods".to_string());
    }
    if compiled(&IPV4_LIKE_RE, "ip address")?.is_match(name) {
        return Err("Bucket name cannot be formatted as an IP address".to_string());
    }
    Ok(())
}

/// Validate an IAM role ARN (`arn:aws:iam::<12 digit account>:role/<name>`).
pub fn validate_arn(arn: &str) -> Result<(), String> {
    if !compiled(&ARN_RE, "arn")?.is_match(arn) {
        return Err(
            "Invalid ARN format. Example: arn:aws:iam::123456789012:role/S3Access".to_string(),
        );
    }
    Ok(())
}

/// Validate a 24-hour `HH:MM` time (a single-digit hour is accepted).
pub fn validate_time_hhmm(value: &str) -> Result<(), String> {
    if !compiled(&TIME_RE, "time")?.is_match(value) {
        return Err("Invalid time format. Use HH:MM (24-hour format)".to_string());
    }
    Ok(())
}

/// Validate a file naming pattern: needs a date placeholder and no reserved filename characters.
pub fn validate_file_naming_pattern(pattern: &str) -> Result<(), String> {
    if pattern.chars().any(|c| FILE_PATTERN_INVALID_CHARS.contains(&c)) {
        return Err("Pattern contains invalid characters: < > : \" | ? *".to_string());
    }
    if !compiled(&DATE_PLACEHOLDER_RE, "date placeholder")?.is_match(pattern) {
        return Err(
            "Pattern must include at least one date placeholder (YYYY, MM, DD)".to_string(),
        );
    }
    Ok(())
}

/// Validate a GraphQL endpoint: HTTPS with `graphql` (any case) somewhere in the path.
pub fn validate_graphql_endpoint(endpoint: &str) -> Result<(), String> {
    let url = url::Url::parse(endpoint.trim()).map_err(|_| "Please enter a valid URL".to_string())?;
    if url.scheme() != "https" || !url.path().to_ascii_lowercase().contains("graphql") {
        return Err("URL must use HTTPS and include a valid GraphQL path".to_string());
    }
    Ok(())
}

/// Validate an absolute http(s) URL.
pub fn validate_url(value: &str) -> Result<(), String> {
    match url::Url::parse(value.trim()) {
        Ok(url) if matches!(url.scheme(), "http" | "https") && url.host_str().is_some() => Ok(()),
        _ => Err("Please enter a valid URL".to_string()),
    }
}

/// Validate a host-style URL where the scheme is optional (`api.example.com/v1`).
pub fn validate_loose_url(value: &str) -> Result<(), String> {
    if !compiled(&LOOSE_URL_RE, "url")?.is_match(value.trim()) {
        return Err("Please enter a valid URL".to_string());
    }
    Ok(())
}

/// Validate an email address.
pub fn validate_email(value: &str) -> Result<(), String> {
    if !compiled(&EMAIL_RE, "email")?.is_match(value.trim()) {
        return Err("Invalid email address".to_string());
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validate_bucket_name() {
        assert!(validate_bucket_name("valid-bucket-1").is_ok());
        assert!(validate_bucket_name("shareholder-data").is_ok());
        assert!(validate_bucket_name("my.bucket.name").is_ok());

        assert!(validate_bucket_name("ab").is_err()); // too short
        assert!(validate_bucket_name("My-Bucket").is_err()); // uppercase
        assert!(validate_bucket_name("-bucket").is_err()); // leading hyphen
        assert!(validate_bucket_name(&"a".repeat(64)).is_err()); // too long
    }

    #[test]
    fn test_validate_bucket_name_specific_messages() {
        let err = validate_bucket_name("my..bucket").unwrap_err();
        assert!(err.contains("consecutive periods"), "{}", err);

        let err = validate_bucket_name("192.168.1.1").unwrap_err();
        assert!(err.contains("IP address"), "{}", err);
    }

    #[test]
    fn test_validate_arn() {
        assert!(validate_arn("arn:aws:iam::123456789012:role/S3Access").is_ok());
        assert!(validate_arn("arn:aws:iam::123456789012:role/team+ingest@prod").is_ok());

        assert!(validate_arn("arn:aws:iam::12345:role/X").is_err()); // account id not 12 digits
        assert!(validate_arn("arn:aws:iam::123456789012:user/S3Access").is_err());
        assert!(validate_arn("arn:aws:iam::123456789012:role/").is_err());
    }

    #[test]
    fn test_validate_port() {
        assert!(validate_port(1.0).is_ok());
        assert!(validate_port(22.0).is_ok());
        assert!(validate_port(65535.0).is_ok());
        assert!(validate_port(0.0).is_err());
        assert!(validate_port(65536.0).is_err());
        assert!(validate_port(22.5).is_err());
    }

    #[test]
    fn test_validate_time_hhmm() {
        assert!(validate_time_hhmm("02:00").is_ok());
        assert!(validate_time_hhmm("23:59").is_ok());
        assert!(validate_time_hhmm("7:30").is_ok());
        assert!(validate_time_hhmm("24:00").is_err());
        assert!(validate_time_hhmm("12:60").is_err());
        assert!(validate_time_hhmm("noon").is_err());
    }

    #[test]
    fn test_validate_file_naming_pattern() {
        assert!(validate_file_naming_pattern("shareholders_YYYYMMDD").is_ok());
        assert!(validate_file_naming_pattern("export_HHmmSS.csv").is_ok());

        let err = validate_file_naming_pattern("shareholders").unwrap_err();
        assert!(err.contains("date placeholder"), "{}", err);

        let err = validate_file_naming_pattern("data_YYYY|MM").unwrap_err();
        assert!(err.contains("invalid characters"), "{}", err);
    }

    #[test]
    fn test_validate_graphql_endpoint() {
        assert!(validate_graphql_endpoint("https://api.example.com/graphql").is_ok());
        assert!(validate_graphql_endpoint("https://api.example.com/v1/graphql/query").is_ok());

        assert!(validate_graphql_endpoint("https://api.example.com/GraphQL").is_ok());
        assert!(validate_graphql_endpoint("HTTPS://api.example.com/v2/GRAPHQL").is_ok());
        assert!(validate_graphql_endpoint("http://api.example.com/graphql").is_err());
        assert!(validate_graphql_endpoint("https://api.example.com/api").is_err());
        assert!(validate_graphql_endpoint("not a url").is_err());
    }

    #[test]
    fn test_validate_urls_and_email() {
        assert!(validate_url("https://auth.example.com/oauth/token").is_ok());
        assert!(validate_url("auth.example.com").is_err());
        assert!(validate_url("ftp://files.example.com").is_err());

        assert!(validate_loose_url("api.example.com/v1").is_ok());
        assert!(validate_loose_url("https://api.example.com/v1").is_ok());
        assert!(validate_loose_url("localhost").is_err());

        assert!(validate_email("ops@example.com").is_ok());
        assert!(validate_email("OPS@EXAMPLE.COM").is_ok());
        assert!(validate_email("ops@example").is_err());
    }
}
