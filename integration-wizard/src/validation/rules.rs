// Declarative field rules and their interpreter.
//
// A rule set is a list of fields, each carrying `(condition, rule)` pairs. Conditions are
// evaluated against the values handed to `evaluate` on every call, never against a cached
// copy, so flipping a discriminant (auth type, connection type, retry toggle) changes which
// fields are required on the very next validation.

use regex::Regex;
use serde::Serialize;
use serde_json::Value;

use super::FieldValidationError;
use crate::form::lookup;
use crate::utils::validation as formats;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum RuleKind {
    Required,
    MinLength,
    MaxLength,
    Min,
    Max,
    Integer,
    OneOf,
    Pattern,
    Format,
    MinItems,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FormatRule {
    Port,
    BucketName,
    Arn,
    TimeHhMm,
    FileNamingPattern,
    GraphqlEndpoint,
    Url,
    LooseUrl,
    Email,
}

impl FormatRule {
    fn check(&self, value: &Value) -> Result<(), String> {
        match self {
            FormatRule::Port => match as_number(value) {
                Some(n) => formats::validate_port(n),
                None => Err("Port must be between 1-65535".to_string()),
            },
            FormatRule::BucketName => formats::validate_bucket_name(&as_text(value)),
            FormatRule::Arn => formats::validate_arn(&as_text(value)),
            FormatRule::TimeHhMm => formats::validate_time_hhmm(&as_text(value)),
            FormatRule::FileNamingPattern => formats::validate_file_naming_pattern(&as_text(value)),
            FormatRule::GraphqlEndpoint => formats::validate_graphql_endpoint(&as_text(value)),
            FormatRule::Url => formats::validate_url(&as_text(value)),
            FormatRule::LooseUrl => formats::validate_loose_url(&as_text(value)),
            FormatRule::Email => formats::validate_email(&as_text(value)),
        }
    }
}

#[derive(Debug, Clone)]
pub enum Rule {
    Required { message: String },
    MinLength { min: usize, message: String },
    MaxLength { max: usize, message: String },
    Min { min: f64, message: String },
    Max { max: f64, message: String },
    Integer { message: String },
    OneOf { allowed: Vec<Value>, message: String },
    Pattern {
        regex: Result<Regex, regex::Error>,
        message: String,
    },
    Format(FormatRule),
    MinItems { min: usize, message: String },
}

impl Rule {
    pub fn required(message: impl Into<String>) -> Self {
        Rule::Required {
            message: message.into(),
        }
    }

    pub fn min_length(min: usize, message: impl Into<String>) -> Self {
        Rule::MinLength {
            min,
            message: message.into(),
        }
    }

    pub fn max_length(max: usize, message: impl Into<String>) -> Self {
        Rule::MaxLength {
            max,
            message: message.into(),
        }
    }

    pub fn min(min: f64, message: impl Into<String>) -> Self {
        Rule::Min {
            min,
            message: message.into(),
        }
    }

    pub fn max(max: f64, message: impl Into<String>) -> Self {
        Rule::Max {
            max,
            message: message.into(),
        }
    }

    pub fn integer(message: impl Into<String>) -> Self {
        Rule::Integer {
            message: message.into(),
        }
    }

    pub fn one_of(allowed: &[&str], message: impl Into<String>) -> Self {
        Rule::OneOf {
            allowed: allowed.iter().map(|s| Value::String((*s).to_string())).collect(),
            message: message.into(),
        }
    }

    /// A bad `pattern` does not panic; the rule then fails every present value.
    pub fn pattern(pattern: &str, message: impl Into<String>) -> Self {
        Rule::Pattern {
            regex: Regex::new(pattern),
            message: message.into(),
        }
    }

    pub fn format(rule: FormatRule) -> Self {
        Rule::Format(rule)
    }

    pub fn min_items(min: usize, message: impl Into<String>) -> Self {
        Rule::MinItems {
            min,
            message: message.into(),
        }
    }

    pub fn kind(&self) -> RuleKind {
        match self {
            Rule::Required { .. } => RuleKind::Required,
            Rule::MinLength { .. } => RuleKind::MinLength,
            Rule::MaxLength { .. } => RuleKind::MaxLength,
            Rule::Min { .. } => RuleKind::Min,
            Rule::Max { .. } => RuleKind::Max,
            Rule::Integer { .. } => RuleKind::Integer,
            Rule::OneOf { .. } => RuleKind::OneOf,
            Rule::Pattern { .. } => RuleKind::Pattern,
            Rule::Format(_) => RuleKind::Format,
            Rule::MinItems { .. } => RuleKind::MinItems,
        }
    }

    pub fn check(&self, value: Option<&Value>) -> Result<(), String> {
        match self {
            Rule::Required { message } => {
                if is_empty(value) {
                    return Err(message.clone());
                }
                Ok(())
            }
            Rule::MinItems { min, message } => {
                let len = match value {
                    Some(Value::Array(items)) => items.len(),
                    _ => 0,
                };
                if len < *min {
                    return Err(message.clone());
                }
                Ok(())
            }
            // Everything else only constrains values that are present.
            _ if is_empty(value) => Ok(()),
            other => {
                let value = value.unwrap_or(&Value::Null);
                other.check_present(value)
            }
        }
    }

    fn check_present(&self, value: &Value) -> Result<(), String> {
        match self {
            Rule::MinLength { min, message } => {
                if as_text(value).chars().count() < *min {
                    return Err(message.clone());
                }
                Ok(())
            }
            Rule::MaxLength { max, message } => {
                if as_text(value).chars().count() > *max {
                    return Err(message.clone());
                }
                Ok(())
            }
            Rule::Min { min, message } => match as_number(value) {
                Some(n) if n >= *min => Ok(()),
                Some(_) => Err(message.clone()),
                None => Err("Must be a number".to_string()),
            },
            Rule::Max { max, message } => match as_number(value) {
                Some(n) if n <= *max => Ok(()),
                Some(_) => Err(message.clone()),
                None => Err("Must be a number".to_string()),
            },
            Rule::Integer { message } => match as_number(value) {
                Some(n) if n.fract() == 0.0 => Ok(()),
                _ => Err(message.clone()),
            },
            Rule::OneOf { allowed, message } => {
                if allowed.iter().any(|a| loosely_equal(a, value)) {
                    Ok(())
                } else {
                    Err(message.clone())
                }
            }
            Rule::Pattern { regex, message } => match regex {
                Ok(re) if re.is_match(&as_text(value)) => Ok(()),
                Ok(_) => Err(message.clone()),
                Err(e) => Err(format!("Internal error: invalid pattern rule: {}", e)),
            },
            Rule::Format(format) => format.check(value),
            Rule::Required { .. } | Rule::MinItems { .. } => Ok(()),
        }
    }
}

/// Predicate over sibling values.
#[derive(Debug, Clone, PartialEq)]
pub enum Condition {
    Always,
    Equals(String, Value),
    NotEquals(String, Value),
    IsTrue(String),
    All(Vec<Condition>),
    Any(Vec<Condition>),
}

impl Condition {
    pub fn equals(path: &str, value: impl Into<Value>) -> Self {
        Condition::Equals(path.to_string(), value.into())
    }

    pub fn not_equals(path: &str, value: impl Into<Value>) -> Self {
        Condition::NotEquals(path.to_string(), value.into())
    }

    pub fn is_true(path: &str) -> Self {
        Condition::IsTrue(path.to_string())
    }

    pub fn holds(&self, values: &Value) -> bool {
        match self {
            Condition::Always => true,
            Condition::Equals(path, expected) => {
                loosely_equal(expected, lookup(values, path).unwrap_or(&Value::Null))
            }
            Condition::NotEquals(path, expected) => {
                !loosely_equal(expected, lookup(values, path).unwrap_or(&Value::Null))
            }
            Condition::IsTrue(path) => matches!(
                lookup(values, path),
                Some(Value::Bool(true))
            ) || matches!(lookup(values, path), Some(Value::String(s)) if s == "true"),
            Condition::All(conds) => conds.iter().all(|c| c.holds(values)),
            Condition::Any(conds) => conds.iter().any(|c| c.holds(values)),
        }
    }

    fn and(outer: &Condition, inner: Condition) -> Condition {
        match (outer, inner) {
            (Condition::Always, inner) => inner,
            (outer, Condition::Always) => outer.clone(),
            (outer, inner) => Condition::All(vec![outer.clone(), inner]),
        }
    }
}

#[derive(Debug, Clone)]
struct GuardedRule {
    when: Condition,
    rule: Rule,
}

#[derive(Debug, Clone)]
struct FieldRules {
    path: String,
    rules: Vec<GuardedRule>,
}

#[derive(Debug, Clone)]
struct ListRules {
    path: String,
    when: Condition,
    row: RuleSet,
}

/// Field rules for one step.
#[derive(Debug, Clone, Default)]
pub struct RuleSet {
    fields: Vec<FieldRules>,
    lists: Vec<ListRules>,
}

impl RuleSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds unconditional rules for `path`. Rules are checked in declaration order.
    pub fn field<I>(self, path: &str, rules: I) -> Self
    where
        I: IntoIterator<Item = Rule>,
    {
        let guarded = rules
            .into_iter()
            .map(|rule| GuardedRule {
                when: Condition::Always,
                rule,
            })
            .collect();
        self.push_field(path, guarded)
    }

    /// Every rule declared inside `scope` only applies while `condition` holds.
    pub fn when<F>(self, condition: Condition, scope: F) -> Self
    where
        F: FnOnce(RuleSet) -> RuleSet,
    {
        let inner = scope(RuleSet::new());
        let mut out = self;
        for field in inner.fields {
            let guarded = field
                .rules
                .into_iter()
                .map(|g| GuardedRule {
                    when: Condition::and(&condition, g.when),
                    rule: g.rule,
                })
                .collect();
            out = out.push_field(&field.path, guarded);
        }
        for list in inner.lists {
            out.lists.push(ListRules {
                path: list.path,
                when: Condition::and(&condition, list.when),
                row: list.row,
            });
        }
        out
    }

    /// Rules applied to every row of the repeatable list at `path`; row paths are relative.
    pub fn each<F>(mut self, path: &str, row: F) -> Self
    where
        F: FnOnce(RuleSet) -> RuleSet,
    {
        self.lists.push(ListRules {
            path: path.to_string(),
            when: Condition::Always,
            row: row(RuleSet::new()),
        });
        self
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty() && self.lists.is_empty()
    }

    /// All failing fields, first failing rule per field.
    pub fn evaluate(&self, values: &Value) -> Vec<FieldValidationError> {
        let mut errors = Vec::new();

        for field in &self.fields {
            let value = lookup(values, &field.path);
            for guarded in &field.rules {
                if !guarded.when.holds(values) {
                    continue;
                }
                if let Err(message) = guarded.rule.check(value) {
                    errors.push(FieldValidationError {
                        field: field.path.clone(),
                        rule: guarded.rule.kind(),
                        message,
                    });
                    break;
                }
            }
        }

        for list in &self.lists {
            if !list.when.holds(values) {
                continue;
            }
            let Some(Value::Array(rows)) = lookup(values, &list.path) else {
                continue;
            };
            for (index, row) in rows.iter().enumerate() {
                for err in list.row.evaluate(row) {
                    errors.push(FieldValidationError {
                        field: format!("{}.{}.{}", list.path, index, err.field),
                        rule: err.rule,
                        message: err.message,
                    });
                }
            }
        }

        errors
    }

    /// Evaluates a single field (on-change validation).
    pub fn evaluate_field(&self, path: &str, values: &Value) -> Option<FieldValidationError> {
        self.evaluate(values).into_iter().find(|e| e.field == path)
    }

    fn push_field(mut self, path: &str, mut guarded: Vec<GuardedRule>) -> Self {
        match self.fields.iter_mut().find(|f| f.path == path) {
            Some(existing) => existing.rules.append(&mut guarded),
            None => self.fields.push(FieldRules {
                path: path.to_string(),
                rules: guarded,
            }),
        }
        self
    }
}

pub(crate) fn is_empty(value: Option<&Value>) -> bool {
    match value {
        None | Some(Value::Null) => true,
        Some(Value::String(s)) => s.trim().is_empty(),
        Some(Value::Array(items)) => items.is_empty(),
        Some(_) => false,
    }
}

pub(crate) fn as_text(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        Value::Null => String::new(),
        other => other.to_string(),
    }
}

pub(crate) fn as_number(value: &Value) -> Option<f64> {
    match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse::<f64>().ok(),
        _ => None,
    }
}

/// JSON equality that also treats `"22"` and `22` (or `"true"` and `true`) as equal,
/// since form inputs deliver numbers and toggles as text.
fn loosely_equal(expected: &Value, actual: &Value) -> bool {
    if expected == actual {
        return true;
    }
    match (expected, actual) {
        (Value::Number(_), Value::String(_)) | (Value::String(_), Value::Number(_)) => {
            match (as_number(expected), as_number(actual)) {
                (Some(a), Some(b)) => a == b,
                _ => false,
            }
        }
        (Value::Bool(b), Value::String(s)) | (Value::String(s), Value::Bool(b)) => {
            s == if *b { "true" } else { "false" }
        }
        _ => false,
    }
}
