// Dot-separated field paths into a step's value tree.
//
// `sftp.ftpAuthentication.type` addresses nested objects; purely numeric segments
// (`fields.2.name`) index into arrays of row objects.

use std::fmt;

use super::StoreError;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PathSegment {
    Key(String),
    Index(usize),
}

impl fmt::Display for PathSegment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PathSegment::Key(k) => write!(f, "{}", k),
            PathSegment::Index(i) => write!(f, "{}", i),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldPath {
    raw: String,
    segments: Vec<PathSegment>,
}

impl FieldPath {
    pub fn parse(raw: &str) -> Result<Self, StoreError> {
        let trimmed = raw.trim();
        if trimmed.is_empty() {
            return Err(StoreError::InvalidPath {
                path: raw.to_string(),
                reason: "path is empty".to_string(),
            });
        }

        let mut segments = Vec::new();
        for part in trimmed.split('.') {
            if part.is_empty() {
                return Err(StoreError::InvalidPath {
                    path: raw.to_string(),
                    reason: "path contains an empty segment".to_string(),
                });
            }
            if part.chars().all(|c| c.is_ascii_digit()) {
                let idx = part.parse::<usize>().map_err(|e| StoreError::InvalidPath {
                    path: raw.to_string(),
                    reason: format!("index segment '{}' is out of range: {}", part, e),
                })?;
                segments.push(PathSegment::Index(idx));
            } else {
                segments.push(PathSegment::Key(part.to_string()));
            }
        }

        Ok(Self {
            raw: trimmed.to_string(),
            segments,
        })
    }

    pub fn as_str(&self) -> &str {
        &self.raw
    }

    pub fn segments(&self) -> &[PathSegment] {
        &self.segments
    }

}

impl fmt::Display for FieldPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.raw)
    }
}

/// Read-only lookup of `path` inside `root`. Never fails: bad paths simply resolve to `None`.
pub fn lookup<'a>(root: &'a serde_json::Value, path: &str) -> Option<&'a serde_json::Value> {
    let parsed = FieldPath::parse(path).ok()?;
    let mut current = root;
    for seg in parsed.segments() {
        current = match (seg, current) {
            (PathSegment::Key(k), serde_json::Value::Object(map)) => map.get(k)?,
            (PathSegment::Index(i), serde_json::Value::Array(items)) => items.get(*i)?,
            // Numeric keys on objects are allowed (e.g. `{"0": …}`).
            (PathSegment::Index(i), serde_json::Value::Object(map)) => map.get(&i.to_string())?,
            _ => return None,
        };
    }
    Some(current)
}
