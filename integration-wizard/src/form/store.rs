// Per-step value bucket.
//
// The controller owns one store per step. Stores hand out deep copies only; callers can
// never reach the live tree through a snapshot.

use log::debug;
use serde_json::{Map, Value};
use std::collections::BTreeMap;

use super::path::{lookup, FieldPath, PathSegment};
use super::rows::{RowArena, RowId, RowIdAllocator};
use super::StoreError;

#[derive(Debug, Clone)]
pub struct StepDataStore {
    values: Value,
    lists: BTreeMap<String, RowArena>,
    row_ids: RowIdAllocator,
    revision: u64,
}

impl Default for StepDataStore {
    fn default() -> Self {
        Self {
            values: Value::Object(Map::new()),
            lists: BTreeMap::new(),
            row_ids: RowIdAllocator::default(),
            revision: 0,
        }
    }
}

impl StepDataStore {
    /// Creates a store seeded with `defaults`, tracking row identity for `list_paths`.
    pub fn with_defaults(defaults: Value, list_paths: &[&str]) -> Result<Self, StoreError> {
        let mut store = Self::default();
        for path in list_paths {
            store.lists.insert((*path).to_string(), RowArena::default());
        }
        store.reset(defaults)?;
        store.revision = 0;
        Ok(store)
    }

    pub fn revision(&self) -> u64 {
        self.revision
    }

    pub fn get(&self, path: &str) -> Option<&Value> {
        lookup(&self.values, path)
    }

    /// Deep copy of the current values.
    pub fn snapshot(&self) -> Value {
        self.values.clone()
    }

    /// Writes `value` at `path`, creating intermediate objects on the way.
    ///
    /// Array segments must address an existing row; rows are created with [`append_row`].
    ///
    /// [`append_row`]: StepDataStore::append_row
    pub fn set_value(&mut self, path: &str, value: Value) -> Result<(), StoreError> {
        let parsed = FieldPath::parse(path)?;
        write_at(&mut self.values, &parsed, value)?;
        self.revision += 1;

        if self.lists.contains_key(parsed.as_str()) {
            self.reseed_list(parsed.as_str());
        }
        Ok(())
    }

    /// Replaces every value atomically. Safe to call repeatedly with the same snapshot.
    pub fn reset(&mut self, values: Value) -> Result<(), StoreError> {
        if !values.is_object() {
            return Err(StoreError::NotAnObject {
                found: json_kind(&values).to_string(),
            });
        }
        self.values = values;
        self.revision += 1;

        let paths: Vec<String> = self.lists.keys().cloned().collect();
        for path in paths {
            self.reseed_list(&path);
        }
        Ok(())
    }

    /// Appends a row to the repeatable list at `list_path`, returning its identity.
    pub fn append_row(&mut self, list_path: &str, row: Value) -> Result<RowId, StoreError> {
        let parsed = FieldPath::parse(list_path)?;
        match lookup(&self.values, parsed.as_str()) {
            None | Some(Value::Null) => {
                write_at(&mut self.values, &parsed, Value::Array(Vec::new()))?;
            }
            Some(Value::Array(_)) => {}
            Some(other) => {
                return Err(StoreError::NotAList {
                    path: parsed.to_string(),
                    found: json_kind(other).to_string(),
                })
            }
        }

        let items = array_at_mut(&mut self.values, &parsed)?;
        items.push(row);
        let len = items.len();

        let arena = self.lists.entry(parsed.to_string()).or_default();
        if arena.len() + 1 != len {
            // Row identity was never tracked for this list; seed the existing rows first.
            *arena = RowArena::seeded(len - 1, &mut self.row_ids);
        }
        let id = arena.push(&mut self.row_ids);
        self.revision += 1;

        debug!(
            "[PHASE: form] [STEP: append_row] list={} rows={} id={}",
            parsed, len, id
        );
        Ok(id)
    }

    /// Removes the row at `index`. Remaining rows keep their identities.
    pub fn remove_row(&mut self, list_path: &str, index: usize) -> Result<(RowId, Value), StoreError> {
        let parsed = FieldPath::parse(list_path)?;
        let items = array_at_mut(&mut self.values, &parsed)?;
        if index >= items.len() {
            return Err(StoreError::IndexOutOfRange {
                path: parsed.to_string(),
                index,
                len: items.len(),
            });
        }
        let row = items.remove(index);
        let remaining = items.len();

        let arena = self.lists.entry(parsed.to_string()).or_default();
        let id = match arena.remove(index) {
            Some(id) => id,
            None => {
                // Untracked list: identities start now, the removed row gets a fresh one.
                *arena = RowArena::seeded(remaining, &mut self.row_ids);
                self.row_ids.allocate()
            }
        };
        self.revision += 1;
        Ok((id, row))
    }

    /// Row identities for `list_path`, in row order.
    pub fn row_ids(&self, list_path: &str) -> &[RowId] {
        self.lists
            .get(list_path)
            .map(|a| a.ids())
            .unwrap_or(&[])
    }

    fn reseed_list(&mut self, path: &str) {
        let len = match lookup(&self.values, path) {
            Some(Value::Array(items)) => items.len(),
            _ => 0,
        };
        let arena = RowArena::seeded(len, &mut self.row_ids);
        self.lists.insert(path.to_string(), arena);
    }
}

fn write_at(root: &mut Value, path: &FieldPath, value: Value) -> Result<(), StoreError> {
    let segments = path.segments();
    let mut current = root;

    for (pos, seg) in segments.iter().enumerate() {
        let is_last = pos + 1 == segments.len();
        current = match seg {
            PathSegment::Key(key) => {
                if current.is_null() {
                    *current = Value::Object(Map::new());
                }
                let found = json_kind(current);
                let map = current
                    .as_object_mut()
                    .ok_or_else(|| StoreError::NotAContainer {
                        path: path.to_string(),
                        segment: key.clone(),
                        found: found.to_string(),
                    })?;
                if is_last {
                    map.insert(key.clone(), value);
                    return Ok(());
                }
                map.entry(key.clone()).or_insert(Value::Null)
            }
            PathSegment::Index(idx) => {
                let found = json_kind(current);
                let items = current
                    .as_array_mut()
                    .ok_or_else(|| StoreError::NotAContainer {
                        path: path.to_string(),
                        segment: idx.to_string(),
                        found: found.to_string(),
                    })?;
                let len = items.len();
                let slot = items
                    .get_mut(*idx)
                    .ok_or_else(|| StoreError::IndexOutOfRange {
                        path: path.to_string(),
                        index: *idx,
                        len,
                    })?;
                if is_last {
                    *slot = value;
                    return Ok(());
                }
                slot
            }
        };
    }

    Ok(())
}

fn array_at_mut<'a>(root: &'a mut Value, path: &FieldPath) -> Result<&'a mut Vec<Value>, StoreError> {
    let mut current = root;
    for seg in path.segments() {
        current = match (seg, current) {
            (PathSegment::Key(k), Value::Object(map)) => {
                map.get_mut(k).ok_or_else(|| StoreError::NotAList {
                    path: path.to_string(),
                    found: "missing".to_string(),
                })?
            }
            (PathSegment::Index(i), Value::Array(items)) => {
                let len = items.len();
                items.get_mut(*i).ok_or_else(|| StoreError::IndexOutOfRange {
                    path: path.to_string(),
                    index: *i,
                    len,
                })?
            }
            (_, other) => {
                return Err(StoreError::NotAList {
                    path: path.to_string(),
                    found: json_kind(other).to_string(),
                })
            }
        };
    }

    let found = json_kind(current);
    current.as_array_mut().ok_or_else(|| StoreError::NotAList {
        path: path.to_string(),
        found: found.to_string(),
    })
}

pub(crate) fn json_kind(v: &Value) -> &'static str {
    match v {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}
