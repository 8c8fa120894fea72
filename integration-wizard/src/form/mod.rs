// Step form state: field paths, repeatable rows, and the per-step value store.

pub mod path;
pub mod rows;
pub mod store;

pub use path::{lookup, FieldPath, PathSegment};
pub use rows::RowId;
pub use store::StepDataStore;

use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum StoreError {
    #[error("invalid field path '{path}': {reason}")]
    InvalidPath { path: String, reason: String },

    #[error("cannot write '{path}': segment '{segment}' is inside a {found}")]
    NotAContainer {
        path: String,
        segment: String,
        found: String,
    },

    #[error("'{path}' has no row {index} (rows: {len})")]
    IndexOutOfRange {
        path: String,
        index: usize,
        len: usize,
    },

    #[error("'{path}' is not a row list (found {found})")]
    NotAList { path: String, found: String },

    #[error("step values must be an object, got {found}")]
    NotAnObject { found: String },
}
