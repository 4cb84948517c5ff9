use std::path::PathBuf;
use thiserror::Error;

/// Dictionary problems. All of these abort processing for the whole run,
/// since every year is decoded against the same dictionary.
#[derive(Debug, Error)]
pub enum SchemaError {
    #[error("column `{column}` has no `default` block")]
    MissingDefault { column: String },

    #[error("column `{column}`: unknown type tag `{tag}`")]
    UnknownType { column: String, tag: String },

    #[error("column `{column}` ({year}): levels has {levels} entries but labels has {labels}")]
    LevelLabelMismatch {
        column: String,
        year: String,
        levels: usize,
        labels: usize,
    },

    #[error("column `{column}` ({year}): property `{property}` {reason}")]
    BadProperty {
        column: String,
        year: String,
        property: &'static str,
        reason: String,
    },

    #[error("dictionary is not valid JSON: {0}")]
    Json(#[from] serde_json::Error),
}

/// A slice that cannot be coerced to its declared type. Fatal under
/// `CoercePolicy::Strict`; becomes a missing value under `Lenient`.
#[derive(Debug, Error)]
pub enum DecodeError {
    #[error("column `{column}`: `{raw}` is not an integer")]
    Integer { column: String, raw: String },

    #[error("column `{column}`: `{raw}` is not a number")]
    Numeric { column: String, raw: String },
}

/// Anything that can stop a per-year staging run.
#[derive(Debug, Error)]
pub enum StageError {
    #[error(transparent)]
    Schema(#[from] SchemaError),

    #[error("line {line}: {source}")]
    Decode {
        line: u64,
        #[source]
        source: DecodeError,
    },

    #[error("{}: not valid {primary}, and the {fallback} fallback also failed", path.display())]
    Encoding {
        path: PathBuf,
        primary: &'static str,
        fallback: &'static str,
    },

    #[error("cancelled")]
    Cancelled,

    #[error(transparent)]
    Io(#[from] std::io::Error),
}
