use std::path::PathBuf;

use thiserror::Error;

/// Raised whenever a prediction cannot be produced from a valid request.
///
/// A failed prediction yields no result at all; callers surface the message and let
/// the user trigger again.
#[derive(Debug, Error)]
pub enum PredictionFailure {
    /// Artifact file missing or unreadable.
    #[error("model artifact {} could not be read: {source}", path.display())]
    ArtifactUnavailable {
        /// Path that was attempted.
        path: PathBuf,
        /// Underlying filesystem error.
        #[source]
        source: std::io::Error,
    },
    /// Artifact parsed but is structurally invalid.
    #[error("model artifact is corrupt: {0}")]
    CorruptArtifact(String),
    /// Record columns differ from the columns the artifact was trained with.
    #[error("feature schema mismatch: model expects [{}], record has [{}]", expected.join(", "), found.join(", "))]
    SchemaMismatch {
        /// Columns declared by the artifact, in order.
        expected: Vec<String>,
        /// Columns present in the record, in order.
        found: Vec<String>,
    },
    /// A cell has the wrong kind for its column.
    #[error("column {column} must be {expected}")]
    FeatureKind {
        /// Column name.
        column: String,
        /// Expected kind (`numeric` or `categorical`).
        expected: &'static str,
    },
    /// Categorical value absent from the artifact's vocabulary.
    #[error("column {column} has unknown category {value:?}")]
    UnknownCategory {
        /// Column name.
        column: String,
        /// Offending label.
        value: String,
    },
    /// The model or the inverse transform produced NaN or infinity.
    #[error("model produced a non-finite score ({0})")]
    NonFinite(f64),
    /// The estimate over the last budget overflowed.
    #[error("budget ratio against last budget {last_event_budget} is not finite")]
    NonFiniteRatio {
        /// Last budget the estimate was compared against.
        last_event_budget: f64,
    },
}

/// Rejected form input. No request is issued when one of these is returned.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum InputError {
    /// Numeric value outside the field's allowed range.
    #[error("{field} must be between {min} and {}, got {value}", max.map_or_else(|| "unbounded".to_string(), |max| max.to_string()))]
    OutOfRange {
        /// Field key.
        field: &'static str,
        /// Rejected value.
        value: f64,
        /// Inclusive lower bound.
        min: f64,
        /// Inclusive upper bound, if any.
        max: Option<f64>,
    },
    /// Text that does not parse as a finite number.
    #[error("{field} expects a number, got {input:?}")]
    NotANumber {
        /// Field key.
        field: &'static str,
        /// Raw text.
        input: String,
    },
    /// Fractional value for an integer field.
    #[error("{field} expects a whole number, got {value}")]
    NotAnInteger {
        /// Field key.
        field: &'static str,
        /// Rejected value.
        value: f64,
    },
    /// Enum field value outside its fixed option set.
    #[error("{field} must be one of [{allowed}], got {input:?}")]
    UnknownOption {
        /// Field key.
        field: &'static str,
        /// Raw text.
        input: String,
        /// Comma separated allowed labels.
        allowed: String,
    },
    /// Form key that matches no field.
    #[error("unknown form field {0:?}")]
    UnknownField(String),
}
