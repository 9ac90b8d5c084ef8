#![deny(
    clippy::all,
    clippy::pedantic,
    clippy::nursery,
    missing_docs,
    rust_2018_idioms
)]

//! Event budget estimation: collects the planning form, runs the cached regression
//! artifact and turns its log-scale score into a displayable budget estimate.

/// Error taxonomy for input collection and prediction.
pub mod error;
/// Validated prediction request and its single-row feature record.
pub mod request;
/// Form field descriptors and raw input parsing.
pub mod collector;
/// JSON regression artifact format and evaluation.
pub mod artifact;
/// Predictor interface and the load-once artifact cache.
pub mod predictor;
/// Inverse target transform and derived display values.
pub mod transform;
/// Text and JSON rendering of prediction results.
pub mod report;
/// TOML configuration.
pub mod config;

/// Telemetry helpers for logging/event emission.
#[path = "../telemetry.rs"]
pub mod telemetry;

/// Per-interaction control flow (collect, predict, transform).
#[path = "../main.rs"]
pub mod session;

pub use artifact::{Estimator, FeatureSpec, ModelArtifact, NumericTransform};
pub use collector::{BoundsPolicy, FieldSpec, InputCollector, RawForm, WidgetKind, FORM_FIELDS};
pub use config::{BudgetConfig, ConfigError};
pub use error::{InputError, PredictionFailure};
pub use predictor::{
    shared_predictor, ArtifactLoader, BudgetModel, CachedPredictor, FileArtifactLoader,
};
pub use report::{format_currency, progress_bar, ResultReport};
pub use request::{
    Choice, EventScale, EventType, FeatureRecord, FeatureValue, ParticipantsRange,
    PredictionRequest, RequestDraft, FEATURE_COLUMNS,
};
pub use session::{BudgetSession, PredictionOutcome};
pub use telemetry::{PredictorTelemetry, PredictorTelemetryBuilder};
pub use transform::{forward_target, inverse_target, PredictionResult};
