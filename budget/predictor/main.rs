//! One interaction: collect the form, score it, derive the display values.

use serde::Serialize;
use serde_json::{json, Value};
use shared_logging::LogLevel;
use uuid::Uuid;

use crate::{
    collector::{InputCollector, RawForm},
    error::{InputError, PredictionFailure},
    predictor::BudgetModel,
    request::PredictionRequest,
    telemetry::PredictorTelemetry,
    transform::PredictionResult,
};

/// Outcome of one prediction attempt. Failures carry only the readable message.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum PredictionOutcome {
    /// Prediction succeeded.
    Success {
        /// Attempt identifier.
        request_id: Uuid,
        /// Derived display values.
        result: PredictionResult,
    },
    /// Prediction failed; no result exists.
    Failure {
        /// Attempt identifier.
        request_id: Uuid,
        /// Underlying failure description.
        message: String,
    },
}

impl PredictionOutcome {
    /// Result when the attempt succeeded.
    #[must_use]
    pub const fn result(&self) -> Option<&PredictionResult> {
        match self {
            Self::Success { result, .. } => Some(result),
            Self::Failure { .. } => None,
        }
    }

    /// Attempt identifier.
    #[must_use]
    pub const fn request_id(&self) -> Uuid {
        match self {
            Self::Success { request_id, .. } | Self::Failure { request_id, .. } => *request_id,
        }
    }
}

/// Runs collect → predict → transform. Holds no state between attempts beyond the model.
pub struct BudgetSession<'m> {
    model: &'m dyn BudgetModel,
    collector: InputCollector,
    telemetry: Option<PredictorTelemetry>,
}

impl<'m> BudgetSession<'m> {
    /// Session over a model with the default collector.
    #[must_use]
    pub fn new(model: &'m dyn BudgetModel) -> Self {
        Self {
            model,
            collector: InputCollector::default(),
            telemetry: None,
        }
    }

    /// Replaces the input collector.
    #[must_use]
    pub const fn with_collector(mut self, collector: InputCollector) -> Self {
        self.collector = collector;
        self
    }

    /// Attaches telemetry sinks for structured logging/events.
    #[must_use]
    pub fn with_telemetry(mut self, telemetry: PredictorTelemetry) -> Self {
        self.telemetry = Some(telemetry);
        self
    }

    /// Collector in use.
    #[must_use]
    pub const fn collector(&self) -> &InputCollector {
        &self.collector
    }

    /// Validates the form. Rejected input issues no prediction.
    pub fn collect(&self, form: &RawForm) -> Result<PredictionRequest, InputError> {
        self.collector.collect(form).map_err(|err| {
            self.log(
                LogLevel::Warn,
                "input.rejected",
                json!({ "error": err.to_string() }),
            );
            err
        })
    }

    /// Scores a request. Never fails: a [`PredictionFailure`] becomes a readable message.
    pub fn predict(&self, request: &PredictionRequest) -> PredictionOutcome {
        let request_id = Uuid::new_v4();
        self.log(
            LogLevel::Info,
            "prediction.start",
            json!({
                "request_id": request_id,
                "event_type": request.event_type(),
                "event_scale": request.event_scale(),
                "participants_range": request.participants_range(),
                "event_duration": request.event_duration(),
            }),
        );
        match self.score(request) {
            Ok(result) => {
                let payload = json!({
                    "request_id": request_id,
                    "raw_score": result.raw_score,
                    "estimated_total_cost": result.estimated_total_cost,
                    "budget_ratio": result.budget_ratio,
                });
                self.log(LogLevel::Info, "prediction.completed", payload.clone());
                self.event("budget.prediction.completed", payload);
                PredictionOutcome::Success { request_id, result }
            }
            Err(failure) => {
                let message = failure.to_string();
                let payload = json!({ "request_id": request_id, "error": message });
                self.log(LogLevel::Error, "prediction.failed", payload.clone());
                self.event("budget.prediction.failed", payload);
                PredictionOutcome::Failure {
                    request_id,
                    message,
                }
            }
        }
    }

    /// Collects then predicts.
    pub fn run(&self, form: &RawForm) -> Result<PredictionOutcome, InputError> {
        let request = self.collect(form)?;
        Ok(self.predict(&request))
    }

    fn score(&self, request: &PredictionRequest) -> Result<PredictionResult, PredictionFailure> {
        let raw_score = self.model.predict(&request.to_record())?;
        PredictionResult::from_raw_score(raw_score, request)
    }

    fn log(&self, level: LogLevel, message: &str, metadata: Value) {
        if let Some(telemetry) = self.telemetry.as_ref() {
            let _ = telemetry.log(level, message, metadata);
        }
    }

    fn event(&self, event_type: &str, payload: Value) {
        if let Some(telemetry) = self.telemetry.as_ref() {
            let _ = telemetry.event(event_type, payload);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        collector::BoundsPolicy,
        predictor::{ArtifactLoader, CachedPredictor},
        request::FeatureRecord,
    };
    use shared_event_bus::MemoryEventBus;
    use shared_logging::MemoryLogger;
    use std::sync::{
        atomic::{AtomicUsize, Ordering},
        Arc,
    };

    fn fixed_score(record: &FeatureRecord) -> Result<f64, PredictionFailure> {
        assert_eq!(record.len(), 9);
        Ok(51_001f64.ln())
    }

    fn broken_model(_: &FeatureRecord) -> Result<f64, PredictionFailure> {
        Err(PredictionFailure::CorruptArtifact("truncated file".into()))
    }

    fn scenario_a() -> RawForm {
        RawForm::new()
            .set("event_type", "Tech Fest")
            .set("event_scale", "Inter-University")
            .set("participants_range", "500-1000")
            .set("event_duration", "3")
            .set("equipment_costs", "15000")
            .set("staff_costs", "35000")
            .set("marketing_costs", "8000")
            .set("sponsorship_amount", "5000")
            .set("last_event_budget", "25000")
    }

    #[test]
    fn scenario_a_produces_expected_result() {
        let session = BudgetSession::new(&fixed_score);
        let outcome = session.run(&scenario_a()).unwrap();
        let result = outcome.result().unwrap();
        assert!((result.estimated_total_cost - 51_000.0).abs() < 1e-6);
        assert!((result.base_costs - 58_000.0).abs() < f64::EPSILON);
        assert!((result.budget_ratio - 2.04).abs() < 1e-9);
        assert!((result.display_ratio - 1.0).abs() < f64::EPSILON);
    }

    #[test]
    fn scenario_b_zero_last_budget() {
        let session = BudgetSession::new(&fixed_score);
        let outcome = session
            .run(&scenario_a().set("last_event_budget", "0"))
            .unwrap();
        let result = outcome.result().unwrap();
        assert!((result.budget_ratio - 1.0).abs() < f64::EPSILON);
        assert!((result.display_ratio - 1.0).abs() < f64::EPSILON);
    }

    #[test]
    fn failure_is_caught_and_reported() {
        let logger = Arc::new(MemoryLogger::default());
        let bus = Arc::new(MemoryEventBus::new(8));
        let telemetry = PredictorTelemetry::builder("budget")
            .log_sink(logger.clone())
            .event_publisher(bus.clone())
            .build()
            .unwrap();
        let session = BudgetSession::new(&broken_model).with_telemetry(telemetry);
        let outcome = session.run(&RawForm::new()).unwrap();
        assert!(outcome.result().is_none());
        match &outcome {
            PredictionOutcome::Failure { message, .. } => {
                assert!(message.contains("truncated file"));
            }
            PredictionOutcome::Success { .. } => panic!("expected failure"),
        }
        assert_eq!(logger.messages(), vec!["prediction.start", "prediction.failed"]);
        assert_eq!(bus.snapshot()[0].event_type, "budget.prediction.failed");
    }

    #[test]
    fn missing_artifact_yields_failure_outcome() {
        let predictor = CachedPredictor::from_path("no/such/model.json");
        let session = BudgetSession::new(&predictor);
        let outcome = session.run(&RawForm::new()).unwrap();
        assert!(matches!(outcome, PredictionOutcome::Failure { .. }));
    }

    #[test]
    fn rejected_input_issues_no_prediction() {
        let calls = AtomicUsize::new(0);
        let counting = |_: &FeatureRecord| -> Result<f64, PredictionFailure> {
            calls.fetch_add(1, Ordering::SeqCst);
            Ok(1.0)
        };
        let session = BudgetSession::new(&counting)
            .with_collector(InputCollector::new(BoundsPolicy::Reject));
        let err = session
            .run(&RawForm::new().set("marketing_costs", "999999"))
            .unwrap_err();
        assert!(matches!(err, InputError::OutOfRange { .. }));
        assert_eq!(calls.load(Ordering::SeqCst), 0);
    }

    struct CountingLoader(Arc<AtomicUsize>);

    impl ArtifactLoader for CountingLoader {
        fn load(&self) -> Result<Arc<dyn BudgetModel>, PredictionFailure> {
            self.0.fetch_add(1, Ordering::SeqCst);
            Ok(Arc::new(fixed_score))
        }

        fn source(&self) -> String {
            "counting".into()
        }
    }

    #[test]
    fn sequential_sessions_share_one_load() {
        let loads = Arc::new(AtomicUsize::new(0));
        let predictor = CachedPredictor::new(CountingLoader(Arc::clone(&loads)));
        for _ in 0..3 {
            let session = BudgetSession::new(&predictor);
            assert!(session.run(&RawForm::new()).unwrap().result().is_some());
        }
        assert_eq!(loads.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn outcome_serialises_with_status_tag() {
        let session = BudgetSession::new(&broken_model);
        let outcome = session.run(&RawForm::new()).unwrap();
        let value = serde_json::to_value(&outcome).unwrap();
        assert_eq!(value["status"], "failure");
        assert!(value["message"].as_str().unwrap().contains("corrupt"));
    }
}
