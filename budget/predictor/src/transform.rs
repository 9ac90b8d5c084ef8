use serde::{Deserialize, Serialize};

use crate::{error::PredictionFailure, request::PredictionRequest};

/// Inverse of the training target transform: `exp(raw) - 1`.
///
/// Artifacts are trained on `ln(1 + y)`; this pairing is fixed, and artifacts declaring any
/// other target transform are refused at load.
#[must_use]
pub fn inverse_target(raw_score: f64) -> f64 {
    raw_score.exp_m1()
}

/// Training target transform: `ln(1 + y)`.
#[must_use]
pub fn forward_target(amount: f64) -> f64 {
    amount.ln_1p()
}

/// Displayable values derived from one raw score. Never persisted.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PredictionResult {
    /// Model output on the log scale.
    pub raw_score: f64,
    /// `exp(raw_score) - 1`.
    pub estimated_total_cost: f64,
    /// Equipment + staff + marketing.
    pub base_costs: f64,
    /// Sponsorship amount as entered.
    pub net_sponsorship: f64,
    /// Budget of the previous comparable event.
    pub last_event_budget: f64,
    /// Estimate over last budget; 1 when there is no last budget. Not clamped, always finite.
    pub budget_ratio: f64,
    /// `budget_ratio` bounded to `[0, 1]` for progress rendering.
    pub display_ratio: f64,
}

impl PredictionResult {
    /// Derives every display value from the model's raw score and the request it scored.
    pub fn from_raw_score(
        raw_score: f64,
        request: &PredictionRequest,
    ) -> Result<Self, PredictionFailure> {
        if !raw_score.is_finite() {
            return Err(PredictionFailure::NonFinite(raw_score));
        }
        let estimated_total_cost = inverse_target(raw_score);
        if !estimated_total_cost.is_finite() {
            return Err(PredictionFailure::NonFinite(raw_score));
        }
        let budget_ratio = budget_ratio(estimated_total_cost, request.last_event_budget());
        if !budget_ratio.is_finite() {
            return Err(PredictionFailure::NonFiniteRatio {
                last_event_budget: request.last_event_budget(),
            });
        }
        Ok(Self {
            raw_score,
            estimated_total_cost,
            base_costs: request.base_costs(),
            net_sponsorship: request.sponsorship_amount(),
            last_event_budget: request.last_event_budget(),
            budget_ratio,
            display_ratio: display_ratio(budget_ratio),
        })
    }
}

/// `estimate / last_budget`, or 1 (parity) when there is no previous budget.
#[must_use]
pub fn budget_ratio(estimated_total_cost: f64, last_event_budget: f64) -> f64 {
    if last_event_budget > 0.0 {
        estimated_total_cost / last_event_budget
    } else {
        1.0
    }
}

/// Progress-bar fraction: `min(budget_ratio, 1)`, floored at 0.
#[must_use]
pub fn display_ratio(budget_ratio: f64) -> f64 {
    budget_ratio.clamp(0.0, 1.0)
}
