use serde::Serialize;

use crate::transform::PredictionResult;

/// Heading of the success block.
pub const TITLE: &str = "Prediction Results";
/// Disclaimer printed under every result.
pub const FOOTER: &str = "Predictions are estimates - Actual costs may vary";
/// Default progress bar width in characters.
pub const DEFAULT_PROGRESS_WIDTH: usize = 30;

/// Formats an amount as `Tk 51,000.00`.
#[must_use]
pub fn format_currency(amount: f64) -> String {
    let fixed = format!("{:.2}", amount.abs());
    let (whole, cents) = fixed.split_once('.').unwrap_or((fixed.as_str(), "00"));
    let mut grouped = String::with_capacity(whole.len() + whole.len() / 3);
    for (idx, digit) in whole.chars().enumerate() {
        if idx > 0 && (whole.len() - idx) % 3 == 0 {
            grouped.push(',');
        }
        grouped.push(digit);
    }
    let sign = if amount < 0.0 && fixed != "0.00" { "-" } else { "" };
    format!("Tk {sign}{grouped}.{cents}")
}

/// Renders `[#####-----]  50%` for a ratio in `[0, 1]`.
#[must_use]
#[allow(
    clippy::cast_possible_truncation,
    clippy::cast_sign_loss,
    clippy::cast_precision_loss
)]
pub fn progress_bar(ratio: f64, width: usize) -> String {
    let ratio = if ratio.is_finite() {
        ratio.clamp(0.0, 1.0)
    } else {
        0.0
    };
    let width = width.max(1);
    let filled = ((ratio * width as f64).round() as usize).min(width);
    format!(
        "[{}{}] {:>3.0}%",
        "#".repeat(filled),
        "-".repeat(width - filled),
        ratio * 100.0
    )
}

/// Result display: estimate, cost breakdown, bounded progress bar and caption.
#[derive(Debug, Clone, Copy, Serialize)]
pub struct ResultReport<'a> {
    result: &'a PredictionResult,
    #[serde(skip)]
    progress_width: usize,
}

impl<'a> ResultReport<'a> {
    /// Report over a result with the default bar width.
    #[must_use]
    pub const fn new(result: &'a PredictionResult) -> Self {
        Self {
            result,
            progress_width: DEFAULT_PROGRESS_WIDTH,
        }
    }

    /// Overrides the bar width.
    #[must_use]
    pub const fn with_progress_width(mut self, width: usize) -> Self {
        self.progress_width = width;
        self
    }

    /// Caption comparing against the last budget. Shows the unclamped ratio.
    #[must_use]
    pub fn caption(&self) -> String {
        let last = format_currency(self.result.last_event_budget);
        if self.result.last_event_budget > 0.0 {
            format!(
                "Compared to last budget ({last}): {:.2}x",
                self.result.budget_ratio
            )
        } else {
            format!("Compared to last budget ({last}): no previous budget, shown at parity")
        }
    }

    /// Multi-line text block.
    #[must_use]
    pub fn render(&self) -> String {
        let result = self.result;
        [
            TITLE.to_string(),
            format!(
                "Estimated Total Cost: {}",
                format_currency(result.estimated_total_cost)
            ),
            "Cost Breakdown:".to_string(),
            format!("  - Base Costs: {}", format_currency(result.base_costs)),
            format!(
                "  - Net Sponsorship: {}",
                format_currency(result.net_sponsorship)
            ),
            progress_bar(result.display_ratio, self.progress_width),
            self.caption(),
            String::new(),
            FOOTER.to_string(),
        ]
        .join("\n")
    }

    /// JSON document with the raw numbers plus the rendered caption.
    #[must_use]
    pub fn to_json(&self) -> serde_json::Value {
        serde_json::json!({
            "result": self.result,
            "formatted": {
                "estimated_total_cost": format_currency(self.result.estimated_total_cost),
                "base_costs": format_currency(self.result.base_costs),
                "net_sponsorship": format_currency(self.result.net_sponsorship),
            },
            "caption": self.caption(),
        })
    }
}

/// Message shown when a prediction fails.
#[must_use]
pub fn render_failure(message: &str) -> String {
    format!("Error in prediction: {message}")
}

#[cfg(test)]
mod tests {
    use super::*;

    fn result(estimate: f64, last: f64) -> PredictionResult {
        let budget_ratio = crate::transform::budget_ratio(estimate, last);
        PredictionResult {
            raw_score: crate::transform::forward_target(estimate),
            estimated_total_cost: estimate,
            base_costs: 58_000.0,
            net_sponsorship: 5_000.0,
            last_event_budget: last,
            budget_ratio,
            display_ratio: crate::transform::display_ratio(budget_ratio),
        }
    }

    #[test]
    fn formats_currency_with_grouping() {
        assert_eq!(format_currency(51_000.0), "Tk 51,000.00");
        assert_eq!(format_currency(999.999), "Tk 1,000.00");
        assert_eq!(format_currency(0.0), "Tk 0.00");
        assert_eq!(format_currency(1_234_567.891), "Tk 1,234,567.89");
        assert_eq!(format_currency(-2_500.5), "Tk -2,500.50");
        assert_eq!(format_currency(-0.001), "Tk 0.00");
    }

    #[test]
    fn progress_bar_is_bounded() {
        assert_eq!(progress_bar(0.5, 10), "[#####-----]  50%");
        assert_eq!(progress_bar(1.0, 4), "[####] 100%");
        assert_eq!(progress_bar(7.0, 4), "[####] 100%");
        assert_eq!(progress_bar(f64::NAN, 4), "[----]   0%");
    }

    #[test]
    fn report_shows_true_ratio_in_caption_and_clamped_bar() {
        let result = result(51_000.0, 25_000.0);
        let text = ResultReport::new(&result).with_progress_width(10).render();
        assert!(text.contains("Estimated Total Cost: Tk 51,000.00"));
        assert!(text.contains("Base Costs: Tk 58,000.00"));
        assert!(text.contains("Net Sponsorship: Tk 5,000.00"));
        assert!(text.contains("[##########] 100%"));
        assert!(text.contains("Compared to last budget (Tk 25,000.00): 2.04x"));
        assert!(text.ends_with(FOOTER));
    }

    #[test]
    fn caption_without_last_budget() {
        let result = result(10_000.0, 0.0);
        let caption = ResultReport::new(&result).caption();
        assert!(caption.contains("Tk 0.00"));
        assert!(caption.contains("parity"));
    }

    #[test]
    fn json_carries_numbers_and_caption() {
        let result = result(51_000.0, 25_000.0);
        let value = ResultReport::new(&result).to_json();
        assert_eq!(value["result"]["display_ratio"], 1.0);
        assert_eq!(value["formatted"]["base_costs"], "Tk 58,000.00");
        assert!(value["caption"].as_str().unwrap().contains("2.04x"));
    }

    #[test]
    fn failure_message_carries_cause() {
        assert_eq!(
            render_failure("model artifact is corrupt: bad"),
            "Error in prediction: model artifact is corrupt: bad"
        );
    }
}
