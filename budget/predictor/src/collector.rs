use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

use crate::{
    error::InputError,
    request::{
        Choice, EventScale, EventType, ParticipantsRange, PredictionRequest, RequestDraft,
        DURATION_DAYS, EQUIPMENT_COSTS_MAX, MARKETING_COSTS_MAX, STAFF_COSTS_MAX,
    },
};

/// What to do with numeric entry outside a field's bounds.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BoundsPolicy {
    /// Refuse the entry; no request is issued.
    Reject,
    /// Pull the entry into `[min, max]`, like a bounded number widget.
    #[default]
    Clamp,
}

/// Widget rendering a form field.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(tag = "widget", rename_all = "snake_case")]
pub enum WidgetKind {
    /// Drop-down over a fixed option set.
    Select {
        /// Option labels in display order.
        options: &'static [&'static str],
    },
    /// Integer slider.
    Slider {
        /// Inclusive minimum.
        min: u8,
        /// Inclusive maximum.
        max: u8,
    },
    /// Bounded currency entry.
    Number {
        /// Inclusive minimum.
        min: f64,
        /// Inclusive maximum; `None` means unbounded above.
        max: Option<f64>,
        /// Increment used by stepper controls.
        step: f64,
    },
}

/// Descriptor for one form field.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct FieldSpec {
    /// Key used in [`RawForm`].
    pub key: &'static str,
    /// Training column fed by this field.
    pub column: &'static str,
    /// Human label.
    pub label: &'static str,
    /// Widget and its constraints.
    pub widget: WidgetKind,
    /// Initial widget value.
    pub default: &'static str,
}

/// The planning form, in display order.
pub static FORM_FIELDS: [FieldSpec; 9] = [
    FieldSpec {
        key: "event_type",
        column: "Event_Type",
        label: "Event Type",
        widget: WidgetKind::Select {
            options: EventType::LABELS,
        },
        default: "Tech Fest",
    },
    FieldSpec {
        key: "event_scale",
        column: "Event_Scale",
        label: "Event Scale",
        widget: WidgetKind::Select {
            options: EventScale::LABELS,
        },
        default: "Inter-University",
    },
    FieldSpec {
        key: "participants_range",
        column: "Expected_Participants_Range",
        label: "Expected Participants",
        widget: WidgetKind::Select {
            options: ParticipantsRange::LABELS,
        },
        default: "500-1000",
    },
    FieldSpec {
        key: "event_duration",
        column: "Event_Duration",
        label: "Event Duration (days)",
        widget: WidgetKind::Slider {
            min: DURATION_DAYS.0,
            max: DURATION_DAYS.1,
        },
        default: "3",
    },
    FieldSpec {
        key: "equipment_costs",
        column: "Equipment_Costs",
        label: "Equipment Costs (Tk)",
        widget: WidgetKind::Number {
            min: 0.0,
            max: Some(EQUIPMENT_COSTS_MAX),
            step: 1000.0,
        },
        default: "15000",
    },
    FieldSpec {
        key: "staff_costs",
        column: "Staff_Costs",
        label: "Staff Costs (Tk)",
        widget: WidgetKind::Number {
            min: 0.0,
            max: Some(STAFF_COSTS_MAX),
            step: 1000.0,
        },
        default: "35000",
    },
    FieldSpec {
        key: "marketing_costs",
        column: "Marketing_Costs",
        label: "Marketing Costs (Tk)",
        widget: WidgetKind::Number {
            min: 0.0,
            max: Some(MARKETING_COSTS_MAX),
            step: 500.0,
        },
        default: "8000",
    },
    FieldSpec {
        key: "sponsorship_amount",
        column: "Sponsorship_Amount",
        label: "Sponsorship Amount (Tk)",
        widget: WidgetKind::Number {
            min: 0.0,
            max: None,
            step: 1.0,
        },
        default: "5000",
    },
    FieldSpec {
        key: "last_event_budget",
        column: "Last_Event_Budget",
        label: "Last Event Budget (Tk)",
        widget: WidgetKind::Number {
            min: 0.0,
            max: None,
            step: 1.0,
        },
        default: "25000",
    },
];

/// Raw text entered per field key. Absent keys keep the field default.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RawForm {
    values: IndexMap<String, String>,
}

impl RawForm {
    /// Empty form (all defaults).
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the raw text for a field.
    #[must_use]
    pub fn set(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.insert(key, value);
        self
    }

    /// Sets the raw text for a field in place.
    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<String>) {
        self.values.insert(key.into(), value.into());
    }

    /// Entered values in entry order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.values
            .iter()
            .map(|(key, value)| (key.as_str(), value.as_str()))
    }
}

/// Turns raw form text into a complete [`PredictionRequest`] or refuses to.
#[derive(Debug, Clone, Copy, Default)]
pub struct InputCollector {
    policy: BoundsPolicy,
}

impl InputCollector {
    /// Collector applying the given bounds policy.
    #[must_use]
    pub const fn new(policy: BoundsPolicy) -> Self {
        Self { policy }
    }

    /// Active bounds policy.
    #[must_use]
    pub const fn policy(&self) -> BoundsPolicy {
        self.policy
    }

    /// Field descriptors in display order.
    #[must_use]
    pub fn fields(&self) -> &'static [FieldSpec] {
        &FORM_FIELDS
    }

    /// Looks up a field descriptor by key.
    #[must_use]
    pub fn field(key: &str) -> Option<&'static FieldSpec> {
        FORM_FIELDS.iter().find(|spec| spec.key == key)
    }

    /// Builds a request from the form. Either every field is valid or nothing is returned.
    pub fn collect(&self, form: &RawForm) -> Result<PredictionRequest, InputError> {
        let mut draft = RequestDraft::default();
        for (key, raw) in form.iter() {
            self.apply(&mut draft, key, raw)?;
        }
        draft.validate()
    }

    /// Checks a single entry the way [`Self::collect`] would, for field-by-field prompting.
    pub fn check_field(&self, key: &str, raw: &str) -> Result<(), InputError> {
        let mut draft = RequestDraft::default();
        self.apply(&mut draft, key, raw)?;
        draft.validate().map(|_| ())
    }

    fn apply(&self, draft: &mut RequestDraft, key: &str, raw: &str) -> Result<(), InputError> {
        let spec = Self::field(key).ok_or_else(|| InputError::UnknownField(key.to_string()))?;
        match spec.key {
            "event_type" => draft.event_type = EventType::parse_choice(raw)?,
            "event_scale" => draft.event_scale = EventScale::parse_choice(raw)?,
            "participants_range" => {
                draft.participants_range = ParticipantsRange::parse_choice(raw)?;
            }
            "event_duration" => draft.event_duration = self.days(spec, raw)?,
            "equipment_costs" => draft.equipment_costs = self.amount(spec, raw)?,
            "staff_costs" => draft.staff_costs = self.amount(spec, raw)?,
            "marketing_costs" => draft.marketing_costs = self.amount(spec, raw)?,
            "sponsorship_amount" => draft.sponsorship_amount = self.amount(spec, raw)?,
            "last_event_budget" => draft.last_event_budget = self.amount(spec, raw)?,
            other => return Err(InputError::UnknownField(other.to_string())),
        }
        Ok(())
    }

    fn amount(&self, spec: &FieldSpec, raw: &str) -> Result<f64, InputError> {
        let value = parse_number(spec.key, raw)?;
        let WidgetKind::Number { min, max, .. } = spec.widget else {
            return Ok(value);
        };
        Ok(match self.policy {
            BoundsPolicy::Clamp => value.clamp(min, max.unwrap_or(f64::INFINITY)),
            BoundsPolicy::Reject => value,
        })
    }

    #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
    fn days(&self, spec: &FieldSpec, raw: &str) -> Result<u8, InputError> {
        let value = parse_number(spec.key, raw)?;
        if value.fract() != 0.0 {
            return Err(InputError::NotAnInteger {
                field: spec.key,
                value,
            });
        }
        let (min, max) = DURATION_DAYS;
        let (lower, upper) = (f64::from(min), f64::from(max));
        let value = match self.policy {
            BoundsPolicy::Clamp => value.clamp(lower, upper),
            BoundsPolicy::Reject if (lower..=upper).contains(&value) => value,
            BoundsPolicy::Reject => {
                return Err(InputError::OutOfRange {
                    field: spec.key,
                    value,
                    min: lower,
                    max: Some(upper),
                })
            }
        };
        // In range 1..=7 at this point.
        Ok(value as u8)
    }
}

/// Parses currency-style text: optional `Tk` prefix, `,` or `_` digit separators.
fn parse_number(field: &'static str, raw: &str) -> Result<f64, InputError> {
    let trimmed = raw.trim();
    let without_unit = trimmed
        .strip_prefix("Tk")
        .or_else(|| trimmed.strip_prefix("tk"))
        .or_else(|| trimmed.strip_prefix("TK"))
        .unwrap_or(trimmed);
    let cleaned: String = without_unit
        .chars()
        .filter(|ch| !matches!(*ch, ',' | '_') && !ch.is_whitespace())
        .collect();
    match cleaned.parse::<f64>() {
        Ok(value) if value.is_finite() => Ok(value),
        _ => Err(InputError::NotANumber {
            field,
            input: raw.to_string(),
        }),
    }
}
