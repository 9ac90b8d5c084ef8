use std::{fmt, str::FromStr};

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

use crate::error::InputError;

/// Training column names, in the order the artifact expects them.
pub const FEATURE_COLUMNS: [&str; 9] = [
    "Event_Type",
    "Event_Scale",
    "Expected_Participants_Range",
    "Event_Duration",
    "Equipment_Costs",
    "Staff_Costs",
    "Marketing_Costs",
    "Sponsorship_Amount",
    "Last_Event_Budget",
];

/// Inclusive bounds for the duration slider, in days.
pub const DURATION_DAYS: (u8, u8) = (1, 7);
/// Upper bound for equipment costs.
pub const EQUIPMENT_COSTS_MAX: f64 = 500_000.0;
/// Upper bound for staff costs.
pub const STAFF_COSTS_MAX: f64 = 1_000_000.0;
/// Upper bound for marketing costs.
pub const MARKETING_COSTS_MAX: f64 = 200_000.0;

/// Closed option set rendered as a selector.
pub trait Choice: Copy + Sized + 'static {
    /// Form field key.
    const FIELD: &'static str;
    /// Every option in display order.
    const ALL: &'static [Self];
    /// Labels the artifact was trained on, parallel to [`Self::ALL`].
    const LABELS: &'static [&'static str];

    /// Label the artifact was trained on.
    fn label(self) -> &'static str;

    /// Parses an exact label or a 1-based option index.
    fn parse_choice(input: &str) -> Result<Self, InputError> {
        let trimmed = input.trim();
        if let Some(found) = Self::ALL.iter().find(|option| option.label() == trimmed) {
            return Ok(*found);
        }
        if let Ok(index) = trimmed.parse::<usize>() {
            if let Some(found) = index.checked_sub(1).and_then(|idx| Self::ALL.get(idx)) {
                return Ok(*found);
            }
        }
        Err(InputError::UnknownOption {
            field: Self::FIELD,
            input: input.to_string(),
            allowed: Self::labels().join(", "),
        })
    }

    /// Labels in display order.
    #[must_use]
    fn labels() -> Vec<&'static str> {
        Self::LABELS.to_vec()
    }
}

/// Kind of event being planned.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum EventType {
    /// Cultural festival.
    #[serde(rename = "Cultural Fest")]
    CulturalFest,
    /// Technology festival.
    #[serde(rename = "Tech Fest")]
    TechFest,
    /// Sports tournament.
    #[serde(rename = "Sports Tournament")]
    SportsTournament,
    /// Seminar.
    #[serde(rename = "Seminar")]
    Seminar,
    /// Religious event.
    #[serde(rename = "Religious Event")]
    ReligiousEvent,
}

impl Choice for EventType {
    const FIELD: &'static str = "event_type";
    const ALL: &'static [Self] = &[
        Self::CulturalFest,
        Self::TechFest,
        Self::SportsTournament,
        Self::Seminar,
        Self::ReligiousEvent,
    ];
    const LABELS: &'static [&'static str] = &[
        "Cultural Fest",
        "Tech Fest",
        "Sports Tournament",
        "Seminar",
        "Religious Event",
    ];

    fn label(self) -> &'static str {
        Self::LABELS[self as usize]
    }
}

/// Reach of the event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum EventScale {
    /// Within one university.
    #[serde(rename = "Intra-University")]
    IntraUniversity,
    /// Across universities.
    #[serde(rename = "Inter-University")]
    InterUniversity,
    /// National.
    #[serde(rename = "National")]
    National,
    /// International.
    #[serde(rename = "International")]
    International,
}

impl Choice for EventScale {
    const FIELD: &'static str = "event_scale";
    const ALL: &'static [Self] = &[
        Self::IntraUniversity,
        Self::InterUniversity,
        Self::National,
        Self::International,
    ];
    const LABELS: &'static [&'static str] = &[
        "Intra-University",
        "Inter-University",
        "National",
        "International",
    ];

    fn label(self) -> &'static str {
        Self::LABELS[self as usize]
    }
}

/// Expected headcount bucket.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ParticipantsRange {
    /// Fewer than 500.
    #[serde(rename = "<500")]
    Under500,
    /// 500 to 1000.
    #[serde(rename = "500-1000")]
    From500To1000,
    /// More than 1000.
    #[serde(rename = ">1000")]
    Over1000,
}

impl Choice for ParticipantsRange {
    const FIELD: &'static str = "participants_range";
    const ALL: &'static [Self] = &[Self::Under500, Self::From500To1000, Self::Over1000];
    const LABELS: &'static [&'static str] = &["<500", "500-1000", ">1000"];

    fn label(self) -> &'static str {
        Self::LABELS[self as usize]
    }
}

macro_rules! choice_traits {
    ($($ty:ty),*) => {$(
        impl fmt::Display for $ty {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(self.label())
            }
        }

        impl FromStr for $ty {
            type Err = InputError;

            fn from_str(input: &str) -> Result<Self, Self::Err> {
                Self::parse_choice(input)
            }
        }
    )*};
}

choice_traits!(EventType, EventScale, ParticipantsRange);

/// One cell of the single-row feature record.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum FeatureValue {
    /// Categorical label.
    Category(String),
    /// Numeric value.
    Number(f64),
}

/// Ordered single-row record keyed by training column name.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(transparent)]
pub struct FeatureRecord {
    columns: IndexMap<String, FeatureValue>,
}

impl FeatureRecord {
    /// Empty record.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends (or replaces) a column, keeping first-insertion order.
    #[must_use]
    pub fn with(mut self, column: impl Into<String>, value: FeatureValue) -> Self {
        self.columns.insert(column.into(), value);
        self
    }

    /// Column names in order.
    pub fn column_names(&self) -> impl Iterator<Item = &str> {
        self.columns.keys().map(String::as_str)
    }

    /// Looks up a cell.
    #[must_use]
    pub fn get(&self, column: &str) -> Option<&FeatureValue> {
        self.columns.get(column)
    }

    /// Cells in column order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &FeatureValue)> {
        self.columns.iter().map(|(name, value)| (name.as_str(), value))
    }

    /// Number of columns.
    #[must_use]
    pub fn len(&self) -> usize {
        self.columns.len()
    }

    /// True when no column is present.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.columns.is_empty()
    }
}

/// Mutable, unvalidated form state. Defaults match the form's initial widget values.
#[derive(Debug, Clone, PartialEq)]
pub struct RequestDraft {
    /// Kind of event.
    pub event_type: EventType,
    /// Reach of the event.
    pub event_scale: EventScale,
    /// Expected headcount bucket.
    pub participants_range: ParticipantsRange,
    /// Duration in days.
    pub event_duration: u8,
    /// Equipment costs (Tk).
    pub equipment_costs: f64,
    /// Staff costs (Tk).
    pub staff_costs: f64,
    /// Marketing costs (Tk).
    pub marketing_costs: f64,
    /// Sponsorship amount (Tk).
    pub sponsorship_amount: f64,
    /// Budget of the previous comparable event (Tk).
    pub last_event_budget: f64,
}

impl Default for RequestDraft {
    fn default() -> Self {
        Self {
            event_type: EventType::TechFest,
            event_scale: EventScale::InterUniversity,
            participants_range: ParticipantsRange::From500To1000,
            event_duration: 3,
            equipment_costs: 15_000.0,
            staff_costs: 35_000.0,
            marketing_costs: 8_000.0,
            sponsorship_amount: 5_000.0,
            last_event_budget: 25_000.0,
        }
    }
}

impl RequestDraft {
    /// Checks every bound and freezes the draft into a request.
    pub fn validate(self) -> Result<PredictionRequest, InputError> {
        let (min_days, max_days) = DURATION_DAYS;
        if !(min_days..=max_days).contains(&self.event_duration) {
            return Err(InputError::OutOfRange {
                field: "event_duration",
                value: f64::from(self.event_duration),
                min: f64::from(min_days),
                max: Some(f64::from(max_days)),
            });
        }
        Ok(PredictionRequest {
            event_type: self.event_type,
            event_scale: self.event_scale,
            participants_range: self.participants_range,
            event_duration: self.event_duration,
            equipment_costs: check_amount(
                "equipment_costs",
                self.equipment_costs,
                Some(EQUIPMENT_COSTS_MAX),
            )?,
            staff_costs: check_amount("staff_costs", self.staff_costs, Some(STAFF_COSTS_MAX))?,
            marketing_costs: check_amount(
                "marketing_costs",
                self.marketing_costs,
                Some(MARKETING_COSTS_MAX),
            )?,
            sponsorship_amount: check_amount("sponsorship_amount", self.sponsorship_amount, None)?,
            last_event_budget: check_amount("last_event_budget", self.last_event_budget, None)?,
        })
    }
}

fn check_amount(field: &'static str, value: f64, max: Option<f64>) -> Result<f64, InputError> {
    if !value.is_finite() {
        return Err(InputError::NotANumber {
            field,
            input: value.to_string(),
        });
    }
    if value < 0.0 || max.is_some_and(|max| value > max) {
        return Err(InputError::OutOfRange {
            field,
            value,
            min: 0.0,
            max,
        });
    }
    Ok(value)
}

/// Complete, validated planning attributes for one prediction attempt.
///
/// Only obtainable through [`RequestDraft::validate`], so every instance satisfies the
/// field bounds. Immutable once built.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PredictionRequest {
    event_type: EventType,
    event_scale: EventScale,
    participants_range: ParticipantsRange,
    event_duration: u8,
    equipment_costs: f64,
    staff_costs: f64,
    marketing_costs: f64,
    sponsorship_amount: f64,
    last_event_budget: f64,
}

impl PredictionRequest {
    /// Kind of event.
    #[must_use]
    pub const fn event_type(&self) -> EventType {
        self.event_type
    }

    /// Reach of the event.
    #[must_use]
    pub const fn event_scale(&self) -> EventScale {
        self.event_scale
    }

    /// Expected headcount bucket.
    #[must_use]
    pub const fn participants_range(&self) -> ParticipantsRange {
        self.participants_range
    }

    /// Duration in days.
    #[must_use]
    pub const fn event_duration(&self) -> u8 {
        self.event_duration
    }

    /// Equipment costs (Tk).
    #[must_use]
    pub const fn equipment_costs(&self) -> f64 {
        self.equipment_costs
    }

    /// Staff costs (Tk).
    #[must_use]
    pub const fn staff_costs(&self) -> f64 {
        self.staff_costs
    }

    /// Marketing costs (Tk).
    #[must_use]
    pub const fn marketing_costs(&self) -> f64 {
        self.marketing_costs
    }

    /// Sponsorship amount (Tk).
    #[must_use]
    pub const fn sponsorship_amount(&self) -> f64 {
        self.sponsorship_amount
    }

    /// Budget of the previous comparable event (Tk).
    #[must_use]
    pub const fn last_event_budget(&self) -> f64 {
        self.last_event_budget
    }

    /// Equipment + staff + marketing.
    #[must_use]
    pub fn base_costs(&self) -> f64 {
        self.equipment_costs + self.staff_costs + self.marketing_costs
    }

    /// Single-row record with the training column names, in [`FEATURE_COLUMNS`] order.
    #[must_use]
    pub fn to_record(&self) -> FeatureRecord {
        let [
            event_type,
            event_scale,
            participants,
            duration,
            equipment,
            staff,
            marketing,
            sponsorship,
            last_budget,
        ] = FEATURE_COLUMNS;
        FeatureRecord::new()
            .with(event_type, FeatureValue::Category(self.event_type.label().into()))
            .with(event_scale, FeatureValue::Category(self.event_scale.label().into()))
            .with(
                participants,
                FeatureValue::Category(self.participants_range.label().into()),
            )
            .with(duration, FeatureValue::Number(f64::from(self.event_duration)))
            .with(equipment, FeatureValue::Number(self.equipment_costs))
            .with(staff, FeatureValue::Number(self.staff_costs))
            .with(marketing, FeatureValue::Number(self.marketing_costs))
            .with(sponsorship, FeatureValue::Number(self.sponsorship_amount))
            .with(last_budget, FeatureValue::Number(self.last_event_budget))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_draft_is_valid() {
        let request = RequestDraft::default().validate().unwrap();
        assert_eq!(request.event_type(), EventType::TechFest);
        assert_eq!(request.event_duration(), 3);
        assert!((request.base_costs() - 58_000.0).abs() < f64::EPSILON);
    }

    #[test]
    fn choices_parse_labels_and_indices() {
        assert_eq!("Seminar".parse::<EventType>().unwrap(), EventType::Seminar);
        assert_eq!(EventScale::parse_choice("4").unwrap(), EventScale::International);
        assert_eq!(
            " >1000 ".parse::<ParticipantsRange>().unwrap(),
            ParticipantsRange::Over1000
        );
        let err = "Concert".parse::<EventType>().unwrap_err();
        assert!(matches!(err, InputError::UnknownOption { field: "event_type", .. }));
        assert!(ParticipantsRange::parse_choice("0").is_err());
        assert!(ParticipantsRange::parse_choice("4").is_err());
    }

    #[test]
    fn labels_match_serde_names() {
        for option in EventType::ALL {
            let encoded = serde_json::to_string(option).unwrap();
            assert_eq!(encoded, format!("\"{}\"", option.label()));
        }
        let decoded: ParticipantsRange = serde_json::from_str("\"<500\"").unwrap();
        assert_eq!(decoded, ParticipantsRange::Under500);
    }

    #[test]
    fn rejects_out_of_bounds_fields() {
        let draft = RequestDraft {
            event_duration: 8,
            ..RequestDraft::default()
        };
        assert!(matches!(
            draft.validate(),
            Err(InputError::OutOfRange { field: "event_duration", .. })
        ));

        let draft = RequestDraft {
            marketing_costs: 200_000.5,
            ..RequestDraft::default()
        };
        assert!(draft.validate().is_err());

        let draft = RequestDraft {
            last_event_budget: -1.0,
            ..RequestDraft::default()
        };
        assert!(draft.validate().is_err());

        let draft = RequestDraft {
            sponsorship_amount: f64::NAN,
            ..RequestDraft::default()
        };
        assert!(matches!(
            draft.validate(),
            Err(InputError::NotANumber { .. })
        ));
    }

    #[test]
    fn open_ended_amounts_have_no_cap() {
        let draft = RequestDraft {
            sponsorship_amount: 1e12,
            last_event_budget: 1e12,
            ..RequestDraft::default()
        };
        assert!(draft.validate().is_ok());
    }

    #[test]
    fn record_uses_training_columns_in_order() {
        let record = RequestDraft::default().validate().unwrap().to_record();
        let names: Vec<&str> = record.column_names().collect();
        assert_eq!(names, FEATURE_COLUMNS);
        assert_eq!(
            record.get("Event_Type"),
            Some(&FeatureValue::Category("Tech Fest".into()))
        );
        assert_eq!(
            record.get("Event_Duration"),
            Some(&FeatureValue::Number(3.0))
        );
    }
}
