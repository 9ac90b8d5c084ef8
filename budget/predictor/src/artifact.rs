//! JSON regression artifact.
//!
//! An artifact bundles the preprocessing the model was trained with (one-hot encoding of
//! categorical columns, optional `log1p` plus standardisation of numeric columns) and the
//! estimator itself (linear or a boosted tree ensemble). Its output is the raw score on the
//! `log1p` target scale; callers apply the inverse in [`crate::transform`].

use std::{fs, path::Path};

use ndarray::{Array1, ArrayView1};
use serde::{Deserialize, Serialize};

use crate::{
    error::PredictionFailure,
    predictor::BudgetModel,
    request::{FeatureRecord, FeatureValue},
};

/// Only artifact layout understood by this crate.
pub const FORMAT_VERSION: u32 = 1;
/// Target transform every artifact must declare. Must match [`crate::transform::inverse_target`].
pub const TARGET_TRANSFORM: &str = "log1p";

/// Transform applied to a numeric column before standardisation.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NumericTransform {
    /// Value used as-is.
    #[default]
    Identity,
    /// `ln(1 + x)`.
    Log1p,
}

impl NumericTransform {
    fn apply(self, value: f64) -> f64 {
        match self {
            Self::Identity => value,
            Self::Log1p => value.ln_1p(),
        }
    }
}

/// Input column declared by the artifact.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum FeatureSpec {
    /// One-hot encoded label column.
    Categorical {
        /// Training column name.
        name: String,
        /// Vocabulary in encoding order.
        categories: Vec<String>,
    },
    /// Standardised numeric column: `(transform(x) - center) / scale`.
    Numeric {
        /// Training column name.
        name: String,
        /// Pre-standardisation transform.
        #[serde(default)]
        transform: NumericTransform,
        /// Subtracted mean.
        #[serde(default)]
        center: f64,
        /// Divisor (standard deviation).
        #[serde(default = "unit")]
        scale: f64,
    },
}

impl FeatureSpec {
    /// Training column name.
    #[must_use]
    pub fn name(&self) -> &str {
        match self {
            Self::Categorical { name, .. } | Self::Numeric { name, .. } => name,
        }
    }

    /// Number of encoded slots this column occupies.
    #[must_use]
    pub fn width(&self) -> usize {
        match self {
            Self::Categorical { categories, .. } => categories.len(),
            Self::Numeric { .. } => 1,
        }
    }
}

const fn unit() -> f64 {
    1.0
}

/// Node of a flat regression tree. Children always come after their parent.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum TreeNode {
    /// Goes `left` when `x[feature] <= threshold`, otherwise `right`.
    Split {
        /// Encoded feature index.
        feature: usize,
        /// Split threshold.
        threshold: f64,
        /// Left child index.
        left: usize,
        /// Right child index.
        right: usize,
    },
    /// Terminal value.
    Leaf {
        /// Leaf contribution.
        leaf: f64,
    },
}

/// Regression tree stored as a node array rooted at index 0.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RegressionTree {
    /// Nodes; index 0 is the root.
    pub nodes: Vec<TreeNode>,
}

impl RegressionTree {
    fn evaluate(&self, features: ArrayView1<'_, f64>) -> f64 {
        let mut idx = 0;
        loop {
            match &self.nodes[idx] {
                TreeNode::Leaf { leaf } => return *leaf,
                TreeNode::Split {
                    feature,
                    threshold,
                    left,
                    right,
                } => {
                    idx = if features[*feature] <= *threshold {
                        *left
                    } else {
                        *right
                    };
                }
            }
        }
    }

    fn validate(&self, tree_idx: usize, width: usize) -> Result<(), String> {
        if self.nodes.is_empty() {
            return Err(format!("tree {tree_idx} has no nodes"));
        }
        for (idx, node) in self.nodes.iter().enumerate() {
            if let TreeNode::Split {
                feature,
                threshold,
                left,
                right,
            } = node
            {
                if *feature >= width {
                    return Err(format!(
                        "tree {tree_idx} node {idx} splits on feature {feature}, encoded width is {width}"
                    ));
                }
                if !threshold.is_finite() {
                    return Err(format!("tree {tree_idx} node {idx} has a non-finite threshold"));
                }
                for child in [*left, *right] {
                    if child <= idx || child >= self.nodes.len() {
                        return Err(format!(
                            "tree {tree_idx} node {idx} points to invalid child {child}"
                        ));
                    }
                }
            }
        }
        Ok(())
    }
}

/// Regression estimator over the encoded feature vector.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Estimator {
    /// `intercept + coefficients · x`.
    Linear {
        /// Bias term.
        intercept: f64,
        /// One weight per encoded slot.
        coefficients: Vec<f64>,
    },
    /// `base_score + learning_rate * Σ tree(x)`.
    TreeEnsemble {
        /// Initial prediction.
        #[serde(default)]
        base_score: f64,
        /// Shrinkage applied to every tree.
        #[serde(default = "unit")]
        learning_rate: f64,
        /// Boosted trees.
        trees: Vec<RegressionTree>,
    },
}

impl Estimator {
    fn score(&self, features: ArrayView1<'_, f64>) -> f64 {
        match self {
            Self::Linear {
                intercept,
                coefficients,
            } => intercept + ArrayView1::from(coefficients.as_slice()).dot(&features),
            Self::TreeEnsemble {
                base_score,
                learning_rate,
                trees,
            } => {
                base_score
                    + learning_rate
                        * trees
                            .iter()
                            .map(|tree| tree.evaluate(features))
                            .sum::<f64>()
            }
        }
    }
}

/// Pre-trained regression artifact plus the preprocessing it was trained with.
///
/// Every instance has passed the structural checks: deserialisation and [`Self::new`] both
/// run them, so scoring never reads past the encoded vector or follows a cyclic tree.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "ArtifactDocument")]
pub struct ModelArtifact {
    format_version: u32,
    name: String,
    target_transform: String,
    features: Vec<FeatureSpec>,
    estimator: Estimator,
}

/// Artifact as written on disk, before validation.
#[derive(Deserialize)]
struct ArtifactDocument {
    format_version: u32,
    name: String,
    target_transform: String,
    features: Vec<FeatureSpec>,
    estimator: Estimator,
}

impl TryFrom<ArtifactDocument> for ModelArtifact {
    type Error = String;

    fn try_from(document: ArtifactDocument) -> Result<Self, Self::Error> {
        let artifact = Self {
            format_version: document.format_version,
            name: document.name,
            target_transform: document.target_transform,
            features: document.features,
            estimator: document.estimator,
        };
        artifact.validate()?;
        Ok(artifact)
    }
}

impl ModelArtifact {
    /// Builds a current-format `log1p` artifact, refusing structurally invalid input.
    pub fn new(
        name: impl Into<String>,
        features: Vec<FeatureSpec>,
        estimator: Estimator,
    ) -> Result<Self, PredictionFailure> {
        Self::try_from(ArtifactDocument {
            format_version: FORMAT_VERSION,
            name: name.into(),
            target_transform: TARGET_TRANSFORM.to_string(),
            features,
            estimator,
        })
        .map_err(PredictionFailure::CorruptArtifact)
    }

    /// Reads and validates an artifact file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, PredictionFailure> {
        let path = path.as_ref();
        let contents =
            fs::read_to_string(path).map_err(|source| PredictionFailure::ArtifactUnavailable {
                path: path.to_path_buf(),
                source,
            })?;
        Self::from_json(&contents).map_err(|err| match err {
            PredictionFailure::CorruptArtifact(reason) => {
                PredictionFailure::CorruptArtifact(format!("{}: {reason}", path.display()))
            }
            other => other,
        })
    }

    /// Parses and validates an artifact from JSON text.
    pub fn from_json(contents: &str) -> Result<Self, PredictionFailure> {
        serde_json::from_str(contents)
            .map_err(|err| PredictionFailure::CorruptArtifact(err.to_string()))
    }

    /// Layout version.
    #[must_use]
    pub const fn format_version(&self) -> u32 {
        self.format_version
    }

    /// Human readable model name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Declared target transform; always [`TARGET_TRANSFORM`].
    #[must_use]
    pub fn target_transform(&self) -> &str {
        &self.target_transform
    }

    /// Input columns in training order.
    #[must_use]
    pub fn features(&self) -> &[FeatureSpec] {
        &self.features
    }

    /// Fitted estimator.
    #[must_use]
    pub const fn estimator(&self) -> &Estimator {
        &self.estimator
    }

    fn validate(&self) -> Result<(), String> {
        if self.format_version != FORMAT_VERSION {
            return Err(format!(
                "unsupported format_version {} (expected {FORMAT_VERSION})",
                self.format_version
            ));
        }
        if self.target_transform != TARGET_TRANSFORM {
            return Err(format!(
                "target_transform {:?} does not match the {TARGET_TRANSFORM:?} inverse applied to scores",
                self.target_transform
            ));
        }
        if self.features.is_empty() {
            return Err("artifact declares no features".into());
        }
        for (idx, spec) in self.features.iter().enumerate() {
            if self.features[..idx]
                .iter()
                .any(|earlier| earlier.name() == spec.name())
            {
                return Err(format!("duplicate feature {}", spec.name()));
            }
            match spec {
                FeatureSpec::Categorical { name, categories } if categories.is_empty() => {
                    return Err(format!("categorical feature {name} has no categories"));
                }
                FeatureSpec::Numeric {
                    name,
                    center,
                    scale,
                    ..
                } if !center.is_finite() || !scale.is_finite() || *scale == 0.0 => {
                    return Err(format!("numeric feature {name} has an unusable center/scale"));
                }
                _ => {}
            }
        }
        let width = self.encoded_width();
        match &self.estimator {
            Estimator::Linear {
                intercept,
                coefficients,
            } => {
                if coefficients.len() != width {
                    return Err(format!(
                        "linear estimator has {} coefficients, encoded width is {width}",
                        coefficients.len()
                    ));
                }
                if !intercept.is_finite() || coefficients.iter().any(|c| !c.is_finite()) {
                    return Err("linear estimator has non-finite weights".into());
                }
            }
            Estimator::TreeEnsemble {
                base_score,
                learning_rate,
                trees,
            } => {
                if !base_score.is_finite() || !learning_rate.is_finite() {
                    return Err("tree ensemble has a non-finite base_score/learning_rate".into());
                }
                for (idx, tree) in trees.iter().enumerate() {
                    tree.validate(idx, width)?;
                }
            }
        }
        Ok(())
    }

    /// Column names in training order.
    #[must_use]
    pub fn feature_names(&self) -> Vec<&str> {
        self.features.iter().map(FeatureSpec::name).collect()
    }

    /// Length of the encoded feature vector.
    #[must_use]
    pub fn encoded_width(&self) -> usize {
        self.features.iter().map(FeatureSpec::width).sum()
    }

    /// Encodes a record, failing fast on any column name, order or kind mismatch.
    pub fn encode(&self, record: &FeatureRecord) -> Result<Array1<f64>, PredictionFailure> {
        let names_match = record.len() == self.features.len()
            && record
                .column_names()
                .zip(self.features.iter())
                .all(|(column, spec)| column == spec.name());
        if !names_match {
            return Err(PredictionFailure::SchemaMismatch {
                expected: self.feature_names().into_iter().map(String::from).collect(),
                found: record.column_names().map(String::from).collect(),
            });
        }

        let mut encoded = Array1::zeros(self.encoded_width());
        let mut offset = 0;
        for ((column, value), spec) in record.iter().zip(self.features.iter()) {
            match (spec, value) {
                (FeatureSpec::Categorical { categories, .. }, FeatureValue::Category(label)) => {
                    let slot = categories
                        .iter()
                        .position(|category| category == label)
                        .ok_or_else(|| PredictionFailure::UnknownCategory {
                            column: column.to_string(),
                            value: label.clone(),
                        })?;
                    encoded[offset + slot] = 1.0;
                }
                (
                    FeatureSpec::Numeric {
                        transform,
                        center,
                        scale,
                        ..
                    },
                    FeatureValue::Number(number),
                ) => {
                    encoded[offset] = (transform.apply(*number) - center) / scale;
                }
                (FeatureSpec::Categorical { .. }, FeatureValue::Number(_)) => {
                    return Err(PredictionFailure::FeatureKind {
                        column: column.to_string(),
                        expected: "categorical",
                    });
                }
                (FeatureSpec::Numeric { .. }, FeatureValue::Category(_)) => {
                    return Err(PredictionFailure::FeatureKind {
                        column: column.to_string(),
                        expected: "numeric",
                    });
                }
            }
            offset += spec.width();
        }
        Ok(encoded)
    }
}

impl BudgetModel for ModelArtifact {
    fn predict(&self, record: &FeatureRecord) -> Result<f64, PredictionFailure> {
        let encoded = self.encode(record)?;
        let raw_score = self.estimator.score(encoded.view());
        if raw_score.is_finite() {
            Ok(raw_score)
        } else {
            Err(PredictionFailure::NonFinite(raw_score))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::request::{RequestDraft, FEATURE_COLUMNS};
    use serde_json::json;
    use tempfile::tempdir;

    fn budget_features() -> serde_json::Value {
        json!([
            {"kind": "categorical", "name": "Event_Type",
             "categories": ["Cultural Fest", "Tech Fest", "Sports Tournament", "Seminar",
                            "Religious Event"]},
            {"kind": "categorical", "name": "Event_Scale",
             "categories": ["Intra-University", "Inter-University", "National", "International"]},
            {"kind": "categorical", "name": "Expected_Participants_Range",
             "categories": ["<500", "500-1000", ">1000"]},
            {"kind": "numeric", "name": "Event_Duration"},
            {"kind": "numeric", "name": "Equipment_Costs"},
            {"kind": "numeric", "name": "Staff_Costs"},
            {"kind": "numeric", "name": "Marketing_Costs"},
            {"kind": "numeric", "name": "Sponsorship_Amount"},
            {"kind": "numeric", "name": "Last_Event_Budget"}
        ])
    }

    fn linear_artifact(coefficients: &[f64], intercept: f64) -> String {
        json!({
            "format_version": 1,
            "name": "test",
            "target_transform": "log1p",
            "features": budget_features(),
            "estimator": {"type": "linear", "intercept": intercept, "coefficients": coefficients}
        })
        .to_string()
    }

    fn default_record() -> FeatureRecord {
        RequestDraft::default().validate().unwrap().to_record()
    }

    #[test]
    fn linear_score_is_dot_product_over_encoding() {
        // 12 one-hot slots then 6 numeric slots.
        let mut coefficients = vec![0.0; 18];
        coefficients[1] = 0.5; // Tech Fest
        coefficients[12] = 0.25; // Event_Duration
        let artifact = ModelArtifact::from_json(&linear_artifact(&coefficients, 2.0)).unwrap();
        assert_eq!(artifact.encoded_width(), 18);
        let raw = artifact.predict(&default_record()).unwrap();
        assert!((raw - (2.0 + 0.5 + 0.25 * 3.0)).abs() < 1e-12);
    }

    #[test]
    fn numeric_columns_are_transformed_and_standardised() {
        let mut features = budget_features();
        features[4] = json!({"kind": "numeric", "name": "Equipment_Costs",
                             "transform": "log1p", "center": 1.0, "scale": 2.0});
        let mut coefficients = vec![0.0; 18];
        coefficients[13] = 1.0;
        let text = json!({
            "format_version": 1, "name": "scaled", "target_transform": "log1p",
            "features": features,
            "estimator": {"type": "linear", "intercept": 0.0, "coefficients": coefficients}
        })
        .to_string();
        let artifact = ModelArtifact::from_json(&text).unwrap();
        let raw = artifact.predict(&default_record()).unwrap();
        let expected = (15_000f64.ln_1p() - 1.0) / 2.0;
        assert!((raw - expected).abs() < 1e-12);
    }

    #[test]
    fn tree_ensemble_follows_splits() {
        let text = json!({
            "format_version": 1, "name": "trees", "target_transform": "log1p",
            "features": budget_features(),
            "estimator": {"type": "tree_ensemble", "base_score": 10.0, "learning_rate": 0.5,
                "trees": [
                    {"nodes": [
                        {"feature": 12, "threshold": 2.5, "left": 1, "right": 2},
                        {"leaf": -1.0},
                        {"leaf": 1.0}
                    ]},
                    {"nodes": [
                        {"feature": 1, "threshold": 0.5, "left": 1, "right": 2},
                        {"leaf": 0.0},
                        {"leaf": 0.4}
                    ]}
                ]}
        })
        .to_string();
        let artifact = ModelArtifact::from_json(&text).unwrap();
        // Duration 3 > 2.5 goes right (+1.0); Tech Fest slot is 1.0 > 0.5 goes right (+0.4).
        let raw = artifact.predict(&default_record()).unwrap();
        assert!((raw - (10.0 + 0.5 * 1.4)).abs() < 1e-12);
    }

    #[test]
    fn rejects_wrong_target_transform() {
        let text = linear_artifact(&[0.0; 18], 1.0).replace("log1p", "identity");
        let err = ModelArtifact::from_json(&text).unwrap_err();
        assert!(matches!(
            err,
            PredictionFailure::CorruptArtifact(reason) if reason.contains("target_transform")
        ));
    }

    #[test]
    fn rejects_coefficient_width_mismatch() {
        let err = ModelArtifact::from_json(&linear_artifact(&[0.1; 17], 1.0)).unwrap_err();
        assert!(matches!(err, PredictionFailure::CorruptArtifact(_)));
    }

    fn single_tree_artifact(nodes: serde_json::Value) -> String {
        json!({
            "format_version": 1, "name": "bad", "target_transform": "log1p",
            "features": budget_features(),
            "estimator": {"type": "tree_ensemble", "trees": [{"nodes": nodes}]}
        })
        .to_string()
    }

    fn corrupt_reason(text: &str) -> String {
        match ModelArtifact::from_json(text) {
            Err(PredictionFailure::CorruptArtifact(reason)) => reason,
            other => panic!("expected a corrupt artifact, got {other:?}"),
        }
    }

    #[test]
    fn rejects_cyclic_trees() {
        let text = single_tree_artifact(json!([
            {"feature": 0, "threshold": 0.5, "left": 0, "right": 1},
            {"leaf": 1.0}
        ]));
        assert!(corrupt_reason(&text).contains("invalid child 0"));
    }

    #[test]
    fn rejects_split_feature_beyond_encoded_width() {
        let text = single_tree_artifact(json!([
            {"feature": 99, "threshold": 0.5, "left": 1, "right": 2},
            {"leaf": -1.0},
            {"leaf": 1.0}
        ]));
        assert!(corrupt_reason(&text).contains("encoded width is 18"));
    }

    #[test]
    fn artifacts_cannot_bypass_validation() {
        let features: Vec<FeatureSpec> = serde_json::from_value(budget_features()).unwrap();
        let short = ModelArtifact::new(
            "short",
            features.clone(),
            Estimator::Linear {
                intercept: 1.0,
                coefficients: vec![0.0; 3],
            },
        );
        let reason = match short {
            Err(PredictionFailure::CorruptArtifact(reason)) => reason,
            other => panic!("expected a corrupt artifact, got {other:?}"),
        };
        assert!(reason.contains("encoded width is 18"));

        let cyclic = ModelArtifact::new(
            "cyclic",
            features.clone(),
            Estimator::TreeEnsemble {
                base_score: 0.0,
                learning_rate: 1.0,
                trees: vec![RegressionTree {
                    nodes: vec![TreeNode::Split {
                        feature: 0,
                        threshold: 0.5,
                        left: 0,
                        right: 0,
                    }],
                }],
            },
        );
        assert!(cyclic.is_err());

        let typed = serde_json::from_str::<ModelArtifact>(&linear_artifact(&[0.0; 3], 1.0));
        assert!(typed.is_err());

        let valid = ModelArtifact::new(
            "valid",
            features,
            Estimator::Linear {
                intercept: 1.0,
                coefficients: vec![0.0; 18],
            },
        )
        .unwrap();
        assert_eq!(valid.target_transform(), TARGET_TRANSFORM);
        assert!((valid.predict(&default_record()).unwrap() - 1.0).abs() < f64::EPSILON);
    }

    #[test]
    fn schema_mismatch_fails_fast() {
        let artifact = ModelArtifact::from_json(&linear_artifact(&[0.0; 18], 1.0)).unwrap();

        let mut reordered = FeatureRecord::new();
        let record = default_record();
        for column in FEATURE_COLUMNS.iter().rev() {
            reordered = reordered.with(*column, record.get(column).unwrap().clone());
        }
        assert!(matches!(
            artifact.predict(&reordered),
            Err(PredictionFailure::SchemaMismatch { .. })
        ));

        let renamed =
            FeatureRecord::new().with("event_type", FeatureValue::Category("Tech Fest".into()));
        assert!(matches!(
            artifact.predict(&renamed),
            Err(PredictionFailure::SchemaMismatch { .. })
        ));
    }

    #[test]
    fn unknown_category_and_kind_mismatch_fail() {
        let artifact = ModelArtifact::from_json(&linear_artifact(&[0.0; 18], 1.0)).unwrap();
        let mut record = FeatureRecord::new();
        for (column, value) in default_record().iter() {
            let value = if column == "Event_Type" {
                FeatureValue::Category("Concert".into())
            } else {
                value.clone()
            };
            record = record.with(column, value);
        }
        assert!(matches!(
            artifact.predict(&record),
            Err(PredictionFailure::UnknownCategory { .. })
        ));

        let mut record = FeatureRecord::new();
        for (column, value) in default_record().iter() {
            let value = if column == "Staff_Costs" {
                FeatureValue::Category("35000".into())
            } else {
                value.clone()
            };
            record = record.with(column, value);
        }
        assert!(matches!(
            artifact.predict(&record),
            Err(PredictionFailure::FeatureKind { expected: "numeric", .. })
        ));
    }

    #[test]
    fn load_reports_missing_and_corrupt_files() {
        let dir = tempdir().unwrap();
        let missing = dir.path().join("absent.json");
        assert!(matches!(
            ModelArtifact::load(&missing),
            Err(PredictionFailure::ArtifactUnavailable { .. })
        ));

        let corrupt = dir.path().join("corrupt.json");
        fs::write(&corrupt, "{ not json").unwrap();
        let err = ModelArtifact::load(&corrupt).unwrap_err();
        assert!(err.to_string().contains("corrupt.json"));
    }

    #[test]
    fn bundled_artifact_is_valid() {
        let path = Path::new(env!("CARGO_MANIFEST_DIR"))
            .join("../../model/event_budget_predictor.json");
        let artifact = ModelArtifact::load(path).unwrap();
        assert_eq!(artifact.feature_names(), FEATURE_COLUMNS);
        let raw = artifact.predict(&default_record()).unwrap();
        assert!(raw.is_finite() && raw > 0.0);
    }
}
