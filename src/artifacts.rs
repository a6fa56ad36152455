//! Loaders and evaluators for the three fitted artifacts: the target encoder,
//! the standard scaler and the boosted-tree classifier.
//!
//! The artifacts are exported to JSON once, outside this service, and are
//! read-only for the life of the process.

use serde::{de::DeserializeOwned, Deserialize};
use std::{
    collections::{HashMap, HashSet},
    fs,
    path::Path,
};

use crate::error::{ArtifactError, PredictError};
use crate::types::{FieldValue, TripRecord};

fn read_json<T: DeserializeOwned>(path: &Path) -> Result<T, ArtifactError> {
    let bytes = fs::read(path).map_err(|source| ArtifactError::Read {
        path: path.to_path_buf(),
        source,
    })?;
    serde_json::from_slice(&bytes).map_err(|source| ArtifactError::Parse {
        path: path.to_path_buf(),
        source,
    })
}

// ---------- Encoder ----------

/// Target encoder: each categorical column maps a category label to a
/// number; numeric columns pass through unchanged.
#[derive(Debug, Clone, Deserialize)]
pub struct Encoder {
    columns: Vec<String>,
    #[serde(default)]
    mappings: HashMap<String, HashMap<String, f64>>,
}

impl Encoder {
    pub fn new(
        columns: Vec<String>,
        mappings: HashMap<String, HashMap<String, f64>>,
    ) -> Result<Self, ArtifactError> {
        let enc = Self { columns, mappings };
        enc.validate()?;
        Ok(enc)
    }

    pub fn load(path: &Path) -> Result<Self, ArtifactError> {
        let enc: Self = read_json(path)?;
        enc.validate()?;
        Ok(enc)
    }

    fn validate(&self) -> Result<(), ArtifactError> {
        if self.columns.is_empty() {
            return Err(ArtifactError::invalid("encoder", "no columns"));
        }
        let mut seen = HashSet::new();
        for col in &self.columns {
            if !TripRecord::FIELD_NAMES.contains(&col.as_str()) {
                return Err(ArtifactError::invalid(
                    "encoder",
                    format!("unknown column {col}"),
                ));
            }
            if !seen.insert(col.as_str()) {
                return Err(ArtifactError::invalid(
                    "encoder",
                    format!("duplicate column {col}"),
                ));
            }
            let categorical = TripRecord::CATEGORICAL.contains(&col.as_str());
            if categorical != self.mappings.contains_key(col) {
                let reason = if categorical {
                    format!("categorical column {col} has no mapping")
                } else {
                    format!("numeric column {col} has a mapping")
                };
                return Err(ArtifactError::invalid("encoder", reason));
            }
        }
        if let Some(extra) = self.mappings.keys().find(|k| !seen.contains(k.as_str())) {
            return Err(ArtifactError::invalid(
                "encoder",
                format!("mapping for unlisted column {extra}"),
            ));
        }
        Ok(())
    }

    pub fn width(&self) -> usize {
        self.columns.len()
    }

    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    pub fn transform(&self, record: &TripRecord) -> Result<Vec<f64>, PredictError> {
        let mut out = Vec::with_capacity(self.columns.len());
        for col in &self.columns {
            let value = record
                .field(col)
                .ok_or_else(|| PredictError::Backend(format!("record has no column {col}")))?;
            let x = match (value, self.mappings.get(col)) {
                (FieldValue::Category(label), Some(map)) => {
                    *map.get(label).ok_or_else(|| PredictError::UnseenCategory {
                        column: col.clone(),
                        value: label.to_string(),
                    })?
                }
                (FieldValue::Number(x), None) => x,
                _ => {
                    return Err(PredictError::Backend(format!(
                        "column {col} kind does not match encoder"
                    )))
                }
            };
            out.push(x);
        }
        Ok(out)
    }
}

// ---------- Scaler ----------

/// Standard scaler: `(x - mean) / scale`, feature by feature.
#[derive(Debug, Clone, Deserialize)]
pub struct Scaler {
    mean: Vec<f64>,
    scale: Vec<f64>,
}

impl Scaler {
    pub fn new(mean: Vec<f64>, scale: Vec<f64>) -> Result<Self, ArtifactError> {
        let s = Self { mean, scale };
        s.validate()?;
        Ok(s)
    }

    pub fn load(path: &Path) -> Result<Self, ArtifactError> {
        let s: Self = read_json(path)?;
        s.validate()?;
        Ok(s)
    }

    fn validate(&self) -> Result<(), ArtifactError> {
        if self.mean.len() != self.scale.len() {
            return Err(ArtifactError::Incompatible {
                left: "scaler mean",
                left_width: self.mean.len(),
                right: "scaler scale",
                right_width: self.scale.len(),
            });
        }
        if self.mean.is_empty() {
            return Err(ArtifactError::invalid("scaler", "no features"));
        }
        if self.mean.iter().chain(&self.scale).any(|v| !v.is_finite()) {
            return Err(ArtifactError::invalid("scaler", "non-finite parameter"));
        }
        Ok(())
    }

    pub fn width(&self) -> usize {
        self.mean.len()
    }

    pub fn transform(&self, x: &[f64]) -> Result<Vec<f64>, PredictError> {
        if x.len() != self.mean.len() {
            return Err(PredictError::ShapeMismatch {
                stage: "scaler",
                expected: self.mean.len(),
                got: x.len(),
            });
        }
        Ok(x.iter()
            .zip(self.mean.iter().zip(&self.scale))
            .map(|(v, (m, s))| {
                // Constant features were fitted with zero spread.
                let s = if *s == 0.0 { 1.0 } else { *s };
                (v - m) / s
            })
            .collect())
    }
}

// ---------- Classifier ----------

/// Anything that maps a scaled feature vector to P(Breakdown).
pub trait Classifier: Send + Sync {
    fn n_features(&self) -> usize;

    fn predict_probability(&self, x: &[f64]) -> Result<f64, PredictError>;
}

#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum Node {
    Split {
        feature: usize,
        threshold: f64,
        left: usize,
        right: usize,
    },
    Leaf {
        leaf: f64,
    },
}

/// One boosted tree, nodes in walk order. Only evaluated inside a validated
/// `TreeEnsemble`, which guarantees a non-empty node list.
#[derive(Debug, Clone, Deserialize)]
pub struct Tree {
    nodes: Vec<Node>,
}

impl Tree {
    pub fn new(nodes: Vec<Node>) -> Self {
        Self { nodes }
    }

    /// Walks from the root; `x < threshold` goes left, a missing feature
    /// goes right.
    pub(crate) fn predict(&self, x: &[f64]) -> f64 {
        let mut idx = 0;
        loop {
            match &self.nodes[idx] {
                Node::Leaf { leaf } => return *leaf,
                Node::Split {
                    feature,
                    threshold,
                    left,
                    right,
                } => {
                    let v = x.get(*feature).copied().unwrap_or(f64::NAN);
                    idx = if v < *threshold { *left } else { *right };
                }
            }
        }
    }
}

/// Gradient-boosted binary classifier: sigmoid of the base margin plus the
/// sum of leaf values.
#[derive(Debug, Clone, Deserialize)]
pub struct TreeEnsemble {
    n_features: usize,
    #[serde(default)]
    base_score: f64,
    trees: Vec<Tree>,
}

impl TreeEnsemble {
    pub fn new(
        n_features: usize,
        base_score: f64,
        trees: Vec<Tree>,
    ) -> Result<Self, ArtifactError> {
        let m = Self {
            n_features,
            base_score,
            trees,
        };
        m.validate()?;
        Ok(m)
    }

    pub fn load(path: &Path) -> Result<Self, ArtifactError> {
        let m: Self = read_json(path)?;
        m.validate()?;
        Ok(m)
    }

    /// Children must come after their parent, so every walk terminates.
    fn validate(&self) -> Result<(), ArtifactError> {
        if self.n_features == 0 {
            return Err(ArtifactError::invalid("classifier", "n_features is 0"));
        }
        for (t, tree) in self.trees.iter().enumerate() {
            if tree.nodes.is_empty() {
                return Err(ArtifactError::invalid("classifier", format!("tree {t} is empty")));
            }
            for (i, node) in tree.nodes.iter().enumerate() {
                if let Node::Split {
                    feature,
                    left,
                    right,
                    ..
                } = node
                {
                    if *feature >= self.n_features {
                        return Err(ArtifactError::invalid(
                            "classifier",
                            format!("tree {t} node {i} uses feature {feature}"),
                        ));
                    }
                    for child in [*left, *right] {
                        if child <= i || child >= tree.nodes.len() {
                            return Err(ArtifactError::invalid(
                                "classifier",
                                format!("tree {t} node {i} has bad child {child}"),
                            ));
                        }
                    }
                }
            }
        }
        Ok(())
    }

    pub fn margin(&self, x: &[f64]) -> f64 {
        self.base_score + self.trees.iter().map(|t| t.predict(x)).sum::<f64>()
    }
}

impl Classifier for TreeEnsemble {
    fn n_features(&self) -> usize {
        self.n_features
    }

    fn predict_probability(&self, x: &[f64]) -> Result<f64, PredictError> {
        if x.len() != self.n_features {
            return Err(PredictError::ShapeMismatch {
                stage: "classifier",
                expected: self.n_features,
                got: x.len(),
            });
        }
        Ok(sigmoid(self.margin(x)))
    }
}

pub fn sigmoid(z: f64) -> f64 {
    1.0 / (1.0 + (-z).exp())
}

/// Picks the classifier backend from the file extension.
pub fn load_classifier(
    path: &Path,
    #[cfg_attr(not(feature = "torch"), allow(unused_variables))] n_features: usize,
) -> Result<Box<dyn Classifier>, ArtifactError> {
    match path.extension().and_then(|e| e.to_str()) {
        Some("json") => Ok(Box::new(TreeEnsemble::load(path)?)),
        #[cfg(feature = "torch")]
        Some("pt") => Ok(Box::new(crate::torch::TorchClassifier::load(path, n_features)?)),
        _ => Err(ArtifactError::UnsupportedFormat(path.to_path_buf())),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::*;

    fn record(route: RouteNumber) -> TripRecord {
        TripRecord::builder()
            .school_year(SchoolYear::Y2023)
            .students(10)
            .run_type(RunType::PreKEi)
            .reason(Reason::FlatTire)
            .borough(Borough::Bronx)
            .hour(16)
            .month(11)
            .day_of_week(4)
            .student_type(StudentType::PreK)
            .bus_company(BusCompany::VanTrans)
            .route(route)
            .notified_parents(true)
            .build()
            .unwrap()
    }

    fn small_encoder() -> Encoder {
        let mut mappings = HashMap::new();
        mappings.insert(
            "Reason".to_string(),
            HashMap::from([("Flat Tire".to_string(), 0.9), ("Other".to_string(), 0.1)]),
        );
        mappings.insert(
            "Route_Number_Clean".to_string(),
            HashMap::from([("K064".to_string(), 0.4)]),
        );
        Encoder::new(
            vec![
                "Reason".into(),
                "Hour".into(),
                "Route_Number_Clean".into(),
                "Contract_Notified_Parents".into(),
            ],
            mappings,
        )
        .unwrap()
    }

    #[test]
    fn encoder_maps_categories_and_passes_numbers() {
        let enc = small_encoder();
        let v = enc.transform(&record(RouteNumber::Catalog("K064"))).unwrap();
        assert_eq!(v, vec![0.9, 16.0, 0.4, 1.0]);
    }

    #[test]
    fn encoder_rejects_unseen_route() {
        let enc = small_encoder();
        let err = enc.transform(&record(RouteNumber::Manual(String::new()))).unwrap_err();
        assert_eq!(
            err,
            PredictError::UnseenCategory {
                column: "Route_Number_Clean".into(),
                value: String::new()
            }
        );
        assert!(err.is_user_recoverable());
    }

    #[test]
    fn encoder_validation() {
        let err = Encoder::new(vec!["Speed".into()], HashMap::new()).unwrap_err();
        assert!(err.to_string().contains("unknown column Speed"));

        let err = Encoder::new(vec!["Borough".into()], HashMap::new()).unwrap_err();
        assert!(err.to_string().contains("has no mapping"));

        let err = Encoder::new(vec!["Hour".into(), "Hour".into()], HashMap::new()).unwrap_err();
        assert!(err.to_string().contains("duplicate"));
    }

    #[test]
    fn scaler_standardizes_and_checks_width() {
        let s = Scaler::new(vec![1.0, 10.0, 5.0], vec![2.0, 5.0, 0.0]).unwrap();
        assert_eq!(s.transform(&[3.0, 0.0, 7.0]).unwrap(), vec![1.0, -2.0, 2.0]);

        let err = s.transform(&[1.0, 2.0]).unwrap_err();
        assert_eq!(
            err,
            PredictError::ShapeMismatch {
                stage: "scaler",
                expected: 3,
                got: 2
            }
        );

        assert!(Scaler::new(vec![0.0], vec![1.0, 1.0]).is_err());
        assert!(Scaler::new(vec![f64::NAN], vec![1.0]).is_err());
    }

    #[test]
    fn tree_ensemble_sums_leaves() {
        let json = r#"{
            "n_features": 2,
            "base_score": 0.0,
            "trees": [
                { "nodes": [
                    { "feature": 0, "threshold": 0.5, "left": 1, "right": 2 },
                    { "leaf": -1.0 },
                    { "leaf": 1.0 }
                ]},
                { "nodes": [ { "leaf": 0.5 } ] }
            ]
        }"#;
        let m: TreeEnsemble = serde_json::from_str(json).unwrap();
        m.validate().unwrap();
        assert!((m.margin(&[0.0, 0.0]) - -0.5).abs() < 1e-12);
        assert!((m.margin(&[0.5, 0.0]) - 1.5).abs() < 1e-12);

        let p = m.predict_probability(&[1.0, 0.0]).unwrap();
        assert!((p - sigmoid(1.5)).abs() < 1e-12);
        assert!(m.predict_probability(&[1.0]).is_err());
    }

    #[test]
    fn tree_validation_rejects_cycles_and_bad_features() {
        let cyclic = Tree::new(vec![Node::Split {
            feature: 0,
            threshold: 0.0,
            left: 0,
            right: 0,
        }]);
        assert!(TreeEnsemble::new(1, 0.0, vec![cyclic]).is_err());

        let wide = Tree::new(vec![
            Node::Split {
                feature: 3,
                threshold: 0.0,
                left: 1,
                right: 2,
            },
            Node::Leaf { leaf: 0.0 },
            Node::Leaf { leaf: 0.0 },
        ]);
        assert!(TreeEnsemble::new(2, 0.0, vec![wide]).is_err());
    }

    #[test]
    fn empty_tree_never_reaches_evaluation() {
        let err = TreeEnsemble::new(1, 0.0, vec![Tree::new(vec![])]).unwrap_err();
        assert!(err.to_string().contains("tree 0 is empty"));

        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("classifier.json");
        std::fs::write(&path, r#"{ "n_features": 1, "trees": [ { "nodes": [] } ] }"#).unwrap();
        let err = match load_classifier(&path, 1) {
            Err(e) => e,
            Ok(_) => panic!("empty tree must be rejected on load"),
        };
        assert!(matches!(err, ArtifactError::Invalid { .. }));
    }

    #[test]
    fn sigmoid_midpoint() {
        assert_eq!(sigmoid(0.0), 0.5);
    }

    #[test]
    fn unknown_classifier_extension() {
        let err = match load_classifier(Path::new("model.onnx"), 16) {
            Err(e) => e,
            Ok(_) => panic!("onnx should be rejected"),
        };
        assert!(matches!(err, ArtifactError::UnsupportedFormat(_)));
    }
}
