//! Trained candidate scorers.
//!
//! The feature-scored strategy only applies a scorer; training happens
//! offline. The bundled format is a bag of binary decision trees stored as
//! JSON:
//!
//! ```json
//! {"trees": [{"feature": "population", "threshold": 5000.0,
//!             "left": {"probability": 0.1}, "right": {"probability": 0.8}}]}
//! ```
//!
//! A split sends values `<= threshold` left. Features absent from a vector
//! count as 0.

use std::fs::File;
use std::io::Read;
use std::path::Path;

use flate2::read::GzDecoder;
use serde::{Deserialize, Serialize};
use tracing::info;

use super::features::FeatureVector;
use crate::error::{Error, Result};

/// Probability in `[0, 1]` that a candidate is the correct referent.
pub trait Scorer: Send + Sync {
    fn score(&self, features: &FeatureVector) -> f64;
}

impl<F> Scorer for F
where
    F: Fn(&FeatureVector) -> f64 + Send + Sync,
{
    fn score(&self, features: &FeatureVector) -> f64 {
        self(features)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum TreeNode {
    Split {
        feature: String,
        threshold: f64,
        left: Box<TreeNode>,
        right: Box<TreeNode>,
    },
    Leaf {
        probability: f64,
    },
}

impl TreeNode {
    fn evaluate(&self, features: &FeatureVector) -> f64 {
        let mut node = self;
        loop {
            match node {
                TreeNode::Leaf { probability } => return *probability,
                TreeNode::Split {
                    feature,
                    threshold,
                    left,
                    right,
                } => {
                    node = if features.get(feature) <= *threshold { &**left } else { &**right };
                }
            }
        }
    }

    fn validate(&self) -> Result<()> {
        match self {
            TreeNode::Leaf { probability } => {
                if !(0.0..=1.0).contains(probability) {
                    return Err(Error::InvalidModel(format!(
                        "leaf probability {} outside [0, 1]",
                        probability
                    )));
                }
                Ok(())
            }
            TreeNode::Split {
                feature,
                threshold,
                left,
                right,
            } => {
                if !threshold.is_finite() {
                    return Err(Error::InvalidModel(format!(
                        "split on '{}' has non-finite threshold",
                        feature
                    )));
                }
                left.validate()?;
                right.validate()
            }
        }
    }
}

/// Averaged decision trees.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TreeEnsemble {
    trees: Vec<TreeNode>,
}

impl TreeEnsemble {
    pub fn new(trees: Vec<TreeNode>) -> Result<Self> {
        let ensemble = Self { trees };
        ensemble.validate()?;
        Ok(ensemble)
    }

    pub fn from_json(json: &str) -> Result<Self> {
        let ensemble: TreeEnsemble = serde_json::from_str(json)?;
        ensemble.validate()?;
        Ok(ensemble)
    }

    /// Load a model file; `.gz` files are decompressed on the fly.
    pub fn load(path: &Path) -> Result<Self> {
        info!("Loading scorer model from {}", path.display());
        let file = File::open(path)?;
        let reader: Box<dyn Read> = if path.extension().map_or(false, |e| e == "gz") {
            Box::new(GzDecoder::new(file))
        } else {
            Box::new(file)
        };
        let ensemble: TreeEnsemble = serde_json::from_reader(reader).map_err(|e| Error::ModelLoad {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })?;
        ensemble.validate()?;
        info!("Loaded {} trees", ensemble.trees.len());
        Ok(ensemble)
    }

    pub fn len(&self) -> usize {
        self.trees.len()
    }

    pub fn is_empty(&self) -> bool {
        self.trees.is_empty()
    }

    fn validate(&self) -> Result<()> {
        if self.trees.is_empty() {
            return Err(Error::InvalidModel("ensemble has no trees".to_string()));
        }
        self.trees.iter().try_for_each(TreeNode::validate)
    }
}

impl Scorer for TreeEnsemble {
    fn score(&self, features: &FeatureVector) -> f64 {
        let sum: f64 = self.trees.iter().map(|t| t.evaluate(features)).sum();
        sum / self.trees.len() as f64
    }
}
