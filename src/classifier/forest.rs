//! Random forest classifier persisted as JSON.
//!
//! Trees are walked the way scikit-learn does: at a split node the left child is taken when the
//! feature value is lower or equal to the threshold. Leaf weights are normalized to
//! probabilities and the forest probability is the mean over all of its trees.

use super::Classifier;
use crate::{
    error::ErrorKind,
    static_analysis::features::{FeatureVector, FEATURE_COUNT, SCHEMA_VERSION},
};
use anyhow::{bail, Context, Result};
use serde::Deserialize;
use std::{fs, path::Path};

/// Persisted layout of the forest.
#[derive(Debug, Deserialize)]
struct ForestFile {
    schema_version: u32,
    n_features: usize,
    classes: Vec<i64>,
    trees: Vec<TreeFile>,
}

#[derive(Debug, Deserialize)]
struct TreeFile {
    nodes: Vec<NodeFile>,
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum NodeFile {
    Split {
        feature: usize,
        threshold: f64,
        left: usize,
        right: usize,
    },
    Leaf {
        value: Vec<f64>,
    },
}

#[derive(Debug, Clone, PartialEq)]
enum Node {
    Split {
        feature: usize,
        threshold: f64,
        left: usize,
        right: usize,
    },
    Leaf([f64; 2]),
}

/// Validated binary random forest.
#[derive(Debug, Clone, PartialEq)]
pub struct RandomForest {
    n_features: usize,
    trees: Vec<Vec<Node>>,
}

impl RandomForest {
    /// Loads the forest from a JSON model file.
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let json = fs::read_to_string(path).map_err(|e| {
            ErrorKind::model_unavailable(format!("could not read {}: {}", path.display(), e))
        })?;
        Self::from_json_str(&json).with_context(|| format!("invalid model {}", path.display()))
    }

    /// Loads the forest from its JSON representation.
    pub fn from_json_str(json: &str) -> Result<Self> {
        let file: ForestFile = serde_json::from_str(json)
            .map_err(|e| ErrorKind::model_unavailable(format!("malformed model: {}", e)))?;

        if file.schema_version != SCHEMA_VERSION {
            bail!(ErrorKind::model_unavailable(format!(
                "model was trained for feature schema {}, but schema {} is in use",
                file.schema_version, SCHEMA_VERSION
            )));
        }
        if file.n_features != FEATURE_COUNT {
            bail!(ErrorKind::model_unavailable(format!(
                "model expects {} features, but vectors have {}",
                file.n_features, FEATURE_COUNT
            )));
        }
        if file.classes != [0, 1] {
            bail!(ErrorKind::model_unavailable(format!(
                "model classes must be [0, 1], found {:?}",
                file.classes
            )));
        }
        if file.trees.is_empty() {
            bail!(ErrorKind::model_unavailable("model has no trees"));
        }

        let n_features = file.n_features;
        let trees = file
            .trees
            .into_iter()
            .enumerate()
            .map(|(i, tree)| {
                validate_tree(tree, n_features).map_err(|message| {
                    ErrorKind::model_unavailable(format!("tree {}: {}", i, message))
                })
            })
            .collect::<Result<Vec<_>, _>>()?;

        Ok(Self { n_features, trees })
    }

    /// Gets the number of trees of the forest.
    pub fn tree_count(&self) -> usize {
        self.trees.len()
    }
}

fn validate_tree(tree: TreeFile, n_features: usize) -> Result<Vec<Node>, String> {
    let len = tree.nodes.len();
    if len == 0 {
        return Err("tree has no nodes".to_owned());
    }

    tree.nodes
        .into_iter()
        .enumerate()
        .map(|(i, node)| match node {
            NodeFile::Split {
                feature,
                threshold,
                left,
                right,
            } => {
                if feature >= n_features {
                    return Err(format!("node {} splits on unknown feature {}", i, feature));
                }
                if threshold.is_nan() {
                    return Err(format!("node {} has an invalid threshold", i));
                }
                // Children must point forward so that every path ends in a leaf.
                for child in &[left, right] {
                    if *child <= i || *child >= len {
                        return Err(format!("node {} has invalid child {}", i, child));
                    }
                }
                Ok(Node::Split {
                    feature,
                    threshold,
                    left,
                    right,
                })
            }
            NodeFile::Leaf { value } => {
                if value.len() != 2 {
                    return Err(format!("leaf {} has {} weights", i, value.len()));
                }
                if value.iter().any(|w| !w.is_finite() || *w < 0.0) {
                    return Err(format!("leaf {} has invalid weights", i));
                }
                let total = value[0] + value[1];
                if total <= 0.0 {
                    return Err(format!("leaf {} has no weight", i));
                }
                Ok(Node::Leaf([value[0] / total, value[1] / total]))
            }
        })
        .collect()
}

fn walk(nodes: &[Node], features: &[u8]) -> Result<[f64; 2]> {
    let mut index = 0;
    loop {
        match nodes.get(index).context("tree walk left the tree")? {
            Node::Split {
                feature,
                threshold,
                left,
                right,
            } => {
                let value = f64::from(*features.get(*feature).context("feature out of range")?);
                index = if value <= *threshold { *left } else { *right };
            }
            Node::Leaf(probabilities) => return Ok(*probabilities),
        }
    }
}

impl Classifier for RandomForest {
    fn predict_proba(&self, features: &FeatureVector) -> Result<[f64; 2]> {
        if features.len() != self.n_features {
            bail!(
                "X has {} features, but the model expects {} features as input",
                features.len(),
                self.n_features
            );
        }

        let mut sum = [0.0, 0.0];
        for tree in &self.trees {
            let probabilities = walk(tree, features.as_slice())?;
            sum[0] += probabilities[0];
            sum[1] += probabilities[1];
        }
        let count = self.trees.len() as f64;
        Ok([sum[0] / count, sum[1] / count])
    }
}
