//! Classifier adapter.
//!
//! The model is loaded once when the process starts and then shared read-only between all the
//! analyses. A model that cannot be loaded is not fatal: the reports are still produced, with a
//! "Model not loaded" verdict.

pub mod forest;

pub use self::forest::RandomForest;

use crate::{
    results::{Confidence, Verdict},
    static_analysis::features::FeatureVector,
};
use anyhow::{bail, Result};
use log::{debug, info, warn};
use std::{path::Path, sync::Arc};

/// Class label of legitimate banking applications.
pub const SAFE_CLASS: usize = 0;
/// Class label of fraudulent banking applications.
pub const FAKE_CLASS: usize = 1;

/// Binary classifier over feature vectors.
pub trait Classifier: Send + Sync {
    /// Gets the probability of each class, `[safe, fake]`.
    fn predict_proba(&self, features: &FeatureVector) -> Result<[f64; 2]>;

    /// Gets the predicted class label. Ties go to the lower label.
    fn predict(&self, features: &FeatureVector) -> Result<usize> {
        let probabilities = self.predict_proba(features)?;
        Ok(if probabilities[FAKE_CLASS] > probabilities[SAFE_CLASS] {
            FAKE_CLASS
        } else {
            SAFE_CLASS
        })
    }
}

/// Loads the classifier model at the given path.
///
/// Returns `None` and logs a warning if the model cannot be used.
pub fn load<P: AsRef<Path>>(path: P) -> Option<Arc<dyn Classifier>> {
    let path = path.as_ref();
    match RandomForest::from_file(path) {
        Ok(forest) => {
            info!(
                "Loaded classifier model {} ({} trees)",
                path.display(),
                forest.tree_count()
            );
            Some(Arc::new(forest))
        }
        Err(e) => {
            warn!("Classifier model not loaded: {:#}", e);
            None
        }
    }
}

/// Verdict, confidence and risk score derived from a classifier run.
#[derive(Debug, Clone, PartialEq)]
pub struct Assessment {
    verdict: Verdict,
    confidence: Confidence,
    risk_score: f64,
}

impl Assessment {
    fn degraded(verdict: Verdict) -> Self {
        Self {
            verdict,
            confidence: Confidence::default(),
            risk_score: 0.0,
        }
    }

    pub fn verdict(&self) -> &Verdict {
        &self.verdict
    }

    pub fn confidence(&self) -> Confidence {
        self.confidence
    }

    pub fn risk_score(&self) -> f64 {
        self.risk_score
    }

    pub(crate) fn into_parts(self) -> (Verdict, Confidence, f64) {
        (self.verdict, self.confidence, self.risk_score)
    }
}

/// Runs the classifier over the feature vector.
///
/// Never fails: a missing model or a classifier error is reported in the verdict, with all
/// the scores set to zero.
pub fn assess(classifier: Option<&dyn Classifier>, features: &FeatureVector) -> Assessment {
    let classifier = match classifier {
        Some(classifier) => classifier,
        None => return Assessment::degraded(Verdict::ModelNotLoaded),
    };

    match classify(classifier, features) {
        Ok(assessment) => {
            debug!(
                "Classifier verdict: {} (risk {})",
                assessment.verdict, assessment.risk_score
            );
            assessment
        }
        Err(e) => {
            warn!("The classifier failed: {:#}", e);
            Assessment::degraded(Verdict::Error(format!("{:#}", e)))
        }
    }
}

fn classify(classifier: &dyn Classifier, features: &FeatureVector) -> Result<Assessment> {
    let probabilities = classifier.predict_proba(features)?;
    let label = classifier.predict(features)?;
    let verdict = match label {
        SAFE_CLASS => Verdict::Safe,
        FAKE_CLASS => Verdict::Fake,
        other => bail!("unexpected class label {}", other),
    };
    if probabilities.iter().any(|p| !p.is_finite()) {
        bail!("invalid class probabilities {:?}", probabilities);
    }

    let safe = round4(probabilities[SAFE_CLASS]);
    let fake = round4(probabilities[FAKE_CLASS]);
    Ok(Assessment {
        verdict,
        confidence: Confidence::new(safe, fake),
        risk_score: safe.max(fake),
    })
}

fn round4(value: f64) -> f64 {
    (value * 10_000.0).round() / 10_000.0
}
