//! Module containing the report data model.
//!
//! A report is built once per analyzed package by [`analyze_package`](crate::analyze_package)
//! and never modified afterwards. Its JSON form is a public contract: the keys and their order
//! must not change.

mod report;
mod utils;

pub use self::report::{Generator, Json};
pub use self::utils::FingerPrint;

use crate::static_analysis::certificate::CertificateEntry;
use serde::{Serialize, Serializer};
use std::{fmt, result::Result as StdResult};

/// Verdict of the classifier.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Verdict {
    /// Legitimate banking application.
    Safe,
    /// Fraudulent banking application.
    Fake,
    /// No classifier model was available.
    ModelNotLoaded,
    /// The classifier failed on this package.
    Error(String),
}

impl fmt::Display for Verdict {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Safe => write!(f, "Safe Banking APK"),
            Self::Fake => write!(f, "Fake Banking APK"),
            Self::ModelNotLoaded => write!(f, "Model not loaded"),
            Self::Error(cause) => write!(f, "ML Error: {}", cause),
        }
    }
}

impl Serialize for Verdict {
    fn serialize<S>(&self, serializer: S) -> StdResult<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.collect_str(self)
    }
}

/// Class probabilities of the classifier, rounded to 4 decimal places.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize)]
pub struct Confidence {
    safe: f64,
    fake: f64,
}

impl Confidence {
    /// Creates a new confidence pair.
    pub fn new(safe: f64, fake: f64) -> Self {
        Self { safe, fake }
    }

    /// Probability of the package being a legitimate banking application.
    pub fn safe(&self) -> f64 {
        self.safe
    }

    /// Probability of the package being a fraudulent banking application.
    pub fn fake(&self) -> f64 {
        self.fake
    }
}

/// Analysis report of one package.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AnalysisReport {
    pub(crate) source: String,
    pub(crate) apk_name: String,
    pub(crate) sha256: String,
    pub(crate) size_bytes: u64,
    pub(crate) package_name: String,
    pub(crate) version_name: String,
    pub(crate) version_code: Option<String>,
    pub(crate) permissions: Vec<String>,
    pub(crate) dangerous_permissions: Vec<String>,
    pub(crate) certificates: Vec<CertificateEntry>,
    pub(crate) verdict: Verdict,
    pub(crate) confidence: Confidence,
    pub(crate) risk_score: f64,
}

impl AnalysisReport {
    /// Gets the tag of the front end that requested the analysis.
    pub fn source(&self) -> &str {
        &self.source
    }

    /// Gets the file name of the package.
    pub fn apk_name(&self) -> &str {
        &self.apk_name
    }

    /// Gets the lowercase hexadecimal SHA-256 digest of the package file.
    pub fn sha256(&self) -> &str {
        &self.sha256
    }

    /// Gets the size of the package file in bytes.
    pub fn size_bytes(&self) -> u64 {
        self.size_bytes
    }

    pub fn package_name(&self) -> &str {
        &self.package_name
    }

    pub fn version_name(&self) -> &str {
        &self.version_name
    }

    pub fn version_code(&self) -> Option<&str> {
        self.version_code.as_deref()
    }

    /// Gets the requested permissions, sorted and without duplicates.
    pub fn permissions(&self) -> &[String] {
        &self.permissions
    }

    /// Gets the requested permissions defined by the Android platform.
    pub fn dangerous_permissions(&self) -> &[String] {
        &self.dangerous_permissions
    }

    pub fn certificates(&self) -> &[CertificateEntry] {
        &self.certificates
    }

    pub fn verdict(&self) -> &Verdict {
        &self.verdict
    }

    pub fn confidence(&self) -> Confidence {
        self.confidence
    }

    /// Gets the probability of the predicted class.
    pub fn risk_score(&self) -> f64 {
        self.risk_score
    }
}

/// Result of analyzing one package: either a report or the reason there is none.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum AnalysisOutcome {
    /// The package could be analyzed.
    Report(Box<AnalysisReport>),
    /// The package could not be analyzed.
    Error {
        /// What went wrong.
        error: String,
    },
}

impl AnalysisOutcome {
    /// Creates an error outcome.
    pub fn error<S: Into<String>>(message: S) -> Self {
        Self::Error {
            error: message.into(),
        }
    }

    /// Checks whether the package could not be analyzed.
    pub fn is_error(&self) -> bool {
        matches!(self, Self::Error { .. })
    }

    /// Gets the report, if there is one.
    pub fn report(&self) -> Option<&AnalysisReport> {
        match self {
            Self::Report(report) => Some(report.as_ref()),
            Self::Error { .. } => None,
        }
    }

    /// Gets the error message, if the package could not be analyzed.
    pub fn error_message(&self) -> Option<&str> {
        match self {
            Self::Report(_) => None,
            Self::Error { error } => Some(error),
        }
    }
}

impl From<AnalysisReport> for AnalysisOutcome {
    fn from(report: AnalysisReport) -> Self {
        Self::Report(Box::new(report))
    }
}

#[cfg(test)]
mod tests {
    use super::{AnalysisOutcome, AnalysisReport, Confidence, Verdict};
    use crate::static_analysis::certificate::CertificateEntry;

    fn sample_report() -> AnalysisReport {
        AnalysisReport {
            source: "file".to_owned(),
            apk_name: "bank.apk".to_owned(),
            sha256: "00".repeat(32),
            size_bytes: 1024,
            package_name: "com.example.bank".to_owned(),
            version_name: "1.0".to_owned(),
            version_code: None,
            permissions: vec![
                "android.permission.INTERNET".to_owned(),
                "com.example.bank.C2D".to_owned(),
            ],
            dangerous_permissions: vec!["android.permission.INTERNET".to_owned()],
            certificates: vec![CertificateEntry::Failed {
                error: "Failed to parse cert: bad".to_owned(),
            }],
            verdict: Verdict::ModelNotLoaded,
            confidence: Confidence::default(),
            risk_score: 0.0,
        }
    }

    #[test]
    fn it_verdict_strings() {
        assert_eq!(Verdict::Safe.to_string(), "Safe Banking APK");
        assert_eq!(Verdict::Fake.to_string(), "Fake Banking APK");
        assert_eq!(Verdict::ModelNotLoaded.to_string(), "Model not loaded");
        assert_eq!(
            Verdict::Error("boom".to_owned()).to_string(),
            "ML Error: boom"
        );
        assert_eq!(
            serde_json::to_string(&Verdict::Fake).unwrap(),
            "\"Fake Banking APK\""
        );
    }

    #[test]
    fn it_report_key_order() {
        let json = serde_json::to_string(&AnalysisOutcome::from(sample_report())).unwrap();
        let keys = [
            "\"source\"",
            "\"apk_name\"",
            "\"sha256\"",
            "\"size_bytes\"",
            "\"package_name\"",
            "\"version_name\"",
            "\"version_code\"",
            "\"permissions\"",
            "\"dangerous_permissions\"",
            "\"certificates\"",
            "\"verdict\"",
            "\"confidence\"",
            "\"risk_score\"",
        ];

        let positions: Vec<usize> = keys.iter().map(|k| json.find(k).unwrap()).collect();
        assert!(positions.windows(2).all(|w| w[0] < w[1]), "{}", json);
        assert!(json.contains("\"version_code\":null"));
        assert!(json.contains("\"confidence\":{\"safe\":0.0,\"fake\":0.0}"));
        assert!(json.contains("\"verdict\":\"Model not loaded\""));
    }

    #[test]
    fn it_error_outcome() {
        let outcome = AnalysisOutcome::error("Failed to parse package: not a zip");
        assert!(outcome.is_error());
        assert!(outcome.report().is_none());
        assert_eq!(
            serde_json::to_string(&outcome).unwrap(),
            r#"{"error":"Failed to parse package: not a zip"}"#
        );

        let outcome = AnalysisOutcome::from(sample_report());
        assert!(!outcome.is_error());
        assert_eq!(outcome.error_message(), None);
        assert_eq!(outcome.report().unwrap().apk_name(), "bank.apk");
    }
}
