use serde::{Deserialize, Serialize};
use std::fmt;

/// Classified performance change of one uid
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum ChangeKind {
    NoChange,
    Degradation,
    Optimization,
    MaybeDegradation,
    MaybeOptimization,
    /// The method could not make a determination
    Unknown,
}

impl ChangeKind {
    pub const ALL: [ChangeKind; 6] = [
        ChangeKind::Degradation,
        ChangeKind::MaybeDegradation,
        ChangeKind::NoChange,
        ChangeKind::Unknown,
        ChangeKind::MaybeOptimization,
        ChangeKind::Optimization,
    ];

    pub fn label(self) -> &'static str {
        match self {
            ChangeKind::NoChange => "No Change",
            ChangeKind::Degradation => "Degradation",
            ChangeKind::Optimization => "Optimization",
            ChangeKind::MaybeDegradation => "Maybe Degradation",
            ChangeKind::MaybeOptimization => "Maybe Optimization",
            ChangeKind::Unknown => "Unknown",
        }
    }

    pub fn is_degradation(self) -> bool {
        matches!(self, ChangeKind::Degradation | ChangeKind::MaybeDegradation)
    }

    pub fn is_optimization(self) -> bool {
        matches!(self, ChangeKind::Optimization | ChangeKind::MaybeOptimization)
    }

    /// NoChange and Unknown are only shown at increased verbosity
    pub fn is_shown(self, verbose: bool) -> bool {
        verbose || !matches!(self, ChangeKind::NoChange | ChangeKind::Unknown)
    }
}

impl fmt::Display for ChangeKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Output of one degradation method for one uid of a (baseline, target) pair
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChangeReport {
    /// Method that produced the report
    pub method: String,
    pub change_kind: ChangeKind,
    /// What kind of change was measured, e.g. "complexity order" or "ratio"
    pub change_subtype: String,
    /// Uid of the resource group
    pub location: String,
    pub baseline_value: String,
    pub target_value: String,
    /// Absent for deterministic threshold methods
    #[serde(skip_serializing_if = "Option::is_none")]
    pub confidence: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub confidence_type: Option<String>,
    /// Target to baseline ratio, for ratio-based methods
    #[serde(skip_serializing_if = "Option::is_none")]
    pub rate: Option<f64>,
}

impl ChangeReport {
    pub fn new(
        method: impl Into<String>,
        change_kind: ChangeKind,
        change_subtype: impl Into<String>,
        location: impl Into<String>,
    ) -> Self {
        Self {
            method: method.into(),
            change_kind,
            change_subtype: change_subtype.into(),
            location: location.into(),
            baseline_value: String::new(),
            target_value: String::new(),
            confidence: None,
            confidence_type: None,
            rate: None,
        }
    }

    pub fn with_values(mut self, baseline: impl Into<String>, target: impl Into<String>) -> Self {
        self.baseline_value = baseline.into();
        self.target_value = target.into();
        self
    }

    pub fn with_confidence(mut self, confidence_type: impl Into<String>, rate: f64) -> Self {
        self.confidence_type = Some(confidence_type.into());
        self.confidence = Some(rate);
        self
    }

    pub fn with_rate(mut self, rate: f64) -> Self {
        self.rate = Some(rate);
        self
    }
}
