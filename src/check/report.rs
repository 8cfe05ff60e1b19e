//! Human readable rendering of change reports

use crate::check::change::{ChangeKind, ChangeReport};
use crate::check::runner::VersionCheck;
use serde::Serialize;
use std::collections::BTreeMap;
use std::fmt;

/// Number of reports per change kind
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ChangeSummary {
    counts: BTreeMap<ChangeKind, usize>,
}

impl ChangeSummary {
    pub fn from_reports<'a, I>(reports: I) -> Self
    where
        I: IntoIterator<Item = &'a ChangeReport>,
    {
        let mut counts = BTreeMap::new();
        for report in reports {
            *counts.entry(report.change_kind).or_insert(0) += 1;
        }
        Self { counts }
    }

    pub fn count(&self, kind: ChangeKind) -> usize {
        self.counts.get(&kind).copied().unwrap_or(0)
    }

    pub fn degradations(&self) -> usize {
        self.count(ChangeKind::Degradation) + self.count(ChangeKind::MaybeDegradation)
    }

    pub fn optimizations(&self) -> usize {
        self.count(ChangeKind::Optimization) + self.count(ChangeKind::MaybeOptimization)
    }

    pub fn total(&self) -> usize {
        self.counts.values().sum()
    }
}

impl fmt::Display for ChangeSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let parts: Vec<String> = ChangeKind::ALL
            .iter()
            .filter(|kind| self.count(**kind) > 0)
            .map(|kind| format!("{} {}", self.count(*kind), kind))
            .collect();
        if parts.is_empty() {
            write!(f, "no changes checked")
        } else {
            write!(f, "{}", parts.join(", "))
        }
    }
}

fn marker(kind: ChangeKind) -> &'static str {
    match kind {
        ChangeKind::Degradation => "❌",
        ChangeKind::MaybeDegradation => "⚠️ ",
        ChangeKind::Optimization => "✅",
        ChangeKind::MaybeOptimization => "➕",
        ChangeKind::NoChange => "➖",
        ChangeKind::Unknown => "❓",
    }
}

/// One line per shown report
///
/// NoChange and Unknown reports are skipped unless `verbose` is set.
pub fn render_reports(reports: &[ChangeReport], verbose: bool) -> String {
    let mut out = String::new();
    for report in reports.iter().filter(|r| r.change_kind.is_shown(verbose)) {
        out.push_str(&format!(
            "  {} {} at {}: {} -> {} ({}",
            marker(report.change_kind),
            report.change_kind,
            report.location,
            report.baseline_value,
            report.target_value,
            report.change_subtype,
        ));
        if let Some(rate) = report.rate {
            out.push_str(&format!(", rate {:.2}", rate));
        }
        if let (Some(kind), Some(confidence)) = (&report.confidence_type, report.confidence) {
            out.push_str(&format!(", {} {:.2}", kind, confidence));
        }
        out.push_str(&format!(") [{}]\n", report.method));
    }
    out
}

impl VersionCheck {
    pub fn summary(&self) -> ChangeSummary {
        ChangeSummary::from_reports(self.reports())
    }

    pub fn to_report_string(&self, verbose: bool) -> String {
        let mut report = String::new();
        report.push_str(&format!("Version {}\n", self.version.short()));

        for check in &self.checks {
            report.push_str(&format!(
                "\n{} (baseline {})\n",
                check.configuration,
                check.baseline_version.short()
            ));
            let lines = render_reports(&check.reports, verbose);
            if lines.is_empty() {
                report.push_str("  no changes detected\n");
            } else {
                report.push_str(&lines);
            }
        }

        if !self.not_comparable.is_empty() {
            report.push_str(&format!(
                "\n⚠️  Not comparable ({}):\n",
                self.not_comparable.len()
            ));
            for skipped in &self.not_comparable {
                report.push_str(&format!(
                    "  {} ({} ancestors inspected)\n",
                    skipped.configuration, skipped.visited
                ));
            }
        }

        report.push_str(&format!("\nSummary: {}\n", self.summary()));
        report
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn report(kind: ChangeKind, location: &str) -> ChangeReport {
        ChangeReport::new("average_amount_threshold", kind, "ratio", location)
            .with_values("1.00ms", "3.00ms")
            .with_rate(3.0)
    }

    #[test]
    fn test_summary_counts() {
        let reports = vec![
            report(ChangeKind::Degradation, "a"),
            report(ChangeKind::MaybeDegradation, "b"),
            report(ChangeKind::NoChange, "c"),
            report(ChangeKind::Optimization, "d"),
        ];
        let summary = ChangeSummary::from_reports(&reports);
        assert_eq!(summary.degradations(), 2);
        assert_eq!(summary.optimizations(), 1);
        assert_eq!(summary.total(), 4);
        assert_eq!(
            summary.to_string(),
            "1 Degradation, 1 Maybe Degradation, 1 No Change, 1 Optimization"
        );
    }

    #[test]
    fn test_empty_summary() {
        assert_eq!(ChangeSummary::default().to_string(), "no changes checked");
    }

    #[test]
    fn test_render_hides_unchanged_unless_verbose() {
        let reports = vec![
            report(ChangeKind::Degradation, "slow"),
            report(ChangeKind::NoChange, "same"),
            report(ChangeKind::Unknown, "zero"),
        ];

        let quiet = render_reports(&reports, false);
        assert!(quiet.contains("slow"));
        assert!(!quiet.contains("same"));
        assert!(!quiet.contains("zero"));
        assert_eq!(quiet.lines().count(), 1);

        let verbose = render_reports(&reports, true);
        assert_eq!(verbose.lines().count(), 3);
    }

    #[test]
    fn test_render_line_contents() {
        let line = render_reports(&[report(ChangeKind::Degradation, "main")], false);
        assert!(line.contains("Degradation at main: 1.00ms -> 3.00ms (ratio, rate 3.00)"));
        assert!(line.ends_with("[average_amount_threshold]\n"));

        let bmoe = ChangeReport::new("best_model_order_equality", ChangeKind::Degradation, "complexity order", "sort")
            .with_values("linear", "quadratic")
            .with_confidence("r_square", 0.92);
        assert!(render_reports(&[bmoe], false).contains("(complexity order, r_square 0.92)"));
    }
}
