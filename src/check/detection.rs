// Model curve detection methods
//
// Integral comparison weighs the areas under the best models of both sides.
// Fast check and linear regression sample both best models along the x range
// they share and classify the shape of the target minus baseline difference.

use crate::check::change::{ChangeKind, ChangeReport};
use crate::check::config::ConfigError;
use crate::check::methods::{best_model, invalid, unknown_param, DegradationMethod, MethodParams};
use crate::fitting::{fit, fit_all, select_best, FitFailure, Model, ModelFamily, Selection};
use crate::profile::{Observation, Profile};

/// Points sampled from each model curve
pub const CURVE_SAMPLES: usize = 1000;

/// Coefficients within this fraction of the baseline's count as unchanged
const COEFFICIENT_TOLERANCE: f64 = 0.05;

const DEFAULT_CHANGE_THRESHOLD: f64 = 0.25;

/// Best models of both sides with their family names filled in
fn best_models(
    report: ChangeReport,
    baseline: &Profile,
    target: &Profile,
    uid: &str,
) -> Result<(Model, Model, ChangeReport), ChangeReport> {
    match (best_model(baseline, uid), best_model(target, uid)) {
        (Selection::Best(base), Selection::Best(targ)) => {
            let report = report.with_values(base.family.name(), targ.family.name());
            Ok((base, targ, report))
        }
        (base, targ) => {
            tracing::warn!("No model could be fitted for uid '{}'", uid);
            let name = |s: &Selection| s.family().map_or("unknown", |f| f.name());
            Err(report.with_values(name(&base), name(&targ)))
        }
    }
}

fn confidence(base: &Model, targ: &Model) -> f64 {
    base.r_square.min(targ.r_square).clamp(0.0, 1.0)
}

/// Overlap of the x ranges both models were fitted on
fn shared_interval(base: &Model, targ: &Model) -> Option<(f64, f64)> {
    let start = base.x_start.max(targ.x_start);
    let end = base.x_end.min(targ.x_end);
    (start < end).then_some((start, end))
}

/// Relative change up to `no_change` is none, up to `change` is uncertain
fn classify(diff: f64, no_change: f64, change: f64) -> ChangeKind {
    let magnitude = diff.abs();
    if magnitude <= no_change {
        ChangeKind::NoChange
    } else if magnitude <= change {
        if diff < 0.0 {
            ChangeKind::MaybeOptimization
        } else {
            ChangeKind::MaybeDegradation
        }
    } else if diff < 0.0 {
        ChangeKind::Optimization
    } else {
        ChangeKind::Degradation
    }
}

/// Compares the areas under the best models over their shared x range
#[derive(Debug, Clone, PartialEq)]
pub struct IntegralComparison {
    /// Relative area change up to which nothing changed
    pub no_change_threshold: f64,
    /// Relative area change above which the change is certain
    pub change_threshold: f64,
}

impl IntegralComparison {
    pub const NAME: &'static str = "integral_comparison";
    pub const ALIAS: &'static str = "int";
    pub const DEFAULT_NO_CHANGE_THRESHOLD: f64 = 0.10;
    pub const DEFAULT_CHANGE_THRESHOLD: f64 = 0.25;

    pub fn from_params(params: &MethodParams) -> Result<Self, ConfigError> {
        let mut method = Self::default();
        for (name, &value) in params {
            match name.as_str() {
                "no_change_threshold" => method.no_change_threshold = value,
                "change_threshold" => method.change_threshold = value,
                _ => return Err(unknown_param(Self::NAME, name)),
            }
        }
        method.validate()?;
        Ok(method)
    }

    /// `0 <= no_change_threshold < change_threshold`
    pub fn validate(&self) -> Result<(), ConfigError> {
        if !(self.no_change_threshold >= 0.0 && self.no_change_threshold.is_finite()) {
            return Err(invalid(Self::NAME, "no_change_threshold", "must be non-negative"));
        }
        if !(self.change_threshold > self.no_change_threshold && self.change_threshold.is_finite()) {
            return Err(invalid(
                Self::NAME,
                "change_threshold",
                "must be greater than no_change_threshold",
            ));
        }
        Ok(())
    }
}

impl Default for IntegralComparison {
    fn default() -> Self {
        Self {
            no_change_threshold: Self::DEFAULT_NO_CHANGE_THRESHOLD,
            change_threshold: Self::DEFAULT_CHANGE_THRESHOLD,
        }
    }
}

impl DegradationMethod for IntegralComparison {
    fn name(&self) -> &'static str {
        Self::NAME
    }

    fn compare(&self, baseline: &Profile, target: &Profile, uid: &str) -> ChangeReport {
        let report = ChangeReport::new(Self::NAME, ChangeKind::Unknown, "integral", uid);
        let (base, targ, report) = match best_models(report, baseline, target, uid) {
            Ok(pair) => pair,
            Err(report) => return report,
        };

        let Some((start, end)) = shared_interval(&base, &targ) else {
            tracing::warn!("Models of uid '{}' share no x range", uid);
            return report;
        };

        let base_area = base.integral(start, end);
        let targ_area = targ.integral(start, end);
        if base_area == 0.0 || !base_area.is_finite() || !targ_area.is_finite() {
            tracing::warn!("Model areas of uid '{}' cannot be compared", uid);
            return report;
        }
        tracing::trace!("Areas of '{}' on [{}, {}]: {} -> {}", uid, start, end, base_area, targ_area);

        let rel_error = (targ_area - base_area) / base_area.abs();
        ChangeReport {
            change_kind: classify(rel_error, self.no_change_threshold, self.change_threshold),
            ..report
        }
        .with_confidence("r_square", confidence(&base, &targ))
        .with_rate(rel_error)
    }
}

/// Target minus baseline, sampled along the shared x range of the best models
#[derive(Debug, Clone)]
struct CurveDifference {
    base: Model,
    targ: Model,
    error: Vec<Observation>,
    /// Sum of the sampled differences
    total: f64,
    /// Mean difference relative to the baseline curve
    relative: f64,
}

impl CurveDifference {
    fn sample(base: Model, targ: Model) -> Option<Self> {
        let (start, end) = shared_interval(&base, &targ)?;
        let step = (end - start) / (CURVE_SAMPLES - 1) as f64;

        let mut error = Vec::with_capacity(CURVE_SAMPLES);
        let mut relative: Vec<f32> = Vec::with_capacity(CURVE_SAMPLES);
        for i in 0..CURVE_SAMPLES {
            let x = start + step * i as f64;
            let base_y = base.evaluate(x);
            let diff = targ.evaluate(x) - base_y;
            if !diff.is_finite() {
                continue;
            }
            error.push(Observation::new(x, diff));
            let ratio = (diff / base_y.abs()) as f32;
            if ratio.is_finite() {
                relative.push(ratio);
            }
        }
        if error.is_empty() {
            return None;
        }

        let diffs: Vec<f32> = error.iter().map(|o| o.y as f32).collect();
        let total = f64::from(trueno::Vector::from_slice(&diffs).sum().ok()?);
        let relative = if relative.is_empty() {
            0.0
        } else {
            f64::from(trueno::Vector::from_slice(&relative).mean().ok()?)
        };

        Some(Self {
            base,
            targ,
            error,
            total,
            relative,
        })
    }

    /// Same family with every coefficient within tolerance of the baseline's
    fn is_unchanged(&self) -> bool {
        self.base.family == self.targ.family
            && self
                .base
                .coefficients
                .iter()
                .zip(&self.targ.coefficients)
                .all(|(b, t)| (t - b).abs() <= COEFFICIENT_TOLERANCE * b.abs())
    }

    fn classify(&self, change_threshold: f64) -> ChangeKind {
        if self.is_unchanged() {
            ChangeKind::NoChange
        } else if self.total > 0.0 {
            if self.relative > change_threshold {
                ChangeKind::Degradation
            } else {
                ChangeKind::MaybeDegradation
            }
        } else if self.relative < -change_threshold {
            ChangeKind::Optimization
        } else {
            ChangeKind::MaybeOptimization
        }
    }

    /// Family that best explains the difference
    fn best_shape(&self) -> &'static str {
        select_best(&fit_all(&self.error))
            .family()
            .map_or("unknown", |f| f.name())
    }

    /// Constant, quadratic or linear trend of the difference
    ///
    /// Falls back to the best fitting family when none of them is clear.
    fn regression_shape(&self) -> &'static str {
        let (x_start, x_end) = (self.error[0].x, self.error[self.error.len() - 1].x);
        let max_error = self.error.iter().fold(0.0f64, |m, o| m.max(o.y.abs()));

        let linear = fit(&self.error, ModelFamily::Linear);
        match &linear {
            Err(FitFailure::FlatData { .. }) => return ModelFamily::Constant.name(),
            Ok(model)
                if (model.coefficients[1] * (x_end - x_start)).abs()
                    <= COEFFICIENT_TOLERANCE * max_error =>
            {
                return ModelFamily::Constant.name()
            }
            _ => {}
        }

        let linear_r_square = linear.map_or(f64::NEG_INFINITY, |m| m.r_square);
        if let Ok(quadratic) = fit(&self.error, ModelFamily::Quadratic) {
            if quadratic.r_square > 0.90 && quadratic.r_square > linear_r_square {
                return ModelFamily::Quadratic.name();
            }
        }
        if linear_r_square > 0.95 {
            return ModelFamily::Linear.name();
        }
        self.best_shape()
    }
}

fn change_threshold_param(method: &'static str, params: &MethodParams) -> Result<f64, ConfigError> {
    let mut threshold = DEFAULT_CHANGE_THRESHOLD;
    for (name, &value) in params {
        match name.as_str() {
            "change_threshold" => threshold = value,
            _ => return Err(unknown_param(method, name)),
        }
    }
    if !(threshold > 0.0 && threshold.is_finite()) {
        return Err(invalid(method, "change_threshold", "must be positive"));
    }
    Ok(threshold)
}

fn compare_curves(
    method: &'static str,
    change_threshold: f64,
    shape: fn(&CurveDifference) -> &'static str,
    baseline: &Profile,
    target: &Profile,
    uid: &str,
) -> ChangeReport {
    let report = ChangeReport::new(method, ChangeKind::Unknown, "curve difference", uid);
    let (base, targ, report) = match best_models(report, baseline, target, uid) {
        Ok(pair) => pair,
        Err(report) => return report,
    };
    let confidence = confidence(&base, &targ);

    let Some(difference) = CurveDifference::sample(base, targ) else {
        tracing::warn!("Model curves of uid '{}' share no x range", uid);
        return report;
    };

    let kind = difference.classify(change_threshold);
    let change_subtype = if kind == ChangeKind::NoChange {
        report.change_subtype.clone()
    } else {
        format!("{} difference", shape(&difference))
    };

    ChangeReport {
        change_kind: kind,
        change_subtype,
        ..report
    }
    .with_confidence("r_square", confidence)
    .with_rate(difference.relative)
}

/// Classifies the difference of the best models by its best fitting family
#[derive(Debug, Clone, PartialEq)]
pub struct FastCheck {
    /// Mean relative difference above which the change is certain
    pub change_threshold: f64,
}

impl FastCheck {
    pub const NAME: &'static str = "fast_check";
    pub const ALIAS: &'static str = "fast";

    pub fn from_params(params: &MethodParams) -> Result<Self, ConfigError> {
        Ok(Self {
            change_threshold: change_threshold_param(Self::NAME, params)?,
        })
    }
}

impl Default for FastCheck {
    fn default() -> Self {
        Self {
            change_threshold: DEFAULT_CHANGE_THRESHOLD,
        }
    }
}

impl DegradationMethod for FastCheck {
    fn name(&self) -> &'static str {
        Self::NAME
    }

    fn compare(&self, baseline: &Profile, target: &Profile, uid: &str) -> ChangeReport {
        compare_curves(
            Self::NAME,
            self.change_threshold,
            CurveDifference::best_shape,
            baseline,
            target,
            uid,
        )
    }
}

/// Classifies the difference of the best models by its linear trend
#[derive(Debug, Clone, PartialEq)]
pub struct LinearRegression {
    /// Mean relative difference above which the change is certain
    pub change_threshold: f64,
}

impl LinearRegression {
    pub const NAME: &'static str = "linear_regression";
    pub const ALIAS: &'static str = "lreg";

    pub fn from_params(params: &MethodParams) -> Result<Self, ConfigError> {
        Ok(Self {
            change_threshold: change_threshold_param(Self::NAME, params)?,
        })
    }
}

impl Default for LinearRegression {
    fn default() -> Self {
        Self {
            change_threshold: DEFAULT_CHANGE_THRESHOLD,
        }
    }
}

impl DegradationMethod for LinearRegression {
    fn name(&self) -> &'static str {
        Self::NAME
    }

    fn compare(&self, baseline: &Profile, target: &Profile, uid: &str) -> ChangeReport {
        compare_curves(
            Self::NAME,
            self.change_threshold,
            CurveDifference::regression_shape,
            baseline,
            target,
            uid,
        )
    }
}
