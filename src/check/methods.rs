// Degradation methods
//
// Each method compares one uid of a (baseline, target) profile pair and
// produces a ChangeReport. Methods are created from the MethodRegistry by
// name or alias, with their numeric parameters validated at construction.

use crate::check::change::{ChangeKind, ChangeReport};
use crate::check::config::ConfigError;
use crate::check::detection::{FastCheck, IntegralComparison, LinearRegression};
use crate::check::strategy::{self, ApplyMode, StrategyRule};
use crate::fitting::{fit_all, select_best_of, Model, Selection};
use crate::profile::Profile;
use std::collections::BTreeMap;
use std::fmt;

/// Named numeric parameters of a strategy rule
pub type MethodParams = BTreeMap<String, f64>;

/// A comparison of one uid between a baseline and a target profile
pub trait DegradationMethod: Send + Sync + fmt::Debug {
    /// Canonical method name
    fn name(&self) -> &'static str;

    fn compare(&self, baseline: &Profile, target: &Profile, uid: &str) -> ChangeReport;
}

/// Compares the complexity class of the best fitting model on each side
#[derive(Debug, Clone, PartialEq)]
pub struct BestModelOrder {
    /// Detected changes below this confidence are reported as "maybe"
    pub confidence_threshold: f64,
}

impl BestModelOrder {
    pub const NAME: &'static str = "best_model_order_equality";
    pub const ALIAS: &'static str = "bmoe";
    pub const DEFAULT_CONFIDENCE_THRESHOLD: f64 = 0.9;

    pub fn from_params(params: &MethodParams) -> Result<Self, ConfigError> {
        let mut method = Self::default();
        for (name, &value) in params {
            match name.as_str() {
                "confidence_threshold" => {
                    if !(0.0..=1.0).contains(&value) {
                        return Err(invalid(Self::NAME, name, "must be within [0, 1]"));
                    }
                    method.confidence_threshold = value;
                }
                _ => return Err(unknown_param(Self::NAME, name)),
            }
        }
        Ok(method)
    }

}

/// Models of a uid: the stored ones if the profile carries any, fitted otherwise
pub(super) fn models_of(profile: &Profile, uid: &str) -> Vec<Model> {
    match profile.stored_models(uid) {
        Some(models) => models.to_vec(),
        None => fit_all(profile.observations(uid)).into_values().collect(),
    }
}

pub(super) fn best_model(profile: &Profile, uid: &str) -> Selection {
    select_best_of(&models_of(profile, uid))
}

impl Default for BestModelOrder {
    fn default() -> Self {
        Self {
            confidence_threshold: Self::DEFAULT_CONFIDENCE_THRESHOLD,
        }
    }
}

impl DegradationMethod for BestModelOrder {
    fn name(&self) -> &'static str {
        Self::NAME
    }

    fn compare(&self, baseline: &Profile, target: &Profile, uid: &str) -> ChangeReport {
        let report = ChangeReport::new(Self::NAME, ChangeKind::Unknown, "complexity order", uid);

        let (base, targ) = match (best_model(baseline, uid), best_model(target, uid)) {
            (Selection::Best(base), Selection::Best(targ)) => (base, targ),
            (base, targ) => {
                tracing::warn!("No model could be fitted for uid '{}'", uid);
                let name = |s: &Selection| s.family().map_or("unknown", |f| f.name());
                return report.with_values(name(&base), name(&targ));
            }
        };

        let confidence = base.r_square.min(targ.r_square).clamp(0.0, 1.0);
        let certain = confidence >= self.confidence_threshold;
        let kind = match targ.family.complexity_rank().cmp(&base.family.complexity_rank()) {
            std::cmp::Ordering::Equal => ChangeKind::NoChange,
            std::cmp::Ordering::Greater if certain => ChangeKind::Degradation,
            std::cmp::Ordering::Greater => ChangeKind::MaybeDegradation,
            std::cmp::Ordering::Less if certain => ChangeKind::Optimization,
            std::cmp::Ordering::Less => ChangeKind::MaybeOptimization,
        };

        ChangeReport {
            change_kind: kind,
            ..report
        }
        .with_values(base.family.name(), targ.family.name())
        .with_confidence("r_square", confidence)
    }
}

/// Compares the mean amount of each side against ratio thresholds
#[derive(Debug, Clone, PartialEq)]
pub struct AverageAmountThreshold {
    /// Ratio at or above which the target is a degradation
    pub degradation_threshold: f64,
    /// Ratio at or below which the target is an optimization
    pub optimization_threshold: f64,
}

impl AverageAmountThreshold {
    pub const NAME: &'static str = "average_amount_threshold";
    pub const ALIAS: &'static str = "aat";
    pub const DEFAULT_DEGRADATION_THRESHOLD: f64 = 2.0;
    pub const DEFAULT_OPTIMIZATION_THRESHOLD: f64 = 0.5;

    pub fn from_params(params: &MethodParams) -> Result<Self, ConfigError> {
        let mut method = Self::default();
        for (name, &value) in params {
            match name.as_str() {
                "degradation_threshold" => method.degradation_threshold = value,
                "optimization_threshold" => method.optimization_threshold = value,
                _ => return Err(unknown_param(Self::NAME, name)),
            }
        }
        method.validate()?;
        Ok(method)
    }

    /// `0 < optimization_threshold < 1 < degradation_threshold`
    pub fn validate(&self) -> Result<(), ConfigError> {
        if !(self.optimization_threshold > 0.0 && self.optimization_threshold < 1.0) {
            return Err(invalid(
                Self::NAME,
                "optimization_threshold",
                "must be within (0, 1)",
            ));
        }
        if !(self.degradation_threshold > 1.0 && self.degradation_threshold.is_finite()) {
            return Err(invalid(
                Self::NAME,
                "degradation_threshold",
                "must be greater than 1",
            ));
        }
        Ok(())
    }

    fn average(profile: &Profile, uid: &str) -> Option<f64> {
        let amounts: Vec<f32> = profile.observations(uid).iter().map(|o| o.y as f32).collect();
        if amounts.is_empty() {
            return None;
        }
        trueno::Vector::from_slice(&amounts).mean().ok().map(f64::from)
    }
}

impl Default for AverageAmountThreshold {
    fn default() -> Self {
        Self {
            degradation_threshold: Self::DEFAULT_DEGRADATION_THRESHOLD,
            optimization_threshold: Self::DEFAULT_OPTIMIZATION_THRESHOLD,
        }
    }
}

impl DegradationMethod for AverageAmountThreshold {
    fn name(&self) -> &'static str {
        Self::NAME
    }

    fn compare(&self, baseline: &Profile, target: &Profile, uid: &str) -> ChangeReport {
        let report = ChangeReport::new(Self::NAME, ChangeKind::Unknown, "ratio", uid);
        let unit = target.unit.as_deref().unwrap_or("");
        let render = |avg: Option<f64>| avg.map_or_else(|| "n/a".to_string(), |v| format!("{:.2}{}", v, unit));

        let base_avg = Self::average(baseline, uid);
        let targ_avg = Self::average(target, uid);
        let report = report.with_values(render(base_avg), render(targ_avg));

        let (base, targ) = match (base_avg, targ_avg) {
            (Some(base), Some(targ)) if base != 0.0 && base.is_finite() && targ.is_finite() => {
                (base, targ)
            }
            _ => {
                tracing::warn!("Average amount of uid '{}' cannot be compared", uid);
                return report;
            }
        };

        let rate = targ / base;
        let kind = if rate >= self.degradation_threshold {
            ChangeKind::Degradation
        } else if rate <= self.optimization_threshold {
            ChangeKind::Optimization
        } else {
            ChangeKind::NoChange
        };

        ChangeReport {
            change_kind: kind,
            ..report
        }
        .with_rate(rate)
    }
}

pub(super) fn unknown_param(method: &str, parameter: &str) -> ConfigError {
    ConfigError::UnknownParameter {
        method: method.to_string(),
        parameter: parameter.to_string(),
    }
}

pub(super) fn invalid(method: &str, parameter: &str, reason: &str) -> ConfigError {
    ConfigError::InvalidParameter {
        method: method.to_string(),
        parameter: parameter.to_string(),
        reason: reason.to_string(),
    }
}

type Constructor = fn(&MethodParams) -> Result<Box<dyn DegradationMethod>, ConfigError>;

/// Registry mapping method names and aliases to constructors
#[derive(Clone)]
pub struct MethodRegistry {
    constructors: BTreeMap<&'static str, Constructor>,
    aliases: BTreeMap<&'static str, &'static str>,
}

impl fmt::Debug for MethodRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MethodRegistry")
            .field("methods", &self.constructors.keys().collect::<Vec<_>>())
            .field("aliases", &self.aliases)
            .finish()
    }
}

impl Default for MethodRegistry {
    fn default() -> Self {
        Self::builtin()
    }
}

impl MethodRegistry {
    /// Registry with every built-in method
    pub fn builtin() -> Self {
        let mut registry = Self {
            constructors: BTreeMap::new(),
            aliases: BTreeMap::new(),
        };
        registry.register(BestModelOrder::NAME, BestModelOrder::ALIAS, |params| {
            Ok(Box::new(BestModelOrder::from_params(params)?))
        });
        registry.register(
            AverageAmountThreshold::NAME,
            AverageAmountThreshold::ALIAS,
            |params| Ok(Box::new(AverageAmountThreshold::from_params(params)?)),
        );
        registry.register(IntegralComparison::NAME, IntegralComparison::ALIAS, |params| {
            Ok(Box::new(IntegralComparison::from_params(params)?))
        });
        registry.register(FastCheck::NAME, FastCheck::ALIAS, |params| {
            Ok(Box::new(FastCheck::from_params(params)?))
        });
        registry.register(LinearRegression::NAME, LinearRegression::ALIAS, |params| {
            Ok(Box::new(LinearRegression::from_params(params)?))
        });
        registry
    }

    fn register(&mut self, name: &'static str, alias: &'static str, constructor: Constructor) {
        self.constructors.insert(name, constructor);
        self.aliases.insert(alias, name);
    }

    /// Canonical method names, sorted
    pub fn names(&self) -> impl Iterator<Item = &'static str> + '_ {
        self.constructors.keys().copied()
    }

    /// Full name for a name or alias
    pub fn canonical_name(&self, name: &str) -> Option<&'static str> {
        if let Some((&full, _)) = self.constructors.get_key_value(name) {
            return Some(full);
        }
        self.aliases.get(name).copied()
    }

    pub fn build(&self, name: &str, params: &MethodParams) -> Result<Box<dyn DegradationMethod>, ConfigError> {
        let canonical = self
            .canonical_name(name)
            .ok_or_else(|| ConfigError::UnknownMethod(name.to_string()))?;
        (self.constructors[canonical])(params)
    }

    /// Instantiate the methods of every rule matching `profile`
    ///
    /// In [`ApplyMode::All`] a method selected by an earlier rule is not
    /// selected again, even if referred to by its alias.
    pub fn resolve(
        &self,
        rules: &[StrategyRule],
        apply: ApplyMode,
        profile: &Profile,
    ) -> Result<Vec<Box<dyn DegradationMethod>>, ConfigError> {
        let mut methods: Vec<Box<dyn DegradationMethod>> = Vec::new();

        for rule in strategy::resolve(rules, apply, profile) {
            let method = self.build(&rule.method, &rule.params)?;
            if methods.iter().any(|m| m.name() == method.name()) {
                tracing::debug!("Method {} already applied, skipping", method.name());
                continue;
            }
            tracing::debug!("Applying {} to {}", method.name(), profile.configuration);
            methods.push(method);
        }

        Ok(methods)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fitting::{Model, ModelFamily};
    use crate::profile::Configuration;

    fn config() -> Configuration {
        Configuration::new("time", "./bench", "", "", vec![])
    }

    fn amounts(values: &[f64]) -> Profile {
        Profile::new(config(), "time")
            .with_unit("ms")
            .with_resource("main", values.iter().enumerate().map(|(i, &y)| (i as f64 + 1.0, y)))
    }

    fn stored(family: ModelFamily, r_square: f64) -> Profile {
        let model = Model {
            family,
            coefficients: vec![1.0; family.coefficient_count()],
            r_square,
            x_start: 1.0,
            x_end: 10.0,
        };
        Profile::new(config(), "time")
            .with_resource("main", [(1.0, 1.0)])
            .with_models("main", vec![model])
    }

    #[test]
    fn test_aat_ratio_boundaries() {
        let aat = AverageAmountThreshold::default();
        let cases = [
            (200.0, ChangeKind::Degradation),
            (199.0, ChangeKind::NoChange),
            (100.0, ChangeKind::NoChange),
            (51.0, ChangeKind::NoChange),
            (50.0, ChangeKind::Optimization),
        ];
        for (target, expected) in cases {
            let report = aat.compare(&amounts(&[100.0]), &amounts(&[target]), "main");
            assert_eq!(report.change_kind, expected, "target {}", target);
        }
    }

    #[test]
    fn test_aat_values_and_rate() {
        let report = AverageAmountThreshold::default().compare(
            &amounts(&[90.0, 110.0]),
            &amounts(&[205.0]),
            "main",
        );
        assert_eq!(report.change_kind, ChangeKind::Degradation);
        assert_eq!(report.baseline_value, "100.00ms");
        assert_eq!(report.target_value, "205.00ms");
        assert_eq!(report.change_subtype, "ratio");
        assert!((report.rate.unwrap() - 2.05).abs() < 1e-12);
        assert!(report.confidence.is_none());
    }

    #[test]
    fn test_aat_zero_baseline_is_unknown() {
        let report =
            AverageAmountThreshold::default().compare(&amounts(&[0.0, 0.0]), &amounts(&[5.0]), "main");
        assert_eq!(report.change_kind, ChangeKind::Unknown);
        assert!(report.rate.is_none());
    }

    #[test]
    fn test_aat_averages_many_amounts() {
        let baseline: Vec<f64> = (1..=100).map(f64::from).collect();
        let target: Vec<f64> = baseline.iter().map(|y| y * 3.0).collect();
        let report = AverageAmountThreshold::default().compare(&amounts(&baseline), &amounts(&target), "main");
        assert_eq!(report.baseline_value, "50.50ms");
        assert_eq!(report.target_value, "151.50ms");
        assert!((report.rate.unwrap() - 3.0).abs() < 1e-6);
        assert_eq!(report.change_kind, ChangeKind::Degradation);
    }

    #[test]
    fn test_aat_amounts_beyond_f32_are_unknown() {
        let report =
            AverageAmountThreshold::default().compare(&amounts(&[1e39]), &amounts(&[1.0]), "main");
        assert_eq!(report.change_kind, ChangeKind::Unknown);
        assert!(report.rate.is_none());
    }

    #[test]
    fn test_aat_missing_uid_is_unknown() {
        let report = AverageAmountThreshold::default().compare(&amounts(&[1.0]), &amounts(&[1.0]), "other");
        assert_eq!(report.change_kind, ChangeKind::Unknown);
        assert_eq!(report.baseline_value, "n/a");
    }

    #[test]
    fn test_aat_params_validated() {
        let params = |d: f64, o: f64| {
            MethodParams::from([
                ("degradation_threshold".to_string(), d),
                ("optimization_threshold".to_string(), o),
            ])
        };
        assert!(AverageAmountThreshold::from_params(&params(3.0, 0.25)).is_ok());
        assert!(AverageAmountThreshold::from_params(&params(1.0, 0.5)).is_err());
        assert!(AverageAmountThreshold::from_params(&params(2.0, 0.0)).is_err());
        assert!(AverageAmountThreshold::from_params(&params(2.0, 1.0)).is_err());

        let unknown = MethodParams::from([("threshold".to_string(), 2.0)]);
        assert!(matches!(
            AverageAmountThreshold::from_params(&unknown),
            Err(ConfigError::UnknownParameter { parameter, .. }) if parameter == "threshold"
        ));
    }

    #[test]
    fn test_bmoe_uses_stored_models() {
        let report = BestModelOrder::default().compare(
            &stored(ModelFamily::Linear, 0.95),
            &stored(ModelFamily::Quadratic, 0.92),
            "main",
        );
        assert_eq!(report.change_kind, ChangeKind::Degradation);
        assert_eq!(report.confidence, Some(0.92));
        assert_eq!(report.baseline_value, "linear");
        assert_eq!(report.target_value, "quadratic");
        assert_eq!(report.confidence_type.as_deref(), Some("r_square"));
    }

    #[test]
    fn test_bmoe_low_confidence_is_maybe() {
        let bmoe = BestModelOrder::default();
        let down = bmoe.compare(
            &stored(ModelFamily::Quadratic, 0.8),
            &stored(ModelFamily::Linear, 0.99),
            "main",
        );
        assert_eq!(down.change_kind, ChangeKind::MaybeOptimization);

        let up = bmoe.compare(
            &stored(ModelFamily::Constant, 0.5),
            &stored(ModelFamily::Exponential, 0.99),
            "main",
        );
        assert_eq!(up.change_kind, ChangeKind::MaybeDegradation);
    }

    #[test]
    fn test_bmoe_same_family_is_no_change() {
        let report = BestModelOrder::default().compare(
            &stored(ModelFamily::Power, 0.99),
            &stored(ModelFamily::Power, 0.4),
            "main",
        );
        assert_eq!(report.change_kind, ChangeKind::NoChange);
    }

    #[test]
    fn test_bmoe_fits_when_models_absent() {
        let linear = Profile::new(config(), "time")
            .with_resource("main", (1..=8).map(|x| (x as f64, 3.0 * x as f64 + 1.0)));
        let report = BestModelOrder::default().compare(&linear, &linear, "main");
        assert_eq!(report.change_kind, ChangeKind::NoChange);
        assert_eq!(report.baseline_value, "linear");
    }

    #[test]
    fn test_bmoe_unknown_side() {
        let empty = Profile::new(config(), "time");
        let report = BestModelOrder::default().compare(&empty, &stored(ModelFamily::Linear, 1.0), "main");
        assert_eq!(report.change_kind, ChangeKind::Unknown);
        assert!(report.confidence.is_none());
        assert_eq!(report.baseline_value, "unknown");
    }

    #[test]
    fn test_bmoe_threshold_param() {
        let params = MethodParams::from([("confidence_threshold".to_string(), 0.5)]);
        assert_eq!(BestModelOrder::from_params(&params).unwrap().confidence_threshold, 0.5);

        let bad = MethodParams::from([("confidence_threshold".to_string(), 1.5)]);
        assert!(matches!(
            BestModelOrder::from_params(&bad),
            Err(ConfigError::InvalidParameter { .. })
        ));
    }

    #[test]
    fn test_registry_aliases() {
        let registry = MethodRegistry::builtin();
        assert_eq!(registry.canonical_name("aat"), Some(AverageAmountThreshold::NAME));
        assert_eq!(registry.canonical_name("bmoe"), Some(BestModelOrder::NAME));
        assert_eq!(
            registry.canonical_name("average_amount_threshold"),
            Some(AverageAmountThreshold::NAME)
        );
        assert_eq!(registry.canonical_name("int"), Some(IntegralComparison::NAME));
        assert_eq!(registry.canonical_name("fast"), Some(FastCheck::NAME));
        assert_eq!(registry.canonical_name("lreg"), Some(LinearRegression::NAME));
        assert_eq!(registry.canonical_name("nope"), None);
        assert_eq!(
            registry.names().collect::<Vec<_>>(),
            vec![
                AverageAmountThreshold::NAME,
                BestModelOrder::NAME,
                FastCheck::NAME,
                IntegralComparison::NAME,
                LinearRegression::NAME,
            ]
        );
    }

    #[test]
    fn test_registry_unknown_method() {
        let result = MethodRegistry::builtin().build("polynomial_fit", &MethodParams::new());
        assert!(matches!(result, Err(ConfigError::UnknownMethod(name)) if name == "polynomial_fit"));
    }

    #[test]
    fn test_registry_resolve_dedups_aliases() {
        let rules = vec![
            StrategyRule::new("aat"),
            StrategyRule::new("average_amount_threshold").with_param("degradation_threshold", 5.0),
            StrategyRule::new("bmoe"),
        ];
        let methods = MethodRegistry::builtin()
            .resolve(&rules, ApplyMode::All, &amounts(&[1.0]))
            .unwrap();
        let names: Vec<_> = methods.iter().map(|m| m.name()).collect();
        assert_eq!(names, vec![AverageAmountThreshold::NAME, BestModelOrder::NAME]);
    }

    #[test]
    fn test_registry_resolve_first() {
        let rules = vec![StrategyRule::new("bmoe"), StrategyRule::new("aat")];
        let methods = MethodRegistry::builtin()
            .resolve(&rules, ApplyMode::First, &amounts(&[1.0]))
            .unwrap();
        assert_eq!(methods.len(), 1);
        assert_eq!(methods[0].name(), BestModelOrder::NAME);
    }
}
