//! Strategy rules: which degradation methods apply to which profiles

use crate::check::methods::MethodParams;
use crate::profile::Profile;
use serde::{Deserialize, Serialize};
use std::fmt;

/// How many matching rules contribute methods
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ApplyMode {
    /// Only the first matching rule
    First,
    /// Every matching rule, in configuration order
    #[default]
    All,
}

impl fmt::Display for ApplyMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ApplyMode::First => write!(f, "first"),
            ApplyMode::All => write!(f, "all"),
        }
    }
}

/// A predicate over profile attributes plus the method to run when it holds
///
/// Predicates that are absent match any profile.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct StrategyRule {
    /// Resource type, e.g. "time" or "memory"
    #[serde(rename = "type", default, skip_serializing_if = "Option::is_none")]
    pub resource_type: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cmd: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub collector: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub workload: Option<String>,

    /// Must be one of the postprocessors applied to the profile
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub postprocessor: Option<String>,

    /// Method name or alias
    pub method: String,

    #[serde(default, skip_serializing_if = "MethodParams::is_empty")]
    pub params: MethodParams,
}

impl StrategyRule {
    pub fn new(method: impl Into<String>) -> Self {
        Self {
            method: method.into(),
            ..Self::default()
        }
    }

    pub fn for_type(mut self, resource_type: impl Into<String>) -> Self {
        self.resource_type = Some(resource_type.into());
        self
    }

    pub fn for_cmd(mut self, cmd: impl Into<String>) -> Self {
        self.cmd = Some(cmd.into());
        self
    }

    pub fn for_collector(mut self, collector: impl Into<String>) -> Self {
        self.collector = Some(collector.into());
        self
    }

    pub fn for_workload(mut self, workload: impl Into<String>) -> Self {
        self.workload = Some(workload.into());
        self
    }

    pub fn for_postprocessor(mut self, postprocessor: impl Into<String>) -> Self {
        self.postprocessor = Some(postprocessor.into());
        self
    }

    pub fn with_param(mut self, name: impl Into<String>, value: f64) -> Self {
        self.params.insert(name.into(), value);
        self
    }

    /// Does every present predicate hold for `profile`?
    pub fn matches(&self, profile: &Profile) -> bool {
        let config = &profile.configuration;

        fn holds(predicate: &Option<String>, actual: &str) -> bool {
            predicate.as_deref().map_or(true, |expected| expected == actual)
        }

        holds(&self.resource_type, &profile.resource_type)
            && holds(&self.cmd, &config.command)
            && holds(&self.collector, &config.collector)
            && holds(&self.workload, &config.workload)
            && self
                .postprocessor
                .as_deref()
                .map_or(true, |name| profile.has_postprocessor(name))
    }
}

/// Matching rules for `profile`, in configuration order
///
/// An empty result means no degradation check applies.
pub fn resolve<'a>(rules: &'a [StrategyRule], apply: ApplyMode, profile: &Profile) -> Vec<&'a StrategyRule> {
    let matching = rules.iter().filter(|rule| rule.matches(profile));
    match apply {
        ApplyMode::First => matching.take(1).collect(),
        ApplyMode::All => matching.collect(),
    }
}
