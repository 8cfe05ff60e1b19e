//! Performance profiles and their on-disk document format
//!
//! A [`Profile`] is the read-only input of every check: one collected run with
//! its [`Configuration`] and the observations of every resource group (uid).
//! Profiles are deserialized from a [`ProfileDocument`] and converted once;
//! the checking core never mutates them.

use crate::fitting::{fit_all, Model, ModelFamily};
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::fs;
use std::path::Path;

/// Postprocessor name recorded by [`ProfileDocument::attach_fitted_models`]
pub const REGRESSION_ANALYSIS: &str = "regression_analysis";

/// One `(independent, dependent)` observation, e.g. (structure size, elapsed time)
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Observation {
    pub x: f64,
    pub y: f64,
}

impl Observation {
    pub fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }
}

impl From<(f64, f64)> for Observation {
    fn from((x, y): (f64, f64)) -> Self {
        Self { x, y }
    }
}

/// Tuple defining whether two profiles are comparable
///
/// Two profiles may only be checked against each other when every field is
/// equal, including the order of postprocessors.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Configuration {
    pub collector: String,
    pub command: String,
    pub args: String,
    pub workload: String,
    pub postprocessors: Vec<String>,
}

impl Configuration {
    pub fn new(
        collector: impl Into<String>,
        command: impl Into<String>,
        args: impl Into<String>,
        workload: impl Into<String>,
        postprocessors: Vec<String>,
    ) -> Self {
        Self {
            collector: collector.into(),
            command: command.into(),
            args: args.into(),
            workload: workload.into(),
            postprocessors,
        }
    }

    /// Executed command line, skipping empty parts
    pub fn command_string(&self) -> String {
        [&self.command, &self.args, &self.workload]
            .iter()
            .filter(|part| !part.is_empty())
            .map(|part| part.as_str())
            .collect::<Vec<_>>()
            .join(" ")
    }
}

impl fmt::Display for Configuration {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.collector)?;
        for post in &self.postprocessors {
            write!(f, "+{}", post)?;
        }
        write!(f, " for cmd: '$ {}'", self.command_string())
    }
}

/// Immutable record of one performance measurement run
#[derive(Debug, Clone, PartialEq)]
pub struct Profile {
    pub configuration: Configuration,
    /// Kind of the measured resource (e.g. "time", "memory")
    pub resource_type: String,
    pub unit: Option<String>,
    pub resources: BTreeMap<String, Vec<Observation>>,
    pub models: BTreeMap<String, Vec<Model>>,
}

impl Profile {
    pub fn new(configuration: Configuration, resource_type: impl Into<String>) -> Self {
        Self {
            configuration,
            resource_type: resource_type.into(),
            unit: None,
            resources: BTreeMap::new(),
            models: BTreeMap::new(),
        }
    }

    pub fn with_unit(mut self, unit: impl Into<String>) -> Self {
        self.unit = Some(unit.into());
        self
    }

    /// Append observations to the resource group `uid`
    pub fn with_resource<I, O>(mut self, uid: impl Into<String>, observations: I) -> Self
    where
        I: IntoIterator<Item = O>,
        O: Into<Observation>,
    {
        self.resources
            .entry(uid.into())
            .or_default()
            .extend(observations.into_iter().map(Into::into));
        self
    }

    pub fn with_models(mut self, uid: impl Into<String>, models: Vec<Model>) -> Self {
        self.models.entry(uid.into()).or_default().extend(models);
        self
    }

    pub fn observations(&self, uid: &str) -> &[Observation] {
        self.resources.get(uid).map(Vec::as_slice).unwrap_or(&[])
    }

    /// Previously fitted models for `uid`, if the profile was postprocessed
    pub fn stored_models(&self, uid: &str) -> Option<&[Model]> {
        self.models
            .get(uid)
            .filter(|models| !models.is_empty())
            .map(Vec::as_slice)
    }

    /// Uids present in both profiles, in sorted order
    pub fn common_uids<'a>(&'a self, other: &'a Profile) -> impl Iterator<Item = &'a str> + 'a {
        self.resources
            .keys()
            .filter(move |uid| other.resources.contains_key(*uid))
            .map(String::as_str)
    }

    pub fn has_postprocessor(&self, name: &str) -> bool {
        self.configuration.postprocessors.iter().any(|p| p == name)
    }

    /// Load a profile document from a JSON file
    pub fn from_json_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        ProfileDocument::from_json_file(path).map(Profile::from)
    }
}

/// Profile header as stored in the document
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ProfileHeader {
    #[serde(rename = "type")]
    pub resource_type: String,
    #[serde(default)]
    pub cmd: String,
    #[serde(default, alias = "params")]
    pub args: String,
    #[serde(default)]
    pub workload: String,
    #[serde(default)]
    pub units: BTreeMap<String, String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct UnitInfo {
    pub name: String,
    #[serde(default, skip_serializing_if = "serde_json::Map::is_empty")]
    pub params: serde_json::Map<String, serde_json::Value>,
}

/// One measured amount of a resource
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResourceRecord {
    pub uid: String,
    #[serde(rename = "structure-unit-size", default)]
    pub structure_unit_size: f64,
    pub amount: f64,
}

/// One fitted model as stored in a postprocessed document
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelRecord {
    pub uid: String,
    pub model: ModelFamily,
    pub coeffs: Vec<f64>,
    pub r_square: f64,
    pub x_start: f64,
    pub x_end: f64,
}

/// Serialized form of a profile
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ProfileDocument {
    pub header: ProfileHeader,
    pub collector_info: UnitInfo,
    #[serde(default)]
    pub postprocessors: Vec<UnitInfo>,
    #[serde(default)]
    pub resources: Vec<ResourceRecord>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub models: Vec<ModelRecord>,
}

impl ProfileDocument {
    pub fn from_json_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = fs::read_to_string(path.as_ref())
            .with_context(|| format!("Failed to read profile: {}", path.as_ref().display()))?;
        serde_json::from_str(&content)
            .with_context(|| format!("Failed to parse profile: {}", path.as_ref().display()))
    }

    pub fn configuration(&self) -> Configuration {
        Configuration {
            collector: self.collector_info.name.clone(),
            command: self.header.cmd.clone(),
            args: self.header.args.clone(),
            workload: self.header.workload.clone(),
            postprocessors: self.postprocessors.iter().map(|p| p.name.clone()).collect(),
        }
    }

    /// Replace the stored models with the given ones
    pub fn set_models(&mut self, models: &BTreeMap<String, Vec<Model>>) {
        self.models = models
            .iter()
            .flat_map(|(uid, models)| {
                models.iter().map(move |model| ModelRecord {
                    uid: uid.clone(),
                    model: model.family,
                    coeffs: model.coefficients.clone(),
                    r_square: model.r_square,
                    x_start: model.x_start,
                    x_end: model.x_end,
                })
            })
            .collect();
    }

    /// Fit every model family for every uid and store all fitted models
    ///
    /// Marks the document as postprocessed by `regression_analysis`. Returns
    /// the number of stored models.
    pub fn attach_fitted_models(&mut self) -> usize {
        let mut observations: BTreeMap<String, Vec<Observation>> = BTreeMap::new();
        for record in &self.resources {
            observations
                .entry(record.uid.clone())
                .or_default()
                .push(Observation::new(record.structure_unit_size, record.amount));
        }

        let models: BTreeMap<String, Vec<Model>> = observations
            .iter()
            .map(|(uid, obs)| (uid.clone(), fit_all(obs).into_values().collect()))
            .collect();
        self.set_models(&models);

        if !self.postprocessors.iter().any(|p| p.name == REGRESSION_ANALYSIS) {
            self.postprocessors.push(UnitInfo {
                name: REGRESSION_ANALYSIS.to_string(),
                params: serde_json::Map::new(),
            });
        }
        self.models.len()
    }
}

impl From<ProfileDocument> for Profile {
    fn from(document: ProfileDocument) -> Self {
        let configuration = document.configuration();
        let unit = document
            .header
            .units
            .get(&document.header.resource_type)
            .cloned();

        let mut resources: BTreeMap<String, Vec<Observation>> = BTreeMap::new();
        for record in document.resources {
            resources
                .entry(record.uid)
                .or_default()
                .push(Observation::new(record.structure_unit_size, record.amount));
        }

        let mut models: BTreeMap<String, Vec<Model>> = BTreeMap::new();
        for record in document.models {
            if record.coeffs.len() != record.model.coefficient_count() {
                tracing::warn!(
                    "Dropping {} model of uid '{}': expected {} coefficients, found {}",
                    record.model,
                    record.uid,
                    record.model.coefficient_count(),
                    record.coeffs.len()
                );
                continue;
            }
            models.entry(record.uid).or_default().push(Model {
                family: record.model,
                coefficients: record.coeffs,
                r_square: record.r_square,
                x_start: record.x_start,
                x_end: record.x_end,
            });
        }

        Profile {
            configuration,
            resource_type: document.header.resource_type,
            unit,
            resources,
            models,
        }
    }
}

impl From<&Profile> for ProfileDocument {
    fn from(profile: &Profile) -> Self {
        let config = &profile.configuration;
        let mut units = BTreeMap::new();
        if let Some(unit) = &profile.unit {
            units.insert(profile.resource_type.clone(), unit.clone());
        }

        let mut document = ProfileDocument {
            header: ProfileHeader {
                resource_type: profile.resource_type.clone(),
                cmd: config.command.clone(),
                args: config.args.clone(),
                workload: config.workload.clone(),
                units,
            },
            collector_info: UnitInfo {
                name: config.collector.clone(),
                params: serde_json::Map::new(),
            },
            postprocessors: config
                .postprocessors
                .iter()
                .map(|name| UnitInfo {
                    name: name.clone(),
                    params: serde_json::Map::new(),
                })
                .collect(),
            resources: profile
                .resources
                .iter()
                .flat_map(|(uid, observations)| {
                    observations.iter().map(move |o| ResourceRecord {
                        uid: uid.clone(),
                        structure_unit_size: o.x,
                        amount: o.y,
                    })
                })
                .collect(),
            models: Vec::new(),
        };
        document.set_models(&profile.models);
        document
    }
}
