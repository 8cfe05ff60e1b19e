//! Degradation checks of versions against their nearest comparable ancestors

use crate::check::change::ChangeReport;
use crate::check::config::{CheckConfig, ConfigError};
use crate::check::methods::MethodRegistry;
use crate::pairing::{find_baseline, Pairing, ProfileCache};
use crate::profile::{Configuration, Profile};
use crate::store::{ProfileRef, ProfileStore, StoreError, VersionHistory, VersionId};
use serde::Serialize;
use thiserror::Error;

/// Failure of one version check
#[derive(Error, Debug)]
pub enum CheckError {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Store error: {0}")]
    Store(#[from] StoreError),

    #[error("Check worker for version {0} panicked")]
    WorkerPanicked(VersionId),
}

/// Reports of one target profile checked against its baseline
#[derive(Debug, Clone, Serialize)]
pub struct ProfileCheck {
    pub configuration: Configuration,
    pub target: ProfileRef,
    pub baseline_version: VersionId,
    pub baseline: ProfileRef,
    pub reports: Vec<ChangeReport>,
}

/// A target profile without any comparable ancestor
#[derive(Debug, Clone, Serialize)]
pub struct NotComparable {
    pub configuration: Configuration,
    pub target: ProfileRef,
    /// Ancestors inspected before giving up
    pub visited: usize,
}

/// Outcome of checking every profile of one version
#[derive(Debug, Clone, Serialize)]
pub struct VersionCheck {
    pub version: VersionId,
    pub checks: Vec<ProfileCheck>,
    pub not_comparable: Vec<NotComparable>,
}

impl VersionCheck {
    /// All reports of the version, profile by profile
    pub fn reports(&self) -> impl Iterator<Item = &ChangeReport> {
        self.checks.iter().flat_map(|check| check.reports.iter())
    }
}

/// Runs the configured degradation methods over profile pairs
#[derive(Debug, Clone)]
pub struct Checker {
    config: CheckConfig,
    registry: MethodRegistry,
}

impl Checker {
    pub fn new(config: CheckConfig) -> Self {
        Self::with_registry(config, MethodRegistry::builtin())
    }

    pub fn with_registry(config: CheckConfig, registry: MethodRegistry) -> Self {
        Self { config, registry }
    }

    pub fn config(&self) -> &CheckConfig {
        &self.config
    }

    /// Compare every uid present in both profiles
    ///
    /// Methods are resolved against the target profile. Reports are grouped
    /// by method in resolution order, uids sorted within each method.
    pub fn check_profile_pair(
        &self,
        baseline: &Profile,
        target: &Profile,
    ) -> Result<Vec<ChangeReport>, ConfigError> {
        let methods = self
            .registry
            .resolve(self.config.strategies(), self.config.apply(), target)?;
        if methods.is_empty() {
            tracing::debug!("No degradation strategy applies to {}", target.configuration);
        }

        let uids: Vec<&str> = baseline.common_uids(target).collect();
        let mut reports = Vec::with_capacity(methods.len() * uids.len());
        for method in &methods {
            for uid in &uids {
                reports.push(method.compare(baseline, target, uid));
            }
        }
        Ok(reports)
    }

    /// Check every profile of `version` against its nearest comparable ancestor
    pub fn check_version<H, S>(
        &self,
        version: &VersionId,
        history: &H,
        store: &S,
        cache: &mut ProfileCache,
    ) -> Result<VersionCheck, CheckError>
    where
        H: VersionHistory + ?Sized,
        S: ProfileStore + ?Sized,
    {
        let mut result = VersionCheck {
            version: version.clone(),
            checks: Vec::new(),
            not_comparable: Vec::new(),
        };

        for (target_ref, target) in cache.profiles_of(store, version)? {
            let configuration = target.configuration.clone();
            match find_baseline(version, &configuration, history, store, cache)? {
                Pairing::Found {
                    version: baseline_version,
                    reference,
                    profile,
                    ..
                } => {
                    tracing::debug!(
                        "Checking {} of {} against {}",
                        configuration,
                        version.short(),
                        baseline_version.short()
                    );
                    let reports = self.check_profile_pair(&profile, &target)?;
                    result.checks.push(ProfileCheck {
                        configuration,
                        target: target_ref,
                        baseline_version,
                        baseline: reference,
                        reports,
                    });
                }
                Pairing::NotFound { visited } => {
                    tracing::warn!(
                        "Skipping {}: no comparable profile in {} ancestors of {}",
                        configuration,
                        visited,
                        version.short()
                    );
                    result.not_comparable.push(NotComparable {
                        configuration,
                        target: target_ref,
                        visited,
                    });
                }
            }
        }

        Ok(result)
    }

    /// Check a batch of versions on up to `workers` scoped threads
    ///
    /// Each worker owns its [`ProfileCache`]. Results are in input order and a
    /// failed version does not affect the others.
    pub fn check_versions<H, S>(
        &self,
        versions: &[VersionId],
        history: &H,
        store: &S,
        workers: usize,
    ) -> Vec<Result<VersionCheck, CheckError>>
    where
        H: VersionHistory + Sync + ?Sized,
        S: ProfileStore + Sync + ?Sized,
    {
        if versions.is_empty() {
            return Vec::new();
        }
        let workers = workers.clamp(1, versions.len());
        let chunk_size = versions.len().div_ceil(workers);

        let panicked = |chunk: &[VersionId]| -> Vec<Result<VersionCheck, CheckError>> {
            chunk
                .iter()
                .map(|v| Err(CheckError::WorkerPanicked(v.clone())))
                .collect()
        };

        let outcome = crossbeam::thread::scope(|scope| {
            let handles: Vec<_> = versions
                .chunks(chunk_size)
                .map(|chunk| {
                    let handle = scope.spawn(move |_| {
                        let mut cache = ProfileCache::new();
                        let results: Vec<_> = chunk
                            .iter()
                            .map(|version| self.check_version(version, history, store, &mut cache))
                            .collect();
                        let (hits, misses) = cache.stats();
                        tracing::debug!("Worker cache: {} hits, {} misses", hits, misses);
                        results
                    });
                    (chunk, handle)
                })
                .collect();

            handles
                .into_iter()
                .flat_map(|(chunk, handle)| handle.join().unwrap_or_else(|_| panicked(chunk)))
                .collect::<Vec<_>>()
        });

        outcome.unwrap_or_else(|_| panicked(versions))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::check::strategy::{ApplyMode, StrategyRule};
    use crate::store::{MemoryHistory, MemoryStore};

    fn config(workload: &str) -> Configuration {
        Configuration::new("time", "./bench", "", workload, vec![])
    }

    fn profile(workload: &str, main: f64, helper: f64) -> Profile {
        Profile::new(config(workload), "time")
            .with_unit("ms")
            .with_resource("main", [(1.0, main)])
            .with_resource("helper", [(1.0, helper)])
    }

    fn aat_checker() -> Checker {
        Checker::new(CheckConfig::new(ApplyMode::All, vec![StrategyRule::new("aat")]))
    }

    #[test]
    fn test_pair_reports_sorted_common_uids() {
        let baseline = profile("w", 100.0, 10.0).with_resource("only_base", [(1.0, 1.0)]);
        let target = profile("w", 300.0, 10.0);

        let reports = aat_checker().check_profile_pair(&baseline, &target).unwrap();
        let locations: Vec<_> = reports.iter().map(|r| r.location.as_str()).collect();
        assert_eq!(locations, vec!["helper", "main"]);
    }

    #[test]
    fn test_pair_without_strategy_is_empty() {
        let checker = Checker::new(CheckConfig::default());
        let reports = checker
            .check_profile_pair(&profile("w", 1.0, 1.0), &profile("w", 5.0, 5.0))
            .unwrap();
        assert!(reports.is_empty());
    }

    #[test]
    fn test_pair_config_error() {
        let checker = Checker::new(CheckConfig::new(ApplyMode::All, vec![StrategyRule::new("magic")]));
        let result = checker.check_profile_pair(&profile("w", 1.0, 1.0), &profile("w", 1.0, 1.0));
        assert!(matches!(result, Err(ConfigError::UnknownMethod(_))));
    }

    #[test]
    fn test_version_records_not_comparable() {
        let mut history = MemoryHistory::new();
        history.add_version("c0", Vec::<&str>::new());
        history.add_version("c1", ["c0"]);

        let mut store = MemoryStore::new();
        store.insert("c0", profile("small", 100.0, 10.0)).unwrap();
        store.insert("c1", profile("small", 250.0, 10.0)).unwrap();
        store.insert("c1", profile("large", 1.0, 1.0)).unwrap();

        let check = aat_checker()
            .check_version(&"c1".into(), &history, &store, &mut ProfileCache::new())
            .unwrap();

        assert_eq!(check.checks.len(), 1);
        assert_eq!(check.checks[0].baseline_version, VersionId::new("c0"));
        assert_eq!(check.not_comparable.len(), 1);
        assert_eq!(check.not_comparable[0].configuration.workload, "large");
        assert_eq!(check.not_comparable[0].visited, 1);
        assert_eq!(check.reports().count(), 2);
    }

    #[test]
    fn test_batch_keeps_input_order() {
        let mut history = MemoryHistory::new();
        let mut store = MemoryStore::new();
        history.add_version("v0", Vec::<&str>::new());
        store.insert("v0", profile("w", 100.0, 100.0)).unwrap();
        for i in 1..10 {
            let id = format!("v{}", i);
            let parent = format!("v{}", i - 1);
            history.add_version(id.as_str(), [parent.as_str()]);
            store.insert(id.as_str(), profile("w", 100.0 * (i + 1) as f64, 100.0)).unwrap();
        }

        let versions: Vec<VersionId> = (1..10).rev().map(|i| VersionId::new(format!("v{}", i))).collect();
        let results = aat_checker().check_versions(&versions, &history, &store, 4);

        assert_eq!(results.len(), versions.len());
        for (version, result) in versions.iter().zip(&results) {
            let check = result.as_ref().unwrap();
            assert_eq!(&check.version, version);
            assert_eq!(check.checks.len(), 1);
        }
    }

    #[test]
    fn test_batch_isolates_failures() {
        let mut history = MemoryHistory::new();
        history.add_version("c0", Vec::<&str>::new());
        let mut store = MemoryStore::new();
        store.insert("c0", profile("w", 1.0, 1.0)).unwrap();
        // Profiles attached to a version the history does not know
        store.insert("ghost", profile("w", 2.0, 2.0)).unwrap();

        let versions = vec![VersionId::new("c0"), VersionId::new("ghost")];
        let results = aat_checker().check_versions(&versions, &history, &store, 2);

        assert!(results[0].is_ok());
        assert!(matches!(results[1], Err(CheckError::Store(StoreError::UnknownVersion(_)))));
    }

    #[test]
    fn test_batch_empty() {
        let results = aat_checker().check_versions(&[], &MemoryHistory::new(), &MemoryStore::new(), 4);
        assert!(results.is_empty());
    }
}
