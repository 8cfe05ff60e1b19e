//! Baseline lookup over the version history
//!
//! Given a target version and the configuration of one of its profiles, the
//! baseline is the profile with the same configuration attached to the
//! nearest ancestor version. Ancestors are explored breadth-first starting at
//! the target's direct parents, so a first parent is always preferred over
//! older history, and merges never cause a version to be inspected twice.

use crate::profile::{Configuration, Profile};
use crate::store::{ProfileRef, ProfileStore, StoreError, VersionHistory, VersionId};
use fnv::{FnvHashMap, FnvHashSet};
use std::collections::VecDeque;
use std::sync::Arc;

/// Result of the baseline search
#[derive(Debug, Clone)]
pub enum Pairing {
    Found {
        version: VersionId,
        reference: ProfileRef,
        profile: Arc<Profile>,
        /// Number of ancestor versions inspected, including the matching one
        visited: usize,
    },
    NotFound {
        visited: usize,
    },
}

impl Pairing {
    pub fn is_found(&self) -> bool {
        matches!(self, Pairing::Found { .. })
    }

    pub fn visited(&self) -> usize {
        match self {
            Pairing::Found { visited, .. } | Pairing::NotFound { visited } => *visited,
        }
    }
}

/// Memoized profile listings and loads for one batch of checks
///
/// A cache is owned by a single worker and dropped when its batch completes.
#[derive(Debug, Default)]
pub struct ProfileCache {
    listings: FnvHashMap<VersionId, Vec<ProfileRef>>,
    profiles: FnvHashMap<ProfileRef, Arc<Profile>>,
    hits: usize,
    misses: usize,
}

impl ProfileCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// All profiles attached to `version`, in store order
    pub fn profiles_of<S>(
        &mut self,
        store: &S,
        version: &VersionId,
    ) -> Result<Vec<(ProfileRef, Arc<Profile>)>, StoreError>
    where
        S: ProfileStore + ?Sized,
    {
        let refs = match self.listings.get(version) {
            Some(refs) => refs.clone(),
            None => {
                let refs = store.list_profiles(version)?;
                self.listings.insert(version.clone(), refs.clone());
                refs
            }
        };

        refs.into_iter()
            .map(|reference| {
                let profile = self.load(store, &reference)?;
                Ok((reference, profile))
            })
            .collect()
    }

    pub fn load<S>(&mut self, store: &S, reference: &ProfileRef) -> Result<Arc<Profile>, StoreError>
    where
        S: ProfileStore + ?Sized,
    {
        if let Some(profile) = self.profiles.get(reference) {
            self.hits += 1;
            return Ok(Arc::clone(profile));
        }
        self.misses += 1;
        let profile = Arc::new(store.load(reference)?);
        self.profiles.insert(reference.clone(), Arc::clone(&profile));
        Ok(profile)
    }

    /// (hits, misses) of profile loads
    pub fn stats(&self) -> (usize, usize) {
        (self.hits, self.misses)
    }
}

/// Find the nearest ancestor profile with an equal configuration
///
/// # Errors
/// Only collaborator failures are errors; a missing baseline is
/// [`Pairing::NotFound`].
pub fn find_baseline<H, S>(
    target: &VersionId,
    configuration: &Configuration,
    history: &H,
    store: &S,
    cache: &mut ProfileCache,
) -> Result<Pairing, StoreError>
where
    H: VersionHistory + ?Sized,
    S: ProfileStore + ?Sized,
{
    let mut seen: FnvHashSet<VersionId> = FnvHashSet::default();
    seen.insert(target.clone());

    let mut queue: VecDeque<VersionId> = VecDeque::new();
    for parent in history.parents(target)? {
        if seen.insert(parent.clone()) {
            queue.push_back(parent);
        }
    }

    let mut visited = 0;
    while let Some(version) = queue.pop_front() {
        visited += 1;
        tracing::debug!("Looking for baseline of {} in {}", target.short(), version.short());

        for (reference, profile) in cache.profiles_of(store, &version)? {
            if profile.configuration == *configuration {
                return Ok(Pairing::Found {
                    version,
                    reference,
                    profile,
                    visited,
                });
            }
        }

        if history.is_root(&version)? {
            continue;
        }
        for parent in history.parents(&version)? {
            if seen.insert(parent.clone()) {
                queue.push_back(parent);
            }
        }
    }

    tracing::debug!(
        "No baseline for '{}' after {} ancestors of {}",
        configuration,
        visited,
        target.short()
    );
    Ok(Pairing::NotFound { visited })
}
