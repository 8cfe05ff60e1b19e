//! Collaborator interfaces for profile storage and version history
//!
//! The checking core never walks a VCS or reads the object store itself. It
//! consumes these two traits read-only. [`MemoryStore`] and [`MemoryHistory`]
//! are in-memory implementations used by tests and by embedders that already
//! hold their profiles in memory.

use crate::profile::{Profile, ProfileDocument};
use fnv::FnvHashMap;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::fmt;
use thiserror::Error;

/// Opaque identifier of a version (e.g. a commit checksum)
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct VersionId(String);

impl VersionId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// First six characters, as shown in reports
    pub fn short(&self) -> &str {
        self.0.get(..6).unwrap_or(&self.0)
    }
}

impl fmt::Display for VersionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for VersionId {
    fn from(id: &str) -> Self {
        Self::new(id)
    }
}

/// Opaque token referring to one stored profile
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ProfileRef(String);

impl ProfileRef {
    pub fn new(reference: impl Into<String>) -> Self {
        Self(reference.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ProfileRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Failures reported by storage and history collaborators
#[derive(Error, Debug)]
pub enum StoreError {
    #[error("Unknown version: {0}")]
    UnknownVersion(VersionId),

    #[error("Unknown profile: {0}")]
    UnknownProfile(ProfileRef),

    #[error("Malformed profile {reference}: {source}")]
    Malformed {
        reference: String,
        #[source]
        source: serde_json::Error,
    },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Version graph traversal capability
pub trait VersionHistory {
    /// Direct parents, most relevant (first) parent first
    fn parents(&self, version: &VersionId) -> Result<Vec<VersionId>, StoreError>;

    fn is_root(&self, version: &VersionId) -> Result<bool, StoreError>;
}

/// Read access to the profiles attached to versions
pub trait ProfileStore {
    fn list_profiles(&self, version: &VersionId) -> Result<Vec<ProfileRef>, StoreError>;

    fn load(&self, reference: &ProfileRef) -> Result<Profile, StoreError>;
}

/// In-memory version graph
#[derive(Debug, Clone, Default)]
pub struct MemoryHistory {
    parents: FnvHashMap<VersionId, Vec<VersionId>>,
}

impl MemoryHistory {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a version with its parents (first parent first)
    pub fn add_version<I, V>(&mut self, version: impl Into<VersionId>, parents: I)
    where
        I: IntoIterator<Item = V>,
        V: Into<VersionId>,
    {
        self.parents.insert(
            version.into(),
            parents.into_iter().map(Into::into).collect(),
        );
    }

    pub fn len(&self) -> usize {
        self.parents.len()
    }

    pub fn is_empty(&self) -> bool {
        self.parents.is_empty()
    }
}

impl VersionHistory for MemoryHistory {
    fn parents(&self, version: &VersionId) -> Result<Vec<VersionId>, StoreError> {
        self.parents
            .get(version)
            .cloned()
            .ok_or_else(|| StoreError::UnknownVersion(version.clone()))
    }

    fn is_root(&self, version: &VersionId) -> Result<bool, StoreError> {
        self.parents
            .get(version)
            .map(Vec::is_empty)
            .ok_or_else(|| StoreError::UnknownVersion(version.clone()))
    }
}

/// In-memory, content-addressed profile store
///
/// References are the SHA-256 digest of the serialized profile document, so
/// registering the same profile twice yields the same reference.
#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
    objects: FnvHashMap<ProfileRef, Profile>,
    index: FnvHashMap<VersionId, Vec<ProfileRef>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Attach a profile to a version and return its reference
    pub fn insert(
        &mut self,
        version: impl Into<VersionId>,
        profile: Profile,
    ) -> Result<ProfileRef, StoreError> {
        let reference = content_address(&ProfileDocument::from(&profile))?;
        self.objects.insert(reference.clone(), profile);

        let refs = self.index.entry(version.into()).or_default();
        if !refs.contains(&reference) {
            refs.push(reference.clone());
        }
        Ok(reference)
    }
}

impl ProfileStore for MemoryStore {
    fn list_profiles(&self, version: &VersionId) -> Result<Vec<ProfileRef>, StoreError> {
        Ok(self.index.get(version).cloned().unwrap_or_default())
    }

    fn load(&self, reference: &ProfileRef) -> Result<Profile, StoreError> {
        self.objects
            .get(reference)
            .cloned()
            .ok_or_else(|| StoreError::UnknownProfile(reference.clone()))
    }
}

/// SHA-256 hex digest of the serialized document
pub fn content_address(document: &ProfileDocument) -> Result<ProfileRef, StoreError> {
    let bytes = serde_json::to_vec(document).map_err(|source| StoreError::Malformed {
        reference: "<unsaved>".to_string(),
        source,
    })?;
    Ok(ProfileRef(hex::encode(Sha256::digest(&bytes))))
}
