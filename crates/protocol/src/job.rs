//! Wire-shaped job data: the part of a job that crosses the bus or gets
//! written to the `build-queue` snapshot. Coordinator-only bookkeeping
//! (assigned node, replacement, log handle) lives in `repoforge-coordinator`.

use std::collections::BTreeSet;
use std::fmt;

use serde::{Deserialize, Serialize};

/// Numeric build-class tiers, ordered. `Heavy` jobs only run on
/// equal-or-stronger builders.
pub const CLASS_SMALL: u8 = 0;
pub const CLASS_MEDIUM: u8 = 1;
pub const CLASS_HEAVY: u8 = 2;

/// A job's required build capability: either a numeric tier (any builder at
/// or above that tier may run it) or a sticky builder name (only that exact
/// builder's pure name may run it). Modeled as a tagged sum type per the
/// design notes rather than an overloaded field.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum BuildClass {
    Numeric(u8),
    Sticky(String),
}

impl BuildClass {
    pub fn small() -> Self {
        BuildClass::Numeric(CLASS_SMALL)
    }

    pub fn medium() -> Self {
        BuildClass::Numeric(CLASS_MEDIUM)
    }

    pub fn heavy() -> Self {
        BuildClass::Numeric(CLASS_HEAVY)
    }

    /// Whether a builder with the given numeric class and pure name can run
    /// a job requiring this build class.
    pub fn runnable_on(&self, node_class: u8, node_pure_name: &str) -> bool {
        match self {
            BuildClass::Numeric(c) => node_class >= *c,
            BuildClass::Sticky(name) => name == node_pure_name,
        }
    }
}

impl fmt::Display for BuildClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BuildClass::Numeric(0) => write!(f, "small"),
            BuildClass::Numeric(1) => write!(f, "medium"),
            BuildClass::Numeric(2) => write!(f, "heavy"),
            BuildClass::Numeric(n) => write!(f, "class-{n}"),
            BuildClass::Sticky(name) => write!(f, "sticky:{name}"),
        }
    }
}

/// Characters allowed in a `pkgbase`: alphanumerics, `-`, `_`, `+`, `.`.
fn is_valid_pkg_char(c: char) -> bool {
    c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '+' | '.')
}

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
#[error("invalid pkgbase: {0:?}")]
pub struct InvalidPkgBase(pub String);

/// A validated package-recipe identity. Construction is the only place
/// the pkgbase character-class rule is enforced.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct PkgBase(String);

impl PkgBase {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl TryFrom<String> for PkgBase {
    type Error = InvalidPkgBase;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        if value.is_empty() || !value.chars().all(is_valid_pkg_char) {
            return Err(InvalidPkgBase(value));
        }
        Ok(PkgBase(value))
    }
}

impl From<PkgBase> for String {
    fn from(value: PkgBase) -> Self {
        value.0
    }
}

impl fmt::Display for PkgBase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// The primary key for a queued job: `target_repo/arch/pkgbase`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct JobKey {
    pub target_repo: String,
    pub arch: String,
    pub pkgbase: PkgBase,
}

impl fmt::Display for JobKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}/{}", self.target_repo, self.arch, self.pkgbase)
    }
}

/// The savable projection of a job: what gets written into the
/// `build-queue` snapshot and what `AddJobsToQueue` accepts per package.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SavableJob {
    pub pkgbase: PkgBase,
    pub target_repo: String,
    pub source_repo: String,
    pub arch: String,
    pub build_class: BuildClass,
    #[serde(default, skip_serializing_if = "BTreeSet::is_empty")]
    pub pkgnames: BTreeSet<String>,
    #[serde(default, skip_serializing_if = "BTreeSet::is_empty")]
    pub dependencies: BTreeSet<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub commit: Option<String>,
}

impl SavableJob {
    pub fn key(&self) -> JobKey {
        JobKey {
            target_repo: self.target_repo.clone(),
            arch: self.arch.clone(),
            pkgbase: self.pkgbase.clone(),
        }
    }
}

/// `build-queue` wire envelope: the saved jobs plus the coordinator version
/// that produced them. A version mismatch on restart discards the snapshot.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SavedQueue {
    pub save_queue: Vec<SavableJob>,
    pub version: u32,
}
