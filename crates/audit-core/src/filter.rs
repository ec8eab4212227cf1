//! Principal filtering
//!
//! A [`ContentFilter`] decides which principals participate in a report.
//! Group membership is looked up through a [`PrincipalRegistry`], which the
//! host's user/group directory implements.

use crate::error::ConfigError;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fmt::Debug;
use std::sync::Arc;

/// User/group directory capability
pub trait PrincipalRegistry: Send + Sync + Debug {
    /// Whether `name` is a known group
    fn is_group(&self, name: &str) -> bool;

    /// Whether `name` is a known user
    fn is_user(&self, name: &str) -> bool;
}

/// Registry backed by two fixed name sets
#[derive(Debug, Clone, Default)]
pub struct InMemoryRegistry {
    groups: HashSet<String>,
    users: HashSet<String>,
}

impl InMemoryRegistry {
    /// Create empty registry
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Register groups
    #[must_use]
    pub fn with_groups<I, S>(mut self, groups: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.groups.extend(groups.into_iter().map(Into::into));
        self
    }

    /// Register users
    #[must_use]
    pub fn with_users<I, S>(mut self, users: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.users.extend(users.into_iter().map(Into::into));
        self
    }
}

impl PrincipalRegistry for InMemoryRegistry {
    fn is_group(&self, name: &str) -> bool {
        self.groups.contains(name)
    }

    fn is_user(&self, name: &str) -> bool {
        self.users.contains(name)
    }
}

/// Policy predicate over principal names
///
/// Must be total and side-effect free: any string, including the empty
/// string, yields a deterministic answer.
pub trait ContentFilter: Send + Sync + Debug {
    /// Whether `principal` participates in the report
    fn accepts(&self, principal: &str) -> bool;
}

/// Accepts every principal
#[derive(Debug, Clone, Copy, Default)]
pub struct AcceptsAllContent;

impl ContentFilter for AcceptsAllContent {
    #[inline]
    fn accepts(&self, _principal: &str) -> bool {
        true
    }
}

/// Accepts principals the registry knows as groups
///
/// Names missing from both registries are treated as "not a group".
#[derive(Debug, Clone)]
pub struct AcceptsGroupOnly {
    registry: Arc<dyn PrincipalRegistry>,
}

impl AcceptsGroupOnly {
    /// Create filter over `registry`
    #[inline]
    #[must_use]
    pub fn new(registry: Arc<dyn PrincipalRegistry>) -> Self {
        Self { registry }
    }
}

impl ContentFilter for AcceptsGroupOnly {
    #[inline]
    fn accepts(&self, principal: &str) -> bool {
        self.registry.is_group(principal)
    }
}

/// Configurable filter choice
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum FilterPolicy {
    /// [`AcceptsAllContent`]
    #[default]
    All,
    /// [`AcceptsGroupOnly`]
    GroupsOnly,
}

impl FilterPolicy {
    /// Instantiate the filter
    ///
    /// # Errors
    /// - `ConfigError::MissingRegistry` for `GroupsOnly` without a registry
    pub fn build(
        self,
        registry: Option<Arc<dyn PrincipalRegistry>>,
    ) -> Result<Arc<dyn ContentFilter>, ConfigError> {
        match self {
            Self::All => Ok(Arc::new(AcceptsAllContent)),
            Self::GroupsOnly => registry
                .map(|r| Arc::new(AcceptsGroupOnly::new(r)) as Arc<dyn ContentFilter>)
                .ok_or(ConfigError::MissingRegistry),
        }
    }
}
