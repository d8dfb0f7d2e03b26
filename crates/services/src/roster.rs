use std::fmt;
use std::str::FromStr;

use async_trait::async_trait;
use progress_core::model::{ChildId, ChildProfile, ParentId};

use crate::error::RosterError;

/// The cohort a dashboard is looking at.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum RosterScope {
    Child(ChildId),
    Parent(ParentId),
    All,
}

impl RosterScope {
    /// Stable cache key for this cohort.
    #[must_use]
    pub fn cache_key(&self) -> String {
        match self {
            RosterScope::Child(id) => format!("progress:child:{id}"),
            RosterScope::Parent(id) => format!("progress:parent:{id}"),
            RosterScope::All => "progress:all".to_owned(),
        }
    }

    #[must_use]
    pub fn includes(&self, child: &ChildProfile) -> bool {
        match self {
            RosterScope::Child(id) => &child.id == id,
            RosterScope::Parent(id) => child.parent_id.as_ref() == Some(id),
            RosterScope::All => true,
        }
    }

    /// Every scope whose cached aggregate contains `child`.
    #[must_use]
    pub fn scopes_containing(child: &ChildProfile) -> Vec<RosterScope> {
        let mut scopes = vec![RosterScope::Child(child.id.clone())];
        if let Some(parent) = &child.parent_id {
            scopes.push(RosterScope::Parent(parent.clone()));
        }
        scopes.push(RosterScope::All);
        scopes
    }
}

impl fmt::Display for RosterScope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RosterScope::Child(id) => write!(f, "child:{id}"),
            RosterScope::Parent(id) => write!(f, "parent:{id}"),
            RosterScope::All => f.write_str("all"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParseScopeError(pub String);

impl fmt::Display for ParseScopeError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "invalid scope {:?} (expected all, child:<id> or parent:<id>)",
            self.0
        )
    }
}

impl std::error::Error for ParseScopeError {}

impl FromStr for RosterScope {
    type Err = ParseScopeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let err = || ParseScopeError(s.to_owned());
        let trimmed = s.trim();
        if trimmed.eq_ignore_ascii_case("all") {
            return Ok(RosterScope::All);
        }
        match trimmed.split_once(':') {
            Some(("child", id)) => id.parse().map(RosterScope::Child).map_err(|_| err()),
            Some(("parent", id)) => id.parse().map(RosterScope::Parent).map_err(|_| err()),
            _ => Err(err()),
        }
    }
}

/// Source of child profiles.
#[async_trait]
pub trait RosterProvider: Send + Sync {
    /// List the children in `scope`.
    ///
    /// # Errors
    ///
    /// Returns `RosterError` if the roster cannot be read.
    async fn list_children(&self, scope: &RosterScope) -> Result<Vec<ChildProfile>, RosterError>;
}

/// Fixed roster held in memory, e.g. loaded once from a JSON file.
#[derive(Debug, Clone, Default)]
pub struct InMemoryRoster {
    children: Vec<ChildProfile>,
}

impl InMemoryRoster {
    #[must_use]
    pub fn new(children: Vec<ChildProfile>) -> Self {
        Self { children }
    }

    /// Parse a JSON array of child profiles.
    ///
    /// # Errors
    ///
    /// Returns `RosterError::Malformed` if the JSON does not describe profiles.
    pub fn from_json(raw: &str) -> Result<Self, RosterError> {
        serde_json::from_str(raw)
            .map(Self::new)
            .map_err(|err| RosterError::Malformed(err.to_string()))
    }
}

#[async_trait]
impl RosterProvider for InMemoryRoster {
    async fn list_children(&self, scope: &RosterScope) -> Result<Vec<ChildProfile>, RosterError> {
        Ok(self
            .children
            .iter()
            .filter(|child| scope.includes(child))
            .cloned()
            .collect())
    }
}
