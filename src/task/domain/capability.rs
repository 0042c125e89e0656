//! Capability tags and the agent descriptor used for matching.

use super::TaskDomainError;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;

/// Ordered set of capability tags.
///
/// Tags are normalised to lowercase so matching is case-insensitive.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "Vec<String>", into = "Vec<String>")]
pub struct CapabilitySet(BTreeSet<String>);

impl CapabilitySet {
    /// Creates an empty capability set.
    #[must_use]
    pub const fn empty() -> Self {
        Self(BTreeSet::new())
    }

    /// Creates a capability set from raw tags.
    ///
    /// # Errors
    ///
    /// Returns [`TaskDomainError::InvalidCapability`] when a tag is empty or
    /// contains whitespace.
    pub fn from_tags<I, S>(tags: I) -> Result<Self, TaskDomainError>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut set = BTreeSet::new();
        for tag in tags {
            let raw = tag.as_ref();
            let normalized = raw.trim().to_ascii_lowercase();
            if normalized.is_empty() || normalized.chars().any(char::is_whitespace) {
                return Err(TaskDomainError::InvalidCapability(raw.to_owned()));
            }
            set.insert(normalized);
        }
        Ok(Self(set))
    }

    /// Returns `true` when every tag in `self` is declared by `other`.
    #[must_use]
    pub fn is_subset_of(&self, other: &Self) -> bool {
        self.0.is_subset(&other.0)
    }

    /// Returns the tags of `self` that `declared` lacks.
    #[must_use]
    pub fn missing_from(&self, declared: &Self) -> Vec<String> {
        self.0.difference(&declared.0).cloned().collect()
    }

    /// Returns `true` when the set holds no tags.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Returns the number of tags.
    #[must_use]
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Iterates over the tags in order.
    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.0.iter().map(String::as_str)
    }
}

impl TryFrom<Vec<String>> for CapabilitySet {
    type Error = TaskDomainError;

    fn try_from(value: Vec<String>) -> Result<Self, Self::Error> {
        Self::from_tags(value)
    }
}

impl From<CapabilitySet> for Vec<String> {
    fn from(value: CapabilitySet) -> Self {
        value.0.into_iter().collect()
    }
}

impl fmt::Display for CapabilitySet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let tags: Vec<&str> = self.iter().collect();
        write!(f, "{{{}}}", tags.join(", "))
    }
}

/// How a task's requirements relate to an agent's declared capabilities.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CapabilityFit {
    /// The task declares no requirements.
    Unconstrained,
    /// Requirements and declared capabilities are identical.
    Exact,
    /// The agent declares every requirement plus others.
    Superset,
    /// The agent lacks at least one requirement.
    Missing,
}

/// Trims and checks an agent type.
///
/// Agent types end up in a Markdown table cell, so they may not contain a
/// cell separator or a line break, and may not be the empty-cell marker.
///
/// # Errors
///
/// Returns [`TaskDomainError::EmptyAgentType`] for a blank value and
/// [`TaskDomainError::InvalidAgentType`] for one the board cannot hold.
pub fn validate_agent_type(raw: &str) -> Result<&str, TaskDomainError> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return Err(TaskDomainError::EmptyAgentType);
    }
    if trimmed == "-" || trimmed.chars().any(|c| c == '|' || c.is_control()) {
        return Err(TaskDomainError::InvalidAgentType(trimmed.to_owned()));
    }
    Ok(trimmed)
}

/// Describes an agent for matching purposes; never persisted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AgentDescriptor {
    agent_type: String,
    capabilities: CapabilitySet,
}

impl AgentDescriptor {
    /// Creates a descriptor for the given agent type.
    ///
    /// # Errors
    ///
    /// Returns [`TaskDomainError::EmptyAgentType`] when the agent type is
    /// blank and [`TaskDomainError::InvalidAgentType`] when it fails
    /// [`validate_agent_type`].
    pub fn new(
        agent_type: impl Into<String>,
        capabilities: CapabilitySet,
    ) -> Result<Self, TaskDomainError> {
        let raw = agent_type.into();
        Ok(Self {
            agent_type: validate_agent_type(&raw)?.to_owned(),
            capabilities,
        })
    }

    /// Returns the agent type tag.
    #[must_use]
    pub fn agent_type(&self) -> &str {
        &self.agent_type
    }

    /// Returns the declared capabilities.
    #[must_use]
    pub const fn capabilities(&self) -> &CapabilitySet {
        &self.capabilities
    }

    /// Classifies how `required` relates to this agent's capabilities.
    #[must_use]
    pub fn fit_for(&self, required: &CapabilitySet) -> CapabilityFit {
        if !required.is_subset_of(&self.capabilities) {
            CapabilityFit::Missing
        } else if required.is_empty() {
            CapabilityFit::Unconstrained
        } else if required.len() == self.capabilities.len() {
            CapabilityFit::Exact
        } else {
            CapabilityFit::Superset
        }
    }
}
