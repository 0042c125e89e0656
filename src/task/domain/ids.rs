//! Identifier types for specifications and their tasks.

use super::TaskDomainError;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Separator between the spec and task segments of a [`TaskKey`].
pub const KEY_SEPARATOR: char = ':';

/// Validates an identifier segment shared by spec and task ids.
fn validate_segment(raw: &str) -> Option<&str> {
    let trimmed = raw.trim();
    let is_valid = !trimmed.is_empty()
        && !trimmed.chars().any(char::is_whitespace)
        && !trimmed.contains(KEY_SEPARATOR)
        && !trimmed.contains(['/', '\\', '|']);
    is_valid.then_some(trimmed)
}

/// Identifier of a specification (a larger unit of work owning tasks).
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct SpecId(String);

impl SpecId {
    /// Creates a validated spec identifier.
    ///
    /// # Errors
    ///
    /// Returns [`TaskDomainError::InvalidSpecId`] when the value is empty,
    /// contains whitespace, path separators, `|`, or the key separator.
    pub fn new(value: impl Into<String>) -> Result<Self, TaskDomainError> {
        let raw = value.into();
        validate_segment(&raw)
            .map(|valid| Self(valid.to_owned()))
            .ok_or(TaskDomainError::InvalidSpecId(raw))
    }

    /// Returns the identifier as `str`.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl TryFrom<String> for SpecId {
    type Error = TaskDomainError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<SpecId> for String {
    fn from(value: SpecId) -> Self {
        value.0
    }
}

impl AsRef<str> for SpecId {
    fn as_ref(&self) -> &str {
        self.as_str()
    }
}

impl fmt::Display for SpecId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Identifier of a task, unique within its owning spec.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct TaskId(String);

impl TaskId {
    /// Creates a validated task identifier.
    ///
    /// # Errors
    ///
    /// Returns [`TaskDomainError::InvalidTaskId`] when the value is empty,
    /// contains whitespace, path separators, `|`, or the key separator.
    pub fn new(value: impl Into<String>) -> Result<Self, TaskDomainError> {
        let raw = value.into();
        validate_segment(&raw)
            .map(|valid| Self(valid.to_owned()))
            .ok_or(TaskDomainError::InvalidTaskId(raw))
    }

    /// Returns the identifier as `str`.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl TryFrom<String> for TaskId {
    type Error = TaskDomainError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<TaskId> for String {
    fn from(value: TaskId) -> Self {
        value.0
    }
}

impl AsRef<str> for TaskId {
    fn as_ref(&self) -> &str {
        self.as_str()
    }
}

impl fmt::Display for TaskId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Globally unique task reference, rendered as `specId:taskId`.
///
/// Ordering is lexicographic by spec then task, which is the final
/// tie-break used when ranking candidates.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct TaskKey {
    spec_id: SpecId,
    task_id: TaskId,
}

impl TaskKey {
    /// Creates a key from its two segments.
    #[must_use]
    pub const fn new(spec_id: SpecId, task_id: TaskId) -> Self {
        Self { spec_id, task_id }
    }

    /// Creates a key from raw string segments.
    ///
    /// # Errors
    ///
    /// Returns a [`TaskDomainError`] when either segment is invalid.
    pub fn from_parts(
        spec_id: impl Into<String>,
        task_id: impl Into<String>,
    ) -> Result<Self, TaskDomainError> {
        Ok(Self::new(SpecId::new(spec_id)?, TaskId::new(task_id)?))
    }

    /// Parses a dependency reference.
    ///
    /// A bare `taskId` resolves to `owner`; a qualified `specId:taskId`
    /// reference may point at another spec.
    ///
    /// # Errors
    ///
    /// Returns [`TaskDomainError::InvalidTaskKey`] when the reference has
    /// more than one separator or an invalid segment.
    pub fn parse_reference(raw: &str, owner: &SpecId) -> Result<Self, TaskDomainError> {
        if raw.contains(KEY_SEPARATOR) {
            return raw.parse();
        }
        let task_id =
            TaskId::new(raw).map_err(|_| TaskDomainError::InvalidTaskKey(raw.to_owned()))?;
        Ok(Self::new(owner.clone(), task_id))
    }

    /// Returns the owning spec identifier.
    #[must_use]
    pub const fn spec_id(&self) -> &SpecId {
        &self.spec_id
    }

    /// Returns the task identifier within the spec.
    #[must_use]
    pub const fn task_id(&self) -> &TaskId {
        &self.task_id
    }
}

impl std::str::FromStr for TaskKey {
    type Err = TaskDomainError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        let invalid = || TaskDomainError::InvalidTaskKey(value.to_owned());
        let mut segments = value.trim().split(KEY_SEPARATOR);
        let spec = segments.next().ok_or_else(invalid)?;
        let task = segments.next().ok_or_else(invalid)?;
        if segments.next().is_some() {
            return Err(invalid());
        }
        Self::from_parts(spec, task).map_err(|_| invalid())
    }
}

impl TryFrom<String> for TaskKey {
    type Error = TaskDomainError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<TaskKey> for String {
    fn from(value: TaskKey) -> Self {
        value.to_string()
    }
}

impl fmt::Display for TaskKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{KEY_SEPARATOR}{}", self.spec_id, self.task_id)
    }
}
