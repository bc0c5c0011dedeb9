use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::agent::AgentId;

use super::validation::ValidationError;

/// Identifier wrapper for follow-ups.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct FollowUpId(pub String);

impl FollowUpId {
    pub fn generate() -> Self {
        Self(uuid::Uuid::new_v4().to_string())
    }
}

impl fmt::Display for FollowUpId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Reference to a customer record owned by the CRM core.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CustomerId(pub String);

impl fmt::Display for CustomerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Lifecycle of a follow-up. `Completed` and `Cancelled` are terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FollowUpStatus {
    Pending,
    Completed,
    Cancelled,
}

impl FollowUpStatus {
    pub fn label(self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Completed => "completed",
            Self::Cancelled => "cancelled",
        }
    }

    pub fn parse(raw: &str) -> Option<Self> {
        match raw {
            "pending" => Some(Self::Pending),
            "completed" => Some(Self::Completed),
            "cancelled" => Some(Self::Cancelled),
            _ => None,
        }
    }

    pub fn can_transition_to(self, next: FollowUpStatus) -> bool {
        matches!(
            (self, next),
            (Self::Pending, Self::Completed) | (Self::Pending, Self::Cancelled)
        )
    }
}

impl fmt::Display for FollowUpStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Statuses a caller may request through an update.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TargetStatus {
    Completed,
    Cancelled,
}

impl TargetStatus {
    pub fn parse(raw: &str) -> Result<Self, ValidationError> {
        match raw.trim() {
            "completed" => Ok(Self::Completed),
            "cancelled" => Ok(Self::Cancelled),
            other => Err(ValidationError::InvalidStatus {
                value: other.to_string(),
            }),
        }
    }
}

impl From<TargetStatus> for FollowUpStatus {
    fn from(value: TargetStatus) -> Self {
        match value {
            TargetStatus::Completed => Self::Completed,
            TargetStatus::Cancelled => Self::Cancelled,
        }
    }
}

/// Persisted follow-up record, serialized in the shape the browser client consumes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FollowUp {
    pub id: FollowUpId,
    #[serde(rename = "date")]
    pub scheduled_at: DateTime<Utc>,
    pub content: String,
    pub customer_id: CustomerId,
    pub agent_id: AgentId,
    pub status: FollowUpStatus,
}

/// Projection of the customer record used to label notification entries.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CustomerSummary {
    pub id: CustomerId,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub external_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub username: Option<String>,
}

impl CustomerSummary {
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: CustomerId(id.into()),
            external_id: None,
            username: None,
        }
    }
}

/// List item: the record plus, for the due-today feed, the customer it concerns.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FollowUpEntry {
    #[serde(flatten)]
    pub follow_up: FollowUp,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub customer: Option<CustomerSummary>,
}

impl From<FollowUp> for FollowUpEntry {
    fn from(follow_up: FollowUp) -> Self {
        Self {
            follow_up,
            customer: None,
        }
    }
}

/// Create payload as posted by the client. Fields stay optional so that missing values surface
/// as validation errors instead of body rejections.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct FollowUpDraft {
    #[serde(default)]
    pub content: Option<String>,
    #[serde(default)]
    pub date: Option<String>,
}

impl FollowUpDraft {
    pub fn new(content: impl Into<String>, date: impl Into<String>) -> Self {
        Self {
            content: Some(content.into()),
            date: Some(date.into()),
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct StatusUpdate {
    #[serde(default)]
    pub status: Option<String>,
}

impl StatusUpdate {
    pub fn to(status: &str) -> Self {
        Self {
            status: Some(status.to_string()),
        }
    }
}

/// Outcome of a lookup scoped by identifier and owner at once. A record owned by someone else
/// is indistinguishable from a missing one.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Lookup<T> {
    Found(T),
    NotFound,
}

impl<T> From<Option<T>> for Lookup<T> {
    fn from(value: Option<T>) -> Self {
        match value {
            Some(value) => Lookup::Found(value),
            None => Lookup::NotFound,
        }
    }
}
