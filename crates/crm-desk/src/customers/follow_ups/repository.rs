use async_trait::async_trait;

use crate::agent::AgentId;

use super::clock::DayWindow;
use super::domain::{CustomerId, FollowUp, FollowUpEntry, FollowUpId, FollowUpStatus, Lookup};
use super::pagination::PageRequest;

/// Which rows a list query selects, always within one agent's follow-ups.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ListScope {
    Customer {
        customer_id: CustomerId,
        include_cancelled: bool,
    },
    /// Pending follow-ups inside the agent's current day, across all customers.
    DueToday,
}

impl ListScope {
    /// Notification entries carry the customer they concern.
    pub fn attaches_customer(&self) -> bool {
        matches!(self, ListScope::DueToday)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FollowUpQuery {
    pub agent_id: AgentId,
    pub scope: ListScope,
    pub today: DayWindow,
    pub page: PageRequest,
}

/// One ranked page of entries plus the total number of matching rows.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Listing {
    pub entries: Vec<FollowUpEntry>,
    pub total: u64,
}

/// Status write scoped by identifier and owner in a single predicate.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StatusChange {
    pub id: FollowUpId,
    pub agent_id: AgentId,
    /// When set, the write only applies if the stored status still equals this value.
    pub expected: Option<FollowUpStatus>,
    pub status: FollowUpStatus,
}

/// Storage abstraction so the service module can be exercised in isolation.
#[async_trait]
pub trait FollowUpRepository: Send + Sync {
    /// Persists a new record and returns it as stored.
    async fn insert(&self, follow_up: FollowUp) -> Result<FollowUp, RepositoryError>;

    async fn find_owned(
        &self,
        id: &FollowUpId,
        agent_id: &AgentId,
    ) -> Result<Lookup<FollowUp>, RepositoryError>;

    /// Applies the change and returns the updated record, or `NotFound` when no owned row
    /// matched (including a mismatched `expected` status).
    async fn update_status(&self, change: StatusChange)
        -> Result<Lookup<FollowUp>, RepositoryError>;

    async fn list(&self, query: &FollowUpQuery) -> Result<Listing, RepositoryError>;
}

/// Error enumeration for repository failures.
#[derive(Debug, thiserror::Error)]
pub enum RepositoryError {
    #[error("customer {0} does not exist")]
    MissingCustomer(CustomerId),
    #[error("stored follow-up is malformed: {0}")]
    Corrupt(String),
    #[error("repository unavailable: {0}")]
    Unavailable(String),
    #[error(transparent)]
    Database(#[from] sqlx::Error),
}
