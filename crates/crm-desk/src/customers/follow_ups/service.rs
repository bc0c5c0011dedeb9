use std::sync::Arc;

use chrono::FixedOffset;
use tracing::{debug, info, warn};

use crate::agent::{AgentContext, Role};
use crate::config::FollowUpConfig;

use super::clock::{Clock, DayWindow, SystemClock};
use super::domain::{
    CustomerId, FollowUp, FollowUpDraft, FollowUpEntry, FollowUpId, FollowUpStatus, Lookup,
    StatusUpdate, TargetStatus,
};
use super::pagination::{Page, PageRequest};
use super::repository::{
    FollowUpQuery, FollowUpRepository, ListScope, RepositoryError, StatusChange,
};
use super::validation::{
    ensure_not_past, is_storable_id, normalize_content, parse_include_cancelled,
    parse_scheduled_at, ValidationError,
};

/// Service composing validation, the clock, and the repository for follow-up operations.
pub struct FollowUpService<R> {
    repository: Arc<R>,
    clock: Arc<dyn Clock>,
    config: FollowUpConfig,
}

impl<R> FollowUpService<R>
where
    R: FollowUpRepository + 'static,
{
    pub fn new(repository: Arc<R>, config: FollowUpConfig) -> Self {
        Self::with_clock(repository, Arc::new(SystemClock), config)
    }

    pub fn with_clock(repository: Arc<R>, clock: Arc<dyn Clock>, config: FollowUpConfig) -> Self {
        Self {
            repository,
            clock,
            config,
        }
    }

    /// Validates raw `page`/`limit` query values against the configured bounds.
    pub fn page_request(
        &self,
        page: Option<&str>,
        limit: Option<&str>,
    ) -> Result<PageRequest, ValidationError> {
        PageRequest::parse(page, limit, self.config.default_limit, self.config.max_limit)
    }

    /// Schedule a new pending follow-up for `customer_id`, owned by the calling agent.
    pub async fn create(
        &self,
        customer_id: CustomerId,
        agent: &AgentContext,
        draft: FollowUpDraft,
    ) -> Result<FollowUp, FollowUpError> {
        ensure_can_manage(agent)?;

        let content = normalize_content(draft.content.as_deref())?;
        let scheduled_at = parse_scheduled_at(draft.date.as_deref(), self.offset_for(agent))?;
        ensure_not_past(scheduled_at, self.clock.now())?;
        if !is_storable_id(&customer_id.0) {
            return Err(FollowUpError::CustomerNotFound(customer_id));
        }

        let follow_up = FollowUp {
            id: FollowUpId::generate(),
            scheduled_at,
            content,
            customer_id,
            agent_id: agent.id.clone(),
            status: FollowUpStatus::Pending,
        };

        let stored = self
            .repository
            .insert(follow_up)
            .await
            .map_err(|err| match err {
                RepositoryError::MissingCustomer(id) => FollowUpError::CustomerNotFound(id),
                other => FollowUpError::Persistence(other),
            })?;

        info!(
            follow_up_id = %stored.id,
            customer_id = %stored.customer_id,
            agent_id = %stored.agent_id,
            scheduled_at = %stored.scheduled_at,
            "follow-up scheduled"
        );
        Ok(stored)
    }

    /// Move an owned follow-up to `completed` or `cancelled`.
    pub async fn update_status(
        &self,
        id: &FollowUpId,
        agent: &AgentContext,
        update: StatusUpdate,
    ) -> Result<FollowUp, FollowUpError> {
        ensure_can_manage(agent)?;

        let requested = update.status.as_deref().unwrap_or_default();
        let target = FollowUpStatus::from(TargetStatus::parse(requested)?);
        if !is_storable_id(&id.0) {
            return Err(self.not_found(id, agent));
        }
        let expected = self
            .config
            .strict_transitions
            .then_some(FollowUpStatus::Pending);

        let change = StatusChange {
            id: id.clone(),
            agent_id: agent.id.clone(),
            expected,
            status: target,
        };

        match self.repository.update_status(change).await? {
            Lookup::Found(updated) => {
                info!(
                    follow_up_id = %updated.id,
                    agent_id = %updated.agent_id,
                    status = %updated.status,
                    "follow-up status updated"
                );
                Ok(updated)
            }
            Lookup::NotFound if expected.is_some() => {
                // The conditional write missed: either nothing owned matches, or it is terminal.
                match self.repository.find_owned(id, &agent.id).await? {
                    Lookup::Found(current) if !current.status.can_transition_to(target) => {
                        warn!(
                            follow_up_id = %id,
                            agent_id = %agent.id,
                            from = %current.status,
                            to = %target,
                            "rejected status transition"
                        );
                        Err(FollowUpError::InvalidTransition {
                            from: current.status,
                            to: target,
                        })
                    }
                    _ => Err(self.not_found(id, agent)),
                }
            }
            Lookup::NotFound => Err(self.not_found(id, agent)),
        }
    }

    /// Ranked page of the agent's follow-ups for one customer.
    pub async fn list_for_customer(
        &self,
        customer_id: CustomerId,
        agent: &AgentContext,
        page: PageRequest,
        include_cancelled: bool,
    ) -> Result<Page<FollowUpEntry>, FollowUpError> {
        if !is_storable_id(&customer_id.0) {
            return Ok(Page::new(Vec::new(), 0, page));
        }
        self.list(
            agent,
            ListScope::Customer {
                customer_id,
                include_cancelled,
            },
            page,
        )
        .await
    }

    /// Pending follow-ups scheduled within the agent's current local day, across customers.
    pub async fn list_due_today(
        &self,
        agent: &AgentContext,
        page: PageRequest,
    ) -> Result<Page<FollowUpEntry>, FollowUpError> {
        self.list(agent, ListScope::DueToday, page).await
    }

    /// Parses the raw `includeCancelled` query value.
    pub fn include_cancelled(&self, raw: Option<&str>) -> Result<bool, ValidationError> {
        parse_include_cancelled(raw)
    }

    async fn list(
        &self,
        agent: &AgentContext,
        scope: ListScope,
        page: PageRequest,
    ) -> Result<Page<FollowUpEntry>, FollowUpError> {
        let query = FollowUpQuery {
            agent_id: agent.id.clone(),
            scope,
            today: self.today_for(agent),
            page,
        };
        let listing = self.repository.list(&query).await?;
        debug!(
            agent_id = %agent.id,
            scope = ?query.scope,
            total = listing.total,
            page = page.page(),
            "listed follow-ups"
        );
        Ok(Page::new(listing.entries, listing.total, page))
    }

    /// The agent's current local day as a UTC window.
    fn today_for(&self, agent: &AgentContext) -> DayWindow {
        DayWindow::containing(self.clock.now(), self.offset_for(agent))
    }

    fn offset_for(&self, agent: &AgentContext) -> FixedOffset {
        agent.utc_offset.unwrap_or(self.config.default_utc_offset)
    }

    fn not_found(&self, id: &FollowUpId, agent: &AgentContext) -> FollowUpError {
        warn!(follow_up_id = %id, agent_id = %agent.id, "follow-up not found for agent");
        FollowUpError::FollowUpNotFound(id.clone())
    }
}

fn ensure_can_manage(agent: &AgentContext) -> Result<(), FollowUpError> {
    if agent.role.can_manage_follow_ups() {
        Ok(())
    } else {
        Err(FollowUpError::Forbidden { role: agent.role })
    }
}

/// Error raised by the follow-up service.
#[derive(Debug, thiserror::Error)]
pub enum FollowUpError {
    #[error(transparent)]
    Validation(#[from] ValidationError),
    #[error("Follow-up {0} not found")]
    FollowUpNotFound(FollowUpId),
    #[error("Customer {0} not found")]
    CustomerNotFound(CustomerId),
    #[error("Follow-up is already {from} and cannot become {to}")]
    InvalidTransition {
        from: FollowUpStatus,
        to: FollowUpStatus,
    },
    #[error("role '{}' may not change follow-ups", .role.label())]
    Forbidden { role: Role },
    #[error("follow-up storage failed: {0}")]
    Persistence(#[from] RepositoryError),
}

impl FollowUpError {
    /// Stable machine-readable code carried in error bodies.
    pub fn code(&self) -> &'static str {
        match self {
            Self::Validation(_) => "validation_error",
            Self::FollowUpNotFound(_) | Self::CustomerNotFound(_) => "not_found",
            Self::InvalidTransition { .. } => "invalid_transition",
            Self::Forbidden { .. } => "forbidden",
            Self::Persistence(_) => "persistence_error",
        }
    }
}
