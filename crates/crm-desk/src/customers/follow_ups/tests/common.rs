use std::sync::Arc;

use async_trait::async_trait;
use axum::body::Body;
use axum::http::{header, Request};
use axum::response::Response;
use axum::Router;
use chrono::{DateTime, Utc};
use serde_json::Value;

use crate::agent::{
    AgentContext, AgentId, Role, AGENT_ID_HEADER, AGENT_ROLE_HEADER, AGENT_UTC_OFFSET_HEADER,
};
use crate::config::FollowUpConfig;
use crate::customers::follow_ups::{
    follow_up_router, CustomerId, CustomerSummary, FixedClock, FollowUp, FollowUpDraft,
    FollowUpId, FollowUpQuery, FollowUpRepository, FollowUpService, InMemoryFollowUpRepository,
    Listing, Lookup, RepositoryError, StatusChange, StatusUpdate,
};

pub(super) const NOW: &str = "2025-01-10T10:00:00Z";

pub(super) fn instant(raw: &str) -> DateTime<Utc> {
    DateTime::parse_from_rfc3339(raw)
        .expect("valid rfc3339")
        .with_timezone(&Utc)
}

pub(super) fn agent() -> AgentContext {
    AgentContext::new("agent-1", Role::Agent)
}

pub(super) fn other_agent() -> AgentContext {
    AgentContext::new("agent-2", Role::Agent)
}

pub(super) fn customer(id: &str) -> CustomerId {
    CustomerId(id.to_string())
}

pub(super) fn customers() -> Vec<CustomerSummary> {
    vec![
        CustomerSummary {
            id: customer("cust-1"),
            external_id: Some("EXT-001".to_string()),
            username: Some("jane.doe".to_string()),
        },
        CustomerSummary::new("cust-2"),
    ]
}

pub(super) struct Harness {
    pub(super) service: Arc<FollowUpService<InMemoryFollowUpRepository>>,
    pub(super) repository: Arc<InMemoryFollowUpRepository>,
    pub(super) clock: Arc<FixedClock>,
}

pub(super) fn build_service() -> Harness {
    build_service_with(FollowUpConfig::default())
}

pub(super) fn build_service_with(config: FollowUpConfig) -> Harness {
    let repository = Arc::new(InMemoryFollowUpRepository::with_customers(customers()));
    let clock = Arc::new(FixedClock::at(instant(NOW)));
    let service = Arc::new(FollowUpService::with_clock(
        repository.clone(),
        clock.clone(),
        config,
    ));
    Harness {
        service,
        repository,
        clock,
    }
}

impl Harness {
    pub(super) fn router(&self) -> Router {
        follow_up_router(self.service.clone())
    }

    /// Creates a follow-up for `agent-1` and returns it.
    pub(super) async fn schedule(&self, customer_id: &str, date: &str, content: &str) -> FollowUp {
        self.service
            .create(customer(customer_id), &agent(), FollowUpDraft::new(content, date))
            .await
            .expect("follow-up created")
    }

    pub(super) async fn set_status(&self, id: &FollowUpId, status: &str) -> FollowUp {
        self.service
            .update_status(id, &agent(), StatusUpdate::to(status))
            .await
            .expect("status updated")
    }
}

pub(super) fn ids<'a>(items: impl IntoIterator<Item = &'a FollowUp>) -> Vec<String> {
    items.into_iter().map(|item| item.id.0.clone()).collect()
}

/// Request builder carrying the agent headers the gateway would set.
pub(super) fn request(
    method: &str,
    uri: &str,
    agent: Option<(&str, &str)>,
) -> axum::http::request::Builder {
    let mut builder = Request::builder().method(method).uri(uri);
    if let Some((id, role)) = agent {
        builder = builder
            .header(AGENT_ID_HEADER, id)
            .header(AGENT_ROLE_HEADER, role);
    }
    builder
}

pub(super) fn json_request(
    method: &str,
    uri: &str,
    agent: Option<(&str, &str)>,
    body: Value,
) -> Request<Body> {
    request(method, uri, agent)
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from(serde_json::to_vec(&body).expect("serializable")))
        .expect("request builds")
}

pub(super) fn get_request(
    uri: &str,
    agent: Option<(&str, &str)>,
    offset: Option<&str>,
) -> Request<Body> {
    let mut builder = request("GET", uri, agent);
    if let Some(offset) = offset {
        builder = builder.header(AGENT_UTC_OFFSET_HEADER, offset);
    }
    builder.body(Body::empty()).expect("request builds")
}

pub(super) async fn read_json_body(response: Response) -> Value {
    let bytes = axum::body::to_bytes(response.into_body(), 1024 * 1024)
        .await
        .expect("body readable");
    serde_json::from_slice(&bytes).expect("json body")
}

/// Repository whose every call fails as if the database were down.
pub(super) struct UnavailableRepository;

fn unavailable() -> RepositoryError {
    RepositoryError::Unavailable("connection refused".to_string())
}

#[async_trait]
impl FollowUpRepository for UnavailableRepository {
    async fn insert(&self, _follow_up: FollowUp) -> Result<FollowUp, RepositoryError> {
        Err(unavailable())
    }

    async fn find_owned(
        &self,
        _id: &FollowUpId,
        _agent_id: &AgentId,
    ) -> Result<Lookup<FollowUp>, RepositoryError> {
        Err(unavailable())
    }

    async fn update_status(
        &self,
        _change: StatusChange,
    ) -> Result<Lookup<FollowUp>, RepositoryError> {
        Err(unavailable())
    }

    async fn list(&self, _query: &FollowUpQuery) -> Result<Listing, RepositoryError> {
        Err(unavailable())
    }
}

pub(super) fn unavailable_service() -> Arc<FollowUpService<UnavailableRepository>> {
    Arc::new(FollowUpService::with_clock(
        Arc::new(UnavailableRepository),
        Arc::new(FixedClock::at(instant(NOW))),
        FollowUpConfig::default(),
    ))
}
