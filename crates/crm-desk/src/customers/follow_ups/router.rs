use std::sync::Arc;

use axum::{
    extract::{rejection::JsonRejection, Path, Query, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::get,
    Json, Router,
};
use serde::Deserialize;
use serde_json::json;
use tracing::error;

use crate::agent::AgentContext;

use super::domain::{CustomerId, FollowUpDraft, FollowUpId, StatusUpdate};
use super::repository::FollowUpRepository;
use super::service::{FollowUpError, FollowUpService};

/// Raw list query. Values stay strings so malformed numbers surface as validation errors.
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ListParams {
    pub page: Option<String>,
    pub limit: Option<String>,
    pub include_cancelled: Option<String>,
}

/// Router builder exposing the follow-up endpoints.
pub fn follow_up_router<R>(service: Arc<FollowUpService<R>>) -> Router
where
    R: FollowUpRepository + 'static,
{
    Router::new()
        .route("/customers/follow-ups/todays", get(due_today_handler::<R>))
        .route(
            "/customers/follow-ups/{id}",
            get(list_handler::<R>)
                .post(create_handler::<R>)
                .patch(update_status_handler::<R>),
        )
        .with_state(service)
}

pub(crate) async fn create_handler<R>(
    State(service): State<Arc<FollowUpService<R>>>,
    agent: AgentContext,
    Path(customer_id): Path<String>,
    payload: Result<Json<FollowUpDraft>, JsonRejection>,
) -> Response
where
    R: FollowUpRepository + 'static,
{
    let Json(draft) = match payload {
        Ok(payload) => payload,
        Err(rejection) => return malformed_body(rejection),
    };

    match service.create(CustomerId(customer_id), &agent, draft).await {
        Ok(follow_up) => (StatusCode::CREATED, Json(follow_up)).into_response(),
        Err(err) => err.into_response(),
    }
}

pub(crate) async fn update_status_handler<R>(
    State(service): State<Arc<FollowUpService<R>>>,
    agent: AgentContext,
    Path(id): Path<String>,
    payload: Result<Json<StatusUpdate>, JsonRejection>,
) -> Response
where
    R: FollowUpRepository + 'static,
{
    let Json(update) = match payload {
        Ok(payload) => payload,
        Err(rejection) => return malformed_body(rejection),
    };

    match service.update_status(&FollowUpId(id), &agent, update).await {
        Ok(follow_up) => (StatusCode::OK, Json(follow_up)).into_response(),
        Err(err) => err.into_response(),
    }
}

pub(crate) async fn list_handler<R>(
    State(service): State<Arc<FollowUpService<R>>>,
    agent: AgentContext,
    Path(customer_id): Path<String>,
    Query(params): Query<ListParams>,
) -> Response
where
    R: FollowUpRepository + 'static,
{
    let parsed = service
        .page_request(params.page.as_deref(), params.limit.as_deref())
        .and_then(|page| {
            service
                .include_cancelled(params.include_cancelled.as_deref())
                .map(|include_cancelled| (page, include_cancelled))
        });
    let (page, include_cancelled) = match parsed {
        Ok(parsed) => parsed,
        Err(err) => return FollowUpError::from(err).into_response(),
    };

    match service
        .list_for_customer(CustomerId(customer_id), &agent, page, include_cancelled)
        .await
    {
        Ok(page) => (StatusCode::OK, Json(page)).into_response(),
        Err(err) => err.into_response(),
    }
}

pub(crate) async fn due_today_handler<R>(
    State(service): State<Arc<FollowUpService<R>>>,
    agent: AgentContext,
    Query(params): Query<ListParams>,
) -> Response
where
    R: FollowUpRepository + 'static,
{
    let page = match service.page_request(params.page.as_deref(), params.limit.as_deref()) {
        Ok(page) => page,
        Err(err) => return FollowUpError::from(err).into_response(),
    };

    match service.list_due_today(&agent, page).await {
        Ok(page) => (StatusCode::OK, Json(page)).into_response(),
        Err(err) => err.into_response(),
    }
}

fn malformed_body(rejection: JsonRejection) -> Response {
    let payload = json!({
        "error": "validation_error",
        "message": rejection.body_text(),
    });
    (StatusCode::BAD_REQUEST, Json(payload)).into_response()
}

impl IntoResponse for FollowUpError {
    fn into_response(self) -> Response {
        let status = match &self {
            FollowUpError::Validation(_) => StatusCode::BAD_REQUEST,
            FollowUpError::FollowUpNotFound(_) | FollowUpError::CustomerNotFound(_) => {
                StatusCode::NOT_FOUND
            }
            FollowUpError::InvalidTransition { .. } => StatusCode::CONFLICT,
            FollowUpError::Forbidden { .. } => StatusCode::FORBIDDEN,
            FollowUpError::Persistence(_) => StatusCode::INTERNAL_SERVER_ERROR,
        };

        let payload = match &self {
            FollowUpError::Validation(err) => json!({
                "error": self.code(),
                "message": err.to_string(),
                "fields": [err.field()],
            }),
            FollowUpError::Persistence(err) => {
                error!(error = %err, "follow-up storage failure");
                json!({
                    "error": self.code(),
                    "message": "Follow-up storage is unavailable, please try again",
                })
            }
            other => json!({
                "error": other.code(),
                "message": other.to_string(),
            }),
        };

        (status, Json(payload)).into_response()
    }
}
