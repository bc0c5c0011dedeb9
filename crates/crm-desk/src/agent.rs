//! Authenticated caller context.
//!
//! Authentication itself happens upstream; the gateway forwards the verified identity in
//! request headers and this module turns them into an [`AgentContext`].

use std::fmt;

use axum::extract::FromRequestParts;
use axum::http::request::Parts;
use axum::http::{HeaderMap, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::Json;
use chrono::{FixedOffset, Offset, Utc};
use serde::{Deserialize, Serialize};
use serde_json::json;

pub const AGENT_ID_HEADER: &str = "x-agent-id";
pub const AGENT_ROLE_HEADER: &str = "x-agent-role";
pub const AGENT_UTC_OFFSET_HEADER: &str = "x-agent-utc-offset";

/// Identifier of the agent owning follow-ups.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct AgentId(pub String);

impl fmt::Display for AgentId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    Admin,
    Agent,
    Viewer,
}

impl Role {
    pub fn parse(raw: &str) -> Option<Self> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "admin" => Some(Self::Admin),
            "agent" => Some(Self::Agent),
            "viewer" => Some(Self::Viewer),
            _ => None,
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            Self::Admin => "admin",
            Self::Agent => "agent",
            Self::Viewer => "viewer",
        }
    }

    /// Whether the role may create follow-ups or change their status.
    pub fn can_manage_follow_ups(self) -> bool {
        matches!(self, Self::Admin | Self::Agent)
    }
}

/// The calling agent as seen by the follow-up engine.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AgentContext {
    pub id: AgentId,
    pub role: Role,
    /// Wall-clock offset reported by the agent's client, if any.
    pub utc_offset: Option<FixedOffset>,
}

impl AgentContext {
    pub fn new(id: impl Into<String>, role: Role) -> Self {
        Self {
            id: AgentId(id.into()),
            role,
            utc_offset: None,
        }
    }

    pub fn with_utc_offset(mut self, offset: FixedOffset) -> Self {
        self.utc_offset = Some(offset);
        self
    }

    pub fn from_headers(headers: &HeaderMap) -> Result<Self, AgentContextRejection> {
        let id = header_value(headers, AGENT_ID_HEADER)
            .filter(|value| !value.is_empty())
            .ok_or(AgentContextRejection::MissingIdentity)?;

        let raw_role =
            header_value(headers, AGENT_ROLE_HEADER).ok_or(AgentContextRejection::MissingRole)?;
        let role = Role::parse(raw_role).ok_or_else(|| AgentContextRejection::UnknownRole {
            value: raw_role.to_string(),
        })?;

        let utc_offset = match header_value(headers, AGENT_UTC_OFFSET_HEADER) {
            Some(raw) => Some(parse_utc_offset(raw).ok_or_else(|| {
                AgentContextRejection::InvalidUtcOffset {
                    value: raw.to_string(),
                }
            })?),
            None => None,
        };

        Ok(Self {
            id: AgentId(id.to_string()),
            role,
            utc_offset,
        })
    }
}

fn header_value<'a>(headers: &'a HeaderMap, name: &str) -> Option<&'a str> {
    headers
        .get(name)
        .and_then(|value| value.to_str().ok())
        .map(str::trim)
}

impl<S> FromRequestParts<S> for AgentContext
where
    S: Send + Sync,
{
    type Rejection = AgentContextRejection;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        Self::from_headers(&parts.headers)
    }
}

/// Parses `Z`, `UTC`, `+HH:MM`, `-HH:MM`, or `+HHMM`.
pub fn parse_utc_offset(raw: &str) -> Option<FixedOffset> {
    let raw = raw.trim();
    if raw.eq_ignore_ascii_case("z") || raw.eq_ignore_ascii_case("utc") {
        return Some(Utc.fix());
    }

    let (sign, rest) = match raw.as_bytes().first()? {
        b'+' => (1, &raw[1..]),
        b'-' => (-1, &raw[1..]),
        _ => return None,
    };
    if !rest.is_ascii() {
        return None;
    }
    let (hours, minutes) = match rest.split_once(':') {
        Some((hours, minutes)) => (hours, minutes),
        None if rest.len() == 4 => rest.split_at(2),
        None => (rest, "0"),
    };
    let hours: i32 = hours.parse().ok()?;
    let minutes: i32 = minutes.parse().ok()?;
    if !(0..=18).contains(&hours) || !(0..60).contains(&minutes) {
        return None;
    }

    FixedOffset::east_opt(sign * (hours * 3600 + minutes * 60))
}

#[derive(Debug, thiserror::Error)]
pub enum AgentContextRejection {
    #[error("missing x-agent-id header")]
    MissingIdentity,
    #[error("missing x-agent-role header")]
    MissingRole,
    #[error("unrecognized role '{value}'")]
    UnknownRole { value: String },
    #[error("x-agent-utc-offset must look like +05:30, got '{value}'")]
    InvalidUtcOffset { value: String },
}

impl IntoResponse for AgentContextRejection {
    fn into_response(self) -> Response {
        let (status, code) = match self {
            AgentContextRejection::MissingIdentity | AgentContextRejection::MissingRole => {
                (StatusCode::UNAUTHORIZED, "unauthenticated")
            }
            AgentContextRejection::UnknownRole { .. } => (StatusCode::FORBIDDEN, "forbidden"),
            AgentContextRejection::InvalidUtcOffset { .. } => {
                (StatusCode::BAD_REQUEST, "validation_error")
            }
        };
        let body = Json(json!({ "error": code, "message": self.to_string() }));
        (status, body).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    fn headers(pairs: &[(&'static str, &'static str)]) -> HeaderMap {
        let mut map = HeaderMap::new();
        for (name, value) in pairs {
            map.insert(*name, HeaderValue::from_static(value));
        }
        map
    }

    #[test]
    fn parses_offsets() {
        assert_eq!(parse_utc_offset("Z"), Some(Utc.fix()));
        assert_eq!(parse_utc_offset("UTC"), Some(Utc.fix()));
        assert_eq!(parse_utc_offset("+05:30"), FixedOffset::east_opt(19_800));
        assert_eq!(parse_utc_offset("-0800"), FixedOffset::west_opt(28_800));
        assert_eq!(parse_utc_offset("+3"), FixedOffset::east_opt(10_800));
        assert_eq!(parse_utc_offset("05:30"), None);
        assert_eq!(parse_utc_offset("+25:00"), None);
        assert_eq!(parse_utc_offset("+05:75"), None);
        assert_eq!(parse_utc_offset("+1é1"), None);
        assert_eq!(parse_utc_offset("-é:30"), None);
    }

    #[test]
    fn builds_context_from_headers() {
        let context = AgentContext::from_headers(&headers(&[
            (AGENT_ID_HEADER, "agent-7"),
            (AGENT_ROLE_HEADER, "Agent"),
            (AGENT_UTC_OFFSET_HEADER, "-05:00"),
        ]))
        .expect("context builds");

        assert_eq!(context.id, AgentId("agent-7".to_string()));
        assert_eq!(context.role, Role::Agent);
        assert_eq!(context.utc_offset, FixedOffset::west_opt(5 * 3600));
    }

    #[test]
    fn rejects_missing_identity_and_unknown_roles() {
        assert!(matches!(
            AgentContext::from_headers(&headers(&[(AGENT_ROLE_HEADER, "agent")])),
            Err(AgentContextRejection::MissingIdentity)
        ));
        assert!(matches!(
            AgentContext::from_headers(&headers(&[(AGENT_ID_HEADER, "agent-7")])),
            Err(AgentContextRejection::MissingRole)
        ));
        assert!(matches!(
            AgentContext::from_headers(&headers(&[
                (AGENT_ID_HEADER, "agent-7"),
                (AGENT_ROLE_HEADER, "owner"),
            ])),
            Err(AgentContextRejection::UnknownRole { .. })
        ));
    }

    #[test]
    fn only_agents_and_admins_manage_follow_ups() {
        assert!(Role::Admin.can_manage_follow_ups());
        assert!(Role::Agent.can_manage_follow_ups());
        assert!(!Role::Viewer.can_manage_follow_ups());
    }

    #[test]
    fn rejection_maps_to_status_codes() {
        assert_eq!(
            AgentContextRejection::MissingIdentity.into_response().status(),
            StatusCode::UNAUTHORIZED
        );
        assert_eq!(
            AgentContextRejection::UnknownRole {
                value: "owner".to_string()
            }
            .into_response()
            .status(),
            StatusCode::FORBIDDEN
        );
    }
}
