use chrono::{DateTime, FixedOffset, Utc};
use crm_desk::agent::parse_utc_offset;
use crm_desk::customers::follow_ups::{CustomerSummary, InMemoryFollowUpRepository};
use metrics_exporter_prometheus::PrometheusHandle;
use std::sync::atomic::AtomicBool;
use std::sync::Arc;

#[derive(Clone)]
pub(crate) struct AppState {
    pub(crate) readiness: Arc<AtomicBool>,
    pub(crate) metrics: Arc<PrometheusHandle>,
}

/// In-memory store seeded with the customer ids listed in `APP_MEMORY_CUSTOMERS`.
pub(crate) fn memory_repository(customers: &[String]) -> InMemoryFollowUpRepository {
    InMemoryFollowUpRepository::with_customers(
        customers.iter().map(|id| CustomerSummary::new(id.as_str())),
    )
}

pub(crate) fn parse_instant(raw: &str) -> Result<DateTime<Utc>, String> {
    DateTime::parse_from_rfc3339(raw.trim())
        .map(|instant| instant.with_timezone(&Utc))
        .map_err(|err| format!("failed to parse '{raw}' as an RFC 3339 instant ({err})"))
}

pub(crate) fn parse_offset(raw: &str) -> Result<FixedOffset, String> {
    parse_utc_offset(raw).ok_or_else(|| format!("'{raw}' is not a UTC offset such as +05:30 or Z"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crm_desk::customers::follow_ups::{
        CustomerId, FollowUp, FollowUpId, FollowUpRepository, FollowUpStatus,
    };

    #[test]
    fn parses_cli_time_arguments() {
        assert_eq!(
            parse_instant("2025-01-10T10:00:00+02:00").expect("parses").to_rfc3339(),
            "2025-01-10T08:00:00+00:00"
        );
        assert!(parse_instant("tomorrow").is_err());
        assert_eq!(parse_offset("-05:00"), Ok(FixedOffset::west_opt(5 * 3600).expect("valid")));
        assert!(parse_offset("EST").is_err());
    }

    #[tokio::test]
    async fn memory_repository_registers_configured_customers() {
        let repository = memory_repository(&["cust-1".to_string()]);
        let follow_up = |customer: &str| FollowUp {
            id: FollowUpId::generate(),
            scheduled_at: Utc::now(),
            content: "check in".to_string(),
            customer_id: CustomerId(customer.to_string()),
            agent_id: crm_desk::agent::AgentId("agent-1".to_string()),
            status: FollowUpStatus::Pending,
        };

        assert!(repository.insert(follow_up("cust-1")).await.is_ok());
        assert!(repository.insert(follow_up("cust-9")).await.is_err());
    }
}
