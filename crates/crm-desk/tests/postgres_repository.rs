//! Postgres-backed repository checks. Run with
//! `CRM_TEST_DATABASE_URL=postgres://... cargo test -- --ignored`.

use std::sync::Arc;

use chrono::{DateTime, Utc};

use crm_desk::agent::{AgentContext, Role};
use crm_desk::config::{FollowUpConfig, PostgresConfig};
use crm_desk::customers::follow_ups::{
    CustomerId, CustomerSummary, FixedClock, FollowUpDraft, FollowUpError, FollowUpService,
    FollowUpStatus, PageRequest, PgFollowUpRepository, StatusUpdate,
};

const NOW: &str = "2025-01-10T10:00:00Z";

fn instant(raw: &str) -> DateTime<Utc> {
    DateTime::parse_from_rfc3339(raw)
        .expect("valid rfc3339")
        .with_timezone(&Utc)
}

fn database_url() -> Option<String> {
    std::env::var("CRM_TEST_DATABASE_URL")
        .ok()
        .filter(|url| !url.trim().is_empty())
}

struct Fixture {
    service: FollowUpService<PgFollowUpRepository>,
    repository: Arc<PgFollowUpRepository>,
    customer: CustomerId,
    agent: AgentContext,
}

/// Each fixture uses fresh customer and agent ids so runs never see each other's rows.
async fn fixture(url: String) -> Fixture {
    let repository = PgFollowUpRepository::connect(&PostgresConfig {
        url,
        max_connections: 2,
    })
    .await
    .expect("connects to postgres");
    repository.ensure_schema().await.expect("schema bootstraps");

    let suffix = uuid::Uuid::new_v4().simple().to_string();
    let mut customer = CustomerSummary::new(format!("cust-{suffix}"));
    customer.username = Some("pg.customer".to_string());
    repository
        .register_customer(&customer)
        .await
        .expect("customer registered");

    let repository = Arc::new(repository);
    let service = FollowUpService::with_clock(
        repository.clone(),
        Arc::new(FixedClock::at(instant(NOW))),
        FollowUpConfig::default(),
    );

    Fixture {
        service,
        repository,
        customer: customer.id,
        agent: AgentContext::new(format!("agent-{suffix}"), Role::Agent),
    }
}

#[tokio::test]
#[ignore = "requires CRM_TEST_DATABASE_URL"]
async fn ranks_and_paginates_in_sql() {
    let Some(url) = database_url() else {
        return;
    };
    let fx = fixture(url).await;

    let mut created = Vec::new();
    for (content, date) in [
        ("A", "2025-01-10T12:00:00Z"),
        ("B", "2025-01-11T12:00:00Z"),
        ("C", "2025-01-10T13:00:00Z"),
        ("D", "2025-01-10T14:00:00Z"),
    ] {
        let follow_up = fx
            .service
            .create(fx.customer.clone(), &fx.agent, FollowUpDraft::new(content, date))
            .await
            .expect("created");
        created.push(follow_up);
    }
    fx.service
        .update_status(&created[2].id, &fx.agent, StatusUpdate::to("completed"))
        .await
        .expect("completed");
    fx.service
        .update_status(&created[3].id, &fx.agent, StatusUpdate::to("cancelled"))
        .await
        .expect("cancelled");

    let page = fx
        .service
        .list_for_customer(fx.customer.clone(), &fx.agent, PageRequest::new(1, 10), true)
        .await
        .expect("listed");
    let contents: Vec<&str> = page
        .data
        .iter()
        .map(|entry| entry.follow_up.content.as_str())
        .collect();
    assert_eq!(contents, vec!["A", "B", "C", "D"]);

    let second = fx
        .service
        .list_for_customer(fx.customer.clone(), &fx.agent, PageRequest::new(2, 2), false)
        .await
        .expect("listed");
    assert_eq!(second.total, 3);
    assert_eq!(second.total_pages, 2);
    assert_eq!(second.data.len(), 1);

    let stranger = AgentContext::new(format!("{}-other", fx.agent.id), Role::Agent);
    fx.service
        .create(
            fx.customer.clone(),
            &stranger,
            FollowUpDraft::new("not mine", "2025-01-10T15:00:00Z"),
        )
        .await
        .expect("created for another agent");

    let today = fx
        .service
        .list_due_today(&fx.agent, PageRequest::new(1, 10))
        .await
        .expect("listed");
    assert_eq!(today.total, 1);
    assert_eq!(today.data[0].follow_up.content, "A");
    let customer = today.data[0].customer.as_ref().expect("customer joined");
    assert_eq!(customer.username.as_deref(), Some("pg.customer"));
}

#[tokio::test]
#[ignore = "requires CRM_TEST_DATABASE_URL"]
async fn enforces_ownership_transitions_and_foreign_keys() {
    let Some(url) = database_url() else {
        return;
    };
    let fx = fixture(url).await;

    let created = fx
        .service
        .create(
            fx.customer.clone(),
            &fx.agent,
            FollowUpDraft::new("note", "2025-01-11T09:00:00Z"),
        )
        .await
        .expect("created");

    let stranger = AgentContext::new("someone-else", Role::Agent);
    let foreign = fx
        .service
        .update_status(&created.id, &stranger, StatusUpdate::to("completed"))
        .await;
    assert!(matches!(foreign, Err(FollowUpError::FollowUpNotFound(_))));

    let done = fx
        .service
        .update_status(&created.id, &fx.agent, StatusUpdate::to("completed"))
        .await
        .expect("completed");
    assert_eq!(done.status, FollowUpStatus::Completed);
    assert_eq!(done.id, created.id);
    assert_eq!(done.content, "note");
    assert_eq!(done.customer_id, fx.customer);
    assert_eq!(done.scheduled_at, created.scheduled_at);

    let lenient = FollowUpService::with_clock(
        fx.repository.clone(),
        Arc::new(FixedClock::at(instant(NOW))),
        FollowUpConfig {
            strict_transitions: false,
            ..FollowUpConfig::default()
        },
    );
    let reapplied = lenient
        .update_status(&created.id, &fx.agent, StatusUpdate::to("completed"))
        .await
        .expect("lenient update reapplies");
    assert_eq!(reapplied.id, created.id);
    assert_eq!(reapplied.status, FollowUpStatus::Completed);

    let repeat = fx
        .service
        .update_status(&created.id, &fx.agent, StatusUpdate::to("cancelled"))
        .await;
    assert!(matches!(repeat, Err(FollowUpError::InvalidTransition { .. })));

    let missing_customer = fx
        .service
        .create(
            CustomerId("no-such-customer".to_string()),
            &fx.agent,
            FollowUpDraft::new("note", "2025-01-11T09:00:00Z"),
        )
        .await;
    assert!(matches!(missing_customer, Err(FollowUpError::CustomerNotFound(_))));

    assert!(fx
        .repository
        .remove_customer(&fx.customer)
        .await
        .expect("customer removed"));
    let after = fx
        .service
        .list_for_customer(fx.customer.clone(), &fx.agent, PageRequest::new(1, 10), true)
        .await
        .expect("listed");
    assert_eq!(after.total, 0);
}
