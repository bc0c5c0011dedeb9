use crate::infra::{parse_instant, parse_offset};
use chrono::{DateTime, Duration, FixedOffset, Offset, Utc};
use clap::Args;
use crm_desk::agent::{AgentContext, Role};
use crm_desk::config::FollowUpConfig;
use crm_desk::customers::follow_ups::{
    CustomerId, CustomerSummary, FixedClock, FollowUpDraft, FollowUpEntry, FollowUpError,
    FollowUpService, InMemoryFollowUpRepository, Page, PageRequest, StatusUpdate,
};
use crm_desk::error::AppError;
use serde::Serialize;
use std::sync::Arc;

#[derive(Args, Debug, Default)]
pub(crate) struct DemoArgs {
    /// Moment the demo clock is frozen at (RFC 3339). Defaults to the current time.
    #[arg(long, value_parser = parse_instant)]
    pub(crate) now: Option<DateTime<Utc>>,
    /// Agent UTC offset such as +05:30 (defaults to UTC).
    #[arg(long, value_parser = parse_offset, allow_hyphen_values = true)]
    pub(crate) utc_offset: Option<FixedOffset>,
    /// Print the views as JSON instead of a text summary.
    #[arg(long)]
    pub(crate) json: bool,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct DemoReport {
    now: DateTime<Utc>,
    customer_follow_ups: Page<FollowUpEntry>,
    due_today: Page<FollowUpEntry>,
}

const DEMO_CUSTOMER: &str = "cust-1001";

pub(crate) async fn run_demo(args: DemoArgs) -> Result<(), AppError> {
    let now = args.now.unwrap_or_else(Utc::now);
    let offset = args.utc_offset.unwrap_or_else(|| Utc.fix());

    let report = match build_report(now, offset).await {
        Ok(report) => report,
        Err(err) => {
            println!("Demo could not complete: {err}");
            return Ok(());
        }
    };

    if args.json {
        match serde_json::to_string_pretty(&report) {
            Ok(json) => println!("{json}"),
            Err(err) => println!("Report unavailable: {err}"),
        }
        return Ok(());
    }

    println!("Follow-up demo");
    println!("Clock: {} (agent offset {})", report.now, offset);

    println!("\nCustomer {DEMO_CUSTOMER} follow-ups (ranked)");
    for entry in &report.customer_follow_ups.data {
        render_entry(entry, offset);
    }
    println!(
        "  {} of {} shown, {} page(s)",
        report.customer_follow_ups.data.len(),
        report.customer_follow_ups.total,
        report.customer_follow_ups.total_pages
    );

    if report.due_today.data.is_empty() {
        println!("\nDue today: none");
    } else {
        println!("\nDue today");
        for entry in &report.due_today.data {
            render_entry(entry, offset);
        }
    }

    Ok(())
}

async fn build_report(now: DateTime<Utc>, offset: FixedOffset) -> Result<DemoReport, FollowUpError> {
    let mut customer = CustomerSummary::new(DEMO_CUSTOMER);
    customer.external_id = Some("EXT-1001".to_string());
    customer.username = Some("demo.customer".to_string());
    let repository = Arc::new(InMemoryFollowUpRepository::with_customers([customer]));
    let clock = Arc::new(FixedClock::at(now));
    let service = FollowUpService::with_clock(repository, clock, FollowUpConfig::default());
    let agent = AgentContext::new("demo-agent", Role::Agent).with_utc_offset(offset);
    let customer_id = CustomerId(DEMO_CUSTOMER.to_string());

    let schedule = |minutes: i64| (now + Duration::minutes(minutes)).to_rfc3339();
    let plan = [
        ("Confirm renewal quote", schedule(1)),
        ("Send onboarding checklist", schedule(2 * 24 * 60)),
        ("Share pricing sheet", schedule(2)),
        ("Ask for referral", schedule(3)),
    ];

    let mut created = Vec::with_capacity(plan.len());
    for (content, date) in plan {
        let follow_up = service
            .create(customer_id.clone(), &agent, FollowUpDraft::new(content, date))
            .await?;
        created.push(follow_up);
    }

    service
        .update_status(&created[2].id, &agent, StatusUpdate::to("completed"))
        .await?;
    service
        .update_status(&created[3].id, &agent, StatusUpdate::to("cancelled"))
        .await?;

    let page = PageRequest::new(1, FollowUpConfig::default().default_limit);
    let customer_follow_ups = service
        .list_for_customer(customer_id, &agent, page, true)
        .await?;
    let due_today = service.list_due_today(&agent, page).await?;

    Ok(DemoReport {
        now,
        customer_follow_ups,
        due_today,
    })
}

fn render_entry(entry: &FollowUpEntry, offset: FixedOffset) {
    let follow_up = &entry.follow_up;
    let local = follow_up.scheduled_at.with_timezone(&offset);
    let customer = entry
        .customer
        .as_ref()
        .and_then(|customer| customer.username.as_deref())
        .map(|username| format!(" [{username}]"))
        .unwrap_or_default();
    println!(
        "  - {} {:<9} {}{}",
        local.format("%Y-%m-%d %H:%M"),
        follow_up.status.label(),
        follow_up.content,
        customer
    );
}
