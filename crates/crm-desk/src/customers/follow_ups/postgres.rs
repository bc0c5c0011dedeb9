use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::postgres::PgPoolOptions;
use sqlx::{FromRow, PgPool, Postgres, QueryBuilder};

use crate::agent::AgentId;
use crate::config::PostgresConfig;

use super::domain::{
    CustomerId, CustomerSummary, FollowUp, FollowUpEntry, FollowUpId, FollowUpStatus, Lookup,
};
use super::ranking::RankClass;
use super::repository::{
    FollowUpQuery, FollowUpRepository, ListScope, Listing, RepositoryError, StatusChange,
};

const SCHEMA: &str = include_str!("../../../sql/schema.sql");
const SCHEMA_LOCK_ID: i64 = 4_172_031;

const FOLLOW_UP_COLUMNS: &str =
    "f.id, f.date, f.content, f.customer_id, f.agent_id, f.status, \
     c.external_id AS customer_external_id, c.username AS customer_username";

/// Repository backed by the `follow_ups` and `customers` tables.
#[derive(Debug, Clone)]
pub struct PgFollowUpRepository {
    pool: PgPool,
}

impl PgFollowUpRepository {
    pub async fn connect(config: &PostgresConfig) -> Result<Self, RepositoryError> {
        let pool = PgPoolOptions::new()
            .max_connections(config.max_connections)
            .connect(&config.url)
            .await?;
        Ok(Self { pool })
    }

    /// Creates tables and indexes if missing. Concurrent callers serialize on an advisory lock.
    pub async fn ensure_schema(&self) -> Result<(), RepositoryError> {
        let mut tx = self.pool.begin().await?;
        sqlx::query("SELECT pg_advisory_xact_lock($1)")
            .bind(SCHEMA_LOCK_ID)
            .execute(&mut *tx)
            .await?;

        for statement in SCHEMA.split(';') {
            let trimmed = statement.trim();
            if trimmed.is_empty() {
                continue;
            }
            sqlx::query(trimmed).execute(&mut *tx).await?;
        }

        tx.commit().await?;
        Ok(())
    }

    /// Upserts a customer row. Customers are owned elsewhere in the CRM; this exists for
    /// bootstrapping and tests.
    pub async fn register_customer(
        &self,
        customer: &CustomerSummary,
    ) -> Result<(), RepositoryError> {
        sqlx::query(
            "INSERT INTO customers (id, external_id, username) VALUES ($1, $2, $3) \
             ON CONFLICT (id) DO UPDATE SET external_id = EXCLUDED.external_id, \
             username = EXCLUDED.username",
        )
        .bind(&customer.id.0)
        .bind(&customer.external_id)
        .bind(&customer.username)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    pub async fn remove_customer(&self, id: &CustomerId) -> Result<bool, RepositoryError> {
        let result = sqlx::query("DELETE FROM customers WHERE id = $1")
            .bind(&id.0)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    async fn fetch_owned(
        &self,
        id: &FollowUpId,
        agent_id: &AgentId,
    ) -> Result<Option<FollowUpRow>, RepositoryError> {
        let mut builder = QueryBuilder::<Postgres>::new("SELECT ");
        builder.push(FOLLOW_UP_COLUMNS);
        builder.push(" FROM follow_ups f LEFT JOIN customers c ON c.id = f.customer_id");
        builder.push(" WHERE f.id = ");
        builder.push_bind(&id.0);
        builder.push(" AND f.agent_id = ");
        builder.push_bind(&agent_id.0);

        Ok(builder
            .build_query_as::<FollowUpRow>()
            .fetch_optional(&self.pool)
            .await?)
    }
}

#[derive(Debug, FromRow)]
struct FollowUpRow {
    id: String,
    date: DateTime<Utc>,
    content: String,
    customer_id: String,
    agent_id: String,
    status: String,
    customer_external_id: Option<String>,
    customer_username: Option<String>,
}

impl FollowUpRow {
    fn into_entry(self, attach_customer: bool) -> Result<FollowUpEntry, RepositoryError> {
        let status = FollowUpStatus::parse(&self.status).ok_or_else(|| {
            RepositoryError::Corrupt(format!("follow-up {} has status '{}'", self.id, self.status))
        })?;
        let customer = attach_customer.then(|| CustomerSummary {
            id: CustomerId(self.customer_id.clone()),
            external_id: self.customer_external_id,
            username: self.customer_username,
        });

        Ok(FollowUpEntry {
            follow_up: FollowUp {
                id: FollowUpId(self.id),
                scheduled_at: self.date,
                content: self.content,
                customer_id: CustomerId(self.customer_id),
                agent_id: AgentId(self.agent_id),
                status,
            },
            customer,
        })
    }

    fn into_follow_up(self) -> Result<FollowUp, RepositoryError> {
        self.into_entry(false).map(|entry| entry.follow_up)
    }
}

fn push_scope(builder: &mut QueryBuilder<'_, Postgres>, query: &FollowUpQuery) {
    builder.push(" WHERE f.agent_id = ");
    builder.push_bind(query.agent_id.0.clone());

    match &query.scope {
        ListScope::Customer {
            customer_id,
            include_cancelled,
        } => {
            builder.push(" AND f.customer_id = ");
            builder.push_bind(customer_id.0.clone());
            if !include_cancelled {
                builder.push(" AND f.status <> ");
                builder.push_bind(FollowUpStatus::Cancelled.label());
            }
        }
        ListScope::DueToday => {
            builder.push(" AND f.status = ");
            builder.push_bind(FollowUpStatus::Pending.label());
            builder.push(" AND f.date >= ");
            builder.push_bind(query.today.start);
            builder.push(" AND f.date < ");
            builder.push_bind(query.today.end);
        }
    }
}

// Mirrors `RankClass::of`; the window bounds come from the caller's clock, never the database's.
fn push_rank(builder: &mut QueryBuilder<'_, Postgres>, query: &FollowUpQuery) {
    builder.push(" ORDER BY CASE WHEN f.status = ");
    builder.push_bind(FollowUpStatus::Pending.label());
    builder.push(" AND f.date >= ");
    builder.push_bind(query.today.start);
    builder.push(" AND f.date < ");
    builder.push_bind(query.today.end);
    builder.push(" THEN ");
    builder.push(RankClass::PendingToday.ordinal());
    builder.push(" WHEN f.status = ");
    builder.push_bind(FollowUpStatus::Pending.label());
    builder.push(" THEN ");
    builder.push(RankClass::PendingLater.ordinal());
    builder.push(" WHEN f.status = ");
    builder.push_bind(FollowUpStatus::Completed.label());
    builder.push(" THEN ");
    builder.push(RankClass::Completed.ordinal());
    builder.push(" ELSE ");
    builder.push(RankClass::Other.ordinal());
    builder.push(" END ASC, f.date ASC, f.id ASC");
}

fn to_i64(value: u64) -> i64 {
    i64::try_from(value).unwrap_or(i64::MAX)
}

#[async_trait]
impl FollowUpRepository for PgFollowUpRepository {
    async fn insert(&self, follow_up: FollowUp) -> Result<FollowUp, RepositoryError> {
        let result = sqlx::query(
            "INSERT INTO follow_ups (id, date, content, customer_id, agent_id, status) \
             VALUES ($1, $2, $3, $4, $5, $6)",
        )
        .bind(&follow_up.id.0)
        .bind(follow_up.scheduled_at)
        .bind(&follow_up.content)
        .bind(&follow_up.customer_id.0)
        .bind(&follow_up.agent_id.0)
        .bind(follow_up.status.label())
        .execute(&self.pool)
        .await;

        match result {
            Ok(_) => Ok(follow_up),
            Err(sqlx::Error::Database(err)) if err.is_foreign_key_violation() => {
                Err(RepositoryError::MissingCustomer(follow_up.customer_id))
            }
            Err(err) => Err(err.into()),
        }
    }

    async fn find_owned(
        &self,
        id: &FollowUpId,
        agent_id: &AgentId,
    ) -> Result<Lookup<FollowUp>, RepositoryError> {
        self.fetch_owned(id, agent_id)
            .await?
            .map(FollowUpRow::into_follow_up)
            .transpose()
            .map(Lookup::from)
    }

    async fn update_status(
        &self,
        change: StatusChange,
    ) -> Result<Lookup<FollowUp>, RepositoryError> {
        let mut builder =
            QueryBuilder::<Postgres>::new("WITH updated AS (UPDATE follow_ups SET status = ");
        builder.push_bind(change.status.label());
        builder.push(" WHERE id = ");
        builder.push_bind(&change.id.0);
        builder.push(" AND agent_id = ");
        builder.push_bind(&change.agent_id.0);
        if let Some(expected) = change.expected {
            builder.push(" AND status = ");
            builder.push_bind(expected.label());
        }
        builder.push(" RETURNING *) SELECT ");
        builder.push(FOLLOW_UP_COLUMNS);
        builder.push(" FROM updated f LEFT JOIN customers c ON c.id = f.customer_id");

        builder
            .build_query_as::<FollowUpRow>()
            .fetch_optional(&self.pool)
            .await?
            .map(FollowUpRow::into_follow_up)
            .transpose()
            .map(Lookup::from)
    }

    async fn list(&self, query: &FollowUpQuery) -> Result<Listing, RepositoryError> {
        let mut count = QueryBuilder::<Postgres>::new("SELECT COUNT(*) FROM follow_ups f");
        push_scope(&mut count, query);
        let total: i64 = count.build_query_scalar().fetch_one(&self.pool).await?;

        let mut select = QueryBuilder::<Postgres>::new("SELECT ");
        select.push(FOLLOW_UP_COLUMNS);
        select.push(" FROM follow_ups f LEFT JOIN customers c ON c.id = f.customer_id");
        push_scope(&mut select, query);
        push_rank(&mut select, query);
        select.push(" LIMIT ");
        select.push_bind(i64::from(query.page.limit()));
        select.push(" OFFSET ");
        select.push_bind(to_i64(query.page.offset()));

        let rows: Vec<FollowUpRow> = select.build_query_as().fetch_all(&self.pool).await?;
        let attach = query.scope.attaches_customer();
        let entries = rows
            .into_iter()
            .map(|row| row.into_entry(attach))
            .collect::<Result<Vec<_>, _>>()?;

        Ok(Listing {
            entries,
            total: u64::try_from(total).unwrap_or(0),
        })
    }
}
