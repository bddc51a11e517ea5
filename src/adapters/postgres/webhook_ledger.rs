//! PostgreSQL implementation of the webhook idempotency ledger.
//!
//! The PRIMARY KEY on `event_id` resolves save races: the first insert
//! wins, concurrent deliveries see `AlreadyExists`.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::PgPool;

use crate::domain::foundation::{DomainError, Timestamp};
use crate::ports::{LedgerOutcome, SaveResult, WebhookEventRecord, WebhookLedger};

/// PostgreSQL implementation of the WebhookLedger port.
pub struct PostgresWebhookLedger {
    pool: PgPool,
}

impl PostgresWebhookLedger {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[derive(Debug, sqlx::FromRow)]
struct LedgerRow {
    event_id: String,
    topic: String,
    tenant_domain: String,
    outcome: String,
    detail: Option<String>,
    processed_at: DateTime<Utc>,
}

fn parse_outcome(s: &str) -> LedgerOutcome {
    match s {
        "applied" => LedgerOutcome::Applied,
        "failed" => LedgerOutcome::Failed,
        _ => LedgerOutcome::Skipped,
    }
}

impl From<LedgerRow> for WebhookEventRecord {
    fn from(row: LedgerRow) -> Self {
        WebhookEventRecord {
            event_id: row.event_id,
            topic: row.topic,
            tenant_domain: row.tenant_domain,
            outcome: parse_outcome(&row.outcome),
            detail: row.detail,
            processed_at: Timestamp::from_datetime(row.processed_at),
        }
    }
}

#[async_trait]
impl WebhookLedger for PostgresWebhookLedger {
    async fn find_by_event_id(
        &self,
        event_id: &str,
    ) -> Result<Option<WebhookEventRecord>, DomainError> {
        let row: Option<LedgerRow> = sqlx::query_as(
            r#"
            SELECT event_id, topic, tenant_domain, outcome, detail, processed_at
            FROM processed_webhook_events
            WHERE event_id = $1
            "#,
        )
        .bind(event_id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.map(WebhookEventRecord::from))
    }

    async fn save(&self, record: WebhookEventRecord) -> Result<SaveResult, DomainError> {
        let result = sqlx::query(
            r#"
            INSERT INTO processed_webhook_events (
                event_id, topic, tenant_domain, outcome, detail, processed_at
            )
            VALUES ($1, $2, $3, $4, $5, $6)
            ON CONFLICT (event_id) DO NOTHING
            "#,
        )
        .bind(&record.event_id)
        .bind(&record.topic)
        .bind(&record.tenant_domain)
        .bind(record.outcome.as_str())
        .bind(&record.detail)
        .bind(*record.processed_at.as_datetime())
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            Ok(SaveResult::AlreadyExists)
        } else {
            Ok(SaveResult::Inserted)
        }
    }

    async fn delete_before(&self, timestamp: Timestamp) -> Result<u64, DomainError> {
        let result = sqlx::query(
            r#"DELETE FROM processed_webhook_events WHERE processed_at < $1"#,
        )
        .bind(*timestamp.as_datetime())
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected())
    }
}
