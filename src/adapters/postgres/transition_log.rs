//! PostgreSQL implementation of the transition audit log.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::PgPool;
use uuid::Uuid;

use crate::domain::billing::{SubscriptionTransition, TransitionSource};
use crate::domain::foundation::{DomainError, ErrorCode, TenantId, Timestamp};
use crate::ports::TransitionLog;

/// PostgreSQL implementation of the TransitionLog port.
pub struct PostgresTransitionLog {
    pool: PgPool,
}

impl PostgresTransitionLog {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[derive(Debug, sqlx::FromRow)]
struct TransitionRow {
    id: Uuid,
    tenant_id: String,
    old_status: String,
    new_status: String,
    valid: bool,
    source: String,
    event_id: Option<String>,
    occurred_at: DateTime<Utc>,
}

impl TryFrom<TransitionRow> for SubscriptionTransition {
    type Error = DomainError;

    fn try_from(row: TransitionRow) -> Result<Self, Self::Error> {
        let source = match row.source.as_str() {
            "webhook" => TransitionSource::Webhook,
            "internal" => TransitionSource::Internal,
            other => {
                return Err(DomainError::new(
                    ErrorCode::DatabaseError,
                    format!("Invalid transition source: {}", other),
                ))
            }
        };
        Ok(SubscriptionTransition {
            id: row.id,
            tenant_id: TenantId::new(row.tenant_id).map_err(|e| {
                DomainError::new(ErrorCode::DatabaseError, format!("Invalid tenant_id: {}", e))
            })?,
            old_status: row.old_status,
            new_status: row.new_status,
            valid: row.valid,
            source,
            event_id: row.event_id,
            occurred_at: Timestamp::from_datetime(row.occurred_at),
        })
    }
}

#[async_trait]
impl TransitionLog for PostgresTransitionLog {
    async fn record(&self, transition: &SubscriptionTransition) -> Result<(), DomainError> {
        sqlx::query(
            r#"
            INSERT INTO subscription_transitions (
                id, tenant_id, old_status, new_status, valid, source, event_id, occurred_at
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
            "#,
        )
        .bind(transition.id)
        .bind(transition.tenant_id.as_str())
        .bind(&transition.old_status)
        .bind(&transition.new_status)
        .bind(transition.valid)
        .bind(transition.source.as_str())
        .bind(&transition.event_id)
        .bind(*transition.occurred_at.as_datetime())
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn find_by_tenant(
        &self,
        tenant: &TenantId,
    ) -> Result<Vec<SubscriptionTransition>, DomainError> {
        let rows: Vec<TransitionRow> = sqlx::query_as(
            r#"
            SELECT id, tenant_id, old_status, new_status, valid, source, event_id, occurred_at
            FROM subscription_transitions
            WHERE tenant_id = $1
            ORDER BY occurred_at DESC
            "#,
        )
        .bind(tenant.as_str())
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter().map(SubscriptionTransition::try_from).collect()
    }

    async fn find_invalid_since(
        &self,
        since: Timestamp,
    ) -> Result<Vec<SubscriptionTransition>, DomainError> {
        let rows: Vec<TransitionRow> = sqlx::query_as(
            r#"
            SELECT id, tenant_id, old_status, new_status, valid, source, event_id, occurred_at
            FROM subscription_transitions
            WHERE valid = FALSE AND occurred_at >= $1
            ORDER BY occurred_at DESC
            "#,
        )
        .bind(*since.as_datetime())
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter().map(SubscriptionTransition::try_from).collect()
    }

    async fn delete_before(&self, timestamp: Timestamp) -> Result<u64, DomainError> {
        let result = sqlx::query(
            r#"DELETE FROM subscription_transitions WHERE occurred_at < $1"#,
        )
        .bind(*timestamp.as_datetime())
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected())
    }
}
