//! PostgreSQL implementation of SubscriptionRepository.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::PgPool;

use crate::domain::billing::Subscription;
use crate::domain::foundation::{DomainError, ErrorCode, TenantId, Timestamp};
use crate::ports::SubscriptionRepository;

/// PostgreSQL implementation of the SubscriptionRepository port.
pub struct PostgresSubscriptionRepository {
    pool: PgPool,
}

impl PostgresSubscriptionRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

/// Database row representation of a subscription.
#[derive(Debug, sqlx::FromRow)]
struct SubscriptionRow {
    tenant_id: String,
    platform_subscription_id: Option<String>,
    plan_id: Option<String>,
    status: String,
    grace_period_ends_on: Option<DateTime<Utc>>,
    current_period_end: Option<DateTime<Utc>>,
    cancelled_at: Option<DateTime<Utc>>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl TryFrom<SubscriptionRow> for Subscription {
    type Error = DomainError;

    fn try_from(row: SubscriptionRow) -> Result<Self, Self::Error> {
        Ok(Subscription {
            tenant_id: TenantId::new(row.tenant_id).map_err(|e| {
                DomainError::new(ErrorCode::DatabaseError, format!("Invalid tenant_id: {}", e))
            })?,
            platform_subscription_id: row.platform_subscription_id,
            plan_id: row.plan_id,
            status: row.status,
            grace_period_ends_on: row.grace_period_ends_on.map(Timestamp::from_datetime),
            current_period_end: row.current_period_end.map(Timestamp::from_datetime),
            cancelled_at: row.cancelled_at.map(Timestamp::from_datetime),
            created_at: Timestamp::from_datetime(row.created_at),
            updated_at: Timestamp::from_datetime(row.updated_at),
        })
    }
}

#[async_trait]
impl SubscriptionRepository for PostgresSubscriptionRepository {
    async fn find_by_tenant(
        &self,
        tenant: &TenantId,
    ) -> Result<Option<Subscription>, DomainError> {
        let row: Option<SubscriptionRow> = sqlx::query_as(
            r#"
            SELECT tenant_id, platform_subscription_id, plan_id, status,
                   grace_period_ends_on, current_period_end, cancelled_at,
                   created_at, updated_at
            FROM subscriptions
            WHERE tenant_id = $1
            "#,
        )
        .bind(tenant.as_str())
        .fetch_optional(&self.pool)
        .await?;

        row.map(Subscription::try_from).transpose()
    }

    async fn save(&self, subscription: &Subscription) -> Result<(), DomainError> {
        sqlx::query(
            r#"
            INSERT INTO subscriptions (
                tenant_id, platform_subscription_id, plan_id, status,
                grace_period_ends_on, current_period_end, cancelled_at,
                created_at, updated_at
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
            ON CONFLICT (tenant_id) DO UPDATE SET
                platform_subscription_id = EXCLUDED.platform_subscription_id,
                plan_id = EXCLUDED.plan_id,
                status = EXCLUDED.status,
                grace_period_ends_on = EXCLUDED.grace_period_ends_on,
                current_period_end = EXCLUDED.current_period_end,
                cancelled_at = EXCLUDED.cancelled_at,
                updated_at = EXCLUDED.updated_at
            "#,
        )
        .bind(subscription.tenant_id.as_str())
        .bind(&subscription.platform_subscription_id)
        .bind(&subscription.plan_id)
        .bind(&subscription.status)
        .bind(subscription.grace_period_ends_on.map(|t| *t.as_datetime()))
        .bind(subscription.current_period_end.map(|t| *t.as_datetime()))
        .bind(subscription.cancelled_at.map(|t| *t.as_datetime()))
        .bind(*subscription.created_at.as_datetime())
        .bind(*subscription.updated_at.as_datetime())
        .execute(&self.pool)
        .await?;

        Ok(())
    }
}
