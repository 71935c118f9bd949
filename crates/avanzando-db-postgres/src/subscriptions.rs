//! Subscription storage.
//!
//! Every user has at most one row. Reads go through [`SubscriptionStorage::current`],
//! which creates a free subscription on first access and persists the
//! `expired` status once a paid period has run out.

use avanzando_core::subscription::{
    PlanType, Subscription, SubscriptionState, SubscriptionStatus,
};
use chrono::{DateTime, Utc};
use sqlx_core::query::query;
use sqlx_core::row::Row;
use sqlx_postgres::{PgConnection, PgRow};
use tracing::info;

use crate::rows::text_enum;
use crate::{PgPool, StorageError, StorageResult, reference_error};

const COLUMNS: &str = "id, user_id, plan_type, status, start_date, end_date, trial_end_date, \
    created_at, updated_at";

fn row_to_subscription(row: &PgRow) -> StorageResult<Subscription> {
    Ok(Subscription {
        id: row.try_get("id")?,
        user_id: row.try_get("user_id")?,
        plan_type: text_enum(row, "plan_type")?,
        status: text_enum(row, "status")?,
        start_date: row.try_get("start_date")?,
        end_date: row.try_get("end_date")?,
        trial_end_date: row.try_get("trial_end_date")?,
        created_at: row.try_get("created_at")?,
        updated_at: row.try_get("updated_at")?,
    })
}

/// Creates the free subscription on first access, then locks the user's row
/// until the surrounding transaction ends. A lapsed paid period is persisted
/// as `expired`.
pub(crate) async fn lock_current(
    conn: &mut PgConnection,
    user_id: i64,
    now: DateTime<Utc>,
) -> StorageResult<Subscription> {
    let initial = SubscriptionState::initial(PlanType::Free, now);
    query(
        "INSERT INTO subscriptions (user_id, plan_type, status, start_date) \
         VALUES ($1, $2, $3, $4) ON CONFLICT (user_id) DO NOTHING",
    )
    .bind(user_id)
    .bind(initial.plan_type.as_str())
    .bind(initial.status.as_str())
    .bind(initial.start_date)
    .execute(&mut *conn)
    .await
    .map_err(|e| reference_error(e, "Usuario no encontrado"))?;

    let row = query(&format!(
        "SELECT {COLUMNS} FROM subscriptions WHERE user_id = $1 FOR UPDATE"
    ))
    .bind(user_id)
    .fetch_one(&mut *conn)
    .await?;
    let subscription = row_to_subscription(&row)?;
    if !subscription.has_lapsed(now) {
        return Ok(subscription);
    }

    let row = query(&format!(
        "UPDATE subscriptions SET status = $2, updated_at = $3 \
         WHERE id = $1 RETURNING {COLUMNS}"
    ))
    .bind(subscription.id)
    .bind(SubscriptionStatus::Expired.as_str())
    .bind(now)
    .fetch_one(&mut *conn)
    .await?;
    info!(user_id, "Subscription expired");
    row_to_subscription(&row)
}

pub struct SubscriptionStorage<'a> {
    pool: &'a PgPool,
}

impl<'a> SubscriptionStorage<'a> {
    #[must_use]
    pub fn new(pool: &'a PgPool) -> Self {
        Self { pool }
    }

    /// The user's subscription as of `now`.
    ///
    /// Runs in one transaction: inserts a free subscription if none exists,
    /// locks the row and marks it `expired` when its end date has passed.
    ///
    /// # Errors
    ///
    /// Returns [`StorageError::NotFound`] if the user does not exist.
    pub async fn current(&self, user_id: i64, now: DateTime<Utc>) -> StorageResult<Subscription> {
        let mut tx = self.pool.begin().await?;
        let subscription = lock_current(&mut tx, user_id, now).await?;
        tx.commit().await?;
        Ok(subscription)
    }

    /// Replaces plan, status and period of the user's subscription,
    /// creating the row if needed.
    ///
    /// # Errors
    ///
    /// Returns [`StorageError::NotFound`] if the user does not exist.
    pub async fn write(
        &self,
        user_id: i64,
        state: &SubscriptionState,
    ) -> StorageResult<Subscription> {
        let row = query(&format!(
            "INSERT INTO subscriptions (user_id, plan_type, status, start_date, end_date, trial_end_date) \
             VALUES ($1, $2, $3, $4, $5, $6) \
             ON CONFLICT (user_id) DO UPDATE SET \
                plan_type = EXCLUDED.plan_type, status = EXCLUDED.status, \
                start_date = EXCLUDED.start_date, end_date = EXCLUDED.end_date, \
                trial_end_date = EXCLUDED.trial_end_date, updated_at = NOW() \
             RETURNING {COLUMNS}"
        ))
        .bind(user_id)
        .bind(state.plan_type.as_str())
        .bind(state.status.as_str())
        .bind(state.start_date)
        .bind(state.end_date)
        .bind(state.trial_end_date)
        .fetch_one(self.pool)
        .await
        .map_err(|e| reference_error(e, "Usuario no encontrado"))?;
        row_to_subscription(&row)
    }

    /// Marks the user's subscription `cancelled`.
    ///
    /// # Errors
    ///
    /// Returns [`StorageError::NotFound`] if the user has no subscription.
    pub async fn cancel(&self, user_id: i64) -> StorageResult<Subscription> {
        let row = query(&format!(
            "UPDATE subscriptions SET status = $2, updated_at = NOW() \
             WHERE user_id = $1 RETURNING {COLUMNS}"
        ))
        .bind(user_id)
        .bind(SubscriptionStatus::Cancelled.as_str())
        .fetch_optional(self.pool)
        .await?;
        row.as_ref()
            .map(row_to_subscription)
            .transpose()?
            .ok_or_else(|| StorageError::not_found("Suscripción no encontrada"))
    }
}
