//! Postgres-backed credential store.

use anyhow::{Context, Result};
use async_trait::async_trait;
use sqlx::{PgPool, Row};
use tracing::Instrument;
use uuid::Uuid;

use super::{CreateUserOutcome, CredentialStore, UserRecord};
use crate::store::is_unique_violation;

#[derive(Clone, Debug)]
pub struct PgCredentialStore {
    pool: PgPool,
}

impl PgCredentialStore {
    #[must_use]
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl CredentialStore for PgCredentialStore {
    async fn create_user(
        &self,
        username_normalized: &str,
        verifier: &str,
        now: i64,
    ) -> Result<CreateUserOutcome> {
        let user_id = Uuid::new_v4();
        let query = r"
            INSERT INTO users (user_id, username, verifier, failed_count, created_at)
            VALUES ($1, $2, $3, 0, $4)
        ";
        let span = tracing::info_span!(
            "db.query",
            db.system = "postgresql",
            db.operation = "INSERT",
            db.statement = query
        );
        let result = sqlx::query(query)
            .bind(user_id)
            .bind(username_normalized)
            .bind(verifier)
            .bind(now)
            .execute(&self.pool)
            .instrument(span)
            .await;

        match result {
            Ok(_) => Ok(CreateUserOutcome::Created(user_id)),
            Err(err) if is_unique_violation(&err) => Ok(CreateUserOutcome::Conflict),
            Err(err) => Err(err).context("failed to insert user"),
        }
    }

    async fn lookup(&self, username_normalized: &str) -> Result<Option<UserRecord>> {
        let query = r"
            SELECT user_id, username, verifier, failed_count, locked_until, created_at
            FROM users
            WHERE username = $1
            LIMIT 1
        ";
        let span = tracing::info_span!(
            "db.query",
            db.system = "postgresql",
            db.operation = "SELECT",
            db.statement = query
        );
        let row = sqlx::query(query)
            .bind(username_normalized)
            .fetch_optional(&self.pool)
            .instrument(span)
            .await
            .context("failed to lookup user by username")?;
        Ok(row.map(user_from_row))
    }

    async fn lookup_by_id(&self, user_id: Uuid) -> Result<Option<UserRecord>> {
        let query = r"
            SELECT user_id, username, verifier, failed_count, locked_until, created_at
            FROM users
            WHERE user_id = $1
            LIMIT 1
        ";
        let span = tracing::info_span!(
            "db.query",
            db.system = "postgresql",
            db.operation = "SELECT",
            db.statement = query
        );
        let row = sqlx::query(query)
            .bind(user_id)
            .fetch_optional(&self.pool)
            .instrument(span)
            .await
            .context("failed to lookup user by id")?;
        Ok(row.map(user_from_row))
    }

    async fn record_failed(
        &self,
        user_id: Uuid,
        now: i64,
        failed_threshold: i32,
        lockout_window_secs: i64,
    ) -> Result<i32> {
        // Single statement: the row lock serializes concurrent failures for
        // the same user. An expired lockout restarts the count at 1.
        let query = r"
            UPDATE users
            SET failed_count = CASE
                    WHEN locked_until IS NOT NULL AND locked_until <= $2 THEN 1
                    ELSE failed_count + 1
                END,
                locked_until = CASE
                    WHEN locked_until IS NOT NULL AND locked_until <= $2 THEN NULL
                    WHEN failed_count + 1 >= $3 THEN $2 + $4
                    ELSE locked_until
                END
            WHERE user_id = $1
            RETURNING failed_count
        ";
        let span = tracing::info_span!(
            "db.query",
            db.system = "postgresql",
            db.operation = "UPDATE",
            db.statement = query
        );
        let row = sqlx::query(query)
            .bind(user_id)
            .bind(now)
            .bind(failed_threshold)
            .bind(lockout_window_secs)
            .fetch_one(&self.pool)
            .instrument(span)
            .await
            .context("failed to record failed login")?;
        Ok(row.get("failed_count"))
    }

    async fn record_success(&self, user_id: Uuid) -> Result<()> {
        let query = r"
            UPDATE users
            SET failed_count = 0, locked_until = NULL
            WHERE user_id = $1
        ";
        let span = tracing::info_span!(
            "db.query",
            db.system = "postgresql",
            db.operation = "UPDATE",
            db.statement = query
        );
        sqlx::query(query)
            .bind(user_id)
            .execute(&self.pool)
            .instrument(span)
            .await
            .context("failed to record successful login")?;
        Ok(())
    }

    async fn update_verifier(&self, user_id: Uuid, verifier: &str) -> Result<()> {
        let query = "UPDATE users SET verifier = $2 WHERE user_id = $1";
        let span = tracing::info_span!(
            "db.query",
            db.system = "postgresql",
            db.operation = "UPDATE",
            db.statement = query
        );
        sqlx::query(query)
            .bind(user_id)
            .bind(verifier)
            .execute(&self.pool)
            .instrument(span)
            .await
            .context("failed to update verifier")?;
        Ok(())
    }
}

fn user_from_row(row: sqlx::postgres::PgRow) -> UserRecord {
    UserRecord {
        user_id: row.get("user_id"),
        username: row.get("username"),
        verifier: row.get("verifier"),
        failed_count: row.get("failed_count"),
        locked_until: row.get("locked_until"),
        created_at: row.get("created_at"),
    }
}
