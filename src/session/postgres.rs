//! Postgres-backed session store.

use anyhow::{Context, Result};
use async_trait::async_trait;
use sqlx::PgPool;
use tracing::Instrument;
use uuid::Uuid;

use super::{InsertOutcome, SessionRecord, SessionStore, TOUCH_MIN_INTERVAL_SECS};
use crate::store::is_unique_violation;

#[derive(Clone, Debug)]
pub struct PgSessionStore {
    pool: PgPool,
}

impl PgSessionStore {
    #[must_use]
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl SessionStore for PgSessionStore {
    async fn insert(
        &self,
        session_id: &[u8],
        user_id: Uuid,
        issued_at: i64,
        expires_at: i64,
    ) -> Result<InsertOutcome> {
        let query = r"
            INSERT INTO sessions (session_id, user_id, issued_at, expires_at, last_seen_at, revoked)
            VALUES ($1, $2, $3, $4, $3, FALSE)
        ";
        let span = tracing::info_span!(
            "db.query",
            db.system = "postgresql",
            db.operation = "INSERT",
            db.statement = query
        );
        let result = sqlx::query(query)
            .bind(session_id)
            .bind(user_id)
            .bind(issued_at)
            .bind(expires_at)
            .execute(&self.pool)
            .instrument(span)
            .await;

        match result {
            Ok(_) => Ok(InsertOutcome::Inserted),
            Err(err) if is_unique_violation(&err) => Ok(InsertOutcome::Conflict),
            Err(err) => Err(err).context("failed to insert session"),
        }
    }

    async fn get(&self, session_id: &[u8]) -> Result<Option<SessionRecord>> {
        let query = r"
            SELECT user_id, issued_at, expires_at, last_seen_at, revoked
            FROM sessions
            WHERE session_id = $1
            LIMIT 1
        ";
        let span = tracing::info_span!(
            "db.query",
            db.system = "postgresql",
            db.operation = "SELECT",
            db.statement = query
        );
        let row = sqlx::query_as::<_, (Uuid, i64, i64, i64, bool)>(query)
            .bind(session_id)
            .fetch_optional(&self.pool)
            .instrument(span)
            .await
            .context("failed to lookup session")?;
        Ok(
            row.map(|(user_id, issued_at, expires_at, last_seen_at, revoked)| SessionRecord {
                user_id,
                issued_at,
                expires_at,
                last_seen_at,
                revoked,
            }),
        )
    }

    async fn revoke(&self, session_id: &[u8]) -> Result<()> {
        // Zero rows affected is fine: revoke is idempotent.
        let query = "UPDATE sessions SET revoked = TRUE WHERE session_id = $1";
        let span = tracing::info_span!(
            "db.query",
            db.system = "postgresql",
            db.operation = "UPDATE",
            db.statement = query
        );
        sqlx::query(query)
            .bind(session_id)
            .execute(&self.pool)
            .instrument(span)
            .await
            .context("failed to revoke session")?;
        Ok(())
    }

    async fn revoke_all(&self, user_id: Uuid) -> Result<()> {
        let query = "UPDATE sessions SET revoked = TRUE WHERE user_id = $1 AND NOT revoked";
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
            .context("failed to revoke user sessions")?;
        Ok(())
    }

    async fn touch(&self, session_id: &[u8], now: i64) -> Result<()> {
        // The staleness predicate keeps this to at most one write per
        // minute per session.
        let query = r"
            UPDATE sessions
            SET last_seen_at = $2
            WHERE session_id = $1
              AND NOT revoked
              AND last_seen_at <= $2 - $3
        ";
        let span = tracing::info_span!(
            "db.query",
            db.system = "postgresql",
            db.operation = "UPDATE",
            db.statement = query
        );
        sqlx::query(query)
            .bind(session_id)
            .bind(now)
            .bind(TOUCH_MIN_INTERVAL_SECS)
            .execute(&self.pool)
            .instrument(span)
            .await
            .context("failed to touch session")?;
        Ok(())
    }

    async fn gc(&self, now: i64, grace_secs: i64) -> Result<u64> {
        let query = "DELETE FROM sessions WHERE expires_at < $1 - $2";
        let span = tracing::info_span!(
            "db.query",
            db.system = "postgresql",
            db.operation = "DELETE",
            db.statement = query
        );
        let result = sqlx::query(query)
            .bind(now)
            .bind(grace_secs)
            .execute(&self.pool)
            .instrument(span)
            .await
            .context("failed to garbage-collect sessions")?;
        Ok(result.rows_affected())
    }
}
