use super::RepositoryResult;
use crate::models::{MagicLink, MagicLinkRow, NewMagicLink};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::SqlitePool;
use uuid::Uuid;

/// Durable storage for magic-link records.
///
/// `delete` reports whether a row was removed so that concurrent redemptions
/// of the same token can be told apart: only one caller sees `true`.
#[async_trait]
#[cfg_attr(test, mockall::automock)]
pub trait MagicLinkRepository: Send + Sync {
    async fn create(&self, magic_link: &NewMagicLink) -> RepositoryResult<MagicLink>;
    async fn find_by_id(&self, id: &str) -> RepositoryResult<Option<MagicLink>>;
    /// Exact hash match restricted to records with `expires_at > now`.
    async fn find_valid_by_token_hash(
        &self,
        token_hash: &str,
        now: DateTime<Utc>,
    ) -> RepositoryResult<Option<MagicLink>>;
    async fn delete(&self, id: &str) -> RepositoryResult<bool>;
    async fn delete_expired(&self, now: DateTime<Utc>) -> RepositoryResult<u64>;
}

pub struct SqliteMagicLinkRepository {
    pool: SqlitePool,
}

impl SqliteMagicLinkRepository {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl MagicLinkRepository for SqliteMagicLinkRepository {
    async fn create(&self, magic_link: &NewMagicLink) -> RepositoryResult<MagicLink> {
        let id = Uuid::new_v4().to_string();

        sqlx::query(
            r#"
            INSERT INTO magic_links (id, token_hash, user_email, user_id, expires_at, created_at)
            VALUES (?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(&id)
        .bind(&magic_link.token_hash)
        .bind(&magic_link.user_email)
        .bind(magic_link.user_id)
        .bind(magic_link.expires_at.timestamp_millis())
        .bind(magic_link.created_at.timestamp_millis())
        .execute(&self.pool)
        .await?;

        // Round-trip through the row type so the returned record carries
        // the stored (millisecond) precision.
        let row = MagicLinkRow {
            id,
            token_hash: magic_link.token_hash.clone(),
            user_email: magic_link.user_email.clone(),
            user_id: magic_link.user_id,
            expires_at: magic_link.expires_at.timestamp_millis(),
            created_at: magic_link.created_at.timestamp_millis(),
        };

        Ok(MagicLink::try_from(row)?)
    }

    async fn find_by_id(&self, id: &str) -> RepositoryResult<Option<MagicLink>> {
        let row = sqlx::query_as::<_, MagicLinkRow>(
            r#"
            SELECT id, token_hash, user_email, user_id, expires_at, created_at
            FROM magic_links
            WHERE id = ?
            "#,
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.map(MagicLink::try_from).transpose()?)
    }

    async fn find_valid_by_token_hash(
        &self,
        token_hash: &str,
        now: DateTime<Utc>,
    ) -> RepositoryResult<Option<MagicLink>> {
        let row = sqlx::query_as::<_, MagicLinkRow>(
            r#"
            SELECT id, token_hash, user_email, user_id, expires_at, created_at
            FROM magic_links
            WHERE token_hash = ? AND expires_at > ?
            LIMIT 1
            "#,
        )
        .bind(token_hash)
        .bind(now.timestamp_millis())
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.map(MagicLink::try_from).transpose()?)
    }

    async fn delete(&self, id: &str) -> RepositoryResult<bool> {
        let result = sqlx::query("DELETE FROM magic_links WHERE id = ?")
            .bind(id)
            .execute(&self.pool)
            .await?;

        Ok(result.rows_affected() == 1)
    }

    async fn delete_expired(&self, now: DateTime<Utc>) -> RepositoryResult<u64> {
        let result = sqlx::query("DELETE FROM magic_links WHERE expires_at <= ?")
            .bind(now.timestamp_millis())
            .execute(&self.pool)
            .await?;

        Ok(result.rows_affected())
    }
}
