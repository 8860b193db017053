pub mod test_helpers {
    use crate::clock::FixedClock;
    use crate::config::{
        session::{SessionConfig, SessionLayer},
        MagicLinkConfig,
    };
    use crate::crypto::generate_token;
    use crate::models::{MagicLink, NewMagicLink};
    use crate::repositories::{MagicLinkRepository, SqliteMagicLinkRepository};
    use crate::services::email_service::RecordingEmailService;
    use crate::AppState;
    use chrono::{DateTime, Duration, TimeZone, Utc};
    use sqlx::{sqlite::SqlitePoolOptions, SqlitePool};
    use std::sync::Arc;
    use tempfile::NamedTempFile;
    use tower_sessions_sqlx_store::SqliteStore;

    pub const TEST_SECRET: &str = "test-secret-for-magic-link-hashing";
    pub const TEST_BASE_URL: &str = "http://localhost:3000";

    /// Create a new in-memory SQLite database for testing
    pub async fn create_test_db() -> Result<SqlitePool, sqlx::Error> {
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .connect(":memory:")
            .await?;

        // Run migrations
        sqlx::migrate!("./migrations").run(&pool).await?;

        Ok(pool)
    }

    /// Create a temporary file-based SQLite database for testing
    /// Useful when several connections must see the same data
    pub async fn create_test_db_file() -> Result<(SqlitePool, NamedTempFile), sqlx::Error> {
        let temp_file = NamedTempFile::new().map_err(sqlx::Error::Io)?;
        let db_path = temp_file
            .path()
            .to_str()
            .ok_or_else(|| sqlx::Error::Configuration("Invalid database path".into()))?;
        let database_url = format!("sqlite://{}", db_path);

        let pool = SqlitePoolOptions::new()
            .max_connections(4)
            .connect(&database_url)
            .await?;

        sqlx::migrate!("./migrations").run(&pool).await?;

        Ok((pool, temp_file))
    }

    /// Fixed instant all clock-driven tests start from.
    pub fn test_now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 5, 1, 12, 0, 0)
            .single()
            .unwrap_or_else(Utc::now)
    }

    pub fn test_magic_link_config() -> MagicLinkConfig {
        MagicLinkConfig::new(TEST_SECRET, Duration::minutes(30), TEST_BASE_URL)
    }

    /// Application state over `pool` with a fixed clock and an in-memory mailbox.
    pub fn create_test_state(
        pool: SqlitePool,
    ) -> (AppState, Arc<FixedClock>, RecordingEmailService) {
        let clock = Arc::new(FixedClock::new(test_now()));
        let email = RecordingEmailService::new();
        let state = AppState::new(
            pool,
            test_magic_link_config(),
            Arc::new(email.clone()),
            clock.clone(),
        );
        (state, clock, email)
    }

    pub async fn create_session_layer(pool: SqlitePool) -> Result<SessionLayer, sqlx::Error> {
        let session_store = SqliteStore::new(pool)
            .with_table_name("sessions_test")
            .map_err(|e| sqlx::Error::Configuration(e.into()))?;
        session_store.migrate().await?;

        Ok(SessionConfig::from_env().create_layer(session_store))
    }

    /// Insert a user directly
    pub async fn insert_test_user(
        pool: &SqlitePool,
        email: &str,
        verified: bool,
    ) -> Result<i64, sqlx::Error> {
        let result = sqlx::query("INSERT INTO users (email, email_verified) VALUES (?, ?)")
            .bind(email)
            .bind(verified)
            .execute(pool)
            .await?;

        Ok(result.last_insert_rowid())
    }

    /// Store a magic link with an explicit expiry, bypassing the service.
    pub async fn insert_magic_link(
        pool: &SqlitePool,
        user_email: &str,
        user_id: Option<i64>,
        expires_at: Option<DateTime<Utc>>,
    ) -> Result<(MagicLink, String), sqlx::Error> {
        let (token, token_hash) = generate_token(TEST_SECRET);
        let now = test_now();
        let new_link = NewMagicLink {
            token_hash,
            user_email: user_email.to_string(),
            user_id,
            expires_at: expires_at.unwrap_or(now + Duration::minutes(30)),
            created_at: now,
        };

        let magic_link = SqliteMagicLinkRepository::new(pool.clone())
            .create(&new_link)
            .await
            .map_err(|e| sqlx::Error::Protocol(e.to_string()))?;

        Ok((magic_link, token))
    }

    pub async fn count_magic_links(pool: &SqlitePool) -> Result<i64, sqlx::Error> {
        sqlx::query_scalar("SELECT COUNT(*) FROM magic_links")
            .fetch_one(pool)
            .await
    }
}
