use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

/// A pending magic-link sign-in.
///
/// Only the keyed hash of the token is kept; the raw value exists in the
/// outgoing email and in the return value of the request call.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MagicLink {
    pub id: String,
    pub token_hash: String,
    pub user_email: String,
    pub user_id: Option<i64>,
    pub expires_at: DateTime<Utc>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct NewMagicLink {
    pub token_hash: String,
    pub user_email: String,
    pub user_id: Option<i64>,
    pub expires_at: DateTime<Utc>,
    pub created_at: DateTime<Utc>,
}

/// Row shape of `magic_links`; timestamps are epoch milliseconds.
#[derive(Debug, FromRow)]
pub struct MagicLinkRow {
    pub id: String,
    pub token_hash: String,
    pub user_email: String,
    pub user_id: Option<i64>,
    pub expires_at: i64,
    pub created_at: i64,
}

impl TryFrom<MagicLinkRow> for MagicLink {
    type Error = sqlx::Error;

    fn try_from(row: MagicLinkRow) -> Result<Self, Self::Error> {
        Ok(MagicLink {
            id: row.id,
            token_hash: row.token_hash,
            user_email: row.user_email,
            user_id: row.user_id,
            expires_at: from_millis(row.expires_at)?,
            created_at: from_millis(row.created_at)?,
        })
    }
}

fn from_millis(millis: i64) -> Result<DateTime<Utc>, sqlx::Error> {
    DateTime::from_timestamp_millis(millis)
        .ok_or_else(|| sqlx::Error::Decode(format!("timestamp out of range: {}", millis).into()))
}
