/// Server-side login sessions
///
/// The browser only ever holds the opaque token; the row is keyed by its
/// SHA-256 so a leaked database does not yield usable cookies.
use super::Role;
use crate::db::{parse_timestamp, timestamp};
use crate::error::PortalResult;
use crate::store::User;
use chrono::{DateTime, Duration, Utc};
use rand::distributions::Alphanumeric;
use rand::Rng;
use sha2::{Digest, Sha256};
use sqlx::{Row, SqlitePool};

/// Session token length in characters
const TOKEN_LENGTH: usize = 48;

/// Authenticated session payload
#[derive(Debug, Clone)]
pub struct Session {
    pub user_id: i64,
    pub email: String,
    pub role: Role,
    pub full_name: String,
    pub created_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
}

/// Session manager
#[derive(Clone)]
pub struct SessionManager {
    db: SqlitePool,
    ttl: Duration,
}

fn token_hash(token: &str) -> String {
    hex::encode(Sha256::digest(token.as_bytes()))
}

fn generate_token() -> String {
    rand::thread_rng()
        .sample_iter(&Alphanumeric)
        .take(TOKEN_LENGTH)
        .map(char::from)
        .collect()
}

impl SessionManager {
    pub fn new(db: SqlitePool, ttl_hours: i64) -> Self {
        Self {
            db,
            ttl: Duration::hours(ttl_hours),
        }
    }

    /// Create a session for `user` and return the cookie token
    pub async fn create(&self, user: &User) -> PortalResult<(String, Session)> {
        let token = generate_token();
        let now = Utc::now();
        let session = Session {
            user_id: user.id,
            email: user.email.clone(),
            role: user.role,
            full_name: user.full_name.clone(),
            created_at: now,
            expires_at: now + self.ttl,
        };

        sqlx::query(
            r#"
            INSERT INTO sessions (token_hash, user_id, email, role, full_name, created_at, expires_at)
            VALUES (?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(token_hash(&token))
        .bind(session.user_id)
        .bind(&session.email)
        .bind(session.role.as_str())
        .bind(&session.full_name)
        .bind(timestamp(session.created_at))
        .bind(timestamp(session.expires_at))
        .execute(&self.db)
        .await?;

        tracing::debug!(user_id = user.id, role = user.role.as_str(), "session created");

        Ok((token, session))
    }

    /// Look up a live session; expired sessions are treated as absent
    pub async fn get(&self, token: &str) -> PortalResult<Option<Session>> {
        let row = sqlx::query(
            r#"
            SELECT user_id, email, role, full_name, created_at, expires_at
            FROM sessions
            WHERE token_hash = ?
            "#,
        )
        .bind(token_hash(token))
        .fetch_optional(&self.db)
        .await?;

        let Some(row) = row else {
            return Ok(None);
        };

        let role: String = row.get("role");
        let created_at: String = row.get("created_at");
        let expires_at: String = row.get("expires_at");
        let session = Session {
            user_id: row.get("user_id"),
            email: row.get("email"),
            role: Role::from_str(&role)?,
            full_name: row.get("full_name"),
            created_at: parse_timestamp(&created_at)?,
            expires_at: parse_timestamp(&expires_at)?,
        };

        if session.expires_at <= Utc::now() {
            return Ok(None);
        }

        Ok(Some(session))
    }

    /// Delete one session. Unknown tokens are ignored.
    pub async fn delete(&self, token: &str) -> PortalResult<()> {
        sqlx::query("DELETE FROM sessions WHERE token_hash = ?")
            .bind(token_hash(token))
            .execute(&self.db)
            .await?;

        Ok(())
    }

    /// Delete every session of a user
    pub async fn delete_for_user(&self, user_id: i64) -> PortalResult<u64> {
        let result = sqlx::query("DELETE FROM sessions WHERE user_id = ?")
            .bind(user_id)
            .execute(&self.db)
            .await?;

        Ok(result.rows_affected())
    }

    /// Delete every session of a user except the one holding `keep_token`
    pub async fn delete_others(&self, user_id: i64, keep_token: &str) -> PortalResult<u64> {
        let result = sqlx::query("DELETE FROM sessions WHERE user_id = ? AND token_hash != ?")
            .bind(user_id)
            .bind(token_hash(keep_token))
            .execute(&self.db)
            .await?;

        Ok(result.rows_affected())
    }

    /// Remove expired sessions
    pub async fn purge_expired(&self) -> PortalResult<u64> {
        let result = sqlx::query("DELETE FROM sessions WHERE expires_at <= ?")
            .bind(timestamp(Utc::now()))
            .execute(&self.db)
            .await?;

        if result.rows_affected() > 0 {
            tracing::debug!(count = result.rows_affected(), "purged expired sessions");
        }

        Ok(result.rows_affected())
    }
}
