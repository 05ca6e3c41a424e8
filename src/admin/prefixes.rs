/// Index-number prefixes accepted at registration
use crate::db::{parse_timestamp, timestamp};
use crate::error::{PortalError, PortalResult};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::{Row, SqlitePool};

/// Prefix record
#[derive(Debug, Clone, Serialize)]
pub struct IndexPrefix {
    pub id: i64,
    pub prefix: String,
    pub description: Option<String>,
    pub created_at: DateTime<Utc>,
}

/// Add-prefix form
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct PrefixForm {
    pub prefix: String,
    pub description: String,
}

/// Prefix manager
#[derive(Clone)]
pub struct PrefixManager {
    db: SqlitePool,
}

impl PrefixManager {
    pub fn new(db: SqlitePool) -> Self {
        Self { db }
    }

    /// All prefixes, alphabetical
    pub async fn list(&self) -> PortalResult<Vec<IndexPrefix>> {
        let rows = sqlx::query(
            r#"
            SELECT id, prefix, description, created_at
            FROM index_prefixes
            ORDER BY prefix
            "#,
        )
        .fetch_all(&self.db)
        .await?;

        let mut prefixes = Vec::with_capacity(rows.len());
        for row in rows {
            let created_at: String = row.get("created_at");
            prefixes.push(IndexPrefix {
                id: row.get("id"),
                prefix: row.get("prefix"),
                description: row.get("description"),
                created_at: parse_timestamp(&created_at)?,
            });
        }

        Ok(prefixes)
    }

    /// Prefix strings only, as used by registration
    pub async fn prefix_strings(&self) -> PortalResult<Vec<String>> {
        Ok(self.list().await?.into_iter().map(|p| p.prefix).collect())
    }

    /// Add a prefix; stored upper-case
    pub async fn add(&self, form: PrefixForm) -> PortalResult<IndexPrefix> {
        let prefix = form.prefix.trim().to_uppercase();
        if prefix.is_empty() {
            return Err(PortalError::Validation("Prefix is required.".to_string()));
        }
        if !prefix.chars().all(|c| c.is_ascii_alphanumeric()) {
            return Err(PortalError::Validation(
                "Prefix may only contain letters and digits.".to_string(),
            ));
        }
        let description = Some(form.description.trim().to_string()).filter(|d| !d.is_empty());
        let now = Utc::now();

        let result = sqlx::query(
            r#"
            INSERT INTO index_prefixes (prefix, description, created_at)
            VALUES (?, ?, ?)
            "#,
        )
        .bind(&prefix)
        .bind(&description)
        .bind(timestamp(now))
        .execute(&self.db)
        .await
        .map_err(|e| PortalError::unique_violation(e, "Prefix already exists."))?;

        Ok(IndexPrefix {
            id: result.last_insert_rowid(),
            prefix,
            description,
            created_at: now,
        })
    }

    /// Delete a prefix, returning its value. `None` when the id does not exist.
    pub async fn delete(&self, id: i64) -> PortalResult<Option<String>> {
        let row = sqlx::query("SELECT prefix FROM index_prefixes WHERE id = ?")
            .bind(id)
            .fetch_optional(&self.db)
            .await?;
        let Some(row) = row else {
            return Ok(None);
        };

        sqlx::query("DELETE FROM index_prefixes WHERE id = ?")
            .bind(id)
            .execute(&self.db)
            .await?;

        Ok(Some(row.get("prefix")))
    }
}
