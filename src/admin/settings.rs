/// System settings (key/value pairs grouped by category)
use crate::db::{parse_timestamp, timestamp};
use crate::error::{PortalError, PortalResult};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::sqlite::SqliteRow;
use sqlx::{Row, SqlitePool};
use std::collections::{BTreeMap, HashMap};

/// Form fields carrying bulk setting updates are named `setting_<key>`
pub const BULK_FIELD_PREFIX: &str = "setting_";

/// Setting record
#[derive(Debug, Clone, Serialize)]
pub struct SystemSetting {
    pub id: i64,
    pub key: String,
    pub value: String,
    pub description: Option<String>,
    pub category: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Add-setting form
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct NewSettingForm {
    pub key: String,
    pub value: String,
    pub description: String,
    pub category: String,
}

/// Single-setting update form
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct UpdateSettingForm {
    pub key: String,
    pub value: String,
}

/// Settings manager
#[derive(Clone)]
pub struct SettingsManager {
    db: SqlitePool,
}

fn setting_from_row(row: &SqliteRow) -> PortalResult<SystemSetting> {
    let created_at: String = row.get("created_at");
    let updated_at: String = row.get("updated_at");

    Ok(SystemSetting {
        id: row.get("id"),
        key: row.get("key"),
        value: row.get("value"),
        description: row.get("description"),
        category: row.get("category"),
        created_at: parse_timestamp(&created_at)?,
        updated_at: parse_timestamp(&updated_at)?,
    })
}

impl SettingsManager {
    pub fn new(db: SqlitePool) -> Self {
        Self { db }
    }

    /// All settings grouped by category, keys sorted within each group
    pub async fn list_grouped(&self) -> PortalResult<BTreeMap<String, Vec<SystemSetting>>> {
        let rows = sqlx::query(
            r#"
            SELECT id, key, value, description, category, created_at, updated_at
            FROM system_settings
            ORDER BY category, key
            "#,
        )
        .fetch_all(&self.db)
        .await?;

        let mut grouped: BTreeMap<String, Vec<SystemSetting>> = BTreeMap::new();
        for row in &rows {
            let setting = setting_from_row(row)?;
            grouped
                .entry(setting.category.clone())
                .or_default()
                .push(setting);
        }

        Ok(grouped)
    }

    /// Raw value of one setting
    pub async fn get(&self, key: &str) -> PortalResult<Option<String>> {
        let row = sqlx::query("SELECT value FROM system_settings WHERE key = ?")
            .bind(key)
            .fetch_optional(&self.db)
            .await?;

        Ok(row.map(|r| r.get("value")))
    }

    /// Boolean setting; missing or unparsable values fall back to `default`
    pub async fn get_bool(&self, key: &str, default: bool) -> PortalResult<bool> {
        Ok(match self.get(key).await?.as_deref().map(str::trim) {
            Some(v) if v.eq_ignore_ascii_case("true") || v == "1" => true,
            Some(v) if v.eq_ignore_ascii_case("false") || v == "0" => false,
            _ => default,
        })
    }

    /// Add a new setting. Keys are unique.
    pub async fn add(&self, form: NewSettingForm) -> PortalResult<SystemSetting> {
        let key = form.key.trim();
        if key.is_empty() {
            return Err(PortalError::Validation("Setting key is required.".to_string()));
        }
        let category = match form.category.trim() {
            "" => "general",
            other => other,
        };
        let description = Some(form.description.trim().to_string()).filter(|d| !d.is_empty());
        let now = Utc::now();

        let result = sqlx::query(
            r#"
            INSERT INTO system_settings (key, value, description, category, created_at, updated_at)
            VALUES (?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(key)
        .bind(&form.value)
        .bind(&description)
        .bind(category)
        .bind(timestamp(now))
        .bind(timestamp(now))
        .execute(&self.db)
        .await
        .map_err(|e| PortalError::unique_violation(e, "Setting already exists."))?;

        Ok(SystemSetting {
            id: result.last_insert_rowid(),
            key: key.to_string(),
            value: form.value,
            description,
            category: category.to_string(),
            created_at: now,
            updated_at: now,
        })
    }

    /// Update one setting's value
    pub async fn update(&self, key: &str, value: &str) -> PortalResult<()> {
        let result = sqlx::query(
            r#"
            UPDATE system_settings
            SET value = ?, updated_at = ?
            WHERE key = ?
            "#,
        )
        .bind(value)
        .bind(timestamp(Utc::now()))
        .bind(key)
        .execute(&self.db)
        .await?;

        if result.rows_affected() == 0 {
            return Err(PortalError::NotFound(format!("Setting {}", key)));
        }

        Ok(())
    }

    /// Apply every `setting_<key>` field of a submitted form. Unknown keys
    /// and unrelated fields are ignored. Returns how many settings changed.
    pub async fn update_many(&self, fields: &HashMap<String, String>) -> PortalResult<u64> {
        let now = timestamp(Utc::now());
        let mut updated = 0;

        for (field, value) in fields {
            let Some(key) = field.strip_prefix(BULK_FIELD_PREFIX) else {
                continue;
            };

            let result = sqlx::query(
                r#"
                UPDATE system_settings
                SET value = ?, updated_at = ?
                WHERE key = ?
                "#,
            )
            .bind(value)
            .bind(&now)
            .bind(key)
            .execute(&self.db)
            .await?;
            updated += result.rows_affected();
        }

        Ok(updated)
    }

    /// Delete a setting. Returns whether it existed.
    pub async fn delete(&self, key: &str) -> PortalResult<bool> {
        let result = sqlx::query("DELETE FROM system_settings WHERE key = ?")
            .bind(key)
            .execute(&self.db)
            .await?;

        Ok(result.rows_affected() > 0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db;

    async fn manager() -> SettingsManager {
        let pool = db::memory_pool().await.unwrap();
        db::ensure_schema(&pool).await.unwrap();
        SettingsManager::new(pool)
    }

    #[tokio::test]
    async fn test_grouped_defaults() {
        let manager = manager().await;
        let grouped = manager.list_grouped().await.unwrap();

        assert_eq!(grouped["general"].len(), 3);
        assert_eq!(grouped["system"].len(), 2);
        assert_eq!(grouped["appearance"][0].key, "logo_url");
        assert!(manager.get_bool("registration_enabled", false).await.unwrap());
        assert!(!manager.get_bool("maintenance_mode", true).await.unwrap());
        assert!(manager.get_bool("missing_key", true).await.unwrap());
    }

    #[tokio::test]
    async fn test_add_update_delete() {
        let manager = manager().await;
        let added = manager
            .add(NewSettingForm {
                key: "semester".to_string(),
                value: "First".to_string(),
                description: String::new(),
                category: String::new(),
            })
            .await
            .unwrap();
        assert_eq!(added.category, "general");

        let duplicate = manager
            .add(NewSettingForm {
                key: "semester".to_string(),
                ..Default::default()
            })
            .await;
        assert!(matches!(duplicate, Err(PortalError::Validation(_))));

        manager.update("semester", "Second").await.unwrap();
        assert_eq!(manager.get("semester").await.unwrap().as_deref(), Some("Second"));
        assert!(matches!(
            manager.update("nope", "x").await,
            Err(PortalError::NotFound(_))
        ));

        assert!(manager.delete("semester").await.unwrap());
        assert!(!manager.delete("semester").await.unwrap());
    }

    #[tokio::test]
    async fn test_update_many_only_touches_prefixed_fields() {
        let manager = manager().await;
        let mut fields = HashMap::new();
        fields.insert("setting_site_name".to_string(), "CS Portal".to_string());
        fields.insert("setting_maintenance_mode".to_string(), "true".to_string());
        fields.insert("setting_not_a_key".to_string(), "x".to_string());
        fields.insert("site_description".to_string(), "ignored".to_string());

        assert_eq!(manager.update_many(&fields).await.unwrap(), 2);
        assert_eq!(
            manager.get("site_name").await.unwrap().as_deref(),
            Some("CS Portal")
        );
        assert!(manager.get_bool("maintenance_mode", false).await.unwrap());
        assert_eq!(
            manager.get("site_description").await.unwrap().as_deref(),
            Some("CS Department Issue Reporting System")
        );
    }
}
