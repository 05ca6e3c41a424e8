/// System notifications shown on the admin console
use crate::db::{parse_timestamp, timestamp};
use crate::error::{PortalError, PortalResult};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::sqlite::SqliteRow;
use sqlx::{Row, SqlitePool};

/// Notification severity
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NotificationKind {
    #[default]
    Info,
    Success,
    Warning,
    Danger,
}

impl NotificationKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            NotificationKind::Info => "info",
            NotificationKind::Success => "success",
            NotificationKind::Warning => "warning",
            NotificationKind::Danger => "danger",
        }
    }

    pub fn from_str(s: &str) -> PortalResult<Self> {
        match s.trim().to_lowercase().as_str() {
            "" | "info" => Ok(NotificationKind::Info),
            "success" => Ok(NotificationKind::Success),
            "warning" => Ok(NotificationKind::Warning),
            "danger" => Ok(NotificationKind::Danger),
            _ => Err(PortalError::Validation(format!(
                "Invalid notification type: {}",
                s
            ))),
        }
    }
}

/// Notification record
#[derive(Debug, Clone, Serialize)]
pub struct SystemNotification {
    pub id: i64,
    pub title: String,
    pub message: String,
    #[serde(rename = "type")]
    pub kind: NotificationKind,
    pub is_read: bool,
    pub created_at: DateTime<Utc>,
}

/// Create-notification form
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct NotificationForm {
    pub title: String,
    pub message: String,
    #[serde(rename = "type")]
    pub kind: String,
}

/// Notification manager
#[derive(Clone)]
pub struct NotificationManager {
    db: SqlitePool,
}

fn notification_from_row(row: &SqliteRow) -> PortalResult<SystemNotification> {
    let kind: String = row.get("type");
    let created_at: String = row.get("created_at");

    Ok(SystemNotification {
        id: row.get("id"),
        title: row.get("title"),
        message: row.get("message"),
        kind: NotificationKind::from_str(&kind)?,
        is_read: row.get("is_read"),
        created_at: parse_timestamp(&created_at)?,
    })
}

impl NotificationManager {
    pub fn new(db: SqlitePool) -> Self {
        Self { db }
    }

    /// All notifications, newest first
    pub async fn list(&self) -> PortalResult<Vec<SystemNotification>> {
        let rows = sqlx::query(
            r#"
            SELECT id, title, message, type, is_read, created_at
            FROM system_notifications
            ORDER BY created_at DESC, id DESC
            "#,
        )
        .fetch_all(&self.db)
        .await?;

        rows.iter().map(notification_from_row).collect()
    }

    /// Unread notifications, newest first
    pub async fn list_unread(&self, limit: i64) -> PortalResult<Vec<SystemNotification>> {
        let rows = sqlx::query(
            r#"
            SELECT id, title, message, type, is_read, created_at
            FROM system_notifications
            WHERE is_read = 0
            ORDER BY created_at DESC, id DESC
            LIMIT ?
            "#,
        )
        .bind(limit)
        .fetch_all(&self.db)
        .await?;

        rows.iter().map(notification_from_row).collect()
    }

    /// Create a notification
    pub async fn create(&self, form: NotificationForm) -> PortalResult<SystemNotification> {
        let title = form.title.trim();
        let message = form.message.trim();
        if title.is_empty() || message.is_empty() {
            return Err(PortalError::Validation(
                "Title and message are required.".to_string(),
            ));
        }
        let kind = NotificationKind::from_str(&form.kind)?;
        let now = Utc::now();

        let result = sqlx::query(
            r#"
            INSERT INTO system_notifications (title, message, type, is_read, created_at)
            VALUES (?, ?, ?, 0, ?)
            "#,
        )
        .bind(title)
        .bind(message)
        .bind(kind.as_str())
        .bind(timestamp(now))
        .execute(&self.db)
        .await?;

        Ok(SystemNotification {
            id: result.last_insert_rowid(),
            title: title.to_string(),
            message: message.to_string(),
            kind,
            is_read: false,
            created_at: now,
        })
    }

    /// Mark one notification read. Returns whether it existed.
    pub async fn mark_read(&self, id: i64) -> PortalResult<bool> {
        let result = sqlx::query("UPDATE system_notifications SET is_read = 1 WHERE id = ?")
            .bind(id)
            .execute(&self.db)
            .await?;

        Ok(result.rows_affected() > 0)
    }

    /// Delete one notification. Returns whether it existed.
    pub async fn delete(&self, id: i64) -> PortalResult<bool> {
        let result = sqlx::query("DELETE FROM system_notifications WHERE id = ?")
            .bind(id)
            .execute(&self.db)
            .await?;

        Ok(result.rows_affected() > 0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db;

    async fn manager() -> NotificationManager {
        let pool = db::memory_pool().await.unwrap();
        db::ensure_schema(&pool).await.unwrap();
        NotificationManager::new(pool)
    }

    fn form(title: &str, kind: &str) -> NotificationForm {
        NotificationForm {
            title: title.to_string(),
            message: "Scheduled maintenance on Saturday".to_string(),
            kind: kind.to_string(),
        }
    }

    #[test]
    fn test_kind_parsing() {
        assert_eq!(NotificationKind::from_str("").unwrap(), NotificationKind::Info);
        assert_eq!(
            NotificationKind::from_str("Warning").unwrap(),
            NotificationKind::Warning
        );
        assert!(NotificationKind::from_str("critical").is_err());
    }

    #[tokio::test]
    async fn test_create_and_read_flow() {
        let manager = manager().await;
        let first = manager.create(form("Downtime", "warning")).await.unwrap();
        manager.create(form("Welcome", "")).await.unwrap();

        assert_eq!(manager.list().await.unwrap().len(), 2);
        assert_eq!(manager.list_unread(5).await.unwrap().len(), 2);

        assert!(manager.mark_read(first.id).await.unwrap());
        let unread = manager.list_unread(5).await.unwrap();
        assert_eq!(unread.len(), 1);
        assert_eq!(unread[0].title, "Welcome");
        assert_eq!(unread[0].kind, NotificationKind::Info);

        assert!(manager.delete(first.id).await.unwrap());
        assert!(!manager.delete(first.id).await.unwrap());
        assert!(!manager.mark_read(first.id).await.unwrap());
    }

    #[tokio::test]
    async fn test_create_rejects_invalid() {
        let manager = manager().await;
        assert!(matches!(
            manager.create(form("", "info")).await,
            Err(PortalError::Validation(_))
        ));
        assert!(manager.create(form("Hello", "purple")).await.is_err());
    }
}
