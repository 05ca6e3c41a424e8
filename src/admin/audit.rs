/// Admin audit log
///
/// Append-only record of privileged actions, paged for the system-logs view.
use crate::db::{parse_timestamp, timestamp};
use crate::error::PortalResult;
use crate::metrics;
use chrono::{DateTime, Utc};
use serde::Serialize;
use sqlx::sqlite::SqliteRow;
use sqlx::{Row, SqlitePool};

/// Entries per page of the system-logs view
pub const LOG_PAGE_SIZE: i64 = 50;

/// Audit log entry joined with the acting admin's name
#[derive(Debug, Clone, Serialize)]
pub struct AuditLogEntry {
    pub id: i64,
    pub admin_id: i64,
    pub admin_name: Option<String>,
    pub username: Option<String>,
    pub action: String,
    pub target_type: Option<String>,
    pub target_id: Option<i64>,
    pub details: Option<String>,
    pub ip_address: Option<String>,
    pub created_at: DateTime<Utc>,
}

/// One page of the audit log
#[derive(Debug, Clone, Serialize)]
pub struct AuditLogPage {
    pub logs: Vec<AuditLogEntry>,
    pub page: i64,
    pub total_logs: i64,
    pub total_pages: i64,
    pub has_prev: bool,
    pub has_next: bool,
}

/// Description of an audited action
#[derive(Debug, Clone)]
pub struct AuditEvent<'a> {
    pub admin_id: i64,
    pub action: &'a str,
    pub target_type: Option<&'a str>,
    pub target_id: Option<i64>,
    pub details: Option<String>,
    pub ip_address: &'a str,
}

/// Audit log service
#[derive(Clone)]
pub struct AuditLog {
    db: SqlitePool,
}

const ENTRY_SELECT: &str = r#"
    SELECT al.id, al.admin_id, al.action, al.target_type, al.target_id, al.details,
           al.ip_address, al.created_at, u.full_name AS admin_name, u.username
    FROM admin_logs al
    LEFT JOIN users u ON al.admin_id = u.id
"#;

fn entry_from_row(row: &SqliteRow) -> PortalResult<AuditLogEntry> {
    let created_at: String = row.get("created_at");

    Ok(AuditLogEntry {
        id: row.get("id"),
        admin_id: row.get("admin_id"),
        admin_name: row.get("admin_name"),
        username: row.get("username"),
        action: row.get("action"),
        target_type: row.get("target_type"),
        target_id: row.get("target_id"),
        details: row.get("details"),
        ip_address: row.get("ip_address"),
        created_at: parse_timestamp(&created_at)?,
    })
}

impl AuditLog {
    pub fn new(db: SqlitePool) -> Self {
        Self { db }
    }

    /// Append an entry
    pub async fn log(&self, event: AuditEvent<'_>) -> PortalResult<()> {
        sqlx::query(
            r#"
            INSERT INTO admin_logs (admin_id, action, target_type, target_id, details, ip_address, created_at)
            VALUES (?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(event.admin_id)
        .bind(event.action)
        .bind(event.target_type)
        .bind(event.target_id)
        .bind(&event.details)
        .bind(event.ip_address)
        .bind(timestamp(Utc::now()))
        .execute(&self.db)
        .await?;

        metrics::record_admin_action(event.action);
        tracing::info!(
            admin_id = event.admin_id,
            action = event.action,
            target_type = ?event.target_type,
            target_id = ?event.target_id,
            ip = event.ip_address,
            "admin action"
        );

        Ok(())
    }

    /// Page of entries, newest first. Pages start at 1; lower values are
    /// clamped.
    pub async fn list_page(&self, page: i64) -> PortalResult<AuditLogPage> {
        let page = page.max(1);

        let total_logs: i64 = sqlx::query("SELECT COUNT(*) AS count FROM admin_logs")
            .fetch_one(&self.db)
            .await?
            .get("count");

        let sql = format!(
            "{} ORDER BY al.created_at DESC, al.id DESC LIMIT ? OFFSET ?",
            ENTRY_SELECT
        );
        let rows = sqlx::query(&sql)
            .bind(LOG_PAGE_SIZE)
            .bind((page - 1).saturating_mul(LOG_PAGE_SIZE))
            .fetch_all(&self.db)
            .await?;
        let logs = rows.iter().map(entry_from_row).collect::<PortalResult<Vec<_>>>()?;

        let total_pages = (total_logs + LOG_PAGE_SIZE - 1) / LOG_PAGE_SIZE;

        Ok(AuditLogPage {
            logs,
            page,
            total_logs,
            total_pages,
            has_prev: page > 1,
            has_next: page < total_pages,
        })
    }

    /// Latest entries across all admins
    pub async fn recent(&self, limit: i64) -> PortalResult<Vec<AuditLogEntry>> {
        let sql = format!("{} ORDER BY al.created_at DESC, al.id DESC LIMIT ?", ENTRY_SELECT);
        let rows = sqlx::query(&sql).bind(limit).fetch_all(&self.db).await?;
        rows.iter().map(entry_from_row).collect()
    }

    /// Latest entries by sub-admins
    pub async fn recent_by_subadmins(&self, limit: i64) -> PortalResult<Vec<AuditLogEntry>> {
        let sql = format!(
            "{} WHERE u.role = 'subadmin' ORDER BY al.created_at DESC, al.id DESC LIMIT ?",
            ENTRY_SELECT
        );
        let rows = sqlx::query(&sql).bind(limit).fetch_all(&self.db).await?;
        rows.iter().map(entry_from_row).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db;

    async fn audit() -> AuditLog {
        let pool = db::memory_pool().await.unwrap();
        db::ensure_schema(&pool).await.unwrap();
        AuditLog::new(pool)
    }

    fn event(action: &str) -> AuditEvent<'_> {
        AuditEvent {
            admin_id: 1,
            action,
            target_type: Some("category"),
            target_id: Some(4),
            details: Some("Deleted category".to_string()),
            ip_address: "10.0.0.1",
        }
    }

    #[tokio::test]
    async fn test_log_and_recent() {
        let audit = audit().await;
        audit.log(event("add_category")).await.unwrap();
        audit.log(event("delete_category")).await.unwrap();

        let recent = audit.recent(10).await.unwrap();
        assert_eq!(recent.len(), 2);
        assert_eq!(recent[0].action, "delete_category");
        assert_eq!(recent[0].ip_address.as_deref(), Some("10.0.0.1"));
        assert!(recent[0].admin_name.is_none());
    }

    #[tokio::test]
    async fn test_pagination() {
        let audit = audit().await;
        for _ in 0..(LOG_PAGE_SIZE + 5) {
            audit.log(event("update_setting")).await.unwrap();
        }

        let first = audit.list_page(1).await.unwrap();
        assert_eq!(first.logs.len() as i64, LOG_PAGE_SIZE);
        assert_eq!(first.total_logs, LOG_PAGE_SIZE + 5);
        assert_eq!(first.total_pages, 2);
        assert!(!first.has_prev);
        assert!(first.has_next);

        let second = audit.list_page(2).await.unwrap();
        assert_eq!(second.logs.len(), 5);
        assert!(second.has_prev);
        assert!(!second.has_next);

        let clamped = audit.list_page(0).await.unwrap();
        assert_eq!(clamped.page, 1);

        let far = audit.list_page(i64::MAX).await.unwrap();
        assert!(far.logs.is_empty());
        assert!(far.has_prev);
        assert!(!far.has_next);
    }

    #[tokio::test]
    async fn test_empty_log() {
        let audit = audit().await;
        let page = audit.list_page(1).await.unwrap();
        assert_eq!(page.total_pages, 0);
        assert!(!page.has_next);
        assert!(audit.recent_by_subadmins(20).await.unwrap().is_empty());
    }
}
