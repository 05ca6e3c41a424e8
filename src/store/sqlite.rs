/// SQLite-backed user and issue store
use super::{Issue, IssueChanges, IssueFilter, IssueStore, NewIssue, NewUser, User, UserChanges, UserStore};
use crate::account::Role;
use crate::db::{parse_optional_timestamp, parse_timestamp, timestamp};
use crate::error::{PortalError, PortalResult};
use crate::issues::{IssueStatus, Priority};
use async_trait::async_trait;
use chrono::Utc;
use sqlx::sqlite::SqliteRow;
use sqlx::{QueryBuilder, Row, Sqlite, SqlitePool};

const USER_COLUMNS: &str = "id, username, email, full_name, index_number, level, gender, password, \
     role, is_verified, is_active, verification_code, reset_token, reset_expires, last_login, \
     login_count, created_at";

const ISSUE_COLUMNS: &str = "id, student_id, subject, category, message, status, priority, \
     assigned_to, response, created_at, updated_at";

const DUPLICATE_USER: &str = "Username, email or index number already exists.";

/// Store over the shared SQLite pool
#[derive(Clone)]
pub struct SqliteStore {
    db: SqlitePool,
}

impl SqliteStore {
    pub fn new(db: SqlitePool) -> Self {
        Self { db }
    }

    async fn fetch_user(&self, column: &str, value: &str) -> PortalResult<Option<User>> {
        let sql = format!("SELECT {} FROM users WHERE {} = ?", USER_COLUMNS, column);
        let row = sqlx::query(&sql)
            .bind(value)
            .fetch_optional(&self.db)
            .await?;

        row.as_ref().map(user_from_row).transpose()
    }
}

fn user_from_row(row: &SqliteRow) -> PortalResult<User> {
    let role: String = row.get("role");
    let created_at: String = row.get("created_at");

    Ok(User {
        id: row.get("id"),
        username: row.get("username"),
        email: row.get("email"),
        full_name: row.get("full_name"),
        index_number: row.get("index_number"),
        level: row.get("level"),
        gender: row.get("gender"),
        password_hash: row.get("password"),
        role: Role::from_str(&role)?,
        is_verified: row.get("is_verified"),
        is_active: row.get("is_active"),
        verification_code: row.get("verification_code"),
        reset_token: row.get("reset_token"),
        reset_expires: parse_optional_timestamp(row.get("reset_expires")),
        last_login: parse_optional_timestamp(row.get("last_login")),
        login_count: row.get("login_count"),
        created_at: parse_timestamp(&created_at)?,
    })
}

fn issue_from_row(row: &SqliteRow) -> PortalResult<Issue> {
    let status: String = row.get("status");
    let priority: Option<String> = row.get("priority");
    let created_at: String = row.get("created_at");
    let updated_at: String = row.get("updated_at");

    Ok(Issue {
        id: row.get("id"),
        student_id: row.get("student_id"),
        subject: row.get("subject"),
        category: row.get("category"),
        message: row.get("message"),
        status: IssueStatus::from_str(&status)?,
        priority: priority.as_deref().map(Priority::from_str).transpose()?,
        assigned_to: row.get("assigned_to"),
        response: row.get("response"),
        created_at: parse_timestamp(&created_at)?,
        updated_at: parse_timestamp(&updated_at)?,
    })
}

#[async_trait]
impl UserStore for SqliteStore {
    async fn insert_user(&self, user: NewUser) -> PortalResult<User> {
        let now = Utc::now();

        let result = sqlx::query(
            r#"
            INSERT INTO users (username, email, full_name, index_number, level, gender,
                               password, role, is_verified, is_active, login_count, created_at)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, 1, 0, ?)
            "#,
        )
        .bind(&user.username)
        .bind(&user.email)
        .bind(&user.full_name)
        .bind(&user.index_number)
        .bind(&user.level)
        .bind(&user.gender)
        .bind(&user.password_hash)
        .bind(user.role.as_str())
        .bind(user.is_verified)
        .bind(timestamp(now))
        .execute(&self.db)
        .await
        .map_err(|e| PortalError::unique_violation(e, DUPLICATE_USER))?;

        Ok(User {
            id: result.last_insert_rowid(),
            username: user.username,
            email: user.email,
            full_name: user.full_name,
            index_number: user.index_number,
            level: user.level,
            gender: user.gender,
            password_hash: user.password_hash,
            role: user.role,
            is_verified: user.is_verified,
            is_active: true,
            verification_code: None,
            reset_token: None,
            reset_expires: None,
            last_login: None,
            login_count: 0,
            created_at: now,
        })
    }

    async fn get_user(&self, id: i64) -> PortalResult<Option<User>> {
        let sql = format!("SELECT {} FROM users WHERE id = ?", USER_COLUMNS);
        let row = sqlx::query(&sql).bind(id).fetch_optional(&self.db).await?;

        row.as_ref().map(user_from_row).transpose()
    }

    async fn find_user_by_email(&self, email: &str) -> PortalResult<Option<User>> {
        let sql = format!(
            "SELECT {} FROM users WHERE lower(email) = lower(?)",
            USER_COLUMNS
        );
        let row = sqlx::query(&sql)
            .bind(email.trim())
            .fetch_optional(&self.db)
            .await?;

        row.as_ref().map(user_from_row).transpose()
    }

    async fn find_user_by_username(&self, username: &str) -> PortalResult<Option<User>> {
        self.fetch_user("username", username).await
    }

    async fn find_user_by_index_number(&self, index_number: &str) -> PortalResult<Option<User>> {
        self.fetch_user("index_number", index_number).await
    }

    async fn find_user_by_reset_token(&self, token: &str) -> PortalResult<Option<User>> {
        self.fetch_user("reset_token", token).await
    }

    async fn list_users(&self, role: Option<Role>) -> PortalResult<Vec<User>> {
        let mut query: QueryBuilder<Sqlite> =
            QueryBuilder::new(format!("SELECT {} FROM users", USER_COLUMNS));
        if let Some(role) = role {
            query.push(" WHERE role = ").push_bind(role.as_str());
        }
        query.push(" ORDER BY created_at DESC, id DESC");

        let rows = query.build().fetch_all(&self.db).await?;
        rows.iter().map(user_from_row).collect()
    }

    async fn update_user(&self, id: i64, changes: UserChanges) -> PortalResult<Option<User>> {
        let Some(mut user) = self.get_user(id).await? else {
            return Ok(None);
        };
        changes.apply(&mut user);

        sqlx::query(
            r#"
            UPDATE users
            SET password = ?, role = ?, is_active = ?, is_verified = ?,
                reset_token = ?, reset_expires = ?, last_login = ?, login_count = ?
            WHERE id = ?
            "#,
        )
        .bind(&user.password_hash)
        .bind(user.role.as_str())
        .bind(user.is_active)
        .bind(user.is_verified)
        .bind(&user.reset_token)
        .bind(user.reset_expires.map(timestamp))
        .bind(user.last_login.map(timestamp))
        .bind(user.login_count)
        .bind(id)
        .execute(&self.db)
        .await?;

        Ok(Some(user))
    }

    async fn delete_user(&self, id: i64) -> PortalResult<bool> {
        let result = sqlx::query("DELETE FROM users WHERE id = ?")
            .bind(id)
            .execute(&self.db)
            .await?;

        Ok(result.rows_affected() > 0)
    }
}

#[async_trait]
impl IssueStore for SqliteStore {
    async fn insert_issue(&self, issue: NewIssue) -> PortalResult<Issue> {
        let now = Utc::now();

        let result = sqlx::query(
            r#"
            INSERT INTO issues (student_id, subject, category, message, status, priority,
                                created_at, updated_at)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(issue.student_id)
        .bind(&issue.subject)
        .bind(&issue.category)
        .bind(&issue.message)
        .bind(IssueStatus::Pending.as_str())
        .bind(issue.priority.map(|p| p.as_str()))
        .bind(timestamp(now))
        .bind(timestamp(now))
        .execute(&self.db)
        .await?;

        Ok(Issue {
            id: result.last_insert_rowid(),
            student_id: issue.student_id,
            subject: issue.subject,
            category: issue.category,
            message: issue.message,
            status: IssueStatus::Pending,
            priority: issue.priority,
            assigned_to: None,
            response: None,
            created_at: now,
            updated_at: now,
        })
    }

    async fn get_issue(&self, id: i64) -> PortalResult<Option<Issue>> {
        let sql = format!("SELECT {} FROM issues WHERE id = ?", ISSUE_COLUMNS);
        let row = sqlx::query(&sql).bind(id).fetch_optional(&self.db).await?;

        row.as_ref().map(issue_from_row).transpose()
    }

    async fn list_issues(&self, filter: &IssueFilter) -> PortalResult<Vec<Issue>> {
        let mut query: QueryBuilder<Sqlite> =
            QueryBuilder::new(format!("SELECT {} FROM issues WHERE 1 = 1", ISSUE_COLUMNS));
        if let Some(student_id) = filter.student_id {
            query.push(" AND student_id = ").push_bind(student_id);
        }
        if let Some(assignee) = filter.assigned_to {
            query.push(" AND assigned_to = ").push_bind(assignee);
        }
        if let Some(status) = filter.status {
            query.push(" AND status = ").push_bind(status.as_str());
        }
        query.push(" ORDER BY created_at DESC, id DESC");
        if let Some(limit) = filter.limit {
            query.push(" LIMIT ").push_bind(limit);
        }

        let rows = query.build().fetch_all(&self.db).await?;
        rows.iter().map(issue_from_row).collect()
    }

    async fn update_issue(&self, id: i64, changes: IssueChanges) -> PortalResult<Option<Issue>> {
        let Some(mut issue) = self.get_issue(id).await? else {
            return Ok(None);
        };
        changes.apply(&mut issue);

        sqlx::query(
            r#"
            UPDATE issues
            SET status = ?, response = ?, priority = ?, assigned_to = ?, updated_at = ?
            WHERE id = ?
            "#,
        )
        .bind(issue.status.as_str())
        .bind(&issue.response)
        .bind(issue.priority.map(|p| p.as_str()))
        .bind(issue.assigned_to)
        .bind(timestamp(issue.updated_at))
        .bind(id)
        .execute(&self.db)
        .await?;

        Ok(Some(issue))
    }

    async fn delete_issue(&self, id: i64) -> PortalResult<bool> {
        let result = sqlx::query("DELETE FROM issues WHERE id = ?")
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

    async fn store() -> SqliteStore {
        let pool = db::memory_pool().await.unwrap();
        db::ensure_schema(&pool).await.unwrap();
        SqliteStore::new(pool)
    }

    fn student(username: &str, email: &str, index: &str) -> NewUser {
        NewUser {
            username: username.to_string(),
            email: email.to_string(),
            full_name: "Alice Mensah".to_string(),
            index_number: index.to_string(),
            level: "200".to_string(),
            gender: "Female".to_string(),
            password_hash: "$argon2id$placeholder".to_string(),
            role: Role::Student,
            is_verified: true,
        }
    }

    #[tokio::test]
    async fn test_insert_and_find_user() {
        let store = store().await;
        let user = store
            .insert_user(student("alice", "alice@ktu.edu.gh", "CS2024001"))
            .await
            .unwrap();

        let found = store
            .find_user_by_email("ALICE@ktu.edu.gh")
            .await
            .unwrap()
            .unwrap();
        assert_eq!(found.id, user.id);
        assert_eq!(found.role, Role::Student);
        assert!(found.is_active);

        assert!(store.find_user_by_username("alice").await.unwrap().is_some());
        assert!(store
            .find_user_by_index_number("CS2024001")
            .await
            .unwrap()
            .is_some());
    }

    #[tokio::test]
    async fn test_duplicate_user_is_validation_error() {
        let store = store().await;
        store
            .insert_user(student("alice", "alice@ktu.edu.gh", "CS2024001"))
            .await
            .unwrap();

        let err = store
            .insert_user(student("alice2", "alice@ktu.edu.gh", "CS2024002"))
            .await
            .unwrap_err();
        assert!(matches!(err, PortalError::Validation(_)));
    }

    #[tokio::test]
    async fn test_update_and_delete_user() {
        let store = store().await;
        let user = store
            .insert_user(student("kofi", "kofi@ktu.edu.gh", "CSM2024007"))
            .await
            .unwrap();

        let updated = store
            .update_user(
                user.id,
                UserChanges {
                    role: Some(Role::SubAdmin),
                    login_count: Some(3),
                    ..Default::default()
                },
            )
            .await
            .unwrap()
            .unwrap();
        assert_eq!(updated.role, Role::SubAdmin);

        let reread = store.get_user(user.id).await.unwrap().unwrap();
        assert_eq!(reread.login_count, 3);
        assert_eq!(store.list_users(Some(Role::SubAdmin)).await.unwrap().len(), 1);

        assert!(store.delete_user(user.id).await.unwrap());
        assert!(!store.delete_user(user.id).await.unwrap());
        assert!(store
            .update_user(user.id, UserChanges::default())
            .await
            .unwrap()
            .is_none());
    }

    #[tokio::test]
    async fn test_issue_roundtrip_and_filters() {
        let store = store().await;
        let first = store
            .insert_issue(NewIssue {
                student_id: 1,
                subject: "Wifi down".to_string(),
                category: "Technical Issues".to_string(),
                message: "No signal in the library".to_string(),
                priority: None,
            })
            .await
            .unwrap();
        store
            .insert_issue(NewIssue {
                student_id: 2,
                subject: "Grade missing".to_string(),
                category: "Academic Issues".to_string(),
                message: "CSC 201 grade not posted".to_string(),
                priority: Some(Priority::High),
            })
            .await
            .unwrap();

        let mine = store
            .list_issues(&IssueFilter {
                student_id: Some(1),
                ..Default::default()
            })
            .await
            .unwrap();
        assert_eq!(mine.len(), 1);
        assert_eq!(mine[0].status, IssueStatus::Pending);

        store
            .update_issue(
                first.id,
                IssueChanges {
                    status: Some(IssueStatus::InProgress),
                    assigned_to: Some(Some(9)),
                    ..Default::default()
                },
            )
            .await
            .unwrap();

        let assigned = store
            .list_issues(&IssueFilter {
                assigned_to: Some(9),
                status: Some(IssueStatus::InProgress),
                ..Default::default()
            })
            .await
            .unwrap();
        assert_eq!(assigned.len(), 1);

        let limited = store
            .list_issues(&IssueFilter {
                limit: Some(1),
                ..Default::default()
            })
            .await
            .unwrap();
        assert_eq!(limited.len(), 1);
    }

    #[tokio::test]
    async fn test_delete_missing_issue_is_noop() {
        let store = store().await;
        assert!(!store.delete_issue(404).await.unwrap());
        assert!(store.get_issue(404).await.unwrap().is_none());
    }
}
