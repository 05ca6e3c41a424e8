/// User and issue persistence
///
/// Handlers and managers talk to these traits only, so the backend can be
/// swapped without touching request handling. `SqliteStore` is the
/// production backend; `MemoryStore` backs tests and throwaway instances.

pub mod memory;
pub mod sqlite;

pub use memory::MemoryStore;
pub use sqlite::SqliteStore;

use crate::account::Role;
use crate::error::PortalResult;
use crate::issues::{IssueStatus, Priority};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::Serialize;

/// Registered account
#[derive(Debug, Clone, Serialize)]
pub struct User {
    pub id: i64,
    pub username: String,
    pub email: String,
    pub full_name: String,
    pub index_number: String,
    pub level: String,
    pub gender: String,
    /// Argon2id PHC string
    #[serde(skip_serializing)]
    pub password_hash: String,
    pub role: Role,
    pub is_verified: bool,
    pub is_active: bool,
    #[serde(skip_serializing)]
    pub verification_code: Option<String>,
    #[serde(skip_serializing)]
    pub reset_token: Option<String>,
    #[serde(skip_serializing)]
    pub reset_expires: Option<DateTime<Utc>>,
    pub last_login: Option<DateTime<Utc>>,
    pub login_count: i64,
    pub created_at: DateTime<Utc>,
}

/// Account about to be inserted
#[derive(Debug, Clone)]
pub struct NewUser {
    pub username: String,
    pub email: String,
    pub full_name: String,
    pub index_number: String,
    pub level: String,
    pub gender: String,
    pub password_hash: String,
    pub role: Role,
    pub is_verified: bool,
}

/// Partial update of a user. `None` leaves the field untouched.
#[derive(Debug, Clone, Default)]
pub struct UserChanges {
    pub password_hash: Option<String>,
    pub role: Option<Role>,
    pub is_active: Option<bool>,
    pub is_verified: Option<bool>,
    pub reset_token: Option<Option<String>>,
    pub reset_expires: Option<Option<DateTime<Utc>>>,
    pub last_login: Option<DateTime<Utc>>,
    pub login_count: Option<i64>,
}

impl UserChanges {
    pub fn apply(self, user: &mut User) {
        if let Some(hash) = self.password_hash {
            user.password_hash = hash;
        }
        if let Some(role) = self.role {
            user.role = role;
        }
        if let Some(active) = self.is_active {
            user.is_active = active;
        }
        if let Some(verified) = self.is_verified {
            user.is_verified = verified;
        }
        if let Some(token) = self.reset_token {
            user.reset_token = token;
        }
        if let Some(expires) = self.reset_expires {
            user.reset_expires = expires;
        }
        if let Some(at) = self.last_login {
            user.last_login = Some(at);
        }
        if let Some(count) = self.login_count {
            user.login_count = count;
        }
    }
}

/// Student-submitted issue
#[derive(Debug, Clone, Serialize)]
pub struct Issue {
    pub id: i64,
    pub student_id: i64,
    pub subject: String,
    pub category: String,
    pub message: String,
    pub status: IssueStatus,
    pub priority: Option<Priority>,
    pub assigned_to: Option<i64>,
    pub response: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Issue {
    /// Priority shown to users; unset means Medium
    pub fn display_priority(&self) -> Priority {
        self.priority.unwrap_or_default()
    }
}

/// Issue about to be inserted. Status starts as pending.
#[derive(Debug, Clone)]
pub struct NewIssue {
    pub student_id: i64,
    pub subject: String,
    pub category: String,
    pub message: String,
    pub priority: Option<Priority>,
}

/// Partial update of an issue. `None` leaves the field untouched.
#[derive(Debug, Clone, Default)]
pub struct IssueChanges {
    pub status: Option<IssueStatus>,
    pub response: Option<Option<String>>,
    pub priority: Option<Option<Priority>>,
    pub assigned_to: Option<Option<i64>>,
    pub updated_at: Option<DateTime<Utc>>,
}

impl IssueChanges {
    pub fn apply(self, issue: &mut Issue) {
        if let Some(status) = self.status {
            issue.status = status;
        }
        if let Some(response) = self.response {
            issue.response = response;
        }
        if let Some(priority) = self.priority {
            issue.priority = priority;
        }
        if let Some(assignee) = self.assigned_to {
            issue.assigned_to = assignee;
        }
        if let Some(at) = self.updated_at {
            issue.updated_at = at;
        }
    }
}

/// Issue listing filter; results are newest first
#[derive(Debug, Clone, Default)]
pub struct IssueFilter {
    pub student_id: Option<i64>,
    pub assigned_to: Option<i64>,
    pub status: Option<IssueStatus>,
    pub limit: Option<i64>,
}

impl IssueFilter {
    pub fn matches(&self, issue: &Issue) -> bool {
        self.student_id.map_or(true, |id| issue.student_id == id)
            && self.assigned_to.map_or(true, |id| issue.assigned_to == Some(id))
            && self.status.map_or(true, |status| issue.status == status)
    }
}

/// User persistence capability
#[async_trait]
pub trait UserStore: Send + Sync {
    /// Insert a user. Duplicate username, email or index number is a
    /// validation error.
    async fn insert_user(&self, user: NewUser) -> PortalResult<User>;

    async fn get_user(&self, id: i64) -> PortalResult<Option<User>>;

    /// Case-insensitive email lookup
    async fn find_user_by_email(&self, email: &str) -> PortalResult<Option<User>>;

    async fn find_user_by_username(&self, username: &str) -> PortalResult<Option<User>>;

    async fn find_user_by_index_number(&self, index_number: &str) -> PortalResult<Option<User>>;

    async fn find_user_by_reset_token(&self, token: &str) -> PortalResult<Option<User>>;

    /// All users, or only those with `role`, newest first
    async fn list_users(&self, role: Option<Role>) -> PortalResult<Vec<User>>;

    /// Apply `changes`; `None` when the user does not exist
    async fn update_user(&self, id: i64, changes: UserChanges) -> PortalResult<Option<User>>;

    /// Returns whether a user was removed
    async fn delete_user(&self, id: i64) -> PortalResult<bool>;
}

/// Issue persistence capability
#[async_trait]
pub trait IssueStore: Send + Sync {
    async fn insert_issue(&self, issue: NewIssue) -> PortalResult<Issue>;

    async fn get_issue(&self, id: i64) -> PortalResult<Option<Issue>>;

    async fn list_issues(&self, filter: &IssueFilter) -> PortalResult<Vec<Issue>>;

    /// Apply `changes`; `None` when the issue does not exist
    async fn update_issue(&self, id: i64, changes: IssueChanges) -> PortalResult<Option<Issue>>;

    /// Returns whether an issue was removed
    async fn delete_issue(&self, id: i64) -> PortalResult<bool>;
}
