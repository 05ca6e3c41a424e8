/// In-process user and issue store
use super::{Issue, IssueChanges, IssueFilter, IssueStore, NewIssue, NewUser, User, UserChanges, UserStore};
use crate::account::Role;
use crate::error::{PortalError, PortalResult};
use crate::issues::IssueStatus;
use async_trait::async_trait;
use chrono::Utc;
use std::collections::BTreeMap;
use std::sync::Arc;
use tokio::sync::RwLock;

#[derive(Default)]
struct Tables {
    users: BTreeMap<i64, User>,
    issues: BTreeMap<i64, Issue>,
    next_user_id: i64,
    next_issue_id: i64,
}

/// Store kept entirely in memory behind a read-write lock
#[derive(Clone, Default)]
pub struct MemoryStore {
    tables: Arc<RwLock<Tables>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

fn newest_first<T>(items: &mut [T], key: impl Fn(&T) -> (chrono::DateTime<Utc>, i64)) {
    items.sort_by(|a, b| key(b).cmp(&key(a)));
}

#[async_trait]
impl UserStore for MemoryStore {
    async fn insert_user(&self, user: NewUser) -> PortalResult<User> {
        let mut tables = self.tables.write().await;

        let duplicate = tables.users.values().any(|u| {
            u.username == user.username
                || u.email.eq_ignore_ascii_case(&user.email)
                || u.index_number == user.index_number
        });
        if duplicate {
            return Err(PortalError::Validation(
                "Username, email or index number already exists.".to_string(),
            ));
        }

        tables.next_user_id += 1;
        let record = User {
            id: tables.next_user_id,
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
            created_at: Utc::now(),
        };
        tables.users.insert(record.id, record.clone());

        Ok(record)
    }

    async fn get_user(&self, id: i64) -> PortalResult<Option<User>> {
        Ok(self.tables.read().await.users.get(&id).cloned())
    }

    async fn find_user_by_email(&self, email: &str) -> PortalResult<Option<User>> {
        let email = email.trim();
        let tables = self.tables.read().await;
        Ok(tables
            .users
            .values()
            .find(|u| u.email.eq_ignore_ascii_case(email))
            .cloned())
    }

    async fn find_user_by_username(&self, username: &str) -> PortalResult<Option<User>> {
        let tables = self.tables.read().await;
        Ok(tables.users.values().find(|u| u.username == username).cloned())
    }

    async fn find_user_by_index_number(&self, index_number: &str) -> PortalResult<Option<User>> {
        let tables = self.tables.read().await;
        Ok(tables
            .users
            .values()
            .find(|u| u.index_number == index_number)
            .cloned())
    }

    async fn find_user_by_reset_token(&self, token: &str) -> PortalResult<Option<User>> {
        let tables = self.tables.read().await;
        Ok(tables
            .users
            .values()
            .find(|u| u.reset_token.as_deref() == Some(token))
            .cloned())
    }

    async fn list_users(&self, role: Option<Role>) -> PortalResult<Vec<User>> {
        let tables = self.tables.read().await;
        let mut users: Vec<User> = tables
            .users
            .values()
            .filter(|u| role.map_or(true, |r| u.role == r))
            .cloned()
            .collect();
        newest_first(&mut users, |u| (u.created_at, u.id));
        Ok(users)
    }

    async fn update_user(&self, id: i64, changes: UserChanges) -> PortalResult<Option<User>> {
        let mut tables = self.tables.write().await;
        Ok(tables.users.get_mut(&id).map(|user| {
            changes.apply(user);
            user.clone()
        }))
    }

    async fn delete_user(&self, id: i64) -> PortalResult<bool> {
        Ok(self.tables.write().await.users.remove(&id).is_some())
    }
}

#[async_trait]
impl IssueStore for MemoryStore {
    async fn insert_issue(&self, issue: NewIssue) -> PortalResult<Issue> {
        let mut tables = self.tables.write().await;
        let now = Utc::now();

        tables.next_issue_id += 1;
        let record = Issue {
            id: tables.next_issue_id,
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
        };
        tables.issues.insert(record.id, record.clone());

        Ok(record)
    }

    async fn get_issue(&self, id: i64) -> PortalResult<Option<Issue>> {
        Ok(self.tables.read().await.issues.get(&id).cloned())
    }

    async fn list_issues(&self, filter: &IssueFilter) -> PortalResult<Vec<Issue>> {
        let tables = self.tables.read().await;
        let mut issues: Vec<Issue> = tables
            .issues
            .values()
            .filter(|i| filter.matches(i))
            .cloned()
            .collect();
        newest_first(&mut issues, |i| (i.created_at, i.id));
        if let Some(limit) = filter.limit {
            issues.truncate(limit.max(0) as usize);
        }
        Ok(issues)
    }

    async fn update_issue(&self, id: i64, changes: IssueChanges) -> PortalResult<Option<Issue>> {
        let mut tables = self.tables.write().await;
        Ok(tables.issues.get_mut(&id).map(|issue| {
            changes.apply(issue);
            issue.clone()
        }))
    }

    async fn delete_issue(&self, id: i64) -> PortalResult<bool> {
        Ok(self.tables.write().await.issues.remove(&id).is_some())
    }
}
