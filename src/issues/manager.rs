/// Issue manager over the pluggable user and issue stores
use super::{parse_optional, IssueStatus, Priority, SubmitIssueForm, UpdateIssueForm};
use crate::account::Role;
use crate::error::{PortalError, PortalResult};
use crate::metrics;
use crate::store::{Issue, IssueChanges, IssueFilter, IssueStore, NewIssue, User, UserStore};
use chrono::Utc;
use serde::Serialize;
use std::collections::HashMap;
use std::sync::Arc;

/// Issue joined with the submitting student's details
#[derive(Debug, Clone, Serialize)]
pub struct IssueView {
    #[serde(flatten)]
    pub issue: Issue,
    pub student_name: Option<String>,
    pub student_email: Option<String>,
    pub index_number: Option<String>,
    pub assigned_name: Option<String>,
}

/// Per-student status counts
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct StudentStats {
    pub total: usize,
    pub pending: usize,
    pub in_progress: usize,
    pub resolved: usize,
}

/// One row of the data export
#[derive(Debug, Clone, Serialize)]
pub struct ExportRow {
    #[serde(rename = "ID")]
    pub id: i64,
    #[serde(rename = "Student Name")]
    pub student_name: String,
    #[serde(rename = "Index Number")]
    pub index_number: String,
    #[serde(rename = "Email")]
    pub email: String,
    #[serde(rename = "Subject")]
    pub subject: String,
    #[serde(rename = "Category")]
    pub category: String,
    #[serde(rename = "Message")]
    pub message: String,
    #[serde(rename = "Status")]
    pub status: IssueStatus,
    #[serde(rename = "Priority")]
    pub priority: Priority,
    #[serde(rename = "Response")]
    pub response: String,
    #[serde(rename = "Created At")]
    pub created_at: String,
    #[serde(rename = "Updated At")]
    pub updated_at: String,
}

/// Issue lifecycle service
pub struct IssueManager {
    users: Arc<dyn UserStore>,
    issues: Arc<dyn IssueStore>,
}

impl IssueManager {
    pub fn new(users: Arc<dyn UserStore>, issues: Arc<dyn IssueStore>) -> Self {
        Self { users, issues }
    }

    /// Submit a new issue on behalf of a student
    pub async fn submit(&self, student_id: i64, form: SubmitIssueForm) -> PortalResult<Issue> {
        let subject = form.subject.trim();
        let category = form.category.trim();
        let message = form.message.trim();

        if subject.is_empty() || category.is_empty() || message.is_empty() {
            return Err(PortalError::Validation(
                "Subject, category and message are required.".to_string(),
            ));
        }

        let priority = parse_optional(form.priority.as_deref(), Priority::from_str)?;

        match self.users.get_user(student_id).await? {
            Some(user) if user.role == Role::Student => {}
            _ => return Err(PortalError::AccessDenied),
        }

        let issue = self
            .issues
            .insert_issue(NewIssue {
                student_id,
                subject: subject.to_string(),
                category: category.to_string(),
                message: message.to_string(),
                priority,
            })
            .await?;

        metrics::ISSUES_SUBMITTED_TOTAL.inc();
        tracing::info!(issue_id = issue.id, student_id, category = %issue.category, "issue submitted");

        Ok(issue)
    }

    /// A student's own issues, newest first
    pub async fn list_for_student(&self, student_id: i64) -> PortalResult<Vec<Issue>> {
        self.issues
            .list_issues(&IssueFilter {
                student_id: Some(student_id),
                ..Default::default()
            })
            .await
    }

    /// Every issue, optionally filtered by status, with student details
    pub async fn list_all(&self, status: Option<IssueStatus>) -> PortalResult<Vec<IssueView>> {
        let issues = self
            .issues
            .list_issues(&IssueFilter {
                status,
                ..Default::default()
            })
            .await?;
        self.with_people(issues).await
    }

    /// Most recent issues across all students
    pub async fn recent(&self, limit: i64) -> PortalResult<Vec<IssueView>> {
        let issues = self
            .issues
            .list_issues(&IssueFilter {
                limit: Some(limit),
                ..Default::default()
            })
            .await?;
        self.with_people(issues).await
    }

    /// Issues assigned to one staff member
    pub async fn list_assigned(&self, staff_id: i64) -> PortalResult<Vec<IssueView>> {
        let issues = self
            .issues
            .list_issues(&IssueFilter {
                assigned_to: Some(staff_id),
                ..Default::default()
            })
            .await?;
        self.with_people(issues).await
    }

    /// One issue with student details
    pub async fn get(&self, id: i64) -> PortalResult<IssueView> {
        let issue = self
            .issues
            .get_issue(id)
            .await?
            .ok_or_else(|| PortalError::NotFound(format!("Issue {}", id)))?;

        self.with_people(vec![issue])
            .await?
            .pop()
            .ok_or_else(|| PortalError::NotFound(format!("Issue {}", id)))
    }

    /// Set status, and optionally response and priority. Any of the three
    /// statuses may be set from any other; `updated_at` always moves.
    pub async fn update(&self, id: i64, form: UpdateIssueForm) -> PortalResult<Issue> {
        let status = IssueStatus::from_str(&form.status)?;
        let priority = parse_optional(form.priority.as_deref(), Priority::from_str)?;
        let response = form
            .response
            .map(|r| r.trim().to_string())
            .filter(|r| !r.is_empty());

        let issue = self
            .issues
            .update_issue(
                id,
                IssueChanges {
                    status: Some(status),
                    response: response.map(Some),
                    priority: priority.map(Some),
                    updated_at: Some(Utc::now()),
                    ..Default::default()
                },
            )
            .await?
            .ok_or_else(|| PortalError::NotFound(format!("Issue {}", id)))?;

        metrics::record_issue_transition(status.as_str());
        tracing::info!(issue_id = id, status = status.as_str(), "issue updated");

        Ok(issue)
    }

    /// Assign an issue to a sub-admin or super-admin; `None` unassigns
    pub async fn assign(&self, id: i64, assignee: Option<i64>) -> PortalResult<Issue> {
        if let Some(staff_id) = assignee {
            match self.users.get_user(staff_id).await? {
                Some(user) if user.role.is_staff() && user.is_active => {}
                _ => {
                    return Err(PortalError::Validation(
                        "Issues can only be assigned to active staff.".to_string(),
                    ))
                }
            }
        }

        let issue = self
            .issues
            .update_issue(
                id,
                IssueChanges {
                    assigned_to: Some(assignee),
                    updated_at: Some(Utc::now()),
                    ..Default::default()
                },
            )
            .await?
            .ok_or_else(|| PortalError::NotFound(format!("Issue {}", id)))?;

        tracing::info!(issue_id = id, assignee = ?assignee, "issue assignment changed");
        Ok(issue)
    }

    /// Delete an issue. Missing ids are a no-op.
    pub async fn delete(&self, id: i64) -> PortalResult<bool> {
        let removed = self.issues.delete_issue(id).await?;
        if removed {
            tracing::info!(issue_id = id, "issue deleted");
        }
        Ok(removed)
    }

    /// Status counts for one student
    pub async fn student_stats(&self, student_id: i64) -> PortalResult<StudentStats> {
        let issues = self.list_for_student(student_id).await?;

        let mut stats = StudentStats {
            total: issues.len(),
            ..Default::default()
        };
        for issue in &issues {
            match issue.status {
                IssueStatus::Pending => stats.pending += 1,
                IssueStatus::InProgress => stats.in_progress += 1,
                IssueStatus::Resolved => stats.resolved += 1,
            }
        }

        Ok(stats)
    }

    /// Every issue flattened into export rows, newest first
    pub async fn export_rows(&self) -> PortalResult<Vec<ExportRow>> {
        let views = self.list_all(None).await?;

        Ok(views
            .into_iter()
            .map(|view| ExportRow {
                id: view.issue.id,
                student_name: view.student_name.unwrap_or_default(),
                index_number: view.index_number.unwrap_or_default(),
                email: view.student_email.unwrap_or_default(),
                priority: view.issue.display_priority(),
                subject: view.issue.subject,
                category: view.issue.category,
                message: view.issue.message,
                status: view.issue.status,
                response: view.issue.response.unwrap_or_default(),
                created_at: view.issue.created_at.format("%Y-%m-%d %H:%M:%S").to_string(),
                updated_at: view.issue.updated_at.format("%Y-%m-%d %H:%M:%S").to_string(),
            })
            .collect())
    }

    async fn with_people(&self, issues: Vec<Issue>) -> PortalResult<Vec<IssueView>> {
        let mut people: HashMap<i64, Option<User>> = HashMap::new();

        let mut views = Vec::with_capacity(issues.len());
        for issue in issues {
            for id in std::iter::once(issue.student_id).chain(issue.assigned_to) {
                if !people.contains_key(&id) {
                    let user = self.users.get_user(id).await?;
                    people.insert(id, user);
                }
            }

            let student = people.get(&issue.student_id).and_then(Option::as_ref);
            let assignee = issue
                .assigned_to
                .and_then(|id| people.get(&id))
                .and_then(Option::as_ref);

            views.push(IssueView {
                student_name: student.map(|u| u.full_name.clone()),
                student_email: student.map(|u| u.email.clone()),
                index_number: student.map(|u| u.index_number.clone()),
                assigned_name: assignee.map(|u| u.full_name.clone()),
                issue,
            });
        }

        Ok(views)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::{MemoryStore, NewUser};
    use std::time::Duration;

    async fn setup() -> (IssueManager, Arc<MemoryStore>, User, User) {
        let store = Arc::new(MemoryStore::new());
        let student = store
            .insert_user(NewUser {
                username: "alice".to_string(),
                email: "alice@ktu.edu.gh".to_string(),
                full_name: "Alice Mensah".to_string(),
                index_number: "CS2024001".to_string(),
                level: "200".to_string(),
                gender: "Female".to_string(),
                password_hash: "hash".to_string(),
                role: Role::Student,
                is_verified: true,
            })
            .await
            .unwrap();
        let staff = store
            .insert_user(NewUser {
                username: "kwame".to_string(),
                email: "kwame@ktu.edu.gh".to_string(),
                full_name: "Kwame Boateng".to_string(),
                index_number: "SUBKWAME".to_string(),
                level: "Staff".to_string(),
                gender: "N/A".to_string(),
                password_hash: "hash".to_string(),
                role: Role::SubAdmin,
                is_verified: true,
            })
            .await
            .unwrap();

        (
            IssueManager::new(store.clone(), store.clone()),
            store,
            student,
            staff,
        )
    }

    fn wifi() -> SubmitIssueForm {
        SubmitIssueForm {
            subject: "Wifi".to_string(),
            category: "Technical Issues".to_string(),
            message: "Down in library".to_string(),
            priority: None,
        }
    }

    #[tokio::test]
    async fn test_submit_then_list() {
        let (manager, _, student, _) = setup().await;
        let issue = manager.submit(student.id, wifi()).await.unwrap();

        assert_eq!(issue.status, IssueStatus::Pending);
        assert_eq!(issue.display_priority(), Priority::Medium);

        let mine = manager.list_for_student(student.id).await.unwrap();
        assert_eq!(mine.len(), 1);
        assert_eq!(mine[0].subject, "Wifi");
    }

    #[tokio::test]
    async fn test_submit_validation() {
        let (manager, _, student, staff) = setup().await;

        let blank = SubmitIssueForm {
            subject: "   ".to_string(),
            ..wifi()
        };
        assert!(matches!(
            manager.submit(student.id, blank).await,
            Err(PortalError::Validation(_))
        ));

        let bad_priority = SubmitIssueForm {
            priority: Some("urgent".to_string()),
            ..wifi()
        };
        assert!(manager.submit(student.id, bad_priority).await.is_err());

        assert!(matches!(
            manager.submit(staff.id, wifi()).await,
            Err(PortalError::AccessDenied)
        ));
        assert!(manager.submit(999, wifi()).await.is_err());
    }

    #[tokio::test]
    async fn test_update_moves_timestamp() {
        let (manager, _, student, _) = setup().await;
        let issue = manager.submit(student.id, wifi()).await.unwrap();
        tokio::time::sleep(Duration::from_millis(5)).await;

        let updated = manager
            .update(
                issue.id,
                UpdateIssueForm {
                    status: "resolved".to_string(),
                    response: Some("Fixed".to_string()),
                    priority: Some("High".to_string()),
                },
            )
            .await
            .unwrap();

        assert_eq!(updated.status, IssueStatus::Resolved);
        assert_eq!(updated.response.as_deref(), Some("Fixed"));
        assert_eq!(updated.priority, Some(Priority::High));
        assert!(updated.updated_at > updated.created_at);

        let reopened = manager
            .update(
                issue.id,
                UpdateIssueForm {
                    status: "pending".to_string(),
                    response: None,
                    priority: None,
                },
            )
            .await
            .unwrap();
        assert_eq!(reopened.status, IssueStatus::Pending);
        assert_eq!(reopened.response.as_deref(), Some("Fixed"));
    }

    #[tokio::test]
    async fn test_update_rejects_bad_status() {
        let (manager, _, student, _) = setup().await;
        let issue = manager.submit(student.id, wifi()).await.unwrap();

        let result = manager
            .update(
                issue.id,
                UpdateIssueForm {
                    status: "closed".to_string(),
                    ..Default::default()
                },
            )
            .await;
        assert!(matches!(result, Err(PortalError::Validation(_))));

        let stored = manager.get(issue.id).await.unwrap();
        assert_eq!(stored.issue.status, IssueStatus::Pending);
    }

    #[tokio::test]
    async fn test_assign_and_views() {
        let (manager, _, student, staff) = setup().await;
        let issue = manager.submit(student.id, wifi()).await.unwrap();

        assert!(manager.assign(issue.id, Some(student.id)).await.is_err());
        manager.assign(issue.id, Some(staff.id)).await.unwrap();

        let assigned = manager.list_assigned(staff.id).await.unwrap();
        assert_eq!(assigned.len(), 1);
        assert_eq!(assigned[0].student_name.as_deref(), Some("Alice Mensah"));
        assert_eq!(assigned[0].assigned_name.as_deref(), Some("Kwame Boateng"));

        manager.assign(issue.id, None).await.unwrap();
        assert!(manager.list_assigned(staff.id).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_delete_idempotent_and_stats() {
        let (manager, _, student, _) = setup().await;
        let first = manager.submit(student.id, wifi()).await.unwrap();
        manager.submit(student.id, wifi()).await.unwrap();

        manager
            .update(
                first.id,
                UpdateIssueForm {
                    status: "in_progress".to_string(),
                    ..Default::default()
                },
            )
            .await
            .unwrap();

        let stats = manager.student_stats(student.id).await.unwrap();
        assert_eq!(
            stats,
            StudentStats {
                total: 2,
                pending: 1,
                in_progress: 1,
                resolved: 0,
            }
        );

        assert!(manager.delete(first.id).await.unwrap());
        assert!(!manager.delete(first.id).await.unwrap());
        assert!(matches!(
            manager.get(first.id).await,
            Err(PortalError::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn test_export_rows_use_report_columns() {
        let (manager, _, student, _) = setup().await;
        manager.submit(student.id, wifi()).await.unwrap();

        let rows = manager.export_rows().await.unwrap();
        assert_eq!(rows.len(), 1);

        let json = serde_json::to_value(&rows[0]).unwrap();
        for column in [
            "ID",
            "Student Name",
            "Index Number",
            "Email",
            "Subject",
            "Category",
            "Message",
            "Status",
            "Priority",
            "Response",
            "Created At",
            "Updated At",
        ] {
            assert!(json.get(column).is_some(), "missing column {}", column);
        }
        assert_eq!(json["Priority"], "Medium");
        assert_eq!(json["Student Name"], "Alice Mensah");
    }
}
