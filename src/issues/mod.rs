/// Issue lifecycle
///
/// Students submit issues; staff move them between pending, in progress
/// and resolved, attach responses, set priority and assign them.

mod manager;

pub use manager::{ExportRow, IssueManager, IssueView, StudentStats};

use crate::error::{PortalError, PortalResult};
use serde::{Deserialize, Serialize};

/// Issue status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IssueStatus {
    Pending,
    InProgress,
    Resolved,
}

impl IssueStatus {
    pub const ALL: [IssueStatus; 3] = [
        IssueStatus::Pending,
        IssueStatus::InProgress,
        IssueStatus::Resolved,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            IssueStatus::Pending => "pending",
            IssueStatus::InProgress => "in_progress",
            IssueStatus::Resolved => "resolved",
        }
    }

    pub fn from_str(s: &str) -> PortalResult<Self> {
        match s.trim().to_lowercase().as_str() {
            "pending" => Ok(IssueStatus::Pending),
            "in_progress" => Ok(IssueStatus::InProgress),
            "resolved" => Ok(IssueStatus::Resolved),
            _ => Err(PortalError::Validation(format!("Invalid status: {}", s))),
        }
    }
}

/// Issue priority. Unset priorities display as Medium.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Priority {
    Critical,
    High,
    #[default]
    Medium,
    Low,
}

impl Priority {
    /// Display order, most urgent first
    pub const ALL: [Priority; 4] = [
        Priority::Critical,
        Priority::High,
        Priority::Medium,
        Priority::Low,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Priority::Critical => "Critical",
            Priority::High => "High",
            Priority::Medium => "Medium",
            Priority::Low => "Low",
        }
    }

    pub fn from_str(s: &str) -> PortalResult<Self> {
        match s.trim().to_lowercase().as_str() {
            "critical" => Ok(Priority::Critical),
            "high" => Ok(Priority::High),
            "medium" => Ok(Priority::Medium),
            "low" => Ok(Priority::Low),
            _ => Err(PortalError::Validation(format!("Invalid priority: {}", s))),
        }
    }
}

/// Issue submission form
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct SubmitIssueForm {
    pub subject: String,
    pub category: String,
    pub message: String,
    pub priority: Option<String>,
}

/// Staff update form
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct UpdateIssueForm {
    pub status: String,
    pub response: Option<String>,
    pub priority: Option<String>,
}

/// Assignment form. A blank assignee unassigns the issue.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct AssignIssueForm {
    pub assigned_to: Option<String>,
}

/// Parse an optional form field; blank means absent
pub(crate) fn parse_optional<T>(
    value: Option<&str>,
    parse: impl Fn(&str) -> PortalResult<T>,
) -> PortalResult<Option<T>> {
    match value.map(str::trim) {
        Some(v) if !v.is_empty() => parse(v).map(Some),
        _ => Ok(None),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_parsing() {
        assert_eq!(IssueStatus::from_str("pending").unwrap(), IssueStatus::Pending);
        assert_eq!(
            IssueStatus::from_str("In_Progress").unwrap(),
            IssueStatus::InProgress
        );
        assert_eq!(IssueStatus::from_str("resolved").unwrap(), IssueStatus::Resolved);

        for bad in ["closed", "", "in progress", "done"] {
            assert!(matches!(
                IssueStatus::from_str(bad),
                Err(PortalError::Validation(_))
            ));
        }
    }

    #[test]
    fn test_status_serializes_as_stored() {
        for status in IssueStatus::ALL {
            let json = serde_json::to_string(&status).unwrap();
            assert_eq!(json, format!("\"{}\"", status.as_str()));
        }
    }

    #[test]
    fn test_priority_parsing_and_default() {
        assert_eq!(Priority::default(), Priority::Medium);
        assert_eq!(Priority::from_str("HIGH").unwrap(), Priority::High);
        assert!(Priority::from_str("urgent").is_err());

        let json = serde_json::to_string(&Priority::Critical).unwrap();
        assert_eq!(json, "\"Critical\"");
    }

    #[test]
    fn test_parse_optional() {
        assert_eq!(parse_optional(None, Priority::from_str).unwrap(), None);
        assert_eq!(parse_optional(Some("  "), Priority::from_str).unwrap(), None);
        assert_eq!(
            parse_optional(Some("low"), Priority::from_str).unwrap(),
            Some(Priority::Low)
        );
        assert!(parse_optional(Some("meh"), Priority::from_str).is_err());
    }
}
