/// Reporting and analytics
///
/// Read-only aggregates over issues and users, recomputed on every request.
/// Time windows are anchored at the current instant and bound as query
/// parameters.
use crate::db::timestamp;
use crate::error::{PortalError, PortalResult};
use crate::issues::Priority;
use chrono::{Duration, Months, Utc};
use serde::Serialize;
use sqlx::{Row, SqlitePool};
use std::collections::HashMap;

/// Issue counts by status
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct StatusCounts {
    pub total: i64,
    pub pending: i64,
    pub in_progress: i64,
    pub resolved: i64,
}

/// Account counts
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct UserStats {
    pub total_users: i64,
    pub students: i64,
    pub subadmins: i64,
    pub verified_users: i64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CategoryCount {
    pub category: String,
    pub count: i64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PriorityCount {
    pub priority: Priority,
    pub count: i64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StatusCount {
    pub status: String,
    pub count: i64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MonthCount {
    pub month: String,
    pub count: i64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DayCount {
    pub date: String,
    pub count: i64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StatusTimelinePoint {
    pub date: String,
    pub status: String,
    pub count: i64,
}

/// Mean hours from submission to last update over resolved issues
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ResolutionTime {
    pub category: String,
    pub avg_hours: f64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct UserActivity {
    pub month: String,
    pub active_users: i64,
    pub total_issues: i64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct HourCount {
    pub hour: String,
    pub count: i64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CategoryTrend {
    pub category: String,
    pub month: String,
    pub count: i64,
}

/// Everything the analytics view shows
#[derive(Debug, Clone, Serialize)]
pub struct AnalyticsReport {
    pub status_timeline: Vec<StatusTimelinePoint>,
    pub response_times: Vec<ResolutionTime>,
    pub user_activity: Vec<UserActivity>,
    pub peak_hours: Vec<HourCount>,
    pub category_trends: Vec<CategoryTrend>,
}

/// Charts served by the chart-data endpoint
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChartKind {
    IssuesByMonth,
    IssuesByCategory,
    IssuesByStatus,
    DailyActivity,
}

impl ChartKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ChartKind::IssuesByMonth => "issues_by_month",
            ChartKind::IssuesByCategory => "issues_by_category",
            ChartKind::IssuesByStatus => "issues_by_status",
            ChartKind::DailyActivity => "daily_activity",
        }
    }

    pub fn from_str(s: &str) -> PortalResult<Self> {
        match s {
            "issues_by_month" => Ok(ChartKind::IssuesByMonth),
            "issues_by_category" => Ok(ChartKind::IssuesByCategory),
            "issues_by_status" => Ok(ChartKind::IssuesByStatus),
            "daily_activity" => Ok(ChartKind::DailyActivity),
            _ => Err(PortalError::Validation("Invalid chart type".to_string())),
        }
    }
}

/// Chart series, serialized as a bare JSON array
#[derive(Debug, Clone, Serialize)]
#[serde(untagged)]
pub enum ChartData {
    Monthly(Vec<MonthCount>),
    Categories(Vec<CategoryCount>),
    Statuses(Vec<StatusCount>),
    Daily(Vec<DayCount>),
}

/// Analytics aggregator
#[derive(Clone)]
pub struct AnalyticsManager {
    db: SqlitePool,
}

fn months_ago(months: u32) -> String {
    let now = Utc::now();
    timestamp(
        now.checked_sub_months(Months::new(months))
            .unwrap_or(now - Duration::days(30 * months as i64)),
    )
}

fn days_ago(days: i64) -> String {
    timestamp(Utc::now() - Duration::days(days))
}

impl AnalyticsManager {
    pub fn new(db: SqlitePool) -> Self {
        Self { db }
    }

    /// Total and per-status issue counts
    pub async fn status_counts(&self) -> PortalResult<StatusCounts> {
        let row = sqlx::query(
            r#"
            SELECT
                COUNT(*) AS total,
                COALESCE(SUM(CASE WHEN status = 'pending' THEN 1 ELSE 0 END), 0) AS pending,
                COALESCE(SUM(CASE WHEN status = 'in_progress' THEN 1 ELSE 0 END), 0) AS in_progress,
                COALESCE(SUM(CASE WHEN status = 'resolved' THEN 1 ELSE 0 END), 0) AS resolved
            FROM issues
            "#,
        )
        .fetch_one(&self.db)
        .await?;

        Ok(StatusCounts {
            total: row.get("total"),
            pending: row.get("pending"),
            in_progress: row.get("in_progress"),
            resolved: row.get("resolved"),
        })
    }

    /// Account totals by role and verification
    pub async fn user_stats(&self) -> PortalResult<UserStats> {
        let row = sqlx::query(
            r#"
            SELECT
                COUNT(*) AS total_users,
                COALESCE(SUM(CASE WHEN role = 'student' THEN 1 ELSE 0 END), 0) AS students,
                COALESCE(SUM(CASE WHEN role = 'subadmin' THEN 1 ELSE 0 END), 0) AS subadmins,
                COALESCE(SUM(CASE WHEN is_verified = 1 THEN 1 ELSE 0 END), 0) AS verified_users
            FROM users
            "#,
        )
        .fetch_one(&self.db)
        .await?;

        Ok(UserStats {
            total_users: row.get("total_users"),
            students: row.get("students"),
            subadmins: row.get("subadmins"),
            verified_users: row.get("verified_users"),
        })
    }

    /// Issue counts per category, largest first
    pub async fn by_category(&self) -> PortalResult<Vec<CategoryCount>> {
        let rows = sqlx::query(
            r#"
            SELECT category, COUNT(*) AS count
            FROM issues
            GROUP BY category
            ORDER BY count DESC, category
            "#,
        )
        .fetch_all(&self.db)
        .await?;

        Ok(rows
            .iter()
            .map(|row| CategoryCount {
                category: row.get("category"),
                count: row.get("count"),
            })
            .collect())
    }

    /// Issue counts for every priority, most urgent first. Unset counts as
    /// Medium.
    pub async fn by_priority(&self) -> PortalResult<Vec<PriorityCount>> {
        let rows = sqlx::query(
            r#"
            SELECT COALESCE(priority, 'Medium') AS priority, COUNT(*) AS count
            FROM issues
            GROUP BY COALESCE(priority, 'Medium')
            "#,
        )
        .fetch_all(&self.db)
        .await?;

        let mut counts: HashMap<Priority, i64> = HashMap::new();
        for row in &rows {
            let priority: String = row.get("priority");
            *counts.entry(Priority::from_str(&priority)?).or_default() += row.get::<i64, _>("count");
        }

        Ok(Priority::ALL
            .iter()
            .map(|p| PriorityCount {
                priority: *p,
                count: counts.get(p).copied().unwrap_or(0),
            })
            .collect())
    }

    /// Issue counts per stored status
    pub async fn by_status(&self) -> PortalResult<Vec<StatusCount>> {
        let rows = sqlx::query(
            r#"
            SELECT status, COUNT(*) AS count
            FROM issues
            GROUP BY status
            ORDER BY status
            "#,
        )
        .fetch_all(&self.db)
        .await?;

        Ok(rows
            .iter()
            .map(|row| StatusCount {
                status: row.get("status"),
                count: row.get("count"),
            })
            .collect())
    }

    /// Issues per month over the trailing twelve months
    pub async fn monthly_counts(&self) -> PortalResult<Vec<MonthCount>> {
        let rows = sqlx::query(
            r#"
            SELECT strftime('%Y-%m', created_at) AS month, COUNT(*) AS count
            FROM issues
            WHERE created_at >= ?
            GROUP BY month
            ORDER BY month
            "#,
        )
        .bind(months_ago(12))
        .fetch_all(&self.db)
        .await?;

        Ok(rows
            .iter()
            .map(|row| MonthCount {
                month: row.get("month"),
                count: row.get("count"),
            })
            .collect())
    }

    /// Issues per day over the trailing thirty days
    pub async fn daily_counts(&self) -> PortalResult<Vec<DayCount>> {
        let rows = sqlx::query(
            r#"
            SELECT date(created_at) AS date, COUNT(*) AS count
            FROM issues
            WHERE created_at >= ?
            GROUP BY date
            ORDER BY date
            "#,
        )
        .bind(days_ago(30))
        .fetch_all(&self.db)
        .await?;

        Ok(rows
            .iter()
            .map(|row| DayCount {
                date: row.get("date"),
                count: row.get("count"),
            })
            .collect())
    }

    /// Day by status counts over the trailing ninety days
    pub async fn status_timeline(&self) -> PortalResult<Vec<StatusTimelinePoint>> {
        let rows = sqlx::query(
            r#"
            SELECT date(created_at) AS date, status, COUNT(*) AS count
            FROM issues
            WHERE created_at >= ?
            GROUP BY date, status
            ORDER BY date, status
            "#,
        )
        .bind(days_ago(90))
        .fetch_all(&self.db)
        .await?;

        Ok(rows
            .iter()
            .map(|row| StatusTimelinePoint {
                date: row.get("date"),
                status: row.get("status"),
                count: row.get("count"),
            })
            .collect())
    }

    /// Mean resolution latency per category over resolved issues with a
    /// response
    pub async fn resolution_times(&self) -> PortalResult<Vec<ResolutionTime>> {
        let rows = sqlx::query(
            r#"
            SELECT category,
                   AVG(julianday(updated_at) - julianday(created_at)) * 24 AS avg_hours
            FROM issues
            WHERE status = 'resolved' AND response IS NOT NULL
            GROUP BY category
            ORDER BY category
            "#,
        )
        .fetch_all(&self.db)
        .await?;

        Ok(rows
            .iter()
            .map(|row| ResolutionTime {
                category: row.get("category"),
                avg_hours: row.try_get::<f64, _>("avg_hours").unwrap_or(0.0),
            })
            .collect())
    }

    /// Distinct submitting students and issues per month, trailing year
    pub async fn user_activity(&self) -> PortalResult<Vec<UserActivity>> {
        let rows = sqlx::query(
            r#"
            SELECT strftime('%Y-%m', created_at) AS month,
                   COUNT(DISTINCT student_id) AS active_users,
                   COUNT(*) AS total_issues
            FROM issues
            WHERE created_at >= ?
            GROUP BY month
            ORDER BY month
            "#,
        )
        .bind(months_ago(12))
        .fetch_all(&self.db)
        .await?;

        Ok(rows
            .iter()
            .map(|row| UserActivity {
                month: row.get("month"),
                active_users: row.get("active_users"),
                total_issues: row.get("total_issues"),
            })
            .collect())
    }

    /// Submissions by hour of day (UTC)
    pub async fn peak_hours(&self) -> PortalResult<Vec<HourCount>> {
        let rows = sqlx::query(
            r#"
            SELECT strftime('%H', created_at) AS hour, COUNT(*) AS count
            FROM issues
            GROUP BY hour
            ORDER BY hour
            "#,
        )
        .fetch_all(&self.db)
        .await?;

        Ok(rows
            .iter()
            .map(|row| HourCount {
                hour: row.get("hour"),
                count: row.get("count"),
            })
            .collect())
    }

    /// Category by month counts over the trailing six months
    pub async fn category_trends(&self) -> PortalResult<Vec<CategoryTrend>> {
        let rows = sqlx::query(
            r#"
            SELECT category, strftime('%Y-%m', created_at) AS month, COUNT(*) AS count
            FROM issues
            WHERE created_at >= ?
            GROUP BY category, month
            ORDER BY month, category
            "#,
        )
        .bind(months_ago(6))
        .fetch_all(&self.db)
        .await?;

        Ok(rows
            .iter()
            .map(|row| CategoryTrend {
                category: row.get("category"),
                month: row.get("month"),
                count: row.get("count"),
            })
            .collect())
    }

    /// Full analytics view
    pub async fn report(&self) -> PortalResult<AnalyticsReport> {
        Ok(AnalyticsReport {
            status_timeline: self.status_timeline().await?,
            response_times: self.resolution_times().await?,
            user_activity: self.user_activity().await?,
            peak_hours: self.peak_hours().await?,
            category_trends: self.category_trends().await?,
        })
    }

    /// Series for one chart
    pub async fn chart_data(&self, kind: ChartKind) -> PortalResult<ChartData> {
        Ok(match kind {
            ChartKind::IssuesByMonth => ChartData::Monthly(self.monthly_counts().await?),
            ChartKind::IssuesByCategory => ChartData::Categories(self.by_category().await?),
            ChartKind::IssuesByStatus => ChartData::Statuses(self.by_status().await?),
            ChartKind::DailyActivity => ChartData::Daily(self.daily_counts().await?),
        })
    }
}
