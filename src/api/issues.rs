/// Staff issue endpoints
use crate::{
    admin::AuditEvent,
    api::{
        audit,
        flash::{FlashRedirect, FormError, FormResultExt},
        middleware::ClientIp,
    },
    auth::{Authorized, Staff, SuperAdmins},
    context::AppContext,
    error::{PortalError, PortalResult},
    issues::{parse_optional, AssignIssueForm, IssueStatus, UpdateIssueForm},
};
use axum::{
    extract::{Path, Query, State},
    response::Json,
    routing::{get, post},
    Form, Router,
};
use serde::Deserialize;
use serde_json::{json, Value};

/// Issues shown on the sub-admin dashboard
const RECENT_ISSUES: i64 = 10;

pub fn routes() -> Router<AppContext> {
    Router::new()
        .route("/subadmin/dashboard", get(dashboard))
        .route("/issues", get(list_issues))
        .route("/issues/assigned", get(assigned_issues))
        .route("/issues/:id", get(get_issue))
        .route("/issues/:id/update", post(update_issue))
        .route("/issues/:id/assign", post(assign_issue))
        .route("/issues/:id/delete", post(delete_issue))
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct IssueListQuery {
    status: Option<String>,
}

async fn dashboard(
    State(ctx): State<AppContext>,
    Authorized(me, _): Authorized<Staff>,
) -> PortalResult<Json<Value>> {
    let stats = ctx.analytics.status_counts().await?;
    let recent = ctx.issue_manager.recent(RECENT_ISSUES).await?;
    let assigned = ctx.issue_manager.list_assigned(me.id()).await?;

    Ok(Json(json!({
        "user": me.user,
        "stats": stats,
        "recent_issues": recent,
        "assigned_issues": assigned,
    })))
}

async fn list_issues(
    State(ctx): State<AppContext>,
    Authorized(_, _): Authorized<Staff>,
    Query(query): Query<IssueListQuery>,
) -> PortalResult<Json<Value>> {
    let status = parse_optional(query.status.as_deref(), IssueStatus::from_str)?;
    let issues = ctx.issue_manager.list_all(status).await?;

    Ok(Json(json!({
        "issues": issues,
        "status_filter": status,
    })))
}

async fn assigned_issues(
    State(ctx): State<AppContext>,
    Authorized(me, _): Authorized<Staff>,
) -> PortalResult<Json<Value>> {
    let issues = ctx.issue_manager.list_assigned(me.id()).await?;

    Ok(Json(json!({ "issues": issues })))
}

async fn get_issue(
    State(ctx): State<AppContext>,
    Authorized(_, _): Authorized<Staff>,
    Path(id): Path<i64>,
) -> PortalResult<Json<Value>> {
    let issue = ctx.issue_manager.get(id).await?;
    let staff = ctx.account_manager.assignable_staff().await?;

    Ok(Json(json!({
        "issue": issue,
        "staff": staff,
    })))
}

async fn update_issue(
    State(ctx): State<AppContext>,
    Authorized(me, _): Authorized<Staff>,
    ClientIp(ip): ClientIp,
    Path(id): Path<i64>,
    Form(form): Form<UpdateIssueForm>,
) -> Result<FlashRedirect, FormError> {
    let back = format!("/issues/{}", id);
    let issue = ctx.issue_manager.update(id, form).await.back_to(&back)?;

    audit(
        &ctx,
        AuditEvent {
            admin_id: me.id(),
            action: "update_issue",
            target_type: Some("issue"),
            target_id: Some(id),
            details: Some(format!("Updated issue #{} status to {}", id, issue.status.as_str())),
            ip_address: &ip,
        },
    )
    .await;

    Ok(FlashRedirect::success(back, "Issue updated successfully."))
}

async fn assign_issue(
    State(ctx): State<AppContext>,
    Authorized(me, _): Authorized<Staff>,
    ClientIp(ip): ClientIp,
    Path(id): Path<i64>,
    Form(form): Form<AssignIssueForm>,
) -> Result<FlashRedirect, FormError> {
    let back = format!("/issues/{}", id);
    let assignee = parse_optional(form.assigned_to.as_deref(), |v| {
        v.parse::<i64>()
            .map_err(|_| PortalError::Validation("Invalid assignee.".to_string()))
    })?;

    ctx.issue_manager.assign(id, assignee).await.back_to(&back)?;

    let details = match assignee {
        Some(staff_id) => format!("Assigned issue #{} to user {}", id, staff_id),
        None => format!("Unassigned issue #{}", id),
    };
    audit(
        &ctx,
        AuditEvent {
            admin_id: me.id(),
            action: "assign_issue",
            target_type: Some("issue"),
            target_id: Some(id),
            details: Some(details),
            ip_address: &ip,
        },
    )
    .await;

    Ok(FlashRedirect::success(back, "Issue assignment updated."))
}

/// Delete an issue. Deleting a missing issue reports the same outcome.
async fn delete_issue(
    State(ctx): State<AppContext>,
    Authorized(me, _): Authorized<SuperAdmins>,
    ClientIp(ip): ClientIp,
    Path(id): Path<i64>,
) -> Result<FlashRedirect, FormError> {
    if ctx.issue_manager.delete(id).await.back_to("/issues")? {
        audit(
            &ctx,
            AuditEvent {
                admin_id: me.id(),
                action: "delete_issue",
                target_type: Some("issue"),
                target_id: Some(id),
                details: Some(format!("Deleted issue #{}", id)),
                ip_address: &ip,
            },
        )
        .await;
    }

    Ok(FlashRedirect::success("/issues", "Issue deleted successfully."))
}
