/// Student endpoints
use crate::{
    account::ChangePasswordForm,
    api::flash::{FlashRedirect, FormError, FormResultExt},
    auth::{session_token, Authorized, Students},
    context::AppContext,
    error::PortalResult,
    issues::SubmitIssueForm,
};
use axum::{
    extract::State,
    response::Json,
    routing::{get, post},
    Form, Router,
};
use axum_extra::extract::cookie::SignedCookieJar;
use serde_json::{json, Value};

/// Issues shown on the dashboard
const RECENT_ISSUES: usize = 5;

pub fn routes() -> Router<AppContext> {
    Router::new()
        .route("/student/dashboard", get(dashboard))
        .route("/submit-issue", post(submit_issue))
        .route("/my-issues", get(my_issues))
        .route("/change-password", post(change_password))
}

async fn dashboard(
    State(ctx): State<AppContext>,
    Authorized(me, _): Authorized<Students>,
) -> PortalResult<Json<Value>> {
    let stats = ctx.issue_manager.student_stats(me.id()).await?;
    let mut recent = ctx.issue_manager.list_for_student(me.id()).await?;
    recent.truncate(RECENT_ISSUES);
    let categories = ctx.category_manager.list().await?;

    Ok(Json(json!({
        "user": me.user,
        "stats": stats,
        "recent_issues": recent,
        "categories": categories,
    })))
}

async fn submit_issue(
    State(ctx): State<AppContext>,
    Authorized(me, _): Authorized<Students>,
    Form(form): Form<SubmitIssueForm>,
) -> Result<FlashRedirect, FormError> {
    ctx.issue_manager
        .submit(me.id(), form)
        .await
        .back_to("/student/dashboard")?;

    Ok(FlashRedirect::success(
        "/my-issues",
        "Issue submitted successfully.",
    ))
}

async fn my_issues(
    State(ctx): State<AppContext>,
    Authorized(me, _): Authorized<Students>,
) -> PortalResult<Json<Value>> {
    let issues = ctx.issue_manager.list_for_student(me.id()).await?;

    Ok(Json(json!({ "issues": issues })))
}

async fn change_password(
    State(ctx): State<AppContext>,
    Authorized(me, _): Authorized<Students>,
    jar: SignedCookieJar,
    Form(form): Form<ChangePasswordForm>,
) -> Result<FlashRedirect, FormError> {
    let token = session_token(&jar).unwrap_or_default();
    ctx.account_manager
        .change_password(me.id(), &token, form)
        .await
        .back_to("/student/dashboard")?;

    Ok(FlashRedirect::success(
        "/student/dashboard",
        "Password changed successfully.",
    ))
}
