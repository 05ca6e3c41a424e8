/// API routes and handlers
pub mod admin;
pub mod analytics;
pub mod auth;
pub mod flash;
pub mod health;
pub mod issues;
pub mod middleware;
pub mod student;

use crate::{admin::AuditEvent, context::AppContext};
use axum::Router;

/// Build API routes
pub fn routes() -> Router<AppContext> {
    Router::new()
        .merge(health::routes())
        .merge(auth::routes())
        .merge(student::routes())
        .merge(issues::routes())
        .merge(admin::routes())
        .merge(analytics::routes())
}

/// Append an audit entry. A failed write is logged and does not fail the
/// action that was already carried out.
pub(crate) async fn audit(ctx: &AppContext, event: AuditEvent<'_>) {
    let action = event.action.to_string();
    if let Err(e) = ctx.audit_log.log(event).await {
        tracing::warn!(action = %action, error = %e, "failed to write audit entry");
    }
}
