/// Analytics endpoints (super-admin)
use crate::{
    analytics::ChartKind,
    auth::{Authorized, SuperAdmins},
    context::AppContext,
    error::PortalResult,
};
use axum::{
    extract::{Path, State},
    response::Json,
    routing::get,
    Router,
};
use serde_json::{json, Value};

pub fn routes() -> Router<AppContext> {
    Router::new()
        .route("/admin/analytics", get(analytics))
        .route("/admin/api/chart-data/:chart_type", get(chart_data))
}

async fn analytics(
    State(ctx): State<AppContext>,
    Authorized(_, _): Authorized<SuperAdmins>,
) -> PortalResult<Json<Value>> {
    let analytics = &ctx.analytics;
    let stats = analytics.status_counts().await?;
    let user_stats = analytics.user_stats().await?;
    let category_stats = analytics.by_category().await?;
    let priority_stats = analytics.by_priority().await?;
    let monthly_stats = analytics.monthly_counts().await?;
    let daily_stats = analytics.daily_counts().await?;
    let report = analytics.report().await?;

    Ok(Json(json!({
        "stats": stats,
        "user_stats": user_stats,
        "category_stats": category_stats,
        "priority_stats": priority_stats,
        "monthly_stats": monthly_stats,
        "daily_stats": daily_stats,
        "report": report,
    })))
}

/// One chart series; unknown chart types are rejected
async fn chart_data(
    State(ctx): State<AppContext>,
    Authorized(_, _): Authorized<SuperAdmins>,
    Path(chart_type): Path<String>,
) -> PortalResult<Json<Value>> {
    let kind = ChartKind::from_str(&chart_type)?;
    let data = ctx.analytics.chart_data(kind).await?;

    Ok(Json(json!(data)))
}
