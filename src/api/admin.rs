/// Super-admin console endpoints
use crate::{
    account::{CreateSubadminForm, Role, SetPasswordForm},
    admin::{
        AuditEvent, CategoryForm, NewSettingForm, NotificationForm, PrefixForm, UpdateSettingForm,
    },
    api::{
        audit,
        flash::{FlashRedirect, FormError, FormResultExt},
        middleware::ClientIp,
    },
    auth::{Authorized, SuperAdmins},
    context::AppContext,
    error::{PortalError, PortalResult},
};
use axum::{
    extract::{Path, Query, State},
    http::header,
    response::{IntoResponse, Json},
    routing::{get, post},
    Form, Router,
};
use serde::Deserialize;
use serde_json::{json, Value};
use std::collections::HashMap;

/// Entries in the dashboard activity feeds
const RECENT_ACTIVITY: i64 = 10;
const SUBADMIN_ACTIVITY: i64 = 20;
const RECENT_ISSUES: i64 = 10;
const UNREAD_NOTIFICATIONS: i64 = 5;

pub fn routes() -> Router<AppContext> {
    Router::new()
        .route("/admin/dashboard", get(dashboard))
        // Users and sub-admins
        .route("/admin/users", get(list_users))
        .route("/admin/users/:id/role", post(update_user_role))
        .route("/admin/users/:id/delete", post(delete_user))
        .route("/admin/create-subadmin", post(create_subadmin))
        .route("/admin/manage-subadmins", get(manage_subadmins))
        .route("/admin/toggle-subadmin/:id", post(toggle_subadmin))
        .route("/admin/delete-subadmin/:id", post(delete_subadmin))
        // Categories and prefixes
        .route("/admin/manage-categories", get(manage_categories))
        .route("/admin/add-category", post(add_category))
        .route("/admin/delete-category/:id", post(delete_category))
        .route("/admin/manage-prefixes", get(manage_prefixes))
        .route("/admin/add-prefix", post(add_prefix))
        .route("/admin/delete-prefix/:id", post(delete_prefix))
        // Settings
        .route(
            "/admin/system-settings",
            get(system_settings).post(update_settings),
        )
        .route("/admin/update-setting", post(update_setting))
        .route("/admin/add-setting", post(add_setting))
        .route("/admin/delete-setting/:key", post(delete_setting))
        // Logs and notifications
        .route("/admin/system-logs", get(system_logs))
        .route("/admin/notifications", get(notifications))
        .route("/admin/create-notification", post(create_notification))
        .route("/admin/notifications/:id/read", post(mark_notification_read))
        .route("/admin/notifications/:id/delete", post(delete_notification))
        // Account and data
        .route("/admin/export-data", get(export_data))
        .route("/admin/update-password", post(update_password))
}

/// Audit entry for an action carried out by `admin_id`
fn event<'a>(
    admin_id: i64,
    ip: &'a str,
    action: &'a str,
    target: Option<(&'a str, i64)>,
    details: String,
) -> AuditEvent<'a> {
    AuditEvent {
        admin_id,
        action,
        target_type: target.map(|(kind, _)| kind),
        target_id: target.map(|(_, id)| id),
        details: Some(details),
        ip_address: ip,
    }
}

async fn dashboard(
    State(ctx): State<AppContext>,
    Authorized(me, _): Authorized<SuperAdmins>,
) -> PortalResult<Json<Value>> {
    let stats = ctx.analytics.status_counts().await?;
    let user_stats = ctx.analytics.user_stats().await?;
    let recent_issues = ctx.issue_manager.recent(RECENT_ISSUES).await?;
    let recent_activity = ctx.audit_log.recent(RECENT_ACTIVITY).await?;
    let subadmin_activity = ctx.audit_log.recent_by_subadmins(SUBADMIN_ACTIVITY).await?;
    let notifications = ctx
        .notification_manager
        .list_unread(UNREAD_NOTIFICATIONS)
        .await?;

    Ok(Json(json!({
        "user": me.user,
        "stats": stats,
        "user_stats": user_stats,
        "recent_issues": recent_issues,
        "recent_activity": recent_activity,
        "subadmin_activity": subadmin_activity,
        "notifications": notifications,
    })))
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct UserListQuery {
    role: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct RoleForm {
    role: String,
}

async fn list_users(
    State(ctx): State<AppContext>,
    Authorized(_, _): Authorized<SuperAdmins>,
    Query(query): Query<UserListQuery>,
) -> PortalResult<Json<Value>> {
    let role = crate::issues::parse_optional(query.role.as_deref(), Role::from_str)?;
    let users = ctx.account_manager.list_users(role).await?;

    Ok(Json(json!({ "users": users })))
}

async fn update_user_role(
    State(ctx): State<AppContext>,
    Authorized(me, _): Authorized<SuperAdmins>,
    ClientIp(ip): ClientIp,
    Path(id): Path<i64>,
    Form(form): Form<RoleForm>,
) -> Result<FlashRedirect, FormError> {
    let role = Role::from_str(&form.role)?;
    let user = ctx
        .account_manager
        .update_role(me.id(), id, role)
        .await
        .back_to("/admin/users")?;

    audit(
        &ctx,
        event(
            me.id(),
            &ip,
            "update_user_role",
            Some(("user", id)),
            format!("Changed role of {} to {}", user.username, role.as_str()),
        ),
    )
    .await;

    Ok(FlashRedirect::success("/admin/users", "User role updated successfully."))
}

async fn delete_user(
    State(ctx): State<AppContext>,
    Authorized(me, _): Authorized<SuperAdmins>,
    ClientIp(ip): ClientIp,
    Path(id): Path<i64>,
) -> Result<FlashRedirect, FormError> {
    if ctx
        .account_manager
        .delete_user(me.id(), id)
        .await
        .back_to("/admin/users")?
    {
        audit(
            &ctx,
            event(me.id(), &ip, "delete_user", Some(("user", id)), format!("Deleted user {}", id)),
        )
        .await;
    }

    Ok(FlashRedirect::success("/admin/users", "User deleted successfully."))
}

async fn create_subadmin(
    State(ctx): State<AppContext>,
    Authorized(me, _): Authorized<SuperAdmins>,
    ClientIp(ip): ClientIp,
    Form(form): Form<CreateSubadminForm>,
) -> Result<FlashRedirect, FormError> {
    let user = ctx
        .account_manager
        .create_subadmin(form)
        .await
        .back_to("/admin/manage-subadmins")?;

    audit(
        &ctx,
        event(
            me.id(),
            &ip,
            "create_subadmin",
            Some(("user", user.id)),
            format!("Created sub-admin: {} ({})", user.full_name, user.username),
        ),
    )
    .await;

    Ok(FlashRedirect::success(
        "/admin/manage-subadmins",
        format!("Sub-admin {} created successfully.", user.full_name),
    ))
}

async fn manage_subadmins(
    State(ctx): State<AppContext>,
    Authorized(_, _): Authorized<SuperAdmins>,
) -> PortalResult<Json<Value>> {
    let subadmins = ctx.account_manager.list_subadmins().await?;

    Ok(Json(json!({ "subadmins": subadmins })))
}

async fn toggle_subadmin(
    State(ctx): State<AppContext>,
    Authorized(me, _): Authorized<SuperAdmins>,
    ClientIp(ip): ClientIp,
    Path(id): Path<i64>,
) -> Result<FlashRedirect, FormError> {
    let user = ctx
        .account_manager
        .toggle_active(id)
        .await
        .back_to("/admin/manage-subadmins")?;

    let state = if user.is_active { "activated" } else { "deactivated" };
    audit(
        &ctx,
        event(
            me.id(),
            &ip,
            "toggle_subadmin",
            Some(("user", id)),
            format!("Sub-admin {} {}", user.username, state),
        ),
    )
    .await;

    Ok(FlashRedirect::success(
        "/admin/manage-subadmins",
        format!("Sub-admin {} successfully.", state),
    ))
}

/// Delete a sub-admin. Other roles are refused; a missing id is a no-op.
async fn delete_subadmin(
    State(ctx): State<AppContext>,
    Authorized(me, _): Authorized<SuperAdmins>,
    ClientIp(ip): ClientIp,
    Path(id): Path<i64>,
) -> Result<FlashRedirect, FormError> {
    const BACK: &str = "/admin/manage-subadmins";

    let target = ctx.users.get_user(id).await.back_to(BACK)?;
    if let Some(target) = target {
        if target.role != Role::SubAdmin {
            return Err(PortalError::Validation(
                "Only sub-admin accounts can be deleted here.".to_string(),
            )
            .into());
        }

        if ctx.account_manager.delete_user(me.id(), id).await.back_to(BACK)? {
            audit(
                &ctx,
                event(
                    me.id(),
                    &ip,
                    "delete_subadmin",
                    Some(("user", id)),
                    format!("Deleted sub-admin: {}", target.username),
                ),
            )
            .await;
        }
    }

    Ok(FlashRedirect::success(BACK, "Sub-admin deleted successfully."))
}

async fn manage_categories(
    State(ctx): State<AppContext>,
    Authorized(_, _): Authorized<SuperAdmins>,
) -> PortalResult<Json<Value>> {
    let categories = ctx.category_manager.list().await?;

    Ok(Json(json!({ "categories": categories })))
}

async fn add_category(
    State(ctx): State<AppContext>,
    Authorized(me, _): Authorized<SuperAdmins>,
    ClientIp(ip): ClientIp,
    Form(form): Form<CategoryForm>,
) -> Result<FlashRedirect, FormError> {
    const BACK: &str = "/admin/manage-categories";
    let category = ctx.category_manager.add(form).await.back_to(BACK)?;

    audit(
        &ctx,
        event(
            me.id(),
            &ip,
            "add_category",
            Some(("category", category.id)),
            format!("Added category: {}", category.name),
        ),
    )
    .await;

    Ok(FlashRedirect::success(
        BACK,
        format!("Category '{}' added successfully.", category.name),
    ))
}

async fn delete_category(
    State(ctx): State<AppContext>,
    Authorized(me, _): Authorized<SuperAdmins>,
    ClientIp(ip): ClientIp,
    Path(id): Path<i64>,
) -> Result<FlashRedirect, FormError> {
    const BACK: &str = "/admin/manage-categories";

    if let Some(removed) = ctx.category_manager.delete(id).await.back_to(BACK)? {
        audit(
            &ctx,
            event(
                me.id(),
                &ip,
                "delete_category",
                Some(("category", id)),
                format!(
                    "Deleted category: {} ({} issues still reference it)",
                    removed.name, removed.issues_in_use
                ),
            ),
        )
        .await;
    }

    Ok(FlashRedirect::success(BACK, "Category deleted successfully."))
}

async fn manage_prefixes(
    State(ctx): State<AppContext>,
    Authorized(_, _): Authorized<SuperAdmins>,
) -> PortalResult<Json<Value>> {
    let prefixes = ctx.prefix_manager.list().await?;

    Ok(Json(json!({ "prefixes": prefixes })))
}

async fn add_prefix(
    State(ctx): State<AppContext>,
    Authorized(me, _): Authorized<SuperAdmins>,
    ClientIp(ip): ClientIp,
    Form(form): Form<PrefixForm>,
) -> Result<FlashRedirect, FormError> {
    const BACK: &str = "/admin/manage-prefixes";
    let prefix = ctx.prefix_manager.add(form).await.back_to(BACK)?;

    audit(
        &ctx,
        event(
            me.id(),
            &ip,
            "add_prefix",
            Some(("prefix", prefix.id)),
            format!("Added index prefix: {}", prefix.prefix),
        ),
    )
    .await;

    Ok(FlashRedirect::success(
        BACK,
        format!("Prefix '{}' added successfully.", prefix.prefix),
    ))
}

async fn delete_prefix(
    State(ctx): State<AppContext>,
    Authorized(me, _): Authorized<SuperAdmins>,
    ClientIp(ip): ClientIp,
    Path(id): Path<i64>,
) -> Result<FlashRedirect, FormError> {
    const BACK: &str = "/admin/manage-prefixes";

    if let Some(prefix) = ctx.prefix_manager.delete(id).await.back_to(BACK)? {
        audit(
            &ctx,
            event(
                me.id(),
                &ip,
                "delete_prefix",
                Some(("prefix", id)),
                format!("Deleted index prefix: {}", prefix),
            ),
        )
        .await;
    }

    Ok(FlashRedirect::success(BACK, "Prefix deleted successfully."))
}

async fn system_settings(
    State(ctx): State<AppContext>,
    Authorized(_, _): Authorized<SuperAdmins>,
) -> PortalResult<Json<Value>> {
    let settings = ctx.settings_manager.list_grouped().await?;

    Ok(Json(json!({ "settings": settings })))
}

/// Bulk update from the settings page; fields are named `setting_<key>`
async fn update_settings(
    State(ctx): State<AppContext>,
    Authorized(me, _): Authorized<SuperAdmins>,
    ClientIp(ip): ClientIp,
    Form(fields): Form<HashMap<String, String>>,
) -> Result<FlashRedirect, FormError> {
    const BACK: &str = "/admin/system-settings";
    let updated = ctx.settings_manager.update_many(&fields).await.back_to(BACK)?;

    audit(
        &ctx,
        event(
            me.id(),
            &ip,
            "update_settings",
            None,
            format!("Updated {} system settings", updated),
        ),
    )
    .await;

    Ok(FlashRedirect::success(BACK, "Settings updated successfully."))
}

async fn update_setting(
    State(ctx): State<AppContext>,
    Authorized(me, _): Authorized<SuperAdmins>,
    ClientIp(ip): ClientIp,
    Form(form): Form<UpdateSettingForm>,
) -> Result<FlashRedirect, FormError> {
    const BACK: &str = "/admin/system-settings";
    let key = form.key.trim();
    if key.is_empty() {
        return Err(PortalError::Validation("Setting key is required.".to_string()).into());
    }

    ctx.settings_manager
        .update(key, &form.value)
        .await
        .back_to(BACK)?;

    audit(
        &ctx,
        event(
            me.id(),
            &ip,
            "update_setting",
            None,
            format!("Updated setting {} = {}", key, form.value),
        ),
    )
    .await;

    Ok(FlashRedirect::success(
        BACK,
        format!("Setting '{}' updated successfully.", key),
    ))
}

async fn add_setting(
    State(ctx): State<AppContext>,
    Authorized(me, _): Authorized<SuperAdmins>,
    ClientIp(ip): ClientIp,
    Form(form): Form<NewSettingForm>,
) -> Result<FlashRedirect, FormError> {
    const BACK: &str = "/admin/system-settings";
    let setting = ctx.settings_manager.add(form).await.back_to(BACK)?;

    audit(
        &ctx,
        event(
            me.id(),
            &ip,
            "add_setting",
            Some(("setting", setting.id)),
            format!("Added setting {} in {}", setting.key, setting.category),
        ),
    )
    .await;

    Ok(FlashRedirect::success(
        BACK,
        format!("Setting '{}' added successfully.", setting.key),
    ))
}

async fn delete_setting(
    State(ctx): State<AppContext>,
    Authorized(me, _): Authorized<SuperAdmins>,
    ClientIp(ip): ClientIp,
    Path(key): Path<String>,
) -> Result<FlashRedirect, FormError> {
    const BACK: &str = "/admin/system-settings";

    if ctx.settings_manager.delete(&key).await.back_to(BACK)? {
        audit(
            &ctx,
            event(me.id(), &ip, "delete_setting", None, format!("Deleted setting {}", key)),
        )
        .await;
    }

    Ok(FlashRedirect::success(BACK, "Setting deleted successfully."))
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct LogQuery {
    page: Option<i64>,
}

async fn system_logs(
    State(ctx): State<AppContext>,
    Authorized(_, _): Authorized<SuperAdmins>,
    Query(query): Query<LogQuery>,
) -> PortalResult<Json<Value>> {
    let page = ctx.audit_log.list_page(query.page.unwrap_or(1)).await?;

    Ok(Json(json!(page)))
}

async fn notifications(
    State(ctx): State<AppContext>,
    Authorized(_, _): Authorized<SuperAdmins>,
) -> PortalResult<Json<Value>> {
    let notifications = ctx.notification_manager.list().await?;

    Ok(Json(json!({ "notifications": notifications })))
}

async fn create_notification(
    State(ctx): State<AppContext>,
    Authorized(me, _): Authorized<SuperAdmins>,
    ClientIp(ip): ClientIp,
    Form(form): Form<NotificationForm>,
) -> Result<FlashRedirect, FormError> {
    const BACK: &str = "/admin/notifications";
    let notification = ctx.notification_manager.create(form).await.back_to(BACK)?;

    audit(
        &ctx,
        event(
            me.id(),
            &ip,
            "create_notification",
            Some(("notification", notification.id)),
            format!("Created notification: {}", notification.title),
        ),
    )
    .await;

    Ok(FlashRedirect::success(BACK, "Notification created successfully."))
}

async fn mark_notification_read(
    State(ctx): State<AppContext>,
    Authorized(me, _): Authorized<SuperAdmins>,
    ClientIp(ip): ClientIp,
    Path(id): Path<i64>,
) -> Result<FlashRedirect, FormError> {
    const BACK: &str = "/admin/notifications";

    if ctx.notification_manager.mark_read(id).await.back_to(BACK)? {
        audit(
            &ctx,
            event(
                me.id(),
                &ip,
                "mark_notification_read",
                Some(("notification", id)),
                format!("Marked notification {} as read", id),
            ),
        )
        .await;
    }

    Ok(FlashRedirect::success(BACK, "Notification marked as read."))
}

async fn delete_notification(
    State(ctx): State<AppContext>,
    Authorized(me, _): Authorized<SuperAdmins>,
    ClientIp(ip): ClientIp,
    Path(id): Path<i64>,
) -> Result<FlashRedirect, FormError> {
    const BACK: &str = "/admin/notifications";

    if ctx.notification_manager.delete(id).await.back_to(BACK)? {
        audit(
            &ctx,
            event(
                me.id(),
                &ip,
                "delete_notification",
                Some(("notification", id)),
                format!("Deleted notification {}", id),
            ),
        )
        .await;
    }

    Ok(FlashRedirect::success(BACK, "Notification deleted successfully."))
}

/// Every issue as a downloadable JSON document
async fn export_data(
    State(ctx): State<AppContext>,
    Authorized(me, _): Authorized<SuperAdmins>,
    ClientIp(ip): ClientIp,
) -> PortalResult<impl IntoResponse> {
    let rows = ctx.issue_manager.export_rows().await?;
    let filename = format!(
        "attachment; filename=\"issues_export_{}.json\"",
        chrono::Utc::now().format("%Y%m%d_%H%M%S")
    );

    audit(
        &ctx,
        event(
            me.id(),
            &ip,
            "export_data",
            None,
            format!("Exported {} issues", rows.len()),
        ),
    )
    .await;

    Ok(([(header::CONTENT_DISPOSITION, filename)], Json(rows)))
}

async fn update_password(
    State(ctx): State<AppContext>,
    Authorized(me, _): Authorized<SuperAdmins>,
    ClientIp(ip): ClientIp,
    Form(form): Form<SetPasswordForm>,
) -> Result<FlashRedirect, FormError> {
    ctx.account_manager
        .set_password(me.id(), form)
        .await
        .back_to("/admin/dashboard")?;

    audit(
        &ctx,
        event(
            me.id(),
            &ip,
            "update_password",
            Some(("user", me.id())),
            "Updated own password".to_string(),
        ),
    )
    .await;

    Ok(FlashRedirect::success(
        "/admin/dashboard",
        "Password updated successfully.",
    ))
}
