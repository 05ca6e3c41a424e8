/// Public account endpoints: login, logout, registration, password reset
use crate::{
    account::{ForgotPasswordForm, LoginForm, RegisterForm, ResetPasswordForm},
    api::flash::{take_flash, FlashRedirect, FormError, FormResultExt},
    auth::{session_cookie, session_token, SESSION_COOKIE},
    context::AppContext,
    error::{PortalError, PortalResult},
};
use axum::{
    extract::State,
    http::HeaderMap,
    response::{IntoResponse, Json},
    routing::{get, post},
    Form, Router,
};
use axum_extra::extract::cookie::{Cookie, SignedCookieJar};
use serde_json::json;

pub fn routes() -> Router<AppContext> {
    Router::new()
        .route("/login", get(login_page).post(login))
        .route("/register", post(register))
        .route("/logout", get(logout).post(logout))
        .route("/forgot-password", post(forgot_password))
        .route("/reset-password", post(reset_password))
}

/// Login page data. Returns and clears the pending flash message.
async fn login_page(
    State(ctx): State<AppContext>,
    headers: HeaderMap,
) -> PortalResult<impl IntoResponse> {
    let (jar, flash) = take_flash(&headers);
    let registration_enabled = ctx
        .settings_manager
        .get_bool("registration_enabled", true)
        .await?;
    let site_name = ctx.settings_manager.get("site_name").await?;

    Ok((
        jar,
        Json(json!({
            "flash": flash,
            "site_name": site_name,
            "registration_enabled": registration_enabled,
        })),
    ))
}

/// Authenticate and set the session cookie
async fn login(
    State(ctx): State<AppContext>,
    jar: SignedCookieJar,
    Form(form): Form<LoginForm>,
) -> PortalResult<(SignedCookieJar, FlashRedirect)> {
    if form.email.trim().is_empty() || form.password.is_empty() {
        return Err(PortalError::Validation(
            "Email and password are required.".to_string(),
        ));
    }

    let (user, token) = ctx.account_manager.login(&form.email, &form.password).await?;
    let jar = jar.add(session_cookie(token, ctx.config.authentication.secure_cookies));

    Ok((
        jar,
        FlashRedirect::success(
            user.role.dashboard(),
            format!("Welcome back, {}!", user.full_name),
        ),
    ))
}

/// Register a student account
async fn register(
    State(ctx): State<AppContext>,
    Form(form): Form<RegisterForm>,
) -> Result<FlashRedirect, FormError> {
    if !ctx
        .settings_manager
        .get_bool("registration_enabled", true)
        .await
        .back_to("/login")?
    {
        return Err(PortalError::Validation(
            "Registration is currently disabled.".to_string(),
        )
        .into());
    }

    let prefixes = ctx.prefix_manager.prefix_strings().await.back_to("/login")?;
    ctx.account_manager
        .register(form, &prefixes)
        .await
        .back_to("/login")?;

    Ok(FlashRedirect::success(
        "/login",
        "Registration successful! You can now log in.",
    ))
}

/// End the session. Works with or without a valid session.
async fn logout(
    State(ctx): State<AppContext>,
    jar: SignedCookieJar,
) -> PortalResult<(SignedCookieJar, FlashRedirect)> {
    if let Some(token) = session_token(&jar) {
        ctx.account_manager.logout(&token).await?;
    }

    let jar = jar.remove(Cookie::build(SESSION_COOKIE).path("/"));

    Ok((jar, FlashRedirect::info("/login", "You have been logged out.")))
}

/// Start a password reset. The outcome is the same whether or not the
/// email is registered.
async fn forgot_password(
    State(ctx): State<AppContext>,
    Form(form): Form<ForgotPasswordForm>,
) -> Result<FlashRedirect, FormError> {
    if form.email.trim().is_empty() {
        return Err(PortalError::Validation("Email is required.".to_string()).into());
    }

    ctx.account_manager
        .request_password_reset(&form.email)
        .await
        .back_to("/login")?;

    Ok(FlashRedirect::info(
        "/login",
        "If that email is registered, password reset instructions have been sent.",
    ))
}

/// Complete a password reset
async fn reset_password(
    State(ctx): State<AppContext>,
    Form(form): Form<ResetPasswordForm>,
) -> Result<FlashRedirect, FormError> {
    ctx.account_manager
        .reset_password(form)
        .await
        .back_to("/login")?;

    Ok(FlashRedirect::success(
        "/login",
        "Your password has been reset. Please log in.",
    ))
}
