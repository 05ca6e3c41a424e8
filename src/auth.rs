/// Authentication extractors and the role guard
use crate::{
    account::{Role, Session},
    context::AppContext,
    error::{PortalError, PortalResult},
    store::User,
};
use axum::{async_trait, extract::FromRequestParts, http::request::Parts};
use axum_extra::extract::cookie::{Cookie, SameSite, SignedCookieJar};
use std::marker::PhantomData;

/// Name of the signed session cookie
pub const SESSION_COOKIE: &str = "portal_session";

/// Deny unless `role` is one of `allowed`. A missing role is denied the same way.
pub fn require_role(role: Option<Role>, allowed: &[Role]) -> PortalResult<()> {
    match role {
        Some(role) if allowed.contains(&role) => Ok(()),
        _ => Err(PortalError::AccessDenied),
    }
}

/// Build the session cookie handed out on login
pub fn session_cookie(token: String, secure: bool) -> Cookie<'static> {
    Cookie::build((SESSION_COOKIE, token))
        .path("/")
        .http_only(true)
        .secure(secure)
        .same_site(SameSite::Lax)
        .build()
}

/// Signed-cookie token of the current request, if any
pub fn session_token(jar: &SignedCookieJar) -> Option<String> {
    jar.get(SESSION_COOKIE).map(|c| c.value().to_string())
}

/// Logged-in caller. The user record is re-read on every request so role
/// changes and deactivation take effect immediately.
#[derive(Debug, Clone)]
pub struct CurrentUser {
    pub user: User,
    pub session: Session,
}

impl CurrentUser {
    pub fn id(&self) -> i64 {
        self.user.id
    }

    pub fn role(&self) -> Role {
        self.user.role
    }
}

#[async_trait]
impl FromRequestParts<AppContext> for CurrentUser {
    type Rejection = PortalError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppContext,
    ) -> Result<Self, Self::Rejection> {
        let jar = SignedCookieJar::from_headers(&parts.headers, state.cookie_key.clone());
        let token = session_token(&jar).ok_or(PortalError::AccessDenied)?;

        let session = state
            .session_manager
            .get(&token)
            .await?
            .ok_or(PortalError::AccessDenied)?;

        let user = match state.users.get_user(session.user_id).await? {
            Some(user) if user.is_active => user,
            _ => {
                tracing::debug!(user_id = session.user_id, "session for missing or inactive user");
                return Err(PortalError::AccessDenied);
            }
        };

        Ok(CurrentUser { user, session })
    }
}

/// Roles admitted by an [`Authorized`] extractor
pub trait AllowedRoles: Send + Sync + 'static {
    const ROLES: &'static [Role];
}

/// Students only
pub struct Students;

/// Sub-admins and super-admins
pub struct Staff;

/// Super-admins only
pub struct SuperAdmins;

impl AllowedRoles for Students {
    const ROLES: &'static [Role] = &[Role::Student];
}

impl AllowedRoles for Staff {
    const ROLES: &'static [Role] = &[Role::SubAdmin, Role::SupaAdmin];
}

impl AllowedRoles for SuperAdmins {
    const ROLES: &'static [Role] = &[Role::SupaAdmin];
}

/// Current user whose role passed the guard for `P`
pub struct Authorized<P: AllowedRoles>(pub CurrentUser, pub PhantomData<fn() -> P>);

#[async_trait]
impl<P: AllowedRoles> FromRequestParts<AppContext> for Authorized<P> {
    type Rejection = PortalError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppContext,
    ) -> Result<Self, Self::Rejection> {
        let current = CurrentUser::from_request_parts(parts, state).await?;

        if let Err(err) = require_role(Some(current.role()), P::ROLES) {
            tracing::warn!(
                user_id = current.id(),
                role = current.role().as_str(),
                path = %parts.uri.path(),
                "role check failed"
            );
            return Err(err);
        }

        Ok(Authorized(current, PhantomData))
    }
}
