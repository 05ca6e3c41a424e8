/// Account manager implementation over the pluggable user store
use super::password::{hash_password, verify_password};
use super::{
    validate_form, ChangePasswordForm, CreateSubadminForm, RegisterForm, ResetPasswordForm, Role,
    SessionManager, SetPasswordForm,
};
use crate::error::{PortalError, PortalResult};
use crate::metrics;
use crate::store::{IssueFilter, IssueStore, NewUser, User, UserChanges, UserStore};
use chrono::{Duration, Utc};
use rand::distributions::Alphanumeric;
use rand::Rng;
use serde::Serialize;
use std::sync::Arc;

/// Reset tokens are valid for one hour
const RESET_TOKEN_TTL_HOURS: i64 = 1;
const RESET_TOKEN_LENGTH: usize = 32;

/// Sub-admin with the number of issues currently assigned to them
#[derive(Debug, Clone, Serialize)]
pub struct SubadminSummary {
    #[serde(flatten)]
    pub user: User,
    pub assigned_issues: usize,
}

/// Account manager service
pub struct AccountManager {
    users: Arc<dyn UserStore>,
    issues: Arc<dyn IssueStore>,
    sessions: SessionManager,
    institutional_domain: String,
}

impl AccountManager {
    /// Create a new account manager
    pub fn new(
        users: Arc<dyn UserStore>,
        issues: Arc<dyn IssueStore>,
        sessions: SessionManager,
        institutional_domain: impl Into<String>,
    ) -> Self {
        Self {
            users,
            issues,
            sessions,
            institutional_domain: institutional_domain.into(),
        }
    }

    /// Register a new student account.
    ///
    /// `prefixes` are the registered index-number prefixes; when empty any
    /// index number is accepted.
    pub async fn register(&self, form: RegisterForm, prefixes: &[String]) -> PortalResult<User> {
        let form = form.normalized();

        let required = [
            &form.full_name,
            &form.email,
            &form.index_number,
            &form.level,
            &form.gender,
            &form.password,
            &form.confirm_password,
        ];
        if required.iter().any(|field| field.trim().is_empty()) {
            return Err(PortalError::Validation("All fields are required.".to_string()));
        }

        validate_form(&form)?;
        self.validate_email_domain(&form.email)?;
        validate_index_number(&form.index_number, prefixes)?;

        let username = form
            .username
            .clone()
            .unwrap_or_else(|| email_local_part(&form.email));

        if self.users.find_user_by_email(&form.email).await?.is_some() {
            return Err(PortalError::Validation("Email already registered.".to_string()));
        }
        if self.users.find_user_by_username(&username).await?.is_some() {
            return Err(PortalError::Validation("Username already taken.".to_string()));
        }
        if self
            .users
            .find_user_by_index_number(&form.index_number)
            .await?
            .is_some()
        {
            return Err(PortalError::Validation(
                "Index number already registered.".to_string(),
            ));
        }

        let password_hash = hash_password(&form.password)?;

        let user = self
            .users
            .insert_user(NewUser {
                username,
                email: form.email,
                full_name: form.full_name,
                index_number: form.index_number,
                level: form.level,
                gender: form.gender,
                password_hash,
                role: Role::Student,
                is_verified: true,
            })
            .await?;

        tracing::info!(user_id = user.id, username = %user.username, "student registered");

        Ok(user)
    }

    /// Authenticate and open a session. Returns the user and the cookie token.
    pub async fn login(&self, email: &str, password: &str) -> PortalResult<(User, String)> {
        let email = email.trim();

        let user = match self.users.find_user_by_email(email).await? {
            Some(user) if verify_password(password, &user.password_hash) => user,
            _ => {
                metrics::record_login("invalid_credentials");
                tracing::info!(email = %email, "login failed");
                return Err(PortalError::InvalidCredentials);
            }
        };

        if !user.is_verified {
            metrics::record_login("not_verified");
            return Err(PortalError::NotVerified);
        }

        if !user.is_active {
            metrics::record_login("inactive");
            return Err(PortalError::AccountInactive);
        }

        self.sessions.purge_expired().await?;

        let user = self
            .users
            .update_user(
                user.id,
                UserChanges {
                    last_login: Some(Utc::now()),
                    login_count: Some(user.login_count + 1),
                    ..Default::default()
                },
            )
            .await?
            .ok_or(PortalError::InvalidCredentials)?;

        let (token, _) = self.sessions.create(&user).await?;

        metrics::record_login("success");
        tracing::info!(user_id = user.id, role = user.role.as_str(), "user logged in");

        Ok((user, token))
    }

    /// End a session. Unknown tokens are ignored.
    pub async fn logout(&self, token: &str) -> PortalResult<()> {
        self.sessions.delete(token).await
    }

    /// Change the caller's own password. Sessions other than `current_token`
    /// are ended.
    pub async fn change_password(
        &self,
        user_id: i64,
        current_token: &str,
        form: ChangePasswordForm,
    ) -> PortalResult<()> {
        if form.current_password.is_empty()
            || form.new_password.is_empty()
            || form.confirm_password.is_empty()
        {
            return Err(PortalError::Validation("All fields are required.".to_string()));
        }

        let user = self
            .users
            .get_user(user_id)
            .await?
            .ok_or(PortalError::AccessDenied)?;

        if !verify_password(&form.current_password, &user.password_hash) {
            return Err(PortalError::Validation(
                "Current password is incorrect.".to_string(),
            ));
        }

        validate_form(&form)?;

        self.users
            .update_user(
                user_id,
                UserChanges {
                    password_hash: Some(hash_password(&form.new_password)?),
                    ..Default::default()
                },
            )
            .await?;

        let revoked = self.sessions.delete_others(user_id, current_token).await?;

        tracing::info!(user_id, revoked, "password changed");
        Ok(())
    }

    /// Replace a password without the current one (super-admin console)
    pub async fn set_password(&self, user_id: i64, form: SetPasswordForm) -> PortalResult<()> {
        if form.password.is_empty() || form.password_confirm.is_empty() {
            return Err(PortalError::Validation("All fields are required.".to_string()));
        }
        validate_form(&form)?;

        self.users
            .update_user(
                user_id,
                UserChanges {
                    password_hash: Some(hash_password(&form.password)?),
                    ..Default::default()
                },
            )
            .await?
            .ok_or_else(|| PortalError::NotFound(format!("User {}", user_id)))?;

        tracing::info!(user_id, "password updated by administrator");
        Ok(())
    }

    /// Start a password reset. The caller always reports the same outcome;
    /// the token is returned only so it can be delivered out of band.
    pub async fn request_password_reset(&self, email: &str) -> PortalResult<Option<String>> {
        let Some(user) = self.users.find_user_by_email(email).await? else {
            tracing::debug!("password reset requested for unknown email");
            return Ok(None);
        };

        let token: String = rand::thread_rng()
            .sample_iter(&Alphanumeric)
            .take(RESET_TOKEN_LENGTH)
            .map(char::from)
            .collect();

        self.users
            .update_user(
                user.id,
                UserChanges {
                    reset_token: Some(Some(token.clone())),
                    reset_expires: Some(Some(Utc::now() + Duration::hours(RESET_TOKEN_TTL_HOURS))),
                    ..Default::default()
                },
            )
            .await?;

        tracing::info!(user_id = user.id, "password reset token issued");
        Ok(Some(token))
    }

    /// Complete a password reset. Tokens are single-use.
    pub async fn reset_password(&self, form: ResetPasswordForm) -> PortalResult<()> {
        let invalid = || PortalError::Validation("Invalid or expired reset token.".to_string());

        if form.token.trim().is_empty() {
            return Err(invalid());
        }

        let user = self
            .users
            .find_user_by_reset_token(form.token.trim())
            .await?
            .ok_or_else(invalid)?;

        match user.reset_expires {
            Some(expires) if expires > Utc::now() => {}
            _ => return Err(invalid()),
        }

        validate_form(&form)?;

        self.users
            .update_user(
                user.id,
                UserChanges {
                    password_hash: Some(hash_password(&form.password)?),
                    reset_token: Some(None),
                    reset_expires: Some(None),
                    ..Default::default()
                },
            )
            .await?;
        self.sessions.delete_for_user(user.id).await?;

        tracing::info!(user_id = user.id, "password reset completed");
        Ok(())
    }

    /// Create a sub-admin account
    pub async fn create_subadmin(&self, form: CreateSubadminForm) -> PortalResult<User> {
        let full_name = form.full_name.trim().to_string();
        let username = form.username.trim().to_lowercase();
        let email = form.email.trim().to_lowercase();

        if full_name.is_empty()
            || username.is_empty()
            || email.is_empty()
            || form.password.is_empty()
            || form.confirm_password.is_empty()
        {
            return Err(PortalError::Validation("All fields are required.".to_string()));
        }

        validate_form(&CreateSubadminForm {
            full_name: full_name.clone(),
            username: username.clone(),
            email: email.clone(),
            password: form.password.clone(),
            confirm_password: form.confirm_password.clone(),
        })?;

        if self.users.find_user_by_username(&username).await?.is_some()
            || self.users.find_user_by_email(&email).await?.is_some()
        {
            return Err(PortalError::Validation(
                "Username or email already exists.".to_string(),
            ));
        }

        let user = self
            .users
            .insert_user(NewUser {
                index_number: format!("SUB{}", username.to_uppercase()),
                username,
                email,
                full_name,
                level: "Staff".to_string(),
                gender: "N/A".to_string(),
                password_hash: hash_password(&form.password)?,
                role: Role::SubAdmin,
                is_verified: true,
            })
            .await?;

        tracing::info!(user_id = user.id, username = %user.username, "sub-admin created");
        Ok(user)
    }

    /// Create the initial super-admin unless an account with `email` exists
    pub async fn ensure_super_admin(&self, email: &str, password: &str) -> PortalResult<bool> {
        if self.users.find_user_by_email(email).await?.is_some() {
            return Ok(false);
        }

        let user = self
            .users
            .insert_user(NewUser {
                username: email_local_part(email),
                email: email.trim().to_lowercase(),
                full_name: "System Administrator".to_string(),
                index_number: "ADMIN001".to_string(),
                level: "Staff".to_string(),
                gender: "N/A".to_string(),
                password_hash: hash_password(password)?,
                role: Role::SupaAdmin,
                is_verified: true,
            })
            .await?;

        tracing::info!(user_id = user.id, "bootstrap super-admin created");
        Ok(true)
    }

    /// Fetch one user
    pub async fn get_user(&self, id: i64) -> PortalResult<User> {
        self.users
            .get_user(id)
            .await?
            .ok_or_else(|| PortalError::NotFound(format!("User {}", id)))
    }

    /// List users, optionally restricted to one role
    pub async fn list_users(&self, role: Option<Role>) -> PortalResult<Vec<User>> {
        self.users.list_users(role).await
    }

    /// Active staff of either role, i.e. everyone an issue can be assigned to
    pub async fn assignable_staff(&self) -> PortalResult<Vec<User>> {
        let mut staff = self.users.list_users(None).await?;
        staff.retain(|u| u.role.is_staff() && u.is_active);
        Ok(staff)
    }

    /// List sub-admins with their assigned-issue counts
    pub async fn list_subadmins(&self) -> PortalResult<Vec<SubadminSummary>> {
        let subadmins = self.users.list_users(Some(Role::SubAdmin)).await?;

        let mut summaries = Vec::with_capacity(subadmins.len());
        for user in subadmins {
            let assigned_issues = self
                .issues
                .list_issues(&IssueFilter {
                    assigned_to: Some(user.id),
                    ..Default::default()
                })
                .await?
                .len();
            summaries.push(SubadminSummary {
                user,
                assigned_issues,
            });
        }

        Ok(summaries)
    }

    /// Flip a sub-admin's active flag. Deactivation ends their sessions.
    pub async fn toggle_active(&self, target_id: i64) -> PortalResult<User> {
        let target = self.get_user(target_id).await?;
        if target.role != Role::SubAdmin {
            return Err(PortalError::Validation(
                "Only sub-admin accounts can be activated or deactivated.".to_string(),
            ));
        }

        let user = self
            .users
            .update_user(
                target_id,
                UserChanges {
                    is_active: Some(!target.is_active),
                    ..Default::default()
                },
            )
            .await?
            .ok_or_else(|| PortalError::NotFound(format!("User {}", target_id)))?;

        if !user.is_active {
            self.sessions.delete_for_user(user.id).await?;
        }

        tracing::info!(user_id = user.id, active = user.is_active, "sub-admin status toggled");
        Ok(user)
    }

    /// Change another user's role. Their sessions are ended.
    pub async fn update_role(&self, actor_id: i64, target_id: i64, role: Role) -> PortalResult<User> {
        if actor_id == target_id {
            return Err(PortalError::Validation(
                "You cannot change your own role.".to_string(),
            ));
        }

        if let Some(target) = self.users.get_user(target_id).await? {
            if target.role == Role::Student && role != Role::Student {
                self.ensure_owns_no_issues(target_id).await?;
            }
        }

        let user = self
            .users
            .update_user(
                target_id,
                UserChanges {
                    role: Some(role),
                    ..Default::default()
                },
            )
            .await?
            .ok_or_else(|| PortalError::NotFound(format!("User {}", target_id)))?;

        self.sessions.delete_for_user(target_id).await?;

        tracing::info!(user_id = target_id, role = role.as_str(), "user role updated");
        Ok(user)
    }

    /// Delete another user. Deleting a missing user is a no-op.
    pub async fn delete_user(&self, actor_id: i64, target_id: i64) -> PortalResult<bool> {
        if actor_id == target_id {
            return Err(PortalError::Validation(
                "You cannot delete your own account.".to_string(),
            ));
        }

        if let Some(target) = self.users.get_user(target_id).await? {
            if target.role == Role::Student {
                self.ensure_owns_no_issues(target_id).await?;
            }
        }

        let removed = self.users.delete_user(target_id).await?;
        self.sessions.delete_for_user(target_id).await?;

        if removed {
            tracing::info!(user_id = target_id, "user deleted");
        }
        Ok(removed)
    }

    /// Issues must always belong to an existing student account
    async fn ensure_owns_no_issues(&self, student_id: i64) -> PortalResult<()> {
        let owned = self
            .issues
            .list_issues(&IssueFilter {
                student_id: Some(student_id),
                ..Default::default()
            })
            .await?
            .len();

        if owned > 0 {
            return Err(PortalError::Validation(format!(
                "This student still owns {} issue(s). Delete them first.",
                owned
            )));
        }

        Ok(())
    }

    fn validate_email_domain(&self, email: &str) -> PortalResult<()> {
        if self.institutional_domain.is_empty() {
            return Ok(());
        }

        if !email.ends_with(&format!("@{}", self.institutional_domain)) {
            return Err(PortalError::Validation(format!(
                "Please use your institutional email address (@{}).",
                self.institutional_domain
            )));
        }

        Ok(())
    }
}

fn email_local_part(email: &str) -> String {
    email
        .trim()
        .split('@')
        .next()
        .unwrap_or_default()
        .to_lowercase()
}

/// An index number is a registered prefix followed by at least one
/// alphanumeric character.
pub(crate) fn validate_index_number(index_number: &str, prefixes: &[String]) -> PortalResult<()> {
    if prefixes.is_empty() {
        return Ok(());
    }

    let valid = prefixes.iter().any(|prefix| {
        index_number
            .strip_prefix(prefix.as_str())
            .map(|rest| !rest.is_empty() && rest.chars().all(|c| c.is_ascii_alphanumeric()))
            .unwrap_or(false)
    });

    if !valid {
        return Err(PortalError::Validation(format!(
            "Invalid index number. It must start with one of: {}.",
            prefixes.join(", ")
        )));
    }

    Ok(())
}
