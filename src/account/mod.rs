/// Account management system
///
/// Handles registration, login, sessions, password changes/resets and the
/// admin-side account operations.

mod manager;
pub mod password;
pub mod session;

pub use manager::{AccountManager, SubadminSummary};
pub use session::{Session, SessionManager};

use crate::error::{PortalError, PortalResult};
use serde::{Deserialize, Serialize};
use validator::{Validate, ValidationErrors};

/// Account roles
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Role {
    #[serde(rename = "student")]
    Student,
    #[serde(rename = "subadmin")]
    SubAdmin,
    #[serde(rename = "supa_admin")]
    SupaAdmin,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::Student => "student",
            Role::SubAdmin => "subadmin",
            Role::SupaAdmin => "supa_admin",
        }
    }

    pub fn from_str(s: &str) -> PortalResult<Self> {
        match s.trim().to_lowercase().as_str() {
            "student" => Ok(Role::Student),
            "subadmin" => Ok(Role::SubAdmin),
            "supa_admin" => Ok(Role::SupaAdmin),
            _ => Err(PortalError::Validation(format!("Invalid role: {}", s))),
        }
    }

    /// Sub-admins and super-admins
    pub fn is_staff(&self) -> bool {
        matches!(self, Role::SubAdmin | Role::SupaAdmin)
    }

    /// Dashboard a freshly logged-in user lands on
    pub fn dashboard(&self) -> &'static str {
        match self {
            Role::Student => "/student/dashboard",
            Role::SubAdmin => "/subadmin/dashboard",
            Role::SupaAdmin => "/admin/dashboard",
        }
    }
}

/// Student registration form
#[derive(Debug, Clone, Default, Deserialize, Validate)]
#[serde(default)]
pub struct RegisterForm {
    pub full_name: String,
    #[validate(email(message = "Please enter a valid email address."))]
    pub email: String,
    /// Defaults to the local part of the email
    pub username: Option<String>,
    pub index_number: String,
    pub level: String,
    pub gender: String,
    #[validate(length(min = 6, message = "Password must be at least 6 characters long."))]
    pub password: String,
    #[validate(must_match(other = "password", message = "Passwords do not match."))]
    pub confirm_password: String,
}

impl RegisterForm {
    /// Trim every field; blank optional fields become `None`
    pub fn normalized(self) -> Self {
        Self {
            full_name: self.full_name.trim().to_string(),
            email: self.email.trim().to_lowercase(),
            username: self
                .username
                .map(|u| u.trim().to_string())
                .filter(|u| !u.is_empty()),
            index_number: self.index_number.trim().to_uppercase(),
            level: self.level.trim().to_string(),
            gender: self.gender.trim().to_string(),
            password: self.password,
            confirm_password: self.confirm_password,
        }
    }
}

/// Login form
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct LoginForm {
    pub email: String,
    pub password: String,
}

/// Change password form (own account)
#[derive(Debug, Clone, Default, Deserialize, Validate)]
#[serde(default)]
pub struct ChangePasswordForm {
    pub current_password: String,
    #[validate(length(min = 6, message = "Password must be at least 6 characters long."))]
    pub new_password: String,
    #[validate(must_match(other = "new_password", message = "Passwords do not match."))]
    pub confirm_password: String,
}

/// Admin password update form (no current password)
#[derive(Debug, Clone, Default, Deserialize, Validate)]
#[serde(default)]
pub struct SetPasswordForm {
    #[validate(length(min = 6, message = "Password must be at least 6 characters long."))]
    pub password: String,
    #[validate(must_match(other = "password", message = "Passwords do not match."))]
    pub password_confirm: String,
}

/// Password reset request form
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct ForgotPasswordForm {
    pub email: String,
}

/// Password reset completion form
#[derive(Debug, Clone, Default, Deserialize, Validate)]
#[serde(default)]
pub struct ResetPasswordForm {
    pub token: String,
    #[validate(length(min = 6, message = "Password must be at least 6 characters long."))]
    pub password: String,
    #[validate(must_match(other = "password", message = "Passwords do not match."))]
    pub confirm_password: String,
}

/// Sub-admin creation form
#[derive(Debug, Clone, Default, Deserialize, Validate)]
#[serde(default)]
pub struct CreateSubadminForm {
    pub full_name: String,
    pub username: String,
    #[validate(email(message = "Please enter a valid email address."))]
    pub email: String,
    #[validate(length(min = 6, message = "Password must be at least 6 characters long."))]
    pub password: String,
    #[validate(must_match(other = "password", message = "Passwords do not match."))]
    pub confirm_password: String,
}

/// Turn the first (by field name) validator failure into a portal error
pub(crate) fn validation_error(errors: ValidationErrors) -> PortalError {
    let mut fields: Vec<_> = errors.field_errors().into_iter().collect();
    fields.sort_by(|a, b| a.0.cmp(&b.0));

    let message = fields
        .iter()
        .flat_map(|(_, errs)| errs.iter())
        .find_map(|e| e.message.as_ref().map(|m| m.to_string()))
        .unwrap_or_else(|| "Invalid form data.".to_string());

    PortalError::Validation(message)
}

/// Run derived validation
pub(crate) fn validate_form<T: Validate>(form: &T) -> PortalResult<()> {
    form.validate().map_err(validation_error)
}
