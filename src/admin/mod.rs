/// Admin management utilities
///
/// Handles the super-admin console: issue categories, index-number
/// prefixes, system settings, notifications and the audit log.

pub mod audit;
pub mod categories;
pub mod notifications;
pub mod prefixes;
pub mod settings;

pub use audit::{AuditEvent, AuditLog, AuditLogEntry, AuditLogPage, LOG_PAGE_SIZE};
pub use categories::{Category, CategoryForm, CategoryManager, CategoryRemoval};
pub use notifications::{NotificationForm, NotificationKind, NotificationManager, SystemNotification};
pub use prefixes::{IndexPrefix, PrefixForm, PrefixManager};
pub use settings::{NewSettingForm, SettingsManager, SystemSetting, UpdateSettingForm};
