/// Application context and dependency injection
use crate::{
    account::{AccountManager, SessionManager},
    admin::{AuditLog, CategoryManager, NotificationManager, PrefixManager, SettingsManager},
    analytics::AnalyticsManager,
    config::PortalConfig,
    db,
    error::PortalResult,
    issues::IssueManager,
    store::{IssueStore, SqliteStore, UserStore},
};
use axum::extract::FromRef;
use axum_extra::extract::cookie::Key;
use sqlx::SqlitePool;
use std::sync::Arc;

/// Application context holding all shared services
#[derive(Clone)]
pub struct AppContext {
    pub config: Arc<PortalConfig>,
    pub db: SqlitePool,
    pub users: Arc<dyn UserStore>,
    pub issues: Arc<dyn IssueStore>,
    pub account_manager: Arc<AccountManager>,
    pub session_manager: SessionManager,
    pub issue_manager: Arc<IssueManager>,
    // Admin console
    pub category_manager: Arc<CategoryManager>,
    pub prefix_manager: Arc<PrefixManager>,
    pub settings_manager: Arc<SettingsManager>,
    pub notification_manager: Arc<NotificationManager>,
    pub audit_log: Arc<AuditLog>,
    pub analytics: Arc<AnalyticsManager>,
    // Signs the session cookie
    pub cookie_key: Key,
}

impl AppContext {
    /// Create a new application context from configuration
    pub async fn new(config: PortalConfig) -> PortalResult<Self> {
        config.validate()?;

        if !config.storage.data_directory.exists() {
            tokio::fs::create_dir_all(&config.storage.data_directory).await?;
        }

        let pool = db::create_pool(&config.storage.database, db::DatabaseOptions::default()).await?;
        db::ensure_schema(&pool).await?;
        db::test_connection(&pool).await?;

        let ctx = Self::with_pool(config, pool);
        ctx.bootstrap_admin().await?;

        Ok(ctx)
    }

    /// Wire every service over an existing pool. The schema must already exist.
    pub fn with_pool(config: PortalConfig, pool: SqlitePool) -> Self {
        let store = Arc::new(SqliteStore::new(pool.clone()));
        let users: Arc<dyn UserStore> = store.clone();
        let issues: Arc<dyn IssueStore> = store;

        let session_manager = SessionManager::new(pool.clone(), config.authentication.session_ttl_hours);
        let account_manager = Arc::new(AccountManager::new(
            users.clone(),
            issues.clone(),
            session_manager.clone(),
            &config.authentication.institutional_domain,
        ));
        let issue_manager = Arc::new(IssueManager::new(users.clone(), issues.clone()));

        let cookie_key = Key::derive_from(config.authentication.session_secret.as_bytes());

        Self {
            config: Arc::new(config),
            db: pool.clone(),
            users,
            issues,
            account_manager,
            session_manager,
            issue_manager,
            category_manager: Arc::new(CategoryManager::new(pool.clone())),
            prefix_manager: Arc::new(PrefixManager::new(pool.clone())),
            settings_manager: Arc::new(SettingsManager::new(pool.clone())),
            notification_manager: Arc::new(NotificationManager::new(pool.clone())),
            audit_log: Arc::new(AuditLog::new(pool.clone())),
            analytics: Arc::new(AnalyticsManager::new(pool)),
            cookie_key,
        }
    }

    /// Create the configured super-admin when a password is set and the
    /// account does not exist yet
    async fn bootstrap_admin(&self) -> PortalResult<()> {
        let bootstrap = &self.config.bootstrap;
        let Some(password) = bootstrap.admin_password.as_deref() else {
            tracing::debug!("no bootstrap admin password configured");
            return Ok(());
        };

        if self
            .account_manager
            .ensure_super_admin(&bootstrap.admin_email, password)
            .await?
        {
            tracing::info!(email = %bootstrap.admin_email, "bootstrap super-admin ready");
        }

        Ok(())
    }

    /// Base URL the portal is reachable on
    pub fn service_url(&self) -> String {
        format!("http://{}", self.config.bind_address())
    }
}

impl FromRef<AppContext> for Key {
    fn from_ref(ctx: &AppContext) -> Self {
        ctx.cookie_key.clone()
    }
}
