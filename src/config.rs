/// Configuration management for the Campus Report portal
use crate::error::{PortalError, PortalResult};
use serde::{Deserialize, Serialize};
use std::env;
use std::path::PathBuf;

/// Main server configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PortalConfig {
    pub service: ServiceConfig,
    pub storage: StorageConfig,
    pub authentication: AuthConfig,
    pub bootstrap: BootstrapConfig,
    pub logging: LoggingConfig,
}

/// Service-level configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServiceConfig {
    pub hostname: String,
    pub port: u16,
}

/// Storage configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StorageConfig {
    pub data_directory: PathBuf,
    pub database: PathBuf,
}

/// Authentication configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuthConfig {
    /// Secret the cookie-signing key is derived from
    pub session_secret: String,
    pub session_ttl_hours: i64,
    /// Mark cookies `Secure` (only behind TLS)
    pub secure_cookies: bool,
    /// Registrations must use `@<domain>` addresses. Empty disables the check.
    pub institutional_domain: String,
}

/// Initial super-admin account
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BootstrapConfig {
    /// Also the admin notification address
    pub admin_email: String,
    /// The bootstrap account is only created when a password is configured
    #[serde(skip_serializing)]
    pub admin_password: Option<String>,
}

/// Logging configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    pub level: String,
    pub json: bool,
}

impl PortalConfig {
    /// Load configuration from environment variables
    pub fn from_env() -> PortalResult<Self> {
        dotenv::dotenv().ok();

        let hostname = env::var("PORTAL_HOSTNAME").unwrap_or_else(|_| "0.0.0.0".to_string());
        let port = env::var("PORTAL_PORT")
            .unwrap_or_else(|_| "5000".to_string())
            .parse()
            .map_err(|_| PortalError::Validation("Invalid port number".to_string()))?;

        let data_directory: PathBuf = env::var("PORTAL_DATA_DIRECTORY")
            .unwrap_or_else(|_| "./data".to_string())
            .into();
        let database = env::var("PORTAL_DATABASE_LOCATION")
            .map(PathBuf::from)
            .unwrap_or_else(|_| data_directory.join("university_issues.sqlite"));

        let session_secret = env::var("SESSION_SECRET")
            .map_err(|_| PortalError::Validation("SESSION_SECRET required".to_string()))?;
        let session_ttl_hours = env::var("PORTAL_SESSION_TTL_HOURS")
            .unwrap_or_else(|_| "24".to_string())
            .parse()
            .unwrap_or(24);
        let secure_cookies = env::var("PORTAL_SECURE_COOKIES")
            .unwrap_or_else(|_| "false".to_string())
            .parse()
            .unwrap_or(false);
        let institutional_domain = env::var("PORTAL_EMAIL_DOMAIN")
            .unwrap_or_else(|_| "ktu.edu.gh".to_string())
            .trim()
            .trim_start_matches('@')
            .to_lowercase();

        let admin_email = env::var("PORTAL_ADMIN_EMAIL")
            .unwrap_or_else(|_| "admin@ktu.edu.gh".to_string())
            .trim()
            .to_lowercase();
        let admin_password = env::var("PORTAL_ADMIN_PASSWORD")
            .ok()
            .filter(|p| !p.is_empty());

        let level = env::var("RUST_LOG")
            .unwrap_or_else(|_| "campus_report=debug,tower_http=info".to_string());
        let json = env::var("PORTAL_LOG_FORMAT")
            .map(|f| f.eq_ignore_ascii_case("json"))
            .unwrap_or(false);

        Ok(PortalConfig {
            service: ServiceConfig { hostname, port },
            storage: StorageConfig {
                data_directory,
                database,
            },
            authentication: AuthConfig {
                session_secret,
                session_ttl_hours,
                secure_cookies,
                institutional_domain,
            },
            bootstrap: BootstrapConfig {
                admin_email,
                admin_password,
            },
            logging: LoggingConfig { level, json },
        })
    }

    /// Validate configuration
    pub fn validate(&self) -> PortalResult<()> {
        if self.service.hostname.is_empty() {
            return Err(PortalError::Validation("Hostname cannot be empty".to_string()));
        }

        if self.authentication.session_secret.len() < 32 {
            return Err(PortalError::Validation(
                "SESSION_SECRET must be at least 32 characters".to_string(),
            ));
        }

        if self.authentication.session_ttl_hours <= 0 {
            return Err(PortalError::Validation(
                "Session TTL must be positive".to_string(),
            ));
        }

        if self.logging.level.trim().is_empty() {
            return Err(PortalError::Validation(
                "Log filter cannot be empty".to_string(),
            ));
        }

        Ok(())
    }

    /// Address the server binds to
    pub fn bind_address(&self) -> String {
        format!("{}:{}", self.service.hostname, self.service.port)
    }
}
