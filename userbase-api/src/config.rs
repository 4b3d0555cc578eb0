/// Configuration management for the API server
///
/// This module loads configuration from environment variables and provides
/// a type-safe configuration struct.
///
/// # Environment Variables
///
/// - `API_HOST`: Host to bind to (default: 0.0.0.0)
/// - `API_PORT`: Port to bind to (default: 8080)
/// - `STORAGE_DIR`: Directory for actor databases (default: in-memory)
/// - `USERS_PATH`: Mount point of the session routes (default: /users)
/// - `ADMIN_EMAILS`: Comma-separated admin emails, case-insensitive
/// - `PLANS_FILE`: Plan list (JSON/TOML/YAML); built-in plans if unset
/// - `PRODUCTION`: `true` adds `Secure` cookies and HSTS (default: false)
/// - `AVATAR_FETCH_TIMEOUT_SECS`: Avatar download timeout (default: 10)
/// - `RUST_LOG`: Log level (default: userbase_api=debug,tower_http=debug)
///
/// # Example
///
/// ```no_run
/// use userbase_api::config::Config;
///
/// # fn example() -> anyhow::Result<()> {
/// let config = Config::from_env()?;
/// println!("Server will listen on {}", config.bind_address());
/// # Ok(())
/// # }
/// ```

use anyhow::Context;
use serde::{Deserialize, Serialize};
use std::env;
use std::path::PathBuf;
use std::time::Duration;
use userbase_shared::billing::PlanRegistry;
use userbase_shared::db::pool::StorageConfig;

/// Complete application configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// API server configuration
    pub api: ApiConfig,

    /// Actor storage configuration
    pub storage: StorageSettings,

    /// Session boundary configuration
    pub users: UsersConfig,

    /// Plan list location
    pub plans_file: Option<PathBuf>,
}

/// API server configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiConfig {
    /// Host to bind to
    pub host: String,

    /// Port to bind to
    pub port: u16,

    /// Production mode (secure cookies, HSTS)
    pub production: bool,
}

/// Actor storage configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StorageSettings {
    /// Directory holding one database per actor; `None` keeps everything in
    /// memory
    pub dir: Option<PathBuf>,
}

/// Session boundary configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UsersConfig {
    /// Mount point, e.g. `/users`
    pub path: String,

    /// Lowercased admin emails
    pub admin_emails: Vec<String>,

    /// Avatar download timeout in seconds
    pub avatar_fetch_timeout_secs: u64,
}

impl Config {
    /// Loads configuration from environment variables
    ///
    /// # Errors
    ///
    /// Returns an error if an environment variable has an invalid value
    pub fn from_env() -> anyhow::Result<Self> {
        // Load .env file if present (for development)
        dotenvy::dotenv().ok();

        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Builds the configuration from any variable source
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> anyhow::Result<Self> {
        let api_host = lookup("API_HOST").unwrap_or_else(|| "0.0.0.0".to_string());
        let api_port = lookup("API_PORT")
            .unwrap_or_else(|| "8080".to_string())
            .parse::<u16>()
            .context("API_PORT must be a port number")?;

        let production = lookup("PRODUCTION")
            .map(|v| matches!(v.to_lowercase().as_str(), "1" | "true" | "yes"))
            .unwrap_or(false);

        let storage_dir = lookup("STORAGE_DIR")
            .filter(|v| !v.is_empty())
            .map(PathBuf::from);

        let users_path = normalize_mount_path(
            &lookup("USERS_PATH").unwrap_or_else(|| "/users".to_string()),
        )?;

        let admin_emails = lookup("ADMIN_EMAILS")
            .map(|v| parse_email_list(&v))
            .unwrap_or_default();

        let avatar_fetch_timeout_secs = lookup("AVATAR_FETCH_TIMEOUT_SECS")
            .unwrap_or_else(|| "10".to_string())
            .parse::<u64>()
            .context("AVATAR_FETCH_TIMEOUT_SECS must be a number of seconds")?;

        let plans_file = lookup("PLANS_FILE")
            .filter(|v| !v.is_empty())
            .map(PathBuf::from);

        Ok(Self {
            api: ApiConfig {
                host: api_host,
                port: api_port,
                production,
            },
            storage: StorageSettings { dir: storage_dir },
            users: UsersConfig {
                path: users_path,
                admin_emails,
                avatar_fetch_timeout_secs,
            },
            plans_file,
        })
    }

    /// Returns the server bind address
    pub fn bind_address(&self) -> String {
        format!("{}:{}", self.api.host, self.api.port)
    }

    /// Storage location for actor databases
    pub fn storage_config(&self) -> StorageConfig {
        match &self.storage.dir {
            Some(dir) => StorageConfig::directory(dir.clone()),
            None => StorageConfig::in_memory(),
        }
    }

    /// Loads the plan registry, falling back to the built-in plans
    ///
    /// # Errors
    ///
    /// Returns an error if `PLANS_FILE` is set but cannot be read
    pub fn plan_registry(&self) -> anyhow::Result<PlanRegistry> {
        match &self.plans_file {
            Some(path) => PlanRegistry::from_file(path)
                .with_context(|| format!("Failed to load plans from {}", path.display())),
            None => Ok(PlanRegistry::builtin()),
        }
    }

    /// Whether `email` belongs to an administrator
    pub fn is_admin_email(&self, email: &str) -> bool {
        let email = email.trim().to_lowercase();
        !email.is_empty() && self.users.admin_emails.iter().any(|admin| *admin == email)
    }

    pub fn avatar_fetch_timeout(&self) -> Duration {
        Duration::from_secs(self.users.avatar_fetch_timeout_secs)
    }
}

fn parse_email_list(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(|e| e.trim().to_lowercase())
        .filter(|e| !e.is_empty())
        .collect()
}

/// `users/` and `/users/` both become `/users`
fn normalize_mount_path(raw: &str) -> anyhow::Result<String> {
    let trimmed = raw.trim().trim_matches('/');
    if trimmed.is_empty() {
        anyhow::bail!("USERS_PATH must not be the root path");
    }

    Ok(format!("/{}", trimmed))
}
