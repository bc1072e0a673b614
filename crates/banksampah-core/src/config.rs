use std::{
    env,
    path::{Path, PathBuf},
};

use anyhow::{Context, Result};
use config as cfg;
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::security::generate_secret;

pub const ENV_PREFIX: &str = "BANKSAMPAH";
pub const CONFIG_DIR_VAR: &str = "BANKSAMPAH_CONFIG_DIR";
const MIN_SECRET_LEN: usize = 32;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".into(),
            port: 3000,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct StorageConfig {
    /// JSON snapshot of the whole store. In-memory only when unset.
    #[serde(default)]
    pub snapshot_path: Option<PathBuf>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuthConfig {
    #[serde(default, skip_serializing)]
    pub jwt_secret: Option<SecretString>,
    #[serde(default = "AuthConfig::default_access_minutes")]
    pub access_token_minutes: i64,
    #[serde(default = "AuthConfig::default_refresh_days")]
    pub refresh_token_days: i64,
}

impl AuthConfig {
    fn default_access_minutes() -> i64 {
        15
    }

    fn default_refresh_days() -> i64 {
        7
    }
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self {
            jwt_secret: None,
            access_token_minutes: Self::default_access_minutes(),
            refresh_token_days: Self::default_refresh_days(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SecurityConfig {
    /// Empty means any origin.
    #[serde(default)]
    pub allowed_origins: Vec<String>,
    #[serde(default = "SecurityConfig::default_login_attempts")]
    pub login_attempts_per_minute: u32,
}

impl SecurityConfig {
    fn default_login_attempts() -> u32 {
        10
    }
}

impl Default for SecurityConfig {
    fn default() -> Self {
        Self {
            allowed_origins: Vec::new(),
            login_attempts_per_minute: Self::default_login_attempts(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MailConfig {
    #[serde(default)]
    pub enabled: bool,
    /// HTTP endpoint of the mail relay that accepts `{from, to, subject, text}`.
    #[serde(default)]
    pub relay_url: Option<String>,
    #[serde(default)]
    pub sender: Option<String>,
    #[serde(default, skip_serializing)]
    pub api_key: Option<SecretString>,
    /// Upper bound on one relay request.
    #[serde(default = "MailConfig::default_timeout_secs")]
    pub timeout_secs: u64,
}

impl MailConfig {
    fn default_timeout_secs() -> u64 {
        10
    }
}

impl Default for MailConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            relay_url: None,
            sender: None,
            api_key: None,
            timeout_secs: Self::default_timeout_secs(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    #[serde(default = "LoggingConfig::default_level")]
    pub level: String,
}

impl LoggingConfig {
    fn default_level() -> String {
        "banksampah_api=info,banksampah_core=info,tower_http=info".to_string()
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: Self::default_level(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Settings {
    #[serde(default = "Settings::default_env")]
    pub env: String,
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub storage: StorageConfig,
    #[serde(default)]
    pub auth: AuthConfig,
    #[serde(default)]
    pub security: SecurityConfig,
    #[serde(default)]
    pub mail: MailConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            env: Self::default_env(),
            server: ServerConfig::default(),
            storage: StorageConfig::default(),
            auth: AuthConfig::default(),
            security: SecurityConfig::default(),
            mail: MailConfig::default(),
            logging: LoggingConfig::default(),
        }
    }
}

impl Settings {
    fn default_env() -> String {
        env::var("APP_ENV")
            .ok()
            .or_else(|| env::var("RUST_ENV").ok())
            .unwrap_or_else(|| "development".to_string())
    }

    pub fn is_production(&self) -> bool {
        self.env.eq_ignore_ascii_case("production")
    }

    pub fn validate(&self) -> Result<()> {
        anyhow::ensure!(
            !self.server.host.trim().is_empty(),
            "server.host cannot be empty"
        );
        anyhow::ensure!(self.server.port > 0, "server.port must be > 0");
        anyhow::ensure!(
            self.auth.access_token_minutes > 0,
            "auth.access_token_minutes must be > 0"
        );
        anyhow::ensure!(
            self.auth.refresh_token_days > 0,
            "auth.refresh_token_days must be > 0"
        );
        anyhow::ensure!(
            self.auth.access_token_minutes
                <= self.auth.refresh_token_days.saturating_mul(24 * 60),
            "auth.access_token_minutes must not exceed the refresh token lifetime"
        );
        anyhow::ensure!(
            self.security.login_attempts_per_minute > 0,
            "security.login_attempts_per_minute must be > 0"
        );

        match &self.auth.jwt_secret {
            Some(secret) => anyhow::ensure!(
                secret.expose_secret().len() >= MIN_SECRET_LEN,
                "auth.jwt_secret must be at least {MIN_SECRET_LEN} characters"
            ),
            None => anyhow::ensure!(
                !self.is_production(),
                "auth.jwt_secret is required in production"
            ),
        }

        if self.mail.enabled {
            anyhow::ensure!(self.mail.timeout_secs > 0, "mail.timeout_secs must be > 0");
            anyhow::ensure!(
                self.mail.relay_url.as_deref().is_some_and(|u| !u.trim().is_empty()),
                "mail.relay_url is required when mail is enabled"
            );
            anyhow::ensure!(
                self.mail.sender.as_deref().is_some_and(|s| !s.trim().is_empty()),
                "mail.sender is required when mail is enabled"
            );
        }

        Ok(())
    }

    /// The configured signing secret, or a per-process random one outside
    /// production. Tokens signed with a generated secret die with the process.
    pub fn jwt_secret(&self) -> Result<SecretString> {
        match &self.auth.jwt_secret {
            Some(secret) => Ok(secret.clone()),
            None if self.is_production() => {
                anyhow::bail!("auth.jwt_secret is required in production")
            }
            None => {
                warn!("auth.jwt_secret not set, generating an ephemeral secret");
                Ok(SecretString::from(generate_secret()))
            }
        }
    }

    pub fn bind_address(&self) -> String {
        format!("{}:{}", self.server.host, self.server.port)
    }
}

#[derive(Debug)]
pub struct ConfigManager {
    settings: Settings,
    config_dir: PathBuf,
    env: String,
}

impl ConfigManager {
    pub fn new() -> Result<Self> {
        Self::from_dir(Self::default_config_dir(), None)
    }

    pub fn from_dir(config_dir: impl Into<PathBuf>, env_override: Option<String>) -> Result<Self> {
        let config_dir = config_dir.into();
        let env_name = env_override.unwrap_or_else(Settings::default_env);
        let mut settings = Self::load_from_sources(&config_dir, &env_name)?;
        settings.env = env_name.clone();
        settings.validate()?;

        Ok(Self {
            settings,
            config_dir,
            env: env_name,
        })
    }

    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    pub fn config_dir(&self) -> &Path {
        &self.config_dir
    }

    pub fn env(&self) -> &str {
        &self.env
    }

    /// `$BANKSAMPAH_CONFIG_DIR`, then `./config`, then the working directory.
    pub fn default_config_dir() -> PathBuf {
        if let Ok(dir) = env::var(CONFIG_DIR_VAR) {
            info!("Using config directory: {:?}", dir);
            return PathBuf::from(dir);
        }

        let cwd = env::current_dir().unwrap_or_else(|_| PathBuf::from("."));
        let project_config = cwd.join("config");
        if project_config.exists() {
            info!("Using config directory: {:?}", project_config);
            return project_config;
        }

        info!("Using config directory: {:?}", cwd);
        cwd
    }

    pub fn load_from_sources(config_dir: &Path, env_name: &str) -> Result<Settings> {
        let port_override = env::var("PORT").ok().and_then(|p| p.parse::<i64>().ok());

        let settings: Settings = cfg::Config::builder()
            .add_source(cfg::File::from(config_dir.join("default.toml")).required(false))
            .add_source(
                cfg::File::from(config_dir.join(format!("{env_name}.toml"))).required(false),
            )
            .add_source(cfg::File::from(config_dir.join("local.toml")).required(false))
            .add_source(
                cfg::Environment::with_prefix(ENV_PREFIX)
                    .prefix_separator("__")
                    .separator("__"),
            )
            .set_override_option("server.port", port_override)
            .context("applying PORT override")?
            .build()
            .context("building configuration")?
            .try_deserialize()
            .context("deserializing configuration")?;
        Ok(settings)
    }
}
