use anyhow::Context;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use tracing::debug;

const DEFAULT_CONFIG_FILES: &[&str] = &[
    "feza.toml",
    "config/feza.toml",
    "crates/config/feza.toml",
    "../feza.toml",
    "../config/feza.toml",
];

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct AppConfig {
    pub http: HttpConfig,
    pub database: DatabaseConfig,
    pub auth: AuthConfig,
    pub assistant: AssistantConfig,
    pub mail: MailConfig,
    pub documents: DocumentsConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct HttpConfig {
    pub address: String,
    pub port: u16,
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            address: "127.0.0.1".to_string(),
            port: 8080,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DatabaseConfig {
    pub url: String,
    pub max_connections: u32,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            url: "sqlite://feza.db".to_string(),
            max_connections: 10,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuthConfig {
    #[serde(default = "AuthConfig::default_session_ttl")]
    pub session_ttl_seconds: u64,
    #[serde(default)]
    pub lockout: LockoutConfig,
    #[serde(default)]
    pub otp: OtpConfig,
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self {
            session_ttl_seconds: Self::default_session_ttl(),
            lockout: LockoutConfig::default(),
            otp: OtpConfig::default(),
        }
    }
}

impl AuthConfig {
    fn default_session_ttl() -> u64 {
        86_400
    }
}

/// Failed-login lockout policy.
///
/// ```
/// use feza_config::LockoutConfig;
///
/// let lockout = LockoutConfig::default();
/// assert_eq!(lockout.max_attempts, 3);
/// assert_eq!(lockout.duration_seconds, 86_400);
/// ```
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LockoutConfig {
    pub max_attempts: u32,
    pub duration_seconds: u64,
}

impl Default for LockoutConfig {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            duration_seconds: 86_400,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct OtpConfig {
    pub enabled: bool,
    pub ttl_seconds: u64,
    pub digits: u32,
}

impl Default for OtpConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            ttl_seconds: 600,
            digits: 6,
        }
    }
}

/// Settings for the local model server used by the assistant.
///
/// ```
/// use feza_config::AssistantConfig;
///
/// let assistant = AssistantConfig::default();
/// assert_eq!(assistant.base_url, "http://127.0.0.1:11434");
/// assert_eq!(assistant.max_attempts, 3);
/// ```
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AssistantConfig {
    pub base_url: String,
    pub model: String,
    pub max_attempts: u32,
    pub retry_delay_ms: u64,
    pub request_timeout_seconds: u64,
    pub num_predict: u32,
    pub temperature: f32,
    pub top_p: f32,
    pub top_k: u32,
    pub max_rows: u32,
}

impl Default for AssistantConfig {
    fn default() -> Self {
        Self {
            base_url: "http://127.0.0.1:11434".to_string(),
            model: "llama3".to_string(),
            max_attempts: 3,
            retry_delay_ms: 2_000,
            request_timeout_seconds: 60,
            num_predict: 512,
            temperature: 0.1,
            top_p: 0.9,
            top_k: 40,
            max_rows: 200,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct MailConfig {
    pub from_address: String,
    pub from_name: String,
    pub outbox_dir: Option<String>,
}

impl Default for MailConfig {
    fn default() -> Self {
        Self {
            from_address: "no-reply@fezalogistics.com".to_string(),
            from_name: "Feza Logistics".to_string(),
            outbox_dir: None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DocumentsConfig {
    pub verification_base_url: String,
}

impl Default for DocumentsConfig {
    fn default() -> Self {
        Self {
            verification_base_url: "http://127.0.0.1:8080/api/documents/verify".to_string(),
        }
    }
}

/// Load the application configuration by combining defaults, files, and environment overrides.
///
/// ```
/// use feza_config::load;
///
/// std::env::remove_var("FEZA_CONFIG");
///
/// let config = load().expect("configuration should load with defaults");
/// assert!(!config.http.address.is_empty());
/// ```
pub fn load() -> anyhow::Result<AppConfig> {
    let defaults = AppConfig::default();

    let mut builder = config::Config::builder()
        .set_default("http.address", defaults.http.address.clone())
        .context("invalid default for http.address")?
        .set_default("http.port", i64::from(defaults.http.port))
        .context("invalid default for http.port")?
        .set_default("database.url", defaults.database.url.clone())
        .context("invalid default for database.url")?
        .set_default(
            "database.max_connections",
            i64::from(defaults.database.max_connections),
        )
        .context("invalid default for database.max_connections")?;

    let environment_overrides = config::Environment::with_prefix("FEZA").separator("__");

    let mut config_file_attached = false;

    if let Ok(path) = std::env::var("FEZA_CONFIG") {
        builder = builder.add_source(config::File::from(PathBuf::from(&path)));
        config_file_attached = true;
        debug!(path, "loading configuration via FEZA_CONFIG");
    } else if let Ok(cwd) = std::env::current_dir() {
        let fallback = DEFAULT_CONFIG_FILES
            .iter()
            .map(|candidate| cwd.join(candidate))
            .find(|path| path.exists());

        if let Some(path) = fallback {
            debug!(path = %path.display(), "loading configuration file");
            builder = builder.add_source(config::File::from(path));
            config_file_attached = true;
        }
    }

    if !config_file_attached {
        debug!("no configuration file found, relying on defaults and environment overrides");
    }

    builder = builder.add_source(environment_overrides);

    let cfg = builder.build().context("unable to build configuration")?;

    let mut config = cfg
        .try_deserialize::<AppConfig>()
        .context("invalid configuration")?;

    normalise(&mut config);

    debug!(?config, "loaded backend configuration");
    Ok(config)
}

fn normalise(config: &mut AppConfig) {
    if config.auth.session_ttl_seconds > i64::MAX as u64 {
        config.auth.session_ttl_seconds = i64::MAX as u64;
    }
    if config.auth.lockout.duration_seconds > i64::MAX as u64 {
        config.auth.lockout.duration_seconds = i64::MAX as u64;
    }
    config.auth.lockout.max_attempts = config.auth.lockout.max_attempts.max(1);
    config.auth.otp.digits = config.auth.otp.digits.clamp(4, 10);
    config.assistant.max_attempts = config.assistant.max_attempts.max(1);
}
