use std::env;
use std::net::{IpAddr, SocketAddr};
use std::str::FromStr;
use std::time::Duration;

use otpdesk_core::{AppError, AppResult};
use otpdesk_infrastructure::ImapSettings;
use tracing_subscriber::EnvFilter;

/// Credential store backend.
#[derive(Debug, Clone)]
pub enum StoreConfig {
    Memory,
    Postgres {
        database_url: String,
        encryption_key: String,
    },
}

/// Operator ensured as administrator at startup.
#[derive(Debug, Clone)]
pub struct BootstrapAdminConfig {
    pub principal_id: String,
    pub email: String,
}

#[derive(Debug, Clone)]
pub struct ApiConfig {
    pub migrate_only: bool,
    pub store: StoreConfig,
    pub frontend_url: String,
    pub api_host: String,
    pub api_port: u16,
    pub gateway_shared_secret: String,
    pub imap: ImapSettings,
    pub label_words: Option<Vec<String>>,
    pub bootstrap_admin: Option<BootstrapAdminConfig>,
}

impl ApiConfig {
    pub fn load() -> AppResult<Self> {
        let migrate_only = env::args().nth(1).as_deref() == Some("migrate");

        let store = match env::var("STORE_PROVIDER")
            .unwrap_or_else(|_| "memory".to_owned())
            .as_str()
        {
            "memory" => StoreConfig::Memory,
            "postgres" => StoreConfig::Postgres {
                database_url: required_non_empty_env("DATABASE_URL")?,
                encryption_key: required_non_empty_env("CREDENTIAL_ENCRYPTION_KEY")?,
            },
            other => {
                return Err(AppError::Validation(format!(
                    "STORE_PROVIDER must be either 'memory' or 'postgres', got '{other}'"
                )));
            }
        };

        if migrate_only && matches!(store, StoreConfig::Memory) {
            return Err(AppError::Validation(
                "the migrate command requires STORE_PROVIDER=postgres".to_owned(),
            ));
        }

        let frontend_url =
            env::var("FRONTEND_URL").unwrap_or_else(|_| "http://localhost:3000".to_owned());
        let api_host = env::var("API_HOST").unwrap_or_else(|_| "127.0.0.1".to_owned());
        let api_port = parse_env_u16("API_PORT", 3001)?;

        let gateway_shared_secret = required_non_empty_env("GATEWAY_SHARED_SECRET")?;
        if gateway_shared_secret.len() < 32 {
            return Err(AppError::Validation(
                "GATEWAY_SHARED_SECRET must be at least 32 characters".to_owned(),
            ));
        }

        let bootstrap_admin = match (
            optional_env("BOOTSTRAP_ADMIN_ID"),
            optional_env("BOOTSTRAP_ADMIN_EMAIL"),
        ) {
            (Some(principal_id), Some(email)) => Some(BootstrapAdminConfig {
                principal_id,
                email,
            }),
            (None, None) => None,
            _ => {
                return Err(AppError::Validation(
                    "BOOTSTRAP_ADMIN_ID and BOOTSTRAP_ADMIN_EMAIL must be set together".to_owned(),
                ));
            }
        };

        Ok(Self {
            migrate_only,
            store,
            frontend_url,
            api_host,
            api_port,
            gateway_shared_secret,
            imap: load_imap_settings()?,
            label_words: load_label_words(),
            bootstrap_admin,
        })
    }

    pub fn socket_address(&self) -> AppResult<SocketAddr> {
        let host = IpAddr::from_str(&self.api_host).map_err(|error| {
            AppError::Internal(format!("invalid API_HOST '{}': {error}", self.api_host))
        })?;
        Ok(SocketAddr::from((host, self.api_port)))
    }
}

pub fn init_tracing() {
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_target(false)
        .compact()
        .init();
}

fn load_imap_settings() -> AppResult<ImapSettings> {
    let defaults = ImapSettings::default();
    let connect_timeout_seconds = parse_env_u64(
        "MAIL_CONNECT_TIMEOUT_SECONDS",
        defaults.connect_timeout.as_secs(),
    )?;
    let command_timeout_seconds = parse_env_u64(
        "MAIL_COMMAND_TIMEOUT_SECONDS",
        defaults.command_timeout.as_secs(),
    )?;

    if connect_timeout_seconds == 0 || command_timeout_seconds == 0 {
        return Err(AppError::Validation(
            "mail timeouts must be greater than zero".to_owned(),
        ));
    }

    Ok(ImapSettings {
        host: optional_env("MAIL_IMAP_HOST").unwrap_or(defaults.host),
        port: parse_env_u16("MAIL_IMAP_PORT", defaults.port)?,
        connect_timeout: Duration::from_secs(connect_timeout_seconds),
        command_timeout: Duration::from_secs(command_timeout_seconds),
    })
}

fn load_label_words() -> Option<Vec<String>> {
    optional_env("MAIL_LABEL_WORDS").map(|value| split_label_words(value.as_str()))
}

fn split_label_words(value: &str) -> Vec<String> {
    value
        .split(',')
        .map(str::trim)
        .filter(|word| !word.is_empty())
        .map(str::to_owned)
        .collect()
}

fn required_env(name: &str) -> AppResult<String> {
    env::var(name).map_err(|_| AppError::Validation(format!("{name} is required")))
}

fn required_non_empty_env(name: &str) -> AppResult<String> {
    let value = required_env(name)?;
    if value.trim().is_empty() {
        return Err(AppError::Validation(format!("{name} must not be empty")));
    }

    Ok(value)
}

fn optional_env(name: &str) -> Option<String> {
    env::var(name)
        .ok()
        .map(|value| value.trim().to_owned())
        .filter(|value| !value.is_empty())
}

fn parse_env_u16(name: &str, default: u16) -> AppResult<u16> {
    match env::var(name) {
        Ok(value) => value.parse::<u16>().map_err(|error| {
            AppError::Validation(format!("invalid {name} value '{value}': {error}"))
        }),
        Err(_) => Ok(default),
    }
}

fn parse_env_u64(name: &str, default: u64) -> AppResult<u64> {
    match env::var(name) {
        Ok(value) => value.parse::<u64>().map_err(|error| {
            AppError::Validation(format!("invalid {name} value '{value}': {error}"))
        }),
        Err(_) => Ok(default),
    }
}

#[cfg(test)]
mod tests {
    use super::split_label_words;

    #[test]
    fn label_words_are_trimmed_and_blank_ones_dropped() {
        assert_eq!(
            split_label_words(" login , code,, pin "),
            vec!["login".to_owned(), "code".to_owned(), "pin".to_owned()]
        );
    }
}
