//! OTP desk mailbox polling worker.

#![forbid(unsafe_code)]

use std::env;
use std::sync::Arc;
use std::time::Duration;

use otpdesk_application::{CredentialService, MailCodeService};
use otpdesk_core::{AppError, AppResult};
use otpdesk_domain::CodeExtractor;
use otpdesk_infrastructure::{
    AesSecretEncryptor, ImapMailboxGateway, ImapSettings, PostgresCredentialRepository,
};
use sqlx::PgPool;
use sqlx::postgres::PgPoolOptions;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

#[derive(Debug, Clone)]
struct WorkerConfig {
    database_url: String,
    encryption_key: String,
    imap: ImapSettings,
    label_words: Option<Vec<String>>,
    poll_interval_seconds: u64,
}

#[tokio::main]
async fn main() -> Result<(), AppError> {
    dotenvy::dotenv().ok();
    init_tracing();

    let config = WorkerConfig::load()?;
    let pool = connect_pool(config.database_url.as_str()).await?;
    let mail_code_service = build_mail_code_service(pool, &config)?;

    info!(
        imap_host = %config.imap.host,
        imap_port = config.imap.port,
        poll_interval_seconds = config.poll_interval_seconds,
        "otpdesk-worker started"
    );

    loop {
        match mail_code_service.poll_all().await {
            Ok(summary) => {
                if summary.checked > 0 {
                    info!(
                        checked = summary.checked,
                        updated = summary.updated,
                        unchanged = summary.unchanged,
                        no_code = summary.no_code,
                        failed = summary.failed,
                        "mail poll completed"
                    );
                }
            }
            Err(error) => {
                warn!(error = %error, "failed to list mail entries");
            }
        }

        tokio::time::sleep(Duration::from_secs(config.poll_interval_seconds)).await;
    }
}

async fn connect_pool(database_url: &str) -> AppResult<PgPool> {
    PgPoolOptions::new()
        .max_connections(5)
        .connect(database_url)
        .await
        .map_err(|error| AppError::Internal(format!("failed to connect to database: {error}")))
}

fn build_mail_code_service(pool: PgPool, config: &WorkerConfig) -> AppResult<MailCodeService> {
    let encryptor = AesSecretEncryptor::from_hex(config.encryption_key.as_str())?;
    let repository = Arc::new(PostgresCredentialRepository::new(pool, Arc::new(encryptor)));
    let extractor = match &config.label_words {
        Some(words) => CodeExtractor::with_label_words(words)?,
        None => CodeExtractor::new()?,
    };

    Ok(MailCodeService::new(
        Arc::new(ImapMailboxGateway::new(config.imap.clone())?),
        repository.clone(),
        CredentialService::new(repository),
        Arc::new(extractor),
    ))
}

impl WorkerConfig {
    fn load() -> AppResult<Self> {
        let database_url = required_env("DATABASE_URL")?;
        let encryption_key = required_env("CREDENTIAL_ENCRYPTION_KEY")?;
        let poll_interval_seconds = parse_env_u64("MAIL_POLL_INTERVAL_SECONDS", 60)?;

        if poll_interval_seconds == 0 {
            return Err(AppError::Validation(
                "MAIL_POLL_INTERVAL_SECONDS must be greater than zero".to_owned(),
            ));
        }

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

        let imap = ImapSettings {
            host: env::var("MAIL_IMAP_HOST")
                .ok()
                .map(|value| value.trim().to_owned())
                .filter(|value| !value.is_empty())
                .unwrap_or(defaults.host),
            port: parse_env_u16("MAIL_IMAP_PORT", defaults.port)?,
            connect_timeout: Duration::from_secs(connect_timeout_seconds),
            command_timeout: Duration::from_secs(command_timeout_seconds),
        };

        let label_words = env::var("MAIL_LABEL_WORDS")
            .ok()
            .map(|value| split_label_words(value.as_str()))
            .filter(|words| !words.is_empty());

        Ok(Self {
            database_url,
            encryption_key,
            imap,
            label_words,
            poll_interval_seconds,
        })
    }
}

fn split_label_words(value: &str) -> Vec<String> {
    value
        .split(',')
        .map(str::trim)
        .filter(|word| !word.is_empty())
        .map(str::to_owned)
        .collect()
}

fn init_tracing() {
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_target(false)
        .compact()
        .init();
}

fn required_env(name: &str) -> AppResult<String> {
    env::var(name).map_err(|_| AppError::Validation(format!("{name} is required")))
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
