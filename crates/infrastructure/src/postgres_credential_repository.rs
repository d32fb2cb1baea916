//! PostgreSQL-backed credential entry repository.
//!
//! TOTP secrets and mailbox passwords are stored encrypted through the
//! [`SecretEncryptor`] port; every other column is plaintext.

use std::str::FromStr;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::PgPool;
use uuid::Uuid;

use otpdesk_application::{CredentialRepository, SecretEncryptor};
use otpdesk_core::{AppError, AppResult, PrincipalId};
use otpdesk_domain::{
    AuthChannel, AuthMode, CredentialEntry, CredentialEntryId, CredentialEntryInput,
    EmailAddress, MailSettings, MailboxPassword, Ownership, Secret,
};

/// PostgreSQL implementation of the credential repository port.
#[derive(Clone)]
pub struct PostgresCredentialRepository {
    pool: PgPool,
    encryptor: Arc<dyn SecretEncryptor>,
}

impl PostgresCredentialRepository {
    /// Creates a repository with the provided pool and at-rest encryptor.
    #[must_use]
    pub fn new(pool: PgPool, encryptor: Arc<dyn SecretEncryptor>) -> Self {
        Self { pool, encryptor }
    }

    fn seal(&self, plaintext: &str) -> AppResult<Vec<u8>> {
        self.encryptor.encrypt(plaintext.as_bytes())
    }

    fn open(&self, stored: Option<Vec<u8>>, column: &str) -> AppResult<String> {
        let stored = stored.ok_or_else(|| {
            AppError::Internal(format!("credential entry column '{column}' is missing"))
        })?;
        let plaintext = self.encryptor.decrypt(stored.as_slice())?;

        String::from_utf8(plaintext).map_err(|error| {
            AppError::Internal(format!("credential entry column '{column}' is not utf-8: {error}"))
        })
    }

    fn entry_from_row(&self, row: CredentialEntryRow) -> AppResult<CredentialEntry> {
        let channel = match AuthMode::from_str(row.auth_mode.as_str())? {
            AuthMode::Totp => AuthChannel::Totp {
                secret: Secret::normalize(self.open(row.secret_enc, "secret_enc")?.as_str())?,
            },
            AuthMode::Mail => AuthChannel::Mail(MailSettings {
                provider_address: EmailAddress::new(required(
                    row.provider_address,
                    "provider_address",
                )?)?,
                mailbox_address: EmailAddress::new(required(
                    row.mailbox_address,
                    "mailbox_address",
                )?)?,
                mailbox_password: MailboxPassword::new(
                    self.open(row.mailbox_password_enc, "mailbox_password_enc")?,
                )?,
            }),
        };

        let ownership = match (row.is_private, row.owner_principal_id) {
            (true, Some(owner)) => Ownership::Private(PrincipalId::new(owner)?),
            (false, _) => Ownership::Global,
            (true, None) => {
                return Err(AppError::Internal(format!(
                    "private credential entry '{}' has no owner",
                    row.id
                )));
            }
        };

        let entry = CredentialEntry::new(
            CredentialEntryId::from_uuid(row.id),
            CredentialEntryInput {
                display_name: row.display_name,
                full_name: row.full_name,
                theme_color: row.theme_color,
                logo: row.logo,
                tags: row.tags,
                channel,
            },
            ownership,
        )?;

        Ok(entry.with_code_cache(row.last_code, row.last_code_at))
    }

    async fn entry_exists(&self, id: CredentialEntryId) -> AppResult<bool> {
        sqlx::query_scalar::<_, bool>(
            "SELECT EXISTS (SELECT 1 FROM credential_entries WHERE id = $1)",
        )
        .bind(id.as_uuid())
        .fetch_one(&self.pool)
        .await
        .map_err(|error| AppError::Internal(format!("failed to check credential entry: {error}")))
    }
}

#[derive(Debug, sqlx::FromRow)]
struct CredentialEntryRow {
    id: Uuid,
    display_name: String,
    full_name: String,
    theme_color: String,
    logo: String,
    tags: Vec<String>,
    owner_principal_id: Option<String>,
    is_private: bool,
    auth_mode: String,
    secret_enc: Option<Vec<u8>>,
    provider_address: Option<String>,
    mailbox_address: Option<String>,
    mailbox_password_enc: Option<Vec<u8>>,
    last_code: Option<String>,
    last_code_at: Option<DateTime<Utc>>,
}

const SELECT_COLUMNS: &str = r#"
    SELECT id, display_name, full_name, theme_color, logo, tags,
           owner_principal_id, is_private, auth_mode, secret_enc,
           provider_address, mailbox_address, mailbox_password_enc,
           last_code, last_code_at
    FROM credential_entries
"#;

fn required(value: Option<String>, column: &str) -> AppResult<String> {
    value.ok_or_else(|| AppError::Internal(format!("credential entry column '{column}' is missing")))
}

#[async_trait]
impl CredentialRepository for PostgresCredentialRepository {
    async fn list_entries(&self) -> AppResult<Vec<CredentialEntry>> {
        let rows = sqlx::query_as::<_, CredentialEntryRow>(&format!(
            "{SELECT_COLUMNS} ORDER BY display_name"
        ))
        .fetch_all(&self.pool)
        .await
        .map_err(|error| {
            AppError::Internal(format!("failed to list credential entries: {error}"))
        })?;

        rows.into_iter()
            .map(|row| self.entry_from_row(row))
            .collect()
    }

    async fn find_entry(&self, id: CredentialEntryId) -> AppResult<Option<CredentialEntry>> {
        let row = sqlx::query_as::<_, CredentialEntryRow>(&format!(
            "{SELECT_COLUMNS} WHERE id = $1"
        ))
        .bind(id.as_uuid())
        .fetch_optional(&self.pool)
        .await
        .map_err(|error| AppError::Internal(format!("failed to find credential entry: {error}")))?;

        row.map(|row| self.entry_from_row(row)).transpose()
    }

    async fn find_by_display_name(
        &self,
        display_name: &str,
    ) -> AppResult<Option<CredentialEntry>> {
        let row = sqlx::query_as::<_, CredentialEntryRow>(&format!(
            "{SELECT_COLUMNS} WHERE display_name = $1"
        ))
        .bind(display_name)
        .fetch_optional(&self.pool)
        .await
        .map_err(|error| {
            AppError::Internal(format!(
                "failed to find credential entry by display name: {error}"
            ))
        })?;

        row.map(|row| self.entry_from_row(row)).transpose()
    }

    async fn save_entry(&self, entry: CredentialEntry) -> AppResult<()> {
        let (secret_enc, provider_address, mailbox_address, mailbox_password_enc) =
            match entry.channel() {
                AuthChannel::Totp { secret } => (Some(self.seal(secret.as_str())?), None, None, None),
                AuthChannel::Mail(settings) => (
                    None,
                    Some(settings.provider_address.as_str().to_owned()),
                    Some(settings.mailbox_address.as_str().to_owned()),
                    Some(self.seal(settings.mailbox_password.expose())?),
                ),
            };

        sqlx::query(
            r#"
            INSERT INTO credential_entries (
                id, display_name, full_name, theme_color, logo, tags,
                owner_principal_id, is_private, auth_mode, secret_enc,
                provider_address, mailbox_address, mailbox_password_enc,
                last_code, last_code_at
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15)
            ON CONFLICT (id) DO UPDATE SET
                display_name = EXCLUDED.display_name,
                full_name = EXCLUDED.full_name,
                theme_color = EXCLUDED.theme_color,
                logo = EXCLUDED.logo,
                tags = EXCLUDED.tags,
                owner_principal_id = EXCLUDED.owner_principal_id,
                is_private = EXCLUDED.is_private,
                auth_mode = EXCLUDED.auth_mode,
                secret_enc = EXCLUDED.secret_enc,
                provider_address = EXCLUDED.provider_address,
                mailbox_address = EXCLUDED.mailbox_address,
                mailbox_password_enc = EXCLUDED.mailbox_password_enc,
                last_code = CASE
                    WHEN credential_entries.auth_mode = EXCLUDED.auth_mode
                        THEN credential_entries.last_code
                    ELSE NULL
                END,
                last_code_at = CASE
                    WHEN credential_entries.auth_mode = EXCLUDED.auth_mode
                        THEN credential_entries.last_code_at
                    ELSE NULL
                END,
                updated_at = now()
            "#,
        )
        .bind(entry.id().as_uuid())
        .bind(entry.display_name().as_str())
        .bind(entry.full_name())
        .bind(entry.theme_color())
        .bind(entry.logo())
        .bind(entry.tags().iter().cloned().collect::<Vec<String>>())
        .bind(entry.owner_principal_id().map(|owner| owner.as_str().to_owned()))
        .bind(entry.is_private())
        .bind(entry.auth_mode().as_str())
        .bind(secret_enc)
        .bind(provider_address)
        .bind(mailbox_address)
        .bind(mailbox_password_enc)
        .bind(entry.last_code())
        .bind(entry.last_code_at())
        .execute(&self.pool)
        .await
        .map_err(|error| conflict_or_internal(error, entry.display_name().as_str()))?;

        Ok(())
    }

    async fn delete_entry_unless_last(&self, id: CredentialEntryId) -> AppResult<bool> {
        let mut transaction = self.pool.begin().await.map_err(|error| {
            AppError::Internal(format!("failed to begin delete transaction: {error}"))
        })?;

        // Concurrent deletes must not take the table below one entry.
        sqlx::query("LOCK TABLE credential_entries IN SHARE ROW EXCLUSIVE MODE")
            .execute(&mut *transaction)
            .await
            .map_err(|error| {
                AppError::Internal(format!("failed to lock credential entries: {error}"))
            })?;

        let total = sqlx::query_scalar::<_, i64>("SELECT COUNT(*) FROM credential_entries")
            .fetch_one(&mut *transaction)
            .await
            .map_err(|error| {
                AppError::Internal(format!("failed to count credential entries: {error}"))
            })?;

        let deleted = if total > 1 {
            sqlx::query("DELETE FROM credential_entries WHERE id = $1")
                .bind(id.as_uuid())
                .execute(&mut *transaction)
                .await
                .map_err(|error| {
                    AppError::Internal(format!("failed to delete credential entry: {error}"))
                })?
                .rows_affected()
        } else {
            0
        };

        transaction.commit().await.map_err(|error| {
            AppError::Internal(format!("failed to commit delete transaction: {error}"))
        })?;

        if deleted == 1 {
            return Ok(true);
        }

        if !self.entry_exists(id).await? {
            return Err(AppError::NotFound(format!(
                "credential entry '{id}' not found"
            )));
        }

        Ok(false)
    }

    async fn update_last_code_if_changed(
        &self,
        id: CredentialEntryId,
        code: &str,
        received_at: DateTime<Utc>,
    ) -> AppResult<bool> {
        let updated = sqlx::query(
            r#"
            UPDATE credential_entries
            SET last_code = $2, last_code_at = $3, updated_at = now()
            WHERE id = $1 AND last_code IS DISTINCT FROM $2
            "#,
        )
        .bind(id.as_uuid())
        .bind(code)
        .bind(received_at)
        .execute(&self.pool)
        .await
        .map_err(|error| AppError::Internal(format!("failed to update last code: {error}")))?
        .rows_affected();

        if updated == 1 {
            return Ok(true);
        }

        if !self.entry_exists(id).await? {
            return Err(AppError::NotFound(format!(
                "credential entry '{id}' not found"
            )));
        }

        Ok(false)
    }
}

fn conflict_or_internal(error: sqlx::Error, display_name: &str) -> AppError {
    if let sqlx::Error::Database(ref database_error) = error
        && database_error.code().as_deref() == Some("23505")
    {
        return AppError::Conflict(format!(
            "a credential entry named '{display_name}' already exists"
        ));
    }

    AppError::Internal(format!("failed to save credential entry: {error}"))
}
