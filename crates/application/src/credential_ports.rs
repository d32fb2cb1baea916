use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use otpdesk_core::{AppResult, PrincipalId};
use otpdesk_domain::{
    CredentialEntry, CredentialEntryId, EmailAddress, MailMessage, MailSettings, MailboxPassword,
    Principal,
};

/// Repository port for credential entries.
#[async_trait]
pub trait CredentialRepository: Send + Sync {
    /// Lists every entry ordered by display name.
    async fn list_entries(&self) -> AppResult<Vec<CredentialEntry>>;

    /// Finds an entry by id.
    async fn find_entry(&self, id: CredentialEntryId) -> AppResult<Option<CredentialEntry>>;

    /// Finds an entry by its exact display name.
    async fn find_by_display_name(&self, display_name: &str)
    -> AppResult<Option<CredentialEntry>>;

    /// Inserts or replaces an entry.
    ///
    /// A replace keeps the stored code cache when the auth mode is unchanged
    /// and clears it otherwise; only `update_last_code_if_changed` writes it.
    ///
    /// Fails with `Conflict` when another entry already uses the display name.
    async fn save_entry(&self, entry: CredentialEntry) -> AppResult<()>;

    /// Deletes an entry unless it is the last one stored.
    ///
    /// Returns `false` when the entry was kept because it is the last one.
    async fn delete_entry_unless_last(&self, id: CredentialEntryId) -> AppResult<bool>;

    /// Writes the code cache only when `code` differs from the stored one.
    ///
    /// Returns whether a write happened. Must be atomic per entry.
    async fn update_last_code_if_changed(
        &self,
        id: CredentialEntryId,
        code: &str,
        received_at: DateTime<Utc>,
    ) -> AppResult<bool>;
}

/// Repository port for principals resolved from the identity gateway.
#[async_trait]
pub trait PrincipalRepository: Send + Sync {
    /// Finds a principal by id.
    async fn find_principal(&self, id: &PrincipalId) -> AppResult<Option<Principal>>;

    /// Lists every principal ordered by email.
    async fn list_principals(&self) -> AppResult<Vec<Principal>>;

    /// Inserts or replaces a principal.
    async fn save_principal(&self, principal: Principal) -> AppResult<()>;
}

/// Port for encrypting credential material at rest.
pub trait SecretEncryptor: Send + Sync {
    /// Encrypts plaintext for database storage.
    fn encrypt(&self, plaintext: &[u8]) -> AppResult<Vec<u8>>;

    /// Decrypts stored ciphertext.
    fn decrypt(&self, ciphertext: &[u8]) -> AppResult<Vec<u8>>;
}

/// Port for the TOTP algorithm.
pub trait TotpProvider: Send + Sync {
    /// Returns the 6-digit SHA-1 code for a 30-second step at `unix_seconds`.
    fn code_at(&self, key: &[u8], unix_seconds: u64) -> AppResult<String>;
}

/// Mailbox search parameters for one provider.
#[derive(Debug, Clone)]
pub struct MailboxQuery {
    /// Sender address to search for.
    pub provider_address: EmailAddress,
    /// Mailbox to log into.
    pub mailbox_address: EmailAddress,
    /// Mailbox password.
    pub mailbox_password: MailboxPassword,
    /// Calendar day from which messages are considered.
    pub since: NaiveDate,
}

/// Port for reading provider mail.
#[async_trait]
pub trait MailboxGateway: Send + Sync {
    /// Opens a session, finds the newest message from the provider since the
    /// query date, fetches it without marking it read, and closes the session.
    ///
    /// Returns `None` when the search is empty. Failures map to
    /// `MailConnect`, `MailSearch` or `MailParse`.
    async fn fetch_latest(&self, query: &MailboxQuery) -> AppResult<Option<MailMessage>>;
}

/// Parameters of one mail check run.
#[derive(Debug, Clone)]
pub struct MailCheckRequest {
    /// Display name of the entry whose code cache is updated.
    pub provider_name: String,
    /// Provider sender address and mailbox credentials.
    pub settings: MailSettings,
}

impl MailCheckRequest {
    /// Builds a request from a stored mail-channel entry.
    #[must_use]
    pub fn for_entry(entry: &CredentialEntry) -> Option<Self> {
        entry.mail_settings().map(|settings| Self {
            provider_name: entry.display_name().as_str().to_owned(),
            settings: settings.clone(),
        })
    }
}
