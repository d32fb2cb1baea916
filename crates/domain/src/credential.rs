//! Provider credential entries shown on the dashboard.

use std::str::FromStr;

use chrono::{DateTime, Utc};
use otpdesk_core::{AppError, AppResult, NonEmptyString, PrincipalId};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::email::EmailAddress;
use crate::secret::Secret;
use crate::tags::{TagSet, normalize_tags};

/// Tag that makes an entry visible to every principal.
pub const GLOBAL_BROADCAST_TAG: &str = "Único";

/// Tag forced onto every principal-owned private entry.
pub const PRIVATE_ENTRY_TAG: &str = "Individual";

/// Default theme color used when none is supplied.
pub const DEFAULT_THEME_COLOR: &str = "#4b5563";

/// Stable credential entry identifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CredentialEntryId(Uuid);

impl CredentialEntryId {
    /// Generates a fresh random identifier.
    #[must_use]
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    /// Wraps an existing UUID.
    #[must_use]
    pub fn from_uuid(value: Uuid) -> Self {
        Self(value)
    }

    /// Returns the inner UUID.
    #[must_use]
    pub fn as_uuid(&self) -> Uuid {
        self.0
    }
}

impl Default for CredentialEntryId {
    fn default() -> Self {
        Self::new()
    }
}

impl FromStr for CredentialEntryId {
    type Err = AppError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        Uuid::parse_str(value.trim())
            .map(Self)
            .map_err(|error| AppError::Validation(format!("invalid entry id '{value}': {error}")))
    }
}

impl std::fmt::Display for CredentialEntryId {
    fn fmt(&self, formatter: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        self.0.fmt(formatter)
    }
}

/// Channel through which an entry's codes are obtained.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AuthMode {
    /// Codes are generated locally from a shared secret.
    Totp,
    /// Codes are scraped from provider mail.
    Mail,
}

impl AuthMode {
    /// Returns a stable storage value.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Totp => "totp",
            Self::Mail => "mail",
        }
    }
}

impl FromStr for AuthMode {
    type Err = AppError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value {
            "totp" => Ok(Self::Totp),
            "mail" | "email" => Ok(Self::Mail),
            _ => Err(AppError::Validation(format!("unknown auth mode '{value}'"))),
        }
    }
}

/// Password of a monitored mailbox.
#[derive(Clone, PartialEq, Eq)]
pub struct MailboxPassword(String);

impl MailboxPassword {
    /// Wraps a non-empty password. The value is kept verbatim.
    pub fn new(value: impl Into<String>) -> AppResult<Self> {
        let value = value.into();
        if value.trim().is_empty() {
            return Err(AppError::Validation(
                "mailbox password must not be empty".to_owned(),
            ));
        }

        Ok(Self(value))
    }

    /// Returns the plaintext password for session login.
    #[must_use]
    pub fn expose(&self) -> &str {
        self.0.as_str()
    }
}

impl std::fmt::Debug for MailboxPassword {
    fn fmt(&self, formatter: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        formatter.write_str("MailboxPassword(<redacted>)")
    }
}

/// Mailbox coordinates of a mail-channel entry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MailSettings {
    /// Address the provider sends codes from.
    pub provider_address: EmailAddress,
    /// Mailbox the system logs into.
    pub mailbox_address: EmailAddress,
    /// Password for `mailbox_address`.
    pub mailbox_password: MailboxPassword,
}

/// Channel-specific configuration of an entry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AuthChannel {
    /// Locally generated TOTP codes.
    Totp {
        /// Canonical shared secret.
        secret: Secret,
    },
    /// Codes delivered by mail.
    Mail(MailSettings),
}

impl AuthChannel {
    /// Returns the channel discriminant.
    #[must_use]
    pub fn mode(&self) -> AuthMode {
        match self {
            Self::Totp { .. } => AuthMode::Totp,
            Self::Mail(_) => AuthMode::Mail,
        }
    }
}

/// Who an entry belongs to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Ownership {
    /// Administrator-managed entry, visibility driven by tags.
    Global,
    /// Entry created by and private to one principal.
    Private(PrincipalId),
}

impl Ownership {
    /// Returns the owner of a private entry.
    #[must_use]
    pub fn owner(&self) -> Option<&PrincipalId> {
        match self {
            Self::Global => None,
            Self::Private(owner) => Some(owner),
        }
    }

    /// Returns whether the entry is private.
    #[must_use]
    pub fn is_private(&self) -> bool {
        matches!(self, Self::Private(_))
    }
}

/// Editable fields of a credential entry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CredentialEntryInput {
    /// Short name, unique across entries; mail lookups key on it.
    pub display_name: String,
    /// Long descriptive name.
    pub full_name: String,
    /// CSS color used by the dashboard card.
    pub theme_color: String,
    /// Logo reference (URL or asset path).
    pub logo: String,
    /// Visibility tags. Ignored for private entries.
    pub tags: Vec<String>,
    /// Channel configuration.
    pub channel: AuthChannel,
}

/// One provider's configured access record.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CredentialEntry {
    id: CredentialEntryId,
    display_name: NonEmptyString,
    full_name: String,
    theme_color: String,
    logo: String,
    tags: TagSet,
    ownership: Ownership,
    channel: AuthChannel,
    last_code: Option<String>,
    last_code_at: Option<DateTime<Utc>>,
}

impl CredentialEntry {
    /// Builds a validated entry with an empty code cache.
    ///
    /// Private entries always carry exactly the [`PRIVATE_ENTRY_TAG`] tag.
    pub fn new(
        id: CredentialEntryId,
        input: CredentialEntryInput,
        ownership: Ownership,
    ) -> AppResult<Self> {
        let display_name = NonEmptyString::new(input.display_name)?;
        let full_name = normalize_full_name(input.full_name.as_str(), &display_name);
        let theme_color = normalize_theme_color(input.theme_color.as_str())?;
        let tags = resolve_tags(&ownership, input.tags.as_slice())?;

        Ok(Self {
            id,
            display_name,
            full_name,
            theme_color,
            logo: input.logo.trim().to_owned(),
            tags,
            ownership,
            channel: input.channel,
            last_code: None,
            last_code_at: None,
        })
    }

    /// Restores persisted code cache fields.
    #[must_use]
    pub fn with_code_cache(
        mut self,
        last_code: Option<String>,
        last_code_at: Option<DateTime<Utc>>,
    ) -> Self {
        self.last_code = last_code;
        self.last_code_at = last_code_at;
        self
    }

    /// Replaces editable fields, keeping identity, ownership and, unless the
    /// channel mode changes, the cached code.
    pub fn apply_update(&mut self, input: CredentialEntryInput) -> AppResult<()> {
        let display_name = NonEmptyString::new(input.display_name)?;
        let full_name = normalize_full_name(input.full_name.as_str(), &display_name);
        let theme_color = normalize_theme_color(input.theme_color.as_str())?;
        let tags = resolve_tags(&self.ownership, input.tags.as_slice())?;

        if input.channel.mode() != self.channel.mode() {
            self.last_code = None;
            self.last_code_at = None;
        }

        self.display_name = display_name;
        self.full_name = full_name;
        self.theme_color = theme_color;
        self.logo = input.logo.trim().to_owned();
        self.tags = tags;
        self.channel = input.channel;
        Ok(())
    }

    /// Folds an extracted code into the cache.
    ///
    /// Returns `false`, leaving the timestamp untouched, when the token equals
    /// the cached one.
    pub fn record_code(&mut self, token: &str, received_at: DateTime<Utc>) -> bool {
        if self.last_code.as_deref() == Some(token) {
            return false;
        }

        self.last_code = Some(token.to_owned());
        self.last_code_at = Some(received_at);
        true
    }

    /// Returns the entry id.
    #[must_use]
    pub fn id(&self) -> CredentialEntryId {
        self.id
    }

    /// Returns the display name.
    #[must_use]
    pub fn display_name(&self) -> &NonEmptyString {
        &self.display_name
    }

    /// Returns the full name.
    #[must_use]
    pub fn full_name(&self) -> &str {
        self.full_name.as_str()
    }

    /// Returns the theme color.
    #[must_use]
    pub fn theme_color(&self) -> &str {
        self.theme_color.as_str()
    }

    /// Returns the logo reference.
    #[must_use]
    pub fn logo(&self) -> &str {
        self.logo.as_str()
    }

    /// Returns visibility tags.
    #[must_use]
    pub fn tags(&self) -> &TagSet {
        &self.tags
    }

    /// Returns the ownership.
    #[must_use]
    pub fn ownership(&self) -> &Ownership {
        &self.ownership
    }

    /// Returns the owning principal of a private entry.
    #[must_use]
    pub fn owner_principal_id(&self) -> Option<&PrincipalId> {
        self.ownership.owner()
    }

    /// Returns whether the entry is private.
    #[must_use]
    pub fn is_private(&self) -> bool {
        self.ownership.is_private()
    }

    /// Returns the channel configuration.
    #[must_use]
    pub fn channel(&self) -> &AuthChannel {
        &self.channel
    }

    /// Returns the channel discriminant.
    #[must_use]
    pub fn auth_mode(&self) -> AuthMode {
        self.channel.mode()
    }

    /// Returns mail settings for mail-channel entries.
    #[must_use]
    pub fn mail_settings(&self) -> Option<&MailSettings> {
        match &self.channel {
            AuthChannel::Mail(settings) => Some(settings),
            AuthChannel::Totp { .. } => None,
        }
    }

    /// Returns the last extracted code.
    #[must_use]
    pub fn last_code(&self) -> Option<&str> {
        self.last_code.as_deref()
    }

    /// Returns when the last extracted code was received.
    #[must_use]
    pub fn last_code_at(&self) -> Option<DateTime<Utc>> {
        self.last_code_at
    }
}

fn normalize_full_name(value: &str, display_name: &NonEmptyString) -> String {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        display_name.as_str().to_owned()
    } else {
        trimmed.to_owned()
    }
}

fn normalize_theme_color(value: &str) -> AppResult<String> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return Ok(DEFAULT_THEME_COLOR.to_owned());
    }

    let digits = trimmed.strip_prefix('#').unwrap_or_default();
    if !matches!(digits.len(), 3 | 6) || !digits.chars().all(|c| c.is_ascii_hexdigit()) {
        return Err(AppError::Validation(format!(
            "theme color '{trimmed}' must be a #rgb or #rrggbb hex color"
        )));
    }

    Ok(trimmed.to_ascii_lowercase())
}

fn resolve_tags(ownership: &Ownership, raw: &[String]) -> AppResult<TagSet> {
    match ownership {
        Ownership::Private(_) => Ok(TagSet::from([PRIVATE_ENTRY_TAG.to_owned()])),
        Ownership::Global => normalize_tags(raw),
    }
}
