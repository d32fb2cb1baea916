use std::str::FromStr;

use otpdesk_application::{DashboardCode, GeneratedCode, MailCheckOutcome};
use otpdesk_core::{AppError, AppResult};
use otpdesk_domain::{
    AuthChannel, AuthMode, CredentialEntry, CredentialEntryInput, EmailAddress, MailSettings,
    MailboxPassword, Principal, Secret,
};
use serde::{Deserialize, Serialize};
use ts_rs::TS;

/// Health response payload.
#[derive(Debug, Serialize, TS)]
#[ts(
    export,
    export_to = "../../../packages/api-types/src/generated/health-response.ts"
)]
pub struct HealthResponse {
    pub status: &'static str,
}

/// Query string of the raw-secret code endpoint.
#[derive(Debug, Deserialize, TS)]
#[ts(
    export,
    export_to = "../../../packages/api-types/src/generated/code-query.ts"
)]
pub struct CodeQuery {
    #[serde(default)]
    pub secret: Option<String>,
}

/// Current code of a secret.
#[derive(Debug, Serialize, TS)]
#[ts(
    export,
    export_to = "../../../packages/api-types/src/generated/code-response.ts"
)]
pub struct CodeResponse {
    pub token: String,
    pub remaining: u64,
}

impl From<GeneratedCode> for CodeResponse {
    fn from(value: GeneratedCode) -> Self {
        Self {
            token: value.code,
            remaining: value.seconds_remaining,
        }
    }
}

/// Incoming payload for a mail check with explicit mailbox parameters.
#[derive(Debug, Deserialize, TS)]
#[serde(rename_all = "camelCase")]
#[ts(
    export,
    export_to = "../../../packages/api-types/src/generated/check-mail-request.ts"
)]
pub struct CheckMailRequest {
    pub provider_email: String,
    pub mailbox_address: String,
    pub mailbox_password: String,
    pub provider_name: String,
}

impl CheckMailRequest {
    pub fn into_parts(self) -> AppResult<(String, MailSettings)> {
        let provider_name = self.provider_name.trim().to_owned();
        if provider_name.is_empty() {
            return Err(AppError::Validation(
                "providerName must not be empty".to_owned(),
            ));
        }

        Ok((
            provider_name,
            MailSettings {
                provider_address: EmailAddress::new(self.provider_email)?,
                mailbox_address: EmailAddress::new(self.mailbox_address)?,
                mailbox_password: MailboxPassword::new(self.mailbox_password)?,
            },
        ))
    }
}

/// Result of a mail check.
#[derive(Debug, Serialize, TS)]
#[ts(
    export,
    export_to = "../../../packages/api-types/src/generated/check-mail-response.ts"
)]
pub struct CheckMailResponse {
    pub outcome: String,
    pub message: String,
    pub code: Option<String>,
}

impl From<MailCheckOutcome> for CheckMailResponse {
    fn from(value: MailCheckOutcome) -> Self {
        let code = match &value {
            MailCheckOutcome::NoCodeFound => None,
            MailCheckOutcome::EntryNotFound { code }
            | MailCheckOutcome::CodeUnchanged { code }
            | MailCheckOutcome::CodeUpdated { code, .. } => Some(code.clone()),
        };

        Self {
            outcome: value.as_str().to_owned(),
            message: value.message(),
            code,
        }
    }
}

/// Incoming payload for secret plausibility feedback.
#[derive(Debug, Deserialize, TS)]
#[ts(
    export,
    export_to = "../../../packages/api-types/src/generated/validate-secret-request.ts"
)]
pub struct ValidateSecretRequest {
    pub secret: String,
}

/// Secret plausibility feedback.
#[derive(Debug, Serialize, TS)]
#[ts(
    export,
    export_to = "../../../packages/api-types/src/generated/validate-secret-response.ts"
)]
pub struct ValidateSecretResponse {
    pub plausible: bool,
    pub normalized: Option<String>,
    pub error: Option<String>,
}

impl ValidateSecretResponse {
    pub fn for_input(raw: &str) -> Self {
        match Secret::normalize(raw) {
            Ok(secret) => Self {
                plausible: Secret::is_plausible(raw),
                normalized: Some(secret.as_str().to_owned()),
                error: None,
            },
            Err(error) => Self {
                plausible: false,
                normalized: None,
                error: Some(error.to_string()),
            },
        }
    }
}

/// Incoming payload for entry creation and replacement.
///
/// On update, omitted secret material keeps the stored value when the auth
/// mode is unchanged.
#[derive(Debug, Deserialize, TS)]
#[ts(
    export,
    export_to = "../../../packages/api-types/src/generated/save-entry-request.ts"
)]
pub struct SaveEntryRequest {
    pub display_name: String,
    #[serde(default)]
    pub full_name: String,
    #[serde(default)]
    pub theme_color: String,
    #[serde(default)]
    pub logo: String,
    #[serde(default)]
    pub tags: Vec<String>,
    pub auth_mode: String,
    pub secret: Option<String>,
    pub provider_address: Option<String>,
    pub mailbox_address: Option<String>,
    pub mailbox_password: Option<String>,
}

impl SaveEntryRequest {
    pub fn into_input(self, current: Option<&AuthChannel>) -> AppResult<CredentialEntryInput> {
        let channel = match AuthMode::from_str(self.auth_mode.as_str())? {
            AuthMode::Totp => {
                let secret = match (non_blank(self.secret), current) {
                    (Some(raw), _) => Secret::normalize(raw.as_str())?,
                    (None, Some(AuthChannel::Totp { secret })) => secret.clone(),
                    (None, _) => {
                        return Err(AppError::Validation(
                            "secret is required for totp entries".to_owned(),
                        ));
                    }
                };
                AuthChannel::Totp { secret }
            }
            AuthMode::Mail => {
                let current = match current {
                    Some(AuthChannel::Mail(settings)) => Some(settings),
                    _ => None,
                };
                let mailbox_password = match (non_blank(self.mailbox_password), current) {
                    (Some(password), _) => MailboxPassword::new(password)?,
                    (None, Some(settings)) => settings.mailbox_password.clone(),
                    (None, None) => {
                        return Err(AppError::Validation(
                            "mailbox_password is required for mail entries".to_owned(),
                        ));
                    }
                };

                AuthChannel::Mail(MailSettings {
                    provider_address: EmailAddress::new(required_field(
                        self.provider_address,
                        "provider_address",
                    )?)?,
                    mailbox_address: EmailAddress::new(required_field(
                        self.mailbox_address,
                        "mailbox_address",
                    )?)?,
                    mailbox_password,
                })
            }
        };

        Ok(CredentialEntryInput {
            display_name: self.display_name,
            full_name: self.full_name,
            theme_color: self.theme_color,
            logo: self.logo,
            tags: self.tags,
            channel,
        })
    }
}

fn non_blank(value: Option<String>) -> Option<String> {
    value.filter(|value| !value.trim().is_empty())
}

fn required_field(value: Option<String>, name: &str) -> AppResult<String> {
    non_blank(value)
        .ok_or_else(|| AppError::Validation(format!("{name} is required for mail entries")))
}

/// API representation of a credential entry. Secret material is never
/// included.
#[derive(Debug, Serialize, TS)]
#[ts(
    export,
    export_to = "../../../packages/api-types/src/generated/entry-response.ts"
)]
pub struct EntryResponse {
    pub id: String,
    pub display_name: String,
    pub full_name: String,
    pub theme_color: String,
    pub logo: String,
    pub tags: Vec<String>,
    pub auth_mode: String,
    pub is_private: bool,
    pub owner_principal_id: Option<String>,
    pub provider_address: Option<String>,
    pub mailbox_address: Option<String>,
    pub last_code: Option<String>,
    pub last_code_at: Option<String>,
}

impl From<CredentialEntry> for EntryResponse {
    fn from(value: CredentialEntry) -> Self {
        let mail_settings = value.mail_settings();

        Self {
            id: value.id().to_string(),
            display_name: value.display_name().as_str().to_owned(),
            full_name: value.full_name().to_owned(),
            theme_color: value.theme_color().to_owned(),
            logo: value.logo().to_owned(),
            tags: value.tags().iter().cloned().collect(),
            auth_mode: value.auth_mode().as_str().to_owned(),
            is_private: value.is_private(),
            owner_principal_id: value
                .owner_principal_id()
                .map(|owner| owner.as_str().to_owned()),
            provider_address: mail_settings
                .map(|settings| settings.provider_address.as_str().to_owned()),
            mailbox_address: mail_settings
                .map(|settings| settings.mailbox_address.as_str().to_owned()),
            last_code: value.last_code().map(str::to_owned),
            last_code_at: value.last_code_at().map(|at| at.to_rfc3339()),
        }
    }
}

/// Dashboard code row.
#[derive(Debug, Serialize, TS)]
#[ts(
    export,
    export_to = "../../../packages/api-types/src/generated/dashboard-code-response.ts"
)]
pub struct DashboardCodeResponse {
    pub entry_id: String,
    pub display_name: String,
    pub code: Option<String>,
    pub seconds_remaining: Option<u64>,
    pub received_at: Option<String>,
}

impl From<DashboardCode> for DashboardCodeResponse {
    fn from(value: DashboardCode) -> Self {
        Self {
            entry_id: value.entry_id.to_string(),
            display_name: value.display_name,
            code: value.code,
            seconds_remaining: value.seconds_remaining,
            received_at: value.received_at.map(|at| at.to_rfc3339()),
        }
    }
}

/// Incoming payload for principal tag grants.
#[derive(Debug, Deserialize, TS)]
#[ts(
    export,
    export_to = "../../../packages/api-types/src/generated/update-principal-tags-request.ts"
)]
pub struct UpdatePrincipalTagsRequest {
    pub tags: Vec<String>,
}

/// API representation of a principal.
#[derive(Debug, Serialize, TS)]
#[ts(
    export,
    export_to = "../../../packages/api-types/src/generated/principal-response.ts"
)]
pub struct PrincipalResponse {
    pub id: String,
    pub email: String,
    pub role: String,
    pub tags: Vec<String>,
}

impl From<Principal> for PrincipalResponse {
    fn from(value: Principal) -> Self {
        Self {
            id: value.id().as_str().to_owned(),
            email: value.email().as_str().to_owned(),
            role: value.role().as_str().to_owned(),
            tags: value.tags().iter().cloned().collect(),
        }
    }
}

#[cfg(test)]
mod tests {
    use otpdesk_domain::{AuthChannel, Secret};

    use super::{
        CheckMailRequest, CheckMailResponse, CodeQuery, CodeResponse, DashboardCodeResponse,
        EntryResponse, HealthResponse, PrincipalResponse, SaveEntryRequest,
        UpdatePrincipalTagsRequest, ValidateSecretRequest, ValidateSecretResponse,
    };

    use crate::error::ErrorResponse;
    use ts_rs::Config;
    use ts_rs::TS;

    #[test]
    fn export_ts_bindings() -> Result<(), ts_rs::ExportError> {
        let config = Config::default();

        HealthResponse::export(&config)?;
        CodeQuery::export(&config)?;
        CodeResponse::export(&config)?;
        CheckMailRequest::export(&config)?;
        CheckMailResponse::export(&config)?;
        ValidateSecretRequest::export(&config)?;
        ValidateSecretResponse::export(&config)?;
        SaveEntryRequest::export(&config)?;
        EntryResponse::export(&config)?;
        DashboardCodeResponse::export(&config)?;
        UpdatePrincipalTagsRequest::export(&config)?;
        PrincipalResponse::export(&config)?;
        ErrorResponse::export(&config)?;

        Ok(())
    }

    #[test]
    fn check_mail_request_uses_camel_case_fields() {
        let request: CheckMailRequest = serde_json::from_str(
            r#"{
                "providerEmail": "no-reply@provider.com",
                "mailboxAddress": "codes@desk.example",
                "mailboxPassword": "hunter2",
                "providerName": " Mailer "
            }"#,
        )
        .unwrap_or_else(|error| panic!("decode: {error}"));

        let (provider_name, settings) = request
            .into_parts()
            .unwrap_or_else(|error| panic!("parts: {error}"));
        assert_eq!(provider_name, "Mailer");
        assert_eq!(settings.mailbox_password.expose(), "hunter2");
    }

    #[test]
    fn update_without_secret_keeps_the_stored_one() {
        let stored = AuthChannel::Totp {
            secret: Secret::normalize("JBSWY3DPEHPK3PXP").unwrap_or_else(|_| panic!("secret")),
        };
        let request: SaveEntryRequest = serde_json::from_str(
            r#"{"display_name": "Acme", "auth_mode": "totp", "secret": "  "}"#,
        )
        .unwrap_or_else(|error| panic!("decode: {error}"));

        let input = request
            .into_input(Some(&stored))
            .unwrap_or_else(|error| panic!("input: {error}"));
        assert_eq!(input.channel, stored);
    }

    #[test]
    fn new_mail_entry_needs_a_password() {
        let request: SaveEntryRequest = serde_json::from_str(
            r#"{
                "display_name": "Mailer",
                "auth_mode": "mail",
                "provider_address": "no-reply@provider.com",
                "mailbox_address": "codes@desk.example"
            }"#,
        )
        .unwrap_or_else(|error| panic!("decode: {error}"));

        assert!(request.into_input(None).is_err());
    }

    #[test]
    fn secret_feedback_reports_normalized_form() {
        let plausible = ValidateSecretResponse::for_input("jbsw y3dp ehpk 3pxp");
        assert!(plausible.plausible);
        assert_eq!(plausible.normalized.as_deref(), Some("JBSWY3DPEHPK3PXP"));

        let rejected = ValidateSecretResponse::for_input("short");
        assert!(!rejected.plausible);
        assert!(rejected.error.is_some());
    }
}
