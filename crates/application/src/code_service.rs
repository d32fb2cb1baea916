//! Display-facing TOTP code generation.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use otpdesk_core::{AppError, AppResult};
use otpdesk_domain::{AuthChannel, CredentialEntryId, Principal, Secret};
use tracing::warn;

use crate::CredentialService;
use crate::credential_ports::TotpProvider;

/// Step length of a code window in seconds.
pub const TIME_STEP_SECONDS: u64 = 30;

/// Number of digits of a generated code.
pub const CODE_DIGITS: usize = 6;

/// Placeholder shown when a code cannot be generated.
pub const UNAVAILABLE_CODE: &str = "------";

/// Code valid for the current window.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GeneratedCode {
    /// Zero-padded 6-digit code.
    pub code: String,
    /// Seconds until the window rolls over, in `1..=30`.
    pub seconds_remaining: u64,
}

/// Code row shown on the dashboard for one entry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DashboardCode {
    /// Entry id.
    pub entry_id: CredentialEntryId,
    /// Entry display name.
    pub display_name: String,
    /// Current code, the sentinel when unavailable, or `None` for a mail
    /// entry that has not received a code yet.
    pub code: Option<String>,
    /// Seconds remaining for TOTP entries.
    pub seconds_remaining: Option<u64>,
    /// Reception time of a mailed code.
    pub received_at: Option<DateTime<Utc>>,
}

/// Application service producing TOTP codes.
#[derive(Clone)]
pub struct CodeService {
    totp_provider: Arc<dyn TotpProvider>,
    credential_service: CredentialService,
}

impl CodeService {
    /// Creates a new code service.
    #[must_use]
    pub fn new(totp_provider: Arc<dyn TotpProvider>, credential_service: CredentialService) -> Self {
        Self {
            totp_provider,
            credential_service,
        }
    }

    /// Generates the code for `secret` at `now`.
    pub fn generate(&self, secret: &Secret, now: DateTime<Utc>) -> AppResult<GeneratedCode> {
        let unix_seconds = u64::try_from(now.timestamp()).map_err(|_| {
            AppError::GenerationUnavailable("instant precedes the unix epoch".to_owned())
        })?;

        let key = secret.key_bytes()?;
        let code = self.totp_provider.code_at(key.as_slice(), unix_seconds)?;
        if code.len() != CODE_DIGITS || !code.chars().all(|c| c.is_ascii_digit()) {
            return Err(AppError::GenerationUnavailable(format!(
                "provider returned a malformed code of length {}",
                code.len()
            )));
        }

        Ok(GeneratedCode {
            code,
            seconds_remaining: TIME_STEP_SECONDS - unix_seconds % TIME_STEP_SECONDS,
        })
    }

    /// Normalizes raw secret input and generates its current code.
    pub fn code_for_raw(&self, raw_secret: &str, now: DateTime<Utc>) -> AppResult<GeneratedCode> {
        let secret = Secret::normalize(raw_secret)?;
        self.generate(&secret, now)
    }

    /// Returns one code row per entry visible to `principal`.
    ///
    /// Generation faults are isolated per entry: the entry gets
    /// [`UNAVAILABLE_CODE`] and a logged diagnostic.
    pub async fn dashboard_codes(
        &self,
        principal: &Principal,
        now: DateTime<Utc>,
    ) -> AppResult<Vec<DashboardCode>> {
        let entries = self.credential_service.list_visible(principal).await?;

        Ok(entries
            .iter()
            .map(|entry| match entry.channel() {
                AuthChannel::Totp { secret } => {
                    let generated = self.generate(secret, now).unwrap_or_else(|error| {
                        warn!(
                            entry_id = %entry.id(),
                            provider = %entry.display_name(),
                            error = %error,
                            "totp generation failed for entry"
                        );
                        GeneratedCode {
                            code: UNAVAILABLE_CODE.to_owned(),
                            seconds_remaining: seconds_remaining_at(now),
                        }
                    });

                    DashboardCode {
                        entry_id: entry.id(),
                        display_name: entry.display_name().as_str().to_owned(),
                        code: Some(generated.code),
                        seconds_remaining: Some(generated.seconds_remaining),
                        received_at: None,
                    }
                }
                AuthChannel::Mail(_) => DashboardCode {
                    entry_id: entry.id(),
                    display_name: entry.display_name().as_str().to_owned(),
                    code: entry.last_code().map(str::to_owned),
                    seconds_remaining: None,
                    received_at: entry.last_code_at(),
                },
            })
            .collect())
    }
}

fn seconds_remaining_at(now: DateTime<Utc>) -> u64 {
    let step = TIME_STEP_SECONDS as i64;
    // rem_euclid keeps the result in 0..30 for pre-epoch instants too.
    TIME_STEP_SECONDS - now.timestamp().rem_euclid(step).unsigned_abs()
}

#[cfg(test)]
mod tests;
