//! TOTP provider implementation using the `totp-rs` crate.

use otpdesk_application::{CODE_DIGITS, TIME_STEP_SECONDS, TotpProvider};
use otpdesk_core::{AppError, AppResult};
use totp_rs::{Algorithm, TOTP};

/// RFC 6238 provider: SHA-1, 6 digits, 30 second step.
#[derive(Debug, Clone, Copy, Default)]
pub struct TotpRsProvider;

impl TotpRsProvider {
    /// Creates a new TOTP provider.
    #[must_use]
    pub fn new() -> Self {
        Self
    }
}

impl TotpProvider for TotpRsProvider {
    fn code_at(&self, key: &[u8], unix_seconds: u64) -> AppResult<String> {
        if key.is_empty() {
            return Err(AppError::GenerationUnavailable(
                "totp key must not be empty".to_owned(),
            ));
        }

        // `TOTP::new` rejects keys under 128 bits; provider keys may be 80.
        let totp = TOTP::new_unchecked(
            Algorithm::SHA1,
            CODE_DIGITS,
            0,
            TIME_STEP_SECONDS,
            key.to_vec(),
        );

        Ok(totp.generate(unix_seconds))
    }
}
