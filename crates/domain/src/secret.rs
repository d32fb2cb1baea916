//! Canonicalization of operator-supplied TOTP secrets.
//!
//! Operators paste secrets copied from heterogeneous provider consoles: Base32
//! in mixed case, grouped with spaces or hyphens, and sometimes hexadecimal key
//! material. Everything is reduced to the canonical uppercase RFC 4648 Base32
//! alphabet before it is stored or handed to the code generator.

use data_encoding::{BASE32, Encoding, Specification};
use otpdesk_core::{AppError, AppResult};
use serde::{Deserialize, Serialize};

/// Canonical 32-symbol alphabet accepted by the TOTP algorithm.
pub const CANONICAL_ALPHABET: &str = "ABCDEFGHIJKLMNOPQRSTUVWXYZ234567";

/// Minimum length of a canonical secret, padding included.
pub const SECRET_MIN_LENGTH: usize = 16;

/// Minimum decoded key size (80 bits) for a secret to be considered plausible.
pub const PLAUSIBLE_KEY_MIN_BYTES: usize = 10;

const PADDING: char = '=';

/// Canonical TOTP secret.
///
/// Only constructible through [`Secret::normalize`], so a value of this type is
/// always uppercase Base32 of at least [`SECRET_MIN_LENGTH`] symbols.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Secret(String);

impl Secret {
    /// Canonicalizes raw operator input.
    ///
    /// Whitespace and hyphens are removed and the input is upper-cased. Input
    /// already in the Base32 alphabet (optionally `=` padded) is accepted as is;
    /// otherwise pure hexadecimal input is decoded and re-encoded as padded
    /// Base32. Anything else, or a result shorter than [`SECRET_MIN_LENGTH`],
    /// fails with [`AppError::InvalidSecret`].
    pub fn normalize(raw: &str) -> AppResult<Self> {
        let compact: String = raw
            .trim()
            .to_uppercase()
            .chars()
            .filter(|character| !character.is_whitespace() && *character != '-')
            .collect();

        if compact.is_empty() {
            return Err(AppError::InvalidSecret(
                "secret must not be empty".to_owned(),
            ));
        }

        let canonical = if is_canonical_alphabet(compact.as_str()) {
            compact
        } else if compact.chars().all(|character| character.is_ascii_hexdigit()) {
            hex_to_base32(compact.as_str())?
        } else {
            return Err(AppError::InvalidSecret(
                "secret must be Base32 or hexadecimal".to_owned(),
            ));
        };

        if canonical.len() < SECRET_MIN_LENGTH {
            return Err(AppError::InvalidSecret(format!(
                "secret is too short (minimum {SECRET_MIN_LENGTH} characters)"
            )));
        }

        Ok(Self(canonical))
    }

    /// Returns the canonical Base32 text.
    #[must_use]
    pub fn as_str(&self) -> &str {
        self.0.as_str()
    }

    /// Decodes the canonical text into raw key bytes for the HMAC.
    ///
    /// Decoding is lenient the way authenticator apps are: unused trailing
    /// bits are ignored and a final symbol that cannot complete a byte is
    /// dropped. Fails with [`AppError::GenerationUnavailable`] only when
    /// padding appears inside the payload or no symbol remains.
    pub fn key_bytes(&self) -> AppResult<Vec<u8>> {
        let payload = self.0.trim_end_matches(PADDING);
        if payload.is_empty() || payload.contains(PADDING) {
            return Err(AppError::GenerationUnavailable(
                "secret padding is malformed".to_owned(),
            ));
        }

        // 1, 3 and 6 symbols past a full quantum carry no extra whole byte.
        let usable = match payload.len() % 8 {
            1 | 3 | 6 => payload.len() - 1,
            _ => payload.len(),
        };

        lenient_base32()?
            .decode(payload[..usable].as_bytes())
            .map_err(|error| {
                AppError::GenerationUnavailable(format!("secret is not decodable Base32: {error}"))
            })
    }

    /// Returns whether raw input looks like a real TOTP key.
    ///
    /// Intended as pre-save form feedback only: normalization must succeed and
    /// the decoded key must be at least [`PLAUSIBLE_KEY_MIN_BYTES`] long.
    #[must_use]
    pub fn is_plausible(raw: &str) -> bool {
        Self::normalize(raw)
            .and_then(|secret| secret.key_bytes())
            .is_ok_and(|key| key.len() >= PLAUSIBLE_KEY_MIN_BYTES)
    }
}

impl std::fmt::Debug for Secret {
    fn fmt(&self, formatter: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        formatter.write_str("Secret(<redacted>)")
    }
}

impl TryFrom<String> for Secret {
    type Error = AppError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::normalize(value.as_str())
    }
}

impl From<Secret> for String {
    fn from(value: Secret) -> Self {
        value.0
    }
}

fn is_canonical_alphabet(value: &str) -> bool {
    value
        .chars()
        .all(|character| character == PADDING || CANONICAL_ALPHABET.contains(character))
}

fn lenient_base32() -> AppResult<Encoding> {
    let mut specification = Specification::new();
    specification.symbols.push_str(CANONICAL_ALPHABET);
    specification.check_trailing_bits = false;

    specification.encoding().map_err(|error| {
        AppError::Internal(format!("invalid Base32 decoder specification: {error}"))
    })
}

fn hex_to_base32(value: &str) -> AppResult<String> {
    let bytes = hex::decode(value)
        .map_err(|error| AppError::InvalidSecret(format!("invalid hexadecimal secret: {error}")))?;

    Ok(BASE32.encode(&bytes))
}

#[cfg(test)]
mod tests {
    use otpdesk_core::AppError;
    use proptest::prelude::*;

    use super::{PLAUSIBLE_KEY_MIN_BYTES, Secret};

    fn canonical(raw: &str) -> String {
        Secret::normalize(raw)
            .map(String::from)
            .unwrap_or_else(|error| panic!("expected '{raw}' to normalize: {error}"))
    }

    #[test]
    fn empty_blank_and_short_inputs_are_rejected() {
        for raw in ["", "   ", "12"] {
            assert!(matches!(
                Secret::normalize(raw),
                Err(AppError::InvalidSecret(_))
            ));
        }
    }

    #[test]
    fn grouped_lowercase_base32_is_canonicalized() {
        assert_eq!(canonical("jbsw-y3dp ehpk-3pxp"), "JBSWY3DPEHPK3PXP");
        assert_eq!(canonical("  JBSW Y3DP EHPK 3PXP\n"), "JBSWY3DPEHPK3PXP");
    }

    #[test]
    fn trailing_padding_is_tolerated() {
        assert_eq!(canonical("AERUKZ4JVM======"), "AERUKZ4JVM======");
    }

    #[test]
    fn hexadecimal_input_is_converted_to_base32() {
        assert_eq!(canonical("48656c6c6f21deadbeef"), "JBSWY3DPEHPK3PXP");
        assert_eq!(canonical("01 23-45 67 89 AB"), "AERUKZ4JVM======");
    }

    #[test]
    fn hex_made_of_base32_symbols_is_read_as_base32() {
        // "DEADBEEFCAFE" is valid Base32 text, so it is not reinterpreted.
        assert!(Secret::normalize("deadbeefcafe").is_err());
        assert_eq!(
            canonical("deadbeefcafedeadbeef"),
            "DEADBEEFCAFEDEADBEEF"
        );
    }

    #[test]
    fn odd_length_hexadecimal_is_rejected() {
        assert!(matches!(
            Secret::normalize("48656c6c6f21deadbee"),
            Err(AppError::InvalidSecret(_))
        ));
    }

    #[test]
    fn foreign_characters_are_rejected() {
        assert!(matches!(
            Secret::normalize("JBSWY3DPEHPK3PX!"),
            Err(AppError::InvalidSecret(_))
        ));
        assert!(Secret::normalize("JBSWY3DPEHPK3PX1").is_err());
    }

    #[test]
    fn short_hexadecimal_is_rejected_after_conversion() {
        // One byte becomes "CI======", eight symbols.
        assert!(Secret::normalize("12").is_err());
    }

    #[test]
    fn key_bytes_decode_the_canonical_text() {
        let secret = Secret::normalize("JBSWY3DPEHPK3PXP");
        let key = secret.and_then(|value| value.key_bytes());
        assert_eq!(
            key.unwrap_or_default(),
            b"Hello!\xDE\xAD\xBE\xEF".to_vec()
        );
    }

    #[test]
    fn non_zero_trailing_bits_are_ignored() {
        let key = Secret::normalize("JBSWY3DPEHPK3PXPZZ").and_then(|value| value.key_bytes());

        assert_eq!(
            key.unwrap_or_default(),
            b"Hello!\xDE\xAD\xBE\xEF\xCE".to_vec()
        );
        assert!(Secret::is_plausible("JBSWY3DPEHPK3PXPZZ"));
    }

    #[test]
    fn a_symbol_that_cannot_complete_a_byte_is_dropped() {
        for (raw, expected) in [
            ("JBSWY3DPEHPK3PXPA", b"Hello!\xDE\xAD\xBE\xEF".to_vec()),
            ("JBSWY3DPEHPK3PXPZZZ", b"Hello!\xDE\xAD\xBE\xEF\xCE".to_vec()),
            (
                "JBSWY3DPEHPK3PXPZZZZZZ",
                b"Hello!\xDE\xAD\xBE\xEF\xCE\x73\x9C".to_vec(),
            ),
        ] {
            let key = Secret::normalize(raw).and_then(|value| value.key_bytes());
            assert_eq!(key.ok(), Some(expected), "{raw}");
        }
    }

    #[test]
    fn interior_padding_is_not_decodable() {
        let secret = Secret::normalize("JBSW=Y3DPEHPK3PXP");
        assert!(secret.is_ok());
        assert!(matches!(
            secret.and_then(|value| value.key_bytes()),
            Err(AppError::GenerationUnavailable(_))
        ));
    }

    #[test]
    fn plausibility_requires_a_decodable_key_of_minimum_size() {
        assert!(Secret::is_plausible("JBSWY3DPEHPK3PXP"));
        assert!(Secret::is_plausible("GEZDGNBVGY3TQOJQGEZDGNBVGY3TQOJQ"));
        // Six bytes of key material normalize but are too weak to be real.
        assert!(Secret::normalize("0123456789ab").is_ok());
        assert!(!Secret::is_plausible("0123456789ab"));
        assert!(!Secret::is_plausible("================"));
        assert!(!Secret::is_plausible(""));
    }

    #[test]
    fn debug_output_does_not_leak_the_secret() {
        let secret = Secret::normalize("JBSWY3DPEHPK3PXP");
        let rendered = format!("{secret:?}");
        assert!(!rendered.contains("JBSW"));
    }

    proptest! {
        #[test]
        fn hexadecimal_round_trips_to_the_same_bytes(
            bytes in prop::collection::vec(any::<u8>(), PLAUSIBLE_KEY_MIN_BYTES..64)
        ) {
            let encoded = hex::encode(&bytes);
            // Hex text made only of Base32 symbols is accepted verbatim instead.
            prop_assume!(encoded.chars().any(|character| matches!(character, '0' | '1' | '8' | '9')));

            let secret = Secret::normalize(encoded.as_str());
            prop_assert!(secret.is_ok());
            let decoded = secret.and_then(|value| value.key_bytes());
            prop_assert_eq!(decoded.ok(), Some(bytes));
        }

        #[test]
        fn normalization_is_idempotent(raw in "[A-Za-z2-7 -]{16,48}|[0-9a-fA-F]{32,64}") {
            if let Ok(first) = Secret::normalize(raw.as_str()) {
                let second = Secret::normalize(first.as_str());
                prop_assert_eq!(second.ok(), Some(first));
            }
        }
    }
}
