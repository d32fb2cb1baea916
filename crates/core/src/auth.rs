use serde::{Deserialize, Serialize};

use crate::{AppError, AppResult};

/// Stable principal identifier issued by the external identity provider.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PrincipalId(String);

impl PrincipalId {
    /// Creates a principal identifier from the provider's subject value.
    pub fn new(value: impl Into<String>) -> AppResult<Self> {
        let value = value.into();
        let trimmed = value.trim();
        if trimmed.is_empty() {
            return Err(AppError::Validation(
                "principal id must not be empty".to_owned(),
            ));
        }

        if trimmed.len() > 128 {
            return Err(AppError::Validation(
                "principal id must not exceed 128 characters".to_owned(),
            ));
        }

        Ok(Self(trimmed.to_owned()))
    }

    /// Returns the underlying identifier.
    #[must_use]
    pub fn as_str(&self) -> &str {
        self.0.as_str()
    }
}

impl std::fmt::Display for PrincipalId {
    fn fmt(&self, formatter: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        formatter.write_str(self.0.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::PrincipalId;

    #[test]
    fn principal_id_is_trimmed() {
        let id = PrincipalId::new("  u1 ");
        assert_eq!(id.ok().as_ref().map(PrincipalId::as_str), Some("u1"));
    }

    #[test]
    fn blank_principal_id_is_rejected() {
        assert!(PrincipalId::new("").is_err());
        assert!(PrincipalId::new("   ").is_err());
    }
}
