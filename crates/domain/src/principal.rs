use std::str::FromStr;

use otpdesk_core::{AppError, AppResult, PrincipalId};
use serde::{Deserialize, Serialize};

use crate::email::EmailAddress;
use crate::tags::{TagSet, normalize_tags};

/// Dashboard role of a principal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    /// Sees and manages every entry.
    Admin,
    /// Sees entries granted by tags or ownership.
    User,
}

impl Role {
    /// Returns a stable storage value.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Admin => "admin",
            Self::User => "user",
        }
    }
}

impl FromStr for Role {
    type Err = AppError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value {
            "admin" => Ok(Self::Admin),
            "user" => Ok(Self::User),
            _ => Err(AppError::Validation(format!("unknown role '{value}'"))),
        }
    }
}

/// Authenticated dashboard operator.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Principal {
    id: PrincipalId,
    email: EmailAddress,
    role: Role,
    tags: TagSet,
}

impl Principal {
    /// Creates a principal with normalized tags.
    pub fn new<I, S>(id: PrincipalId, email: EmailAddress, role: Role, tags: I) -> AppResult<Self>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        Ok(Self {
            id,
            email,
            role,
            tags: normalize_tags(tags)?,
        })
    }

    /// Replaces the principal's tags.
    pub fn set_tags<I, S>(&mut self, tags: I) -> AppResult<()>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        self.tags = normalize_tags(tags)?;
        Ok(())
    }

    /// Returns the principal id.
    #[must_use]
    pub fn id(&self) -> &PrincipalId {
        &self.id
    }

    /// Returns the principal email.
    #[must_use]
    pub fn email(&self) -> &EmailAddress {
        &self.email
    }

    /// Returns the role.
    #[must_use]
    pub fn role(&self) -> Role {
        self.role
    }

    /// Returns whether the principal is an administrator.
    #[must_use]
    pub fn is_admin(&self) -> bool {
        self.role == Role::Admin
    }

    /// Returns the principal's tags.
    #[must_use]
    pub fn tags(&self) -> &TagSet {
        &self.tags
    }
}

#[cfg(test)]
mod tests {
    use std::str::FromStr;

    use otpdesk_core::PrincipalId;

    use super::{Principal, Role};
    use crate::email::EmailAddress;

    #[test]
    fn role_round_trips_through_storage_value() {
        for role in [Role::Admin, Role::User] {
            assert_eq!(Role::from_str(role.as_str()).ok(), Some(role));
        }
        assert!(Role::from_str("owner").is_err());
    }

    #[test]
    fn tags_are_replaced_wholesale() {
        let principal = Principal::new(
            PrincipalId::new("u1").unwrap_or_else(|_| panic!("id")),
            EmailAddress::new("ana@desk.example").unwrap_or_else(|_| panic!("email")),
            Role::User,
            ["Treino"],
        );
        let mut principal = principal.unwrap_or_else(|_| panic!("principal"));

        assert!(principal.set_tags(["Premium", " "]).is_ok());
        assert_eq!(
            principal.tags().iter().map(String::as_str).collect::<Vec<_>>(),
            vec!["Premium"]
        );
        assert!(!principal.is_admin());
    }
}
