use std::sync::Arc;

use otpdesk_core::{AppError, AppResult, PrincipalId};
use otpdesk_domain::{EmailAddress, Principal, Role};
use tracing::info;

use crate::credential_ports::PrincipalRepository;

/// Application service for dashboard principals.
#[derive(Clone)]
pub struct PrincipalService {
    repository: Arc<dyn PrincipalRepository>,
}

impl PrincipalService {
    /// Creates a new principal service.
    #[must_use]
    pub fn new(repository: Arc<dyn PrincipalRepository>) -> Self {
        Self { repository }
    }

    /// Resolves the principal asserted by the identity gateway.
    pub async fn authenticate(&self, id: &PrincipalId) -> AppResult<Principal> {
        self.repository
            .find_principal(id)
            .await?
            .ok_or_else(|| AppError::Unauthorized(format!("unknown principal '{id}'")))
    }

    /// Resolves the asserted principal, enrolling it as a tagless user on
    /// first sight when the gateway also asserts an email address.
    pub async fn authenticate_or_enroll(
        &self,
        id: &PrincipalId,
        email: Option<&str>,
    ) -> AppResult<Principal> {
        if let Some(principal) = self.repository.find_principal(id).await? {
            return Ok(principal);
        }

        let Some(email) = email else {
            return Err(AppError::Unauthorized(format!("unknown principal '{id}'")));
        };

        let principal = Principal::new(
            id.clone(),
            EmailAddress::new(email)?,
            Role::User,
            Vec::<String>::new(),
        )?;
        self.repository.save_principal(principal.clone()).await?;

        info!(principal = %id, "principal enrolled");
        Ok(principal)
    }

    /// Ensures the configured operator exists with the admin role.
    ///
    /// Existing tags are preserved.
    pub async fn bootstrap_admin(
        &self,
        id: PrincipalId,
        email: EmailAddress,
    ) -> AppResult<Principal> {
        let tags = self
            .repository
            .find_principal(&id)
            .await?
            .map(|existing| existing.tags().iter().cloned().collect::<Vec<_>>())
            .unwrap_or_default();

        let principal = Principal::new(id, email, Role::Admin, tags)?;
        self.repository.save_principal(principal.clone()).await?;

        info!(principal = %principal.id(), "bootstrap administrator ensured");
        Ok(principal)
    }

    /// Lists every principal. Administrators only.
    pub async fn list(&self, actor: &Principal) -> AppResult<Vec<Principal>> {
        require_admin(actor)?;
        self.repository.list_principals().await
    }

    /// Replaces a principal's visibility tags. Administrators only.
    pub async fn update_tags(
        &self,
        actor: &Principal,
        id: &PrincipalId,
        tags: Vec<String>,
    ) -> AppResult<Principal> {
        require_admin(actor)?;

        let mut principal = self
            .repository
            .find_principal(id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("principal '{id}' not found")))?;

        principal.set_tags(tags)?;
        self.repository.save_principal(principal.clone()).await?;

        info!(
            principal = %id,
            actor = %actor.id(),
            tag_count = principal.tags().len(),
            "principal tags updated"
        );

        Ok(principal)
    }
}

fn require_admin(actor: &Principal) -> AppResult<()> {
    if actor.is_admin() {
        return Ok(());
    }

    Err(AppError::Forbidden(format!(
        "principal '{}' is not an administrator",
        actor.id()
    )))
}
