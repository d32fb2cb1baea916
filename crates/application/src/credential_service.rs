//! Credential entry lifecycle and per-principal listing.

use std::sync::Arc;

use otpdesk_core::{AppError, AppResult};
use otpdesk_domain::{
    CredentialEntry, CredentialEntryId, CredentialEntryInput, Ownership, Principal, is_visible,
    list_visible,
};
use tracing::info;

use crate::credential_ports::CredentialRepository;

/// Application service for credential entries.
#[derive(Clone)]
pub struct CredentialService {
    repository: Arc<dyn CredentialRepository>,
}

impl CredentialService {
    /// Creates a new credential service.
    #[must_use]
    pub fn new(repository: Arc<dyn CredentialRepository>) -> Self {
        Self { repository }
    }

    /// Lists the entries `principal` may see, ordered by display name.
    pub async fn list_visible(&self, principal: &Principal) -> AppResult<Vec<CredentialEntry>> {
        let entries = self.repository.list_entries().await?;
        Ok(list_visible(entries, principal))
    }

    /// Returns one visible entry.
    ///
    /// Hidden entries are reported as missing so their existence does not leak.
    pub async fn get(
        &self,
        principal: &Principal,
        id: CredentialEntryId,
    ) -> AppResult<CredentialEntry> {
        self.repository
            .find_entry(id)
            .await?
            .filter(|entry| is_visible(entry, principal))
            .ok_or_else(|| AppError::NotFound(format!("credential entry '{id}' not found")))
    }

    /// Creates an entry.
    ///
    /// Administrators create global entries with the given tags; everyone else
    /// creates a private entry they own.
    pub async fn create(
        &self,
        principal: &Principal,
        input: CredentialEntryInput,
    ) -> AppResult<CredentialEntry> {
        let ownership = if principal.is_admin() {
            Ownership::Global
        } else {
            Ownership::Private(principal.id().clone())
        };

        let entry = CredentialEntry::new(CredentialEntryId::new(), input, ownership)?;
        self.require_unique_name(&entry).await?;
        self.repository.save_entry(entry.clone()).await?;

        info!(
            entry_id = %entry.id(),
            provider = %entry.display_name(),
            auth_mode = entry.auth_mode().as_str(),
            private = entry.is_private(),
            principal = %principal.id(),
            "credential entry created"
        );

        Ok(entry)
    }

    /// Replaces the editable fields of an entry.
    pub async fn update(
        &self,
        principal: &Principal,
        id: CredentialEntryId,
        input: CredentialEntryInput,
    ) -> AppResult<CredentialEntry> {
        let mut entry = self.get_manageable(principal, id).await?;
        entry.apply_update(input)?;
        self.require_unique_name(&entry).await?;
        self.repository.save_entry(entry.clone()).await?;

        info!(
            entry_id = %entry.id(),
            provider = %entry.display_name(),
            principal = %principal.id(),
            "credential entry updated"
        );

        Ok(entry)
    }

    /// Deletes an entry, refusing to remove the last one.
    pub async fn delete(&self, principal: &Principal, id: CredentialEntryId) -> AppResult<()> {
        let entry = self.get_manageable(principal, id).await?;

        if !self.repository.delete_entry_unless_last(id).await? {
            return Err(AppError::Conflict(
                "the last credential entry cannot be deleted".to_owned(),
            ));
        }

        info!(
            entry_id = %id,
            provider = %entry.display_name(),
            principal = %principal.id(),
            "credential entry deleted"
        );

        Ok(())
    }

    /// Lists every mail-channel entry regardless of visibility.
    pub async fn list_mail_entries(&self) -> AppResult<Vec<CredentialEntry>> {
        Ok(self
            .repository
            .list_entries()
            .await?
            .into_iter()
            .filter(|entry| entry.mail_settings().is_some())
            .collect())
    }

    async fn get_manageable(
        &self,
        principal: &Principal,
        id: CredentialEntryId,
    ) -> AppResult<CredentialEntry> {
        let entry = self.get(principal, id).await?;

        let is_owner = entry.owner_principal_id() == Some(principal.id());
        if !principal.is_admin() && !is_owner {
            return Err(AppError::Forbidden(format!(
                "principal '{}' cannot manage credential entry '{id}'",
                principal.id()
            )));
        }

        Ok(entry)
    }

    async fn require_unique_name(&self, entry: &CredentialEntry) -> AppResult<()> {
        let existing = self
            .repository
            .find_by_display_name(entry.display_name().as_str())
            .await?;

        match existing {
            Some(other) if other.id() != entry.id() => Err(AppError::Conflict(format!(
                "a credential entry named '{}' already exists",
                entry.display_name()
            ))),
            _ => Ok(()),
        }
    }
}

#[cfg(test)]
mod tests;
