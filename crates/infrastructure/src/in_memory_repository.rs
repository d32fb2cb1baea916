use std::collections::HashMap;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use otpdesk_application::{CredentialRepository, PrincipalRepository};
use otpdesk_core::{AppError, AppResult, PrincipalId};
use otpdesk_domain::{CredentialEntry, CredentialEntryId, Principal};
use tokio::sync::RwLock;

/// In-memory credential repository implementation.
#[derive(Debug, Default)]
pub struct InMemoryCredentialRepository {
    entries: RwLock<HashMap<CredentialEntryId, CredentialEntry>>,
}

impl InMemoryCredentialRepository {
    /// Creates an empty in-memory repository.
    #[must_use]
    pub fn new() -> Self {
        Self {
            entries: RwLock::new(HashMap::new()),
        }
    }
}

#[async_trait]
impl CredentialRepository for InMemoryCredentialRepository {
    async fn list_entries(&self) -> AppResult<Vec<CredentialEntry>> {
        let entries = self.entries.read().await;

        let mut values: Vec<CredentialEntry> = entries.values().cloned().collect();
        values.sort_by(|left, right| {
            left.display_name()
                .as_str()
                .cmp(right.display_name().as_str())
        });
        Ok(values)
    }

    async fn find_entry(&self, id: CredentialEntryId) -> AppResult<Option<CredentialEntry>> {
        Ok(self.entries.read().await.get(&id).cloned())
    }

    async fn find_by_display_name(
        &self,
        display_name: &str,
    ) -> AppResult<Option<CredentialEntry>> {
        Ok(self
            .entries
            .read()
            .await
            .values()
            .find(|entry| entry.display_name().as_str() == display_name)
            .cloned())
    }

    async fn save_entry(&self, entry: CredentialEntry) -> AppResult<()> {
        let mut entries = self.entries.write().await;

        if entries.values().any(|existing| {
            existing.id() != entry.id() && existing.display_name() == entry.display_name()
        }) {
            return Err(AppError::Conflict(format!(
                "a credential entry named '{}' already exists",
                entry.display_name()
            )));
        }

        let entry = match entries.get(&entry.id()) {
            Some(existing) if existing.auth_mode() == entry.auth_mode() => entry.with_code_cache(
                existing.last_code().map(str::to_owned),
                existing.last_code_at(),
            ),
            Some(_) => entry.with_code_cache(None, None),
            None => entry,
        };

        entries.insert(entry.id(), entry);
        Ok(())
    }

    async fn delete_entry_unless_last(&self, id: CredentialEntryId) -> AppResult<bool> {
        let mut entries = self.entries.write().await;

        if !entries.contains_key(&id) {
            return Err(AppError::NotFound(format!(
                "credential entry '{id}' not found"
            )));
        }

        if entries.len() <= 1 {
            return Ok(false);
        }

        entries.remove(&id);
        Ok(true)
    }

    async fn update_last_code_if_changed(
        &self,
        id: CredentialEntryId,
        code: &str,
        received_at: DateTime<Utc>,
    ) -> AppResult<bool> {
        let mut entries = self.entries.write().await;
        let entry = entries
            .get_mut(&id)
            .ok_or_else(|| AppError::NotFound(format!("credential entry '{id}' not found")))?;

        Ok(entry.record_code(code, received_at))
    }
}

/// In-memory principal repository implementation.
#[derive(Debug, Default)]
pub struct InMemoryPrincipalRepository {
    principals: RwLock<HashMap<PrincipalId, Principal>>,
}

impl InMemoryPrincipalRepository {
    /// Creates a repository seeded with `principals`.
    #[must_use]
    pub fn with_principals(principals: impl IntoIterator<Item = Principal>) -> Self {
        Self {
            principals: RwLock::new(
                principals
                    .into_iter()
                    .map(|principal| (principal.id().clone(), principal))
                    .collect(),
            ),
        }
    }
}

#[async_trait]
impl PrincipalRepository for InMemoryPrincipalRepository {
    async fn find_principal(&self, id: &PrincipalId) -> AppResult<Option<Principal>> {
        Ok(self.principals.read().await.get(id).cloned())
    }

    async fn list_principals(&self) -> AppResult<Vec<Principal>> {
        let mut values: Vec<Principal> = self.principals.read().await.values().cloned().collect();
        values.sort_by(|left, right| left.email().as_str().cmp(right.email().as_str()));
        Ok(values)
    }

    async fn save_principal(&self, principal: Principal) -> AppResult<()> {
        self.principals
            .write()
            .await
            .insert(principal.id().clone(), principal);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use chrono::Utc;
    use otpdesk_application::CredentialRepository;
    use otpdesk_core::AppError;
    use otpdesk_domain::{
        AuthChannel, CredentialEntry, CredentialEntryId, CredentialEntryInput, EmailAddress,
        MailSettings, MailboxPassword, Ownership, Secret,
    };

    use super::InMemoryCredentialRepository;

    fn input(name: &str) -> CredentialEntryInput {
        CredentialEntryInput {
            display_name: name.to_owned(),
            full_name: String::new(),
            theme_color: String::new(),
            logo: String::new(),
            tags: Vec::new(),
            channel: AuthChannel::Totp {
                secret: Secret::normalize("JBSWY3DPEHPK3PXP").unwrap_or_else(|_| panic!("secret")),
            },
        }
    }

    fn entry(name: &str) -> CredentialEntry {
        CredentialEntry::new(CredentialEntryId::new(), input(name), Ownership::Global)
            .unwrap_or_else(|_| panic!("entry"))
    }

    #[tokio::test]
    async fn entries_are_listed_by_display_name() {
        let repository = InMemoryCredentialRepository::new();
        for name in ["Zeta", "Acme", "Mid"] {
            assert!(repository.save_entry(entry(name)).await.is_ok());
        }

        let names = repository
            .list_entries()
            .await
            .unwrap_or_default()
            .iter()
            .map(|entry| entry.display_name().as_str().to_owned())
            .collect::<Vec<_>>();
        assert_eq!(names, vec!["Acme", "Mid", "Zeta"]);
    }

    #[tokio::test]
    async fn duplicate_display_name_conflicts() {
        let repository = InMemoryCredentialRepository::new();
        assert!(repository.save_entry(entry("Acme")).await.is_ok());

        assert!(matches!(
            repository.save_entry(entry("Acme")).await,
            Err(AppError::Conflict(_))
        ));
    }

    #[tokio::test]
    async fn conditional_code_update_is_idempotent() {
        let repository = InMemoryCredentialRepository::new();
        let stored = entry("Acme");
        let id = stored.id();
        assert!(repository.save_entry(stored).await.is_ok());

        let first = repository
            .update_last_code_if_changed(id, "482913", Utc::now())
            .await;
        let second = repository
            .update_last_code_if_changed(id, "482913", Utc::now())
            .await;

        assert_eq!(first.ok(), Some(true));
        assert_eq!(second.ok(), Some(false));
    }

    #[tokio::test]
    async fn saving_an_edit_keeps_a_code_recorded_meanwhile() {
        let repository = InMemoryCredentialRepository::new();
        let stored = entry("Acme");
        let id = stored.id();
        assert!(repository.save_entry(stored).await.is_ok());

        let mut edited = repository
            .find_entry(id)
            .await
            .ok()
            .flatten()
            .unwrap_or_else(|| panic!("stored entry"));
        assert_eq!(
            repository
                .update_last_code_if_changed(id, "482913", Utc::now())
                .await
                .ok(),
            Some(true)
        );

        let mut input = input("Acme Corp");
        input.full_name = "Acme Corporation".to_owned();
        assert!(edited.apply_update(input).is_ok());
        assert!(repository.save_entry(edited).await.is_ok());

        let reloaded = repository
            .find_entry(id)
            .await
            .ok()
            .flatten()
            .unwrap_or_else(|| panic!("reloaded entry"));
        assert_eq!(reloaded.display_name().as_str(), "Acme Corp");
        assert_eq!(reloaded.last_code(), Some("482913"));
    }

    #[tokio::test]
    async fn switching_channel_clears_the_stored_code() {
        let repository = InMemoryCredentialRepository::new();
        let stored = entry("Acme");
        let id = stored.id();
        assert!(repository.save_entry(stored.clone()).await.is_ok());
        assert!(
            repository
                .update_last_code_if_changed(id, "482913", Utc::now())
                .await
                .is_ok()
        );

        let mut edited = stored;
        let mut input = input("Acme");
        input.channel = AuthChannel::Mail(MailSettings {
            provider_address: EmailAddress::new("no-reply@provider.com")
                .unwrap_or_else(|_| panic!("address")),
            mailbox_address: EmailAddress::new("codes@desk.example")
                .unwrap_or_else(|_| panic!("address")),
            mailbox_password: MailboxPassword::new("hunter2")
                .unwrap_or_else(|_| panic!("password")),
        });
        assert!(edited.apply_update(input).is_ok());
        assert!(repository.save_entry(edited).await.is_ok());

        let reloaded = repository.find_entry(id).await.ok().flatten();
        assert_eq!(reloaded.as_ref().and_then(CredentialEntry::last_code), None);
        assert_eq!(reloaded.and_then(|entry| entry.last_code_at()), None);
    }

    #[tokio::test]
    async fn last_entry_is_kept() {
        let repository = InMemoryCredentialRepository::new();
        let only = entry("Acme");
        let id = only.id();
        assert!(repository.save_entry(only).await.is_ok());

        assert_eq!(repository.delete_entry_unless_last(id).await.ok(), Some(false));
        assert!(matches!(
            repository
                .delete_entry_unless_last(CredentialEntryId::new())
                .await,
            Err(AppError::NotFound(_))
        ));
    }
}
