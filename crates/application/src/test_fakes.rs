use std::sync::atomic::{AtomicUsize, Ordering};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use otpdesk_core::{AppError, AppResult, PrincipalId};
use otpdesk_domain::{
    AuthChannel, CredentialEntry, CredentialEntryId, CredentialEntryInput, EmailAddress,
    MailMessage, MailSettings, MailboxPassword, Ownership, Principal, Role, Secret,
};
use tokio::sync::{Mutex, Notify};

use crate::credential_ports::{
    CredentialRepository, MailboxGateway, MailboxQuery, PrincipalRepository, TotpProvider,
};

#[derive(Default)]
pub(crate) struct FakeCredentialRepository {
    entries: Mutex<Vec<CredentialEntry>>,
    pub(crate) code_writes: AtomicUsize,
}

impl FakeCredentialRepository {
    pub(crate) fn with_entries(entries: Vec<CredentialEntry>) -> Self {
        Self {
            entries: Mutex::new(entries),
            code_writes: AtomicUsize::new(0),
        }
    }

    pub(crate) async fn snapshot(&self, id: CredentialEntryId) -> Option<CredentialEntry> {
        self.entries
            .lock()
            .await
            .iter()
            .find(|entry| entry.id() == id)
            .cloned()
    }
}

#[async_trait]
impl CredentialRepository for FakeCredentialRepository {
    async fn list_entries(&self) -> AppResult<Vec<CredentialEntry>> {
        let mut entries = self.entries.lock().await.clone();
        entries.sort_by(|left, right| left.display_name().as_str().cmp(right.display_name().as_str()));
        Ok(entries)
    }

    async fn find_entry(&self, id: CredentialEntryId) -> AppResult<Option<CredentialEntry>> {
        Ok(self.snapshot(id).await)
    }

    async fn find_by_display_name(
        &self,
        display_name: &str,
    ) -> AppResult<Option<CredentialEntry>> {
        Ok(self
            .entries
            .lock()
            .await
            .iter()
            .find(|entry| entry.display_name().as_str() == display_name)
            .cloned())
    }

    async fn save_entry(&self, entry: CredentialEntry) -> AppResult<()> {
        let mut entries = self.entries.lock().await;
        if entries.iter().any(|existing| {
            existing.id() != entry.id() && existing.display_name() == entry.display_name()
        }) {
            return Err(AppError::Conflict("duplicate display name".to_owned()));
        }

        match entries.iter_mut().find(|existing| existing.id() == entry.id()) {
            Some(existing) => *existing = entry,
            None => entries.push(entry),
        }
        Ok(())
    }

    async fn delete_entry_unless_last(&self, id: CredentialEntryId) -> AppResult<bool> {
        let mut entries = self.entries.lock().await;
        if entries.len() <= 1 {
            return Ok(false);
        }

        entries.retain(|entry| entry.id() != id);
        Ok(true)
    }

    async fn update_last_code_if_changed(
        &self,
        id: CredentialEntryId,
        code: &str,
        received_at: DateTime<Utc>,
    ) -> AppResult<bool> {
        let mut entries = self.entries.lock().await;
        let entry = entries
            .iter_mut()
            .find(|entry| entry.id() == id)
            .ok_or_else(|| AppError::NotFound(format!("entry '{id}'")))?;

        let written = entry.record_code(code, received_at);
        if written {
            self.code_writes.fetch_add(1, Ordering::SeqCst);
        }
        Ok(written)
    }
}

#[derive(Default)]
pub(crate) struct FakePrincipalRepository {
    principals: Mutex<Vec<Principal>>,
}

impl FakePrincipalRepository {
    pub(crate) fn with_principals(principals: Vec<Principal>) -> Self {
        Self {
            principals: Mutex::new(principals),
        }
    }
}

#[async_trait]
impl PrincipalRepository for FakePrincipalRepository {
    async fn find_principal(&self, id: &PrincipalId) -> AppResult<Option<Principal>> {
        Ok(self
            .principals
            .lock()
            .await
            .iter()
            .find(|principal| principal.id() == id)
            .cloned())
    }

    async fn list_principals(&self) -> AppResult<Vec<Principal>> {
        Ok(self.principals.lock().await.clone())
    }

    async fn save_principal(&self, principal: Principal) -> AppResult<()> {
        let mut principals = self.principals.lock().await;
        principals.retain(|existing| existing.id() != principal.id());
        principals.push(principal);
        Ok(())
    }
}

/// Returns the window counter as the code, or a fixed answer.
#[derive(Default)]
pub(crate) struct FakeTotpProvider {
    pub(crate) fixed: Option<String>,
}

impl TotpProvider for FakeTotpProvider {
    fn code_at(&self, _key: &[u8], unix_seconds: u64) -> AppResult<String> {
        Ok(self
            .fixed
            .clone()
            .unwrap_or_else(|| format!("{:06}", (unix_seconds / 30) % 1_000_000)))
    }
}

#[derive(Default)]
pub(crate) struct FakeMailboxGateway {
    pub(crate) message: Option<MailMessage>,
    pub(crate) refuse_connection: bool,
    pub(crate) hold: bool,
    pub(crate) entered: Notify,
    pub(crate) release: Notify,
    pub(crate) calls: AtomicUsize,
}

#[async_trait]
impl MailboxGateway for FakeMailboxGateway {
    async fn fetch_latest(&self, _query: &MailboxQuery) -> AppResult<Option<MailMessage>> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if self.hold {
            self.entered.notify_one();
            self.release.notified().await;
        }

        if self.refuse_connection {
            return Err(AppError::MailConnect("connection refused".to_owned()));
        }

        Ok(self.message.clone())
    }
}

pub(crate) fn principal(id: &str, role: Role, tags: &[&str]) -> Principal {
    Principal::new(
        PrincipalId::new(id).unwrap_or_else(|_| panic!("principal id")),
        EmailAddress::new(format!("{id}@desk.example")).unwrap_or_else(|_| panic!("email")),
        role,
        tags.iter().copied(),
    )
    .unwrap_or_else(|_| panic!("principal"))
}

pub(crate) fn totp_input(display_name: &str, tags: &[&str]) -> CredentialEntryInput {
    CredentialEntryInput {
        display_name: display_name.to_owned(),
        full_name: String::new(),
        theme_color: String::new(),
        logo: String::new(),
        tags: tags.iter().map(|tag| (*tag).to_owned()).collect(),
        channel: AuthChannel::Totp {
            secret: Secret::normalize("JBSWY3DPEHPK3PXP").unwrap_or_else(|_| panic!("secret")),
        },
    }
}

pub(crate) fn mail_settings() -> MailSettings {
    MailSettings {
        provider_address: EmailAddress::new("no-reply@provider.com")
            .unwrap_or_else(|_| panic!("address")),
        mailbox_address: EmailAddress::new("codes@desk.example")
            .unwrap_or_else(|_| panic!("address")),
        mailbox_password: MailboxPassword::new("hunter2").unwrap_or_else(|_| panic!("password")),
    }
}

pub(crate) fn mail_input(display_name: &str, tags: &[&str]) -> CredentialEntryInput {
    CredentialEntryInput {
        channel: AuthChannel::Mail(mail_settings()),
        ..totp_input(display_name, tags)
    }
}

pub(crate) fn global_entry(input: CredentialEntryInput) -> CredentialEntry {
    CredentialEntry::new(CredentialEntryId::new(), input, Ownership::Global)
        .unwrap_or_else(|error| panic!("entry: {error}"))
}
