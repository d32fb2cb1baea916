//! Mailbox polling pipeline: fetch, extract, upsert.
//!
//! The gateway covers the session stages (connect, search, fetch, parse) and
//! this service drives the rest: sender check, cascade extraction, and the
//! idempotent write of the code cache keyed by provider display name.

use std::collections::HashSet;
use std::sync::{Arc, Mutex};

use chrono::{Local, NaiveDate, Utc};
use otpdesk_core::{AppError, AppResult};
use otpdesk_domain::{CodeExtractor, CredentialEntryId, Principal, StageKind};
use serde::Serialize;
use tracing::{debug, info, warn};

use crate::CredentialService;
use crate::credential_ports::{
    CredentialRepository, MailCheckRequest, MailboxGateway, MailboxQuery,
};

/// Terminal result of a successful mail check.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum MailCheckOutcome {
    /// No qualifying message, or no code in it.
    NoCodeFound,
    /// A code was found but no entry carries the provider name.
    EntryNotFound {
        /// Extracted code.
        code: String,
    },
    /// The stored code already equals the extracted one.
    CodeUnchanged {
        /// Extracted code.
        code: String,
    },
    /// The stored code was replaced.
    CodeUpdated {
        /// Extracted code.
        code: String,
        /// Cascade stage that matched.
        stage: StageKind,
    },
}

impl MailCheckOutcome {
    /// Returns a stable outcome name.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::NoCodeFound => "no_code_found",
            Self::EntryNotFound { .. } => "entry_not_found",
            Self::CodeUnchanged { .. } => "code_unchanged",
            Self::CodeUpdated { .. } => "code_updated",
        }
    }

    /// Returns a human readable summary.
    #[must_use]
    pub fn message(&self) -> String {
        match self {
            Self::NoCodeFound => "no new code found in the mailbox".to_owned(),
            Self::EntryNotFound { .. } => "code found but no matching entry exists".to_owned(),
            Self::CodeUnchanged { .. } => "code already up to date".to_owned(),
            Self::CodeUpdated { code, .. } => format!("code updated to {code}"),
        }
    }
}

/// Per-outcome counters of a polling sweep.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MailPollSummary {
    /// Entries checked.
    pub checked: usize,
    /// Entries whose code changed.
    pub updated: usize,
    /// Entries whose code was already current.
    pub unchanged: usize,
    /// Entries without a new code.
    pub no_code: usize,
    /// Runs that failed or were skipped.
    pub failed: usize,
}

/// Application service running mail checks.
#[derive(Clone)]
pub struct MailCodeService {
    gateway: Arc<dyn MailboxGateway>,
    repository: Arc<dyn CredentialRepository>,
    credential_service: CredentialService,
    extractor: Arc<CodeExtractor>,
    /// Providers with a run in progress in this process. The API and the
    /// worker each hold their own set; their overlapping runs are made
    /// harmless by the conditional code update.
    in_flight: Arc<Mutex<HashSet<String>>>,
}

impl MailCodeService {
    /// Creates a new mail code service.
    #[must_use]
    pub fn new(
        gateway: Arc<dyn MailboxGateway>,
        repository: Arc<dyn CredentialRepository>,
        credential_service: CredentialService,
        extractor: Arc<CodeExtractor>,
    ) -> Self {
        Self {
            gateway,
            repository,
            credential_service,
            extractor,
            in_flight: Arc::new(Mutex::new(HashSet::new())),
        }
    }

    /// Runs a check for today's local calendar date.
    pub async fn check(&self, request: MailCheckRequest) -> AppResult<MailCheckOutcome> {
        self.check_since(request, Local::now().date_naive()).await
    }

    /// Runs a check considering messages since `since`.
    ///
    /// A second run for a provider whose run is still in progress is rejected
    /// with `Conflict`.
    pub async fn check_since(
        &self,
        request: MailCheckRequest,
        since: NaiveDate,
    ) -> AppResult<MailCheckOutcome> {
        let _guard = InFlightGuard::acquire(&self.in_flight, request.provider_name.as_str())?;
        let provider = request.provider_name.as_str();

        debug!(provider, stage = "connecting", "mail check started");
        let query = MailboxQuery {
            provider_address: request.settings.provider_address.clone(),
            mailbox_address: request.settings.mailbox_address.clone(),
            mailbox_password: request.settings.mailbox_password.clone(),
            since,
        };

        let Some(message) = self.gateway.fetch_latest(&query).await? else {
            debug!(provider, stage = "done", outcome = "no_code_found", "no matching message");
            return Ok(MailCheckOutcome::NoCodeFound);
        };

        let sender = message.sender.as_deref().unwrap_or_default();
        if !request.settings.provider_address.matches(sender) {
            warn!(
                provider,
                sender,
                expected = %request.settings.provider_address,
                "discarding message from unexpected sender"
            );
            return Ok(MailCheckOutcome::NoCodeFound);
        }

        debug!(provider, stage = "extracting", "running extraction cascade");
        let Some(extracted) = self.extractor.extract(&message) else {
            debug!(provider, stage = "done", outcome = "no_code_found", "no code in message");
            return Ok(MailCheckOutcome::NoCodeFound);
        };

        debug!(
            provider,
            stage = "upserting",
            matched_stage = extracted.stage.as_str(),
            "code extracted"
        );
        let Some(entry) = self.repository.find_by_display_name(provider).await? else {
            warn!(provider, "no credential entry carries the provider name");
            return Ok(MailCheckOutcome::EntryNotFound {
                code: extracted.token,
            });
        };

        if entry.last_code() == Some(extracted.token.as_str()) {
            debug!(provider, stage = "done", outcome = "code_unchanged", "code already stored");
            return Ok(MailCheckOutcome::CodeUnchanged {
                code: extracted.token,
            });
        }

        let received_at = extracted.received_at.unwrap_or_else(Utc::now);
        let written = self
            .repository
            .update_last_code_if_changed(entry.id(), extracted.token.as_str(), received_at)
            .await?;

        if !written {
            // Another writer stored the same code between the read and the write.
            return Ok(MailCheckOutcome::CodeUnchanged {
                code: extracted.token,
            });
        }

        info!(
            provider,
            entry_id = %entry.id(),
            matched_stage = extracted.stage.as_str(),
            "mailed code updated"
        );

        Ok(MailCheckOutcome::CodeUpdated {
            code: extracted.token,
            stage: extracted.stage,
        })
    }

    /// Runs a check from operator-supplied parameters. Administrators only.
    pub async fn check_explicit(
        &self,
        actor: &Principal,
        request: MailCheckRequest,
    ) -> AppResult<MailCheckOutcome> {
        if !actor.is_admin() {
            return Err(AppError::Forbidden(format!(
                "principal '{}' may not run mail checks with explicit parameters",
                actor.id()
            )));
        }

        self.check(request).await
    }

    /// Runs a check with the stored configuration of a visible entry.
    pub async fn check_entry(
        &self,
        principal: &Principal,
        id: CredentialEntryId,
    ) -> AppResult<MailCheckOutcome> {
        let entry = self.credential_service.get(principal, id).await?;
        let request = MailCheckRequest::for_entry(&entry).ok_or_else(|| {
            AppError::Validation(format!(
                "credential entry '{}' does not receive codes by mail",
                entry.display_name()
            ))
        })?;

        self.check(request).await
    }

    /// Checks every mail-channel entry once, sequentially.
    ///
    /// Failures are logged and counted, never propagated.
    pub async fn poll_all(&self) -> AppResult<MailPollSummary> {
        let entries = self.credential_service.list_mail_entries().await?;
        let mut summary = MailPollSummary::default();

        for entry in &entries {
            let Some(request) = MailCheckRequest::for_entry(entry) else {
                continue;
            };

            summary.checked += 1;
            match self.check(request).await {
                Ok(MailCheckOutcome::CodeUpdated { .. }) => summary.updated += 1,
                Ok(MailCheckOutcome::CodeUnchanged { .. }) => summary.unchanged += 1,
                Ok(MailCheckOutcome::NoCodeFound | MailCheckOutcome::EntryNotFound { .. }) => {
                    summary.no_code += 1;
                }
                Err(error) => {
                    summary.failed += 1;
                    warn!(
                        provider = %entry.display_name(),
                        error = %error,
                        "mail check failed"
                    );
                }
            }
        }

        Ok(summary)
    }
}

struct InFlightGuard {
    registry: Arc<Mutex<HashSet<String>>>,
    key: String,
}

impl InFlightGuard {
    fn acquire(registry: &Arc<Mutex<HashSet<String>>>, provider: &str) -> AppResult<Self> {
        let key = provider.to_lowercase();
        let mut active = registry
            .lock()
            .map_err(|_| AppError::Internal("mail check registry is poisoned".to_owned()))?;

        if !active.insert(key.clone()) {
            return Err(AppError::Conflict(format!(
                "a mail check for '{provider}' is already running"
            )));
        }

        Ok(Self {
            registry: Arc::clone(registry),
            key,
        })
    }
}

impl Drop for InFlightGuard {
    fn drop(&mut self) {
        if let Ok(mut active) = self.registry.lock() {
            active.remove(&self.key);
        }
    }
}
