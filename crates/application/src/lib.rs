//! Application services and ports.

#![forbid(unsafe_code)]

mod code_service;
mod credential_ports;
mod credential_service;
mod mail_code_service;
mod principal_service;

#[cfg(test)]
mod test_fakes;

pub use code_service::{
    CODE_DIGITS, CodeService, DashboardCode, GeneratedCode, TIME_STEP_SECONDS, UNAVAILABLE_CODE,
};
pub use credential_ports::{
    CredentialRepository, MailCheckRequest, MailboxGateway, MailboxQuery, PrincipalRepository,
    SecretEncryptor, TotpProvider,
};
pub use credential_service::CredentialService;
pub use mail_code_service::{MailCheckOutcome, MailCodeService, MailPollSummary};
pub use principal_service::PrincipalService;
