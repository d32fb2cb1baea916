//! Infrastructure adapters for application ports.

#![forbid(unsafe_code)]

mod aes_secret_encryptor;
mod imap_mailbox_gateway;
mod in_memory_repository;
mod postgres_credential_repository;
mod postgres_principal_repository;
mod totp_provider;

pub use aes_secret_encryptor::AesSecretEncryptor;
pub use imap_mailbox_gateway::{ImapMailboxGateway, ImapSettings};
pub use in_memory_repository::{InMemoryCredentialRepository, InMemoryPrincipalRepository};
pub use postgres_credential_repository::PostgresCredentialRepository;
pub use postgres_principal_repository::PostgresPrincipalRepository;
pub use totp_provider::TotpRsProvider;
