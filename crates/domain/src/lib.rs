//! Domain entities and invariants.

#![forbid(unsafe_code)]

mod credential;
mod email;
mod mail_code;
mod principal;
mod secret;
mod tags;
mod visibility;

pub use credential::{
    AuthChannel, AuthMode, CredentialEntry, CredentialEntryId, CredentialEntryInput,
    DEFAULT_THEME_COLOR, GLOBAL_BROADCAST_TAG, MailSettings, MailboxPassword, Ownership,
    PRIVATE_ENTRY_TAG,
};
pub use email::EmailAddress;
pub use mail_code::{
    CodeExtractor, DEFAULT_LABEL_WORDS, ExtractedCode, ExtractionStage, HtmlSanitizer,
    MailMessage, StageKind,
};
pub use principal::{Principal, Role};
pub use secret::{CANONICAL_ALPHABET, PLAUSIBLE_KEY_MIN_BYTES, SECRET_MIN_LENGTH, Secret};
pub use tags::{TAG_MAX_LENGTH, TagSet, normalize_tags};
pub use visibility::{VisibilityGrant, is_visible, list_visible, resolve};
