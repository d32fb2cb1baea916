//! Per-principal visibility of credential entries.
//!
//! Rules are evaluated in order and the first match wins:
//!
//! 1. administrators see everything;
//! 2. entries tagged [`GLOBAL_BROADCAST_TAG`] are visible to everyone;
//! 3. a private entry is visible to its owner;
//! 4. an entry sharing at least one tag with the principal is visible.
//!
//! Anything else is hidden.

use serde::{Deserialize, Serialize};

use crate::credential::{CredentialEntry, GLOBAL_BROADCAST_TAG};
use crate::principal::Principal;

/// Rule that granted visibility.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum VisibilityGrant {
    /// The principal is an administrator.
    Admin,
    /// The entry carries the broadcast tag.
    Broadcast,
    /// The principal owns the private entry.
    Owner,
    /// The entry and the principal share a tag.
    SharedTag,
}

/// Returns the rule that makes `entry` visible to `principal`, if any.
#[must_use]
pub fn resolve(entry: &CredentialEntry, principal: &Principal) -> Option<VisibilityGrant> {
    if principal.is_admin() {
        return Some(VisibilityGrant::Admin);
    }

    if entry.tags().contains(GLOBAL_BROADCAST_TAG) {
        return Some(VisibilityGrant::Broadcast);
    }

    if entry.owner_principal_id() == Some(principal.id()) {
        return Some(VisibilityGrant::Owner);
    }

    if !entry.tags().is_disjoint(principal.tags()) {
        return Some(VisibilityGrant::SharedTag);
    }

    None
}

/// Returns whether `principal` may see `entry`.
#[must_use]
pub fn is_visible(entry: &CredentialEntry, principal: &Principal) -> bool {
    resolve(entry, principal).is_some()
}

/// Keeps the entries visible to `principal`, preserving input order.
pub fn list_visible<I>(entries: I, principal: &Principal) -> Vec<CredentialEntry>
where
    I: IntoIterator<Item = CredentialEntry>,
{
    entries
        .into_iter()
        .filter(|entry| is_visible(entry, principal))
        .collect()
}
