use std::sync::Arc;

use otpdesk_core::AppError;
use otpdesk_domain::{Role, GLOBAL_BROADCAST_TAG, PRIVATE_ENTRY_TAG};

use super::CredentialService;
use crate::test_fakes::{
    FakeCredentialRepository, global_entry, mail_input, principal, totp_input,
};

#[tokio::test]
async fn admin_creates_global_entries_with_given_tags() {
    let service = CredentialService::new(Arc::new(FakeCredentialRepository::default()));
    let admin = principal("root", Role::Admin, &[]);

    let entry = service
        .create(&admin, totp_input("Acme", &[GLOBAL_BROADCAST_TAG]))
        .await
        .unwrap_or_else(|error| panic!("create: {error}"));

    assert!(!entry.is_private());
    assert!(entry.tags().contains(GLOBAL_BROADCAST_TAG));
}

#[tokio::test]
async fn user_creates_private_entries_with_forced_tag() {
    let service = CredentialService::new(Arc::new(FakeCredentialRepository::default()));
    let user = principal("u1", Role::User, &["Treino"]);

    let entry = service
        .create(&user, totp_input("Mine", &[GLOBAL_BROADCAST_TAG]))
        .await
        .unwrap_or_else(|error| panic!("create: {error}"));

    assert!(entry.is_private());
    assert_eq!(entry.owner_principal_id(), Some(user.id()));
    assert!(entry.tags().contains(PRIVATE_ENTRY_TAG));
    assert!(!entry.tags().contains(GLOBAL_BROADCAST_TAG));

    let visible = service.list_visible(&user).await.unwrap_or_default();
    assert_eq!(visible.len(), 1);
    let other = principal("u2", Role::User, &["Treino"]);
    assert!(service.list_visible(&other).await.unwrap_or_default().is_empty());
}

#[tokio::test]
async fn duplicate_display_name_is_a_conflict() {
    let repository = FakeCredentialRepository::with_entries(vec![global_entry(totp_input(
        "Acme",
        &[],
    ))]);
    let service = CredentialService::new(Arc::new(repository));

    let result = service
        .create(&principal("root", Role::Admin, &[]), totp_input("Acme", &[]))
        .await;

    assert!(matches!(result, Err(AppError::Conflict(_))));
}

#[tokio::test]
async fn hidden_entries_read_as_missing() {
    let entry = global_entry(totp_input("Premium only", &["Premium"]));
    let id = entry.id();
    let service = CredentialService::new(Arc::new(FakeCredentialRepository::with_entries(vec![
        entry,
    ])));

    let result = service.get(&principal("u1", Role::User, &[]), id).await;

    assert!(matches!(result, Err(AppError::NotFound(_))));
}

#[tokio::test]
async fn users_cannot_edit_global_entries_they_can_see() {
    let entry = global_entry(totp_input("Acme", &[GLOBAL_BROADCAST_TAG]));
    let id = entry.id();
    let service = CredentialService::new(Arc::new(FakeCredentialRepository::with_entries(vec![
        entry,
    ])));

    let result = service
        .update(&principal("u1", Role::User, &[]), id, totp_input("Renamed", &[]))
        .await;

    assert!(matches!(result, Err(AppError::Forbidden(_))));
}

#[tokio::test]
async fn owner_edits_keep_the_private_envelope() {
    let service = CredentialService::new(Arc::new(FakeCredentialRepository::default()));
    let user = principal("u1", Role::User, &[]);
    let created = service
        .create(&user, totp_input("Mine", &[]))
        .await
        .unwrap_or_else(|error| panic!("create: {error}"));

    let updated = service
        .update(&user, created.id(), mail_input("Mine v2", &[GLOBAL_BROADCAST_TAG]))
        .await
        .unwrap_or_else(|error| panic!("update: {error}"));

    assert_eq!(updated.display_name().as_str(), "Mine v2");
    assert!(updated.is_private());
    assert!(!updated.tags().contains(GLOBAL_BROADCAST_TAG));
    assert!(updated.mail_settings().is_some());
}

#[tokio::test]
async fn last_entry_cannot_be_deleted() {
    let first = global_entry(totp_input("Acme", &[]));
    let second = global_entry(totp_input("Globex", &[]));
    let (first_id, second_id) = (first.id(), second.id());
    let service = CredentialService::new(Arc::new(FakeCredentialRepository::with_entries(vec![
        first, second,
    ])));
    let admin = principal("root", Role::Admin, &[]);

    assert!(service.delete(&admin, first_id).await.is_ok());
    assert!(matches!(
        service.delete(&admin, second_id).await,
        Err(AppError::Conflict(_))
    ));
    assert_eq!(service.list_visible(&admin).await.unwrap_or_default().len(), 1);
}

#[tokio::test]
async fn mail_entries_are_listed_for_polling() {
    let service = CredentialService::new(Arc::new(FakeCredentialRepository::with_entries(vec![
        global_entry(totp_input("Acme", &[])),
        global_entry(mail_input("Mailer", &[])),
    ])));

    let entries = service.list_mail_entries().await.unwrap_or_default();

    assert_eq!(entries.len(), 1);
    assert_eq!(entries[0].display_name().as_str(), "Mailer");
}
