use std::sync::Arc;

use chrono::{DateTime, TimeZone, Utc};
use otpdesk_core::AppError;
use otpdesk_domain::{Role, Secret};

use super::{CodeService, UNAVAILABLE_CODE};
use crate::CredentialService;
use crate::test_fakes::{
    FakeCredentialRepository, FakeTotpProvider, global_entry, mail_input, principal, totp_input,
};

fn at(unix_seconds: i64) -> DateTime<Utc> {
    Utc.timestamp_opt(unix_seconds, 0)
        .single()
        .unwrap_or_else(|| panic!("timestamp {unix_seconds}"))
}

fn service_with(provider: FakeTotpProvider, repository: FakeCredentialRepository) -> CodeService {
    CodeService::new(
        Arc::new(provider),
        CredentialService::new(Arc::new(repository)),
    )
}

fn secret() -> Secret {
    Secret::normalize("JBSWY3DPEHPK3PXP").unwrap_or_else(|_| panic!("secret"))
}

#[test]
fn code_is_stable_within_a_window() {
    let service = service_with(FakeTotpProvider::default(), FakeCredentialRepository::default());

    let window_start = 1_760_000_010;
    let first = service.generate(&secret(), at(window_start));
    let last = service.generate(&secret(), at(window_start + 29));
    let next = service.generate(&secret(), at(window_start + 30));

    let (Ok(first), Ok(last), Ok(next)) = (first, last, next) else {
        panic!("generation failed");
    };
    assert_eq!(first.code, last.code);
    assert_ne!(first.code, next.code);
    assert_eq!(first.seconds_remaining, 30);
    assert_eq!(last.seconds_remaining, 1);
}

#[test]
fn seconds_remaining_counts_down_to_the_boundary() {
    let service = service_with(FakeTotpProvider::default(), FakeCredentialRepository::default());

    let generated = service.generate(&secret(), at(59));
    assert_eq!(generated.map(|code| code.seconds_remaining).ok(), Some(1));
}

#[test]
fn raw_secret_input_is_normalized_first() {
    let service = service_with(FakeTotpProvider::default(), FakeCredentialRepository::default());

    assert!(service.code_for_raw("jbsw y3dp ehpk 3pxp", at(59)).is_ok());
    assert!(matches!(
        service.code_for_raw("nope", at(59)),
        Err(AppError::InvalidSecret(_))
    ));
}

#[test]
fn malformed_provider_output_is_unavailable() {
    let provider = FakeTotpProvider {
        fixed: Some("12a".to_owned()),
    };
    let service = service_with(provider, FakeCredentialRepository::default());

    assert!(matches!(
        service.generate(&secret(), at(59)),
        Err(AppError::GenerationUnavailable(_))
    ));
}

#[test]
fn undecodable_secret_is_unavailable() {
    let service = service_with(FakeTotpProvider::default(), FakeCredentialRepository::default());
    let padded_inside = Secret::normalize("JBSW=Y3DPEHPK3PXP").unwrap_or_else(|_| panic!("secret"));

    assert!(matches!(
        service.generate(&padded_inside, at(59)),
        Err(AppError::GenerationUnavailable(_))
    ));
}

#[tokio::test]
async fn dashboard_isolates_failures_per_entry() {
    let mail = global_entry(mail_input("Mailer", &["Único"]))
        .with_code_cache(Some("YPDG".to_owned()), Some(at(1_000)));
    let repository = FakeCredentialRepository::with_entries(vec![
        global_entry(totp_input("Acme", &["Único"])),
        mail,
        global_entry(totp_input("Hidden", &["Premium"])),
    ]);
    let provider = FakeTotpProvider {
        fixed: Some("bad".to_owned()),
    };
    let service = service_with(provider, repository);

    let rows = service
        .dashboard_codes(&principal("u1", Role::User, &[]), at(59))
        .await
        .unwrap_or_else(|error| panic!("dashboard: {error}"));

    assert_eq!(rows.len(), 2);
    assert_eq!(rows[0].display_name, "Acme");
    assert_eq!(rows[0].code.as_deref(), Some(UNAVAILABLE_CODE));
    assert_eq!(rows[0].seconds_remaining, Some(1));
    assert_eq!(rows[1].display_name, "Mailer");
    assert_eq!(rows[1].code.as_deref(), Some("YPDG"));
    assert_eq!(rows[1].received_at, Some(at(1_000)));
}
