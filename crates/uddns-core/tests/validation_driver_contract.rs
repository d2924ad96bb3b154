//! Contract Test: Credential Validation Driver
//!
//! Constraints verified:
//! - Steps report progress in order and end with logout
//! - The first failure is surfaced as a report, never retried
//! - Cancellation is distinguishable from a timeout
//! - Empty fields are rejected before any client is created

mod common;

use common::*;
use std::sync::Mutex;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use uddns_core::error::codes;
use uddns_core::{CredentialValidator, Credentials, Error, ValidationOutcome, ValidationStep};

fn no_progress(_: ValidationStep, _: u8) {}

fn credentials() -> Credentials {
    mock_config().credentials()
}

#[tokio::test]
async fn valid_credentials_report_progress_in_order() {
    let registrar = MockRegistrar::new("1.2.3.4").with_record("id1", "1.2.3.4");
    let validator = CredentialValidator::new(registrar.registry());
    let steps = Mutex::new(Vec::new());
    let progress = |step: ValidationStep, percent: u8| steps.lock().unwrap().push((step, percent));

    let outcome = validator
        .run(REGISTRAR, &credentials(), &progress, &CancellationToken::new())
        .await;

    match outcome {
        ValidationOutcome::Valid {
            main_domain,
            record_count,
        } => {
            assert_eq!(main_domain.as_str(), "example.com");
            assert_eq!(record_count, Some(1));
        }
        other => panic!("expected valid, got {:?}", other),
    }
    assert_eq!(
        steps.into_inner().unwrap(),
        vec![
            (ValidationStep::Authenticating, 10),
            (ValidationStep::ResolvingDomain, 20),
            (ValidationStep::ListingRecords, 25),
            (ValidationStep::LoggingOut, 30),
            (ValidationStep::Complete, 100),
        ]
    );
    assert!(!registrar.calls().contains(&Call::CurrentIp));
    assert!(registrar.writes().is_empty());
    assert_eq!(registrar.calls().last(), Some(&Call::Logout));
}

#[tokio::test]
async fn listing_can_be_skipped() {
    let registrar = MockRegistrar::new("1.2.3.4");
    let validator = CredentialValidator::new(registrar.registry()).with_list_records(false);

    let outcome = validator
        .run(REGISTRAR, &credentials(), &no_progress, &CancellationToken::new())
        .await;

    assert!(matches!(
        outcome,
        ValidationOutcome::Valid {
            record_count: None,
            ..
        }
    ));
    assert!(
        !registrar
            .calls()
            .iter()
            .any(|c| matches!(c, Call::ListRecords { .. }))
    );
}

#[tokio::test]
async fn auth_failure_reports_code_and_registrar_url() {
    let registrar = MockRegistrar::new("1.2.3.4");
    registrar.fail_next(
        Step::Authenticate,
        Error::auth(codes::INVALID_SESSION_TOKEN, "Session token 'zz' is malformed"),
    );
    let validator = CredentialValidator::new(registrar.registry());

    let outcome = validator
        .run(REGISTRAR, &credentials(), &no_progress, &CancellationToken::new())
        .await;

    let report = match outcome {
        ValidationOutcome::Failed(report) => report,
        other => panic!("expected failure, got {:?}", other),
    };
    assert_eq!(report.code, codes::INVALID_SESSION_TOKEN);
    assert_eq!(report.url.as_deref(), Some(INFO_URL));
    // Not retried.
    let auth_calls = registrar
        .calls()
        .iter()
        .filter(|c| matches!(c, Call::Authenticate { .. }))
        .count();
    assert_eq!(auth_calls, 1);
}

#[tokio::test]
async fn failure_after_authentication_logs_out() {
    let registrar = MockRegistrar::new("1.2.3.4").with_owned_domains(&[]);
    let validator = CredentialValidator::new(registrar.registry());

    let outcome = validator
        .run(REGISTRAR, &credentials(), &no_progress, &CancellationToken::new())
        .await;

    assert_eq!(outcome.code(), Some(codes::NO_DOMAINS));
    assert_eq!(registrar.calls().last(), Some(&Call::Logout));
}

#[tokio::test]
async fn empty_fields_fail_before_any_client_exists() {
    let registrar = MockRegistrar::new("1.2.3.4");
    let validator = CredentialValidator::new(registrar.registry());

    let outcome = validator
        .run(
            REGISTRAR,
            &Credentials::new("", "ENCRYPTED:c2VjcmV0", DOMAIN),
            &no_progress,
            &CancellationToken::new(),
        )
        .await;

    assert_eq!(outcome.code(), Some(codes::EMPTY_USERNAME));
    assert_eq!(registrar.clients_created(), 0);
}

#[tokio::test]
async fn unknown_registrar_is_reported() {
    let registrar = MockRegistrar::new("1.2.3.4");
    let validator = CredentialValidator::new(registrar.registry());

    let outcome = validator
        .run("Nowhere", &credentials(), &no_progress, &CancellationToken::new())
        .await;

    assert_eq!(outcome.code(), Some(codes::UNSUPPORTED_REGISTRAR));
}

#[tokio::test]
async fn cancellation_is_not_a_timeout() {
    let registrar = MockRegistrar::new("1.2.3.4");
    registrar.hang_at(Step::ResolveMainDomain);
    let validator = CredentialValidator::new(registrar.registry());
    let cancel = CancellationToken::new();

    let canceller = {
        let cancel = cancel.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(20)).await;
            cancel.cancel();
        })
    };

    let outcome = validator
        .run(REGISTRAR, &credentials(), &no_progress, &cancel)
        .await;
    canceller.await.unwrap();

    assert_eq!(outcome, ValidationOutcome::Cancelled);
    assert!(!outcome.is_timeout());
}

#[tokio::test(start_paused = true)]
async fn deadline_is_reported_as_timeout() {
    let registrar = MockRegistrar::new("1.2.3.4");
    registrar.hang_at(Step::ResolveMainDomain);
    let validator =
        CredentialValidator::new(registrar.registry()).with_timeout(Duration::from_secs(10));

    let outcome = validator
        .run(REGISTRAR, &credentials(), &no_progress, &CancellationToken::new())
        .await;

    assert!(outcome.is_timeout(), "{:?}", outcome);
    let ValidationOutcome::Failed(report) = outcome else {
        panic!("expected a failed outcome");
    };
    let details = report.details.unwrap_or_default();
    assert!(!details.contains("URL:"), "{}", details);
    assert!(details.contains("did not finish within"), "{}", details);
    assert_eq!(report.url, None);
}

#[test]
fn blocking_entry_point_drives_the_validator() {
    let registrar = MockRegistrar::new("1.2.3.4");
    let validator = CredentialValidator::new(registrar.registry());

    let outcome = validator
        .run_blocking(REGISTRAR, &credentials(), &no_progress, &CancellationToken::new())
        .expect("runtime builds");

    assert!(matches!(outcome, ValidationOutcome::Valid { .. }));
}
