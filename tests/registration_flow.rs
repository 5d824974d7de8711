//! End-to-end workflow tests: registration through payment completion,
//! attendance verification and refund, against an in-memory store and a
//! mocked payment gateway.

use std::sync::Arc;
use std::time::Duration;

use httpmock::prelude::*;

use festpass::{
    AttendanceOutcome, FeePolicy, GatewayConfig, LedgerMirror, Notifier, PaymentGateway,
    PaymentStatus, PendingStore, Registrar, RegistrantStore, RegistrationError,
    RegistrationInput, StartOutcome, WaiverMode,
};

struct Harness {
    registrar: Arc<Registrar>,
    store: RegistrantStore,
    server: MockServer,
    _dir: tempfile::TempDir,
}

async fn harness_with_policy(policy: FeePolicy) -> Harness {
    let server = MockServer::start_async().await;
    let dir = tempfile::tempdir().unwrap();
    let store = RegistrantStore::in_memory().unwrap();
    let registrar = Registrar::new(
        store.clone(),
        LedgerMirror::new(dir.path().join("ledger.csv")).unwrap(),
        PendingStore::new(Duration::from_secs(60)),
        PaymentGateway::new(&GatewayConfig {
            key_id: "key_test".to_string(),
            key_secret: "secret_test".to_string(),
            base_url: server.base_url(),
        }),
        Notifier::disabled(),
        festpass::ArtifactStore::new(dir.path()).unwrap(),
        policy,
        "FEST2025".to_string(),
    );
    Harness {
        registrar: Arc::new(registrar),
        store,
        server,
        _dir: dir,
    }
}

async fn harness() -> Harness {
    harness_with_policy(FeePolicy::default()).await
}

fn asha() -> RegistrationInput {
    RegistrationInput {
        name: "Asha".to_string(),
        email: "asha@example.com".to_string(),
        phone: "9000000001".to_string(),
        semester: 3,
        party_size: 2,
    }
}

fn ravi() -> RegistrationInput {
    RegistrationInput {
        name: "Ravi".to_string(),
        email: "ravi@example.com".to_string(),
        phone: "9000000002".to_string(),
        semester: 2,
        party_size: 0,
    }
}

fn mock_order(server: &MockServer, amount: u64) -> httpmock::Mock<'_> {
    server.mock(|when, then| {
        when.method(POST)
            .path("/v1/orders")
            .json_body(serde_json::json!({
                "amount": amount,
                "currency": "INR",
                "payment_capture": 1,
            }));
        then.status(200).json_body(serde_json::json!({
            "id": "order_A1",
            "amount": amount,
            "currency": "INR",
        }));
    })
}

#[tokio::test]
async fn test_full_registration_flow() {
    let h = harness().await;
    // Asha brings two dependents: fee 300 rupees, order in paise
    let order_mock = mock_order(&h.server, 30_000);

    let init = match h.registrar.start(asha()).await.unwrap() {
        StartOutcome::PaymentRequired(init) => init,
        other => panic!("expected PaymentRequired, got {other:?}"),
    };
    order_mock.assert();
    assert_eq!(init.amount, 300);
    assert_eq!(init.amount_minor, 30_000);
    assert_eq!(init.order_id, "order_A1");
    // Nothing durable before payment confirmation
    assert!(h.store.list_all().unwrap().is_empty());

    let reg = h
        .registrar
        .complete(&init.session_token, "pay_123", Some("asha@upi".to_string()))
        .await
        .unwrap();
    assert!(reg.uid.starts_with("FEST2025-"));
    assert_eq!(reg.payment_status, PaymentStatus::Paid);
    assert_eq!(reg.amount_minor, 30_000);
    assert_eq!(reg.order_id.as_deref(), Some("order_A1"));

    // Post-commit artifacts exist on disk
    assert!(h.registrar.artifacts().qr_path(&reg.uid).exists());
    assert!(h.registrar.artifacts().pdf_path(&reg.uid).exists());

    // The staged payload was consumed: replay fails closed
    let err = h
        .registrar
        .complete(&init.session_token, "pay_123", None)
        .await
        .unwrap_err();
    assert!(matches!(err, RegistrationError::SessionExpired));
}

#[tokio::test]
async fn test_duplicate_contact_rejected_before_gateway() {
    let h = harness().await;
    let order_mock = mock_order(&h.server, 30_000);

    let init = match h.registrar.start(asha()).await.unwrap() {
        StartOutcome::PaymentRequired(init) => init,
        other => panic!("unexpected {other:?}"),
    };
    h.registrar
        .complete(&init.session_token, "pay_123", None)
        .await
        .unwrap();

    // Re-registering the same contact is a conflict with no gateway call
    let err = h.registrar.start(asha()).await.unwrap_err();
    assert!(matches!(err, RegistrationError::DuplicateContact));
    assert_eq!(order_mock.hits(), 1);
}

#[tokio::test]
async fn test_failed_persistence_keeps_session_retryable() {
    let h = harness().await;
    mock_order(&h.server, 30_000);
    let init = match h.registrar.start(asha()).await.unwrap() {
        StartOutcome::PaymentRequired(init) => init,
        other => panic!("unexpected {other:?}"),
    };

    // A conflicting contact lands between order creation and completion
    h.store
        .insert(&festpass::NewRegistrant {
            uid: "FEST2025-squatter".to_string(),
            name: "Other".to_string(),
            email: "asha@example.com".to_string(),
            phone: "9000000009".to_string(),
            semester: 2,
            party_size: 0,
            amount_minor: 10_000,
            upi_ref: None,
            payment_id: Some("pay_other".to_string()),
            order_id: None,
            payment_status: PaymentStatus::Paid,
        })
        .unwrap();

    let err = h
        .registrar
        .complete(&init.session_token, "pay_123", None)
        .await
        .unwrap_err();
    assert!(matches!(err, RegistrationError::DuplicateContact));

    // The confirmed payment is not lost: once the conflict clears, the
    // same session token finalizes the registration
    assert!(h.store.delete("FEST2025-squatter").unwrap());
    let reg = h
        .registrar
        .complete(&init.session_token, "pay_123", None)
        .await
        .unwrap();
    assert_eq!(reg.email, "asha@example.com");
    assert_eq!(reg.payment_status, PaymentStatus::Paid);
}

#[tokio::test]
async fn test_validation_short_circuits() {
    let h = harness().await;
    let order_mock = mock_order(&h.server, 30_000);
    let mut input = asha();
    input.party_size = 6;
    let err = h.registrar.start(input).await.unwrap_err();
    assert!(matches!(err, RegistrationError::Validation(_)));
    assert_eq!(order_mock.hits(), 0);
    assert!(h.store.list_all().unwrap().is_empty());
}

#[tokio::test]
async fn test_attendance_verification() {
    let h = harness().await;
    mock_order(&h.server, 30_000);
    let init = match h.registrar.start(asha()).await.unwrap() {
        StartOutcome::PaymentRequired(init) => init,
        other => panic!("unexpected {other:?}"),
    };
    let reg = h
        .registrar
        .complete(&init.session_token, "pay_123", None)
        .await
        .unwrap();

    match h.registrar.verify_attendance(&reg.uid).unwrap() {
        AttendanceOutcome::Marked(r) => assert!(r.attended),
        other => panic!("expected Marked, got {other:?}"),
    }
    assert!(matches!(
        h.registrar.verify_attendance(&reg.uid).unwrap(),
        AttendanceOutcome::AlreadyAttended(_)
    ));
    assert!(matches!(
        h.registrar.verify_attendance("FEST2025-deadbeef").unwrap(),
        AttendanceOutcome::Unknown
    ));
}

#[tokio::test]
async fn test_concurrent_verification_single_success() {
    let h = harness().await;
    mock_order(&h.server, 30_000);
    let init = match h.registrar.start(asha()).await.unwrap() {
        StartOutcome::PaymentRequired(init) => init,
        other => panic!("unexpected {other:?}"),
    };
    let reg = h
        .registrar
        .complete(&init.session_token, "pay_123", None)
        .await
        .unwrap();

    let mut tasks = Vec::new();
    for _ in 0..4 {
        let registrar = h.registrar.clone();
        let uid = reg.uid.clone();
        tasks.push(tokio::spawn(async move {
            matches!(
                registrar.verify_attendance(&uid).unwrap(),
                AttendanceOutcome::Marked(_)
            )
        }));
    }
    let mut wins = 0;
    for task in tasks {
        if task.await.unwrap() {
            wins += 1;
        }
    }
    assert_eq!(wins, 1);
}

#[tokio::test]
async fn test_refund_flow() {
    let h = harness().await;
    mock_order(&h.server, 30_000);
    let init = match h.registrar.start(asha()).await.unwrap() {
        StartOutcome::PaymentRequired(init) => init,
        other => panic!("unexpected {other:?}"),
    };
    let reg = h
        .registrar
        .complete(&init.session_token, "pay_123", None)
        .await
        .unwrap();

    // Refund covers registrant plus dependents
    let refund_mock = h.server.mock(|when, then| {
        when.method(POST)
            .path("/v1/payments/pay_123/refund")
            .json_body(serde_json::json!({ "amount": 30_000 }));
        then.status(200).json_body(serde_json::json!({
            "id": "rfnd_1",
            "amount": 30_000,
        }));
    });

    let refunded = h.registrar.refund(&reg.uid).await.unwrap();
    refund_mock.assert();
    assert!(refunded.refunded);
    assert_eq!(refunded.payment_status, PaymentStatus::Refunded);
    assert_eq!(refunded.refund_id.as_deref(), Some("rfnd_1"));

    // Second attempt is rejected without another gateway call
    let err = h.registrar.refund(&reg.uid).await.unwrap_err();
    assert!(matches!(err, RegistrationError::AlreadyRefunded));
    assert_eq!(refund_mock.hits(), 1);
}

#[tokio::test]
async fn test_refund_rejected_when_not_paid() {
    let h = harness().await;
    h.store
        .insert(&festpass::NewRegistrant {
            uid: "FEST2025-pending1".to_string(),
            name: "Meera".to_string(),
            email: "meera@example.com".to_string(),
            phone: "9000000003".to_string(),
            semester: 1,
            party_size: 0,
            amount_minor: 10_000,
            upi_ref: None,
            payment_id: None,
            order_id: Some("order_B2".to_string()),
            payment_status: PaymentStatus::Pending,
        })
        .unwrap();

    let refund_mock = h.server.mock(|when, then| {
        when.method(POST).path_contains("/refund");
        then.status(200).json_body(serde_json::json!({
            "id": "rfnd_x",
            "amount": 10_000,
        }));
    });

    let err = h.registrar.refund("FEST2025-pending1").await.unwrap_err();
    assert!(matches!(err, RegistrationError::NotPaid));
    assert_eq!(refund_mock.hits(), 0);

    let unchanged = h.store.get("FEST2025-pending1").unwrap().unwrap();
    assert!(!unchanged.refunded);
    assert_eq!(unchanged.payment_status, PaymentStatus::Pending);
}

#[tokio::test]
async fn test_refund_unknown_registrant() {
    let h = harness().await;
    let err = h.registrar.refund("FEST2025-nope").await.unwrap_err();
    assert!(matches!(err, RegistrationError::UnknownRegistrant(_)));
}

#[tokio::test]
async fn test_gateway_failure_leaves_state_unchanged() {
    let h = harness().await;
    mock_order(&h.server, 30_000);
    let init = match h.registrar.start(asha()).await.unwrap() {
        StartOutcome::PaymentRequired(init) => init,
        other => panic!("unexpected {other:?}"),
    };
    let reg = h
        .registrar
        .complete(&init.session_token, "pay_123", None)
        .await
        .unwrap();

    h.server.mock(|when, then| {
        when.method(POST).path("/v1/payments/pay_123/refund");
        then.status(502).body("gateway down");
    });

    let err = h.registrar.refund(&reg.uid).await.unwrap_err();
    assert!(matches!(err, RegistrationError::Gateway(_)));

    // Safe to retry: nothing transitioned
    let unchanged = h.store.get(&reg.uid).unwrap().unwrap();
    assert!(!unchanged.refunded);
    assert_eq!(unchanged.payment_status, PaymentStatus::Paid);
}

#[tokio::test]
async fn test_free_waiver_skips_gateway() {
    let policy = FeePolicy {
        waiver_mode: WaiverMode::Free,
        ..FeePolicy::default()
    };
    let h = harness_with_policy(policy).await;
    let order_mock = mock_order(&h.server, 30_000);

    let mut input = asha();
    input.semester = 1;
    let reg = match h.registrar.start(input).await.unwrap() {
        StartOutcome::Registered(reg) => reg,
        other => panic!("expected Registered, got {other:?}"),
    };
    assert_eq!(order_mock.hits(), 0);
    assert_eq!(reg.amount_minor, 0);
    assert_eq!(reg.payment_status, PaymentStatus::Paid);
    assert!(h.registrar.artifacts().qr_path(&reg.uid).exists());

    // Nothing to refund on a free registration
    let err = h.registrar.refund(&reg.uid).await.unwrap_err();
    assert!(matches!(err, RegistrationError::Validation(_)));
}

#[tokio::test]
async fn test_refund_eligible_listing() {
    let h = harness().await;
    // Semester 1 is waived under the default refund-later policy
    mock_order(&h.server, 10_000);
    let mut input = ravi();
    input.semester = 1;
    let init = match h.registrar.start(input).await.unwrap() {
        StartOutcome::PaymentRequired(init) => init,
        other => panic!("unexpected {other:?}"),
    };
    h.registrar
        .complete(&init.session_token, "pay_456", None)
        .await
        .unwrap();

    let eligible = h.registrar.refund_eligible().unwrap();
    assert_eq!(eligible.len(), 1);
    assert_eq!(eligible[0].semester, 1);
}
