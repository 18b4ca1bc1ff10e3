//! Provisioning atomicity tests.
//!
//! A logbook and its first key are created together or not at all.

use std::sync::Arc;

use secrecy::ExposeSecret;
use station_api::provisioning::{provision_logbook, provision_logbook_with};
use station_api::{ApiError, ErrorCode};
use station_core::{generate_api_key, parse_api_key, KeyDigester, KeyError, DEFAULT_PREFIX_LEN};
use station_storage::LogbookStore;
use station_test_utils::assertions::assert_no_logbook_named;
use station_test_utils::fixtures::{
    default_hf_draft, seeded_store, DEFAULT_LOGBOOK_CALLSIGN, DEFAULT_LOGBOOK_NAME,
    OPERATOR_CALLSIGN, OPERATOR_PASSWORD,
};
use station_test_utils::{FaultPlan, InMemoryStore};

#[path = "support/app.rs"]
mod support_app;

use support_app::*;

fn digester() -> KeyDigester {
    KeyDigester::unpeppered()
}

#[tokio::test]
async fn test_provisioning_commits_logbook_and_key() {
    let store = InMemoryStore::new();
    let digester = digester();

    let provisioned = provision_logbook(&store, DEFAULT_PREFIX_LEN, &digester, 7, default_hf_draft())
        .await
        .unwrap();

    assert_eq!(provisioned.logbook.user_id, 7);
    assert_eq!(provisioned.logbook.callsign, DEFAULT_LOGBOOK_CALLSIGN);
    assert_eq!(store.commit_count(), 1);
    assert_eq!(store.rollback_count(), 0);

    let (prefix, secret) = parse_api_key(provisioned.expose_full_key()).unwrap();
    assert_eq!(prefix, provisioned.prefix);
    assert_eq!(prefix.len(), DEFAULT_PREFIX_LEN);

    let records = store.api_keys_for_logbook(provisioned.logbook.id);
    assert_eq!(records.len(), 1);
    assert!(digester.verify(secret, &records[0].digest));
    assert!(!format!("{:?}", provisioned).contains(secret));
}

#[tokio::test]
async fn test_failed_key_insert_leaves_nothing_behind() {
    let store = InMemoryStore::new();
    let digester = digester();

    store.set_faults(FaultPlan {
        fail_key_insert: true,
        ..FaultPlan::none()
    });
    let err = provision_logbook(&store, DEFAULT_PREFIX_LEN, &digester, 1, default_hf_draft())
        .await
        .unwrap_err();
    assert_eq!(err, ApiError::internal_error());
    assert_eq!(store.rollback_count(), 1);
    assert_eq!(store.commit_count(), 0);
    assert_no_logbook_named(&store, DEFAULT_LOGBOOK_NAME);
    assert_eq!(store.api_key_count(), 0);

    store.clear_faults();
    let provisioned = provision_logbook(&store, DEFAULT_PREFIX_LEN, &digester, 1, default_hf_draft())
        .await
        .unwrap();

    // The first attempt consumed id 1 and never became visible.
    assert!(provisioned.logbook.id > 1);
    assert_eq!(store.fetch_logbook_by_id(1).await.unwrap(), None);
    assert_eq!(
        store.find_logbook_by_name(DEFAULT_LOGBOOK_NAME).map(|l| l.id),
        Some(provisioned.logbook.id)
    );
    assert_eq!(store.api_key_count(), 1);
}

#[tokio::test]
async fn test_failed_logbook_insert_rolls_back() {
    let store = InMemoryStore::new();
    store.set_faults(FaultPlan {
        fail_logbook_insert: true,
        ..FaultPlan::none()
    });

    let err = provision_logbook(&store, DEFAULT_PREFIX_LEN, &digester(), 1, default_hf_draft())
        .await
        .unwrap_err();

    assert_eq!(err.code, ErrorCode::InternalError);
    assert_eq!(store.rollback_count(), 1);
    assert_eq!(store.logbook_count(), 0);
}

#[tokio::test]
async fn test_zero_logbook_id_rolls_back() {
    let store = InMemoryStore::new();
    store.set_faults(FaultPlan {
        zero_logbook_id: true,
        ..FaultPlan::none()
    });

    let err = provision_logbook(&store, DEFAULT_PREFIX_LEN, &digester(), 1, default_hf_draft())
        .await
        .unwrap_err();

    assert_eq!(err, ApiError::internal_error());
    assert_eq!(store.rollback_count(), 1);
    assert_eq!(store.commit_count(), 0);
    assert_eq!(store.logbook_count(), 0);
    assert_eq!(store.api_key_count(), 0);
}

#[tokio::test]
async fn test_entropy_failure_rolls_back() {
    let store = InMemoryStore::new();

    let err = provision_logbook_with(&store, &digester(), 1, default_hf_draft(), || {
        Err(KeyError::EntropySource {
            reason: "rng offline".to_string(),
        })
    })
    .await
    .unwrap_err();

    assert_eq!(err, ApiError::internal_error());
    assert_eq!(store.rollback_count(), 1);
    assert_eq!(store.logbook_count(), 0);
}

#[tokio::test]
async fn test_commit_failure_is_not_rolled_back() {
    let store = InMemoryStore::new();
    store.set_faults(FaultPlan {
        fail_commit: true,
        ..FaultPlan::none()
    });

    let err = provision_logbook(&store, DEFAULT_PREFIX_LEN, &digester(), 1, default_hf_draft())
        .await
        .unwrap_err();

    assert_eq!(err, ApiError::internal_error());
    assert_eq!(store.rollback_count(), 0);
    assert_eq!(store.commit_count(), 0);
    assert_eq!(store.logbook_count(), 0);
}

#[tokio::test]
async fn test_rollback_failure_keeps_original_error() {
    let store = InMemoryStore::new();
    store.set_faults(FaultPlan {
        fail_key_insert: true,
        fail_rollback: true,
        ..FaultPlan::none()
    });

    let err = provision_logbook(&store, DEFAULT_PREFIX_LEN, &digester(), 1, default_hf_draft())
        .await
        .unwrap_err();

    assert_eq!(err, ApiError::internal_error());
    assert_eq!(store.logbook_count(), 0);
    assert_eq!(store.api_key_count(), 0);
}

#[tokio::test]
async fn test_duplicate_logbook_name_is_refused() {
    let store = InMemoryStore::new();
    let digester = digester();

    provision_logbook(&store, DEFAULT_PREFIX_LEN, &digester, 1, default_hf_draft())
        .await
        .unwrap();
    let err = provision_logbook(&store, DEFAULT_PREFIX_LEN, &digester, 2, default_hf_draft())
        .await
        .unwrap_err();

    assert_eq!(err.code, ErrorCode::InternalError);
    assert_eq!(store.logbook_count(), 1);
    assert_eq!(store.api_key_count(), 1);
    assert_eq!(store.rollback_count(), 1);
}

#[tokio::test]
async fn test_injected_key_source_is_used() {
    let store = InMemoryStore::new();
    let key = generate_api_key(16).unwrap();
    let expected = key.full_key.expose_secret().to_string();

    let provisioned =
        provision_logbook_with(&store, &digester(), 1, default_hf_draft(), move || Ok(key))
            .await
            .unwrap();

    assert_eq!(provisioned.expose_full_key(), expected);
    assert_eq!(provisioned.prefix.len(), 16);
}

// ============================================================================
// THROUGH THE ROUTER
// ============================================================================

#[tokio::test]
async fn test_register_route_returns_working_key() {
    let seeded = seeded_store();
    let app = test_app(seeded.store.clone());

    let reply = post_json(
        &app.router,
        REGISTER,
        register_envelope(OPERATOR_CALLSIGN, OPERATOR_PASSWORD, &default_hf_draft()),
    )
    .await;
    assert_eq!(reply.status, 201);
    let full_key = reply.json()["message"].as_str().unwrap().to_string();

    let logbook = seeded.store.find_logbook_by_name(DEFAULT_LOGBOOK_NAME).unwrap();
    assert_eq!(logbook.user_id, seeded.operator.id);
    // Registration warms the cache for the new logbook.
    assert!(app.state.logbooks.cache().get(logbook.id).is_some());

    let insert = post_json(
        &app.router,
        INSERT_QSO,
        qso_envelope(
            DEFAULT_LOGBOOK_CALLSIGN,
            &full_key,
            &station_test_utils::fixtures::qso_draft(DEFAULT_LOGBOOK_CALLSIGN),
        ),
    )
    .await;
    assert_eq!(insert.status, 201);
}

#[tokio::test]
async fn test_register_route_rolls_back_on_key_insert_failure() {
    let seeded = seeded_store();
    let app = test_app(seeded.store.clone());
    seeded.store.set_faults(FaultPlan {
        fail_key_insert: true,
        ..FaultPlan::none()
    });

    let reply = post_json(
        &app.router,
        REGISTER,
        register_envelope(OPERATOR_CALLSIGN, OPERATOR_PASSWORD, &default_hf_draft()),
    )
    .await;

    assert_eq!(reply.status, 500);
    assert_eq!(
        reply.body,
        br#"{"code":"INTERNAL_ERROR","message":"Internal server error"}"#.to_vec()
    );
    assert_no_logbook_named(&seeded.store, DEFAULT_LOGBOOK_NAME);
}

#[tokio::test]
async fn test_register_route_validates_draft() {
    let seeded = seeded_store();
    let app = test_app(seeded.store.clone());
    let mut draft = default_hf_draft();
    draft.callsign = "nope".to_string();

    let reply = post_json(
        &app.router,
        REGISTER,
        register_envelope(OPERATOR_CALLSIGN, OPERATOR_PASSWORD, &draft),
    )
    .await;
    assert_eq!(reply.status, 400);
    assert_eq!(reply.json()["code"], "VALIDATION_FAILED");

    let missing = post_json(
        &app.router,
        REGISTER,
        serde_json::json!({
            "callsign": OPERATOR_CALLSIGN,
            "key": OPERATOR_PASSWORD,
            "action": "register_logbook",
        }),
    )
    .await;
    assert_eq!(missing.status, 400);
    assert_eq!(seeded.store.logbook_count(), 0);
}

#[tokio::test]
async fn test_provisioning_works_through_shared_store_handle() {
    let store = Arc::new(InMemoryStore::new());
    let dyn_store: Arc<dyn LogbookStore> = store.clone();

    let provisioned = provision_logbook(
        dyn_store.as_ref(),
        DEFAULT_PREFIX_LEN,
        &digester(),
        3,
        default_hf_draft(),
    )
    .await
    .unwrap();

    assert_eq!(
        store.fetch_logbook_by_id(provisioned.logbook.id).await.unwrap(),
        Some(provisioned.logbook)
    );
}
