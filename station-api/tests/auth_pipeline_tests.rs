//! Authorization pipeline tests through the full router.
//!
//! Every credential failure must produce the same 401 body, whatever the
//! underlying reason.

use chrono::{Duration, Utc};
use serde_json::json;
use station_api::{middleware::authorize, Principal};
use station_core::{parse_api_key, RequestAction};
use station_test_utils::fixtures::{
    default_hf_draft, issue_key, issue_key_with, qso_draft, seeded_store,
    DEFAULT_LOGBOOK_CALLSIGN, OPERATOR_CALLSIGN, OPERATOR_PASSWORD, UNCONFIRMED_CALLSIGN,
    UNCONFIRMED_PASSWORD,
};
use station_test_utils::{ApiKeyRecord, LogbookDraft};

#[path = "support/app.rs"]
mod support_app;

use support_app::*;

fn other_draft() -> LogbookDraft {
    LogbookDraft {
        name: "Portable VHF".to_string(),
        callsign: "TEST1".to_string(),
        description: None,
    }
}

// ============================================================================
// API KEY PATH
// ============================================================================

#[tokio::test]
async fn test_unknown_prefix_and_wrong_secret_are_identical() {
    let seeded = seeded_store();
    let app = test_app(seeded.store.clone());
    let issued = issue_key(
        &seeded.store,
        &app.state.digester,
        &seeded.operator,
        default_hf_draft(),
    );
    let (prefix, secret) = parse_api_key(&issued.full_key).unwrap();
    let qso = qso_draft(DEFAULT_LOGBOOK_CALLSIGN);

    let unknown_prefix = format!("{}.{}", "0".repeat(prefix.len()), secret);
    let wrong_secret = format!("{}.{}", prefix, "f".repeat(secret.len()));

    let a = post_json(
        &app.router,
        INSERT_QSO,
        qso_envelope(DEFAULT_LOGBOOK_CALLSIGN, &unknown_prefix, &qso),
    )
    .await;
    let b = post_json(
        &app.router,
        INSERT_QSO,
        qso_envelope(DEFAULT_LOGBOOK_CALLSIGN, &wrong_secret, &qso),
    )
    .await;

    assert_eq!(a.status, 401);
    assert_eq!(a.status, b.status);
    assert_eq!(a.body, b.body);
    assert_eq!(a.body, UNAUTHORIZED_BODY.as_bytes());
    assert_eq!(seeded.store.qso_count(), 0);
}

#[tokio::test]
async fn test_malformed_key_is_unauthorized() {
    let seeded = seeded_store();
    let app = test_app(seeded.store.clone());
    let qso = qso_draft(DEFAULT_LOGBOOK_CALLSIGN);

    for key in ["no-separator", ".abc", "prefix.", "a.b.c"] {
        let reply = post_json(
            &app.router,
            INSERT_QSO,
            qso_envelope(DEFAULT_LOGBOOK_CALLSIGN, key, &qso),
        )
        .await;
        assert_eq!(reply.status, 401, "key {key:?}");
        assert_eq!(reply.body, UNAUTHORIZED_BODY.as_bytes());
    }
}

#[tokio::test]
async fn test_revoked_key_is_rejected() {
    let seeded = seeded_store();
    let app = test_app(seeded.store.clone());
    let issued = issue_key_with(
        &seeded.store,
        &app.state.digester,
        &seeded.operator,
        default_hf_draft(),
        |record: &mut ApiKeyRecord| record.revoked_at = Some(Utc::now() - Duration::minutes(1)),
    );

    let reply = post_json(
        &app.router,
        INSERT_QSO,
        qso_envelope(
            DEFAULT_LOGBOOK_CALLSIGN,
            &issued.full_key,
            &qso_draft(DEFAULT_LOGBOOK_CALLSIGN),
        ),
    )
    .await;

    assert_eq!(reply.status, 401);
    assert_eq!(reply.body, UNAUTHORIZED_BODY.as_bytes());
}

#[tokio::test]
async fn test_expired_key_is_rejected() {
    let seeded = seeded_store();
    let app = test_app(seeded.store.clone());
    let issued = issue_key_with(
        &seeded.store,
        &app.state.digester,
        &seeded.operator,
        default_hf_draft(),
        |record: &mut ApiKeyRecord| record.expires_at = Some(Utc::now() - Duration::seconds(1)),
    );

    let reply = post_json(
        &app.router,
        INSERT_QSO,
        qso_envelope(
            DEFAULT_LOGBOOK_CALLSIGN,
            &issued.full_key,
            &qso_draft(DEFAULT_LOGBOOK_CALLSIGN),
        ),
    )
    .await;

    assert_eq!(reply.status, 401);
    assert_eq!(reply.body, UNAUTHORIZED_BODY.as_bytes());
}

#[tokio::test]
async fn test_key_revoked_in_store_stops_working() {
    use station_storage::LogbookStore;

    let seeded = seeded_store();
    let app = test_app(seeded.store.clone());
    let issued = issue_key(
        &seeded.store,
        &app.state.digester,
        &seeded.operator,
        default_hf_draft(),
    );
    let envelope = qso_envelope(
        DEFAULT_LOGBOOK_CALLSIGN,
        &issued.full_key,
        &qso_draft(DEFAULT_LOGBOOK_CALLSIGN),
    );

    let before = post_json(&app.router, INSERT_QSO, envelope.clone()).await;
    assert_eq!(before.status, 201);

    assert!(seeded
        .store
        .revoke_api_key(&issued.prefix, Utc::now())
        .await
        .unwrap());

    let after = post_json(&app.router, INSERT_QSO, envelope).await;
    assert_eq!(after.status, 401);
    assert_eq!(seeded.store.qso_count(), 1);
}

#[tokio::test]
async fn test_zero_logbook_id_is_unauthorized() {
    let seeded = seeded_store();
    let app = test_app(seeded.store.clone());
    let issued = issue_key_with(
        &seeded.store,
        &app.state.digester,
        &seeded.operator,
        default_hf_draft(),
        |record: &mut ApiKeyRecord| record.logbook_id = 0,
    );

    let reply = post_json(
        &app.router,
        INSERT_QSO,
        qso_envelope(
            DEFAULT_LOGBOOK_CALLSIGN,
            &issued.full_key,
            &qso_draft(DEFAULT_LOGBOOK_CALLSIGN),
        ),
    )
    .await;

    assert_eq!(reply.status, 401);
    assert_eq!(reply.body, UNAUTHORIZED_BODY.as_bytes());
}

#[tokio::test]
async fn test_key_for_missing_logbook_is_unauthorized() {
    let seeded = seeded_store();
    let app = test_app(seeded.store.clone());
    let issued = issue_key_with(
        &seeded.store,
        &app.state.digester,
        &seeded.operator,
        default_hf_draft(),
        |record: &mut ApiKeyRecord| record.logbook_id = 9_999,
    );

    let reply = post_json(
        &app.router,
        INSERT_QSO,
        qso_envelope(
            DEFAULT_LOGBOOK_CALLSIGN,
            &issued.full_key,
            &qso_draft(DEFAULT_LOGBOOK_CALLSIGN),
        ),
    )
    .await;

    assert_eq!(reply.status, 401);
    assert_eq!(reply.body, UNAUTHORIZED_BODY.as_bytes());
}

#[tokio::test]
async fn test_keys_are_scoped_to_their_logbook() {
    let seeded = seeded_store();
    let app = test_app(seeded.store.clone());
    let first = issue_key(
        &seeded.store,
        &app.state.digester,
        &seeded.operator,
        default_hf_draft(),
    );
    let second = issue_key(
        &seeded.store,
        &app.state.digester,
        &seeded.operator,
        other_draft(),
    );

    let reply = post_json(
        &app.router,
        INSERT_QSO,
        qso_envelope(
            DEFAULT_LOGBOOK_CALLSIGN,
            &second.full_key,
            &qso_draft(DEFAULT_LOGBOOK_CALLSIGN),
        ),
    )
    .await;
    assert_eq!(reply.status, 201);

    assert!(seeded.store.qsos_for_logbook(first.logbook.id).is_empty());
    assert_eq!(seeded.store.qsos_for_logbook(second.logbook.id).len(), 1);
}

// ============================================================================
// PASSWORD PATH
// ============================================================================

#[tokio::test]
async fn test_password_failures_are_indistinguishable() {
    let seeded = seeded_store();
    let app = test_app(seeded.store.clone());
    let draft = default_hf_draft();

    let unconfirmed = post_json(
        &app.router,
        REGISTER,
        register_envelope(UNCONFIRMED_CALLSIGN, UNCONFIRMED_PASSWORD, &draft),
    )
    .await;
    let wrong_password = post_json(
        &app.router,
        REGISTER,
        register_envelope(OPERATOR_CALLSIGN, "not the password", &draft),
    )
    .await;
    let unknown_user = post_json(
        &app.router,
        REGISTER,
        register_envelope("N0BODY", OPERATOR_PASSWORD, &draft),
    )
    .await;

    for reply in [&unconfirmed, &wrong_password, &unknown_user] {
        assert_eq!(reply.status, 401);
        assert_eq!(reply.body, UNAUTHORIZED_BODY.as_bytes());
    }
    assert_eq!(seeded.store.logbook_count(), 0);
}

#[tokio::test]
async fn test_callsign_lookup_is_case_insensitive() {
    let seeded = seeded_store();
    let app = test_app(seeded.store.clone());

    let reply = post_json(
        &app.router,
        REGISTER,
        register_envelope("w1aw", OPERATOR_PASSWORD, &default_hf_draft()),
    )
    .await;

    assert_eq!(reply.status, 201);
}

// ============================================================================
// ENVELOPE AND ACTION
// ============================================================================

#[tokio::test]
async fn test_malformed_envelopes_are_bad_requests() {
    let seeded = seeded_store();
    let app = test_app(seeded.store.clone());

    let not_json = post_raw(&app.router, REGISTER, "callsign=W1AW").await;
    assert_eq!(not_json.status, 400);
    assert_eq!(not_json.json()["code"], "BAD_REQUEST");

    let missing_key = post_json(
        &app.router,
        REGISTER,
        json!({ "callsign": "W1AW", "action": "register_logbook" }),
    )
    .await;
    assert_eq!(missing_key.status, 400);

    let empty_key = post_json(
        &app.router,
        REGISTER,
        json!({ "callsign": "W1AW", "key": "", "action": "register_logbook" }),
    )
    .await;
    assert_eq!(empty_key.status, 400);

    let blank_callsign = post_json(
        &app.router,
        REGISTER,
        json!({ "callsign": "  ", "key": "x", "action": "register_logbook" }),
    )
    .await;
    assert_eq!(blank_callsign.status, 400);
}

#[tokio::test]
async fn test_oversized_body_is_rejected() {
    let seeded = seeded_store();
    let config = station_api::ApiConfig {
        body_limit_bytes: 64,
        ..station_api::ApiConfig::default()
    };
    let app = test_app_with(seeded.store.clone(), config);

    let reply = post_json(
        &app.router,
        REGISTER,
        register_envelope(OPERATOR_CALLSIGN, OPERATOR_PASSWORD, &default_hf_draft()),
    )
    .await;

    assert_eq!(reply.status, 400);
    assert_eq!(seeded.store.logbook_count(), 0);
}

#[tokio::test]
async fn test_unknown_action_is_rejected_before_credentials() {
    let seeded = seeded_store();
    let app = test_app(seeded.store.clone());

    // Bogus credentials: the action check must answer first.
    let reply = post_json(
        &app.router,
        INSERT_QSO,
        json!({ "callsign": "W1AW", "key": "bogus", "action": "delete_everything" }),
    )
    .await;

    assert_eq!(reply.status, 400);
    let body = reply.json();
    assert_eq!(body["code"], "UNKNOWN_ACTION");
    assert!(body["message"]
        .as_str()
        .unwrap()
        .contains("delete_everything"));
}

#[tokio::test]
async fn test_action_route_mismatch_is_bad_request() {
    let seeded = seeded_store();
    let app = test_app(seeded.store.clone());
    let issued = issue_key(
        &seeded.store,
        &app.state.digester,
        &seeded.operator,
        default_hf_draft(),
    );

    // Valid API-key request sent to the provisioning route.
    let reply = post_json(
        &app.router,
        REGISTER,
        qso_envelope(
            DEFAULT_LOGBOOK_CALLSIGN,
            &issued.full_key,
            &qso_draft(DEFAULT_LOGBOOK_CALLSIGN),
        ),
    )
    .await;

    assert_eq!(reply.status, 400);
    assert_eq!(reply.json()["code"], "BAD_REQUEST");
    assert_eq!(seeded.store.qso_count(), 0);
    assert_eq!(seeded.store.logbook_count(), 1);
}

// ============================================================================
// CONTEXT
// ============================================================================

#[tokio::test]
async fn test_context_carries_no_credential() {
    let seeded = seeded_store();
    let app = test_app(seeded.store.clone());
    let issued = issue_key(
        &seeded.store,
        &app.state.digester,
        &seeded.operator,
        default_hf_draft(),
    );
    let (_, secret) = parse_api_key(&issued.full_key).unwrap();

    let body = qso_envelope(
        DEFAULT_LOGBOOK_CALLSIGN,
        &issued.full_key,
        &qso_draft(DEFAULT_LOGBOOK_CALLSIGN),
    )
    .to_string();
    let ctx = authorize(&app.state, body.as_bytes()).await.unwrap();

    assert_eq!(ctx.action, RequestAction::InsertQso);
    assert!(ctx.authorized);
    assert!(matches!(&ctx.principal, Principal::Logbook(l) if l.id == issued.logbook.id));
    let rendered = format!("{:?}", ctx);
    assert!(!rendered.contains(secret));

    let body = register_envelope(OPERATOR_CALLSIGN, OPERATOR_PASSWORD, &default_hf_draft())
        .to_string();
    let ctx = authorize(&app.state, body.as_bytes()).await.unwrap();
    assert_eq!(ctx.user().map(|u| u.id), Some(seeded.operator.id));
    let rendered = format!("{:?}", ctx);
    assert!(!rendered.contains(OPERATOR_PASSWORD));
    assert!(!rendered.contains(&seeded.operator.pass_hash));
}

#[tokio::test]
async fn test_second_lookup_is_served_from_cache() {
    let seeded = seeded_store();
    let app = test_app(seeded.store.clone());
    let issued = issue_key(
        &seeded.store,
        &app.state.digester,
        &seeded.operator,
        default_hf_draft(),
    );
    let envelope = qso_envelope(
        DEFAULT_LOGBOOK_CALLSIGN,
        &issued.full_key,
        &qso_draft(DEFAULT_LOGBOOK_CALLSIGN),
    );

    for _ in 0..3 {
        let reply = post_json(&app.router, INSERT_QSO, envelope.clone()).await;
        assert_eq!(reply.status, 201);
    }

    let stats = app.state.logbooks.cache().stats();
    assert_eq!(stats.misses, 1);
    assert_eq!(stats.hits, 2);
}

// ============================================================================
// PROPERTY TESTS
// ============================================================================

mod properties {
    use super::*;
    use proptest::prelude::*;
    use station_test_utils::generators::{arb_hex, arb_prefix_len};
    use station_test_utils::InMemoryStore;

    fn arb_bad_key() -> impl Strategy<Value = String> {
        prop_oneof![
            // Well-formed but unknown.
            arb_prefix_len()
                .prop_flat_map(|len| (arb_hex(len), arb_hex(64)))
                .prop_map(|(prefix, secret)| format!("{}.{}", prefix, secret)),
            // Anything at all.
            "[ -~]{1,80}",
        ]
    }

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(50))]

        #[test]
        fn prop_bad_keys_get_the_constant_body(key in arb_bad_key()) {
            let rt = tokio::runtime::Runtime::new().unwrap();
            let app = test_app(InMemoryStore::new());
            let qso = qso_draft(DEFAULT_LOGBOOK_CALLSIGN);

            let reply = rt.block_on(post_json(
                &app.router,
                INSERT_QSO,
                qso_envelope(DEFAULT_LOGBOOK_CALLSIGN, &key, &qso),
            ));

            prop_assert_eq!(reply.status, 401);
            prop_assert_eq!(reply.body, UNAUTHORIZED_BODY.as_bytes().to_vec());
        }
    }
}
