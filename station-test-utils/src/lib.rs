//! Station Test Utilities
//!
//! Shared test infrastructure for the Station workspace:
//! - Seeded in-memory stores with known users and keys
//! - Proptest generators for drafts and key material
//! - Custom assertions for Station result types

pub use station_storage::{FaultPlan, InMemoryStore};

pub use station_core::{
    ApiKeyRecord, EntityType, KeyDigester, Logbook, LogbookDraft, LogbookId, NewLogbook, QsoDraft,
    StationError, StationResult, StorageError, Timestamp, User,
};

// ============================================================================
// TEST FIXTURES
// ============================================================================

pub mod fixtures {
    //! Known-good data for common scenarios.

    use super::*;
    use chrono::Utc;
    use secrecy::ExposeSecret;
    use station_core::{generate_api_key, hash_password, DEFAULT_PREFIX_LEN};

    /// Confirmed operator with a valid password.
    pub const OPERATOR_CALLSIGN: &str = "W1AW";
    pub const OPERATOR_EMAIL: &str = "w1aw@example.org";
    pub const OPERATOR_PASSWORD: &str = "correct horse battery staple";

    /// Operator who never confirmed their email.
    pub const UNCONFIRMED_CALLSIGN: &str = "K1ABC";
    pub const UNCONFIRMED_PASSWORD: &str = "tr0ub4dor&3";

    pub const DEFAULT_LOGBOOK_NAME: &str = "Default HF";
    pub const DEFAULT_LOGBOOK_CALLSIGN: &str = "TEST1";

    /// An in-memory store with two users already registered.
    #[derive(Debug, Clone)]
    pub struct SeededStore {
        pub store: InMemoryStore,
        pub operator: User,
        pub unconfirmed: User,
    }

    /// A key issued directly into a store, bypassing provisioning.
    #[derive(Debug, Clone)]
    pub struct IssuedKey {
        pub logbook: Logbook,
        pub prefix: String,
        pub full_key: String,
    }

    /// Store with [`OPERATOR_CALLSIGN`] (confirmed) and
    /// [`UNCONFIRMED_CALLSIGN`] (unconfirmed), both with argon2 hashes.
    pub fn seeded_store() -> SeededStore {
        let store = InMemoryStore::new();
        let operator = store.seed_user(
            OPERATOR_CALLSIGN,
            OPERATOR_EMAIL,
            &hash_password(OPERATOR_PASSWORD).expect("hash operator password"),
            true,
        );
        let unconfirmed = store.seed_user(
            UNCONFIRMED_CALLSIGN,
            "k1abc@example.org",
            &hash_password(UNCONFIRMED_PASSWORD).expect("hash unconfirmed password"),
            false,
        );
        SeededStore {
            store,
            operator,
            unconfirmed,
        }
    }

    /// The "Default HF" logbook draft for callsign TEST1.
    pub fn default_hf_draft() -> LogbookDraft {
        LogbookDraft {
            name: DEFAULT_LOGBOOK_NAME.to_string(),
            callsign: DEFAULT_LOGBOOK_CALLSIGN.to_string(),
            description: Some("HF contacts".to_string()),
        }
    }

    /// A valid QSO logged by `station_callsign`.
    pub fn qso_draft(station_callsign: &str) -> QsoDraft {
        QsoDraft {
            call: "DL1ABC".to_string(),
            station_callsign: station_callsign.to_string(),
            band: "20m".to_string(),
            mode: "SSB".to_string(),
            freq_mhz: Some(14.250),
            qso_date: "20240315".to_string(),
            time_on: "1830".to_string(),
            rst_sent: Some("59".to_string()),
            rst_rcvd: Some("57".to_string()),
        }
    }

    /// Seed a logbook for `owner` and an active key for it.
    pub fn issue_key(
        store: &InMemoryStore,
        digester: &KeyDigester,
        owner: &User,
        draft: LogbookDraft,
    ) -> IssuedKey {
        issue_key_with(store, digester, owner, draft, |_| {})
    }

    /// Like [`issue_key`], letting the caller adjust the record (revoke it,
    /// expire it, point it elsewhere) before it is stored.
    pub fn issue_key_with<F>(
        store: &InMemoryStore,
        digester: &KeyDigester,
        owner: &User,
        draft: LogbookDraft,
        adjust: F,
    ) -> IssuedKey
    where
        F: FnOnce(&mut ApiKeyRecord),
    {
        let logbook = store.seed_logbook(NewLogbook::from_draft(draft, owner.id));
        let key = generate_api_key(DEFAULT_PREFIX_LEN).expect("generate key");

        let mut record = ApiKeyRecord {
            prefix: key.prefix.clone(),
            digest: digester.digest_hex(key.secret.expose_secret()),
            logbook_id: logbook.id,
            created_at: Utc::now(),
            revoked_at: None,
            expires_at: None,
        };
        adjust(&mut record);
        store.seed_api_key(record);

        IssuedKey {
            logbook,
            prefix: key.prefix.clone(),
            full_key: key.expose_full_key().to_string(),
        }
    }
}

// ============================================================================
// PROPTEST GENERATORS
// ============================================================================

pub mod generators {
    //! Proptest strategies for Station inputs.

    use super::*;
    use proptest::prelude::*;
    use station_core::{MAX_PREFIX_LEN, MIN_PREFIX_LEN};

    /// Plausible callsigns: 1-2 letters, a digit, 1-3 letters.
    pub fn arb_callsign() -> impl Strategy<Value = String> {
        "[A-Z]{1,2}[0-9][A-Z]{1,3}"
    }

    /// Lowercase hex of exactly `len` characters.
    pub fn arb_hex(len: usize) -> impl Strategy<Value = String> {
        proptest::collection::vec(0u8..16, len)
            .prop_map(|nibbles| nibbles.iter().map(|n| format!("{:x}", n)).collect())
    }

    pub fn arb_prefix_len() -> impl Strategy<Value = usize> {
        MIN_PREFIX_LEN..=MAX_PREFIX_LEN
    }

    pub fn arb_logbook_draft() -> impl Strategy<Value = LogbookDraft> {
        (
            "[A-Za-z][A-Za-z0-9 ]{0,40}",
            arb_callsign(),
            proptest::option::of("[a-z ]{0,64}"),
        )
            .prop_map(|(name, callsign, description)| LogbookDraft {
                name,
                callsign,
                description,
            })
    }

    pub fn arb_qso_draft(station_callsign: String) -> impl Strategy<Value = QsoDraft> {
        (
            arb_callsign(),
            prop_oneof![Just("20m"), Just("40m"), Just("2m")],
            prop_oneof![Just("SSB"), Just("CW"), Just("FT8")],
            proptest::option::of(1.8f64..450.0),
            "20[0-9]{2}(0[1-9]|1[0-2])(0[1-9]|1[0-9]|2[0-8])",
            "([01][0-9]|2[0-3])[0-5][0-9]",
        )
            .prop_map(move |(call, band, mode, freq_mhz, qso_date, time_on)| QsoDraft {
                call,
                station_callsign: station_callsign.clone(),
                band: band.to_string(),
                mode: mode.to_string(),
                freq_mhz,
                qso_date,
                time_on,
                rst_sent: None,
                rst_rcvd: None,
            })
    }
}

// ============================================================================
// CUSTOM ASSERTIONS
// ============================================================================

pub mod assertions {
    //! Assertions for Station result types.

    use super::*;

    /// Assert that a StationResult is a NotFound storage error.
    #[track_caller]
    pub fn assert_not_found<T: std::fmt::Debug>(result: &StationResult<T>, entity_type: EntityType) {
        match result {
            Err(StationError::Storage(StorageError::NotFound { entity_type: et, .. })) => {
                assert_eq!(*et, entity_type, "Wrong entity type in NotFound error");
            }
            other => panic!("Expected NotFound error for {:?}, got: {:?}", entity_type, other),
        }
    }

    /// Assert that a StationResult is a storage error of any kind.
    #[track_caller]
    pub fn assert_storage_error<T: std::fmt::Debug>(result: &StationResult<T>) {
        match result {
            Err(StationError::Storage(_)) => {}
            other => panic!("Expected Storage error, got: {:?}", other),
        }
    }

    /// Assert that nothing about `name` reached committed state.
    #[track_caller]
    pub fn assert_no_logbook_named(store: &InMemoryStore, name: &str) {
        assert!(
            store.find_logbook_by_name(name).is_none(),
            "logbook '{}' should not exist",
            name
        );
    }
}
