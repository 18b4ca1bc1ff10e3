//! Accept/reject decisions for the two credential paths
//!
//! These functions are pure: the request pipeline performs the lookups and
//! hands the results in. Every rejection carries a specific reason for
//! diagnostics; outwardly all of them collapse to one unauthorized answer.

use std::fmt;

use crate::{ApiKeyRecord, AuthError, KeyDigester, KeyError, LogbookId, Timestamp, User};

/// Why a credential was refused. Internal only.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RejectReason {
    UnknownUser,
    EmailUnconfirmed,
    PasswordMismatch,
    PasswordUnverifiable,
    MalformedKey,
    UnknownPrefix,
    SecretMismatch,
    KeyRevoked,
    KeyExpired,
    /// Key record points at logbook id 0. Indicates corrupted storage.
    ZeroLogbookId,
    /// The store could not answer the principal lookup.
    LookupFailed,
}

impl RejectReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            RejectReason::UnknownUser => "unknown_user",
            RejectReason::EmailUnconfirmed => "email_unconfirmed",
            RejectReason::PasswordMismatch => "password_mismatch",
            RejectReason::PasswordUnverifiable => "password_unverifiable",
            RejectReason::MalformedKey => "malformed_key",
            RejectReason::UnknownPrefix => "unknown_prefix",
            RejectReason::SecretMismatch => "secret_mismatch",
            RejectReason::KeyRevoked => "key_revoked",
            RejectReason::KeyExpired => "key_expired",
            RejectReason::ZeroLogbookId => "zero_logbook_id",
            RejectReason::LookupFailed => "lookup_failed",
        }
    }

    /// Rejections that point at broken data rather than a bad client.
    pub fn is_integrity_problem(&self) -> bool {
        matches!(self, RejectReason::ZeroLogbookId)
    }

    /// Rejections caused by the server side. Logged at error level.
    pub fn is_server_fault(&self) -> bool {
        matches!(self, RejectReason::ZeroLogbookId | RejectReason::LookupFailed)
    }
}

impl fmt::Display for RejectReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Outcome of a credential check. `P` is the principal bound on success.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AuthDecision<P> {
    Accept(P),
    Reject(RejectReason),
}

impl<P> AuthDecision<P> {
    pub fn is_accept(&self) -> bool {
        matches!(self, AuthDecision::Accept(_))
    }

    pub fn outcome(&self) -> &'static str {
        match self {
            AuthDecision::Accept(_) => "accept",
            AuthDecision::Reject(reason) => reason.as_str(),
        }
    }

    pub fn into_result(self) -> Result<P, AuthError> {
        match self {
            AuthDecision::Accept(principal) => Ok(principal),
            AuthDecision::Reject(reason) => Err(AuthError::Unauthorized {
                reason: reason.to_string(),
            }),
        }
    }
}

/// First half of the password path: the account must exist and have a
/// confirmed email before any hashing work is done.
pub fn precheck_user(user: Option<User>) -> AuthDecision<User> {
    match user {
        None => AuthDecision::Reject(RejectReason::UnknownUser),
        Some(user) if !user.email_confirmed => AuthDecision::Reject(RejectReason::EmailUnconfirmed),
        Some(user) => AuthDecision::Accept(user),
    }
}

/// Second half of the password path, given the result of the argon2 check.
pub fn decide_password(user: User, verification: Result<bool, KeyError>) -> AuthDecision<User> {
    match verification {
        Ok(true) => AuthDecision::Accept(user),
        Ok(false) => AuthDecision::Reject(RejectReason::PasswordMismatch),
        Err(_) => AuthDecision::Reject(RejectReason::PasswordUnverifiable),
    }
}

/// Key path decision for a parsed key whose prefix lookup returned `record`.
///
/// The secret is always digested, even when no record exists, so the
/// unknown-prefix and wrong-secret cases do the same work.
pub fn decide_api_key(
    record: Option<&ApiKeyRecord>,
    secret: &str,
    digester: &KeyDigester,
    now: Timestamp,
) -> AuthDecision<LogbookId> {
    let record = match record {
        Some(record) => record,
        None => {
            digester.verify_dummy(secret);
            return AuthDecision::Reject(RejectReason::UnknownPrefix);
        }
    };

    if !digester.verify(secret, &record.digest) {
        return AuthDecision::Reject(RejectReason::SecretMismatch);
    }

    if record.revoked_at.is_some() {
        return AuthDecision::Reject(RejectReason::KeyRevoked);
    }
    if !record.is_active(now) {
        return AuthDecision::Reject(RejectReason::KeyExpired);
    }

    if record.logbook_id == 0 {
        return AuthDecision::Reject(RejectReason::ZeroLogbookId);
    }

    AuthDecision::Accept(record.logbook_id)
}
