//! Request Authorization Pipeline
//!
//! Every write request goes through [`request_auth_middleware`]:
//!
//! 1. Read the body, bounded by `body_limit_bytes`, and decode the envelope.
//! 2. Map `action` to a [`RequestAction`]. Unknown actions stop here, before
//!    any credential is looked at.
//! 3. Authenticate on the path the action demands: password for
//!    `register_logbook`, API key for `insert_qso`.
//! 4. Insert a [`RequestAuthorization`] into the request extensions and run
//!    the handler, which takes it with the [`AuthorizedRequest`] extractor.
//!
//! Every credential failure answers the same 401 body. The specific reason is
//! logged and counted in `station_auth_decisions_total`.

use axum::{
    async_trait,
    body::Body,
    extract::{FromRequestParts, Request, State},
    http::request::Parts,
    middleware::Next,
    response::{IntoResponse, Response},
};
use chrono::Utc;
use secrecy::{ExposeSecret, SecretString};
use station_core::{
    decide_api_key, decide_password, parse_api_key, precheck_user, verify_dummy_password,
    verify_password, AuthDecision, AuthError, AuthMode, Logbook, RejectReason, RequestAction,
    StationError, StorageError, User,
};
use tracing::{debug, error, info, warn};

use crate::error::{ApiError, ApiResult};
use crate::state::AppState;
use crate::telemetry::metrics;
use crate::types::{EnvelopeBody, RequestEnvelope};

const PATH_PASSWORD: &str = "password";
const PATH_API_KEY: &str = "api_key";

// ============================================================================
// AUTHORIZATION CONTEXT
// ============================================================================

/// Who a request was authenticated as.
#[derive(Debug, Clone, PartialEq)]
pub enum Principal {
    /// Password path: the account owner.
    User(User),
    /// API-key path: the logbook the key belongs to.
    Logbook(Logbook),
}

/// Per-request result of the pipeline. Holds no credential.
#[derive(Debug, Clone, PartialEq)]
pub struct RequestAuthorization {
    pub action: RequestAction,
    pub principal: Principal,
    pub body: EnvelopeBody,
    pub authorized: bool,
}

impl RequestAuthorization {
    pub fn user(&self) -> Option<&User> {
        match &self.principal {
            Principal::User(user) => Some(user),
            Principal::Logbook(_) => None,
        }
    }

    pub fn logbook(&self) -> Option<&Logbook> {
        match &self.principal {
            Principal::Logbook(logbook) => Some(logbook),
            Principal::User(_) => None,
        }
    }

    /// 400 unless this request was made for `expected`.
    pub fn require_action(&self, expected: RequestAction) -> ApiResult<()> {
        if self.action == expected {
            Ok(())
        } else {
            Err(ApiError::bad_request(format!(
                "Action '{}' is not served by this route",
                self.action
            )))
        }
    }
}

// ============================================================================
// MIDDLEWARE FUNCTION
// ============================================================================

/// Axum middleware running the authorization pipeline.
pub async fn request_auth_middleware(
    State(state): State<AppState>,
    request: Request,
    next: Next,
) -> Response {
    let (parts, body) = request.into_parts();

    let bytes = match axum::body::to_bytes(body, state.config.body_limit_bytes).await {
        Ok(bytes) => bytes,
        Err(e) => {
            debug!(error = %e, "request body rejected");
            return ApiError::bad_request("Request body too large or unreadable").into_response();
        }
    };

    match authorize(&state, &bytes).await {
        Ok(authorization) => {
            let mut request = Request::from_parts(parts, Body::empty());
            request.extensions_mut().insert(authorization);
            next.run(request).await
        }
        Err(e) => e.into_response(),
    }
}

/// Run the pipeline on a raw envelope body.
pub async fn authorize(state: &AppState, body: &[u8]) -> ApiResult<RequestAuthorization> {
    let envelope: RequestEnvelope = serde_json::from_slice(body)?;
    let (credential, body) = envelope.into_parts();

    if body.callsign.trim().is_empty() || credential.expose_secret().is_empty() {
        return Err(AuthError::MalformedRequest {
            reason: "callsign and key are required".to_string(),
        }
        .into());
    }

    let action: RequestAction = body.action.parse()?;

    let principal = match action.auth_mode() {
        AuthMode::Password => {
            Principal::User(authenticate_password(state, &body.callsign, credential).await?)
        }
        AuthMode::ApiKey => Principal::Logbook(authenticate_api_key(state, credential).await?),
    };

    Ok(RequestAuthorization {
        action,
        principal,
        body,
        authorized: true,
    })
}

// ============================================================================
// CREDENTIAL PATHS
// ============================================================================

fn record_decision(path: &str, outcome: &str) {
    if let Some(m) = metrics() {
        m.record_auth_decision(path, outcome);
    }
}

fn reject(path: &'static str, reason: RejectReason) -> ApiError {
    record_decision(path, reason.as_str());
    if reason.is_integrity_problem() {
        error!(path, reason = %reason, "credential references invalid data");
    } else if reason.is_server_fault() {
        error!(path, reason = %reason, "credential check failed on the server side");
    } else {
        info!(path, reason = %reason, "credential rejected");
    }
    ApiError::unauthorized()
}

/// A store failure while resolving a principal still answers 401.
fn lookup_failed(path: &'static str, err: StationError) -> ApiError {
    error!(path, error = %err, "credential lookup failed");
    reject(path, RejectReason::LookupFailed)
}

fn settle<P>(path: &'static str, decision: AuthDecision<P>) -> ApiResult<P> {
    match decision {
        AuthDecision::Accept(principal) => {
            record_decision(path, "accept");
            Ok(principal)
        }
        AuthDecision::Reject(reason) => Err(reject(path, reason)),
    }
}

async fn authenticate_password(
    state: &AppState,
    callsign: &str,
    password: SecretString,
) -> ApiResult<User> {
    let user = state
        .store
        .fetch_user_by_callsign(callsign)
        .await
        .map_err(|e| lookup_failed(PATH_PASSWORD, e))?;
    let precheck = precheck_user(user);

    // Argon2 is CPU bound; keep it off the reactor. Unknown and unconfirmed
    // accounts verify against a dummy hash so every path costs the same.
    let hash = match &precheck {
        AuthDecision::Accept(user) => Some(user.pass_hash.clone()),
        AuthDecision::Reject(_) => None,
    };
    let verification = tokio::task::spawn_blocking(move || match hash {
        Some(hash) => verify_password(password.expose_secret(), &hash),
        None => Ok(verify_dummy_password(password.expose_secret())),
    })
    .await
    .map_err(|e| {
        error!(error = %e, "password verification task failed");
        ApiError::internal_error()
    })?;

    let user = settle(PATH_PASSWORD, precheck)?;
    let user = settle(PATH_PASSWORD, decide_password(user, verification))?;
    debug!(user_id = user.id, callsign = %user.callsign, "password accepted");
    Ok(user)
}

async fn authenticate_api_key(state: &AppState, credential: SecretString) -> ApiResult<Logbook> {
    let (prefix, secret) = match parse_api_key(credential.expose_secret()) {
        Ok(parts) => parts,
        Err(e) => {
            debug!(error = %e, "api key did not parse");
            return Err(reject(PATH_API_KEY, RejectReason::MalformedKey));
        }
    };

    let record = state
        .store
        .fetch_api_key_by_prefix(prefix)
        .await
        .map_err(|e| lookup_failed(PATH_API_KEY, e))?;
    let decision = decide_api_key(record.as_ref(), secret, &state.digester, Utc::now());
    let logbook_id = match settle(PATH_API_KEY, decision) {
        Ok(id) => id,
        Err(e) => {
            debug!(prefix, "api key refused");
            return Err(e);
        }
    };

    match state
        .logbooks
        .get_logbook(logbook_id, state.store.as_ref())
        .await
    {
        Ok(logbook) => {
            debug!(prefix, logbook_id, "api key accepted");
            Ok(logbook)
        }
        Err(StationError::Storage(StorageError::NotFound { .. })) => {
            // The key outlived its logbook.
            error!(prefix, logbook_id, "api key points at a missing logbook");
            Err(ApiError::unauthorized())
        }
        Err(e) => Err(lookup_failed(PATH_API_KEY, e)),
    }
}

// ============================================================================
// TYPED EXTRACTOR
// ============================================================================

/// Takes the [`RequestAuthorization`] out of the request.
///
/// The context is removed, not cloned, so it has exactly one consumer. A
/// route without [`request_auth_middleware`], or a second extraction,
/// answers 500.
#[derive(Debug)]
pub struct AuthorizedRequest(pub RequestAuthorization);

#[async_trait]
impl<S> FromRequestParts<S> for AuthorizedRequest
where
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        match parts.extensions.remove::<RequestAuthorization>() {
            Some(authorization) if authorization.authorized => Ok(AuthorizedRequest(authorization)),
            Some(_) => {
                warn!("unauthorized context reached a handler");
                Err(ApiError::unauthorized())
            }
            None => {
                error!("authorization context missing; is request_auth_middleware applied?");
                Err(ApiError::internal_error())
            }
        }
    }
}

impl std::ops::Deref for AuthorizedRequest {
    type Target = RequestAuthorization;

    fn deref(&self) -> &Self::Target {
        &self.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::Request as HttpRequest;

    fn authorization(action: RequestAction) -> RequestAuthorization {
        RequestAuthorization {
            action,
            principal: Principal::Logbook(Logbook {
                id: 3,
                callsign: "TEST1".to_string(),
                name: "Default HF".to_string(),
                ..Logbook::default()
            }),
            body: EnvelopeBody {
                callsign: "TEST1".to_string(),
                action: action.as_str().to_string(),
                logbook: None,
                qso: None,
            },
            authorized: true,
        }
    }

    #[test]
    fn test_require_action() {
        let ctx = authorization(RequestAction::InsertQso);
        assert!(ctx.require_action(RequestAction::InsertQso).is_ok());
        let err = ctx.require_action(RequestAction::RegisterLogbook).unwrap_err();
        assert_eq!(err.code, crate::error::ErrorCode::BadRequest);
    }

    #[test]
    fn test_principal_accessors() {
        let ctx = authorization(RequestAction::InsertQso);
        assert_eq!(ctx.logbook().map(|l| l.id), Some(3));
        assert!(ctx.user().is_none());
    }

    #[tokio::test]
    async fn test_extractor_is_single_use() {
        let mut request = HttpRequest::new(());
        request
            .extensions_mut()
            .insert(authorization(RequestAction::InsertQso));
        let (mut parts, _) = request.into_parts();

        let first = AuthorizedRequest::from_request_parts(&mut parts, &()).await;
        assert!(first.is_ok());

        let second = AuthorizedRequest::from_request_parts(&mut parts, &())
            .await
            .unwrap_err();
        assert_eq!(second, ApiError::internal_error());
    }

    #[tokio::test]
    async fn test_extractor_refuses_unauthorized_context() {
        let mut ctx = authorization(RequestAction::InsertQso);
        ctx.authorized = false;
        let mut request = HttpRequest::new(());
        request.extensions_mut().insert(ctx);
        let (mut parts, _) = request.into_parts();

        let err = AuthorizedRequest::from_request_parts(&mut parts, &())
            .await
            .unwrap_err();
        assert_eq!(err, ApiError::unauthorized());
    }
}
