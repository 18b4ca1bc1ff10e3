//! Logbook provisioning route.

use axum::{extract::State, http::StatusCode, response::IntoResponse, Json};
use station_core::RequestAction;

use crate::error::{ApiError, ApiResult};
use crate::middleware::AuthorizedRequest;
use crate::provisioning::provision_logbook;
use crate::state::AppState;
use crate::types::MessageResponse;

/// POST /api/logbook/register
///
/// Creates a logbook owned by the authenticated user and answers 201 with
/// the new full API key as `message`. The key is shown only here.
pub async fn register_logbook(
    State(state): State<AppState>,
    AuthorizedRequest(authorization): AuthorizedRequest,
) -> ApiResult<impl IntoResponse> {
    authorization.require_action(RequestAction::RegisterLogbook)?;

    let owner = authorization.user().map(|u| u.id).ok_or_else(|| {
        tracing::error!("password-authorized request carries no user");
        ApiError::internal_error()
    })?;

    let draft = authorization
        .body
        .logbook
        .ok_or_else(|| ApiError::validation_failed("logbook payload is required"))?;
    draft.validate()?;

    let provisioned = provision_logbook(
        state.store.as_ref(),
        state.config.api_key_prefix_len,
        &state.digester,
        owner,
        draft,
    )
    .await?;

    state.logbooks.put(&provisioned.logbook);

    Ok((
        StatusCode::CREATED,
        Json(MessageResponse {
            message: provisioned.expose_full_key().to_string(),
        }),
    ))
}
