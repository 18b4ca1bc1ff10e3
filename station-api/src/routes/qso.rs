//! QSO insert route.

use axum::{extract::State, http::StatusCode, response::IntoResponse, Json};
use station_core::{Qso, RequestAction};

use crate::error::{ApiError, ApiResult};
use crate::middleware::AuthorizedRequest;
use crate::state::AppState;
use crate::types::QsoInsertResponse;

/// POST /api/qso/insert
///
/// The logbook comes from the API key, never from the payload. The QSO's
/// station callsign must match the logbook callsign.
pub async fn insert_qso(
    State(state): State<AppState>,
    AuthorizedRequest(authorization): AuthorizedRequest,
) -> ApiResult<impl IntoResponse> {
    authorization.require_action(RequestAction::InsertQso)?;

    let logbook = authorization.logbook().cloned().ok_or_else(|| {
        tracing::error!("api-key-authorized request carries no logbook");
        ApiError::internal_error()
    })?;

    let draft = authorization
        .body
        .qso
        .ok_or_else(|| ApiError::validation_failed("qso payload is required"))?;
    draft.validate()?;

    if !draft
        .station_callsign
        .eq_ignore_ascii_case(&logbook.callsign)
    {
        return Err(
            ApiError::bad_request("Station callsign does not match the logbook callsign")
                .with_details(serde_json::json!({ "field": "qso.station_callsign" })),
        );
    }

    let stored = state
        .store
        .insert_qso(&Qso::from_draft(draft, logbook.id))
        .await?;

    tracing::info!(
        logbook_id = logbook.id,
        qso_id = stored.id,
        call = %stored.call,
        "qso inserted"
    );

    Ok((
        StatusCode::CREATED,
        Json(QsoInsertResponse {
            message: "Successful".to_string(),
            qso_id: stored.id,
        }),
    ))
}
