//! HTTP endpoint handlers. These are thin wrappers that forward to core logic.
//! Each handler is instrumented; failures map to a status plus an ErrorOut body.

use std::sync::Arc;

use axum::{
  extract::{Path, State},
  http::StatusCode,
  response::{IntoResponse, Response},
  Json,
};
use tracing::{info, instrument};

use crate::errors::ExperimentError;
use crate::logic::*;
use crate::protocol::*;
use crate::state::AppState;

fn error_response(err: ExperimentError) -> Response {
  let status = match &err {
    ExperimentError::UnknownSession(_) | ExperimentError::UnknownParticipant(_) => {
      StatusCode::NOT_FOUND
    }
    ExperimentError::RoundOutOfRange { .. } => StatusCode::BAD_REQUEST,
    ExperimentError::PoolTooSmall { .. } | ExperimentError::InvalidDesign(_) => {
      StatusCode::UNPROCESSABLE_ENTITY
    }
  };
  (status, Json(ErrorOut { message: err.to_string() })).into_response()
}

#[instrument(level = "info")]
pub async fn http_health() -> impl IntoResponse {
  Json(HealthOut { ok: true })
}

#[instrument(level = "info", skip(state, body))]
pub async fn http_create_session(
  State(state): State<Arc<AppState>>,
  Json(body): Json<CreateSessionIn>,
) -> Response {
  match create_session(&state, body.num_participants, body.labels).await {
    Ok(out) => {
      info!(target: "choice_sets", session = %out.session_id, rounds = out.num_rounds, "HTTP session created");
      Json(out).into_response()
    }
    Err(e) => error_response(e),
  }
}

#[instrument(level = "info", skip(state), fields(%session_id, %participant_id, round))]
pub async fn http_get_round(
  State(state): State<Arc<AppState>>,
  Path((session_id, participant_id, round)): Path<(String, String, usize)>,
) -> Response {
  match serve_round(&state, &session_id, &participant_id, round).await {
    Ok(out) => Json(out).into_response(),
    Err(e) => error_response(e),
  }
}

#[instrument(level = "info", skip(state, body), fields(%session_id, %participant_id, round))]
pub async fn http_post_choice(
  State(state): State<Arc<AppState>>,
  Path((session_id, participant_id, round)): Path<(String, String, usize)>,
  Json(body): Json<ChoiceIn>,
) -> Response {
  match submit_choice(&state, &session_id, &participant_id, round, &body.choice).await {
    Ok(()) => Json(ChoiceOut { round, recorded: true }).into_response(),
    Err(e) => error_response(e),
  }
}

#[instrument(level = "info", skip(state), fields(%session_id))]
pub async fn http_session_results(
  State(state): State<Arc<AppState>>,
  Path(session_id): Path<String>,
) -> Response {
  match session_results(&state, &session_id).await {
    Ok(out) => Json(out).into_response(),
    Err(e) => error_response(e),
  }
}
