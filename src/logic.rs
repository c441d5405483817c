//! Core behaviors shared by both HTTP and WebSocket handlers.
//!
//! This includes:
//!   - Creating sessions (the only call that runs the generator)
//!   - Serving a round's presentation payload
//!   - Recording submitted choices
//!   - Exporting a session's results

use tracing::{info, instrument};

use crate::errors::ExperimentError;
use crate::protocol::{
  to_results_out, to_round_out, to_session_out, ResultsOut, RoundOut, SessionOut,
};
use crate::state::AppState;
use crate::util::trunc_for_log;

/// Create a session and describe it to the caller. When only labels are
/// given, the participant count follows them.
#[instrument(level = "info", skip(state, labels))]
pub async fn create_session(
  state: &AppState,
  num_participants: Option<usize>,
  labels: Option<Vec<String>>,
) -> Result<SessionOut, ExperimentError> {
  let count = num_participants
    .or_else(|| labels.as_ref().map(|l| l.len()))
    .unwrap_or(1);
  let session = state.create_session(count, labels).await?;
  Ok(to_session_out(&session))
}

/// Fetch one round's presentation payload. Serving a round opens that
/// round's record for the participant.
#[instrument(level = "info", skip(state), fields(%session_id, %participant_id, round))]
pub async fn serve_round(
  state: &AppState,
  session_id: &str,
  participant_id: &str,
  round: usize,
) -> Result<RoundOut, ExperimentError> {
  let view = state.round_view(session_id, participant_id, round).await?;
  Ok(to_round_out(&view))
}

/// Record a submitted choice into the participant's round record.
#[instrument(level = "info", skip(state, choice), fields(%session_id, %participant_id, round))]
pub async fn submit_choice(
  state: &AppState,
  session_id: &str,
  participant_id: &str,
  round: usize,
  choice: &str,
) -> Result<(), ExperimentError> {
  state
    .record_choice(session_id, participant_id, round, choice)
    .await?;
  info!(
    target: "choice_sets",
    %session_id,
    %participant_id,
    round,
    choice = %trunc_for_log(choice, 80),
    "Choice recorded"
  );
  Ok(())
}

/// Export a session's recorded rounds.
#[instrument(level = "info", skip(state), fields(%session_id))]
pub async fn session_results(
  state: &AppState,
  session_id: &str,
) -> Result<ResultsOut, ExperimentError> {
  let session = state.session_snapshot(session_id).await?;
  Ok(to_results_out(&session))
}
