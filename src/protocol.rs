//! Public protocol structs for WebSocket and HTTP endpoints (serde ready).
//! Keep this small and stable to evolve backend and frontend independently.

use serde::{Deserialize, Serialize};

use crate::domain::{CodedPair, DecodedPair, IndexedPair, RoundRecord};
use crate::state::{RoundView, Session};

/// Messages the client can send over WebSocket.
#[derive(Debug, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ClientWsMessage {
    Ping,
    CreateSession {
        #[serde(rename = "numParticipants", default)]
        num_participants: Option<usize>,
        #[serde(default)]
        labels: Option<Vec<String>>,
    },
    Round {
        #[serde(rename = "sessionId")]
        session_id: String,
        #[serde(rename = "participantId")]
        participant_id: String,
        round: usize,
    },
    SubmitChoice {
        #[serde(rename = "sessionId")]
        session_id: String,
        #[serde(rename = "participantId")]
        participant_id: String,
        round: usize,
        choice: String,
    },
    Results {
        #[serde(rename = "sessionId")]
        session_id: String,
    },
}

/// Messages the server sends back over WebSocket.
#[derive(Debug, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ServerWsMessage {
    Pong,
    Session { session: SessionOut },
    Round { round: RoundOut },
    ChoiceRecorded { round: usize, choice: String },
    Results { results: ResultsOut },
    Error { message: String },
}

/// DTO describing a freshly created session.
#[derive(Debug, Serialize)]
pub struct SessionOut {
    #[serde(rename = "sessionId")]
    pub session_id: String,
    #[serde(rename = "numRounds")]
    pub num_rounds: usize,
    #[serde(rename = "noneOption")]
    pub none_option: bool,
    pub participants: Vec<ParticipantOut>,
}

#[derive(Debug, Serialize)]
pub struct ParticipantOut {
    #[serde(rename = "participantId")]
    pub participant_id: String,
    pub label: String,
}

/// Per-round presentation payload: the decoded pair for rendering, the
/// coded pair for logging/analysis, and the position-tagged pair kept as a
/// separate field so display formatting can evolve independently.
#[derive(Debug, Serialize)]
pub struct RoundOut {
    pub round: usize,
    #[serde(rename = "numRounds")]
    pub num_rounds: usize,
    #[serde(rename = "noneOption")]
    pub none_option: bool,
    pub attributes: Vec<String>,
    pub options: DecodedPair,
    #[serde(rename = "optionsCoded")]
    pub options_coded: CodedPair,
    #[serde(rename = "optionsIndex")]
    pub options_index: IndexedPair,
}

/// DTO for a whole session's recorded rounds.
#[derive(Debug, Serialize)]
pub struct ResultsOut {
    #[serde(rename = "sessionId")]
    pub session_id: String,
    pub participants: Vec<ParticipantResultsOut>,
}

#[derive(Debug, Serialize)]
pub struct ParticipantResultsOut {
    #[serde(rename = "participantId")]
    pub participant_id: String,
    pub label: String,
    pub rounds: Vec<RoundRecord>,
}

/// Convert a created `Session` (internal) to the public DTO.
pub fn to_session_out(session: &Session) -> SessionOut {
    let mut participants: Vec<ParticipantOut> = session
        .participants
        .values()
        .map(|p| ParticipantOut {
            participant_id: p.id.clone(),
            label: p.label.clone(),
        })
        .collect();
    participants.sort_by(|a, b| a.label.cmp(&b.label));

    SessionOut {
        session_id: session.id.clone(),
        num_rounds: session.plan.num_rounds(),
        none_option: session.none_option,
        participants,
    }
}

/// Convert a served round (internal view) to the public DTO.
pub fn to_round_out(view: &RoundView) -> RoundOut {
    let idx = view.round - 1;
    RoundOut {
        round: view.round,
        num_rounds: view.plan.num_rounds(),
        none_option: view.none_option,
        attributes: view.plan.attributes.clone(),
        options: view.plan.decoded[idx].clone(),
        options_coded: view.plan.coded[idx].clone(),
        options_index: view.plan.indexed[idx].clone(),
    }
}

/// Convert a session snapshot into the results export, rounds in order.
pub fn to_results_out(session: &Session) -> ResultsOut {
    let mut participants: Vec<ParticipantResultsOut> = session
        .participants
        .values()
        .map(|p| {
            let mut rounds: Vec<RoundRecord> = p.rounds.values().cloned().collect();
            rounds.sort_by_key(|r| r.round);
            ParticipantResultsOut {
                participant_id: p.id.clone(),
                label: p.label.clone(),
                rounds,
            }
        })
        .collect();
    participants.sort_by(|a, b| a.label.cmp(&b.label));

    ResultsOut {
        session_id: session.id.clone(),
        participants,
    }
}

//
// HTTP request/response DTOs
//

#[derive(Debug, Deserialize)]
pub struct CreateSessionIn {
    #[serde(rename = "numParticipants", default)]
    pub num_participants: Option<usize>,
    #[serde(default)]
    pub labels: Option<Vec<String>>,
}

#[derive(Deserialize)]
pub struct ChoiceIn {
    pub choice: String,
}

#[derive(Serialize)]
pub struct ChoiceOut {
    pub round: usize,
    pub recorded: bool,
}

#[derive(Serialize)]
pub struct ErrorOut {
    pub message: String,
}

#[derive(Serialize)]
pub struct HealthOut {
    pub ok: bool,
}
