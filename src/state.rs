//! Application state: the in-memory session store and its lifecycle.
//!
//! This module owns:
//!   - the experiment configuration in force (TOML or defaults)
//!   - the session store (session id -> plan + participants)
//!   - session creation, the only place the generator pipeline runs
//!   - per-participant round records (the permanent experiment log)
//!
//! A session's plan is computed exactly once, at creation, behind an `Arc`,
//! and read-only for every participant and round afterwards. A session is
//! fully built before it becomes visible in the store, so no round of it
//! can be served against a half-constructed plan.

use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::{info, instrument, warn};
use uuid::Uuid;

use crate::config::{load_experiment_config_from_env, ExperimentConfig};
use crate::domain::{RoundRecord, SessionPlan};
use crate::errors::ExperimentError;
use crate::generator::{build_session_plan, enumerate_options, enumerate_pairs, informative_pairs};
use crate::util::epoch_ms;

/// One person taking the experiment. Rounds fill in as they are served.
#[derive(Clone, Debug)]
pub struct Participant {
    pub id: String,
    pub label: String,
    pub rounds: HashMap<usize, RoundRecord>,
}

/// One running session: the shared plan plus everyone attached to it.
#[derive(Clone, Debug)]
pub struct Session {
    pub id: String,
    pub none_option: bool,
    pub plan: Arc<SessionPlan>,
    pub participants: HashMap<String, Participant>,
}

/// What the presentation layer needs for one round of one session.
#[derive(Clone, Debug)]
pub struct RoundView {
    pub round: usize,
    pub none_option: bool,
    pub plan: Arc<SessionPlan>,
}

#[derive(Clone)]
pub struct AppState {
    pub config: ExperimentConfig,
    pub sessions: Arc<RwLock<HashMap<String, Session>>>,
}

impl AppState {
    /// Build state from env: load config (TOML or defaults), validate the
    /// design, and log the design inventory.
    #[instrument(level = "info", skip_all)]
    pub fn new() -> Result<Self, ExperimentError> {
        Self::with_config(load_experiment_config_from_env().unwrap_or_default())
    }

    pub fn with_config(config: ExperimentConfig) -> Result<Self, ExperimentError> {
        config.validate()?;

        // Startup inventory: option universe, candidate pairs, informative
        // pool. Surfaces a pool-too-small misconfiguration before anyone
        // tries to create a session.
        let options = enumerate_options(&config.attributes);
        let candidates = enumerate_pairs(&options);
        let candidate_count = candidates.len();
        let pool = informative_pairs(candidates);
        info!(
            target: "choice_sets",
            options = options.len(),
            candidate_pairs = candidate_count,
            informative = pool.len(),
            num_rounds = config.num_rounds,
            "Startup design inventory"
        );
        if pool.len() < config.num_rounds {
            warn!(
                target: "choice_sets",
                informative = pool.len(),
                num_rounds = config.num_rounds,
                "num_rounds exceeds the informative pool; session creation will fail until the design or round count changes"
            );
        }

        Ok(Self {
            config,
            sessions: Arc::new(RwLock::new(HashMap::new())),
        })
    }

    /// Create a session: run the choice-set pipeline once, then attach the
    /// participants. Nothing is stored if the pipeline fails, so a fatal
    /// configuration error never leaves a partial session behind.
    #[instrument(level = "info", skip(self, labels))]
    pub async fn create_session(
        &self,
        num_participants: usize,
        labels: Option<Vec<String>>,
    ) -> Result<Session, ExperimentError> {
        let plan = Arc::new({
            let mut rng = rand::thread_rng();
            build_session_plan(
                &self.config.attributes,
                self.config.num_rounds,
                &mut rng,
            )?
        });

        let count = num_participants.max(1);
        let mut participants = HashMap::with_capacity(count);
        for i in 0..count {
            let id = Uuid::new_v4().to_string();
            let label = labels
                .as_ref()
                .and_then(|l| l.get(i).cloned())
                .unwrap_or_else(|| format!("P{}", i + 1));
            participants.insert(id.clone(), Participant {
                id,
                label,
                rounds: HashMap::new(),
            });
        }

        let session = Session {
            id: Uuid::new_v4().to_string(),
            none_option: self.config.none_option,
            plan,
            participants,
        };
        let id = session.id.clone();
        self.sessions.write().await.insert(id.clone(), session.clone());
        info!(
            target: "choice_sets",
            session = %id,
            rounds = session.plan.num_rounds(),
            participants = count,
            "Session created; every participant shares the same round sequence"
        );
        Ok(session)
    }

    /// Serve round `round` (1-based) to a participant: validates the lookup,
    /// creates the participant's round record on first service, and returns
    /// the shared plan handle for the presentation layer.
    #[instrument(level = "debug", skip(self), fields(%session_id, %participant_id, round))]
    pub async fn round_view(
        &self,
        session_id: &str,
        participant_id: &str,
        round: usize,
    ) -> Result<RoundView, ExperimentError> {
        let mut sessions = self.sessions.write().await;
        let session = sessions
            .get_mut(session_id)
            .ok_or_else(|| ExperimentError::UnknownSession(session_id.to_string()))?;
        ensure_round_record(session, participant_id, round)?;
        Ok(RoundView {
            round,
            none_option: session.none_option,
            plan: Arc::clone(&session.plan),
        })
    }

    /// Record a participant's submitted choice for a round. The record is
    /// created on the spot if the round was never served before (the WS flow
    /// may submit without a prior fetch). Resubmission overwrites.
    #[instrument(level = "debug", skip(self, choice), fields(%session_id, %participant_id, round))]
    pub async fn record_choice(
        &self,
        session_id: &str,
        participant_id: &str,
        round: usize,
        choice: &str,
    ) -> Result<(), ExperimentError> {
        let mut sessions = self.sessions.write().await;
        let session = sessions
            .get_mut(session_id)
            .ok_or_else(|| ExperimentError::UnknownSession(session_id.to_string()))?;
        let record = ensure_round_record(session, participant_id, round)?;
        if record.choice.is_some() {
            warn!(
                target: "choice_sets",
                %session_id,
                %participant_id,
                round,
                "Overwriting a previously recorded choice"
            );
        }
        record.choice = Some(choice.to_string());
        record.answered_ms = Some(epoch_ms());
        Ok(())
    }

    /// Read-only snapshot of a session, for results export.
    #[instrument(level = "debug", skip(self), fields(%session_id))]
    pub async fn session_snapshot(&self, session_id: &str) -> Result<Session, ExperimentError> {
        self.sessions
            .read()
            .await
            .get(session_id)
            .cloned()
            .ok_or_else(|| ExperimentError::UnknownSession(session_id.to_string()))
    }
}

fn ensure_round_record<'a>(
    session: &'a mut Session,
    participant_id: &str,
    round: usize,
) -> Result<&'a mut RoundRecord, ExperimentError> {
    let num_rounds = session.plan.num_rounds();
    if round == 0 || round > num_rounds {
        return Err(ExperimentError::RoundOutOfRange { round, num_rounds });
    }
    let plan = Arc::clone(&session.plan);
    let participant = session
        .participants
        .get_mut(participant_id)
        .ok_or_else(|| ExperimentError::UnknownParticipant(participant_id.to_string()))?;
    Ok(participant
        .rounds
        .entry(round)
        .or_insert_with(|| new_round_record(&plan, round)))
}

/// Fresh unanswered record for one round, with the coded data serialized as
/// stable text the way the experiment log keeps it.
fn new_round_record(plan: &SessionPlan, round: usize) -> RoundRecord {
    let pair = &plan.coded[round - 1];
    RoundRecord {
        round,
        attributes: serde_json::to_string(&plan.attributes).unwrap_or_default(),
        option1: serde_json::to_string(&pair.first).unwrap_or_default(),
        option2: serde_json::to_string(&pair.second).unwrap_or_default(),
        choice: None,
        served_ms: epoch_ms(),
        answered_ms: None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_state() -> AppState {
        AppState::with_config(ExperimentConfig::default()).expect("stock design is valid")
    }

    #[tokio::test]
    async fn participants_share_one_plan_in_one_order() {
        let state = test_state();
        let session = state.create_session(3, None).await.expect("session");
        assert_eq!(session.plan.num_rounds(), 6);

        let ids: Vec<String> = session.participants.keys().cloned().collect();
        for id in &ids {
            for round in 1..=6 {
                let view = state
                    .round_view(&session.id, id, round)
                    .await
                    .expect("round");
                assert_eq!(view.plan.coded[round - 1], session.plan.coded[round - 1]);
            }
        }
    }

    #[tokio::test]
    async fn round_record_lifecycle() {
        let state = test_state();
        let session = state
            .create_session(1, Some(vec!["anna".into()]))
            .await
            .expect("session");
        let pid = session.participants.keys().next().unwrap().clone();

        state.round_view(&session.id, &pid, 1).await.expect("serve");
        state
            .record_choice(&session.id, &pid, 1, "2")
            .await
            .expect("record");

        let snapshot = state.session_snapshot(&session.id).await.expect("snapshot");
        let record = &snapshot.participants[&pid].rounds[&1];
        assert_eq!(record.choice.as_deref(), Some("2"));
        assert!(record.answered_ms.is_some());
        assert_eq!(
            record.option1,
            serde_json::to_string(&session.plan.coded[0].first).unwrap()
        );
        assert_eq!(snapshot.participants[&pid].label, "anna");
    }

    #[tokio::test]
    async fn lookups_fail_loudly() {
        let state = test_state();
        let session = state.create_session(1, None).await.expect("session");
        let pid = session.participants.keys().next().unwrap().clone();

        assert!(matches!(
            state.round_view("nope", &pid, 1).await,
            Err(ExperimentError::UnknownSession(_))
        ));
        assert!(matches!(
            state.round_view(&session.id, "nope", 1).await,
            Err(ExperimentError::UnknownParticipant(_))
        ));
        assert!(matches!(
            state.round_view(&session.id, &pid, 0).await,
            Err(ExperimentError::RoundOutOfRange { .. })
        ));
        assert!(matches!(
            state.round_view(&session.id, &pid, 7).await,
            Err(ExperimentError::RoundOutOfRange { .. })
        ));
    }

    #[tokio::test]
    async fn oversized_round_count_creates_no_session() {
        let mut config = ExperimentConfig::default();
        config.num_rounds = 100;
        // The shape is fine; only the pool check can reject this.
        let state = AppState::with_config(config).expect("shape is valid");

        let err = state.create_session(2, None).await.unwrap_err();
        assert!(matches!(
            err,
            ExperimentError::PoolTooSmall {
                requested: 100,
                available: 15
            }
        ));
        assert!(state.sessions.read().await.is_empty());
    }
}
