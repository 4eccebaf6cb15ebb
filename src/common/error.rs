use serde::Serialize;
use thiserror::Error;

use crate::domain::model::ParticipantId;

/// Error surfaced by a caller-supplied `TournamentRepository` implementation.
/// The engine never interprets this; it propagates it unchanged under
/// [`EngineError::RepositoryUnavailable`].
#[derive(Debug, Error)]
#[error("{0}")]
pub struct RepositoryError(pub String);

/// Global error for the engine's public operations.
#[derive(Debug, Error, Serialize)]
#[serde(tag = "kind", content = "data")]
pub enum EngineError {
    #[error("tournament {0} not found")]
    TournamentNotFound(i64),

    #[error("round {0} not found")]
    RoundNotFound(i64),

    #[error("participant {0} not found")]
    ParticipantNotFound(ParticipantId),

    #[error("insufficient participants: at least 2 active participants are required, found {0}")]
    InsufficientParticipants(usize),

    #[error("no legal pairing exists for {} residual participant(s)", residual.len())]
    PairingInfeasible { residual: Vec<ParticipantId> },

    #[error("tournament exhausted: round {requested} exceeds configured total of {configured}")]
    TournamentExhausted { requested: u32, configured: u32 },

    #[error("repository unavailable: {0}")]
    RepositoryUnavailable(#[from] RepositoryError),

    #[error("invalid history: round {round} contains participant {participant} more than once")]
    InvalidHistory { round: u32, participant: ParticipantId },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn repository_unavailable_wraps_source_message() {
        let err: EngineError = RepositoryError("connection reset".into()).into();
        assert_eq!(
            err.to_string(),
            "repository unavailable: connection reset"
        );
    }

    #[test]
    fn pairing_infeasible_reports_residual_count() {
        let err = EngineError::PairingInfeasible { residual: vec![1, 2, 3] };
        assert_eq!(err.to_string(), "no legal pairing exists for 3 residual participant(s)");
    }
}
