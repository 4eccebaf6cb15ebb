//! The engine's sole external collaborator: a read/write interface over
//! tournament roster, round and match state. No implementation of this
//! trait ships with this crate — persistence is explicitly out of scope.

use crate::common::error::RepositoryError;
use crate::domain::model::{Match, MatchDraft, Participant, Round, TournamentConfig};

/// Native async-fn-in-trait, consumed only through the generic bound
/// `D: TournamentRepository` — never as a trait object.
pub trait TournamentRepository: Send + Sync {
    async fn load_tournament(&self, id: i64) -> Result<Option<TournamentConfig>, RepositoryError>;

    /// Excludes inactive participants.
    async fn load_active_participants(
        &self,
        tournament_id: i64,
    ) -> Result<Vec<Participant>, RepositoryError>;

    /// `up_to_but_excluding`, when present, restricts the result to rounds
    /// with `number < up_to_but_excluding`.
    async fn load_rounds(
        &self,
        tournament_id: i64,
        up_to_but_excluding: Option<u32>,
    ) -> Result<Vec<Round>, RepositoryError>;

    async fn load_matches_for_rounds(
        &self,
        round_ids: &[i64],
    ) -> Result<Vec<Match>, RepositoryError>;

    /// Batch, atomic.
    async fn insert_pairings(
        &self,
        round_id: i64,
        drafts: Vec<MatchDraft>,
    ) -> Result<Vec<Match>, RepositoryError>;

    async fn mark_round_paired(&self, round_id: i64, timestamp: i64) -> Result<(), RepositoryError>;

    /// Used by callers to enforce idempotence before invoking the engine.
    async fn load_existing_matches(&self, round_id: i64) -> Result<Vec<Match>, RepositoryError>;
}
