//! An in-memory [`TournamentRepository`] used by this crate's own
//! integration tests and doctests. Not part of the public contract for
//! production callers — those bring their own persistence layer.

use std::collections::HashMap;
use std::sync::Mutex;

use crate::common::error::RepositoryError;
use crate::domain::model::{
    Match, MatchDraft, MatchResult, Participant, ParticipantId, Round, RoundStatus,
    TournamentConfig,
};
use crate::repository::TournamentRepository;

#[derive(Debug, Default)]
struct State {
    tournament: Option<TournamentConfig>,
    participants: HashMap<ParticipantId, Participant>,
    rounds: Vec<Round>,
    matches: Vec<Match>,
    next_match_id: i64,
}

#[derive(Debug, Default)]
pub struct InMemoryRepository {
    state: Mutex<State>,
}

impl InMemoryRepository {
    pub fn new(config: TournamentConfig) -> Self {
        let state = State { tournament: Some(config), next_match_id: 1, ..State::default() };
        Self { state: Mutex::new(state) }
    }

    pub fn add_participant(&self, participant: Participant) {
        let mut state = self.state.lock().expect("test repository mutex poisoned");
        state.participants.insert(participant.id, participant);
    }

    pub fn add_round(&self, round: Round) {
        let mut state = self.state.lock().expect("test repository mutex poisoned");
        state.rounds.push(round);
    }

    /// Seeds an already-played match directly, bypassing `insert_pairings`.
    pub fn record_result(&self, m: Match) {
        let mut state = self.state.lock().expect("test repository mutex poisoned");
        state.matches.push(m);
    }
}

impl TournamentRepository for InMemoryRepository {
    async fn load_tournament(&self, id: i64) -> Result<Option<TournamentConfig>, RepositoryError> {
        let state = self.state.lock().expect("test repository mutex poisoned");
        Ok(state.tournament.clone().filter(|t| t.id == id))
    }

    async fn load_active_participants(
        &self,
        _tournament_id: i64,
    ) -> Result<Vec<Participant>, RepositoryError> {
        let state = self.state.lock().expect("test repository mutex poisoned");
        Ok(state.participants.values().filter(|p| p.active).cloned().collect())
    }

    async fn load_rounds(
        &self,
        tournament_id: i64,
        up_to_but_excluding: Option<u32>,
    ) -> Result<Vec<Round>, RepositoryError> {
        let state = self.state.lock().expect("test repository mutex poisoned");
        Ok(state
            .rounds
            .iter()
            .filter(|r| r.tournament_id == tournament_id)
            .filter(|r| up_to_but_excluding.is_none_or(|limit| r.number < limit))
            .cloned()
            .collect())
    }

    async fn load_matches_for_rounds(&self, round_ids: &[i64]) -> Result<Vec<Match>, RepositoryError> {
        let state = self.state.lock().expect("test repository mutex poisoned");
        Ok(state
            .matches
            .iter()
            .filter(|m| round_ids.contains(&m.round_id))
            .cloned()
            .collect())
    }

    async fn insert_pairings(
        &self,
        round_id: i64,
        drafts: Vec<MatchDraft>,
    ) -> Result<Vec<Match>, RepositoryError> {
        let mut state = self.state.lock().expect("test repository mutex poisoned");
        let round_number = state
            .rounds
            .iter()
            .find(|r| r.id == round_id)
            .map(|r| r.number)
            .ok_or_else(|| RepositoryError(format!("round {round_id} not registered")))?;

        let mut inserted = Vec::with_capacity(drafts.len());
        for draft in drafts {
            let id = state.next_match_id;
            state.next_match_id += 1;
            let m = Match {
                id,
                round_id,
                round_number,
                board: draft.board,
                white: draft.white,
                black: draft.black,
                result: draft.default_result,
                score_white: draft.score_white,
                score_black: draft.score_black,
            };
            state.matches.push(m.clone());
            inserted.push(m);
        }
        Ok(inserted)
    }

    async fn mark_round_paired(&self, round_id: i64, _timestamp: i64) -> Result<(), RepositoryError> {
        let mut state = self.state.lock().expect("test repository mutex poisoned");
        let round = state
            .rounds
            .iter_mut()
            .find(|r| r.id == round_id)
            .ok_or_else(|| RepositoryError(format!("round {round_id} not registered")))?;
        round.status = RoundStatus::Paired;
        Ok(())
    }

    async fn load_existing_matches(&self, round_id: i64) -> Result<Vec<Match>, RepositoryError> {
        let state = self.state.lock().expect("test repository mutex poisoned");
        Ok(state.matches.iter().filter(|m| m.round_id == round_id).cloned().collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config() -> TournamentConfig {
        TournamentConfig {
            id: 1,
            rounds: 3,
            points_win: 1.0,
            points_draw: 0.5,
            points_loss: 0.0,
            bye_points: 1.0,
            tiebreakers: vec!["buchholz".to_string()],
            forbid_repeat_bye: false,
        }
    }

    #[tokio::test]
    async fn insert_pairings_assigns_ids_and_round_number() {
        let repo = InMemoryRepository::new(config());
        repo.add_round(Round { id: 10, tournament_id: 1, number: 1, status: RoundStatus::Pending });

        let drafts = vec![MatchDraft {
            board: 1,
            white: 1,
            black: Some(2),
            default_result: MatchResult::NotPlayed,
            score_white: 0.0,
            score_black: 0.0,
            source_tag: "test".to_string(),
        }];
        let inserted = repo.insert_pairings(10, drafts).await.unwrap();
        assert_eq!(inserted.len(), 1);
        assert_eq!(inserted[0].round_number, 1);

        repo.mark_round_paired(10, 0).await.unwrap();
        let rounds = repo.load_rounds(1, None).await.unwrap();
        assert_eq!(rounds[0].status, RoundStatus::Paired);
    }

    #[tokio::test]
    async fn load_active_participants_excludes_inactive() {
        let repo = InMemoryRepository::new(config());
        repo.add_participant(Participant { id: 1, name: "Alice".into(), rating: Some(1600), active: true });
        repo.add_participant(Participant { id: 2, name: "Bob".into(), rating: Some(1500), active: false });

        let active = repo.load_active_participants(1).await.unwrap();
        assert_eq!(active.len(), 1);
        assert_eq!(active[0].id, 1);
    }
}
