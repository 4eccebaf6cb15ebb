//! FIDE Dutch System Swiss pairing and tiebreak engine.
//!
//! This crate is a pure, stateless library: it owns no storage and starts
//! no logging subscriber of its own. Host applications supply persistence
//! through [`repository::TournamentRepository`] and install whatever
//! `tracing` subscriber suits them; this crate only emits `tracing` spans
//! and events.

pub mod common;
pub mod domain;
pub mod repository;
pub mod service;

#[cfg(any(test, feature = "test-support"))]
pub mod test_support;

pub use common::error::{EngineError, RepositoryError};
pub use domain::model::{
    Color, Match, MatchDraft, MatchResult, Outcome, PairingResult, Participant, ParticipantId,
    PlayerHistory, PlayerRoundRecord, Round, RoundStatus, Standings, StandingRow,
    TournamentConfig,
};
pub use repository::TournamentRepository;
pub use service::history::prepare_history;
pub use service::pairing::SwissPairingEngine;
pub use service::tiebreak::compute_standings;
