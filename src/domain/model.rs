//! Core data model: participants, rounds, matches, and the derived
//! per-player history that the pairing and tiebreak services consume.

use std::collections::{BTreeMap, HashSet};

use serde::{Deserialize, Serialize};

/// Stable integer identifier for a participant. Never reused within a
/// tournament's lifetime.
pub type ParticipantId = i64;

/// Default rating assigned to a participant with no recorded rating.
pub const DEFAULT_RATING: i32 = 1500;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Participant {
    pub id: ParticipantId,
    pub name: String,
    pub rating: Option<i32>,
    /// Inactive participants are excluded from future pairings but retain history.
    pub active: bool,
}

impl Participant {
    pub fn rating_or_default(&self) -> i32 {
        self.rating.unwrap_or(DEFAULT_RATING)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum RoundStatus {
    Pending,
    Paired,
    Completed,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Round {
    pub id: i64,
    pub tournament_id: i64,
    /// Monotonic, 1-based.
    pub number: u32,
    pub status: RoundStatus,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Color {
    White,
    Black,
}

impl Color {
    pub fn opposite(self) -> Color {
        match self {
            Color::White => Color::Black,
            Color::Black => Color::White,
        }
    }
}

/// Terminal result tag for a match. Closed set, matched exhaustively
/// everywhere it is consumed — never modeled as parallel booleans.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum MatchResult {
    WhiteWins,
    BlackWins,
    Draw,
    Bye,
    /// White loses by forfeit.
    ForfeitWhite,
    /// Black loses by forfeit.
    ForfeitBlack,
    NotPlayed,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Match {
    pub id: i64,
    pub round_id: i64,
    pub round_number: u32,
    /// Board number within the round, 1-based.
    pub board: u32,
    pub white: ParticipantId,
    /// `None` marks a bye.
    pub black: Option<ParticipantId>,
    pub result: MatchResult,
    /// Canonical points awarded to white, not derived from `result` at read time.
    pub score_white: f64,
    /// Canonical points awarded to black (0.0 for a bye).
    pub score_black: f64,
}

/// Read-only inputs to the engine, supplied by the caller's repository.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TournamentConfig {
    pub id: i64,
    /// Planned total rounds.
    pub rounds: u32,
    pub points_win: f64,
    pub points_draw: f64,
    pub points_loss: f64,
    pub bye_points: f64,
    /// Ordered tiebreak keys, e.g. `["buchholz", "direct_encounter"]`.
    pub tiebreakers: Vec<String>,
    /// If true, a participant who already received a bye is deprioritized
    /// for future byes.
    pub forbid_repeat_bye: bool,
}

/// Outcome of a single round for a single participant. Closed set.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Outcome {
    Win,
    Loss,
    Draw,
    Bye,
    ForfeitWin,
    ForfeitLoss,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlayerRoundRecord {
    pub round_number: u32,
    pub opponent: Option<ParticipantId>,
    /// `None` for a bye round.
    pub color: Option<Color>,
    pub outcome: Outcome,
    /// Points actually scored this round, taken from the match row.
    pub points_scored: f64,
    /// FIDE virtual opponent score, present only on bye records.
    pub virtual_opponent_score: Option<f64>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlayerHistory {
    pub participant_id: ParticipantId,
    pub score: f64,
    pub adjusted_score: f64,
    pub white_count: u32,
    pub black_count: u32,
    pub last_color: Option<Color>,
    /// The color of the last two rounds, if equal and non-null.
    pub last_two_same_color: Option<Color>,
    pub had_bye: bool,
    pub opponents: HashSet<ParticipantId>,
    pub records: Vec<PlayerRoundRecord>,
}

impl PlayerHistory {
    pub fn empty(participant_id: ParticipantId) -> Self {
        Self {
            participant_id,
            score: 0.0,
            adjusted_score: 0.0,
            white_count: 0,
            black_count: 0,
            last_color: None,
            last_two_same_color: None,
            had_bye: false,
            opponents: HashSet::new(),
            records: Vec::new(),
        }
    }
}

/// A single board in an as-yet-unpersisted pairing, handed to the
/// repository's `insert_pairings`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MatchDraft {
    pub board: u32,
    pub white: ParticipantId,
    /// `None` marks a bye.
    pub black: Option<ParticipantId>,
    /// `MatchResult::Bye` for the bye board, `MatchResult::NotPlayed` otherwise.
    pub default_result: MatchResult,
    pub score_white: f64,
    pub score_black: f64,
    pub source_tag: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PairingResult {
    /// Ordered by board number; the bye board, if any, is always last.
    pub pairings: Vec<MatchDraft>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StandingRow {
    /// 1-based position in the sorted list.
    pub rank: u32,
    pub participant_id: ParticipantId,
    pub score: f64,
    pub tiebreak_values: BTreeMap<String, f64>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Standings {
    pub rows: Vec<StandingRow>,
}
