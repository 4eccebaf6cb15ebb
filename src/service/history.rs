//! History Model: a single pass over match rows (plus a second pass for
//! bye records) that materializes each participant's `PlayerHistory`. Pure,
//! deterministic, idempotent — never mutates its inputs and never persists
//! anything itself.

use std::collections::{HashMap, HashSet};

use tracing::{debug, instrument};

use crate::common::error::EngineError;
use crate::domain::model::{
    Color, Match, MatchResult, Outcome, Participant, ParticipantId, PlayerHistory,
    PlayerRoundRecord,
};

/// Validates and builds a dense `participant_id -> PlayerHistory` map.
///
/// `roster` must include every participant that should appear in the
/// output (active or not); participants with no matches get an empty
/// history. Fails only on [`EngineError::InvalidHistory`] — a round with
/// the same participant in two matches — everything else is normalized
/// silently, per the engine's propagation policy.
#[instrument(skip(roster, matches))]
pub fn prepare_history(
    roster: &[Participant],
    matches: &[Match],
) -> Result<HashMap<ParticipantId, PlayerHistory>, EngineError> {
    validate_matches(matches)?;
    Ok(build_history(roster, matches))
}

fn validate_matches(matches: &[Match]) -> Result<(), EngineError> {
    let mut seen_per_round: HashMap<u32, HashSet<ParticipantId>> = HashMap::new();
    for m in matches {
        let seen = seen_per_round.entry(m.round_number).or_default();
        if !seen.insert(m.white) {
            return Err(EngineError::InvalidHistory {
                round: m.round_number,
                participant: m.white,
            });
        }
        if let Some(black) = m.black {
            if !seen.insert(black) {
                return Err(EngineError::InvalidHistory {
                    round: m.round_number,
                    participant: black,
                });
            }
        }
    }
    Ok(())
}

fn build_history(
    roster: &[Participant],
    matches: &[Match],
) -> HashMap<ParticipantId, PlayerHistory> {
    let mut histories: HashMap<ParticipantId, PlayerHistory> = roster
        .iter()
        .map(|p| (p.id, PlayerHistory::empty(p.id)))
        .collect();

    let mut ordered: Vec<&Match> = matches.iter().collect();
    ordered.sort_by_key(|m| (m.round_number, m.board));

    let max_round = ordered.iter().map(|m| m.round_number).max().unwrap_or(0);

    for m in &ordered {
        if m.result == MatchResult::NotPlayed {
            debug!(round = m.round_number, board = m.board, "skipping unplayed match");
            continue;
        }
        record_side(&mut histories, m, m.white, m.black, true);
        if let Some(black) = m.black {
            record_side(&mut histories, m, black, Some(m.white), false);
        }
    }

    for history in histories.values_mut() {
        finalize(history, max_round);
    }

    histories
}

fn record_side(
    histories: &mut HashMap<ParticipantId, PlayerHistory>,
    m: &Match,
    subject: ParticipantId,
    opponent: Option<ParticipantId>,
    is_white: bool,
) {
    let Some((outcome, points_scored, color)) = resolve(m, is_white) else {
        return;
    };

    let Some(history) = histories.get_mut(&subject) else {
        debug!(participant = subject, "match references participant outside roster, skipping");
        return;
    };

    if let Some(opponent_id) = opponent {
        history.opponents.insert(opponent_id);
    }

    history.score += points_scored;
    history.adjusted_score += adjusted_contribution(outcome, points_scored);

    history.records.push(PlayerRoundRecord {
        round_number: m.round_number,
        opponent,
        color,
        outcome,
        points_scored,
        virtual_opponent_score: None,
    });
}

/// Resolves the (outcome, points, color) triple for one side of a match.
/// Returns `None` for structurally impossible combinations (e.g. a bye
/// match with a black side) rather than panicking on malformed input.
fn resolve(m: &Match, is_white: bool) -> Option<(Outcome, f64, Option<Color>)> {
    use MatchResult::*;
    Some(match (m.result, is_white) {
        (WhiteWins, true) => (Outcome::Win, m.score_white, Some(Color::White)),
        (WhiteWins, false) => (Outcome::Loss, m.score_black, Some(Color::Black)),
        (BlackWins, true) => (Outcome::Loss, m.score_white, Some(Color::White)),
        (BlackWins, false) => (Outcome::Win, m.score_black, Some(Color::Black)),
        (Draw, true) => (Outcome::Draw, m.score_white, Some(Color::White)),
        (Draw, false) => (Outcome::Draw, m.score_black, Some(Color::Black)),
        (ForfeitWhite, true) => (Outcome::ForfeitLoss, m.score_white, Some(Color::White)),
        (ForfeitWhite, false) => (Outcome::ForfeitWin, m.score_black, Some(Color::Black)),
        (ForfeitBlack, true) => (Outcome::ForfeitWin, m.score_white, Some(Color::White)),
        (ForfeitBlack, false) => (Outcome::ForfeitLoss, m.score_black, Some(Color::Black)),
        (Bye, true) => (Outcome::Bye, m.score_white, None),
        (Bye, false) => return None,
        (NotPlayed, _) => return None,
    })
}

fn adjusted_contribution(outcome: Outcome, points_scored: f64) -> f64 {
    match outcome {
        Outcome::ForfeitWin | Outcome::ForfeitLoss => 0.5,
        Outcome::Bye if points_scored >= 1.0 => 0.5,
        _ => points_scored,
    }
}

/// Second pass: derives the aggregate color fields and, per bye record,
/// the FIDE virtual opponent score `Svon = S_before + (1 - SfPR) + 0.5(n - R)`.
fn finalize(history: &mut PlayerHistory, rounds_played_so_far: u32) {
    history.records.sort_by_key(|r| r.round_number);

    let colored: Vec<usize> = history
        .records
        .iter()
        .enumerate()
        .filter(|(_, r)| r.color.is_some())
        .map(|(i, _)| i)
        .collect();

    history.white_count = colored
        .iter()
        .filter(|&&i| history.records[i].color == Some(Color::White))
        .count() as u32;
    history.black_count = colored
        .iter()
        .filter(|&&i| history.records[i].color == Some(Color::Black))
        .count() as u32;
    history.last_color = colored.last().and_then(|&i| history.records[i].color);
    history.last_two_same_color = match colored.len() {
        n if n >= 2 => {
            let a = history.records[colored[n - 1]].color;
            let b = history.records[colored[n - 2]].color;
            if a == b { a } else { None }
        }
        _ => None,
    };
    history.had_bye = history.records.iter().any(|r| r.outcome == Outcome::Bye);

    let mut score_before = 0.0;
    for record in history.records.iter_mut() {
        if record.outcome == Outcome::Bye {
            let svon = score_before + (1.0 - record.points_scored)
                + 0.5 * (rounds_played_so_far as f64 - record.round_number as f64);
            record.virtual_opponent_score = Some(svon);
        }
        score_before += record.points_scored;
    }
}
