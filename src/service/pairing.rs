//! Pairing Engine: FIDE Dutch System pairing over an immutable history
//! snapshot. Stateless and purely functional — every call returns a fresh
//! [`PairingResult`] and never touches a repository itself.

use std::collections::{BTreeMap, HashMap, HashSet};

use rand::Rng;
use tracing::{debug, instrument, warn};

use crate::common::error::EngineError;
use crate::domain::model::{
    Color, MatchDraft, MatchResult, Participant, ParticipantId, PairingResult, PlayerHistory,
    TournamentConfig,
};
use crate::service::tiebreak;

#[derive(Debug, Clone)]
struct Candidate {
    id: ParticipantId,
    rating: i32,
    score: f64,
    cp: i32,
    had_bye: bool,
    buchholz: f64,
    opponents: HashSet<ParticipantId>,
}

/// Derives `color_diff`, `last_two_same_color`, and the `{-2,-1,0,+1,+2}`
/// color preference scale from a player's history.
fn color_preference(history: &PlayerHistory) -> i32 {
    let color_diff = history.white_count as i32 - history.black_count as i32;
    if color_diff < -1 || history.last_two_same_color == Some(Color::Black) {
        2
    } else if color_diff > 1 || history.last_two_same_color == Some(Color::White) {
        -2
    } else if color_diff == -1 {
        1
    } else if color_diff == 1 {
        -1
    } else {
        match history.last_color {
            Some(Color::Black) => 1,
            Some(Color::White) => -1,
            None => 0,
        }
    }
}

fn color_penalty(preference: i32, assigned: Color) -> u32 {
    match preference.abs() {
        2 => {
            if (preference > 0 && assigned == Color::Black) || (preference < 0 && assigned == Color::White) {
                1000
            } else {
                0
            }
        }
        1 => {
            if (preference > 0 && assigned == Color::Black) || (preference < 0 && assigned == Color::White) {
                100
            } else {
                0
            }
        }
        _ => 1,
    }
}

fn preferred_color(preference: i32) -> Color {
    if preference < 0 { Color::Black } else { Color::White }
}

/// Resolves which of `a`/`b` plays white, minimizing total color penalty;
/// ties broken by giving the higher-rated player their preferred color
/// (white, if both are neutral).
fn resolve_pair_colors(a: &Candidate, b: &Candidate) -> (Color, Color) {
    let a_white = color_penalty(a.cp, Color::White) + color_penalty(b.cp, Color::Black);
    let a_black = color_penalty(a.cp, Color::Black) + color_penalty(b.cp, Color::White);

    match a_white.cmp(&a_black) {
        std::cmp::Ordering::Less => (Color::White, Color::Black),
        std::cmp::Ordering::Greater => (Color::Black, Color::White),
        std::cmp::Ordering::Equal => {
            if a.rating >= b.rating {
                let wanted = preferred_color(a.cp);
                (wanted, wanted.opposite())
            } else {
                let wanted = preferred_color(b.cp);
                (wanted.opposite(), wanted)
            }
        }
    }
}

fn pair_color_penalty(a: &Candidate, b: &Candidate) -> u32 {
    let (a_color, b_color) = resolve_pair_colors(a, b);
    color_penalty(a.cp, a_color) + color_penalty(b.cp, b_color)
}

fn legal_pair(a: &Candidate, b: &Candidate) -> bool {
    a.id != b.id && !a.opponents.contains(&b.id)
}

fn build_candidates(
    active: &[&Participant],
    histories: &HashMap<ParticipantId, PlayerHistory>,
) -> Vec<Candidate> {
    active
        .iter()
        .filter_map(|p| {
            let Some(history) = histories.get(&p.id) else {
                warn!(participant = p.id, "active participant has no history entry, skipping");
                return None;
            };
            Some(Candidate {
                id: p.id,
                rating: p.rating_or_default(),
                score: history.score,
                cp: color_preference(history),
                had_bye: history.had_bye,
                buchholz: tiebreak::buchholz(history, histories),
                opponents: history.opponents.clone(),
            })
        })
        .collect()
}

/// Sort key that orders scores descending once iterated via `BTreeMap`'s
/// ascending-and-then-reversed iteration; equivalent to `OrderedFloat` but
/// local to this crate and collision-safe at millipoint resolution.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
struct ScoreKey(i64);

impl ScoreKey {
    fn from_score(score: f64) -> Self {
        ScoreKey((score * 1000.0).round() as i64)
    }
}

fn group_by_score(candidates: Vec<Candidate>) -> Vec<Vec<Candidate>> {
    let mut grouped: BTreeMap<ScoreKey, Vec<Candidate>> = BTreeMap::new();
    for c in candidates {
        grouped.entry(ScoreKey::from_score(c.score)).or_default().push(c);
    }
    grouped.into_values().rev().collect()
}

/// Ranks bye candidates ascending by priority (a) has not yet received a
/// bye — only when `forbid_repeat_bye` is set — then (b) lower score then
/// (c) lower Buchholz, and returns the best (first) one.
fn select_bye(pool: &[Candidate], forbid_repeat_bye: bool) -> usize {
    let mut indices: Vec<usize> = (0..pool.len()).collect();
    indices.sort_by(|&i, &j| {
        let a = &pool[i];
        let b = &pool[j];
        if forbid_repeat_bye {
            let by_had_bye = a.had_bye.cmp(&b.had_bye);
            if by_had_bye != std::cmp::Ordering::Equal {
                return by_had_bye;
            }
        }
        a.score
            .partial_cmp(&b.score)
            .unwrap_or(std::cmp::Ordering::Equal)
            .then_with(|| a.buchholz.partial_cmp(&b.buchholz).unwrap_or(std::cmp::Ordering::Equal))
    });
    indices[0]
}

fn make_draft(a: &Candidate, b: &Candidate) -> MatchDraft {
    let (white, _black) = resolve_pair_colors(a, b);
    let (white_id, black_id) = match white {
        Color::White => (a.id, b.id),
        Color::Black => (b.id, a.id),
    };
    MatchDraft {
        board: 0,
        white: white_id,
        black: Some(black_id),
        default_result: MatchResult::NotPlayed,
        score_white: 0.0,
        score_black: 0.0,
        source_tag: "dutch_swiss".to_string(),
    }
}

/// Greedy pairwise pass over a pool of floaters: pairs off anyone with a
/// legal (non-rematch) partner, leaving anyone it can't pair in `leftover`.
fn greedy_pairwise(mut pool: Vec<Candidate>) -> (Vec<MatchDraft>, Vec<Candidate>) {
    let mut drafts = Vec::new();
    let mut leftover = Vec::new();
    while let Some(a) = pool.pop() {
        if let Some(idx) = pool.iter().position(|b| legal_pair(&a, b)) {
            let b = pool.remove(idx);
            drafts.push(make_draft(&a, &b));
        } else {
            leftover.push(a);
        }
    }
    (drafts, leftover)
}

/// Selects the down-floater candidate from the bottom half of `u`: among
/// those with at least one legal partner in `next_group`, the one
/// minimizing `100*|cp + avg_cp_next| + position_from_top`, ties broken by
/// lowest rank in `u` (last index).
fn select_down_floater(u: &[Candidate], next_group: &[Candidate]) -> Option<usize> {
    if next_group.is_empty() {
        return None;
    }
    let avg_cp_next = next_group.iter().map(|c| c.cp as f64).sum::<f64>() / next_group.len() as f64;
    let bottom_half_start = u.len() / 2;

    let mut best: Option<(f64, usize)> = None;
    for idx in bottom_half_start..u.len() {
        let candidate = &u[idx];
        let has_legal_target = next_group.iter().any(|n| legal_pair(candidate, n));
        if !has_legal_target {
            continue;
        }
        let score = 100.0 * (candidate.cp as f64 + avg_cp_next).abs() + idx as f64;
        match best {
            Some((best_score, _)) if score > best_score => {}
            _ => best = Some((score, idx)),
        }
    }
    best.map(|(_, idx)| idx)
}

/// Splits the (even) group into top/bottom halves and greedily pairs each
/// `S1[i]` with the legal `S2` candidate minimizing color penalty, then
/// retries any leftovers against the rest of `S2` and finally against each
/// other (the documented weaker "transposition within S1" fallback).
fn pair_within_group_even(u: Vec<Candidate>) -> (Vec<MatchDraft>, Vec<Candidate>) {
    if u.is_empty() {
        return (Vec::new(), Vec::new());
    }
    let half = u.len() / 2;
    let s1 = u[..half].to_vec();
    let mut s2 = u[half..].to_vec();

    let mut drafts = Vec::new();
    let mut unpaired_s1 = Vec::new();
    for a in s1 {
        let best = s2
            .iter()
            .enumerate()
            .filter(|(_, b)| legal_pair(&a, b))
            .min_by_key(|(_, b)| pair_color_penalty(&a, b))
            .map(|(idx, _)| idx);
        match best {
            Some(idx) => {
                let b = s2.remove(idx);
                drafts.push(make_draft(&a, &b));
            }
            None => unpaired_s1.push(a),
        }
    }

    let mut leftover = Vec::new();
    for a in unpaired_s1 {
        if let Some(idx) = s2.iter().position(|b| legal_pair(&a, b)) {
            let b = s2.remove(idx);
            drafts.push(make_draft(&a, &b));
        } else {
            leftover.push(a);
        }
    }

    // Transposition within the leftover set, plus any s2 candidates a
    // prior S1 member failed to claim.
    leftover.extend(s2);
    let (more_drafts, still_left) = greedy_pairwise(leftover);
    drafts.extend(more_drafts);

    (drafts, still_left)
}

fn pair_within_group(mut u: Vec<Candidate>) -> (Vec<MatchDraft>, Vec<Candidate>) {
    u.sort_by(|a, b| b.rating.cmp(&a.rating).then_with(|| a.id.cmp(&b.id)));
    if u.len() % 2 == 1 {
        let floater = u.pop().expect("non-empty due to odd length check");
        let (drafts, mut leftover) = pair_within_group_even(u);
        leftover.push(floater);
        (drafts, leftover)
    } else {
        pair_within_group_even(u)
    }
}

/// Processes score groups from highest to lowest, carrying down-floaters
/// between adjacent groups. Returns the drafts produced plus whatever
/// could not be paired by the end (the final residual floater set).
fn process_groups(groups: Vec<Vec<Candidate>>) -> (Vec<MatchDraft>, Vec<Candidate>) {
    let mut drafts = Vec::new();
    let mut carry: Vec<Candidate> = Vec::new();
    let n_groups = groups.len();

    for i in 0..n_groups {
        let mut u: Vec<Candidate> = std::mem::take(&mut carry);
        u.extend(groups[i].iter().cloned());
        u.sort_by(|a, b| b.rating.cmp(&a.rating).then_with(|| a.id.cmp(&b.id)));

        let has_next = i + 1 < n_groups;
        if u.len() % 2 == 1 && has_next {
            if let Some(idx) = select_down_floater(&u, &groups[i + 1]) {
                let floater = u.remove(idx);
                carry.push(floater);
            }
        }

        let (group_drafts, leftover) = pair_within_group(u);
        drafts.extend(group_drafts);
        carry.extend(leftover);
    }

    (drafts, carry)
}

/// Round 1 special case: no history exists yet. Odd count gives the bye to
/// the largest participant identifier; the rest split into rating halves
/// and pair top-vs-bottom with randomly assigned board colors.
fn pair_round_one<R: Rng>(active: &[&Participant], config: &TournamentConfig, rng: &mut R) -> PairingResult {
    let mut pool: Vec<&Participant> = active.to_vec();
    pool.sort_by(|a, b| b.rating_or_default().cmp(&a.rating_or_default()).then_with(|| a.id.cmp(&b.id)));

    let mut bye_draft = None;
    if pool.len() % 2 == 1 {
        let bye_idx = pool
            .iter()
            .enumerate()
            .max_by_key(|(_, p)| p.id)
            .map(|(idx, _)| idx)
            .expect("pool is non-empty");
        let bye_participant = pool.remove(bye_idx);
        bye_draft = Some(MatchDraft {
            board: 0,
            white: bye_participant.id,
            black: None,
            default_result: MatchResult::Bye,
            score_white: config.bye_points,
            score_black: 0.0,
            source_tag: "round1_bye".to_string(),
        });
    }

    let half = pool.len() / 2;
    let (upper, lower) = pool.split_at(half);
    let mut drafts: Vec<MatchDraft> = upper
        .iter()
        .zip(lower.iter())
        .map(|(u, l)| {
            let (white, black) = if rng.gen_bool(0.5) { (u.id, l.id) } else { (l.id, u.id) };
            MatchDraft {
                board: 0,
                white,
                black: Some(black),
                default_result: MatchResult::NotPlayed,
                score_white: 0.0,
                score_black: 0.0,
                source_tag: "round1".to_string(),
            }
        })
        .collect();

    number_boards(&mut drafts, bye_draft);
    PairingResult { pairings: drafts }
}

fn number_boards(drafts: &mut Vec<MatchDraft>, bye_draft: Option<MatchDraft>) {
    for (index, draft) in drafts.iter_mut().enumerate() {
        draft.board = index as u32 + 1;
    }
    if let Some(mut bye) = bye_draft {
        bye.board = drafts.len() as u32 + 1;
        drafts.push(bye);
    }
}

#[instrument(skip(active, histories, config))]
fn pair_subsequent_round(
    active: &[&Participant],
    histories: &HashMap<ParticipantId, PlayerHistory>,
    config: &TournamentConfig,
) -> Result<PairingResult, EngineError> {
    let mut candidates = build_candidates(active, histories);

    let mut bye_draft = None;
    if candidates.len() % 2 == 1 {
        let idx = select_bye(&candidates, config.forbid_repeat_bye);
        let bye_candidate = candidates.remove(idx);
        debug!(participant = bye_candidate.id, "assigned bye by priority ranking");
        bye_draft = Some(MatchDraft {
            board: 0,
            white: bye_candidate.id,
            black: None,
            default_result: MatchResult::Bye,
            score_white: config.bye_points,
            score_black: 0.0,
            source_tag: "bye".to_string(),
        });
    }

    let groups = group_by_score(candidates);
    let (mut drafts, residual) = process_groups(groups);

    let (mut residual_drafts, truly_unpaired) = greedy_pairwise(residual);
    drafts.append(&mut residual_drafts);

    if truly_unpaired.len() == 1 && bye_draft.is_none() {
        let c = &truly_unpaired[0];
        bye_draft = Some(MatchDraft {
            board: 0,
            white: c.id,
            black: None,
            default_result: MatchResult::Bye,
            score_white: config.bye_points,
            score_black: 0.0,
            source_tag: "residual_bye".to_string(),
        });
    } else if !truly_unpaired.is_empty() {
        return Err(EngineError::PairingInfeasible {
            residual: truly_unpaired.iter().map(|c| c.id).collect(),
        });
    }

    number_boards(&mut drafts, bye_draft);
    Ok(PairingResult { pairings: drafts })
}

/// Pure, stateless Dutch Swiss pairing engine. Holds no fields — every
/// call is computed fresh from its arguments.
#[derive(Debug, Default, Clone, Copy)]
pub struct SwissPairingEngine;

impl SwissPairingEngine {
    pub fn new() -> Self {
        Self
    }

    /// Produces the ordered pairings (plus an optional trailing bye board)
    /// for `round_number` given the active roster and their histories so
    /// far. `rng` is only consulted for round 1's random color assignment.
    #[instrument(skip(self, active, histories, rng))]
    pub fn generate_pairings<R: Rng>(
        &self,
        config: &TournamentConfig,
        active: &[Participant],
        histories: &HashMap<ParticipantId, PlayerHistory>,
        round_number: u32,
        rng: &mut R,
    ) -> Result<PairingResult, EngineError> {
        if round_number > config.rounds {
            return Err(EngineError::TournamentExhausted { requested: round_number, configured: config.rounds });
        }
        let refs: Vec<&Participant> = active.iter().collect();
        if refs.len() < 2 {
            return Err(EngineError::InsufficientParticipants(refs.len()));
        }

        if round_number == 1 {
            Ok(pair_round_one(&refs, config, rng))
        } else {
            pair_subsequent_round(&refs, histories, config)
        }
    }
}
