//! Tiebreak & Ranking: derives the FIDE tiebreak family from a completed
//! [`PlayerHistory`] map and produces a fully ordered [`Standings`].

use std::cmp::Ordering;
use std::collections::{BTreeMap, HashMap};

use tracing::{instrument, warn};

use crate::domain::model::{
    Color, Outcome, ParticipantId, PlayerHistory, Standings, StandingRow, TournamentConfig,
};

const EPSILON: f64 = 1e-3;

/// Per-round opponent strength sequence used by every Buchholz-family key:
/// the opponent's final adjusted score for played rounds, or the FIDE
/// virtual opponent score for bye rounds.
fn opponent_adjusted_scores(
    history: &PlayerHistory,
    all: &HashMap<ParticipantId, PlayerHistory>,
) -> Vec<f64> {
    history
        .records
        .iter()
        .filter_map(|record| {
            if record.outcome == Outcome::Bye {
                record.virtual_opponent_score
            } else {
                let opponent_id = record.opponent?;
                match all.get(&opponent_id) {
                    Some(opponent) => Some(opponent.adjusted_score),
                    None => {
                        warn!(opponent = opponent_id, "opponent missing from history map, skipping term");
                        None
                    }
                }
            }
        })
        .collect()
}

/// Sums `terms` after dropping up to `drop_low` of the lowest and
/// `drop_high` of the highest values, never dropping to an empty sum.
fn buchholz_with_drops(terms: &[f64], drop_low: usize, drop_high: usize) -> f64 {
    if terms.is_empty() {
        return 0.0;
    }
    let mut sorted = terms.to_vec();
    sorted.sort_by(|a, b| a.partial_cmp(b).unwrap_or(Ordering::Equal));

    let max_droppable = sorted.len().saturating_sub(1);
    let low = drop_low.min(max_droppable);
    let remaining_after_low = sorted.len() - low;
    let high = drop_high.min(remaining_after_low.saturating_sub(1));

    sorted[low..sorted.len() - high].iter().sum()
}

pub(crate) fn buchholz(history: &PlayerHistory, all: &HashMap<ParticipantId, PlayerHistory>) -> f64 {
    let terms = opponent_adjusted_scores(history, all);
    buchholz_with_drops(&terms, 0, 0)
}

fn buchholz_cut1(history: &PlayerHistory, all: &HashMap<ParticipantId, PlayerHistory>) -> f64 {
    let terms = opponent_adjusted_scores(history, all);
    buchholz_with_drops(&terms, 1, 0)
}

fn buchholz_cut2(history: &PlayerHistory, all: &HashMap<ParticipantId, PlayerHistory>) -> f64 {
    let terms = opponent_adjusted_scores(history, all);
    buchholz_with_drops(&terms, 2, 0)
}

fn median_buchholz(history: &PlayerHistory, all: &HashMap<ParticipantId, PlayerHistory>) -> f64 {
    let terms = opponent_adjusted_scores(history, all);
    buchholz_with_drops(&terms, 1, 1)
}

fn sonneborn_berger(history: &PlayerHistory, all: &HashMap<ParticipantId, PlayerHistory>) -> f64 {
    history
        .records
        .iter()
        .map(|record| {
            let opponent_score = if record.outcome == Outcome::Bye {
                record.virtual_opponent_score.unwrap_or(0.0)
            } else {
                match record.opponent.and_then(|id| all.get(&id)) {
                    Some(opponent) => opponent.adjusted_score,
                    None => return 0.0,
                }
            };
            match record.outcome {
                Outcome::Win | Outcome::ForfeitWin | Outcome::Bye => opponent_score,
                Outcome::Draw => 0.5 * opponent_score,
                Outcome::Loss | Outcome::ForfeitLoss => 0.0,
            }
        })
        .sum()
}

fn number_of_wins(history: &PlayerHistory) -> f64 {
    history
        .records
        .iter()
        .filter(|r| matches!(r.outcome, Outcome::Win | Outcome::ForfeitWin))
        .count() as f64
}

/// Sum of the running (cumulative) score after each round.
fn progressive(history: &PlayerHistory) -> f64 {
    let mut running = 0.0;
    let mut total = 0.0;
    for record in &history.records {
        running += record.points_scored;
        total += running;
    }
    total
}

fn games_as_black(history: &PlayerHistory) -> f64 {
    history.black_count as f64
}

fn wins_with_black(history: &PlayerHistory) -> f64 {
    history
        .records
        .iter()
        .filter(|r| r.outcome == Outcome::Win && r.color == Some(Color::Black))
        .count() as f64
}

/// Scalar, informational projection of direct encounter: points scored
/// against opponents who finished on the same score. Not used for
/// ordering — see [`direct_encounter_outcome`] for the actual comparator.
fn direct_encounter_aggregate(
    history: &PlayerHistory,
    all: &HashMap<ParticipantId, PlayerHistory>,
) -> f64 {
    history
        .records
        .iter()
        .filter(|r| r.outcome != Outcome::Bye)
        .filter_map(|record| {
            let opponent_id = record.opponent?;
            let opponent = all.get(&opponent_id)?;
            if (opponent.score - history.score).abs() < EPSILON {
                Some(record.points_scored)
            } else {
                None
            }
        })
        .sum()
}

/// Pairwise head-to-head comparator between two specific players, from
/// `a`'s perspective: `Less` means `a` outranks `b`, following the same
/// "ascending `Ordering` = descending rank" convention as [`cmp_f64_desc`].
/// Non-transitive by nature — only meaningful as a single pairwise
/// tiebreaker step, never as a total order over 3+ tied players.
fn direct_encounter_outcome(
    a_id: ParticipantId,
    b_id: ParticipantId,
    all: &HashMap<ParticipantId, PlayerHistory>,
) -> Ordering {
    let Some(a) = all.get(&a_id) else { return Ordering::Equal };
    let mut a_points = 0.0;
    let mut b_points = 0.0;
    let mut played = false;
    for record in &a.records {
        if record.opponent == Some(b_id) && record.outcome != Outcome::Bye {
            played = true;
            a_points += record.points_scored;
            b_points += 1.0 - record.points_scored;
        }
    }
    if !played {
        return Ordering::Equal;
    }
    b_points
        .partial_cmp(&a_points)
        .unwrap_or(Ordering::Equal)
}

fn cmp_f64_desc(a: f64, b: f64) -> Ordering {
    if (a - b).abs() < EPSILON {
        Ordering::Equal
    } else {
        b.partial_cmp(&a).unwrap_or(Ordering::Equal)
    }
}

fn tiebreak_value(
    key: &str,
    history: &PlayerHistory,
    all: &HashMap<ParticipantId, PlayerHistory>,
) -> f64 {
    match key {
        "score" => history.score,
        "buchholz" => buchholz(history, all),
        "buchholz_cut1" => buchholz_cut1(history, all),
        "buchholz_cut2" => buchholz_cut2(history, all),
        "median_buchholz" => median_buchholz(history, all),
        "sonneborn_berger" => sonneborn_berger(history, all),
        "number_of_wins" => number_of_wins(history),
        "progressive" => progressive(history),
        "games_as_black" => games_as_black(history),
        "wins_with_black" => wins_with_black(history),
        "direct_encounter" => direct_encounter_aggregate(history, all),
        other => {
            warn!(key = other, "unknown tiebreaker key, contributing zero");
            0.0
        }
    }
}

/// Orders two players by score, then by the configured tiebreaker chain,
/// then (for the `direct_encounter` key specifically) by true pairwise
/// head-to-head, falling back to participant id for a stable total order.
fn compare_players(
    a: &PlayerHistory,
    b: &PlayerHistory,
    tiebreakers: &[String],
    all: &HashMap<ParticipantId, PlayerHistory>,
) -> Ordering {
    let by_score = cmp_f64_desc(a.score, b.score);
    if by_score != Ordering::Equal {
        return by_score;
    }

    for key in tiebreakers {
        let ordering = if key == "direct_encounter" {
            direct_encounter_outcome(a.participant_id, b.participant_id, all)
        } else {
            cmp_f64_desc(
                tiebreak_value(key, a, all),
                tiebreak_value(key, b, all),
            )
        };
        if ordering != Ordering::Equal {
            return ordering;
        }
    }

    a.participant_id.cmp(&b.participant_id)
}

/// Computes the full standings table: every participant in `histories`,
/// sorted by score then the configured tiebreak chain, ranked densely
/// 1-based with no gaps or tied ranks.
#[instrument(skip(config, histories))]
pub fn compute_standings(
    config: &TournamentConfig,
    histories: &HashMap<ParticipantId, PlayerHistory>,
) -> Standings {
    let mut ordered: Vec<&PlayerHistory> = histories.values().collect();
    ordered.sort_by(|a, b| compare_players(a, b, &config.tiebreakers, histories));

    let rows = ordered
        .into_iter()
        .enumerate()
        .map(|(index, history)| {
            let mut tiebreak_values = BTreeMap::new();
            for key in &config.tiebreakers {
                tiebreak_values.insert(key.clone(), tiebreak_value(key, history, histories));
            }
            StandingRow {
                rank: index as u32 + 1,
                participant_id: history.participant_id,
                score: history.score,
                tiebreak_values,
            }
        })
        .collect();

    Standings { rows }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::model::PlayerRoundRecord;

    fn history_with_records(
        id: ParticipantId,
        score: f64,
        adjusted_score: f64,
        records: Vec<PlayerRoundRecord>,
    ) -> PlayerHistory {
        let mut history = PlayerHistory::empty(id);
        history.score = score;
        history.adjusted_score = adjusted_score;
        history.records = records;
        history
    }

    fn win_over(round: u32, opponent: ParticipantId) -> PlayerRoundRecord {
        PlayerRoundRecord {
            round_number: round,
            opponent: Some(opponent),
            color: Some(Color::White),
            outcome: Outcome::Win,
            points_scored: 1.0,
            virtual_opponent_score: None,
        }
    }

    fn loss_to(round: u32, opponent: ParticipantId) -> PlayerRoundRecord {
        PlayerRoundRecord {
            round_number: round,
            opponent: Some(opponent),
            color: Some(Color::Black),
            outcome: Outcome::Loss,
            points_scored: 0.0,
            virtual_opponent_score: None,
        }
    }

    fn draw_with(round: u32, opponent: ParticipantId) -> PlayerRoundRecord {
        PlayerRoundRecord {
            round_number: round,
            opponent: Some(opponent),
            color: Some(Color::White),
            outcome: Outcome::Draw,
            points_scored: 0.5,
            virtual_opponent_score: None,
        }
    }

    /// Reconstructs the S5 scenario: player X scored against four
    /// opponents with adjusted scores 5, 4, 3, 2 (beat the 5 and 3, drew
    /// the 4, lost to the 2) giving buchholz=14, cut1=12, median=8.
    #[test]
    fn buchholz_family_matches_s5_scenario() {
        let mut all = HashMap::new();
        all.insert(10, history_with_records(10, 5.0, 5.0, vec![]));
        all.insert(11, history_with_records(11, 4.0, 4.0, vec![]));
        all.insert(12, history_with_records(12, 3.0, 3.0, vec![]));
        all.insert(13, history_with_records(13, 2.0, 2.0, vec![]));

        let x = history_with_records(
            1,
            2.5,
            2.5,
            vec![win_over(1, 10), draw_with(2, 11), win_over(3, 12), loss_to(4, 13)],
        );
        all.insert(1, x);
        let x = &all[&1];

        assert_eq!(buchholz(x, &all), 14.0);
        assert_eq!(buchholz_cut1(x, &all), 12.0);
        assert_eq!(median_buchholz(x, &all), 8.0);
    }

    #[test]
    fn buchholz_with_drops_never_empties_a_single_term() {
        assert_eq!(buchholz_with_drops(&[3.0], 1, 1), 3.0);
        assert_eq!(buchholz_with_drops(&[], 1, 1), 0.0);
    }

    #[test]
    fn sonneborn_berger_weighs_wins_full_and_draws_half() {
        let mut all = HashMap::new();
        all.insert(10, history_with_records(10, 5.0, 5.0, vec![]));
        all.insert(11, history_with_records(11, 4.0, 4.0, vec![]));
        let x = history_with_records(1, 1.5, 1.5, vec![win_over(1, 10), draw_with(2, 11)]);
        all.insert(1, x);
        let x = &all[&1];
        assert_eq!(sonneborn_berger(x, &all), 5.0 + 0.5 * 4.0);
    }

    #[test]
    fn standings_rank_densely_with_no_ties() {
        let mut histories = HashMap::new();
        histories.insert(1, history_with_records(1, 3.0, 3.0, vec![]));
        histories.insert(2, history_with_records(2, 2.0, 2.0, vec![]));
        histories.insert(3, history_with_records(3, 2.0, 2.0, vec![]));

        let config = TournamentConfig {
            id: 1,
            rounds: 3,
            points_win: 1.0,
            points_draw: 0.5,
            points_loss: 0.0,
            bye_points: 1.0,
            tiebreakers: vec!["buchholz".to_string()],
            forbid_repeat_bye: false,
        };

        let standings = compute_standings(&config, &histories);
        assert_eq!(standings.rows.len(), 3);
        assert_eq!(standings.rows[0].rank, 1);
        assert_eq!(standings.rows[0].participant_id, 1);
        assert_eq!(standings.rows[1].rank, 2);
        assert_eq!(standings.rows[2].rank, 3);
    }

    /// S6: two players tied on score and buchholz, broken by direct
    /// encounter — whoever won their individual game ranks first.
    #[test]
    fn direct_encounter_breaks_ties_between_equal_buchholz_players() {
        let mut histories = HashMap::new();
        histories.insert(
            1,
            history_with_records(1, 2.0, 2.0, vec![win_over(1, 2)]),
        );
        histories.insert(
            2,
            history_with_records(2, 2.0, 2.0, vec![loss_to(1, 1)]),
        );

        let config = TournamentConfig {
            id: 1,
            rounds: 1,
            points_win: 1.0,
            points_draw: 0.5,
            points_loss: 0.0,
            bye_points: 1.0,
            tiebreakers: vec!["buchholz".to_string(), "direct_encounter".to_string()],
            forbid_repeat_bye: false,
        };

        let standings = compute_standings(&config, &histories);
        assert_eq!(standings.rows[0].participant_id, 1);
        assert_eq!(standings.rows[1].participant_id, 2);
    }

    #[rstest::rstest]
    #[case("not_a_real_key")]
    #[case("")]
    #[case("BUCHHOLZ")] // keys are matched verbatim, case-sensitively
    #[case("buchholz cut1")] // the underscored form is the only recognized spelling
    fn unknown_tiebreak_keys_contribute_zero(#[case] key: &str) {
        let history = history_with_records(1, 1.0, 1.0, vec![win_over(1, 2)]);
        let all = HashMap::from([(1, history.clone()), (2, history_with_records(2, 0.0, 0.0, vec![]))]);
        assert_eq!(tiebreak_value(key, &history, &all), 0.0);
    }

    proptest::proptest! {
        /// Standings totality + comparator monotonicity on score (invariants
        /// 8 and 9): every input history appears exactly once, ranks are a
        /// dense 1..N permutation, and a strictly higher score always ranks
        /// strictly ahead regardless of how the tiebreak chain resolves.
        #[test]
        fn standings_totality_and_score_monotonicity(
            scores in proptest::collection::vec(0.0f64..10.0, 1..12),
        ) {
            let mut histories = HashMap::new();
            for (index, &score) in scores.iter().enumerate() {
                let id = index as i64 + 1;
                histories.insert(id, history_with_records(id, score, score, vec![]));
            }
            let config = TournamentConfig {
                id: 1,
                rounds: 1,
                points_win: 1.0,
                points_draw: 0.5,
                points_loss: 0.0,
                bye_points: 1.0,
                tiebreakers: vec!["sonneborn_berger".to_string(), "number_of_wins".to_string()],
                forbid_repeat_bye: false,
            };

            let standings = compute_standings(&config, &histories);
            proptest::prop_assert_eq!(standings.rows.len(), scores.len());

            let mut ranks: Vec<u32> = standings.rows.iter().map(|r| r.rank).collect();
            ranks.sort_unstable();
            let expected: Vec<u32> = (1..=scores.len() as u32).collect();
            proptest::prop_assert_eq!(ranks, expected);

            for a in &standings.rows {
                for b in &standings.rows {
                    if a.score > b.score + EPSILON {
                        proptest::prop_assert!(a.rank < b.rank);
                    }
                }
            }
        }
    }
}
