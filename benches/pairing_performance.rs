//! Performance benchmarks for the Dutch Swiss pairing algorithm across
//! tournament sizes and round depths.

use std::collections::HashMap;

use criterion::{BenchmarkId, Criterion, criterion_group, criterion_main};
use rand::SeedableRng;
use rand::rngs::StdRng;

use swiss_engine::{Participant, PlayerHistory, SwissPairingEngine, TournamentConfig};

fn config(rounds: u32) -> TournamentConfig {
    TournamentConfig {
        id: 1,
        rounds,
        points_win: 1.0,
        points_draw: 0.5,
        points_loss: 0.0,
        bye_points: 1.0,
        tiebreakers: vec!["buchholz".to_string()],
        forbid_repeat_bye: true,
    }
}

fn roster(size: usize) -> Vec<Participant> {
    (1..=size as i64)
        .map(|id| Participant { id, name: format!("Player {id}"), rating: Some(1000 + (id as i32 * 7) % 1000), active: true })
        .collect()
}

/// A history map where every player has an empty record, approximating
/// the state right before round 1 is paired a second time (worst case for
/// the bye-candidate ranking pass, since nobody has a Buchholz yet).
fn empty_histories(players: &[Participant]) -> HashMap<i64, PlayerHistory> {
    players.iter().map(|p| (p.id, PlayerHistory::empty(p.id))).collect()
}

fn bench_round_one(c: &mut Criterion) {
    let mut group = c.benchmark_group("pair_round_one");
    for size in [8usize, 32, 128, 512] {
        let players = roster(size);
        let cfg = config(5);
        group.bench_with_input(BenchmarkId::from_parameter(size), &size, |b, _| {
            b.iter(|| {
                let engine = SwissPairingEngine::new();
                let mut rng = StdRng::seed_from_u64(1);
                engine.generate_pairings(&cfg, &players, &HashMap::new(), 1, &mut rng).unwrap()
            });
        });
    }
    group.finish();
}

fn bench_subsequent_round_no_history(c: &mut Criterion) {
    let mut group = c.benchmark_group("pair_subsequent_round_flat_scores");
    for size in [8usize, 32, 128, 512] {
        let players = roster(size);
        let histories = empty_histories(&players);
        let cfg = config(5);
        group.bench_with_input(BenchmarkId::from_parameter(size), &size, |b, _| {
            b.iter(|| {
                let engine = SwissPairingEngine::new();
                let mut rng = StdRng::seed_from_u64(1);
                engine.generate_pairings(&cfg, &players, &histories, 2, &mut rng).unwrap()
            });
        });
    }
    group.finish();
}

criterion_group!(benches, bench_round_one, bench_subsequent_round_no_history);
criterion_main!(benches);
