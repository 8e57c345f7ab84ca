//! Performance benchmarks for rating calculations and ladder rebuilds

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use ladder_room::config::{LadderOrder, RatingAlgorithm, RatingSettings};
use ladder_room::ladder::LadderCache;
use ladder_room::rating::create_calculator;
use ladder_room::store::InMemoryPlayerStore;
use ladder_room::types::{MatchOutcome, PlayerIdentity, PlayerRating, PlayerRecord, Standing};
use std::sync::Arc;
use std::time::Duration;

fn participants(count: usize) -> Vec<(String, PlayerRating)> {
    (0..count)
        .map(|i| {
            (
                format!("player{}", i),
                PlayerRating {
                    rating: 900.0 + (i as f64 * 37.0) % 300.0,
                    uncertainty: 200.0 + (i as f64 * 13.0) % 100.0,
                },
            )
        })
        .collect()
}

fn outcome_for(players: &[(String, PlayerRating)]) -> MatchOutcome {
    MatchOutcome {
        match_id: None,
        standings: players
            .iter()
            .enumerate()
            .map(|(i, (id, _))| Standing {
                player_id: id.clone(),
                // Pairs of players tie
                rank: (i / 2 + 1) as u32,
            })
            .collect(),
    }
}

fn bench_rating_calculations(c: &mut Criterion) {
    let mut group = c.benchmark_group("rating_calculation");

    for algorithm in [RatingAlgorithm::TrueSkill, RatingAlgorithm::Elo] {
        let calculator = create_calculator(&RatingSettings {
            algorithm,
            ..RatingSettings::default()
        })
        .unwrap();

        for count in [2usize, 10] {
            let players = participants(count);
            let outcome = outcome_for(&players);

            group.bench_with_input(
                BenchmarkId::new(calculator.name(), count),
                &count,
                |b, _| b.iter(|| black_box(calculator.calculate_rating_changes(&players, &outcome))),
            );
        }
    }

    group.finish();
}

fn bench_ladder_rebuild(c: &mut Criterion) {
    let rt = tokio::runtime::Runtime::new().unwrap();

    let records: Vec<PlayerRecord> = participants(1000)
        .into_iter()
        .map(|(id, rating)| PlayerRecord::new(&PlayerIdentity::new(id.clone(), id), None, rating))
        .collect();
    let store = Arc::new(InMemoryPlayerStore::with_records(records));
    let ladder = LadderCache::new(store, LadderOrder::Descending, Duration::from_secs(5));

    c.bench_function("ladder_rebuild_1000_players", |b| {
        b.iter(|| {
            rt.block_on(async {
                ladder.invalidate();
                black_box(ladder.get().await.unwrap().len())
            })
        })
    });

    c.bench_function("ladder_cached_read", |b| {
        b.iter(|| rt.block_on(async { black_box(ladder.get().await.unwrap().len()) }))
    });
}

criterion_group!(benches, bench_rating_calculations, bench_ladder_rebuild);
criterion_main!(benches);
