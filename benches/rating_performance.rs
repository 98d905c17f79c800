//! Performance benchmarks for rating calculations and settlement writes

use brawl_ladder::config::RatingConfig;
use brawl_ladder::history::{InMemoryDodgeLedger, InMemoryMatchHistoryStore};
use brawl_ladder::rating::elo::EloCalculator;
use brawl_ladder::rating::engine::RatingEngine;
use brawl_ladder::rating::storage::InMemoryRatingStore;
use brawl_ladder::types::{Mode, PlayerId};
use criterion::{black_box, criterion_group, criterion_main, Criterion};
use std::sync::Arc;

fn side(prefix: &str) -> Vec<PlayerId> {
    (1..=3).map(|i| format!("{}{}", prefix, i)).collect()
}

fn bench_expected_score(c: &mut Criterion) {
    let calculator = EloCalculator::default();

    c.bench_function("expected_score_even", |b| {
        b.iter(|| calculator.expected_score(black_box(1000), black_box(1000.0)))
    });

    c.bench_function("expected_score_spread", |b| {
        b.iter(|| {
            for rating in (600..1400).step_by(100) {
                black_box(calculator.expected_score(black_box(rating), black_box(1000.0)));
            }
        })
    });
}

fn bench_delta_computation(c: &mut Criterion) {
    let calculator = EloCalculator::default();

    c.bench_function("delta_with_dodge_scaling", |b| {
        b.iter(|| {
            let delta = calculator.delta(black_box(1100), black_box(950.0), true);
            black_box(calculator.scale_for_dodge(delta, 0.8));
            black_box(calculator.dodge_penalty(black_box(3)));
        })
    });
}

fn bench_settlement(c: &mut Criterion) {
    let ratings = Arc::new(InMemoryRatingStore::new());
    let history = Arc::new(InMemoryMatchHistoryStore::new());
    let dodges = Arc::new(InMemoryDodgeLedger::new());
    let engine = RatingEngine::new(RatingConfig::default(), ratings, history, dodges)
        .expect("rating engine");

    let winners = side("w");
    let losers = side("l");

    c.bench_function("settle_clean_match", |b| {
        b.iter(|| {
            engine
                .settle(
                    Mode::Solo,
                    black_box(&winners),
                    black_box(&losers),
                    None,
                )
                .expect("settlement")
        })
    });

    c.bench_function("settle_dodge_match", |b| {
        b.iter(|| {
            engine
                .settle(
                    Mode::Chaos,
                    black_box(&winners),
                    black_box(&losers),
                    Some("l2"),
                )
                .expect("settlement")
        })
    });
}

criterion_group!(
    benches,
    bench_expected_score,
    bench_delta_computation,
    bench_settlement
);
criterion_main!(benches);
