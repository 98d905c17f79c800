//! Shared fixtures for integration tests

use brawl_ladder::amqp::publisher::MockEventPublisher;
use brawl_ladder::config::RatingConfig;
use brawl_ladder::engine::MatchEngine;
use brawl_ladder::metrics::MetricsCollector;
use brawl_ladder::types::{JoinOutcome, MatchId, Mode, Side, VoteChoice};
use std::sync::Arc;

/// A complete in-memory system under test
pub struct TestSystem {
    pub engine: Arc<MatchEngine>,
    pub publisher: Arc<MockEventPublisher>,
}

/// Create an engine wired to in-memory stores and a recording publisher
pub fn create_test_system() -> TestSystem {
    let publisher = Arc::new(MockEventPublisher::new());
    let metrics = Arc::new(MetricsCollector::new().expect("metrics collector"));
    let engine = Arc::new(
        MatchEngine::with_in_memory_stores(
            RatingConfig::default(),
            publisher.clone(),
            metrics,
        )
        .expect("engine construction"),
    );

    TestSystem { engine, publisher }
}

/// Register players without leaving them in a queue
pub async fn register_players(engine: &MatchEngine, ids: &[&str]) {
    for id in ids {
        engine
            .join_queue(Mode::Solo, id, &format!("Player {}", id))
            .await
            .expect("registration join");
        engine
            .leave_queue(Mode::Solo, id)
            .await
            .expect("registration leave");
    }
}

/// Fill a player-mode queue with six distinct players and return the match
pub async fn fill_queue(engine: &MatchEngine, mode: Mode, prefix: &str) -> MatchId {
    for i in 1..=5 {
        let outcome = engine
            .join_queue(mode, &format!("{}{}", prefix, i), &format!("Player {}", i))
            .await
            .expect("queue join");
        assert!(matches!(outcome, JoinOutcome::Queued { .. }));
    }

    match engine
        .join_queue(mode, &format!("{}6", prefix), "Player 6")
        .await
        .expect("final queue join")
    {
        JoinOutcome::MatchFormed { match_id } => match_id,
        other => panic!("expected match formation, got {:?}", other),
    }
}

/// Drive a pending match to settlement with a 4-vote majority for a side
pub async fn settle_by_majority(engine: &MatchEngine, match_id: MatchId, side: Side) {
    let record = engine.match_record(match_id).expect("match record");

    let winners = record.side_players(side).to_vec();
    let losers = record.side_players(side.opposite()).to_vec();

    for voter in &winners {
        engine
            .cast_vote(match_id, voter, VoteChoice::Win(side))
            .await
            .expect("majority vote");
    }
    engine
        .cast_vote(match_id, &losers[0], VoteChoice::Win(side))
        .await
        .expect("deciding vote");
}
