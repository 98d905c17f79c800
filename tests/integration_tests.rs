//! Integration tests for the brawl-ladder matchmaking service
//!
//! These tests validate the system working end to end: queue admission
//! through match formation, vote-based settlement with dodge handling,
//! rating movement across independent mode pools, and undo reversal.

mod fixtures;

use brawl_ladder::error::LadderError;
use brawl_ladder::types::{
    DodgeReportOutcome, JoinOutcome, LadderEvent, MatchStatus, Mode, Side, VoteChoice,
    VoteOutcome, DEFAULT_RATING,
};
use fixtures::{create_test_system, fill_queue, register_players, settle_by_majority};
use futures::future::join_all;
use std::collections::HashSet;

#[tokio::test]
async fn test_complete_solo_lifecycle() {
    let system = create_test_system();

    // Queue fills, match forms
    let match_id = fill_queue(&system.engine, Mode::Solo, "p").await;
    assert_eq!(system.publisher.count_events_of_type("PlayerQueued"), 5);
    assert_eq!(system.publisher.count_events_of_type("MatchFormed"), 1);
    assert_eq!(
        system.engine.match_status(match_id).await.unwrap(),
        MatchStatus::Pending
    );

    // Majority settles it
    settle_by_majority(&system.engine, match_id, Side::TeamA).await;
    assert_eq!(
        system.engine.match_status(match_id).await.unwrap(),
        MatchStatus::Settled
    );
    assert_eq!(system.publisher.count_events_of_type("MatchSettled"), 1);

    // Everyone started at 1000: winners 1015, losers 985
    let settled = system
        .publisher
        .events()
        .into_iter()
        .find_map(|event| match event {
            LadderEvent::MatchSettled(settled) => Some(settled),
            _ => None,
        })
        .expect("settled event");
    assert!(settled.winners.iter().all(|d| d.new_rating == 1015));
    assert!(settled.losers.iter().all(|d| d.new_rating == 985));

    let standings = system.engine.standings(Mode::Solo, 10).unwrap();
    assert_eq!(standings.len(), 6);
    assert_eq!(standings[0].rating, 1015);

    // Undo restores the pre-match world
    let report = system.engine.undo_last(Mode::Solo).await.unwrap();
    assert!(!report.had_dodge);
    for row in system.engine.standings(Mode::Solo, 10).unwrap() {
        assert_eq!(row.rating, DEFAULT_RATING);
        assert_eq!(row.wins, 0);
        assert_eq!(row.losses, 0);
    }
    assert_eq!(system.publisher.count_events_of_type("MatchUndone"), 1);

    // A second undo finds nothing
    let err = system.engine.undo_last(Mode::Solo).await.unwrap_err();
    assert!(matches!(
        err.downcast_ref::<LadderError>(),
        Some(LadderError::NotFound { .. })
    ));
}

#[tokio::test]
async fn test_dodge_lifecycle() {
    let system = create_test_system();
    let match_id = fill_queue(&system.engine, Mode::Chaos, "c").await;
    let record = system.engine.match_record(match_id).unwrap();
    let accused = record.side_a[2].clone();

    // Two accusations do not settle
    for accuser in record.side_b.iter().take(2) {
        let outcome = system
            .engine
            .report_dodge(match_id, accuser, &accused)
            .await
            .unwrap();
        assert!(matches!(outcome, DodgeReportOutcome::Recorded { .. }));
    }
    assert_eq!(
        system.engine.match_status(match_id).await.unwrap(),
        MatchStatus::Pending
    );

    // The third accuser confirms; the accused side loses
    let outcome = system
        .engine
        .report_dodge(match_id, &record.side_b[2], &accused)
        .await
        .unwrap();
    assert!(matches!(outcome, DodgeReportOutcome::Confirmed { .. }));
    assert_eq!(
        system.engine.match_status(match_id).await.unwrap(),
        MatchStatus::Settled
    );

    let dodger = system
        .engine
        .player_summary(&accused, Mode::Chaos)
        .unwrap();
    assert_eq!(dodger.dodge_count, 1);
    assert_eq!(dodger.losses, 1);
    // First offense: -15 loss delta and -15 penalty
    assert_eq!(dodger.rating, 970);

    let teammate = system
        .engine
        .player_summary(&record.side_a[0], Mode::Chaos)
        .unwrap();
    assert!(dodger.rating < teammate.rating);

    // Undo clears the dodge ledger entry as well
    let report = system.engine.undo_last(Mode::Chaos).await.unwrap();
    assert!(report.had_dodge);
    let restored = system
        .engine
        .player_summary(&accused, Mode::Chaos)
        .unwrap();
    assert_eq!(restored.rating, DEFAULT_RATING);
    assert_eq!(restored.dodge_count, 0);
}

#[tokio::test]
async fn test_fixed_team_lifecycle() {
    let system = create_test_system();

    register_players(
        &system.engine,
        &["t1", "t2", "t3", "t4", "t5", "t6"],
    )
    .await;

    let alpha = system.engine.create_team("Alpha", "t1", "t2", "t3").unwrap();
    let beta = system.engine.create_team("Beta", "t4", "t5", "t6").unwrap();

    // Any member queues the whole team
    let outcome = system
        .engine
        .join_queue(Mode::FixedTeam, "t2", "Player t2")
        .await
        .unwrap();
    assert!(matches!(outcome, JoinOutcome::Queued { waiting: 1, .. }));

    let match_id = match system
        .engine
        .join_queue(Mode::FixedTeam, "t4", "Player t4")
        .await
        .unwrap()
    {
        JoinOutcome::MatchFormed { match_id } => match_id,
        other => panic!("expected match formation, got {:?}", other),
    };

    let record = system.engine.match_record(match_id).unwrap();
    assert_eq!(record.side_a, alpha.members);
    assert_eq!(record.side_b, beta.members);

    settle_by_majority(&system.engine, match_id, Side::TeamB).await;

    let winner = system.engine.player_summary("t4", Mode::FixedTeam).unwrap();
    assert_eq!(winner.rating, 1015);
    assert_eq!(winner.wins, 1);

    // Dissolving Beta keeps historical ratings intact
    system.engine.dissolve_team(beta.id, "t4").await.unwrap();
    assert!(system.engine.team_of_player("t4").unwrap().is_none());
    let still_winner = system.engine.player_summary("t4", Mode::FixedTeam).unwrap();
    assert_eq!(still_winner.rating, 1015);
}

#[tokio::test]
async fn test_tie_stays_pending_until_a_vote_changes() {
    let system = create_test_system();
    let match_id = fill_queue(&system.engine, Mode::Solo, "p").await;
    let record = system.engine.match_record(match_id).unwrap();

    for voter in &record.side_a {
        system
            .engine
            .cast_vote(match_id, voter, VoteChoice::Win(Side::TeamA))
            .await
            .unwrap();
    }
    for voter in &record.side_b {
        let outcome = system
            .engine
            .cast_vote(match_id, voter, VoteChoice::Win(Side::TeamB))
            .await
            .unwrap();
        assert!(matches!(
            outcome,
            VoteOutcome::Recorded { .. }
        ));
    }

    // 3-3 with all six votes cast: no settlement, no side effects
    assert_eq!(
        system.engine.match_status(match_id).await.unwrap(),
        MatchStatus::Pending
    );
    assert_eq!(system.publisher.count_events_of_type("MatchSettled"), 0);
    for row in system.engine.standings(Mode::Solo, 10).unwrap() {
        assert_eq!(row.rating, DEFAULT_RATING);
    }

    // One participant switching sides breaks the stalemate
    let outcome = system
        .engine
        .cast_vote(match_id, &record.side_a[0], VoteChoice::Win(Side::TeamB))
        .await
        .unwrap();
    assert!(matches!(
        outcome,
        VoteOutcome::Settled {
            winning_side: Side::TeamB,
        }
    ));
}

#[tokio::test]
async fn test_cancel_vote_lifecycle() {
    let system = create_test_system();
    let match_id = fill_queue(&system.engine, Mode::Solo, "p").await;
    let record = system.engine.match_record(match_id).unwrap();

    let cancel_voters = [
        &record.side_a[0],
        &record.side_a[1],
        &record.side_b[0],
        &record.side_b[1],
    ];
    let mut last = None;
    for voter in cancel_voters {
        last = Some(
            system
                .engine
                .cast_vote(match_id, voter, VoteChoice::Cancel)
                .await
                .unwrap(),
        );
    }

    assert!(matches!(last, Some(VoteOutcome::Cancelled)));
    assert_eq!(
        system.engine.match_status(match_id).await.unwrap(),
        MatchStatus::Cancelled
    );
    assert_eq!(system.publisher.count_events_of_type("MatchCancelled"), 1);

    // No ratings moved and nothing is undoable
    for row in system.engine.standings(Mode::Solo, 10).unwrap() {
        assert_eq!(row.rating, DEFAULT_RATING);
    }
    assert!(system.engine.undo_last(Mode::Solo).await.is_err());
}

#[tokio::test]
async fn test_concurrent_joins_form_disjoint_matches() {
    let system = create_test_system();

    let joins = (1..=12).map(|i| {
        let engine = system.engine.clone();
        tokio::spawn(async move {
            engine
                .join_queue(Mode::Solo, &format!("p{}", i), &format!("Player {}", i))
                .await
        })
    });

    let results = join_all(joins).await;
    let mut match_ids = Vec::new();
    for result in results {
        if let JoinOutcome::MatchFormed { match_id } = result.unwrap().unwrap() {
            match_ids.push(match_id);
        }
    }

    // Twelve joins form exactly two matches with disjoint participants
    assert_eq!(match_ids.len(), 2);
    assert_eq!(system.engine.queue_depth(Mode::Solo).await, 0);

    let mut seen = HashSet::new();
    for match_id in match_ids {
        let record = system.engine.match_record(match_id).unwrap();
        for player in record.participants() {
            assert!(seen.insert(player.clone()), "player {} drafted twice", player);
        }
    }
    assert_eq!(seen.len(), 12);
}

#[tokio::test]
async fn test_mode_pools_are_independent() {
    let system = create_test_system();

    // The same six players play one solo match and one chaos match
    let solo_match = fill_queue(&system.engine, Mode::Solo, "p").await;
    settle_by_majority(&system.engine, solo_match, Side::TeamA).await;

    let chaos_match = fill_queue(&system.engine, Mode::Chaos, "p").await;
    settle_by_majority(&system.engine, chaos_match, Side::TeamB).await;

    // Undoing chaos leaves solo results untouched
    system.engine.undo_last(Mode::Chaos).await.unwrap();

    let solo_ratings: Vec<i32> = system
        .engine
        .standings(Mode::Solo, 10)
        .unwrap()
        .iter()
        .map(|row| row.rating)
        .collect();
    assert!(solo_ratings.contains(&1015));
    assert!(solo_ratings.contains(&985));

    for row in system.engine.standings(Mode::Chaos, 10).unwrap() {
        assert_eq!(row.rating, DEFAULT_RATING);
    }
}

#[tokio::test]
async fn test_rejections_carry_distinguishable_reasons() {
    let system = create_test_system();
    let match_id = fill_queue(&system.engine, Mode::Solo, "p").await;

    // Outsider vote
    let err = system
        .engine
        .cast_vote(match_id, "stranger", VoteChoice::Win(Side::TeamA))
        .await
        .unwrap_err();
    assert!(matches!(
        err.downcast_ref::<LadderError>(),
        Some(LadderError::InvalidParticipant { .. })
    ));

    // Self-accusation
    let err = system
        .engine
        .report_dodge(match_id, "p1", "p1")
        .await
        .unwrap_err();
    assert!(matches!(
        err.downcast_ref::<LadderError>(),
        Some(LadderError::ValidationError { .. })
    ));

    // Vote after settlement
    settle_by_majority(&system.engine, match_id, Side::TeamA).await;
    let err = system
        .engine
        .cast_vote(match_id, "p1", VoteChoice::Win(Side::TeamA))
        .await
        .unwrap_err();
    assert!(matches!(
        err.downcast_ref::<LadderError>(),
        Some(LadderError::AlreadyInProgress { .. })
    ));
}
