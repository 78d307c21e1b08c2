//! 人机对局全流程：人类走第一个合法落子，AI 用浅层搜索应对，直到终局

use std::sync::Arc;
use std::time::Duration;

use protocol::{GameOutcome, MatchEvent, MatchRecord, Side};
use reversi_ai::{Budget, SearchConfig};
use reversi_server::{ChannelSink, MatchConfig, MatchError, MatchManager, NullSink, PlayerKind};

fn config() -> MatchConfig {
    MatchConfig {
        black: PlayerKind::Human,
        white: PlayerKind::Ai,
        search: SearchConfig {
            max_depth: 2,
            threads: 1,
            ..Default::default()
        },
        ..Default::default()
    }
}

#[tokio::test]
async fn human_vs_ai_game_runs_to_completion() {
    let (sink, mut rx) = ChannelSink::channel(512);
    let manager = MatchManager::new(Arc::new(sink), config());
    let id = manager.create_default_match().await.unwrap();

    loop {
        let state = manager.get_state(id).await.unwrap();
        if state.outcome.is_some() {
            break;
        }
        match state.side_to_move {
            Side::Black => {
                let first = state.legal_moves[0];
                manager.submit_move(id, first).await.unwrap();
            }
            Side::White => {
                manager.request_ai_move(id, Some(Budget::depth(1))).await.unwrap();
            }
        }
    }

    let state = manager.get_state(id).await.unwrap();
    let outcome = state.outcome.unwrap();
    assert!(state.board.is_terminal());
    assert_eq!(outcome, GameOutcome::from_counts(state.black_count, state.white_count));
    assert!(state.legal_moves.is_empty());

    let mut events = Vec::new();
    while let Ok(event) = rx.try_recv() {
        events.push(event);
    }
    assert_eq!(events.len(), state.move_count + 1);
    match events.last() {
        Some(MatchEvent::Finished { match_id, outcome: finished, black, white, .. }) => {
            assert_eq!(*match_id, id);
            assert_eq!(*finished, outcome);
            assert_eq!((*black, *white), (state.black_count, state.white_count));
        }
        other => panic!("expected a finished event, got {:?}", other),
    }

    // 棋谱经 JSON 往返后仍能重放出终局
    let record = manager.close_match(id).await.unwrap();
    let restored = MatchRecord::from_json(&record.to_json().unwrap()).unwrap();
    assert_eq!(restored.replay().unwrap(), state.board);
    assert_eq!(restored.outcome, Some(outcome));

    assert!(matches!(
        manager.get_state(id).await,
        Err(MatchError::NotFound(_))
    ));
}

#[tokio::test]
async fn pass_is_recorded_and_black_keeps_the_move() {
    let (sink, mut rx) = ChannelSink::channel(16);
    let manager = MatchManager::new(Arc::new(sink), config());
    let id = manager
        .create_match(MatchConfig {
            white: PlayerKind::Human,
            initial_layout: Some("BW1BW3/8/8/8/8/8/8/8 b".to_string()),
            ..config()
        })
        .await
        .unwrap();

    let state = manager
        .submit_move(id, protocol::Position::new(0, 2).unwrap())
        .await
        .unwrap();
    assert_eq!(state.side_to_move, Side::Black);
    assert!(state.outcome.is_none());

    let state = manager
        .submit_move(id, protocol::Position::new(0, 5).unwrap())
        .await
        .unwrap();
    assert_eq!(state.outcome, Some(GameOutcome::Win(Side::Black)));
    assert_eq!((state.black_count, state.white_count), (6, 0));

    let mut kinds = Vec::new();
    while let Ok(event) = rx.try_recv() {
        kinds.push(match event {
            MatchEvent::MoveApplied { mv, .. } => format!("{}:{:?}", mv.side, mv.at),
            MatchEvent::Finished { .. } => "finished".to_string(),
        });
    }
    assert_eq!(kinds.len(), 4);
    assert_eq!(kinds[3], "finished");
}

#[tokio::test]
async fn timed_out_request_does_not_lock_the_match() {
    let manager = MatchManager::new(Arc::new(NullSink), config());
    let id = manager
        .create_match(MatchConfig {
            search: SearchConfig {
                max_depth: 14,
                time_limit_ms: 60_000,
                threads: 1,
                ..Default::default()
            },
            ..config()
        })
        .await
        .unwrap();
    manager
        .submit_move(id, protocol::Position::new(2, 3).unwrap())
        .await
        .unwrap();

    // 调用方放弃等待，请求 future 被丢弃
    let waited = tokio::time::timeout(Duration::from_millis(50), manager.request_ai_move(id, None)).await;
    assert!(waited.is_err());

    let state = manager.get_state(id).await.unwrap();
    assert!(!state.thinking);
    assert_eq!(state.version, 1);

    let ai = manager.request_ai_move(id, Some(Budget::depth(1))).await.unwrap();
    assert_eq!(ai.state.version, 2);
    assert_eq!(ai.state.side_to_move, Side::Black);
}
