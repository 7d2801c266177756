//! End-to-end session scenarios against in-memory fakes.

mod common;

use std::time::Duration;

use common::{
    E0, E1, E2, EF, FakeApi, FakeConnector, accepted, controller, drain, pump, rejected,
    session_id, state, test_config,
};
use strictly_chess::{
    ClientErrorKind, ClientEvent, EventKind, MoveResponse, MoveStatus, Notification, PieceKind,
    RemoteTransport, ServerEvent, SessionMode, SessionStatus, Side, UNKNOWN_MOVE, Winner,
};
use strum::IntoEnumIterator;

#[tokio::test]
async fn test_create_remote_session_starts_at_ply_zero() {
    let api = FakeApi::new();
    api.set_state(state("G1", E0, &[]));
    let connector = FakeConnector::new();
    let mut controller = controller(&api, Some(&connector), test_config(RemoteTransport::Push));

    controller.choose_remote().await.expect("choose remote");
    assert_eq!(controller.session().mode(), SessionMode::HostPending);
    assert_eq!(controller.session().status(), SessionStatus::Pending);

    controller.create_session().await.expect("create");
    pump(&mut controller).await;
    assert_eq!(connector.record().sent, vec![ClientEvent::CreateGame]);

    connector.push(ServerEvent::GameCreated {
        session_id: session_id("G1"),
        fen: E0.to_string(),
    });
    pump(&mut controller).await;

    let session = controller.session();
    assert_eq!(session.mode(), SessionMode::JoinedRemote);
    assert_eq!(session.status(), SessionStatus::Active);
    assert_eq!(session.session_id().map(|id| id.as_str()), Some("G1"));

    let board = controller.board();
    assert_eq!(board.ply_count(), 0);
    assert_eq!(board.turn(), Some(Side::White));
    assert_eq!(board.position(), E0);
    assert!(controller.is_reconciling());
}

#[tokio::test]
async fn test_listener_subscribes_to_every_event_kind() {
    let api = FakeApi::new();
    let connector = FakeConnector::new();
    let mut controller = controller(&api, Some(&connector), test_config(RemoteTransport::Push));

    controller.choose_remote().await.expect("choose remote");

    let record = connector.record();
    assert_eq!(record.connects, 1);
    for kind in EventKind::iter() {
        assert!(record.subscribed.contains(&kind), "missing {}", kind.name());
    }
    assert!(controller.has_push_channel());
}

#[tokio::test]
async fn test_submit_accepted_move_advances_ply() {
    let api = FakeApi::new();
    api.queue_move(accepted(E1, Side::Black, 1));
    let mut controller = controller(&api, None, test_config(RemoteTransport::Direct));

    controller.choose_solo().await.expect("solo");
    assert_eq!(controller.session().mode(), SessionMode::Solo);
    assert_eq!(controller.board().position(), E0);

    controller
        .submit("a2-a4".parse().expect("move"))
        .expect("submit");
    pump(&mut controller).await;

    let board = controller.board();
    assert_eq!(board.ply_count(), 1);
    assert_eq!(board.move_log(), ["a2a4".to_string()]);
    assert_eq!(board.turn(), Some(Side::Black));
    assert_eq!(board.position(), E1);

    let requests = api.move_requests();
    assert_eq!(requests.len(), 1);
    assert_eq!(requests[0].fen, E0);
    assert_eq!(requests[0].from.to_string(), "a2");
    assert_eq!(requests[0].to.to_string(), "a4");
    assert_eq!(requests[0].promotion, None);
}

#[tokio::test]
async fn test_server_reply_move_is_logged() {
    let api = FakeApi::new();
    api.queue_move(MoveResponse {
        reply_move: Some("a7a5".to_string()),
        ..accepted(E2, Side::White, 2)
    });
    let mut controller = controller(&api, None, test_config(RemoteTransport::Direct));

    controller.choose_solo().await.expect("solo");
    controller.submit("a2a4".parse().expect("move")).expect("submit");
    pump(&mut controller).await;

    let board = controller.board();
    assert_eq!(board.ply_count(), 2);
    assert_eq!(board.move_log(), ["a2a4".to_string(), "a7a5".to_string()]);
    assert_eq!(board.numbered_moves(), vec!["1. a2a4 a7a5".to_string()]);
}

#[tokio::test]
async fn test_rejected_move_leaves_board_unchanged() {
    let api = FakeApi::new();
    api.queue_move(rejected("Illegal move."));
    let mut controller = controller(&api, None, test_config(RemoteTransport::Direct));

    controller.choose_solo().await.expect("solo");
    let mut notifications = controller.subscribe_notifications();
    let before = controller.board().clone();

    controller.submit("a2a5".parse().expect("move")).expect("submit");
    pump(&mut controller).await;

    assert_eq!(controller.board(), &before);
    let seen = drain(&mut notifications);
    assert!(seen.contains(&Notification::MoveRejected {
        square: "a5".parse().expect("square"),
        reason: "Illegal move.".to_string(),
    }));
}

#[tokio::test]
async fn test_rejection_without_message_uses_default_reason() {
    let api = FakeApi::new();
    api.queue_move(MoveResponse {
        status: Some(MoveStatus::Error),
        ..MoveResponse::default()
    });
    let mut controller = controller(&api, None, test_config(RemoteTransport::Direct));

    controller.choose_solo().await.expect("solo");
    let mut notifications = controller.subscribe_notifications();
    controller.submit("b1b3".parse().expect("move")).expect("submit");
    pump(&mut controller).await;

    let seen = drain(&mut notifications);
    assert!(seen.iter().any(|n| matches!(
        n,
        Notification::MoveRejected { reason, .. } if reason == "Invalid move."
    )));
}

#[tokio::test]
async fn test_duplicate_poll_is_idempotent() {
    let api = FakeApi::new();
    api.set_multiplayer("G1", E0);
    api.set_state(state("G1", E1, &["a2a4"]));
    let connector = FakeConnector::new();
    let mut controller = controller(&api, Some(&connector), test_config(RemoteTransport::Direct));

    controller.choose_remote().await.expect("choose remote");
    controller.create_session().await.expect("create");
    pump(&mut controller).await;
    assert_eq!(controller.board().ply_count(), 1);
    assert_eq!(controller.board().move_log(), ["a2a4".to_string()]);

    let mut board_rx = controller.subscribe_board();
    board_rx.borrow_and_update();
    let calls = api.state_calls();

    connector.push(ServerEvent::SyncGame {
        session_id: session_id("G1"),
    });
    pump(&mut controller).await;

    assert_eq!(api.state_calls(), calls + 1);
    assert_eq!(controller.board().ply_count(), 1);
    assert_eq!(controller.board().move_log(), ["a2a4".to_string()]);
    assert!(!board_rx.has_changed().expect("store alive"));
}

#[tokio::test]
async fn test_game_over_then_reset_returns_to_unselected() {
    let api = FakeApi::new();
    api.set_state(state("G1", E0, &[]));
    let connector = FakeConnector::new();
    let mut controller = controller(&api, Some(&connector), test_config(RemoteTransport::Push));

    controller.choose_remote().await.expect("choose remote");
    controller.create_session().await.expect("create");
    connector.push(ServerEvent::GameCreated {
        session_id: session_id("G1"),
        fen: E0.to_string(),
    });
    pump(&mut controller).await;

    connector.push(ServerEvent::GameOver {
        session_id: Some(session_id("G1")),
        winner: Some(Winner::Side(Side::White)),
        fen: EF.to_string(),
    });
    pump(&mut controller).await;

    assert_eq!(controller.session().status(), SessionStatus::Terminal);
    assert_eq!(controller.session().winner(), Some(Winner::Side(Side::White)));
    assert_eq!(controller.board().position(), EF);
    assert_eq!(controller.board().turn(), None);
    assert!(controller.board().is_finished());
    assert!(!controller.is_reconciling());
    assert!(!controller.has_push_channel());

    let record = connector.record();
    assert_eq!(record.closed, 1);
    for kind in EventKind::iter() {
        assert!(record.unsubscribed.contains(&kind), "still subscribed to {}", kind.name());
    }

    controller.reset().await;
    assert_eq!(controller.session().mode(), SessionMode::Unselected);
    assert_eq!(controller.session().session_id(), None);
    assert!(controller.board().move_log().is_empty());
    assert_eq!(controller.board().score(Side::White), 0);
    assert_eq!(controller.board().score(Side::Black), 0);
}

#[tokio::test]
async fn test_join_unknown_session_stays_host_pending() {
    let api = FakeApi::new();
    let connector = FakeConnector::new();
    let mut controller = controller(&api, Some(&connector), test_config(RemoteTransport::Push));
    let mut notifications = controller.subscribe_notifications();

    controller.choose_remote().await.expect("choose remote");
    controller.join_session("G404").await.expect("join sent");
    pump(&mut controller).await;
    assert_eq!(
        connector.record().sent,
        vec![ClientEvent::JoinGame {
            session_id: session_id("G404")
        }]
    );

    connector.push(ServerEvent::Error {
        message: "Game not found".to_string(),
    });
    pump(&mut controller).await;

    assert_eq!(controller.session().mode(), SessionMode::HostPending);
    assert_eq!(controller.session().session_id(), None);
    assert!(drain(&mut notifications).contains(&Notification::SessionNotFound("G404".into())));
}

#[tokio::test]
async fn test_join_unknown_session_over_direct_transport() {
    let api = FakeApi::new();
    let mut controller = controller(&api, None, test_config(RemoteTransport::Direct));

    controller.choose_remote().await.expect("choose remote");
    let err = controller.join_session("G404").await.expect_err("unknown");

    assert_eq!(err.kind, ClientErrorKind::SessionNotFound("G404".into()));
    assert_eq!(controller.session().mode(), SessionMode::HostPending);
    assert_eq!(controller.session().session_id(), None);
    assert!(!controller.is_reconciling());
}

#[tokio::test]
async fn test_join_existing_session_loads_its_log() {
    let api = FakeApi::new();
    api.add_joinable("G7", E2, &["a2a4", "a7a5"]);
    api.set_state(state("G7", E2, &["a2a4", "a7a5"]));
    let mut controller = controller(&api, None, test_config(RemoteTransport::Direct));

    controller.choose_remote().await.expect("choose remote");
    controller.join_session(" G7 ").await.expect("join");
    pump(&mut controller).await;

    assert_eq!(controller.session().session_id().map(|id| id.as_str()), Some("G7"));
    assert_eq!(controller.board().ply_count(), 2);
    assert_eq!(controller.board().move_log().len(), 2);
    assert_eq!(controller.board().turn(), Some(Side::White));
}

#[tokio::test]
async fn test_blank_join_id_is_rejected_locally() {
    let api = FakeApi::new();
    let connector = FakeConnector::new();
    let mut controller = controller(&api, Some(&connector), test_config(RemoteTransport::Push));

    controller.choose_remote().await.expect("choose remote");
    let err = controller.join_session("   ").await.expect_err("blank id");

    assert!(matches!(err.kind, ClientErrorKind::Validation(_)));
    pump(&mut controller).await;
    assert!(connector.record().sent.is_empty());
}

#[tokio::test]
async fn test_push_move_without_notation_uses_submitted_move() {
    let api = FakeApi::new();
    api.set_state(state("G1", E0, &[]));
    let connector = FakeConnector::new();
    let mut controller = controller(&api, Some(&connector), test_config(RemoteTransport::Push));

    controller.choose_remote().await.expect("choose remote");
    controller.create_session().await.expect("create");
    connector.push(ServerEvent::GameCreated {
        session_id: session_id("G1"),
        fen: E0.to_string(),
    });
    pump(&mut controller).await;

    controller.submit("a2a4".parse().expect("move")).expect("submit");
    pump(&mut controller).await;
    assert!(connector.record().sent.contains(&ClientEvent::MakeMove {
        session_id: session_id("G1"),
        squares: "a2a4".into(),
        promotion: None,
    }));
    assert!(api.move_requests().is_empty());

    connector.push(ServerEvent::MoveMade {
        session_id: Some(session_id("G1")),
        fen: E1.to_string(),
        turn: Some(Side::Black),
        ply_count: 1,
        last_move: None,
    });
    pump(&mut controller).await;

    assert_eq!(controller.board().ply_count(), 1);
    assert_eq!(controller.board().move_log(), ["a2a4".to_string()]);
    assert_eq!(controller.board().turn(), Some(Side::Black));
}

#[tokio::test]
async fn test_push_gap_triggers_full_pull() {
    let api = FakeApi::new();
    api.set_state(state("G1", E0, &[]));
    let connector = FakeConnector::new();
    let mut controller = controller(&api, Some(&connector), test_config(RemoteTransport::Push));

    controller.choose_remote().await.expect("choose remote");
    controller.create_session().await.expect("create");
    connector.push(ServerEvent::GameCreated {
        session_id: session_id("G1"),
        fen: E0.to_string(),
    });
    pump(&mut controller).await;

    api.set_state(state("G1", E2, &["a2a4", "a7a5"]));
    connector.push(ServerEvent::MoveMade {
        session_id: Some(session_id("G1")),
        fen: E2.to_string(),
        turn: Some(Side::White),
        ply_count: 2,
        last_move: None,
    });
    pump(&mut controller).await;

    assert_eq!(controller.board().ply_count(), 2);
    assert_eq!(
        controller.board().move_log(),
        ["a2a4".to_string(), "a7a5".to_string()]
    );
}

#[tokio::test]
async fn test_events_for_other_sessions_are_ignored() {
    let api = FakeApi::new();
    api.set_state(state("G1", E0, &[]));
    let connector = FakeConnector::new();
    let mut controller = controller(&api, Some(&connector), test_config(RemoteTransport::Push));

    controller.choose_remote().await.expect("choose remote");
    controller.create_session().await.expect("create");
    connector.push(ServerEvent::GameCreated {
        session_id: session_id("G1"),
        fen: E0.to_string(),
    });
    pump(&mut controller).await;

    connector.push(ServerEvent::MoveMade {
        session_id: Some(session_id("G2")),
        fen: E1.to_string(),
        turn: Some(Side::Black),
        ply_count: 1,
        last_move: Some("a2a4".into()),
    });
    connector.push(ServerEvent::GameCreated {
        session_id: session_id("G3"),
        fen: E1.to_string(),
    });
    pump(&mut controller).await;

    assert_eq!(controller.session().session_id().map(|id| id.as_str()), Some("G1"));
    assert_eq!(controller.board().ply_count(), 0);
    assert_eq!(controller.board().position(), E0);
}

#[tokio::test]
async fn test_late_move_result_after_reset_is_discarded() {
    let api = FakeApi::new();
    api.queue_move(accepted(E1, Side::Black, 1));
    api.set_move_delay(Duration::from_millis(150));
    let mut controller = controller(&api, None, test_config(RemoteTransport::Direct));

    controller.choose_solo().await.expect("solo");
    controller.submit("a2a4".parse().expect("move")).expect("submit");
    controller.reset().await;
    controller.choose_solo().await.expect("solo again");

    tokio::time::sleep(Duration::from_millis(300)).await;
    pump(&mut controller).await;

    assert_eq!(api.move_requests().len(), 1);
    assert_eq!(controller.board().ply_count(), 0);
    assert!(controller.board().move_log().is_empty());
    assert!(controller.session().is_active());
}

#[tokio::test]
async fn test_channel_loss_is_surfaced_and_released() {
    let api = FakeApi::new();
    api.set_state(state("G1", E0, &[]));
    let connector = FakeConnector::new();
    let mut controller = controller(&api, Some(&connector), test_config(RemoteTransport::Push));
    let mut notifications = controller.subscribe_notifications();

    controller.choose_remote().await.expect("choose remote");
    controller.create_session().await.expect("create");
    connector.push(ServerEvent::GameCreated {
        session_id: session_id("G1"),
        fen: E0.to_string(),
    });
    pump(&mut controller).await;

    connector.hang_up();
    pump(&mut controller).await;

    assert!(!controller.has_push_channel());
    assert!(
        drain(&mut notifications)
            .iter()
            .any(|n| matches!(n, Notification::TransportFailed(_)))
    );
    let record = connector.record();
    assert_eq!(record.closed, 1);
    assert_eq!(record.unsubscribed.len(), EventKind::iter().count());

    // Moves fall back to direct submission.
    api.queue_move(accepted(E1, Side::Black, 1));
    controller.submit("a2a4".parse().expect("move")).expect("submit");
    pump(&mut controller).await;
    assert_eq!(api.move_requests().len(), 1);
    assert_eq!(controller.board().ply_count(), 1);
}

#[tokio::test]
async fn test_push_transport_without_server_fails_to_enter_remote() {
    let api = FakeApi::new();
    let connector = FakeConnector::refusing();
    let mut controller = controller(&api, Some(&connector), test_config(RemoteTransport::Push));

    let err = controller.choose_remote().await.expect_err("no push server");
    assert!(err.is_transport());
    assert_eq!(controller.session().mode(), SessionMode::Unselected);
}

#[tokio::test]
async fn test_acknowledge_game_over_starts_new_solo_game() {
    let api = FakeApi::new();
    api.queue_move(MoveResponse {
        status: Some(MoveStatus::GameOver),
        fen: Some(EF.to_string()),
        winner: Some(Winner::Side(Side::White)),
        ply_count: Some(1),
        ..MoveResponse::default()
    });
    let mut controller = controller(&api, None, test_config(RemoteTransport::Direct));

    controller.choose_solo().await.expect("solo");
    controller.submit("d1h5".parse().expect("move")).expect("submit");
    pump(&mut controller).await;

    assert_eq!(controller.session().status(), SessionStatus::Terminal);
    assert_eq!(controller.board().ply_count(), 1);
    assert!(controller.submit("a2a4".parse().expect("move")).is_err());

    controller.acknowledge_game_over().await.expect("acknowledge");
    assert_eq!(api.start_game_calls(), 1);
    assert_eq!(controller.session().mode(), SessionMode::Solo);
    assert_eq!(controller.session().status(), SessionStatus::Active);
    assert_eq!(controller.board().ply_count(), 0);
    assert!(controller.board().move_log().is_empty());
}

#[tokio::test]
async fn test_acknowledge_requires_finished_game() {
    let api = FakeApi::new();
    let mut controller = controller(&api, None, test_config(RemoteTransport::Direct));
    controller.choose_solo().await.expect("solo");

    let err = controller.acknowledge_game_over().await.expect_err("still playing");
    assert!(matches!(err.kind, ClientErrorKind::InvalidState(_)));
    assert_eq!(controller.session().status(), SessionStatus::Active);
}

#[tokio::test]
async fn test_highlights_come_from_the_oracle() {
    let api = FakeApi::new();
    api.set_legal(&["a3", "a4"]);
    let mut controller = controller(&api, None, test_config(RemoteTransport::Direct));

    assert!(
        controller
            .highlights("a2".parse().expect("square"))
            .await
            .expect("no board yet")
            .is_empty()
    );

    controller.choose_solo().await.expect("solo");
    let targets = controller
        .highlights("a2".parse().expect("square"))
        .await
        .expect("highlights");
    let names: Vec<String> = targets.iter().map(|s| s.to_string()).collect();
    assert_eq!(names, ["a3", "a4"]);
}

#[tokio::test]
async fn test_precheck_refuses_without_round_trip() {
    let api = FakeApi::new();
    api.set_legal(&["a3", "a4"]);
    let config = test_config(RemoteTransport::Direct).with_precheck(true);
    let mut controller = controller(&api, None, config);
    let mut notifications = controller.subscribe_notifications();

    controller.choose_solo().await.expect("solo");
    controller.submit("a2a5".parse().expect("move")).expect("submit");
    pump(&mut controller).await;

    assert!(api.move_requests().is_empty());
    assert!(
        drain(&mut notifications)
            .iter()
            .any(|n| matches!(n, Notification::MoveRejected { .. }))
    );
    assert_eq!(controller.board().ply_count(), 0);
}

#[tokio::test]
async fn test_promotion_defaults_to_queen() {
    const ABOUT_TO_PROMOTE: &str = "8/4P1k1/8/8/8/8/6K1/8 w - - 0 60";
    const PROMOTED: &str = "4Q3/6k1/8/8/8/8/6K1/8 b - - 0 60";

    let api = FakeApi::new();
    api.set_setup_fen(ABOUT_TO_PROMOTE);
    api.queue_move(accepted(PROMOTED, Side::Black, 1));
    let mut controller = controller(&api, None, test_config(RemoteTransport::Direct));

    controller.choose_solo().await.expect("solo");
    controller.submit("e7e8".parse().expect("move")).expect("submit");
    pump(&mut controller).await;

    let requests = api.move_requests();
    assert_eq!(requests[0].promotion, Some(PieceKind::Queen));
    assert_eq!(controller.board().move_log(), ["e7e8q".to_string()]);
}

#[tokio::test]
async fn test_operations_out_of_order_are_refused() {
    let api = FakeApi::new();
    let mut controller = controller(&api, None, test_config(RemoteTransport::Direct));

    assert!(controller.create_session().await.is_err());
    assert!(controller.join_session("G1").await.is_err());
    assert!(controller.submit("a2a4".parse().expect("move")).is_err());

    controller.choose_solo().await.expect("solo");
    let err = controller.choose_remote().await.expect_err("already solo");
    assert!(matches!(err.kind, ClientErrorKind::InvalidState(_)));
}

const AFTER_B2B4: &str = "bnrqkrnb/pppppppp/8/8/1P6/8/P1PPPPPP/BNRQKRNB b - - 0 1";

#[tokio::test]
async fn test_solo_reply_skipping_unnamed_ply_keeps_server_position() {
    let api = FakeApi::new();
    api.queue_move(accepted(E2, Side::White, 2));
    let mut controller = controller(&api, None, test_config(RemoteTransport::Direct));
    let mut notifications = controller.subscribe_notifications();

    controller.choose_solo().await.expect("solo");
    controller.submit("a2a4".parse().expect("move")).expect("submit");
    pump(&mut controller).await;

    let board = controller.board();
    assert_eq!(board.ply_count(), 2);
    assert_eq!(board.position(), E2);
    assert_eq!(board.move_log(), ["a2a4".to_string(), UNKNOWN_MOVE.to_string()]);
    assert_eq!(board.turn(), Some(Side::White));
    assert!(
        drain(&mut notifications)
            .iter()
            .any(|n| matches!(n, Notification::Message(_)))
    );
}

#[tokio::test]
async fn test_racing_solo_submissions_keep_log_and_position_together() {
    let api = FakeApi::new();
    api.queue_move(accepted(E1, Side::Black, 1));
    api.queue_move(accepted(AFTER_B2B4, Side::Black, 1));
    let mut controller = controller(&api, None, test_config(RemoteTransport::Direct));

    controller.choose_solo().await.expect("solo");
    controller.submit("a2a4".parse().expect("move")).expect("first");
    controller.submit("b2b4".parse().expect("move")).expect("second");
    pump(&mut controller).await;

    let requests = api.move_requests();
    assert_eq!(requests.len(), 2);
    assert!(requests.iter().all(|r| r.fen == E0));

    let board = controller.board();
    assert_eq!(board.ply_count(), 1);
    let expected_log = match board.position() {
        E1 => "a2a4",
        AFTER_B2B4 => "b2b4",
        other => panic!("unexpected position {}", other),
    };
    assert_eq!(board.move_log(), [expected_log.to_string()]);
}

#[tokio::test]
async fn test_competing_push_submissions_resync_unnamed_move() {
    let api = FakeApi::new();
    api.set_state(state("G1", E0, &[]));
    let connector = FakeConnector::new();
    let mut controller = controller(&api, Some(&connector), test_config(RemoteTransport::Push));

    controller.choose_remote().await.expect("choose remote");
    controller.create_session().await.expect("create");
    connector.push(ServerEvent::GameCreated {
        session_id: session_id("G1"),
        fen: E0.to_string(),
    });
    pump(&mut controller).await;

    controller.submit("a2a4".parse().expect("move")).expect("first");
    controller.submit("b2b4".parse().expect("move")).expect("second");
    pump(&mut controller).await;
    let sent = connector.record().sent;
    assert_eq!(
        sent.iter()
            .filter(|e| matches!(e, ClientEvent::MakeMove { .. }))
            .count(),
        2
    );

    // The server took the first move and does not name it.
    api.set_state(state("G1", E1, &["a2a4"]));
    connector.push(ServerEvent::MoveMade {
        session_id: Some(session_id("G1")),
        fen: E1.to_string(),
        turn: Some(Side::Black),
        ply_count: 1,
        last_move: None,
    });
    pump(&mut controller).await;

    assert_eq!(controller.board().ply_count(), 1);
    assert_eq!(controller.board().move_log(), ["a2a4".to_string()]);
    assert_eq!(controller.board().position(), E1);
}
