use chesslink_board::{
    BoardEvent, BoardModel, DeviceSnapshot, MovePayload, PgnFile, PgnFileList, ServerAction,
    ServerToClientMessage,
};
use chesslink_types::{BoardState, ConnectionState, GameInfo};
use pretty_assertions::assert_eq;

fn state_changed(snapshot: &DeviceSnapshot) -> ServerToClientMessage {
    ServerToClientMessage::json(ServerAction::StateChanged, snapshot).unwrap()
}

#[test]
fn starts_disconnected_and_empty() {
    let model = BoardModel::new();
    assert_eq!(*model.connection_state().borrow(), ConnectionState::Disconnected);
    assert_eq!(*model.game_info().borrow(), None);
    assert_eq!(*model.board_state().borrow(), BoardState::default());
}

#[test]
fn state_changed_replaces_snapshot_and_game() {
    let model = BoardModel::new();
    model
        .apply(&state_changed(&DeviceSnapshot {
            game_id: Some("g1".into()),
            pgn: Some("1. e4".into()),
            last_move: Some("e2e4".into()),
            should_send_move: true,
        }))
        .unwrap();

    assert_eq!(*model.game_info().borrow(), Some(GameInfo::new("g1")));
    assert_eq!(
        *model.board_state().borrow(),
        BoardState {
            pgn: Some("1. e4".into()),
            last_move: Some("e2e4".into()),
            should_send_move: true,
        }
    );

    // Wholesale replacement: missing fields are cleared, not merged.
    model
        .apply(&state_changed(&DeviceSnapshot {
            pgn: Some("1. e4 e5".into()),
            ..Default::default()
        }))
        .unwrap();
    let state = model.board_state().borrow().clone();
    assert_eq!(state.last_move, None);
    assert!(!state.should_send_move);
    // Game id is kept when the snapshot omits it.
    assert_eq!(*model.game_info().borrow(), Some(GameInfo::new("g1")));
}

#[test]
fn identical_snapshot_does_not_notify() {
    let model = BoardModel::new();
    let mut rx = model.board_state();
    let snapshot = DeviceSnapshot {
        pgn: Some("1. d4".into()),
        ..Default::default()
    };

    model.apply(&state_changed(&snapshot)).unwrap();
    assert!(rx.has_changed().unwrap());
    rx.borrow_and_update();

    model.apply(&state_changed(&snapshot)).unwrap();
    assert!(!rx.has_changed().unwrap());
}

#[test]
fn on_move_builds_board_state() {
    let model = BoardModel::new();
    let msg = ServerToClientMessage::json(
        ServerAction::OnMove,
        &MovePayload {
            uci: "g1f3".into(),
            pgn: Some("1. Nf3".into()),
            should_send: true,
        },
    )
    .unwrap();
    model.apply(&msg).unwrap();

    let state = model.board_state().borrow().clone();
    assert_eq!(state.move_to_send(), Some("g1f3"));
    assert_eq!(state.pgn.as_deref(), Some("1. Nf3"));
}

#[test]
fn saved_games_are_events() {
    let model = BoardModel::new();
    let mut events = model.events();

    let files = vec![PgnFile {
        name: "game1.pgn".into(),
        pgn: "1. e4 *".into(),
    }];
    model
        .apply(
            &ServerToClientMessage::json(
                ServerAction::ReturnPgnFiles,
                &PgnFileList {
                    files: files.clone(),
                },
            )
            .unwrap(),
        )
        .unwrap();
    model
        .apply(&ServerToClientMessage::new(ServerAction::PgnFilesDone, ""))
        .unwrap();

    assert_eq!(events.try_recv().unwrap(), BoardEvent::PgnFiles(files));
    assert_eq!(events.try_recv().unwrap(), BoardEvent::PgnFilesDone);
}

#[test]
fn device_error_accepts_plain_text() {
    let model = BoardModel::new();
    let mut events = model.events();

    model
        .apply(&ServerToClientMessage::new(ServerAction::OnError, "sensor fault"))
        .unwrap();
    model
        .apply(&ServerToClientMessage::new(
            ServerAction::OnError,
            r#"{"message":"low battery"}"#,
        ))
        .unwrap();

    assert_eq!(
        events.try_recv().unwrap(),
        BoardEvent::DeviceError("sensor fault".into())
    );
    assert_eq!(
        events.try_recv().unwrap(),
        BoardEvent::DeviceError("low battery".into())
    );
}

#[test]
fn malformed_payload_is_serialization_error() {
    let model = BoardModel::new();
    let err = model
        .apply(&ServerToClientMessage::new(ServerAction::OnMove, "not json"))
        .unwrap_err();
    assert!(matches!(err, chesslink_board::BoardError::Serialization(_)));
}

#[test]
fn set_connection_state_reports_change() {
    let model = BoardModel::new();
    assert!(model.set_connection_state(ConnectionState::Connecting));
    assert!(!model.set_connection_state(ConnectionState::Connecting));
    assert_eq!(model.current_connection_state(), ConnectionState::Connecting);
}
