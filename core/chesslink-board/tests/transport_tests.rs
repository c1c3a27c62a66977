use chesslink_board::{
    BoardError, ClientAction, ClientToServerMessage, FrameReader, FramedTransport,
    ServerAction, ServerToClientMessage,
};
use chesslink_board::frame::write_frame;
use futures::StreamExt;
use std::sync::Arc;
use std::time::Duration;

// ── send ────────────────────────────────────────────────────────

#[tokio::test]
async fn send_writes_one_frame() {
    let (app, board) = tokio::io::duplex(4096);
    let transport = FramedTransport::new(app);

    transport.send(&ClientToServerMessage::test_leds()).await.unwrap();

    let mut reader = FrameReader::new(board);
    let frame = reader.next_frame().await.unwrap().unwrap();
    let msg = ClientToServerMessage::from_frame(frame).unwrap();
    assert_eq!(msg.action, ClientAction::TestLeds);
    assert_eq!(msg.payload, "{}");
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_sends_do_not_interleave() {
    const SENDERS: usize = 16;
    const PER_SENDER: usize = 20;

    let (app, board) = tokio::io::duplex(256);
    let transport = Arc::new(FramedTransport::new(app));

    let reader_task = tokio::spawn(async move {
        let mut reader = FrameReader::new(board);
        let mut frames = Vec::new();
        while frames.len() < SENDERS * PER_SENDER {
            match reader.next_frame().await.unwrap() {
                Some(frame) => frames.push(frame),
                None => break,
            }
        }
        frames
    });

    let mut handles = Vec::new();
    for sender in 0..SENDERS {
        let transport = Arc::clone(&transport);
        handles.push(tokio::spawn(async move {
            // Payload larger than the pipe buffer forces partial writes.
            let payload = format!("{sender:02}").repeat(300);
            for _ in 0..PER_SENDER {
                let msg = ClientToServerMessage::new(ClientAction::ForceMoves, payload.clone());
                transport.send(&msg).await.unwrap();
            }
        }));
    }
    for handle in handles {
        handle.await.unwrap();
    }

    let frames = reader_task.await.unwrap();
    assert_eq!(frames.len(), SENDERS * PER_SENDER);
    for frame in frames {
        let body = String::from_utf8(frame.body).unwrap();
        assert_eq!(body.len(), 600);
        let tag = &body[..2];
        assert_eq!(body, tag.repeat(300), "frame body interleaved");
    }
}

#[tokio::test]
async fn dropped_send_still_writes_whole_frame() {
    let (app, board) = tokio::io::duplex(16);
    let transport = Arc::new(FramedTransport::new(app));

    // The board is not reading, so this write stalls after 16 bytes.
    let big = ClientToServerMessage::new(ClientAction::ForceMoves, "x".repeat(1000));
    let stalled = {
        let transport = Arc::clone(&transport);
        tokio::spawn(async move { transport.send(&big).await })
    };
    tokio::time::sleep(Duration::from_millis(50)).await;
    stalled.abort();
    assert!(stalled.await.unwrap_err().is_cancelled());

    let next = {
        let transport = Arc::clone(&transport);
        tokio::spawn(async move { transport.send(&ClientToServerMessage::test_leds()).await })
    };

    let mut reader = FrameReader::new(board);
    let frames = tokio::time::timeout(Duration::from_secs(5), async {
        let first = reader.next_frame().await.unwrap().unwrap();
        let second = reader.next_frame().await.unwrap().unwrap();
        (first, second)
    })
    .await
    .expect("frame stream desynchronized");

    let first = ClientToServerMessage::from_frame(frames.0).unwrap();
    assert_eq!(first.action, ClientAction::ForceMoves);
    assert_eq!(first.payload.len(), 1000);
    let second = ClientToServerMessage::from_frame(frames.1).unwrap();
    assert_eq!(second.action, ClientAction::TestLeds);
    next.await.unwrap().unwrap();
}

#[tokio::test]
async fn send_after_close_is_not_connected() {
    let (app, _board) = tokio::io::duplex(64);
    let transport = FramedTransport::new(app);
    transport.close().await;

    let err = transport
        .send(&ClientToServerMessage::test_leds())
        .await
        .unwrap_err();
    assert!(matches!(err, BoardError::NotConnected));
}

// ── receive ─────────────────────────────────────────────────────

#[tokio::test]
async fn receive_yields_messages_in_order_then_ends() {
    let (app, mut board) = tokio::io::duplex(4096);
    let transport = FramedTransport::new(app);
    let mut incoming = transport.receive().unwrap();

    for payload in ["{\"uci\":\"e2e4\"}", "{\"uci\":\"e7e5\"}"] {
        let msg = ServerToClientMessage::new(ServerAction::OnMove, payload);
        write_frame(&mut board, &msg.to_frame()).await.unwrap();
    }
    drop(board);

    let first = incoming.next().await.unwrap().unwrap();
    assert!(first.payload.contains("e2e4"));
    let second = incoming.next().await.unwrap().unwrap();
    assert!(second.payload.contains("e7e5"));
    assert!(incoming.next().await.is_none());
}

#[tokio::test]
async fn receive_is_not_restartable() {
    let (app, _board) = tokio::io::duplex(64);
    let transport = FramedTransport::new(app);
    let _incoming = transport.receive().unwrap();
    assert!(matches!(transport.receive(), Err(BoardError::NotConnected)));
}

#[tokio::test]
async fn unknown_action_fails_stream() {
    let (app, mut board) = tokio::io::duplex(4096);
    let transport = FramedTransport::new(app);
    let mut incoming = transport.receive().unwrap();

    write_frame(&mut board, &chesslink_board::Frame::new(0x7f, b"{}".to_vec()))
        .await
        .unwrap();

    let err = incoming.next().await.unwrap().unwrap_err();
    assert!(matches!(err, BoardError::Protocol(_)));
    assert!(incoming.next().await.is_none());
}

#[tokio::test]
async fn short_body_fails_stream_with_protocol_error() {
    use tokio::io::AsyncWriteExt;

    let (app, mut board) = tokio::io::duplex(4096);
    let transport = FramedTransport::new(app);
    let mut incoming = transport.receive().unwrap();

    board.write_all(&[0x81, 0, 0, 0, 50, b'{']).await.unwrap();
    drop(board);

    let err = incoming.next().await.unwrap().unwrap_err();
    assert!(matches!(err, BoardError::Protocol(_)));
}

#[tokio::test]
async fn non_utf8_payload_is_protocol_error() {
    let (app, mut board) = tokio::io::duplex(4096);
    let transport = FramedTransport::new(app);
    let mut incoming = transport.receive().unwrap();

    write_frame(&mut board, &chesslink_board::Frame::new(0x81, vec![0xff, 0xfe]))
        .await
        .unwrap();

    let err = incoming.next().await.unwrap().unwrap_err();
    assert!(err.to_string().contains("UTF-8"));
}
