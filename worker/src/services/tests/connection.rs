//! Tests for the upstream TCP connection

use std::time::Duration;

use tokio::net::TcpListener;
use tokio::sync::mpsc;
use tokio::time::timeout;

use shared::codec::{read_frame, write_frame};
use shared::{Bus, Envelope, Frame, ProcessIdentity, Shutdown, Source, Target, WorkerId};

use crate::error::WorkerError;
use crate::services::UpstreamConnection;

const TEST_TIMEOUT: Duration = Duration::from_millis(2000);

#[tokio::test]
async fn test_connect_sends_hello_then_pumps_events() {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let identity = ProcessIdentity::worker(WorkerId(3), 303);

    let (connection, accepted) = tokio::join!(UpstreamConnection::connect(addr, identity), listener.accept());
    let connection = connection.unwrap();
    let (mut server, _) = accepted.unwrap();

    assert_eq!(
        timeout(TEST_TIMEOUT, read_frame(&mut server)).await.unwrap().unwrap(),
        Some(Frame::Hello {
            worker_id: WorkerId(3),
            process_id: 303,
        })
    );

    let bus = Bus::new(connection.transport());
    let (tx, mut rx) = mpsc::unbounded_channel();
    bus.on(Source::Inbound, move |event: Shutdown| {
        let _ = tx.send(event.reason);
    });

    // Worker -> primary
    bus.emit(Target::Default, &Shutdown { reason: "up".into() }).unwrap();
    match timeout(TEST_TIMEOUT, read_frame(&mut server)).await.unwrap().unwrap() {
        Some(Frame::Event(envelope)) => {
            let event: Shutdown = envelope.unwrap_event().unwrap().unwrap();
            assert_eq!(event.reason, "up");
        }
        other => panic!("Expected event frame, got {other:?}"),
    }

    // Primary -> worker
    let down = Envelope::wrap(&Shutdown { reason: "down".into() }).unwrap();
    write_frame(&mut server, &Frame::Event(down)).await.unwrap();
    assert_eq!(timeout(TEST_TIMEOUT, rx.recv()).await.unwrap().unwrap(), "down");
}

#[tokio::test]
async fn test_closed_resolves_when_primary_hangs_up() {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();

    let (connection, accepted) = tokio::join!(
        UpstreamConnection::connect(addr, ProcessIdentity::worker(WorkerId(1), 11)),
        listener.accept()
    );
    let mut connection = connection.unwrap();
    let (server, _) = accepted.unwrap();
    let transport = connection.transport();
    assert!(transport.is_connected());

    drop(server);

    timeout(TEST_TIMEOUT, connection.closed()).await.unwrap();
    timeout(TEST_TIMEOUT, async {
        while transport.is_connected() {
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
    })
    .await
    .unwrap();
}

#[tokio::test(start_paused = true)]
async fn test_connect_gives_up_after_retries() {
    // Bind then drop to get a port nobody listens on
    let addr = {
        let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
        listener.local_addr().unwrap()
    };

    let result = UpstreamConnection::connect(addr, ProcessIdentity::worker(WorkerId(1), 11)).await;
    assert!(matches!(result, Err(WorkerError::ConnectionError { .. })));
}

#[tokio::test]
async fn test_undecodable_frame_keeps_connection_open() {
    use tokio::io::AsyncWriteExt;

    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();

    let (connection, accepted) = tokio::join!(
        UpstreamConnection::connect(addr, ProcessIdentity::worker(WorkerId(2), 22)),
        listener.accept()
    );
    let mut connection = connection.unwrap();
    let (mut server, _) = accepted.unwrap();
    let hello = timeout(TEST_TIMEOUT, read_frame(&mut server)).await.unwrap().unwrap();
    assert!(matches!(hello, Some(Frame::Hello { .. })));

    let bus = Bus::new(connection.transport());
    let (tx, mut rx) = mpsc::unbounded_channel();
    bus.on(Source::Inbound, move |event: Shutdown| {
        let _ = tx.send(event.reason);
    });

    server
        .write_all(&[0, 0, 0, 5, 0xff, 0xff, 0xff, 0xff, 0x01])
        .await
        .unwrap();
    let after = Envelope::wrap(&Shutdown { reason: "after garbage".into() }).unwrap();
    write_frame(&mut server, &Frame::Event(after)).await.unwrap();

    assert_eq!(timeout(TEST_TIMEOUT, rx.recv()).await.unwrap().unwrap(), "after garbage");
    assert!(connection.transport().is_connected());
    // The connection has not reported itself closed
    assert!(timeout(Duration::from_millis(50), connection.closed()).await.is_err());
}
