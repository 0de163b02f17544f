//! End-to-end tests: in-memory sessions through the fixture, and real TCP
//! calls against a bound server backed by SQLite.

use std::sync::Arc;
use std::time::Duration;

use bytes::Bytes;
use tempfile::TempDir;
use tokio::net::TcpStream;
use tokio::sync::watch;
use tokio::task::JoinHandle;

use neuron::{spawn_sweeper, NeuronClient, NeuronService, RetentionConfig, Server, ServiceError};
use neuron_core::{ErrorKind, Request, Response, LIST_LIMIT};
use neuron_session::{
    shutdown_channel, Frame, FramedStream, MessageStream, Method, SessionError, TransportError,
    MAX_LIST_BYTES,
};
use neuron_store::{DocumentStore, SqliteStore};
use neuron_testkit::TestFixture;

/// CBOR for `{"purge": {}}`, an operation the server does not know.
const UNKNOWN_OPERATION: &[u8] = &[0xa1, 0x65, b'p', b'u', b'r', b'g', b'e', 0xa0];

struct RunningServer {
    client: NeuronClient,
    store: Arc<SqliteStore>,
    stop: watch::Sender<bool>,
    task: JoinHandle<neuron::Result<()>>,
    _dir: TempDir,
}

impl RunningServer {
    async fn start() -> Self {
        let dir = TempDir::new().unwrap();
        let store = Arc::new(SqliteStore::open(dir.path().join("neuron.db")).unwrap());
        let server = Server::bind("127.0.0.1:0", NeuronService::new(store.clone()))
            .await
            .unwrap()
            .with_drain_timeout(Duration::from_secs(2));
        let client = NeuronClient::connect(server.local_addr().unwrap()).await.unwrap();

        let (stop, signal) = shutdown_channel();
        let task = tokio::spawn(server.run(signal));
        Self {
            client,
            store,
            stop,
            task,
            _dir: dir,
        }
    }

    async fn stop(self) {
        self.stop.send(true).unwrap();
        self.task.await.unwrap().unwrap();
    }
}

fn status_kind(err: &SessionError) -> Option<ErrorKind> {
    match err {
        SessionError::Status(status) => Some(status.kind),
        _ => None,
    }
}

fn abort_kind(err: &SessionError) -> Option<ErrorKind> {
    match err {
        SessionError::Transport(TransportError::Remote(status)) => Some(status.kind),
        _ => None,
    }
}

#[tokio::test]
async fn test_add_get_list_in_memory() {
    let fixture = TestFixture::new();
    let (mut client, server) = fixture.open_session().await;

    let doc = client.add("alice", "hello", "doc01").await.unwrap();
    assert!(doc.id.starts_with("doc01"));
    assert_eq!(doc.owner, "alice");
    assert_eq!(doc.content, "hello");

    assert_eq!(client.get(&doc.id).await.unwrap(), doc);
    assert_eq!(client.list("alice").await.unwrap(), vec![doc]);
    assert!(client.list("bobby").await.unwrap().is_empty());

    client.close().await.unwrap();
    server.await.unwrap().unwrap();
}

#[tokio::test]
async fn test_add_get_list_over_tcp() {
    let server = RunningServer::start().await;
    let mut session = server.client.open_session().await.unwrap();

    let doc = session.add("alice", "hello", "doc01").await.unwrap();
    assert_eq!(session.get(&doc.id).await.unwrap(), doc);

    let listed = session.list("alice").await.unwrap();
    assert_eq!(listed.len(), 1);
    assert_eq!(listed[0], doc);
    assert!(session.list("bobby").await.unwrap().is_empty());

    session.close().await.unwrap();
    assert_eq!(server.store.get(&doc.id).await.unwrap(), doc);
    server.stop().await;
}

#[tokio::test]
async fn test_documents_visible_across_sessions() {
    let server = RunningServer::start().await;

    let mut writer = server.client.open_session().await.unwrap();
    let doc = writer.add("alice", "shared content", "notes").await.unwrap();
    writer.close().await.unwrap();

    let mut reader = server.client.open_session().await.unwrap();
    assert_eq!(reader.get(&doc.id).await.unwrap(), doc);
    reader.close().await.unwrap();

    server.stop().await;
}

#[tokio::test]
async fn test_missing_document_keeps_session_open() {
    let fixture = TestFixture::new();
    let (mut client, server) = fixture.open_session().await;

    let err = client.get("no-such-document").await.unwrap_err();
    assert_eq!(status_kind(&err), Some(ErrorKind::NotFound));

    let doc = client.add("alice", "hello", "doc01").await.unwrap();
    assert_eq!(client.get(&doc.id).await.unwrap(), doc);

    client.close().await.unwrap();
    server.await.unwrap().unwrap();
}

#[tokio::test]
async fn test_short_fields_rejected_without_ending_session() {
    let server = RunningServer::start().await;
    let mut session = server.client.open_session().await.unwrap();

    let err = session.add("al", "hello", "doc01").await.unwrap_err();
    assert_eq!(status_kind(&err), Some(ErrorKind::InvalidArgument));

    let err = session.add("alice", "hello", "doc").await.unwrap_err();
    assert_eq!(status_kind(&err), Some(ErrorKind::InvalidArgument));

    let err = session.list("bob").await.unwrap_err();
    assert_eq!(status_kind(&err), Some(ErrorKind::InvalidArgument));

    assert!(session.list("alice").await.unwrap().is_empty());
    session.close().await.unwrap();
    server.stop().await;
}

#[tokio::test]
async fn test_list_is_newest_first_and_capped() {
    let fixture = TestFixture::new();
    for i in 0..LIST_LIMIT + 5 {
        fixture
            .store
            .insert("alice", "content", &format!("doc{:03}", i))
            .await
            .unwrap();
        fixture.clock.advance(Duration::from_millis(1));
    }

    let (mut client, server) = fixture.open_session().await;
    let listed = client.list("alice").await.unwrap();

    assert_eq!(listed.len(), LIST_LIMIT);
    assert!(listed[0].id.starts_with(&format!("doc{:03}", LIST_LIMIT + 4)));
    assert!(listed.windows(2).all(|w| w[0].created_at >= w[1].created_at));

    client.close().await.unwrap();
    server.await.unwrap().unwrap();
}

#[tokio::test]
async fn test_list_larger_than_a_frame_is_trimmed_over_tcp() {
    let server = RunningServer::start().await;
    let mut session = server.client.open_session().await.unwrap();

    let big = "x".repeat(MAX_LIST_BYTES / 2 + 4096);
    session.add("alice", &big, "older").await.unwrap();
    let newest = session.add("alice", &big, "newer").await.unwrap();

    assert_eq!(session.list("alice").await.unwrap(), vec![newest]);
    assert_eq!(session.add("alice", "hello", "doc01").await.unwrap().owner, "alice");

    session.close().await.unwrap();
    server.stop().await;
}

#[tokio::test]
async fn test_unknown_operation_ends_stream() {
    let fixture = TestFixture::new();
    let (mut client, server) = fixture.open_session().await;

    client.send_plaintext(UNKNOWN_OPERATION).await.unwrap();
    let err = client.recv_plaintext().await.unwrap_err();
    assert_eq!(abort_kind(&err), Some(ErrorKind::Unimplemented));

    assert_eq!(server.await.unwrap().unwrap_err().kind(), ErrorKind::Unimplemented);
}

#[tokio::test]
async fn test_bad_handshake_key_rejected_over_tcp() {
    let server = RunningServer::start().await;

    let stream = TcpStream::connect(server.client.addr()).await.unwrap();
    let mut framed = FramedStream::new(stream);
    framed.write_frame(&Frame::Open(Method::Session)).await.unwrap();
    framed.send(Bytes::from_static(b"short")).await.unwrap();

    match framed.recv().await {
        Err(TransportError::Remote(status)) => assert_eq!(status.kind, ErrorKind::InvalidArgument),
        other => panic!("expected handshake abort, got {:?}", other),
    }
    server.stop().await;
}

#[tokio::test]
async fn test_undecodable_first_frame_rejected_over_tcp() {
    use tokio::io::AsyncWriteExt;

    let server = RunningServer::start().await;

    let stream = TcpStream::connect(server.client.addr()).await.unwrap();
    let mut framed = FramedStream::new(stream);
    framed.write_frame(&Frame::Open(Method::Session)).await.unwrap();

    let mut raw = framed.into_inner();
    raw.write_all(&[0, 0, 0, 3, 0xff, 0xff, 0xff]).await.unwrap();
    let mut framed = FramedStream::new(raw);

    match framed.recv().await {
        Err(TransportError::Remote(status)) => assert_eq!(status.kind, ErrorKind::InvalidArgument),
        other => panic!("expected handshake abort, got {:?}", other),
    }
    server.stop().await;
}

#[tokio::test]
async fn test_echo_over_tcp() {
    let server = RunningServer::start().await;
    let mut echo = server.client.open_echo().await.unwrap();

    for payload in [&b"first"[..], b"", b"third message"] {
        echo.send_plaintext(payload).await.unwrap();
        assert_eq!(echo.recv_plaintext().await.unwrap().unwrap(), payload);
    }

    echo.close().await.unwrap();
    server.stop().await;
}

#[tokio::test]
async fn test_ping_over_tcp() {
    let server = RunningServer::start().await;
    server.client.ping().await.unwrap();
    server.stop().await;
}

#[tokio::test]
async fn test_raw_call_returns_typed_error_response() {
    let fixture = TestFixture::new();
    let (mut client, server) = fixture.open_session().await;

    match client.call(&Request::get("missing-id")).await.unwrap() {
        Response::Error(status) => assert_eq!(status.kind, ErrorKind::NotFound),
        other => panic!("expected error response, got {:?}", other),
    }

    client.close().await.unwrap();
    server.await.unwrap().unwrap();
}

#[tokio::test]
async fn test_server_shutdown_ends_open_session() {
    let server = RunningServer::start().await;
    let mut session = server.client.open_session().await.unwrap();
    session.add("alice", "hello", "doc01").await.unwrap();

    server.stop.send(true).unwrap();
    assert!(session.recv_plaintext().await.unwrap().is_none());
    server.task.await.unwrap().unwrap();
}

#[tokio::test]
async fn test_connect_to_closed_port_fails() {
    let server = RunningServer::start().await;
    let client = server.client.clone();
    server.stop().await;

    assert!(matches!(client.ping().await, Err(ServiceError::Io(_))));
}

#[tokio::test]
async fn test_sweeper_expires_documents_seen_by_sessions() {
    let fixture = TestFixture::new();
    let (mut client, server) = fixture.open_session().await;
    let doc = client.add("alice", "hello", "doc01").await.unwrap();

    fixture.clock.advance(Duration::from_secs(120));

    let (cancel, signal) = shutdown_channel();
    let completion = spawn_sweeper(
        fixture.store.clone(),
        fixture.clock.clone(),
        RetentionConfig {
            max_age: Duration::from_secs(60),
            interval: Duration::from_millis(10),
        },
        signal,
    );

    while !fixture.store.is_empty().unwrap() {
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    cancel.send(true).unwrap();
    let report = completion.wait(Duration::from_secs(5)).await.unwrap();
    assert_eq!(report.deleted, 1);

    let err = client.get(&doc.id).await.unwrap_err();
    assert_eq!(status_kind(&err), Some(ErrorKind::NotFound));

    client.close().await.unwrap();
    server.await.unwrap().unwrap();
}
