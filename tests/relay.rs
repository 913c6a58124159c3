//! End-to-end tests over real TCP connections.

mod common;

use std::time::Duration;

use common::{TestClient, TestServer};
use line_chat::{Config, Server};
use tokio::sync::oneshot;

const LONG_IDLE: u64 = 1000;

#[tokio::test]
async fn test_chat_scenario() {
    let server = TestServer::spawn(LONG_IDLE).await;

    // Public chat reaches everyone, sender included
    let mut a = server.join().await;
    a.send("hello").await;
    assert_eq!(a.recv().await, format!("[{0}]{0}:hello", a.addr));

    let mut b = server.join().await;
    assert_eq!(a.recv().await, format!("[{0}]{0}:joined", b.addr));

    b.send("rename|bob").await;
    assert_eq!(b.recv().await, "name changed to bob");

    let mut c = server.join().await;
    assert_eq!(a.recv().await, format!("[{0}]{0}:joined", c.addr));
    assert_eq!(b.recv().await, format!("[{0}]{0}:joined", c.addr));

    c.send("rename|bob").await;
    assert_eq!(c.recv().await, "name 'bob' is already taken");

    // Private message goes to bob only
    a.send("to|bob|hi").await;
    assert_eq!(b.recv().await, format!("[{}](PM):hi", a.addr));
    a.expect_silence().await;
    c.expect_silence().await;

    // Unknown recipient is reported to the sender only
    a.send("to|nobody|hi").await;
    assert_eq!(a.recv().await, "user 'nobody' does not exist");
    b.expect_silence().await;
    c.expect_silence().await;
}

#[tokio::test]
async fn test_who_lists_everyone_online() {
    let server = TestServer::spawn(LONG_IDLE).await;

    let mut a = server.join().await;
    let mut b = server.join().await;
    a.recv().await;
    b.send("rename|bob").await;
    b.recv().await;

    a.send("who").await;
    let mut listed = vec![a.recv().await, a.recv().await];
    listed.sort();

    let mut expected = vec![
        format!("[{0}]{0}:online", a.addr),
        format!("[{}]bob:online", b.addr),
    ];
    expected.sort();
    assert_eq!(listed, expected);
    b.expect_silence().await;
}

#[tokio::test]
async fn test_private_content_keeps_delimiters() {
    let server = TestServer::spawn(LONG_IDLE).await;

    let mut a = server.join().await;
    let mut b = server.join().await;
    a.recv().await;
    b.send("rename|bob").await;
    b.recv().await;

    a.send("to|bob|a|b|c").await;
    assert_eq!(b.recv().await, format!("[{}](PM):a|b|c", a.addr));

    a.send("to|bob").await;
    assert_eq!(a.recv().await, "bad format, use to|<name>|<message>");

    a.send("to|bob|").await;
    assert_eq!(a.recv().await, "empty message, nothing sent");
    b.expect_silence().await;
}

#[tokio::test]
async fn test_disconnect_announces_leave() {
    let server = TestServer::spawn(LONG_IDLE).await;

    let mut a = server.join().await;
    let mut b = server.join().await;
    a.recv().await;
    b.send("rename|bob").await;
    b.recv().await;
    assert_eq!(server.registry.len(), 2);

    let b_addr = b.addr.clone();
    b.quit().await;

    assert_eq!(a.recv().await, format!("[{}]bob:left", b_addr));
    assert_eq!(server.registry.len(), 1);
    assert!(server.registry.lookup("bob").is_none());

    // The name is free again
    a.send("rename|bob").await;
    assert_eq!(a.recv().await, "name changed to bob");
}

#[tokio::test]
async fn test_idle_client_is_dropped() {
    let server = TestServer::spawn(1).await;

    let mut a = server.join().await;
    assert_eq!(a.recv().await, "timed out after 1s of inactivity");
    a.expect_closed().await;
    assert!(server.registry.is_empty());
}

#[tokio::test]
async fn test_activity_resets_idle_window() {
    let server = TestServer::spawn(2).await;

    let mut a = server.join().await;
    for _ in 0..4 {
        tokio::time::sleep(Duration::from_millis(700)).await;
        a.send("ping").await;
        assert_eq!(a.recv().await, format!("[{0}]{0}:ping", a.addr));
    }
    // 2.8s have passed, well past a single window
    assert_eq!(server.registry.len(), 1);

    assert_eq!(a.recv().await, "timed out after 2s of inactivity");
    a.expect_closed().await;
    assert!(server.registry.is_empty());
}

#[tokio::test]
async fn test_independent_servers() {
    let one = TestServer::spawn(LONG_IDLE).await;
    let two = TestServer::spawn(LONG_IDLE).await;

    let mut a = one.join().await;
    let mut b = two.join().await;

    a.send("only on one").await;
    assert_eq!(a.recv().await, format!("[{0}]{0}:only on one", a.addr));
    b.expect_silence().await;
    assert_eq!(one.registry.len(), 1);
    assert_eq!(two.registry.len(), 1);
}

#[tokio::test]
async fn test_shutdown_keeps_connected_sessions() {
    let config = Config {
        port: 0,
        idle_timeout_secs: LONG_IDLE,
        ..Config::default()
    };
    let server = Server::bind(config).await.unwrap();
    let addr = server.local_addr().unwrap();
    let registry = server.registry();
    let (stop, stopped) = oneshot::channel::<()>();
    let run = tokio::spawn(server.run_until(async {
        let _ = stopped.await;
    }));

    let mut a = TestClient::connect(addr).await;
    assert_eq!(a.recv().await, format!("[{0}]{0}:joined", a.addr));

    stop.send(()).unwrap();
    run.await.unwrap();

    // The listener is gone but the session still chats
    assert!(tokio::net::TcpStream::connect(addr).await.is_err());
    a.send("still here").await;
    assert_eq!(a.recv().await, format!("[{0}]{0}:still here", a.addr));
    assert_eq!(registry.len(), 1);
}
