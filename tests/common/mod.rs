//! Shared helpers for end-to-end tests: a relay on an ephemeral port and a
//! line-oriented TCP client.

#![allow(dead_code)]

use std::net::SocketAddr;
use std::time::Duration;

use line_chat::{Config, Registry, Server};
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader, Lines};
use tokio::net::tcp::{OwnedReadHalf, OwnedWriteHalf};
use tokio::net::TcpStream;

const RECV_TIMEOUT: Duration = Duration::from_secs(5);

/// A relay running in the background
pub struct TestServer {
    pub addr: SocketAddr,
    pub registry: Registry,
}

impl TestServer {
    /// Spawn a relay on 127.0.0.1 with an OS-assigned port
    pub async fn spawn(idle_timeout_secs: u64) -> TestServer {
        let config = Config {
            port: 0,
            idle_timeout_secs,
            ..Config::default()
        };
        let server = Server::bind(config).await.expect("bind test server");
        let addr = server.local_addr().expect("local addr");
        let registry = server.registry();
        tokio::spawn(server.run());
        TestServer { addr, registry }
    }

    /// Connect a client and wait for its own join notice
    pub async fn join(&self) -> TestClient {
        let mut client = TestClient::connect(self.addr).await;
        let joined = client.recv().await;
        assert_eq!(joined, format!("[{0}]{0}:joined", client.addr));
        client
    }
}

/// One chat participant
pub struct TestClient {
    /// Address the server sees for this client
    pub addr: String,
    lines: Lines<BufReader<OwnedReadHalf>>,
    writer: OwnedWriteHalf,
}

impl TestClient {
    pub async fn connect(addr: SocketAddr) -> TestClient {
        let stream = TcpStream::connect(addr).await.expect("connect");
        let local = stream.local_addr().expect("client local addr").to_string();
        let (reader, writer) = stream.into_split();
        TestClient {
            addr: local,
            lines: BufReader::new(reader).lines(),
            writer,
        }
    }

    pub async fn send(&mut self, line: &str) {
        self.writer
            .write_all(format!("{}\n", line).as_bytes())
            .await
            .expect("send line");
    }

    /// Next line, failing the test if nothing arrives in time
    pub async fn recv(&mut self) -> String {
        tokio::time::timeout(RECV_TIMEOUT, self.lines.next_line())
            .await
            .expect("timed out waiting for a line")
            .expect("read error")
            .expect("connection closed")
    }

    /// Next line if one arrives within `wait`
    pub async fn recv_timeout(&mut self, wait: Duration) -> Option<String> {
        match tokio::time::timeout(wait, self.lines.next_line()).await {
            Ok(Ok(line)) => line,
            _ => None,
        }
    }

    /// Assert nothing arrives for a short while
    pub async fn expect_silence(&mut self) {
        if let Some(line) = self.recv_timeout(Duration::from_millis(200)).await {
            panic!("{} received unexpected line: {}", self.addr, line);
        }
    }

    /// Wait for the server to close the connection
    pub async fn expect_closed(&mut self) {
        let next = tokio::time::timeout(RECV_TIMEOUT, self.lines.next_line())
            .await
            .expect("timed out waiting for close");
        match next {
            Ok(None) | Err(_) => {}
            Ok(Some(line)) => panic!("expected close, got line: {}", line),
        }
    }

    pub async fn quit(mut self) {
        let _ = self.writer.shutdown().await;
    }
}
