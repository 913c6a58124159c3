//! TCP connection handler
//!
//! Drives one client connection: splits the stream, spawns the mailbox
//! delivery task on the write half, reads lines from the read half and
//! races each read against the inactivity watchdog.

use std::io;
use std::time::Duration;

use futures_util::StreamExt;
use tokio::io::{AsyncRead, AsyncWrite};
use tokio::net::TcpStream;
use tokio::task::JoinHandle;
use tokio_util::codec::{FramedRead, LinesCodec, LinesCodecError};
use tracing::{debug, info, warn};

use crate::broadcast::Broadcaster;
use crate::error::{AppError, ProtocolError};
use crate::liveness::Watchdog;
use crate::mailbox::mailbox;
use crate::registry::Registry;
use crate::session::Session;
use crate::types::SessionId;

/// How long a closing session may spend flushing its last lines
pub const FLUSH_GRACE: Duration = Duration::from_secs(5);

/// Everything a connection needs from its server
#[derive(Debug, Clone)]
pub struct ConnectionContext {
    pub registry: Registry,
    pub broadcaster: Broadcaster,
    pub idle_timeout: Duration,
    pub max_line_length: usize,
}

/// Handle a new TCP connection
///
/// The session's default name is the peer address.
pub async fn handle_connection(stream: TcpStream, ctx: ConnectionContext) -> Result<(), AppError> {
    let session_id = SessionId::new();
    let peer_addr = stream
        .peer_addr()
        .map(|a| a.to_string())
        .unwrap_or_else(|_| unknown_peer_name(session_id));

    debug!("New TCP connection from {}", peer_addr);

    let (reader, writer) = stream.into_split();
    run_session(session_id, reader, writer, peer_addr, ctx).await
}

/// Default name for a peer whose address cannot be read
fn unknown_peer_name(session_id: SessionId) -> String {
    format!("unknown-{}", session_id)
}

/// Run one session over an arbitrary reader/writer pair
///
/// Returns once the session is offline and its mailbox has been flushed,
/// or after [`FLUSH_GRACE`] if the peer stopped reading. Only a rejected
/// join is reported as an error; read faults, EOF and timeouts are normal
/// endings.
pub async fn serve<R, W>(
    reader: R,
    writer: W,
    addr: String,
    ctx: ConnectionContext,
) -> Result<(), AppError>
where
    R: AsyncRead + Unpin,
    W: AsyncWrite + Unpin + Send + 'static,
{
    run_session(SessionId::new(), reader, writer, addr, ctx).await
}

async fn run_session<R, W>(
    session_id: SessionId,
    reader: R,
    writer: W,
    addr: String,
    ctx: ConnectionContext,
) -> Result<(), AppError>
where
    R: AsyncRead + Unpin,
    W: AsyncWrite + Unpin + Send + 'static,
{
    let (mailbox, receiver) = mailbox();
    let mut session = Session::new(session_id, addr, mailbox, ctx.registry, ctx.broadcaster);

    // Spawn write task (mailbox -> connection)
    let write_task = tokio::spawn(receiver.deliver(session_id, writer));

    if let Err(e) = session.join() {
        finish_delivery(session_id, write_task).await;
        return Err(e);
    }
    info!("Client {} connected from {}", session_id, session.addr());

    let mut lines = FramedRead::new(reader, LinesCodec::new_with_max_length(ctx.max_line_length));
    let mut watchdog = Watchdog::new(ctx.idle_timeout);
    // After a decode error the codec yields a single `None` before it
    // resumes reading
    let mut skip_pause = false;

    loop {
        tokio::select! {
            next = lines.next() => match next {
                Some(Ok(line)) => {
                    watchdog.touch();
                    session.dispatch(&line);
                }
                Some(Err(LinesCodecError::MaxLineLengthExceeded)) => {
                    watchdog.touch();
                    warn!("Client {} sent an over-long line", session_id);
                    session.send(ProtocolError::LineTooLong(ctx.max_line_length).into());
                    skip_pause = true;
                }
                Some(Err(LinesCodecError::Io(e))) if e.kind() == io::ErrorKind::InvalidData => {
                    watchdog.touch();
                    warn!("Client {} sent a line that is not UTF-8", session_id);
                    session.send(ProtocolError::InvalidUtf8.into());
                    skip_pause = true;
                }
                Some(Err(LinesCodecError::Io(e))) => {
                    warn!("Read error for {}: {}", session_id, e);
                    session.leave();
                    break;
                }
                None if skip_pause => {
                    skip_pause = false;
                }
                None => {
                    debug!("Client {} closed the connection", session_id);
                    session.leave();
                    break;
                }
            },
            _ = watchdog.expired() => {
                session.time_out(watchdog.window());
                break;
            }
        }
    }

    // Stop reading; the socket closes once the write half is dropped too
    drop(lines);
    finish_delivery(session_id, write_task).await;

    info!("Client {} disconnected", session_id);

    Ok(())
}

/// Wait for the write task to flush, aborting it if the peer stalls
async fn finish_delivery(session_id: SessionId, mut write_task: JoinHandle<Result<usize, AppError>>) {
    match tokio::time::timeout(FLUSH_GRACE, &mut write_task).await {
        Ok(Ok(Ok(delivered))) => debug!("Write task for {} flushed {} lines", session_id, delivered),
        Ok(Ok(Err(e))) => debug!("Write task for {} failed: {}", session_id, e),
        Ok(Err(e)) => warn!("Write task for {} panicked: {}", session_id, e),
        Err(_) => {
            warn!(
                "Client {} not reading, closing after {:?} without flushing",
                session_id, FLUSH_GRACE
            );
            write_task.abort();
            // The write half is dropped once the aborted task is gone
            let _ = write_task.await;
        }
    }
}
