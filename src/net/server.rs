use std::future::Future;
use std::net::SocketAddr;
use std::ops::ControlFlow;
use std::sync::Arc;
use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::oneshot;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use crate::error::{AppError, ConnectionError};
use crate::game::{GameSession, SessionRegistry};
use crate::net::{write_loop, Connection};
use crate::protocol::{ClientMessage, JoinRequest, ServerMessage};

/// Accepts client links, runs the join handshake and hands each joined
/// connection to its session.
pub struct GameServer {
    registry: Arc<SessionRegistry>,
}

impl GameServer {
    pub fn new(registry: Arc<SessionRegistry>) -> Self {
        Self { registry }
    }

    /// Accepts connections until `shutdown` resolves.
    pub async fn run<F>(
        self: Arc<Self>,
        listener: TcpListener,
        shutdown: F,
    ) -> Result<(), AppError>
    where
        F: Future<Output = ()>,
    {
        info!("Listening on {}", listener.local_addr()?);
        tokio::pin!(shutdown);

        loop {
            tokio::select! {
                _ = &mut shutdown => {
                    info!("Shutdown requested, no longer accepting connections");
                    break;
                }
                accepted = listener.accept() => match accepted {
                    Ok((stream, addr)) => {
                        let server = self.clone();
                        tokio::spawn(server.handle_connection(stream, addr));
                    }
                    Err(e) => {
                        error!("Error accepting connection: {}", e);
                    }
                }
            }
        }

        Ok(())
    }

    pub async fn handle_connection(self: Arc<Self>, stream: TcpStream, addr: SocketAddr) {
        info!("New connection from: {}", addr);

        let (read_half, mut write_half) = stream.into_split();
        let mut reader = BufReader::new(read_half);

        let joined = match read_handshake(&mut reader).await {
            Ok(join) => self
                .registry
                .get_or_create(&join.code)
                .await
                .map(|session| (join, session)),
            Err(e) => Err(e),
        };

        let (join, session) = match joined {
            Ok(joined) => joined,
            Err(AppError::Connection(e)) => {
                debug!("{} went away before joining: {}", addr, e);
                return;
            }
            Err(e) => {
                warn!("Rejecting {}: {}", addr, e);
                let line = format!("{}\n", ServerMessage::Error(e.client_message()));
                if let Err(e) = write_half.write_all(line.as_bytes()).await {
                    error!("Error sending handshake failure to {}: {}", addr, e);
                }
                let _ = write_half.shutdown().await;
                return;
            }
        };

        let (conn, rx) = Connection::channel(join.username.as_str());
        let connection_id = conn.id();
        info!(
            "{} joined session {} as {} (connection {})",
            addr, join.code, join.username, connection_id
        );

        let mut send_task = tokio::spawn(async move {
            if let Err(e) = write_loop(rx, write_half).await {
                error!("Error writing to connection {}: {}", connection_id, e);
            }
        });

        if let Err(e) = conn.send(&ServerMessage::Info(format!("Welcome {}", join.username))) {
            debug!("Welcome for connection {} dropped: {}", connection_id, e);
        }
        session.add_connection(conn).await;

        // Stops the reader between lines, never in the middle of a session
        // operation.
        let (stop_reading, mut stopped) = oneshot::channel::<()>();
        let reader_session = session.clone();
        let mut receive_task = tokio::spawn(async move {
            let mut lines = reader.lines();
            loop {
                let next = tokio::select! {
                    _ = &mut stopped => break,
                    next = lines.next_line() => next,
                };
                match next {
                    Ok(Some(line)) => {
                        if dispatch(&reader_session, connection_id, &line).await.is_break() {
                            break;
                        }
                    }
                    Ok(None) => break,
                    Err(e) => {
                        error!("Error reading from connection {}: {}", connection_id, e);
                        break;
                    }
                }
            }
        });

        tokio::select! {
            _ = &mut send_task => {
                info!("Send task completed for connection {}", connection_id);
                let _ = stop_reading.send(());
            }
            _ = &mut receive_task => {
                info!("Receive task completed for connection {}", connection_id);
            }
        }

        // Dropping the session's handle closes the outbound queue; the send
        // task then flushes what is left and shuts the socket down.
        session.remove_connection(connection_id).await;
        info!("Connection {} closed", connection_id);
    }
}

/// Reads the single `JOIN:<code>:<username>` line a new link must open with.
pub async fn read_handshake<R>(reader: &mut R) -> Result<JoinRequest, AppError>
where
    R: AsyncBufRead + Unpin,
{
    let mut line = String::new();
    if reader.read_line(&mut line).await? == 0 {
        return Err(ConnectionError::Closed.into());
    }
    Ok(JoinRequest::parse(&line)?)
}

/// Applies one client line to the session. Breaks when the client leaves.
pub async fn dispatch(session: &GameSession, from: Uuid, line: &str) -> ControlFlow<()> {
    match ClientMessage::parse(line) {
        Ok(ClientMessage::Chat { text }) => session.chat(from, &text).await,
        Ok(ClientMessage::Draw { payload }) => session.handle_draw(from, &payload).await,
        Ok(ClientMessage::Guess { text }) => session.check_guess(from, &text).await,
        Ok(ClientMessage::Leave) => {
            debug!("Connection {} sent LEAVE", from);
            return ControlFlow::Break(());
        }
        Err(e) => {
            warn!("Ignoring line from connection {}: {}", from, e);
        }
    }
    ControlFlow::Continue(())
}
