use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::io::{AsyncWrite, AsyncWriteExt, BufWriter};
use tokio::sync::mpsc;
use tracing::{debug, warn};
use uuid::Uuid;

use crate::error::ConnectionError;
use crate::protocol::ServerMessage;

/// One joined client.
///
/// Every outbound line goes through a single unbounded channel that is drained
/// by `write_loop`, so lines sent from broadcasts, private messages and draw
/// relays never interleave on the socket.
#[derive(Debug)]
pub struct Connection {
    id: Uuid,
    username: String,
    tx: mpsc::UnboundedSender<String>,
    alive: AtomicBool,
}

impl Connection {
    pub fn new(username: impl Into<String>, tx: mpsc::UnboundedSender<String>) -> Self {
        Self {
            id: Uuid::new_v4(),
            username: username.into(),
            tx,
            alive: AtomicBool::new(true),
        }
    }

    /// Creates a connection together with the receiving end of its outbound
    /// queue.
    pub fn channel(username: impl Into<String>) -> (Arc<Self>, mpsc::UnboundedReceiver<String>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Arc::new(Self::new(username, tx)), rx)
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn username(&self) -> &str {
        &self.username
    }

    pub fn is_alive(&self) -> bool {
        self.alive.load(Ordering::SeqCst)
    }

    pub fn mark_dead(&self) {
        if self.alive.swap(false, Ordering::SeqCst) {
            debug!("Connection {} ({}) marked dead", self.id, self.username);
        }
    }

    pub fn send(&self, msg: &ServerMessage) -> Result<(), ConnectionError> {
        self.send_line(msg.to_string())
    }

    pub fn send_line(&self, line: String) -> Result<(), ConnectionError> {
        if !self.is_alive() {
            return Err(ConnectionError::Closed);
        }
        self.tx.send(line).map_err(|_| {
            self.mark_dead();
            ConnectionError::Closed
        })
    }
}

/// Drains a connection's outbound queue into the socket, one line per
/// message. Returns when the queue closes or a write fails.
pub async fn write_loop<W>(
    mut rx: mpsc::UnboundedReceiver<String>,
    writer: W,
) -> Result<(), ConnectionError>
where
    W: AsyncWrite + Unpin,
{
    let mut writer = BufWriter::new(writer);

    while let Some(line) = rx.recv().await {
        writer.write_all(line.as_bytes()).await?;
        writer.write_all(b"\n").await?;
        writer.flush().await?;
    }

    if let Err(e) = writer.shutdown().await {
        warn!("Error shutting down writer: {}", e);
    }
    Ok(())
}
