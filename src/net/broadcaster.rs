use std::sync::Arc;
use tracing::{debug, warn};
use uuid::Uuid;

use crate::error::ConnectionError;
use crate::net::Connection;
use crate::protocol::ServerMessage;

/// Ordered membership of one game session and the fan-out over it.
///
/// Join order is preserved; the earliest member is the one promoted when the
/// drawer leaves. Sends are queued on each connection's outbound channel and
/// never block, so callers may hold the session lock while broadcasting.
#[derive(Debug, Default)]
pub struct Broadcaster {
    connections: Vec<Arc<Connection>>,
}

impl Broadcaster {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&mut self, conn: Arc<Connection>) {
        debug!("Added connection {} ({})", conn.id(), conn.username());
        self.connections.push(conn);
    }

    pub fn remove(&mut self, id: &Uuid) -> Option<Arc<Connection>> {
        let index = self.connections.iter().position(|c| c.id() == *id)?;
        let conn = self.connections.remove(index);
        debug!("Removed connection {} ({})", conn.id(), conn.username());
        Some(conn)
    }

    pub fn get(&self, id: &Uuid) -> Option<&Arc<Connection>> {
        self.connections.iter().find(|c| c.id() == *id)
    }

    pub fn first(&self) -> Option<&Arc<Connection>> {
        self.connections.first()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Arc<Connection>> {
        self.connections.iter()
    }

    pub fn len(&self) -> usize {
        self.connections.len()
    }

    pub fn is_empty(&self) -> bool {
        self.connections.is_empty()
    }

    pub fn usernames(&self) -> Vec<String> {
        self.connections
            .iter()
            .map(|c| c.username().to_string())
            .collect()
    }

    /// Sends to every member. Returns the ids whose outbound queue is gone.
    pub fn broadcast(&self, msg: &ServerMessage) -> Vec<Uuid> {
        self.fan_out(msg, None)
    }

    /// Sends to every member except `exclude`.
    pub fn broadcast_except(&self, exclude: &Uuid, msg: &ServerMessage) -> Vec<Uuid> {
        self.fan_out(msg, Some(exclude))
    }

    pub fn send_to(&self, id: &Uuid, msg: &ServerMessage) -> Result<(), ConnectionError> {
        let conn = self.get(id).ok_or(ConnectionError::Closed)?;
        conn.send(msg).map_err(|e| {
            warn!("Failed to send to connection {} ({}): {}", conn.id(), conn.username(), e);
            e
        })
    }

    fn fan_out(&self, msg: &ServerMessage, exclude: Option<&Uuid>) -> Vec<Uuid> {
        let line = msg.to_string();
        let mut dead = Vec::new();

        for conn in &self.connections {
            if exclude == Some(&conn.id()) {
                continue;
            }
            if let Err(e) = conn.send_line(line.clone()) {
                warn!(
                    "Failed to broadcast to connection {} ({}): {}",
                    conn.id(),
                    conn.username(),
                    e
                );
                dead.push(conn.id());
            }
        }

        dead
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::protocol::Role;

    #[tokio::test]
    async fn test_broadcast_reaches_everyone() {
        let mut members = Broadcaster::new();
        let (a, mut rx_a) = Connection::channel("A");
        let (b, mut rx_b) = Connection::channel("B");
        members.add(a);
        members.add(b);

        let dead = members.broadcast(&ServerMessage::RoundStart);
        assert!(dead.is_empty());
        assert_eq!(rx_a.try_recv().unwrap(), "ROUND_START");
        assert_eq!(rx_b.try_recv().unwrap(), "ROUND_START");
        assert_eq!(members.usernames(), vec!["A", "B"]);
    }

    #[tokio::test]
    async fn test_broadcast_except_skips_origin() {
        let mut members = Broadcaster::new();
        let (a, mut rx_a) = Connection::channel("A");
        let (b, mut rx_b) = Connection::channel("B");
        let (c, mut rx_c) = Connection::channel("C");
        let origin = a.id();
        members.add(a);
        members.add(b);
        members.add(c);

        members.broadcast_except(
            &origin,
            &ServerMessage::Draw {
                username: "A".into(),
                payload: "1:2:true:false:#ff0000".into(),
            },
        );

        assert!(rx_a.try_recv().is_err());
        assert_eq!(rx_b.try_recv().unwrap(), "DRAW:A:1:2:true:false:#ff0000");
        assert_eq!(rx_c.try_recv().unwrap(), "DRAW:A:1:2:true:false:#ff0000");
        assert!(rx_b.try_recv().is_err());
    }

    #[tokio::test]
    async fn test_dead_member_does_not_block_others() {
        let mut members = Broadcaster::new();
        let (a, rx_a) = Connection::channel("A");
        let (b, mut rx_b) = Connection::channel("B");
        let dead_id = a.id();
        members.add(a);
        members.add(b);
        drop(rx_a);

        let dead = members.broadcast(&ServerMessage::Time(30));
        assert_eq!(dead, vec![dead_id]);
        assert_eq!(rx_b.try_recv().unwrap(), "TIME:30");
    }

    #[tokio::test]
    async fn test_membership_order_and_private_send() {
        let mut members = Broadcaster::new();
        let (a, mut rx_a) = Connection::channel("A");
        let (b, mut rx_b) = Connection::channel("B");
        let a_id = a.id();
        let b_id = b.id();
        members.add(a);
        members.add(b);

        members.send_to(&b_id, &ServerMessage::Role(Role::Guesser)).unwrap();
        assert_eq!(rx_b.try_recv().unwrap(), "ROLE:GUESSER");
        assert!(rx_a.try_recv().is_err());

        assert!(members.remove(&a_id).is_some());
        assert!(members.remove(&a_id).is_none());
        assert_eq!(members.first().map(|c| c.id()), Some(b_id));
        assert_eq!(members.len(), 1);
        assert!(members.send_to(&a_id, &ServerMessage::RoundStart).is_err());
    }
}
