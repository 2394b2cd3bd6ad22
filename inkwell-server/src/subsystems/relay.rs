//! Chat relay subsystem: one task owns every open connection.
//!
//! Connections talk to the relay through a [`RelayHandle`]. Events are handled
//! one at a time in arrival order, and each connection gets its own unbounded
//! outbound queue, so a client sees frames in the order the relay sent them.
//!
//! Delivery scope:
//! - `global`: every chat message goes to every open connection, sender included
//! - `room`: only to connections that joined the message's room, plus the sender

use std::collections::HashMap;

use chrono::Utc;
use inkwell_core::config::{RelayConfig, RelayScope};
use inkwell_core::protocol::{ClientMessage, ServerMessage, PROCESSING_FAILED};
use thiserror::Error;
use tokio::sync::{broadcast, mpsc};
use tokio::task::JoinHandle;
use uuid::Uuid;

pub type ConnectionId = Uuid;

#[derive(Error, Debug, PartialEq, Eq)]
pub enum RelayError {
    #[error("Relay is not running")]
    Closed,
}

enum RelayEvent {
    Join {
        id: ConnectionId,
        room: Option<String>,
        outbound: mpsc::UnboundedSender<ServerMessage>,
    },
    Inbound {
        id: ConnectionId,
        text: String,
    },
    Leave {
        id: ConnectionId,
    },
}

/// Cloneable sender side of the relay inbox.
#[derive(Clone)]
pub struct RelayHandle {
    inbox: mpsc::Sender<RelayEvent>,
}

impl RelayHandle {
    /// Register a new connection. The receiver yields every frame addressed to it,
    /// starting with the greeting.
    pub async fn join(
        &self,
        room: Option<String>,
    ) -> Result<(ConnectionId, mpsc::UnboundedReceiver<ServerMessage>), RelayError> {
        let id = Uuid::new_v4();
        let (outbound, rx) = mpsc::unbounded_channel();
        self.inbox
            .send(RelayEvent::Join { id, room, outbound })
            .await
            .map_err(|_| RelayError::Closed)?;
        Ok((id, rx))
    }

    /// Hand a raw text frame from `id` to the relay.
    pub async fn send(&self, id: ConnectionId, text: impl Into<String>) -> Result<(), RelayError> {
        self.inbox
            .send(RelayEvent::Inbound { id, text: text.into() })
            .await
            .map_err(|_| RelayError::Closed)
    }

    pub async fn leave(&self, id: ConnectionId) {
        // A stopped relay has already forgotten every connection.
        let _ = self.inbox.send(RelayEvent::Leave { id }).await;
    }
}

struct Connection {
    room: Option<String>,
    outbound: mpsc::UnboundedSender<ServerMessage>,
}

/// Connection set and routing rules. Owned by the relay task.
pub struct RelayHub {
    scope: RelayScope,
    connections: HashMap<ConnectionId, Connection>,
}

impl RelayHub {
    pub fn new(scope: RelayScope) -> Self {
        Self {
            scope,
            connections: HashMap::new(),
        }
    }

    pub fn connection_count(&self) -> usize {
        self.connections.len()
    }

    fn join(&mut self, id: ConnectionId, room: Option<String>, outbound: mpsc::UnboundedSender<ServerMessage>) {
        tracing::info!(connection = %id, room = ?room, "Chat connection opened");
        let _ = outbound.send(ServerMessage::greeting());
        self.connections.insert(id, Connection { room, outbound });
    }

    fn leave(&mut self, id: ConnectionId) {
        if self.connections.remove(&id).is_some() {
            tracing::info!(connection = %id, "Chat connection closed");
        }
    }

    fn inbound(&mut self, id: ConnectionId, text: &str) {
        let Some(sender) = self.connections.get(&id) else {
            tracing::debug!(connection = %id, "Dropping frame from unknown connection");
            return;
        };

        let message = match ClientMessage::parse(text) {
            Ok(message) => message,
            Err(e) => {
                tracing::warn!(connection = %id, error = %e, "Rejecting malformed chat frame");
                let _ = sender.outbound.send(ServerMessage::error(PROCESSING_FAILED));
                return;
            }
        };

        let room = message.collaboration_id.clone().or_else(|| sender.room.clone());
        let frame = ServerMessage::from(message.into_chat(Utc::now()));

        let mut delivered = 0usize;
        let mut closed = Vec::new();
        for (conn_id, conn) in &self.connections {
            let in_scope = match self.scope {
                RelayScope::Global => true,
                RelayScope::Room => *conn_id == id || conn.room == room,
            };
            if !in_scope {
                continue;
            }
            match conn.outbound.send(frame.clone()) {
                Ok(()) => delivered += 1,
                Err(_) => closed.push(*conn_id),
            }
        }
        tracing::debug!(connection = %id, delivered, "Chat message relayed");

        // Writer task already gone; the Leave may still be in flight.
        for conn_id in closed {
            self.connections.remove(&conn_id);
            tracing::debug!(connection = %conn_id, "Pruned closed chat connection");
        }
    }

    fn handle(&mut self, event: RelayEvent) {
        match event {
            RelayEvent::Join { id, room, outbound } => self.join(id, room, outbound),
            RelayEvent::Inbound { id, text } => self.inbound(id, &text),
            RelayEvent::Leave { id } => self.leave(id),
        }
    }
}

/// Spawn the relay task. It stops on the shutdown signal or once every handle
/// is dropped.
pub fn spawn_relay(config: &RelayConfig, shutdown: broadcast::Receiver<()>) -> (RelayHandle, JoinHandle<()>) {
    let (tx, rx) = mpsc::channel(config.inbox_capacity.max(1));
    let hub = RelayHub::new(config.scope);
    let task = tokio::spawn(run_relay_loop(hub, rx, shutdown));
    (RelayHandle { inbox: tx }, task)
}

async fn run_relay_loop(
    mut hub: RelayHub,
    mut inbox: mpsc::Receiver<RelayEvent>,
    mut shutdown: broadcast::Receiver<()>,
) {
    tracing::info!(scope = ?hub.scope, "Chat relay started");

    loop {
        tokio::select! {
            event = inbox.recv() => match event {
                Some(event) => hub.handle(event),
                None => break,
            },
            _ = shutdown.recv() => {
                tracing::info!("Chat relay shutting down...");
                break;
            }
        }
    }

    tracing::info!(open = hub.connection_count(), "Chat relay stopped");
}

#[cfg(test)]
mod tests {
    use super::*;
    use inkwell_core::protocol::{FrameKind, GREETING};

    fn connect(hub: &mut RelayHub, room: Option<&str>) -> (ConnectionId, mpsc::UnboundedReceiver<ServerMessage>) {
        let id = Uuid::new_v4();
        let (tx, rx) = mpsc::unbounded_channel();
        hub.join(id, room.map(str::to_string), tx);
        (id, rx)
    }

    fn drain(rx: &mut mpsc::UnboundedReceiver<ServerMessage>) -> Vec<ServerMessage> {
        let mut frames = Vec::new();
        while let Ok(frame) = rx.try_recv() {
            frames.push(frame);
        }
        frames
    }

    // ========================================================================
    // TEST 1: Greeting goes to the joiner only
    // ========================================================================
    #[test]
    fn test_greeting_on_join() {
        let mut hub = RelayHub::new(RelayScope::Global);
        let (_a, mut rx_a) = connect(&mut hub, None);
        drain(&mut rx_a);
        let (_b, mut rx_b) = connect(&mut hub, None);

        let frames = drain(&mut rx_b);
        assert_eq!(frames.len(), 1);
        assert_eq!(frames[0].kind, FrameKind::System);
        assert_eq!(frames[0].message, GREETING);
        assert!(drain(&mut rx_a).is_empty(), "existing connections see nothing on join");
    }

    // ========================================================================
    // TEST 2: Global broadcast reaches everyone, sender included
    // ========================================================================
    #[test]
    fn test_global_broadcast_includes_sender() {
        let mut hub = RelayHub::new(RelayScope::Global);
        let (a, mut rx_a) = connect(&mut hub, None);
        let (_b, mut rx_b) = connect(&mut hub, None);
        drain(&mut rx_a);
        drain(&mut rx_b);

        hub.inbound(a, r#"{"message":"hi","user":"ana","collaborationId":"r1"}"#);

        for rx in [&mut rx_a, &mut rx_b] {
            let frames = drain(rx);
            assert_eq!(frames.len(), 1);
            assert_eq!(frames[0].kind, FrameKind::Message);
            assert_eq!(frames[0].user.as_deref(), Some("ana"));
            assert_eq!(frames[0].message, "hi");
            assert_eq!(frames[0].collaboration_id.as_deref(), Some("r1"));
        }
    }

    #[test]
    fn test_missing_user_relayed_as_anonymous() {
        let mut hub = RelayHub::new(RelayScope::Global);
        let (a, mut rx_a) = connect(&mut hub, None);
        drain(&mut rx_a);

        hub.inbound(a, r#"{"message":"who am i"}"#);
        let frames = drain(&mut rx_a);
        assert_eq!(frames[0].user.as_deref(), Some("Anonymous"));
    }

    // ========================================================================
    // TEST 3: Malformed frame answered to the sender only
    // ========================================================================
    #[test]
    fn test_malformed_frame_gets_single_error() {
        let mut hub = RelayHub::new(RelayScope::Global);
        let (a, mut rx_a) = connect(&mut hub, None);
        let (_b, mut rx_b) = connect(&mut hub, None);
        drain(&mut rx_a);
        drain(&mut rx_b);

        hub.inbound(a, "definitely not json");

        let frames = drain(&mut rx_a);
        assert_eq!(frames.len(), 1);
        assert_eq!(frames[0].kind, FrameKind::Error);
        assert_eq!(frames[0].message, PROCESSING_FAILED);
        assert!(drain(&mut rx_b).is_empty());
        assert_eq!(hub.connection_count(), 2, "connection stays open");
    }

    // ========================================================================
    // TEST 4: Departed connections receive nothing
    // ========================================================================
    #[test]
    fn test_left_connection_receives_nothing() {
        let mut hub = RelayHub::new(RelayScope::Global);
        let (a, mut rx_a) = connect(&mut hub, None);
        let (b, mut rx_b) = connect(&mut hub, None);
        drain(&mut rx_a);
        drain(&mut rx_b);

        hub.leave(b);
        hub.inbound(a, r#"{"message":"still here?"}"#);

        assert_eq!(drain(&mut rx_a).len(), 1);
        assert!(drain(&mut rx_b).is_empty());
        assert_eq!(hub.connection_count(), 1);

        // Leaving twice is harmless.
        hub.leave(b);
    }

    #[test]
    fn test_closed_receiver_does_not_disturb_others() {
        let mut hub = RelayHub::new(RelayScope::Global);
        let (a, mut rx_a) = connect(&mut hub, None);
        let (b, rx_b) = connect(&mut hub, None);
        drop(rx_b);
        drain(&mut rx_a);

        hub.inbound(a, r#"{"message":"hello"}"#);
        assert_eq!(drain(&mut rx_a).len(), 1);
        assert_eq!(hub.connection_count(), 1, "closed connection is pruned on delivery");

        // A late Leave for the pruned connection is harmless.
        hub.leave(b);
        assert_eq!(hub.connection_count(), 1);
    }

    // ========================================================================
    // TEST 5: Order preserved per connection
    // ========================================================================
    #[test]
    fn test_arrival_order_preserved() {
        let mut hub = RelayHub::new(RelayScope::Global);
        let (a, mut rx_a) = connect(&mut hub, None);
        let (b, mut rx_b) = connect(&mut hub, None);
        drain(&mut rx_a);
        drain(&mut rx_b);

        hub.inbound(a, r#"{"message":"one"}"#);
        hub.inbound(b, r#"{"message":"two"}"#);
        hub.inbound(a, r#"{"message":"three"}"#);

        for rx in [&mut rx_a, &mut rx_b] {
            let texts: Vec<String> = drain(rx).into_iter().map(|f| f.message).collect();
            assert_eq!(texts, vec!["one", "two", "three"]);
        }
    }

    // ========================================================================
    // TEST 6: Room scope
    // ========================================================================
    #[test]
    fn test_room_scope_stays_in_room() {
        let mut hub = RelayHub::new(RelayScope::Room);
        let (a, mut rx_a) = connect(&mut hub, Some("r1"));
        let (_b, mut rx_b) = connect(&mut hub, Some("r1"));
        let (_c, mut rx_c) = connect(&mut hub, Some("r2"));
        let (_d, mut rx_d) = connect(&mut hub, None);
        for rx in [&mut rx_a, &mut rx_b, &mut rx_c, &mut rx_d] {
            drain(rx);
        }

        hub.inbound(a, r#"{"message":"team only","collaborationId":"r1"}"#);

        assert_eq!(drain(&mut rx_a).len(), 1);
        assert_eq!(drain(&mut rx_b).len(), 1);
        assert!(drain(&mut rx_c).is_empty());
        assert!(drain(&mut rx_d).is_empty());
    }

    #[test]
    fn test_room_scope_falls_back_to_joined_room() {
        let mut hub = RelayHub::new(RelayScope::Room);
        let (a, mut rx_a) = connect(&mut hub, Some("r1"));
        let (_b, mut rx_b) = connect(&mut hub, Some("r1"));
        let (_c, mut rx_c) = connect(&mut hub, Some("r2"));
        for rx in [&mut rx_a, &mut rx_b, &mut rx_c] {
            drain(rx);
        }

        hub.inbound(a, r#"{"message":"no room field"}"#);

        assert_eq!(drain(&mut rx_b).len(), 1);
        assert!(drain(&mut rx_c).is_empty());
    }

    #[test]
    fn test_room_scope_sender_always_echoed() {
        let mut hub = RelayHub::new(RelayScope::Room);
        let (a, mut rx_a) = connect(&mut hub, None);
        let (_b, mut rx_b) = connect(&mut hub, Some("r9"));
        drain(&mut rx_a);
        drain(&mut rx_b);

        hub.inbound(a, r#"{"message":"cross-post","collaborationId":"r9"}"#);
        assert_eq!(drain(&mut rx_a).len(), 1);
        assert_eq!(drain(&mut rx_b).len(), 1);
    }

    // ========================================================================
    // TEST 7: Task plumbing
    // ========================================================================
    #[tokio::test]
    async fn test_handle_round_trip_through_task() {
        let (shutdown_tx, _) = broadcast::channel(1);
        let (relay, task) = spawn_relay(&RelayConfig::default(), shutdown_tx.subscribe());

        let (a, mut rx_a) = relay.join(None).await.unwrap();
        let (_b, mut rx_b) = relay.join(None).await.unwrap();
        assert_eq!(rx_a.recv().await.unwrap().message, GREETING);
        assert_eq!(rx_b.recv().await.unwrap().message, GREETING);

        relay.send(a, r#"{"message":"over the wire"}"#).await.unwrap();
        assert_eq!(rx_a.recv().await.unwrap().message, "over the wire");
        assert_eq!(rx_b.recv().await.unwrap().message, "over the wire");

        shutdown_tx.send(()).unwrap();
        task.await.unwrap();

        assert_eq!(relay.join(None).await.err(), Some(RelayError::Closed));
        // Outbound queues close with the relay.
        assert!(rx_a.recv().await.is_none());
    }
}
