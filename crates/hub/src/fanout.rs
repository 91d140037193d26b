use std::collections::{HashMap, HashSet};

use serde::{Deserialize, Serialize};
use serde_json::Value;
use tokio::sync::RwLock;
use tokio::sync::mpsc::{self, UnboundedReceiver, UnboundedSender};
use tracing::{debug, warn};
use uuid::Uuid;

/// An event as delivered to a joined connection.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Envelope {
    pub topic: String,
    pub event: String,
    pub data: Value,
}

/// A live connection session. Dropping the handle (or its receiver) ends
/// the session; the hub notices on the next publish and forgets it.
#[derive(Debug)]
pub struct Connection {
    id: Uuid,
    receiver: UnboundedReceiver<Envelope>,
}

impl Connection {
    /// Stable id used for join/leave/disconnect calls.
    #[must_use]
    pub const fn id(&self) -> Uuid {
        self.id
    }

    /// Wait for the next event on any joined topic. Returns `None` once the
    /// hub has dropped this connection.
    pub async fn recv(&mut self) -> Option<Envelope> {
        self.receiver.recv().await
    }

    /// Non-blocking receive.
    pub fn try_recv(&mut self) -> Option<Envelope> {
        self.receiver.try_recv().ok()
    }
}

/// Transport fan-out over ephemeral topic membership. Not a durable queue:
/// membership lives exactly as long as the connection, and publishes reach
/// whoever is joined at that moment.
///
/// Constructed once at process start and passed by reference into whatever
/// publishes; there is deliberately no global instance.
#[derive(Debug, Default)]
pub struct Hub {
    connections: RwLock<HashMap<Uuid, UnboundedSender<Envelope>>>,
    topics: RwLock<HashMap<String, HashSet<Uuid>>>,
}

impl Hub {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Open a new connection session.
    pub async fn connect(&self) -> Connection {
        let (sender, receiver) = mpsc::unbounded_channel();
        let id = Uuid::new_v4();
        self.connections.write().await.insert(id, sender);
        debug!(connection_id = %id, "hub connection opened");
        Connection { id, receiver }
    }

    /// End a session, leaving every joined topic.
    pub async fn disconnect(&self, id: Uuid) {
        self.connections.write().await.remove(&id);
        let mut topics = self.topics.write().await;
        for members in topics.values_mut() {
            members.remove(&id);
        }
        topics.retain(|_, members| !members.is_empty());
        debug!(connection_id = %id, "hub connection closed");
    }

    /// Join a topic. Joining twice is a no-op; joining with an unknown
    /// connection id is dropped with a warning.
    pub async fn join(&self, id: Uuid, topic: &str) {
        if !self.connections.read().await.contains_key(&id) {
            warn!(connection_id = %id, topic = %topic, "join from unknown connection");
            return;
        }
        self.topics.write().await.entry(topic.to_string()).or_default().insert(id);
    }

    /// Leave a topic. Leaving a topic never joined is a no-op.
    pub async fn leave(&self, id: Uuid, topic: &str) {
        let mut topics = self.topics.write().await;
        if let Some(members) = topics.get_mut(topic) {
            members.remove(&id);
            if members.is_empty() {
                topics.remove(topic);
            }
        }
    }

    /// Deliver an event to every current member of a topic, best-effort.
    /// Members whose receiver has gone away are forgotten. Returns the
    /// number of members the event was handed to.
    pub async fn publish(&self, topic: &str, event: &str, data: Value) -> usize {
        let members: Vec<Uuid> = {
            let topics = self.topics.read().await;
            let Some(members) = topics.get(topic) else {
                return 0;
            };
            members.iter().copied().collect()
        };

        let envelope = Envelope { topic: topic.to_string(), event: event.to_string(), data };

        let mut delivered = 0;
        let mut dead: Vec<Uuid> = Vec::new();
        {
            let connections = self.connections.read().await;
            for id in members {
                match connections.get(&id) {
                    Some(sender) if sender.send(envelope.clone()).is_ok() => delivered += 1,
                    _ => dead.push(id),
                }
            }
        }

        for id in dead {
            self.disconnect(id).await;
        }

        delivered
    }

    /// Number of connections currently joined to a topic.
    pub async fn members_of(&self, topic: &str) -> usize {
        self.topics.read().await.get(topic).map_or(0, HashSet::len)
    }
}
