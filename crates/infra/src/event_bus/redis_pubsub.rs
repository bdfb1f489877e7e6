//! Redis pub/sub backplane (optional).
//!
//! Every instance publishes envelopes to one Redis channel and runs a single
//! listener thread that forwards what it hears into a local broadcast
//! channel. Publishing only enqueues the payload; a publisher thread owns the
//! outgoing connection, so request handlers never wait on Redis. Sockets subscribe to the local channel, so an envelope published
//! on any instance reaches sockets on all of them.
//!
//! Redis pub/sub is not durable: envelopes published while the listener is
//! reconnecting are lost. Clients re-fetch state after reconnecting.

use std::sync::mpsc;
use std::thread;
use std::time::Duration;

use redis::Commands;
use tokio::sync::broadcast;

use taskforge_events::{Backplane, BackplaneError, RoomEnvelope, Subscription};

pub const DEFAULT_CHANNEL: &str = "taskforge:realtime";

const RECONNECT_DELAY: Duration = Duration::from_secs(1);

#[derive(Debug, Clone)]
pub struct RedisBackplane {
    outgoing: mpsc::Sender<String>,
    local: broadcast::Sender<RoomEnvelope>,
}

impl RedisBackplane {
    /// Open the client and start the listener and publisher threads.
    ///
    /// Does not wait for Redis to be reachable; both threads reconnect on
    /// their own.
    pub fn connect(redis_url: impl AsRef<str>, channel: impl Into<String>) -> Result<Self, BackplaneError> {
        let client = redis::Client::open(redis_url.as_ref()).map_err(|e| BackplaneError::Transport(e.to_string()))?;
        let channel = channel.into();
        let (local, _rx) = broadcast::channel(taskforge_events::InMemoryBackplane::DEFAULT_CAPACITY);
        let (outgoing, queued) = mpsc::channel();

        spawn_listener(client.clone(), channel.clone(), local.clone());
        spawn_publisher(client, channel, queued);
        Ok(Self { outgoing, local })
    }
}

fn spawn_listener(client: redis::Client, channel: String, local: broadcast::Sender<RoomEnvelope>) {
    thread::spawn(move || {
        loop {
            if let Err(err) = listen(&client, &channel, &local) {
                tracing::warn!(error = %err, "redis backplane listener disconnected; retrying");
            }
            thread::sleep(RECONNECT_DELAY);
        }
    });
}

/// Drains queued payloads over one reused connection. Exits once every
/// `RedisBackplane` handle is dropped.
fn spawn_publisher(client: redis::Client, channel: String, queued: mpsc::Receiver<String>) {
    thread::spawn(move || {
        let mut conn: Option<redis::Connection> = None;
        for payload in queued {
            if conn.is_none() {
                conn = match client.get_connection_with_timeout(RECONNECT_DELAY) {
                    Ok(c) => Some(c),
                    Err(err) => {
                        tracing::warn!(error = %err, "redis backplane unavailable; dropping envelope");
                        continue;
                    }
                };
            }
            let Some(c) = conn.as_mut() else { continue };
            if let Err(err) = c.publish::<_, _, i64>(&channel, payload) {
                tracing::warn!(error = %err, "redis publish failed; reconnecting");
                conn = None;
            }
        }
    });
}

fn listen(
    client: &redis::Client,
    channel: &str,
    local: &broadcast::Sender<RoomEnvelope>,
) -> Result<(), redis::RedisError> {
    let mut conn = client.get_connection()?;
    let mut pubsub = conn.as_pubsub();
    pubsub.subscribe(channel)?;

    loop {
        let msg = pubsub.get_message()?;
        let payload: String = match msg.get_payload() {
            Ok(p) => p,
            Err(_) => continue,
        };
        match serde_json::from_str::<RoomEnvelope>(&payload) {
            // No local subscribers is not an error.
            Ok(envelope) => {
                let _ = local.send(envelope);
            }
            Err(err) => tracing::debug!(error = %err, "dropping malformed backplane payload"),
        }
    }
}

impl Backplane for RedisBackplane {
    fn publish(&self, envelope: RoomEnvelope) -> Result<(), BackplaneError> {
        let payload = serde_json::to_string(&envelope).map_err(|e| BackplaneError::Serialize(e.to_string()))?;
        self.outgoing
            .send(payload)
            .map_err(|_| BackplaneError::Transport("redis publisher stopped".into()))
    }

    fn subscribe(&self) -> Subscription {
        Subscription::new(self.local.subscribe())
    }
}
