//! Message-queue publisher interface plus an in-process realization over
//! `tokio::sync::mpsc`.

use anyhow::Result;
use async_trait::async_trait;
use serde_json::Value;
use tokio::sync::mpsc;

/// The two exchange/routing-key pairs consumed by external workers (§4.4,
/// §4.8).
pub const EXCHANGE_SESSION_MESSAGE: &str = "session.message";
pub const ROUTING_KEY_SESSION_MESSAGE_INSERT: &str = "session.message.insert";
pub const EXCHANGE_LEARNING_SKILL: &str = "learning.skill";
pub const ROUTING_KEY_LEARNING_SKILL_DISTILL: &str = "learning.skill.distill";

/// A published envelope, recorded verbatim by the in-process realization so
/// tests can assert on what would have gone out to a real broker.
#[derive(Debug, Clone)]
pub struct Envelope {
    pub exchange: String,
    pub routing_key: String,
    pub value: Value,
}

/// Every caller that needs to notify an external worker goes through this
/// trait. The broker itself is an external collaborator (§1); this crate
/// ships one self-contained realization.
#[async_trait]
pub trait Publisher: Send + Sync {
    async fn publish_json(&self, exchange: &str, routing_key: &str, value: Value) -> Result<()>;
}

/// In-process realization over an `mpsc` channel. `publish_json` never
/// blocks the caller on a full channel beyond the bounded capacity; callers
/// in the message/task pipelines treat publish failure as best-effort (logged,
/// never propagated) per §7.
pub struct EventBus {
    tx: mpsc::Sender<Envelope>,
    rx: mpsc::Receiver<Envelope>,
}

impl EventBus {
    pub fn new(capacity: usize) -> Self {
        let (tx, rx) = mpsc::channel(capacity);
        Self { tx, rx }
    }

    /// A cloneable handle suitable for wiring into services that only need
    /// to publish, not drain.
    pub fn sender(&self) -> EventBusSender {
        EventBusSender { tx: self.tx.clone() }
    }

    pub async fn recv(&mut self) -> Option<Envelope> {
        self.rx.recv().await
    }
}

/// Cloneable publish-only handle backing the `Publisher` trait.
#[derive(Clone)]
pub struct EventBusSender {
    tx: mpsc::Sender<Envelope>,
}

#[async_trait]
impl Publisher for EventBusSender {
    async fn publish_json(&self, exchange: &str, routing_key: &str, value: Value) -> Result<()> {
        let envelope = Envelope {
            exchange: exchange.to_string(),
            routing_key: routing_key.to_string(),
            value,
        };
        self.tx
            .send(envelope)
            .await
            .map_err(|_| anyhow::anyhow!("event bus receiver dropped"))?;
        tracing::debug!(exchange, routing_key, "published event");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn publish_then_recv_round_trips() {
        let mut bus = EventBus::new(8);
        let sender = bus.sender();
        sender
            .publish_json(
                EXCHANGE_SESSION_MESSAGE,
                ROUTING_KEY_SESSION_MESSAGE_INSERT,
                serde_json::json!({"project_id": "p1", "session_id": "s1", "message_id": "m1"}),
            )
            .await
            .unwrap();

        let envelope = bus.recv().await.unwrap();
        assert_eq!(envelope.exchange, EXCHANGE_SESSION_MESSAGE);
        assert_eq!(envelope.routing_key, ROUTING_KEY_SESSION_MESSAGE_INSERT);
        assert_eq!(envelope.value["session_id"], "s1");
    }

    #[tokio::test]
    async fn publish_after_receiver_dropped_fails() {
        let bus = EventBus::new(1);
        let sender = bus.sender();
        drop(bus);
        let err = sender
            .publish_json(EXCHANGE_LEARNING_SKILL, ROUTING_KEY_LEARNING_SKILL_DISTILL, Value::Null)
            .await
            .unwrap_err();
        assert!(err.to_string().contains("receiver dropped"));
    }

    #[tokio::test]
    async fn multiple_publishes_preserve_order() {
        let mut bus = EventBus::new(8);
        let sender = bus.sender();
        for i in 0..3 {
            sender
                .publish_json("x", "y", serde_json::json!({"i": i}))
                .await
                .unwrap();
        }
        for i in 0..3 {
            let envelope = bus.recv().await.unwrap();
            assert_eq!(envelope.value["i"], i);
        }
    }
}
