use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::RwLock;

use crate::domain::{Interface, InterfaceIdentifier};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Topic {
    InterfaceCreated,
    InterfaceUpdated,
    InterfaceDeleted,
    PeerInterfaceUpdated,
}

/// Lifecycle notification, the payload type is fixed per topic.
#[derive(Debug, Clone)]
pub enum Event {
    InterfaceCreated(Interface),
    InterfaceUpdated(Interface),
    InterfaceDeleted(Interface),
    PeerInterfaceUpdated(InterfaceIdentifier),
}

impl Event {
    pub fn topic(&self) -> Topic {
        match self {
            Event::InterfaceCreated(_) => Topic::InterfaceCreated,
            Event::InterfaceUpdated(_) => Topic::InterfaceUpdated,
            Event::InterfaceDeleted(_) => Topic::InterfaceDeleted,
            Event::PeerInterfaceUpdated(_) => Topic::PeerInterfaceUpdated,
        }
    }
}

#[async_trait]
pub trait EventHandler: Send + Sync {
    async fn handle(&self, event: &Event);
}

#[async_trait]
pub trait EventBus: Send + Sync {
    async fn subscribe(&self, topic: Topic, handler: Arc<dyn EventHandler>);

    async fn publish(&self, event: Event);
}

type HandlerMap = HashMap<Topic, Vec<Arc<dyn EventHandler>>>;

/// In-process bus, handlers run one after another in subscription order.
#[derive(Default)]
pub struct LocalEventBus {
    handlers: RwLock<HandlerMap>,
}

impl LocalEventBus {
    pub fn new() -> Self {
        Self::default()
    }

    #[cfg(test)]
    pub async fn subscriber_count(&self, topic: Topic) -> usize {
        self.handlers.read().await.get(&topic).map_or(0, Vec::len)
    }
}

#[async_trait]
impl EventBus for LocalEventBus {
    async fn subscribe(&self, topic: Topic, handler: Arc<dyn EventHandler>) {
        let mut handlers = self.handlers.write().await;
        handlers.entry(topic).or_default().push(handler);
        tracing::debug!("Subscribed handler to {:?}", topic);
    }

    async fn publish(&self, event: Event) {
        let topic = event.topic();
        // snapshot so handlers may subscribe or publish themselves
        let subscribers = self.handlers.read().await.get(&topic).cloned().unwrap_or_default();

        tracing::debug!("Publishing {:?} to {} handlers", topic, subscribers.len());
        for handler in subscribers {
            handler.handle(&event).await;
        }
    }
}
