use std::collections::HashMap;
use std::sync::Arc;

use tokio::sync::{
    mpsc::{unbounded_channel, UnboundedReceiver, UnboundedSender},
    RwLock,
};
use uuid::Uuid;

/// One named SSE event ready for the wire.
#[derive(Debug, Clone)]
pub struct StreamEnvelope {
    pub event: &'static str,
    pub data: String,
}

/// Per-user SSE subscriber lists. A user may hold several open streams
/// (multiple tabs); each gets every event addressed to that user.
#[derive(Default, Clone)]
pub struct StreamRegistry {
    inner: Arc<RwLock<HashMap<Uuid, Vec<UnboundedSender<StreamEnvelope>>>>>,
}

impl StreamRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn subscribe(&self, user_id: Uuid) -> UnboundedReceiver<StreamEnvelope> {
        let (tx, rx) = unbounded_channel();
        let mut guard = self.inner.write().await;
        guard.entry(user_id).or_default().push(tx);
        rx
    }

    /// Send to every open stream for the user, dropping closed ones.
    pub async fn send(&self, user_id: Uuid, event: &'static str, data: String) {
        let mut guard = self.inner.write().await;
        if let Some(list) = guard.get_mut(&user_id) {
            list.retain(|sender| {
                sender
                    .send(StreamEnvelope {
                        event,
                        data: data.clone(),
                    })
                    .is_ok()
            });
            if list.is_empty() {
                guard.remove(&user_id);
            }
        }
    }
}
