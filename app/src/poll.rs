//! Single-flight conversation polling. Each issued refresh carries a
//! generation; a response is applied only while its generation is still
//! the latest, so a slow response can never overwrite a newer one.

use api_client::MarketplaceApi;
use sokoni_core::models::{Conversation, Message, MissionId};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tokio::sync::RwLock;
use tokio::time::{interval, Duration};

#[derive(Debug, Default)]
pub struct PollGate {
    generation: AtomicU64,
}

impl PollGate {
    pub fn new() -> Self {
        Self::default()
    }

    /// Start a refresh; the returned generation invalidates every earlier
    /// one still in flight.
    pub fn begin(&self) -> u64 {
        self.generation.fetch_add(1, Ordering::SeqCst) + 1
    }

    pub fn is_current(&self, generation: u64) -> bool {
        self.generation.load(Ordering::SeqCst) == generation
    }
}

/// Local message list for one mission's chat. Sends are appended only
/// after the server confirmed them; refreshes replace the whole list.
#[derive(Debug)]
pub struct ConversationView {
    pub mission_id: MissionId,
    pub messages: Vec<Message>,
}

impl ConversationView {
    pub fn new(mission_id: MissionId) -> Self {
        Self {
            mission_id,
            messages: Vec::new(),
        }
    }

    /// Returns false (and changes nothing) when the response is stale.
    pub fn apply_refresh(
        &mut self,
        gate: &PollGate,
        generation: u64,
        conversation: Conversation,
    ) -> bool {
        if !gate.is_current(generation) {
            tracing::debug!(
                mission_id = self.mission_id,
                generation,
                "stale poll response discarded"
            );
            return false;
        }
        self.messages = conversation.messages;
        true
    }

    pub fn append_confirmed(&mut self, message: Message) {
        self.messages.push(message);
    }
}

pub async fn refresh_once(
    api: &dyn MarketplaceApi,
    gate: &PollGate,
    view: &mut ConversationView,
) -> Result<bool, String> {
    let generation = gate.begin();
    let conversation = api
        .get_conversation(view.mission_id)
        .await
        .map_err(|e| e.user_message())?;
    Ok(view.apply_refresh(gate, generation, conversation))
}

/// Send a message; the local list grows only on a confirmed response.
pub async fn send_and_append(
    api: &dyn MarketplaceApi,
    view: &mut ConversationView,
    body: &str,
) -> Result<(), String> {
    let message = api
        .send_message(view.mission_id, body)
        .await
        .map_err(|e| e.user_message())?;
    view.append_confirmed(message);
    Ok(())
}

/// Fixed-interval refresh loop; spawn it alongside the chat view.
pub async fn run_poller(
    api: Arc<dyn MarketplaceApi>,
    gate: Arc<PollGate>,
    view: Arc<RwLock<ConversationView>>,
    interval_secs: u64,
) {
    let mut ticker = interval(Duration::from_secs(interval_secs.max(1)));
    loop {
        ticker.tick().await;
        let generation = gate.begin();
        let mission_id = view.read().await.mission_id;
        match api.get_conversation(mission_id).await {
            Ok(conversation) => {
                let mut guard = view.write().await;
                guard.apply_refresh(&gate, generation, conversation);
            }
            Err(err) => {
                tracing::warn!(mission_id, error = %err, "conversation refresh failed");
            }
        }
    }
}
