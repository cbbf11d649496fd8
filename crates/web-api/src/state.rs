use std::sync::Arc;

use application::{ChatBroadcaster, ChatService, PresenceTracker};

#[derive(Clone)]
pub struct AppState {
    pub chat_service: Arc<ChatService>,
    pub presence: Arc<PresenceTracker>,
    pub broadcaster: ChatBroadcaster,
    /// REST 与历史快照共用的查询条数上限。
    pub history_limit: u32,
}

impl AppState {
    pub fn new(
        chat_service: Arc<ChatService>,
        presence: Arc<PresenceTracker>,
        broadcaster: ChatBroadcaster,
        history_limit: u32,
    ) -> Self {
        Self {
            chat_service,
            presence,
            broadcaster,
            history_limit,
        }
    }
}
