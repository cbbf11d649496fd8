//! 在线状态跟踪。
//!
//! 维护 `连接 -> 显示名` 的内存映射，由连接生命周期独占驱动：
//! `userJoined` 建立或覆盖条目，断开删除条目。每次状态变化都在持有
//! 写锁期间重新计算快照并广播，保证快照顺序与广播顺序一致。

use std::collections::{BTreeSet, HashMap};
use std::sync::Arc;

use domain::ConnectionId;
use tokio::sync::RwLock;

use crate::broadcaster::{ChatBroadcaster, ChatEvent};

pub struct PresenceTracker {
    broadcaster: Arc<ChatBroadcaster>,
    entries: RwLock<HashMap<ConnectionId, String>>,
}

impl PresenceTracker {
    pub fn new(broadcaster: Arc<ChatBroadcaster>) -> Self {
        Self {
            broadcaster,
            entries: RwLock::new(HashMap::new()),
        }
    }

    /// 连接报到。重复报到覆盖旧的显示名（幂等）。
    pub async fn join(&self, connection_id: ConnectionId, display_name: impl Into<String>) {
        let mut entries = self.entries.write().await;
        entries.insert(connection_id, display_name.into());
        self.publish_snapshot(&entries);
    }

    /// 连接离开。未知连接（例如重复断开事件）不产生任何变化。
    pub async fn leave(&self, connection_id: ConnectionId) {
        let mut entries = self.entries.write().await;
        if entries.remove(&connection_id).is_some() {
            self.publish_snapshot(&entries);
        }
    }

    /// 当前在线显示名集合（去重、字典序）。
    pub async fn current_users(&self) -> Vec<String> {
        let entries = self.entries.read().await;
        Self::snapshot(&entries)
    }

    fn snapshot(entries: &HashMap<ConnectionId, String>) -> Vec<String> {
        let names: BTreeSet<&String> = entries.values().collect();
        names.into_iter().cloned().collect()
    }

    fn publish_snapshot(&self, entries: &HashMap<ConnectionId, String>) {
        self.broadcaster
            .publish(ChatEvent::UserList(Self::snapshot(entries)));
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tracker() -> (PresenceTracker, Arc<ChatBroadcaster>) {
        let broadcaster = Arc::new(ChatBroadcaster::new());
        (PresenceTracker::new(Arc::clone(&broadcaster)), broadcaster)
    }

    #[tokio::test]
    async fn test_join_leave_sequence() {
        let (tracker, _broadcaster) = tracker();
        let c1 = ConnectionId::generate();
        let c2 = ConnectionId::generate();

        tracker.join(c1, "Alice").await;
        tracker.join(c2, "Bob").await;
        tracker.leave(c1).await;

        assert_eq!(tracker.current_users().await, vec!["Bob".to_string()]);
    }

    #[tokio::test]
    async fn test_rejoin_overwrites_name() {
        let (tracker, _broadcaster) = tracker();
        let c1 = ConnectionId::generate();

        tracker.join(c1, "Alice").await;
        tracker.join(c1, "Alicia").await;

        assert_eq!(tracker.current_users().await, vec!["Alicia".to_string()]);
    }

    #[tokio::test]
    async fn test_leave_unknown_connection_is_noop() {
        let (tracker, broadcaster) = tracker();
        let mut receiver = broadcaster.subscribe();

        tracker.leave(ConnectionId::generate()).await;

        // 未知连接离开不广播任何事件
        assert!(receiver.try_recv().is_err());
        assert!(tracker.current_users().await.is_empty());
    }

    #[tokio::test]
    async fn test_duplicate_display_names_deduplicated() {
        let (tracker, _broadcaster) = tracker();
        tracker.join(ConnectionId::generate(), "Bob").await;
        tracker.join(ConnectionId::generate(), "Bob").await;

        assert_eq!(tracker.current_users().await, vec!["Bob".to_string()]);
    }

    #[tokio::test]
    async fn test_state_change_broadcasts_user_list() {
        let (tracker, broadcaster) = tracker();
        let mut receiver = broadcaster.subscribe();
        let c1 = ConnectionId::generate();

        tracker.join(c1, "Alice").await;
        match receiver.recv().await.unwrap() {
            ChatEvent::UserList(users) => assert_eq!(users, vec!["Alice".to_string()]),
            other => panic!("unexpected event: {other:?}"),
        }

        tracker.leave(c1).await;
        match receiver.recv().await.unwrap() {
            ChatEvent::UserList(users) => assert!(users.is_empty()),
            other => panic!("unexpected event: {other:?}"),
        }
    }
}
