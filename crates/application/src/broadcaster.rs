//! 广播通道与提交门。
//!
//! 所有连接共享同一个广播域。消息在持久化完成后立即认领一个广播槽位，
//! 事件严格按槽位顺序放行，因此全局广播顺序等于提交（持久化完成）顺序，
//! 与各连接的提交到达顺序无关。

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, PoisonError};

use domain::Message;
use tokio::sync::broadcast;

/// 默认通道容量。
const DEFAULT_CAPACITY: usize = 1000;

/// 广播给所有已连接客户端的事件。
#[derive(Debug, Clone)]
pub enum ChatEvent {
    /// 新消息已持久化（可能附带插件产出）
    NewMessage(Message),
    /// 在线用户列表发生变化
    UserList(Vec<String>),
}

struct GateState {
    next_release: u64,
    /// 已认领但尚未放行的槽位；`None` 表示槽位被放弃（持有者中途退出）。
    pending: BTreeMap<u64, Option<ChatEvent>>,
}

struct Shared {
    sender: broadcast::Sender<ChatEvent>,
    state: Mutex<GateState>,
}

impl Shared {
    fn release(&self, seq: u64, event: Option<ChatEvent>) {
        let mut guard = self.state.lock().unwrap_or_else(PoisonError::into_inner);
        // 守卫不能按字段拆分借用，先整体重借一次
        let state = &mut *guard;
        state.pending.insert(seq, event);
        while let Some(slot) = state.pending.remove(&state.next_release) {
            state.next_release += 1;
            if let Some(event) = slot {
                // 没有任何订阅者时发送会失败，这是正常情况（例如纯 REST 访问）
                let _ = self.sender.send(event);
            }
        }
    }
}

/// 已认领的广播槽位。
///
/// 调用 [`CommitTicket::publish`] 放行事件；若中途被丢弃，
/// 槽位自动跳过，不会堵住后续事件。
pub struct CommitTicket {
    seq: u64,
    shared: Arc<Shared>,
    released: bool,
}

impl CommitTicket {
    /// 按认领顺序放行事件。前面还有未放行的槽位时事件先入队等待。
    pub fn publish(mut self, event: ChatEvent) {
        self.released = true;
        self.shared.release(self.seq, Some(event));
    }
}

impl Drop for CommitTicket {
    fn drop(&mut self) {
        if !self.released {
            self.shared.release(self.seq, None);
        }
    }
}

/// 单广播域的事件分发器。
#[derive(Clone)]
pub struct ChatBroadcaster {
    shared: Arc<Shared>,
    next_claim: Arc<AtomicU64>,
}

impl ChatBroadcaster {
    pub fn new() -> Self {
        Self::with_capacity(DEFAULT_CAPACITY)
    }

    pub fn with_capacity(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity);
        Self {
            shared: Arc::new(Shared {
                sender,
                state: Mutex::new(GateState {
                    next_release: 0,
                    pending: BTreeMap::new(),
                }),
            }),
            next_claim: Arc::new(AtomicU64::new(0)),
        }
    }

    /// 认领下一个广播槽位。调用时刻决定该事件在全局顺序中的位置。
    pub fn claim(&self) -> CommitTicket {
        let seq = self.next_claim.fetch_add(1, Ordering::SeqCst);
        CommitTicket {
            seq,
            shared: Arc::clone(&self.shared),
            released: false,
        }
    }

    /// 认领并立即放行（用于在线列表这类即时事件）。
    pub fn publish(&self, event: ChatEvent) {
        self.claim().publish(event);
    }

    pub fn subscribe(&self) -> broadcast::Receiver<ChatEvent> {
        self.shared.sender.subscribe()
    }
}

impl Default for ChatBroadcaster {
    fn default() -> Self {
        Self::new()
    }
}
