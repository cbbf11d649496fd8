use async_trait::async_trait;
use domain::{Correction, Message, MessageDraft, MessageId, RepositoryError, Translation};

/// 消息存储适配器。
///
/// 摄取管线独占消息的写路径；持久化必须在返回前完成。
#[async_trait]
pub trait MessageRepository: Send + Sync {
    // 持久化草稿：由存储层分配消息标识与服务端时间戳，返回已存储的消息
    async fn save(&self, draft: MessageDraft) -> Result<Message, RepositoryError>;

    // 为已存储的消息追加插件产出（只追加，不改写正文）
    async fn append_enrichment(
        &self,
        id: MessageId,
        translations: &[Translation],
        corrections: &[Correction],
    ) -> Result<(), RepositoryError>;

    // 最近 limit 条消息：内部按时间倒序取出，反转为时间正序返回
    async fn list_recent(&self, limit: u32) -> Result<Vec<Message>, RepositoryError>;
}

/// 内存实现的消息存储（用于测试和无数据库的开发模式）
pub mod memory {
    use super::*;
    use std::sync::Arc;
    use tokio::sync::RwLock;

    use crate::clock::{Clock, SystemClock};

    pub struct InMemoryMessageStore {
        clock: Arc<dyn Clock>,
        messages: RwLock<Vec<Message>>,
    }

    impl Default for InMemoryMessageStore {
        fn default() -> Self {
            Self::new()
        }
    }

    impl InMemoryMessageStore {
        pub fn new() -> Self {
            Self::with_clock(Arc::new(SystemClock))
        }

        pub fn with_clock(clock: Arc<dyn Clock>) -> Self {
            Self {
                clock,
                messages: RwLock::new(Vec::new()),
            }
        }
    }

    #[async_trait]
    impl MessageRepository for InMemoryMessageStore {
        async fn save(&self, draft: MessageDraft) -> Result<Message, RepositoryError> {
            let message = Message::from_draft(MessageId::generate(), draft, self.clock.now());
            let mut messages = self.messages.write().await;
            messages.push(message.clone());
            Ok(message)
        }

        async fn append_enrichment(
            &self,
            id: MessageId,
            translations: &[Translation],
            corrections: &[Correction],
        ) -> Result<(), RepositoryError> {
            let mut messages = self.messages.write().await;
            let message = messages
                .iter_mut()
                .find(|message| message.id == id)
                .ok_or_else(|| RepositoryError::not_found(id.to_string()))?;

            for translation in translations {
                message.add_translation(translation.clone());
            }
            for correction in corrections {
                message.add_correction(correction.clone());
            }
            Ok(())
        }

        async fn list_recent(&self, limit: u32) -> Result<Vec<Message>, RepositoryError> {
            let messages = self.messages.read().await;
            // 插入顺序即时间顺序：从尾部取最新的 limit 条再反转
            let mut recent: Vec<Message> = messages
                .iter()
                .rev()
                .take(limit as usize)
                .cloned()
                .collect();
            recent.reverse();
            Ok(recent)
        }
    }

}
