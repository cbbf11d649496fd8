use std::sync::Arc;

use domain::{Correction, Message, MessageDraft, Translation};

use crate::{
    broadcaster::{ChatBroadcaster, ChatEvent},
    clock::Clock,
    error::ApplicationError,
    grammar::GrammarChecker,
    repository::MessageRepository,
    translation::TranslationService,
};

#[derive(Debug, Clone)]
pub struct SubmitMessageRequest {
    pub text: String,
    pub sender: String,
    pub language: Option<String>,
}

pub struct ChatServiceDependencies {
    pub message_repository: Arc<dyn MessageRepository>,
    pub grammar_checker: Arc<dyn GrammarChecker>,
    pub translation_service: Arc<TranslationService>,
    pub clock: Arc<dyn Clock>,
    pub broadcaster: ChatBroadcaster,
    /// 富化阶段的翻译目标语言；为空则不做翻译
    pub target_languages: Vec<String>,
}

/// 消息接收管线：校验 → 落库 → 富化 → 广播。
pub struct ChatService {
    deps: ChatServiceDependencies,
}

impl ChatService {
    pub fn new(deps: ChatServiceDependencies) -> Self {
        Self { deps }
    }

    /// 处理一条客户端提交的消息。
    ///
    /// 校验或落库失败时返回错误，由调用方通知发送者本人；
    /// 富化（语法检查、翻译）失败只降级，不影响消息的落库与广播。
    pub async fn submit_message(
        &self,
        request: SubmitMessageRequest,
    ) -> Result<Message, ApplicationError> {
        let draft = MessageDraft::parse(request.text, request.sender, request.language)?;

        let mut message = match self.deps.message_repository.save(draft).await {
            Ok(message) => message,
            Err(err) => {
                tracing::error!(error = %err, "消息落库失败");
                return Err(err.into());
            }
        };

        // 广播顺序由落库完成顺序决定：先占好序号，富化期间后续消息不会插队
        let ticket = self.deps.broadcaster.claim();

        self.enrich(&mut message).await;

        if message.is_enriched() {
            if let Err(err) = self
                .deps
                .message_repository
                .append_enrichment(message.id, &message.translations, &message.corrections)
                .await
            {
                // 富化结果写回失败不影响已落库的消息本身
                tracing::warn!(message_id = %message.id, error = %err, "富化结果写回失败");
            }
        }

        ticket.publish(ChatEvent::NewMessage(message.clone()));
        Ok(message)
    }

    /// 查询最近的历史消息，按时间从旧到新排列。
    pub async fn history(&self, limit: u32) -> Result<Vec<Message>, ApplicationError> {
        match self.deps.message_repository.list_recent(limit).await {
            Ok(messages) => Ok(messages),
            Err(err) => {
                tracing::error!(error = %err, "查询历史消息失败");
                Err(err.into())
            }
        }
    }

    // 富化阶段：语法检查和翻译都是尽力而为，任何失败只记日志
    async fn enrich(&self, message: &mut Message) {
        let text = message.text.as_str().to_owned();
        let language = message.language.as_str().to_owned();
        let sender = message.sender.as_str().to_owned();

        match self.deps.grammar_checker.check(&text, &language).await {
            Ok(suggestions) => {
                let now = self.deps.clock.now();
                for suggestion in suggestions {
                    message.add_correction(Correction {
                        original: suggestion.original,
                        corrected: suggestion.corrected,
                        explanation: suggestion.explanation,
                        timestamp: now,
                    });
                }
            }
            Err(err) => {
                tracing::warn!(message_id = %message.id, error = %err, "语法检查失败，跳过");
            }
        }

        for target in &self.deps.target_languages {
            if target == &language {
                continue;
            }
            match self
                .deps
                .translation_service
                .translate(&text, target, &sender)
                .await
            {
                Ok(translated) => {
                    message.add_translation(Translation {
                        language: target.clone(),
                        text: translated.text,
                    });
                }
                Err(err) => {
                    tracing::warn!(
                        message_id = %message.id,
                        target_language = %target,
                        error = %err,
                        "翻译失败，跳过该语言"
                    );
                }
            }
        }
    }
}
