//! 消息实体定义
//!
//! 消息是系统中唯一持久化的会话单元。入站负载先经 [`MessageDraft::parse`]
//! 校验与归一化，持久化时由存储层分配标识和服务端时间戳。

use serde::{Deserialize, Serialize};

use crate::errors::{DomainError, DomainResult};
use crate::value_objects::{
    LanguageTag, MessageId, MessageText, SenderName, Timestamp, MAX_SENDER_CHARS, MAX_TEXT_CHARS,
};

/// 翻译附加记录，由翻译插件按序追加。
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Translation {
    pub language: String,
    pub text: String,
}

/// 语法纠正附加记录，由语法检查插件按序追加。
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Correction {
    pub original: String,
    pub corrected: String,
    pub explanation: String,
    pub timestamp: Timestamp,
}

/// 未持久化的消息草稿：已通过校验、已归一化，但还没有标识和时间戳。
#[derive(Debug, Clone, PartialEq)]
pub struct MessageDraft {
    pub text: MessageText,
    pub sender: SenderName,
    pub language: LanguageTag,
}

impl MessageDraft {
    /// 校验原始负载并归一化为草稿。
    ///
    /// 检查按固定顺序短路：text 非空、sender 非空、text 长度、sender 长度。
    /// 错误信息指明失败的字段，可直接回发给客户端。
    pub fn parse(
        text: impl Into<String>,
        sender: impl Into<String>,
        language: Option<String>,
    ) -> DomainResult<Self> {
        let text = text.into();
        let sender = sender.into();

        if text.trim().is_empty() {
            return Err(DomainError::validation_error("text", "cannot be empty"));
        }
        if sender.trim().is_empty() {
            return Err(DomainError::validation_error("sender", "cannot be empty"));
        }
        if text.trim().chars().count() > MAX_TEXT_CHARS {
            return Err(DomainError::validation_error(
                "text",
                format!("too long (max {} characters)", MAX_TEXT_CHARS),
            ));
        }
        if sender.trim().chars().count() > MAX_SENDER_CHARS {
            return Err(DomainError::validation_error(
                "sender",
                format!("too long (max {} characters)", MAX_SENDER_CHARS),
            ));
        }

        Ok(Self {
            text: MessageText::parse(text)?,
            sender: SenderName::parse(sender)?,
            language: LanguageTag::parse_or_default(language),
        })
    }
}

/// 消息实体
///
/// 广播之后不可变，仅 `translations` 和 `corrections` 两个序列允许追加，
/// 追加后不会被改写或重排。
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Message {
    pub id: MessageId,
    pub text: MessageText,
    pub sender: SenderName,
    pub language: LanguageTag,
    pub timestamp: Timestamp,
    pub translations: Vec<Translation>,
    pub corrections: Vec<Correction>,
}

impl Message {
    /// 由草稿构造消息，标识和时间戳由存储层在持久化时分配。
    pub fn from_draft(id: MessageId, draft: MessageDraft, timestamp: Timestamp) -> Self {
        Self {
            id,
            text: draft.text,
            sender: draft.sender,
            language: draft.language,
            timestamp,
            translations: Vec::new(),
            corrections: Vec::new(),
        }
    }

    /// 从存储记录还原消息（用于数据库加载）。
    pub fn with_parts(
        id: MessageId,
        text: MessageText,
        sender: SenderName,
        language: LanguageTag,
        timestamp: Timestamp,
        translations: Vec<Translation>,
        corrections: Vec<Correction>,
    ) -> Self {
        Self {
            id,
            text,
            sender,
            language,
            timestamp,
            translations,
            corrections,
        }
    }

    /// 追加一条翻译记录
    pub fn add_translation(&mut self, translation: Translation) {
        self.translations.push(translation);
    }

    /// 追加一条语法纠正记录
    pub fn add_correction(&mut self, correction: Correction) {
        self.corrections.push(correction);
    }

    /// 是否携带任何插件产出
    pub fn is_enriched(&self) -> bool {
        !self.translations.is_empty() || !self.corrections.is_empty()
    }
}
