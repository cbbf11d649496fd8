//! 应用层实现。
//!
//! 这里提供消息接收管线（校验 → 落库 → 富化 → 广播）的用例服务，
//! 以及广播通道、在线状态、语法检查和翻译等支撑组件。

pub mod broadcaster;
pub mod clock;
pub mod dto;
pub mod error;
pub mod grammar;
#[cfg(feature = "sqlx")]
pub mod pg_store;
pub mod presence;
pub mod repository;
pub mod services;
pub mod translation;

pub use broadcaster::{ChatBroadcaster, ChatEvent, CommitTicket};
pub use clock::{Clock, SystemClock};
pub use dto::{CorrectionDto, MessageDto, TranslationDto};
pub use error::ApplicationError;
pub use grammar::{CorrectionSuggestion, GrammarChecker, GrammarError, RuleGrammarChecker};
#[cfg(feature = "sqlx")]
pub use pg_store::{create_pg_pool, PgMessageStore};
pub use presence::PresenceTracker;
pub use repository::{memory::InMemoryMessageStore, MessageRepository};
pub use services::{ChatService, ChatServiceDependencies, SubmitMessageRequest};
pub use translation::{
    FallbackTranslator, HttpTranslationProvider, TranslatedText, TranslationError,
    TranslationProvider, TranslationService, TranslationSettings, TranslationSource,
    DEFAULT_REQUESTER, SUPPORTED_LANGUAGES,
};
