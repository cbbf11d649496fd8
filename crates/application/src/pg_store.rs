//! Postgres 消息存储。
//!
//! 每条消息一行，插件产出存放在 jsonb 数组列中，追加通过 jsonb 拼接完成，
//! 不改写已有内容。

use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use domain::{
    Correction, LanguageTag, Message, MessageDraft, MessageId, MessageText, RepositoryError,
    SenderName, Translation,
};
use sqlx::{postgres::PgPoolOptions, FromRow, PgPool};
use uuid::Uuid;

use crate::clock::{Clock, SystemClock};
use crate::repository::MessageRepository;

fn map_sqlx_err(err: sqlx::Error) -> RepositoryError {
    RepositoryError::storage(err.to_string())
}

fn invalid_data(message: impl Into<String>) -> RepositoryError {
    RepositoryError::storage(message)
}

#[derive(Debug, FromRow)]
struct MessageRecord {
    id: Uuid,
    text: String,
    sender: String,
    language: String,
    timestamp: DateTime<Utc>,
    translations: serde_json::Value,
    corrections: serde_json::Value,
}

impl TryFrom<MessageRecord> for Message {
    type Error = RepositoryError;

    fn try_from(value: MessageRecord) -> Result<Self, Self::Error> {
        let text = MessageText::parse(value.text).map_err(|err| invalid_data(err.to_string()))?;
        let sender =
            SenderName::parse(value.sender).map_err(|err| invalid_data(err.to_string()))?;
        let translations: Vec<Translation> = serde_json::from_value(value.translations)
            .map_err(|err| invalid_data(err.to_string()))?;
        let corrections: Vec<Correction> = serde_json::from_value(value.corrections)
            .map_err(|err| invalid_data(err.to_string()))?;

        Ok(Message::with_parts(
            MessageId::from(value.id),
            text,
            sender,
            LanguageTag::parse(value.language),
            value.timestamp,
            translations,
            corrections,
        ))
    }
}

#[derive(Clone)]
pub struct PgMessageStore {
    pool: PgPool,
    clock: Arc<dyn Clock>,
}

impl PgMessageStore {
    pub fn new(pool: PgPool) -> Self {
        Self::with_clock(pool, Arc::new(SystemClock))
    }

    pub fn with_clock(pool: PgPool, clock: Arc<dyn Clock>) -> Self {
        Self { pool, clock }
    }
}

#[async_trait]
impl MessageRepository for PgMessageStore {
    async fn save(&self, draft: MessageDraft) -> Result<Message, RepositoryError> {
        let message = Message::from_draft(MessageId::generate(), draft, self.clock.now());

        let record = sqlx::query_as::<_, MessageRecord>(
            r#"
            INSERT INTO messages (id, text, sender, language, timestamp, translations, corrections)
            VALUES ($1, $2, $3, $4, $5, '[]'::jsonb, '[]'::jsonb)
            RETURNING id, text, sender, language, timestamp, translations, corrections
            "#,
        )
        .bind(Uuid::from(message.id))
        .bind(message.text.as_str())
        .bind(message.sender.as_str())
        .bind(message.language.as_str())
        .bind(message.timestamp)
        .fetch_one(&self.pool)
        .await
        .map_err(map_sqlx_err)?;

        Message::try_from(record)
    }

    async fn append_enrichment(
        &self,
        id: MessageId,
        translations: &[Translation],
        corrections: &[Correction],
    ) -> Result<(), RepositoryError> {
        let translations =
            serde_json::to_value(translations).map_err(|err| invalid_data(err.to_string()))?;
        let corrections =
            serde_json::to_value(corrections).map_err(|err| invalid_data(err.to_string()))?;

        let result = sqlx::query(
            r#"
            UPDATE messages
            SET translations = translations || $2::jsonb,
                corrections = corrections || $3::jsonb
            WHERE id = $1
            "#,
        )
        .bind(Uuid::from(id))
        .bind(translations)
        .bind(corrections)
        .execute(&self.pool)
        .await
        .map_err(map_sqlx_err)?;

        if result.rows_affected() == 0 {
            return Err(RepositoryError::not_found(id.to_string()));
        }
        Ok(())
    }

    async fn list_recent(&self, limit: u32) -> Result<Vec<Message>, RepositoryError> {
        let records = sqlx::query_as::<_, MessageRecord>(
            r#"
            SELECT id, text, sender, language, timestamp, translations, corrections
            FROM messages
            ORDER BY timestamp DESC
            LIMIT $1
            "#,
        )
        .bind(limit as i64)
        .fetch_all(&self.pool)
        .await
        .map_err(map_sqlx_err)?;

        let mut messages = records
            .into_iter()
            .map(Message::try_from)
            .collect::<Result<Vec<_>, _>>()?;
        // 倒序取出，反转为时间正序交给调用方
        messages.reverse();
        Ok(messages)
    }
}

pub async fn create_pg_pool(
    database_url: &str,
    max_connections: u32,
) -> Result<PgPool, sqlx::Error> {
    PgPoolOptions::new()
        .max_connections(max_connections)
        .connect(database_url)
        .await
}
