//! WebSocket 线上协议
//!
//! 定义客户端与服务端之间的 JSON 事件格式。所有事件都带 `type` 标签，
//! 字段名统一用 camelCase，与前端约定保持一致。

use application::dto::MessageDto;
use serde::{Deserialize, Serialize};

/// 客户端发来的事件。
#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum ClientEvent {
    /// 提交一条聊天消息。
    SendMessage {
        text: String,
        sender: String,
        /// 缺省时按英文处理。
        #[serde(default)]
        language: Option<String>,
    },
    /// 宣告自己的显示名，加入在线列表。
    UserJoined {
        #[serde(rename = "displayName")]
        display_name: String,
    },
}

/// 服务端推送给客户端的事件。
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum ServerEvent {
    /// 连接建立后推送一次的历史快照，按时间从旧到新排列。
    PreviousMessages { messages: Vec<MessageDto> },
    /// 新落库的消息，推送给所有在线连接。
    NewMessage { message: MessageDto },
    /// 在线用户列表，成员变化时推送。
    UserList { users: Vec<String> },
    /// 只发给出错连接本身的错误说明。
    Error { message: String },
}
