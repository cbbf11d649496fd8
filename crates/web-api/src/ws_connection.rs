use crate::state::AppState;
use crate::websocket::{ClientEvent, ServerEvent};
use application::dto::MessageDto;
use application::{ApplicationError, ChatEvent, SubmitMessageRequest};
use axum::extract::ws::{Message as WsMessage, WebSocket};
use domain::ConnectionId;
use futures_util::stream::SplitSink;
use futures_util::{SinkExt, StreamExt};
use tokio::sync::broadcast::error::RecvError;
use tokio::sync::mpsc;

/// WebSocket 连接管理器
///
/// 封装单个 WebSocket 连接的所有状态和逻辑，包括：
/// - 历史快照下发
/// - 客户端事件接收与校验
/// - 广播事件转发
/// - 在线状态清理
pub struct WebSocketConnection {
    socket: WebSocket,
    state: AppState,
    connection_id: ConnectionId,
}

impl WebSocketConnection {
    pub fn new(socket: WebSocket, state: AppState) -> Self {
        Self {
            socket,
            state,
            connection_id: ConnectionId::generate(),
        }
    }

    /// 运行 WebSocket 连接的主循环
    ///
    /// 这是连接的核心逻辑，处理：
    /// - 历史快照（先于任何实时事件）
    /// - 客户端消息接收
    /// - 广播消息转发
    /// - 连接生命周期管理
    pub async fn run(self) {
        let Self {
            socket,
            state,
            connection_id,
        } = self;

        tracing::info!(connection_id = %connection_id, "WebSocket 连接已建立");

        // 先订阅再查历史：查询期间落库的消息仍会通过广播到达，
        // 最坏情况是与快照重叠，不会丢失。
        let mut events = state.broadcaster.subscribe();

        let snapshot = match state.chat_service.history(state.history_limit).await {
            Ok(messages) => Some(ServerEvent::PreviousMessages {
                messages: messages.iter().map(MessageDto::from).collect(),
            }),
            Err(err) => {
                tracing::warn!(error = %err, "历史快照查询失败，本连接跳过 previousMessages");
                None
            }
        };

        let (mut sender, mut incoming) = socket.split();

        // 历史快照必须是本连接收到的第一个事件。
        if let Some(snapshot) = snapshot {
            if Self::send_event(&mut sender, &snapshot).await.is_err() {
                tracing::info!(connection_id = %connection_id, "连接在发送历史快照时断开");
                return;
            }
        }

        // 创建 mpsc channel 来解耦对 sender 的访问：
        // 接收任务产生的 error 事件与广播事件共用同一个写入口。
        let (cmd_tx, mut cmd_rx) = mpsc::channel::<ServerEvent>(32);

        // 发送任务：统一处理所有对 WebSocket sender 的写操作
        let send_task = tokio::spawn(async move {
            loop {
                tokio::select! {
                    maybe_cmd = cmd_rx.recv() => {
                        let Some(event) = maybe_cmd else { break };
                        if Self::send_event(&mut sender, &event).await.is_err() {
                            break;
                        }
                    }
                    received = events.recv() => {
                        match received {
                            Ok(event) => {
                                let outbound = match event {
                                    ChatEvent::NewMessage(message) => ServerEvent::NewMessage {
                                        message: MessageDto::from(&message),
                                    },
                                    ChatEvent::UserList(users) => ServerEvent::UserList { users },
                                };
                                if Self::send_event(&mut sender, &outbound).await.is_err() {
                                    break;
                                }
                            }
                            Err(RecvError::Lagged(skipped)) => {
                                tracing::warn!(skipped, "广播接收落后，跳过了部分事件");
                            }
                            Err(RecvError::Closed) => break,
                        }
                    }
                }
            }
            tracing::info!("WebSocket发送任务结束");
        });

        // 接收任务：处理来自WebSocket客户端的消息
        let recv_state = state.clone();
        let recv_task = tokio::spawn(async move {
            while let Some(Ok(frame)) = incoming.next().await {
                if (Self::handle_incoming(frame, &recv_state, connection_id, &cmd_tx).await)
                    .is_err()
                {
                    break;
                }
            }
            tracing::info!("WebSocket接收任务结束");
        });

        // 等待任意一个任务完成（连接断开）
        tokio::select! {
            _ = send_task => {
                tracing::info!("WebSocket发送任务完成");
            }
            _ = recv_task => {
                tracing::info!("WebSocket接收任务完成");
            }
        }

        // 连接断开时清理在线状态；没宣告过显示名的连接这里是空操作。
        state.presence.leave(connection_id).await;

        tracing::info!(connection_id = %connection_id, "WebSocket连接已断开，在线状态已清理");
    }

    /// 处理来自客户端的消息
    ///
    /// 包括：
    /// - 关闭消息处理
    /// - JSON 事件解析与分发
    /// - Ping/Pong 心跳（由底层自动回应）
    async fn handle_incoming(
        frame: WsMessage,
        state: &AppState,
        connection_id: ConnectionId,
        cmd_tx: &mpsc::Sender<ServerEvent>,
    ) -> Result<(), ()> {
        match frame {
            WsMessage::Text(raw) => {
                Self::handle_text(raw.as_str(), state, connection_id, cmd_tx).await
            }
            WsMessage::Close(_) => {
                tracing::info!("WebSocket收到关闭消息");
                Err(())
            }
            WsMessage::Ping(_) => {
                tracing::debug!("收到ping消息");
                Ok(())
            }
            WsMessage::Pong(_) => {
                tracing::debug!("收到pong消息");
                Ok(())
            }
            WsMessage::Binary(_) => {
                tracing::debug!("忽略二进制帧");
                Ok(())
            }
        }
    }

    async fn handle_text(
        raw: &str,
        state: &AppState,
        connection_id: ConnectionId,
        cmd_tx: &mpsc::Sender<ServerEvent>,
    ) -> Result<(), ()> {
        let event = match serde_json::from_str::<ClientEvent>(raw) {
            Ok(event) => event,
            Err(err) => {
                tracing::debug!(error = %err, "无法解析客户端事件");
                return Self::send_error(cmd_tx, "invalid message payload").await;
            }
        };

        match event {
            ClientEvent::SendMessage {
                text,
                sender,
                language,
            } => {
                let service = state.chat_service.clone();
                // 落库与富化放进独立任务：连接中途断开时任务继续跑完，
                // 已收到的消息不会半途丢弃。
                let submit = tokio::spawn(async move {
                    service
                        .submit_message(SubmitMessageRequest {
                            text,
                            sender,
                            language,
                        })
                        .await
                });
                // 等结果再读下一帧，同一连接的消息严格按接收顺序处理。
                match submit.await {
                    Ok(Ok(_)) => Ok(()),
                    Ok(Err(err)) => {
                        let message = match &err {
                            ApplicationError::Domain(domain_err) => domain_err.to_string(),
                            ApplicationError::Repository(_) => "failed to save message".to_owned(),
                        };
                        Self::send_error(cmd_tx, message).await
                    }
                    Err(err) => {
                        tracing::error!(error = %err, "消息处理任务异常退出");
                        Self::send_error(cmd_tx, "internal error").await
                    }
                }
            }
            ClientEvent::UserJoined { display_name } => {
                state.presence.join(connection_id, display_name).await;
                Ok(())
            }
        }
    }

    /// 错误事件只回给出错的连接本身，不进广播。
    async fn send_error(
        cmd_tx: &mpsc::Sender<ServerEvent>,
        message: impl Into<String>,
    ) -> Result<(), ()> {
        let event = ServerEvent::Error {
            message: message.into(),
        };
        if cmd_tx.send(event).await.is_err() {
            tracing::warn!("Failed to queue error event");
            return Err(());
        }
        Ok(())
    }

    async fn send_event(
        sender: &mut SplitSink<WebSocket, WsMessage>,
        event: &ServerEvent,
    ) -> Result<(), ()> {
        let payload = match serde_json::to_string(event) {
            Ok(json) => json,
            Err(err) => {
                tracing::warn!(error = %err, "failed to serialize websocket payload");
                return Ok(());
            }
        };
        if sender.send(WsMessage::Text(payload.into())).await.is_err() {
            tracing::warn!("Failed to send text message");
            return Err(());
        }
        Ok(())
    }
}
