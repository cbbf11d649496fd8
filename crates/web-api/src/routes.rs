use axum::{
    extract::{ws::WebSocketUpgrade, State},
    response::Response,
    routing::get,
    Json, Router,
};
use tower_http::{cors::CorsLayer, trace::TraceLayer};

use application::dto::MessageDto;

use crate::{error::ApiError, state::AppState, ws_connection::WebSocketConnection};

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/", get(banner))
        .route("/messages", get(list_messages))
        .route("/ws", get(websocket_upgrade))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}

/// 根路径横幅，前端用它探测服务是否存活。
async fn banner() -> &'static str {
    "Language Learning Chatbot API"
}

/// 最近消息，按时间从旧到新排列，与历史快照同一条查询路径。
async fn list_messages(State(state): State<AppState>) -> Result<Json<Vec<MessageDto>>, ApiError> {
    let messages = state.chat_service.history(state.history_limit).await?;

    Ok(Json(messages.iter().map(MessageDto::from).collect()))
}

async fn websocket_upgrade(State(state): State<AppState>, ws: WebSocketUpgrade) -> Response {
    ws.on_upgrade(move |socket| WebSocketConnection::new(socket, state).run())
}
