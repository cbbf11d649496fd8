use std::{net::SocketAddr, sync::Arc, time::Duration};

use application::{
    services::{ChatService, ChatServiceDependencies},
    ChatBroadcaster, FallbackTranslator, InMemoryMessageStore, MessageRepository,
    PresenceTracker, RuleGrammarChecker, SystemClock, TranslationService,
};
use axum::Router;
use tokio::{net::TcpListener, sync::oneshot, time::sleep};
use web_api::{router, AppState};

/// 纯内存的服务栈，测试不依赖外部数据库和翻译服务。
pub fn build_router() -> Router {
    build_router_with_store(Arc::new(InMemoryMessageStore::new()))
}

pub fn build_router_with_store(store: Arc<dyn MessageRepository>) -> Router {
    let broadcaster = ChatBroadcaster::new();
    let presence = Arc::new(PresenceTracker::new(Arc::new(broadcaster.clone())));

    let chat_service = ChatService::new(ChatServiceDependencies {
        message_repository: store,
        grammar_checker: Arc::new(RuleGrammarChecker::default()),
        translation_service: Arc::new(TranslationService::new(Arc::new(FallbackTranslator))),
        clock: Arc::new(SystemClock::default()),
        broadcaster: broadcaster.clone(),
        target_languages: Vec::new(),
    });

    let state = AppState::new(Arc::new(chat_service), presence, broadcaster, 50);

    router(state)
}

/// 在随机端口上启动服务，返回地址和关闭句柄。
pub async fn spawn_app() -> (SocketAddr, oneshot::Sender<()>) {
    let router = build_router();
    let listener = TcpListener::bind("127.0.0.1:0").await.expect("bind");
    let addr = listener.local_addr().expect("addr");
    let (shutdown_tx, shutdown_rx) = oneshot::channel::<()>();

    tokio::spawn(async move {
        axum::serve(listener, router.into_make_service())
            .with_graceful_shutdown(async {
                let _ = shutdown_rx.await;
            })
            .await
            .ok();
    });

    // allow server to start
    sleep(Duration::from_millis(100)).await;

    (addr, shutdown_tx)
}
