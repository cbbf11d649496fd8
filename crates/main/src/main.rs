//! 主应用程序入口
//!
//! 启动 Axum Web API 服务。

use application::{
    create_pg_pool,
    services::{ChatService, ChatServiceDependencies},
    ChatBroadcaster, FallbackTranslator, HttpTranslationProvider, PgMessageStore,
    PresenceTracker, RuleGrammarChecker, SystemClock, TranslationService, TranslationSettings,
};
use config::AppConfig;
use std::{sync::Arc, time::Duration};
use tracing_subscriber::EnvFilter;
use web_api::{router, AppState};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // 初始化日志
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    // 加载并校验配置
    let config = AppConfig::from_env_with_defaults();
    config.validate()?;

    tracing::info!(
        "连接数据库: {}",
        config.database.url.split('@').last().unwrap_or("unknown")
    );

    let pg_pool = create_pg_pool(&config.database.url, config.database.max_connections).await?;

    // 运行迁移
    sqlx::migrate!("../../migrations").run(&pg_pool).await?;

    let message_repository = Arc::new(PgMessageStore::new(pg_pool));

    let broadcaster = ChatBroadcaster::with_capacity(config.broadcast.capacity);
    let presence = Arc::new(PresenceTracker::new(Arc::new(broadcaster.clone())));

    // 翻译服务：主提供方走 HTTP，失败或超时退回占位翻译
    let translation_service = Arc::new(TranslationService::with_settings(
        Arc::new(HttpTranslationProvider::new(
            config.translation.endpoint.clone(),
        )),
        Arc::new(FallbackTranslator),
        TranslationSettings {
            cache_ttl: Duration::from_secs(config.translation.cache_ttl_secs),
            rate_window: Duration::from_secs(config.translation.rate_window_secs),
            rate_max_requests: config.translation.rate_max_requests,
            provider_timeout: Duration::from_secs(config.translation.provider_timeout_secs),
        },
    ));

    if config.translation.target_languages.is_empty() {
        tracing::info!("未配置翻译目标语言，消息不做翻译富化");
    } else {
        tracing::info!(
            "翻译目标语言: {}",
            config.translation.target_languages.join(", ")
        );
    }

    // 创建应用层服务
    let chat_service = ChatService::new(ChatServiceDependencies {
        message_repository,
        grammar_checker: Arc::new(RuleGrammarChecker::default()),
        translation_service,
        clock: Arc::new(SystemClock::default()),
        broadcaster: broadcaster.clone(),
        target_languages: config.translation.target_languages.clone(),
    });

    // 创建应用状态
    let state = AppState::new(
        Arc::new(chat_service),
        presence,
        broadcaster,
        config.chat.history_limit,
    );

    // 启动 Web 服务器
    let app = router(state);
    let addr = format!("{}:{}", config.server.host, config.server.port);
    let listener = tokio::net::TcpListener::bind(&addr).await?;

    tracing::info!("聊天服务器启动在 http://{}", addr);
    axum::serve(listener, app).await?;

    Ok(())
}
