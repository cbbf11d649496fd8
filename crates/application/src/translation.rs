//! 翻译服务。
//!
//! 两段式流水线：先尝试主翻译提供方（HTTP），失败或超时后降级到
//! 本地兜底翻译器。每个结果都带来源标记（Primary / Fallback），
//! 只有主翻译结果会写入缓存。
//!
//! 请求顺序约定：缓存命中不消耗限流配额，因此先查缓存再过限流器。

use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, PoisonError, RwLock};
use std::time::{Duration, Instant};

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// 支持的目标语言。
pub const SUPPORTED_LANGUAGES: [&str; 9] =
    ["en", "es", "fr", "de", "it", "pt", "ru", "zh", "ja"];

/// 未标识请求方时使用的限流键。
pub const DEFAULT_REQUESTER: &str = "anonymous";

#[derive(Debug, Error)]
pub enum TranslationError {
    /// 输入不是可翻译的文本（空文本）
    #[error("invalid text input")]
    InvalidInput,

    /// 目标语言不在支持列表内
    #[error("unsupported target language: {language}")]
    UnsupportedLanguage { language: String },

    /// 请求方在时间窗口内的配额已用完
    #[error("rate limit exceeded for {requester}")]
    RateLimited { requester: String },

    /// 翻译提供方调用失败
    #[error("translation provider failed: {message}")]
    Provider { message: String },
}

impl TranslationError {
    pub fn unsupported(language: impl Into<String>) -> Self {
        Self::UnsupportedLanguage {
            language: language.into(),
        }
    }

    pub fn rate_limited(requester: impl Into<String>) -> Self {
        Self::RateLimited {
            requester: requester.into(),
        }
    }

    pub fn provider(message: impl Into<String>) -> Self {
        Self::Provider {
            message: message.into(),
        }
    }
}

/// 翻译结果的来源。
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TranslationSource {
    /// 主翻译提供方的结果，可缓存
    Primary,
    /// 兜底翻译器的结果，不缓存
    Fallback,
}

/// 带来源标记的翻译结果。
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TranslatedText {
    pub text: String,
    pub source: TranslationSource,
}

/// 翻译提供方抽象。主提供方和兜底翻译器都实现这个 trait。
#[async_trait]
pub trait TranslationProvider: Send + Sync {
    async fn translate(
        &self,
        text: &str,
        target_language: &str,
    ) -> Result<String, TranslationError>;
}

#[derive(Debug, Serialize)]
struct TranslateRequest<'a> {
    q: &'a str,
    source: &'a str,
    target: &'a str,
    format: &'a str,
}

#[derive(Debug, Deserialize)]
struct TranslateResponse {
    #[serde(rename = "translatedText")]
    translated_text: String,
}

/// 调用 LibreTranslate 风格 HTTP 接口的主翻译提供方。
pub struct HttpTranslationProvider {
    client: reqwest::Client,
    endpoint: String,
}

impl HttpTranslationProvider {
    pub fn new(endpoint: impl Into<String>) -> Self {
        Self {
            client: reqwest::Client::new(),
            endpoint: endpoint.into(),
        }
    }
}

#[async_trait]
impl TranslationProvider for HttpTranslationProvider {
    async fn translate(
        &self,
        text: &str,
        target_language: &str,
    ) -> Result<String, TranslationError> {
        let request = TranslateRequest {
            q: text,
            source: "auto",
            target: target_language,
            format: "text",
        };

        let response = self
            .client
            .post(&self.endpoint)
            .json(&request)
            .send()
            .await
            .map_err(|e| TranslationError::provider(e.to_string()))?
            .error_for_status()
            .map_err(|e| TranslationError::provider(e.to_string()))?;

        let body: TranslateResponse = response
            .json()
            .await
            .map_err(|e| TranslationError::provider(e.to_string()))?;

        Ok(body.translated_text)
    }
}

/// 兜底翻译器：不做真正的翻译，只给原文打上降级标记。
#[derive(Debug, Default)]
pub struct FallbackTranslator;

#[async_trait]
impl TranslationProvider for FallbackTranslator {
    async fn translate(
        &self,
        text: &str,
        _target_language: &str,
    ) -> Result<String, TranslationError> {
        Ok(format!("[FALLBACK] {text}"))
    }
}

/// 按（正文, 目标语言）键缓存主翻译结果。
///
/// 读命中时惰性过期；聊天正文大多只出现一次，等不到同键的二次查询，
/// 所以写入时顺手清掉全部过期条目（防止内存泄漏）。
pub struct TranslationCache {
    /// 条目存活时间
    ttl: Duration,
    entries: RwLock<HashMap<(String, String), CacheEntry>>,
}

struct CacheEntry {
    text: String,
    inserted_at: Instant,
}

impl TranslationCache {
    pub fn new(ttl: Duration) -> Self {
        Self {
            ttl,
            entries: RwLock::new(HashMap::new()),
        }
    }

    pub fn get(&self, text: &str, target_language: &str) -> Option<String> {
        let mut entries = self
            .entries
            .write()
            .unwrap_or_else(PoisonError::into_inner);
        let key = (text.to_owned(), target_language.to_owned());

        match entries.get(&key) {
            Some(entry) if entry.inserted_at.elapsed() < self.ttl => Some(entry.text.clone()),
            Some(_) => {
                // 已过期，顺手移除
                entries.remove(&key);
                None
            }
            None => None,
        }
    }

    pub fn insert(&self, text: &str, target_language: &str, translated: &str) {
        let mut entries = self
            .entries
            .write()
            .unwrap_or_else(PoisonError::into_inner);
        entries.retain(|_, entry| entry.inserted_at.elapsed() < self.ttl);
        entries.insert(
            (text.to_owned(), target_language.to_owned()),
            CacheEntry {
                text: translated.to_owned(),
                inserted_at: Instant::now(),
            },
        );
    }
}

/// 按请求方维护时间戳队列的滑动窗口限流器。
///
/// 请求方键由客户端自报，所以每次检查先整体清掉窗口已完全滑过的
/// 请求方（防止映射无限增长），再弹出当前请求方窗口外的旧时间戳。
/// 被拒绝的请求不记录时间戳，不会延长封禁时间。
pub struct SlidingWindowLimiter {
    /// 窗口内允许的最大请求数
    max_requests: usize,
    /// 窗口大小
    window: Duration,
    requests: RwLock<HashMap<String, VecDeque<Instant>>>,
}

impl SlidingWindowLimiter {
    pub fn new(max_requests: usize, window: Duration) -> Self {
        Self {
            max_requests,
            window,
            requests: RwLock::new(HashMap::new()),
        }
    }

    /// 尝试为请求方记一次请求。窗口内配额已满时返回 false。
    pub fn try_acquire(&self, requester: &str) -> bool {
        let mut requests = self
            .requests
            .write()
            .unwrap_or_else(PoisonError::into_inner);
        let now = Instant::now();
        // 最近一次请求都在窗口外的请求方整个移除
        requests.retain(|_, timestamps| {
            timestamps
                .back()
                .is_some_and(|last| now.duration_since(*last) < self.window)
        });
        let timestamps = requests.entry(requester.to_owned()).or_default();

        while let Some(front) = timestamps.front() {
            if now.duration_since(*front) >= self.window {
                timestamps.pop_front();
            } else {
                break;
            }
        }

        if timestamps.len() >= self.max_requests {
            return false;
        }
        timestamps.push_back(now);
        true
    }
}

/// 翻译服务配置。
#[derive(Debug, Clone)]
pub struct TranslationSettings {
    /// 缓存条目存活时间
    pub cache_ttl: Duration,
    /// 限流窗口大小
    pub rate_window: Duration,
    /// 窗口内每个请求方允许的最大请求数
    pub rate_max_requests: usize,
    /// 主翻译提供方的单次调用超时
    pub provider_timeout: Duration,
}

impl Default for TranslationSettings {
    fn default() -> Self {
        Self {
            cache_ttl: Duration::from_secs(3600),
            rate_window: Duration::from_secs(60),
            rate_max_requests: 100,
            provider_timeout: Duration::from_secs(5),
        }
    }
}

/// 翻译服务：缓存、限流和主/兜底提供方的编排。
pub struct TranslationService {
    primary: Arc<dyn TranslationProvider>,
    fallback: Arc<dyn TranslationProvider>,
    cache: TranslationCache,
    limiter: SlidingWindowLimiter,
    provider_timeout: Duration,
}

impl TranslationService {
    pub fn new(primary: Arc<dyn TranslationProvider>) -> Self {
        Self::with_settings(
            primary,
            Arc::new(FallbackTranslator),
            TranslationSettings::default(),
        )
    }

    pub fn with_settings(
        primary: Arc<dyn TranslationProvider>,
        fallback: Arc<dyn TranslationProvider>,
        settings: TranslationSettings,
    ) -> Self {
        Self {
            primary,
            fallback,
            cache: TranslationCache::new(settings.cache_ttl),
            limiter: SlidingWindowLimiter::new(settings.rate_max_requests, settings.rate_window),
            provider_timeout: settings.provider_timeout,
        }
    }

    pub fn is_supported(language: &str) -> bool {
        SUPPORTED_LANGUAGES.contains(&language)
    }

    /// 翻译一段文本。
    ///
    /// 检查顺序：输入校验 → 语言校验 → 缓存 → 限流 → 主提供方
    /// （超时受限）→ 兜底。
    pub async fn translate(
        &self,
        text: &str,
        target_language: &str,
        requester: &str,
    ) -> Result<TranslatedText, TranslationError> {
        if text.is_empty() {
            return Err(TranslationError::InvalidInput);
        }
        if !Self::is_supported(target_language) {
            return Err(TranslationError::unsupported(target_language));
        }

        if let Some(cached) = self.cache.get(text, target_language) {
            // 缓存里只有主翻译结果
            return Ok(TranslatedText {
                text: cached,
                source: TranslationSource::Primary,
            });
        }

        let requester = if requester.is_empty() {
            DEFAULT_REQUESTER
        } else {
            requester
        };
        if !self.limiter.try_acquire(requester) {
            return Err(TranslationError::rate_limited(requester));
        }

        let primary =
            tokio::time::timeout(self.provider_timeout, self.primary.translate(text, target_language))
                .await;
        match primary {
            Ok(Ok(translated)) => {
                self.cache.insert(text, target_language, &translated);
                Ok(TranslatedText {
                    text: translated,
                    source: TranslationSource::Primary,
                })
            }
            Ok(Err(err)) => {
                tracing::warn!(error = %err, target_language, "primary translation failed, using fallback");
                self.fallback_translate(text, target_language).await
            }
            Err(_) => {
                tracing::warn!(target_language, "primary translation timed out, using fallback");
                self.fallback_translate(text, target_language).await
            }
        }
    }

    async fn fallback_translate(
        &self,
        text: &str,
        target_language: &str,
    ) -> Result<TranslatedText, TranslationError> {
        let translated = self.fallback.translate(text, target_language).await?;
        Ok(TranslatedText {
            text: translated,
            source: TranslationSource::Fallback,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    /// 记录调用次数的测试提供方，译文为 "目标语言:原文"
    struct CountingProvider {
        calls: AtomicUsize,
    }

    impl CountingProvider {
        fn new() -> Self {
            Self {
                calls: AtomicUsize::new(0),
            }
        }
    }

    #[async_trait]
    impl TranslationProvider for CountingProvider {
        async fn translate(
            &self,
            text: &str,
            target_language: &str,
        ) -> Result<String, TranslationError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Ok(format!("{target_language}:{text}"))
        }
    }

    /// 总是失败的测试提供方
    struct FailingProvider {
        calls: AtomicUsize,
    }

    impl FailingProvider {
        fn new() -> Self {
            Self {
                calls: AtomicUsize::new(0),
            }
        }
    }

    #[async_trait]
    impl TranslationProvider for FailingProvider {
        async fn translate(
            &self,
            _text: &str,
            _target_language: &str,
        ) -> Result<String, TranslationError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Err(TranslationError::provider("service unavailable"))
        }
    }

    /// 响应慢于超时的测试提供方
    struct SlowProvider;

    #[async_trait]
    impl TranslationProvider for SlowProvider {
        async fn translate(
            &self,
            text: &str,
            _target_language: &str,
        ) -> Result<String, TranslationError> {
            tokio::time::sleep(Duration::from_millis(200)).await;
            Ok(text.to_owned())
        }
    }

    fn short_timeout_settings() -> TranslationSettings {
        TranslationSettings {
            provider_timeout: Duration::from_millis(50),
            ..TranslationSettings::default()
        }
    }

    #[tokio::test]
    async fn test_primary_result_cached() {
        let primary = Arc::new(CountingProvider::new());
        let service = TranslationService::new(primary.clone());

        let first = service.translate("hello", "es", "alice").await.unwrap();
        assert_eq!(first.text, "es:hello");
        assert_eq!(first.source, TranslationSource::Primary);

        // 第二次命中缓存，不再调用提供方
        let second = service.translate("hello", "es", "alice").await.unwrap();
        assert_eq!(second.text, "es:hello");
        assert_eq!(second.source, TranslationSource::Primary);
        assert_eq!(primary.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_empty_text_invalid() {
        let service = TranslationService::new(Arc::new(CountingProvider::new()));
        assert!(matches!(
            service.translate("", "es", "alice").await,
            Err(TranslationError::InvalidInput)
        ));
    }

    #[tokio::test]
    async fn test_unsupported_language_rejected() {
        let service = TranslationService::new(Arc::new(CountingProvider::new()));
        let result = service.translate("hello", "xx", "alice").await;

        match result {
            Err(TranslationError::UnsupportedLanguage { language }) => {
                assert_eq!(language, "xx");
            }
            other => panic!("expected UnsupportedLanguage, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_fallback_on_provider_failure() {
        let service = TranslationService::new(Arc::new(FailingProvider::new()));
        let result = service.translate("hello", "es", "alice").await.unwrap();

        assert_eq!(result.text, "[FALLBACK] hello");
        assert_eq!(result.source, TranslationSource::Fallback);
    }

    #[tokio::test]
    async fn test_fallback_result_not_cached() {
        let primary = Arc::new(FailingProvider::new());
        let service = TranslationService::new(primary.clone());

        service.translate("hello", "es", "alice").await.unwrap();
        service.translate("hello", "es", "alice").await.unwrap();

        // 降级结果不进缓存，第二次仍会尝试主提供方
        assert_eq!(primary.calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_timeout_falls_back() {
        let service = TranslationService::with_settings(
            Arc::new(SlowProvider),
            Arc::new(FallbackTranslator),
            short_timeout_settings(),
        );

        let result = service.translate("hello", "es", "alice").await.unwrap();
        assert_eq!(result.text, "[FALLBACK] hello");
        assert_eq!(result.source, TranslationSource::Fallback);
    }

    #[tokio::test]
    async fn test_rate_limit_rejects_after_max() {
        let settings = TranslationSettings {
            rate_max_requests: 2,
            ..TranslationSettings::default()
        };
        let service = TranslationService::with_settings(
            Arc::new(CountingProvider::new()),
            Arc::new(FallbackTranslator),
            settings,
        );

        // 不同文本避开缓存
        service.translate("one", "es", "alice").await.unwrap();
        service.translate("two", "es", "alice").await.unwrap();
        let third = service.translate("three", "es", "alice").await;
        assert!(matches!(
            third,
            Err(TranslationError::RateLimited { .. })
        ));

        // 其他请求方不受影响
        assert!(service.translate("three", "es", "bob").await.is_ok());
    }

    #[tokio::test]
    async fn test_cache_hit_skips_rate_limiter() {
        let settings = TranslationSettings {
            rate_max_requests: 1,
            ..TranslationSettings::default()
        };
        let service = TranslationService::with_settings(
            Arc::new(CountingProvider::new()),
            Arc::new(FallbackTranslator),
            settings,
        );

        service.translate("hello", "es", "alice").await.unwrap();
        // 配额已用完，但缓存命中不走限流器
        assert!(service.translate("hello", "es", "alice").await.is_ok());
        // 未缓存的文本才会被限流
        assert!(matches!(
            service.translate("other", "es", "alice").await,
            Err(TranslationError::RateLimited { .. })
        ));
    }

    #[tokio::test]
    async fn test_empty_requester_uses_default_key() {
        let settings = TranslationSettings {
            rate_max_requests: 1,
            ..TranslationSettings::default()
        };
        let service = TranslationService::with_settings(
            Arc::new(CountingProvider::new()),
            Arc::new(FallbackTranslator),
            settings,
        );

        service.translate("one", "es", "").await.unwrap();
        let second = service.translate("two", "es", "").await;

        match second {
            Err(TranslationError::RateLimited { requester }) => {
                assert_eq!(requester, DEFAULT_REQUESTER);
            }
            other => panic!("expected RateLimited, got {other:?}"),
        }
    }

    #[test]
    fn test_limiter_window_slides() {
        let limiter = SlidingWindowLimiter::new(2, Duration::from_millis(100));

        assert!(limiter.try_acquire("alice"));
        assert!(limiter.try_acquire("alice"));
        assert!(!limiter.try_acquire("alice"));

        // 窗口滑过后配额恢复
        std::thread::sleep(Duration::from_millis(150));
        assert!(limiter.try_acquire("alice"));
    }

    #[test]
    fn test_limiter_reject_does_not_extend_window() {
        let limiter = SlidingWindowLimiter::new(1, Duration::from_millis(100));

        assert!(limiter.try_acquire("alice"));
        // 被拒绝的请求不记时间戳
        assert!(!limiter.try_acquire("alice"));
        assert!(!limiter.try_acquire("alice"));

        std::thread::sleep(Duration::from_millis(150));
        assert!(limiter.try_acquire("alice"));
    }

    #[test]
    fn test_limiter_sweeps_idle_requesters() {
        let limiter = SlidingWindowLimiter::new(2, Duration::from_millis(10));
        for i in 0..100 {
            assert!(limiter.try_acquire(&format!("user-{i}")));
        }
        std::thread::sleep(Duration::from_millis(50));

        // 窗口滑过的请求方连条目一起移除，映射不随历史请求方数量增长
        assert!(limiter.try_acquire("fresh"));
        let requests = limiter.requests.read().unwrap();
        assert_eq!(requests.len(), 1);
        assert!(requests.contains_key("fresh"));
    }

    #[test]
    fn test_cache_expiry() {
        let cache = TranslationCache::new(Duration::from_millis(50));
        cache.insert("hello", "es", "hola");

        assert_eq!(cache.get("hello", "es"), Some("hola".to_owned()));
        std::thread::sleep(Duration::from_millis(80));
        assert_eq!(cache.get("hello", "es"), None);
    }

    #[test]
    fn test_cache_insert_sweeps_expired_entries() {
        let cache = TranslationCache::new(Duration::from_millis(10));
        for i in 0..100 {
            cache.insert(&format!("text {i}"), "es", "hola");
        }
        std::thread::sleep(Duration::from_millis(50));

        // 唯一文本不会被二次查询，过期条目靠新写入时的清扫回收
        cache.insert("fresh", "es", "hola");
        let entries = cache.entries.read().unwrap();
        assert_eq!(entries.len(), 1);
        assert!(entries.contains_key(&("fresh".to_owned(), "es".to_owned())));
    }
}
