use std::{sync::Arc, time::Duration};

use application::{
    Clock, DispatchConfig, DispatchSnapshot, Dispatcher, EventPublisher, EventSequencer,
    PresenceTracker, ReactionLimits, ReactionService, RequestRateLimiter, SettingsService,
    SubscriberRegistry, SystemClock,
};
use config::AppConfig;

/// 请求处理器共享的上下文，替代进程级全局变量，测试中可以各自独立构建
#[derive(Clone)]
pub struct AppState {
    pub registry: SubscriberRegistry,
    pub dispatcher: Dispatcher,
    pub rate_limiter: Arc<RequestRateLimiter>,
    pub presence: Arc<PresenceTracker>,
    pub reactions: Arc<ReactionService>,
    pub settings: Arc<SettingsService>,
    pub keep_alive: Duration,
}

impl AppState {
    /// 按配置装配所有组件并启动分发任务，必须在 tokio 运行时内调用
    pub fn from_config(config: &AppConfig) -> Self {
        Self::with_clock(config, Arc::new(SystemClock))
    }

    pub fn with_clock(config: &AppConfig, clock: Arc<dyn Clock>) -> Self {
        let registry = SubscriberRegistry::new(config.broadcast.subscriber_buffer);
        let (dispatcher, _dispatch_task) = Dispatcher::spawn(
            registry.clone(),
            DispatchConfig {
                batch_size: config.broadcast.batch_size,
                write_timeout: config.broadcast.write_timeout(),
            },
        );

        let sequencer = Arc::new(EventSequencer::new(clock));
        let publisher: Arc<dyn EventPublisher> = Arc::new(dispatcher.clone());

        let reactions = ReactionService::new(
            sequencer.clone(),
            publisher.clone(),
            ReactionLimits {
                message_max_chars: config.limits.message_max_chars,
                max_clicks_per_request: config.limits.max_clicks_per_request,
            },
        );

        Self {
            registry,
            dispatcher,
            rate_limiter: Arc::new(RequestRateLimiter::new(
                config.rate_limit.max_requests,
                config.rate_limit.window(),
            )),
            presence: Arc::new(PresenceTracker::new(sequencer, publisher)),
            reactions: Arc::new(reactions),
            settings: Arc::new(SettingsService::new(
                config.settings.default_title.clone(),
                config.limits.title_max_chars,
            )),
            keep_alive: config.broadcast.keep_alive(),
        }
    }

    pub fn dispatch_stats(&self) -> DispatchSnapshot {
        self.dispatcher.stats()
    }
}
