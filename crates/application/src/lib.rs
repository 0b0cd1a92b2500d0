//! 应用层实现。
//!
//! 这里提供互动反应广播的核心：请求限流、订阅者注册表、广播分发循环、
//! 在线状态跟踪，以及构造事件的各个用例服务。

pub mod broadcaster;
pub mod clock;
pub mod dispatcher;
pub mod error;
pub mod presence;
pub mod rate_limiter;
pub mod registry;
pub mod sequencer;
pub mod services;

#[cfg(test)]
mod testing;

pub use broadcaster::EventPublisher;
pub use clock::{Clock, SystemClock};
pub use dispatcher::{DispatchConfig, DispatchSnapshot, Dispatcher};
pub use error::ApplicationError;
pub use presence::PresenceTracker;
pub use rate_limiter::{RateLimitError, RequestRateLimiter};
pub use registry::{
    DeliveryError, Frame, SubscriberHandle, SubscriberId, SubscriberRegistry, Subscription,
};
pub use sequencer::EventSequencer;
pub use services::{
    BalloonClickRequest, ClickReceipt, ReactionLimits, ReactionService, SettingsService,
    UnderstandClickRequest,
};
