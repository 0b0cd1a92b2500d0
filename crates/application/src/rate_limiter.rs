use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::{Duration, Instant};

/// 单个来源的请求配额
#[derive(Debug, Clone)]
pub struct RequestBucket {
    /// 当前时间窗口内的请求数量
    pub count: u32,
    /// 当前时间窗口的结束时间
    pub reset_at: Instant,
}

impl RequestBucket {
    fn open(now: Instant, window: Duration) -> Self {
        Self {
            count: 1,
            reset_at: now + window,
        }
    }

    fn is_expired(&self, now: Instant) -> bool {
        now > self.reset_at
    }
}

/// 限流错误类型
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RateLimitError {
    #[error("Too many requests: {current}/{max} requests per window, retry in {retry_after:?}")]
    RateLimitExceeded {
        current: u32,
        max: u32,
        retry_after: Duration,
    },
}

impl RateLimitError {
    pub fn retry_after(&self) -> Duration {
        match self {
            Self::RateLimitExceeded { retry_after, .. } => *retry_after,
        }
    }
}

/// 请求限流器
/// 按来源（通常是客户端地址）做固定窗口计数，挡在所有写接口前面
pub struct RequestRateLimiter {
    /// 每个窗口允许的最大请求数
    max_requests: u32,
    /// 时间窗口大小
    window_duration: Duration,
    /// 来源配额存储
    buckets: Mutex<HashMap<String, RequestBucket>>,
}

impl RequestRateLimiter {
    pub fn new(max_requests: u32, window_duration: Duration) -> Self {
        Self {
            max_requests,
            window_duration,
            buckets: Mutex::new(HashMap::new()),
        }
    }

    fn buckets(&self) -> MutexGuard<'_, HashMap<String, RequestBucket>> {
        self.buckets.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// 检查来源是否可以继续请求。被拒绝时不修改计数。
    pub fn check(&self, source: &str) -> Result<(), RateLimitError> {
        let now = Instant::now();
        let mut buckets = self.buckets();

        let Some(bucket) = buckets.get_mut(source) else {
            buckets.insert(
                source.to_string(),
                RequestBucket::open(now, self.window_duration),
            );
            return Ok(());
        };

        // 窗口已过期，重新开始计数
        if bucket.is_expired(now) {
            *bucket = RequestBucket::open(now, self.window_duration);
            return Ok(());
        }

        if bucket.count < self.max_requests {
            bucket.count += 1;
            return Ok(());
        }

        tracing::debug!(source, count = bucket.count, "request rejected by rate limiter");
        Err(RateLimitError::RateLimitExceeded {
            current: bucket.count,
            max: self.max_requests,
            retry_after: bucket.reset_at.saturating_duration_since(now),
        })
    }

    /// 获取来源在当前窗口内的计数，窗口过期或从未请求时为 0
    pub fn status(&self, source: &str) -> u32 {
        let now = Instant::now();
        self.buckets()
            .get(source)
            .filter(|bucket| !bucket.is_expired(now))
            .map(|bucket| bucket.count)
            .unwrap_or(0)
    }

    /// 当前持有的配额记录数
    pub fn bucket_count(&self) -> usize {
        self.buckets().len()
    }

    /// 清理过期的配额记录（防止内存泄漏），返回清理的数量
    pub fn cleanup_expired_buckets(&self) -> usize {
        let now = Instant::now();
        let mut buckets = self.buckets();
        let before = buckets.len();
        buckets.retain(|_, bucket| !bucket.is_expired(now));
        before - buckets.len()
    }

    /// 重置来源配额（管理员功能）
    pub fn reset(&self, source: &str) {
        self.buckets().remove(source);
    }

    pub fn max_requests(&self) -> u32 {
        self.max_requests
    }
}

impl Default for RequestRateLimiter {
    fn default() -> Self {
        Self::new(120, Duration::from_secs(60)) // 默认每分钟120次请求
    }
}
