//! 订阅者注册表
//!
//! 每个打开的 `/stream` 连接对应一个订阅者。注册表持有写端，
//! 调用方持有 [`Subscription`]（读端）；`Subscription` 被丢弃即视为断开，
//! 立即从注册表移除，无需等待下一次写失败。

use std::collections::HashMap;
use std::fmt;
use std::future::Future;
use std::pin::Pin;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};
use std::task::{Context, Poll};
use std::time::Duration;

use futures_util::Stream;
use thiserror::Error;
use tokio::sync::mpsc;
use tokio_stream::wrappers::ReceiverStream;

/// 一个已序列化的事件帧，所有订阅者共享同一份
pub type Frame = Arc<str>;

/// 订阅者唯一标识，按注册顺序递增
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SubscriberId(u64);

impl SubscriberId {
    pub fn value(self) -> u64 {
        self.0
    }
}

impl fmt::Display for SubscriberId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// 单个订阅者的投递失败，只在分发器内部使用
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DeliveryError {
    #[error("subscriber {0} is closed")]
    Closed(SubscriberId),
    #[error("subscriber {0} did not accept the frame in time")]
    TimedOut(SubscriberId),
}

impl DeliveryError {
    pub fn subscriber_id(&self) -> SubscriberId {
        match self {
            Self::Closed(id) | Self::TimedOut(id) => *id,
        }
    }
}

/// 注册表中的写端句柄
#[derive(Debug, Clone)]
pub struct SubscriberHandle {
    id: SubscriberId,
    sender: mpsc::Sender<Frame>,
}

impl SubscriberHandle {
    pub fn id(&self) -> SubscriberId {
        self.id
    }

    /// 读端已经被丢弃
    pub fn is_closed(&self) -> bool {
        self.sender.is_closed()
    }

    /// 把一帧写入订阅者缓冲区，最多等待 `timeout`。
    /// 返回的 future 不借用句柄，可与其他订阅者的写入并发等待。
    pub fn deliver(
        &self,
        frame: Frame,
        timeout: Duration,
    ) -> impl Future<Output = Result<(), DeliveryError>> + Send + 'static {
        let id = self.id;
        let sender = self.sender.clone();

        async move {
            if sender.is_closed() {
                return Err(DeliveryError::Closed(id));
            }

            match tokio::time::timeout(timeout, sender.send(frame)).await {
                Ok(Ok(())) => Ok(()),
                Ok(Err(_)) => Err(DeliveryError::Closed(id)),
                Err(_) => Err(DeliveryError::TimedOut(id)),
            }
        }
    }
}

struct RegistryInner {
    next_id: AtomicU64,
    buffer: usize,
    subscribers: RwLock<HashMap<SubscriberId, SubscriberHandle>>,
}

/// 订阅者注册表，可廉价克隆，所有克隆共享同一份状态
#[derive(Clone)]
pub struct SubscriberRegistry {
    inner: Arc<RegistryInner>,
}

impl SubscriberRegistry {
    /// `buffer` 为每个订阅者可排队的帧数
    pub fn new(buffer: usize) -> Self {
        Self {
            inner: Arc::new(RegistryInner {
                next_id: AtomicU64::new(0),
                buffer: buffer.max(1),
                subscribers: RwLock::new(HashMap::new()),
            }),
        }
    }

    fn read(&self) -> RwLockReadGuard<'_, HashMap<SubscriberId, SubscriberHandle>> {
        self.inner
            .subscribers
            .read()
            .unwrap_or_else(PoisonError::into_inner)
    }

    fn write(&self) -> RwLockWriteGuard<'_, HashMap<SubscriberId, SubscriberHandle>> {
        self.inner
            .subscribers
            .write()
            .unwrap_or_else(PoisonError::into_inner)
    }

    /// 打开一个新的订阅
    pub fn register(&self) -> Subscription {
        let id = SubscriberId(self.inner.next_id.fetch_add(1, Ordering::SeqCst));
        let (sender, receiver) = mpsc::channel(self.inner.buffer);

        let total = {
            let mut subscribers = self.write();
            subscribers.insert(id, SubscriberHandle { id, sender });
            subscribers.len()
        };

        tracing::info!(subscriber_id = %id, total, "subscriber registered");

        Subscription {
            id,
            frames: ReceiverStream::new(receiver),
            registry: self.clone(),
        }
    }

    /// 移除订阅者，重复调用是无操作。返回本次是否真的移除了。
    pub fn unregister(&self, id: SubscriberId) -> bool {
        let (removed, total) = {
            let mut subscribers = self.write();
            let removed = subscribers.remove(&id).is_some();
            (removed, subscribers.len())
        };

        if removed {
            tracing::info!(subscriber_id = %id, total, "subscriber unregistered");
        }
        removed
    }

    /// 遍历注册时刻的快照。遍历期间的注册/注销不会影响本次遍历。
    pub fn for_each<F>(&self, mut visit: F)
    where
        F: FnMut(&SubscriberHandle),
    {
        let snapshot: Vec<SubscriberHandle> = self.read().values().cloned().collect();
        for handle in &snapshot {
            visit(handle);
        }
    }

    pub fn count(&self) -> usize {
        self.read().len()
    }

    pub fn contains(&self, id: SubscriberId) -> bool {
        self.read().contains_key(&id)
    }

    /// 下一个注册者将获得的 ID。ID 小于该值的订阅者都已在此刻之前开始注册。
    pub fn watermark(&self) -> SubscriberId {
        SubscriberId(self.inner.next_id.load(Ordering::SeqCst))
    }

    /// 丢弃所有写端，使每个订阅流结束（进程关闭时调用）
    pub fn close_all(&self) -> usize {
        let drained: Vec<SubscriberHandle> = self.write().drain().map(|(_, handle)| handle).collect();
        if !drained.is_empty() {
            tracing::info!(count = drained.len(), "closing all subscribers");
        }
        drained.len()
    }
}

impl Default for SubscriberRegistry {
    fn default() -> Self {
        Self::new(64)
    }
}

/// 订阅者持有的读端。作为 `Stream` 依次产出事件帧；
/// 被丢弃时自动从注册表注销。
pub struct Subscription {
    id: SubscriberId,
    frames: ReceiverStream<Frame>,
    registry: SubscriberRegistry,
}

impl Subscription {
    pub fn id(&self) -> SubscriberId {
        self.id
    }

    /// 等待下一帧；注册表关闭或本订阅被驱逐后返回 `None`
    pub async fn recv(&mut self) -> Option<Frame> {
        futures_util::StreamExt::next(self).await
    }
}

impl Stream for Subscription {
    type Item = Frame;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        Pin::new(&mut self.frames).poll_next(cx)
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        self.registry.unregister(self.id);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn register_and_drop_updates_count() {
        let registry = SubscriberRegistry::new(4);
        let first = registry.register();
        let second = registry.register();
        assert_eq!(registry.count(), 2);
        assert_ne!(first.id(), second.id());

        drop(first);
        assert_eq!(registry.count(), 1);
        assert!(registry.contains(second.id()));
    }

    #[tokio::test]
    async fn unregister_is_idempotent() {
        let registry = SubscriberRegistry::new(4);
        let subscription = registry.register();
        let id = subscription.id();

        assert!(registry.unregister(id));
        assert!(!registry.unregister(id));
        assert_eq!(registry.count(), 0);

        // 已被驱逐的订阅再次丢弃不会影响其他订阅者
        let other = registry.register();
        drop(subscription);
        assert_eq!(registry.count(), 1);
        assert!(registry.contains(other.id()));
    }

    #[tokio::test]
    async fn for_each_tolerates_concurrent_registration() {
        let registry = SubscriberRegistry::new(4);
        let _a = registry.register();
        let _b = registry.register();

        let mut visited = Vec::new();
        let mut late = Vec::new();
        registry.for_each(|handle| {
            visited.push(handle.id());
            late.push(registry.register());
        });

        assert_eq!(visited.len(), 2);
        assert_eq!(registry.count(), 4);
    }

    #[tokio::test]
    async fn deliver_reaches_subscription() {
        let registry = SubscriberRegistry::new(4);
        let mut subscription = registry.register();

        let mut deliveries = Vec::new();
        registry.for_each(|handle| {
            deliveries.push(handle.deliver(Arc::from("hello"), Duration::from_millis(50)));
        });
        for delivery in deliveries {
            delivery.await.unwrap();
        }

        assert_eq!(subscription.recv().await.as_deref(), Some("hello"));
    }

    #[tokio::test]
    async fn deliver_times_out_when_buffer_is_full() {
        let registry = SubscriberRegistry::new(1);
        let _subscription = registry.register();

        let mut handles = Vec::new();
        registry.for_each(|handle| handles.push(handle.clone()));
        let handle = handles.pop().unwrap();

        handle
            .deliver(Arc::from("one"), Duration::from_millis(20))
            .await
            .unwrap();
        let err = handle
            .deliver(Arc::from("two"), Duration::from_millis(20))
            .await
            .unwrap_err();
        assert_eq!(err, DeliveryError::TimedOut(handle.id()));
    }

    #[tokio::test]
    async fn close_all_ends_streams() {
        let registry = SubscriberRegistry::new(4);
        let mut subscription = registry.register();

        assert_eq!(registry.close_all(), 1);
        assert_eq!(registry.count(), 0);
        assert!(subscription.recv().await.is_none());
    }

    #[tokio::test]
    async fn watermark_tracks_next_id() {
        let registry = SubscriberRegistry::new(4);
        let before = registry.watermark();
        let subscription = registry.register();

        assert_eq!(subscription.id(), before);
        assert!(registry.watermark() > subscription.id());
    }
}
