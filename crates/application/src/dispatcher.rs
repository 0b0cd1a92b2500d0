//! 广播队列与分发循环
//!
//! 生产者调用 [`Dispatcher::publish`] 入队后立即返回；唯一的分发任务按批次
//! 取出事件，并发写给注册表中的每个订阅者，批次结束后统一驱逐写失败的订阅者。

use std::collections::HashSet;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use domain::ReactionEvent;
use futures_util::future::join_all;
use serde::Serialize;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

use crate::broadcaster::EventPublisher;
use crate::registry::{Frame, SubscriberId, SubscriberRegistry};

/// 分发参数
#[derive(Debug, Clone)]
pub struct DispatchConfig {
    /// 每批最多处理的事件数
    pub batch_size: usize,
    /// 单个订阅者写入的最长等待时间
    pub write_timeout: Duration,
}

impl Default for DispatchConfig {
    fn default() -> Self {
        Self {
            batch_size: 10,
            write_timeout: Duration::from_secs(1),
        }
    }
}

/// 分发统计
#[derive(Debug, Default)]
pub struct DispatchStats {
    dispatched: AtomicU64,
    delivered: AtomicU64,
    evicted: AtomicU64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct DispatchSnapshot {
    pub dispatched: u64,
    pub delivered: u64,
    pub evicted: u64,
}

impl DispatchStats {
    pub fn snapshot(&self) -> DispatchSnapshot {
        DispatchSnapshot {
            dispatched: self.dispatched.load(Ordering::Relaxed),
            delivered: self.delivered.load(Ordering::Relaxed),
            evicted: self.evicted.load(Ordering::Relaxed),
        }
    }
}

/// 入队的事件，附带发布时刻的注册表水位线
struct Envelope {
    event: ReactionEvent,
    watermark: SubscriberId,
}

/// 发布句柄，可廉价克隆。所有克隆被丢弃后分发任务自然退出。
#[derive(Clone)]
pub struct Dispatcher {
    sender: mpsc::UnboundedSender<Envelope>,
    registry: SubscriberRegistry,
    stats: Arc<DispatchStats>,
}

impl Dispatcher {
    /// 启动分发任务，必须在 tokio 运行时内调用
    pub fn spawn(registry: SubscriberRegistry, config: DispatchConfig) -> (Self, JoinHandle<()>) {
        let (sender, receiver) = mpsc::unbounded_channel();
        let stats = Arc::new(DispatchStats::default());

        let dispatch_loop = DispatchLoop {
            receiver,
            registry: registry.clone(),
            batch_size: config.batch_size.max(1),
            write_timeout: config.write_timeout,
            stats: stats.clone(),
        };
        let handle = tokio::spawn(dispatch_loop.run());

        (
            Self {
                sender,
                registry,
                stats,
            },
            handle,
        )
    }

    pub fn stats(&self) -> DispatchSnapshot {
        self.stats.snapshot()
    }

    pub fn registry(&self) -> &SubscriberRegistry {
        &self.registry
    }
}

impl EventPublisher for Dispatcher {
    fn publish(&self, event: ReactionEvent) {
        let watermark = self.registry.watermark();
        let kind = event.payload.kind();
        let id = event.id;

        if self.sender.send(Envelope { event, watermark }).is_err() {
            tracing::warn!(event_id = id, kind, "dispatch loop stopped, event dropped");
        }
    }
}

struct DispatchLoop {
    receiver: mpsc::UnboundedReceiver<Envelope>,
    registry: SubscriberRegistry,
    batch_size: usize,
    write_timeout: Duration,
    stats: Arc<DispatchStats>,
}

impl DispatchLoop {
    async fn run(mut self) {
        let mut batch = Vec::with_capacity(self.batch_size);

        loop {
            if self.receiver.recv_many(&mut batch, self.batch_size).await == 0 {
                break;
            }

            self.dispatch_batch(&mut batch).await;

            // 队列里还有事件时让出调度器，避免长时间占用线程
            if !self.receiver.is_empty() {
                tokio::task::yield_now().await;
            }
        }

        tracing::debug!("dispatch loop finished");
    }

    async fn dispatch_batch(&self, batch: &mut Vec<Envelope>) {
        let mut failed: HashSet<SubscriberId> = HashSet::new();

        for Envelope { event, watermark } in batch.drain(..) {
            let frame: Frame = match serde_json::to_string(&event) {
                Ok(json) => Arc::from(json),
                Err(err) => {
                    tracing::warn!(event_id = event.id, error = %err, "failed to serialize event");
                    continue;
                }
            };

            let mut deliveries = Vec::new();
            self.registry.for_each(|handle| {
                // 发布之后才注册的订阅者不接收该事件；本批已失败的不再重试
                if handle.id() < watermark && !failed.contains(&handle.id()) {
                    deliveries.push(handle.deliver(frame.clone(), self.write_timeout));
                }
            });

            let mut delivered = 0u64;
            for result in join_all(deliveries).await {
                match result {
                    Ok(()) => delivered += 1,
                    Err(err) => {
                        tracing::debug!(
                            subscriber_id = %err.subscriber_id(),
                            error = %err,
                            "delivery failed"
                        );
                        failed.insert(err.subscriber_id());
                    }
                }
            }

            self.stats.dispatched.fetch_add(1, Ordering::Relaxed);
            self.stats.delivered.fetch_add(delivered, Ordering::Relaxed);
            tracing::debug!(
                event_id = event.id,
                kind = event.payload.kind(),
                delivered,
                "event dispatched"
            );
        }

        for id in failed {
            if self.registry.unregister(id) {
                self.stats.evicted.fetch_add(1, Ordering::Relaxed);
                tracing::info!(subscriber_id = %id, "evicted unresponsive subscriber");
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use domain::EventPayload;
    use serde_json::Value;

    fn text_event(id: u64, message: &str) -> ReactionEvent {
        ReactionEvent::new(
            id,
            Utc::now(),
            EventPayload::TextMessage {
                message: message.to_string(),
            },
        )
    }

    async fn next_json(subscription: &mut crate::registry::Subscription) -> Value {
        let frame = tokio::time::timeout(Duration::from_secs(1), subscription.recv())
            .await
            .expect("frame in time")
            .expect("stream open");
        serde_json::from_str(&frame).unwrap()
    }

    #[tokio::test]
    async fn registered_subscriber_receives_exactly_once() {
        let registry = SubscriberRegistry::new(16);
        let (dispatcher, _task) = Dispatcher::spawn(registry.clone(), DispatchConfig::default());
        let mut early = registry.register();

        dispatcher.publish(text_event(1, "hello"));
        let mut late = registry.register();
        dispatcher.publish(text_event(2, "again"));

        let first = next_json(&mut early).await;
        assert_eq!(first["id"], 1);
        assert_eq!(first["message"], "hello");
        assert_eq!(next_json(&mut early).await["id"], 2);

        // 晚注册的订阅者只收到之后发布的事件
        assert_eq!(next_json(&mut late).await["id"], 2);
        assert!(
            tokio::time::timeout(Duration::from_millis(50), late.recv())
                .await
                .is_err()
        );
        assert!(
            tokio::time::timeout(Duration::from_millis(50), early.recv())
                .await
                .is_err()
        );
    }

    #[tokio::test]
    async fn fifo_across_batches() {
        let registry = SubscriberRegistry::new(64);
        let config = DispatchConfig {
            batch_size: 3,
            ..DispatchConfig::default()
        };
        let (dispatcher, _task) = Dispatcher::spawn(registry.clone(), config);
        let mut subscription = registry.register();

        for id in 1..=25 {
            dispatcher.publish(text_event(id, "x"));
        }

        for expected in 1..=25u64 {
            assert_eq!(next_json(&mut subscription).await["id"], expected);
        }
        assert_eq!(dispatcher.stats().dispatched, 25);
    }

    #[tokio::test]
    async fn stalled_subscriber_is_evicted_without_blocking_others() {
        let registry = SubscriberRegistry::new(1);
        let config = DispatchConfig {
            batch_size: 10,
            write_timeout: Duration::from_millis(30),
        };
        let (dispatcher, _task) = Dispatcher::spawn(registry.clone(), config);

        let stalled = registry.register();
        let mut healthy = registry.register();

        dispatcher.publish(text_event(1, "one"));
        assert_eq!(next_json(&mut healthy).await["id"], 1);

        // 第二帧写不进 stalled 的缓冲区，超时后被驱逐；healthy 照常收到
        dispatcher.publish(text_event(2, "two"));
        assert_eq!(next_json(&mut healthy).await["id"], 2);

        tokio::time::sleep(Duration::from_millis(50)).await;
        assert!(!registry.contains(stalled.id()));
        assert!(registry.contains(healthy.id()));
        assert_eq!(dispatcher.stats().evicted, 1);

        dispatcher.publish(text_event(3, "three"));
        assert_eq!(next_json(&mut healthy).await["id"], 3);
    }

    #[tokio::test]
    async fn publish_without_subscribers_is_harmless() {
        let registry = SubscriberRegistry::new(4);
        let (dispatcher, _task) = Dispatcher::spawn(registry.clone(), DispatchConfig::default());

        dispatcher.publish(text_event(1, "nobody"));
        tokio::time::sleep(Duration::from_millis(20)).await;

        let stats = dispatcher.stats();
        assert_eq!(stats.dispatched, 1);
        assert_eq!(stats.delivered, 0);
    }

    #[tokio::test]
    async fn loop_exits_when_dispatchers_dropped() {
        let registry = SubscriberRegistry::new(4);
        let (dispatcher, task) = Dispatcher::spawn(registry, DispatchConfig::default());

        drop(dispatcher);
        tokio::time::timeout(Duration::from_secs(1), task)
            .await
            .expect("loop exits")
            .unwrap();
    }
}
