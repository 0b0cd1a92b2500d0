use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use domain::{EventId, EventPayload, ReactionEvent};

use crate::clock::Clock;

/// 事件序列器
/// 为每个事件分配进程内单调递增的 ID 并打上时间戳
pub struct EventSequencer {
    next_id: AtomicU64,
    clock: Arc<dyn Clock>,
}

impl EventSequencer {
    pub fn new(clock: Arc<dyn Clock>) -> Self {
        Self {
            next_id: AtomicU64::new(1),
            clock,
        }
    }

    /// 分配下一个事件 ID
    pub fn next_id(&self) -> EventId {
        self.next_id.fetch_add(1, Ordering::Relaxed)
    }

    /// 用新的 ID 和当前时间构造事件
    pub fn stamp(&self, payload: EventPayload) -> ReactionEvent {
        ReactionEvent::new(self.next_id(), self.clock.now(), payload)
    }

    pub fn clock(&self) -> &Arc<dyn Clock> {
        &self.clock
    }
}
