//! 单元测试用的替身实现

use std::sync::Mutex;

use chrono::{TimeZone, Utc};
use domain::{ReactionEvent, Timestamp};

use crate::{broadcaster::EventPublisher, clock::Clock};

/// 始终返回同一时间的时钟
pub struct FixedClock(pub Timestamp);

impl Default for FixedClock {
    fn default() -> Self {
        Self(Utc.with_ymd_and_hms(2024, 5, 1, 12, 0, 0).unwrap())
    }
}

impl Clock for FixedClock {
    fn now(&self) -> Timestamp {
        self.0
    }
}

/// 记录所有发布事件的发布端
#[derive(Default)]
pub struct RecordingPublisher {
    events: Mutex<Vec<ReactionEvent>>,
}

impl RecordingPublisher {
    pub fn events(&self) -> Vec<ReactionEvent> {
        self.events.lock().unwrap().clone()
    }
}

impl EventPublisher for RecordingPublisher {
    fn publish(&self, event: ReactionEvent) {
        self.events.lock().unwrap().push(event);
    }
}
