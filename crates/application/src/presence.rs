use std::collections::HashSet;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use domain::{EventPayload, SessionId, Timestamp, UserStats};

use crate::{
    broadcaster::EventPublisher, error::ApplicationError, sequencer::EventSequencer,
};

#[derive(Debug, Default)]
struct PresenceState {
    active_sessions: HashSet<SessionId>,
    total_visits: u64,
    last_visit: Option<Timestamp>,
}

impl PresenceState {
    /// 在线人数只由活跃会话集合推导，不单独维护
    fn stats(&self) -> UserStats {
        UserStats {
            current_users: self.active_sessions.len(),
            total_visits: self.total_visits,
            last_visit: self.last_visit,
        }
    }
}

/// 在线状态跟踪器
/// 记录活跃的观众会话，每次加入/离开后向所有订阅者广播最新统计
pub struct PresenceTracker {
    state: Mutex<PresenceState>,
    sequencer: Arc<EventSequencer>,
    publisher: Arc<dyn EventPublisher>,
}

impl PresenceTracker {
    pub fn new(sequencer: Arc<EventSequencer>, publisher: Arc<dyn EventPublisher>) -> Self {
        Self {
            state: Mutex::new(PresenceState::default()),
            sequencer,
            publisher,
        }
    }

    fn state(&self) -> MutexGuard<'_, PresenceState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// 观众加入。同一会话重复加入不会重复计数。
    pub fn join(&self, session_id: Option<&str>) -> Result<UserStats, ApplicationError> {
        let session_id = SessionId::new(session_id)?;

        let (stats, first_join) = {
            let mut state = self.state();
            let first_join = state.active_sessions.insert(session_id.clone());
            if first_join {
                state.total_visits += 1;
                state.last_visit = Some(self.sequencer.clock().now());
            }
            let stats = state.stats();
            self.broadcast(&stats);
            (stats, first_join)
        };

        tracing::info!(
            session_id = %session_id,
            first_join,
            current_users = stats.current_users,
            "viewer joined"
        );

        Ok(stats)
    }

    /// 观众离开。未加入过的会话离开是无操作。
    pub fn leave(&self, session_id: Option<&str>) -> Result<UserStats, ApplicationError> {
        let session_id = SessionId::new(session_id)?;

        let (stats, was_active) = {
            let mut state = self.state();
            let was_active = state.active_sessions.remove(&session_id);
            let stats = state.stats();
            self.broadcast(&stats);
            (stats, was_active)
        };

        tracing::info!(
            session_id = %session_id,
            was_active,
            current_users = stats.current_users,
            "viewer left"
        );

        Ok(stats)
    }

    /// 只读快照，不广播
    pub fn snapshot(&self) -> UserStats {
        self.state().stats()
    }

    /// 必须在持有会话锁时调用，保证入队顺序与状态变更顺序一致
    fn broadcast(&self, stats: &UserStats) {
        let event = self.sequencer.stamp(EventPayload::PresenceUpdate {
            user_stats: stats.clone(),
        });
        self.publisher.publish(event);
    }
}
