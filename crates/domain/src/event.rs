//! 广播事件模型
//!
//! 线上格式为一个扁平 JSON 对象：`{type, ...字段, timestamp, id}`。

use serde::{Deserialize, Serialize};

use crate::{
    stats::UserStats,
    value_objects::{BalloonType, Timestamp},
};

/// 事件 ID，进程内单调递增。
pub type EventId = u64;

/// 各类事件的负载
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "kebab-case")]
pub enum EventPayload {
    BalloonClick {
        #[serde(rename = "balloonType")]
        balloon_type: BalloonType,
    },
    UnderstandClick {
        #[serde(rename = "balloonType")]
        balloon_type: BalloonType,
    },
    TextMessage {
        message: String,
    },
    PresenceUpdate {
        #[serde(rename = "userStats")]
        user_stats: UserStats,
    },
}

impl EventPayload {
    /// 与线上 `type` 字段一致的名称，用于日志
    pub fn kind(&self) -> &'static str {
        match self {
            Self::BalloonClick { .. } => "balloon-click",
            Self::UnderstandClick { .. } => "understand-click",
            Self::TextMessage { .. } => "text-message",
            Self::PresenceUpdate { .. } => "presence-update",
        }
    }
}

/// 一次可广播的事件，创建后不可变。
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReactionEvent {
    #[serde(flatten)]
    pub payload: EventPayload,
    pub timestamp: Timestamp,
    pub id: EventId,
}

impl ReactionEvent {
    pub fn new(id: EventId, timestamp: Timestamp, payload: EventPayload) -> Self {
        Self {
            payload,
            timestamp,
            id,
        }
    }
}
