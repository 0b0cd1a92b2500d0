use serde::{Deserialize, Serialize};

use crate::value_objects::{Timestamp, Title};

/// 在线统计快照。`current_users` 始终由活跃会话集合的大小推导。
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserStats {
    pub current_users: usize,
    pub total_visits: u64,
    pub last_visit: Option<Timestamp>,
}

/// 全局应用设置
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AppSettings {
    pub title: Title,
}
