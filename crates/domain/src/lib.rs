//! 互动反应广播系统核心领域模型
//!
//! 包含广播事件、会话标识、输入值对象以及在线统计等纯数据类型，
//! 不做任何 I/O。

pub mod errors;
pub mod event;
pub mod stats;
pub mod value_objects;

// 重新导出常用类型
pub use errors::*;
pub use event::*;
pub use stats::*;
pub use value_objects::*;
