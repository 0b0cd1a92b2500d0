use domain::ReactionEvent;

/// 事件发布端。发布是"即发即忘"的：只负责入队，不等待投递结果。
pub trait EventPublisher: Send + Sync {
    fn publish(&self, event: ReactionEvent);
}
