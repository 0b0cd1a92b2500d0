use std::sync::Arc;

use domain::{BalloonType, ClickCount, EventPayload, MessageText};
use serde::Serialize;
use serde_json::Value;

use crate::{broadcaster::EventPublisher, error::ApplicationError, sequencer::EventSequencer};

/// 输入限制
#[derive(Debug, Clone)]
pub struct ReactionLimits {
    pub message_max_chars: usize,
    pub max_clicks_per_request: u32,
}

impl Default for ReactionLimits {
    fn default() -> Self {
        Self {
            message_max_chars: 120,
            max_clicks_per_request: 100,
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct BalloonClickRequest {
    pub balloon_type: Option<String>,
    pub clicks: Option<Value>,
}

#[derive(Debug, Clone, Default)]
pub struct UnderstandClickRequest {
    pub clicks: Option<Value>,
}

/// 点击请求的处理结果
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ClickReceipt {
    pub balloon_type: BalloonType,
    pub clicks: ClickCount,
}

/// 反应事件生产者：气球点击、"听懂了"点击和文字消息
pub struct ReactionService {
    sequencer: Arc<EventSequencer>,
    publisher: Arc<dyn EventPublisher>,
    limits: ReactionLimits,
}

impl ReactionService {
    pub fn new(
        sequencer: Arc<EventSequencer>,
        publisher: Arc<dyn EventPublisher>,
        limits: ReactionLimits,
    ) -> Self {
        Self {
            sequencer,
            publisher,
            limits,
        }
    }

    /// 点击几次就发几个独立事件，每个事件有自己的 ID 和时间戳
    pub fn balloon_click(&self, request: BalloonClickRequest) -> ClickReceipt {
        let balloon_type = BalloonType::from_raw(request.balloon_type.as_deref());
        let clicks = ClickCount::coerce(request.clicks.as_ref(), self.limits.max_clicks_per_request);

        for _ in 0..clicks.get() {
            self.publisher.publish(self.sequencer.stamp(EventPayload::BalloonClick {
                balloon_type: balloon_type.clone(),
            }));
        }

        tracing::info!(balloon_type = %balloon_type, clicks = clicks.get(), "balloon click");
        ClickReceipt {
            balloon_type,
            clicks,
        }
    }

    pub fn understand_click(&self, request: UnderstandClickRequest) -> ClickReceipt {
        let balloon_type = BalloonType::understand();
        let clicks = ClickCount::coerce(request.clicks.as_ref(), self.limits.max_clicks_per_request);

        for _ in 0..clicks.get() {
            self.publisher.publish(self.sequencer.stamp(EventPayload::UnderstandClick {
                balloon_type: balloon_type.clone(),
            }));
        }

        tracing::info!(clicks = clicks.get(), "understand click");
        ClickReceipt {
            balloon_type,
            clicks,
        }
    }

    /// 校验并广播文字消息，返回去除首尾空白后的内容
    pub fn send_message(&self, message: Option<&str>) -> Result<MessageText, ApplicationError> {
        let text = MessageText::new(message, self.limits.message_max_chars)?;

        self.publisher.publish(self.sequencer.stamp(EventPayload::TextMessage {
            message: text.as_str().to_string(),
        }));

        tracing::info!(chars = text.as_str().chars().count(), "text message broadcast");
        Ok(text)
    }
}
