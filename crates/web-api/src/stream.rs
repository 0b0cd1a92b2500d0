use std::convert::Infallible;

use axum::{
    extract::State,
    response::sse::{Event, KeepAlive, Sse},
};
use futures_util::{Stream, StreamExt};

use crate::state::AppState;

/// GET /stream - 长连接事件流
///
/// 每个事件是一帧 `data: {json}`；连接空闲时定期发送 `:ping` 注释保活。
/// 客户端断开后响应体被丢弃，订阅随之从注册表注销。
pub async fn stream_events(
    State(state): State<AppState>,
) -> Sse<impl Stream<Item = Result<Event, Infallible>>> {
    let subscription = state.registry.register();
    tracing::debug!(subscriber_id = %subscription.id(), "event stream opened");

    let events = subscription.map(|frame| Ok(Event::default().data(frame)));

    Sse::new(events).keep_alive(KeepAlive::new().interval(state.keep_alive).text("ping"))
}
