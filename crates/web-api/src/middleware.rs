use std::net::SocketAddr;

use axum::{
    extract::{ConnectInfo, Request, State},
    http::Method,
    middleware::Next,
    response::Response,
};

use crate::{error::ApiError, state::AppState};

/// 对所有写请求按来源限流，读请求直接放行
pub async fn rate_limit(
    State(state): State<AppState>,
    request: Request,
    next: Next,
) -> Result<Response, ApiError> {
    if matches!(*request.method(), Method::GET | Method::HEAD | Method::OPTIONS) {
        return Ok(next.run(request).await);
    }

    let source = source_key(&request);
    if let Err(err) = state.rate_limiter.check(&source) {
        tracing::warn!(source = %source, path = %request.uri().path(), "rate limit exceeded");
        return Err(err.into());
    }

    Ok(next.run(request).await)
}

/// 优先使用 `X-Forwarded-For` 的第一个地址，其次是对端 IP
fn source_key(request: &Request) -> String {
    let forwarded = request
        .headers()
        .get("x-forwarded-for")
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.split(',').next())
        .map(str::trim)
        .filter(|value| !value.is_empty());

    if let Some(address) = forwarded {
        return address.to_string();
    }

    request
        .extensions()
        .get::<ConnectInfo<SocketAddr>>()
        .map(|ConnectInfo(addr)| addr.ip().to_string())
        .unwrap_or_else(|| "unknown".to_string())
}
