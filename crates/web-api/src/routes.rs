use axum::{
    body::Bytes,
    extract::State,
    http::StatusCode,
    middleware,
    routing::{get, post, MethodRouter},
    Json, Router,
};
use serde::Serialize;
use tower_http::{
    cors::{AllowOrigin, Any, CorsLayer},
    trace::TraceLayer,
};

use application::{BalloonClickRequest, ClickReceipt, DispatchSnapshot, UnderstandClickRequest};
use domain::{AppSettings, UserStats};

use crate::{
    error::ApiError, middleware::rate_limit, payload::LenientBody, state::AppState,
    stream::stream_events,
};

#[derive(Debug, Serialize)]
struct ClickResponse {
    success: bool,
    #[serde(flatten)]
    receipt: ClickReceipt,
}

#[derive(Debug, Serialize)]
struct MessageResponse {
    success: bool,
    message: String,
}

#[derive(Debug, Serialize)]
struct SettingsResponse {
    success: bool,
    settings: AppSettings,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct PresenceResponse {
    success: bool,
    user_stats: UserStats,
    #[serde(skip_serializing_if = "Option::is_none")]
    session_id: Option<String>,
}

#[derive(Debug, Serialize)]
struct HealthResponse {
    status: &'static str,
    subscribers: usize,
    #[serde(flatten)]
    dispatch: DispatchSnapshot,
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/stream", with_405(get(stream_events)))
        .route("/reactions/balloon", limited(post(balloon_click), &state))
        .route("/reactions/understand", limited(post(understand_click), &state))
        .route("/messages", limited(post(send_message), &state))
        .route(
            "/settings",
            limited(get(get_settings).post(update_settings), &state),
        )
        .route("/presence/join", limited(post(join_presence), &state))
        .route("/presence/leave", limited(post(leave_presence), &state))
        .route("/presence", with_405(get(presence_stats)))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// 按配置的来源构建 CORS 层；包含 `*` 时放行任意来源
pub fn cors_layer(origins: &[String]) -> CorsLayer {
    let allow_origin = if origins.is_empty() || origins.iter().any(|origin| origin == "*") {
        AllowOrigin::any()
    } else {
        AllowOrigin::list(origins.iter().filter_map(|origin| origin.parse().ok()))
    };

    CorsLayer::new()
        .allow_origin(allow_origin)
        .allow_methods(Any)
        .allow_headers(Any)
}

fn with_405(route: MethodRouter<AppState>) -> MethodRouter<AppState> {
    route.fallback(method_not_allowed)
}

/// 限流只包住已注册的方法，405 回退不消耗配额
fn limited(route: MethodRouter<AppState>, state: &AppState) -> MethodRouter<AppState> {
    with_405(route.route_layer(middleware::from_fn_with_state(state.clone(), rate_limit)))
}

async fn method_not_allowed() -> ApiError {
    ApiError::method_not_allowed()
}

async fn health(State(state): State<AppState>) -> (StatusCode, Json<HealthResponse>) {
    (
        StatusCode::OK,
        Json(HealthResponse {
            status: "ok",
            subscribers: state.registry.count(),
            dispatch: state.dispatch_stats(),
        }),
    )
}

async fn balloon_click(State(state): State<AppState>, body: Bytes) -> Json<ClickResponse> {
    let body = LenientBody::parse(&body);
    let receipt = state.reactions.balloon_click(BalloonClickRequest {
        balloon_type: body.str("balloonType").map(str::to_string),
        clicks: body.get("clicks").cloned(),
    });

    Json(ClickResponse {
        success: true,
        receipt,
    })
}

async fn understand_click(State(state): State<AppState>, body: Bytes) -> Json<ClickResponse> {
    let body = LenientBody::parse(&body);
    let receipt = state.reactions.understand_click(UnderstandClickRequest {
        clicks: body.get("clicks").cloned(),
    });

    Json(ClickResponse {
        success: true,
        receipt,
    })
}

async fn send_message(
    State(state): State<AppState>,
    body: Bytes,
) -> Result<Json<MessageResponse>, ApiError> {
    let body = LenientBody::parse(&body);
    let text = state.reactions.send_message(body.str("message"))?;

    Ok(Json(MessageResponse {
        success: true,
        message: text.into_inner(),
    }))
}

async fn get_settings(State(state): State<AppState>) -> Json<SettingsResponse> {
    Json(SettingsResponse {
        success: true,
        settings: state.settings.current(),
    })
}

async fn update_settings(
    State(state): State<AppState>,
    body: Bytes,
) -> Result<Json<SettingsResponse>, ApiError> {
    let body = LenientBody::parse(&body);
    let settings = state.settings.update_title(body.str("title"))?;

    Ok(Json(SettingsResponse {
        success: true,
        settings,
    }))
}

async fn join_presence(
    State(state): State<AppState>,
    body: Bytes,
) -> Result<Json<PresenceResponse>, ApiError> {
    let body = LenientBody::parse(&body);
    let session_id = body.id_string("sessionId");
    let user_stats = state.presence.join(session_id.as_deref())?;

    Ok(Json(PresenceResponse {
        success: true,
        user_stats,
        session_id,
    }))
}

async fn leave_presence(
    State(state): State<AppState>,
    body: Bytes,
) -> Result<Json<PresenceResponse>, ApiError> {
    let body = LenientBody::parse(&body);
    let session_id = body.id_string("sessionId");
    let user_stats = state.presence.leave(session_id.as_deref())?;

    Ok(Json(PresenceResponse {
        success: true,
        user_stats,
        session_id: None,
    }))
}

async fn presence_stats(State(state): State<AppState>) -> Json<PresenceResponse> {
    Json(PresenceResponse {
        success: true,
        user_stats: state.presence.snapshot(),
        session_id: None,
    })
}
