//! Web API 层。
//!
//! 提供 Axum 路由，把 HTTP 请求和 SSE 长连接委托给应用层的用例服务。

mod error;
mod middleware;
mod payload;
mod routes;
mod state;
mod stream;

pub use error::{ApiError, ErrorBody};
pub use routes::{cors_layer, router};
pub use state::AppState;
