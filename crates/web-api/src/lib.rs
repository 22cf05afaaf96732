//! Web API 层。
//!
//! 提供 Axum 路由：WebSocket 接入广播中心，以及登录 cookie、头像上传与静态头像服务。

mod auth;
mod error;
mod routes;
mod state;
mod upload;
mod ws_connection;

pub use auth::{AuthCookie, CurrentUser};
pub use error::ApiError;
pub use routes::{router, LoginResponse};
pub use state::{build_avatar_chain, AppState};
pub use ws_connection::WebSocketTransport;
