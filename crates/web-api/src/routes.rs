use axum::{
    extract::State,
    http::{header, HeaderMap},
    response::{IntoResponse, Redirect, Response},
    routing::{get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use tower_http::{services::ServeDir, trace::TraceLayer};
use validator::Validate;

use domain::{stable_id_from_email, Identity};

use crate::{
    auth::{expired_cookie_header, AuthCookie, CurrentUser},
    error::ApiError,
    state::AppState,
    upload::upload_avatar,
    ws_connection::room_handler,
};

#[derive(Debug, Deserialize, Validate)]
struct LoginPayload {
    #[validate(length(min = 1, max = 64))]
    name: String,
    #[validate(email)]
    email: String,
    #[serde(default)]
    avatar_url: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct LoginResponse {
    pub userid: String,
    pub name: String,
    pub avatar_url: String,
}

#[derive(Debug, Serialize)]
struct ChatPage {
    name: String,
    userid: String,
    avatar_url: String,
    host: String,
}

#[derive(Debug, Serialize)]
struct LoginPage {
    message: &'static str,
    login_url: &'static str,
    method: &'static str,
}

#[derive(Debug, Serialize)]
struct HealthResponse {
    status: &'static str,
    connections: usize,
}

pub fn router(state: AppState) -> Router {
    let mut router = Router::new()
        .route("/health", get(health))
        .route("/login", get(login_page))
        .route("/auth/login", post(login))
        .route("/logout", get(logout))
        .route("/chat", get(chat))
        .route("/uploader", post(upload_avatar))
        .route("/room", get(room_handler));

    if let Some(prefix) = avatar_mount_path(&state.config.avatar.url_prefix) {
        router = router.nest_service(&prefix, ServeDir::new(&state.config.avatar.directory));
    }

    router.layer(TraceLayer::new_for_http()).with_state(state)
}

/// 头像 URL 前缀对应的挂载路径；非绝对路径（例如指向外部 CDN）时不挂载
fn avatar_mount_path(url_prefix: &str) -> Option<String> {
    let trimmed = url_prefix.trim_end_matches('/');
    if trimmed.starts_with('/') && trimmed.len() > 1 {
        Some(trimmed.to_string())
    } else {
        None
    }
}

async fn health(State(state): State<AppState>) -> Result<Json<HealthResponse>, ApiError> {
    let members = state.hub.members().await?;
    Ok(Json(HealthResponse {
        status: "ok",
        connections: members.len(),
    }))
}

/// 未登录用户的落地页，指向登录接口
async fn login_page() -> Json<LoginPage> {
    Json(LoginPage {
        message: "Sign in to join the chat",
        login_url: "/auth/login",
        method: "POST",
    })
}

/// 开发用登录：用邮箱派生稳定 id 并写入认证 cookie
async fn login(
    State(state): State<AppState>,
    Json(payload): Json<LoginPayload>,
) -> Result<Response, ApiError> {
    payload.validate()?;

    let cookie = AuthCookie {
        userid: stable_id_from_email(&payload.email),
        name: payload.name.trim().to_string(),
        avatar_url: payload.avatar_url.unwrap_or_default(),
    };
    let identity = cookie.clone().into_identity();
    let avatar_url = state.resolve_avatar(&identity).await;
    tracing::info!(userid = %cookie.userid, name = %cookie.name, "user logged in");

    let body = LoginResponse {
        userid: cookie.userid.clone(),
        name: cookie.name.clone(),
        avatar_url,
    };
    let set_cookie = cookie.set_cookie_header(state.cookie_name());
    Ok(([(header::SET_COOKIE, set_cookie)], Json(body)).into_response())
}

async fn logout(State(state): State<AppState>) -> Response {
    (
        [(header::SET_COOKIE, expired_cookie_header(state.cookie_name()))],
        Redirect::temporary("/chat"),
    )
        .into_response()
}

/// 聊天页面数据；未登录时跳转到登录页
async fn chat(
    State(state): State<AppState>,
    headers: HeaderMap,
    user: Result<CurrentUser, ApiError>,
) -> Response {
    let Ok(CurrentUser(identity)) = user else {
        return Redirect::temporary("/login").into_response();
    };

    let avatar_url = state.resolve_avatar(&identity).await;
    let host = headers
        .get(header::HOST)
        .and_then(|value| value.to_str().ok())
        .map(str::to_string)
        .unwrap_or_else(|| state.config.bind_addr());
    let Identity {
        display_name,
        stable_id,
        ..
    } = identity;

    Json(ChatPage {
        name: display_name,
        userid: stable_id,
        avatar_url,
        host,
    })
    .into_response()
}
