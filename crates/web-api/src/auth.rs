//! 认证 cookie 边界
//!
//! 上游认证流程把用户信息写入 cookie：JSON `{userid, name, avatar_url}`
//! 经 base64 编码后作为 cookie 值。这里只负责读写该 cookie，不做任何鉴权。

use axum::{
    extract::FromRequestParts,
    http::{header, request::Parts, HeaderMap},
};
use data_encoding::BASE64;
use domain::Identity;
use serde::{Deserialize, Serialize};

use crate::{error::ApiError, state::AppState};

/// cookie 中携带的用户数据
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuthCookie {
    pub userid: String,
    pub name: String,
    #[serde(default)]
    pub avatar_url: String,
}

impl AuthCookie {
    pub fn encode(&self) -> String {
        // 序列化一个只含字符串字段的结构不会失败
        let json = serde_json::to_vec(self).unwrap_or_default();
        BASE64.encode(&json)
    }

    pub fn decode(value: &str) -> Result<Self, ApiError> {
        let data = BASE64
            .decode(value.as_bytes())
            .map_err(|_| ApiError::unauthorized("Malformed auth cookie"))?;
        serde_json::from_slice(&data).map_err(|_| ApiError::unauthorized("Malformed auth cookie"))
    }

    pub fn into_identity(self) -> Identity {
        let identity = Identity::new(self.name, self.userid);
        if self.avatar_url.is_empty() {
            identity
        } else {
            identity.with_avatar_url(self.avatar_url)
        }
    }

    /// 生成 `Set-Cookie` 头的值
    pub fn set_cookie_header(&self, cookie_name: &str) -> String {
        format!("{}={}; Path=/; HttpOnly; SameSite=Lax", cookie_name, self.encode())
    }
}

/// 让浏览器立即删除 cookie 的 `Set-Cookie` 头的值
pub fn expired_cookie_header(cookie_name: &str) -> String {
    format!("{}=; Path=/; Max-Age=0", cookie_name)
}

/// 从请求头中取出指定名称的 cookie 值
pub fn cookie_value(headers: &HeaderMap, name: &str) -> Option<String> {
    headers
        .get_all(header::COOKIE)
        .iter()
        .filter_map(|value| value.to_str().ok())
        .flat_map(|value| value.split(';'))
        .filter_map(|pair| pair.trim().split_once('='))
        .find(|(key, _)| *key == name)
        .map(|(_, value)| value.to_string())
}

/// 已登录用户，从认证 cookie 中解析
#[derive(Debug, Clone)]
pub struct CurrentUser(pub Identity);

impl FromRequestParts<AppState> for CurrentUser {
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, Self::Rejection> {
        let value = cookie_value(&parts.headers, state.cookie_name())
            .filter(|value| !value.is_empty())
            .ok_or_else(|| ApiError::unauthorized("Missing auth cookie"))?;
        let cookie = AuthCookie::decode(&value)?;
        Ok(CurrentUser(cookie.into_identity()))
    }
}
