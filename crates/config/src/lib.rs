//! 统一配置中心
//!
//! 提供广播中心服务的全局配置，包括：
//! - 监听地址
//! - Hub 队列容量
//! - 头像解析链
//! - 认证 cookie
//!
//! 加载顺序：默认值 -> 可选配置文件（APP_CONFIG_FILE）-> 环境变量（APP_*，`__` 分隔层级）

use figment::{
    providers::{Env, Format, Json, Serialized, Toml, Yaml},
    Figment,
};
use serde::{Deserialize, Serialize};
use validator::Validate;

/// 全局应用配置
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct AppConfig {
    /// 服务配置
    #[validate(nested)]
    pub server: ServerConfig,
    /// Hub 配置
    #[validate(nested)]
    pub hub: HubConfig,
    /// 头像配置
    #[validate(nested)]
    pub avatar: AvatarConfig,
    /// 认证配置
    #[validate(nested)]
    pub auth: AuthConfig,
}

/// 服务器配置
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct ServerConfig {
    #[validate(length(min = 1))]
    pub host: String,
    #[validate(range(min = 1))]
    pub port: u16,
}

/// Hub 配置
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct HubConfig {
    /// 每个连接的待发送队列容量
    #[validate(range(min = 1))]
    pub outbox_capacity: usize,
    /// Hub 事件收件箱容量
    #[validate(range(min = 1))]
    pub inbox_capacity: usize,
}

/// 头像解析策略
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AvatarSource {
    /// 认证服务提供的头像
    Auth,
    /// 由稳定 ID 拼出的 Gravatar 地址
    Gravatar,
    /// 本地上传目录
    FileSystem,
}

/// 头像配置
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct AvatarConfig {
    /// 上传头像所在目录
    #[validate(length(min = 1))]
    pub directory: String,
    /// 对外提供上传头像的 URL 前缀
    #[validate(length(min = 1))]
    pub url_prefix: String,
    #[validate(length(min = 1))]
    pub gravatar_base: String,
    /// 按顺序尝试的解析策略
    #[serde(default)]
    pub chain: Vec<AvatarSource>,
}

/// 认证配置
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct AuthConfig {
    #[validate(length(min = 1))]
    pub cookie_name: String,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            server: ServerConfig {
                host: "127.0.0.1".into(),
                port: 8080,
            },
            hub: HubConfig {
                outbox_capacity: 256,
                inbox_capacity: 64,
            },
            avatar: AvatarConfig {
                directory: "avatars".into(),
                url_prefix: "/avatars/".into(),
                gravatar_base: "//www.gravatar.com".into(),
                chain: vec![
                    AvatarSource::FileSystem,
                    AvatarSource::Auth,
                    AvatarSource::Gravatar,
                ],
            },
            auth: AuthConfig {
                cookie_name: "auth".into(),
            },
        }
    }
}

impl AppConfig {
    /// 按默认值 -> 配置文件 -> 环境变量的优先级加载并校验配置
    pub fn load() -> Result<Self, ConfigError> {
        Self::from_figment(Self::figment())
    }

    /// 构建配置来源，便于调用方追加自定义 provider
    pub fn figment() -> Figment {
        let mut fig = Figment::new().merge(Serialized::defaults(AppConfig::default()));
        if let Ok(path) = std::env::var("APP_CONFIG_FILE") {
            if path.ends_with(".yml") || path.ends_with(".yaml") {
                fig = fig.merge(Yaml::file(path));
            } else if path.ends_with(".json") {
                fig = fig.merge(Json::file(path));
            } else {
                fig = fig.merge(Toml::file(path));
            }
        }
        fig.merge(Env::prefixed("APP_").split("__"))
    }

    pub fn from_figment(figment: Figment) -> Result<Self, ConfigError> {
        let cfg: AppConfig = figment.extract().map_err(Box::new)?;
        cfg.validate()?;
        Ok(cfg)
    }

    /// 监听地址，形如 `127.0.0.1:8080`
    pub fn bind_addr(&self) -> String {
        format!("{}:{}", self.server.host, self.server.port)
    }
}

/// 配置错误类型
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("failed to load configuration: {0}")]
    Load(#[from] Box<figment::Error>),
    #[error("invalid configuration: {0}")]
    Invalid(#[from] validator::ValidationErrors),
}
