use data_encoding::HEXLOWER;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

/// 连接的用户身份
///
/// 由上游认证协作者在连接建立前生成，连接生命周期内不可变。
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Identity {
    pub display_name: String,
    /// 稳定唯一标识，通常是邮箱的哈希
    pub stable_id: String,
    /// 认证服务预先提供的头像地址
    #[serde(default)]
    pub avatar_url: Option<String>,
}

impl Identity {
    pub fn new(display_name: impl Into<String>, stable_id: impl Into<String>) -> Self {
        Self {
            display_name: display_name.into(),
            stable_id: stable_id.into(),
            avatar_url: None,
        }
    }

    pub fn with_avatar_url(mut self, avatar_url: impl Into<String>) -> Self {
        self.avatar_url = Some(avatar_url.into());
        self
    }
}

/// 由邮箱推导稳定 ID：去除首尾空白并转小写后取 SHA-256 十六进制摘要。
///
/// Gravatar 接受同样格式的哈希，因此该 ID 可直接拼入头像地址。
pub fn stable_id_from_email(email: &str) -> String {
    let normalized = email.trim().to_lowercase();
    HEXLOWER.encode(&Sha256::digest(normalized.as_bytes()))
}
