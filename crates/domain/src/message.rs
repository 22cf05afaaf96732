use serde::{Deserialize, Serialize};

use crate::errors::DomainError;
use crate::value_objects::Timestamp;

/// 客户端发来的帧内容
///
/// 只读取 `body`，其余字段（例如客户端伪造的发送者名）一律忽略，
/// 发送者信息始终来自连接身份。
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct IncomingMessage {
    pub body: String,
}

impl IncomingMessage {
    pub fn from_frame(frame: &[u8]) -> Result<Self, DomainError> {
        serde_json::from_slice(frame).map_err(|err| DomainError::malformed_frame(err.to_string()))
    }
}

/// 尚未盖时间戳的消息，由入站泵提交给 Hub
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MessageDraft {
    pub sender_name: String,
    pub body: String,
    pub avatar_url: String,
}

impl MessageDraft {
    pub fn new(
        sender_name: impl Into<String>,
        body: impl Into<String>,
        avatar_url: impl Into<String>,
    ) -> Self {
        Self {
            sender_name: sender_name.into(),
            body: body.into(),
            avatar_url: avatar_url.into(),
        }
    }

    /// Hub 在扇出时盖上时间戳，所有接收者看到同一个时间
    pub fn stamp(self, timestamp: Timestamp) -> ChatMessage {
        ChatMessage {
            sender_name: self.sender_name,
            body: self.body,
            avatar_url: self.avatar_url,
            timestamp,
        }
    }
}

/// 广播给所有连接的消息，线格式为 JSON 对象
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub sender_name: String,
    pub body: String,
    /// 未解析到头像时为空字符串
    pub avatar_url: String,
    pub timestamp: Timestamp,
}

impl ChatMessage {
    pub fn to_frame(&self) -> Result<Vec<u8>, DomainError> {
        serde_json::to_vec(self).map_err(|err| DomainError::encode(err.to_string()))
    }

    pub fn from_frame(frame: &[u8]) -> Result<Self, DomainError> {
        serde_json::from_slice(frame).map_err(|err| DomainError::malformed_frame(err.to_string()))
    }
}
