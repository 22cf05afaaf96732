//! 领域模型错误定义

use thiserror::Error;

/// 领域模型错误类型
#[derive(Error, Debug, Clone, PartialEq)]
pub enum DomainError {
    /// 入站帧无法解码为消息
    #[error("malformed frame: {message}")]
    MalformedFrame { message: String },

    /// 消息无法编码为出站帧
    #[error("failed to encode message: {message}")]
    Encode { message: String },
}

impl DomainError {
    pub fn malformed_frame(message: impl Into<String>) -> Self {
        Self::MalformedFrame {
            message: message.into(),
        }
    }

    pub fn encode(message: impl Into<String>) -> Self {
        Self::Encode {
            message: message.into(),
        }
    }
}
