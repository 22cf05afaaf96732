use thiserror::Error;

/// Hub 句柄操作错误
///
/// Hub 自身没有可失败的操作，唯一的失败是事件循环已经停止。
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum HubError {
    #[error("hub is no longer running")]
    Closed,
}

/// 传输层错误，只影响所属的单个连接
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TransportError {
    #[error("transport closed")]
    Closed,
    #[error("transport failure: {0}")]
    Failed(String),
}

impl TransportError {
    pub fn failed(message: impl Into<String>) -> Self {
        Self::Failed(message.into())
    }
}
