//! 广播中心领域模型
//!
//! 包含连接身份、聊天消息的线格式，以及头像解析链。

pub mod avatar;
pub mod errors;
pub mod identity;
pub mod message;
pub mod value_objects;

// 重新导出常用类型
pub use avatar::{AuthAvatar, AvatarChain, AvatarResolver, FileSystemAvatar, GravatarAvatar};
pub use errors::DomainError;
pub use identity::{stable_id_from_email, Identity};
pub use message::{ChatMessage, IncomingMessage, MessageDraft};
pub use value_objects::{ConnectionId, Timestamp};
