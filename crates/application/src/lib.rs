//! 应用层实现。
//!
//! 广播中心的并发核心：单任务独占的连接注册表（Hub）、每个连接的读写泵，
//! 以及连接所依赖的传输抽象。

pub mod clock;
pub mod connection;
pub mod error;
pub mod hub;
pub mod transport;

pub use clock::{Clock, ManualClock, SystemClock};
pub use connection::Connection;
pub use error::{HubError, TransportError};
pub use hub::{ConnectionHandle, Hub, HubHandle, Outbox};
pub use transport::{FrameSink, FrameSource, Transport};
