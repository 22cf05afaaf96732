//! 传输层抽象
//!
//! 连接只依赖按帧读写的双工流，具体实现（WebSocket、内存通道）由外层提供。
//! 读写两个泵并发运行，因此传输必须能拆成独立的读端和写端。

use async_trait::async_trait;

use crate::error::TransportError;

/// 帧读取端
#[async_trait]
pub trait FrameSource: Send + 'static {
    /// 读取下一帧；对端正常关闭时返回 `Ok(None)`
    async fn read_frame(&mut self) -> Result<Option<Vec<u8>>, TransportError>;
}

/// 帧写入端
#[async_trait]
pub trait FrameSink: Send + 'static {
    async fn write_frame(&mut self, frame: Vec<u8>) -> Result<(), TransportError>;

    async fn close(&mut self) -> Result<(), TransportError>;
}

/// 可拆分的双工传输
pub trait Transport: Send + 'static {
    type Source: FrameSource;
    type Sink: FrameSink;

    fn split(self) -> (Self::Source, Self::Sink);
}

/// 基于内存通道的传输实现（用于测试）
pub mod memory {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    use domain::ChatMessage;
    use tokio::sync::mpsc;

    /// 创建一对相连的传输与对端。
    ///
    /// `capacity` 是服务端到对端方向的缓冲大小；对端不读取时，写满后
    /// 服务端的写操作会阻塞，可以用来模拟慢消费者。
    pub fn pair(capacity: usize) -> (MemoryTransport, MemoryPeer) {
        let (to_server_tx, to_server_rx) = mpsc::channel(capacity.max(1));
        let (to_peer_tx, to_peer_rx) = mpsc::channel(capacity.max(1));
        let closes = Arc::new(AtomicUsize::new(0));

        let transport = MemoryTransport {
            source: MemorySource {
                inbound: to_server_rx,
            },
            sink: MemorySink {
                outbound: Some(to_peer_tx),
                closes: closes.clone(),
            },
        };
        let peer = MemoryPeer {
            to_server: Some(to_server_tx),
            from_server: to_peer_rx,
            closes,
        };
        (transport, peer)
    }

    pub struct MemoryTransport {
        source: MemorySource,
        sink: MemorySink,
    }

    impl Transport for MemoryTransport {
        type Source = MemorySource;
        type Sink = MemorySink;

        fn split(self) -> (Self::Source, Self::Sink) {
            (self.source, self.sink)
        }
    }

    pub struct MemorySource {
        inbound: mpsc::Receiver<Result<Vec<u8>, TransportError>>,
    }

    #[async_trait]
    impl FrameSource for MemorySource {
        async fn read_frame(&mut self) -> Result<Option<Vec<u8>>, TransportError> {
            match self.inbound.recv().await {
                Some(Ok(frame)) => Ok(Some(frame)),
                Some(Err(err)) => Err(err),
                None => Ok(None),
            }
        }
    }

    pub struct MemorySink {
        outbound: Option<mpsc::Sender<Vec<u8>>>,
        closes: Arc<AtomicUsize>,
    }

    #[async_trait]
    impl FrameSink for MemorySink {
        async fn write_frame(&mut self, frame: Vec<u8>) -> Result<(), TransportError> {
            let outbound = self.outbound.as_ref().ok_or(TransportError::Closed)?;
            outbound
                .send(frame)
                .await
                .map_err(|_| TransportError::Closed)
        }

        async fn close(&mut self) -> Result<(), TransportError> {
            self.closes.fetch_add(1, Ordering::SeqCst);
            self.outbound.take();
            Ok(())
        }
    }

    /// 测试中扮演远端客户端
    pub struct MemoryPeer {
        to_server: Option<mpsc::Sender<Result<Vec<u8>, TransportError>>>,
        from_server: mpsc::Receiver<Vec<u8>>,
        closes: Arc<AtomicUsize>,
    }

    impl MemoryPeer {
        pub async fn send_frame(&self, frame: impl Into<Vec<u8>>) -> Result<(), TransportError> {
            let to_server = self.to_server.as_ref().ok_or(TransportError::Closed)?;
            to_server
                .send(Ok(frame.into()))
                .await
                .map_err(|_| TransportError::Closed)
        }

        /// 发送一条只含正文的消息帧
        pub async fn send_body(&self, body: &str) -> Result<(), TransportError> {
            let frame = serde_json::json!({ "body": body }).to_string();
            self.send_frame(frame).await
        }

        /// 让服务端下一次读取失败
        pub async fn fail_read(&self, err: TransportError) -> Result<(), TransportError> {
            let to_server = self.to_server.as_ref().ok_or(TransportError::Closed)?;
            to_server
                .send(Err(err))
                .await
                .map_err(|_| TransportError::Closed)
        }

        /// 模拟对端关闭：服务端读到 EOF
        pub fn disconnect(&mut self) {
            self.to_server.take();
        }

        /// 接收下一帧；服务端关闭写端后返回 `None`
        pub async fn recv_frame(&mut self) -> Option<Vec<u8>> {
            self.from_server.recv().await
        }

        /// 接收并解码下一条消息；帧无法解码时视为流结束
        pub async fn recv_message(&mut self) -> Option<ChatMessage> {
            let frame = self.recv_frame().await?;
            ChatMessage::from_frame(&frame).ok()
        }

        /// 停止接收：此后服务端写入会失败
        pub fn stop_reading(&mut self) {
            self.from_server.close();
        }

        /// 服务端调用 `close` 的次数
        pub fn close_count(&self) -> usize {
            self.closes.load(Ordering::SeqCst)
        }
    }
}
