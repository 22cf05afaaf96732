use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use domain::{AvatarResolver, ChatMessage, ConnectionId, Identity, IncomingMessage, MessageDraft};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::error::HubError;
use crate::hub::{ConnectionHandle, HubHandle};
use crate::transport::{FrameSink, FrameSource, Transport};

/// 单个客户端连接
///
/// 把一个外部双工传输桥接到 Hub：
/// - 入站泵读取帧、解码并提交广播
/// - 出站泵从待发送队列取消息并写回传输
///
/// 任一泵先结束都会触发清理：离开 Hub 恰好一次、关闭传输恰好一次。
pub struct Connection<T: Transport> {
    id: ConnectionId,
    identity: Identity,
    avatar_url: String,
    transport: T,
    hub: HubHandle,
}

impl<T: Transport> Connection<T> {
    /// 创建连接；头像在此解析一次并缓存，之后的每条消息都复用
    pub fn new(
        transport: T,
        identity: Identity,
        resolver: &dyn AvatarResolver,
        hub: HubHandle,
    ) -> Self {
        let avatar_url = resolver.resolve(&identity).unwrap_or_default();
        Self::with_avatar_url(transport, identity, avatar_url, hub)
    }

    /// 使用调用方已解析好的头像创建连接
    pub fn with_avatar_url(
        transport: T,
        identity: Identity,
        avatar_url: String,
        hub: HubHandle,
    ) -> Self {
        Self {
            id: ConnectionId::new(),
            identity,
            avatar_url,
            transport,
            hub,
        }
    }

    /// 注册到 Hub 并启动两个泵，返回等待两个泵都结束的任务
    pub async fn start(self) -> Result<JoinHandle<()>, HubError> {
        let (handle, outbox) = ConnectionHandle::new(self.id, self.hub.outbox_capacity());
        let (source, mut sink) = self.transport.split();

        if let Err(err) = self.hub.join(handle).await {
            warn!(connection_id = %self.id, error = %err, "failed to register connection");
            if let Err(err) = sink.close().await {
                debug!(connection_id = %self.id, error = %err, "failed to close transport");
            }
            return Err(err);
        }

        info!(
            connection_id = %self.id,
            name = %self.identity.display_name,
            "connection established"
        );

        let lifecycle = Arc::new(Lifecycle::new(self.id, self.hub));
        let inbound = tokio::spawn(inbound_pump(
            source,
            lifecycle.clone(),
            self.identity.display_name,
            self.avatar_url,
        ));
        let outbound = tokio::spawn(outbound_pump(sink, outbox, lifecycle));
        let id = self.id;

        Ok(tokio::spawn(async move {
            let (inbound, outbound) = tokio::join!(inbound, outbound);
            if let Err(err) = inbound {
                warn!(connection_id = %id, error = %err, "inbound pump aborted");
            }
            if let Err(err) = outbound {
                warn!(connection_id = %id, error = %err, "outbound pump aborted");
            }
            info!(connection_id = %id, "connection closed");
        }))
    }

    /// 运行连接直到两个泵都结束
    pub async fn run(self) {
        let id = self.id;
        if let Ok(task) = self.start().await {
            if let Err(err) = task.await {
                warn!(connection_id = %id, error = %err, "connection task aborted");
            }
        }
    }
}

/// 两个泵共享的清理状态
struct Lifecycle {
    id: ConnectionId,
    hub: HubHandle,
    released: AtomicBool,
    shutdown: CancellationToken,
}

impl Lifecycle {
    fn new(id: ConnectionId, hub: HubHandle) -> Self {
        Self {
            id,
            hub,
            released: AtomicBool::new(false),
            shutdown: CancellationToken::new(),
        }
    }

    /// 离开 Hub 并通知另一个泵，多次调用只生效一次
    async fn release(&self, reason: &'static str) {
        if self.released.swap(true, Ordering::AcqRel) {
            return;
        }
        info!(connection_id = %self.id, reason, "connection closing");
        self.shutdown.cancel();
        if let Err(err) = self.hub.leave(self.id).await {
            warn!(connection_id = %self.id, error = %err, "failed to leave hub");
        }
    }
}

async fn inbound_pump<S: FrameSource>(
    mut source: S,
    lifecycle: Arc<Lifecycle>,
    sender_name: String,
    avatar_url: String,
) {
    let id = lifecycle.id;
    let reason = loop {
        let frame = tokio::select! {
            _ = lifecycle.shutdown.cancelled() => break "shutdown",
            frame = source.read_frame() => frame,
        };

        match frame {
            Ok(Some(frame)) => match IncomingMessage::from_frame(&frame) {
                Ok(incoming) => {
                    let draft = MessageDraft::new(&sender_name, incoming.body, &avatar_url);
                    if let Err(err) = lifecycle.hub.broadcast(draft).await {
                        warn!(connection_id = %id, error = %err, "failed to submit message");
                        break "hub closed";
                    }
                }
                Err(err) => {
                    warn!(connection_id = %id, error = %err, "dropping connection after malformed frame");
                    break "malformed frame";
                }
            },
            Ok(None) => break "peer closed",
            Err(err) => {
                warn!(connection_id = %id, error = %err, "transport read failed");
                break "read error";
            }
        }
    };

    debug!(connection_id = %id, reason, "inbound pump finished");
    lifecycle.release(reason).await;
}

async fn outbound_pump<K: FrameSink>(
    mut sink: K,
    mut outbox: mpsc::Receiver<Arc<ChatMessage>>,
    lifecycle: Arc<Lifecycle>,
) {
    let id = lifecycle.id;
    let reason = loop {
        let message = tokio::select! {
            _ = lifecycle.shutdown.cancelled() => break "shutdown",
            message = outbox.recv() => message,
        };
        let Some(message) = message else {
            break "outbox closed";
        };
        let frame = match message.to_frame() {
            Ok(frame) => frame,
            Err(err) => {
                warn!(connection_id = %id, error = %err, "failed to encode message");
                continue;
            }
        };
        // 入站泵先结束时，正在阻塞的写入也要放弃，传输才能及时关闭
        let written = tokio::select! {
            _ = lifecycle.shutdown.cancelled() => break "shutdown",
            written = sink.write_frame(frame) => written,
        };
        if let Err(err) = written {
            warn!(connection_id = %id, error = %err, "transport write failed");
            break "write error";
        }
    };

    // 先丢弃接收端，正在向这里入队的 Hub 会立即失败而不是阻塞
    drop(outbox);
    debug!(connection_id = %id, reason, "outbound pump finished");
    lifecycle.release(reason).await;

    // 写端只由出站泵持有，传输在这里关闭且只关闭一次
    if let Err(err) = sink.close().await {
        debug!(connection_id = %id, error = %err, "failed to close transport");
    }
}
