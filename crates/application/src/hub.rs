//! 广播中心
//!
//! Hub 由单个任务独占连接注册表，加入、离开、广播都作为事件发送到同一个
//! 收件箱，按到达顺序逐个处理完毕后才处理下一个。注册表因此无需加锁，
//! 任何在时间上先发生的加入/离开都对其后的广播可见。

use std::collections::HashMap;
use std::sync::Arc;

use config::HubConfig;
use domain::{AvatarResolver, ChatMessage, ConnectionId, Identity, MessageDraft};
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tracing::{debug, info};

use crate::clock::{Clock, SystemClock};
use crate::connection::Connection;
use crate::error::HubError;
use crate::transport::Transport;

/// 连接的待发送队列接收端，只由该连接的出站泵读取
pub type Outbox = mpsc::Receiver<Arc<ChatMessage>>;

/// Hub 持有的连接句柄：连接 ID 与其待发送队列的写入端
///
/// 句柄在离开时被丢弃，写入端随之关闭，出站泵读完剩余消息后退出。
#[derive(Debug)]
pub struct ConnectionHandle {
    id: ConnectionId,
    outbox: mpsc::Sender<Arc<ChatMessage>>,
}

impl ConnectionHandle {
    pub fn new(id: ConnectionId, capacity: usize) -> (Self, Outbox) {
        let (outbox, receiver) = mpsc::channel(capacity.max(1));
        (Self { id, outbox }, receiver)
    }
}

/// Hub 收件箱中的事件
#[derive(Debug)]
enum HubEvent {
    Join(ConnectionHandle),
    Leave(ConnectionId),
    Broadcast(MessageDraft),
    /// 只读查询，不修改注册表
    Members(oneshot::Sender<Vec<ConnectionId>>),
}

/// 广播中心事件循环
pub struct Hub {
    inbox: mpsc::Receiver<HubEvent>,
    registry: HashMap<ConnectionId, mpsc::Sender<Arc<ChatMessage>>>,
    clock: Arc<dyn Clock>,
}

impl Hub {
    pub fn new(config: &HubConfig, clock: Arc<dyn Clock>) -> (Self, HubHandle) {
        let (sender, inbox) = mpsc::channel(config.inbox_capacity.max(1));
        let hub = Self {
            inbox,
            registry: HashMap::new(),
            clock,
        };
        let handle = HubHandle {
            sender,
            outbox_capacity: config.outbox_capacity,
        };
        (hub, handle)
    }

    /// 使用系统时钟创建 Hub 并在后台运行
    pub fn spawn(config: &HubConfig) -> HubHandle {
        Self::spawn_with_clock(config, Arc::new(SystemClock))
    }

    pub fn spawn_with_clock(config: &HubConfig, clock: Arc<dyn Clock>) -> HubHandle {
        let (hub, handle) = Self::new(config, clock);
        tokio::spawn(hub.run());
        handle
    }

    /// 事件循环：所有句柄被丢弃后结束
    pub async fn run(mut self) {
        info!("hub started");
        while let Some(event) = self.inbox.recv().await {
            self.handle(event).await;
        }
        info!(remaining = self.registry.len(), "hub stopped");
    }

    async fn handle(&mut self, event: HubEvent) {
        match event {
            HubEvent::Join(handle) => {
                self.registry.insert(handle.id, handle.outbox);
                info!(connection_id = %handle.id, connections = self.registry.len(), "new client joined");
            }
            HubEvent::Leave(id) => {
                // 移除即丢弃写入端，待发送队列关闭
                if self.registry.remove(&id).is_some() {
                    info!(connection_id = %id, connections = self.registry.len(), "client left");
                } else {
                    debug!(connection_id = %id, "leave for unknown connection ignored");
                }
            }
            HubEvent::Broadcast(draft) => {
                let message = Arc::new(draft.stamp(self.clock.now()));
                debug!(
                    sender = %message.sender_name,
                    recipients = self.registry.len(),
                    "broadcasting message"
                );
                for (id, outbox) in &self.registry {
                    // 阻塞式入队：队列满时在此等待，期间不处理任何其他事件
                    if outbox.send(message.clone()).await.is_err() {
                        debug!(connection_id = %id, "outbox already closed, awaiting leave");
                    } else {
                        debug!(connection_id = %id, "delivered to outbox");
                    }
                }
            }
            HubEvent::Members(reply) => {
                let _ = reply.send(self.registry.keys().copied().collect());
            }
        }
    }
}

/// 与 Hub 通信的句柄，可任意克隆
#[derive(Debug, Clone)]
pub struct HubHandle {
    sender: mpsc::Sender<HubEvent>,
    outbox_capacity: usize,
}

impl HubHandle {
    /// 注册连接；调用方不得重复加入同一连接
    pub async fn join(&self, handle: ConnectionHandle) -> Result<(), HubError> {
        self.send(HubEvent::Join(handle)).await
    }

    /// 移除连接并关闭其待发送队列；未注册的连接直接忽略
    pub async fn leave(&self, id: ConnectionId) -> Result<(), HubError> {
        self.send(HubEvent::Leave(id)).await
    }

    /// 提交一条消息，由 Hub 盖时间戳后扇出给所有已注册连接（包括发送者自己）
    pub async fn broadcast(&self, draft: MessageDraft) -> Result<(), HubError> {
        self.send(HubEvent::Broadcast(draft)).await
    }

    /// 当前已注册的连接
    pub async fn members(&self) -> Result<Vec<ConnectionId>, HubError> {
        let (reply, response) = oneshot::channel();
        self.send(HubEvent::Members(reply)).await?;
        response.await.map_err(|_| HubError::Closed)
    }

    /// 接入一个新传输：解析头像、注册到 Hub 并启动读写两个泵。
    ///
    /// 返回时加入事件已进入收件箱，之后提交的任何广播都会送达该连接。
    pub async fn accept<T: Transport>(
        &self,
        transport: T,
        identity: Identity,
        resolver: &dyn AvatarResolver,
    ) -> Result<JoinHandle<()>, HubError> {
        Connection::new(transport, identity, resolver, self.clone())
            .start()
            .await
    }

    pub fn outbox_capacity(&self) -> usize {
        self.outbox_capacity
    }

    async fn send(&self, event: HubEvent) -> Result<(), HubError> {
        self.sender.send(event).await.map_err(|_| HubError::Closed)
    }
}
