//! WebSocket 传输适配
//!
//! 把 axum 的 `WebSocket` 拆成读端和写端，交给应用层的 `Connection` 驱动。

use application::{Connection, FrameSink, FrameSource, Transport, TransportError};
use async_trait::async_trait;
use axum::{
    extract::{
        ws::{Message as WsMessage, WebSocket, WebSocketUpgrade},
        State,
    },
    response::Response,
};
use futures_util::{
    stream::{SplitSink, SplitStream},
    SinkExt, StreamExt,
};

use crate::{auth::CurrentUser, state::AppState};

/// 基于 WebSocket 的双工传输
pub struct WebSocketTransport {
    socket: WebSocket,
}

impl WebSocketTransport {
    pub fn new(socket: WebSocket) -> Self {
        Self { socket }
    }
}

impl Transport for WebSocketTransport {
    type Source = WsSource;
    type Sink = WsSink;

    fn split(self) -> (Self::Source, Self::Sink) {
        let (sender, receiver) = self.socket.split();
        (WsSource { receiver }, WsSink { sender })
    }
}

pub struct WsSource {
    receiver: SplitStream<WebSocket>,
}

#[async_trait]
impl FrameSource for WsSource {
    async fn read_frame(&mut self) -> Result<Option<Vec<u8>>, TransportError> {
        loop {
            match self.receiver.next().await {
                Some(Ok(WsMessage::Text(text))) => return Ok(Some(text.as_str().as_bytes().to_vec())),
                Some(Ok(WsMessage::Binary(data))) => return Ok(Some(data.to_vec())),
                // 心跳帧由底层协议栈应答，不属于消息
                Some(Ok(WsMessage::Ping(_))) | Some(Ok(WsMessage::Pong(_))) => continue,
                Some(Ok(WsMessage::Close(_))) | None => return Ok(None),
                Some(Err(err)) => return Err(TransportError::failed(err.to_string())),
            }
        }
    }
}

pub struct WsSink {
    sender: SplitSink<WebSocket, WsMessage>,
}

#[async_trait]
impl FrameSink for WsSink {
    async fn write_frame(&mut self, frame: Vec<u8>) -> Result<(), TransportError> {
        let message = match String::from_utf8(frame) {
            Ok(text) => WsMessage::Text(text.into()),
            Err(err) => WsMessage::Binary(err.into_bytes().into()),
        };
        self.sender
            .send(message)
            .await
            .map_err(|err| TransportError::failed(err.to_string()))
    }

    async fn close(&mut self) -> Result<(), TransportError> {
        self.sender
            .close()
            .await
            .map_err(|err| TransportError::failed(err.to_string()))
    }
}

/// `GET /room`：已登录用户升级为 WebSocket 并加入广播
pub async fn room_handler(
    State(state): State<AppState>,
    CurrentUser(identity): CurrentUser,
    ws: WebSocketUpgrade,
) -> Response {
    ws.on_upgrade(move |socket| async move {
        tracing::debug!(name = %identity.display_name, "websocket upgraded");
        let avatar_url = state.resolve_avatar(&identity).await;
        Connection::with_avatar_url(
            WebSocketTransport::new(socket),
            identity,
            avatar_url,
            state.hub.clone(),
        )
        .run()
        .await;
    })
}
