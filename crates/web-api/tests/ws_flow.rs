mod support;

use std::time::Duration;

use futures_util::{SinkExt, StreamExt};
use reqwest::multipart::{Form, Part};
use serde_json::{json, Value};
use tokio::time::timeout;
use tokio_tungstenite::{
    connect_async,
    tungstenite::{client::IntoClientRequest, http::header::COOKIE, Message as TungsteniteMessage},
    MaybeTlsStream, WebSocketStream,
};

use support::{login, spawn_server, TestServer};

type Client = WebSocketStream<MaybeTlsStream<tokio::net::TcpStream>>;

async fn connect_with_cookie(server: &TestServer, cookie: &str) -> Client {
    let mut request = server.ws("/room").into_client_request().expect("request");
    request
        .headers_mut()
        .insert(COOKIE, cookie.parse().expect("cookie header"));
    let (stream, _) = connect_async(request).await.expect("websocket connect");
    stream
}

async fn next_json(client: &mut Client) -> Value {
    loop {
        let message = timeout(Duration::from_secs(2), client.next())
            .await
            .expect("message within timeout")
            .expect("stream open")
            .expect("websocket frame");
        if let TungsteniteMessage::Text(text) = message {
            return serde_json::from_str(text.as_str()).expect("json frame");
        }
    }
}

#[tokio::test]
async fn room_requires_auth_cookie() {
    let server = spawn_server().await;
    let result = connect_async(server.ws("/room")).await;
    assert!(result.is_err(), "upgrade without cookie must be rejected");
    assert!(server.hub.members().await.unwrap().is_empty());
}

#[tokio::test]
async fn websocket_broadcast_flow() {
    let server = spawn_server().await;
    let (ann_cookie, ann) = login(&server, "Ann", "ann@example.com").await;
    let (bob_cookie, _) = login(&server, "Bob", "bob@example.com").await;

    let mut ann_ws = connect_with_cookie(&server, &ann_cookie).await;
    let mut bob_ws = connect_with_cookie(&server, &bob_cookie).await;
    server.wait_for_members(2).await;

    ann_ws
        .send(TungsteniteMessage::Text(json!({ "body": "hello" }).to_string().into()))
        .await
        .expect("send");

    let expected_avatar = format!("//www.gravatar.com/avatar/{}", ann["userid"].as_str().unwrap());
    for client in [&mut ann_ws, &mut bob_ws] {
        let message = next_json(client).await;
        assert_eq!(message["sender_name"], "Ann");
        assert_eq!(message["body"], "hello");
        assert_eq!(message["avatar_url"], expected_avatar.as_str());
        assert!(message["timestamp"].is_string());
    }

    bob_ws.close(None).await.expect("close");
    server.wait_for_members(1).await;

    ann_ws
        .send(TungsteniteMessage::Text(json!({ "body": "alone" }).to_string().into()))
        .await
        .expect("send");
    assert_eq!(next_json(&mut ann_ws).await["body"], "alone");
}

#[tokio::test]
async fn malformed_frame_disconnects_sender() {
    let server = spawn_server().await;
    let (cookie, _) = login(&server, "Ann", "ann@example.com").await;

    let mut ws = connect_with_cookie(&server, &cookie).await;
    server.wait_for_members(1).await;

    ws.send(TungsteniteMessage::Text("not json".into()))
        .await
        .expect("send");
    server.wait_for_members(0).await;
}

#[tokio::test]
async fn uploaded_avatar_is_used_for_new_connections() {
    let server = spawn_server().await;
    let (cookie, ann) = login(&server, "Ann", "ann@example.com").await;
    let userid = ann["userid"].as_str().unwrap().to_string();

    let form = Form::new().text("userid", userid.clone()).part(
        "avatarFile",
        Part::bytes(vec![0x89, b'P', b'N', b'G']).file_name("me.png"),
    );
    let response = reqwest::Client::new()
        .post(server.http("/uploader"))
        .multipart(form)
        .send()
        .await
        .expect("upload");
    assert!(response.status().is_success());

    let mut ws = connect_with_cookie(&server, &cookie).await;
    server.wait_for_members(1).await;
    ws.send(TungsteniteMessage::Text(json!({ "body": "new face" }).to_string().into()))
        .await
        .expect("send");

    let message = next_json(&mut ws).await;
    assert_eq!(message["avatar_url"], format!("/avatars/{}.png", userid).as_str());
}
