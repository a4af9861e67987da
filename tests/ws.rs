use std::sync::Arc;

use tokio::{
    io::{AsyncReadExt, AsyncWriteExt},
    net::TcpStream as TokioTcpStream,
    sync::oneshot::{self, Sender},
};

use ws_rs::{
    context::Ctx,
    net::{listener::WsTcpListener, stream::WsStream},
    tcp::{handle_conn, ServerConfig},
    ws::{frame::Frame, handshake, opcode, status},
};

const SERVER_ADDR: &str = "127.0.0.1:10900";
const CLIENT_SERVER_ADDR: &str = "127.0.0.1:10901";

const UPGRADE_REQ: &[u8] = b"GET /chat HTTP/1.1\r\n\
    Host: server.example.com\r\n\
    Upgrade: websocket\r\n\
    Connection: Upgrade\r\n\
    Sec-WebSocket-Key: dGhlIHNhbXBsZSBub25jZQ==\r\n\
    Origin: http://example.com\r\n\
    Sec-WebSocket-Protocol: chat, superchat\r\n\
    Sec-WebSocket-Version: 13\r\n\
    \r\n";

// FIN=1, opcode=text, masked "Hello" (RFC 6455 §5.7).
const MASKED_HELLO: &[u8] = &[
    0x81, 0x85, 0x37, 0xFA, 0x21, 0x3D, 0x7F, 0x9F, 0x4D, 0x51, 0x58,
];

#[tokio::test]
async fn test_raw_handshake_and_echo() {
    let ctx = Arc::new(Ctx::new());
    let (tx, rx) = oneshot::channel::<()>();

    tokio::spawn(server(SERVER_ADDR, tx, ctx.clone()));
    rx.await.unwrap();

    let mut client = TokioTcpStream::connect(SERVER_ADDR).await.unwrap();

    // Upgrade with the RFC 6455 sample request.
    client.write_all(UPGRADE_REQ).await.unwrap();

    let mut buf = [0u8; 0x400];
    let n = client.read(&mut buf).await.unwrap();
    let rsp = std::str::from_utf8(&buf[..n]).unwrap();

    assert!(rsp.starts_with("HTTP/1.1 101 Switching Protocols\r\n"));
    assert!(rsp.contains("Upgrade: websocket\r\n"));
    assert!(rsp.contains("Connection: Upgrade\r\n"));
    assert!(rsp.contains(&format!(
        "Sec-WebSocket-Accept: {}\r\n",
        handshake::accept_key("dGhlIHNhbXBsZSBub25jZQ==")
    )));
    assert!(rsp.ends_with("\r\n\r\n"));

    assert_eq!(ctx.len(), 1);

    // A masked text frame comes back unmasked.
    client.write_all(MASKED_HELLO).await.unwrap();

    let mut echo = [0u8; 7];
    client.read_exact(&mut echo).await.unwrap();
    assert_eq!(&echo, b"\x81\x05Hello");

    // Close with status 1000; the server echoes it and hangs up.
    let close = [0x88, 0x82, 0x01, 0x02, 0x03, 0x04, 0x03 ^ 0x01, 0xE8 ^ 0x02];
    client.write_all(&close).await.unwrap();

    let mut reply = [0u8; 4];
    client.read_exact(&mut reply).await.unwrap();
    assert_eq!(&reply, &[0x88, 0x02, 0x03, 0xE8]);

    let n = client.read(&mut buf).await.unwrap();
    assert_eq!(n, 0);
}

#[tokio::test]
async fn test_client_conn() {
    let ctx = Arc::new(Ctx::new());
    let (tx, rx) = oneshot::channel::<()>();

    tokio::spawn(server(CLIENT_SERVER_ADDR, tx, ctx.clone()));
    rx.await.unwrap();

    let mut conn = WsStream::connect(CLIENT_SERVER_ADDR, "/chat", 0x1000)
        .await
        .unwrap();
    assert!(conn.is_open());

    // Client frames go out masked; the echo comes back in the clear.
    let mut frame = Frame::binary(vec![1, 2, 3, 4, 5]);
    frame.new_masking_key();
    frame.apply_mask();
    conn.write_frame(&frame).await.unwrap();

    let echo = conn.read_frame().await.unwrap();
    assert_eq!(echo.opcode, opcode::BINARY);
    assert!(!echo.masked);
    assert_eq!(echo.payload, [1, 2, 3, 4, 5]);

    conn.close(status::NORMAL_CLOSURE, "done").await.unwrap();

    let reply = conn.read_frame().await.unwrap();
    assert_eq!(reply.opcode, opcode::CLOSE);
    assert_eq!(&reply.payload, &status::NORMAL_CLOSURE.to_be_bytes());
}

async fn server(addr: &str, tx: Sender<()>, ctx: Arc<Ctx>) {
    let listener = WsTcpListener::bind(addr).await.unwrap();
    tx.send(()).unwrap();

    let config = ServerConfig {
        path: Some("/chat".to_owned()),
        ..ServerConfig::default()
    };

    let (stream, peer) = listener.accept().await.unwrap();
    handle_conn(stream, peer, config, ctx).await;
}
