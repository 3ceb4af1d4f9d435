// Integration tests for the websocket session, driven by a real client
// against a server bound to an ephemeral port.

mod common;

use anyhow::{anyhow, Result};
use base64::Engine;
use common::{text_ingest, Fakes, Harness};
use futures::{SinkExt, StreamExt};
use serde_json::{json, Value};
use std::net::SocketAddr;
use std::time::Duration;
use tokio::net::{TcpListener, TcpStream};
use tokio_tungstenite::{connect_async, tungstenite::protocol::Message, MaybeTlsStream, WebSocketStream};
use voice_relay::config::DeliveryConfig;
use voice_relay::http::{create_router, AppState};

type Socket = WebSocketStream<MaybeTlsStream<TcpStream>>;

const RECV_TIMEOUT: Duration = Duration::from_secs(3);

async fn serve(harness: &Harness, delivery: DeliveryConfig) -> Result<SocketAddr> {
    let state = AppState::new(harness.coordinator.clone(), text_ingest(), delivery);
    let app = create_router(state);

    let listener = TcpListener::bind("127.0.0.1:0").await?;
    let addr = listener.local_addr()?;
    tokio::spawn(async move {
        let _ = axum::serve(listener, app).await;
    });

    Ok(addr)
}

async fn connect(addr: SocketAddr) -> Result<Socket> {
    let (socket, _) = connect_async(format!("ws://{}/ws", addr)).await?;
    Ok(socket)
}

/// Connect and consume the greeting every connection gets
async fn connect_joined(addr: SocketAddr) -> Result<(Socket, Value)> {
    let mut socket = connect(addr).await?;
    let joined = recv_json(&mut socket).await?;
    assert_eq!(joined["type"], "joined");
    Ok((socket, joined))
}

async fn send_json(socket: &mut Socket, value: Value) -> Result<()> {
    socket.send(Message::Text(value.to_string())).await?;
    Ok(())
}

async fn recv_json(socket: &mut Socket) -> Result<Value> {
    loop {
        let frame = tokio::time::timeout(RECV_TIMEOUT, socket.next())
            .await
            .map_err(|_| anyhow!("timed out waiting for a server message"))?
            .ok_or_else(|| anyhow!("socket closed"))??;

        match frame {
            Message::Text(text) => return Ok(serde_json::from_str(&text)?),
            Message::Close(_) => return Err(anyhow!("server closed the socket")),
            _ => continue,
        }
    }
}

/// Nothing but control frames arrive within `window`
async fn assert_silent(socket: &mut Socket, window: Duration) {
    let deadline = tokio::time::Instant::now() + window;
    while let Ok(Some(frame)) = tokio::time::timeout_at(deadline, socket.next()).await {
        if let Ok(Message::Text(text)) = frame {
            panic!("unexpected message: {}", text);
        }
    }
}

fn voice_input(text: &str) -> Value {
    json!({
        "type": "voice_input",
        "audioBytes": base64::engine::general_purpose::STANDARD.encode(text),
    })
}

#[tokio::test]
async fn test_connect_joins_with_default_language() -> Result<()> {
    let harness = Harness::new().await?;
    let addr = serve(&harness, DeliveryConfig::default()).await?;

    let (_socket, joined) = connect_joined(addr).await?;

    assert_eq!(joined["language"], "en");
    assert!(joined["listenerId"].as_str().is_some());
    assert_eq!(harness.registry().len(), 1);
    assert_eq!(harness.registry().counts_by_language().get("en"), Some(&1));

    Ok(())
}

#[tokio::test]
async fn test_join_and_set_language() -> Result<()> {
    let harness = Harness::new().await?;
    let addr = serve(&harness, DeliveryConfig::default()).await?;
    let (mut socket, greeting) = connect_joined(addr).await?;

    send_json(&mut socket, json!({ "type": "join", "language": "xx" })).await?;
    let joined = recv_json(&mut socket).await?;
    assert_eq!(joined["type"], "joined");
    assert_eq!(joined["language"], "en");
    assert_eq!(joined["listenerId"], greeting["listenerId"]);

    send_json(&mut socket, json!({ "type": "set_language", "language": "ES" })).await?;
    let set = recv_json(&mut socket).await?;
    assert_eq!(set["type"], "language_set");
    assert_eq!(set["language"], "es");

    send_json(&mut socket, json!({ "type": "set_language", "language": "tlh" })).await?;
    let rejected = recv_json(&mut socket).await?;
    assert_eq!(rejected["type"], "error");
    assert_eq!(rejected["code"], "unsupported_language");

    // The failed change left the previous language in place
    assert_eq!(harness.registry().counts_by_language().get("es"), Some(&1));
    assert_eq!(harness.registry().len(), 1);

    Ok(())
}

#[tokio::test]
async fn test_invalid_message_keeps_connection_open() -> Result<()> {
    let harness = Harness::new().await?;
    let addr = serve(&harness, DeliveryConfig::default()).await?;
    let (mut socket, _) = connect_joined(addr).await?;

    socket.send(Message::Text("{not json".to_string())).await?;
    let error = recv_json(&mut socket).await?;
    assert_eq!(error["type"], "error");
    assert_eq!(error["code"], "invalid_message");

    send_json(&mut socket, json!({ "type": "dance" })).await?;
    let error = recv_json(&mut socket).await?;
    assert_eq!(error["code"], "invalid_message");

    send_json(&mut socket, json!({ "type": "set_language", "language": "fr" })).await?;
    let set = recv_json(&mut socket).await?;
    assert_eq!(set["type"], "language_set");

    Ok(())
}

#[tokio::test]
async fn test_voice_input_accepted_or_rejected() -> Result<()> {
    let harness = Harness::new().await?;
    let addr = serve(&harness, DeliveryConfig::default()).await?;
    let (mut socket, _) = connect_joined(addr).await?;

    send_json(&mut socket, voice_input("hello")).await?;
    let accepted = recv_json(&mut socket).await?;
    assert_eq!(accepted["type"], "accepted");
    assert!(accepted["utteranceId"].as_str().is_some());

    send_json(
        &mut socket,
        json!({ "type": "voice_input", "audioBytes": "%%% not base64 %%%" }),
    )
    .await?;
    let rejected = recv_json(&mut socket).await?;
    assert_eq!(rejected["type"], "error");
    assert_eq!(rejected["code"], "ingest_error");

    send_json(&mut socket, json!({ "type": "voice_input", "audioBytes": "" })).await?;
    let rejected = recv_json(&mut socket).await?;
    assert_eq!(rejected["code"], "ingest_error");

    // Raw binary frames are voice input too
    socket.send(Message::Binary(b"binary hello".to_vec())).await?;
    let accepted = recv_json(&mut socket).await?;
    assert_eq!(accepted["type"], "accepted");

    Ok(())
}

#[tokio::test]
async fn test_full_speaker_queue_rejects_voice_input() -> Result<()> {
    let harness = Harness::with_fakes(Fakes::with_slow_delay(Duration::from_millis(500))).await?;
    // Gives each run a slow translation to wait on
    let (_, _rx) = harness.listener("es");
    let delivery = DeliveryConfig {
        queue_capacity: 1,
        ..DeliveryConfig::default()
    };
    let addr = serve(&harness, delivery).await?;
    let (mut socket, _) = connect_joined(addr).await?;

    for i in 0..4 {
        send_json(&mut socket, voice_input(&format!("slow {}", i))).await?;
    }

    let mut accepted = 0;
    let mut rejected = 0;
    for _ in 0..4 {
        let reply = recv_json(&mut socket).await?;
        match reply["type"].as_str() {
            Some("accepted") => accepted += 1,
            Some("error") => {
                assert_eq!(reply["code"], "ingest_error");
                rejected += 1;
            }
            other => panic!("unexpected reply {:?}", other),
        }
    }

    // One run in flight plus one queued at most
    assert!((1..=2).contains(&accepted), "accepted {}", accepted);
    assert_eq!(accepted + rejected, 4);

    Ok(())
}

#[tokio::test]
async fn test_speaker_queues_are_per_connection() -> Result<()> {
    let harness = Harness::with_fakes(Fakes::with_slow_delay(Duration::from_millis(500))).await?;
    let (_, _rx) = harness.listener("fr");
    let delivery = DeliveryConfig {
        queue_capacity: 1,
        ..DeliveryConfig::default()
    };
    let addr = serve(&harness, delivery).await?;

    let (mut busy, _) = connect_joined(addr).await?;
    for i in 0..3 {
        send_json(&mut busy, voice_input(&format!("slow {}", i))).await?;
    }
    let mut busy_rejected = 0;
    for _ in 0..3 {
        if recv_json(&mut busy).await?["type"] == "error" {
            busy_rejected += 1;
        }
    }
    assert!(busy_rejected >= 1);

    // A second connection has its own queue, even while the first is full
    let (mut other, _) = connect_joined(addr).await?;
    send_json(&mut other, voice_input("slow other")).await?;
    assert_eq!(recv_json(&mut other).await?["type"], "accepted");

    Ok(())
}

#[tokio::test]
async fn test_speaker_is_not_sent_its_own_translations() -> Result<()> {
    let harness = Harness::new().await?;
    let addr = serve(&harness, DeliveryConfig::default()).await?;

    let (mut listener_es, _) = connect_joined(addr).await?;
    send_json(&mut listener_es, json!({ "type": "join", "language": "es" })).await?;
    assert_eq!(recv_json(&mut listener_es).await?["language"], "es");

    let (mut listener_fr, _) = connect_joined(addr).await?;
    send_json(&mut listener_fr, json!({ "type": "set_language", "language": "fr" })).await?;
    assert_eq!(recv_json(&mut listener_fr).await?["type"], "language_set");

    let (mut speaker, _) = connect_joined(addr).await?;
    send_json(&mut speaker, voice_input("hello")).await?;
    let accepted = recv_json(&mut speaker).await?;
    assert_eq!(accepted["type"], "accepted");

    let es = recv_json(&mut listener_es).await?;
    assert_eq!(es["type"], "translation_output");
    assert_eq!(es["translatedText"], "es:hello");
    assert_eq!(es["utteranceId"], accepted["utteranceId"]);

    let fr = recv_json(&mut listener_fr).await?;
    assert_eq!(fr["translatedText"], "fr:hello");

    // No English partition was created for the speaker
    assert_eq!(
        harness.fakes.translate_calls(),
        vec![
            ("hello".to_string(), "es".to_string()),
            ("hello".to_string(), "fr".to_string()),
        ]
    );
    assert_silent(&mut speaker, Duration::from_millis(200)).await;
    assert_eq!(harness.registry().len(), 2);

    // Listening again requires an explicit join
    send_json(&mut speaker, json!({ "type": "set_language", "language": "de" })).await?;
    assert_eq!(recv_json(&mut speaker).await?["code"], "unknown_listener");
    send_json(&mut speaker, json!({ "type": "join", "language": "de" })).await?;
    assert_eq!(recv_json(&mut speaker).await?["language"], "de");
    assert_eq!(harness.registry().len(), 3);

    Ok(())
}

#[tokio::test]
async fn test_speaker_that_joined_keeps_listening() -> Result<()> {
    let harness = Harness::new().await?;
    let addr = serve(&harness, DeliveryConfig::default()).await?;

    let (mut speaker, _) = connect_joined(addr).await?;
    send_json(&mut speaker, json!({ "type": "join", "language": "de" })).await?;
    assert_eq!(recv_json(&mut speaker).await?["language"], "de");

    send_json(&mut speaker, voice_input("guten tag")).await?;

    // The acknowledgement and the delivery may arrive in either order
    let mut types = vec![
        recv_json(&mut speaker).await?["type"].clone(),
        recv_json(&mut speaker).await?["type"].clone(),
    ];
    types.sort_by_key(|t| t.to_string());
    assert_eq!(types, vec![json!("accepted"), json!("translation_output")]);

    assert_eq!(
        harness.fakes.translate_calls(),
        vec![("guten tag".to_string(), "de".to_string())]
    );
    assert_eq!(harness.registry().len(), 1);

    Ok(())
}

#[tokio::test]
async fn test_closed_connection_leaves_registry() -> Result<()> {
    let harness = Harness::new().await?;
    let addr = serve(&harness, DeliveryConfig::default()).await?;

    let (mut first, _) = connect_joined(addr).await?;
    let (_second, _) = connect_joined(addr).await?;
    assert_eq!(harness.registry().len(), 2);

    first.close(None).await?;

    let deadline = tokio::time::Instant::now() + RECV_TIMEOUT;
    while harness.registry().len() != 1 {
        assert!(
            tokio::time::Instant::now() < deadline,
            "closed connection is still registered"
        );
        tokio::time::sleep(Duration::from_millis(10)).await;
    }

    Ok(())
}
