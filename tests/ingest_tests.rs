//! Ingest end-to-end tests
//!
//! A real gateway on an ephemeral port, tokio-tungstenite consumers on the
//! ingest socket and a mock realtime backend.

mod support;

use futures::{SinkExt, StreamExt};
use std::time::Duration;
use tokio_tungstenite::tungstenite::Message;

use support::{
    MockBackend, connect_ingest, mulaw_frames, next_binary, pcm16_silence, spawn_gateway,
    test_config, wait_until,
};

const WAIT: Duration = Duration::from_secs(5);

/// 20 μ-law frames produce exactly one `response.create`; a response made of
/// two deltas comes back as one μ-law clip.
#[tokio::test]
async fn test_mulaw_call_round_trip() {
    let backend = MockBackend::with_reply(vec![pcm16_silence(480), pcm16_silence(480)]).await;
    let (addr, _state) = spawn_gateway(test_config(&backend.url)).await;

    let mut ws = connect_ingest(addr, "callId=call-1&enc=mulaw&sr=8000&oenc=mulaw&osr=8000").await;
    for frame in mulaw_frames(20) {
        ws.send(Message::Binary(frame.into())).await.unwrap();
    }

    let clip = next_binary(&mut ws, WAIT).await.expect("no downstream clip");
    // 960 samples at 24 kHz become 320 μ-law bytes at 8 kHz
    assert_eq!(clip.len(), 320);
    assert!(clip.iter().all(|&b| b == 0xFF));

    assert!(wait_until(WAIT, || backend.count("input_audio_buffer.append") == 20).await);
    tokio::time::sleep(Duration::from_millis(200)).await;
    assert_eq!(backend.count("response.create"), 1);
    assert!(backend.count("input_audio_buffer.commit") >= 1);
    assert!(next_binary(&mut ws, Duration::from_millis(200)).await.is_none());

    let events = backend.events();
    assert_eq!(events[0]["type"], "session.update");
    assert_eq!(
        events[0]["session"]["input_audio_format"]["encoding"],
        "pcm16"
    );
    let append = events
        .iter()
        .find(|e| e["type"] == "input_audio_buffer.append")
        .unwrap();
    // 20 ms of PCM16 at 24 kHz, base64 encoded
    assert_eq!(append["audio"].as_str().unwrap().len(), 1280);

    assert_eq!(backend.api_keys(), vec!["test-key".to_string()]);
    let uri = &backend.uris()[0];
    assert!(uri.contains("deployment=test-deployment"));
    assert!(uri.contains("api-version=2024-10-01-preview"));
}

#[tokio::test]
async fn test_wrong_secret_closed_with_policy_violation() {
    let backend = MockBackend::start().await;
    let mut config = test_config(&backend.url);
    config.gateway_secret = Some("s3cret".to_string());
    let (addr, state) = spawn_gateway(config).await;

    let mut ws = connect_ingest(addr, "callId=call-x&secret=wrong").await;
    let msg = tokio::time::timeout(WAIT, ws.next())
        .await
        .unwrap()
        .unwrap()
        .unwrap();
    match msg {
        Message::Close(Some(frame)) => {
            assert_eq!(u16::from(frame.code), 1008);
            assert_eq!(frame.reason.as_str(), "unauthorized");
        }
        other => panic!("expected close frame, got {other:?}"),
    }

    assert!(state.sessions.is_empty());
    assert!(!state.sessions.contains("call-x"));
    assert_eq!(backend.total_connections(), 0);
}

#[tokio::test]
async fn test_wrong_secret_with_malformed_query_still_closed_1008() {
    let backend = MockBackend::start().await;
    let mut config = test_config(&backend.url);
    config.gateway_secret = Some("s3cret".to_string());
    let (addr, state) = spawn_gateway(config).await;

    let mut ws = connect_ingest(addr, "callId=a&callId=b&secret=wrong").await;
    let msg = tokio::time::timeout(WAIT, ws.next())
        .await
        .unwrap()
        .unwrap()
        .unwrap();
    match msg {
        Message::Close(Some(frame)) => {
            assert_eq!(u16::from(frame.code), 1008);
            assert_eq!(frame.reason.as_str(), "unauthorized");
        }
        other => panic!("expected close frame, got {other:?}"),
    }
    assert!(state.sessions.is_empty());
}

#[tokio::test]
async fn test_authorized_malformed_query_is_bad_request() {
    let backend = MockBackend::start().await;
    let (addr, state) = spawn_gateway(test_config(&backend.url)).await;

    let result =
        tokio_tungstenite::connect_async(format!("ws://{addr}/ingest?callId=a&callId=b")).await;
    match result {
        Err(tokio_tungstenite::tungstenite::Error::Http(response)) => {
            assert_eq!(response.status().as_u16(), 400);
        }
        Err(e) => panic!("expected HTTP 400, got {e}"),
        Ok(_) => panic!("expected HTTP 400, upgrade succeeded"),
    }
    assert!(state.sessions.is_empty());
}

#[tokio::test]
async fn test_correct_secret_in_header_is_accepted() {
    use tokio_tungstenite::tungstenite::client::IntoClientRequest;

    let backend = MockBackend::start().await;
    let mut config = test_config(&backend.url);
    config.gateway_secret = Some("s3cret".to_string());
    let (addr, state) = spawn_gateway(config).await;

    let mut request = format!("ws://{addr}/ingest?callId=call-h")
        .into_client_request()
        .unwrap();
    request
        .headers_mut()
        .insert("x-gateway-secret", "s3cret".parse().unwrap());
    let (_ws, _) = tokio_tungstenite::connect_async(request).await.unwrap();

    assert!(wait_until(WAIT, || state.sessions.contains("call-h")).await);
}

/// Both consumers of one call get the same response, each in its own format.
#[tokio::test]
async fn test_two_consumers_each_receive_one_clip() {
    let backend = MockBackend::with_reply(vec![pcm16_silence(480), pcm16_silence(480)]).await;
    let (addr, state) = spawn_gateway(test_config(&backend.url)).await;

    let mut a = connect_ingest(addr, "callId=call-2&enc=mulaw&sr=8000&oenc=mulaw&osr=8000").await;
    let mut b = connect_ingest(addr, "callId=call-2&enc=mulaw&sr=8000&oenc=pcm16&osr=24000").await;
    assert!(wait_until(WAIT, || state.sessions.client_count("call-2") == 2).await);
    assert_eq!(state.sessions.len(), 1);

    for frame in mulaw_frames(15) {
        a.send(Message::Binary(frame.into())).await.unwrap();
    }

    let clip_a = next_binary(&mut a, WAIT).await.expect("consumer a got nothing");
    let clip_b = next_binary(&mut b, WAIT).await.expect("consumer b got nothing");
    assert_eq!(clip_a.len(), 320);
    assert_eq!(clip_b.len(), 1920);

    assert!(next_binary(&mut a, Duration::from_millis(300)).await.is_none());
    assert!(next_binary(&mut b, Duration::from_millis(100)).await.is_none());
    assert_eq!(backend.total_connections(), 1);
}

#[tokio::test]
async fn test_last_disconnect_tears_down_session() {
    let backend = MockBackend::start().await;
    let (addr, state) = spawn_gateway(test_config(&backend.url)).await;

    let mut ws = connect_ingest(addr, "callId=call-3").await;
    assert!(wait_until(WAIT, || state.sessions.contains("call-3")).await);
    assert!(wait_until(WAIT, || backend.open_connections() == 1).await);

    ws.close(None).await.unwrap();

    assert!(wait_until(WAIT, || !state.sessions.contains("call-3")).await);
    assert!(wait_until(WAIT, || backend.open_connections() == 0).await);
    assert!(state.sessions.is_empty());
}

#[tokio::test]
async fn test_close_control_closes_backend_but_keeps_session() {
    let backend = MockBackend::start().await;
    let (addr, state) = spawn_gateway(test_config(&backend.url)).await;

    let mut ws = connect_ingest(addr, "callId=call-4").await;
    assert!(wait_until(WAIT, || backend.open_connections() == 1).await);

    ws.send(Message::Text(r#"{"type":"close"}"#.into()))
        .await
        .unwrap();

    assert!(wait_until(WAIT, || backend.open_connections() == 0).await);
    assert!(state.sessions.contains("call-4"));
    assert_eq!(backend.total_connections(), 1);
}

#[tokio::test]
async fn test_say_requests_response_with_literal_text() {
    let backend = MockBackend::start().await;
    let (addr, _state) = spawn_gateway(test_config(&backend.url)).await;

    let mut ws = connect_ingest(addr, "callId=call-5").await;
    assert!(wait_until(WAIT, || backend.count("session.update") == 1).await);

    ws.send(Message::Text(r#"{"type":"ping"}"#.into()))
        .await
        .unwrap();
    ws.send(Message::Text("not json".into())).await.unwrap();
    ws.send(Message::Text(
        r#"{"type":"say","text":"Please hold while I check."}"#.into(),
    ))
    .await
    .unwrap();

    assert!(wait_until(WAIT, || backend.count("response.create") == 1).await);
    let create = backend
        .events()
        .into_iter()
        .find(|e| e["type"] == "response.create")
        .unwrap();
    assert_eq!(
        create["response"]["instructions"],
        "Please hold while I check."
    );
    assert_eq!(create["response"]["modalities"][0], "audio");
    assert_eq!(create["response"]["audio"]["voice"], "alloy");
}

#[tokio::test]
async fn test_shutdown_all_closes_consumers() {
    let backend = MockBackend::start().await;
    let (addr, state) = spawn_gateway(test_config(&backend.url)).await;

    let mut ws = connect_ingest(addr, "callId=call-6").await;
    assert!(wait_until(WAIT, || state.sessions.contains("call-6")).await);

    state.sessions.shutdown_all();

    let close = loop {
        match tokio::time::timeout(WAIT, ws.next()).await.unwrap() {
            Some(Ok(Message::Close(frame))) => break frame,
            Some(Ok(_)) => continue,
            other => panic!("expected close frame, got {other:?}"),
        }
    };
    assert_eq!(u16::from(close.unwrap().code), 1001);
    assert!(state.sessions.is_empty());
}
