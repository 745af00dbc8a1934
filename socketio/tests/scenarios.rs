//! End-to-end scenario tests driven through the in-memory mock transport
//! (see spec §8's seed scenarios), exercising the session engine's
//! dispatch/ack/namespace logic without any real socket.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use bytes::Bytes;
use engineio::transport::mock::MockTransport;
use engineio::{EngineIoConfig, EngineIoSession, Packet as EnginePacket, Transport};
use serde_json::json;
use socketio::builder::ack_callback;
use socketio::packet::{PacketType, SocketPacket};
use socketio::Client;

fn test_session() -> EngineIoSession {
    EngineIoSession {
        id: "test-sid".to_string(),
        ping_interval: Duration::from_secs(25),
        ping_timeout: Duration::from_secs(60),
        upgrades: vec![],
    }
}

fn client_with_mock() -> (Arc<Client>, Arc<MockTransport>) {
    let mock = Arc::new(MockTransport::new());
    let transport: Arc<dyn Transport> = mock.clone();
    let client = Client::from_parts(transport, test_session(), EngineIoConfig::default());
    (client, mock)
}

fn outbound_message_text(packets: &[EnginePacket]) -> Vec<String> {
    packets
        .iter()
        .filter_map(|p| match p {
            EnginePacket::Message(data) => Some(String::from_utf8(data.to_vec()).unwrap()),
            _ => None,
        })
        .collect()
}

#[tokio::test]
async fn emit_with_payload_serializes_expected_wire_text() {
    let (client, mock) = client_with_mock();

    client
        .emit("emit_with_payload", vec![json!({"xxx": "yyy"})], None, None)
        .await
        .unwrap();

    let outbound = mock.take_outbound();
    let texts = outbound_message_text(&outbound);
    assert_eq!(texts, vec![r#"2["emit_with_payload",{"xxx":"yyy"}]"#]);
}

#[tokio::test]
async fn emit_with_no_args_has_no_path_or_ack_id() {
    let (client, mock) = client_with_mock();

    client.emit("x", vec![], None, None).await.unwrap();

    let outbound = mock.take_outbound();
    assert_eq!(outbound_message_text(&outbound), vec![r#"2["x"]"#]);
}

#[tokio::test]
async fn namespace_connect_sends_connect_packet_and_unblocks_define() {
    let (client, mock) = client_with_mock();

    // Server's reply to our outbound Connect(/news) arrives before we
    // start waiting for it, exercising the already-queued-inbound path.
    mock.push_inbound(EnginePacket::Message(Bytes::from(
        SocketPacket::connect(Some("/news".to_string()))
            .encode()
            .into_bytes(),
    )));

    let ns = client.define("/news").await.unwrap();
    assert_eq!(ns.path, "/news");
    assert!(ns.was_connected());

    let outbound = mock.take_outbound();
    assert_eq!(outbound_message_text(&outbound), vec!["0/news".to_string()]);
}

#[tokio::test]
async fn second_connect_on_a_namespace_fires_reconnect_not_connect() {
    let connects = Arc::new(AtomicUsize::new(0));
    let reconnects = Arc::new(AtomicUsize::new(0));

    let ns = socketio::Namespace::new("/chat");
    let c = connects.clone();
    ns.set_on_connect(Arc::new(move || {
        c.fetch_add(1, Ordering::SeqCst);
    }))
    .await;
    let r = reconnects.clone();
    ns.set_on_reconnect(Arc::new(move || {
        r.fetch_add(1, Ordering::SeqCst);
    }))
    .await;

    ns.fire_connect().await;
    ns.fire_connect().await;

    assert_eq!(connects.load(Ordering::SeqCst), 1);
    assert_eq!(reconnects.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn acknowledgement_round_trip_invokes_callback_exactly_once() {
    let (client, mock) = client_with_mock();

    let fired = Arc::new(AtomicUsize::new(0));
    let fired_clone = fired.clone();
    let last_args = Arc::new(std::sync::Mutex::new(None));
    let last_args_clone = last_args.clone();
    let callback = ack_callback(move |args| {
        fired_clone.fetch_add(1, Ordering::SeqCst);
        *last_args_clone.lock().unwrap() = Some(args);
    });

    client
        .emit("ack", vec![json!({"xxx": "yyy"})], None, Some(callback))
        .await
        .unwrap();

    let outbound = mock.take_outbound();
    assert_eq!(
        outbound_message_text(&outbound),
        vec![r#"21["ack",{"xxx":"yyy"}]"#]
    );

    // Server replies with the ack for id 1.
    mock.push_inbound(EnginePacket::Message(Bytes::from(
        br#"31[{"xxx":"yyy"}]"#.to_vec(),
    )));

    client.wait(None, true, false).await.unwrap();

    assert_eq!(fired.load(Ordering::SeqCst), 1);
    assert_eq!(
        last_args.lock().unwrap().clone(),
        Some(vec![json!({"xxx": "yyy"})])
    );
}

#[tokio::test]
async fn ack_ids_allocated_to_successive_emits_are_strictly_increasing() {
    let (client, mock) = client_with_mock();

    client
        .emit("a", vec![], None, Some(ack_callback(|_| {})))
        .await
        .unwrap();
    client
        .emit("b", vec![], None, Some(ack_callback(|_| {})))
        .await
        .unwrap();

    let outbound = mock.take_outbound();
    assert_eq!(
        outbound_message_text(&outbound),
        vec![r#"21["a"]"#.to_string(), r#"22["b"]"#.to_string()]
    );
}

#[tokio::test]
async fn inbound_ping_is_answered_by_pong_with_identical_payload() {
    let (client, mock) = client_with_mock();

    mock.push_inbound(EnginePacket::Ping(Bytes::from_static(b"probe")));

    client
        .wait(Some(Duration::from_millis(10)), false, false)
        .await
        .unwrap();

    let outbound = mock.take_outbound();
    assert_eq!(
        outbound.first(),
        Some(&EnginePacket::Pong(Bytes::from_static(b"probe")))
    );
}

#[tokio::test]
async fn inbound_event_with_ack_id_sends_back_an_ack_with_the_handler_response() {
    let (client, mock) = client_with_mock();

    client.on("greet", None, Arc::new(|args| Some(args))).await;

    mock.push_inbound(EnginePacket::Message(Bytes::from(
        SocketPacket::new(
            PacketType::Event,
            None,
            Some(5),
            json!(["greet", {"name": "ok"}]),
        )
        .encode()
        .into_bytes(),
    )));

    client
        .wait(Some(Duration::from_millis(10)), false, false)
        .await
        .unwrap();

    let outbound = mock.take_outbound();
    assert_eq!(
        outbound_message_text(&outbound),
        vec![r#"35[{"name":"ok"}]"#]
    );
}

#[tokio::test]
async fn error_packet_marks_invalid_namespace_case_insensitively() {
    let (client, mock) = client_with_mock();

    mock.push_inbound(EnginePacket::Message(Bytes::from(
        SocketPacket::new(
            PacketType::Error,
            Some("/admin".to_string()),
            None,
            json!("Invalid Namespace"),
        )
        .encode()
        .into_bytes(),
    )));

    client
        .wait(Some(Duration::from_millis(10)), false, false)
        .await
        .unwrap();

    let ns = client.registry().get("/admin").await.unwrap();
    assert!(ns.is_invalid());
}

#[tokio::test]
async fn disconnect_of_non_default_namespace_sends_disconnect_and_removes_it() {
    let (client, mock) = client_with_mock();
    client.registry().get_or_create("/chat").await;

    client.disconnect(Some("/chat".to_string())).await.unwrap();

    let outbound = mock.take_outbound();
    assert_eq!(outbound_message_text(&outbound), vec!["1/chat".to_string()]);
    assert!(client.registry().get("/chat").await.is_none());
}

#[tokio::test]
async fn unicode_payload_survives_the_round_trip() {
    let (client, mock) = client_with_mock();

    client
        .emit("emit_with_payload", vec![json!({"인삼": "뿌리"})], None, None)
        .await
        .unwrap();

    let outbound = mock.take_outbound();
    let text = &outbound_message_text(&outbound)[0];
    let parsed = SocketPacket::decode(text).unwrap();
    assert_eq!(parsed.args()[1], json!({"인삼": "뿌리"}));
}

#[tokio::test]
async fn a_connection_lost_send_error_is_absorbed_by_queueing_not_surfaced() {
    let (client, mock) = client_with_mock();

    mock.fail_next_send_with(engineio::Error::connection_lost("peer hung up"));

    client.emit("will-queue", vec![], None, None).await.unwrap();

    assert!(mock.take_outbound().is_empty());
}
