//! End-to-end flows through a running balancer: real client connections,
//! real upstream WebSocket servers, ephemeral ports everywhere.

use std::net::SocketAddr;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use futures::{SinkExt, StreamExt};
use serde_json::{Value, json};
use tokio::net::{TcpListener, TcpStream};
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream, accept_async, connect_async};

use lingo_runtime::{Balancer, config};

type ClientWs = WebSocketStream<MaybeTlsStream<TcpStream>>;

/// How a mock upstream answers translation jobs.
#[derive(Clone, Copy)]
enum UpstreamMode {
    /// Answer with the uppercased source sentences.
    Echo,
    /// Close the connection instead of answering.
    CloseOnJob,
    /// Answer after a delay.
    StallThenEcho(u64),
}

/// Spawns a mock translation server. While `gate` is false, incoming TCP
/// connections are dropped before the WebSocket handshake.
async fn spawn_upstream(
    languages: Value,
    mode: UpstreamMode,
    gate: Arc<AtomicBool>,
) -> SocketAddr {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();

    tokio::spawn(async move {
        loop {
            let Ok((stream, _)) = listener.accept().await else {
                break;
            };
            if !gate.load(Ordering::SeqCst) {
                drop(stream);
                continue;
            }
            let languages = languages.clone();
            tokio::spawn(async move {
                let Ok(mut ws) = accept_async(stream).await else {
                    return;
                };
                while let Some(Ok(msg)) = ws.next().await {
                    let Message::Text(text) = msg else { continue };
                    let Ok(frame) = serde_json::from_str::<Value>(text.as_str()) else {
                        continue;
                    };
                    match frame["msg_type"].as_i64() {
                        Some(1) => {
                            let reply = json!({
                                "prot_ver": 1,
                                "msg_type": 2,
                                "languages": languages,
                            });
                            let _ = ws.send(Message::Text(reply.to_string().into())).await;
                        }
                        Some(3) => match mode {
                            UpstreamMode::Echo => {
                                let _ = ws.send(echo_response(&frame)).await;
                            }
                            UpstreamMode::CloseOnJob => {
                                let _ = ws.close(None).await;
                                return;
                            }
                            UpstreamMode::StallThenEcho(delay_ms) => {
                                tokio::time::sleep(Duration::from_millis(delay_ms)).await;
                                let _ = ws.send(echo_response(&frame)).await;
                            }
                        },
                        _ => {}
                    }
                }
            });
        }
    });

    addr
}

fn echo_response(request: &Value) -> Message {
    let sentences: Vec<Value> = request["source_sentences"]
        .as_array()
        .cloned()
        .unwrap_or_default()
        .iter()
        .map(|s| {
            json!({
                "status_code": 0,
                "status_msg": "OK",
                "trans_text": s.as_str().unwrap_or_default().to_uppercase(),
            })
        })
        .collect();
    let reply = json!({
        "prot_ver": 1,
        "msg_type": 4,
        "job_id": request["job_id"],
        "status_code": 0,
        "status_msg": "OK",
        "target_data": sentences,
    });
    Message::Text(reply.to_string().into())
}

/// Starts a balancer in front of one upstream, on an ephemeral port.
async fn start_balancer(upstream: SocketAddr, reconnect_ms: u64) -> Arc<Balancer> {
    let toml = format!(
        r#"
[server]
host = "127.0.0.1"
port = 0
request_workers = 2
response_workers = 2
reconnect_timeout_ms = {reconnect_ms}

[upstreams.test]
url = "ws://{upstream}"
load_weight = 1
"#
    );
    let config = config::load_from_str(&toml).unwrap();
    let balancer = Balancer::new(config).unwrap();
    balancer.start().await.unwrap();
    balancer
}

async fn connect_client(balancer: &Balancer) -> ClientWs {
    let addr = balancer.local_addr().expect("balancer not started");
    let (ws, _) = connect_async(format!("ws://{addr}")).await.unwrap();
    ws
}

async fn send_json(ws: &mut ClientWs, value: Value) {
    ws.send(Message::Text(value.to_string().into()))
        .await
        .unwrap();
}

async fn recv_text(ws: &mut ClientWs) -> String {
    loop {
        let msg = tokio::time::timeout(Duration::from_secs(5), ws.next())
            .await
            .expect("timed out waiting for a frame")
            .expect("connection closed")
            .expect("connection error");
        if let Message::Text(text) = msg {
            return text.to_string();
        }
    }
}

async fn recv_json(ws: &mut ClientWs) -> Value {
    serde_json::from_str(&recv_text(ws).await).expect("expected a JSON frame")
}

fn supp_lang_req() -> Value {
    json!({ "prot_ver": 1, "msg_type": 1 })
}

fn trans_job_req(job_id: u64, source: &str, target: &str, sentences: Vec<&str>) -> Value {
    json!({
        "prot_ver": 1,
        "msg_type": 3,
        "job_id": job_id,
        "priority": 0,
        "source_lang": source,
        "target_lang": target,
        "is_trans_info": false,
        "source_sentences": sentences,
    })
}

/// Polls the supported-languages snapshot until `predicate` holds.
async fn wait_for_snapshot<F>(ws: &mut ClientWs, predicate: F)
where
    F: Fn(&Value) -> bool,
{
    for _ in 0..100 {
        send_json(ws, supp_lang_req()).await;
        let snapshot = recv_json(ws).await;
        if predicate(&snapshot["languages"]) {
            return;
        }
        tokio::time::sleep(Duration::from_millis(50)).await;
    }
    panic!("snapshot never reached the expected state");
}

fn supports(languages: &Value, source: &str, target: &str) -> bool {
    languages[source]
        .as_array()
        .is_some_and(|targets| targets.iter().any(|t| t == target))
}

#[tokio::test]
async fn happy_path_round_trip() {
    let gate = Arc::new(AtomicBool::new(true));
    let upstream = spawn_upstream(json!({"en": ["nl"]}), UpstreamMode::Echo, gate).await;
    let balancer = start_balancer(upstream, 500).await;

    let mut client = connect_client(&balancer).await;
    wait_for_snapshot(&mut client, |languages| supports(languages, "en", "nl")).await;

    send_json(&mut client, trans_job_req(42, "en", "nl", vec!["hi"])).await;
    let reply = recv_json(&mut client).await;

    assert_eq!(reply["msg_type"], 4);
    assert_eq!(reply["job_id"], 42);
    assert_eq!(reply["status_code"], 0);
    assert_eq!(reply["target_data"][0]["status_code"], 0);
    assert_eq!(reply["target_data"][0]["trans_text"], "HI");

    balancer.stop().await;
}

#[tokio::test]
async fn unsupported_pair_is_answered_with_error() {
    let gate = Arc::new(AtomicBool::new(true));
    let upstream = spawn_upstream(json!({"en": ["nl"]}), UpstreamMode::Echo, gate).await;
    let balancer = start_balancer(upstream, 500).await;

    let mut client = connect_client(&balancer).await;
    wait_for_snapshot(&mut client, |languages| supports(languages, "en", "nl")).await;

    send_json(&mut client, trans_job_req(7, "en", "de", vec!["hi"])).await;
    let reply = recv_json(&mut client).await;

    assert_eq!(reply["msg_type"], 4);
    assert_eq!(reply["job_id"], 7);
    assert_ne!(reply["status_code"], 0);
    let sentence = &reply["target_data"][0];
    assert_ne!(sentence["status_code"], 0);
    assert!(sentence["status_msg"].as_str().unwrap().contains("en"));

    balancer.stop().await;
}

#[tokio::test]
async fn upstream_disconnect_fails_job_exactly_once() {
    let gate = Arc::new(AtomicBool::new(true));
    let upstream = spawn_upstream(json!({"en": ["nl"]}), UpstreamMode::CloseOnJob, gate).await;
    let balancer = start_balancer(upstream, 5000).await;

    let mut client = connect_client(&balancer).await;
    wait_for_snapshot(&mut client, |languages| supports(languages, "en", "nl")).await;

    send_json(&mut client, trans_job_req(9, "en", "nl", vec!["hi"])).await;
    let reply = recv_json(&mut client).await;

    assert_eq!(reply["job_id"], 9);
    assert_ne!(reply["status_code"], 0);

    // Exactly one reply: nothing else may arrive for this job.
    let extra = tokio::time::timeout(Duration::from_millis(300), client.next()).await;
    assert!(extra.is_err(), "unexpected extra frame: {extra:?}");

    // The dead upstream's pairs must leave the snapshot.
    let mut probe = connect_client(&balancer).await;
    wait_for_snapshot(&mut probe, |languages| !supports(languages, "en", "nl")).await;

    balancer.stop().await;
}

#[tokio::test]
async fn late_reply_after_client_disconnect_is_dropped() {
    let gate = Arc::new(AtomicBool::new(true));
    let upstream =
        spawn_upstream(json!({"en": ["nl"]}), UpstreamMode::StallThenEcho(300), gate).await;
    let balancer = start_balancer(upstream, 500).await;

    let mut client = connect_client(&balancer).await;
    wait_for_snapshot(&mut client, |languages| supports(languages, "en", "nl")).await;

    send_json(&mut client, trans_job_req(5, "en", "nl", vec!["hi"])).await;
    client.close(None).await.unwrap();
    drop(client);

    // Let the stalled upstream answer into the void.
    tokio::time::sleep(Duration::from_millis(600)).await;

    // The balancer must still be fully alive.
    let mut probe = connect_client(&balancer).await;
    send_json(&mut probe, supp_lang_req()).await;
    let snapshot = recv_json(&mut probe).await;
    assert!(supports(&snapshot["languages"], "en", "nl"));

    balancer.stop().await;
}

#[tokio::test]
async fn unreachable_upstream_is_picked_up_by_reconnect_loop() {
    let gate = Arc::new(AtomicBool::new(false));
    let upstream = spawn_upstream(json!({"en": ["nl"]}), UpstreamMode::Echo, gate.clone()).await;
    let balancer = start_balancer(upstream, 200).await;

    let mut client = connect_client(&balancer).await;

    // While the upstream refuses connections, nothing is supported.
    tokio::time::sleep(Duration::from_millis(300)).await;
    send_json(&mut client, supp_lang_req()).await;
    let snapshot = recv_json(&mut client).await;
    assert!(!supports(&snapshot["languages"], "en", "nl"));

    // Open the gate; the periodic retry must bring the adapter up.
    gate.store(true, Ordering::SeqCst);
    wait_for_snapshot(&mut client, |languages| supports(languages, "en", "nl")).await;

    // And the route must actually work.
    send_json(&mut client, trans_job_req(1, "en", "nl", vec!["hello"])).await;
    let reply = recv_json(&mut client).await;
    assert_eq!(reply["job_id"], 1);
    assert_eq!(reply["status_code"], 0);

    balancer.stop().await;
}

#[tokio::test]
async fn protocol_violation_gets_plain_text_answer() {
    let gate = Arc::new(AtomicBool::new(true));
    let upstream = spawn_upstream(json!({"en": ["nl"]}), UpstreamMode::Echo, gate).await;
    let balancer = start_balancer(upstream, 500).await;

    let mut client = connect_client(&balancer).await;
    client
        .send(Message::Text("definitely not json".to_string().into()))
        .await
        .unwrap();

    let reply = recv_text(&mut client).await;
    assert!(serde_json::from_str::<Value>(&reply).is_err());

    // The connection survives the violation.
    send_json(&mut client, supp_lang_req()).await;
    let snapshot = recv_json(&mut client).await;
    assert!(snapshot["languages"].is_object());

    balancer.stop().await;
}
