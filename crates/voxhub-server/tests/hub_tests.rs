use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use serde_json::Value;
use tokio::sync::mpsc::UnboundedReceiver;
use voxhub_protocol::{AudioClip, ClientMessage, LeaveReason, PeerId, RoleMode};
use voxhub_roles::{CoordinatorConfig, CoordinatorError, SessionEvent};
use voxhub_server::{Hub, HubConfig, Outbound, WebServer};
use voxhub_synth::{ProbeReport, SpeechSynthesizer, SynthError, SynthesisRequest};

#[derive(Clone, Copy, PartialEq)]
enum Behavior {
    Succeed,
    Fail,
    Panic,
}

struct FakeSynth {
    behavior: Behavior,
    calls: AtomicUsize,
    texts: Mutex<Vec<String>>,
    speeds: Mutex<Vec<f64>>,
}

impl FakeSynth {
    fn with(behavior: Behavior) -> Arc<Self> {
        Arc::new(Self {
            behavior,
            calls: AtomicUsize::new(0),
            texts: Mutex::new(Vec::new()),
            speeds: Mutex::new(Vec::new()),
        })
    }

    fn ok() -> Arc<Self> {
        Self::with(Behavior::Succeed)
    }

    fn failing() -> Arc<Self> {
        Self::with(Behavior::Fail)
    }
}

#[async_trait]
impl SpeechSynthesizer for FakeSynth {
    async fn synthesize(&self, request: &SynthesisRequest) -> Result<AudioClip, SynthError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.texts.lock().unwrap().push(request.text.clone());
        self.speeds.lock().unwrap().push(request.speed);
        match self.behavior {
            Behavior::Succeed => {}
            Behavior::Fail => return Err(SynthError::RateLimited),
            Behavior::Panic => panic!("synthesizer exploded"),
        }
        tokio::task::yield_now().await;
        Ok(AudioClip {
            audio_url: "data:audio/mp3;base64,AAAA".into(),
            format: "audio/mp3".into(),
            duration_secs: 1.0,
            text_length: request.text.chars().count(),
            original_text_length: request.text.chars().count(),
            language: request.language.clone(),
            language_code: "id".into(),
            audio_size: 3,
        })
    }

    async fn probe(&self) -> Result<ProbeReport, SynthError> {
        Ok(ProbeReport {
            status: 200,
            message: "fake".into(),
            checked_at: chrono::Utc::now(),
        })
    }
}

fn hub_with(synth: Arc<FakeSynth>) -> Hub {
    Hub::new(CoordinatorConfig::default(), synth)
}

fn drain(rx: &mut UnboundedReceiver<Outbound>) -> Vec<Value> {
    let mut frames = Vec::new();
    while let Ok(out) = rx.try_recv() {
        if let Outbound::Frame(text) = out {
            frames.push(serde_json::from_str(&text).unwrap());
        }
    }
    frames
}

fn types(frames: &[Value]) -> Vec<String> {
    frames.iter().map(|f| f["type"].as_str().unwrap_or_default().to_string()).collect()
}

/// Wait for a frame of the given type, skipping others.
async fn expect_frame(rx: &mut UnboundedReceiver<Outbound>, kind: &str) -> Value {
    let wait = async {
        loop {
            match rx.recv().await {
                Some(Outbound::Frame(text)) => {
                    let frame: Value = serde_json::from_str(&text).unwrap();
                    if frame["type"] == kind {
                        return frame;
                    }
                }
                Some(Outbound::Close(_)) | None => panic!("connection closed before {kind}"),
            }
        }
    };
    tokio::time::timeout(Duration::from_secs(2), wait)
        .await
        .unwrap_or_else(|_| panic!("timed out waiting for {kind}"))
}

fn submit(text: &str) -> ClientMessage {
    ClientMessage::SubmitWork {
        text: text.into(),
        language: Some("id-ID".into()),
        speed: None,
        priority: None,
    }
}

#[tokio::test]
async fn test_connect_sends_welcome_and_snapshot() {
    let hub = hub_with(FakeSynth::ok());
    let (conn, mut rx) = hub.connect(None, Default::default()).await.unwrap();
    let frames = drain(&mut rx);
    assert_eq!(types(&frames), vec!["welcome", "status-snapshot"]);
    assert_eq!(frames[0]["connectionId"], conn.as_str());
    assert_eq!(frames[1]["mode"], "single");
}

#[tokio::test]
async fn test_peer_joined_reaches_existing_peers_only() {
    let hub = hub_with(FakeSynth::ok());
    let (_a, mut rx_a) = hub.connect(None, Default::default()).await.unwrap();
    drain(&mut rx_a);
    let (_b, mut rx_b) = hub.connect(None, Default::default()).await.unwrap();
    assert_eq!(types(&drain(&mut rx_a)), vec!["peer-joined"]);
    assert!(!types(&drain(&mut rx_b)).contains(&"peer-joined".to_string()));
}

#[tokio::test]
async fn test_work_flows_to_master_and_completes() {
    let synth = FakeSynth::ok();
    let hub = hub_with(synth.clone());
    let (master, mut rx_master) = hub.connect(None, Default::default()).await.unwrap();
    let (client, mut rx_client) = hub.connect(None, Default::default()).await.unwrap();
    hub.message(&master, ClientMessage::RequestRole { is_recovery: false }).await;

    hub.message(&client, submit("Halo semua")).await;
    let routed = expect_frame(&mut rx_client, "work-routed").await;
    let audio = expect_frame(&mut rx_master, "work-audio").await;
    let completed = expect_frame(&mut rx_client, "work-completed").await;

    assert_eq!(audio["requestId"], routed["requestId"]);
    assert_eq!(completed["requestId"], routed["requestId"]);
    assert_eq!(audio["audio"]["audioUrl"], "data:audio/mp3;base64,AAAA");
    assert_eq!(synth.calls.load(Ordering::SeqCst), 1);
    assert_eq!(hub.snapshot().await.in_flight, 0);
}

#[tokio::test]
async fn test_queued_work_drains_when_master_arrives() {
    let hub = hub_with(FakeSynth::ok());
    let (client, mut rx_client) = hub.connect(None, Default::default()).await.unwrap();
    hub.message(&client, submit("Tunggu")).await;
    let queued = expect_frame(&mut rx_client, "work-queued").await;
    assert_eq!(queued["position"], 1);
    expect_frame(&mut rx_client, "role-needed").await;

    let (master, mut rx_master) = hub.connect(None, Default::default()).await.unwrap();
    hub.message(&master, ClientMessage::RequestRole { is_recovery: false }).await;
    expect_frame(&mut rx_master, "work-audio").await;
    assert_eq!(hub.snapshot().await.queue_length, 0);
}

#[tokio::test]
async fn test_conversion_failure_reaches_submitter() {
    let hub = hub_with(FakeSynth::failing());
    let (master, _rx_master) = hub.connect(None, Default::default()).await.unwrap();
    let (client, mut rx_client) = hub.connect(None, Default::default()).await.unwrap();
    hub.message(&master, ClientMessage::RequestRole { is_recovery: false }).await;
    hub.message(&client, submit("Halo")).await;

    let failed = expect_frame(&mut rx_client, "work-failed").await;
    assert!(failed["error"].as_str().unwrap().contains("too many"));
}

#[tokio::test]
async fn test_panicking_synthesizer_still_resolves_work() {
    let hub = hub_with(FakeSynth::with(Behavior::Panic));
    let (master, _rx_master) = hub.connect(None, Default::default()).await.unwrap();
    let (client, mut rx_client) = hub.connect(None, Default::default()).await.unwrap();
    hub.message(&master, ClientMessage::RequestRole { is_recovery: false }).await;
    hub.message(&client, submit("Halo")).await;

    let failed = expect_frame(&mut rx_client, "work-failed").await;
    assert_eq!(failed["error"], "conversion failed unexpectedly");
    assert_eq!(hub.snapshot().await.in_flight, 0);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_peers_keep_single_master_and_deliver_once() {
    const PEERS: usize = 16;
    let synth = FakeSynth::ok();
    let hub = hub_with(synth.clone());

    let mut tasks = Vec::new();
    for i in 0..PEERS {
        let hub = hub.clone();
        tasks.push(tokio::spawn(async move {
            let (conn, rx) = hub.connect(None, Default::default()).await.unwrap();
            let text = format!("job-{i}");
            tokio::join!(
                hub.message(&conn, ClientMessage::RequestRole { is_recovery: false }),
                hub.message(&conn, submit(&text))
            );
            (conn, rx)
        }));
    }
    let mut peers = Vec::new();
    for task in tasks {
        peers.push(task.await.unwrap());
    }

    let settled = async {
        loop {
            let snapshot = hub.snapshot().await;
            if snapshot.in_flight == 0 && snapshot.queue_length == 0 {
                return;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
    };
    tokio::time::timeout(Duration::from_secs(5), settled)
        .await
        .expect("work never settled");

    let holders = hub.role_holders().await;
    assert_eq!(holders.len(), 1);

    let mut synthesized: Vec<String> = synth.texts.lock().unwrap().clone();
    synthesized.sort();
    let mut expected: Vec<String> = (0..PEERS).map(|i| format!("job-{i}")).collect();
    expected.sort();
    assert_eq!(synthesized, expected);

    let mut audio_per_request: HashMap<String, usize> = HashMap::new();
    for (conn, rx) in peers.iter_mut() {
        let frames = drain(rx);
        let completed = frames.iter().filter(|f| f["type"] == "work-completed").count();
        assert_eq!(completed, 1, "{conn} should see its own work complete once");
        for frame in frames.iter().filter(|f| f["type"] == "work-audio") {
            assert_eq!(*conn, holders[0].connection_id);
            let id = frame["requestId"].as_str().unwrap().to_string();
            *audio_per_request.entry(id).or_default() += 1;
        }
    }
    assert_eq!(audio_per_request.len(), PEERS);
    assert!(audio_per_request.values().all(|n| *n == 1));
}

#[tokio::test]
async fn test_reconnecting_master_recovers_role() {
    let hub = hub_with(FakeSynth::ok());
    let peer = PeerId::new("returning-peer".into());
    let (first, _rx) = hub.connect(Some(peer.clone()), Default::default()).await.unwrap();
    hub.message(&first, ClientMessage::RequestRole { is_recovery: false }).await;
    hub.disconnect(&first).await;
    assert!(hub.role_holders().await.is_empty());

    let (second, _rx2) = hub.connect(Some(peer.clone()), Default::default()).await.unwrap();
    let holders = hub.role_holders().await;
    assert_eq!(holders.len(), 1);
    assert_eq!(holders[0].connection_id, second);
    assert_eq!(holders[0].peer_id, peer);
}

#[tokio::test]
async fn test_invalid_frame_gets_error_and_connection_survives() {
    let hub = hub_with(FakeSynth::ok());
    let (conn, mut rx) = hub.connect(None, Default::default()).await.unwrap();
    drain(&mut rx);
    hub.reject_frame(&conn, "expected value at line 1 column 1".into()).await;
    let error = expect_frame(&mut rx, "error").await;
    assert_eq!(error["code"], "invalid-message");

    hub.message(&conn, ClientMessage::Heartbeat).await;
    expect_frame(&mut rx, "pong").await;
}

#[tokio::test]
async fn test_idle_sweep_closes_connection() {
    let hub = Hub::new(
        CoordinatorConfig {
            idle_timeout: Duration::ZERO,
            ..Default::default()
        },
        FakeSynth::ok(),
    );
    let (_conn, mut rx) = hub.connect(None, Default::default()).await.unwrap();
    drain(&mut rx);
    hub.event(SessionEvent::IdleSweep).await.unwrap();

    let mut closed = None;
    while let Ok(out) = rx.try_recv() {
        if let Outbound::Close(reason) = out {
            closed = Some(reason);
        }
    }
    assert_eq!(closed, Some(LeaveReason::IdleTimeout));
    assert!(hub.peers().await.is_empty());
}

#[tokio::test]
async fn test_admin_operations() {
    let hub = Hub::new(
        CoordinatorConfig {
            mode: RoleMode::Single,
            ..Default::default()
        },
        FakeSynth::ok(),
    );
    let (a, _rx_a) = hub.connect(None, Default::default()).await.unwrap();
    let (b, mut rx_b) = hub.connect(None, Default::default()).await.unwrap();
    hub.message(&a, ClientMessage::RequestRole { is_recovery: false }).await;

    assert_eq!(
        hub.force_assign("nobody").await.unwrap_err(),
        CoordinatorError::UnknownPeer("nobody".into())
    );
    hub.force_assign(b.as_str()).await.unwrap();
    let holders = hub.role_holders().await;
    assert_eq!(holders.len(), 1);
    assert_eq!(holders[0].connection_id, b);
    expect_frame(&mut rx_b, "role-granted").await;

    hub.force_remove(b.as_str()).await.unwrap();
    assert!(hub.role_holders().await.is_empty());

    hub.message(&a, submit("satu")).await;
    hub.message(&a, submit("dua")).await;
    assert_eq!(hub.clear_queue().await, 2);
}

async fn serve(hub: Hub, web_root: std::path::PathBuf) -> String {
    let server = WebServer::new(String::new(), hub, Some(web_root), Duration::from_secs(1));
    let app = server.router();
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        let _ = axum::serve(listener, app).await;
    });
    format!("http://{addr}")
}

async fn get_json(client: &reqwest::Client, url: String) -> (u16, Value) {
    let response = client.get(url).send().await.unwrap();
    let status = response.status().as_u16();
    (status, serde_json::from_str(&response.text().await.unwrap()).unwrap())
}

#[tokio::test]
async fn test_http_api() {
    let web_root = tempfile::tempdir().unwrap();
    std::fs::write(web_root.path().join("index.html"), "<h1>voxhub</h1>").unwrap();
    let synth = FakeSynth::ok();
    let hub = hub_with(synth.clone());
    let (conn, _rx) = hub.connect(None, Default::default()).await.unwrap();
    let base = serve(hub, web_root.path().to_path_buf()).await;
    let client = reqwest::Client::new();

    let (status, health) = get_json(&client, format!("{base}/api/health")).await;
    assert_eq!(status, 200);
    assert_eq!(health["status"], "ok");
    assert_eq!(health["peers"], 1);

    let (_, peers) = get_json(&client, format!("{base}/api/peers")).await;
    assert_eq!(peers.as_array().unwrap().len(), 1);

    let missing = client.put(format!("{base}/api/roles/ghost")).send().await.unwrap();
    assert_eq!(missing.status().as_u16(), 404);

    let assigned = client
        .put(format!("{base}/api/roles/{}", conn.as_str()))
        .send()
        .await
        .unwrap();
    assert_eq!(assigned.status().as_u16(), 200);
    let (_, roles) = get_json(&client, format!("{base}/api/roles")).await;
    assert_eq!(roles[0]["connectionId"], conn.as_str());

    let cleared = client.delete(format!("{base}/api/queue")).send().await.unwrap();
    let cleared: Value = serde_json::from_str(&cleared.text().await.unwrap()).unwrap();
    assert_eq!(cleared["cleared"], 0);

    let (_, languages) = get_json(&client, format!("{base}/api/languages")).await;
    assert_eq!(languages["languages"][0]["code"], "id");

    let tts = client
        .post(format!("{base}/api/tts"))
        .header("content-type", "application/json")
        .body(r#"{"text":"Halo","language":"id-ID"}"#)
        .send()
        .await
        .unwrap();
    assert_eq!(tts.status().as_u16(), 200);
    let tts: Value = serde_json::from_str(&tts.text().await.unwrap()).unwrap();
    assert_eq!(tts["success"], true);
    assert_eq!(tts["audioUrl"], "data:audio/mp3;base64,AAAA");

    for body in [
        r#"{"text":"cepat","speed":7.5}"#,
        r#"{"text":"lambat","speed":0.1}"#,
        r#"{"text":"biasa","speed":1.5}"#,
    ] {
        let response = client
            .post(format!("{base}/api/tts"))
            .header("content-type", "application/json")
            .body(body)
            .send()
            .await
            .unwrap();
        assert_eq!(response.status().as_u16(), 200);
    }
    assert_eq!(*synth.speeds.lock().unwrap(), vec![1.0, 2.0, 0.5, 1.5]);

    let (status, check) = get_json(&client, format!("{base}/api/test")).await;
    assert_eq!(status, 200);
    assert_eq!(check["success"], true);

    let page = client.get(format!("{base}/some/client/route")).send().await.unwrap();
    assert_eq!(page.text().await.unwrap(), "<h1>voxhub</h1>");
}

#[test]
fn test_default_config_builds_default_coordinator() {
    let config = HubConfig::default().coordinator_config();
    assert_eq!(config.mode, RoleMode::Single);
    assert_eq!(config.max_recovery_attempts, 3);
    assert_eq!(config.idle_timeout, Duration::from_secs(300));
}
