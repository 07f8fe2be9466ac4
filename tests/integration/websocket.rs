use std::net::TcpListener;

use bootstrap_signaling::config::Config;
use futures_util::{SinkExt, StreamExt};
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream};

type WsStream = WebSocketStream<MaybeTlsStream<tokio::net::TcpStream>>;

/// Binds an ephemeral port and launches a live Rocket instance for `config` on it.
/// The launched task is detached; the OS reclaims the socket when the test process exits.
async fn spawn_server(mut config: Config) -> u16 {
    let port = {
        let listener = TcpListener::bind("127.0.0.1:0").expect("bind ephemeral port");
        listener.local_addr().unwrap().port()
    };
    config.port = port;

    let rocket = bootstrap_signaling::build_rocket(config);
    tokio::spawn(async move {
        let _ = rocket.launch().await;
    });

    for _ in 0..50 {
        if tokio::net::TcpStream::connect(("127.0.0.1", port)).await.is_ok() {
            return port;
        }
        tokio::time::sleep(std::time::Duration::from_millis(20)).await;
    }
    panic!("server did not start listening on port {port}");
}

async fn connect(port: u16, path: &str) -> WsStream {
    let url = format!("ws://127.0.0.1:{port}{path}");
    let (stream, _) = tokio_tungstenite::connect_async(url).await.expect("connect");
    stream
}

async fn next_json(stream: &mut WsStream) -> serde_json::Value {
    loop {
        match stream.next().await.expect("stream closed").expect("ws error") {
            Message::Text(text) => return serde_json::from_str(&text).unwrap(),
            _ => continue,
        }
    }
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn welcome_envelope_has_expected_shape() {
    let port = spawn_server(Config::default()).await;
    let mut stream = connect(port, "/signal?namespace=x&room=y&peerId=p1").await;

    let welcome = next_json(&mut stream).await;
    assert_eq!(welcome["type"], "welcome");
    assert_eq!(welcome["peerId"], "p1");
    assert_eq!(welcome["namespace"], "x");
    assert_eq!(welcome["room"], "y");
    assert!(chrono::DateTime::parse_from_rfc3339(welcome["now"].as_str().unwrap()).is_ok());
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn fanout_excludes_sender_and_stamps_envelope() {
    let port = spawn_server(Config::default()).await;

    let mut a = connect(port, "/signal?namespace=n&room=r&peerId=A").await;
    let mut b = connect(port, "/signal?namespace=n&room=r&peerId=B").await;
    let mut c = connect(port, "/signal?namespace=n&room=r&peerId=C").await;
    next_json(&mut a).await;
    next_json(&mut b).await;
    next_json(&mut c).await;

    a.send(Message::Text(r#"{"type":"offer","sdp":"v=0"}"#.into()))
        .await
        .unwrap();

    let from_b = next_json(&mut b).await;
    let from_c = next_json(&mut c).await;
    assert_eq!(from_b["sourcePeerId"], "A");
    assert_eq!(from_b["namespace"], "n");
    assert_eq!(from_b["room"], "r");
    assert_eq!(from_b["sdp"], "v=0");
    assert_eq!(from_c["sourcePeerId"], "A");

    let nothing = tokio::time::timeout(std::time::Duration::from_millis(200), a.next()).await;
    assert!(nothing.is_err(), "sender must not receive its own relay");
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn heartbeat_is_acked_and_not_relayed() {
    let port = spawn_server(Config::default()).await;
    let mut a = connect(port, "/signal?namespace=n&room=r&peerId=A").await;
    let mut b = connect(port, "/signal?namespace=n&room=r&peerId=B").await;
    next_json(&mut a).await;
    next_json(&mut b).await;

    a.send(Message::Text(r#"{"type":"heartbeat"}"#.into()))
        .await
        .unwrap();
    let ack = next_json(&mut a).await;
    assert_eq!(ack["type"], "heartbeat-ack");

    let nothing = tokio::time::timeout(std::time::Duration::from_millis(200), b.next()).await;
    assert!(nothing.is_err());
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn rate_limited_messages_produce_exact_error_count() {
    let config = Config {
        rate_limit_messages_per_minute: 3,
        ..Config::default()
    };
    let port = spawn_server(config).await;

    let mut a = connect(port, "/signal?namespace=n&room=r&peerId=A").await;
    next_json(&mut a).await;

    for i in 0..5 {
        a.send(Message::Text(format!(r#"{{"type":"heartbeat","n":{i}}}"#)))
            .await
            .unwrap();
    }

    let mut errors = 0;
    let mut acks = 0;
    for _ in 0..5 {
        let frame = next_json(&mut a).await;
        match frame["type"].as_str().unwrap() {
            "error" => {
                assert_eq!(frame["code"], "rate_limited");
                errors += 1;
            }
            "heartbeat-ack" => acks += 1,
            other => panic!("unexpected frame type {other}"),
        }
    }
    assert_eq!(errors, 2);
    assert_eq!(acks, 3);

    let metrics = reqwest::get(format!("http://127.0.0.1:{port}/metrics"))
        .await
        .unwrap()
        .text()
        .await
        .unwrap();
    assert!(metrics.contains("bs_ws_rate_limited_total 2"));
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn auth_rejects_wrong_token_and_admits_correct_one() {
    let config = Config {
        signal_token_sha256: Some(bootstrap_signaling::auth::sha256_hex("s3cret")),
        ..Config::default()
    };
    let port = spawn_server(config).await;

    let rejected = tokio_tungstenite::connect_async(format!(
        "ws://127.0.0.1:{port}/signal?namespace=n&room=r&token=wrong"
    ))
    .await;
    assert!(rejected.is_err());

    let mut admitted = connect(port, "/signal?namespace=n&room=r&token=s3cret").await;
    let welcome = next_json(&mut admitted).await;
    assert_eq!(welcome["type"], "welcome");

    let metrics = reqwest::get(format!("http://127.0.0.1:{port}/metrics"))
        .await
        .unwrap()
        .text()
        .await
        .unwrap();
    assert!(metrics.contains("bs_ws_auth_failures_total 1"));
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn bootstrap_peer_count_tracks_live_sessions() {
    let port = spawn_server(Config::default()).await;

    let mut a = connect(port, "/signal?namespace=n&room=r&peerId=A").await;
    let mut b = connect(port, "/signal?namespace=n&room=r&peerId=B").await;
    let mut c = connect(port, "/signal?namespace=n&room=r&peerId=C").await;
    next_json(&mut a).await;
    next_json(&mut b).await;
    next_json(&mut c).await;

    let body: serde_json::Value = reqwest::get(format!(
        "http://127.0.0.1:{port}/bootstrap?namespace=n&room=r"
    ))
    .await
    .unwrap()
    .json()
    .await
    .unwrap();
    assert_eq!(body["peers"], 3);

    a.close(None).await.ok();
    tokio::time::sleep(std::time::Duration::from_millis(200)).await;

    let body: serde_json::Value = reqwest::get(format!(
        "http://127.0.0.1:{port}/bootstrap?namespace=n&room=r"
    ))
    .await
    .unwrap()
    .json()
    .await
    .unwrap();
    assert_eq!(body["peers"], 2);
}
