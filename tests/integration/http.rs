use rocket::http::{ContentType, Header, Status};

use crate::common::{auth_config, test_client};
use bootstrap_signaling::config::Config;

#[test]
fn health_reports_ok_with_parsable_timestamp() {
    let client = test_client(Config::default());
    let res = client.get("/health").dispatch();
    assert_eq!(res.status(), Status::Ok);
    let body: serde_json::Value = res.into_json().unwrap();
    assert_eq!(body["ok"], true);
    assert!(chrono::DateTime::parse_from_rfc3339(body["now"].as_str().unwrap()).is_ok());
}

#[test]
fn metrics_endpoint_serves_prometheus_text() {
    let client = test_client(Config::default());
    let res = client.get("/metrics").dispatch();
    assert_eq!(res.status(), Status::Ok);
    let body = res.into_string().unwrap();
    assert!(body.contains("# TYPE bs_ws_connections_total counter"));
}

#[test]
fn bootstrap_reports_zero_peers_for_empty_room() {
    let client = test_client(Config::default());
    let res = client.get("/bootstrap?namespace=n&room=r").dispatch();
    assert_eq!(res.status(), Status::Ok);
    let body: serde_json::Value = res.into_json().unwrap();
    assert_eq!(body["peers"], 0);
    assert_eq!(body["namespace"], "n");
    assert_eq!(body["room"], "r");
}

#[test]
fn bootstrap_defaults_namespace_and_room_when_omitted() {
    let client = test_client(Config::default());
    let res = client.get("/bootstrap").dispatch();
    let body: serde_json::Value = res.into_json().unwrap();
    assert_eq!(body["namespace"], "global");
    assert_eq!(body["room"], "public");
}

#[test]
fn register_rejects_without_configured_token() {
    let client = test_client(auth_config("s3cret"));
    let res = client
        .post("/rendezvous/register")
        .header(ContentType::JSON)
        .body(r#"{"namespace":"n","room":"r","peerId":"p1"}"#)
        .dispatch();
    assert_eq!(res.status(), Status::Unauthorized);
}

#[test]
fn register_accepts_correct_bearer_token() {
    let client = test_client(auth_config("s3cret"));
    let res = client
        .post("/rendezvous/register")
        .header(ContentType::JSON)
        .header(Header::new("Authorization", "Bearer s3cret"))
        .body(r#"{"namespace":"n","room":"r","peerId":"p1"}"#)
        .dispatch();
    assert_eq!(res.status(), Status::Ok);
}

#[test]
fn register_then_discover_round_trip() {
    let client = test_client(Config::default());
    let res = client
        .post("/rendezvous/register")
        .header(ContentType::JSON)
        .body(r#"{"namespace":"n","room":"r","peerId":"p1","addresses":["203.0.113.1:4000"]}"#)
        .dispatch();
    assert_eq!(res.status(), Status::Ok);

    let res = client.get("/rendezvous/discover?namespace=n&room=r").dispatch();
    assert_eq!(res.status(), Status::Ok);
    let body: serde_json::Value = res.into_json().unwrap();
    let peers = body["peers"].as_array().unwrap();
    assert_eq!(peers.len(), 1);
    assert_eq!(peers[0]["peerId"], "p1");
}

#[test]
fn rendezvous_ttl_expiry() {
    let client = test_client(Config::default());
    let res = client
        .post("/rendezvous/register")
        .header(ContentType::JSON)
        .body(r#"{"namespace":"n","room":"r","peerId":"p","ttlMs":50}"#)
        .dispatch();
    assert_eq!(res.status(), Status::Ok);

    std::thread::sleep(std::time::Duration::from_millis(100));

    let res = client.get("/rendezvous/discover?namespace=n&room=r").dispatch();
    let body: serde_json::Value = res.into_json().unwrap();
    assert_eq!(body["peers"].as_array().unwrap().len(), 0);
}

#[test]
fn every_response_carries_cors_headers() {
    let client = test_client(Config::default());
    let res = client.get("/health").dispatch();
    assert_eq!(res.headers().get_one("Access-Control-Allow-Origin"), Some("*"));
    assert_eq!(res.headers().get_one("Allow-Methods"), Some("GET,POST,OPTIONS"));
    assert_eq!(
        res.headers().get_one("Allow-Headers"),
        Some("Content-Type,Authorization")
    );
}

#[test]
fn options_preflight_returns_no_content() {
    let client = test_client(Config::default());
    let res = client.options("/bootstrap").dispatch();
    assert_eq!(res.status(), Status::NoContent);
}

#[test]
fn unknown_route_returns_structured_404() {
    let client = test_client(Config::default());
    let res = client.get("/nope").dispatch();
    assert_eq!(res.status(), Status::NotFound);
    let body: serde_json::Value = res.into_json().unwrap();
    assert_eq!(body["error"], "Not found");
}
