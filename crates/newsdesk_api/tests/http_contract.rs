use async_trait::async_trait;
use newsdesk_api::{AppState, TokenSigner, build_router};
use newsdesk_core::schema::ExternalArticle;
use newsdesk_core::{ListingQuery, NewsListing, PipelineError, StandInOracle, Store};
use serde_json::{Value, json};
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::io::{AsyncReadExt, AsyncWriteExt};

const SECRET: &str = "contract-secret";

struct OfflineUpstream;

#[async_trait]
impl NewsListing for OfflineUpstream {
    async fn fetch(&self, _query: &ListingQuery) -> newsdesk_core::error::Result<Vec<ExternalArticle>> {
        Err(PipelineError::Upstream("offline".to_string()))
    }
}

async fn spawn_app() -> SocketAddr {
    let state = AppState::new(
        Store::open_in_memory().expect("store"),
        Arc::new(StandInOracle::new(Duration::ZERO)),
        Arc::new(OfflineUpstream),
        TokenSigner::new(SECRET),
    );
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
        .await
        .expect("bind listener");
    let addr = listener.local_addr().expect("local addr");
    tokio::spawn(async move {
        axum::serve(listener, build_router(state))
            .await
            .expect("serve app")
    });
    addr
}

fn token(identity: &str) -> String {
    TokenSigner::new(SECRET).issue(identity).expect("issue token")
}

async fn send_raw(
    addr: SocketAddr,
    method: &str,
    path: &str,
    bearer: Option<&str>,
    body: Option<&Value>,
) -> (u16, Value) {
    let mut stream = tokio::net::TcpStream::connect(addr)
        .await
        .expect("connect server");
    let mut req = format!("{method} {path} HTTP/1.1\r\nHost: {addr}\r\nConnection: close\r\n");
    if let Some(token) = bearer {
        req.push_str(&format!("Authorization: Bearer {token}\r\n"));
    }
    let payload = body.map(Value::to_string).unwrap_or_default();
    if body.is_some() {
        req.push_str("Content-Type: application/json\r\n");
    }
    req.push_str(&format!("Content-Length: {}\r\n\r\n{payload}", payload.len()));
    stream
        .write_all(req.as_bytes())
        .await
        .expect("write request");
    let mut response = String::new();
    stream
        .read_to_string(&mut response)
        .await
        .expect("read response");
    let (head, body) = response
        .split_once("\r\n\r\n")
        .expect("http response separator");
    let status = head
        .lines()
        .next()
        .and_then(|line| line.split_whitespace().nth(1))
        .and_then(|s| s.parse::<u16>().ok())
        .expect("status");
    let json = serde_json::from_str(body).unwrap_or(Value::Null);
    (status, json)
}

async fn publish(addr: SocketAddr, author: &str, title: &str) -> Value {
    let draft = json!({ "title": title, "content": "Body text for the piece.", "location": "Pune" });
    let (status, article) =
        send_raw(addr, "POST", "/api/articles", Some(&token(author)), Some(&draft)).await;
    assert_eq!(status, 201, "{article}");
    article
}

#[tokio::test]
async fn verify_over_http_resolves_and_ranks_the_author() {
    let addr = spawn_app().await;
    let article = publish(addr, "alice", "Bridge reopens").await;
    assert_eq!(article["verdict"]["status"], "Pending");
    assert_eq!(article["author"], "alice");
    let id = article["id"].as_str().unwrap().to_string();

    let path = format!("/api/articles/{id}/verify");
    let (status, verified) = send_raw(addr, "POST", &path, Some(&token("alice")), None).await;
    assert_eq!(status, 200, "{verified}");
    assert_eq!(verified["verdict"]["status"], "Reliable");
    assert_eq!(verified["verdict"]["reports"].as_array().unwrap().len(), 2);

    // A second verify returns the stored verdict without another ledger entry.
    let (status, again) = send_raw(addr, "POST", &path, Some(&token("alice")), None).await;
    assert_eq!(status, 200);
    assert_eq!(again["verdict"], verified["verdict"]);

    let (status, sources) = send_raw(addr, "GET", "/api/sources", None, None).await;
    assert_eq!(status, 200);
    assert_eq!(sources[0]["name"], "alice");
    assert_eq!(sources[0]["type"], "Local");
    assert_eq!(sources[0]["reliableCount"], 1);
    assert_eq!(sources[0]["reliabilityScore"], 100);
}

#[tokio::test]
async fn credentials_and_ownership_are_enforced() {
    let addr = spawn_app().await;
    let article = publish(addr, "alice", "Council vote").await;
    let id = article["id"].as_str().unwrap().to_string();
    let path = format!("/api/articles/{id}/verify");

    let (status, body) = send_raw(addr, "POST", &path, None, None).await;
    assert_eq!(status, 401);
    assert!(body["message"].is_string());

    let forged = format!("alice.{}", "0".repeat(64));
    let (status, _) = send_raw(addr, "POST", &path, Some(&forged), None).await;
    assert_eq!(status, 401);

    let expired = TokenSigner::new(SECRET).issue_at("alice", 0).expect("issue token");
    let (status, _) = send_raw(addr, "POST", &path, Some(&expired), None).await;
    assert_eq!(status, 401);

    let (status, body) = send_raw(addr, "POST", &path, Some(&token("mallory")), None).await;
    assert_eq!(status, 403);
    assert_eq!(body["message"], "User not authorized.");

    let (status, _) = send_raw(
        addr,
        "POST",
        "/api/articles/missing/verify",
        Some(&token("alice")),
        None,
    )
    .await;
    assert_eq!(status, 404);

    let (_, sources) = send_raw(addr, "GET", "/api/sources", None, None).await;
    assert_eq!(sources, json!([]));
}

#[tokio::test]
async fn invalid_drafts_are_rejected() {
    let addr = spawn_app().await;
    let draft = json!({ "title": "   ", "content": "text" });
    let (status, body) =
        send_raw(addr, "POST", "/api/articles", Some(&token("alice")), Some(&draft)).await;
    assert_eq!(status, 400);
    assert!(body["message"].is_string());
}

#[tokio::test]
async fn delete_is_author_only() {
    let addr = spawn_app().await;
    let article = publish(addr, "alice", "Market day").await;
    let path = format!("/api/articles/{}", article["id"].as_str().unwrap());

    let (status, _) = send_raw(addr, "DELETE", &path, Some(&token("bob")), None).await;
    assert_eq!(status, 403);
    let (status, _) = send_raw(addr, "DELETE", &path, Some(&token("alice")), None).await;
    assert_eq!(status, 200);

    let (_, listed) = send_raw(addr, "GET", "/api/articles", None, None).await;
    assert_eq!(listed, json!([]));
}

#[tokio::test]
async fn reset_returns_article_to_pending() {
    let addr = spawn_app().await;
    let article = publish(addr, "alice", "Rail strike").await;
    let id = article["id"].as_str().unwrap().to_string();
    let alice = token("alice");

    send_raw(addr, "POST", &format!("/api/articles/{id}/verify"), Some(&alice), None).await;
    let (status, reset) =
        send_raw(addr, "POST", &format!("/api/articles/{id}/reset"), Some(&alice), None).await;
    assert_eq!(status, 200);
    assert_eq!(reset["verdict"]["status"], "Pending");

    let (_, sources) = send_raw(addr, "GET", "/api/sources", None, None).await;
    assert_eq!(sources[0]["reliableCount"], 1);
}

#[tokio::test]
async fn news_listing_unifies_local_articles() {
    let addr = spawn_app().await;
    publish(addr, "alice", "Local fair").await;

    let (status, body) = send_raw(addr, "GET", "/news?filter=local", None, None).await;
    assert_eq!(status, 200);
    assert_eq!(body["success"], true);
    let items = body["data"]["articles"].as_array().unwrap();
    assert_eq!(items.len(), 1);
    assert_eq!(items[0]["isLocal"], true);
    assert_eq!(items[0]["title"], "Local fair");
    assert_eq!(items[0]["source"]["name"], "alice");

    let (status, body) = send_raw(addr, "GET", "/news?filter=national", None, None).await;
    assert_eq!(status, 500);
    assert_eq!(body["success"], false);
}
