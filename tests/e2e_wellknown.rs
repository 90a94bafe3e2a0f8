mod common;

use common::TestServer;
use serde_json::Value;

#[tokio::test]
async fn webfinger_resolves_known_resource() {
    let server = TestServer::new().await;
    server.seed_actor("https://t1.test/u1").await;

    let response = server
        .client
        .get(server.url("/.well-known/webfinger"))
        .query(&[("resource", "https://t1.test/u1")])
        .header("Host", server.host_header())
        .send()
        .await
        .unwrap();

    assert_eq!(response.status(), 200);
    let body: Value = response.json().await.unwrap();
    assert_eq!(body["subject"], "https://t1.test/u1");
    assert_eq!(body["links"][0]["href"], "https://t1.test/u1");
    assert_eq!(body["links"][0]["rel"], "self");
}

#[tokio::test]
async fn webfinger_requires_resource_param() {
    let server = TestServer::new().await;
    let response = server
        .client
        .get(server.url("/.well-known/webfinger"))
        .header("Host", server.host_header())
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), 400);
}

#[tokio::test]
async fn webfinger_unknown_resource_is_404() {
    let server = TestServer::new().await;
    let response = server
        .client
        .get(server.url("/.well-known/webfinger"))
        .query(&[("resource", "https://t1.test/ghost")])
        .header("Host", server.host_header())
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), 404);
}

#[tokio::test]
async fn nodeinfo_index_points_at_2_0() {
    let server = TestServer::new().await;
    let response = server
        .client
        .get(server.url("/.well-known/nodeinfo"))
        .header("Host", server.host_header())
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), 200);
    let body: Value = response.json().await.unwrap();
    assert!(body["links"][0]["href"].as_str().unwrap().ends_with("/nodeinfo/2.0"));
}

#[tokio::test]
async fn nodeinfo_version_2_0_has_default_metadata() {
    let server = TestServer::new().await;
    let response = server
        .client
        .get(server.url("/nodeinfo/2.0"))
        .header("Host", server.host_header())
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), 200);
    let body: Value = response.json().await.unwrap();
    assert_eq!(body["version"], "2.0");
    assert_eq!(body["software"]["name"], "firm");
}

#[tokio::test]
async fn nodeinfo_unsupported_version_is_404() {
    let server = TestServer::new().await;
    let response = server
        .client
        .get(server.url("/nodeinfo/1.0"))
        .header("Host", server.host_header())
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), 404);
}
