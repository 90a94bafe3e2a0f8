mod common;

use common::{TEST_PRIVATE_KEY, TEST_PUBLIC_KEY, TestServer};
use serde_json::json;

// bcrypt($2a$06$, "abc") from the canonical OpenBSD bcrypt test vectors,
// used here purely as a known-good (plaintext, hash) pair.
const KNOWN_PASSWORD: &str = "abc";
const KNOWN_PASSWORD_HASH: &str = "$2a$06$If6bvum7DFjUnE9p2uDeDu0YHzrHM6tf.iqN8.yx.jNN1ILEf7h0i";

async fn seed_private_note(server: &TestServer, owner: &str) -> String {
    let uri = format!("{owner}/private-note");
    server
        .ctx
        .store
        .put(json!({
            "id": uri,
            "type": "Note",
            "attributedTo": owner,
            "content": "for your eyes only",
        }))
        .await
        .unwrap();
    uri
}

async fn seed_credentials(server: &TestServer, owner: &str, password_hash: &str, token: &str) {
    server
        .ctx
        .store
        .put(json!({
            "id": "urn:uuid:creds-1",
            "type": "firm:Credentials",
            "attributedTo": owner,
            "firm:password": password_hash,
            "firm:token": token,
        }))
        .await
        .unwrap();
}

#[tokio::test]
async fn anonymous_get_of_private_resource_is_unauthorized() {
    let server = TestServer::new().await;
    server.seed_actor("https://t1.test/u1").await;
    let note_uri = seed_private_note(&server, "https://t1.test/u1").await;
    let path = note_uri.strip_prefix("https://t1.test").unwrap();

    let response = server
        .client
        .get(server.url(path))
        .header("Host", server.host_header())
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), 401);
}

#[tokio::test]
async fn basic_auth_with_correct_password_grants_access() {
    let server = TestServer::new().await;
    server.seed_actor("https://t1.test/u1").await;
    let note_uri = seed_private_note(&server, "https://t1.test/u1").await;
    let path = note_uri.strip_prefix("https://t1.test").unwrap();
    seed_credentials(&server, "https://t1.test/u1", KNOWN_PASSWORD_HASH, "tok-1").await;

    let response = server
        .client
        .get(server.url(path))
        .header("Host", server.host_header())
        .basic_auth("https://t1.test/u1", Some(KNOWN_PASSWORD))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), 200);
}

#[tokio::test]
async fn basic_auth_with_wrong_password_is_unauthorized() {
    let server = TestServer::new().await;
    server.seed_actor("https://t1.test/u1").await;
    let note_uri = seed_private_note(&server, "https://t1.test/u1").await;
    let path = note_uri.strip_prefix("https://t1.test").unwrap();
    seed_credentials(&server, "https://t1.test/u1", KNOWN_PASSWORD_HASH, "tok-1").await;

    let response = server
        .client
        .get(server.url(path))
        .header("Host", server.host_header())
        .basic_auth("https://t1.test/u1", Some("not-the-password"))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), 401);
}

#[tokio::test]
async fn bearer_token_grants_access() {
    let server = TestServer::new().await;
    server.seed_actor("https://t1.test/u1").await;
    let note_uri = seed_private_note(&server, "https://t1.test/u1").await;
    let path = note_uri.strip_prefix("https://t1.test").unwrap();
    seed_credentials(&server, "https://t1.test/u1", KNOWN_PASSWORD_HASH, "tok-secret").await;

    let response = server
        .client
        .get(server.url(path))
        .header("Host", server.host_header())
        .bearer_auth("tok-secret")
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), 200);
}

#[tokio::test]
async fn bearer_token_wrong_value_is_unauthorized() {
    let server = TestServer::new().await;
    server.seed_actor("https://t1.test/u1").await;
    let note_uri = seed_private_note(&server, "https://t1.test/u1").await;
    let path = note_uri.strip_prefix("https://t1.test").unwrap();
    seed_credentials(&server, "https://t1.test/u1", KNOWN_PASSWORD_HASH, "tok-secret").await;

    let response = server
        .client
        .get(server.url(path))
        .header("Host", server.host_header())
        .bearer_auth("wrong-token")
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), 401);
}

#[tokio::test]
async fn http_signature_grants_access_to_own_resource() {
    let server = TestServer::new().await;
    server.seed_actor_with_key("https://t1.test/u1", Some((TEST_PUBLIC_KEY, TEST_PRIVATE_KEY))).await;
    let note_uri = seed_private_note(&server, "https://t1.test/u1").await;
    let path = note_uri.strip_prefix("https://t1.test").unwrap();

    let key_id = "https://t1.test/u1#main-key";
    let signing_url = format!("https://t1.test{path}");
    let signed = firm::auth::signature::sign_request("GET", &signing_url, None, TEST_PRIVATE_KEY, key_id).unwrap();

    let response = server
        .client
        .get(server.url(path))
        .header("Host", server.host_header())
        .header("Date", signed.date)
        .header("Signature", signed.signature)
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), 200);
}

#[tokio::test]
async fn http_signature_for_unrelated_actor_is_forbidden() {
    let server = TestServer::new().await;
    server.seed_actor_with_key("https://t1.test/u1", Some((TEST_PUBLIC_KEY, TEST_PRIVATE_KEY))).await;
    server.seed_actor_with_key("https://t1.test/u2", Some((TEST_PUBLIC_KEY, TEST_PRIVATE_KEY))).await;
    let note_uri = seed_private_note(&server, "https://t1.test/u1").await;
    let path = note_uri.strip_prefix("https://t1.test").unwrap();

    let key_id = "https://t1.test/u2#main-key";
    let signing_url = format!("https://t1.test{path}");
    let signed = firm::auth::signature::sign_request("GET", &signing_url, None, TEST_PRIVATE_KEY, key_id).unwrap();

    let response = server
        .client
        .get(server.url(path))
        .header("Host", server.host_header())
        .header("Date", signed.date)
        .header("Signature", signed.signature)
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), 403);
}
