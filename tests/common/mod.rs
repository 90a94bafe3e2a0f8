//! Common test utilities for end-to-end tests.

use firm::config::{self, AppConfig};
use firm::context::Context;
use serde_json::{Value, json};
use tokio::net::TcpListener;

/// A running instance of the server bound to a random port, backed by an
/// in-memory store scoped to a single tenant.
pub struct TestServer {
    pub addr: String,
    pub ctx: Context,
    pub client: reqwest::Client,
}

impl TestServer {
    /// Spin up a server for the tenant `https://t1.test` (the default
    /// scheme `resource_uri()` assumes when no `X-Forwarded-Proto` header
    /// is present).
    pub async fn new() -> Self {
        Self::with_tenants(vec!["https://t1.test".to_string()]).await
    }

    pub async fn with_tenants(prefixes: Vec<String>) -> Self {
        let app_config = AppConfig {
            server: config::ServerConfig {
                host: "127.0.0.1".to_string(),
                port: 0,
                http_timeout_seconds: 5,
            },
            store: config::StoreConfig {
                backend: config::StoreBackend::Memory,
                file_root: None,
                sql_path: None,
                fetch_fallback: false,
            },
            tenants: config::TenantsConfig { prefixes },
            logging: config::LoggingConfig {
                level: "info".to_string(),
                format: "pretty".to_string(),
            },
        };

        let ctx = Context::new(app_config).await.expect("context construction");

        let client = reqwest::Client::builder()
            .timeout(std::time::Duration::from_secs(10))
            .build()
            .unwrap();

        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let addr_str = format!("http://{addr}");

        let app = firm::http::build_router(ctx.clone());
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });
        tokio::time::sleep(tokio::time::Duration::from_millis(50)).await;

        Self { addr: addr_str, ctx, client }
    }

    pub fn url(&self, path: &str) -> String {
        format!("{}{}", self.addr, path)
    }

    /// Host header to present for requests against `http://t1.test`.
    pub fn host_header(&self) -> &'static str {
        "t1.test"
    }

    /// Seed an actor with its inbox/outbox/followers/following/likes
    /// collections, all empty `OrderedCollection`s. Returns the actor
    /// document as stored.
    pub async fn seed_actor(&self, uri: &str) -> Value {
        self.seed_actor_with_key(uri, None).await
    }

    /// Seed an actor carrying a `publicKey`/`privateKeyPem` pair, for
    /// signature-authenticated requests and outbound delivery.
    pub async fn seed_actor_with_key(&self, uri: &str, key_pem: Option<(&str, &str)>) -> Value {
        let inbox = format!("{uri}/inbox");
        let outbox = format!("{uri}/outbox");
        let followers = format!("{uri}/followers");
        let following = format!("{uri}/following");
        let likes = format!("{uri}/likes");

        for collection in [&inbox, &outbox, &followers, &following, &likes] {
            self.ctx
                .store
                .put(json!({
                    "id": collection,
                    "type": "OrderedCollection",
                    "attributedTo": uri,
                    "orderedItems": [],
                }))
                .await
                .unwrap();
        }

        let mut actor = json!({
            "id": uri,
            "type": "Person",
            "inbox": inbox,
            "outbox": outbox,
            "followers": followers,
            "following": following,
            "likes": likes,
        });

        if let Some((public_pem, private_pem)) = key_pem {
            actor["publicKey"] = json!({
                "id": format!("{uri}#main-key"),
                "owner": uri,
                "publicKeyPem": public_pem,
            });
            actor["privateKeyPem"] = json!(private_pem);
        }

        self.ctx.store.put(actor.clone()).await.unwrap();
        actor
    }

    pub async fn seed_note(&self, uri: &str, attributed_to: &str) -> Value {
        let likes = format!("{uri}/likes");
        self.ctx
            .store
            .put(json!({ "id": likes, "type": "Collection", "attributedTo": attributed_to, "items": [] }))
            .await
            .unwrap();

        let note = json!({
            "id": uri,
            "type": "Note",
            "attributedTo": attributed_to,
            "content": "hello",
            "likes": format!("{uri}/likes"),
        });
        self.ctx.store.put(note.clone()).await.unwrap();
        note
    }

    pub async fn get_resource(&self, uri: &str) -> Option<Value> {
        self.ctx.store.get(uri).await.unwrap()
    }

    /// POST `body` to `path` (on the `https://t1.test` tenant), signed as
    /// `actor_uri` with `private_key_pem`.
    pub async fn post_signed(
        &self,
        path: &str,
        body: &Value,
        actor_uri: &str,
        private_key_pem: &str,
    ) -> reqwest::Response {
        let body_bytes = serde_json::to_vec(body).unwrap();
        let key_id = format!("{actor_uri}#main-key");
        let signing_url = format!("https://t1.test{path}");
        let signed = firm::auth::signature::sign_request(
            "POST",
            &signing_url,
            Some(&body_bytes),
            private_key_pem,
            &key_id,
        )
        .unwrap();

        let mut request = self
            .client
            .post(self.url(path))
            .header("Host", self.host_header())
            .header("Date", signed.date)
            .header("Signature", signed.signature)
            .header("Content-Type", "application/activity+json");
        if let Some(digest) = signed.digest {
            request = request.header("Digest", digest);
        }
        request.body(body_bytes).send().await.unwrap()
    }
}

/// The RSA test key pair's PEM contents (PKCS8 private / SPKI public).
pub const TEST_PRIVATE_KEY: &str = include_str!("../fixtures/test_key_rsa");
pub const TEST_PUBLIC_KEY: &str = include_str!("../fixtures/test_key_rsa.pub");
