//! HTTP Signatures (Cavage draft) authentication and signing.
//!
//! Verifies RSA-SHA256 signatures built over a canonical list of request
//! headers, resolving `keyId` against the resource store (falling back to
//! stripping a URI fragment such as `#main-key`). Also provides the
//! outbound signer used by the delivery service.

use axum::async_trait;
use base64::{Engine, engine::general_purpose::STANDARD as BASE64};
use rsa::pkcs8::DecodePublicKey;
use rsa::signature::Verifier;
use rsa::{RsaPublicKey, pkcs1v15::Signature as Pkcs1v15Signature};
use sha2::{Digest, Sha256};
use std::sync::Arc;

use super::{AuthRequest, Authenticator, Identity};
use crate::error::{AppError, Result};
use crate::store::ResourceStore;

pub const DEFAULT_HEADERS: &[&str] = &["(request-target)", "host", "date", "digest"];

/// Verifies `Signature` headers against keys resolved through a store.
pub struct SignatureAuthenticator {
    store: Arc<dyn ResourceStore>,
}

impl SignatureAuthenticator {
    pub fn new(store: Arc<dyn ResourceStore>) -> Self {
        Self { store }
    }
}

#[async_trait]
impl Authenticator for SignatureAuthenticator {
    async fn authenticate(&self, request: &AuthRequest<'_>) -> Result<Option<Identity>> {
        let Some(header) = request.header("signature") else {
            return Ok(None);
        };
        let parsed = match parse_signature_header(header) {
            Ok(p) => p,
            Err(_) => return Ok(None),
        };

        let signing_string = match build_signing_string(request, &parsed.headers) {
            Ok(s) => s,
            Err(_) => return Ok(None),
        };

        let signature_bytes = match BASE64.decode(&parsed.signature) {
            Ok(b) => b,
            Err(_) => return Ok(None),
        };

        let public_key_pem = match resolve_key_pem(&*self.store, &parsed.key_id).await? {
            Some(pem) => pem,
            None => return Ok(None),
        };

        let public_key = match RsaPublicKey::from_public_key_pem(&public_key_pem) {
            Ok(k) => k,
            Err(_) => return Ok(None),
        };
        let verifier = rsa::pkcs1v15::VerifyingKey::<Sha256>::new_unprefixed(public_key);
        let signature = match Pkcs1v15Signature::try_from(signature_bytes.as_slice()) {
            Ok(s) => s,
            Err(_) => return Ok(None),
        };
        if verifier.verify(signing_string.as_bytes(), &signature).is_err() {
            return Ok(None);
        }

        let owner_uri = owner_of(&*self.store, &parsed.key_id)
            .await?
            .ok_or_else(|| AppError::InvalidSignature(format!("unknown key owner for {}", parsed.key_id)))?;

        let actor = self
            .store
            .get(&owner_uri)
            .await?
            .ok_or_else(|| AppError::InvalidSignature(format!("unknown user: {owner_uri}")))?;

        Ok(Some(Identity::new(actor)))
    }
}

/// Resolve `keyId` to a PEM public key, following the same lookup as the
/// source: try the key document directly, then the actor at `keyId` with
/// any URI fragment stripped, reading `publicKey.publicKeyPem`.
async fn resolve_key_pem(store: &dyn ResourceStore, key_id: &str) -> Result<Option<String>> {
    if let Some(key) = store.get(key_id).await? {
        if let Some(pem) = key.get("publicKeyPem").and_then(|v| v.as_str()) {
            return Ok(Some(pem.to_string()));
        }
    }
    let actor_uri = key_id.split('#').next().unwrap_or(key_id);
    if let Some(actor) = store.get(actor_uri).await? {
        if let Some(pem) = actor
            .get("publicKey")
            .and_then(|pk| pk.get("publicKeyPem"))
            .and_then(|v| v.as_str())
        {
            return Ok(Some(pem.to_string()));
        }
    }
    Ok(None)
}

/// The actor URI named by the key's `owner` field.
async fn owner_of(store: &dyn ResourceStore, key_id: &str) -> Result<Option<String>> {
    if let Some(key) = store.get(key_id).await? {
        if let Some(owner) = key.get("owner").and_then(|v| v.as_str()) {
            return Ok(Some(owner.to_string()));
        }
    }
    let actor_uri = key_id.split('#').next().unwrap_or(key_id);
    if let Some(actor) = store.get(actor_uri).await? {
        if let Some(owner) = actor
            .get("publicKey")
            .and_then(|pk| pk.get("owner"))
            .and_then(|v| v.as_str())
        {
            return Ok(Some(owner.to_string()));
        }
        // The actor itself owns its key when no explicit owner is given.
        if let Some(id) = actor.get("id").and_then(|v| v.as_str()) {
            return Ok(Some(id.to_string()));
        }
    }
    Ok(None)
}

fn build_signing_string(request: &AuthRequest<'_>, headers: &[String]) -> Result<String> {
    let mut lines = Vec::with_capacity(headers.len());
    for header in headers {
        let lower = header.to_lowercase();
        let line = if lower == "(request-target)" {
            format!("(request-target): {} {}", request.method.to_lowercase(), request.path)
        } else if lower == "digest" && request.body.is_empty() && request.header("digest").is_none() {
            continue;
        } else {
            let value = request.header(&lower).ok_or_else(|| {
                AppError::Validation(format!("missing header for signature: {lower}"))
            })?;
            format!("{lower}: {value}")
        };
        lines.push(line);
    }
    Ok(lines.join("\n"))
}

#[derive(Debug, Clone)]
pub struct ParsedSignature {
    pub key_id: String,
    pub algorithm: Option<String>,
    pub headers: Vec<String>,
    pub signature: String,
}

/// Parse a `Signature: keyId="...",algorithm="...",headers="...",signature="..."` header.
pub fn parse_signature_header(header: &str) -> Result<ParsedSignature> {
    let mut key_id = None;
    let mut algorithm = None;
    let mut headers = None;
    let mut signature = None;

    for part in header.split(',') {
        let part = part.trim();
        let Some((key, value)) = part.split_once('=') else {
            continue;
        };
        let value = value.trim().trim_matches('"');
        match key.trim() {
            "keyId" => key_id = Some(value.to_string()),
            "algorithm" => algorithm = Some(value.to_string()),
            "headers" => headers = Some(value.split_whitespace().map(str::to_string).collect()),
            "signature" => signature = Some(value.to_string()),
            _ => {}
        }
    }

    Ok(ParsedSignature {
        key_id: key_id.ok_or_else(|| AppError::Validation("missing keyId".into()))?,
        algorithm,
        headers: headers.ok_or_else(|| AppError::Validation("missing headers".into()))?,
        signature: signature.ok_or_else(|| AppError::Validation("missing signature".into()))?,
    })
}

/// `SHA-256=<base64>` digest of a request body.
pub fn generate_digest(body: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(body);
    format!("SHA-256={}", BASE64.encode(hasher.finalize()))
}

/// Headers synthesized for an outbound signed request.
pub struct SignatureHeaders {
    pub signature: String,
    pub date: String,
    pub digest: Option<String>,
    pub host: String,
}

/// Sign an outbound request, synthesizing `Date`, `Digest` and `Host` as
/// needed, matching [`DEFAULT_HEADERS`].
pub fn sign_request(
    method: &str,
    url: &str,
    body: Option<&[u8]>,
    private_key_pem: &str,
    key_id: &str,
) -> Result<SignatureHeaders> {
    use rsa::pkcs8::DecodePrivateKey;
    use rsa::signature::{RandomizedSigner, SignatureEncoding};

    let parsed_url = url::Url::parse(url)
        .map_err(|e| AppError::Validation(format!("invalid URL: {e}")))?;
    let host = parsed_url
        .host_str()
        .ok_or_else(|| AppError::Validation("missing host in URL".into()))?
        .to_string();
    let path_and_query = match parsed_url.query() {
        Some(q) => format!("{}?{}", parsed_url.path(), q),
        None => parsed_url.path().to_string(),
    };

    let date = chrono::Utc::now().format("%a, %d %b %Y %H:%M:%S GMT").to_string();
    let digest = body.map(generate_digest);

    let mut signing_parts = vec![
        format!("(request-target): {} {}", method.to_lowercase(), path_and_query),
        format!("host: {host}"),
        format!("date: {date}"),
    ];
    let mut headers_list = vec!["(request-target)", "host", "date"];
    if let Some(ref d) = digest {
        signing_parts.push(format!("digest: {d}"));
        headers_list.push("digest");
    }
    let signing_string = signing_parts.join("\n");

    let private_key = rsa::RsaPrivateKey::from_pkcs8_pem(private_key_pem)
        .map_err(|e| AppError::Validation(format!("invalid private key: {e}")))?;
    let signing_key = rsa::pkcs1v15::SigningKey::<Sha256>::new_unprefixed(private_key);
    let mut rng = rand::thread_rng();
    let signature = signing_key.sign_with_rng(&mut rng, signing_string.as_bytes());
    let signature_b64 = BASE64.encode(signature.to_bytes());

    let signature_header = format!(
        "keyId=\"{key_id}\",algorithm=\"rsa-sha256\",headers=\"{}\",signature=\"{signature_b64}\"",
        headers_list.join(" "),
    );

    Ok(SignatureHeaders {
        signature: signature_header,
        date,
        digest,
        host,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    // 2048-bit RSA test key pair, reused across signature tests.
    const TEST_PRIVATE_KEY: &str = include_str!("../../tests/fixtures/test_key_rsa");
    const TEST_PUBLIC_KEY: &str = include_str!("../../tests/fixtures/test_key_rsa.pub");

    #[test]
    fn parses_signature_header_fields() {
        let header = r#"keyId="https://x.test/u#main-key",algorithm="rsa-sha256",headers="(request-target) host date",signature="abc123""#;
        let parsed = parse_signature_header(header).unwrap();
        assert_eq!(parsed.key_id, "https://x.test/u#main-key");
        assert_eq!(parsed.headers, vec!["(request-target)", "host", "date"]);
        assert_eq!(parsed.signature, "abc123");
    }

    #[test]
    fn sign_then_verify_round_trips() {
        let url = "https://recipient.test/inbox";
        let body = b"{\"type\":\"Follow\"}";
        let signed = sign_request(
            "POST",
            url,
            Some(body),
            TEST_PRIVATE_KEY,
            "https://sender.test/actor#main-key",
        )
        .unwrap();

        let mut headers = http::HeaderMap::new();
        headers.insert("host", signed.host.parse().unwrap());
        headers.insert("date", signed.date.parse().unwrap());
        headers.insert("digest", signed.digest.clone().unwrap().parse().unwrap());
        headers.insert("signature", signed.signature.parse().unwrap());

        let request = AuthRequest {
            method: "POST",
            path: "/inbox",
            headers: &headers,
            body,
        };

        let parsed = parse_signature_header(request.header("signature").unwrap()).unwrap();
        let signing_string = build_signing_string(&request, &parsed.headers).unwrap();

        let public_key = RsaPublicKey::from_public_key_pem(TEST_PUBLIC_KEY).unwrap();
        let verifier = rsa::pkcs1v15::VerifyingKey::<Sha256>::new_unprefixed(public_key);
        let signature_bytes = BASE64.decode(&parsed.signature).unwrap();
        let signature = Pkcs1v15Signature::try_from(signature_bytes.as_slice()).unwrap();
        verifier.verify(signing_string.as_bytes(), &signature).unwrap();
    }
}
