//! Thin client for the Consul KV HTTP API (`/v1/kv`).
//!
//! Covers exactly the surface the store needs: single-key reads, raw-body
//! writes and recursive listings, plus the read-consistency modes the API
//! exposes. Values travel base64 encoded on the wire and are decoded here.

use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine as _;
use reqwest::{Client, StatusCode, Url};
use serde::Deserialize;

use crate::config::Config;

// ── Errors ────────────────────────────────────────────────────────────────────

/// Errors from building a [`KvClient`].
#[derive(Debug)]
pub enum ConnectError {
    /// The configured address could not be used as an HTTP(S) base URL.
    InvalidAddress { address: String, message: String },
    /// The underlying HTTP client could not be constructed.
    Client(reqwest::Error),
}

impl std::fmt::Display for ConnectError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::InvalidAddress { address, message } => {
                write!(f, "invalid Consul address {address:?}: {message}")
            }
            Self::Client(e) => write!(f, "failed to build HTTP client: {e}"),
        }
    }
}

impl std::error::Error for ConnectError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Client(e) => Some(e),
            _ => None,
        }
    }
}

/// Errors from a KV operation.
#[derive(Debug)]
pub enum KvError {
    /// An HTTP transport error.
    Http(reqwest::Error),
    /// Consul answered with a non-success status code.
    Api { status: u16, message: String },
    /// The response body could not be decoded.
    Decode(String),
}

impl std::fmt::Display for KvError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Http(e) => write!(f, "HTTP error: {e}"),
            Self::Api { status, message } => {
                write!(f, "Consul API error ({status}): {message}")
            }
            Self::Decode(msg) => write!(f, "decode error: {msg}"),
        }
    }
}

impl std::error::Error for KvError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Http(e) => Some(e),
            _ => None,
        }
    }
}

// ── Wire types ────────────────────────────────────────────────────────────────

/// A single entry in the KV store.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KvPair {
    /// Full key, including any namespace prefix.
    pub key: String,
    /// Raw value bytes.
    pub value: Vec<u8>,
    /// Opaque per-key flags.
    pub flags: u64,
    pub create_index: u64,
    pub modify_index: u64,
}

/// Entry as Consul serializes it: PascalCase fields, base64 value.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct RawKvPair {
    key: String,
    /// `None` for keys stored with an empty value.
    value: Option<String>,
    #[serde(default)]
    flags: u64,
    #[serde(default)]
    create_index: u64,
    #[serde(default)]
    modify_index: u64,
}

impl RawKvPair {
    fn decode(self) -> Result<KvPair, KvError> {
        let value = match self.value {
            Some(encoded) => BASE64.decode(encoded.as_bytes()).map_err(|e| {
                KvError::Decode(format!("value for {:?} is not valid base64: {e}", self.key))
            })?,
            None => Vec::new(),
        };
        Ok(KvPair {
            key: self.key,
            value,
            flags: self.flags,
            create_index: self.create_index,
            modify_index: self.modify_index,
        })
    }
}

// ── Options ───────────────────────────────────────────────────────────────────

/// Read-consistency options for KV queries.
#[derive(Debug, Clone, Copy, Default)]
pub struct QueryOptions {
    /// Let any agent answer from possibly stale replicated state.
    pub allow_stale: bool,
    /// Force a quorum read through the current leader.
    pub require_consistent: bool,
}

impl QueryOptions {
    /// Stale-tolerant read: any agent may answer.
    pub const STALE: Self = Self {
        allow_stale: true,
        require_consistent: false,
    };

    /// Fully consistent read through the leader.
    pub const CONSISTENT: Self = Self {
        allow_stale: false,
        require_consistent: true,
    };
}

/// Options applied to KV writes.
#[derive(Debug, Clone, Copy, Default)]
pub struct WriteOptions {
    /// Opaque per-key flags stored alongside the value.
    pub flags: Option<u64>,
}

// ── Client ────────────────────────────────────────────────────────────────────

/// Client for a single Consul agent's KV endpoint.
///
/// Cloning is cheap; clones share the underlying connection pool. The
/// datacenter and ACL token from [`Config`] are applied to every request.
#[derive(Debug, Clone)]
pub struct KvClient {
    client: Client,
    address: String,
    datacenter: Option<String>,
    token: Option<String>,
}

impl KvClient {
    /// Build a client from connection settings.
    ///
    /// No request is made here; an unreachable agent surfaces later as
    /// per-operation errors.
    pub fn new(config: Config) -> Result<Self, ConnectError> {
        let address = config.address.trim_end_matches('/').to_string();
        let url = Url::parse(&address).map_err(|e| ConnectError::InvalidAddress {
            address: address.clone(),
            message: e.to_string(),
        })?;
        if url.scheme() != "http" && url.scheme() != "https" {
            return Err(ConnectError::InvalidAddress {
                address,
                message: format!("unsupported scheme {:?}", url.scheme()),
            });
        }

        let mut builder = Client::builder().timeout(config.timeout);
        if config.tls_skip_verify {
            builder = builder.danger_accept_invalid_certs(true);
        }
        let client = builder.build().map_err(ConnectError::Client)?;

        Ok(Self {
            client,
            address,
            datacenter: config.datacenter,
            token: config.token,
        })
    }

    /// Fetch a single key. Returns `Ok(None)` when the key does not exist.
    pub async fn get(&self, key: &str, options: &QueryOptions) -> Result<Option<KvPair>, KvError> {
        let url = self.kv_url(key);
        let resp = self
            .request(self.client.get(&url).query(&self.read_query(options)))
            .send()
            .await
            .map_err(KvError::Http)?;

        let status = resp.status();
        if status == StatusCode::NOT_FOUND {
            return Ok(None);
        }
        if !status.is_success() {
            return Err(api_error(status, resp).await);
        }

        let pairs: Vec<RawKvPair> = resp.json().await.map_err(KvError::Http)?;
        match pairs.into_iter().next() {
            Some(raw) => Ok(Some(raw.decode()?)),
            None => Ok(None),
        }
    }

    /// Write `value` under `key`. The body is sent raw, not JSON encoded.
    pub async fn put(&self, key: &str, value: &str, options: &WriteOptions) -> Result<(), KvError> {
        let url = self.kv_url(key);
        let mut query: Vec<(&str, String)> = Vec::new();
        if let Some(dc) = &self.datacenter {
            query.push(("dc", dc.clone()));
        }
        if let Some(flags) = options.flags {
            query.push(("flags", flags.to_string()));
        }

        let resp = self
            .request(self.client.put(&url).query(&query).body(value.to_string()))
            .send()
            .await
            .map_err(KvError::Http)?;

        let status = resp.status();
        if !status.is_success() {
            return Err(api_error(status, resp).await);
        }

        // The endpoint reports the write's outcome as a literal boolean body.
        let body = resp.text().await.map_err(KvError::Http)?;
        if body.trim() == "false" {
            return Err(KvError::Api {
                status: status.as_u16(),
                message: "write was rejected".to_string(),
            });
        }
        Ok(())
    }

    /// List every key under `prefix`, recursively.
    ///
    /// Returns an empty `Vec` when nothing is stored under the prefix.
    pub async fn list(&self, prefix: &str, options: &QueryOptions) -> Result<Vec<KvPair>, KvError> {
        let url = self.kv_url(prefix);
        let mut query = self.read_query(options);
        query.push(("recurse", String::new()));

        let resp = self
            .request(self.client.get(&url).query(&query))
            .send()
            .await
            .map_err(KvError::Http)?;

        let status = resp.status();
        if status == StatusCode::NOT_FOUND {
            return Ok(Vec::new());
        }
        if !status.is_success() {
            return Err(api_error(status, resp).await);
        }

        let raw: Vec<RawKvPair> = resp.json().await.map_err(KvError::Http)?;
        raw.into_iter().map(RawKvPair::decode).collect()
    }

    // ── Request plumbing ──────────────────────────────────────────────────────

    fn kv_url(&self, key: &str) -> String {
        format!("{}/v1/kv/{}", self.address, key.trim_start_matches('/'))
    }

    /// Query string shared by reads: datacenter plus consistency mode.
    ///
    /// `stale` and `consistent` are presence flags on the wire, sent with
    /// an empty value exactly as the canonical clients do.
    fn read_query(&self, options: &QueryOptions) -> Vec<(&'static str, String)> {
        let mut query = Vec::new();
        if let Some(dc) = &self.datacenter {
            query.push(("dc", dc.clone()));
        }
        if options.allow_stale {
            query.push(("stale", String::new()));
        }
        if options.require_consistent {
            query.push(("consistent", String::new()));
        }
        query
    }

    fn request(&self, builder: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        match &self.token {
            Some(token) => builder.header("X-Consul-Token", token),
            None => builder,
        }
    }
}

async fn api_error(status: StatusCode, resp: reqwest::Response) -> KvError {
    let message = resp.text().await.unwrap_or_default();
    KvError::Api {
        status: status.as_u16(),
        message: message.trim().to_string(),
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use httpmock::prelude::*;

    fn client(server: &MockServer) -> KvClient {
        KvClient::new(Config::new(format!("http://{}", server.address()))).unwrap()
    }

    // ── Pure (no HTTP) ────────────────────────────────────────────────────────

    #[test]
    fn kv_url_format() {
        let kv = KvClient::new(Config::new("http://consul.internal:8500")).unwrap();
        assert_eq!(kv.kv_url("svc/retries"), "http://consul.internal:8500/v1/kv/svc/retries");
        assert_eq!(kv.kv_url("/svc/retries"), "http://consul.internal:8500/v1/kv/svc/retries");
    }

    #[test]
    fn trailing_slash_in_address_is_trimmed() {
        let kv = KvClient::new(Config::new("http://consul.internal:8500/")).unwrap();
        assert_eq!(kv.kv_url("k"), "http://consul.internal:8500/v1/kv/k");
    }

    #[test]
    fn invalid_address_is_rejected() {
        let result = KvClient::new(Config::new("not a url"));
        assert!(matches!(result, Err(ConnectError::InvalidAddress { .. })));
    }

    #[test]
    fn non_http_scheme_is_rejected() {
        let result = KvClient::new(Config::new("ftp://consul.internal:8500"));
        assert!(matches!(
            result,
            Err(ConnectError::InvalidAddress { message, .. }) if message.contains("scheme")
        ));
    }

    // ── httpmock tests ────────────────────────────────────────────────────────

    #[tokio::test]
    async fn get_decodes_base64_value() {
        let server = MockServer::start();
        let mock = server.mock(|when, then| {
            when.method(GET).path("/v1/kv/db/host");
            then.status(200)
                .header("content-type", "application/json")
                .body(r#"[{"LockIndex":0,"Key":"db/host","Flags":0,"Value":"bG9jYWxob3N0","CreateIndex":5,"ModifyIndex":7}]"#);
        });

        let pair = client(&server).get("db/host", &QueryOptions::default()).await.unwrap().unwrap();
        assert_eq!(pair.key, "db/host");
        assert_eq!(pair.value, b"localhost");
        assert_eq!(pair.create_index, 5);
        assert_eq!(pair.modify_index, 7);
        mock.assert();
    }

    #[tokio::test]
    async fn get_missing_key_is_none() {
        let server = MockServer::start();
        let mock = server.mock(|when, then| {
            when.method(GET).path("/v1/kv/missing");
            then.status(404).body("");
        });

        let result = client(&server).get("missing", &QueryOptions::default()).await.unwrap();
        assert_eq!(result, None);
        mock.assert();
    }

    #[tokio::test]
    async fn get_sends_stale_datacenter_and_token() {
        let server = MockServer::start();
        let mock = server.mock(|when, then| {
            when.method(GET)
                .path("/v1/kv/k")
                .query_param("stale", "")
                .query_param("dc", "dc2")
                .header("x-consul-token", "secret");
            then.status(404).body("");
        });

        let config = Config::new(format!("http://{}", server.address()))
            .with_datacenter("dc2")
            .with_token("secret");
        let kv = KvClient::new(config).unwrap();
        kv.get("k", &QueryOptions::STALE).await.unwrap();
        mock.assert();
    }

    #[tokio::test]
    async fn get_null_value_decodes_to_empty_bytes() {
        let server = MockServer::start();
        server.mock(|when, then| {
            when.method(GET).path("/v1/kv/svc/");
            then.status(200)
                .header("content-type", "application/json")
                .body(r#"[{"LockIndex":0,"Key":"svc/","Flags":0,"Value":null,"CreateIndex":1,"ModifyIndex":1}]"#);
        });

        let pair = client(&server).get("svc/", &QueryOptions::default()).await.unwrap().unwrap();
        assert!(pair.value.is_empty());
    }

    #[tokio::test]
    async fn get_invalid_base64_is_decode_error() {
        let server = MockServer::start();
        server.mock(|when, then| {
            when.method(GET).path("/v1/kv/bad");
            then.status(200)
                .header("content-type", "application/json")
                .body(r#"[{"LockIndex":0,"Key":"bad","Flags":0,"Value":"@@@","CreateIndex":1,"ModifyIndex":1}]"#);
        });

        let result = client(&server).get("bad", &QueryOptions::default()).await;
        assert!(matches!(result, Err(KvError::Decode(_))));
    }

    #[tokio::test]
    async fn put_sends_raw_body() {
        let server = MockServer::start();
        let mock = server.mock(|when, then| {
            when.method(PUT).path("/v1/kv/svc/retries").body("3");
            then.status(200)
                .header("content-type", "application/json")
                .body("true");
        });

        client(&server)
            .put("svc/retries", "3", &WriteOptions::default())
            .await
            .unwrap();
        mock.assert();
    }

    #[tokio::test]
    async fn put_sends_flags_query() {
        let server = MockServer::start();
        let mock = server.mock(|when, then| {
            when.method(PUT).path("/v1/kv/k").query_param("flags", "42");
            then.status(200).body("true");
        });

        let options = WriteOptions { flags: Some(42) };
        client(&server).put("k", "v", &options).await.unwrap();
        mock.assert();
    }

    #[tokio::test]
    async fn put_rejected_write_is_api_error() {
        let server = MockServer::start();
        server.mock(|when, then| {
            when.method(PUT).path("/v1/kv/k");
            then.status(200).body("false");
        });

        let result = client(&server).put("k", "v", &WriteOptions::default()).await;
        assert!(matches!(result, Err(KvError::Api { status: 200, .. })));
    }

    #[tokio::test]
    async fn put_surfaces_server_error_body() {
        let server = MockServer::start();
        server.mock(|when, then| {
            when.method(PUT).path("/v1/kv/k");
            then.status(500).body("rpc error: No cluster leader");
        });

        let result = client(&server).put("k", "v", &WriteOptions::default()).await;
        assert!(matches!(
            result,
            Err(KvError::Api { status: 500, message }) if message.contains("No cluster leader")
        ));
    }

    #[tokio::test]
    async fn list_sends_recurse_and_consistent() {
        let server = MockServer::start();
        let mock = server.mock(|when, then| {
            when.method(GET)
                .path("/v1/kv/svc/")
                .query_param("recurse", "")
                .query_param("consistent", "");
            then.status(200)
                .header("content-type", "application/json")
                .body(r#"[{"LockIndex":0,"Key":"svc/retries","Flags":0,"Value":"Mw==","CreateIndex":10,"ModifyIndex":10}]"#);
        });

        let pairs = client(&server).list("svc/", &QueryOptions::CONSISTENT).await.unwrap();
        assert_eq!(pairs.len(), 1);
        assert_eq!(pairs[0].key, "svc/retries");
        assert_eq!(pairs[0].value, b"3");
        mock.assert();
    }

    #[tokio::test]
    async fn list_missing_prefix_is_empty() {
        let server = MockServer::start();
        server.mock(|when, then| {
            when.method(GET).path("/v1/kv/none/");
            then.status(404).body("");
        });

        let pairs = client(&server).list("none/", &QueryOptions::default()).await.unwrap();
        assert!(pairs.is_empty());
    }

    #[test]
    fn error_display() {
        let err = KvError::Api {
            status: 500,
            message: "rpc error".to_string(),
        };
        assert!(err.to_string().contains("500"));
        assert!(err.to_string().contains("rpc error"));

        let err = ConnectError::InvalidAddress {
            address: "nope".to_string(),
            message: "relative URL without a base".to_string(),
        };
        assert!(err.to_string().contains("nope"));
    }
}
