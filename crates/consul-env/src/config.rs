//! Connection configuration for the Consul HTTP API.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::vars::EnvVars;

const ENV_CONSUL_ADDR: &str = "CONSUL_HTTP_ADDR";
const ENV_CONSUL_TOKEN: &str = "CONSUL_HTTP_TOKEN";
const ENV_CONSUL_DATACENTER: &str = "CONSUL_DATACENTER";

const DEFAULT_ADDRESS: &str = "http://127.0.0.1:8500";
const DEFAULT_TIMEOUT: Duration = Duration::from_secs(10);

/// Connection settings for a Consul agent.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Base address of the agent, e.g. `http://127.0.0.1:8500`.
    pub address: String,
    /// Datacenter to query. Uses the agent's own datacenter when `None`.
    pub datacenter: Option<String>,
    /// ACL token attached to every request.
    pub token: Option<String>,
    /// Per-request timeout. Default: `10s`.
    pub timeout: Duration,
    /// Accept self-signed TLS certificates. **Only for development.**
    pub tls_skip_verify: bool,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            address: DEFAULT_ADDRESS.to_string(),
            datacenter: None,
            token: None,
            timeout: DEFAULT_TIMEOUT,
            tls_skip_verify: false,
        }
    }
}

impl Config {
    /// Create a config pointing at `address`, with defaults for the rest.
    pub fn new(address: impl Into<String>) -> Self {
        Self {
            address: address.into(),
            ..Self::default()
        }
    }

    /// Build a config from environment variables.
    ///
    /// - `CONSUL_HTTP_ADDR`: agent address (default: `http://127.0.0.1:8500`)
    /// - `CONSUL_HTTP_TOKEN`: ACL token, if set
    /// - `CONSUL_DATACENTER`: datacenter, if set
    pub fn from_env<E: EnvVars>(env: &E) -> Self {
        Self {
            address: env
                .var(ENV_CONSUL_ADDR)
                .unwrap_or_else(|_| DEFAULT_ADDRESS.to_string()),
            datacenter: env.var(ENV_CONSUL_DATACENTER).ok(),
            token: env.var(ENV_CONSUL_TOKEN).ok(),
            ..Self::default()
        }
    }

    /// Override the datacenter to query.
    pub fn with_datacenter(mut self, datacenter: impl Into<String>) -> Self {
        self.datacenter = Some(datacenter.into());
        self
    }

    /// Attach an ACL token to every request.
    pub fn with_token(mut self, token: impl Into<String>) -> Self {
        self.token = Some(token.into());
        self
    }

    /// Override the per-request timeout.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Accept self-signed TLS certificates. **Only for development.**
    pub fn with_tls_skip_verify(mut self) -> Self {
        self.tls_skip_verify = true;
        self
    }
}

/// Which backend an [`Env`](crate::Env) handle routes operations to.
///
/// The choice is made once, at construction, by whatever configuration
/// mechanism the application already has; handles carry no global state.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "backend", rename_all = "snake_case")]
pub enum EnvConfig {
    /// Consul KV, with process environment variables as the fallback.
    Consul(Config),
    /// Process environment variables only.
    Local,
}
