//! [`Environmenter`] trait and the backend-selecting [`Env`] facade.

use crate::backends::consul::ConsulEnv;
use crate::backends::local::LocalEnv;
use crate::config::EnvConfig;
use crate::kv::{ConnectError, KvError};
use crate::vars::VarsError;

/// Uniform read/write access to namespaced configuration.
///
/// Implementations must be `Send + Sync` so handles can be shared across
/// async tasks. Reads absorb backend failures (a configuration lookup
/// should never take the application down); only [`Environmenter::set`]
/// can fail, and only once every fallback is exhausted.
pub trait Environmenter: Send + Sync {
    /// The error type returned by [`Environmenter::set`].
    type Error: std::error::Error + Send + Sync;

    /// Fetch the value stored under `key` in the current namespace.
    ///
    /// Returns the empty string when the key is absent, and when the
    /// backend is unreachable and no fallback value exists.
    fn get(&self, key: &str) -> impl std::future::Future<Output = String> + Send;

    /// Store `value` under `key` in the current namespace.
    fn set(
        &self,
        key: &str,
        value: &str,
    ) -> impl std::future::Future<Output = Result<(), Self::Error>> + Send;

    /// List every `"key=value"` entry in the current namespace, with the
    /// namespace prefix stripped from the keys.
    ///
    /// Returns an empty `Vec` when the backend is unreachable.
    fn list(&self) -> impl std::future::Future<Output = Vec<String>> + Send;

    /// Return a new handle scoped to `namespace`. The receiver keeps its
    /// own scope; existing handles never change under a caller.
    fn set_namespace(&self, namespace: &str) -> Self
    where
        Self: Sized;

    /// The namespace this handle is scoped to.
    fn namespace(&self) -> &str;
}

/// Error returned by [`Env::set`](Environmenter::set).
#[derive(Debug)]
pub enum EnvError {
    /// The remote KV write failed, and so did the environment fallback.
    Kv(KvError),
    /// A process-environment write failed.
    Var(VarsError),
}

impl std::fmt::Display for EnvError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Kv(e) => write!(f, "KV write failed: {e}"),
            Self::Var(e) => write!(f, "environment write failed: {e}"),
        }
    }
}

impl std::error::Error for EnvError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Kv(e) => Some(e),
            Self::Var(e) => Some(e),
        }
    }
}

impl From<KvError> for EnvError {
    fn from(e: KvError) -> Self {
        Self::Kv(e)
    }
}

impl From<VarsError> for EnvError {
    fn from(e: VarsError) -> Self {
        Self::Var(e)
    }
}

/// Backend-selecting store handle.
///
/// Built from an [`EnvConfig`] flag, so the tier decision lives in the
/// application's own configuration rather than in compile-time features
/// or process-global state. Call sites stay backend-agnostic:
///
/// ```rust,no_run
/// use consul_env::{Env, EnvConfig, Environmenter};
///
/// # #[tokio::main]
/// # async fn main() -> Result<(), Box<dyn std::error::Error>> {
/// let env = Env::new(EnvConfig::Local)?.set_namespace("billing");
/// env.set("retries", "3").await?;
/// # Ok(())
/// # }
/// ```
#[derive(Debug, Clone)]
pub enum Env {
    /// Consul KV with process-environment fallback.
    Consul(ConsulEnv),
    /// Process environment variables only.
    Local(LocalEnv),
}

impl Env {
    /// Build a store handle for the configured backend.
    ///
    /// The only failure mode is an unusable Consul connection config; the
    /// local backend cannot fail to construct.
    pub fn new(config: EnvConfig) -> Result<Self, ConnectError> {
        match config {
            EnvConfig::Consul(config) => Ok(Self::Consul(ConsulEnv::new(config)?)),
            EnvConfig::Local => Ok(Self::Local(LocalEnv::new())),
        }
    }
}

impl Environmenter for Env {
    type Error = EnvError;

    async fn get(&self, key: &str) -> String {
        match self {
            Self::Consul(store) => store.get(key).await,
            Self::Local(store) => store.get(key).await,
        }
    }

    async fn set(&self, key: &str, value: &str) -> Result<(), Self::Error> {
        match self {
            Self::Consul(store) => store.set(key, value).await,
            Self::Local(store) => store.set(key, value).await.map_err(EnvError::Var),
        }
    }

    async fn list(&self) -> Vec<String> {
        match self {
            Self::Consul(store) => store.list().await,
            Self::Local(store) => store.list().await,
        }
    }

    fn set_namespace(&self, namespace: &str) -> Self {
        match self {
            Self::Consul(store) => Self::Consul(store.set_namespace(namespace)),
            Self::Local(store) => Self::Local(store.set_namespace(namespace)),
        }
    }

    fn namespace(&self) -> &str {
        match self {
            Self::Consul(store) => store.namespace(),
            Self::Local(store) => store.namespace(),
        }
    }
}
