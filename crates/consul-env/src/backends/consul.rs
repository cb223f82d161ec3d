//! Consul-backed store with process-environment fallback.

use tracing::{debug, warn};

use crate::config::Config;
use crate::keys;
use crate::kv::{ConnectError, KvClient, KvPair, QueryOptions, WriteOptions};
use crate::store::{EnvError, Environmenter};
use crate::vars::{EnvVars, ProcessEnv};

/// Store handle backed by the Consul KV API.
///
/// Single-key reads tolerate stale replicas and fall back to process
/// environment variables when the agent cannot be reached. Listings demand
/// a consistent read and come back empty on failure. Writes that fail
/// remotely land in the process environment instead, under the key's
/// [`fallback form`](crate::keys::fallback_key); the remote error only
/// surfaces when that fallback write fails too.
#[derive(Debug, Clone)]
pub struct ConsulEnv<E: EnvVars = ProcessEnv> {
    namespace: String,
    kv: KvClient,
    vars: E,
}

impl ConsulEnv<ProcessEnv> {
    /// Connect to Consul using `config`, with the real process environment
    /// as the fallback store.
    pub fn new(config: Config) -> Result<Self, ConnectError> {
        Ok(Self::with_vars(KvClient::new(config)?, ProcessEnv))
    }
}

impl<E: EnvVars + Clone> ConsulEnv<E> {
    /// Build a store from an existing client and a custom fallback
    /// environment. Mostly useful for tests.
    pub fn with_vars(kv: KvClient, vars: E) -> Self {
        Self {
            namespace: String::new(),
            kv,
            vars,
        }
    }

    /// The full key sent to Consul: namespace prefix plus `key`.
    fn remote_key(&self, key: &str) -> String {
        format!("{}{}", self.namespace, key)
    }

    fn render_listing(&self, pairs: Vec<KvPair>) -> Vec<String> {
        pairs
            .into_iter()
            // Consul lists the namespace node itself once it exists as a key.
            .filter(|pair| pair.key != self.namespace)
            .map(|pair| {
                let key = pair
                    .key
                    .strip_prefix(self.namespace.as_str())
                    .unwrap_or(&pair.key);
                format!("{}={}", key, String::from_utf8_lossy(&pair.value))
            })
            .collect()
    }
}

impl<E: EnvVars + Clone> Environmenter for ConsulEnv<E> {
    type Error = EnvError;

    async fn get(&self, key: &str) -> String {
        let remote_key = self.remote_key(key);
        match self.kv.get(&remote_key, &QueryOptions::STALE).await {
            Ok(Some(pair)) => String::from_utf8_lossy(&pair.value).into_owned(),
            Ok(None) => String::new(),
            Err(error) => {
                let fallback = keys::fallback_key(&self.namespace, &remote_key);
                debug!(
                    key = %remote_key,
                    fallback = %fallback,
                    error = %error,
                    "Consul read failed, falling back to process environment"
                );
                self.vars.var(&fallback).unwrap_or_default()
            }
        }
    }

    async fn set(&self, key: &str, value: &str) -> Result<(), Self::Error> {
        let remote_key = self.remote_key(key);
        match self
            .kv
            .put(&remote_key, value, &WriteOptions::default())
            .await
        {
            Ok(()) => Ok(()),
            Err(error) => {
                let fallback = keys::fallback_key(&self.namespace, &remote_key);
                debug!(
                    key = %remote_key,
                    fallback = %fallback,
                    error = %error,
                    "Consul write failed, falling back to process environment"
                );
                match self.vars.set_var(&fallback, value) {
                    Ok(()) => Ok(()),
                    Err(fallback_error) => {
                        warn!(
                            key = %remote_key,
                            error = %fallback_error,
                            "fallback environment write failed"
                        );
                        Err(EnvError::Kv(error))
                    }
                }
            }
        }
    }

    async fn list(&self) -> Vec<String> {
        match self.kv.list(&self.namespace, &QueryOptions::CONSISTENT).await {
            Ok(pairs) => self.render_listing(pairs),
            Err(error) => {
                debug!(prefix = %self.namespace, error = %error, "Consul listing failed");
                Vec::new()
            }
        }
    }

    fn set_namespace(&self, namespace: &str) -> Self {
        Self {
            namespace: keys::normalize_namespace(namespace),
            kv: self.kv.clone(),
            vars: self.vars.clone(),
        }
    }

    fn namespace(&self) -> &str {
        &self.namespace
    }
}
