//! Process-environment-only store for development machines.

use crate::keys;
use crate::store::Environmenter;
use crate::vars::{EnvVars, ProcessEnv, VarsError};

/// Store handle that reads and writes plain process environment variables.
///
/// Keys map onto variable names by replacing `/` with `.`. Namespaces do
/// not apply here; [`Environmenter::set_namespace`] hands back an
/// equivalent unscoped handle so code written against the contract still
/// composes.
#[derive(Debug, Clone, Default)]
pub struct LocalEnv<E: EnvVars = ProcessEnv> {
    vars: E,
}

impl LocalEnv<ProcessEnv> {
    /// Create a handle over the real process environment.
    pub fn new() -> Self {
        Self { vars: ProcessEnv }
    }
}

impl<E: EnvVars + Clone> LocalEnv<E> {
    /// Build a handle over a custom environment. Mostly useful for tests.
    pub fn with_vars(vars: E) -> Self {
        Self { vars }
    }
}

impl<E: EnvVars + Clone> Environmenter for LocalEnv<E> {
    type Error = VarsError;

    async fn get(&self, key: &str) -> String {
        self.vars.var(&keys::local_key(key)).unwrap_or_default()
    }

    async fn set(&self, key: &str, value: &str) -> Result<(), Self::Error> {
        self.vars.set_var(&keys::local_key(key), value)
    }

    async fn list(&self) -> Vec<String> {
        self.vars
            .vars()
            .into_iter()
            .map(|(key, value)| format!("{key}={value}"))
            .collect()
    }

    fn set_namespace(&self, _namespace: &str) -> Self {
        self.clone()
    }

    fn namespace(&self) -> &str {
        ""
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::vars::MemoryEnv;

    fn local() -> (LocalEnv<MemoryEnv>, MemoryEnv) {
        let vars = MemoryEnv::new();
        (LocalEnv::with_vars(vars.clone()), vars)
    }

    #[tokio::test]
    async fn get_maps_separators_to_dots() {
        let (store, vars) = local();
        vars.set("database.primary.host", "localhost");
        assert_eq!(store.get("database/primary/host").await, "localhost");
    }

    #[tokio::test]
    async fn get_missing_key_is_empty() {
        let (store, _) = local();
        assert_eq!(store.get("missing").await, "");
    }

    #[tokio::test]
    async fn set_then_get_round_trips() {
        let (store, vars) = local();
        store.set("cache/ttl", "30").await.unwrap();
        assert_eq!(vars.var("cache.ttl").unwrap(), "30");
        assert_eq!(store.get("cache/ttl").await, "30");
    }

    #[tokio::test]
    async fn set_rejects_invalid_variable_name() {
        let (store, _) = local();
        assert!(matches!(
            store.set("", "v").await,
            Err(VarsError::InvalidKey(_))
        ));
    }

    #[tokio::test]
    async fn list_is_the_whole_environment() {
        let (store, vars) = local();
        vars.set("A", "1");
        vars.set("B", "2");
        assert_eq!(store.list().await, vec!["A=1", "B=2"]);
    }

    #[tokio::test]
    async fn set_namespace_is_a_no_op() {
        let (store, vars) = local();
        vars.set("plain", "value");

        let scoped = store.set_namespace("svc");
        assert_eq!(scoped.namespace(), "");
        // Same environment, same unscoped keys.
        assert_eq!(scoped.get("plain").await, "value");
    }
}
