//! Namespaced key-value configuration with a Consul backend and a
//! process-environment fallback.
//!
//! Application code talks to one contract, [`Environmenter`], in every
//! deployment tier:
//!
//! - [`ConsulEnv`] routes reads and writes to a Consul agent's KV API and
//!   degrades to process environment variables when the agent cannot be
//!   reached.
//! - [`LocalEnv`] skips the network entirely and uses process environment
//!   variables, for development machines without an agent.
//!
//! The backend is picked at construction time from an [`EnvConfig`] flag,
//! and namespace scoping always hands back a new handle:
//!
//! ```rust,no_run
//! use consul_env::{Config, Env, EnvConfig, Environmenter};
//!
//! # #[tokio::main]
//! # async fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let env = Env::new(EnvConfig::Consul(Config::new("http://127.0.0.1:8500")))?;
//! let env = env.set_namespace("billing");
//!
//! env.set("retries", "3").await?;
//! assert_eq!(env.get("retries").await, "3");
//! assert!(env.list().await.contains(&"retries=3".to_string()));
//! # Ok(())
//! # }
//! ```

pub mod backends;
pub mod config;
pub mod keys;
pub mod kv;
pub mod store;
pub mod vars;

pub use backends::consul::ConsulEnv;
pub use backends::local::LocalEnv;
pub use config::{Config, EnvConfig};
pub use kv::{ConnectError, KvClient, KvError, KvPair, QueryOptions, WriteOptions};
pub use store::{Env, EnvError, Environmenter};
pub use vars::{EnvVars, MemoryEnv, ProcessEnv, VarsError};
