//! Resolves database settings through the store, the way an application
//! boot sequence would.
//!
//! With a local agent running, values come from Consul:
//!
//! ```text
//! consul kv put ENABLE_LOGGING on
//! consul kv put DB/USER app
//! cargo run --example app_config
//! ```
//!
//! Without one, every read falls back to process environment variables in
//! their flattened form:
//!
//! ```text
//! ENABLE_LOGGING=on DB___USER=app DB___HOST=localhost cargo run --example app_config
//! ```

use consul_env::{Config, Env, EnvConfig, Environmenter, ProcessEnv};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let env = Env::new(EnvConfig::Consul(Config::from_env(&ProcessEnv)))?;

    if env.get("ENABLE_LOGGING").await == "on" {
        println!("Connecting to database:");
        println!(
            "{}:{}@tcp({}:{})/{}",
            env.get("DB/USER").await,
            env.get("DB/PASS").await,
            env.get("DB/HOST").await,
            env.get("DB/PORT").await,
            env.get("DB/NAME").await,
        );
    }

    Ok(())
}
