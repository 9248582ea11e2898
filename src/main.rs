use std::env;

use anyhow::Context;
use axum::Router;
use serde_json::Value;
use tokio::net::TcpListener;

use policyqa_backend::core::config::AppPaths;
use policyqa_backend::core::logging;
use policyqa_backend::core::security::session_token_path;
use policyqa_backend::server;
use policyqa_backend::state::AppState;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let paths = AppPaths::new();
    logging::init(&paths);

    let state = AppState::initialize_at(paths.into())
        .await
        .context("Failed to initialize the policy pipeline")?;

    let config = state.config.load_config().unwrap_or(Value::Null);
    let bind_addr = resolve_bind_addr(&config);

    let listener = TcpListener::bind(&bind_addr)
        .await
        .with_context(|| format!("Failed to bind to {}", bind_addr))?;
    let addr = listener.local_addr()?;

    println!("POLICYQA_PORT={}", addr.port());
    tracing::info!(
        "Listening on {} (admin token at {})",
        addr,
        session_token_path(&state.paths).display()
    );

    let app: Router = server::router::router(state.clone());
    axum::serve(listener, app).await.context("Server error")?;

    Ok(())
}

/// `PORT` wins over `server.port`; host defaults to loopback.
fn resolve_bind_addr(config: &Value) -> String {
    let server = config.get("server");
    let host = server
        .and_then(|v| v.get("host"))
        .and_then(|v| v.as_str())
        .unwrap_or("127.0.0.1");
    let port = env::var("PORT")
        .ok()
        .and_then(|val| val.parse::<u16>().ok())
        .or_else(|| {
            server
                .and_then(|v| v.get("port"))
                .and_then(|v| v.as_u64())
                .and_then(|p| u16::try_from(p).ok())
        })
        .unwrap_or(7860);
    format!("{}:{}", host, port)
}
