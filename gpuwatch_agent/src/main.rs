//! gpuwatch_agent: serves GPU snapshots over WebSocket, one push per sampler tick.

mod gpu;
mod sampler;
mod state;
mod types;
mod ws;

use std::net::SocketAddr;
use std::time::Duration;

use anyhow::Context;
use axum::{routing::get, Json, Router};
use serde_json::{json, Value};
use tracing::info;
use tracing_subscriber::EnvFilter;

use crate::gpu::GpuSource;
use crate::sampler::spawn_sampler;
use crate::state::AppState;
use crate::ws::ws_handler;

const USAGE: &str = "[--port PORT|-p PORT] [--interval-ms MS] [--gpus N]";

#[derive(Debug, PartialEq)]
struct AgentArgs {
    port: u16,
    interval_ms: u64,
    gpus: usize,
}

impl Default for AgentArgs {
    fn default() -> Self {
        Self {
            port: 8000,
            interval_ms: 1000,
            gpus: 2,
        }
    }
}

fn parse_value<T: std::str::FromStr>(flag: &str, v: Option<String>) -> Result<T, String> {
    v.as_deref()
        .and_then(|s| s.parse().ok())
        .ok_or_else(|| format!("{flag} expects a number"))
}

fn parse_args<I: IntoIterator<Item = String>>(args: I) -> Result<AgentArgs, String> {
    let mut it = args.into_iter();
    let prog = it.next().unwrap_or_else(|| "gpuwatch_agent".into());
    let mut a = AgentArgs::default();
    while let Some(arg) = it.next() {
        match arg.as_str() {
            "-h" | "--help" => return Err(format!("Usage: {prog} {USAGE}")),
            "--port" | "-p" => a.port = parse_value(&arg, it.next())?,
            "--interval-ms" => a.interval_ms = parse_value(&arg, it.next())?,
            "--gpus" => a.gpus = parse_value(&arg, it.next())?,
            _ if arg.starts_with("--port=") => {
                if let Some((_, v)) = arg.split_once('=') {
                    a.port = parse_value("--port", Some(v.to_string()))?;
                }
            }
            _ => return Err(format!("Unexpected argument '{arg}'. Usage: {prog} {USAGE}")),
        }
    }
    a.interval_ms = a.interval_ms.max(10);
    Ok(a)
}

async fn health() -> Json<Value> {
    Json(json!({ "status": "ok" }))
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = match parse_args(std::env::args()) {
        Ok(a) => a,
        Err(msg) => {
            eprintln!("{msg}");
            return Ok(());
        }
    };

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let state = AppState::new(GpuSource::detect(args.gpus));
    let _sampler = spawn_sampler(state.clone(), Duration::from_millis(args.interval_ms));

    let app = Router::new()
        .route("/ws", get(ws_handler))
        .route("/health", get(health))
        .with_state(state);

    let addr = SocketAddr::from(([0, 0, 0, 0], args.port));
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("binding {addr}"))?;
    info!("gpuwatch agent listening on ws://{addr}/ws");
    axum::serve(listener, app).await?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn args(a: &[&str]) -> Vec<String> {
        std::iter::once("agent")
            .chain(a.iter().copied())
            .map(String::from)
            .collect()
    }

    #[test]
    fn port_long_short_and_assign() {
        assert_eq!(parse_args(args(&["--port", "9001"])).unwrap().port, 9001);
        assert_eq!(parse_args(args(&["-p", "9002"])).unwrap().port, 9002);
        assert_eq!(parse_args(args(&["--port=9003"])).unwrap().port, 9003);
        assert_eq!(parse_args(args(&[])).unwrap(), AgentArgs::default());
    }

    #[test]
    fn interval_and_gpu_count() {
        let a = parse_args(args(&["--interval-ms", "250", "--gpus", "8"])).unwrap();
        assert_eq!(a.interval_ms, 250);
        assert_eq!(a.gpus, 8);
        assert_eq!(parse_args(args(&["--interval-ms", "0"])).unwrap().interval_ms, 10);
    }

    #[test]
    fn rejects_unknown_and_malformed() {
        assert!(parse_args(args(&["--port", "http"])).is_err());
        assert!(parse_args(args(&["--verbose"])).is_err());
        assert!(parse_args(args(&["--help"])).unwrap_err().starts_with("Usage:"));
    }
}
