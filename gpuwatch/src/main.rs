//! Entry point for the gpuwatch TUI. Parses args, resolves config and runs the App.

mod app;
mod ui;

use std::env;
use std::fs::{self, OpenOptions};
use std::sync::Mutex;

use anyhow::Context;
use tracing_subscriber::EnvFilter;

use gpuwatch::config::{config_dir, load_config, ConfigFile};

const USAGE: &str = "[--secure|-s] [--endpoint N|-e N] [--history N] [--chart N] [--headless] [--dry-run] [--demo] [ws://HOST:PORT/ws]";

#[derive(Debug, Default, PartialEq)]
struct ParsedArgs {
    url: Option<String>,
    secure: bool,
    endpoint: Option<usize>,
    history: Option<usize>,
    chart: Option<usize>,
    headless: bool,
    dry_run: bool,
    demo: bool,
}

fn parse_num(flag: &str, v: Option<String>) -> Result<usize, String> {
    v.as_deref()
        .and_then(|s| s.parse().ok())
        .ok_or_else(|| format!("{flag} expects a non-negative integer"))
}

fn parse_args<I: IntoIterator<Item = String>>(args: I) -> Result<ParsedArgs, String> {
    let mut it = args.into_iter();
    let prog = it.next().unwrap_or_else(|| "gpuwatch".into());
    let mut p = ParsedArgs::default();

    while let Some(arg) = it.next() {
        match arg.as_str() {
            "-h" | "--help" => return Err(format!("Usage: {prog} {USAGE}")),
            "--secure" | "-s" => p.secure = true,
            "--endpoint" | "-e" => p.endpoint = Some(parse_num(&arg, it.next())?),
            "--history" => p.history = Some(parse_num(&arg, it.next())?),
            "--chart" => p.chart = Some(parse_num(&arg, it.next())?),
            "--headless" => p.headless = true,
            "--dry-run" => p.dry_run = true,
            "--demo" => p.demo = true,
            _ if arg.starts_with("--endpoint=") => {
                if let Some((_, v)) = arg.split_once('=') {
                    p.endpoint = Some(parse_num("--endpoint", Some(v.to_string()))?);
                }
            }
            _ if arg.starts_with('-') => {
                return Err(format!("Unknown flag '{arg}'. Usage: {prog} {USAGE}"));
            }
            _ => {
                if p.url.is_none() {
                    p.url = Some(arg);
                } else {
                    return Err(format!("Unexpected argument. Usage: {prog} {USAGE}"));
                }
            }
        }
    }
    Ok(p)
}

/// CLI flags override the config file.
fn apply_args(mut cfg: ConfigFile, p: &ParsedArgs) -> ConfigFile {
    if p.secure {
        cfg.endpoints.secure = true;
    }
    if let Some(i) = p.endpoint {
        cfg.endpoints.selected = i;
    }
    if let Some(u) = p.url.as_ref() {
        cfg.endpoints.override_url = Some(u.clone());
    }
    if let Some(n) = p.history {
        cfg.tuning.history_len = n;
    }
    if let Some(n) = p.chart {
        cfg.tuning.chart_len = n;
    }
    cfg.tuning = cfg.tuning.sanitized();
    cfg
}

fn init_logging(headless: bool) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    if headless {
        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_writer(std::io::stderr)
            .init();
        return;
    }
    // The terminal is ours; keep logs in a file next to the config
    let dir = config_dir();
    let file = fs::create_dir_all(&dir).and_then(|_| {
        OpenOptions::new()
            .create(true)
            .append(true)
            .open(dir.join("gpuwatch.log"))
    });
    match file {
        Ok(f) => tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_ansi(false)
            .with_writer(Mutex::new(f))
            .init(),
        Err(_) => tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_writer(std::io::sink)
            .init(),
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let parsed = match parse_args(env::args()) {
        Ok(v) => v,
        Err(msg) => {
            eprintln!("{msg}");
            return Ok(());
        }
    };

    let mut cfg = apply_args(load_config(), &parsed);

    if parsed.dry_run {
        let url = cfg.endpoints.resolve().context("resolving endpoint")?;
        println!("endpoint: {url}");
        println!("{}", serde_json::to_string_pretty(&cfg)?);
        return Ok(());
    }

    init_logging(parsed.headless);

    // Demo mode: run against a local agent we spawn ourselves
    let _agent = if parsed.demo {
        let port = 8231;
        cfg.endpoints.override_url = Some(format!("ws://127.0.0.1:{port}/ws"));
        Some(spawn_demo_agent(port)?)
    } else {
        None
    };

    if parsed.headless {
        app::run_headless(&cfg.tuning, cfg.endpoints).await
    } else {
        let mut app = app::App::new(&cfg.tuning, cfg.endpoints);
        app.run().await
    }
}

// --- Demo Mode ---

struct DemoGuard(std::process::Child);

impl Drop for DemoGuard {
    fn drop(&mut self) {
        let _ = self.0.kill();
        let _ = self.0.wait();
    }
}

fn spawn_demo_agent(port: u16) -> anyhow::Result<DemoGuard> {
    let candidate = find_agent_executable();
    let mut cmd = std::process::Command::new(&candidate);
    cmd.arg("--port").arg(port.to_string());
    cmd.env("GPUWATCH_AGENT_NVML", "0");
    cmd.stderr(std::process::Stdio::null());
    let child = cmd
        .spawn()
        .with_context(|| format!("spawning {}", candidate.display()))?;
    // Give the agent a brief moment to start; the reconnect loop covers the rest
    std::thread::sleep(std::time::Duration::from_millis(300));
    Ok(DemoGuard(child))
}

fn find_agent_executable() -> std::path::PathBuf {
    if let Some(parent) = std::env::current_exe().ok().as_deref().and_then(|p| p.parent()) {
        #[cfg(windows)]
        let name = "gpuwatch_agent.exe";
        #[cfg(not(windows))]
        let name = "gpuwatch_agent";
        let candidate = parent.join(name);
        if candidate.exists() {
            return candidate;
        }
    }
    // Fallback to relying on PATH
    std::path::PathBuf::from("gpuwatch_agent")
}

#[cfg(test)]
mod tests {
    use super::*;

    fn args(a: &[&str]) -> Vec<String> {
        std::iter::once("gpuwatch")
            .chain(a.iter().copied())
            .map(String::from)
            .collect()
    }

    #[test]
    fn parses_flags_and_url() {
        let p = parse_args(args(&["-s", "--endpoint", "2", "--history", "30", "--headless", "gpu:1/ws"]))
            .unwrap();
        assert_eq!(
            p,
            ParsedArgs {
                url: Some("gpu:1/ws".into()),
                secure: true,
                endpoint: Some(2),
                history: Some(30),
                headless: true,
                ..Default::default()
            }
        );
        assert_eq!(parse_args(args(&["--endpoint=1"])).unwrap().endpoint, Some(1));
    }

    #[test]
    fn rejects_bad_input() {
        assert!(parse_args(args(&["--help"])).unwrap_err().starts_with("Usage:"));
        assert!(parse_args(args(&["--chart", "many"])).is_err());
        assert!(parse_args(args(&["--bogus"])).is_err());
        assert!(parse_args(args(&["a:1/ws", "b:1/ws"])).is_err());
    }

    #[test]
    fn args_override_config() {
        let p = parse_args(args(&["--secure", "--chart", "0", "host:9/ws"])).unwrap();
        let cfg = apply_args(ConfigFile::default(), &p);
        assert_eq!(cfg.endpoints.resolve().unwrap(), "wss://host:9/ws");
        // zero is not usable and falls back to the default
        assert_eq!(cfg.tuning.chart_len, 120);
    }
}
