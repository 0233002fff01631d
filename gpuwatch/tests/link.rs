//! Drives `ws::Link` + `Dashboard` against an in-process WebSocket peer.

use std::time::Duration;

use futures_util::{SinkExt, StreamExt};
use tokio::net::TcpListener;
use tokio::sync::mpsc::UnboundedReceiver;
use tokio::time::timeout;
use tokio_tungstenite::{accept_async, tungstenite::Message};

use gpuwatch::config::Tuning;
use gpuwatch::conn::{Command, ConnStatus};
use gpuwatch::ws::{Envelope, Link};
use gpuwatch::Dashboard;

const WAIT: Duration = Duration::from_secs(5);

fn tuning() -> Tuning {
    Tuning {
        base_delay_ms: 50,
        max_delay_ms: 200,
        ..Default::default()
    }
}

fn snapshot(t: f64, util: f64) -> String {
    format!(r#"{{"timestamp":{t},"gpus":[{{"gpu_index":0,"name":"mock","gpu_util":{util},"mem_util":10,"temperature":50}}]}}"#)
}

async fn bind() -> (TcpListener, String) {
    let listener = TcpListener::bind("127.0.0.1:0").await.expect("bind");
    let port = listener.local_addr().unwrap().port();
    (listener, format!("ws://127.0.0.1:{port}/ws"))
}

// Accept one client, push `payloads`, then close from the server side
async fn serve_one(listener: &TcpListener, payloads: Vec<String>) {
    let (stream, _) = listener.accept().await.expect("accept");
    let mut ws = accept_async(stream).await.expect("handshake");
    for p in payloads {
        ws.send(Message::Text(p)).await.expect("send");
    }
    let _ = ws.close(None).await;
    while let Some(Ok(_)) = ws.next().await {}
}

/// Feed events into the dashboard until `done` holds; returns every command issued.
async fn pump(
    dash: &mut Dashboard,
    link: &mut Link,
    rx: &mut UnboundedReceiver<Envelope>,
    mut done: impl FnMut(&Dashboard, &[Command]) -> bool,
) -> Vec<Command> {
    let mut issued = Vec::new();
    loop {
        let (generation, signal) = timeout(WAIT, rx.recv())
            .await
            .expect("timed out waiting for transport event")
            .expect("channel open");
        let cmds = dash.handle(generation, signal);
        issued.extend(cmds.iter().cloned());
        let stop = done(dash, &cmds);
        link.execute(cmds).await;
        if stop {
            return issued;
        }
    }
}

#[tokio::test]
async fn receives_snapshots_and_schedules_reconnect_on_close() {
    let (listener, url) = bind().await;
    let server = tokio::spawn(async move {
        serve_one(
            &listener,
            vec![snapshot(100.0, 40.0), "{not json".into(), snapshot(101.0, 45.0)],
        )
        .await;
    });

    let mut dash = Dashboard::new(&tuning(), Some(url));
    let (mut link, mut rx) = Link::new();
    dash.toggle_device(0);
    link.execute(dash.start()).await;

    let issued = pump(&mut dash, &mut link, &mut rx, |_, cmds| {
        cmds.iter()
            .any(|c| matches!(c, Command::ScheduleReconnect { .. }))
    })
    .await;
    assert!(matches!(
        issued.last(),
        Some(Command::ScheduleReconnect { delay, .. }) if *delay == Duration::from_millis(50)
    ));

    assert_eq!(dash.latest().map(|s| s.timestamp), Some(101.0));
    assert_eq!(dash.device_history(0).map(|h| h.len()), Some(2));
    assert_eq!(dash.counters().accepted, 2);
    assert_eq!(dash.counters().rejected, 1);
    let rows = dash.chart(gpuwatch::metrics::MetricKey::GpuUtil).unwrap();
    assert_eq!(rows.len(), 2);
    assert_eq!(rows[1].values[&0], Some(45.0));

    link.execute(dash.stop()).await;
    link.shutdown().await;
    server.await.unwrap();
}

#[tokio::test]
async fn reconnects_after_server_close() {
    let (listener, url) = bind().await;
    let server = tokio::spawn(async move {
        serve_one(&listener, vec![snapshot(1.0, 10.0)]).await;
        serve_one(&listener, vec![snapshot(2.0, 20.0)]).await;
    });

    let mut dash = Dashboard::new(&tuning(), Some(url));
    let (mut link, mut rx) = Link::new();
    link.execute(dash.start()).await;

    pump(&mut dash, &mut link, &mut rx, |d, _| d.counters().accepted == 2).await;
    assert_eq!(dash.latest().map(|s| s.timestamp), Some(2.0));
    assert_eq!(dash.device_history(0).map(|h| h.len()), Some(2));

    link.execute(dash.stop()).await;
    link.shutdown().await;
    server.await.unwrap();
}

#[tokio::test]
async fn stop_closes_connection_and_suppresses_reconnect() {
    let (listener, url) = bind().await;
    let (closed_tx, closed_rx) = tokio::sync::oneshot::channel();
    let server = tokio::spawn(async move {
        let (stream, _) = listener.accept().await.expect("accept");
        let mut ws = accept_async(stream).await.expect("handshake");
        // hold the connection until the client closes it
        let mut saw_close = false;
        while let Some(Ok(msg)) = ws.next().await {
            if msg.is_close() {
                saw_close = true;
            }
        }
        let _ = closed_tx.send(saw_close);
    });

    let mut dash = Dashboard::new(&tuning(), Some(url));
    let (mut link, mut rx) = Link::new();
    link.execute(dash.start()).await;
    pump(&mut dash, &mut link, &mut rx, |d, _| d.status() == ConnStatus::Open).await;

    let cmds = dash.stop();
    assert!(matches!(cmds.as_slice(), [Command::Disconnect { .. }]));
    link.execute(cmds).await;

    assert!(timeout(WAIT, closed_rx).await.unwrap().unwrap(), "server saw a close frame");

    // Late events from the stopped connection produce nothing
    while let Ok(Some((generation, signal))) =
        timeout(Duration::from_millis(300), rx.recv()).await
    {
        assert!(dash.handle(generation, signal).is_empty());
    }
    assert_eq!(dash.status(), ConnStatus::Closed);
    assert!(!dash.is_running());
    link.shutdown().await;
    server.await.unwrap();
}

#[tokio::test]
async fn refused_connection_surfaces_error_and_retries() {
    let (listener, url) = bind().await;
    drop(listener);

    let mut dash = Dashboard::new(&tuning(), Some(url));
    let (mut link, mut rx) = Link::new();
    link.execute(dash.start()).await;

    let issued = pump(&mut dash, &mut link, &mut rx, |_, cmds| {
        cmds.iter()
            .any(|c| matches!(c, Command::ScheduleReconnect { .. }))
    })
    .await;
    assert_eq!(issued.len(), 1);
    assert_eq!(dash.status(), ConnStatus::Closed);
    assert!(dash.last_error().unwrap().contains("failed"));
    assert!(dash.latest().is_none());

    link.execute(dash.stop()).await;
    link.shutdown().await;
}

#[tokio::test]
async fn endpoint_switch_closes_old_socket_before_dialing_new() {
    let (old_listener, old_url) = bind().await;
    let (new_listener, new_url) = bind().await;
    let (closed_tx, closed_rx) = tokio::sync::oneshot::channel();
    let old_server = tokio::spawn(async move {
        let (stream, _) = old_listener.accept().await.expect("accept");
        let mut ws = accept_async(stream).await.expect("handshake");
        let mut saw_close = false;
        while let Some(Ok(msg)) = ws.next().await {
            if msg.is_close() {
                saw_close = true;
            }
        }
        let _ = closed_tx.send(saw_close);
    });
    let new_server = tokio::spawn(async move {
        serve_one(&new_listener, vec![snapshot(7.0, 70.0)]).await;
    });

    let mut dash = Dashboard::new(&tuning(), Some(old_url));
    let (mut link, mut rx) = Link::new();
    link.execute(dash.start()).await;
    pump(&mut dash, &mut link, &mut rx, |d, _| d.status() == ConnStatus::Open).await;

    let cmds = dash.set_endpoint(new_url.clone());
    let (old_gen, new_gen) = match cmds.as_slice() {
        [Command::Disconnect { generation: old }, Command::Connect { generation: new, url }] => {
            assert_eq!(url, &new_url);
            (*old, *new)
        }
        other => panic!("unexpected commands {other:?}"),
    };
    link.execute(cmds).await;

    // the old task finished before the new one was spawned, so its close comes first
    let (generation, signal) = timeout(WAIT, rx.recv()).await.unwrap().unwrap();
    assert_eq!(generation, old_gen);
    assert!(dash.handle(generation, signal).is_empty());
    assert_eq!(dash.status(), ConnStatus::Connecting);
    assert!(timeout(WAIT, closed_rx).await.unwrap().unwrap(), "old server saw a close frame");

    pump(&mut dash, &mut link, &mut rx, |d, _| d.counters().accepted == 1).await;
    assert_eq!(dash.latest().map(|s| s.timestamp), Some(7.0));
    assert_eq!(dash.endpoint(), Some(new_url.as_str()));
    assert!(new_gen > old_gen);

    link.execute(dash.stop()).await;
    link.shutdown().await;
    old_server.await.unwrap();
    new_server.await.unwrap();
}
