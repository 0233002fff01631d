//! WebSocket driver: executes `conn::Command`s against real sockets and timers.
//!
//! Everything observed is sent back as `(generation, Signal)` over an unbounded
//! channel, so the owner of the `Dashboard` processes events one at a time.

use std::time::Duration;

use futures_util::StreamExt;
use tokio::net::TcpStream;
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tokio::time::{sleep, timeout};
use tokio_tungstenite::{connect_async, tungstenite::Message, MaybeTlsStream, WebSocketStream};
use tracing::{debug, warn};

use crate::conn::{Command, Signal, TransportEvent};

pub type WsStream = WebSocketStream<MaybeTlsStream<TcpStream>>;
pub type Envelope = (u64, Signal);

// How long a graceful close may take before the task is aborted
const CLOSE_GRACE: Duration = Duration::from_secs(2);

struct ConnTask {
    generation: u64,
    shutdown: oneshot::Sender<()>,
    handle: JoinHandle<()>,
}

pub struct Link {
    tx: mpsc::UnboundedSender<Envelope>,
    conn: Option<ConnTask>,
    timer: Option<JoinHandle<()>>,
}

impl Link {
    pub fn new() -> (Self, mpsc::UnboundedReceiver<Envelope>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (
            Self {
                tx,
                conn: None,
                timer: None,
            },
            rx,
        )
    }

    pub async fn execute(&mut self, cmds: Vec<Command>) {
        for cmd in cmds {
            match cmd {
                Command::Connect { generation, url } => {
                    // never two sockets at once: finish the old one first
                    self.close_conn().await;
                    let (shutdown, shutdown_rx) = oneshot::channel();
                    let tx = self.tx.clone();
                    let handle = tokio::spawn(run_connection(generation, url, tx, shutdown_rx));
                    self.conn = Some(ConnTask {
                        generation,
                        shutdown,
                        handle,
                    });
                }
                Command::Disconnect { generation } => {
                    if self.conn.as_ref().map(|c| c.generation) == Some(generation) {
                        self.close_conn().await;
                    }
                }
                Command::ScheduleReconnect { generation, delay } => {
                    self.cancel_timer();
                    let tx = self.tx.clone();
                    self.timer = Some(tokio::spawn(async move {
                        sleep(delay).await;
                        let _ = tx.send((generation, Signal::ReconnectTimer));
                    }));
                }
                Command::CancelReconnect => self.cancel_timer(),
            }
        }
    }

    pub async fn shutdown(&mut self) {
        self.cancel_timer();
        self.close_conn().await;
    }

    fn cancel_timer(&mut self) {
        if let Some(t) = self.timer.take() {
            t.abort();
        }
    }

    async fn close_conn(&mut self) {
        let Some(task) = self.conn.take() else {
            return;
        };
        let _ = task.shutdown.send(());
        let mut handle = task.handle;
        if timeout(CLOSE_GRACE, &mut handle).await.is_err() {
            warn!(generation = task.generation, "connection did not close in time, aborting");
            handle.abort();
        }
    }
}

async fn run_connection(
    generation: u64,
    url: String,
    tx: mpsc::UnboundedSender<Envelope>,
    mut shutdown: oneshot::Receiver<()>,
) {
    let send = |ev: TransportEvent| {
        let _ = tx.send((generation, Signal::Transport(ev)));
    };

    let connected = tokio::select! {
        r = connect_async(url.as_str()) => r,
        _ = &mut shutdown => {
            send(TransportEvent::Closed);
            return;
        }
    };
    let mut ws: WsStream = match connected {
        Ok((ws, _)) => ws,
        Err(e) => {
            send(TransportEvent::Error(format!("connect to {url} failed: {e}")));
            send(TransportEvent::Closed);
            return;
        }
    };
    send(TransportEvent::Opened);

    loop {
        tokio::select! {
            _ = &mut shutdown => {
                let _ = ws.close(None).await;
                break;
            }
            msg = ws.next() => match msg {
                Some(Ok(Message::Text(text))) => send(TransportEvent::Message(text)),
                Some(Ok(Message::Binary(bytes))) => match String::from_utf8(bytes) {
                    Ok(text) => send(TransportEvent::Message(text)),
                    Err(_) => debug!(generation, "dropping non-UTF-8 binary frame"),
                },
                Some(Ok(Message::Close(frame))) => {
                    debug!(generation, ?frame, "server closed connection");
                    break;
                }
                Some(Ok(_)) => {}
                Some(Err(e)) => {
                    send(TransportEvent::Error(format!("connection lost: {e}")));
                    break;
                }
                None => break,
            }
        }
    }
    send(TransportEvent::Closed);
}
