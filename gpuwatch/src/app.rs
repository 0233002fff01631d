//! App state and main loop: input handling, driving the connection, and drawing.

use std::{io, time::Duration};

use crossterm::{
    event::{self, DisableMouseCapture, EnableMouseCapture, Event, KeyCode, KeyEvent, KeyEventKind},
    execute,
    terminal::{disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen},
};
use ratatui::{
    backend::CrosstermBackend,
    layout::{Constraint, Direction, Layout},
    Terminal,
};
use tokio::sync::mpsc::UnboundedReceiver;
use tokio::time::timeout;
use tracing::{info, warn};

use gpuwatch::config::{EndpointConfig, Tuning};
use gpuwatch::conn::Command;
use gpuwatch::metrics::MetricKey;
use gpuwatch::ws::{Envelope, Link};
use gpuwatch::Dashboard;

use crate::ui::{
    chart::draw_chart,
    devices::draw_devices,
    header::{draw_footer, draw_header},
};

// Longest the loop waits for a transport event before polling input again
const FRAME: Duration = Duration::from_millis(100);

pub struct App {
    dash: Dashboard,
    link: Link,
    rx: UnboundedReceiver<Envelope>,
    endpoints: EndpointConfig,
    should_quit: bool,
}

impl App {
    pub fn new(tuning: &Tuning, endpoints: EndpointConfig) -> Self {
        let endpoint = match endpoints.resolve() {
            Ok(u) => Some(u),
            Err(e) => {
                warn!("{e}");
                None
            }
        };
        let (link, rx) = Link::new();
        Self {
            dash: Dashboard::new(tuning, endpoint),
            link,
            rx,
            endpoints,
            should_quit: false,
        }
    }

    async fn apply(&mut self, cmds: Vec<Command>) {
        self.link.execute(cmds).await;
    }

    async fn dispatch(&mut self, (generation, signal): Envelope) {
        let cmds = self.dash.handle(generation, signal);
        self.apply(cmds).await;
    }

    pub async fn run(&mut self) -> anyhow::Result<()> {
        let cmds = self.dash.start();
        self.apply(cmds).await;

        // Terminal setup
        enable_raw_mode()?;
        let mut stdout = io::stdout();
        execute!(stdout, EnterAlternateScreen, EnableMouseCapture)?;
        let backend = CrosstermBackend::new(stdout);
        let mut terminal = Terminal::new(backend)?;
        terminal.clear()?;

        // Main loop
        let res = self.event_loop(&mut terminal).await;

        // Teardown
        disable_raw_mode()?;
        let backend = terminal.backend_mut();
        execute!(backend, DisableMouseCapture, LeaveAlternateScreen)?;
        terminal.show_cursor()?;

        self.link.shutdown().await;
        res
    }

    async fn event_loop<B: ratatui::backend::Backend>(
        &mut self,
        terminal: &mut Terminal<B>,
    ) -> anyhow::Result<()> {
        loop {
            // Input (non-blocking)
            while event::poll(Duration::from_millis(0))? {
                if let Event::Key(k) = event::read()? {
                    self.handle_key(k).await;
                }
            }
            if self.should_quit {
                break;
            }

            // Drain whatever the connection produced since the last frame
            while let Ok(env) = self.rx.try_recv() {
                self.dispatch(env).await;
            }

            terminal.draw(|f| self.draw(f))?;

            if let Ok(Some(env)) = timeout(FRAME, self.rx.recv()).await {
                self.dispatch(env).await;
            }
        }
        Ok(())
    }

    async fn handle_key(&mut self, k: KeyEvent) {
        if k.kind != KeyEventKind::Press {
            return;
        }
        match k.code {
            KeyCode::Char('q') | KeyCode::Char('Q') | KeyCode::Esc => self.should_quit = true,
            KeyCode::Char(c @ '1'..='9') => {
                self.dash.toggle_device(c as u32 - '1' as u32);
            }
            KeyCode::Tab => self.cycle_active_metric(),
            KeyCode::Char('+') => self.add_metric(),
            KeyCode::Char('-') => self.remove_active_metric(),
            KeyCode::Char('r') => self.dash.reset(),
            KeyCode::Char('s') => {
                let cmds = if self.dash.is_running() {
                    self.dash.stop()
                } else {
                    self.dash.start()
                };
                self.apply(cmds).await;
            }
            KeyCode::Char('e') => {
                self.endpoints.cycle();
                match self.endpoints.resolve() {
                    Ok(url) => {
                        info!(endpoint = %url, "switching endpoint");
                        let cmds = self.dash.set_endpoint(url);
                        self.apply(cmds).await;
                    }
                    Err(e) => warn!("{e}"),
                }
            }
            _ => {}
        }
    }

    fn cycle_active_metric(&mut self) {
        let sel = self.dash.selection();
        let metrics = sel.metrics();
        let Some(active) = sel.active_metric() else {
            return;
        };
        if let Some(pos) = metrics.iter().position(|&m| m == active) {
            let next = metrics[(pos + 1) % metrics.len()];
            self.dash.set_active_metric(next);
        }
    }

    // Append the next catalog metric that isn't selected yet and focus it
    fn add_metric(&mut self) {
        let current = self.dash.selection().metrics().to_vec();
        let Some(next) = MetricKey::ALL.into_iter().find(|m| !current.contains(m)) else {
            return;
        };
        self.dash
            .set_metrics(current.into_iter().chain(std::iter::once(next)));
        self.dash.set_active_metric(next);
    }

    fn remove_active_metric(&mut self) {
        let sel = self.dash.selection();
        let Some(active) = sel.active_metric() else {
            return;
        };
        let rest: Vec<MetricKey> = sel.metrics().iter().copied().filter(|&m| m != active).collect();
        self.dash.set_metrics(rest);
    }

    pub fn draw(&mut self, f: &mut ratatui::Frame<'_>) {
        let area = f.area();
        let rows = Layout::default()
            .direction(Direction::Vertical)
            .constraints([
                Constraint::Length(1), // header
                Constraint::Min(8),    // devices + chart
                Constraint::Length(1), // key help
            ])
            .split(area);

        draw_header(f, rows[0], &self.dash);

        let body = Layout::default()
            .direction(Direction::Horizontal)
            .constraints([Constraint::Percentage(40), Constraint::Percentage(60)])
            .split(rows[1]);
        draw_devices(f, body[0], &self.dash);
        draw_chart(f, body[1], &self.dash);

        draw_footer(f, rows[2]);
    }
}

/// Without a terminal: log one line per accepted snapshot until Ctrl-C.
pub async fn run_headless(tuning: &Tuning, endpoints: EndpointConfig) -> anyhow::Result<()> {
    let mut app = App::new(tuning, endpoints);
    let cmds = app.dash.start();
    app.apply(cmds).await;

    let mut seen = app.dash.counters().accepted;
    loop {
        tokio::select! {
            env = app.rx.recv() => {
                let Some(env) = env else { break };
                app.dispatch(env).await;
            }
            _ = tokio::signal::ctrl_c() => break,
        }
        let accepted = app.dash.counters().accepted;
        if accepted != seen {
            seen = accepted;
            if let Some(s) = app.dash.latest() {
                let summary: Vec<String> = s
                    .gpus
                    .iter()
                    .map(|g| {
                        format!(
                            "gpu{}={}",
                            g.gpu_index,
                            g.gpu_util.map_or("N/A".into(), |u| format!("{u:.0}%"))
                        )
                    })
                    .collect();
                info!(timestamp = s.timestamp, "{}", summary.join(" "));
            }
        }
    }
    let cmds = app.dash.stop();
    app.apply(cmds).await;
    app.link.shutdown().await;
    Ok(())
}
