//! Top header with connection status and snapshot time, plus the key help footer.

use chrono::{DateTime, Local};
use ratatui::{
    layout::Rect,
    style::{Color, Style},
    text::{Line, Span},
    widgets::{Block, Borders, Paragraph},
};

use crate::ui::theme::MUTED;
use gpuwatch::conn::ConnStatus;
use gpuwatch::Dashboard;

fn status_color(s: ConnStatus) -> Color {
    match s {
        ConnStatus::Open => Color::Green,
        ConnStatus::Connecting => Color::Yellow,
        ConnStatus::Error => Color::Red,
        ConnStatus::Closed | ConnStatus::Idle => MUTED,
    }
}

pub fn snapshot_time(ts: f64) -> String {
    let secs = ts.floor();
    let nanos = ((ts - secs) * 1e9) as u32;
    DateTime::from_timestamp(secs as i64, nanos)
        .map(|t| t.with_timezone(&Local).format("%H:%M:%S").to_string())
        .unwrap_or_else(|| format!("{ts:.1}"))
}

pub fn draw_header(f: &mut ratatui::Frame<'_>, area: Rect, d: &Dashboard) {
    let status = d.status();
    let mut spans = vec![
        Span::raw("gpuwatch | "),
        Span::raw(d.endpoint().unwrap_or("<no endpoint>").to_string()),
        Span::raw(" | "),
        Span::styled(status.as_str(), Style::default().fg(status_color(status))),
    ];
    if !d.is_running() {
        spans.push(Span::styled(" (stopped)", Style::default().fg(MUTED)));
    }
    match d.latest() {
        Some(s) => spans.push(Span::raw(format!(
            " | snapshot {} | {} GPUs",
            snapshot_time(s.timestamp),
            s.gpus.len()
        ))),
        None if status == ConnStatus::Open => spans.push(Span::raw(" | no data yet")),
        None => spans.push(Span::raw(" | connecting...")),
    }
    if let Some(err) = d.last_error() {
        spans.push(Span::styled(
            format!(" | {err}"),
            Style::default().fg(Color::Red),
        ));
    }
    f.render_widget(
        Block::default()
            .title(Line::from(spans))
            .borders(Borders::BOTTOM),
        area,
    );
}

pub fn draw_footer(f: &mut ratatui::Frame<'_>, area: Rect) {
    let help = "1-9 toggle GPU | Tab next metric | +/- add/remove metric | s start/stop | r reset | e next endpoint | q quit";
    f.render_widget(
        Paragraph::new(help).style(Style::default().fg(MUTED)),
        area,
    );
}
