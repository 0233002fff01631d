//! Device panel: one name line and util/VRAM gauges per GPU in the freshest snapshot.

use ratatui::{
    layout::{Constraint, Direction, Layout, Rect},
    style::{Color, Modifier, Style},
    text::{Line, Span},
    widgets::{Block, Borders, Gauge, Paragraph},
};

use crate::ui::theme::{series_color, MUTED};
use crate::ui::util::{fmt_opt, human_mb, truncate_middle};
use gpuwatch::Dashboard;

pub fn draw_devices(f: &mut ratatui::Frame<'_>, area: Rect, d: &Dashboard) {
    let mut area = area;
    let block = Block::default().borders(Borders::ALL).title("GPUs");
    f.render_widget(block, area);

    // Guard: need some space inside the block
    if area.height <= 2 || area.width <= 2 {
        return;
    }
    area.y += 1;
    area.height = area.height.saturating_sub(2);
    area.x += 1;
    area.width = area.width.saturating_sub(2);

    let Some(snap) = d.latest() else {
        f.render_widget(Paragraph::new("no data"), area);
        return;
    };
    if snap.gpus.is_empty() {
        f.render_widget(Paragraph::new("No GPUs"), area);
        return;
    }

    // 3 rows per GPU: name, util bar, vram bar
    if area.height < 3 {
        return;
    }
    let per_gpu_rows: u16 = 3;
    let count = snap.gpus.len().min((area.height / per_gpu_rows) as usize);
    let rows = Layout::default()
        .direction(Direction::Vertical)
        .constraints(vec![Constraint::Length(1); count * per_gpu_rows as usize])
        .split(area);

    let split_bar = |r: Rect| {
        Layout::default()
            .direction(Direction::Horizontal)
            .constraints([Constraint::Min(8), Constraint::Length(22)])
            .split(r)
    };

    let selected: Vec<u32> = d.selection().devices().iter().copied().collect();

    for (i, g) in snap.gpus.iter().take(count).enumerate() {
        let pos = selected.iter().position(|&s| s == g.gpu_index);
        let (marker, name_style) = match pos {
            Some(p) => (
                "●",
                Style::default()
                    .fg(series_color(p))
                    .add_modifier(Modifier::BOLD),
            ),
            None => ("○", Style::default().fg(MUTED)),
        };
        let name = truncate_middle(&g.name, area.width.saturating_sub(40) as usize);
        let line = Line::from(vec![
            Span::styled(format!("{marker} {} {name}", g.gpu_index), name_style),
            Span::styled(
                format!(
                    "  {}  {}  fan {}  {}",
                    fmt_opt(g.temperature, "°C"),
                    fmt_opt(g.power, "W"),
                    fmt_opt(g.fan_speed, "%"),
                    g.performance_state.as_deref().unwrap_or("")
                ),
                Style::default().fg(Color::Gray),
            ),
        ]);
        f.render_widget(Paragraph::new(line), rows[i * 3]);

        let util_cols = split_bar(rows[i * 3 + 1]);
        let util = g.gpu_util.unwrap_or(0.0).clamp(0.0, 100.0);
        f.render_widget(
            Gauge::default()
                .gauge_style(Style::default().fg(Color::Green))
                .label(Span::raw(""))
                .ratio(util / 100.0),
            util_cols[0],
        );
        f.render_widget(
            Paragraph::new(format!("util: {}", fmt_opt(g.gpu_util, "%")))
                .style(Style::default().fg(Color::Gray)),
            util_cols[1],
        );

        let mem_cols = split_bar(rows[i * 3 + 2]);
        let (used, total) = (g.memory.used, g.memory.total);
        let mem_ratio = match (used, total) {
            (Some(u), Some(t)) if t > 0.0 => (u / t).clamp(0.0, 1.0),
            _ => g.mem_util.unwrap_or(0.0).clamp(0.0, 100.0) / 100.0,
        };
        f.render_widget(
            Gauge::default()
                .gauge_style(Style::default().fg(Color::LightMagenta))
                .label(Span::raw(""))
                .ratio(mem_ratio),
            mem_cols[0],
        );
        let mem_label = match (used, total) {
            (Some(u), Some(t)) => format!("vram: {}/{}", human_mb(u), human_mb(t)),
            _ => format!("vram: {}", fmt_opt(g.mem_util, "%")),
        };
        f.render_widget(
            Paragraph::new(mem_label).style(Style::default().fg(Color::Gray)),
            mem_cols[1],
        );
    }
}
