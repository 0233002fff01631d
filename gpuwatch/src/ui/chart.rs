//! Time-series chart of the active metric, one line per selected GPU.

use ratatui::{
    layout::Rect,
    style::Style,
    symbols,
    text::Span,
    widgets::{Axis, Block, Borders, Chart, Dataset, GraphType, Paragraph},
};

use crate::ui::theme::{series_color, MUTED};
use gpuwatch::align::ChartRow;
use gpuwatch::Dashboard;

/// Points per device, x relative to the first tick; unknown values are left out.
pub fn series_points<'a>(
    rows: impl Iterator<Item = &'a ChartRow> + Clone,
    devices: &[u32],
) -> Vec<Vec<(f64, f64)>> {
    let t0 = rows.clone().next().map(|r| r.tick).unwrap_or(0.0);
    devices
        .iter()
        .map(|dev| {
            rows.clone()
                .filter_map(|r| r.values.get(dev).copied().flatten().map(|v| (r.tick - t0, v)))
                .collect()
        })
        .collect()
}

pub fn draw_chart(f: &mut ratatui::Frame<'_>, area: Rect, d: &Dashboard) {
    let sel = d.selection();
    let Some(metric) = sel.active_metric() else {
        f.render_widget(
            Paragraph::new("no metrics selected (press +)")
                .block(Block::default().borders(Borders::ALL).title("Chart")),
            area,
        );
        return;
    };
    let def = metric.definition();
    let title = format!(
        "{} ({}) | {}",
        def.label,
        if def.unit.is_empty() { "count" } else { def.unit },
        sel.metrics()
            .iter()
            .map(|m| if *m == metric { format!("[{m}]") } else { m.to_string() })
            .collect::<Vec<_>>()
            .join(" ")
    );
    let block = Block::default().borders(Borders::ALL).title(title);

    let devices: Vec<u32> = sel.devices().iter().copied().collect();
    let rows = match d.active_chart() {
        Some((_, rows)) if !rows.is_empty() && !devices.is_empty() => rows,
        _ => {
            let hint = if devices.is_empty() {
                "select GPUs with 1-9"
            } else {
                "no data"
            };
            f.render_widget(
                Paragraph::new(hint).style(Style::default().fg(MUTED)).block(block),
                area,
            );
            return;
        }
    };

    let points = series_points(rows.iter(), &devices);
    let span = rows
        .back()
        .zip(rows.front())
        .map(|(b, a)| b.tick - a.tick)
        .unwrap_or(0.0)
        .max(1.0);
    let y_max = points
        .iter()
        .flatten()
        .map(|&(_, v)| v)
        .fold(0.0_f64, f64::max);
    let y_max = if def.unit == "%" { 100.0 } else { (y_max * 1.1).max(1.0) };

    let datasets: Vec<Dataset> = devices
        .iter()
        .zip(points.iter())
        .enumerate()
        .map(|(i, (dev, pts))| {
            Dataset::default()
                .name(format!("gpu{dev}"))
                .marker(symbols::Marker::Braille)
                .graph_type(GraphType::Line)
                .style(Style::default().fg(series_color(i)))
                .data(pts)
        })
        .collect();

    let chart = Chart::new(datasets)
        .block(block)
        .x_axis(
            Axis::default()
                .style(Style::default().fg(MUTED))
                .bounds([0.0, span])
                .labels(vec![Span::raw(format!("-{span:.0}s")), Span::raw("now")]),
        )
        .y_axis(
            Axis::default()
                .style(Style::default().fg(MUTED))
                .bounds([0.0, y_max])
                .labels(vec![Span::raw("0"), Span::raw(format!("{y_max:.0}"))]),
        );
    f.render_widget(chart, area);
}
