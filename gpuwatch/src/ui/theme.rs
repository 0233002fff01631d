//! Shared UI theme constants.

use ratatui::style::Color;

// One color per chart series, cycled by position in the device selection
pub const SERIES: [Color; 8] = [
    Color::Cyan,
    Color::LightMagenta,
    Color::Yellow,
    Color::LightGreen,
    Color::LightBlue,
    Color::LightRed,
    Color::White,
    Color::Rgb(255, 165, 0),
];

pub fn series_color(i: usize) -> Color {
    SERIES[i % SERIES.len()]
}

pub const MUTED: Color = Color::Rgb(170, 170, 180);
