//! gpuwatch: streaming GPU telemetry buffer and chart-alignment engine.
//!
//! Data path: `ws::Link` -> `conn::ConnectionManager` -> `parse` ->
//! `history::HistoryStore` -> `align::ChartStore`, all owned by a
//! `dashboard::Dashboard` and driven one event at a time.

pub mod align;
pub mod config;
pub mod conn;
pub mod dashboard;
pub mod history;
pub mod metrics;
pub mod parse;
pub mod selection;
pub mod types;
pub mod ws;

pub use dashboard::Dashboard;
