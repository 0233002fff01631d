//! UI module root: exposes drawing functions for individual panels.

pub mod chart;
pub mod devices;
pub mod header;
pub mod theme;
pub mod util;
