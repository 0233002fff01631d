//! Data types sent to the client over WebSocket.
//! Keep this module minimal and stable; it defines the wire format.
//! Unknown values serialize as `null`; fields are never omitted.

use serde::Serialize;

#[derive(Debug, Serialize, Clone, Default, PartialEq)]
pub struct Memory {
    // MB
    pub used: Option<f64>,
    pub total: Option<f64>,
}

#[derive(Debug, Serialize, Clone, Default, PartialEq)]
pub struct Clocks {
    // MHz
    pub graphics: Option<f64>,
    pub memory: Option<f64>,
}

#[derive(Debug, Serialize, Clone, Default, PartialEq)]
pub struct Pcie {
    // KB/s
    pub rx: Option<f64>,
    pub tx: Option<f64>,
}

#[derive(Debug, Serialize, Clone, Default, PartialEq)]
pub struct GpuSample {
    pub gpu_index: u32,
    pub name: String,
    pub gpu_util: Option<f64>,
    pub mem_util: Option<f64>,
    pub memory: Memory,
    pub temperature: Option<f64>,
    pub fan_speed: Option<f64>,
    pub power: Option<f64>,
    pub performance_state: Option<String>,
    pub clocks: Clocks,
    pub pcie: Pcie,
    pub ecc_errors: Option<f64>,
}

#[derive(Debug, Serialize, Clone)]
pub struct Snapshot {
    // seconds since the epoch
    pub timestamp: f64,
    pub gpus: Vec<GpuSample>,
}
