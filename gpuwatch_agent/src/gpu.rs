//! GPU sources: NVML when available and enabled, otherwise a random-walk mock fleet.

use nvml_wrapper::enum_wrappers::device::{
    Clock, EccCounter, MemoryError, PcieUtilCounter, PerformanceState, TemperatureSensor,
};
use nvml_wrapper::error::NvmlError;
use nvml_wrapper::Nvml;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use tracing::{info, warn};

use crate::types::{Clocks, GpuSample, Memory, Pcie};

const MB: u64 = 1024 * 1024;

// Read once at startup; NVML is opt-in so machines without a driver start quietly
fn nvml_enabled() -> bool {
    std::env::var("GPUWATCH_AGENT_NVML")
        .map(|v| v != "0")
        .unwrap_or(false)
}

pub enum GpuSource {
    Nvml(Nvml),
    Mock(MockFleet),
}

impl GpuSource {
    pub fn detect(mock_gpus: usize) -> Self {
        if nvml_enabled() {
            match Nvml::init() {
                Ok(nvml) => {
                    info!("using NVML");
                    return GpuSource::Nvml(nvml);
                }
                Err(e) => warn!("NVML init failed, falling back to mock GPUs: {e}"),
            }
        }
        info!(gpus = mock_gpus, "using mock GPUs");
        GpuSource::Mock(MockFleet::new(mock_gpus, StdRng::from_os_rng()))
    }

    pub fn sample(&mut self) -> Vec<GpuSample> {
        match self {
            GpuSource::Nvml(nvml) => collect_nvml(nvml).unwrap_or_else(|e| {
                warn!("gpu collection failed: {e}");
                Vec::new()
            }),
            GpuSource::Mock(fleet) => fleet.step(),
        }
    }
}

fn pstate_label(p: PerformanceState) -> String {
    const NAMES: [&str; 16] = [
        "Zero", "One", "Two", "Three", "Four", "Five", "Six", "Seven", "Eight", "Nine", "Ten",
        "Eleven", "Twelve", "Thirteen", "Fourteen", "Fifteen",
    ];
    let dbg = format!("{p:?}");
    NAMES
        .iter()
        .position(|n| *n == dbg)
        .map(|i| format!("P{i}"))
        .unwrap_or(dbg)
}

fn collect_nvml(nvml: &Nvml) -> Result<Vec<GpuSample>, NvmlError> {
    let count = nvml.device_count()?;
    let mut out = Vec::with_capacity(count as usize);
    for i in 0..count {
        let dev = nvml.device_by_index(i)?;
        let util = dev.utilization_rates().ok();
        let mem = dev.memory_info().ok();
        out.push(GpuSample {
            gpu_index: i,
            name: dev.name().unwrap_or_else(|_| format!("GPU {i}")),
            gpu_util: util.as_ref().map(|u| f64::from(u.gpu)),
            mem_util: mem
                .as_ref()
                .map(|m| m.used as f64 / m.total.max(1) as f64 * 100.0),
            memory: Memory {
                used: mem.as_ref().map(|m| (m.used / MB) as f64),
                total: mem.as_ref().map(|m| (m.total / MB) as f64),
            },
            temperature: dev.temperature(TemperatureSensor::Gpu).ok().map(f64::from),
            fan_speed: dev.fan_speed(0).ok().map(f64::from),
            power: dev.power_usage().ok().map(|mw| f64::from(mw) / 1000.0),
            performance_state: dev.performance_state().ok().map(pstate_label),
            clocks: Clocks {
                graphics: dev.clock_info(Clock::Graphics).ok().map(f64::from),
                memory: dev.clock_info(Clock::Memory).ok().map(f64::from),
            },
            pcie: Pcie {
                rx: dev.pcie_throughput(PcieUtilCounter::Receive).ok().map(f64::from),
                tx: dev.pcie_throughput(PcieUtilCounter::Send).ok().map(f64::from),
            },
            ecc_errors: dev
                .total_ecc_errors(MemoryError::Uncorrected, EccCounter::Volatile)
                .ok()
                .map(|v| v as f64),
        });
    }
    Ok(out)
}

struct MockGpu {
    util: f64,
    mem_used: f64,
    mem_total: f64,
    ecc: u64,
}

/// Each device does a bounded random walk; the derived fields track utilization.
pub struct MockFleet {
    gpus: Vec<MockGpu>,
    rng: StdRng,
}

impl MockFleet {
    pub fn new(count: usize, mut rng: StdRng) -> Self {
        let gpus = (0..count)
            .map(|_| MockGpu {
                util: rng.random_range(0.0..100.0),
                mem_used: rng.random_range(1024.0..20480.0),
                mem_total: 24576.0,
                ecc: 0,
            })
            .collect();
        Self { gpus, rng }
    }

    pub fn step(&mut self) -> Vec<GpuSample> {
        let rng = &mut self.rng;
        self.gpus
            .iter_mut()
            .enumerate()
            .map(|(i, g)| {
                g.util = (g.util + rng.random_range(-8.0..8.0)).clamp(0.0, 100.0);
                g.mem_used = (g.mem_used + rng.random_range(-256.0..256.0)).clamp(512.0, g.mem_total);
                if rng.random_bool(0.002) {
                    g.ecc += 1;
                }
                let temp = 32.0 + g.util * 0.5 + rng.random_range(-1.5..1.5);
                let pstate = match g.util {
                    u if u > 50.0 => "P0",
                    u if u > 5.0 => "P2",
                    _ => "P8",
                };
                GpuSample {
                    gpu_index: i as u32,
                    name: "Mock GPU 24GB".into(),
                    gpu_util: Some(round1(g.util)),
                    mem_util: Some(round1(g.mem_used / g.mem_total * 100.0)),
                    memory: Memory {
                        used: Some(g.mem_used.round()),
                        total: Some(g.mem_total),
                    },
                    temperature: Some(round1(temp)),
                    fan_speed: Some(round1(((temp - 30.0) * 1.6).clamp(0.0, 100.0))),
                    power: Some(round1(25.0 + g.util * 3.0)),
                    performance_state: Some(pstate.into()),
                    clocks: Clocks {
                        graphics: Some((300.0 + g.util * 15.0).round()),
                        memory: Some(if g.util > 5.0 { 9501.0 } else { 405.0 }),
                    },
                    pcie: Pcie {
                        rx: Some((g.util * rng.random_range(80.0..120.0)).round()),
                        tx: Some((g.util * rng.random_range(20.0..40.0)).round()),
                    },
                    ecc_errors: Some(g.ecc as f64),
                }
            })
            .collect()
    }
}

fn round1(v: f64) -> f64 {
    (v * 10.0).round() / 10.0
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn mock_fleet_stays_in_range() {
        let mut fleet = MockFleet::new(4, StdRng::seed_from_u64(7));
        for _ in 0..500 {
            let gpus = fleet.step();
            assert_eq!(gpus.len(), 4);
            for (i, g) in gpus.iter().enumerate() {
                assert_eq!(g.gpu_index, i as u32);
                let u = g.gpu_util.unwrap();
                assert!((0.0..=100.0).contains(&u));
                assert!((0.0..=100.0).contains(&g.mem_util.unwrap()));
                assert!(g.memory.used.unwrap() <= g.memory.total.unwrap());
                assert!((0.0..=100.0).contains(&g.fan_speed.unwrap()));
            }
        }
    }

    #[test]
    fn empty_fleet_reports_no_devices() {
        let mut fleet = MockFleet::new(0, StdRng::seed_from_u64(1));
        assert!(fleet.step().is_empty());
    }

    #[test]
    fn pstate_labels_are_short() {
        assert_eq!(pstate_label(PerformanceState::Zero), "P0");
        assert_eq!(pstate_label(PerformanceState::Eight), "P8");
    }
}
