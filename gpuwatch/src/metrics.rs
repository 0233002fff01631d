//! Static metric catalog: what can be charted and how to read it off a sample.

use std::fmt;
use std::str::FromStr;

use crate::types::DeviceSample;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum MetricKey {
    GpuUtil,
    MemUtil,
    MemUsed,
    Temperature,
    FanSpeed,
    Power,
    ClockGraphics,
    ClockMemory,
    PcieRx,
    PcieTx,
    EccErrors,
}

pub struct MetricDefinition {
    pub key: MetricKey,
    pub label: &'static str,
    pub unit: &'static str,
    pub read: fn(&DeviceSample) -> Option<f64>,
}

impl MetricDefinition {
    pub fn value(&self, s: &DeviceSample) -> Option<f64> {
        (self.read)(s)
    }
}

impl fmt::Debug for MetricDefinition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MetricDefinition")
            .field("key", &self.key)
            .field("label", &self.label)
            .field("unit", &self.unit)
            .finish()
    }
}

pub static CATALOG: &[MetricDefinition] = &[
    MetricDefinition { key: MetricKey::GpuUtil, label: "GPU Util", unit: "%", read: |s| s.gpu_util },
    MetricDefinition { key: MetricKey::MemUtil, label: "Mem Util", unit: "%", read: |s| s.mem_util },
    MetricDefinition { key: MetricKey::MemUsed, label: "Mem Used", unit: "MB", read: |s| s.memory.used },
    MetricDefinition { key: MetricKey::Temperature, label: "Temperature", unit: "°C", read: |s| s.temperature },
    MetricDefinition { key: MetricKey::FanSpeed, label: "Fan", unit: "%", read: |s| s.fan_speed },
    MetricDefinition { key: MetricKey::Power, label: "Power", unit: "W", read: |s| s.power },
    MetricDefinition { key: MetricKey::ClockGraphics, label: "Core Clock", unit: "MHz", read: |s| s.clocks.graphics },
    MetricDefinition { key: MetricKey::ClockMemory, label: "Mem Clock", unit: "MHz", read: |s| s.clocks.memory },
    MetricDefinition { key: MetricKey::PcieRx, label: "PCIe RX", unit: "KB/s", read: |s| s.pcie.rx },
    MetricDefinition { key: MetricKey::PcieTx, label: "PCIe TX", unit: "KB/s", read: |s| s.pcie.tx },
    MetricDefinition { key: MetricKey::EccErrors, label: "ECC Errors", unit: "", read: |s| s.ecc_errors },
];

impl MetricKey {
    pub const ALL: [MetricKey; 11] = [
        MetricKey::GpuUtil,
        MetricKey::MemUtil,
        MetricKey::MemUsed,
        MetricKey::Temperature,
        MetricKey::FanSpeed,
        MetricKey::Power,
        MetricKey::ClockGraphics,
        MetricKey::ClockMemory,
        MetricKey::PcieRx,
        MetricKey::PcieTx,
        MetricKey::EccErrors,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            MetricKey::GpuUtil => "gpu_util",
            MetricKey::MemUtil => "mem_util",
            MetricKey::MemUsed => "mem_used",
            MetricKey::Temperature => "temperature",
            MetricKey::FanSpeed => "fan_speed",
            MetricKey::Power => "power",
            MetricKey::ClockGraphics => "clock_graphics",
            MetricKey::ClockMemory => "clock_memory",
            MetricKey::PcieRx => "pcie_rx",
            MetricKey::PcieTx => "pcie_tx",
            MetricKey::EccErrors => "ecc_errors",
        }
    }

    pub fn definition(self) -> &'static MetricDefinition {
        // CATALOG lists every key in declaration order
        &CATALOG[self as usize]
    }

    pub fn value(self, s: &DeviceSample) -> Option<f64> {
        self.definition().value(s)
    }
}

impl fmt::Display for MetricKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for MetricKey {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        MetricKey::ALL
            .into_iter()
            .find(|k| k.as_str() == s)
            .ok_or_else(|| format!("unknown metric '{s}'"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn catalog_matches_key_order() {
        assert_eq!(CATALOG.len(), MetricKey::ALL.len());
        for k in MetricKey::ALL {
            assert_eq!(k.definition().key, k);
        }
    }

    #[test]
    fn keys_round_trip_through_strings() {
        for k in MetricKey::ALL {
            assert_eq!(k.as_str().parse::<MetricKey>(), Ok(k));
        }
        assert!("bogus".parse::<MetricKey>().is_err());
    }

    #[test]
    fn accessor_passes_unknown_through() {
        let s = DeviceSample {
            gpu_index: 0,
            gpu_util: Some(0.0),
            ..Default::default()
        };
        assert_eq!(MetricKey::GpuUtil.value(&s), Some(0.0));
        assert_eq!(MetricKey::Power.value(&s), None);
    }
}
