//! Types that mirror the agent's JSON schema.
//!
//! Every numeric field is an `Option<f64>`: `None` is the "unknown" value and
//! is what a missing field, `null`, or a non-numeric string such as `"N/A"`
//! decodes to. Fields are never dropped from the struct, only marked unknown.

use serde::{Deserialize, Deserializer};

/// Decode any JSON value into a number, mapping everything non-numeric to unknown.
fn lenient_f64<'de, D>(d: D) -> Result<Option<f64>, D::Error>
where
    D: Deserializer<'de>,
{
    let v = serde_json::Value::deserialize(d)?;
    Ok(v.as_f64().filter(|x| x.is_finite()))
}

fn lenient_string<'de, D>(d: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(match serde_json::Value::deserialize(d)? {
        serde_json::Value::String(s) => Some(s),
        serde_json::Value::Number(n) => Some(n.to_string()),
        _ => None,
    })
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct Memory {
    // MB
    #[serde(default, deserialize_with = "lenient_f64")]
    pub used: Option<f64>,
    #[serde(default, deserialize_with = "lenient_f64")]
    pub total: Option<f64>,
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct Clocks {
    // MHz
    #[serde(default, deserialize_with = "lenient_f64")]
    pub graphics: Option<f64>,
    #[serde(default, deserialize_with = "lenient_f64")]
    pub memory: Option<f64>,
}

/// Link throughput in KB/s.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct Pcie {
    #[serde(default, deserialize_with = "lenient_f64")]
    pub rx: Option<f64>,
    #[serde(default, deserialize_with = "lenient_f64")]
    pub tx: Option<f64>,
}

/// One device's metrics at one server-reported time.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct DeviceSample {
    pub gpu_index: u32,
    #[serde(default)]
    pub name: String,
    #[serde(default, deserialize_with = "lenient_f64")]
    pub gpu_util: Option<f64>,
    #[serde(default, deserialize_with = "lenient_f64")]
    pub mem_util: Option<f64>,
    #[serde(default)]
    pub memory: Memory,
    #[serde(default, deserialize_with = "lenient_f64")]
    pub temperature: Option<f64>,
    #[serde(default, deserialize_with = "lenient_f64")]
    pub fan_speed: Option<f64>,
    #[serde(default, deserialize_with = "lenient_f64")]
    pub power: Option<f64>,
    #[serde(default, deserialize_with = "lenient_string")]
    pub performance_state: Option<String>,
    #[serde(default)]
    pub clocks: Clocks,
    #[serde(default)]
    pub pcie: Pcie,
    #[serde(default, deserialize_with = "lenient_f64")]
    pub ecc_errors: Option<f64>,
}

/// A decoded push message: server time in seconds plus one sample per reporting device.
#[derive(Debug, Clone, PartialEq)]
pub struct Snapshot {
    pub timestamp: f64,
    pub gpus: Vec<DeviceSample>,
}

impl Snapshot {
    pub fn device(&self, index: u32) -> Option<&DeviceSample> {
        self.gpus.iter().find(|g| g.gpu_index == index)
    }
}

/// A sample as kept in history, tagged with the snapshot time it arrived with.
#[derive(Debug, Clone, PartialEq)]
pub struct HistoryEntry {
    pub timestamp: f64,
    pub sample: DeviceSample,
}
