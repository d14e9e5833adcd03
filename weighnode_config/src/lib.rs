#![cfg_attr(all(not(debug_assertions), not(test)), deny(warnings))]
#![cfg_attr(
    all(not(debug_assertions), not(test)),
    deny(clippy::all, clippy::pedantic, clippy::nursery)
)]
#![allow(clippy::module_name_repetitions, clippy::missing_errors_doc)]
//! Config schema for the weigh node.
//!
//! - `Config` and sub-structs are deserialized from TOML and validated.
//! - Every section is optional; omitted keys fall back to the reference
//!   constants the firmware shipped with.
use serde::Deserialize;

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct Pins {
    /// HX711 data out (BCM numbering)
    pub hx711_dt: u8,
    /// HX711 clock in (BCM numbering)
    pub hx711_sck: u8,
}

impl Default for Pins {
    fn default() -> Self {
        Self {
            hx711_dt: 5,
            hx711_sck: 6,
        }
    }
}

/// Channel/gain for the conversion following each read.
#[derive(Debug, Deserialize, Clone, Copy, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum GainSel {
    #[default]
    A128,
    B32,
    A64,
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct SensorCfg {
    pub gain: GainSel,
    /// Max time to wait for HX711 data-ready (DT low); expiry yields raw 0
    pub ready_timeout_ms: u64,
    /// Power-up stabilisation delay before the boot tare
    pub settle_ms: u64,
}

impl Default for SensorCfg {
    fn default() -> Self {
        Self {
            gain: GainSel::A128,
            ready_timeout_ms: 200,
            settle_ms: 500,
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct CalibrationCfg {
    /// Counts per gram. 0 makes every weight read as 0.0.
    pub scale: f32,
    pub tare_samples: u32,
    pub tare_interval_ms: u64,
}

impl Default for CalibrationCfg {
    fn default() -> Self {
        Self {
            scale: 11110.0,
            tare_samples: 20,
            tare_interval_ms: 10,
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct FilterCfg {
    /// Moving-average window in samples. Also accepts alias "ma_window".
    #[serde(alias = "ma_window")]
    pub window: usize,
}

impl Default for FilterCfg {
    fn default() -> Self {
        Self { window: 10 }
    }
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct StabilityCfg {
    /// Hysteresis band in grams for both entry and exit
    pub delta_g: f32,
    /// Consecutive quiet cycles required to declare stability
    pub run_length: u32,
}

impl Default for StabilityCfg {
    fn default() -> Self {
        Self {
            delta_g: 10.0,
            run_length: 3,
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct LiquidCfg {
    pub container_baseline_g: f32,
    pub increment_g: f32,
}

impl Default for LiquidCfg {
    fn default() -> Self {
        Self {
            container_baseline_g: 10.0,
            increment_g: 10.0,
        }
    }
}

#[derive(Debug, Deserialize, Clone, Copy, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum TxPolicySel {
    /// Transmit when the weight moved by at least `tx_threshold_g`
    #[default]
    Delta,
    /// Transmit on stability enter/exit events
    Event,
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct RadioCfg {
    /// Leading id byte shared by every node on the channel
    pub channel_id: u8,
    pub frequency_hz: u32,
    pub tx_threshold_g: f32,
    pub rx_timeout_ms: u64,
    pub max_payload: usize,
    pub policy: TxPolicySel,
    pub tx_power_dbm: i8,
    pub spreading_factor: u8,
    pub bandwidth_khz: u32,
    pub coding_rate: u8,
    pub preamble_len: u16,
    pub tx_timeout_ms: u64,
}

impl Default for RadioCfg {
    fn default() -> Self {
        Self {
            channel_id: 0x01,
            frequency_hz: 868_000_000,
            tx_threshold_g: 5.0,
            rx_timeout_ms: 3000,
            max_payload: 64,
            policy: TxPolicySel::Delta,
            tx_power_dbm: 14,
            spreading_factor: 7,
            bandwidth_khz: 125,
            coding_rate: 1,
            preamble_len: 8,
            tx_timeout_ms: 3000,
        }
    }
}

#[derive(Debug, Deserialize, Clone, Copy, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum RunMode {
    /// Event lines on stdout
    #[default]
    Serial,
    /// Radio link state machine
    Radio,
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct RunnerCfg {
    pub mode: RunMode,
    /// Main loop period
    pub cycle_ms: u64,
    /// Shortened wait after a saturated (rail) sample
    pub saturation_backoff_ms: u64,
}

impl Default for RunnerCfg {
    fn default() -> Self {
        Self {
            mode: RunMode::Serial,
            cycle_ms: 100,
            saturation_backoff_ms: 50,
        }
    }
}

#[derive(Debug, Deserialize, Default, Clone)]
#[serde(default)]
pub struct Logging {
    pub file: Option<String>,  // path to .log (JSON lines)
    pub level: Option<String>, // "info","debug"
    /// Log rotation policy: "never" | "daily" | "hourly" (default: never)
    pub rotation: Option<String>,
}

#[derive(Debug, Deserialize, Default, Clone)]
#[serde(default)]
pub struct Config {
    pub pins: Pins,
    pub sensor: SensorCfg,
    pub calibration: CalibrationCfg,
    pub filter: FilterCfg,
    pub stability: StabilityCfg,
    pub liquid: LiquidCfg,
    pub radio: RadioCfg,
    pub runner: RunnerCfg,
    pub logging: Logging,
}

pub fn load_toml(s: &str) -> Result<Config, toml::de::Error> {
    toml::from_str::<Config>(s)
}

fn ensure_threshold(name: &str, v: f32) -> eyre::Result<()> {
    if !v.is_finite() {
        eyre::bail!("{name} must be finite");
    }
    if v < 0.0 {
        eyre::bail!("{name} must be >= 0");
    }
    Ok(())
}

impl Config {
    pub fn validate(&self) -> eyre::Result<()> {
        // Sensor
        if self.sensor.ready_timeout_ms == 0 {
            eyre::bail!("sensor.ready_timeout_ms must be >= 1");
        }
        if self.sensor.settle_ms > 60 * 1000 {
            eyre::bail!("sensor.settle_ms is unreasonably large (>60s)");
        }

        // Calibration
        if !self.calibration.scale.is_finite() {
            eyre::bail!("calibration.scale must be finite");
        }
        if self.calibration.tare_samples == 0 {
            eyre::bail!("calibration.tare_samples must be >= 1");
        }

        // Filter
        if self.filter.window == 0 {
            eyre::bail!("filter.window must be >= 1");
        }

        // Stability
        ensure_threshold("stability.delta_g", self.stability.delta_g)?;
        if self.stability.run_length == 0 {
            eyre::bail!("stability.run_length must be >= 1");
        }

        // Liquid
        ensure_threshold("liquid.container_baseline_g", self.liquid.container_baseline_g)?;
        ensure_threshold("liquid.increment_g", self.liquid.increment_g)?;

        // Radio
        ensure_threshold("radio.tx_threshold_g", self.radio.tx_threshold_g)?;
        if self.radio.rx_timeout_ms == 0 {
            eyre::bail!("radio.rx_timeout_ms must be >= 1");
        }
        if self.radio.tx_timeout_ms == 0 {
            eyre::bail!("radio.tx_timeout_ms must be >= 1");
        }
        if !(2..=255).contains(&self.radio.max_payload) {
            eyre::bail!("radio.max_payload must be in [2, 255]");
        }
        if !(6..=12).contains(&self.radio.spreading_factor) {
            eyre::bail!("radio.spreading_factor must be in [6, 12]");
        }
        if !(1..=4).contains(&self.radio.coding_rate) {
            eyre::bail!("radio.coding_rate must be in [1, 4]");
        }

        // Runner
        if self.runner.cycle_ms == 0 {
            eyre::bail!("runner.cycle_ms must be >= 1");
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_document_yields_reference_constants() {
        let cfg = load_toml("").unwrap();
        assert_eq!(cfg.filter.window, 10);
        assert_eq!(cfg.stability.run_length, 3);
        assert!((cfg.calibration.scale - 11110.0).abs() < f32::EPSILON);
        assert_eq!(cfg.calibration.tare_samples, 20);
        assert_eq!(cfg.radio.max_payload, 64);
        assert_eq!(cfg.runner.mode, RunMode::Serial);
        cfg.validate().unwrap();
    }

    #[test]
    fn unknown_enum_values_fail_to_parse() {
        assert!(load_toml("[runner]\nmode = \"bluetooth\"\n").is_err());
        assert!(load_toml("[sensor]\ngain = \"a256\"\n").is_err());
    }
}
