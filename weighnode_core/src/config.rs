//! Runtime configuration types for the weigh node.
//!
//! These are the structs the pipeline and radio link consume. They are
//! separate from the TOML-deserialized config in `weighnode_config`; see
//! `conversions` for the bridge. Defaults are the reference constants.

use std::time::Duration;

use weighnode_traits::{RxConfig, TxConfig};

/// Sensor read policy.
#[derive(Debug, Clone)]
pub struct SensorCfg {
    /// Max wait for the ADC to signal ready (ms). Expiry yields raw 0.
    pub read_timeout_ms: u64,
    /// Power-up stabilisation delay before the boot tare (ms).
    pub settle_ms: u64,
}

impl Default for SensorCfg {
    fn default() -> Self {
        Self {
            read_timeout_ms: 200,
            settle_ms: 500,
        }
    }
}

/// Tare and scale parameters.
#[derive(Debug, Clone)]
pub struct CalibrationCfg {
    /// Counts per gram; 0 makes every weight read as 0.0.
    pub scale: f32,
    /// Raw reads averaged by the boot tare and by re-tare requests.
    pub tare_samples: u32,
    /// Pause between tare reads (ms).
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

#[derive(Debug, Clone)]
pub struct FilterCfg {
    /// Moving average window size (1 = pass-through).
    pub window: usize,
}

impl Default for FilterCfg {
    fn default() -> Self {
        Self { window: 10 }
    }
}

#[derive(Debug, Clone)]
pub struct StabilityCfg {
    /// Hysteresis band in grams.
    pub delta_g: f32,
    /// Consecutive quiet cycles before stability is declared.
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

/// Liquid presence rule: `weight - container_baseline_g > increment_g`.
#[derive(Debug, Clone)]
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

/// When the radio link decides to transmit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TxPolicy {
    /// Weight moved at least `tx_threshold_g` since the last transmission.
    #[default]
    Delta,
    /// A stability enter/exit event occurred.
    Event,
}

#[derive(Debug, Clone)]
pub struct RadioCfg {
    /// Leading byte of every frame on the shared channel.
    pub channel_id: u8,
    pub frequency_hz: u32,
    pub tx_threshold_g: f32,
    pub rx_timeout_ms: u64,
    /// Upper bound on a whole frame, id byte included.
    pub max_payload: usize,
    pub policy: TxPolicy,
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
            policy: TxPolicy::Delta,
            tx_power_dbm: 14,
            spreading_factor: 7,
            bandwidth_khz: 125,
            coding_rate: 1,
            preamble_len: 8,
            tx_timeout_ms: 3000,
        }
    }
}

impl RadioCfg {
    pub fn tx_config(&self) -> TxConfig {
        TxConfig {
            power_dbm: self.tx_power_dbm,
            bandwidth_khz: self.bandwidth_khz,
            spreading_factor: self.spreading_factor,
            coding_rate: self.coding_rate,
            preamble_len: self.preamble_len,
            timeout: Duration::from_millis(self.tx_timeout_ms),
        }
    }

    pub fn rx_config(&self) -> RxConfig {
        RxConfig {
            bandwidth_khz: self.bandwidth_khz,
            spreading_factor: self.spreading_factor,
            coding_rate: self.coding_rate,
            preamble_len: self.preamble_len,
            max_payload: u8::try_from(self.max_payload).unwrap_or(u8::MAX),
        }
    }
}

/// Where detected events go.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ReportMode {
    /// One JSON line per event on the serial/debug sink.
    #[default]
    Serial,
    /// Weight reports over the radio link.
    Radio,
}

#[derive(Debug, Clone)]
pub struct RunnerCfg {
    pub mode: ReportMode,
    /// Delay between loop cycles (ms).
    pub cycle_ms: u64,
    /// Shortened delay after a discarded rail sample (ms).
    pub saturation_backoff_ms: u64,
}

impl Default for RunnerCfg {
    fn default() -> Self {
        Self {
            mode: ReportMode::Serial,
            cycle_ms: 100,
            saturation_backoff_ms: 50,
        }
    }
}

/// Everything the node needs, bundled for the builder.
#[derive(Debug, Clone, Default)]
pub struct NodeCfg {
    pub sensor: SensorCfg,
    pub calibration: CalibrationCfg,
    pub filter: FilterCfg,
    pub stability: StabilityCfg,
    pub liquid: LiquidCfg,
    pub radio: RadioCfg,
    pub runner: RunnerCfg,
}
