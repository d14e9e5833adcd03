//! `From` implementations bridging `weighnode_config` types to `weighnode_core` types.

use crate::config::{
    CalibrationCfg, FilterCfg, LiquidCfg, NodeCfg, RadioCfg, ReportMode, RunnerCfg, SensorCfg,
    StabilityCfg, TxPolicy,
};

impl From<&weighnode_config::SensorCfg> for SensorCfg {
    fn from(c: &weighnode_config::SensorCfg) -> Self {
        Self {
            read_timeout_ms: c.ready_timeout_ms,
            settle_ms: c.settle_ms,
        }
    }
}

impl From<&weighnode_config::CalibrationCfg> for CalibrationCfg {
    fn from(c: &weighnode_config::CalibrationCfg) -> Self {
        Self {
            scale: c.scale,
            tare_samples: c.tare_samples,
            tare_interval_ms: c.tare_interval_ms,
        }
    }
}

impl From<&weighnode_config::FilterCfg> for FilterCfg {
    fn from(c: &weighnode_config::FilterCfg) -> Self {
        Self { window: c.window }
    }
}

impl From<&weighnode_config::StabilityCfg> for StabilityCfg {
    fn from(c: &weighnode_config::StabilityCfg) -> Self {
        Self {
            delta_g: c.delta_g,
            run_length: c.run_length,
        }
    }
}

impl From<&weighnode_config::LiquidCfg> for LiquidCfg {
    fn from(c: &weighnode_config::LiquidCfg) -> Self {
        Self {
            container_baseline_g: c.container_baseline_g,
            increment_g: c.increment_g,
        }
    }
}

impl From<weighnode_config::TxPolicySel> for TxPolicy {
    fn from(p: weighnode_config::TxPolicySel) -> Self {
        match p {
            weighnode_config::TxPolicySel::Delta => Self::Delta,
            weighnode_config::TxPolicySel::Event => Self::Event,
        }
    }
}

impl From<&weighnode_config::RadioCfg> for RadioCfg {
    fn from(c: &weighnode_config::RadioCfg) -> Self {
        Self {
            channel_id: c.channel_id,
            frequency_hz: c.frequency_hz,
            tx_threshold_g: c.tx_threshold_g,
            rx_timeout_ms: c.rx_timeout_ms,
            max_payload: c.max_payload,
            policy: c.policy.into(),
            tx_power_dbm: c.tx_power_dbm,
            spreading_factor: c.spreading_factor,
            bandwidth_khz: c.bandwidth_khz,
            coding_rate: c.coding_rate,
            preamble_len: c.preamble_len,
            tx_timeout_ms: c.tx_timeout_ms,
        }
    }
}

impl From<weighnode_config::RunMode> for ReportMode {
    fn from(m: weighnode_config::RunMode) -> Self {
        match m {
            weighnode_config::RunMode::Serial => Self::Serial,
            weighnode_config::RunMode::Radio => Self::Radio,
        }
    }
}

impl From<&weighnode_config::RunnerCfg> for RunnerCfg {
    fn from(c: &weighnode_config::RunnerCfg) -> Self {
        Self {
            mode: c.mode.into(),
            cycle_ms: c.cycle_ms,
            saturation_backoff_ms: c.saturation_backoff_ms,
        }
    }
}

impl From<&weighnode_config::Config> for NodeCfg {
    fn from(c: &weighnode_config::Config) -> Self {
        Self {
            sensor: (&c.sensor).into(),
            calibration: (&c.calibration).into(),
            filter: (&c.filter).into(),
            stability: (&c.stability).into(),
            liquid: (&c.liquid).into(),
            radio: (&c.radio).into(),
            runner: (&c.runner).into(),
        }
    }
}
