//! Raw-count to weight conversion and tare.

use crate::error::{NodeError, Result};
use crate::util::mean_rounded_i32;

/// Linear model `weight = (raw - offset) / scale`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Calibration {
    /// Tare baseline in raw counts.
    pub offset: i32,
    /// Counts per gram. Zero is a degenerate sentinel that reads as 0.0.
    pub scale: f32,
}

impl Default for Calibration {
    fn default() -> Self {
        Self {
            offset: 0,
            scale: 1.0,
        }
    }
}

impl Calibration {
    pub fn to_weight(&self, raw: i32) -> f32 {
        if self.scale == 0.0 {
            return 0.0;
        }
        let net = i64::from(raw) - i64::from(self.offset);
        net as f32 / self.scale
    }

    /// True when `scale` is the zero sentinel.
    pub fn is_degenerate(&self) -> bool {
        self.scale == 0.0
    }
}

/// Owns the calibration and performs tare against a sample source.
#[derive(Debug, Clone, Default)]
pub struct Calibrator {
    cal: Calibration,
}

impl Calibrator {
    pub fn new(cal: Calibration) -> Self {
        Self { cal }
    }

    pub fn calibration(&self) -> Calibration {
        self.cal
    }

    pub fn offset(&self) -> i32 {
        self.cal.offset
    }

    pub fn scale(&self) -> f32 {
        self.cal.scale
    }

    /// Overwrite the scale. 0 is allowed and makes every weight read 0.0.
    pub fn set_scale(&mut self, scale: f32) {
        if scale == 0.0 {
            tracing::warn!(error = %NodeError::DegenerateCalibration, "scale set to zero");
        }
        self.cal.scale = scale;
    }

    pub fn set_offset(&mut self, offset: i32) {
        self.cal.offset = offset;
    }

    pub fn to_weight(&self, raw: i32) -> f32 {
        self.cal.to_weight(raw)
    }

    /// Average `times` samples from `read` (minimum 1) and store the rounded
    /// mean as the new offset.
    ///
    /// Rail codes are drawn but excluded from the mean. If every draw was a
    /// rail, the offset is left untouched and `SensorSaturation` is returned.
    pub fn tare_with<F>(&mut self, times: u32, mut read: F) -> Result<i32>
    where
        F: FnMut() -> Result<i32>,
    {
        let times = times.max(1);
        let mut sum: i64 = 0;
        let mut used: u32 = 0;
        let mut last_rail = None;
        for _ in 0..times {
            let raw = read()?;
            if is_rail(raw) {
                last_rail = Some(raw);
                continue;
            }
            sum += i64::from(raw);
            used += 1;
        }
        if used == 0 {
            let raw = last_rail.unwrap_or_default();
            return Err(eyre::Report::new(NodeError::SensorSaturation(raw)));
        }
        if used < times {
            tracing::warn!(used, requested = times, "tare skipped saturated samples");
        }
        self.cal.offset = mean_rounded_i32(sum, used);
        tracing::info!(offset = self.cal.offset, samples = used, "tare complete");
        Ok(self.cal.offset)
    }

    /// Convert the rounded mean of `times` samples (minimum 1). Rail codes are
    /// excluded; all-rail input reads as `SensorSaturation`.
    pub fn weight_averaged_with<F>(&self, times: u32, mut read: F) -> Result<f32>
    where
        F: FnMut() -> Result<i32>,
    {
        let times = times.max(1);
        let mut sum: i64 = 0;
        let mut used: u32 = 0;
        let mut last_rail = 0;
        for _ in 0..times {
            let raw = read()?;
            if is_rail(raw) {
                last_rail = raw;
                continue;
            }
            sum += i64::from(raw);
            used += 1;
        }
        if used == 0 {
            return Err(eyre::Report::new(NodeError::SensorSaturation(last_rail)));
        }
        Ok(self.to_weight(mean_rounded_i32(sum, used)))
    }
}

/// Full-scale ADC codes; see `weighnode_hardware::hx711`.
pub const RAIL_HIGH: i32 = 8_388_607;
pub const RAIL_LOW: i32 = -8_388_608;

#[inline]
pub fn is_rail(raw: i32) -> bool {
    raw == RAIL_HIGH || raw == RAIL_LOW
}
