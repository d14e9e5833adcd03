//! Calibrate, filter and judge stability for one raw sample.

use crate::calibration::{Calibration, Calibrator, is_rail};
use crate::config::{FilterCfg, StabilityCfg};
use crate::error::NodeError;
use crate::filter::MovingAverage;
use crate::stability::StabilityDetector;
use crate::status::{CycleOutcome, Measurement};

#[derive(Debug, Clone)]
pub struct Acquisition {
    calibrator: Calibrator,
    filter: MovingAverage,
    detector: StabilityDetector,
}

impl Acquisition {
    pub fn new(cal: Calibration, filter: &FilterCfg, stability: &StabilityCfg) -> Self {
        Self {
            calibrator: Calibrator::new(cal),
            filter: MovingAverage::new(filter.window),
            detector: StabilityDetector::new(stability),
        }
    }

    /// Push `raw` through calibration, the moving average and the detector.
    ///
    /// Rail codes return `Saturated` before any state is touched. The
    /// timeout sentinel 0 is an ordinary sample here.
    pub fn process(&mut self, raw: i32, tick_ms: u32) -> CycleOutcome {
        if is_rail(raw) {
            tracing::warn!(error = %NodeError::SensorSaturation(raw), "sample discarded");
            return CycleOutcome::Saturated { raw };
        }
        let weight = self.calibrator.to_weight(raw);
        let filtered = self.filter.push(weight);
        tracing::debug!(raw, weight, filtered, "sample");
        let event = self.detector.update(filtered, tick_ms);
        CycleOutcome::Measured(Measurement {
            raw,
            weight,
            filtered,
            event,
        })
    }

    /// Clear filter history and stability latch; called after every tare.
    pub fn reset_after_tare(&mut self) {
        self.filter.reset();
        self.detector.reset();
    }

    pub fn calibrator(&self) -> &Calibrator {
        &self.calibrator
    }

    pub fn calibrator_mut(&mut self) -> &mut Calibrator {
        &mut self.calibrator
    }

    pub fn filter(&self) -> &MovingAverage {
        &self.filter
    }

    pub fn detector(&self) -> &StabilityDetector {
        &self.detector
    }
}
