//! The weigh node: boot sequence and one cycle of the main loop.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::{Duration, Instant};

use eyre::WrapErr;
use weighnode_traits::{Clock, Scale, Transceiver};

use crate::acquisition::Acquisition;
use crate::builder::{Missing, NodeBuilder};
use crate::calibration::Calibration;
use crate::config::{NodeCfg, ReportMode};
use crate::error::Result;
use crate::hw_error::map_hw_error;
use crate::radio::RadioLink;
use crate::report::EventSink;
use crate::stability::StabilityState;
use crate::status::{CycleOutcome, CycleReport};
use crate::util::{ms, tick_ms};

/// Latched re-tare trigger. Cheap to clone; safe to set from a signal or
/// interrupt handler. The loop consumes it at the start of a cycle.
#[derive(Debug, Clone, Default)]
pub struct TareRequest(Arc<AtomicBool>);

impl TareRequest {
    pub fn request(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_pending(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }

    fn take(&self) -> bool {
        self.0.swap(false, Ordering::SeqCst)
    }
}

pub struct Node {
    pub(crate) scale: Box<dyn Scale>,
    pub(crate) clock: Arc<dyn Clock + Send + Sync>,
    pub(crate) epoch: Instant,
    pub(crate) cfg: NodeCfg,
    pub(crate) acq: Acquisition,
    pub(crate) sink: Box<dyn EventSink>,
    pub(crate) link: Option<RadioLink<Box<dyn Transceiver>>>,
    pub(crate) tare_request: TareRequest,
    pub(crate) cycles: u64,
}

impl core::fmt::Debug for Node {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("Node")
            .field("mode", &self.cfg.runner.mode)
            .field("calibration", &self.acq.calibrator().calibration())
            .field("cycles", &self.cycles)
            .field("link", &self.link)
            .finish()
    }
}

fn read_raw(scale: &mut dyn Scale, timeout: Duration) -> Result<i32> {
    scale
        .read(timeout)
        .map_err(|e| eyre::Report::new(map_hw_error(&*e)))
        .wrap_err("reading scale")
}

impl Node {
    /// Start building a Node.
    pub fn builder() -> NodeBuilder<Missing> {
        NodeBuilder::default()
    }

    /// Power-up sequence: settle, radio init, tare, apply the configured
    /// scale and start with empty filter and detector state.
    pub fn boot(&mut self) -> Result<i32> {
        self.clock.sleep(ms(self.cfg.sensor.settle_ms));
        if let Some(link) = self.link.as_mut() {
            link.init()?;
        }
        let offset = self.tare(self.cfg.calibration.tare_samples)?;
        self.acq.calibrator_mut().set_scale(self.cfg.calibration.scale);
        self.acq.reset_after_tare();
        tracing::info!(
            scale = self.acq.calibrator().scale(),
            offset,
            mode = ?self.cfg.runner.mode,
            "boot complete"
        );
        Ok(offset)
    }

    /// Average `times` raw reads into a new offset, then clear the filter and
    /// stability state so no pre-tare sample leaks into later averages.
    pub fn tare(&mut self, times: u32) -> Result<i32> {
        let scale = &mut self.scale;
        let clock = &self.clock;
        let timeout = ms(self.cfg.sensor.read_timeout_ms);
        let interval = ms(self.cfg.calibration.tare_interval_ms);
        let mut first = true;
        let offset = self.acq.calibrator_mut().tare_with(times, || {
            if !first {
                clock.sleep(interval);
            }
            first = false;
            read_raw(scale.as_mut(), timeout)
        })?;
        self.acq.reset_after_tare();
        Ok(offset)
    }

    /// Weight of the rounded mean of `times` raw reads. Does not touch the
    /// filter or detector.
    pub fn weight_averaged(&mut self, times: u32) -> Result<f32> {
        let scale = &mut self.scale;
        let timeout = ms(self.cfg.sensor.read_timeout_ms);
        self.acq
            .calibrator()
            .weight_averaged_with(times, || read_raw(scale.as_mut(), timeout))
    }

    /// One iteration of the main loop: optional re-tare, one read, one pass
    /// through the pipeline, then report or radio step.
    pub fn run_cycle(&mut self) -> Result<CycleReport> {
        let retared = if self.tare_request.take() {
            tracing::info!("re-tare requested");
            self.tare(self.cfg.calibration.tare_samples)?;
            true
        } else {
            false
        };

        let raw = read_raw(self.scale.as_mut(), ms(self.cfg.sensor.read_timeout_ms))?;
        tracing::trace!(raw, "cycle read");
        let tick = tick_ms(&self.clock, self.epoch);
        self.cycles += 1;

        let outcome = self.acq.process(raw, tick);
        let (delay, link_state) = match &outcome {
            CycleOutcome::Saturated { .. } => (ms(self.cfg.runner.saturation_backoff_ms), None),
            CycleOutcome::Measured(m) => {
                let link_state = match self.cfg.runner.mode {
                    ReportMode::Serial => {
                        if let Some(ev) = &m.event
                            && let Err(e) = self.sink.emit(ev)
                        {
                            tracing::warn!(error = %e, "event line not written");
                        }
                        None
                    }
                    ReportMode::Radio => self
                        .link
                        .as_mut()
                        .map(|link| link.step(m.filtered, m.event.as_ref())),
                };
                (ms(self.cfg.runner.cycle_ms), link_state)
            }
        };

        Ok(CycleReport {
            outcome,
            link_state,
            delay,
            retared,
        })
    }

    /// Handle for requesting a re-tare from outside the loop.
    pub fn tare_request(&self) -> TareRequest {
        self.tare_request.clone()
    }

    pub fn calibration(&self) -> Calibration {
        self.acq.calibrator().calibration()
    }

    pub fn stability(&self) -> &StabilityState {
        self.acq.detector().state()
    }

    pub fn filtered(&self) -> f32 {
        self.acq.filter().mean()
    }

    pub fn link(&self) -> Option<&RadioLink<Box<dyn Transceiver>>> {
        self.link.as_ref()
    }

    pub fn config(&self) -> &NodeCfg {
        &self.cfg
    }

    pub fn cycles(&self) -> u64 {
        self.cycles
    }

    pub fn clock(&self) -> &Arc<dyn Clock + Send + Sync> {
        &self.clock
    }
}
