//! Type-state builder for `Node`.
//!
//! The builder enforces at compile time that a Scale is provided before
//! `build()` is available. `try_build()` is always available for dynamic
//! checks, including the radio requirement of radio mode.

use std::marker::PhantomData;
use std::sync::Arc;

use crossbeam_channel::Receiver;
use weighnode_traits::clock::{Clock, MonotonicClock};
use weighnode_traits::{Scale, Transceiver};

use crate::acquisition::Acquisition;
use crate::calibration::Calibration;
use crate::config::*;
use crate::error::{BuildError, Result};
use crate::node::{Node, TareRequest};
use crate::radio::{RadioEvent, RadioLink};
use crate::report::{EventSink, LineSink};

// ── Type-state markers ───────────────────────────────────────────────────────

pub struct Missing;
pub struct Set;

/// Builder for `Node`. All fields are validated on `build()`.
pub struct NodeBuilder<S> {
    scale: Option<Box<dyn Scale>>,
    radio: Option<(Box<dyn Transceiver>, Receiver<RadioEvent>)>,
    cfg: NodeCfg,
    calibration: Option<Calibration>,
    clock: Option<Box<dyn Clock + Send + Sync>>,
    sink: Option<Box<dyn EventSink>>,
    tare_request: Option<TareRequest>,
    _s: PhantomData<S>,
}

impl Default for NodeBuilder<Missing> {
    fn default() -> Self {
        Self {
            scale: None,
            radio: None,
            cfg: NodeCfg::default(),
            calibration: None,
            clock: None,
            sink: None,
            tare_request: None,
            _s: PhantomData,
        }
    }
}

fn invalid(msg: &'static str) -> eyre::Report {
    eyre::Report::new(BuildError::InvalidConfig(msg))
}

fn check_threshold(v: f32, msg: &'static str) -> Result<()> {
    if v.is_finite() && v >= 0.0 {
        Ok(())
    } else {
        Err(invalid(msg))
    }
}

/// Single source of truth for runtime config validation.
fn validate(cfg: &NodeCfg) -> Result<()> {
    if cfg.filter.window == 0 {
        return Err(invalid("filter window must be >= 1"));
    }
    if cfg.stability.run_length == 0 {
        return Err(invalid("stability run_length must be >= 1"));
    }
    check_threshold(cfg.stability.delta_g, "stability delta_g must be finite and >= 0")?;
    if cfg.calibration.tare_samples == 0 {
        return Err(invalid("tare_samples must be >= 1"));
    }
    if !cfg.calibration.scale.is_finite() {
        return Err(invalid("calibration scale must be finite"));
    }
    if cfg.sensor.read_timeout_ms == 0 {
        return Err(invalid("sensor read_timeout_ms must be >= 1"));
    }
    check_threshold(
        cfg.liquid.container_baseline_g,
        "container_baseline_g must be finite and >= 0",
    )?;
    check_threshold(cfg.liquid.increment_g, "liquid increment_g must be finite and >= 0")?;
    check_threshold(cfg.radio.tx_threshold_g, "tx_threshold_g must be finite and >= 0")?;
    if cfg.radio.rx_timeout_ms == 0 {
        return Err(invalid("rx_timeout_ms must be >= 1"));
    }
    if !(2..=255).contains(&cfg.radio.max_payload) {
        return Err(invalid("max_payload must be in [2, 255]"));
    }
    if cfg.runner.cycle_ms == 0 {
        return Err(invalid("cycle_ms must be >= 1"));
    }
    Ok(())
}

impl<S> NodeBuilder<S> {
    /// Fallible build available in any type-state; returns detailed error for missing pieces.
    pub fn try_build(self) -> Result<Node> {
        let scale = self
            .scale
            .ok_or_else(|| eyre::Report::new(BuildError::MissingScale))?;
        validate(&self.cfg)?;

        let link = match (self.cfg.runner.mode, self.radio) {
            (ReportMode::Radio, None) => return Err(eyre::Report::new(BuildError::MissingRadio)),
            (_, Some((radio, events))) => Some(RadioLink::new(
                radio,
                events,
                self.cfg.radio.clone(),
                self.cfg.liquid.clone(),
            )),
            (ReportMode::Serial, None) => None,
        };

        let clock: Arc<dyn Clock + Send + Sync> = match self.clock {
            Some(b) => Arc::from(b),
            None => Arc::new(MonotonicClock::new()),
        };
        let epoch = clock.now();

        let calibration = self.calibration.unwrap_or(Calibration {
            offset: 0,
            scale: self.cfg.calibration.scale,
        });
        let acq = Acquisition::new(calibration, &self.cfg.filter, &self.cfg.stability);

        Ok(Node {
            scale,
            clock,
            epoch,
            acq,
            sink: self
                .sink
                .unwrap_or_else(|| Box::new(LineSink::stdout()) as Box<dyn EventSink>),
            link,
            tare_request: self.tare_request.unwrap_or_default(),
            cycles: 0,
            cfg: self.cfg,
        })
    }

    pub fn with_config(mut self, cfg: NodeCfg) -> Self {
        self.cfg = cfg;
        self
    }
    pub fn with_sensor(mut self, sensor: SensorCfg) -> Self {
        self.cfg.sensor = sensor;
        self
    }
    pub fn with_calibration_cfg(mut self, calibration: CalibrationCfg) -> Self {
        self.cfg.calibration = calibration;
        self
    }
    pub fn with_filter(mut self, filter: FilterCfg) -> Self {
        self.cfg.filter = filter;
        self
    }
    pub fn with_stability(mut self, stability: StabilityCfg) -> Self {
        self.cfg.stability = stability;
        self
    }
    pub fn with_liquid(mut self, liquid: LiquidCfg) -> Self {
        self.cfg.liquid = liquid;
        self
    }
    pub fn with_radio_cfg(mut self, radio: RadioCfg) -> Self {
        self.cfg.radio = radio;
        self
    }
    pub fn with_runner(mut self, runner: RunnerCfg) -> Self {
        self.cfg.runner = runner;
        self
    }
    /// Start from a known calibration instead of waiting for the boot tare.
    pub fn with_calibration(mut self, calibration: Calibration) -> Self {
        self.calibration = Some(calibration);
        self
    }
    /// Transceiver plus the receiving end of the queue its callbacks feed.
    pub fn with_radio(
        mut self,
        radio: impl Transceiver + 'static,
        events: Receiver<RadioEvent>,
    ) -> Self {
        let radio: Box<dyn Transceiver> = Box::new(radio);
        self.radio = Some((radio, events));
        self
    }
    /// Where serial-mode event lines go; defaults to stdout.
    pub fn with_sink(mut self, sink: impl EventSink + 'static) -> Self {
        self.sink = Some(Box::new(sink));
        self
    }
    /// Share an existing re-tare trigger (e.g. one wired to a button).
    pub fn with_tare_request(mut self, req: TareRequest) -> Self {
        self.tare_request = Some(req);
        self
    }
    /// Provide a custom clock implementation; defaults to `MonotonicClock` when not provided.
    pub fn with_clock(mut self, clock: Box<dyn Clock + Send + Sync>) -> Self {
        self.clock = Some(clock);
        self
    }
}

// Setter that advances type-state
impl NodeBuilder<Missing> {
    pub fn with_scale(self, scale: impl Scale + 'static) -> NodeBuilder<Set> {
        NodeBuilder {
            scale: Some(Box::new(scale)),
            radio: self.radio,
            cfg: self.cfg,
            calibration: self.calibration,
            clock: self.clock,
            sink: self.sink,
            tare_request: self.tare_request,
            _s: PhantomData,
        }
    }
}

impl NodeBuilder<Set> {
    /// Validate and build the Node. Only available once a Scale is set.
    pub fn build(self) -> Result<Node> {
        self.try_build()
    }
}
