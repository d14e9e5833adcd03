//! Backend assembly: the sensor and radio the node runs against.
//!
//! Host builds use the pin-level HX711 simulator fed from a repeating load
//! profile. With the `hardware` feature on Linux the same driver runs over
//! Pi GPIO instead, with each capture raised to SCHED_FIFO. The radio is always the in-memory transceiver; no vendor
//! SPI driver ships with this crate.

#![cfg_attr(all(feature = "hardware", target_os = "linux"), allow(dead_code))]

use std::time::Duration;

use crossbeam_channel::Receiver;
use weighnode_config::{Config, GainSel};
use weighnode_core::error::Result;
use weighnode_core::radio::EVENT_QUEUE_DEPTH;
use weighnode_core::{RadioEvent, event_queue};
use weighnode_hardware::hx711::{RAIL_HIGH, RAIL_LOW};
use weighnode_hardware::{Gain, Hx711, SimCriticalSection, SimulatedHx711, SimulatedRadio};
use weighnode_traits::{BoxError, MonotonicClock, Scale, Transceiver};

/// Guard around the 24-pulse capture on real pins.
#[cfg(target_os = "linux")]
#[cfg_attr(not(feature = "hardware"), allow(dead_code))]
pub type CaptureSection = crate::rt::FifoSection;

/// Load placed on the simulated cell during the loaded phase.
pub const SIM_LOAD_ENV: &str = "WEIGHNODE_SIM_LOAD_G";
const DEFAULT_SIM_LOAD_G: f32 = 250.0;
const SIM_OFFSET: i32 = 84_000;

// cycles per profile period: empty, loaded, empty
const EMPTY_LEAD: u64 = 10;
const LOADED: u64 = 20;
const PERIOD: u64 = 40;

pub fn gain_from(sel: GainSel) -> Gain {
    match sel {
        GainSel::A128 => Gain::A128,
        GainSel::B32 => Gain::B32,
        GainSel::A64 => Gain::A64,
    }
}

/// Simulated load cell behind the real bit driver.
pub struct SimLoadCell {
    hx: Hx711<SimulatedHx711, MonotonicClock, SimCriticalSection>,
    counts_per_g: f32,
    load_g: f32,
    tare_reads: u64,
    reads: u64,
}

impl SimLoadCell {
    pub fn new(cfg: &Config) -> Self {
        let load_g = std::env::var(SIM_LOAD_ENV)
            .ok()
            .and_then(|v| v.parse::<f32>().ok())
            .filter(|g| g.is_finite())
            .unwrap_or(DEFAULT_SIM_LOAD_G);
        let hx = Hx711::new(
            SimulatedHx711::new(),
            MonotonicClock::new(),
            SimCriticalSection::new(),
            gain_from(cfg.sensor.gain),
        );
        Self {
            hx,
            counts_per_g: cfg.calibration.scale,
            load_g,
            tare_reads: u64::from(cfg.calibration.tare_samples),
            reads: 0,
        }
    }

    fn next_raw(&mut self) -> i32 {
        let n = self.reads;
        self.reads += 1;
        if n < self.tare_reads {
            return SIM_OFFSET;
        }
        let phase = (n - self.tare_reads) % PERIOD;
        let grams = if (EMPTY_LEAD..EMPTY_LEAD + LOADED).contains(&phase) {
            self.load_g
        } else {
            0.0
        };
        let raw = f64::from(SIM_OFFSET) + f64::from(grams) * f64::from(self.counts_per_g);
        raw.round().clamp(f64::from(RAIL_LOW), f64::from(RAIL_HIGH)) as i32
    }
}

impl Scale for SimLoadCell {
    fn read(&mut self, timeout: Duration) -> std::result::Result<i32, BoxError> {
        let raw = self.next_raw();
        self.hx.lines_mut().push_conversion(raw);
        self.hx.read(timeout)
    }
}

/// The sensor for this build.
pub fn make_scale(cfg: &Config) -> Result<Box<dyn Scale>> {
    #[cfg(all(feature = "hardware", target_os = "linux"))]
    {
        use eyre::WrapErr;
        let lines = weighnode_hardware::gpio::RppalLines::open(cfg.pins.hx711_dt, cfg.pins.hx711_sck)
            .map_err(eyre::Report::new)
            .wrap_err("open hx711 pins")?;
        // the node passes sensor.ready_timeout_ms on every read
        let hx = Hx711::new(
            lines,
            MonotonicClock::new(),
            CaptureSection::new(),
            gain_from(cfg.sensor.gain),
        );
        tracing::info!(
            dt = cfg.pins.hx711_dt,
            sck = cfg.pins.hx711_sck,
            "hx711 on gpio"
        );
        return Ok(Box::new(hx));
    }
    #[cfg(not(all(feature = "hardware", target_os = "linux")))]
    {
        tracing::info!(profile_period = PERIOD, "simulated load cell");
        Ok(Box::new(SimLoadCell::new(cfg)))
    }
}

/// Transceiver plus the receiver its callbacks feed.
pub fn make_radio() -> (SimulatedRadio, Box<dyn Transceiver>, Receiver<RadioEvent>) {
    let radio = SimulatedRadio::new();
    let (irq, events) = event_queue(EVENT_QUEUE_DEPTH);
    radio.attach(irq);
    tracing::info!("simulated transceiver");
    (radio.clone(), Box::new(radio), events)
}
