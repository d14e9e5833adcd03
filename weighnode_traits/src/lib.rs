//! Capability traits consumed by the weigh node.
//!
//! Everything that touches pins, time, interrupt masking or the radio chip sits
//! behind one of these traits so the pipeline can run against simulated parts.
pub mod clock;

pub use clock::{Clock, MonotonicClock};

use std::time::Duration;

pub type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// The two digital lines of the load-cell ADC: clock out, data in.
pub trait SensorLines {
    /// Level of the data line (true = high).
    fn data_is_high(&mut self) -> bool;
    /// Drive the clock line.
    fn set_clock(&mut self, high: bool);
}

/// Suppresses asynchronous preemption around timing-critical sections.
///
/// `enter` and `exit` are always called in pairs by callers; implementations
/// need not support nesting.
pub trait CriticalSection {
    fn enter(&mut self);
    fn exit(&mut self);
}

/// Host builds have no interrupt controller to mask.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoCriticalSection;

impl CriticalSection for NoCriticalSection {
    fn enter(&mut self) {}
    fn exit(&mut self) {}
}

/// A source of raw signed 24-bit load-cell samples.
pub trait Scale {
    /// Read one raw sample, waiting at most `timeout` for the sensor to become
    /// ready. Drivers that follow the sentinel policy return `Ok(0)` when the
    /// wait expires; `Err` is reserved for line/bus faults.
    fn read(&mut self, timeout: Duration) -> Result<i32, BoxError>;
}

impl<S: Scale + ?Sized> Scale for Box<S> {
    fn read(&mut self, timeout: Duration) -> Result<i32, BoxError> {
        (**self).read(timeout)
    }
}

/// Hardware state reported by the transceiver.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RadioStatus {
    /// Standby or sleep; ready to accept a new operation.
    Idle,
    RxRunning,
    TxRunning,
}

/// Transmit parameters for a LoRa-style transceiver.
#[derive(Debug, Clone, PartialEq)]
pub struct TxConfig {
    pub power_dbm: i8,
    pub bandwidth_khz: u32,
    pub spreading_factor: u8,
    /// Coding rate denominator offset: 1 = 4/5 .. 4 = 4/8.
    pub coding_rate: u8,
    pub preamble_len: u16,
    /// Hardware transmit timeout; expiry fires the TxTimeout callback.
    pub timeout: Duration,
}

/// Receive parameters for a LoRa-style transceiver.
#[derive(Debug, Clone, PartialEq)]
pub struct RxConfig {
    pub bandwidth_khz: u32,
    pub spreading_factor: u8,
    pub coding_rate: u8,
    pub preamble_len: u16,
    pub max_payload: u8,
}

/// Completion callbacks fired by a transceiver driver, typically from its
/// interrupt handler. Implementations must be quick and must not block.
pub trait RadioCallbacks: Send {
    fn on_tx_done(&self);
    fn on_rx_done(&self, payload: &[u8], rssi: i16, snr: i8);
    fn on_tx_timeout(&self);
    fn on_rx_timeout(&self);
    fn on_rx_error(&self);
}

/// Packet radio driver boundary.
///
/// Completion is reported asynchronously through [`RadioCallbacks`]; the
/// driver is handed a callback handle by whoever wires it up.
pub trait Transceiver {
    fn init(&mut self) -> Result<(), BoxError>;
    fn set_channel(&mut self, frequency_hz: u32) -> Result<(), BoxError>;
    fn set_tx_config(&mut self, cfg: &TxConfig) -> Result<(), BoxError>;
    fn set_rx_config(&mut self, cfg: &RxConfig) -> Result<(), BoxError>;
    fn send(&mut self, frame: &[u8]) -> Result<(), BoxError>;
    fn receive(&mut self, timeout: Duration) -> Result<(), BoxError>;
    fn sleep(&mut self) -> Result<(), BoxError>;
    fn status(&self) -> RadioStatus;
}

impl<T: Transceiver + ?Sized> Transceiver for Box<T> {
    fn init(&mut self) -> Result<(), BoxError> {
        (**self).init()
    }
    fn set_channel(&mut self, frequency_hz: u32) -> Result<(), BoxError> {
        (**self).set_channel(frequency_hz)
    }
    fn set_tx_config(&mut self, cfg: &TxConfig) -> Result<(), BoxError> {
        (**self).set_tx_config(cfg)
    }
    fn set_rx_config(&mut self, cfg: &RxConfig) -> Result<(), BoxError> {
        (**self).set_rx_config(cfg)
    }
    fn send(&mut self, frame: &[u8]) -> Result<(), BoxError> {
        (**self).send(frame)
    }
    fn receive(&mut self, timeout: Duration) -> Result<(), BoxError> {
        (**self).receive(timeout)
    }
    fn sleep(&mut self) -> Result<(), BoxError> {
        (**self).sleep()
    }
    fn status(&self) -> RadioStatus {
        (**self).status()
    }
}
