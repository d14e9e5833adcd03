//! Simulated sensor lines, interrupt mask and radio for host runs and tests.
use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use weighnode_traits::{
    BoxError, CriticalSection, RadioCallbacks, RadioStatus, RxConfig, SensorLines, Transceiver,
    TxConfig,
};

use crate::error::HwError;

/// Interrupt mask stand-in that records how it was used.
#[derive(Debug, Clone, Default)]
pub struct SimCriticalSection {
    masked: Arc<AtomicBool>,
    enters: Arc<AtomicUsize>,
    exits: Arc<AtomicUsize>,
}

impl SimCriticalSection {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_masked(&self) -> bool {
        self.masked.load(Ordering::SeqCst)
    }

    pub fn enters(&self) -> usize {
        self.enters.load(Ordering::SeqCst)
    }

    pub fn exits(&self) -> usize {
        self.exits.load(Ordering::SeqCst)
    }
}

impl CriticalSection for SimCriticalSection {
    fn enter(&mut self) {
        self.enters.fetch_add(1, Ordering::SeqCst);
        self.masked.store(true, Ordering::SeqCst);
    }

    fn exit(&mut self) {
        self.exits.fetch_add(1, Ordering::SeqCst);
        self.masked.store(false, Ordering::SeqCst);
    }
}

/// Pin-level model of an HX711 fed from a queue of conversion results.
///
/// DOUT reads low (ready) while a conversion is queued and the configured
/// number of busy polls has elapsed. Bits are presented on the rising clock
/// edge and must be sampled while the clock is high.
#[derive(Debug, Default)]
pub struct SimulatedHx711 {
    conversions: VecDeque<i32>,
    busy_polls: u32,
    busy_left: u32,
    clock_high: bool,
    reading: Option<u32>,
    pulses: u32,
    current_bit: bool,
    gain_log: Vec<u8>,
    mask: Option<SimCriticalSection>,
    unmasked_edges: usize,
}

impl SimulatedHx711 {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_conversions(values: impl IntoIterator<Item = i32>) -> Self {
        let mut s = Self::new();
        s.conversions.extend(values);
        s
    }

    pub fn push_conversion(&mut self, raw: i32) {
        self.conversions.push_back(raw);
    }

    /// Report not-ready for `polls` polls before each conversion.
    pub fn set_busy_polls(&mut self, polls: u32) {
        self.busy_polls = polls;
        self.busy_left = polls;
    }

    /// Count clock edges (rising and falling) that happen during a read while
    /// `mask` is open.
    pub fn watch_mask(&mut self, mask: &SimCriticalSection) {
        self.mask = Some(mask.clone());
    }

    /// Extra pulses seen after each completed 24-bit read, in order.
    pub fn gain_pulses(&self) -> &[u8] {
        &self.gain_log
    }

    pub fn remaining(&self) -> usize {
        self.conversions.len()
    }

    pub fn unmasked_edges(&self) -> usize {
        self.unmasked_edges
    }

    fn ready(&self) -> bool {
        !self.conversions.is_empty() && self.busy_left == 0
    }

    fn finish_read(&mut self) {
        if self.reading.take().is_some() {
            self.pulses = 0;
            self.current_bit = false;
            self.busy_left = self.busy_polls;
        }
    }
}

impl SensorLines for SimulatedHx711 {
    fn data_is_high(&mut self) -> bool {
        if self.clock_high {
            return self.current_bit;
        }
        if self.reading.is_some() && self.pulses >= 24 {
            self.finish_read();
        }
        if self.reading.is_some() {
            return self.current_bit;
        }
        if self.conversions.is_empty() {
            return true;
        }
        if self.busy_left > 0 {
            self.busy_left -= 1;
            return true;
        }
        false
    }

    fn set_clock(&mut self, high: bool) {
        let rising = high && !self.clock_high;
        self.clock_high = high;
        if self.reading.is_some() || (rising && self.ready()) {
            if let Some(mask) = &self.mask
                && !mask.is_masked()
            {
                self.unmasked_edges += 1;
            }
        }
        if !rising {
            return;
        }
        if self.reading.is_none() {
            if !self.ready() {
                return;
            }
            let raw = self.conversions.pop_front().unwrap_or_default();
            self.reading = Some((raw as u32) & 0x00FF_FFFF);
            self.pulses = 0;
        }
        let code = self.reading.unwrap_or_default();
        self.pulses += 1;
        if self.pulses <= 24 {
            self.current_bit = (code >> (24 - self.pulses)) & 1 == 1;
        } else {
            // DOUT stays high through the gain-select pulses
            self.current_bit = true;
            if self.pulses == 25 {
                self.gain_log.push(1);
            } else if let Some(last) = self.gain_log.last_mut() {
                *last += 1;
            }
        }
    }
}

/// How the simulated radio completes a transmission.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TxOutcome {
    /// Fire TxDone immediately.
    #[default]
    Done,
    /// Fire TxTimeout immediately.
    Timeout,
    /// Fire nothing; the radio stays busy until put to sleep.
    Silent,
}

/// One scripted result for the next `receive` call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RxOutcome {
    Frame(Vec<u8>),
    Timeout,
    Error,
}

/// Calls observed by the simulated radio.
#[derive(Debug, Default, Clone)]
pub struct RadioLog {
    pub inits: usize,
    pub frequency_hz: Option<u32>,
    pub tx_config: Option<TxConfig>,
    pub rx_config: Option<RxConfig>,
    pub sent: Vec<Vec<u8>>,
    pub receives: Vec<Duration>,
    pub sleeps: usize,
}

#[derive(Default)]
struct RadioState {
    log: RadioLog,
    status: Option<RadioStatus>,
    tx_outcome: TxOutcome,
    rx_script: VecDeque<RxOutcome>,
    callbacks: Option<Box<dyn RadioCallbacks>>,
    fail_send: bool,
}

/// In-memory transceiver. Clones share state, so a test can keep a handle to
/// inspect traffic while the node owns the driver.
#[derive(Clone, Default)]
pub struct SimulatedRadio {
    inner: Arc<Mutex<RadioState>>,
}

impl core::fmt::Debug for SimulatedRadio {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        let st = self.lock();
        f.debug_struct("SimulatedRadio")
            .field("status", &st.status)
            .field("sent", &st.log.sent.len())
            .finish()
    }
}

impl SimulatedRadio {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, RadioState> {
        // A panicking test thread must not wedge the others.
        self.inner.lock().unwrap_or_else(|p| p.into_inner())
    }

    /// Wire the completion callbacks, as a board support layer would.
    pub fn attach(&self, callbacks: impl RadioCallbacks + 'static) {
        self.lock().callbacks = Some(Box::new(callbacks));
    }

    pub fn set_tx_outcome(&self, outcome: TxOutcome) {
        self.lock().tx_outcome = outcome;
    }

    pub fn script_rx(&self, outcome: RxOutcome) {
        self.lock().rx_script.push_back(outcome);
    }

    pub fn force_status(&self, status: RadioStatus) {
        self.lock().status = Some(status);
    }

    pub fn fail_next_send(&self) {
        self.lock().fail_send = true;
    }

    pub fn log(&self) -> RadioLog {
        self.lock().log.clone()
    }

    pub fn sent(&self) -> Vec<Vec<u8>> {
        self.lock().log.sent.clone()
    }
}

impl Transceiver for SimulatedRadio {
    fn init(&mut self) -> Result<(), BoxError> {
        let mut st = self.lock();
        st.log.inits += 1;
        st.status = Some(RadioStatus::Idle);
        Ok(())
    }

    fn set_channel(&mut self, frequency_hz: u32) -> Result<(), BoxError> {
        self.lock().log.frequency_hz = Some(frequency_hz);
        Ok(())
    }

    fn set_tx_config(&mut self, cfg: &TxConfig) -> Result<(), BoxError> {
        self.lock().log.tx_config = Some(cfg.clone());
        Ok(())
    }

    fn set_rx_config(&mut self, cfg: &RxConfig) -> Result<(), BoxError> {
        self.lock().log.rx_config = Some(cfg.clone());
        Ok(())
    }

    fn send(&mut self, frame: &[u8]) -> Result<(), BoxError> {
        let mut st = self.lock();
        if std::mem::take(&mut st.fail_send) {
            return Err(Box::new(HwError::Radio("spi write failed".into())));
        }
        if st.status == Some(RadioStatus::TxRunning) {
            return Err(Box::new(HwError::RadioBusy("transmit in progress")));
        }
        st.log.sent.push(frame.to_vec());
        st.status = Some(RadioStatus::TxRunning);
        let outcome = st.tx_outcome;
        match outcome {
            TxOutcome::Done => {
                st.status = Some(RadioStatus::Idle);
                if let Some(cb) = &st.callbacks {
                    cb.on_tx_done();
                }
            }
            TxOutcome::Timeout => {
                st.status = Some(RadioStatus::Idle);
                if let Some(cb) = &st.callbacks {
                    cb.on_tx_timeout();
                }
            }
            TxOutcome::Silent => {}
        }
        Ok(())
    }

    fn receive(&mut self, timeout: Duration) -> Result<(), BoxError> {
        let mut st = self.lock();
        st.log.receives.push(timeout);
        st.status = Some(RadioStatus::RxRunning);
        let outcome = st.rx_script.pop_front().unwrap_or(RxOutcome::Timeout);
        st.status = Some(RadioStatus::Idle);
        if let Some(cb) = &st.callbacks {
            match outcome {
                RxOutcome::Frame(bytes) => cb.on_rx_done(&bytes, -60, 8),
                RxOutcome::Timeout => cb.on_rx_timeout(),
                RxOutcome::Error => cb.on_rx_error(),
            }
        }
        Ok(())
    }

    fn sleep(&mut self) -> Result<(), BoxError> {
        let mut st = self.lock();
        st.log.sleeps += 1;
        st.status = Some(RadioStatus::Idle);
        Ok(())
    }

    fn status(&self) -> RadioStatus {
        self.lock().status.unwrap_or(RadioStatus::Idle)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn idle_line_reads_high_without_conversions() {
        let mut sim = SimulatedHx711::new();
        assert!(sim.data_is_high());
        sim.push_conversion(5);
        assert!(!sim.data_is_high());
    }

    #[test]
    fn busy_polls_delay_ready() {
        let mut sim = SimulatedHx711::with_conversions([1]);
        sim.set_busy_polls(2);
        assert!(sim.data_is_high());
        assert!(sim.data_is_high());
        assert!(!sim.data_is_high());
    }

    #[test]
    fn radio_without_callbacks_still_logs_traffic() {
        let mut radio = SimulatedRadio::new();
        radio.init().unwrap();
        radio.send(b"\x01hi").unwrap();
        assert_eq!(radio.sent(), vec![b"\x01hi".to_vec()]);
        assert_eq!(radio.status(), RadioStatus::Idle);
    }

    #[test]
    fn silent_tx_keeps_radio_busy_until_sleep() {
        let mut radio = SimulatedRadio::new();
        radio.set_tx_outcome(TxOutcome::Silent);
        radio.send(b"\x01a").unwrap();
        assert_eq!(radio.status(), RadioStatus::TxRunning);
        assert!(radio.send(b"\x01b").is_err());
        radio.sleep().unwrap();
        assert_eq!(radio.status(), RadioStatus::Idle);
    }
}
