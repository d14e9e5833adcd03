//! Radio link state machine.
//!
//! Driver callbacks run in interrupt context. They never touch the link
//! state directly: [`RadioIrq`] turns each callback into a [`RadioEvent`] on a
//! bounded queue, and the main loop drains that queue at the top of every
//! [`RadioLink::step`]. All state changes therefore happen on the loop.

use std::sync::Arc;
use std::sync::atomic::{AtomicU32, Ordering};
use std::time::Duration;

use crossbeam_channel::{Receiver, Sender, TrySendError, bounded};
use eyre::WrapErr;
use weighnode_traits::{RadioCallbacks, RadioStatus, Transceiver};

use crate::config::{LiquidCfg, RadioCfg, TxPolicy};
use crate::error::{NodeError, Result};
use crate::hw_error::map_hw_error;
use crate::packet::{self, WeightReport};
use crate::stability::StabilityEvent;

/// Default depth of the callback queue.
pub const EVENT_QUEUE_DEPTH: usize = 16;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum RadioLinkState {
    #[default]
    Idle,
    Rx,
    Tx,
    TxTimeout,
    RxTimeout,
    RxError,
}

/// One driver completion, as queued by [`RadioIrq`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RadioEvent {
    TxDone,
    RxDone {
        payload: Vec<u8>,
        rssi: i16,
        snr: i8,
    },
    TxTimeout,
    RxTimeout,
    RxError,
}

/// Callback sink handed to the transceiver driver.
#[derive(Debug, Clone)]
pub struct RadioIrq {
    tx: Sender<RadioEvent>,
    dropped: Arc<AtomicU32>,
}

impl RadioIrq {
    /// Events lost because the queue was full.
    pub fn dropped(&self) -> u32 {
        self.dropped.load(Ordering::Relaxed)
    }

    fn push(&self, ev: RadioEvent) {
        match self.tx.try_send(ev) {
            Ok(()) => {}
            Err(TrySendError::Full(_) | TrySendError::Disconnected(_)) => {
                self.dropped.fetch_add(1, Ordering::Relaxed);
            }
        }
    }
}

impl RadioCallbacks for RadioIrq {
    fn on_tx_done(&self) {
        self.push(RadioEvent::TxDone);
    }

    fn on_rx_done(&self, payload: &[u8], rssi: i16, snr: i8) {
        self.push(RadioEvent::RxDone {
            payload: payload.to_vec(),
            rssi,
            snr,
        });
    }

    fn on_tx_timeout(&self) {
        self.push(RadioEvent::TxTimeout);
    }

    fn on_rx_timeout(&self) {
        self.push(RadioEvent::RxTimeout);
    }

    fn on_rx_error(&self) {
        self.push(RadioEvent::RxError);
    }
}

/// Callback sink plus the loop-side receiver it feeds.
pub fn event_queue(depth: usize) -> (RadioIrq, Receiver<RadioEvent>) {
    let (tx, rx) = bounded(depth.max(1));
    (
        RadioIrq {
            tx,
            dropped: Arc::new(AtomicU32::new(0)),
        },
        rx,
    )
}

/// Last frame delivered by OnRxDone.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReceivedFrame {
    pub bytes: Vec<u8>,
    pub rssi: i16,
    pub snr: i8,
    /// Leading byte matched our channel id.
    pub accepted: bool,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct LinkStats {
    pub sent: u32,
    pub send_failures: u32,
    pub tx_done: u32,
    pub tx_timeouts: u32,
    pub rx_timeouts: u32,
    pub rx_errors: u32,
    pub received: u32,
    pub ignored: u32,
}

pub struct RadioLink<T: Transceiver> {
    radio: T,
    events: Receiver<RadioEvent>,
    cfg: RadioCfg,
    liquid: LiquidCfg,
    state: RadioLinkState,
    last_transmitted: f32,
    /// Weight of the latest stability event not yet on air.
    pending_event: Option<f32>,
    inbox: Option<ReceivedFrame>,
    stats: LinkStats,
}

impl<T: Transceiver> core::fmt::Debug for RadioLink<T> {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("RadioLink")
            .field("state", &self.state)
            .field("last_transmitted", &self.last_transmitted)
            .field("stats", &self.stats)
            .finish()
    }
}

impl<T: Transceiver> RadioLink<T> {
    pub fn new(radio: T, events: Receiver<RadioEvent>, cfg: RadioCfg, liquid: LiquidCfg) -> Self {
        Self {
            radio,
            events,
            cfg,
            liquid,
            state: RadioLinkState::Idle,
            last_transmitted: 0.0,
            pending_event: None,
            inbox: None,
            stats: LinkStats::default(),
        }
    }

    /// Bring the transceiver up on the configured channel and modem settings.
    pub fn init(&mut self) -> Result<()> {
        let hw = |e: weighnode_traits::BoxError| eyre::Report::new(map_hw_error(&*e));
        self.radio.init().map_err(hw).wrap_err("radio init")?;
        self.radio
            .set_channel(self.cfg.frequency_hz)
            .map_err(hw)
            .wrap_err("radio set_channel")?;
        self.radio
            .set_tx_config(&self.cfg.tx_config())
            .map_err(hw)
            .wrap_err("radio set_tx_config")?;
        self.radio
            .set_rx_config(&self.cfg.rx_config())
            .map_err(hw)
            .wrap_err("radio set_rx_config")?;
        self.state = RadioLinkState::Idle;
        tracing::info!(
            frequency_hz = self.cfg.frequency_hz,
            channel_id = self.cfg.channel_id,
            "radio ready"
        );
        Ok(())
    }

    pub fn state(&self) -> RadioLinkState {
        self.state
    }

    pub fn last_transmitted(&self) -> f32 {
        self.last_transmitted
    }

    pub fn set_last_transmitted(&mut self, weight: f32) {
        self.last_transmitted = weight;
    }

    pub fn stats(&self) -> LinkStats {
        self.stats
    }

    /// Most recent received frame, if any.
    pub fn inbox(&self) -> Option<&ReceivedFrame> {
        self.inbox.as_ref()
    }

    pub fn radio(&self) -> &T {
        &self.radio
    }

    /// Apply every queued callback event, in arrival order.
    pub fn drain_events(&mut self) {
        while let Ok(ev) = self.events.try_recv() {
            self.apply(ev);
        }
    }

    fn apply(&mut self, ev: RadioEvent) {
        match ev {
            RadioEvent::TxDone => {
                self.stats.tx_done += 1;
                self.sleep_radio();
                self.state = RadioLinkState::Idle;
            }
            RadioEvent::RxDone { payload, rssi, snr } => {
                self.sleep_radio();
                let mut bytes = payload;
                bytes.truncate(self.cfg.max_payload);
                let accepted = bytes.first() == Some(&self.cfg.channel_id);
                if accepted {
                    self.stats.received += 1;
                    log_received(&bytes, rssi, snr);
                } else {
                    self.stats.ignored += 1;
                    tracing::debug!(len = bytes.len(), "frame for another channel ignored");
                }
                self.inbox = Some(ReceivedFrame {
                    bytes,
                    rssi,
                    snr,
                    accepted,
                });
                self.state = RadioLinkState::Rx;
            }
            RadioEvent::TxTimeout => {
                self.stats.tx_timeouts += 1;
                self.state = RadioLinkState::TxTimeout;
            }
            RadioEvent::RxTimeout => {
                self.stats.rx_timeouts += 1;
                self.state = RadioLinkState::RxTimeout;
            }
            RadioEvent::RxError => {
                self.stats.rx_errors += 1;
                self.state = RadioLinkState::RxError;
            }
        }
    }

    /// Run one loop iteration: drain callbacks, then act on the current state.
    ///
    /// `event` is this cycle's stability event; under the event policy its
    /// weight is latched until a report carrying it is on air. The latch and
    /// `last_transmitted` only move after a send succeeds, so a callback that
    /// lands between `Idle -> Tx` and the send cannot lose the report. Radio
    /// faults are logged and counted, never returned.
    pub fn step(&mut self, weight: f32, event: Option<&StabilityEvent>) -> RadioLinkState {
        self.drain_events();
        if self.cfg.policy == TxPolicy::Event
            && let Some(ev) = event
        {
            self.pending_event = Some(ev.weight());
        }

        match self.state {
            RadioLinkState::Idle => {
                if self.radio.status() == RadioStatus::Idle
                    && self.due_report(weight).is_some()
                {
                    self.state = RadioLinkState::Tx;
                }
            }
            RadioLinkState::Tx => {
                if let Some(w) = self.due_report(weight) {
                    self.transmit(w);
                }
                self.state = RadioLinkState::Idle;
            }
            RadioLinkState::Rx | RadioLinkState::RxTimeout | RadioLinkState::RxError => {
                match self.state {
                    RadioLinkState::RxTimeout => {
                        tracing::warn!(error = %NodeError::RadioRxTimeout, "receive timed out");
                    }
                    RadioLinkState::RxError => {
                        tracing::warn!(error = %NodeError::RadioRxError, "receive failed");
                    }
                    _ => {}
                }
                // an outstanding report goes out before listening again
                if self.radio.status() == RadioStatus::Idle && self.due_report(weight).is_some() {
                    self.state = RadioLinkState::Tx;
                    return self.state;
                }
                let timeout = Duration::from_millis(self.cfg.rx_timeout_ms);
                if let Err(e) = self.radio.receive(timeout) {
                    tracing::warn!(error = %map_hw_error(&*e), "radio receive failed");
                }
                self.state = RadioLinkState::Idle;
            }
            RadioLinkState::TxTimeout => {
                tracing::warn!(error = %NodeError::RadioTxTimeout, "resetting radio");
                self.sleep_radio();
                self.state = RadioLinkState::Idle;
            }
        }
        self.state
    }

    /// Weight the next report should carry, if one is owed.
    fn due_report(&self, weight: f32) -> Option<f32> {
        match self.cfg.policy {
            TxPolicy::Delta => {
                ((weight - self.last_transmitted).abs() >= self.cfg.tx_threshold_g)
                    .then_some(weight)
            }
            TxPolicy::Event => self.pending_event,
        }
    }

    /// The report for `weight` is done with: on air, or never will be.
    fn settle(&mut self, weight: f32) {
        self.last_transmitted = weight;
        self.pending_event = None;
    }

    /// Send failures keep the report owed so the next idle cycle retries;
    /// a report that cannot be encoded is dropped for good.
    fn transmit(&mut self, weight: f32) {
        let report = WeightReport::new(weight, &self.liquid);
        let frame = match packet::encode(
            self.cfg.channel_id,
            &report.to_payload(),
            self.cfg.max_payload,
        ) {
            Ok(f) => f,
            Err(e) => {
                self.stats.send_failures += 1;
                tracing::warn!(error = %e, "report dropped");
                self.settle(weight);
                return;
            }
        };
        match self.radio.send(&frame) {
            Ok(()) => {
                self.stats.sent += 1;
                self.settle(weight);
                tracing::info!(
                    weight = report.weight,
                    liquid_detected = report.liquid_detected,
                    len = frame.len(),
                    "report sent"
                );
            }
            Err(e) => {
                self.stats.send_failures += 1;
                tracing::warn!(error = %map_hw_error(&*e), "radio send failed; will retry");
            }
        }
    }

    fn sleep_radio(&mut self) {
        if let Err(e) = self.radio.sleep() {
            tracing::warn!(error = %map_hw_error(&*e), "radio sleep failed");
        }
    }
}

fn log_received(bytes: &[u8], rssi: i16, snr: i8) {
    let parsed = packet::decode(bytes)
        .and_then(|p| p.payload_text().and_then(WeightReport::parse));
    match parsed {
        Ok(r) => tracing::info!(
            weight = r.weight,
            liquid_detected = r.liquid_detected,
            rssi,
            snr,
            "report received"
        ),
        Err(e) => tracing::debug!(error = %e, rssi, snr, "unparsed frame received"),
    }
}
