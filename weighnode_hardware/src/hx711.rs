//! Bit-banged driver for the HX711 24-bit load-cell ADC.
//!
//! The chip signals a finished conversion by pulling DOUT low. The host then
//! clocks out 24 data bits MSB first and appends 1 to 3 extra pulses that pick
//! channel and gain for the *next* conversion, so a read always returns data
//! taken with the gain selected by the previous read.
use std::time::Duration;
use tracing::{trace, warn};
use weighnode_traits::{BoxError, Clock, CriticalSection, Scale, SensorLines};

use crate::error::HwError;
use crate::util::wait_until_low_with_timeout;

/// Positive full-scale code; the input exceeded the range.
pub const RAIL_HIGH: i32 = 8_388_607;
/// Negative full-scale code; the input exceeded the range.
pub const RAIL_LOW: i32 = -8_388_608;
/// Value returned when the sensor never signals ready.
pub const TIMEOUT_SENTINEL: i32 = 0;

const DATA_BITS: u32 = 24;
/// Clock high/low hold time. PD_SCK high must stay under 50 µs.
const PULSE_HOLD_US: u32 = 1;
const READY_POLL_INTERVAL: Duration = Duration::from_micros(200);
pub const DEFAULT_READY_TIMEOUT: Duration = Duration::from_millis(200);

/// True for the two full-scale codes, which carry no usable reading.
#[inline]
pub fn is_rail(raw: i32) -> bool {
    raw == RAIL_HIGH || raw == RAIL_LOW
}

/// Sign-extend a 24-bit two's-complement code.
#[inline]
pub fn sign_extend_24(code: u32) -> i32 {
    ((code << 8) as i32) >> 8
}

/// Channel/gain selection applied to the conversion after the current one.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Gain {
    /// Channel A, gain 128 (1 extra pulse).
    #[default]
    A128,
    /// Channel B, gain 32 (2 extra pulses).
    B32,
    /// Channel A, gain 64 (3 extra pulses).
    A64,
}

impl Gain {
    pub fn pulses(self) -> u8 {
        match self {
            Gain::A128 => 1,
            Gain::B32 => 2,
            Gain::A64 => 3,
        }
    }

    pub fn from_pulses(pulses: u8) -> Option<Self> {
        match pulses {
            1 => Some(Gain::A128),
            2 => Some(Gain::B32),
            3 => Some(Gain::A64),
            _ => None,
        }
    }
}

/// Holds the critical section open for its lifetime; exit runs on drop so
/// every path out of the capture re-enables interrupts.
struct Masked<'a, I: CriticalSection>(&'a mut I);

impl<'a, I: CriticalSection> Masked<'a, I> {
    fn enter(irq: &'a mut I) -> Self {
        irq.enter();
        Self(irq)
    }
}

impl<I: CriticalSection> Drop for Masked<'_, I> {
    fn drop(&mut self) {
        self.0.exit();
    }
}

pub struct Hx711<L, C, I> {
    lines: L,
    clock: C,
    irq: I,
    gain: Gain,
    ready_timeout: Duration,
}

impl<L: SensorLines, C: Clock, I: CriticalSection> Hx711<L, C, I> {
    pub fn new(mut lines: L, clock: C, irq: I, gain: Gain) -> Self {
        lines.set_clock(false); // clock idle low; high for >60 µs powers the chip down
        Self {
            lines,
            clock,
            irq,
            gain,
            ready_timeout: DEFAULT_READY_TIMEOUT,
        }
    }

    pub fn with_ready_timeout(mut self, timeout: Duration) -> Self {
        self.ready_timeout = timeout;
        self
    }

    pub fn gain(&self) -> Gain {
        self.gain
    }

    /// Takes effect on the conversion after the next read.
    pub fn set_gain(&mut self, gain: Gain) {
        self.gain = gain;
    }

    pub fn lines(&self) -> &L {
        &self.lines
    }

    pub fn lines_mut(&mut self) -> &mut L {
        &mut self.lines
    }

    pub fn into_parts(self) -> (L, C, I) {
        (self.lines, self.clock, self.irq)
    }

    /// Read one sample using the configured ready timeout.
    ///
    /// Returns [`TIMEOUT_SENTINEL`] if the chip does not signal ready in time.
    /// A genuine zero code only appears on a detached or unpowered sensor, so
    /// callers may treat 0 as "no reading".
    pub fn read_raw(&mut self) -> i32 {
        self.read_raw_within(self.ready_timeout)
    }

    fn read_raw_within(&mut self, timeout: Duration) -> i32 {
        if let Err(e) = self.wait_ready(timeout) {
            warn!(error = %e, timeout_ms = timeout.as_millis() as u64, "hx711 not ready");
            return TIMEOUT_SENTINEL;
        }
        let code = {
            let _masked = Masked::enter(&mut self.irq);
            shift_in(&mut self.lines, &self.clock, self.gain.pulses())
        };
        let value = sign_extend_24(code);
        trace!(raw = value, "hx711 raw read");
        value
    }

    fn wait_ready(&mut self, timeout: Duration) -> Result<(), HwError> {
        let lines = &mut self.lines;
        wait_until_low_with_timeout(
            || lines.data_is_high(),
            timeout,
            READY_POLL_INTERVAL,
            &self.clock,
        )
    }
}

/// Clock out 24 data bits plus the gain-select pulses. Caller masks interrupts.
fn shift_in<L: SensorLines, C: Clock>(lines: &mut L, clock: &C, gain_pulses: u8) -> u32 {
    let mut code: u32 = 0;
    for _ in 0..DATA_BITS {
        lines.set_clock(true);
        clock.delay_us(PULSE_HOLD_US);
        code = (code << 1) | u32::from(lines.data_is_high());
        lines.set_clock(false);
        clock.delay_us(PULSE_HOLD_US);
    }
    for _ in 0..gain_pulses {
        lines.set_clock(true);
        clock.delay_us(PULSE_HOLD_US);
        lines.set_clock(false);
        clock.delay_us(PULSE_HOLD_US);
    }
    code
}

impl<L: SensorLines, C: Clock, I: CriticalSection> Scale for Hx711<L, C, I> {
    fn read(&mut self, timeout: Duration) -> Result<i32, BoxError> {
        Ok(self.read_raw_within(timeout))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case(0x7F_FFFF, RAIL_HIGH)]
    #[case(0x80_0000, RAIL_LOW)]
    #[case(0xFF_FFFF, -1)]
    #[case(0x00_0001, 1)]
    #[case(0x00_0000, 0)]
    fn sign_extension(#[case] code: u32, #[case] expected: i32) {
        assert_eq!(sign_extend_24(code), expected);
    }

    #[test]
    fn gain_pulse_mapping_round_trips() {
        for g in [Gain::A128, Gain::B32, Gain::A64] {
            assert_eq!(Gain::from_pulses(g.pulses()), Some(g));
        }
        assert_eq!(Gain::from_pulses(0), None);
        assert_eq!(Gain::from_pulses(4), None);
    }

    #[test]
    fn rails_are_detected() {
        assert!(is_rail(RAIL_HIGH));
        assert!(is_rail(RAIL_LOW));
        assert!(!is_rail(RAIL_HIGH - 1));
        assert!(!is_rail(0));
    }
}
