//! Correlation tokens for stability events.
//!
//! Tokens are UUID-shaped but not random: they mix the millisecond tick with
//! a per-boot counter through two linear congruential steps. They only need
//! to distinguish sessions on the receiving side.

use std::fmt;

/// 36-character `8-4-4-4-12` hex token.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct EventToken(String);

impl EventToken {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for EventToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[derive(Debug, Clone, Default)]
pub struct TokenGenerator {
    counter: u32,
}

impl TokenGenerator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of tokens handed out so far.
    pub fn issued(&self) -> u32 {
        self.counter
    }

    /// Derive the next token from `tick_ms` and the running counter.
    pub fn next_token(&mut self, tick_ms: u32) -> EventToken {
        let counter = self.counter;
        self.counter = self.counter.wrapping_add(1);
        EventToken(derive(tick_ms, counter))
    }
}

fn derive(tick: u32, counter: u32) -> String {
    let r1 = tick.wrapping_mul(1_103_515_245).wrapping_add(12_345) & 0x7FFF_FFFF;
    let r2 = counter.wrapping_mul(1_664_525).wrapping_add(1_013_904_223) & 0x7FFF_FFFF;
    format!(
        "{:08x}-{:04x}-{:04x}-{:04x}-{:08x}{:04x}",
        tick,
        counter & 0xFFFF,
        (r1 >> 16) & 0xFFFF,
        r2 & 0xFFFF,
        r1,
        r2 >> 16
    )
}
