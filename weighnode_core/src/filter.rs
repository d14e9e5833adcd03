//! Fixed-window moving average.

/// Circular buffer of the last `window` weights.
///
/// Until the buffer fills, the output is the mean of the samples seen so far,
/// so the first sample after a reset passes through unchanged.
#[derive(Debug, Clone)]
pub struct MovingAverage {
    buf: Vec<f32>,
    idx: usize,
    filled: usize,
}

impl MovingAverage {
    /// A window of 0 is treated as 1.
    pub fn new(window: usize) -> Self {
        Self {
            buf: vec![0.0; window.max(1)],
            idx: 0,
            filled: 0,
        }
    }

    /// Insert `x`, overwriting the oldest slot once full, and return the mean
    /// of the filled entries.
    pub fn push(&mut self, x: f32) -> f32 {
        let cap = self.buf.len();
        self.buf[self.idx] = x;
        self.idx = (self.idx + 1) % cap;
        if self.filled < cap {
            self.filled += 1;
        }
        self.mean()
    }

    /// Mean of the filled entries, or 0.0 when empty.
    pub fn mean(&self) -> f32 {
        if self.filled == 0 {
            return 0.0;
        }
        let sum: f64 = self.buf[..self.filled].iter().map(|&v| f64::from(v)).sum();
        (sum / self.filled as f64) as f32
    }

    pub fn reset(&mut self) {
        self.buf.iter_mut().for_each(|v| *v = 0.0);
        self.idx = 0;
        self.filled = 0;
    }

    pub fn len(&self) -> usize {
        self.filled
    }

    pub fn is_empty(&self) -> bool {
        self.filled == 0
    }

    pub fn window(&self) -> usize {
        self.buf.len()
    }
}
