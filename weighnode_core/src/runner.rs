//! Main loop driver.

use std::sync::atomic::{AtomicBool, Ordering};

use weighnode_traits::Clock;

use crate::error::Result;
use crate::node::Node;

/// Counters for one `run` call.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RunSummary {
    pub cycles: u64,
    pub events: u64,
    pub saturated: u64,
    pub retares: u64,
}

/// Run cycles until `shutdown` is set or `max_cycles` have completed.
///
/// Sleeps the per-cycle delay on the node's clock between cycles. The node
/// should already be booted.
pub fn run(node: &mut Node, shutdown: &AtomicBool, max_cycles: Option<u64>) -> Result<RunSummary> {
    let mut summary = RunSummary::default();
    tracing::info!(mode = ?node.config().runner.mode, max_cycles, "loop start");
    loop {
        if shutdown.load(Ordering::SeqCst) {
            tracing::info!(cycles = summary.cycles, "shutdown requested");
            break;
        }
        if max_cycles.is_some_and(|max| summary.cycles >= max) {
            break;
        }
        let report = node.run_cycle()?;
        summary.cycles += 1;
        if report.retared {
            summary.retares += 1;
        }
        if report.is_saturated() {
            summary.saturated += 1;
        }
        if report.event().is_some() {
            summary.events += 1;
        }
        node.clock().sleep(report.delay);
    }
    if let Some(link) = node.link() {
        let stats = link.stats();
        tracing::info!(
            sent = stats.sent,
            send_failures = stats.send_failures,
            tx_timeouts = stats.tx_timeouts,
            rx_timeouts = stats.rx_timeouts,
            rx_errors = stats.rx_errors,
            received = stats.received,
            ignored = stats.ignored,
            "link stats"
        );
    }
    tracing::info!(
        cycles = summary.cycles,
        events = summary.events,
        saturated = summary.saturated,
        "loop end"
    );
    Ok(summary)
}
