//! Subcommand execution: config loading, node assembly and the main loop.

use std::path::Path;
use std::sync::Arc;
use std::sync::atomic::AtomicBool;
use std::time::Duration;

use eyre::WrapErr;
use serde_json::json;
use weighnode_config::Config;
use weighnode_core::error::{NodeError, Result};
use weighnode_core::packet;
use weighnode_core::runner::{self, RunSummary};
use weighnode_core::{Node, NodeCfg, ReportMode, TareRequest, WeightReport};
use weighnode_hardware::SimulatedRadio;
use weighnode_traits::Scale;

use crate::cli::ModeArg;
use crate::hw;

/// Read, parse and validate the TOML config. Every failure is a
/// `NodeError::Config`.
pub fn load_config(path: &Path) -> Result<Config> {
    let text = std::fs::read_to_string(path)
        .map_err(|e| NodeError::Config(format!("read {}: {e}", path.display())))?;
    let cfg = weighnode_config::load_toml(&text)
        .map_err(|e| NodeError::Config(format!("parse {}: {e}", path.display())))?;
    cfg.validate()
        .map_err(|e| NodeError::Config(format!("invalid configuration: {e}")))?;
    Ok(cfg)
}

fn build_node(
    cfg: &Config,
    mode: Option<ModeArg>,
    tare: Option<TareRequest>,
) -> Result<(Node, Option<SimulatedRadio>)> {
    let mut node_cfg = NodeCfg::from(cfg);
    if let Some(m) = mode {
        node_cfg.runner.mode = match m {
            ModeArg::Serial => ReportMode::Serial,
            ModeArg::Radio => ReportMode::Radio,
        };
    }
    let scale = hw::make_scale(cfg)?;
    let radio_mode = node_cfg.runner.mode == ReportMode::Radio;
    let mut builder = Node::builder().with_config(node_cfg);
    if let Some(req) = tare {
        builder = builder.with_tare_request(req);
    }
    let mut handle = None;
    if radio_mode {
        let (sim, radio, events) = hw::make_radio();
        builder = builder.with_radio(radio, events);
        handle = Some(sim);
    }
    let node = builder.with_scale(scale).build().wrap_err("assemble node")?;
    Ok((node, handle))
}

pub fn cmd_run(
    cfg: &Config,
    cycles: Option<u64>,
    mode: Option<ModeArg>,
    stats: bool,
    json_out: bool,
    shutdown: &Arc<AtomicBool>,
    tare: Option<TareRequest>,
) -> Result<()> {
    let (mut node, radio) = build_node(cfg, mode, tare)?;
    node.boot().wrap_err("boot")?;
    let summary = runner::run(&mut node, shutdown, cycles)?;
    if stats {
        print_stats(&node, &summary, radio.as_ref(), json_out);
    }
    Ok(())
}

fn print_stats(node: &Node, summary: &RunSummary, radio: Option<&SimulatedRadio>, json_out: bool) {
    let link = node.link().map(|l| l.stats());
    if json_out {
        let mut obj = json!({
            "cycles": summary.cycles,
            "events": summary.events,
            "saturated": summary.saturated,
            "retares": summary.retares,
        });
        if let Some(s) = link {
            obj["link"] = json!({
                "sent": s.sent,
                "send_failures": s.send_failures,
                "tx_timeouts": s.tx_timeouts,
                "rx_timeouts": s.rx_timeouts,
                "rx_errors": s.rx_errors,
                "received": s.received,
                "ignored": s.ignored,
            });
        }
        eprintln!("{obj}");
        return;
    }
    eprintln!(
        "cycles={} events={} saturated={} retares={}",
        summary.cycles, summary.events, summary.saturated, summary.retares
    );
    if let Some(s) = link {
        let frames = radio.map_or(0, |r| r.sent().len());
        eprintln!(
            "sent={} send_failures={} tx_timeouts={} frames_on_air={frames}",
            s.sent, s.send_failures, s.tx_timeouts
        );
    }
}

pub fn cmd_tare(cfg: &Config, samples: Option<u32>, json_out: bool) -> Result<()> {
    let mut cfg = cfg.clone();
    if let Some(n) = samples {
        if n == 0 {
            return Err(NodeError::Config("--samples must be >= 1".into()).into());
        }
        cfg.calibration.tare_samples = n;
    }
    let (mut node, _) = build_node(&cfg, Some(ModeArg::Serial), None)?;
    let offset = node.boot().wrap_err("tare")?;
    let scale = node.calibration().scale;
    if json_out {
        println!("{}", json!({ "offset": offset, "scale": scale }));
    } else {
        println!("offset={offset} scale={scale}");
    }
    Ok(())
}

/// Hex digits with optional `0x` prefix and whitespace.
pub fn parse_hex(s: &str) -> std::result::Result<Vec<u8>, NodeError> {
    let digits: String = s
        .trim()
        .trim_start_matches("0x")
        .chars()
        .filter(|c| !c.is_whitespace())
        .collect();
    if !digits.is_ascii() {
        return Err(NodeError::MalformedPacket("non-hex characters".into()));
    }
    if digits.len() % 2 != 0 {
        return Err(NodeError::MalformedPacket("odd number of hex digits".into()));
    }
    (0..digits.len())
        .step_by(2)
        .map(|i| {
            u8::from_str_radix(&digits[i..i + 2], 16)
                .map_err(|_| NodeError::MalformedPacket(format!("bad hex at offset {i}")))
        })
        .collect()
}

pub fn cmd_decode(hex: &str, json_out: bool) -> Result<()> {
    let bytes = parse_hex(hex)?;
    let pkt = packet::decode(&bytes)?;
    let report = WeightReport::parse(pkt.payload_text()?)?;
    if json_out {
        println!(
            "{}",
            json!({
                "id": pkt.id,
                "weight": report.weight,
                "liquid_detected": report.liquid_detected,
            })
        );
    } else {
        println!(
            "id=0x{:02x} weight={:.3} liquid_detected={}",
            pkt.id, report.weight, report.liquid_detected
        );
    }
    Ok(())
}

pub fn cmd_self_check(cfg: &Config) -> Result<()> {
    let mut scale = hw::make_scale(cfg)?;
    let raw = scale
        .read(Duration::from_millis(cfg.sensor.ready_timeout_ms))
        .map_err(|e| eyre::Report::new(weighnode_core::hw_error::map_hw_error(&*e)))
        .wrap_err("sensor read")?;
    if raw == 0 {
        return Err(NodeError::SensorTimeout).wrap_err("sensor did not answer");
    }
    println!("self-check ok: raw={raw}");
    Ok(())
}
