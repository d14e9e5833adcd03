//! Human-readable error descriptions and structured JSON error formatting.

use weighnode_core::error::{BuildError, NodeError};

/// Map an eyre::Report to a human-readable explanation with likely causes and fix hints.
pub fn humanize(err: &eyre::Report) -> String {
    // Typed matches first
    if let Some(be) = err.downcast_ref::<BuildError>() {
        return match be {
            BuildError::MissingScale => {
                "What happened: No scale was provided to the node.\nLikely causes: The sensor backend failed to initialize or was not wired into the builder.\nHow to fix: Ensure the HX711 is created successfully and passed via with_scale(...).".to_string()
            }
            BuildError::MissingRadio => {
                "What happened: Radio mode was selected but no transceiver was provided.\nLikely causes: runner.mode = \"radio\" without a radio backend.\nHow to fix: Use --mode serial or wire a transceiver via with_radio(...).".to_string()
            }
            BuildError::InvalidConfig(msg) => format!(
                "What happened: Invalid configuration ({msg}).\nLikely causes: Out-of-range values in the TOML.\nHow to fix: Edit the config file, then rerun. See etc/weighnode.toml for a sample."
            ),
        };
    }

    if let Some(ne) = err.downcast_ref::<NodeError>() {
        return match ne {
            NodeError::SensorTimeout => "What happened: Scale read timed out.\nLikely causes: HX711 not wired correctly, no power/ground, or timeout too low.\nHow to fix: Verify DT/SCK pins and power, and consider increasing sensor.ready_timeout_ms in the config.".to_string(),
            NodeError::SensorSaturation(raw) => format!(
                "What happened: Every sample was at full scale (raw {raw}).\nLikely causes: Overloaded cell, swapped excitation wires, or a floating input.\nHow to fix: Remove the load and check the bridge wiring, then tare again."
            ),
            NodeError::HardwareFault(msg) => format!(
                "What happened: Failed to access hardware pins ({msg}).\nLikely causes: Incorrect pin numbers or insufficient GPIO permissions.\nHow to fix: Fix the [pins] values in the config; ensure the process has permission to access GPIO."
            ),
            NodeError::MalformedPacket(msg) => format!(
                "What happened: The frame could not be decoded ({msg}).\nLikely causes: Truncated capture, wrong channel, or a payload that is not a weight report.\nHow to fix: Pass the full frame as hex, id byte first, e.g. 0177656967..."
            ),
            NodeError::Config(msg) => format!(
                "What happened: Configuration is invalid or unreadable ({msg}).\nLikely causes: Missing file, TOML syntax error, or out-of-range values.\nHow to fix: Edit the TOML config and try again."
            ),
            // Fallback to generic for other domain errors
            other => format!(
                "What happened: {other}.\nLikely causes: See logs.\nHow to fix: Re-run with --log-level=debug or set RUST_LOG for more detail."
            ),
        };
    }

    // String-based heuristics for errors coming from init
    let msg = err.to_string();
    let lower = msg.to_ascii_lowercase();

    if lower.contains("open hx711 pins") {
        return "What happened: Failed to initialize hardware pins.\nLikely causes: Incorrect pin numbers or insufficient GPIO permissions.\nHow to fix: Fix the [pins] values in the config; ensure the process has permission to access GPIO.".to_string();
    }

    // Generic fallback
    let mut cause = String::new();
    if let Some(src) = err.source() {
        cause = format!(" Cause: {src}");
    }
    format!(
        "Something went wrong.{cause}\nHow to fix: Re-run with --log-level=debug for details. Original: {msg}"
    )
}

/// Stable name for the error class, used as the JSON `reason`.
pub fn reason_name(err: &eyre::Report) -> &'static str {
    if let Some(be) = err.downcast_ref::<BuildError>() {
        return match be {
            BuildError::MissingScale => "MissingScale",
            BuildError::MissingRadio => "MissingRadio",
            BuildError::InvalidConfig(_) => "InvalidConfig",
        };
    }
    match err.downcast_ref::<NodeError>() {
        Some(NodeError::Config(_)) => "Config",
        Some(NodeError::SensorTimeout) => "SensorTimeout",
        Some(NodeError::SensorSaturation(_)) => "SensorSaturation",
        Some(NodeError::MalformedPacket(_) | NodeError::PayloadTooLarge { .. }) => "MalformedPacket",
        Some(NodeError::Hardware(_) | NodeError::HardwareFault(_)) => "Hardware",
        Some(NodeError::Io(_)) => "Io",
        _ => "Error",
    }
}

/// Map error classes to stable exit codes; anything unclassified returns 1.
pub fn exit_code_for_error(err: &eyre::Report) -> i32 {
    match reason_name(err) {
        "Config" | "InvalidConfig" | "MissingScale" | "MissingRadio" => 3,
        "SensorTimeout" | "SensorSaturation" => 4,
        "MalformedPacket" => 5,
        "Hardware" | "Io" => 6,
        _ => 1,
    }
}

/// Structured JSON for errors when --json is enabled.
pub fn format_error_json(err: &eyre::Report) -> String {
    use serde_json::json;

    let mut obj = json!({ "reason": reason_name(err), "message": humanize(err) });
    if let Some(NodeError::SensorSaturation(raw)) = err.downcast_ref::<NodeError>() {
        obj["details"] = json!({ "raw": raw });
    }
    obj.to_string()
}
