//! CLI argument definitions and shared statics.

use clap::{ArgAction, Parser, Subcommand, ValueEnum};
use std::path::PathBuf;
use std::sync::OnceLock;

pub static FILE_GUARD: OnceLock<tracing_appender::non_blocking::WorkerGuard> = OnceLock::new();
/// Whether the user asked for JSON output (controls structured error output).
pub static JSON_MODE: OnceLock<bool> = OnceLock::new();

#[derive(Parser, Debug)]
#[command(name = "weighnode", version, about = "Load-cell weigh node")]
pub struct Cli {
    /// Path to config TOML (typed)
    #[arg(long, value_name = "FILE", default_value = "etc/weighnode.toml")]
    pub config: PathBuf,

    /// Log as JSON lines instead of pretty
    #[arg(long, action = ArgAction::SetTrue)]
    pub json: bool,

    /// Console log level (error|warn|info|debug|trace); falls back to
    /// logging.level from the config, then info. RUST_LOG overrides both.
    #[arg(long = "log-level", value_name = "LEVEL")]
    pub log_level: Option<String>,

    /// Command to execute
    #[command(subcommand)]
    pub cmd: Commands,
}

/// Reporting mode override for `run`.
#[derive(Copy, Clone, Debug, Eq, PartialEq, ValueEnum)]
pub enum ModeArg {
    /// JSON event lines on stdout
    Serial,
    /// Weight reports over the radio link
    Radio,
}

/// Memory locking mode for `run --rt`.
#[derive(Copy, Clone, Debug, Eq, PartialEq, ValueEnum)]
pub enum RtLock {
    /// Do not lock memory
    None,
    /// Lock currently resident pages
    Current,
    /// Lock current and future pages
    All,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Boot the node and run the acquisition loop
    Run {
        /// Stop after this many cycles (default: run until Ctrl-C)
        #[arg(long, value_name = "N")]
        cycles: Option<u64>,
        /// Override runner.mode from the config
        #[arg(long, value_enum, value_name = "MODE")]
        mode: Option<ModeArg>,
        /// Print link and loop counters on exit
        #[arg(long, action = ArgAction::SetTrue)]
        stats: bool,
        /// Real-time mode for the whole process (SCHED_FIFO, CPU pinning, mlockall)
        #[arg(
            long,
            action = ArgAction::SetTrue,
            long_help = "Enable real-time mode (Linux only).\n\nRuns the process under SCHED_FIFO, pins it to one CPU and locks its pages with mlockall. The HX711 capture is raised to SCHED_FIFO on its own even without this flag; --rt also keeps the rest of the loop from being paged out or migrated. Needs CAP_SYS_NICE and CAP_IPC_LOCK (or root); failures are logged and the run continues."
        )]
        rt: bool,
        /// SCHED_FIFO priority for --rt (default: the system maximum)
        #[arg(long, value_name = "PRIO")]
        rt_prio: Option<i32>,
        /// Memory locking mode for --rt
        #[arg(long, value_enum, value_name = "MODE", default_value = "current")]
        rt_lock: RtLock,
        /// CPU index to pin to under --rt (default: 0)
        #[arg(long, value_name = "CPU")]
        rt_cpu: Option<usize>,
    },
    /// Settle, tare and print the resulting offset
    Tare {
        /// Raw reads to average (default: calibration.tare_samples)
        #[arg(long, value_name = "N")]
        samples: Option<u32>,
    },
    /// Decode a radio frame given as hex (id byte first)
    Decode {
        /// Frame bytes, e.g. 0177656967...; spaces and a 0x prefix are allowed
        #[arg(value_name = "HEX")]
        hex: String,
    },
    /// Quick health check (config valid, sensor answers)
    SelfCheck,
}
