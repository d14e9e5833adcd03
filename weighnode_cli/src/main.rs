#![cfg_attr(all(not(debug_assertions), not(test)), deny(warnings))]
#![cfg_attr(not(test), deny(clippy::unwrap_used, clippy::expect_used))]
//! `weighnode` command line: run the node, tare, decode frames, self-check.

mod cli;
mod error_fmt;
mod hw;
#[cfg(unix)]
mod retare;
mod rt;
mod run;

use std::path::Path;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use clap::Parser;
use eyre::WrapErr;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{EnvFilter, fmt};

use crate::cli::{Cli, Commands, FILE_GUARD, JSON_MODE};
use crate::error_fmt::{exit_code_for_error, format_error_json, humanize};

fn main() {
    let cli = Cli::parse();
    let _ = JSON_MODE.set(cli.json);
    if !cli.json {
        let _ = color_eyre::install();
    }
    if let Err(e) = real_main(cli) {
        let code = exit_code_for_error(&e);
        if JSON_MODE.get().copied().unwrap_or(false) {
            eprintln!("{}", format_error_json(&e));
        } else {
            eprintln!("error: {e:#}\n{}", humanize(&e));
        }
        std::process::exit(code);
    }
}

fn real_main(cli: Cli) -> eyre::Result<()> {
    if let Commands::Decode { hex } = &cli.cmd {
        init_tracing(&cli, None);
        return run::cmd_decode(hex, cli.json);
    }

    let cfg = match run::load_config(&cli.config) {
        Ok(cfg) => cfg,
        Err(e) => {
            init_tracing(&cli, None);
            return Err(e);
        }
    };
    init_tracing(&cli, Some(&cfg.logging));
    tracing::debug!(config = %cli.config.display(), "config loaded");

    match cli.cmd {
        Commands::Run {
            cycles,
            mode,
            stats,
            rt,
            rt_prio,
            rt_lock,
            rt_cpu,
        } => {
            if rt {
                rt::setup_rt_once(rt_prio, rt_lock, rt_cpu);
            }
            let shutdown = Arc::new(AtomicBool::new(false));
            let flag = Arc::clone(&shutdown);
            ctrlc::set_handler(move || flag.store(true, Ordering::SeqCst))
                .wrap_err("install Ctrl-C handler")?;
            #[cfg(unix)]
            let tare = Some(retare::install()?);
            #[cfg(not(unix))]
            let tare = None;
            run::cmd_run(&cfg, cycles, mode, stats, cli.json, &shutdown, tare)
        }
        Commands::Tare { samples } => run::cmd_tare(&cfg, samples, cli.json),
        Commands::SelfCheck => run::cmd_self_check(&cfg),
        Commands::Decode { .. } => Ok(()),
    }
}

/// Console logs go to stderr; stdout carries event lines and command output.
fn init_tracing(cli: &Cli, logging: Option<&weighnode_config::Logging>) {
    let level = cli
        .log_level
        .clone()
        .or_else(|| logging.and_then(|l| l.level.clone()))
        .unwrap_or_else(|| "info".to_string());
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(&level))
        .unwrap_or_else(|_| EnvFilter::new("info"));

    let (pretty, json) = if cli.json {
        (None, Some(fmt::layer().json().with_writer(std::io::stderr)))
    } else {
        (
            Some(fmt::layer().with_target(false).with_writer(std::io::stderr)),
            None,
        )
    };

    let file = logging
        .and_then(|l| l.file.as_deref().map(|f| (f, l.rotation.as_deref())))
        .map(|(path, rotation)| {
            let path = Path::new(path);
            let dir = path
                .parent()
                .filter(|p| !p.as_os_str().is_empty())
                .unwrap_or_else(|| Path::new("."));
            let name = path
                .file_name()
                .map_or_else(|| "weighnode.log".into(), |n| n.to_os_string());
            let appender = match rotation.unwrap_or("never") {
                "daily" => tracing_appender::rolling::daily(dir, name),
                "hourly" => tracing_appender::rolling::hourly(dir, name),
                _ => tracing_appender::rolling::never(dir, name),
            };
            let (writer, guard) = tracing_appender::non_blocking(appender);
            let _ = FILE_GUARD.set(guard);
            fmt::layer().json().with_ansi(false).with_writer(writer)
        });

    // A second init (e.g. in tests) keeps the first subscriber.
    let _ = tracing_subscriber::registry()
        .with(filter)
        .with(pretty)
        .with(json)
        .with(file)
        .try_init();
}
