// SPDX-FileCopyrightText: 2024 Kent Gibson <warthog618@gmail.com>
//
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! A daemon that monitors GPIO lines and toggles LEDs on falling edges.

use anyhow::{bail, Context, Result};
use clap::Parser;
use ledmon::line::DEFAULT_CONSUMER;
use ledmon::{ActionDispatcher, Cdev, DbusLeds, LineEntry, Registry};
use log::{error, info, warn};
use std::path::PathBuf;
use std::process::ExitCode;
use std::rc::Rc;
use tokio::signal::unix::{signal, SignalKind};
use tokio::task::LocalSet;

mod config;
use config::Config;

#[tokio::main(flavor = "current_thread")]
async fn main() -> ExitCode {
    let opts = match Opts::try_parse() {
        Ok(opts) => opts,
        Err(e) => e.exit(),
    };
    let level = if opts.verbose { "debug" } else { "info" };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(level)).init();

    match run(&opts).await {
        Ok(true) => ExitCode::SUCCESS,
        Ok(false) => ExitCode::FAILURE,
        Err(e) => {
            if opts.verbose {
                error!("{e:#}");
            } else {
                error!("{e}");
            }
            ExitCode::FAILURE
        }
    }
}

#[derive(Debug, Parser)]
#[command(
    name = "ledmon",
    about = "Monitor GPIO lines and toggle LEDs over D-Bus on falling edges.",
    version
)]
struct Opts {
    /// The JSON file listing the lines to monitor
    #[arg(short, long, env = "LEDMON_CONFIG", value_name = "FILE")]
    config: PathBuf,

    /// The consumer label applied to the requested lines
    #[arg(short = 'C', long, default_value = DEFAULT_CONSUMER, value_name = "name")]
    consumer: String,

    /// Exit if any entry cannot be monitored, rather than monitoring the rest
    #[arg(long)]
    strict: bool,

    /// Provide more detailed logging and error messages
    #[arg(short, long)]
    verbose: bool,
}

// Returns false if some entries could not be monitored, or a monitor failed.
async fn run(opts: &Opts) -> Result<bool> {
    let cfg = Config::load_from_file(&opts.config, &opts.consumer)?;
    for e in &cfg.errors {
        error!("{e}");
    }
    if opts.strict && !cfg.errors.is_empty() {
        bail!("invalid entries in config file '{}'", opts.config.display());
    }
    let leds = DbusLeds::system()
        .await
        .context("cannot connect to the system bus")?;
    let dispatcher = Rc::new(ActionDispatcher::new(leds));
    let (idxs, entries): (Vec<usize>, Vec<LineEntry>) = cfg.entries.into_iter().unzip();
    let clean = LocalSet::new()
        .run_until(monitor(opts, dispatcher, entries, &idxs))
        .await?;
    Ok(succeeded(cfg.errors.len(), clean))
}

// The process fails if any entry was rejected, or any monitor failed.
fn succeeded(config_errors: usize, registry_clean: bool) -> bool {
    config_errors == 0 && registry_clean
}

// Runs until all monitors stop, or the process is signalled to terminate.
async fn monitor(
    opts: &Opts,
    dispatcher: Rc<ActionDispatcher<DbusLeds>>,
    entries: Vec<LineEntry>,
    idxs: &[usize],
) -> Result<bool> {
    let registry = Registry::start(&Cdev::default(), dispatcher, entries);
    if opts.strict {
        if let Some(f) = registry.failures().first() {
            bail!("entry {}: {}", idxs[f.index], f.error);
        }
    }
    for f in registry.failures() {
        warn!("entry {} not monitored: line {}", idxs[f.index], f.id);
    }
    if registry.is_empty() {
        bail!("no lines to monitor");
    }
    tokio::select! {
        _ = registry.run() => info!("all lines stopped"),
        res = shutdown() => {
            res.context("cannot wait for signals")?;
            info!("terminating");
        }
    }
    Ok(registry.is_clean())
}

async fn shutdown() -> std::io::Result<()> {
    let mut term = signal(SignalKind::terminate())?;
    tokio::select! {
        res = tokio::signal::ctrl_c() => res,
        _ = term.recv() => Ok(()),
    }
}
