/*
 * This file is part of atkmon.
 *
 * Copyright (C) 2025 atkmon contributors
 *
 * atkmon is free software: you can redistribute it and/or modify
 * it under the terms of the GNU General Public License as published by
 * the Free Software Foundation, either version 3 of the License, or
 * (at your option) any later version.
 *
 * atkmon is distributed in the hope that it will be useful,
 * but WITHOUT ANY WARRANTY; without even the implied warranty of
 * MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE. See the
 * GNU General Public License for more details.
 *
 * You should have received a copy of the GNU General Public License
 * along with atkmon. If not, see <https://www.gnu.org/licenses/>.
 */

use std::path::PathBuf;
use std::process;

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use serde::Serialize;
use serde_json::json;
use tracing::warn;

use atkmon::constants::paths;
use atkmon::{config, logger, system, CpuMode, GpuModeRequest, SetModesRequest, TelemetryService};

#[derive(Parser, Debug)]
#[command(name = "atkmon")]
#[command(version)]
#[command(about = "Telemetry and performance modes for ASUS ATK laptops")]
#[command(long_about = "Telemetry and performance modes for ASUS ATK laptops

EXAMPLES:
    atkmon                             Print a telemetry snapshot (default)
    atkmon modes                       Print the cached performance modes
    atkmon set --cpu turbo --gpu eco   Change performance modes
    atkmon dump                        Raw device and sensor diagnostics

ENVIRONMENT VARIABLES:
    RUST_LOG=debug         Override the configured log level

FILES:
    ~/.config/atkmon/config.json          User configuration
    /etc/atkmon/config.json               System configuration
    ~/.local/state/atkmon/mode_cache.json Cached performance modes")]
struct Cli {
    /// Configuration file (overrides the default search path)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Append structured events to the event log
    #[arg(long, global = true)]
    logging: bool,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand, Debug, PartialEq)]
enum Commands {
    /// Print a telemetry snapshot as JSON (default)
    Snapshot,

    /// Print the current performance modes
    Modes,

    /// Change CPU and/or GPU performance mode
    Set(SetArgs),

    /// Print raw device and sensor diagnostics
    Dump,
}

#[derive(Args, Debug, PartialEq)]
#[command(group = clap::ArgGroup::new("mode").required(true).multiple(true))]
struct SetArgs {
    /// silent | balanced | turbo | performance
    #[arg(long, group = "mode")]
    cpu: Option<CpuMode>,

    /// eco | standard (ultimate is rejected)
    #[arg(long, group = "mode")]
    gpu: Option<GpuModeRequest>,
}

impl From<SetArgs> for SetModesRequest {
    fn from(args: SetArgs) -> Self {
        SetModesRequest {
            cpu_mode: args.cpu,
            gpu_mode: args.gpu,
        }
    }
}

fn print_json<T: Serialize>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    logger::init_tracing(logger::DEFAULT_LEVEL);
    let cfg = config::load_config(cli.config.as_deref()).context("loading configuration")?;
    logger::set_level(&cfg.logging.level);

    let event_log = match (&cfg.logging.event_log, cli.logging) {
        (Some(path), _) => Some(path.clone()),
        (None, true) => Some(paths::default_state_dir().join("events.json")),
        (None, false) => None,
    };
    if let Some(path) = event_log {
        if let Err(e) = logger::init_event_log(&path) {
            warn!("Event log {:?} unavailable: {}", path, e);
        }
        let args: Vec<String> = std::env::args().collect();
        logger::log_event("startup", json!({ "args": args }));
    }

    if cfg!(unix) && !system::is_elevated() {
        warn!("Not running as root: the ATK device and some sensors will be unavailable");
    }

    let service = TelemetryService::from_config(&cfg)?;
    let result = match cli.command.unwrap_or(Commands::Snapshot) {
        Commands::Snapshot => print_json(&service.get_snapshot()),
        Commands::Modes => print_json(&service.current_modes()),
        Commands::Dump => print_json(&service.raw_sensor_dump()),
        Commands::Set(args) => service
            .set_modes(args.into())
            .map_err(anyhow::Error::from)
            .and_then(|state| print_json(&state)),
    };

    if let Err(err) = result {
        eprintln!("error: {err}");
        logger::log_event("fatal_error", json!({ "error": err.to_string() }));
        logger::close_event_log();
        process::exit(1);
    }
    logger::close_event_log();
    Ok(())
}
