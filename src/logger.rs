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

//! Logging setup
//!
//! Diagnostics go through `tracing`. Mode changes and hardware fallbacks are
//! additionally appended as JSON lines to an optional event log so that a
//! history survives the process.

use std::fs::{self, File, OpenOptions};
use std::io::Write;
use std::path::Path;
use std::sync::Mutex;
use std::time::{SystemTime, UNIX_EPOCH};

use lazy_static::lazy_static;
use serde_json::{json, Value};
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{fmt, reload, EnvFilter, Registry};

/// Level used until the configuration has been read
pub const DEFAULT_LEVEL: &str = "info";

lazy_static! {
    static ref LOG_FILE: Mutex<Option<File>> = Mutex::new(None);
    static ref FILTER: Mutex<Option<reload::Handle<EnvFilter, Registry>>> = Mutex::new(None);
}

fn now_millis() -> u128 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis())
        .unwrap_or(0)
}

/// Install the stderr subscriber. `RUST_LOG` takes precedence over `level`.
///
/// The filter stays reloadable so [`set_level`] can apply the configured level
/// once the config file has been read.
pub fn init_tracing(level: &str) {
    let (filter, handle) = reload::Layer::new(initial_filter(level));
    // A second init (tests, embedding hosts) keeps the first subscriber.
    let installed = tracing_subscriber::registry()
        .with(filter)
        .with(
            fmt::layer()
                .with_target(false)
                .with_level(true)
                .with_writer(std::io::stderr),
        )
        .try_init()
        .is_ok();
    if installed {
        if let Ok(mut guard) = FILTER.lock() {
            *guard = Some(handle);
        }
    }
}

/// Switch the installed subscriber to `level`. Ignored when `RUST_LOG` is
/// set or tracing was not initialised here.
pub fn set_level(level: &str) -> bool {
    if std::env::var_os("RUST_LOG").is_some() {
        return false;
    }
    let Ok(guard) = FILTER.lock() else { return false };
    match guard.as_ref() {
        Some(handle) => handle.reload(EnvFilter::new(level)).is_ok(),
        None => false,
    }
}

fn initial_filter(level: &str) -> EnvFilter {
    EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level))
}

/// Open the JSON event log in append mode.
pub fn init_event_log(path: &Path) -> std::io::Result<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }
    let file = OpenOptions::new().create(true).append(true).open(path)?;
    if let Ok(mut guard) = LOG_FILE.lock() {
        *guard = Some(file);
    }
    Ok(())
}

/// Stop writing events and release the file
pub fn close_event_log() {
    if let Ok(mut guard) = LOG_FILE.lock() {
        *guard = None;
    }
}

/// Append one event. No-op if the event log is not open.
pub fn log_event(event: &str, data: Value) {
    let Ok(mut guard) = LOG_FILE.lock() else { return };
    let Some(f) = guard.as_mut() else { return };
    let line = json!({
        "ts_ms": now_millis(),
        "event": event,
        "data": data,
    });
    let _ = writeln!(f, "{}", line);
}
