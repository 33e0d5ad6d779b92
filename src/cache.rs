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

//! Persisted performance mode cache
//!
//! The firmware cannot be asked which mode it is in, so this record is the
//! only source of mode truth across restarts. It is written with a temp file
//! and an atomic rename; readers of the in-memory copy never see a half-updated
//! state.
//!
//! Record layout (JSON):
//!
//! ```json
//! {"cpu_mode": "Balanced", "gpu_mode": "Standard"}
//! ```
//!
//! Each field may also be a small integer: the mode's position in
//! `CpuMode::ALL` / `GpuMode::ALL`.

use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};

use parking_lot::{Mutex, RwLock};
use serde::Deserialize;
use serde_json::{json, Value};
use tracing::{debug, info, warn};

use crate::error::{AtkError, Result};
use crate::logger;
use crate::modes::{CpuMode, GpuMode, ModeState};

#[derive(Debug, Default, Deserialize)]
struct RawRecord {
    #[serde(default)]
    cpu_mode: Option<Value>,
    #[serde(default)]
    gpu_mode: Option<Value>,
}

pub struct ModeCacheStore {
    path: PathBuf,
    state: RwLock<ModeState>,
    persist: Mutex<()>,
}

impl ModeCacheStore {
    /// Open the store, loading the record once.
    pub fn open(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        let state = load(&path);
        Self {
            path,
            state: RwLock::new(state),
            persist: Mutex::new(()),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// The authoritative mode pair
    pub fn current(&self) -> ModeState {
        *self.state.read()
    }

    /// Make `state` authoritative and persist it.
    ///
    /// A persistence failure is returned but the in-memory state is kept: the
    /// hardware already changed.
    pub fn commit(&self, state: ModeState) -> Result<()> {
        let _guard = self.persist.lock();
        *self.state.write() = state;
        save(&self.path, &state)
    }
}

/// Read the record, falling back to [`ModeState::default`] when it is
/// missing or unreadable. Never fails.
pub fn load(path: &Path) -> ModeState {
    match read_record(path) {
        Ok(state) => {
            info!(
                "Loaded mode cache from {:?}: cpu={} gpu={}",
                path, state.cpu_mode, state.gpu_mode
            );
            state
        }
        Err(AtkError::Io(e)) if e.kind() == std::io::ErrorKind::NotFound => {
            debug!("No mode cache at {:?}, using defaults", path);
            ModeState::default()
        }
        Err(e) => {
            warn!("{}; using default modes", e);
            logger::log_event(
                "mode_cache_fallback",
                json!({ "path": path.display().to_string(), "error": e.to_string() }),
            );
            ModeState::default()
        }
    }
}

fn read_record(path: &Path) -> Result<ModeState> {
    let data = fs::read_to_string(path)?;
    let raw: RawRecord = serde_json::from_str(&data).map_err(|e| AtkError::CacheCorrupt {
        path: path.to_path_buf(),
        reason: e.to_string(),
    })?;

    let defaults = ModeState::default();
    let cpu_mode = field(path, "cpu_mode", raw.cpu_mode, &CpuMode::ALL, |s| s.parse().ok())
        .unwrap_or(defaults.cpu_mode);
    let gpu_mode = field(path, "gpu_mode", raw.gpu_mode, &GpuMode::ALL, |s| s.parse().ok())
        .unwrap_or(defaults.gpu_mode);
    Ok(ModeState { cpu_mode, gpu_mode })
}

fn field<T: Copy>(
    path: &Path,
    name: &str,
    value: Option<Value>,
    all: &[T],
    parse: impl Fn(&str) -> Option<T>,
) -> Option<T> {
    let parsed = match &value {
        None | Some(Value::Null) => return None,
        Some(Value::String(s)) => parse(s),
        Some(Value::Number(n)) => n
            .as_u64()
            .and_then(|i| usize::try_from(i).ok())
            .and_then(|i| all.get(i).copied()),
        Some(_) => None,
    };
    if parsed.is_none() {
        warn!("Unrecognized {} {:?} in {:?}, using default", name, value, path);
    }
    parsed
}

/// Write the record atomically (temp file, fsync, rename).
pub fn save(path: &Path, state: &ModeState) -> Result<()> {
    let persist_err = |source| AtkError::CachePersist {
        path: path.to_path_buf(),
        source,
    };

    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            fs::create_dir_all(parent).map_err(persist_err)?;
        }
    }

    let json = serde_json::to_string_pretty(state)?;
    let temp_path = path.with_extension("json.tmp");

    let mut file = fs::File::create(&temp_path).map_err(persist_err)?;
    file.write_all(json.as_bytes()).map_err(persist_err)?;
    file.sync_all().map_err(persist_err)?;
    drop(file);

    fs::rename(&temp_path, path).map_err(|e| {
        let _ = fs::remove_file(&temp_path);
        persist_err(e)
    })?;

    debug!("Saved mode cache to {:?}", path);
    Ok(())
}
