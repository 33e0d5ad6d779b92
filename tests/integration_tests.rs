/*
 * Integration tests for atkmon
 *
 * These drive the public service surface with a simulated ATK firmware and
 * check the behaviour across the device channel, mode cache, readers and
 * snapshot aggregation.
 */

use std::collections::HashMap;
use std::path::Path;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use parking_lot::Mutex;
use serial_test::serial;
use tempfile::TempDir;

use atkmon::cache::{self, ModeCacheStore};
use atkmon::config;
use atkmon::device::{DeviceAccess, DeviceRequest, DeviceTransport};
use atkmon::metrics::OsMetricsReader;
use atkmon::logger;
use atkmon::platform::DeviceTable;
use atkmon::sensors::{names, SensorHub, SensorLibrary, SensorValue};
use atkmon::thermal::{fan_rpm_from_status, percent_of_max};
use atkmon::{AtkError, CpuMode, GpuMode, GpuModeRequest, ModeState, SetModesRequest, TelemetryService};

/// Firmware double: fan statuses are fixed, the CPU mode read-back is stuck
/// at "Performance" whatever was written, and every call is counted.
struct SimulatedFirmware {
    status: HashMap<u32, u32>,
    calls: Arc<AtomicUsize>,
    write_delay: Duration,
}

impl SimulatedFirmware {
    fn new(table: &DeviceTable) -> Self {
        let mut status = HashMap::new();
        status.insert(table.devices.cpu_fan, 0x0001_0021); // 3300 rpm
        status.insert(table.devices.gpu_fan, 0x0001_0063); // 9900 rpm
        status.insert(table.devices.cpu_mode, 0x0001_0003); // Performance
        Self {
            status,
            calls: Arc::new(AtomicUsize::new(0)),
            write_delay: Duration::ZERO,
        }
    }
}

impl DeviceTransport for SimulatedFirmware {
    fn call(&mut self, request: DeviceRequest) -> atkmon::Result<u32> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        match request.payload {
            Some(_) => {
                thread::sleep(self.write_delay);
                Ok(1)
            }
            None => self
                .status
                .get(&request.device_id)
                .copied()
                .ok_or_else(|| AtkError::device_io(request.device_id, "unknown device")),
        }
    }

    fn describe(&self) -> String {
        "simulated firmware".to_string()
    }
}

struct StaticSensors(Vec<SensorValue>);

impl SensorLibrary for StaticSensors {
    fn name(&self) -> &str {
        "static"
    }

    fn read(&self) -> atkmon::Result<Vec<SensorValue>> {
        Ok(self.0.clone())
    }
}

fn service_with(dir: &Path, device: DeviceAccess, sensors: SensorHub) -> TelemetryService {
    TelemetryService::from_parts(
        device,
        DeviceTable::default(),
        ModeCacheStore::open(dir.join("mode_cache.json")),
        sensors,
        OsMetricsReader::with_power_supply_root(None, dir.join("no_power_supply")),
    )
}

fn simulated_service(dir: &Path) -> (TelemetryService, Arc<AtomicUsize>) {
    let firmware = SimulatedFirmware::new(&DeviceTable::default());
    let calls = firmware.calls.clone();
    let svc = service_with(
        dir,
        DeviceAccess::from_transport(Box::new(firmware)),
        SensorHub::default(),
    );
    (svc, calls)
}

#[test]
fn test_set_modes_survive_fixed_readback() {
    let dir = TempDir::new().unwrap();
    let (svc, _) = simulated_service(dir.path());

    for state in ModeState::all() {
        let res = svc
            .set_modes(SetModesRequest {
                cpu_mode: Some(state.cpu_mode),
                gpu_mode: Some(state.gpu_mode.into()),
            })
            .unwrap();
        assert_eq!(res, state);
        assert_eq!(svc.current_modes(), state);
        assert_eq!(svc.get_snapshot().modes, Some(state));
        assert_eq!(
            svc.raw_sensor_dump().modes.firmware_cpu_mode,
            Some(CpuMode::Performance)
        );
    }
}

#[test]
fn test_unspecified_dimension_unchanged() {
    let dir = TempDir::new().unwrap();
    let (svc, _) = simulated_service(dir.path());

    svc.set_modes(SetModesRequest {
        cpu_mode: Some(CpuMode::Silent),
        gpu_mode: Some(GpuModeRequest::Eco),
    })
    .unwrap();
    let res = svc
        .set_modes(SetModesRequest {
            cpu_mode: Some(CpuMode::Turbo),
            gpu_mode: None,
        })
        .unwrap();
    assert_eq!(res, ModeState::new(CpuMode::Turbo, GpuMode::Eco));
}

#[test]
fn test_modes_persist_across_restart() {
    let dir = TempDir::new().unwrap();
    for state in ModeState::all() {
        {
            let (svc, _) = simulated_service(dir.path());
            svc.set_modes(SetModesRequest {
                cpu_mode: Some(state.cpu_mode),
                gpu_mode: Some(state.gpu_mode.into()),
            })
            .unwrap();
        }
        let (restarted, _) = simulated_service(dir.path());
        assert_eq!(restarted.current_modes(), state);
    }
}

#[test]
fn test_corrupt_cache_starts_from_default() {
    let dir = TempDir::new().unwrap();
    std::fs::write(dir.path().join("mode_cache.json"), "{\"cpu_mode\": \"Tur").unwrap();
    let (svc, _) = simulated_service(dir.path());
    assert_eq!(svc.current_modes(), ModeState::default());
    assert_eq!(
        svc.current_modes(),
        ModeState::new(CpuMode::Balanced, GpuMode::Standard)
    );
}

#[test]
fn test_ultimate_rejected_without_device_call() {
    let dir = TempDir::new().unwrap();
    let (svc, calls) = simulated_service(dir.path());
    let before = svc.current_modes();

    let res = svc.set_modes(SetModesRequest {
        cpu_mode: Some(CpuMode::Turbo),
        gpu_mode: Some(GpuModeRequest::Ultimate),
    });
    assert!(matches!(res, Err(AtkError::UnsupportedModeTransition(_))));
    assert_eq!(calls.load(Ordering::SeqCst), 0);
    assert_eq!(svc.current_modes(), before);
    assert!(!dir.path().join("mode_cache.json").exists());
}

#[test]
fn test_snapshot_without_device() {
    let dir = TempDir::new().unwrap();
    let sensors = SensorHub::new(vec![Box::new(StaticSensors(vec![SensorValue::temperature(
        "cpu",
        names::CPU_PACKAGE,
        66.0,
    )]))]);
    let svc = service_with(dir.path(), DeviceAccess::Unavailable("no ATK driver".into()), sensors);

    let snap = svc.get_snapshot();
    assert!(snap.system.is_some());
    assert!(snap.cpu.is_some());
    assert!(snap.network.is_some());
    assert!(snap.modes.is_none());
    assert_eq!(snap.thermal.cpu_fan_rpm, None);
    assert_eq!(snap.thermal.cpu_fan_percent, None);
    assert_eq!(snap.thermal.gpu_fan_rpm, None);
    // sensors are independent of the device
    assert_eq!(snap.thermal.cpu_package_temp_celsius, Some(66.0));

    assert!(matches!(
        svc.set_modes(SetModesRequest {
            cpu_mode: Some(CpuMode::Silent),
            gpu_mode: None,
        }),
        Err(AtkError::DeviceUnavailable(_))
    ));
    let dump = svc.raw_sensor_dump();
    assert!(!dump.device.available);
    assert!(dump.device.readings.is_empty());
}

#[test]
fn test_snapshot_fan_percentages() {
    let dir = TempDir::new().unwrap();
    let (svc, _) = simulated_service(dir.path());
    let thermal = svc.get_snapshot().thermal;
    assert_eq!(thermal.cpu_fan_rpm, Some(3300));
    assert_eq!(thermal.cpu_fan_percent, Some(50.0));
    assert_eq!(thermal.gpu_fan_rpm, Some(9900));
    assert_eq!(thermal.gpu_fan_percent, Some(100.0));
}

#[test]
fn test_snapshot_json_shape() {
    let dir = TempDir::new().unwrap();
    let (svc, _) = simulated_service(dir.path());
    let json = serde_json::to_value(svc.get_snapshot()).unwrap();
    for section in ["system", "cpu", "memory", "disk", "network", "thermal", "modes", "battery"] {
        assert!(json.get(section).is_some(), "missing section {}", section);
    }
    assert_eq!(json["modes"]["cpu_mode"], "Balanced");
    assert_eq!(json["modes"]["gpu_mode"], "Standard");
    assert!(json["thermal"]["gpu_core_temp_celsius"].is_null());
}

#[test]
#[serial]
fn test_concurrent_snapshots_see_whole_states() {
    let dir = TempDir::new().unwrap();
    let mut firmware = SimulatedFirmware::new(&DeviceTable::default());
    firmware.write_delay = Duration::from_millis(2);
    let svc = Arc::new(service_with(
        dir.path(),
        DeviceAccess::from_transport(Box::new(firmware)),
        SensorHub::default(),
    ));

    // Each request flips both dimensions; a reader must never see one half
    // of a request applied.
    let a = ModeState::new(CpuMode::Silent, GpuMode::Eco);
    let b = ModeState::new(CpuMode::Turbo, GpuMode::Standard);
    svc.set_modes(SetModesRequest {
        cpu_mode: Some(a.cpu_mode),
        gpu_mode: Some(a.gpu_mode.into()),
    })
    .unwrap();

    let done = Arc::new(AtomicBool::new(false));
    let seen = Arc::new(Mutex::new(Vec::new()));
    let readers: Vec<_> = (0..4)
        .map(|i| {
            let svc = svc.clone();
            let done = done.clone();
            let seen = seen.clone();
            thread::spawn(move || {
                while !done.load(Ordering::SeqCst) {
                    let modes = if i % 2 == 0 {
                        svc.get_snapshot().modes.unwrap()
                    } else {
                        svc.current_modes()
                    };
                    seen.lock().push(modes);
                    thread::sleep(Duration::from_micros(200));
                }
            })
        })
        .collect();

    for i in 0..20 {
        let target = if i % 2 == 0 { b } else { a };
        svc.set_modes(SetModesRequest {
            cpu_mode: Some(target.cpu_mode),
            gpu_mode: Some(target.gpu_mode.into()),
        })
        .unwrap();
    }
    done.store(true, Ordering::SeqCst);
    for r in readers {
        r.join().unwrap();
    }

    let seen = seen.lock();
    assert!(!seen.is_empty());
    assert!(seen.iter().all(|m| *m == a || *m == b), "observed a torn mode state");
    assert_eq!(cache::load(&dir.path().join("mode_cache.json")), a);
}

#[test]
fn test_percent_of_max_bounds() {
    for max in [1u32, 4000, 6600, 9000] {
        for rpm in (0..=12_000).step_by(300) {
            let p = percent_of_max(rpm, max);
            assert!((0.0..=100.0).contains(&p), "{} rpm / {} max = {}", rpm, max, p);
        }
        assert_eq!(percent_of_max(0, max), 0.0);
        assert_eq!(percent_of_max(max, max), 100.0);
        assert_eq!(percent_of_max(max * 2, max), 100.0);
    }
    assert_eq!(percent_of_max(3000, 0), 0.0);
}

#[test]
fn test_fan_status_decoding() {
    assert_eq!(fan_rpm_from_status(0x0001_0000), Some(0));
    assert_eq!(fan_rpm_from_status(0x0001_0064), Some(10_000));
    assert_eq!(fan_rpm_from_status(0x0001_0065), None);
    assert_eq!(fan_rpm_from_status(0x24), Some(3600));
    assert_eq!(fan_rpm_from_status(0xFFFF_FFFE), None);
}

#[test]
fn test_service_from_config_without_hardware() {
    let dir = TempDir::new().unwrap();
    let cfg_path = dir.path().join("config.json");
    let json = serde_json::json!({
        "cache_path": dir.path().join("state").join("mode_cache.json"),
        "device": { "debugfs_root": dir.path().join("no_debugfs") },
        "sensors": { "hwmon": false, "nvidia_smi": false },
    });
    std::fs::write(&cfg_path, json.to_string()).unwrap();

    let cfg = config::load_config(Some(&cfg_path)).unwrap();
    let svc = TelemetryService::from_config(&cfg).unwrap();
    let snap = svc.get_snapshot();
    assert!(snap.modes.is_none());
    assert_eq!(snap.thermal.cpu_package_temp_celsius, None);
    assert_eq!(svc.current_modes(), ModeState::default());
}

#[test]
fn test_missing_explicit_config_is_error() {
    let dir = TempDir::new().unwrap();
    assert!(config::load_config(Some(&dir.path().join("absent.json"))).is_err());
}

#[test]
#[serial]
fn test_mode_change_is_logged() {
    let dir = TempDir::new().unwrap();
    let log = dir.path().join("events.json");
    logger::init_event_log(&log).unwrap();
    let (svc, _) = simulated_service(dir.path());
    svc.set_modes(SetModesRequest {
        cpu_mode: Some(CpuMode::Silent),
        gpu_mode: Some(GpuModeRequest::Eco),
    })
    .unwrap();
    logger::close_event_log();

    let changes: Vec<serde_json::Value> = std::fs::read_to_string(&log)
        .unwrap()
        .lines()
        .map(|l| serde_json::from_str::<serde_json::Value>(l).unwrap())
        .filter(|v| v["event"] == "mode_change")
        .collect();
    assert_eq!(changes.len(), 1);
    assert_eq!(changes[0]["data"]["cpu_mode"], "Silent");
    assert_eq!(changes[0]["data"]["gpu_mode"], "Eco");
}
