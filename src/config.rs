use std::collections::HashMap;
use std::sync::Mutex;
use std::time::Duration;

use crate::types::PointerMode;

/// Read-only view the driver has onto its configuration collaborator.
/// Values are addressed by section/key; an active profile may override base
/// values. Persistence belongs to the implementor, never to this crate.
pub trait ConfigSource: Send + Sync {
    fn get_str(&self, section: &str, key: &str, default: &str) -> String;
    fn get_int(&self, section: &str, key: &str, default: i64) -> i64;
    fn get_float(&self, section: &str, key: &str, default: f64) -> f64;
    fn get_bool(&self, section: &str, key: &str, default: bool) -> bool;

    fn active_profile(&self) -> String;
    fn set_active_profile(&self, name: &str);
    fn profiles(&self) -> Vec<String>;
}

/// In-memory `ConfigSource` with per-profile overrides. Handy as a default
/// and for tests; real deployments wrap their own settings store.
#[derive(Default)]
pub struct MemoryConfig {
    inner: Mutex<MemoryConfigInner>,
}

#[derive(Default)]
struct MemoryConfigInner {
    base: HashMap<(String, String), String>,
    overrides: HashMap<(String, String, String), String>,
    profiles: Vec<String>,
    active: String,
}

impl MemoryConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set(&self, section: &str, key: &str, value: &str) {
        if let Ok(mut inner) = self.inner.lock() {
            inner
                .base
                .insert((section.to_string(), key.to_string()), value.to_string());
        }
    }

    /// Set a value visible only while `profile` is active.
    pub fn set_profile(&self, profile: &str, section: &str, key: &str, value: &str) {
        if let Ok(mut inner) = self.inner.lock() {
            if !inner.profiles.iter().any(|p| p == profile) {
                inner.profiles.push(profile.to_string());
            }
            inner.overrides.insert(
                (profile.to_string(), section.to_string(), key.to_string()),
                value.to_string(),
            );
        }
    }

    pub fn add_profile(&self, name: &str) {
        if let Ok(mut inner) = self.inner.lock() {
            if !inner.profiles.iter().any(|p| p == name) {
                inner.profiles.push(name.to_string());
            }
        }
    }

    fn lookup(&self, section: &str, key: &str) -> Option<String> {
        let inner = self.inner.lock().ok()?;
        if !inner.active.is_empty() {
            let k = (inner.active.clone(), section.to_string(), key.to_string());
            if let Some(v) = inner.overrides.get(&k) {
                return Some(v.clone());
            }
        }
        inner
            .base
            .get(&(section.to_string(), key.to_string()))
            .cloned()
    }
}

impl ConfigSource for MemoryConfig {
    fn get_str(&self, section: &str, key: &str, default: &str) -> String {
        self.lookup(section, key).unwrap_or_else(|| default.to_string())
    }

    fn get_int(&self, section: &str, key: &str, default: i64) -> i64 {
        self.lookup(section, key)
            .and_then(|v| v.trim().parse().ok())
            .unwrap_or(default)
    }

    fn get_float(&self, section: &str, key: &str, default: f64) -> f64 {
        self.lookup(section, key)
            .and_then(|v| v.trim().parse().ok())
            .unwrap_or(default)
    }

    fn get_bool(&self, section: &str, key: &str, default: bool) -> bool {
        self.lookup(section, key)
            .and_then(|v| match v.trim().to_ascii_lowercase().as_str() {
                "1" | "true" | "yes" | "on" => Some(true),
                "0" | "false" | "no" | "off" => Some(false),
                _ => None,
            })
            .unwrap_or(default)
    }

    fn active_profile(&self) -> String {
        self.inner
            .lock()
            .map(|i| i.active.clone())
            .unwrap_or_default()
    }

    fn set_active_profile(&self, name: &str) {
        if let Ok(mut inner) = self.inner.lock() {
            inner.active = name.to_string();
        }
    }

    fn profiles(&self) -> Vec<String> {
        self.inner
            .lock()
            .map(|i| i.profiles.clone())
            .unwrap_or_default()
    }
}

/// Snapshot of every tunable the engine reads, resolved once per (re)load so
/// the hot loops never touch the config collaborator.
#[derive(Debug, Clone)]
pub struct Settings {
    /// 0..=100 from config, scaled to a 0..2 factor.
    pub mouse_speed: f64,
    /// 0..=10 smoothing steps.
    pub smoothing: u32,
    pub accel_sensitivity: f64,
    pub gyro_sensitivity: f64,
    pub ir_sensitivity: f64,
    /// Wheel units per scroll action.
    pub scroll_amount: i32,
    pub gyro_lowpass_alpha: f64,
    pub accel_lowpass_alpha: f64,
    pub deadzone: f64,
    pub desired_mode: PointerMode,
    pub auto_mode: bool,
    pub motionplus_enabled: bool,
    /// Profile active at load time; carried so state observers see it.
    pub active_profile: String,

    pub gestures_enabled: bool,
    /// Accel-magnitude spike that registers as a shake, raw units.
    pub shake_threshold: f64,
    /// Roll angle past which a tilt gesture fires, degrees.
    pub tilt_threshold: f64,
    pub gesture_cooldown: Duration,

    pub calibration_samples: u32,
    pub calibration_sample_delay: Duration,
    pub auto_calibrate_on_connect: bool,

    pub discovery_timeout: Duration,
    pub reconnect_enabled: bool,
    pub reconnect_initial_delay: Duration,
    pub reconnect_max_delay: Duration,
    pub reconnect_backoff_factor: f64,
    pub reconnect_jitter: Duration,
}

impl Settings {
    pub fn load(config: &dyn ConfigSource) -> Settings {
        let mode_name = config.get_str("General", "mode", "auto");
        let auto_mode = mode_name.eq_ignore_ascii_case("auto");
        Settings {
            mouse_speed: config.get_int("Sensitivity", "mouse_speed", 50) as f64 / 50.0,
            smoothing: config.get_int("Sensitivity", "smoothing", 5).clamp(0, 10) as u32,
            accel_sensitivity: config.get_int("Sensitivity", "accel_sensitivity", 25) as f64 / 100.0,
            gyro_sensitivity: config.get_int("Sensitivity", "gyro_sensitivity", 30) as f64 / 100.0,
            ir_sensitivity: config.get_int("Sensitivity", "ir_sensitivity", 40) as f64 / 100.0,
            scroll_amount: config.get_int("Sensitivity", "scroll_amount", 120) as i32,
            gyro_lowpass_alpha: config.get_float("Filters", "gyro_lowpass_alpha", 0.25),
            accel_lowpass_alpha: config.get_float("Filters", "accel_lowpass_alpha", 0.25),
            deadzone: config.get_int("Mouse", "deadzone", 10) as f64,
            desired_mode: PointerMode::from_name(&mode_name).unwrap_or_default(),
            auto_mode,
            motionplus_enabled: config.get_bool("MotionPlus", "enabled", true),
            active_profile: config.active_profile(),

            gestures_enabled: config.get_bool("Gestures", "enabled", true),
            shake_threshold: config.get_float("Gestures", "shake_threshold", 400.0),
            tilt_threshold: config.get_float("Gestures", "tilt_threshold", 30.0),
            gesture_cooldown: Duration::from_millis(
                config.get_int("Gestures", "cooldown_ms", 500).max(0) as u64,
            ),

            calibration_samples: config.get_int("Calibration", "samples", 60).max(1) as u32,
            calibration_sample_delay: Duration::from_millis(
                config.get_int("Calibration", "sample_delay_ms", 5).max(0) as u64,
            ),
            auto_calibrate_on_connect: config.get_bool("Calibration", "auto_on_connect", true),

            discovery_timeout: Duration::from_millis(
                config.get_int("Connection", "discovery_timeout_ms", 5_000).max(0) as u64,
            ),
            reconnect_enabled: config.get_bool("Connection", "reconnect", true),
            reconnect_initial_delay: Duration::from_millis(
                config.get_int("Connection", "reconnect_initial_delay_ms", 500).max(1) as u64,
            ),
            reconnect_max_delay: Duration::from_millis(
                config.get_int("Connection", "reconnect_max_delay_ms", 10_000).max(1) as u64,
            ),
            reconnect_backoff_factor: config
                .get_float("Connection", "reconnect_backoff_factor", 2.0)
                .max(1.0),
            reconnect_jitter: Duration::from_millis(
                config.get_int("Connection", "reconnect_jitter_ms", 250).max(0) as u64,
            ),
        }
    }
}

impl Default for Settings {
    fn default() -> Settings {
        Settings::load(&MemoryConfig::new())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn profile_override_wins_while_active() {
        let config = MemoryConfig::new();
        config.set("Sensitivity", "mouse_speed", "50");
        config.set_profile("precise", "Sensitivity", "mouse_speed", "20");

        assert_eq!(config.get_int("Sensitivity", "mouse_speed", 0), 50);
        config.set_active_profile("precise");
        assert_eq!(config.get_int("Sensitivity", "mouse_speed", 0), 20);
        config.set_active_profile("");
        assert_eq!(config.get_int("Sensitivity", "mouse_speed", 0), 50);
    }

    #[test]
    fn typed_accessors_fall_back_on_garbage() {
        let config = MemoryConfig::new();
        config.set("A", "int", "not-a-number");
        config.set("A", "bool", "maybe");
        assert_eq!(config.get_int("A", "int", 7), 7);
        assert!(config.get_bool("A", "bool", true));
        assert!(!config.get_bool("A", "missing", false));
    }

    #[test]
    fn poisoned_lock_degrades_to_defaults() {
        let config = std::sync::Arc::new(MemoryConfig::new());
        config.set("A", "k", "v");

        let poisoner = config.clone();
        let _ = std::thread::spawn(move || {
            let _guard = poisoner.inner.lock().unwrap();
            panic!("poison the config lock");
        })
        .join();

        // Accessors fall back instead of propagating the panic.
        assert_eq!(config.get_str("A", "k", "fallback"), "fallback");
        assert_eq!(config.active_profile(), "");
        assert!(config.profiles().is_empty());
        config.set("A", "k", "w");
        config.set_active_profile("x");
    }

    #[test]
    fn settings_defaults() {
        let s = Settings::default();
        assert!(s.auto_mode);
        assert_eq!(s.desired_mode, PointerMode::Fusion);
        assert_eq!(s.calibration_samples, 60);
        assert!(s.reconnect_enabled);
        assert!((s.mouse_speed - 1.0).abs() < 1e-9);
    }

    #[test]
    fn settings_reads_mode_name() {
        let config = MemoryConfig::new();
        config.set("General", "mode", "hybrid");
        let s = Settings::load(&config);
        assert!(!s.auto_mode);
        assert_eq!(s.desired_mode, PointerMode::Hybrid);
    }
}
