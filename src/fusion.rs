use std::f64::consts::PI;
use std::time::Duration;

use crate::config::Settings;
use crate::types::{PointerMode, SensorSnapshot};

/// Gyro raw units per degree/second in the slow and fast ranges; the
/// per-axis fast flag from the report selects the divisor.
const GYRO_UNITS_SLOW: f64 = 20.0;
const GYRO_UNITS_FAST: f64 = 4.0;

/// Complementary filter weight on the gyro-integrated branch; the
/// accelerometer tilt carries the remaining 0.7 and corrects drift.
const FUSION_ALPHA: f64 = 0.3;

/// Conversion from blended angle delta (radians) to pixels, before the
/// sensitivity and speed factors.
const PIXELS_PER_RADIAN: f64 = 800.0;

/// Pixel gain for the raw-accelerometer delta path.
const ACCEL_PIXELS_PER_UNIT: f64 = 0.8;

/// Emitted deltas below this magnitude are swallowed as noise.
const NOISE_FLOOR_PX: f64 = 0.5;

/// IR camera resolution used for normalization.
const IR_MAX_X: f64 = 1023.0;
const IR_MAX_Y: f64 = 767.0;

/// One pointer command produced per tick. IR pointing is absolute in
/// normalized screen coordinates; every motion mode is relative pixels.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum PointerUpdate {
    Absolute { x: f64, y: f64 },
    Relative { dx: f64, dy: f64 },
}

/// Turns decoded snapshots into pointer movement.
///
/// Holds the blended pitch/roll estimate, the per-axis output filters, and
/// the previous-sample state for the delta modes. The snapshot's effective
/// mode drives a small state machine: any mode change re-seeds the angle
/// estimate from the accelerometer and discards that tick's output.
pub struct FusionEngine {
    settings: Settings,
    pitch: f64,
    roll: f64,
    prev_accel: [f64; 3],
    prev_ir: Option<(f64, f64)>,
    out_x: f64,
    out_y: f64,
    initialized: bool,
    active_mode: PointerMode,
}

impl FusionEngine {
    pub fn new(settings: Settings) -> FusionEngine {
        FusionEngine {
            settings,
            pitch: 0.0,
            roll: 0.0,
            prev_accel: [0.0; 3],
            prev_ir: None,
            out_x: 0.0,
            out_y: 0.0,
            initialized: false,
            active_mode: PointerMode::default(),
        }
    }

    /// Swap in new tunables and drop all motion state.
    pub fn apply_settings(&mut self, settings: Settings) {
        self.settings = settings;
        self.reset();
    }

    /// Forget angles, filters, and previous samples. The next tick
    /// re-initializes from the accelerometer and emits nothing.
    pub fn reset(&mut self) {
        self.pitch = 0.0;
        self.roll = 0.0;
        self.prev_accel = [0.0; 3];
        self.prev_ir = None;
        self.out_x = 0.0;
        self.out_y = 0.0;
        self.initialized = false;
    }

    /// Current blended pitch/roll estimate in radians, for diagnostics.
    pub fn angles(&self) -> (f64, f64) {
        (self.pitch, self.roll)
    }

    /// Process one snapshot. `dt` is the time since the previous tick.
    pub fn tick(&mut self, snap: &SensorSnapshot, dt: Duration) -> Option<PointerUpdate> {
        let mode = snap.effective_mode;
        if mode != self.active_mode {
            self.active_mode = mode;
            self.reset();
        }

        match mode {
            PointerMode::Ir => self.tick_ir(snap),
            PointerMode::Accel => self.tick_accel(snap),
            PointerMode::Gyro => self.tick_gyro(snap, dt),
            PointerMode::Fusion => self.tick_fusion(snap, dt),
            PointerMode::Hybrid => {
                if snap.ir_visible {
                    self.tick_ir(snap)
                } else {
                    self.tick_gyro(snap, dt)
                }
            }
        }
    }

    /// Midpoint of the visible IR points mapped to normalized screen
    /// coordinates, exponentially smoothed. The camera image is mirrored,
    /// so X is flipped.
    fn tick_ir(&mut self, snap: &SensorSnapshot) -> Option<PointerUpdate> {
        if snap.ir_points.is_empty() {
            return None;
        }
        let n = snap.ir_points.len() as f64;
        let cx: f64 = snap.ir_points.iter().map(|p| f64::from(p.x)).sum::<f64>() / n;
        let cy: f64 = snap.ir_points.iter().map(|p| f64::from(p.y)).sum::<f64>() / n;

        let target_x = (1.0 - cx / IR_MAX_X).clamp(0.0, 1.0);
        let target_y = (cy / IR_MAX_Y).clamp(0.0, 1.0);

        let alpha = self.output_alpha();
        let (x, y) = match self.prev_ir {
            Some((px, py)) => (
                px + alpha * (target_x - px),
                py + alpha * (target_y - py),
            ),
            None => (target_x, target_y),
        };
        self.prev_ir = Some((x, y));
        Some(PointerUpdate::Absolute { x, y })
    }

    /// Frame-to-frame accelerometer delta, deadzone-filtered in raw units.
    fn tick_accel(&mut self, snap: &SensorSnapshot) -> Option<PointerUpdate> {
        let accel = snap.accel;
        if !self.initialized {
            self.prev_accel = accel;
            self.initialized = true;
            return None;
        }

        let deadzone = self.settings.deadzone;
        let mut dx = accel[0] - self.prev_accel[0];
        let mut dy = -(accel[1] - self.prev_accel[1]);
        self.prev_accel = accel;
        if dx.abs() < deadzone {
            dx = 0.0;
        }
        if dy.abs() < deadzone {
            dy = 0.0;
        }

        let gain = self.settings.accel_sensitivity * self.speed_curve() * ACCEL_PIXELS_PER_UNIT;
        self.emit(dx * gain, dy * gain)
    }

    /// Pure rate mode: pointer velocity proportional to the deadzoned gyro
    /// rates, integrated over this tick.
    fn tick_gyro(&mut self, snap: &SensorSnapshot, dt: Duration) -> Option<PointerUpdate> {
        if !self.initialized {
            self.initialized = true;
            return None;
        }
        let rates = gyro_rates(snap, self.rate_deadzone());
        let gain = self.settings.gyro_sensitivity * self.speed_curve() * PIXELS_PER_RADIAN;
        let dx = -rates[0] * dt.as_secs_f64() * gain;
        let dy = rates[2] * dt.as_secs_f64() * gain;
        self.emit(dx, dy)
    }

    /// Complementary filter: the gyro integrates quickly, the accelerometer
    /// tilt pulls the estimate back so a still controller emits nothing.
    fn tick_fusion(&mut self, snap: &SensorSnapshot, dt: Duration) -> Option<PointerUpdate> {
        let (pitch_a, roll_a) = accel_angles(snap.accel);

        if !self.initialized {
            // Seed from the accelerometer alone to avoid a first-tick jump.
            self.pitch = pitch_a;
            self.roll = roll_a;
            self.initialized = true;
            return None;
        }

        let rates = gyro_rates(snap, self.rate_deadzone());
        let dt_s = dt.as_secs_f64();
        let pitch_gyro_delta = rates[2] * dt_s;
        let roll_gyro_delta = rates[1] * dt_s;

        let pitch = FUSION_ALPHA * (self.pitch + pitch_gyro_delta) + (1.0 - FUSION_ALPHA) * pitch_a;
        let roll = FUSION_ALPHA * (self.roll + roll_gyro_delta) + (1.0 - FUSION_ALPHA) * roll_a;

        // Movement is the change in the blended angle, not the angle itself.
        let mut pitch_delta = pitch - self.pitch;
        let mut roll_delta = roll - self.roll;
        self.pitch = pitch;
        self.roll = roll;

        let angle_deadzone = self.angle_deadzone();
        if pitch_delta.abs() < angle_deadzone {
            pitch_delta = 0.0;
        }
        if roll_delta.abs() < angle_deadzone {
            roll_delta = 0.0;
        }

        let sensitivity = 0.6 * self.settings.accel_sensitivity
            + 0.4 * self.settings.gyro_sensitivity;
        let gain = sensitivity * self.speed_curve() * PIXELS_PER_RADIAN;

        // Tilting left rolls negative and must move the cursor left.
        let dx = -roll_delta * gain;
        let dy = pitch_delta * gain;
        self.emit(dx, dy)
    }

    /// Per-axis output low-pass, then the noise floor.
    fn emit(&mut self, dx: f64, dy: f64) -> Option<PointerUpdate> {
        let alpha = self.output_alpha();
        self.out_x += alpha * (dx - self.out_x);
        self.out_y += alpha * (dy - self.out_y);

        if self.out_x.hypot(self.out_y) < NOISE_FLOOR_PX {
            return None;
        }
        Some(PointerUpdate::Relative {
            dx: self.out_x,
            dy: self.out_y,
        })
    }

    /// Super-linear speed response; the floor keeps very low settings usable.
    fn speed_curve(&self) -> f64 {
        self.settings.mouse_speed.max(0.2).powf(1.8)
    }

    /// Output filter coefficient: smoothing 0 passes through, 10 is heavy.
    fn output_alpha(&self) -> f64 {
        (1.0 - 0.06 * f64::from(self.settings.smoothing)).clamp(0.3, 1.0)
    }

    /// Gyro rate deadzone in rad/s, widening with the smoothing setting.
    fn rate_deadzone(&self) -> f64 {
        (0.5 + 0.25 * f64::from(self.settings.smoothing)) * PI / 180.0
    }

    /// Angle-delta deadzone in radians, widening with smoothing.
    fn angle_deadzone(&self) -> f64 {
        0.0005 + 0.0002 * f64::from(self.settings.smoothing)
    }
}

/// Tilt angles from a centered accelerometer sample.
fn accel_angles(accel: [f64; 3]) -> (f64, f64) {
    let [ax, ay, az] = accel;
    let pitch = ay.atan2((ax * ax + az * az).sqrt());
    let roll = (-ax).atan2((ay * ay + az * az).sqrt());
    (pitch, roll)
}

/// Centered gyro rates in rad/s, ordered yaw/roll/pitch, each axis on its
/// own slow or fast scale and zeroed below the deadzone.
fn gyro_rates(snap: &SensorSnapshot, deadzone: f64) -> [f64; 3] {
    let mut rates = [0.0f64; 3];
    for axis in 0..3 {
        let units = if snap.gyro_fast[axis] {
            GYRO_UNITS_FAST
        } else {
            GYRO_UNITS_SLOW
        };
        let rate = snap.gyro[axis] / units * PI / 180.0;
        rates[axis] = if rate.abs() < deadzone { 0.0 } else { rate };
    }
    rates
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::IrPoint;

    fn tilted_snapshot(accel: [f64; 3]) -> SensorSnapshot {
        let mut snap = SensorSnapshot::default();
        snap.accel = accel;
        snap.motionplus_connected = true;
        snap.effective_mode = PointerMode::Fusion;
        snap
    }

    const DT: Duration = Duration::from_millis(10);

    #[test]
    fn first_fusion_tick_seeds_from_accel_and_emits_nothing() {
        let mut engine = FusionEngine::new(Settings::default());
        let snap = tilted_snapshot([0.0, 50.0, 87.0]);
        assert_eq!(engine.tick(&snap, DT), None);
        let (pitch_a, _) = accel_angles(snap.accel);
        let (pitch, _) = engine.angles();
        assert!((pitch - pitch_a).abs() < 1e-12);
    }

    #[test]
    fn fusion_angle_converges_monotonically_to_accel_tilt() {
        let mut engine = FusionEngine::new(Settings::default());
        engine.tick(&tilted_snapshot([0.0, 0.0, 100.0]), DT);

        // Constant non-zero tilt, zero gyro rate from here on.
        let snap = tilted_snapshot([0.0, 50.0, 87.0]);
        let (target, _) = accel_angles(snap.accel);
        let mut prev_gap = f64::INFINITY;
        for _ in 0..40 {
            engine.tick(&snap, DT);
            let (pitch, _) = engine.angles();
            let gap = (pitch - target).abs();
            assert!(gap <= prev_gap + 1e-12, "angle oscillated");
            prev_gap = gap;
        }
        assert!(prev_gap < 1e-3);
    }

    #[test]
    fn still_controller_emits_nothing() {
        let mut engine = FusionEngine::new(Settings::default());
        let snap = tilted_snapshot([0.0, 50.0, 87.0]);
        engine.tick(&snap, DT);
        for _ in 0..20 {
            assert_eq!(engine.tick(&snap, DT), None);
        }
    }

    #[test]
    fn mode_switch_discards_the_first_tick() {
        let mut engine = FusionEngine::new(Settings::default());
        let snap = tilted_snapshot([0.0, 50.0, 87.0]);
        engine.tick(&snap, DT);
        engine.tick(&snap, DT);

        let mut accel_snap = snap.clone();
        accel_snap.effective_mode = PointerMode::Accel;
        assert_eq!(engine.tick(&accel_snap, DT), None);
    }

    #[test]
    fn ir_pointing_is_absolute_and_mirrored() {
        let mut engine = FusionEngine::new(Settings::default());
        let mut snap = SensorSnapshot::default();
        snap.effective_mode = PointerMode::Ir;
        snap.ir_visible = true;
        snap.ir_points = vec![IrPoint {
            x: 0,
            y: 0,
            size: 2,
        }];
        match engine.tick(&snap, DT) {
            Some(PointerUpdate::Absolute { x, y }) => {
                // Camera x=0 is the right edge of the screen.
                assert!((x - 1.0).abs() < 1e-9);
                assert!(y.abs() < 1e-9);
            }
            other => panic!("expected absolute update, got {:?}", other),
        }
    }

    #[test]
    fn hybrid_falls_back_to_gyro_when_ir_lost() {
        let mut engine = FusionEngine::new(Settings::default());
        let mut snap = SensorSnapshot::default();
        snap.effective_mode = PointerMode::Hybrid;
        snap.motionplus_connected = true;
        snap.ir_visible = false;
        // Large yaw rate, slow scale: 400 units = 20 deg/s.
        snap.gyro = [400.0, 0.0, 0.0];

        // First motion tick initializes, second emits.
        assert_eq!(engine.tick(&snap, DT), None);
        match engine.tick(&snap, DT) {
            Some(PointerUpdate::Relative { dx, dy }) => {
                assert!(dx < 0.0, "positive yaw rate must move left, got {}", dx);
                assert_eq!(dy, 0.0);
            }
            other => panic!("expected relative update, got {:?}", other),
        }
    }

    #[test]
    fn gyro_deadzone_swallows_slow_drift() {
        let mut engine = FusionEngine::new(Settings::default());
        let mut snap = SensorSnapshot::default();
        snap.effective_mode = PointerMode::Gyro;
        snap.motionplus_connected = true;
        // 10 units on the slow scale is 0.5 deg/s, below the base deadzone
        // once smoothing widens it.
        snap.gyro = [10.0, 0.0, 0.0];
        engine.tick(&snap, DT);
        for _ in 0..20 {
            assert_eq!(engine.tick(&snap, DT), None);
        }
    }
}
