use std::collections::VecDeque;
use std::time::{Duration, Instant};

use crate::calibration::ACCEL_NEUTRAL;
use crate::config::Settings;
use crate::types::SensorSnapshot;

/// Gestures recognized from the accelerometer history. Each maps to a key
/// in the `GestureMapping` config section.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Gesture {
    Shake,
    TiltLeft,
    TiltRight,
}

impl Gesture {
    pub fn config_key(self) -> &'static str {
        match self {
            Gesture::Shake => "shake",
            Gesture::TiltLeft => "tilt_left",
            Gesture::TiltRight => "tilt_right",
        }
    }
}

/// Samples kept for the shake baseline.
const HISTORY: usize = 10;
/// Trailing samples compared against that baseline.
const RECENT: usize = 3;
/// Minimum history before any detection runs.
const WARMUP: usize = 5;

/// Shake/tilt detector over a short window of accelerometer magnitudes.
///
/// A spike of the recent peak magnitude over the older baseline is a shake;
/// a roll angle past the threshold is a tilt. The cooldown keeps one
/// physical motion from firing twice, and a detected shake clears the
/// history so its tail cannot re-trigger.
pub struct GestureDetector {
    enabled: bool,
    shake_threshold: f64,
    tilt_threshold: f64,
    cooldown: Duration,
    history: VecDeque<f64>,
    last_fired: Option<Instant>,
}

impl GestureDetector {
    pub fn from_settings(settings: &Settings) -> GestureDetector {
        GestureDetector {
            enabled: settings.gestures_enabled,
            shake_threshold: settings.shake_threshold,
            tilt_threshold: settings.tilt_threshold,
            cooldown: settings.gesture_cooldown,
            history: VecDeque::with_capacity(HISTORY),
            last_fired: None,
        }
    }

    /// Feed one snapshot; returns a gesture at most once per cooldown.
    pub fn update(&mut self, snap: &SensorSnapshot, now: Instant) -> Option<Gesture> {
        if !self.enabled {
            return None;
        }

        let centered = [
            snap.accel[0] - ACCEL_NEUTRAL,
            snap.accel[1] - ACCEL_NEUTRAL,
            snap.accel[2] - ACCEL_NEUTRAL,
        ];
        let magnitude =
            (centered[0] * centered[0] + centered[1] * centered[1] + centered[2] * centered[2])
                .sqrt();
        self.history.push_back(magnitude);
        if self.history.len() > HISTORY {
            self.history.pop_front();
        }

        if let Some(t) = self.last_fired {
            if now.duration_since(t) < self.cooldown {
                return None;
            }
        }
        if self.history.len() < WARMUP {
            return None;
        }

        let gesture = self.detect_shake().or_else(|| self.detect_tilt(centered))?;
        self.last_fired = Some(now);
        Some(gesture)
    }

    fn detect_shake(&mut self) -> Option<Gesture> {
        let split = self.history.len() - RECENT;
        let baseline: f64 = self.history.iter().take(split).sum::<f64>() / split as f64;
        let peak = self
            .history
            .iter()
            .skip(split)
            .copied()
            .fold(f64::MIN, f64::max);

        if peak - baseline > self.shake_threshold {
            log::debug!("shake (spike {:.0} over {:.0})", peak, baseline);
            self.history.clear();
            Some(Gesture::Shake)
        } else {
            None
        }
    }

    fn detect_tilt(&self, centered: [f64; 3]) -> Option<Gesture> {
        let roll = (-centered[0])
            .atan2((centered[1] * centered[1] + centered[2] * centered[2]).sqrt())
            .to_degrees();
        if roll > self.tilt_threshold {
            Some(Gesture::TiltRight)
        } else if roll < -self.tilt_threshold {
            Some(Gesture::TiltLeft)
        } else {
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn snap_with(offsets: [f64; 3]) -> SensorSnapshot {
        let mut snap = SensorSnapshot::default();
        snap.accel = [
            ACCEL_NEUTRAL + offsets[0],
            ACCEL_NEUTRAL + offsets[1],
            ACCEL_NEUTRAL + offsets[2],
        ];
        snap
    }

    fn detector() -> GestureDetector {
        GestureDetector::from_settings(&Settings::default())
    }

    #[test]
    fn magnitude_spike_registers_as_shake() {
        let mut d = detector();
        let t0 = Instant::now();
        let rest = snap_with([0.0, 0.0, 100.0]);
        for _ in 0..7 {
            assert_eq!(d.update(&rest, t0), None);
        }
        let spike = snap_with([600.0, 0.0, 100.0]);
        assert_eq!(d.update(&spike, t0), Some(Gesture::Shake));

        // History was cleared; the spike's tail cannot re-trigger.
        let later = t0 + Duration::from_secs(1);
        for _ in 0..4 {
            assert_eq!(d.update(&rest, later), None);
        }
    }

    #[test]
    fn sustained_roll_registers_as_tilt() {
        let mut d = detector();
        let t0 = Instant::now();
        // Gravity shifted onto -X: rolled well past 30 degrees.
        let tilted = snap_with([-400.0, 0.0, 100.0]);
        let mut fired = None;
        for _ in 0..6 {
            if let Some(g) = d.update(&tilted, t0) {
                fired = Some(g);
                break;
            }
        }
        assert_eq!(fired, Some(Gesture::TiltRight));

        let mut d = detector();
        let tilted = snap_with([400.0, 0.0, 100.0]);
        let mut fired = None;
        for _ in 0..6 {
            if let Some(g) = d.update(&tilted, t0) {
                fired = Some(g);
                break;
            }
        }
        assert_eq!(fired, Some(Gesture::TiltLeft));
    }

    #[test]
    fn cooldown_suppresses_back_to_back_gestures() {
        let mut d = detector();
        let t0 = Instant::now();
        let tilted = snap_with([-400.0, 0.0, 100.0]);
        let mut first = None;
        for _ in 0..6 {
            if let Some(g) = d.update(&tilted, t0) {
                first = Some(g);
                break;
            }
        }
        assert_eq!(first, Some(Gesture::TiltRight));

        // Still tilted: silent within the cooldown, fires again after it.
        assert_eq!(d.update(&tilted, t0 + Duration::from_millis(100)), None);
        assert_eq!(
            d.update(&tilted, t0 + Duration::from_millis(600)),
            Some(Gesture::TiltRight)
        );
    }

    #[test]
    fn disabled_detector_stays_silent() {
        let mut settings = Settings::default();
        settings.gestures_enabled = false;
        let mut d = GestureDetector::from_settings(&settings);
        let tilted = snap_with([-400.0, 0.0, 100.0]);
        for _ in 0..10 {
            assert_eq!(d.update(&tilted, Instant::now()), None);
        }
    }
}
