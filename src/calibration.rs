use std::time::Duration;

use crate::extension::MotionSearch;
use crate::hid::HidTransport;
use crate::protocol;
use crate::types::{Extension, ExtensionData};
use crate::{Result, WiimoteError};

/// Raw neutral targets at rest. 512 is the accelerometer mid-scale, 8000
/// the MotionPlus at-rest rate.
pub const ACCEL_NEUTRAL: f64 = 512.0;
pub const GYRO_NEUTRAL: f64 = 8000.0;

/// Per-axis offsets subtracted from raw samples before filtering.
/// Recomputing over the same still-rest input reproduces the same offsets.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct Offsets {
    pub accel: [f64; 3],
    pub gyro: [f64; 3],
}

impl Offsets {
    pub fn reset(&mut self) {
        *self = Offsets::default();
    }

    pub fn apply_accel(&self, raw: [f64; 3]) -> [f64; 3] {
        [
            raw[0] - self.accel[0],
            raw[1] - self.accel[1],
            raw[2] - self.accel[2],
        ]
    }

    pub fn apply_gyro(&self, raw: [f64; 3]) -> [f64; 3] {
        [
            raw[0] - self.gyro[0],
            raw[1] - self.gyro[1],
            raw[2] - self.gyro[2],
        ]
    }
}

/// Rest-sampling calibrator: reads frames until enough (accel, gyro) pairs
/// are gathered, then averages each axis against its neutral target.
#[derive(Debug, Clone)]
pub struct Calibrator {
    pub samples: u32,
    pub sample_delay: Duration,
    pub accel_target: f64,
    pub gyro_target: f64,
    pub motion_search: MotionSearch,
}

impl Default for Calibrator {
    fn default() -> Self {
        Calibrator {
            samples: 60,
            sample_delay: Duration::from_millis(5),
            accel_target: ACCEL_NEUTRAL,
            gyro_target: GYRO_NEUTRAL,
            motion_search: MotionSearch::default(),
        }
    }
}

impl Calibrator {
    /// Collect samples off the live transport with the remote at rest.
    /// Empty reads are retried within a 3x attempt budget. Fails only when
    /// zero usable samples were collected.
    pub fn calibrate(&self, transport: &HidTransport, extension: Extension) -> Result<Offsets> {
        let mut accel = Vec::with_capacity(self.samples as usize);
        let mut gyro = Vec::with_capacity(self.samples as usize);
        let wants_gyro = extension == Extension::MotionPlus;
        let attempts = self.samples.saturating_mul(3);

        for _ in 0..attempts {
            if accel.len() >= self.samples as usize
                && (!wants_gyro || gyro.len() >= self.samples as usize)
            {
                break;
            }

            let frame = match transport.read_frame(50) {
                Ok(Some(f)) => f,
                Ok(None) => continue,
                Err(e) => return Err(e),
            };

            let decoded = protocol::decode(&frame.payload, extension);
            if let Some(a) = decoded.accel {
                accel.push([f64::from(a.x), f64::from(a.y), f64::from(a.z)]);
            }
            match decoded.extension {
                ExtensionData::MotionPlus(m) => {
                    gyro.push([f64::from(m.yaw), f64::from(m.roll), f64::from(m.pitch)]);
                }
                _ if wants_gyro => {
                    // Offset may have drifted; let the search have a look.
                    if let Some(off) = protocol::extension_offset(decoded.report_tag) {
                        if frame.payload.len() > off {
                            if let Some((_, m)) = self.motion_search.locate(&frame.payload[off..]) {
                                gyro.push([
                                    f64::from(m.yaw),
                                    f64::from(m.roll),
                                    f64::from(m.pitch),
                                ]);
                            }
                        }
                    }
                }
                _ => {}
            }

            std::thread::sleep(self.sample_delay);
        }

        if accel.is_empty() && gyro.is_empty() {
            return Err(WiimoteError::CalibrationInsufficientSamples);
        }

        let offsets = self.offsets_from_samples(&accel, &gyro);
        log::info!(
            "calibrated over {} accel / {} gyro samples: {:?}",
            accel.len(),
            gyro.len(),
            offsets
        );
        Ok(offsets)
    }

    /// Pure offset computation: per-axis mean minus the neutral target.
    pub fn offsets_from_samples(&self, accel: &[[f64; 3]], gyro: &[[f64; 3]]) -> Offsets {
        Offsets {
            accel: mean_minus(accel, self.accel_target),
            gyro: mean_minus(gyro, self.gyro_target),
        }
    }
}

fn mean_minus(samples: &[[f64; 3]], target: f64) -> [f64; 3] {
    if samples.is_empty() {
        return [0.0; 3];
    }
    let n = samples.len() as f64;
    let mut sums = [0.0f64; 3];
    for s in samples {
        for axis in 0..3 {
            sums[axis] += s[axis];
        }
    }
    [
        sums[0] / n - target,
        sums[1] / n - target,
        sums[2] / n - target,
    ]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn identical_samples_give_exact_offset() {
        let cal = Calibrator::default();
        let k = 37.0;
        let accel = vec![[ACCEL_NEUTRAL + k; 3]; 60];
        let gyro = vec![[GYRO_NEUTRAL + k; 3]; 60];
        let offsets = cal.offsets_from_samples(&accel, &gyro);
        for axis in 0..3 {
            assert!((offsets.accel[axis] - k).abs() < 1e-9);
            assert!((offsets.gyro[axis] - k).abs() < 1e-9);
        }
    }

    #[test]
    fn recomputation_is_deterministic() {
        let cal = Calibrator::default();
        let accel: Vec<[f64; 3]> = (0..60)
            .map(|i| [512.0 + (i % 3) as f64, 510.0, 515.0])
            .collect();
        let a = cal.offsets_from_samples(&accel, &[]);
        let b = cal.offsets_from_samples(&accel, &[]);
        assert_eq!(a, b);
    }

    #[test]
    fn no_samples_means_zero_offsets() {
        let cal = Calibrator::default();
        let offsets = cal.offsets_from_samples(&[], &[]);
        assert_eq!(offsets, Offsets::default());
    }

    #[test]
    fn offsets_apply_and_reset() {
        let mut o = Offsets {
            accel: [1.0, 2.0, 3.0],
            gyro: [10.0, 20.0, 30.0],
        };
        assert_eq!(o.apply_accel([1.0, 2.0, 3.0]), [0.0, 0.0, 0.0]);
        assert_eq!(o.apply_gyro([10.0, 20.0, 30.0]), [0.0, 0.0, 0.0]);
        o.reset();
        assert_eq!(o, Offsets::default());
    }
}
