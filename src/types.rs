use std::time::Instant;

bitflags::bitflags! {
    /// Button bitmap of the remote. Bit positions follow the two wire bytes:
    /// byte0 in the low byte, byte1 in the high byte.
    #[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
    pub struct Buttons: u16 {
        const DPAD_LEFT  = 1 << 0;
        const DPAD_RIGHT = 1 << 1;
        const DPAD_DOWN  = 1 << 2;
        const DPAD_UP    = 1 << 3;
        const PLUS       = 1 << 4;
        const TWO        = 1 << 8;
        const ONE        = 1 << 9;
        const B          = 1 << 10;
        const A          = 1 << 11;
        const MINUS      = 1 << 12;
        const HOME       = 1 << 15;
    }
}

impl Buttons {
    /// Names of the set buttons, for mapping lookups and logs.
    pub fn names(self) -> Vec<&'static str> {
        const TABLE: &[(Buttons, &str)] = &[
            (Buttons::A, "a"),
            (Buttons::B, "b"),
            (Buttons::ONE, "one"),
            (Buttons::TWO, "two"),
            (Buttons::PLUS, "plus"),
            (Buttons::MINUS, "minus"),
            (Buttons::HOME, "home"),
            (Buttons::DPAD_UP, "dpadup"),
            (Buttons::DPAD_DOWN, "dpaddown"),
            (Buttons::DPAD_LEFT, "dpadleft"),
            (Buttons::DPAD_RIGHT, "dpadright"),
        ];
        TABLE
            .iter()
            .filter(|(b, _)| self.contains(*b))
            .map(|&(_, n)| n)
            .collect()
    }
}

/// 10-bit accelerometer sample, widened from the 8-bit wire bytes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AccelSample {
    pub x: u16,
    pub y: u16,
    pub z: u16,
}

/// A visible IR camera point. 0..1023 x, 0..767 y.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct IrPoint {
    pub x: u16,
    pub y: u16,
    pub size: u8,
}

/// MotionPlus angular-rate sample. 14-bit raw units, ~8000 at rest.
/// The fast flags select the high-rate scale for that axis.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MotionSample {
    pub yaw: u16,
    pub roll: u16,
    pub pitch: u16,
    pub yaw_fast: bool,
    pub roll_fast: bool,
    pub pitch_fast: bool,
    /// Pass-through extension port flag reported by the MotionPlus.
    pub extension_connected: bool,
}

/// Nunchuk sample: stick, 10-bit accelerometer, C/Z buttons.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct NunchukSample {
    pub stick_x: u8,
    pub stick_y: u8,
    pub accel_x: u16,
    pub accel_y: u16,
    pub accel_z: u16,
    pub button_c: bool,
    pub button_z: bool,
}

/// Which peripheral is attached to the extension port. Closed union: a
/// decoded extension block is exactly one of these.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum Extension {
    #[default]
    None,
    MotionPlus,
    Nunchuk,
    /// Vendor prefix matched but the identity bytes are unknown.
    Unidentified,
}

impl Extension {
    pub fn is_present(self) -> bool {
        !matches!(self, Extension::None)
    }
}

/// Per-variant payload decoded from the extension block of a data report.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum ExtensionData {
    #[default]
    None,
    MotionPlus(MotionSample),
    Nunchuk(NunchukSample),
}

/// One decoded input report. Fields missing from the report (or dropped by
/// a short frame) are `None`; a short frame is a dropped sample, not an error.
#[derive(Debug, Clone, Default)]
pub struct DecodedReport {
    pub report_tag: u8,
    pub buttons: Option<Buttons>,
    pub accel: Option<AccelSample>,
    pub ir_points: Vec<IrPoint>,
    pub extension: ExtensionData,
    /// From 0x20 status reports only.
    pub status: Option<StatusReport>,
    /// From 0x21 register-read replies only.
    pub register_read: Option<RegisterRead>,
}

/// Decoded 0x20 status report.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StatusReport {
    pub buttons: Buttons,
    pub extension_present: bool,
    pub battery_percent: u8,
}

/// Decoded 0x21 register-read reply.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RegisterRead {
    pub error: u8,
    pub address: u16,
    pub data: Vec<u8>,
}

/// A raw frame as pulled off the HID link, timestamped at read time.
#[derive(Debug, Clone)]
pub struct RawFrame {
    pub timestamp: Instant,
    pub payload: Vec<u8>,
}

/// Pointer operating mode.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum PointerMode {
    /// Absolute positioning from visible IR points.
    Ir,
    /// Frame-to-frame accelerometer delta.
    Accel,
    /// Rate-proportional gyro deviation from neutral.
    Gyro,
    /// Complementary accel/gyro fusion. Primary mode.
    #[default]
    Fusion,
    /// IR when visible, gyro otherwise.
    Hybrid,
}

impl PointerMode {
    pub fn from_name(name: &str) -> Option<PointerMode> {
        match name.trim().to_ascii_lowercase().as_str() {
            "ir" => Some(PointerMode::Ir),
            "accel" => Some(PointerMode::Accel),
            "gyro" | "motionplus" => Some(PointerMode::Gyro),
            "fusion" => Some(PointerMode::Fusion),
            "hybrid" => Some(PointerMode::Hybrid),
            _ => None,
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            PointerMode::Ir => "ir",
            PointerMode::Accel => "accel",
            PointerMode::Gyro => "gyro",
            PointerMode::Fusion => "fusion",
            PointerMode::Hybrid => "hybrid",
        }
    }
}

/// Live sensor aggregate. One instance per connected remote; written by the
/// decode step, read by the fusion engine and external observers.
#[derive(Debug, Clone)]
pub struct SensorSnapshot {
    pub buttons: Buttons,
    /// Calibrated and low-pass-filtered accelerometer.
    pub accel: [f64; 3],
    /// Calibrated and low-pass-filtered gyro rates (raw units from neutral).
    pub gyro: [f64; 3],
    /// Raw gyro triplet for diagnostics.
    pub gyro_raw: [u16; 3],
    /// Per-axis high-rate flags from the last MotionPlus sample.
    pub gyro_fast: [bool; 3],
    pub ir_points: Vec<IrPoint>,
    pub ir_visible: bool,
    pub extension_connected: Option<bool>,
    pub motionplus_connected: bool,
    pub nunchuk_connected: bool,
    pub nunchuk: Option<NunchukSample>,
    /// -1 until the first status report arrives.
    pub battery_percent: i8,
    pub last_report_tag: u8,
    pub effective_mode: PointerMode,
}

impl Default for SensorSnapshot {
    fn default() -> Self {
        SensorSnapshot {
            buttons: Buttons::empty(),
            accel: [0.0; 3],
            gyro: [0.0; 3],
            gyro_raw: [0; 3],
            gyro_fast: [false; 3],
            ir_points: Vec::new(),
            ir_visible: false,
            extension_connected: None,
            motionplus_connected: false,
            nunchuk_connected: false,
            nunchuk: None,
            battery_percent: -1,
            last_report_tag: 0,
            effective_mode: PointerMode::default(),
        }
    }
}

/// Connection lifecycle state pushed to observers on every transition.
#[derive(Debug, Clone, Default)]
pub struct ConnectionState {
    pub connected: bool,
    pub reconnecting: bool,
    pub control_enabled: bool,
    pub active_profile: String,
    pub desired_mode: PointerMode,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn button_names_match_set_bits() {
        let b = Buttons::A | Buttons::PLUS | Buttons::DPAD_LEFT;
        let names = b.names();
        assert_eq!(names, vec!["a", "plus", "dpadleft"]);
    }

    #[test]
    fn mode_names_round_trip() {
        for mode in [
            PointerMode::Ir,
            PointerMode::Accel,
            PointerMode::Gyro,
            PointerMode::Fusion,
            PointerMode::Hybrid,
        ] {
            assert_eq!(PointerMode::from_name(mode.name()), Some(mode));
        }
        assert_eq!(PointerMode::from_name("MotionPlus"), Some(PointerMode::Gyro));
        assert_eq!(PointerMode::from_name("bogus"), None);
    }
}
