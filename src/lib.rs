//! # wiimouse - Wii Remote pointer driver
//!
//! Bluetooth-HID driver turning a Wii Remote into a pointing device using
//! hidapi. Provides:
//! - Remote discovery, pairing, and self-healing reconnection
//! - Report decoding (buttons, accelerometer, IR camera, MotionPlus,
//!   Nunchuk) with extension negotiation and rest calibration
//! - A sensor-fusion engine producing pointer movement in several modes
//!   (absolute IR, gyro rate, accelerometer delta, complementary-filter
//!   fusion)
//!
//! ## Quick Start
//! ```no_run
//! use std::sync::Arc;
//! use wiimouse::{MemoryConfig, MouseDriver, NullSink, Settings, Wiimote};
//!
//! let config = Arc::new(MemoryConfig::new());
//! let wiimote = Wiimote::open(Settings::load(config.as_ref())).unwrap();
//! let mut driver = MouseDriver::new(wiimote, Box::new(NullSink), config);
//! loop {
//!     driver.tick().unwrap();
//! }
//! ```

pub mod calibration;
pub mod config;
pub mod device;
pub mod driver;
pub mod error;
pub mod extension;
pub mod fusion;
pub mod gestures;
pub mod hid;
pub mod protocol;
pub mod sink;
pub mod types;

pub use calibration::{Calibrator, Offsets};
pub use config::{ConfigSource, MemoryConfig, Settings};
pub use device::{list_remotes, RemoteInfo, Wiimote};
pub use driver::MouseDriver;
pub use error::WiimoteError;
pub use fusion::{FusionEngine, PointerUpdate};
pub use gestures::{Gesture, GestureDetector};
pub use sink::{NullSink, PointerSink, RecordingSink, SinkAction};
pub use types::*;

/// Result type alias for wiimouse operations.
pub type Result<T> = std::result::Result<T, WiimoteError>;
