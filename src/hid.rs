use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Mutex, MutexGuard};
use std::time::Instant;

use hidapi::HidDevice;

use crate::protocol::{self, MAX_FRAME};
use crate::types::RawFrame;
use crate::{Result, WiimoteError};

/// HID transport layer over hidapi. Owns the raw channel: timed frame reads
/// and output-report writers. The device handle lives behind a mutex so the
/// transport can be shared between the supervisor thread and the control
/// surface; writers may block behind an in-flight timed read. No protocol
/// state beyond the rumble bit, which the remote requires in every output
/// report.
pub struct HidTransport {
    device: Mutex<HidDevice>,
    rumble: AtomicBool,
}

impl HidTransport {
    pub fn new(device: HidDevice) -> Self {
        Self {
            device: Mutex::new(device),
            rumble: AtomicBool::new(false),
        }
    }

    fn device(&self) -> Result<MutexGuard<'_, HidDevice>> {
        self.device
            .lock()
            .map_err(|_| WiimoteError::Disconnected("device handle poisoned".into()))
    }

    /// Blocking read with a timeout. `Ok(None)` on timeout so benign stalls
    /// never surface as errors; anything else from the OS is a real failure.
    pub fn read_frame(&self, timeout_ms: i32) -> Result<Option<RawFrame>> {
        let mut buf = [0u8; MAX_FRAME];
        match self.device()?.read_timeout(&mut buf, timeout_ms) {
            Ok(0) => Ok(None),
            Ok(n) => Ok(Some(RawFrame {
                timestamp: Instant::now(),
                payload: buf[..n].to_vec(),
            })),
            Err(e) => Err(WiimoteError::Disconnected(e.to_string())),
        }
    }

    /// Write a raw output report. Failures are returned, not absorbed: the
    /// caller decides whether a failed write is worth tearing anything down.
    pub fn write_report(&self, report: &[u8]) -> Result<()> {
        log::trace!("tx {:02x?}", report);
        let written = self
            .device()?
            .write(report)
            .map_err(|e| WiimoteError::Write(e.to_string()))?;
        if written == 0 {
            return Err(WiimoteError::Write("wrote 0 bytes".into()));
        }
        Ok(())
    }

    pub fn set_leds(&self, led_mask: u8) -> Result<()> {
        self.write_report(&protocol::led_command(led_mask, self.rumble()))
    }

    pub fn set_rumble(&self, enable: bool) -> Result<()> {
        self.rumble.store(enable, Ordering::Relaxed);
        // Rumble piggybacks on the LED report; player-1 LED stays lit.
        self.write_report(&protocol::led_command(0x10, enable))
    }

    pub fn set_report_mode(&self, tag: u8, continuous: bool) -> Result<()> {
        self.write_report(&protocol::report_mode_command(tag, continuous, self.rumble()))
    }

    pub fn enable_ir_camera(&self, enable: bool) -> Result<()> {
        for cmd in protocol::ir_enable_commands(enable, self.rumble()) {
            self.write_report(&cmd)?;
        }
        if enable {
            // Minimal sensitivity block; full tuning tables are not needed
            // for pointer use.
            self.write_register(0x04B0_0030, &[0x08])?;
        }
        Ok(())
    }

    pub fn request_status(&self) -> Result<()> {
        self.write_report(&protocol::status_request(self.rumble()))
    }

    pub fn write_register(&self, address: u32, data: &[u8]) -> Result<()> {
        self.write_report(&protocol::write_register_command(address, data))
    }

    /// Issue a register read request. The reply arrives asynchronously as a
    /// 0x21 input report; see `extension::read_register`.
    pub fn request_register_read(&self, address: u32, size: u16) -> Result<()> {
        self.write_report(&protocol::read_register_command(address, size))
    }

    pub fn rumble(&self) -> bool {
        self.rumble.load(Ordering::Relaxed)
    }
}
