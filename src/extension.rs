use std::time::Duration;

use crate::hid::HidTransport;
use crate::protocol::{self, RPT_READ_REPLY};
use crate::types::{Extension, MotionSample, RegisterRead};
use crate::{Result, WiimoteError};

// Extension port control registers (offsets into the 0x04Axxxxx register
// space, written through report 0x16).
const REG_EXT_WAKE: u32 = 0x04A4_00F0;
const REG_EXT_MODE: u32 = 0x04A4_00FB;
const REG_EXT_IDENT: u32 = 0x04A4_00FA;
const REG_MOTIONPLUS_ENABLE: u32 = 0x04A6_00FE;

const EXT_WAKE_BYTE: u8 = 0x55;
const EXT_MODE_BYTE: u8 = 0x00;
const MOTIONPLUS_ENABLE_BYTE: u8 = 0x04;

const IDENT_MOTIONPLUS: [u8; 6] = [0x00, 0x00, 0xA6, 0x20, 0x04, 0x05];
const IDENT_NUNCHUK: [u8; 6] = [0x00, 0x00, 0xA4, 0x20, 0x00, 0x00];

/// Reply-poll budget while waiting for the async 0x21 report.
const READ_REPLY_ATTEMPTS: u32 = 40;
const READ_REPLY_TIMEOUT_MS: i32 = 50;

/// Classify a 6-byte identity block.
pub fn classify_identity(ident: &[u8; 6]) -> Extension {
    if *ident == IDENT_MOTIONPLUS {
        return Extension::MotionPlus;
    }
    if *ident == IDENT_NUNCHUK {
        return Extension::Nunchuk;
    }
    // Common vendor prefix in bytes 2-3: something is plugged in even if we
    // cannot name it.
    if matches!(&ident[2..4], [0xA4, 0x20] | [0xA6, 0x20]) {
        return Extension::Unidentified;
    }
    Extension::None
}

/// Run the two-step activation sequence and classify whatever answers on the
/// identity register. Errors only on transport failure; an unreadable or
/// blank identity is `Extension::None`.
pub fn negotiate(transport: &HidTransport) -> Result<Extension> {
    transport.write_register(REG_EXT_WAKE, &[EXT_WAKE_BYTE])?;
    std::thread::sleep(Duration::from_millis(50));
    transport.write_register(REG_EXT_MODE, &[EXT_MODE_BYTE])?;
    std::thread::sleep(Duration::from_millis(50));

    // MotionPlus only appears on the extension bus after activation.
    if let Err(e) = transport.write_register(REG_MOTIONPLUS_ENABLE, &[MOTIONPLUS_ENABLE_BYTE]) {
        log::debug!("MotionPlus enable write failed: {} (no MotionPlus?)", e);
    }
    std::thread::sleep(Duration::from_millis(100));

    let ident = match read_identity(transport) {
        Ok(ident) => ident,
        Err(WiimoteError::Timeout) => {
            log::info!("no identity reply; assuming no extension");
            return Ok(Extension::None);
        }
        Err(e) => return Err(e),
    };

    let kind = classify_identity(&ident);
    log::info!("extension identity {:02x?} -> {:?}", ident, kind);
    Ok(kind)
}

/// Read the 6-byte identity block from the extension register space.
pub fn read_identity(transport: &HidTransport) -> Result<[u8; 6]> {
    let reply = read_register(transport, REG_EXT_IDENT, 6)?;
    if reply.error != 0 {
        log::debug!("identity read error nibble {}", reply.error);
        return Err(WiimoteError::Timeout);
    }
    let mut ident = [0u8; 6];
    let n = reply.data.len().min(6);
    ident[..n].copy_from_slice(&reply.data[..n]);
    Ok(ident)
}

/// Synchronous register read: issue the request, then poll input frames
/// until the matching 0x21 reply shows up or the attempt budget runs out.
/// Data reports arriving in between are discarded — the caller is expected
/// to be in an initialization window, not mid-stream.
pub fn read_register(transport: &HidTransport, address: u32, size: u16) -> Result<RegisterRead> {
    transport.request_register_read(address, size)?;

    for _ in 0..READ_REPLY_ATTEMPTS {
        let frame = match transport.read_frame(READ_REPLY_TIMEOUT_MS)? {
            Some(f) => f,
            None => continue,
        };
        if frame.payload.first() != Some(&RPT_READ_REPLY) {
            continue;
        }
        let decoded = protocol::decode(&frame.payload, Extension::None);
        if let Some(reply) = decoded.register_read {
            return Ok(reply);
        }
    }
    Err(WiimoteError::Timeout)
}

/// Scored sliding-window search for the 6 MotionPlus bytes inside an
/// extension payload. Some firmware revisions shift the block by a byte or
/// two, so a fixed offset misreads; instead every window is decoded as a
/// candidate and scored. The weights and threshold are empirical, not
/// protocol truth — they stay adjustable here rather than baked into the
/// codec.
#[derive(Debug, Clone, Copy)]
pub struct MotionSearch {
    /// Weight for axes whose high-order status bits are populated.
    pub high_bits_weight: u32,
    /// Weight for values inside the plausible mid-range.
    pub mid_range_weight: u32,
    /// Weight for merely non-zero values.
    pub non_zero_weight: u32,
    /// Minimum accepted score; below it the frame reports no motion data.
    pub min_score: u32,
    pub plausible_min: u16,
    pub plausible_max: u16,
}

impl Default for MotionSearch {
    fn default() -> Self {
        MotionSearch {
            high_bits_weight: 3,
            mid_range_weight: 2,
            non_zero_weight: 1,
            min_score: 2,
            plausible_min: 1000,
            plausible_max: 16000,
        }
    }
}

impl MotionSearch {
    /// Locate and decode the best-scoring MotionPlus window, if any window
    /// clears the threshold. Returns the winning offset for diagnostics.
    pub fn locate(&self, payload: &[u8]) -> Option<(usize, MotionSample)> {
        let mut best: Option<(u32, usize, MotionSample)> = None;

        for (offset, window) in payload.windows(6).enumerate() {
            let Some(sample) = protocol::parse_motionplus(window) else {
                continue;
            };
            let score = self.score(window, &sample);
            match &best {
                Some((s, _, _)) if *s >= score => {}
                _ => best = Some((score, offset, sample)),
            }
        }

        match best {
            Some((score, offset, sample)) if score >= self.min_score => {
                log::trace!("motion window at +{} (score {})", offset, score);
                Some((offset, sample))
            }
            _ => None,
        }
    }

    fn score(&self, window: &[u8], sample: &MotionSample) -> u32 {
        let axes = [sample.yaw, sample.roll, sample.pitch];

        // High-order status bits live in the top 6 bits of bytes 3..6.
        let high_bits = window[3..6].iter().filter(|&&b| b & 0xFC != 0).count() as u32;
        let mid_range = axes
            .iter()
            .filter(|&&v| (self.plausible_min..=self.plausible_max).contains(&v))
            .count() as u32;
        let non_zero = axes.iter().filter(|&&v| v != 0).count() as u32;

        self.high_bits_weight * high_bits
            + self.mid_range_weight * mid_range
            + self.non_zero_weight * non_zero
    }
}
