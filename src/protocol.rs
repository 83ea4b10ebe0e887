use crate::types::{
    AccelSample, Buttons, DecodedReport, Extension, ExtensionData, IrPoint, MotionSample,
    NunchukSample, RegisterRead, StatusReport,
};

// -- Bluetooth HID identifiers --
pub const VID: u16 = 0x057E;
/// Original remote (RVL-CNT-01).
pub const PID_REMOTE: u16 = 0x0306;
/// Remote Plus (RVL-CNT-01-TR, built-in MotionPlus).
pub const PID_REMOTE_PLUS: u16 = 0x0330;

/// Largest input report the remote produces (0x3E/0x3F interleaved aside).
pub const MAX_FRAME: usize = 23;

// -- Input report tags --
pub const RPT_STATUS: u8 = 0x20;
pub const RPT_READ_REPLY: u8 = 0x21;
pub const RPT_ACK: u8 = 0x22;
pub const RPT_BTN_ACC: u8 = 0x31;
pub const RPT_BTN_ACC_EXT8: u8 = 0x32;
pub const RPT_BTN_ACC_IR: u8 = 0x33;
pub const RPT_BTN_ACC_EXT16: u8 = 0x35;
pub const RPT_BTN_ACC_IR_EXT: u8 = 0x36;
pub const RPT_BTN_ACC_IR_EXT6: u8 = 0x37;

// -- Output report tags --
pub const OUT_LED: u8 = 0x11;
pub const OUT_REPORT_MODE: u8 = 0x12;
pub const OUT_IR_ENABLE_1: u8 = 0x13;
pub const OUT_IR_ENABLE_2: u8 = 0x1A;
pub const OUT_STATUS_REQUEST: u8 = 0x15;
pub const OUT_WRITE_REGISTER: u8 = 0x16;
pub const OUT_READ_REGISTER: u8 = 0x17;

/// Reconstructed IR axis value that marks an invisible point.
const IR_INVISIBLE: u16 = 0x3FF;

/// Tags whose payload carries an accelerometer block.
pub fn tag_has_accel(tag: u8) -> bool {
    matches!(tag, 0x31 | 0x32 | 0x33 | 0x35 | 0x36 | 0x37)
}

/// Tags whose payload carries an IR block at offset 6.
pub fn tag_has_ir(tag: u8) -> bool {
    matches!(tag, 0x33 | 0x36 | 0x37)
}

/// Byte offset of the extension block for the given tag, if any.
pub fn extension_offset(tag: u8) -> Option<usize> {
    match tag {
        // buttons(2) + accel(3) after the tag byte
        0x32 | 0x35 => Some(6),
        // ... + IR(10)
        0x36 | 0x37 => Some(16),
        _ => None,
    }
}

/// Parse the two button bytes into a bitmap. Only the documented bits are
/// kept; the accelerometer LSBs riding in the same bytes are masked off.
pub fn parse_buttons(b0: u8, b1: u8) -> Buttons {
    let raw = u16::from(b0 & 0x1F) | (u16::from(b1 & 0x9F) << 8);
    Buttons::from_bits_truncate(raw)
}

/// Widen the three 8-bit accelerometer samples to 10 bits using the
/// low-order bits stashed in the button bytes: X takes bits 5-6 of byte0,
/// Y takes bit5 of byte1, Z takes bit6 of byte1.
pub fn parse_accel(b0: u8, b1: u8, ax: u8, ay: u8, az: u8) -> AccelSample {
    AccelSample {
        x: (u16::from(ax) << 2) | u16::from((b0 >> 5) & 0x03),
        y: (u16::from(ay) << 1) | u16::from((b1 >> 5) & 0x01),
        z: (u16::from(az) << 1) | u16::from((b1 >> 6) & 0x01),
    }
}

/// Parse up to 4 IR points from a basic-format block (3 bytes per point).
/// Points whose reconstructed axis reads 0x3FF are invisible and omitted.
pub fn parse_ir(block: &[u8]) -> Vec<IrPoint> {
    let mut points = Vec::new();
    for chunk in block.chunks_exact(3).take(4) {
        let x_lo = chunk[0];
        let y_lo = chunk[1];
        let packed = chunk[2];
        let x = (u16::from((packed >> 4) & 0x03) << 8) | u16::from(x_lo);
        let y = (u16::from((packed >> 6) & 0x03) << 8) | u16::from(y_lo);
        if x != IR_INVISIBLE && y != IR_INVISIBLE {
            points.push(IrPoint {
                x,
                y,
                size: packed & 0x0F,
            });
        }
    }
    points
}

/// Decode a 6-byte MotionPlus block. 14-bit rates; bit1 of the high bytes is
/// the slow-mode flag (0 = fast), bit0 of b5 the extension flag (0 = present).
pub fn parse_motionplus(block: &[u8]) -> Option<MotionSample> {
    if block.len() < 6 {
        return None;
    }
    let (b0, b1, b2, b3, b4, b5) = (block[0], block[1], block[2], block[3], block[4], block[5]);
    Some(MotionSample {
        yaw: u16::from(b0) | (u16::from(b3 & 0xFC) << 6),
        roll: u16::from(b1) | (u16::from(b4 & 0xFC) << 6),
        pitch: u16::from(b2) | (u16::from(b5 & 0xFC) << 6),
        yaw_fast: (b3 & 0x02) == 0,
        roll_fast: (b4 & 0x02) == 0,
        pitch_fast: (b5 & 0x02) == 0,
        extension_connected: (b5 & 0x01) == 0,
    })
}

/// Decode a 6-byte Nunchuk block. Accelerometer axes widen like the main
/// accelerometer; C/Z are active-low in the last byte.
pub fn parse_nunchuk(block: &[u8]) -> Option<NunchukSample> {
    if block.len() < 6 {
        return None;
    }
    let btns = block[5];
    Some(NunchukSample {
        stick_x: block[0],
        stick_y: block[1],
        accel_x: (u16::from(block[2]) << 2) | u16::from((btns >> 2) & 0x03),
        accel_y: (u16::from(block[3]) << 2) | u16::from((btns >> 4) & 0x03),
        accel_z: (u16::from(block[4]) << 2) | u16::from((btns >> 6) & 0x03),
        button_c: (btns & 0x02) == 0,
        button_z: (btns & 0x01) == 0,
    })
}

/// Battery byte to percentage on the 0-255 scale.
pub fn battery_percent(raw: u8) -> u8 {
    (u32::from(raw) * 100 / 255) as u8
}

/// Decode one raw frame. `extension` selects which decoder the extension
/// block goes through. Missing or undersized fields come back as `None`/empty
/// so a short frame reads as a dropped sample, never an error.
pub fn decode(frame: &[u8], extension: Extension) -> DecodedReport {
    let mut report = DecodedReport::default();
    if frame.len() < 3 {
        return report;
    }

    let tag = frame[0];
    report.report_tag = tag;

    match tag {
        RPT_STATUS => {
            if frame.len() >= 7 {
                report.status = Some(StatusReport {
                    buttons: parse_buttons(frame[1], frame[2]),
                    // flags bit1 set = extension absent
                    extension_present: (frame[3] & 0x02) == 0,
                    battery_percent: battery_percent(frame[6]),
                });
            }
        }
        RPT_READ_REPLY => {
            if frame.len() >= 6 {
                let size = usize::from(frame[3] >> 4) + 1;
                let error = frame[3] & 0x0F;
                let address = (u16::from(frame[4]) << 8) | u16::from(frame[5]);
                let avail = frame.len().saturating_sub(6).min(size).min(16);
                report.register_read = Some(RegisterRead {
                    error,
                    address,
                    data: frame[6..6 + avail].to_vec(),
                });
            }
        }
        0x30..=0x3F => {
            report.buttons = Some(parse_buttons(frame[1], frame[2]));

            if tag_has_accel(tag) && frame.len() >= 6 {
                report.accel = Some(parse_accel(frame[1], frame[2], frame[3], frame[4], frame[5]));
            }

            if tag_has_ir(tag) && frame.len() >= 16 {
                report.ir_points = parse_ir(&frame[6..16]);
            }

            if let Some(off) = extension_offset(tag) {
                if frame.len() > off {
                    let block = &frame[off..];
                    report.extension = match extension {
                        Extension::MotionPlus => parse_motionplus(block)
                            .map(ExtensionData::MotionPlus)
                            .unwrap_or_default(),
                        Extension::Nunchuk => parse_nunchuk(block)
                            .map(ExtensionData::Nunchuk)
                            .unwrap_or_default(),
                        Extension::None | Extension::Unidentified => ExtensionData::None,
                    };
                }
            }
        }
        _ => {}
    }

    report
}

// -- Output report builders. The rumble motor state rides in bit0 of the
// first payload byte of every output report, so builders take it explicitly.

/// `[0x11, led_mask | rumble]`. LED mask uses bits 4-7 for players 1-4.
pub fn led_command(led_mask: u8, rumble: bool) -> Vec<u8> {
    vec![OUT_LED, (led_mask & 0xF0) | rumble_bit(rumble)]
}

pub fn led_mask(led1: bool, led2: bool, led3: bool, led4: bool) -> u8 {
    (if led1 { 0x10 } else { 0 })
        | (if led2 { 0x20 } else { 0 })
        | (if led3 { 0x40 } else { 0 })
        | (if led4 { 0x80 } else { 0 })
}

/// `[0x12, flags | rumble, tag]`. Continuous reporting sets flag 0x04.
pub fn report_mode_command(tag: u8, continuous: bool, rumble: bool) -> Vec<u8> {
    let flags = if continuous { 0x04 } else { 0x00 };
    vec![OUT_REPORT_MODE, flags | rumble_bit(rumble), tag]
}

/// Two-report camera enable sequence: `[0x13, 0x04]`, `[0x1A, 0x04]`.
pub fn ir_enable_commands(enable: bool, rumble: bool) -> [Vec<u8>; 2] {
    let flag = if enable { 0x04 } else { 0x00 };
    [
        vec![OUT_IR_ENABLE_1, flag | rumble_bit(rumble)],
        vec![OUT_IR_ENABLE_2, flag | rumble_bit(rumble)],
    ]
}

/// `[0x15, 0x00]` — answered by a 0x20 status report.
pub fn status_request(rumble: bool) -> Vec<u8> {
    vec![OUT_STATUS_REQUEST, rumble_bit(rumble)]
}

/// `[0x16, addr(4B LE), size, data padded to 16]`. Register frames carry no
/// rumble bit: the low address byte occupies the position it would ride in.
pub fn write_register_command(address: u32, data: &[u8]) -> Vec<u8> {
    let mut cmd = Vec::with_capacity(22);
    cmd.push(OUT_WRITE_REGISTER);
    cmd.extend_from_slice(&address.to_le_bytes());
    let len = data.len().min(16);
    cmd.push(len as u8);
    cmd.extend_from_slice(&data[..len]);
    cmd.resize(22, 0);
    cmd
}

/// `[0x17, addr(3B LE), size(2B LE)]` — answered by a 0x21 report.
pub fn read_register_command(address: u32, size: u16) -> Vec<u8> {
    let addr = address.to_le_bytes();
    let sz = size.to_le_bytes();
    vec![OUT_READ_REGISTER, addr[0], addr[1], addr[2], sz[0], sz[1]]
}

fn rumble_bit(rumble: bool) -> u8 {
    if rumble {
        0x01
    } else {
        0x00
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn buttons_plus_b_a() {
        let b = parse_buttons(0x10, 0x0C);
        assert_eq!(b, Buttons::PLUS | Buttons::B | Buttons::A);
    }

    #[test]
    fn buttons_mask_out_accel_bits() {
        // bits 5-6 of byte0 and 5-6 of byte1 carry accelerometer LSBs
        let b = parse_buttons(0x60, 0x60);
        assert_eq!(b, Buttons::empty());
    }

    #[test]
    fn accel_widening_exact() {
        for base in [0u8, 1, 0x7F, 0xFE, 0xFF] {
            for suffix in 0u8..4 {
                let b0 = suffix << 5;
                let s = parse_accel(b0, 0, base, 0, 0);
                assert_eq!(s.x, (u16::from(base) << 2) | u16::from(suffix));
                assert!(s.x <= 1023);
            }
            for bit in 0u8..2 {
                let b1 = (bit << 5) | (bit << 6);
                let s = parse_accel(0, b1, 0, base, base);
                assert_eq!(s.y, (u16::from(base) << 1) | u16::from(bit));
                assert_eq!(s.z, (u16::from(base) << 1) | u16::from(bit));
            }
        }
    }

    #[test]
    fn ir_point_decode() {
        let packed = (2u8 << 4) | (1 << 6) | 0x0A;
        let block = [0x34, 0x12, packed, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0];
        let pts = parse_ir(&block);
        assert_eq!(pts.len(), 1);
        assert_eq!(pts[0], IrPoint { x: 0x234, y: 0x112, size: 0x0A });
    }

    #[test]
    fn ir_invisible_point_omitted() {
        // 0xFF low bytes with high bits 3 reconstruct to 0x3FF on both axes
        let block = [0xFF, 0xFF, 0xF0, 0xFF, 0xFF, 0xF0, 0xFF, 0xFF, 0xF0, 0];
        assert!(parse_ir(&block).is_empty());
    }

    #[test]
    fn motionplus_decode() {
        // 0xFE high bytes: bit1 set = slow range, b5 bit0 clear = extension
        let s = parse_motionplus(&[0x10, 0x20, 0x30, 0xFE, 0xFE, 0xFE]).unwrap();
        assert_eq!(s.yaw, 0x3F10);
        assert_eq!(s.roll, 0x3F20);
        assert_eq!(s.pitch, 0x3F30);
        assert!(s.extension_connected);
        assert!(!s.yaw_fast && !s.roll_fast && !s.pitch_fast);
    }

    #[test]
    fn motionplus_fast_flags_are_active_low() {
        // bit1 clear on every high byte = fast range; b5 bit0 set = no ext
        let s = parse_motionplus(&[0x00, 0x00, 0x00, 0xFC, 0xFC, 0xFD]).unwrap();
        assert!(s.yaw_fast && s.roll_fast && s.pitch_fast);
        assert!(!s.extension_connected);
    }

    #[test]
    fn nunchuk_decode() {
        let s = parse_nunchuk(&[0x80, 0x90, 0x20, 0x30, 0x40, 0xD9]).unwrap();
        assert_eq!(s.stick_x, 0x80);
        assert_eq!(s.stick_y, 0x90);
        assert_eq!(s.accel_x, 0x82);
        assert_eq!(s.accel_y, 0xC1);
        assert_eq!(s.accel_z, 0x103);
        assert!(s.button_c);
        assert!(!s.button_z);
    }

    #[test]
    fn status_report_battery() {
        let frame = [0x20, 0x00, 0x00, 0x02, 0x00, 0x00, 0x80];
        let r = decode(&frame, Extension::None);
        let status = r.status.unwrap();
        assert_eq!(status.battery_percent, 50);
        // flags bit1 set = extension absent
        assert!(!status.extension_present);
    }

    #[test]
    fn battery_scale_endpoints() {
        assert_eq!(battery_percent(0x00), 0);
        assert_eq!(battery_percent(0x80), 50);
        assert_eq!(battery_percent(0xFF), 100);
    }

    #[test]
    fn read_reply_decode() {
        let mut frame = vec![0x21, 0x00, 0x00, 0x50, 0x00, 0xFA];
        frame.extend_from_slice(&[0x00, 0x00, 0xA6, 0x20, 0x04, 0x05]);
        let r = decode(&frame, Extension::None);
        let reply = r.register_read.unwrap();
        assert_eq!(reply.error, 0);
        assert_eq!(reply.address, 0x00FA);
        assert_eq!(reply.data, vec![0x00, 0x00, 0xA6, 0x20, 0x04, 0x05]);
    }

    #[test]
    fn short_frame_is_dropped_sample() {
        let r = decode(&[0x33, 0x00], Extension::None);
        assert!(r.buttons.is_none());
        assert!(r.accel.is_none());
        assert!(r.ir_points.is_empty());

        // buttons-only length on an accel tag: buttons decode, accel doesn't
        let r = decode(&[0x31, 0x10, 0x0C], Extension::None);
        assert!(r.buttons.is_some());
        assert!(r.accel.is_none());
    }

    #[test]
    fn data_report_full_decode() {
        // 0x37: buttons + accel + IR(10) + 6B extension
        let mut frame = vec![0x37, 0x10, 0x0C, 0x80, 0x80, 0x80];
        frame.extend_from_slice(&[0x34, 0x12, (2 << 4) | (1 << 6), 0xFF, 0xFF, 0xF0, 0xFF, 0xFF, 0xF0, 0x00]);
        frame.extend_from_slice(&[0x10, 0x20, 0x30, 0xFC, 0xFC, 0xFC]);
        let r = decode(&frame, Extension::MotionPlus);
        assert_eq!(r.buttons.unwrap(), Buttons::PLUS | Buttons::B | Buttons::A);
        assert!(r.accel.is_some());
        assert_eq!(r.ir_points.len(), 1);
        match r.extension {
            ExtensionData::MotionPlus(m) => assert_eq!(m.yaw, 0x3F10),
            other => panic!("expected MotionPlus extension, got {:?}", other),
        }
    }

    #[test]
    fn output_builders() {
        assert_eq!(led_command(led_mask(true, false, false, false), false), vec![0x11, 0x10]);
        assert_eq!(led_command(0x10, true), vec![0x11, 0x11]);
        assert_eq!(report_mode_command(0x37, true, false), vec![0x12, 0x04, 0x37]);
        assert_eq!(status_request(false), vec![0x15, 0x00]);

        let w = write_register_command(0x00A4_00F0, &[0x55]);
        assert_eq!(w.len(), 22);
        assert_eq!(&w[..7], &[0x16, 0xF0, 0x00, 0xA4, 0x00, 0x01, 0x55]);
        assert!(w[7..].iter().all(|&b| b == 0));

        let r = read_register_command(0x00A4_00FA, 6);
        assert_eq!(r, vec![0x17, 0xFA, 0x00, 0xA4, 0x06, 0x00]);
    }
}
