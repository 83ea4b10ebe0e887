/// Errors that can occur when talking to the remote or driving the pointer.
#[derive(Debug, thiserror::Error)]
pub enum WiimoteError {
    #[error("HID error: {0}")]
    Hid(#[from] hidapi::HidError),

    #[error("device not found (VID=057E PID=0306/0330)")]
    DeviceNotFound,

    #[error("read timed out")]
    Timeout,

    #[error("connection lost: {0}")]
    Disconnected(String),

    #[error("write failed: {0}")]
    Write(String),

    #[error("extension identity ambiguous: {0:02x?}")]
    NegotiationAmbiguous([u8; 6]),

    #[error("calibration collected no usable samples")]
    CalibrationInsufficientSamples,

    #[error("frame stream stopped")]
    StreamStopped,
}

impl WiimoteError {
    /// True for errors that are absorbed at the transport boundary and
    /// silently retried instead of tearing down the connection.
    pub fn is_benign(&self) -> bool {
        matches!(self, WiimoteError::Timeout)
    }
}
