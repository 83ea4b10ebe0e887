use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use crossbeam_channel::{Receiver, Sender};
use hidapi::HidApi;

use crate::calibration::{Calibrator, Offsets};
use crate::config::Settings;
use crate::extension::{self, MotionSearch};
use crate::hid::HidTransport;
use crate::protocol::{self, PID_REMOTE, PID_REMOTE_PLUS, VID};
use crate::types::{
    ConnectionState, Extension, ExtensionData, PointerMode, RawFrame, SensorSnapshot,
};
use crate::{Result, WiimoteError};

/// How long the stream may emit the wrong report tag before the desired
/// mode is pushed again. Status reports silently reset the mode.
const MODE_WATCHDOG: Duration = Duration::from_secs(1);

fn is_remote_device(d: &hidapi::DeviceInfo) -> bool {
    d.vendor_id() == VID && (d.product_id() == PID_REMOTE || d.product_id() == PID_REMOTE_PLUS)
}

/// Linux hidraw exposes interface 0; other platforms report the desktop
/// usage page.
fn is_preferred_interface(d: &hidapi::DeviceInfo) -> bool {
    d.interface_number() <= 0 || d.usage_page() == 0x0001
}

/// First device matching the preferred interface shape, else the first
/// match at all. Some stacks never expose the preferred usage page.
fn pick_remote<T>(
    items: impl Iterator<Item = T>,
    is_remote: impl Fn(&T) -> bool,
    preferred: impl Fn(&T) -> bool,
) -> Option<T> {
    let mut fallback = None;
    for item in items {
        if !is_remote(&item) {
            continue;
        }
        if preferred(&item) {
            return Some(item);
        }
        if fallback.is_none() {
            fallback = Some(item);
        }
    }
    fallback
}

/// Identity of a paired remote found during enumeration.
#[derive(Debug, Clone)]
pub struct RemoteInfo {
    pub path: String,
    pub product_id: u16,
    pub serial: String,
}

/// List all paired remotes visible to hidapi.
pub fn list_remotes() -> Result<Vec<RemoteInfo>> {
    let api = HidApi::new()?;
    let mut remotes = Vec::new();
    for d in api.device_list() {
        if !is_remote_device(d) {
            continue;
        }
        remotes.push(RemoteInfo {
            path: d.path().to_str().unwrap_or("").to_string(),
            product_id: d.product_id(),
            serial: d.serial_number().unwrap_or("").to_string(),
        });
    }
    Ok(remotes)
}

/// Open the first paired remote, re-enumerating until the timeout runs out.
/// A zero timeout does a single enumeration pass.
fn open_transport(timeout: Duration) -> Result<HidTransport> {
    let mut api = HidApi::new()?;
    let deadline = Instant::now() + timeout;

    loop {
        if let Some(hid_info) =
            pick_remote(api.device_list(), |d| is_remote_device(d), |d| {
                is_preferred_interface(d)
            })
        {
            let path = hid_info.path().to_owned();
            let product_id = hid_info.product_id();
            let device = api.open_path(&path)?;
            log::info!("Opened remote pid=0x{:04x} at {:?}", product_id, path);
            return Ok(HidTransport::new(device));
        }
        if Instant::now() >= deadline {
            return Err(WiimoteError::DeviceNotFound);
        }
        std::thread::sleep(Duration::from_millis(500));
        api.refresh_devices()?;
    }
}

/// Next reconnect delay: multiply by the backoff factor, saturate at max.
/// Jitter is added by the caller at sleep time so this stays deterministic.
fn next_backoff(current: Duration, factor: f64, max: Duration) -> Duration {
    let next = current.mul_f64(factor.max(1.0));
    if next > max {
        max
    } else {
        next
    }
}

/// Report tag to request for the current extension/IR combination.
fn desired_report_tag(extension: Extension, ir: bool) -> u8 {
    match (extension.is_present(), ir) {
        (true, true) => protocol::RPT_BTN_ACC_IR_EXT,
        (true, false) => protocol::RPT_BTN_ACC_EXT16,
        (false, true) => protocol::RPT_BTN_ACC_IR,
        (false, false) => protocol::RPT_BTN_ACC,
    }
}

fn mode_wants_ir(mode: PointerMode) -> bool {
    matches!(mode, PointerMode::Ir | PointerMode::Hybrid)
}

/// Pointer mode actually driven. Auto mode picks from what the hardware
/// offers; a fixed mode falls back gyro-first, then IR, then accelerometer
/// when its sensor is missing.
fn resolve_mode(settings: &Settings, snap: &SensorSnapshot) -> PointerMode {
    // An administratively disabled MotionPlus counts as absent right away.
    let has_gyro = snap.motionplus_connected && settings.motionplus_enabled;
    let has_ir = snap.ir_visible;

    if settings.auto_mode {
        return if has_gyro {
            PointerMode::Fusion
        } else if has_ir {
            PointerMode::Hybrid
        } else {
            PointerMode::Accel
        };
    }

    match settings.desired_mode {
        mode @ (PointerMode::Gyro | PointerMode::Fusion) if has_gyro => mode,
        mode @ (PointerMode::Ir | PointerMode::Hybrid) if has_ir || has_gyro => mode,
        PointerMode::Accel => PointerMode::Accel,
        _ if has_gyro => PointerMode::Gyro,
        _ if has_ir => PointerMode::Ir,
        _ => PointerMode::Accel,
    }
}

fn lowpass(prev: f64, next: f64, alpha: f64) -> f64 {
    prev + alpha.clamp(0.0, 1.0) * (next - prev)
}

/// The first observer notification must reflect the configured mode and
/// profile, not the type defaults.
fn initial_state(settings: &Settings) -> ConnectionState {
    ConnectionState {
        desired_mode: settings.desired_mode,
        active_profile: settings.active_profile.clone(),
        ..ConnectionState::default()
    }
}

/// Clears the low-pass filter state carried in a snapshot. Called after
/// recalibration so stale filtered values do not bleed through the new
/// offsets.
fn reset_filters(snap: &mut SensorSnapshot) {
    snap.accel = [0.0; 3];
    snap.gyro = [0.0; 3];
}

/// Bounded frame queue with drop-oldest overflow. A slow consumer loses
/// stale frames instead of stalling the reader.
struct FrameQueue {
    sender: Sender<RawFrame>,
    receiver: Receiver<RawFrame>,
}

impl FrameQueue {
    fn new(capacity: usize) -> FrameQueue {
        let (sender, receiver) = crossbeam_channel::bounded(capacity);
        FrameQueue { sender, receiver }
    }

    fn push(&self, frame: RawFrame) {
        let mut item = frame;
        loop {
            match self.sender.try_send(item) {
                Ok(()) => return,
                Err(crossbeam_channel::TrySendError::Full(back)) => {
                    let _ = self.receiver.try_recv();
                    item = back;
                }
                Err(crossbeam_channel::TrySendError::Disconnected(_)) => return,
            }
        }
    }
}

struct Inner {
    transport: Mutex<Option<Arc<HidTransport>>>,
    settings: Mutex<Settings>,
    state: Mutex<ConnectionState>,
    snapshot: Mutex<SensorSnapshot>,
    offsets: Mutex<Offsets>,
    extension: Mutex<Extension>,
    observers: Mutex<Vec<Sender<ConnectionState>>>,
    queue: FrameQueue,
    stop: AtomicBool,
    calibrate_request: AtomicBool,
    motion_search: MotionSearch,
}

impl Inner {
    fn notify(&self) {
        let state = match self.state.lock() {
            Ok(s) => s.clone(),
            Err(_) => return,
        };
        if let Ok(mut observers) = self.observers.lock() {
            observers.retain(|tx| tx.send(state.clone()).is_ok());
        }
    }

    fn set_state(&self, update: impl FnOnce(&mut ConnectionState)) {
        if let Ok(mut state) = self.state.lock() {
            update(&mut state);
        }
        self.notify();
    }

    fn settings_snapshot(&self) -> Settings {
        self.settings.lock().map(|s| s.clone()).unwrap_or_default()
    }

    fn current_extension(&self) -> Extension {
        self.extension.lock().map(|e| *e).unwrap_or_default()
    }

    fn transport(&self) -> Result<Arc<HidTransport>> {
        self.transport
            .lock()
            .ok()
            .and_then(|t| t.clone())
            .ok_or_else(|| WiimoteError::Disconnected("no open transport".into()))
    }
}

/// A connected remote with a background supervisor thread.
///
/// The supervisor owns the read side: it pairs, negotiates the extension,
/// calibrates, selects the report mode, and streams raw frames into a
/// bounded latest-wins queue. On transport loss it re-pairs with
/// exponential backoff. Decoding happens on the consumer side in
/// [`Wiimote::read_next`], on the freshest queued frame only.
pub struct Wiimote {
    inner: Arc<Inner>,
    thread: Option<std::thread::JoinHandle<()>>,
}

impl Wiimote {
    /// Open the first paired remote and start the supervisor.
    ///
    /// The initial connection is synchronous so callers see pairing errors
    /// directly; later drops are handled by the reconnect loop.
    pub fn open(settings: Settings) -> Result<Wiimote> {
        let inner = Arc::new(Inner {
            transport: Mutex::new(None),
            state: Mutex::new(initial_state(&settings)),
            settings: Mutex::new(settings),
            snapshot: Mutex::new(SensorSnapshot::default()),
            offsets: Mutex::new(Offsets::default()),
            extension: Mutex::new(Extension::None),
            observers: Mutex::new(Vec::new()),
            queue: FrameQueue::new(256),
            stop: AtomicBool::new(false),
            calibrate_request: AtomicBool::new(false),
            motion_search: MotionSearch::default(),
        });

        let discovery_timeout = inner.settings_snapshot().discovery_timeout;
        let transport = Arc::new(open_transport(discovery_timeout)?);
        connect_sequence(&inner, &transport)?;
        if let Ok(mut slot) = inner.transport.lock() {
            *slot = Some(transport);
        }
        inner.set_state(|s| {
            s.connected = true;
            s.reconnecting = false;
        });

        let supervisor = inner.clone();
        let thread = std::thread::Builder::new()
            .name("wiimouse-supervisor".into())
            .spawn(move || supervisor_loop(supervisor))
            .map_err(|e| WiimoteError::Write(format!("failed to spawn supervisor: {}", e)))?;

        Ok(Wiimote {
            inner,
            thread: Some(thread),
        })
    }

    /// Wait for the next data frame, drain the queue down to the freshest
    /// one, decode it into the shared snapshot, and return the result.
    /// Intermediate frames are discarded undecoded.
    pub fn read_next(&self, timeout: Duration) -> Result<SensorSnapshot> {
        let mut frame = self
            .inner
            .queue
            .receiver
            .recv_timeout(timeout)
            .map_err(|e| match e {
                crossbeam_channel::RecvTimeoutError::Timeout => WiimoteError::Timeout,
                crossbeam_channel::RecvTimeoutError::Disconnected => WiimoteError::StreamStopped,
            })?;
        while let Ok(newer) = self.inner.queue.receiver.try_recv() {
            frame = newer;
        }
        apply_frame(&self.inner, &frame)
            .ok_or_else(|| WiimoteError::Disconnected("snapshot lock poisoned".into()))
    }

    /// Latest snapshot without waiting for a new frame.
    pub fn snapshot(&self) -> SensorSnapshot {
        self.inner
            .snapshot
            .lock()
            .map(|s| s.clone())
            .unwrap_or_default()
    }

    pub fn connection_state(&self) -> ConnectionState {
        self.inner
            .state
            .lock()
            .map(|s| s.clone())
            .unwrap_or_default()
    }

    /// Register an observer for connection transitions. Dropped receivers
    /// are pruned on the next notification.
    pub fn subscribe(&self) -> Receiver<ConnectionState> {
        let (tx, rx) = crossbeam_channel::unbounded();
        if let Ok(mut observers) = self.inner.observers.lock() {
            observers.push(tx);
        }
        rx
    }

    pub fn settings(&self) -> Settings {
        self.inner.settings_snapshot()
    }

    /// Replace the tunables. The supervisor picks up report-mode changes
    /// through its watchdog on the next pass.
    pub fn apply_settings(&self, settings: Settings) {
        let desired = settings.desired_mode;
        let profile = settings.active_profile.clone();
        if let Ok(mut slot) = self.inner.settings.lock() {
            *slot = settings;
        }
        self.inner.set_state(|s| {
            s.desired_mode = desired;
            s.active_profile = profile;
        });
    }

    pub fn set_mode(&self, mode: PointerMode) {
        if let Ok(mut settings) = self.inner.settings.lock() {
            settings.desired_mode = mode;
            settings.auto_mode = false;
        }
        self.inner.set_state(|s| s.desired_mode = mode);
    }

    pub fn set_control_enabled(&self, enabled: bool) {
        self.inner.set_state(|s| s.control_enabled = enabled);
    }

    pub fn set_active_profile(&self, name: &str) {
        let name = name.to_string();
        self.inner.set_state(|s| s.active_profile = name);
    }

    pub fn set_leds(&self, mask: u8) -> Result<()> {
        self.inner.transport()?.set_leds(mask)
    }

    /// Short haptic pulse, used as connect/toggle feedback.
    pub fn rumble_pulse(&self, duration: Duration) -> Result<()> {
        let transport = self.inner.transport()?;
        transport.set_rumble(true)?;
        std::thread::sleep(duration);
        transport.set_rumble(false)
    }

    /// Ask the supervisor to re-run rest calibration between frames.
    pub fn request_calibration(&self) {
        self.inner.calibrate_request.store(true, Ordering::Relaxed);
    }

    pub fn offsets(&self) -> Offsets {
        self.inner.offsets.lock().map(|o| *o).unwrap_or_default()
    }

    pub fn extension(&self) -> Extension {
        self.inner.current_extension()
    }

    pub fn is_running(&self) -> bool {
        !self.inner.stop.load(Ordering::Relaxed)
    }

    /// Stop the supervisor and wait for it to exit.
    pub fn stop(mut self) {
        self.shutdown();
    }

    fn shutdown(&mut self) {
        self.inner.stop.store(true, Ordering::Relaxed);
        if let Some(thread) = self.thread.take() {
            let _ = thread.join();
        }
    }
}

impl Drop for Wiimote {
    fn drop(&mut self) {
        self.shutdown();
    }
}

/// Pairing sequence: player LED, haptic blip, status request plus a bounded
/// wait for any input report, extension negotiation, rest calibration,
/// then report mode and IR camera.
fn connect_sequence(inner: &Inner, transport: &Arc<HidTransport>) -> Result<()> {
    let settings = inner.settings_snapshot();

    transport.set_leds(protocol::led_mask(true, false, false, false))?;
    transport.set_rumble(true)?;
    std::thread::sleep(Duration::from_millis(100));
    transport.set_rumble(false)?;
    transport.request_status()?;
    verify_connection(transport)?;

    let extension = if settings.motionplus_enabled {
        extension::negotiate(transport)?
    } else {
        Extension::None
    };
    if let Ok(mut slot) = inner.extension.lock() {
        *slot = extension;
    }
    if let Ok(mut snap) = inner.snapshot.lock() {
        snap.motionplus_connected = extension == Extension::MotionPlus;
        snap.nunchuk_connected = extension == Extension::Nunchuk;
    }
    log::info!("extension after negotiation: {:?}", extension);

    if settings.auto_calibrate_on_connect {
        run_calibration(inner, transport, extension, &settings);
    }

    apply_report_mode(inner, transport)?;
    Ok(())
}

/// The remote answers the status request within a few reads when the link is
/// actually up; a silent link is treated as a failed pairing.
fn verify_connection(transport: &HidTransport) -> Result<()> {
    for _ in 0..20 {
        if transport.read_frame(50)?.is_some() {
            return Ok(());
        }
    }
    Err(WiimoteError::Timeout)
}

fn run_calibration(
    inner: &Inner,
    transport: &Arc<HidTransport>,
    extension: Extension,
    settings: &Settings,
) {
    let calibrator = Calibrator {
        samples: settings.calibration_samples,
        sample_delay: settings.calibration_sample_delay,
        motion_search: inner.motion_search.clone(),
        ..Calibrator::default()
    };
    match calibrator.calibrate(transport, extension) {
        Ok(offsets) => {
            if let Ok(mut slot) = inner.offsets.lock() {
                *slot = offsets;
            }
            // Filter state predates the new offsets; start clean.
            if let Ok(mut snap) = inner.snapshot.lock() {
                reset_filters(&mut snap);
            }
        }
        Err(e) => log::warn!("calibration skipped: {}", e),
    }
}

/// Push the report mode and IR camera state matching the current extension
/// and pointer mode. Re-sent whenever the stream drifts off the wanted tag.
fn apply_report_mode(inner: &Inner, transport: &Arc<HidTransport>) -> Result<u8> {
    let settings = inner.settings_snapshot();
    let extension = inner.current_extension();

    // Auto mode keeps the camera on so IR visibility can steer the policy.
    let ir = settings.auto_mode || mode_wants_ir(settings.desired_mode);
    let tag = desired_report_tag(extension, ir);
    transport.enable_ir_camera(ir)?;
    transport.set_report_mode(tag, true)?;
    log::debug!("report mode 0x{:02x} (ir={})", tag, ir);
    Ok(tag)
}

/// Outcome of a mid-stream report-mode push. A failed write is logged and
/// skipped; only read-side failures tear the connection down.
fn tag_after_mode_push(pushed: Result<u8>, current: u8) -> u8 {
    match pushed {
        Ok(tag) => tag,
        Err(e) => {
            log::warn!("report mode push failed: {}", e);
            current
        }
    }
}

fn supervisor_loop(inner: Arc<Inner>) {
    log::info!("supervisor started");

    loop {
        if inner.stop.load(Ordering::Relaxed) {
            break;
        }

        let transport = match inner.transport() {
            Ok(t) => t,
            Err(_) => match reconnect(&inner) {
                Some(t) => t,
                None => break,
            },
        };

        if let Err(e) = stream_frames(&inner, &transport) {
            if inner.stop.load(Ordering::Relaxed) {
                break;
            }
            log::warn!("stream lost: {}", e);
            if let Ok(mut slot) = inner.transport.lock() {
                *slot = None;
            }
            inner.set_state(|s| {
                s.connected = false;
                s.reconnecting = true;
            });
        }
    }

    inner.stop.store(true, Ordering::Relaxed);
    inner.set_state(|s| {
        s.connected = false;
        s.reconnecting = false;
    });
    log::info!("supervisor stopped");
}

/// Read frames until the transport fails or stop is requested. Data frames
/// go to the queue raw; status and register replies are decoded inline
/// because they carry state the supervisor itself acts on.
fn stream_frames(inner: &Inner, transport: &Arc<HidTransport>) -> Result<()> {
    let settings = inner.settings_snapshot();
    let ir = settings.auto_mode || mode_wants_ir(settings.desired_mode);
    let expected = desired_report_tag(inner.current_extension(), ir);
    let mut wanted_tag = tag_after_mode_push(apply_report_mode(inner, transport), expected);
    let mut last_on_mode = Instant::now();

    loop {
        if inner.stop.load(Ordering::Relaxed) {
            return Ok(());
        }

        if inner.calibrate_request.swap(false, Ordering::Relaxed) {
            let settings = inner.settings_snapshot();
            let extension = inner.current_extension();
            run_calibration(inner, transport, extension, &settings);
        }

        let frame = match transport.read_frame(100)? {
            Some(f) => f,
            None => {
                if last_on_mode.elapsed() > MODE_WATCHDOG {
                    wanted_tag =
                        tag_after_mode_push(apply_report_mode(inner, transport), wanted_tag);
                    last_on_mode = Instant::now();
                }
                continue;
            }
        };

        let tag = frame.payload.first().copied().unwrap_or(0);
        match tag {
            protocol::RPT_STATUS => {
                // A status report knocks the remote back to its default mode.
                apply_frame(inner, &frame);
                wanted_tag = tag_after_mode_push(apply_report_mode(inner, transport), wanted_tag);
                last_on_mode = Instant::now();
            }
            protocol::RPT_READ_REPLY | protocol::RPT_ACK => {
                apply_frame(inner, &frame);
                last_on_mode = Instant::now();
            }
            _ => {
                if tag == wanted_tag {
                    last_on_mode = Instant::now();
                } else if last_on_mode.elapsed() > MODE_WATCHDOG {
                    wanted_tag =
                        tag_after_mode_push(apply_report_mode(inner, transport), wanted_tag);
                    last_on_mode = Instant::now();
                }
                inner.queue.push(frame);
            }
        }
    }
}

/// Decode one frame into the shared snapshot; returns the updated copy.
fn apply_frame(inner: &Inner, frame: &RawFrame) -> Option<SensorSnapshot> {
    let extension = inner.current_extension();
    let decoded = protocol::decode(&frame.payload, extension);
    let settings = inner.settings_snapshot();
    let offsets = inner.offsets.lock().map(|o| *o).unwrap_or_default();

    let mut snap = inner.snapshot.lock().ok()?;
    snap.last_report_tag = decoded.report_tag;

    if let Some(buttons) = decoded.buttons {
        snap.buttons = buttons;
    }

    if let Some(accel) = decoded.accel {
        let raw = offsets.apply_accel([
            f64::from(accel.x),
            f64::from(accel.y),
            f64::from(accel.z),
        ]);
        for axis in 0..3 {
            snap.accel[axis] = lowpass(snap.accel[axis], raw[axis], settings.accel_lowpass_alpha);
        }
    }

    if protocol::tag_has_ir(decoded.report_tag) {
        snap.ir_visible = !decoded.ir_points.is_empty();
        snap.ir_points = decoded.ir_points.clone();
    }

    match extension {
        Extension::MotionPlus => {
            // Firmware revisions shift the motion block inside the extension
            // payload, so the scored search locates it on every frame; a
            // frame where no window clears the threshold carries no usable
            // motion data and the sample is dropped.
            let located = protocol::extension_offset(decoded.report_tag)
                .and_then(|off| frame.payload.get(off..))
                .and_then(|block| inner.motion_search.locate(block));
            if let Some((_, m)) = located {
                snap.motionplus_connected = true;
                snap.extension_connected = Some(m.extension_connected);
                snap.gyro_raw = [m.yaw, m.roll, m.pitch];
                snap.gyro_fast = [m.yaw_fast, m.roll_fast, m.pitch_fast];
                let raw =
                    offsets.apply_gyro([f64::from(m.yaw), f64::from(m.roll), f64::from(m.pitch)]);
                for axis in 0..3 {
                    snap.gyro[axis] =
                        lowpass(snap.gyro[axis], raw[axis], settings.gyro_lowpass_alpha);
                }
            }
        }
        _ => {
            if let ExtensionData::Nunchuk(n) = &decoded.extension {
                snap.nunchuk_connected = true;
                snap.nunchuk = Some(*n);
            }
        }
    }

    if let Some(status) = &decoded.status {
        snap.battery_percent = status.battery_percent as i8;
        if !status.extension_present {
            snap.motionplus_connected = false;
            snap.nunchuk_connected = false;
            snap.extension_connected = Some(false);
        }
    }

    snap.effective_mode = resolve_mode(&settings, &snap);
    Some(snap.clone())
}

/// Re-pair with exponential backoff plus jitter. Returns None when stopped
/// or reconnection is disabled. Delays start over at the configured initial
/// value on every successful connection.
fn reconnect(inner: &Arc<Inner>) -> Option<Arc<HidTransport>> {
    let settings = inner.settings_snapshot();
    if !settings.reconnect_enabled {
        log::info!("reconnect disabled, supervisor exiting");
        return None;
    }

    let mut delay = settings.reconnect_initial_delay;
    let jitter_ms = settings.reconnect_jitter.as_millis() as u64;

    loop {
        if inner.stop.load(Ordering::Relaxed) {
            return None;
        }

        let sleep = delay
            + Duration::from_millis(if jitter_ms > 0 {
                fastrand::u64(0..=jitter_ms)
            } else {
                0
            });
        log::info!("reconnecting in {:?}", sleep);
        interruptible_sleep(inner, sleep);
        if inner.stop.load(Ordering::Relaxed) {
            return None;
        }

        // Single enumeration pass; the backoff loop provides the retries.
        match open_transport(Duration::ZERO) {
            Ok(t) => {
                let transport = Arc::new(t);
                match connect_sequence(inner, &transport) {
                    Ok(()) => {
                        if let Ok(mut slot) = inner.transport.lock() {
                            *slot = Some(transport.clone());
                        }
                        inner.set_state(|s| {
                            s.connected = true;
                            s.reconnecting = false;
                        });
                        log::info!("reconnected");
                        return Some(transport);
                    }
                    Err(e) => log::warn!("pairing sequence failed: {}", e),
                }
            }
            Err(e) => log::debug!("remote not reachable yet: {}", e),
        }

        delay = next_backoff(
            delay,
            settings.reconnect_backoff_factor,
            settings.reconnect_max_delay,
        );
    }
}

fn interruptible_sleep(inner: &Inner, total: Duration) {
    let deadline = Instant::now() + total;
    while Instant::now() < deadline {
        if inner.stop.load(Ordering::Relaxed) {
            return;
        }
        std::thread::sleep(Duration::from_millis(50).min(deadline - Instant::now()));
    }
}
