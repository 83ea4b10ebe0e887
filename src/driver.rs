use std::sync::Arc;
use std::time::{Duration, Instant};

use crate::config::{ConfigSource, Settings};
use crate::device::Wiimote;
use crate::fusion::{FusionEngine, PointerUpdate};
use crate::gestures::GestureDetector;
use crate::sink::{PointerSink, SinkAction};
use crate::types::SensorSnapshot;
use crate::Result;

/// One resolved button action. Sink actions go to the host input layer;
/// the rest are handled inside the driver.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Action {
    Sink(SinkAction),
    DragToggle,
    ToggleControl,
    CenterMouse,
    ProfileNext,
    ProfilePrev,
    None,
}

/// Parse a config action string. `key:` (or `key_`) prefixes carry a
/// `+`-separated combo; anything unrecognized maps to no action.
pub fn parse_action(raw: &str, scroll_amount: i32) -> Action {
    let action = raw.trim().to_ascii_lowercase();
    match action.as_str() {
        "left_click" => Action::Sink(SinkAction::LeftClick),
        "right_click" => Action::Sink(SinkAction::RightClick),
        "middle_click" => Action::Sink(SinkAction::MiddleClick),
        "double_click" => Action::Sink(SinkAction::DoubleClick),
        "scroll_up" => Action::Sink(SinkAction::Scroll(scroll_amount)),
        "scroll_down" => Action::Sink(SinkAction::Scroll(-scroll_amount)),
        "drag_toggle" => Action::DragToggle,
        "toggle_control" => Action::ToggleControl,
        "center_mouse" => Action::CenterMouse,
        "profile_next" => Action::ProfileNext,
        "profile_prev" => Action::ProfilePrev,
        "" | "none" => Action::None,
        _ => {
            if let Some(combo) = action.strip_prefix("key:").or_else(|| action.strip_prefix("key_"))
            {
                let keys: Vec<String> = combo
                    .split('+')
                    .map(normalize_key)
                    .filter(|k| !k.is_empty())
                    .collect();
                if keys.is_empty() {
                    Action::None
                } else {
                    Action::Sink(SinkAction::KeyCombo(keys))
                }
            } else {
                log::warn!("unknown action '{}', ignoring", raw);
                Action::None
            }
        }
    }
}

/// Canonical key names for combo entries, aliases folded.
fn normalize_key(key: &str) -> String {
    let key = key.trim().to_ascii_lowercase();
    match key.as_str() {
        "control" => "ctrl".into(),
        "cmd" => "win".into(),
        "del" => "delete".into(),
        "return" => "enter".into(),
        "pgup" => "pageup".into(),
        "pgdown" => "pagedown".into(),
        "caps" => "capslock".into(),
        _ => key,
    }
}

/// Built-in mapping used when the config section has no entry for a button.
fn default_action(section: &str, button: &str) -> &'static str {
    // Gestures act only when explicitly mapped.
    if section == "GestureMapping" {
        return "none";
    }
    if section == "NunchukMapping" {
        return match button {
            "c" => "middle_click",
            "z" => "drag_toggle",
            _ => "none",
        };
    }
    match button {
        "a" => "left_click",
        "b" => "right_click",
        "one" => "toggle_control",
        "two" => "center_mouse",
        "plus" => "scroll_up",
        "minus" => "scroll_down",
        "dpadup" => "key_up",
        "dpaddown" => "key_down",
        "dpadleft" => "key_left",
        "dpadright" => "key_right",
        _ => "none",
    }
}

/// Resolves button names to actions through the config, honoring the
/// active profile's overrides.
struct ActionMapper {
    config: Arc<dyn ConfigSource>,
    scroll_amount: i32,
}

impl ActionMapper {
    fn action_for(&self, section: &str, button: &str) -> Action {
        let raw = self
            .config
            .get_str(section, button, default_action(section, button));
        parse_action(&raw, self.scroll_amount)
    }
}

/// Facade tying the remote, the fusion engine, and the output sink into a
/// pointer driver. The owner calls [`MouseDriver::tick`] in its own loop
/// (or [`MouseDriver::run`]) and the control-surface methods from a UI or
/// automation layer.
pub struct MouseDriver {
    wiimote: Wiimote,
    engine: FusionEngine,
    sink: Box<dyn PointerSink>,
    mapper: ActionMapper,
    gestures: GestureDetector,
    control_enabled: bool,
    dragging: bool,
    prev_snapshot: SensorSnapshot,
    last_tick: Instant,
}

impl MouseDriver {
    pub fn new(wiimote: Wiimote, sink: Box<dyn PointerSink>, config: Arc<dyn ConfigSource>) -> MouseDriver {
        let settings = Settings::load(config.as_ref());
        let mapper = ActionMapper {
            config,
            scroll_amount: settings.scroll_amount,
        };
        wiimote.set_control_enabled(true);
        MouseDriver {
            gestures: GestureDetector::from_settings(&settings),
            engine: FusionEngine::new(settings),
            wiimote,
            sink,
            mapper,
            control_enabled: true,
            dragging: false,
            prev_snapshot: SensorSnapshot::default(),
            last_tick: Instant::now(),
        }
    }

    /// One consumer iteration: wait briefly for the freshest snapshot,
    /// fire edge-triggered button actions, and emit pointer movement.
    /// Timeouts (including reconnect windows) are absorbed.
    pub fn tick(&mut self) -> Result<()> {
        let snap = match self.wiimote.read_next(Duration::from_millis(100)) {
            Ok(s) => s,
            Err(e) if e.is_benign() => return Ok(()),
            Err(e) => return Err(e),
        };

        let now = Instant::now();
        let dt = now - self.last_tick;
        self.last_tick = now;

        self.handle_buttons(&snap);

        if let Some(gesture) = self.gestures.update(&snap, now) {
            log::info!("gesture: {:?}", gesture);
            let action = self.mapper.action_for("GestureMapping", gesture.config_key());
            self.execute(action);
        }

        if self.control_enabled {
            if let Some(update) = self.engine.tick(&snap, dt) {
                let sent = match update {
                    PointerUpdate::Absolute { x, y } => self.sink.move_to(x, y),
                    PointerUpdate::Relative { dx, dy } => self.sink.move_by(dx, dy),
                };
                if let Err(e) = sent {
                    log::warn!("pointer output failed: {}", e);
                }
            }
        }

        self.prev_snapshot = snap;
        Ok(())
    }

    /// Drive ticks until the supervisor stops.
    pub fn run(&mut self) -> Result<()> {
        while self.wiimote.is_running() {
            self.tick()?;
        }
        Ok(())
    }

    fn handle_buttons(&mut self, snap: &SensorSnapshot) {
        let newly_pressed = snap.buttons & !self.prev_snapshot.buttons;
        for name in newly_pressed.names() {
            let action = self.mapper.action_for("ButtonMapping", name);
            self.execute(action);
        }

        if let Some(n) = snap.nunchuk {
            let prev = self.prev_snapshot.nunchuk.unwrap_or_default();
            if n.button_c && !prev.button_c {
                let action = self.mapper.action_for("NunchukMapping", "c");
                self.execute(action);
            }
            if n.button_z && !prev.button_z {
                let action = self.mapper.action_for("NunchukMapping", "z");
                self.execute(action);
            }
        }
    }

    fn execute(&mut self, action: Action) {
        match action {
            Action::None => {}
            Action::Sink(a) => self.press(&a),
            Action::DragToggle => {
                self.dragging = !self.dragging;
                let a = if self.dragging {
                    SinkAction::DragStart
                } else {
                    SinkAction::DragEnd
                };
                self.press(&a);
            }
            Action::ToggleControl => {
                self.toggle_control();
            }
            Action::CenterMouse => self.center_cursor(),
            Action::ProfileNext => {
                self.next_profile();
            }
            Action::ProfilePrev => {
                self.previous_profile();
            }
        }
    }

    fn press(&mut self, action: &SinkAction) {
        if let Err(e) = self.sink.press(action) {
            log::warn!("action {:?} failed: {}", action, e);
        }
    }

    /// Suspend or resume pointer output; button mappings stay live so the
    /// toggle button can switch control back on.
    pub fn toggle_control(&mut self) -> bool {
        self.control_enabled = !self.control_enabled;
        self.wiimote.set_control_enabled(self.control_enabled);
        if self.control_enabled {
            self.engine.reset();
        }
        log::info!(
            "pointer control {}",
            if self.control_enabled { "enabled" } else { "disabled" }
        );
        self.control_enabled
    }

    pub fn center_cursor(&mut self) {
        if let Err(e) = self.sink.move_to(0.5, 0.5) {
            log::warn!("center failed: {}", e);
        }
    }

    pub fn next_profile(&mut self) -> Option<String> {
        self.rotate_profile(1)
    }

    pub fn previous_profile(&mut self) -> Option<String> {
        self.rotate_profile(-1)
    }

    fn rotate_profile(&mut self, step: isize) -> Option<String> {
        let profiles = self.mapper.config.profiles();
        if profiles.is_empty() {
            return None;
        }
        let active = self.mapper.config.active_profile();
        let len = profiles.len() as isize;
        let next = match profiles.iter().position(|p| *p == active) {
            Some(i) => ((i as isize + step).rem_euclid(len)) as usize,
            None => {
                if step >= 0 {
                    0
                } else {
                    (len - 1) as usize
                }
            }
        };
        let name = profiles[next].clone();
        self.activate_profile(&name);
        Some(name)
    }

    fn activate_profile(&mut self, name: &str) {
        self.mapper.config.set_active_profile(name);
        let settings = Settings::load(self.mapper.config.as_ref());
        self.mapper.scroll_amount = settings.scroll_amount;
        self.gestures = GestureDetector::from_settings(&settings);
        self.engine.apply_settings(settings.clone());
        self.wiimote.apply_settings(settings);
        log::info!("profile '{}' active", name);
    }

    /// Recalibrate at rest: the supervisor re-samples offsets between
    /// frames and the engine forgets its motion state.
    pub fn calibrate(&mut self) {
        self.wiimote.request_calibration();
        self.engine.reset();
    }

    /// Switch the pointer mode by name; unknown names are rejected.
    pub fn set_mode(&mut self, name: &str) -> bool {
        match crate::types::PointerMode::from_name(name) {
            Some(mode) => {
                self.wiimote.set_mode(mode);
                self.engine.reset();
                true
            }
            None => {
                log::warn!("unknown pointer mode '{}'", name);
                false
            }
        }
    }

    pub fn wiimote(&self) -> &Wiimote {
        &self.wiimote
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::MemoryConfig;
    use crate::sink::SinkAction;

    #[test]
    fn simple_actions_parse() {
        assert_eq!(
            parse_action("left_click", 120),
            Action::Sink(SinkAction::LeftClick)
        );
        assert_eq!(
            parse_action("Scroll_Up", 120),
            Action::Sink(SinkAction::Scroll(120))
        );
        assert_eq!(
            parse_action("scroll_down", 120),
            Action::Sink(SinkAction::Scroll(-120))
        );
        assert_eq!(parse_action("toggle_control", 120), Action::ToggleControl);
        assert_eq!(parse_action("drag_toggle", 120), Action::DragToggle);
        assert_eq!(parse_action("none", 120), Action::None);
        assert_eq!(parse_action("", 120), Action::None);
    }

    #[test]
    fn key_combos_parse_and_normalize() {
        assert_eq!(
            parse_action("key:ctrl+alt+del", 120),
            Action::Sink(SinkAction::KeyCombo(vec![
                "ctrl".into(),
                "alt".into(),
                "delete".into()
            ]))
        );
        assert_eq!(
            parse_action("key_up", 120),
            Action::Sink(SinkAction::KeyCombo(vec!["up".into()]))
        );
        assert_eq!(
            parse_action("key:CONTROL+C", 120),
            Action::Sink(SinkAction::KeyCombo(vec!["ctrl".into(), "c".into()]))
        );
        assert_eq!(parse_action("key:", 120), Action::None);
    }

    #[test]
    fn unknown_actions_become_none() {
        assert_eq!(parse_action("warp_speed", 120), Action::None);
    }

    #[test]
    fn mapper_honors_config_and_defaults() {
        let config = Arc::new(MemoryConfig::new());
        config.set("ButtonMapping", "a", "double_click");
        let mapper = ActionMapper {
            config,
            scroll_amount: 120,
        };
        assert_eq!(
            mapper.action_for("ButtonMapping", "a"),
            Action::Sink(SinkAction::DoubleClick)
        );
        // Unmapped buttons use the built-in defaults.
        assert_eq!(
            mapper.action_for("ButtonMapping", "b"),
            Action::Sink(SinkAction::RightClick)
        );
        assert_eq!(
            mapper.action_for("ButtonMapping", "home"),
            Action::None
        );
        assert_eq!(
            mapper.action_for("NunchukMapping", "z"),
            Action::DragToggle
        );
    }

    #[test]
    fn gesture_mappings_resolve_through_config() {
        let config = Arc::new(MemoryConfig::new());
        config.set("GestureMapping", "shake", "middle_click");
        let mapper = ActionMapper {
            config,
            scroll_amount: 120,
        };
        assert_eq!(
            mapper.action_for("GestureMapping", "shake"),
            Action::Sink(SinkAction::MiddleClick)
        );
        // Unmapped gestures do nothing.
        assert_eq!(mapper.action_for("GestureMapping", "tilt_left"), Action::None);
    }

    #[test]
    fn mapper_sees_profile_overrides() {
        let config = Arc::new(MemoryConfig::new());
        config.set("ButtonMapping", "a", "left_click");
        config.set_profile("presenter", "ButtonMapping", "a", "key:right");
        let mapper = ActionMapper {
            config: config.clone(),
            scroll_amount: 120,
        };
        assert_eq!(
            mapper.action_for("ButtonMapping", "a"),
            Action::Sink(SinkAction::LeftClick)
        );
        config.set_active_profile("presenter");
        assert_eq!(
            mapper.action_for("ButtonMapping", "a"),
            Action::Sink(SinkAction::KeyCombo(vec!["right".into()]))
        );
    }
}
