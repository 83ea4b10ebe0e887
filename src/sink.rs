use crate::Result;

/// A button, scroll, or key action forwarded to the host input layer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SinkAction {
    LeftClick,
    RightClick,
    MiddleClick,
    DoubleClick,
    /// Wheel units; positive scrolls up.
    Scroll(i32),
    DragStart,
    DragEnd,
    /// Normalized key names, e.g. `["ctrl", "c"]`. A single entry is a
    /// plain key press.
    KeyCombo(Vec<String>),
}

/// Host-side pointer output. The engine only ever issues these three
/// abstract commands; synthesizing real OS input lives behind this trait.
pub trait PointerSink: Send {
    /// Absolute move in normalized screen coordinates, both axes 0..=1.
    fn move_to(&mut self, x: f64, y: f64) -> Result<()>;

    /// Relative move in pixels.
    fn move_by(&mut self, dx: f64, dy: f64) -> Result<()>;

    /// Execute a click, scroll, drag, or key action.
    fn press(&mut self, action: &SinkAction) -> Result<()>;
}

/// Discards everything. Useful for calibration runs and headless tests.
#[derive(Debug, Default)]
pub struct NullSink;

impl PointerSink for NullSink {
    fn move_to(&mut self, _x: f64, _y: f64) -> Result<()> {
        Ok(())
    }

    fn move_by(&mut self, _dx: f64, _dy: f64) -> Result<()> {
        Ok(())
    }

    fn press(&mut self, _action: &SinkAction) -> Result<()> {
        Ok(())
    }
}

/// Records every command it receives, for asserting driver behavior.
#[derive(Debug, Default)]
pub struct RecordingSink {
    pub moves_to: Vec<(f64, f64)>,
    pub moves_by: Vec<(f64, f64)>,
    pub actions: Vec<SinkAction>,
}

impl PointerSink for RecordingSink {
    fn move_to(&mut self, x: f64, y: f64) -> Result<()> {
        self.moves_to.push((x, y));
        Ok(())
    }

    fn move_by(&mut self, dx: f64, dy: f64) -> Result<()> {
        self.moves_by.push((dx, dy));
        Ok(())
    }

    fn press(&mut self, action: &SinkAction) -> Result<()> {
        self.actions.push(action.clone());
        Ok(())
    }
}
