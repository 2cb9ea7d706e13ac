//! Input model: tools, modifier keys, view state, and the gesture state machine.
//!
//! `Tool` and `Modifiers` capture the user's intent at the time of a pointer
//! event. `UiState` is the per-session view state that is never persisted.
//! `InputState` is the active gesture tracked between pointer-down and
//! pointer-up. It is a single enum, so at most one gesture can be live at a
//! time. Connection mode lives in `UiState` because it survives across
//! gestures and only ever coexists with `InputState::Idle`.

#[cfg(test)]
#[path = "input_test.rs"]
mod input_test;

use crate::camera::Point;
use crate::consts::{DEFAULT_BRUSH_COLOR, DEFAULT_BRUSH_WIDTH, DEFAULT_CONNECTION_COLOR};
use crate::doc::{ConnectionStyle, ImageId, NoteId, StrokePath};
use crate::hit::ResizeHandle;
use crate::selection::Selection;

/// Which tool is currently active.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Tool {
    /// Select, drag, resize and connect notes (default).
    #[default]
    Select,
    /// Freehand drawing.
    Brush,
    /// Delete strokes by clicking them.
    Eraser,
}

/// Keyboard/mouse modifier keys held during an event.
#[allow(clippy::struct_excessive_bools)]
#[derive(Debug, Clone, Copy, Default)]
pub struct Modifiers {
    pub shift: bool,
    pub ctrl: bool,
    pub alt: bool,
    /// Meta / Command key.
    pub meta: bool,
}

impl Modifiers {
    /// Ctrl on most platforms, Command on macOS.
    #[must_use]
    pub fn command(self) -> bool {
        self.ctrl || self.meta
    }
}

/// Mouse button identifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Button {
    /// Left mouse button (or single-finger tap).
    Primary,
    /// Middle mouse button; always pans.
    Middle,
    Secondary,
}

/// A keyboard key.
///
/// The inner string holds the key name as reported by the browser
/// (`"Delete"`, `"Escape"`, `" "` for the space bar).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Key(pub String);

impl Key {
    #[must_use]
    pub fn is_space(&self) -> bool {
        self.0 == " " || self.0 == "Space" || self.0 == "Spacebar"
    }

    #[must_use]
    pub fn is_escape(&self) -> bool {
        self.0 == "Escape" || self.0 == "Esc"
    }

    #[must_use]
    pub fn is_delete(&self) -> bool {
        self.0 == "Delete"
    }
}

/// Wheel / trackpad scroll delta.
#[derive(Debug, Clone, Copy)]
pub struct WheelDelta {
    /// Horizontal scroll amount in pixels.
    pub dx: f64,
    /// Vertical scroll amount in pixels (positive = down).
    pub dy: f64,
}

/// Connection mode, orthogonal to the gesture state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ConnectMode {
    #[default]
    Off,
    /// Clicking notes builds connections; `pending` is the recorded "from" endpoint.
    Armed { pending: Option<NoteId> },
}

impl ConnectMode {
    #[must_use]
    pub fn is_armed(self) -> bool {
        matches!(self, Self::Armed { .. })
    }

    #[must_use]
    pub fn pending(self) -> Option<NoteId> {
        match self {
            Self::Armed { pending } => pending,
            Self::Off => None,
        }
    }
}

/// Local view state visible to the renderer. Never persisted.
#[allow(clippy::struct_excessive_bools)]
#[derive(Debug, Clone)]
pub struct UiState {
    pub tool: Tool,
    pub selection: Selection,
    pub connect: ConnectMode,
    /// Style used for connections created by clicking.
    pub connection_style: ConnectionStyle,
    pub connection_color: String,
    pub brush_color: String,
    pub brush_width: f64,
    pub toolbar_visible: bool,
    /// Read-only presentation mode: only panning and zooming are allowed.
    pub presenting: bool,
    /// The space bar is held; pointer-down pans.
    pub space_held: bool,
}

impl Default for UiState {
    fn default() -> Self {
        Self {
            tool: Tool::default(),
            selection: Selection::new(),
            connect: ConnectMode::Off,
            connection_style: ConnectionStyle::Solid,
            connection_color: DEFAULT_CONNECTION_COLOR.to_string(),
            brush_color: DEFAULT_BRUSH_COLOR.to_string(),
            brush_width: DEFAULT_BRUSH_WIDTH,
            toolbar_visible: true,
            presenting: false,
            space_held: false,
        }
    }
}

/// The active gesture.
///
/// Each active variant carries the context needed to compute deltas on
/// pointer-move and to emit the final mutation on pointer-up.
#[derive(Debug, Clone, Default)]
pub enum InputState {
    /// No gesture in progress.
    #[default]
    Idle,
    /// A note's drag handle is pressed but the pointer has not yet moved
    /// past the drag threshold.
    PressingNote {
        id: NoteId,
        /// World-space pointer position minus the note's position at press time.
        grab_offset: Point,
        /// Screen-space press location, used for the threshold test.
        start_screen: Point,
    },
    /// A note is being moved.
    DraggingNote { id: NoteId, grab_offset: Point },
    /// A note is being resized by one of its eight handles.
    ResizingNote {
        id: NoteId,
        handle: ResizeHandle,
        /// Screen-space pointer position at the start of the resize.
        start_screen: Point,
        start_width: f64,
        start_height: f64,
    },
    /// An image is pressed but not yet past the drag threshold.
    PressingImage { id: ImageId, grab_offset: Point, start_screen: Point },
    /// An image is being moved.
    DraggingImage { id: ImageId, grab_offset: Point },
    /// The canvas is being panned.
    Panning {
        /// Pointer position minus the pan offset at the start of the pan.
        start_offset: Point,
    },
    /// A brush stroke is being recorded, in world coordinates.
    Drawing { buffer: StrokePath },
}

impl InputState {
    /// Short name for logging.
    #[must_use]
    pub fn name(&self) -> &'static str {
        match self {
            Self::Idle => "idle",
            Self::PressingNote { .. } => "pressing_note",
            Self::DraggingNote { .. } => "dragging_note",
            Self::ResizingNote { .. } => "resizing_note",
            Self::PressingImage { .. } => "pressing_image",
            Self::DraggingImage { .. } => "dragging_image",
            Self::Panning { .. } => "panning",
            Self::Drawing { .. } => "drawing",
        }
    }

    /// The note this gesture is acting on, if any.
    #[must_use]
    pub fn active_note(&self) -> Option<NoteId> {
        match self {
            Self::PressingNote { id, .. } | Self::DraggingNote { id, .. } | Self::ResizingNote { id, .. } => Some(*id),
            _ => None,
        }
    }

    /// The image this gesture is acting on, if any.
    #[must_use]
    pub fn active_image(&self) -> Option<ImageId> {
        match self {
            Self::PressingImage { id, .. } | Self::DraggingImage { id, .. } => Some(*id),
            _ => None,
        }
    }
}
