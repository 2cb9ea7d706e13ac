//! Shared numeric constants for the canvas crate.

// ── Camera ──────────────────────────────────────────────────────

/// Smallest allowed zoom factor.
pub const ZOOM_MIN: f64 = 0.25;

/// Largest allowed zoom factor.
pub const ZOOM_MAX: f64 = 3.0;

/// Zoom increment used by the zoom-in / zoom-out buttons.
pub const ZOOM_STEP: f64 = 0.1;

/// Exponential zoom speed per wheel pixel for ctrl+wheel zoom.
pub const WHEEL_ZOOM_SPEED: f64 = 0.002;

// ── Notes ───────────────────────────────────────────────────────

/// Minimum note width in world units.
pub const NOTE_MIN_WIDTH: f64 = 120.0;

/// Minimum note height in world units.
pub const NOTE_MIN_HEIGHT: f64 = 100.0;

/// Width of a freshly added note.
pub const NOTE_DEFAULT_WIDTH: f64 = 200.0;

/// Height of a freshly added note.
pub const NOTE_DEFAULT_HEIGHT: f64 = 160.0;

/// Height of the grip strip along the top of a note that starts a drag.
pub const NOTE_HEADER_HEIGHT: f64 = 28.0;

/// Offset between successive new items so they do not stack exactly.
pub const NEW_ITEM_CASCADE: f64 = 24.0;

/// Number of cascade steps before placement wraps back to the center.
pub const NEW_ITEM_CASCADE_STEPS: usize = 8;

// ── Gestures ────────────────────────────────────────────────────

/// Screen distance the pointer must travel before a press becomes a drag.
pub const DRAG_THRESHOLD_PX: f64 = 5.0;

/// Minimum screen-space travel for a brush stroke to be kept.
pub const MIN_STROKE_TRAVEL_PX: f64 = 2.0;

/// Minimum number of distinct points in a committed stroke.
pub const MIN_STROKE_POINTS: usize = 2;

// ── Hit-testing ─────────────────────────────────────────────────

/// Screen-space hit slop in pixels around resize handles.
pub const HANDLE_RADIUS_PX: f64 = 8.0;

/// Extra width added to a stroke's own width when the eraser hit-tests it.
pub const ERASER_HIT_PAD: f64 = 8.0;

// ── Styling defaults ────────────────────────────────────────────

/// Default brush color for new strokes.
pub const DEFAULT_BRUSH_COLOR: &str = "#1f2937";

/// Default brush width in world units.
pub const DEFAULT_BRUSH_WIDTH: f64 = 3.0;

/// Default color for new connections.
pub const DEFAULT_CONNECTION_COLOR: &str = "#64748b";
