#[cfg(test)]
#[path = "hit_test.rs"]
mod hit_test;

use crate::camera::{Camera, Point};
use crate::consts::{ERASER_HIT_PAD, HANDLE_RADIUS_PX, NOTE_HEADER_HEIGHT};
use crate::doc::{Drawing, DrawingId, ImageElement, ImageId, Note, NoteId};

/// Which part of a note was hit.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NotePart {
    /// Text area; clicks select or connect.
    Body,
    /// Grip strip along the top edge; presses start a drag.
    DragHandle,
    ResizeHandle(ResizeHandle),
}

/// The eight resize handles: four corners and four edge midpoints.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResizeHandle {
    N,
    Ne,
    E,
    Se,
    S,
    Sw,
    W,
    Nw,
}

impl ResizeHandle {
    /// Corners first so they win over the adjacent edge midpoints on tiny notes.
    pub const ALL: [ResizeHandle; 8] = [Self::Nw, Self::Ne, Self::Se, Self::Sw, Self::N, Self::E, Self::S, Self::W];

    /// Whether dragging this handle changes the width.
    #[must_use]
    pub fn affects_width(self) -> bool {
        !matches!(self, Self::N | Self::S)
    }

    /// Whether dragging this handle changes the height.
    #[must_use]
    pub fn affects_height(self) -> bool {
        !matches!(self, Self::E | Self::W)
    }

    /// Handles on the left edge: moving the pointer left grows the note.
    #[must_use]
    pub fn on_left(self) -> bool {
        matches!(self, Self::W | Self::Nw | Self::Sw)
    }

    /// Handles on the top edge: moving the pointer up grows the note.
    #[must_use]
    pub fn on_top(self) -> bool {
        matches!(self, Self::N | Self::Nw | Self::Ne)
    }

    /// World-space center of this handle on `note`.
    #[must_use]
    pub fn location(self, note: &Note) -> Point {
        let (left, top) = (note.x, note.y);
        let (right, bottom) = (note.x + note.width, note.y + note.height);
        let (mid_x, mid_y) = (note.x + note.width / 2.0, note.y + note.height / 2.0);
        match self {
            Self::N => Point::new(mid_x, top),
            Self::Ne => Point::new(right, top),
            Self::E => Point::new(right, mid_y),
            Self::Se => Point::new(right, bottom),
            Self::S => Point::new(mid_x, bottom),
            Self::Sw => Point::new(left, bottom),
            Self::W => Point::new(left, mid_y),
            Self::Nw => Point::new(left, top),
        }
    }

    /// CSS cursor shown while hovering or dragging this handle.
    #[must_use]
    pub fn cursor(self) -> &'static str {
        match self {
            Self::N | Self::S => "ns-resize",
            Self::E | Self::W => "ew-resize",
            Self::Nw | Self::Se => "nwse-resize",
            Self::Ne | Self::Sw => "nesw-resize",
        }
    }
}

/// Result of a pointer hit test in select mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Hit {
    Note { id: NoteId, part: NotePart },
    Image { id: ImageId },
}

/// Find what is under `world_pt`.
///
/// `notes` is in draw order (bottom first); the topmost note wins. Notes sit
/// above images, so images are only considered when no note is hit.
#[must_use]
pub fn hit_test(world_pt: Point, notes: &[&Note], images: &[ImageElement], camera: &Camera) -> Option<Hit> {
    let slop = camera.screen_dist_to_world(HANDLE_RADIUS_PX);
    for note in notes.iter().rev() {
        if let Some(part) = hit_note(world_pt, note, slop) {
            return Some(Hit::Note { id: note.id, part });
        }
    }
    images
        .iter()
        .rev()
        .find(|image| image.contains(world_pt))
        .map(|image| Hit::Image { id: image.id })
}

fn hit_note(world_pt: Point, note: &Note, slop: f64) -> Option<NotePart> {
    let header_bottom = note.y + NOTE_HEADER_HEIGHT.min(note.height);
    let in_header = note.contains(world_pt) && world_pt.y <= header_bottom;
    for handle in ResizeHandle::ALL {
        // Inside the note, the top edge belongs to the drag strip.
        if handle == ResizeHandle::N && in_header {
            continue;
        }
        let at = handle.location(note);
        if (world_pt.x - at.x).abs() <= slop && (world_pt.y - at.y).abs() <= slop {
            return Some(NotePart::ResizeHandle(handle));
        }
    }
    if !note.contains(world_pt) {
        return None;
    }
    if in_header {
        Some(NotePart::DragHandle)
    } else {
        Some(NotePart::Body)
    }
}

/// Find the topmost stroke whose widened band contains `world_pt`.
///
/// The band is the stroke's own width plus [`ERASER_HIT_PAD`], centered on the path.
#[must_use]
pub fn hit_drawing(world_pt: Point, drawings: &[Drawing]) -> Option<DrawingId> {
    drawings
        .iter()
        .rev()
        .find(|d| distance_to_polyline(world_pt, d.path.points()) <= (d.width + ERASER_HIT_PAD) / 2.0)
        .map(|d| d.id)
}

/// Shortest distance from `pt` to a polyline. Infinite for an empty polyline.
#[must_use]
pub fn distance_to_polyline(pt: Point, points: &[Point]) -> f64 {
    match points {
        [] => f64::INFINITY,
        [only] => pt.distance(*only),
        _ => points
            .windows(2)
            .map(|w| distance_to_segment(pt, w[0], w[1]))
            .fold(f64::INFINITY, f64::min),
    }
}

fn distance_to_segment(pt: Point, a: Point, b: Point) -> f64 {
    let (dx, dy) = (b.x - a.x, b.y - a.y);
    let len_sq = dx * dx + dy * dy;
    if len_sq == 0.0 {
        return pt.distance(a);
    }
    let t = (((pt.x - a.x) * dx + (pt.y - a.y) * dy) / len_sq).clamp(0.0, 1.0);
    pt.distance(Point::new(a.x + t * dx, a.y + t * dy))
}
