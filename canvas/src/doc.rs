//! Document model: notes, connections, images, strokes, and the in-memory store.
//!
//! This module defines the four persisted entity kinds that live on a board,
//! sparse-update types for incremental edits (`NotePatch`, `ConnectionPatch`,
//! `ImagePatch`), the encoded polyline used by strokes (`StrokePath`), and
//! the runtime store that owns every live entity (`DocStore`).
//!
//! Data flows into this layer from two directions: remote snapshots replace
//! whole collections, and the input engine applies optimistic edits. The
//! store itself performs no I/O. It is also the only place that enforces
//! reference integrity between notes and connections, since the backing
//! store has no foreign keys.

#[cfg(test)]
#[path = "doc_test.rs"]
mod doc_test;

use std::fmt;

use serde::{Deserialize, Serialize};
use tracing::debug;
use uuid::Uuid;

use crate::camera::Point;
use crate::consts::{NOTE_DEFAULT_HEIGHT, NOTE_DEFAULT_WIDTH, NOTE_MIN_HEIGHT, NOTE_MIN_WIDTH};

/// Unique identifier for a sticky note.
pub type NoteId = Uuid;
/// Unique identifier for a connection between two notes.
pub type ConnectionId = Uuid;
/// Unique identifier for an image element.
pub type ImageId = Uuid;
/// Unique identifier for a committed stroke.
pub type DrawingId = Uuid;

/// The four persisted entity kinds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EntityKind {
    Note,
    Connection,
    Image,
    Drawing,
}

// =============================================================================
// NOTES
// =============================================================================

/// The five sticky-note palette entries, in toolbar order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NoteColor {
    #[default]
    Yellow,
    Pink,
    Blue,
    Green,
    Purple,
}

impl NoteColor {
    /// Palette in toolbar order; index 0 is the default.
    pub const PALETTE: [NoteColor; 5] = [Self::Yellow, Self::Pink, Self::Blue, Self::Green, Self::Purple];

    /// Palette entry at `index`, if in range.
    #[must_use]
    pub fn from_index(index: usize) -> Option<Self> {
        Self::PALETTE.get(index).copied()
    }

    /// Position of this color in [`NoteColor::PALETTE`].
    #[must_use]
    pub fn index(self) -> usize {
        match self {
            Self::Yellow => 0,
            Self::Pink => 1,
            Self::Blue => 2,
            Self::Green => 3,
            Self::Purple => 4,
        }
    }
}

/// A sticky note on the board.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Note {
    /// Unique identifier for this note.
    pub id: NoteId,
    /// Left edge in world coordinates.
    pub x: f64,
    /// Top edge in world coordinates.
    pub y: f64,
    /// Width in world units; never below [`NOTE_MIN_WIDTH`] after a local edit.
    pub width: f64,
    /// Height in world units; never below [`NOTE_MIN_HEIGHT`] after a local edit.
    pub height: f64,
    /// Free-form text content.
    pub text: String,
    /// Palette color.
    pub color: NoteColor,
}

impl Note {
    /// A new empty note of default size with its top-left corner at `(x, y)`.
    #[must_use]
    pub fn new(id: NoteId, x: f64, y: f64, color: NoteColor) -> Self {
        Self {
            id,
            x,
            y,
            width: NOTE_DEFAULT_WIDTH,
            height: NOTE_DEFAULT_HEIGHT,
            text: String::new(),
            color,
        }
    }

    /// Top-left corner in world coordinates.
    #[must_use]
    pub fn position(&self) -> Point {
        Point::new(self.x, self.y)
    }

    /// Whether the world point lies inside the note's bounds.
    #[must_use]
    pub fn contains(&self, pt: Point) -> bool {
        pt.x >= self.x && pt.x <= self.x + self.width && pt.y >= self.y && pt.y <= self.y + self.height
    }
}

/// Sparse update for a note. Only present fields are applied.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct NotePatch {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub x: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub y: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub width: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub height: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub color: Option<NoteColor>,
}

impl NotePatch {
    /// Patch carrying a new position.
    #[must_use]
    pub fn position(x: f64, y: f64) -> Self {
        Self { x: Some(x), y: Some(y), ..Self::default() }
    }

    /// Apply the present fields to `note`, clamping size to the note minimum.
    pub fn apply_to(&self, note: &mut Note) {
        if let Some(x) = self.x {
            note.x = x;
        }
        if let Some(y) = self.y {
            note.y = y;
        }
        if let Some(w) = self.width {
            note.width = w.max(NOTE_MIN_WIDTH);
        }
        if let Some(h) = self.height {
            note.height = h.max(NOTE_MIN_HEIGHT);
        }
        if let Some(ref text) = self.text {
            note.text.clone_from(text);
        }
        if let Some(color) = self.color {
            note.color = color;
        }
    }
}

// =============================================================================
// CONNECTIONS
// =============================================================================

/// Line style of a connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ConnectionStyle {
    #[default]
    Solid,
    Dashed,
}

/// A directed connection from one note to another.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Connection {
    pub id: ConnectionId,
    /// Note the arrow starts at.
    pub from_note_id: NoteId,
    /// Note the arrow points to.
    pub to_note_id: NoteId,
    pub style: ConnectionStyle,
    /// Stroke color as a CSS color string.
    pub color: String,
    /// Optional text drawn at the midpoint.
    pub label: Option<String>,
}

impl Connection {
    /// Whether `note_id` is either endpoint.
    #[must_use]
    pub fn touches(&self, note_id: &NoteId) -> bool {
        self.from_note_id == *note_id || self.to_note_id == *note_id
    }
}

/// Sparse update for a connection. An empty `label` clears it.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ConnectionPatch {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub style: Option<ConnectionStyle>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub color: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub label: Option<String>,
}

impl ConnectionPatch {
    /// Apply the present fields to `connection`.
    pub fn apply_to(&self, connection: &mut Connection) {
        if let Some(style) = self.style {
            connection.style = style;
        }
        if let Some(ref color) = self.color {
            connection.color.clone_from(color);
        }
        if let Some(ref label) = self.label {
            connection.label = if label.is_empty() { None } else { Some(label.clone()) };
        }
    }
}

// =============================================================================
// IMAGES
// =============================================================================

/// An uploaded image placed on the board.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ImageElement {
    pub id: ImageId,
    pub x: f64,
    pub y: f64,
    pub width: f64,
    pub height: f64,
    /// Public URL returned by the upload port.
    pub url: String,
}

impl ImageElement {
    #[must_use]
    pub fn position(&self) -> Point {
        Point::new(self.x, self.y)
    }

    #[must_use]
    pub fn contains(&self, pt: Point) -> bool {
        pt.x >= self.x && pt.x <= self.x + self.width && pt.y >= self.y && pt.y <= self.y + self.height
    }
}

/// Sparse update for an image. Images are only ever moved.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ImagePatch {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub x: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub y: Option<f64>,
}

impl ImagePatch {
    /// Apply the present fields to `image`.
    pub fn apply_to(&self, image: &mut ImageElement) {
        if let Some(x) = self.x {
            image.x = x;
        }
        if let Some(y) = self.y {
            image.y = y;
        }
    }
}

// =============================================================================
// DRAWINGS
// =============================================================================

/// Failure to decode an encoded stroke path.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum PathError {
    #[error("path is empty")]
    Empty,
    #[error("path must start with a move command")]
    MissingMove,
    #[error("unexpected command {command:?} at token {position}")]
    UnexpectedCommand { command: String, position: usize },
    #[error("invalid number {0:?}")]
    InvalidNumber(String),
    #[error("command at token {0} is missing a coordinate")]
    MissingCoordinate(usize),
}

/// A freehand polyline in world coordinates.
///
/// Encoded on the wire as move/line commands: `"M x y L x y L x y"`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct StrokePath {
    points: Vec<Point>,
}

impl StrokePath {
    /// Start a path at `origin`.
    #[must_use]
    pub fn starting_at(origin: Point) -> Self {
        Self { points: vec![origin] }
    }

    /// Build a path from points, dropping consecutive duplicates.
    #[must_use]
    pub fn from_points(points: impl IntoIterator<Item = Point>) -> Self {
        let mut path = Self::default();
        for p in points {
            path.push(p);
        }
        path
    }

    /// Append a line segment to `pt`. Returns false if `pt` repeats the last point.
    pub fn push(&mut self, pt: Point) -> bool {
        if self.points.last() == Some(&pt) {
            return false;
        }
        self.points.push(pt);
        true
    }

    #[must_use]
    pub fn points(&self) -> &[Point] {
        &self.points
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.points.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    /// Total length of all segments in world units.
    #[must_use]
    pub fn travel(&self) -> f64 {
        self.points.windows(2).map(|w| w[0].distance(w[1])).sum()
    }

    /// Encode as move/line commands.
    #[must_use]
    pub fn encode(&self) -> String {
        self.to_string()
    }

    /// Decode move/line commands. Commas are accepted as separators and a
    /// command letter may be glued to its first number (`"M10 20L30 40"`).
    ///
    /// # Errors
    ///
    /// Returns a [`PathError`] if the string is empty, does not start with
    /// `M`, contains another command, or has a malformed coordinate.
    pub fn parse(encoded: &str) -> Result<Self, PathError> {
        let tokens = tokenize(encoded);
        if tokens.is_empty() {
            return Err(PathError::Empty);
        }
        if tokens[0] != "M" {
            return Err(PathError::MissingMove);
        }

        let mut points = Vec::new();
        let mut i = 0;
        while i < tokens.len() {
            let command = tokens[i].as_str();
            let expected = if i == 0 { "M" } else { "L" };
            if command != expected {
                return Err(PathError::UnexpectedCommand { command: command.to_string(), position: i });
            }
            let x = number_at(&tokens, i + 1, i)?;
            let y = number_at(&tokens, i + 2, i)?;
            points.push(Point::new(x, y));
            i += 3;
        }
        Ok(Self::from_points(points))
    }
}

fn tokenize(encoded: &str) -> Vec<String> {
    let mut tokens = Vec::new();
    for raw in encoded.split(|c: char| c.is_whitespace() || c == ',') {
        if raw.is_empty() {
            continue;
        }
        let mut rest = raw;
        while let Some(first) = rest.chars().next() {
            if first.is_ascii_alphabetic() {
                tokens.push(first.to_string());
                rest = &rest[first.len_utf8()..];
            } else {
                let end = rest.find(|c: char| c.is_ascii_alphabetic() && c != 'e' && c != 'E').unwrap_or(rest.len());
                tokens.push(rest[..end].to_string());
                rest = &rest[end..];
            }
        }
    }
    tokens
}

fn number_at(tokens: &[String], index: usize, command_pos: usize) -> Result<f64, PathError> {
    let Some(token) = tokens.get(index) else {
        return Err(PathError::MissingCoordinate(command_pos));
    };
    let value: f64 = token.parse().map_err(|_| PathError::InvalidNumber(token.clone()))?;
    if value.is_finite() { Ok(value) } else { Err(PathError::InvalidNumber(token.clone())) }
}

impl fmt::Display for StrokePath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, p) in self.points.iter().enumerate() {
            if i > 0 {
                f.write_str(" ")?;
            }
            let command = if i == 0 { 'M' } else { 'L' };
            write!(f, "{command} {} {}", p.x, p.y)?;
        }
        Ok(())
    }
}

impl TryFrom<String> for StrokePath {
    type Error = PathError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(&value)
    }
}

impl From<StrokePath> for String {
    fn from(path: StrokePath) -> Self {
        path.encode()
    }
}

/// A committed freehand stroke. Immutable once created.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Drawing {
    pub id: DrawingId,
    pub path: StrokePath,
    /// Stroke color as a CSS color string.
    pub color: String,
    /// Stroke width in world units.
    pub width: f64,
}

// =============================================================================
// STORE
// =============================================================================

/// A note together with the connections that were removed with it.
#[derive(Debug, Clone, PartialEq)]
pub struct NoteRemoval {
    pub note: Note,
    pub connections: Vec<Connection>,
}

/// In-memory store of everything on one owner's board.
///
/// Collections keep insertion (or snapshot) order, which doubles as the
/// default stacking order.
#[derive(Debug, Clone, Default)]
pub struct DocStore {
    notes: Vec<Note>,
    connections: Vec<Connection>,
    images: Vec<ImageElement>,
    drawings: Vec<Drawing>,
}

impl DocStore {
    /// Create an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Drop every entity of every kind.
    pub fn clear(&mut self) {
        self.notes.clear();
        self.connections.clear();
        self.images.clear();
        self.drawings.clear();
    }

    /// Returns `true` if no entity of any kind is present.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.notes.is_empty() && self.connections.is_empty() && self.images.is_empty() && self.drawings.is_empty()
    }

    // --- Notes ---

    #[must_use]
    pub fn notes(&self) -> &[Note] {
        &self.notes
    }

    #[must_use]
    pub fn note(&self, id: &NoteId) -> Option<&Note> {
        self.notes.iter().find(|n| n.id == *id)
    }

    /// Insert a note, replacing any existing note with the same id in place.
    pub fn insert_note(&mut self, note: Note) {
        if let Some(existing) = self.notes.iter_mut().find(|n| n.id == note.id) {
            *existing = note;
        } else {
            self.notes.push(note);
        }
    }

    /// Apply a partial update. Returns false if the note doesn't exist.
    pub fn update_note(&mut self, id: &NoteId, patch: &NotePatch) -> bool {
        let Some(note) = self.notes.iter_mut().find(|n| n.id == *id) else {
            return false;
        };
        patch.apply_to(note);
        true
    }

    /// Remove a note and every connection that references it, as one unit.
    pub fn delete_note(&mut self, id: &NoteId) -> Option<NoteRemoval> {
        let index = self.notes.iter().position(|n| n.id == *id)?;
        let note = self.notes.remove(index);
        let (removed, kept): (Vec<Connection>, Vec<Connection>) =
            std::mem::take(&mut self.connections).into_iter().partition(|c| c.touches(id));
        self.connections = kept;
        debug!(note_id = %id, cascaded = removed.len(), "note deleted");
        Some(NoteRemoval { note, connections: removed })
    }

    /// Replace the whole note collection with a snapshot.
    pub fn replace_notes(&mut self, notes: Vec<Note>) {
        self.notes = notes;
    }

    /// Re-identify a note, including connection endpoints that reference it.
    ///
    /// If a note with the new id already arrived in a snapshot, that copy is
    /// kept and the old one is dropped. Endpoints are rewritten even when the
    /// old note is already gone. Returns whether the old note was present.
    pub fn rekey_note(&mut self, old: &NoteId, new: NoteId) -> bool {
        let found = rekey(&mut self.notes, old, new, |n| &mut n.id);
        for c in &mut self.connections {
            if c.from_note_id == *old {
                c.from_note_id = new;
            }
            if c.to_note_id == *old {
                c.to_note_id = new;
            }
        }
        found
    }

    // --- Connections ---

    #[must_use]
    pub fn connections(&self) -> &[Connection] {
        &self.connections
    }

    #[must_use]
    pub fn connection(&self, id: &ConnectionId) -> Option<&Connection> {
        self.connections.iter().find(|c| c.id == *id)
    }

    /// Connections whose endpoints both resolve to notes. Snapshots may
    /// briefly carry connections to notes another session just deleted.
    pub fn resolved_connections(&self) -> impl Iterator<Item = &Connection> {
        self.connections
            .iter()
            .filter(|c| self.note(&c.from_note_id).is_some() && self.note(&c.to_note_id).is_some())
    }

    /// Create a connection between two existing, distinct notes.
    ///
    /// Returns `None` (and changes nothing) if `from == to` or either note
    /// does not exist. Parallel connections between the same pair are allowed.
    pub fn create_connection(
        &mut self,
        from: NoteId,
        to: NoteId,
        style: ConnectionStyle,
        color: &str,
    ) -> Option<Connection> {
        if from == to || self.note(&from).is_none() || self.note(&to).is_none() {
            debug!(%from, %to, "connection refused");
            return None;
        }
        let connection = Connection {
            id: Uuid::new_v4(),
            from_note_id: from,
            to_note_id: to,
            style,
            color: color.to_string(),
            label: None,
        };
        self.connections.push(connection.clone());
        Some(connection)
    }

    /// Insert a connection as-is, replacing one with the same id.
    pub fn insert_connection(&mut self, connection: Connection) {
        if let Some(existing) = self.connections.iter_mut().find(|c| c.id == connection.id) {
            *existing = connection;
        } else {
            self.connections.push(connection);
        }
    }

    /// Apply a partial update. Returns false if the connection doesn't exist.
    pub fn update_connection(&mut self, id: &ConnectionId, patch: &ConnectionPatch) -> bool {
        let Some(connection) = self.connections.iter_mut().find(|c| c.id == *id) else {
            return false;
        };
        patch.apply_to(connection);
        true
    }

    pub fn delete_connection(&mut self, id: &ConnectionId) -> Option<Connection> {
        let index = self.connections.iter().position(|c| c.id == *id)?;
        Some(self.connections.remove(index))
    }

    pub fn replace_connections(&mut self, connections: Vec<Connection>) {
        self.connections = connections;
    }

    pub fn rekey_connection(&mut self, old: &ConnectionId, new: ConnectionId) -> bool {
        rekey(&mut self.connections, old, new, |c| &mut c.id)
    }

    // --- Images ---

    #[must_use]
    pub fn images(&self) -> &[ImageElement] {
        &self.images
    }

    #[must_use]
    pub fn image(&self, id: &ImageId) -> Option<&ImageElement> {
        self.images.iter().find(|i| i.id == *id)
    }

    pub fn insert_image(&mut self, image: ImageElement) {
        if let Some(existing) = self.images.iter_mut().find(|i| i.id == image.id) {
            *existing = image;
        } else {
            self.images.push(image);
        }
    }

    pub fn update_image(&mut self, id: &ImageId, patch: &ImagePatch) -> bool {
        let Some(image) = self.images.iter_mut().find(|i| i.id == *id) else {
            return false;
        };
        patch.apply_to(image);
        true
    }

    pub fn delete_image(&mut self, id: &ImageId) -> Option<ImageElement> {
        let index = self.images.iter().position(|i| i.id == *id)?;
        Some(self.images.remove(index))
    }

    pub fn replace_images(&mut self, images: Vec<ImageElement>) {
        self.images = images;
    }

    pub fn rekey_image(&mut self, old: &ImageId, new: ImageId) -> bool {
        rekey(&mut self.images, old, new, |i| &mut i.id)
    }

    // --- Drawings ---

    #[must_use]
    pub fn drawings(&self) -> &[Drawing] {
        &self.drawings
    }

    #[must_use]
    pub fn drawing(&self, id: &DrawingId) -> Option<&Drawing> {
        self.drawings.iter().find(|d| d.id == *id)
    }

    pub fn insert_drawing(&mut self, drawing: Drawing) {
        if let Some(existing) = self.drawings.iter_mut().find(|d| d.id == drawing.id) {
            *existing = drawing;
        } else {
            self.drawings.push(drawing);
        }
    }

    pub fn delete_drawing(&mut self, id: &DrawingId) -> Option<Drawing> {
        let index = self.drawings.iter().position(|d| d.id == *id)?;
        Some(self.drawings.remove(index))
    }

    pub fn replace_drawings(&mut self, drawings: Vec<Drawing>) {
        self.drawings = drawings;
    }

    pub fn rekey_drawing(&mut self, old: &DrawingId, new: DrawingId) -> bool {
        rekey(&mut self.drawings, old, new, |d| &mut d.id)
    }
}

fn rekey<T>(items: &mut Vec<T>, old: &Uuid, new: Uuid, id_of: impl Fn(&mut T) -> &mut Uuid) -> bool {
    let Some(index) = items.iter_mut().position(|item| *id_of(item) == *old) else {
        return false;
    };
    if items.iter_mut().any(|item| *id_of(item) == new) {
        items.remove(index);
    } else {
        *id_of(&mut items[index]) = new;
    }
    true
}
