//! The board engine: pointer/keyboard handlers, commands, and snapshot intake.
//!
//! `EngineCore` owns the document, the camera, the view state and the active
//! gesture. Every handler mutates local state synchronously (optimistic) and
//! returns the `Action`s describing what changed. Persisted actions are the
//! host's responsibility to mirror to the store; the engine never waits for
//! a write.
//!
//! Drag and resize share one coordinate rule: pointer positions are mapped
//! through `Camera::screen_to_world` before any delta is applied, so an
//! entity follows the pointer exactly at every zoom level.

#[cfg(test)]
#[path = "engine_test.rs"]
mod engine_test;

use tracing::debug;
use uuid::Uuid;

use crate::camera::{Camera, Point};
use crate::consts::{
    DRAG_THRESHOLD_PX, MIN_STROKE_POINTS, MIN_STROKE_TRAVEL_PX, NEW_ITEM_CASCADE, NEW_ITEM_CASCADE_STEPS,
    NOTE_DEFAULT_HEIGHT, NOTE_DEFAULT_WIDTH, WHEEL_ZOOM_SPEED,
};
use crate::doc::{
    Connection, ConnectionId, ConnectionPatch, ConnectionStyle, DocStore, Drawing, DrawingId, EntityKind, ImageElement,
    ImageId, ImagePatch, Note, NoteColor, NoteId, NotePatch, StrokePath,
};
use crate::hit::{Hit, NotePart, hit_drawing, hit_test};
use crate::input::{Button, ConnectMode, InputState, Key, Modifiers, Tool, UiState, WheelDelta};

/// Actions returned from handlers for the host to process.
#[derive(Debug, Clone, PartialEq)]
pub enum Action {
    NoteCreated(Note),
    NoteUpdated { id: NoteId, fields: NotePatch },
    NoteDeleted { id: NoteId },
    ConnectionCreated(Connection),
    ConnectionUpdated { id: ConnectionId, fields: ConnectionPatch },
    ConnectionDeleted { id: ConnectionId },
    ImageCreated(ImageElement),
    ImageUpdated { id: ImageId, fields: ImagePatch },
    ImageDeleted { id: ImageId },
    DrawingCreated(Drawing),
    DrawingDeleted { id: DrawingId },
    SetCursor(String),
    RenderNeeded,
}

impl Action {
    /// Whether this action must be mirrored to the persistence port.
    #[must_use]
    pub fn is_persisted(&self) -> bool {
        !matches!(self, Self::SetCursor(_) | Self::RenderNeeded)
    }
}

fn cursor(name: &str) -> Action {
    Action::SetCursor(name.to_string())
}

/// Engine state for one viewing session.
#[derive(Debug, Default)]
pub struct EngineCore {
    pub doc: DocStore,
    pub camera: Camera,
    pub ui: UiState,
    pub input: InputState,
    pub viewport_width: f64,
    pub viewport_height: f64,
}

impl EngineCore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    // --- Snapshot intake ---

    /// Replace all notes with a remote snapshot.
    ///
    /// The replacement is unconditional: a note being dragged is reset to
    /// the snapshot's copy and the drag continues from there. Selection and
    /// the pending connection endpoint are pruned to notes that still exist.
    pub fn replace_notes(&mut self, notes: Vec<Note>) {
        self.doc.replace_notes(notes);
        let doc = &self.doc;
        self.ui.selection.retain(|id| doc.note(id).is_some());
        if let ConnectMode::Armed { pending: Some(id) } = self.ui.connect {
            if self.doc.note(&id).is_none() {
                self.ui.connect = ConnectMode::Armed { pending: None };
            }
        }
    }

    pub fn replace_connections(&mut self, connections: Vec<Connection>) {
        self.doc.replace_connections(connections);
    }

    pub fn replace_images(&mut self, images: Vec<ImageElement>) {
        self.doc.replace_images(images);
    }

    pub fn replace_drawings(&mut self, drawings: Vec<Drawing>) {
        self.doc.replace_drawings(drawings);
    }

    /// Forget everything: used when the owning user changes.
    pub fn reset(&mut self) {
        self.doc.clear();
        self.ui.selection.clear();
        self.ui.connect = ConnectMode::Off;
        self.input = InputState::Idle;
    }

    /// Re-identify an entity after the store assigned it a different id.
    ///
    /// A notes snapshot may already have replaced the old note, so references
    /// to it (connection endpoints, selection, pending endpoint, gesture) are
    /// rewritten either way. Returns whether the old entity was still present.
    pub fn rekey(&mut self, kind: EntityKind, old: &Uuid, new: Uuid) -> bool {
        match kind {
            EntityKind::Note => {
                let found = self.doc.rekey_note(old, new);
                self.ui.selection.replace(old, new);
                if self.ui.connect.pending().as_ref() == Some(old) {
                    self.ui.connect = ConnectMode::Armed { pending: Some(new) };
                }
                match &mut self.input {
                    InputState::PressingNote { id, .. }
                    | InputState::DraggingNote { id, .. }
                    | InputState::ResizingNote { id, .. }
                        if *id == *old =>
                    {
                        *id = new;
                    }
                    _ => {}
                }
                found
            }
            EntityKind::Connection => self.doc.rekey_connection(old, new),
            EntityKind::Image => {
                if !self.doc.rekey_image(old, new) {
                    return false;
                }
                match &mut self.input {
                    InputState::PressingImage { id, .. } | InputState::DraggingImage { id, .. } if *id == *old => {
                        *id = new;
                    }
                    _ => {}
                }
                true
            }
            EntityKind::Drawing => self.doc.rekey_drawing(old, new),
        }
    }

    // --- Queries ---

    #[must_use]
    pub fn camera(&self) -> Camera {
        self.camera
    }

    #[must_use]
    pub fn note(&self, id: &NoteId) -> Option<&Note> {
        self.doc.note(id)
    }

    /// The single selected note, if any.
    #[must_use]
    pub fn selection(&self) -> Option<NoteId> {
        self.ui.selection.primary()
    }

    /// The note under an active press, drag or resize.
    #[must_use]
    pub fn active_note(&self) -> Option<NoteId> {
        self.input.active_note()
    }

    /// The image under an active press or drag.
    #[must_use]
    pub fn active_image(&self) -> Option<ImageId> {
        self.input.active_image()
    }

    /// Notes bottom-to-top: insertion order, with the note under interaction on top.
    #[must_use]
    pub fn notes_in_draw_order(&self) -> Vec<&Note> {
        let active = self.input.active_note();
        let mut order: Vec<&Note> = self.doc.notes().iter().filter(|n| Some(n.id) != active).collect();
        if let Some(note) = active.and_then(|id| self.doc.note(&id)) {
            order.push(note);
        }
        order
    }

    /// Whether the toolbar should be drawn. Always hidden while presenting.
    #[must_use]
    pub fn toolbar_visible(&self) -> bool {
        self.ui.toolbar_visible && !self.ui.presenting
    }

    // --- View commands ---

    /// Update viewport dimensions in screen pixels.
    pub fn set_viewport(&mut self, width: f64, height: f64) {
        self.viewport_width = width;
        self.viewport_height = height;
    }

    /// Switch tools. An unfinished stroke is discarded.
    pub fn set_tool(&mut self, tool: Tool) -> Vec<Action> {
        if matches!(self.input, InputState::Drawing { .. }) {
            self.input = InputState::Idle;
        }
        self.ui.tool = tool;
        vec![Action::RenderNeeded]
    }

    pub fn set_brush(&mut self, color: &str, width: f64) {
        self.ui.brush_color = color.to_string();
        self.ui.brush_width = width.max(0.5);
    }

    pub fn zoom_in(&mut self) -> Vec<Action> {
        self.camera.zoom_in();
        vec![Action::RenderNeeded]
    }

    pub fn zoom_out(&mut self) -> Vec<Action> {
        self.camera.zoom_out();
        vec![Action::RenderNeeded]
    }

    pub fn reset_view(&mut self) -> Vec<Action> {
        self.camera.reset();
        vec![Action::RenderNeeded]
    }

    pub fn toggle_toolbar(&mut self) -> Vec<Action> {
        self.ui.toolbar_visible = !self.ui.toolbar_visible;
        vec![Action::RenderNeeded]
    }

    /// Enter or leave presentation mode. Entering also leaves connection mode.
    pub fn toggle_presentation(&mut self) -> Vec<Action> {
        self.ui.presenting = !self.ui.presenting;
        if self.ui.presenting {
            self.ui.connect = ConnectMode::Off;
        }
        vec![Action::RenderNeeded]
    }

    /// Arm or disarm connection mode. Disarming drops any pending endpoint.
    pub fn toggle_connect_mode(&mut self) -> Vec<Action> {
        if self.ui.presenting {
            return Vec::new();
        }
        self.ui.connect = match self.ui.connect {
            ConnectMode::Off => ConnectMode::Armed { pending: None },
            ConnectMode::Armed { .. } => ConnectMode::Off,
        };
        vec![Action::RenderNeeded]
    }

    // --- Note commands ---

    /// Add an empty note of `color` centered in the viewport.
    pub fn add_note(&mut self, color: NoteColor) -> Vec<Action> {
        if self.ui.presenting {
            return Vec::new();
        }
        let at = self.placement(NOTE_DEFAULT_WIDTH, NOTE_DEFAULT_HEIGHT, self.doc.notes().len());
        let note = Note::new(Uuid::new_v4(), at.x, at.y, color);
        debug!(note_id = %note.id, color = ?color, "note added");
        self.doc.insert_note(note.clone());
        vec![Action::NoteCreated(note), Action::RenderNeeded]
    }

    pub fn set_note_text(&mut self, id: &NoteId, text: &str) -> Vec<Action> {
        match self.doc.note(id) {
            Some(note) if !self.ui.presenting && note.text != text => {}
            _ => return Vec::new(),
        }
        let fields = NotePatch { text: Some(text.to_string()), ..NotePatch::default() };
        self.update_note(*id, fields)
    }

    pub fn set_note_color(&mut self, id: &NoteId, color: NoteColor) -> Vec<Action> {
        match self.doc.note(id) {
            Some(note) if !self.ui.presenting && note.color != color => {}
            _ => return Vec::new(),
        }
        let fields = NotePatch { color: Some(color), ..NotePatch::default() };
        self.update_note(*id, fields)
    }

    /// Delete a note and every connection attached to it.
    pub fn delete_note(&mut self, id: &NoteId) -> Vec<Action> {
        if self.ui.presenting {
            return Vec::new();
        }
        self.remove_note(id)
    }

    /// Delete the multi-selection if non-empty, else the selected note.
    pub fn delete_selected(&mut self) -> Vec<Action> {
        if self.ui.presenting {
            return Vec::new();
        }
        let targets = self.ui.selection.deletion_targets();
        let mut actions: Vec<Action> = Vec::new();
        for id in &targets {
            actions.extend(self.remove_note(id).into_iter().filter(Action::is_persisted));
        }
        if !actions.is_empty() {
            debug!(count = targets.len(), "selection deleted");
            actions.push(Action::RenderNeeded);
        }
        actions
    }

    // --- Connection commands ---

    pub fn set_connection_style(&mut self, id: &ConnectionId, style: ConnectionStyle) -> Vec<Action> {
        self.update_connection(*id, ConnectionPatch { style: Some(style), ..ConnectionPatch::default() })
    }

    pub fn set_connection_color(&mut self, id: &ConnectionId, color: &str) -> Vec<Action> {
        self.update_connection(*id, ConnectionPatch { color: Some(color.to_string()), ..ConnectionPatch::default() })
    }

    /// Set the label; an empty string removes it.
    pub fn set_connection_label(&mut self, id: &ConnectionId, label: &str) -> Vec<Action> {
        self.update_connection(*id, ConnectionPatch { label: Some(label.to_string()), ..ConnectionPatch::default() })
    }

    pub fn delete_connection(&mut self, id: &ConnectionId) -> Vec<Action> {
        if self.ui.presenting || self.doc.delete_connection(id).is_none() {
            return Vec::new();
        }
        vec![Action::ConnectionDeleted { id: *id }, Action::RenderNeeded]
    }

    // --- Image and drawing commands ---

    /// Place an uploaded image centered in the viewport.
    pub fn add_image(&mut self, url: &str, width: f64, height: f64) -> Vec<Action> {
        if self.ui.presenting {
            return Vec::new();
        }
        let at = self.placement(width, height, self.doc.images().len());
        let image = ImageElement { id: Uuid::new_v4(), x: at.x, y: at.y, width, height, url: url.to_string() };
        debug!(image_id = %image.id, "image added");
        self.doc.insert_image(image.clone());
        vec![Action::ImageCreated(image), Action::RenderNeeded]
    }

    pub fn delete_image(&mut self, id: &ImageId) -> Vec<Action> {
        if self.ui.presenting || self.doc.delete_image(id).is_none() {
            return Vec::new();
        }
        if self.input.active_image() == Some(*id) {
            self.input = InputState::Idle;
        }
        vec![Action::ImageDeleted { id: *id }, Action::RenderNeeded]
    }

    pub fn delete_drawing(&mut self, id: &DrawingId) -> Vec<Action> {
        if self.ui.presenting || self.doc.delete_drawing(id).is_none() {
            return Vec::new();
        }
        vec![Action::DrawingDeleted { id: *id }, Action::RenderNeeded]
    }

    // --- Pointer input ---

    pub fn on_pointer_down(&mut self, screen_pt: Point, button: Button, modifiers: Modifiers) -> Vec<Action> {
        if !matches!(self.input, InputState::Idle) {
            return Vec::new();
        }

        // Space, the middle button, or any press while presenting pans.
        if self.ui.space_held || button == Button::Middle || (self.ui.presenting && button == Button::Primary) {
            self.input = InputState::Panning { start_offset: screen_pt - self.camera.pan() };
            return vec![cursor("grabbing")];
        }
        if button != Button::Primary {
            return Vec::new();
        }

        let world = self.camera.screen_to_world(screen_pt);
        match self.ui.tool {
            Tool::Brush => {
                self.input = InputState::Drawing { buffer: StrokePath::starting_at(world) };
                return Vec::new();
            }
            Tool::Eraser => {
                return match hit_drawing(world, self.doc.drawings()) {
                    Some(id) => self.delete_drawing(&id),
                    None => Vec::new(),
                };
            }
            Tool::Select => {}
        }

        let hit = {
            let order = self.notes_in_draw_order();
            hit_test(world, &order, self.doc.images(), &self.camera)
        };
        match hit {
            Some(Hit::Note { id, part: NotePart::ResizeHandle(handle) }) => {
                let Some(note) = self.doc.note(&id) else {
                    return Vec::new();
                };
                self.input = InputState::ResizingNote {
                    id,
                    handle,
                    start_screen: screen_pt,
                    start_width: note.width,
                    start_height: note.height,
                };
                vec![cursor(handle.cursor()), Action::RenderNeeded]
            }
            Some(Hit::Note { id, part: NotePart::DragHandle }) => {
                let Some(note) = self.doc.note(&id) else {
                    return Vec::new();
                };
                self.input =
                    InputState::PressingNote { id, grab_offset: world - note.position(), start_screen: screen_pt };
                vec![Action::RenderNeeded]
            }
            Some(Hit::Note { id, part: NotePart::Body }) => self.click_note(id, modifiers),
            Some(Hit::Image { id }) => {
                let Some(image) = self.doc.image(&id) else {
                    return Vec::new();
                };
                self.input =
                    InputState::PressingImage { id, grab_offset: world - image.position(), start_screen: screen_pt };
                Vec::new()
            }
            None => {
                if self.ui.connect.is_armed() || self.ui.selection.is_empty() {
                    return Vec::new();
                }
                self.ui.selection.clear();
                vec![Action::RenderNeeded]
            }
        }
    }

    pub fn on_pointer_move(&mut self, screen_pt: Point, _modifiers: Modifiers) -> Vec<Action> {
        let state = std::mem::take(&mut self.input);
        match state {
            InputState::Idle => Vec::new(),
            InputState::PressingNote { id, grab_offset, start_screen } => {
                if screen_pt.distance(start_screen) <= DRAG_THRESHOLD_PX {
                    self.input = InputState::PressingNote { id, grab_offset, start_screen };
                    return Vec::new();
                }
                if !self.move_note(id, grab_offset, screen_pt) {
                    return Vec::new();
                }
                debug!(note_id = %id, "note drag started");
                self.input = InputState::DraggingNote { id, grab_offset };
                vec![cursor("grabbing"), Action::RenderNeeded]
            }
            InputState::DraggingNote { id, grab_offset } => {
                if !self.move_note(id, grab_offset, screen_pt) {
                    return Vec::new();
                }
                self.input = InputState::DraggingNote { id, grab_offset };
                vec![Action::RenderNeeded]
            }
            InputState::ResizingNote { id, handle, start_screen, start_width, start_height } => {
                let dx = self.camera.screen_dist_to_world(screen_pt.x - start_screen.x);
                let dy = self.camera.screen_dist_to_world(screen_pt.y - start_screen.y);
                let mut fields = NotePatch::default();
                if handle.affects_width() {
                    fields.width = Some(start_width + if handle.on_left() { -dx } else { dx });
                }
                if handle.affects_height() {
                    fields.height = Some(start_height + if handle.on_top() { -dy } else { dy });
                }
                if !self.doc.update_note(&id, &fields) {
                    return Vec::new();
                }
                self.input = InputState::ResizingNote { id, handle, start_screen, start_width, start_height };
                vec![Action::RenderNeeded]
            }
            InputState::PressingImage { id, grab_offset, start_screen } => {
                if screen_pt.distance(start_screen) <= DRAG_THRESHOLD_PX {
                    self.input = InputState::PressingImage { id, grab_offset, start_screen };
                    return Vec::new();
                }
                if !self.move_image(id, grab_offset, screen_pt) {
                    return Vec::new();
                }
                self.input = InputState::DraggingImage { id, grab_offset };
                vec![cursor("grabbing"), Action::RenderNeeded]
            }
            InputState::DraggingImage { id, grab_offset } => {
                if !self.move_image(id, grab_offset, screen_pt) {
                    return Vec::new();
                }
                self.input = InputState::DraggingImage { id, grab_offset };
                vec![Action::RenderNeeded]
            }
            InputState::Panning { start_offset } => {
                self.camera.set_pan(screen_pt - start_offset);
                self.input = InputState::Panning { start_offset };
                vec![Action::RenderNeeded]
            }
            InputState::Drawing { mut buffer } => {
                let changed = buffer.push(self.camera.screen_to_world(screen_pt));
                self.input = InputState::Drawing { buffer };
                if changed { vec![Action::RenderNeeded] } else { Vec::new() }
            }
        }
    }

    pub fn on_pointer_up(&mut self, _screen_pt: Point, _button: Button, modifiers: Modifiers) -> Vec<Action> {
        let state = std::mem::take(&mut self.input);
        if !matches!(state, InputState::Idle) {
            debug!(state = state.name(), "pointer released");
        }
        match state {
            InputState::Idle => Vec::new(),
            InputState::PressingNote { id, .. } => self.click_note(id, modifiers),
            InputState::DraggingNote { id, .. } => {
                let Some(note) = self.doc.note(&id) else {
                    return vec![cursor("default")];
                };
                debug!(note_id = %id, x = note.x, y = note.y, "note drag committed");
                vec![
                    Action::NoteUpdated { id, fields: NotePatch::position(note.x, note.y) },
                    cursor("default"),
                    Action::RenderNeeded,
                ]
            }
            InputState::ResizingNote { id, .. } => {
                let Some(note) = self.doc.note(&id) else {
                    return vec![cursor("default")];
                };
                debug!(note_id = %id, width = note.width, height = note.height, "note resize committed");
                let fields = NotePatch {
                    x: Some(note.x),
                    y: Some(note.y),
                    width: Some(note.width),
                    height: Some(note.height),
                    ..NotePatch::default()
                };
                vec![Action::NoteUpdated { id, fields }, cursor("default"), Action::RenderNeeded]
            }
            InputState::PressingImage { .. } => Vec::new(),
            InputState::DraggingImage { id, .. } => {
                let Some(image) = self.doc.image(&id) else {
                    return vec![cursor("default")];
                };
                let fields = ImagePatch { x: Some(image.x), y: Some(image.y) };
                vec![Action::ImageUpdated { id, fields }, cursor("default"), Action::RenderNeeded]
            }
            InputState::Panning { .. } => vec![cursor(if self.ui.space_held { "grab" } else { "default" })],
            InputState::Drawing { buffer } => self.commit_stroke(buffer),
        }
    }

    /// Plain wheel pans; ctrl/cmd + wheel zooms around the pointer.
    pub fn on_wheel(&mut self, screen_pt: Point, delta: WheelDelta, modifiers: Modifiers) -> Vec<Action> {
        if modifiers.command() {
            let factor = (-delta.dy * WHEEL_ZOOM_SPEED).exp();
            self.camera.zoom_at(screen_pt, self.camera.zoom * factor);
        } else {
            self.camera.pan_by(-delta.dx, -delta.dy);
        }
        vec![Action::RenderNeeded]
    }

    // --- Keyboard input ---

    pub fn on_key_down(&mut self, key: &Key, _modifiers: Modifiers) -> Vec<Action> {
        if key.is_space() {
            if self.ui.space_held {
                return Vec::new();
            }
            self.ui.space_held = true;
            return vec![cursor("grab")];
        }
        if key.is_escape() {
            return self.escape();
        }
        if key.is_delete() {
            return self.delete_selected();
        }
        Vec::new()
    }

    pub fn on_key_up(&mut self, key: &Key, _modifiers: Modifiers) -> Vec<Action> {
        if !key.is_space() {
            return Vec::new();
        }
        self.ui.space_held = false;
        if matches!(self.input, InputState::Panning { .. }) {
            self.input = InputState::Idle;
        }
        vec![cursor("default")]
    }

    // --- Internals ---

    /// Top-left corner for a new `width` x `height` item centered in the
    /// viewport, cascaded by the number of existing items of its kind.
    fn placement(&self, width: f64, height: f64, existing: usize) -> Point {
        let center = self.camera.screen_to_world(Point::new(self.viewport_width / 2.0, self.viewport_height / 2.0));
        #[allow(clippy::cast_precision_loss)]
        let offset = (existing % NEW_ITEM_CASCADE_STEPS) as f64 * NEW_ITEM_CASCADE;
        Point::new(center.x - width / 2.0 + offset, center.y - height / 2.0 + offset)
    }

    /// A click on a note: connection handling when armed, otherwise selection.
    fn click_note(&mut self, id: NoteId, modifiers: Modifiers) -> Vec<Action> {
        if let ConnectMode::Armed { pending } = self.ui.connect {
            if self.ui.presenting {
                return Vec::new();
            }
            let Some(from) = pending else {
                self.ui.connect = ConnectMode::Armed { pending: Some(id) };
                return vec![Action::RenderNeeded];
            };
            self.ui.connect = ConnectMode::Armed { pending: None };
            let style = self.ui.connection_style;
            let created = self.doc.create_connection(from, id, style, &self.ui.connection_color);
            return match created {
                Some(connection) => {
                    debug!(connection_id = %connection.id, %from, to = %id, "connection created");
                    vec![Action::ConnectionCreated(connection), Action::RenderNeeded]
                }
                None => vec![Action::RenderNeeded],
            };
        }

        if modifiers.command() {
            self.ui.selection.toggle(id);
        } else {
            self.ui.selection.select_only(id);
        }
        vec![Action::RenderNeeded]
    }

    fn escape(&mut self) -> Vec<Action> {
        match self.ui.connect {
            ConnectMode::Armed { pending: Some(_) } => {
                self.ui.connect = ConnectMode::Armed { pending: None };
                vec![Action::RenderNeeded]
            }
            ConnectMode::Armed { pending: None } => {
                self.ui.connect = ConnectMode::Off;
                vec![Action::RenderNeeded]
            }
            ConnectMode::Off if !self.ui.selection.is_empty() => {
                self.ui.selection.clear();
                vec![Action::RenderNeeded]
            }
            ConnectMode::Off => Vec::new(),
        }
    }

    fn remove_note(&mut self, id: &NoteId) -> Vec<Action> {
        let Some(removal) = self.doc.delete_note(id) else {
            return Vec::new();
        };
        self.ui.selection.remove(id);
        if self.ui.connect.pending().as_ref() == Some(id) {
            self.ui.connect = ConnectMode::Armed { pending: None };
        }
        if self.input.active_note() == Some(*id) {
            self.input = InputState::Idle;
        }
        let mut actions = vec![Action::NoteDeleted { id: *id }];
        actions.extend(removal.connections.iter().map(|c| Action::ConnectionDeleted { id: c.id }));
        actions.push(Action::RenderNeeded);
        actions
    }

    fn update_note(&mut self, id: NoteId, fields: NotePatch) -> Vec<Action> {
        if !self.doc.update_note(&id, &fields) {
            return Vec::new();
        }
        vec![Action::NoteUpdated { id, fields }, Action::RenderNeeded]
    }

    fn update_connection(&mut self, id: ConnectionId, fields: ConnectionPatch) -> Vec<Action> {
        if self.ui.presenting || !self.doc.update_connection(&id, &fields) {
            return Vec::new();
        }
        vec![Action::ConnectionUpdated { id, fields }, Action::RenderNeeded]
    }

    fn move_note(&mut self, id: NoteId, grab_offset: Point, screen_pt: Point) -> bool {
        let pos = self.camera.screen_to_world(screen_pt) - grab_offset;
        self.doc.update_note(&id, &NotePatch::position(pos.x, pos.y))
    }

    fn move_image(&mut self, id: ImageId, grab_offset: Point, screen_pt: Point) -> bool {
        let pos = self.camera.screen_to_world(screen_pt) - grab_offset;
        self.doc.update_image(&id, &ImagePatch { x: Some(pos.x), y: Some(pos.y) })
    }

    /// Keep a finished stroke only if it has enough distinct points and travel.
    fn commit_stroke(&mut self, buffer: StrokePath) -> Vec<Action> {
        let travel_px = buffer.travel() * self.camera.zoom;
        if buffer.len() < MIN_STROKE_POINTS || travel_px <= MIN_STROKE_TRAVEL_PX {
            debug!(points = buffer.len(), travel_px, "stroke discarded");
            return Vec::new();
        }
        let drawing = Drawing {
            id: Uuid::new_v4(),
            path: buffer,
            color: self.ui.brush_color.clone(),
            width: self.ui.brush_width,
        };
        debug!(drawing_id = %drawing.id, points = drawing.path.len(), "stroke committed");
        self.doc.insert_drawing(drawing.clone());
        vec![Action::DrawingCreated(drawing), Action::RenderNeeded]
    }
}
