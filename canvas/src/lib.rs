//! Interaction core for the strategy whiteboard.
//!
//! This crate owns everything that happens between a raw pointer or keyboard
//! event and a board mutation: translating screen coordinates into board
//! coordinates, tracking the active gesture, hit-testing notes, images and
//! strokes, and applying optimistic edits to the in-memory document. It does
//! no I/O. Every persisted change is reported as an [`engine::Action`] so the
//! host (or the sync bridge in the root crate) can mirror it to the store.
//!
//! ## Module layout
//!
//! | Module | Role |
//! |--------|------|
//! | [`engine`] | [`engine::EngineCore`]: event handlers, commands, snapshot intake |
//! | [`doc`] | Notes, connections, images, drawings and the in-memory [`doc::DocStore`] |
//! | [`camera`] | Pan/zoom camera and coordinate conversions |
//! | [`input`] | Tools, modifiers, view state and the gesture state machine |
//! | [`selection`] | Single + multi note selection bookkeeping |
//! | [`hit`] | Hit-testing against notes, images and strokes |
//! | [`consts`] | Shared numeric constants (zoom limits, minimum sizes, thresholds) |

pub mod camera;
pub mod consts;
pub mod doc;
pub mod engine;
pub mod hit;
pub mod input;
pub mod selection;
