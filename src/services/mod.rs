//! Background services of the sync bridge.
//!
//! ARCHITECTURE
//! ============
//! `sync` owns the channels and the event-side apply step, `upload` runs
//! the image upload flow, and `memory` provides in-process port adapters
//! for tests and offline boards.

pub mod memory;
pub mod sync;
pub mod upload;
