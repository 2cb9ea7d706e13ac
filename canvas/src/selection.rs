//! Note selection bookkeeping.
//!
//! Two overlapping pieces of state are tracked, mirroring how the board's
//! gestures use them:
//!
//! - **primary**: the single note selected by a plain click.
//! - **items**: the multi-selection set built up with ctrl/cmd-click.
//!
//! A plain click replaces both; a modifier-click toggles membership in the
//! set and leaves the primary alone. Deletion acts on the set when it is
//! non-empty and falls back to the primary otherwise.

#[cfg(test)]
#[path = "selection_test.rs"]
mod selection_test;

use crate::doc::NoteId;

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Selection {
    primary: Option<NoteId>,
    items: Vec<NoteId>,
}

impl Selection {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Plain click: clear the multi-selection and make `id` the sole selection.
    pub fn select_only(&mut self, id: NoteId) {
        self.items.clear();
        self.primary = Some(id);
    }

    /// Modifier click: toggle `id` in the multi-selection set.
    ///
    /// Returns `true` if `id` is selected afterwards.
    pub fn toggle(&mut self, id: NoteId) -> bool {
        if let Some(pos) = self.items.iter().position(|k| *k == id) {
            self.items.remove(pos);
            false
        } else {
            self.items.push(id);
            true
        }
    }

    pub fn clear(&mut self) {
        self.primary = None;
        self.items.clear();
    }

    /// Forget `id` wherever it appears.
    pub fn remove(&mut self, id: &NoteId) {
        if self.primary.as_ref() == Some(id) {
            self.primary = None;
        }
        self.items.retain(|k| k != id);
    }

    /// Swap `old` for `new` in whichever roles it holds.
    pub fn replace(&mut self, old: &NoteId, new: NoteId) {
        if self.primary.as_ref() == Some(old) {
            self.primary = Some(new);
        }
        for k in &mut self.items {
            if *k == *old {
                *k = new;
            }
        }
    }

    /// Keep only ids for which `keep` returns true.
    pub fn retain(&mut self, mut keep: impl FnMut(&NoteId) -> bool) {
        if let Some(primary) = self.primary {
            if !keep(&primary) {
                self.primary = None;
            }
        }
        self.items.retain(|k| keep(k));
    }

    #[must_use]
    pub fn primary(&self) -> Option<NoteId> {
        self.primary
    }

    /// The multi-selection set, in the order ids were added.
    #[must_use]
    pub fn items(&self) -> &[NoteId] {
        &self.items
    }

    #[must_use]
    pub fn contains(&self, id: &NoteId) -> bool {
        self.primary.as_ref() == Some(id) || self.items.contains(id)
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.primary.is_none() && self.items.is_empty()
    }

    /// Notes the Delete key acts on: the multi-selection if non-empty, else the primary.
    #[must_use]
    pub fn deletion_targets(&self) -> Vec<NoteId> {
        if self.items.is_empty() { self.primary.into_iter().collect() } else { self.items.clone() }
    }
}
