//! The ordered window list and its selection cursor.
//!
//! The order is user-controlled: reconciliation only drops vanished windows
//! and appends new ones, and the user rearranges entries with [`swap`].
//!
//! [`swap`]: OrderedWindowList::swap

use std::collections::HashSet;

use crate::window_system::WindowHandle;

/// One candidate application window.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WindowEntry {
    pub handle: WindowHandle,
    /// Refreshed on every reconciliation pass
    pub title: String,
    /// Captured once, when the window first enters the list
    pub class_name: String,
}

/// Sequence of [`WindowEntry`] values, unique by handle, plus the cursor.
#[derive(Debug, Default)]
pub struct OrderedWindowList {
    entries: Vec<WindowEntry>,
    selected_index: usize,
    initialized: bool,
}

impl OrderedWindowList {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn entries(&self) -> &[WindowEntry] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Whether the list has been seeded, either from a saved order or from a
    /// first enumeration.
    pub fn is_initialized(&self) -> bool {
        self.initialized
    }

    pub fn selected_index(&self) -> usize {
        self.selected_index
    }

    pub fn position(&self, handle: WindowHandle) -> Option<usize> {
        self.entries.iter().position(|e| e.handle == handle)
    }

    /// Replace the whole sequence and mark the list initialized.
    ///
    /// Later duplicates of a handle are dropped and the cursor is clamped to
    /// the new length.
    pub fn replace(&mut self, mut entries: Vec<WindowEntry>) {
        let mut seen = HashSet::with_capacity(entries.len());
        entries.retain(|e| seen.insert(e.handle));

        self.entries = entries;
        self.initialized = true;
        self.clamp_selection();
    }

    fn clamp_selection(&mut self) {
        self.selected_index = self.selected_index.min(self.entries.len().saturating_sub(1));
    }

    pub fn reset_selection(&mut self) {
        self.selected_index = 0;
    }

    /// Move the cursor by `delta`, stopping at either end (no wraparound).
    ///
    /// Returns the new index.
    pub fn move_selection(&mut self, delta: isize) -> usize {
        if self.entries.is_empty() {
            self.selected_index = 0;
            return 0;
        }

        let last = self.entries.len() - 1;
        self.selected_index = self.selected_index.saturating_add_signed(delta).min(last);
        self.selected_index
    }

    /// Exchange the entries at `i` and `j`.
    ///
    /// Leaves the cursor where it is; callers that want the cursor to follow
    /// the moved entry must move it themselves. Returns `false` (and does
    /// nothing) when `i == j` or either index is out of range.
    pub fn swap(&mut self, i: usize, j: usize) -> bool {
        if i == j || i >= self.entries.len() || j >= self.entries.len() {
            return false;
        }
        self.entries.swap(i, j);
        true
    }

    /// Jump the cursor to zero-based index `n`, if it exists.
    pub fn select_by_ordinal(&mut self, n: usize) -> bool {
        if n >= self.entries.len() {
            return false;
        }
        self.selected_index = n;
        true
    }

    pub fn current_selection(&self) -> Option<&WindowEntry> {
        self.entries.get(self.selected_index)
    }
}

#[cfg(test)]
pub(crate) fn make_entry(handle: usize, title: &str) -> WindowEntry {
    WindowEntry {
        handle: WindowHandle(handle),
        title: title.to_string(),
        class_name: "AppWindowClass".to_string(),
    }
}
