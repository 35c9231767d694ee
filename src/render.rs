use serde::{Deserialize, Serialize};
use std::fmt;

use crate::window_list::OrderedWindowList;
use crate::window_system::WindowHandle;

/// Rows beyond this have no ordinal key.
pub const ORDINAL_SLOTS: usize = 9;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Highlight {
    Selected,
    /// The window that had focus before the overlay opened
    PreviouslyFocused,
    Normal,
}

impl Highlight {
    /// Gutter drawn in front of a row by the text renderers
    pub fn marker(self) -> &'static str {
        match self {
            Highlight::Selected => ">>>",
            Highlight::PreviouslyFocused => " * ",
            Highlight::Normal => "   ",
        }
    }
}

/// What the overlay shows for one entry, independent of how it is painted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RenderRow {
    /// One-based key for the first nine rows
    pub ordinal: Option<usize>,
    pub title: String,
    pub highlight: Highlight,
    pub was_focused: bool,
    pub reordering: bool,
}

impl fmt::Display for RenderRow {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.ordinal {
            Some(n) => write!(f, "[{}] ", n)?,
            None => write!(f, "    ")?,
        }
        if self.was_focused {
            write!(f, "● ")?;
        }
        if self.reordering {
            write!(f, "↕ ")?;
        }
        write!(f, "{}", self.title)?;
        match (self.reordering, self.was_focused) {
            (true, true) => write!(f, " (REORDER - ACTIVE)"),
            (true, false) => write!(f, " (REORDER)"),
            (false, true) => write!(f, " (ACTIVE)"),
            (false, false) => Ok(()),
        }
    }
}

pub fn header(window_count: usize) -> String {
    format!(
        "Found {} windows - Enter/1-9: switch, Esc: close, Ctrl+Up/Down: reorder",
        window_count
    )
}

/// Build one row per entry.
///
/// The selected row wins over the previously focused one when they are the
/// same window; the active marker is still shown.
pub fn render_rows(
    list: &OrderedWindowList,
    focused_before_show: Option<WindowHandle>,
    reorder_mode: bool,
    title_width: usize,
) -> Vec<RenderRow> {
    list.entries()
        .iter()
        .enumerate()
        .map(|(i, entry)| {
            let selected = i == list.selected_index();
            let was_focused = focused_before_show == Some(entry.handle);
            let highlight = if selected {
                Highlight::Selected
            } else if was_focused {
                Highlight::PreviouslyFocused
            } else {
                Highlight::Normal
            };

            RenderRow {
                ordinal: (i < ORDINAL_SLOTS).then_some(i + 1),
                title: truncate_string(&entry.title, title_width),
                highlight,
                was_focused,
                reordering: selected && reorder_mode,
            }
        })
        .collect()
}

/// Shorten to at most `max_chars` characters, ending in an ellipsis.
fn truncate_string(s: &str, max_chars: usize) -> String {
    if s.chars().count() <= max_chars {
        return s.to_string();
    }
    let mut truncated: String = s.chars().take(max_chars.saturating_sub(1)).collect();
    truncated.push('…');
    truncated
}
