use crate::render::RenderRow;

/// Commands sent from the overlay to the renderer
#[derive(Debug, Clone)]
pub enum UiCommand {
    /// Show the overlay with a freshly built list
    Show { header: String, rows: Vec<RenderRow> },
    /// Redraw after the selection or the order changed
    /// (the overlay owns the authoritative list and cursor)
    Repaint { rows: Vec<RenderRow> },
    /// Hide the overlay
    Hide,
    /// One-off informational message, e.g. nothing to show
    Notice { message: String },
}
