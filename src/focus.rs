use tracing::{debug, warn};

use crate::window_list::WindowEntry;
use crate::window_system::WindowSystem;

/// Restore, raise and focus the window behind `entry`.
///
/// A single best-effort attempt: a window that closed between selection and
/// activation is reported as a failure and otherwise ignored.
pub fn focus_window<S: WindowSystem>(system: &mut S, entry: &WindowEntry) -> bool {
    let handle = entry.handle;

    if !system.is_window(handle) {
        debug!("Window {} ({:?}) is gone, not focusing", handle, entry.title);
        return false;
    }

    if system.is_minimized(handle) {
        debug!("Restoring minimized window {}", handle);
        if let Err(e) = system.restore(handle) {
            warn!("Failed to restore window {}: {}", handle, e);
        }
    }

    match system.activate(handle) {
        Ok(()) => {
            debug!("Focused window {} ({:?})", handle, entry.title);
            true
        }
        Err(e) => {
            warn!("Failed to focus window {}: {}", handle, e);
            false
        }
    }
}
