use anyhow::Result;
use std::collections::{HashMap, HashSet};
use tracing::{debug, info, warn};

use crate::classifier::{ClassifierRules, ClassifyContext, Verdict};
use crate::focus;
use crate::order_store::PersistedOrder;
use crate::window_list::{OrderedWindowList, WindowEntry};
use crate::window_system::{WindowHandle, WindowSystem};

/// Owns the window list and keeps it in step with the desktop.
pub struct WindowManager<S: WindowSystem> {
    system: S,
    rules: ClassifierRules,
    list: OrderedWindowList,
}

impl<S: WindowSystem> WindowManager<S> {
    pub fn new(system: S, rules: ClassifierRules) -> Self {
        WindowManager {
            system,
            rules,
            list: OrderedWindowList::new(),
        }
    }

    pub fn list(&self) -> &OrderedWindowList {
        &self.list
    }

    pub fn list_mut(&mut self) -> &mut OrderedWindowList {
        &mut self.list
    }

    pub fn system_mut(&mut self) -> &mut S {
        &mut self.system
    }

    fn context(&self) -> ClassifyContext {
        ClassifyContext {
            overlay: self.system.overlay_window(),
            desktop: self.system.desktop_window(),
        }
    }

    /// Classify a single window from freshly read attributes.
    fn classify(&mut self, handle: WindowHandle, context: &ClassifyContext) -> Option<WindowEntry> {
        let attrs = self.system.attributes(handle)?;
        let verdict = self.rules.classify(handle, &attrs, context);
        debug!("Window {} {:?} ({}): {:?}", handle, attrs.title, attrs.class_name, verdict);

        if let Verdict::Exclude(_) = verdict {
            return None;
        }
        Some(WindowEntry {
            handle,
            title: attrs.title,
            class_name: attrs.class_name,
        })
    }

    /// Enumerate the desktop and keep the windows that classify as
    /// applications, in enumeration order.
    ///
    /// If the snapshot cannot grow, the windows collected so far are
    /// returned.
    pub fn enumerate(&mut self) -> Result<Vec<WindowEntry>> {
        let handles = self.system.top_level_windows()?;
        let context = self.context();

        let mut snapshot = Vec::new();
        for handle in handles {
            let Some(entry) = self.classify(handle, &context) else {
                continue;
            };
            if !push_or_truncate(&mut snapshot, entry) {
                warn!("Out of memory while enumerating, keeping {} windows", snapshot.len());
                break;
            }
        }

        Ok(snapshot)
    }

    /// Re-enumerate the desktop and merge the result into the list,
    /// preserving the user's order.
    pub fn refresh(&mut self) -> Result<()> {
        let live = self.enumerate()?;
        let live_count = live.len();

        let system = &mut self.system;
        let merged = reconcile(&self.list, live, |handle| system.is_window(handle));
        self.list.replace(merged);

        debug!(
            "Refreshed to {} windows ({} enumerated, order preserved)",
            self.list.len(),
            live_count
        );
        Ok(())
    }

    /// Seed the list from a saved order before any live enumeration.
    ///
    /// Every saved handle is re-validated: it must still be a live window
    /// and still classify as an application. Returns how many entries were
    /// accepted.
    pub fn seed(&mut self, persisted: PersistedOrder) -> usize {
        let context = self.context();
        let mut entries = Vec::with_capacity(persisted.len());
        let mut seen = HashSet::new();

        for saved in persisted.entries {
            if !self.system.is_window(saved.handle) {
                debug!("Saved window {} ({:?}) no longer exists", saved.handle, saved.title);
                continue;
            }
            let Some(live) = self.classify(saved.handle, &context) else {
                debug!("Saved window {} ({:?}) is no longer an application", saved.handle, saved.title);
                continue;
            };
            if !seen.insert(saved.handle) {
                continue;
            }
            entries.push(WindowEntry {
                handle: saved.handle,
                title: saved.title,
                class_name: live.class_name,
            });
        }

        let loaded_count = entries.len();
        if loaded_count > 0 {
            self.list.replace(entries);
        }
        info!("Restored {} windows from saved order", loaded_count);
        loaded_count
    }

    /// Hand focus to the selected window.
    pub fn focus_selected(&mut self) -> bool {
        match self.list.current_selection() {
            Some(entry) => focus::focus_window(&mut self.system, entry),
            None => false,
        }
    }
}

/// Push without aborting on allocation failure; `false` means the entry was
/// not stored.
fn push_or_truncate(entries: &mut Vec<WindowEntry>, entry: WindowEntry) -> bool {
    if entries.try_reserve(1).is_err() {
        return false;
    }
    entries.push(entry);
    true
}

/// Merge a fresh enumeration into the previously ordered list.
///
/// The result has:
/// 1. Previously known windows, in their existing order, if they appear in
///    `live` and `is_alive` confirms them, with titles refreshed from `live`
/// 2. Windows new to the list, in enumeration order
///
/// An uninitialized or empty `previous` yields `live` as is. No handle
/// appears twice.
#[must_use]
pub fn reconcile(
    previous: &OrderedWindowList,
    live: Vec<WindowEntry>,
    mut is_alive: impl FnMut(WindowHandle) -> bool,
) -> Vec<WindowEntry> {
    let mut added = HashSet::with_capacity(live.len());
    let mut result = Vec::new();

    if !previous.is_initialized() || previous.is_empty() {
        for entry in live {
            if added.insert(entry.handle) && !push_or_truncate(&mut result, entry) {
                warn!("Out of memory while rebuilding window list");
                break;
            }
        }
        return result;
    }

    let live_titles: HashMap<WindowHandle, &str> =
        live.iter().map(|e| (e.handle, e.title.as_str())).collect();

    for old in previous.entries() {
        if added.contains(&old.handle) {
            continue;
        }
        let Some(title) = live_titles.get(&old.handle) else {
            continue;
        };
        if !is_alive(old.handle) {
            continue;
        }

        let carried = WindowEntry {
            handle: old.handle,
            title: title.to_string(),
            class_name: old.class_name.clone(),
        };
        if !push_or_truncate(&mut result, carried) {
            warn!("Out of memory while rebuilding window list");
            return result;
        }
        added.insert(old.handle);
    }

    for entry in live {
        if added.insert(entry.handle) && !push_or_truncate(&mut result, entry) {
            warn!("Out of memory while rebuilding window list");
            break;
        }
    }

    result
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::order_store::PersistedEntry;
    use crate::window_list::make_entry;
    use crate::window_system::fake::{FakeDesktop, app_window};
    use crate::window_system::WindowStyle;

    fn make_list(entries: Vec<WindowEntry>) -> OrderedWindowList {
        let mut list = OrderedWindowList::new();
        list.replace(entries);
        list
    }

    fn handles(entries: &[WindowEntry]) -> Vec<usize> {
        entries.iter().map(|e| e.handle.0).collect()
    }

    fn manager(desktop: &FakeDesktop) -> WindowManager<FakeDesktop> {
        WindowManager::new(desktop.clone(), ClassifierRules::default())
    }

    // ==================== reconcile tests ====================

    #[test]
    fn test_reconcile_empty_lists() {
        let result = reconcile(&OrderedWindowList::new(), vec![], |_| true);
        assert!(result.is_empty());
    }

    #[test]
    fn test_reconcile_first_run_takes_live_order() {
        let live = vec![make_entry(3, "C"), make_entry(1, "A"), make_entry(2, "B")];
        let result = reconcile(&OrderedWindowList::new(), live, |_| true);
        assert_eq!(handles(&result), vec![3, 1, 2]);
    }

    #[test]
    fn test_reconcile_initialized_but_empty_takes_live_order() {
        let previous = make_list(vec![]);
        let result = reconcile(&previous, vec![make_entry(2, "B"), make_entry(1, "A")], |_| true);
        assert_eq!(handles(&result), vec![2, 1]);
    }

    #[test]
    fn test_reconcile_preserves_user_order() {
        let previous = make_list(vec![make_entry(3, "C"), make_entry(1, "A"), make_entry(2, "B")]);
        let live = vec![make_entry(1, "A"), make_entry(2, "B"), make_entry(3, "C")];

        let result = reconcile(&previous, live, |_| true);
        assert_eq!(handles(&result), vec![3, 1, 2]);
    }

    #[test]
    fn test_reconcile_removes_closed_windows() {
        let previous = make_list(vec![make_entry(1, "A"), make_entry(2, "B"), make_entry(3, "C")]);
        let live = vec![make_entry(1, "A"), make_entry(3, "C")]; // Window 2 closed

        let result = reconcile(&previous, live, |_| true);
        assert_eq!(handles(&result), vec![1, 3]);
    }

    #[test]
    fn test_reconcile_failed_liveness_check_loses_position() {
        let previous = make_list(vec![make_entry(1, "A"), make_entry(2, "B"), make_entry(3, "C")]);
        let live = vec![make_entry(2, "B"), make_entry(3, "C"), make_entry(1, "A")];

        // Window 1 is not carried over, so it is treated as a newcomer
        let result = reconcile(&previous, live, |h| h != WindowHandle(1));
        assert_eq!(handles(&result), vec![2, 3, 1]);
    }

    #[test]
    fn test_reconcile_new_windows_at_end_in_enumeration_order() {
        let previous = make_list(vec![make_entry(2, "B"), make_entry(1, "A")]);
        let live = vec![
            make_entry(5, "E"),
            make_entry(1, "A"),
            make_entry(4, "D"),
            make_entry(2, "B"),
        ];

        let result = reconcile(&previous, live, |_| true);
        assert_eq!(handles(&result), vec![2, 1, 5, 4]);
    }

    #[test]
    fn test_reconcile_refreshes_titles_and_keeps_class() {
        let mut old = make_entry(1, "Old Title");
        old.class_name = "OriginalClass".to_string();
        let previous = make_list(vec![old]);
        let mut fresh = make_entry(1, "New Title");
        fresh.class_name = "OtherClass".to_string();

        let result = reconcile(&previous, vec![fresh], |_| true);
        assert_eq!(result[0].title, "New Title");
        assert_eq!(result[0].class_name, "OriginalClass");
    }

    #[test]
    fn test_reconcile_never_duplicates() {
        let previous = make_list(vec![make_entry(1, "A"), make_entry(2, "B")]);
        let live = vec![
            make_entry(2, "B"),
            make_entry(3, "C"),
            make_entry(3, "C"),
            make_entry(1, "A"),
        ];

        let result = reconcile(&previous, live, |_| true);
        assert_eq!(handles(&result), vec![1, 2, 3]);

        let first_run = reconcile(&OrderedWindowList::new(), vec![make_entry(7, "G"), make_entry(7, "G")], |_| true);
        assert_eq!(handles(&first_run), vec![7]);
    }

    #[test]
    fn test_reconcile_order_preservation_over_many_shapes() {
        let previous_handles = [6usize, 2, 9, 4, 1, 7];
        let previous = make_list(previous_handles.iter().map(|h| make_entry(*h, "w")).collect());

        for mask in 0u32..(1 << 10) {
            let live: Vec<WindowEntry> = (0..10usize)
                .filter(|h| mask & (1 << h) != 0)
                .map(|h| make_entry(h, "w"))
                .collect();
            let live_handles: Vec<usize> = live.iter().map(|e| e.handle.0).collect();
            let result = handles(&reconcile(&previous, live, |_| true));

            let carried: Vec<usize> = previous_handles
                .iter()
                .copied()
                .filter(|h| live_handles.contains(h))
                .collect();
            let newcomers: Vec<usize> = live_handles
                .iter()
                .copied()
                .filter(|h| !previous_handles.contains(h))
                .collect();

            assert_eq!(result[..carried.len()], carried[..]);
            assert_eq!(result[carried.len()..], newcomers[..]);
        }
    }

    // ==================== WindowManager tests ====================

    #[test]
    fn test_enumerate_filters_through_classifier() {
        let desktop = FakeDesktop::with_apps(&[(1, "Editor"), (2, "Program Manager"), (3, "")]);
        let mut hidden = app_window("Hidden");
        hidden.visible = false;
        desktop.add(WindowHandle(4), hidden);

        let snapshot = manager(&desktop).enumerate().unwrap();
        assert_eq!(handles(&snapshot), vec![1]);
        assert_eq!(snapshot[0].class_name, "AppWindowClass");
    }

    #[test]
    fn test_enumerate_skips_overlay() {
        let desktop = FakeDesktop::with_apps(&[(1, "Editor"), (2, "Tabs Controller")]);
        desktop.set_overlay(Some(WindowHandle(2)));
        let snapshot = manager(&desktop).enumerate().unwrap();
        assert_eq!(handles(&snapshot), vec![1]);
    }

    #[test]
    fn test_enumerate_failure_propagates() {
        let desktop = FakeDesktop::with_apps(&[(1, "Editor")]);
        desktop.fail_enumeration(true);
        assert!(manager(&desktop).enumerate().is_err());
    }

    #[test]
    fn test_refresh_keeps_user_order_across_passes() {
        let desktop = FakeDesktop::with_apps(&[(1, "A"), (2, "B"), (3, "C")]);
        let mut manager = manager(&desktop);
        manager.refresh().unwrap();
        assert!(manager.list_mut().swap(0, 2));

        desktop.remove(WindowHandle(2));
        desktop.add(WindowHandle(4), app_window("D"));
        desktop.set_title(WindowHandle(1), "A renamed");
        manager.refresh().unwrap();

        assert_eq!(handles(manager.list().entries()), vec![3, 1, 4]);
        assert_eq!(manager.list().entries()[1].title, "A renamed");
    }

    #[test]
    fn test_refresh_drops_window_that_stops_classifying() {
        let desktop = FakeDesktop::with_apps(&[(1, "A"), (2, "B")]);
        let mut manager = manager(&desktop);
        manager.refresh().unwrap();

        let mut restyled = app_window("B");
        restyled.style = WindowStyle::CAPTION;
        desktop.remove(WindowHandle(2));
        desktop.add(WindowHandle(2), restyled);
        manager.refresh().unwrap();

        assert_eq!(handles(manager.list().entries()), vec![1]);
    }

    #[test]
    fn test_seed_excludes_stale_and_invalid_entries() {
        let desktop = FakeDesktop::with_apps(&[(1, "A"), (2, "Program Manager"), (3, "C")]);
        let persisted = PersistedOrder {
            entries: vec![
                PersistedEntry { handle: WindowHandle(3), title: "C saved".to_string() },
                PersistedEntry { handle: WindowHandle(99), title: "Closed".to_string() },
                PersistedEntry { handle: WindowHandle(2), title: "Program Manager".to_string() },
                PersistedEntry { handle: WindowHandle(1), title: "A saved".to_string() },
            ],
        };

        let mut manager = manager(&desktop);
        let loaded_count = manager.seed(persisted);

        assert_eq!(loaded_count, 2);
        assert_eq!(handles(manager.list().entries()), vec![3, 1]);
        assert_eq!(manager.list().entries()[0].title, "C saved");
        assert!(manager.list().is_initialized());
    }

    #[test]
    fn test_seed_with_nothing_valid_leaves_list_uninitialized() {
        let desktop = FakeDesktop::with_apps(&[(1, "A")]);
        let persisted = PersistedOrder {
            entries: vec![PersistedEntry { handle: WindowHandle(42), title: "Gone".to_string() }],
        };

        let mut manager = manager(&desktop);
        assert_eq!(manager.seed(persisted), 0);
        assert!(!manager.list().is_initialized());
    }

    #[test]
    fn test_seeded_order_survives_first_refresh() {
        let desktop = FakeDesktop::with_apps(&[(1, "A"), (2, "B"), (3, "C")]);
        let persisted = PersistedOrder {
            entries: vec![
                PersistedEntry { handle: WindowHandle(2), title: "B".to_string() },
                PersistedEntry { handle: WindowHandle(1), title: "A".to_string() },
            ],
        };

        let mut manager = manager(&desktop);
        manager.seed(persisted);
        manager.refresh().unwrap();

        assert_eq!(handles(manager.list().entries()), vec![2, 1, 3]);
    }

    #[test]
    fn test_focus_selected() {
        let desktop = FakeDesktop::with_apps(&[(1, "A"), (2, "B")]);
        let mut manager = manager(&desktop);
        assert!(!manager.focus_selected());

        manager.refresh().unwrap();
        manager.list_mut().move_selection(1);
        assert!(manager.focus_selected());
        assert_eq!(desktop.activated(), vec![WindowHandle(2)]);
    }
}
