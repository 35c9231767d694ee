use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use crate::order_store::OrderStore;
use crate::render::{self, RenderRow};
use crate::ui_commands::UiCommand;
use crate::window_manager::WindowManager;
use crate::window_system::{WindowHandle, WindowSystem};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OverlayState {
    Hidden,
    Shown,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Key {
    Up,
    Down,
    Enter,
    Escape,
    /// Number row key, 1 through 9
    Digit(u8),
}

/// A key press together with the reorder modifier state sampled when the
/// key went down.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct KeyPress {
    pub key: Key,
    pub reorder: bool,
}

impl KeyPress {
    pub fn plain(key: Key) -> Self {
        KeyPress { key, reorder: false }
    }

    pub fn with_reorder(key: Key) -> Self {
        KeyPress { key, reorder: true }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OverlayInput {
    ToggleHotkey,
    Key(KeyPress),
    /// Another window took foreground focus
    FocusLost,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OverlayStatus {
    pub state: OverlayState,
    pub window_count: usize,
    pub selected_index: Option<usize>,
    pub rows: Vec<RenderRow>,
}

pub struct Overlay<S: WindowSystem> {
    windows: WindowManager<S>,
    store: Option<OrderStore>,
    state: OverlayState,
    reorder_mode: bool,
    focused_before_show: Option<WindowHandle>,
    title_width: usize,
    ui_tx: Option<mpsc::UnboundedSender<UiCommand>>,
}

impl<S: WindowSystem> Overlay<S> {
    pub fn new(
        windows: WindowManager<S>,
        store: Option<OrderStore>,
        ui_tx: Option<mpsc::UnboundedSender<UiCommand>>,
        title_width: usize,
    ) -> Self {
        Overlay {
            windows,
            store,
            state: OverlayState::Hidden,
            reorder_mode: false,
            focused_before_show: None,
            title_width,
            ui_tx,
        }
    }

    pub fn state(&self) -> OverlayState {
        self.state
    }

    pub fn reorder_mode(&self) -> bool {
        self.reorder_mode
    }

    pub fn focused_before_show(&self) -> Option<WindowHandle> {
        self.focused_before_show
    }

    pub fn windows(&self) -> &WindowManager<S> {
        &self.windows
    }

    /// Seed the list from the saved order. Failures only cost the saved
    /// order; returns the number of restored entries.
    pub fn restore_saved_order(&mut self) -> usize {
        let Some(store) = &self.store else {
            return 0;
        };

        match store.load() {
            Ok(persisted) => self.windows.seed(persisted),
            Err(e) => {
                warn!("Could not load saved window order: {:#}", anyhow::Error::from(e));
                0
            }
        }
    }

    pub fn handle_input(&mut self, input: OverlayInput) -> OverlayState {
        debug!("Overlay input: {:?}, State: {:?}", input, self.state);

        match (self.state, input) {
            (OverlayState::Hidden, OverlayInput::ToggleHotkey) => self.show(),
            (OverlayState::Shown, OverlayInput::ToggleHotkey) => self.hide(),
            (OverlayState::Shown, OverlayInput::FocusLost) => {
                debug!("Overlay lost focus, hiding");
                self.hide();
            }
            (OverlayState::Shown, OverlayInput::Key(press)) => self.handle_key(press),
            (OverlayState::Hidden, _) => {
                debug!("Ignoring {:?} while hidden", input);
            }
        }

        self.state
    }

    fn show(&mut self) {
        info!("Showing overlay");

        self.focused_before_show = self.windows.system_mut().foreground_window();
        self.reorder_mode = false;
        self.windows.list_mut().reset_selection();

        if let Err(e) = self.windows.refresh() {
            warn!("Window enumeration failed: {:#}", e);
            self.notify("Unable to list windows");
            return;
        }

        if self.windows.list().is_empty() {
            info!("No windows to switch to");
            self.notify("No windows found");
            return;
        }

        self.state = OverlayState::Shown;
        self.send(UiCommand::Show {
            header: render::header(self.windows.list().len()),
            rows: self.rows(),
        });
    }

    fn hide(&mut self) {
        self.state = OverlayState::Hidden;
        self.reorder_mode = false;
        self.send(UiCommand::Hide);
    }

    fn handle_key(&mut self, press: KeyPress) {
        self.reorder_mode = press.reorder;

        match press.key {
            Key::Up => self.move_or_reorder(-1, press.reorder),
            Key::Down => self.move_or_reorder(1, press.reorder),
            Key::Enter => self.activate_selection_and_hide(),
            Key::Escape => self.hide(),
            Key::Digit(n @ 1..=9) => {
                let index = usize::from(n - 1);
                if self.windows.list_mut().select_by_ordinal(index) {
                    self.activate_selection_and_hide();
                } else {
                    debug!("No window at slot {}", n);
                }
            }
            Key::Digit(n) => debug!("Ignoring digit {}", n),
        }
    }

    fn move_or_reorder(&mut self, delta: isize, reorder: bool) {
        let list = self.windows.list_mut();
        let from = list.selected_index();

        if reorder {
            let Some(to) = from.checked_add_signed(delta) else {
                return;
            };
            if !list.swap(from, to) {
                return;
            }
            list.select_by_ordinal(to);
            debug!("Moved entry from {} to {}", from, to);
            self.persist();
        } else if list.move_selection(delta) == from {
            return;
        }

        self.send(UiCommand::Repaint { rows: self.rows() });
    }

    fn activate_selection_and_hide(&mut self) {
        if !self.windows.focus_selected() {
            debug!("Selected window could not be focused");
        }
        self.hide();
    }

    /// Write the current order; failures are logged and otherwise ignored.
    pub fn persist(&self) {
        let Some(store) = &self.store else {
            return;
        };

        if let Err(e) = store.save(self.windows.list().entries()) {
            warn!("Could not save window order: {:#}", anyhow::Error::from(e));
        }
    }

    /// Final transition before the process exits.
    pub fn shutdown(&mut self) {
        if self.state == OverlayState::Shown {
            self.hide();
        }
        self.persist();
        info!("Overlay shut down with {} windows", self.windows.list().len());
    }

    pub fn rows(&self) -> Vec<RenderRow> {
        render::render_rows(
            self.windows.list(),
            self.focused_before_show,
            self.reorder_mode,
            self.title_width,
        )
    }

    pub fn status(&self) -> OverlayStatus {
        let list = self.windows.list();
        OverlayStatus {
            state: self.state,
            window_count: list.len(),
            selected_index: (!list.is_empty()).then(|| list.selected_index()),
            rows: self.rows(),
        }
    }

    fn notify(&self, message: &str) {
        info!("Notice: {}", message);
        self.send(UiCommand::Notice {
            message: message.to_string(),
        });
    }

    fn send(&self, command: UiCommand) {
        if let Some(tx) = &self.ui_tx
            && tx.send(command).is_err()
        {
            warn!("Failed to send UI command, renderer is gone");
        }
    }
}
