//! Sway backend for [`WindowSystem`].
//!
//! Sway has no style bits, parents or minimize state, so every mapped view
//! is reported as a visible, captioned top-level window and the classifier's
//! title and class lists do the filtering.

use anyhow::{Context, Result};
use futures_lite::stream::StreamExt;
use swayipc::{Connection, Node, NodeType};
use tokio::sync::mpsc;
use tracing::{debug, error, info, warn};

use crate::window_system::{
    ExtendedStyle, Rect, WindowAttributes, WindowHandle, WindowStyle, WindowSystem,
};

const SCRATCHPAD_WORKSPACE: &str = "__i3_scratch";

/// A window found in the Sway tree
#[derive(Debug, Clone)]
struct SwayView {
    handle: WindowHandle,
    attributes: WindowAttributes,
}

/// Result of one `get_tree` round trip
#[derive(Debug, Clone)]
struct TreeSnapshot {
    views: Vec<SwayView>,
    focused: Option<WindowHandle>,
}

impl TreeSnapshot {
    fn read(connection: &mut Connection) -> Result<Self> {
        let tree = connection.get_tree().context("Failed to read Sway tree")?;
        Ok(TreeSnapshot {
            views: collect_views(&tree, false),
            focused: find_focused_window(&tree),
        })
    }

    fn view(&self, handle: WindowHandle) -> Option<&SwayView> {
        self.views.iter().find(|v| v.handle == handle)
    }
}

/// Return the cached snapshot, reading one only when nothing is cached yet.
fn cached_or_read(
    snapshot: &mut Option<TreeSnapshot>,
    read: impl FnOnce() -> Result<TreeSnapshot>,
) -> Option<&TreeSnapshot> {
    if snapshot.is_none() {
        match read() {
            Ok(fresh) => *snapshot = Some(fresh),
            Err(e) => warn!("{:#}", e),
        }
    }
    snapshot.as_ref()
}

/// Turn the per-command outcomes of `run_command` into one result.
fn check_outcomes(command: &str, outcomes: Vec<swayipc::Fallible<()>>) -> Result<()> {
    if outcomes.is_empty() {
        anyhow::bail!("Sway ran no commands for `{}`", command);
    }
    for outcome in outcomes {
        outcome.with_context(|| format!("Sway rejected `{}`", command))?;
    }
    Ok(())
}

pub struct SwayWindowSystem {
    connection: Connection,
    /// Tree from the most recent successful read. Liveness checks are
    /// answered from it so one overlay show costs a single round trip.
    snapshot: Option<TreeSnapshot>,
}

impl SwayWindowSystem {
    /// Create a new connection to Sway
    pub fn new() -> Result<Self> {
        let connection = Connection::new()?;
        Ok(SwayWindowSystem {
            connection,
            snapshot: None,
        })
    }

    fn cached(&mut self) -> Option<&TreeSnapshot> {
        let connection = &mut self.connection;
        cached_or_read(&mut self.snapshot, || TreeSnapshot::read(connection))
    }
}

impl WindowSystem for SwayWindowSystem {
    fn top_level_windows(&mut self) -> Result<Vec<WindowHandle>> {
        let snapshot = TreeSnapshot::read(&mut self.connection)?;
        let handles = snapshot.views.iter().map(|v| v.handle).collect();
        self.snapshot = Some(snapshot);
        Ok(handles)
    }

    fn attributes(&mut self, handle: WindowHandle) -> Option<WindowAttributes> {
        self.cached()?.view(handle).map(|v| v.attributes.clone())
    }

    fn is_window(&mut self, handle: WindowHandle) -> bool {
        self.cached().is_some_and(|s| s.view(handle).is_some())
    }

    fn foreground_window(&mut self) -> Option<WindowHandle> {
        match TreeSnapshot::read(&mut self.connection) {
            Ok(fresh) => self.snapshot = Some(fresh),
            Err(e) => debug!("Using cached focus, {:#}", e),
        }
        self.snapshot.as_ref().and_then(|s| s.focused)
    }

    fn desktop_window(&self) -> Option<WindowHandle> {
        None
    }

    fn overlay_window(&self) -> Option<WindowHandle> {
        None
    }

    fn is_minimized(&mut self, _handle: WindowHandle) -> bool {
        false
    }

    fn restore(&mut self, _handle: WindowHandle) -> Result<()> {
        Ok(())
    }

    fn activate(&mut self, handle: WindowHandle) -> Result<()> {
        let command = format!("[con_id={}] focus", handle.0);
        let outcomes = self.connection.run_command(&command)?;
        check_outcomes(&command, outcomes)
    }
}

/// Views are containers that carry a pid; plain containers don't.
fn is_view(node: &Node) -> bool {
    matches!(node.node_type, NodeType::Con | NodeType::FloatingCon) && node.pid.is_some()
}

fn view_attributes(node: &Node, in_scratchpad: bool) -> WindowAttributes {
    // Prefer the Wayland app_id, fall back to the X11 WM_CLASS
    let class_name = node
        .app_id
        .clone()
        .or_else(|| {
            node.window_properties
                .as_ref()
                .and_then(|props| props.class.clone())
        })
        .unwrap_or_default();

    WindowAttributes {
        visible: !in_scratchpad,
        title: node.name.clone().unwrap_or_default(),
        class_name,
        style: WindowStyle::VISIBLE | WindowStyle::CAPTION,
        ex_style: ExtendedStyle::empty(),
        rect: Some(Rect::new(
            node.rect.x,
            node.rect.y,
            node.rect.width,
            node.rect.height,
        )),
        parent: None,
    }
}

/// Recursively collect all views from a Sway node tree, in tree order.
#[must_use]
fn collect_views(node: &Node, in_scratchpad: bool) -> Vec<SwayView> {
    let in_scratchpad = in_scratchpad
        || (node.node_type == NodeType::Workspace
            && node.name.as_deref() == Some(SCRATCHPAD_WORKSPACE));

    let mut views = Vec::new();
    if is_view(node) && node.id >= 0 {
        views.push(SwayView {
            handle: WindowHandle(node.id as usize),
            attributes: view_attributes(node, in_scratchpad),
        });
    }

    for child in node.nodes.iter().chain(&node.floating_nodes) {
        views.extend(collect_views(child, in_scratchpad));
    }

    views
}

/// Find the currently focused window in a Sway node tree.
#[must_use]
fn find_focused_window(node: &Node) -> Option<WindowHandle> {
    // Check if this node is a focused window (not just a focused container)
    if is_view(node) && node.focused && node.id >= 0 {
        return Some(WindowHandle(node.id as usize));
    }

    node.nodes
        .iter()
        .chain(&node.floating_nodes)
        .find_map(find_focused_window)
}

/// Forward Sway focus changes so the daemon can auto-hide the overlay
pub async fn monitor_focus_events(focus_tx: mpsc::UnboundedSender<WindowHandle>) -> Result<()> {
    use swayipc_async::{Connection, Event, EventType, WindowChange};

    let subs = [EventType::Window];
    let mut events = Connection::new().await?.subscribe(subs).await?;

    info!("Subscribed to Sway window events");

    while let Some(event) = events.next().await {
        if let Event::Window(e) = event? {
            if e.change != WindowChange::Focus || e.container.id < 0 {
                continue;
            }
            debug!("Sway focus moved to container {}", e.container.id);
            if focus_tx.send(WindowHandle(e.container.id as usize)).is_err() {
                error!("Failed to send window focus event, daemon is gone");
                break;
            }
        }
    }

    Ok(())
}
