mod classifier;
mod config;
mod daemon;
mod focus;
mod ipc;
mod order_store;
mod overlay;
mod render;
mod socket_client;
mod socket_server;
#[cfg(unix)]
mod sway_client;
mod ui_commands;
mod ui_handler;
#[cfg(windows)]
mod win32;
mod window_list;
mod window_manager;
mod window_system;

use anyhow::{Context, Result};
use classifier::ClassifierRules;
use config::Config;
use daemon::Daemon;
use order_store::OrderStore;
use overlay::Overlay;
use std::fs;
use std::path::PathBuf;
use tokio::sync::mpsc;
use tracing::{error, info};
use window_manager::WindowManager;

/// Get the path to the pidfile
fn get_pidfile_path() -> Result<PathBuf> {
    // Try to use XDG_RUNTIME_DIR, fall back to the cache directory
    let runtime_dir = dirs::runtime_dir()
        .or_else(dirs::cache_dir)
        .context("Could not determine runtime directory")?;

    Ok(runtime_dir.join("tabs-controller.pid"))
}

/// Check if another instance is already running
fn check_pidfile() -> Result<()> {
    let pidfile = get_pidfile_path()?;

    if pidfile.exists() {
        // Read the PID from the file
        let pid_str = fs::read_to_string(&pidfile).context("Failed to read pidfile")?;
        let pid: u32 = pid_str.trim().parse().context("Invalid PID in pidfile")?;

        // Check if the process is still running
        if process_exists(pid) {
            anyhow::bail!(
                "Another instance of tabs-controller is already running (PID: {}). \
                 If this is incorrect, remove the pidfile at: {}",
                pid,
                pidfile.display()
            );
        } else {
            // Stale pidfile, remove it
            info!("Removing stale pidfile (PID {} not found)", pid);
            if let Err(e) = fs::remove_file(&pidfile) {
                tracing::warn!("Failed to remove stale pidfile: {}", e);
            }
        }
    }

    Ok(())
}

/// Check if a process with the given PID exists
#[cfg(unix)]
fn process_exists(pid: u32) -> bool {
    let Ok(pid) = libc::pid_t::try_from(pid) else {
        return false;
    };
    // Signal 0 only checks that the process exists
    unsafe { libc::kill(pid, 0) == 0 }
}

/// Check if a process with the given PID exists
#[cfg(not(unix))]
fn process_exists(_pid: u32) -> bool {
    // The named pipe refuses a second daemon, so a leftover pidfile is stale
    false
}

/// Create the pidfile
fn create_pidfile() -> Result<PidfileGuard> {
    let pidfile = get_pidfile_path()?;
    let pid = std::process::id();

    if let Some(dir) = pidfile.parent() {
        fs::create_dir_all(dir).context("Failed to create runtime directory")?;
    }
    fs::write(&pidfile, pid.to_string()).context("Failed to write pidfile")?;

    info!("Created pidfile at {} with PID {}", pidfile.display(), pid);

    Ok(PidfileGuard { path: pidfile })
}

/// Guard that removes the pidfile when dropped
struct PidfileGuard {
    path: PathBuf,
}

impl Drop for PidfileGuard {
    fn drop(&mut self) {
        if let Err(e) = fs::remove_file(&self.path) {
            error!("Failed to remove pidfile: {}", e);
        } else {
            info!("Removed pidfile at {}", self.path.display());
        }
    }
}

fn main() -> Result<()> {
    // Parse CLI arguments
    let config = Config::parse();

    // Client invocations forward one command to the running daemon
    if let Some(command) = config.command().ipc_command() {
        socket_client::send_command_and_exit(command);
    }

    // Initialize logging
    let log_level = if config.verbose {
        tracing::Level::DEBUG
    } else {
        tracing::Level::INFO
    };

    tracing_subscriber::fmt()
        .with_max_level(log_level)
        .with_target(false)
        .init();

    info!("Starting tabs-controller daemon");

    // Check if another instance is already running
    check_pidfile()?;

    // Create pidfile (will be automatically removed when the guard is dropped)
    let _pidfile_guard = create_pidfile()?;

    let rules = match &config.rules {
        Some(path) => ClassifierRules::from_file(path)?,
        None => ClassifierRules::default(),
    };

    let order_path = match &config.order_file {
        Some(path) => path.clone(),
        None => OrderStore::default_path()?,
    };
    info!("Window order file: {}", order_path.display());
    let store = OrderStore::new(order_path);

    // Everything runs on this one thread; the overlay is never shared
    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .context("Failed to create Tokio runtime")?;

    runtime.block_on(async move {
        match run_daemon(config, rules, store).await {
            Ok(()) => info!("Daemon exited normally"),
            Err(e) => error!("Daemon error: {:#}", e),
        }
    });

    Ok(())
}

#[cfg(unix)]
fn connect_window_system() -> Result<sway_client::SwayWindowSystem> {
    sway_client::SwayWindowSystem::new().context("Failed to connect to Sway")
}

#[cfg(windows)]
fn connect_window_system() -> Result<win32::Win32WindowSystem> {
    Ok(win32::Win32WindowSystem::new(None))
}

/// Wire the overlay to its input and output channels and run the event loop
async fn run_daemon(config: Config, rules: ClassifierRules, store: OrderStore) -> Result<()> {
    let system = connect_window_system()?;

    // Create channels for UI communication
    let (ui_cmd_tx, ui_cmd_rx) = mpsc::unbounded_channel();
    let ui_task = ui_handler::handle_ui_commands(ui_cmd_rx);

    let mut overlay = Overlay::new(
        WindowManager::new(system, rules),
        Some(store),
        Some(ui_cmd_tx),
        config.title_width,
    );
    overlay.restore_saved_order();

    #[cfg(unix)]
    let (ipc_rx, _socket_guard) = socket_server::start_server().await?;
    #[cfg(windows)]
    let ipc_rx = socket_server::start_server().await?;

    let focus_rx = spawn_focus_monitor();

    Daemon::new(overlay).run(ipc_rx, focus_rx).await;

    // The overlay owned the only UI sender, so the handler drains and exits
    if let Err(e) = ui_task.await {
        error!("UI handler failed: {}", e);
    }
    Ok(())
}

#[cfg(unix)]
fn spawn_focus_monitor() -> mpsc::UnboundedReceiver<window_system::WindowHandle> {
    let (focus_tx, focus_rx) = mpsc::unbounded_channel();
    tokio::spawn(async move {
        if let Err(e) = sway_client::monitor_focus_events(focus_tx).await {
            error!("Sway event monitoring error: {}", e);
        }
    });
    focus_rx
}

/// Foreground changes arrive through the `focus-lost` command on Windows
#[cfg(windows)]
fn spawn_focus_monitor() -> mpsc::UnboundedReceiver<window_system::WindowHandle> {
    let (_focus_tx, focus_rx) = mpsc::unbounded_channel();
    focus_rx
}
