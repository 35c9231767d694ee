use crate::ipc::{IpcCommand, IpcResponse};
use crate::overlay::{Overlay, OverlayInput, OverlayState};
use crate::socket_server::IpcRequest;
use crate::window_system::{WindowHandle, WindowSystem};
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

pub struct Daemon<S: WindowSystem> {
    overlay: Overlay<S>,
}

impl<S: WindowSystem> Daemon<S> {
    pub fn new(overlay: Overlay<S>) -> Self {
        Daemon { overlay }
    }

    /// Main event loop
    ///
    /// Runs until a shutdown request, SIGINT or SIGTERM arrives, or every
    /// source closes, then hides the overlay and saves the order.
    pub async fn run(
        self,
        ipc_rx: mpsc::UnboundedReceiver<IpcRequest>,
        focus_rx: mpsc::UnboundedReceiver<WindowHandle>,
    ) {
        self.run_until(ipc_rx, focus_rx, termination_signal()).await;
    }

    /// Event loop that also stops once `stop` completes
    pub async fn run_until(
        mut self,
        mut ipc_rx: mpsc::UnboundedReceiver<IpcRequest>,
        mut focus_rx: mpsc::UnboundedReceiver<WindowHandle>,
        stop: impl Future<Output = ()>,
    ) {
        info!("Starting daemon event loop");
        tokio::pin!(stop);

        let mut ipc_open = true;
        let mut focus_open = true;

        loop {
            tokio::select! {
                request = ipc_rx.recv(), if ipc_open => match request {
                    Some(request) => {
                        if !self.handle_request(request) {
                            info!("Shutdown requested");
                            break;
                        }
                    }
                    None => ipc_open = false,
                },
                focused = focus_rx.recv(), if focus_open => match focused {
                    Some(focused) => self.handle_focus_change(focused),
                    None => focus_open = false,
                },
                () = &mut stop => {
                    info!("Termination signal received");
                    break;
                }
            }

            if !ipc_open && !focus_open {
                info!("All channels closed, shutting down");
                break;
            }
        }

        self.overlay.shutdown();
    }

    /// Returns `false` once the daemon should stop
    fn handle_request(&mut self, request: IpcRequest) -> bool {
        let IpcRequest { command, responder } = request;
        debug!("IPC command: {:?}, State: {:?}", command, self.overlay.state());

        let (response, keep_running) = match command {
            IpcCommand::Status => (IpcResponse::Status(self.overlay.status()), true),
            IpcCommand::Shutdown => (IpcResponse::Ok, false),
            other => {
                if let Some(input) = other.to_input() {
                    self.overlay.handle_input(input);
                }
                (IpcResponse::Ok, true)
            }
        };

        if responder.send(response).is_err() {
            warn!("IPC client went away before the reply");
        }
        keep_running
    }

    fn handle_focus_change(&mut self, focused: WindowHandle) {
        if self.overlay.state() == OverlayState::Shown {
            debug!("Window {} took focus while the overlay was shown", focused);
            self.overlay.handle_input(OverlayInput::FocusLost);
        }
    }
}

/// Completes on Ctrl+C, or on SIGTERM where signals exist
async fn termination_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            warn!("Failed to listen for Ctrl+C: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        use tokio::signal::unix::{SignalKind, signal};

        match signal(SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                warn!("Failed to listen for SIGTERM: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {}
        () = terminate => {}
    }
}
