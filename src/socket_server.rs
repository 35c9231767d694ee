use crate::ipc::{IpcCommand, IpcResponse};
use anyhow::Result;
use std::time::Duration;
use tokio::io::{AsyncBufReadExt, AsyncRead, AsyncWrite, AsyncWriteExt, BufReader};
use tokio::sync::{mpsc, oneshot};
use tracing::{debug, warn};

/// How long a client may take to send its command line
const READ_TIMEOUT: Duration = Duration::from_secs(5);

/// A parsed command plus the channel its reply goes back on
#[derive(Debug)]
pub struct IpcRequest {
    pub command: IpcCommand,
    pub responder: oneshot::Sender<IpcResponse>,
}

#[cfg(unix)]
pub use unix::{SocketGuard, start_server};

#[cfg(windows)]
pub use pipe::start_server;

#[cfg(unix)]
mod unix {
    use super::{IpcRequest, handle_client};
    use crate::ipc::get_socket_path;
    use anyhow::{Context, Result};
    use std::fs;
    use std::path::PathBuf;
    use tokio::net::UnixListener;
    use tokio::sync::mpsc;
    use tracing::{debug, error, info};

    /// Guard that removes the socket file when dropped
    pub struct SocketGuard {
        path: PathBuf,
    }

    impl Drop for SocketGuard {
        fn drop(&mut self) {
            if let Err(e) = fs::remove_file(&self.path) {
                if self.path.exists() {
                    error!("Failed to remove socket file: {}", e);
                }
            } else {
                info!("Removed socket file at {}", self.path.display());
            }
        }
    }

    /// Start the IPC socket server
    /// Returns a receiver for incoming requests and a guard that cleans up the socket
    pub async fn start_server() -> Result<(mpsc::UnboundedReceiver<IpcRequest>, SocketGuard)> {
        let socket_path = get_socket_path()?;

        // Remove stale socket if it exists
        if socket_path.exists() {
            info!("Removing stale socket at {}", socket_path.display());
            fs::remove_file(&socket_path)?;
        }

        let listener = UnixListener::bind(&socket_path)
            .with_context(|| format!("Failed to bind socket at {}", socket_path.display()))?;

        info!("IPC socket listening at {}", socket_path.display());

        let guard = SocketGuard {
            path: socket_path.clone(),
        };
        let (tx, rx) = mpsc::unbounded_channel();

        // Spawn task to accept connections
        tokio::spawn(async move {
            loop {
                match listener.accept().await {
                    Ok((stream, _)) => {
                        let tx_clone = tx.clone();
                        tokio::spawn(async move {
                            if let Err(e) = handle_client(stream, tx_clone).await {
                                debug!("Client connection error: {}", e);
                            }
                        });
                    }
                    Err(e) => {
                        error!("Failed to accept connection: {}", e);
                    }
                }
            }
        });

        Ok((rx, guard))
    }
}

#[cfg(windows)]
mod pipe {
    use super::{IpcRequest, handle_client};
    use crate::ipc::PIPE_NAME;
    use anyhow::{Context, Result};
    use std::time::Duration;
    use tokio::net::windows::named_pipe::{PipeMode, ServerOptions};
    use tokio::sync::mpsc;
    use tracing::{debug, error, info};

    /// Start the IPC named pipe server
    /// Returns a receiver for incoming requests
    pub async fn start_server() -> Result<mpsc::UnboundedReceiver<IpcRequest>> {
        // Creating the first instance up front fails if another daemon owns the pipe
        let mut server = ServerOptions::new()
            .first_pipe_instance(true)
            .pipe_mode(PipeMode::Byte)
            .create(PIPE_NAME)
            .with_context(|| format!("Failed to create named pipe {}", PIPE_NAME))?;

        info!("IPC pipe listening at {}", PIPE_NAME);

        let (tx, rx) = mpsc::unbounded_channel();

        tokio::spawn(async move {
            loop {
                if let Err(e) = server.connect().await {
                    error!("Failed to accept client connection: {}", e);
                    continue;
                }

                // Hand the connected instance off and open the next one
                let connected = server;
                server = loop {
                    match ServerOptions::new().pipe_mode(PipeMode::Byte).create(PIPE_NAME) {
                        Ok(next) => break next,
                        Err(e) => {
                            error!("Failed to create named pipe server: {}", e);
                            tokio::time::sleep(Duration::from_secs(1)).await;
                        }
                    }
                };

                let tx_clone = tx.clone();
                tokio::spawn(async move {
                    if let Err(e) = handle_client(connected, tx_clone).await {
                        debug!("Client connection error: {}", e);
                    }
                });
            }
        });

        Ok(rx)
    }
}

/// Handle a single client connection: one command line in, one JSON line out
async fn handle_client<S>(stream: S, tx: mpsc::UnboundedSender<IpcRequest>) -> Result<()>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    let (reader, mut writer) = tokio::io::split(stream);
    let mut reader = BufReader::new(reader);
    let mut line = String::new();

    match tokio::time::timeout(READ_TIMEOUT, reader.read_line(&mut line)).await {
        Ok(Ok(0)) | Err(_) => return Ok(()),
        Ok(Ok(_)) => {}
        Ok(Err(e)) => return Err(e.into()),
    }

    let response = match line.parse::<IpcCommand>() {
        Ok(command) => {
            debug!("Received IPC command: {:?}", command);
            let (responder, reply) = oneshot::channel();

            if tx.send(IpcRequest { command, responder }).is_err() {
                IpcResponse::Error("Daemon is shutting down".to_string())
            } else {
                reply
                    .await
                    .unwrap_or_else(|_| IpcResponse::Error("Daemon dropped the request".to_string()))
            }
        }
        Err(_) => {
            warn!("Unknown IPC command: {}", line.trim());
            IpcResponse::Error(format!("Unknown command: {}", line.trim()))
        }
    };

    // Send response
    let response_json = serde_json::to_string(&response)?;
    writer.write_all(response_json.as_bytes()).await?;
    writer.write_all(b"\n").await?;
    writer.flush().await?;

    Ok(())
}
