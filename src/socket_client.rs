use crate::ipc::{IpcCommand, IpcResponse};
use anyhow::{Context, Result};
use std::io::{BufRead, BufReader, Read, Write};

/// Send a command to the daemon and get the response
#[cfg(unix)]
pub fn send_command(command: IpcCommand) -> Result<IpcResponse> {
    use crate::ipc::get_socket_path;
    use std::os::unix::net::UnixStream;
    use std::time::Duration;

    let socket_path = get_socket_path()?;

    let stream = UnixStream::connect(&socket_path).with_context(|| {
        format!(
            "Failed to connect to daemon at {}. Is the daemon running?",
            socket_path.display()
        )
    })?;

    // Set timeouts
    stream.set_read_timeout(Some(Duration::from_secs(5)))?;
    stream.set_write_timeout(Some(Duration::from_secs(5)))?;

    exchange(stream, command)
}

/// Send a command to the daemon and get the response
#[cfg(windows)]
pub fn send_command(command: IpcCommand) -> Result<IpcResponse> {
    use crate::ipc::PIPE_NAME;
    use std::fs::OpenOptions;

    let pipe = OpenOptions::new()
        .read(true)
        .write(true)
        .open(PIPE_NAME)
        .with_context(|| {
            format!("Failed to connect to daemon at {}. Is the daemon running?", PIPE_NAME)
        })?;

    exchange(pipe, command)
}

/// Write one command line, read one JSON response line
fn exchange<S: Read + Write>(mut stream: S, command: IpcCommand) -> Result<IpcResponse> {
    // Send command as simple string
    writeln!(stream, "{}", command)?;
    stream.flush()?;

    // Read response
    let mut reader = BufReader::new(stream);
    let mut response_line = String::new();
    reader.read_line(&mut response_line)?;

    let response: IpcResponse =
        serde_json::from_str(&response_line).context("Failed to parse daemon response")?;

    Ok(response)
}

/// Send command and print result, exit with appropriate code
pub fn send_command_and_exit(command: IpcCommand) -> ! {
    match send_command(command) {
        Ok(IpcResponse::Ok) => {
            std::process::exit(0);
        }
        Ok(IpcResponse::Status(status)) => {
            println!("Daemon Status:");
            println!("  State: {:?}", status.state);
            println!("  Window count: {}", status.window_count);
            if let Some(idx) = status.selected_index {
                println!("  Selected index: {}", idx);
            }
            for row in &status.rows {
                println!("  {} {}", row.highlight.marker(), row);
            }
            std::process::exit(0);
        }
        Ok(IpcResponse::Error(e)) => {
            eprintln!("Error: {}", e);
            std::process::exit(1);
        }
        Err(e) => {
            eprintln!("Error: {:#}", e);
            std::process::exit(1);
        }
    }
}
