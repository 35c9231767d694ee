use clap::{Parser, Subcommand};
use std::path::PathBuf;

use crate::ipc::IpcCommand;

#[derive(Debug, Clone, Subcommand)]
pub enum Command {
    /// Run as daemon (default if no command specified)
    Daemon,
    /// Show the overlay, or hide it if already shown
    Toggle,
    /// Move the selection up
    Up,
    /// Move the selection down
    Down,
    /// Move the selected window one place up the list
    MoveUp,
    /// Move the selected window one place down the list
    MoveDown,
    /// Focus the selected window and hide the overlay
    Select,
    /// Focus the window in the given slot and hide the overlay
    Jump {
        #[arg(value_parser = clap::value_parser!(u8).range(1..=9))]
        slot: u8,
    },
    /// Hide the overlay without selecting
    Cancel,
    /// Query daemon status
    Status,
    /// Shutdown the daemon
    Shutdown,
}

impl Command {
    /// The IPC command a client invocation sends, `None` for the daemon itself
    pub fn ipc_command(&self) -> Option<IpcCommand> {
        let command = match self {
            Command::Daemon => return None,
            Command::Toggle => IpcCommand::Toggle,
            Command::Up => IpcCommand::Up,
            Command::Down => IpcCommand::Down,
            Command::MoveUp => IpcCommand::MoveUp,
            Command::MoveDown => IpcCommand::MoveDown,
            Command::Select => IpcCommand::Select,
            Command::Jump { slot } => IpcCommand::Jump(*slot),
            Command::Cancel => IpcCommand::Cancel,
            Command::Status => IpcCommand::Status,
            Command::Shutdown => IpcCommand::Shutdown,
        };
        Some(command)
    }
}

#[derive(Debug, Clone, Parser)]
#[command(name = "tabs-controller")]
#[command(about = "Keyboard-driven window list with a persistent, user-defined order", long_about = None)]
pub struct Config {
    /// Enable verbose logging
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Where the window order is saved (daemon only)
    #[arg(long, value_name = "PATH")]
    pub order_file: Option<PathBuf>,

    /// JSON file overriding the window classification rules (daemon only)
    #[arg(long, value_name = "PATH")]
    pub rules: Option<PathBuf>,

    /// Titles longer than this many characters are truncated
    #[arg(long, default_value_t = 60)]
    pub title_width: usize,

    /// Command to execute
    #[command(subcommand)]
    pub command: Option<Command>,
}

impl Config {
    pub fn parse() -> Self {
        <Config as Parser>::parse()
    }

    /// Get the command, defaulting to Daemon if none specified
    pub fn command(&self) -> Command {
        self.command.clone().unwrap_or(Command::Daemon)
    }
}
