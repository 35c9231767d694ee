use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::overlay::{Key, KeyPress, OverlayInput, OverlayStatus};

/// Commands sent from CLI client to daemon
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum IpcCommand {
    /// Flip the overlay between hidden and shown
    Toggle,
    /// Move the cursor up
    Up,
    /// Move the cursor down
    Down,
    /// Move the selected window up the list
    MoveUp,
    /// Move the selected window down the list
    MoveDown,
    /// Focus the selected window and hide
    Select,
    /// Focus the window in slot 1-9 and hide
    Jump(u8),
    /// Hide without selecting
    Cancel,
    /// Another window took focus
    FocusLost,
    /// Query daemon status (for debugging)
    Status,
    /// Shutdown the daemon gracefully
    Shutdown,
}

impl IpcCommand {
    /// The overlay input this command stands for, if any
    pub fn to_input(self) -> Option<OverlayInput> {
        let input = match self {
            IpcCommand::Toggle => OverlayInput::ToggleHotkey,
            IpcCommand::Up => OverlayInput::Key(KeyPress::plain(Key::Up)),
            IpcCommand::Down => OverlayInput::Key(KeyPress::plain(Key::Down)),
            IpcCommand::MoveUp => OverlayInput::Key(KeyPress::with_reorder(Key::Up)),
            IpcCommand::MoveDown => OverlayInput::Key(KeyPress::with_reorder(Key::Down)),
            IpcCommand::Select => OverlayInput::Key(KeyPress::plain(Key::Enter)),
            IpcCommand::Jump(n) => OverlayInput::Key(KeyPress::plain(Key::Digit(n))),
            IpcCommand::Cancel => OverlayInput::Key(KeyPress::plain(Key::Escape)),
            IpcCommand::FocusLost => OverlayInput::FocusLost,
            IpcCommand::Status | IpcCommand::Shutdown => return None,
        };
        Some(input)
    }
}

/// Response from daemon to CLI client
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum IpcResponse {
    /// Command executed successfully
    Ok,
    /// Error occurred
    Error(String),
    /// Status response
    Status(OverlayStatus),
}

#[cfg(unix)]
pub fn get_socket_path() -> anyhow::Result<std::path::PathBuf> {
    use anyhow::Context;

    let runtime_dir = dirs::runtime_dir()
        .or_else(dirs::cache_dir)
        .context("Could not determine runtime directory")?;

    Ok(runtime_dir.join("tabs-controller.sock"))
}

#[cfg(windows)]
pub const PIPE_NAME: &str = r"\\.\pipe\tabs-controller";

/// Error returned when parsing an invalid IpcCommand string
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParseIpcCommandError;

impl fmt::Display for ParseIpcCommandError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "invalid IPC command")
    }
}

impl std::error::Error for ParseIpcCommandError {}

impl FromStr for IpcCommand {
    type Err = ParseIpcCommandError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let lowered = s.trim().to_lowercase();
        let mut words = lowered.split_whitespace();
        let command = words.next().ok_or(ParseIpcCommandError)?;
        let argument = words.next();
        if words.next().is_some() {
            return Err(ParseIpcCommandError);
        }

        match (command, argument) {
            ("toggle", None) => Ok(IpcCommand::Toggle),
            ("up", None) => Ok(IpcCommand::Up),
            ("down", None) => Ok(IpcCommand::Down),
            ("move-up", None) => Ok(IpcCommand::MoveUp),
            ("move-down", None) => Ok(IpcCommand::MoveDown),
            ("select", None) => Ok(IpcCommand::Select),
            ("jump", Some(n)) => match n.parse::<u8>() {
                Ok(n @ 1..=9) => Ok(IpcCommand::Jump(n)),
                _ => Err(ParseIpcCommandError),
            },
            ("cancel", None) => Ok(IpcCommand::Cancel),
            ("focus-lost", None) => Ok(IpcCommand::FocusLost),
            ("status", None) => Ok(IpcCommand::Status),
            ("shutdown", None) => Ok(IpcCommand::Shutdown),
            _ => Err(ParseIpcCommandError),
        }
    }
}

impl fmt::Display for IpcCommand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            IpcCommand::Toggle => "toggle",
            IpcCommand::Up => "up",
            IpcCommand::Down => "down",
            IpcCommand::MoveUp => "move-up",
            IpcCommand::MoveDown => "move-down",
            IpcCommand::Select => "select",
            IpcCommand::Jump(n) => return write!(f, "jump {}", n),
            IpcCommand::Cancel => "cancel",
            IpcCommand::FocusLost => "focus-lost",
            IpcCommand::Status => "status",
            IpcCommand::Shutdown => "shutdown",
        };
        write!(f, "{}", s)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::overlay::OverlayState;
    use crate::render::{Highlight, RenderRow};

    #[test]
    fn test_ipc_command_from_str() {
        assert_eq!("toggle".parse(), Ok(IpcCommand::Toggle));
        assert_eq!("up".parse(), Ok(IpcCommand::Up));
        assert_eq!("down".parse(), Ok(IpcCommand::Down));
        assert_eq!("move-up".parse(), Ok(IpcCommand::MoveUp));
        assert_eq!("move-down".parse(), Ok(IpcCommand::MoveDown));
        assert_eq!("select".parse(), Ok(IpcCommand::Select));
        assert_eq!("jump 4".parse(), Ok(IpcCommand::Jump(4)));
        assert_eq!("cancel".parse(), Ok(IpcCommand::Cancel));
        assert_eq!("focus-lost".parse(), Ok(IpcCommand::FocusLost));
        assert_eq!("status".parse(), Ok(IpcCommand::Status));
        assert_eq!("shutdown".parse(), Ok(IpcCommand::Shutdown));
        assert_eq!("invalid".parse::<IpcCommand>(), Err(ParseIpcCommandError));
    }

    #[test]
    fn test_ipc_command_from_str_case_insensitive() {
        assert_eq!("TOGGLE".parse(), Ok(IpcCommand::Toggle));
        assert_eq!("Move-Up".parse(), Ok(IpcCommand::MoveUp));
        assert_eq!("  toggle  \n".parse(), Ok(IpcCommand::Toggle));
        assert_eq!(" JUMP   9 ".parse(), Ok(IpcCommand::Jump(9)));
    }

    #[test]
    fn test_ipc_command_rejects_bad_arguments() {
        assert!("".parse::<IpcCommand>().is_err());
        assert!("jump".parse::<IpcCommand>().is_err());
        assert!("jump 0".parse::<IpcCommand>().is_err());
        assert!("jump 10".parse::<IpcCommand>().is_err());
        assert!("jump x".parse::<IpcCommand>().is_err());
        assert!("toggle now".parse::<IpcCommand>().is_err());
        assert!("jump 1 2".parse::<IpcCommand>().is_err());
    }

    #[test]
    fn test_ipc_command_display() {
        assert_eq!(IpcCommand::Toggle.to_string(), "toggle");
        assert_eq!(IpcCommand::MoveDown.to_string(), "move-down");
        assert_eq!(IpcCommand::Jump(3).to_string(), "jump 3");
        assert_eq!(IpcCommand::FocusLost.to_string(), "focus-lost");
    }

    #[test]
    fn test_ipc_command_roundtrip() {
        let commands = [
            IpcCommand::Toggle,
            IpcCommand::Up,
            IpcCommand::Down,
            IpcCommand::MoveUp,
            IpcCommand::MoveDown,
            IpcCommand::Select,
            IpcCommand::Jump(7),
            IpcCommand::Cancel,
            IpcCommand::FocusLost,
            IpcCommand::Status,
            IpcCommand::Shutdown,
        ];

        for cmd in commands {
            let s = cmd.to_string();
            let parsed: IpcCommand = s.parse().unwrap();
            assert_eq!(parsed, cmd);
        }
    }

    #[test]
    fn test_to_input_carries_reorder_modifier() {
        assert_eq!(
            IpcCommand::MoveUp.to_input(),
            Some(OverlayInput::Key(KeyPress { key: Key::Up, reorder: true }))
        );
        assert_eq!(
            IpcCommand::Up.to_input(),
            Some(OverlayInput::Key(KeyPress { key: Key::Up, reorder: false }))
        );
        assert_eq!(IpcCommand::Status.to_input(), None);
        assert_eq!(IpcCommand::Shutdown.to_input(), None);
    }

    #[test]
    fn test_ipc_response_serialization() {
        let json = serde_json::to_string(&IpcResponse::Ok).unwrap();
        assert_eq!(json, r#""ok""#);

        let json = serde_json::to_string(&IpcResponse::Error("test error".to_string())).unwrap();
        assert!(json.contains("error"));
        assert!(json.contains("test error"));

        let status = IpcResponse::Status(OverlayStatus {
            state: OverlayState::Shown,
            window_count: 2,
            selected_index: Some(1),
            rows: vec![RenderRow {
                ordinal: Some(1),
                title: "A".to_string(),
                highlight: Highlight::PreviouslyFocused,
                was_focused: true,
                reordering: false,
            }],
        });
        let json = serde_json::to_string(&status).unwrap();
        assert!(json.contains(r#""state":"shown""#));
        assert!(json.contains(r#""highlight":"previously_focused""#));
        let parsed: IpcResponse = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed, status);
    }

    #[cfg(unix)]
    #[test]
    fn test_get_socket_path() {
        let path = get_socket_path().unwrap();
        assert!(path.ends_with("tabs-controller.sock"));
    }
}
