use anyhow::Result;
use bitflags::bitflags;
use std::fmt;
use std::str::FromStr;

/// Opaque OS window identity.
///
/// Stable for the lifetime of a window, but the OS is free to hand the same
/// value to an unrelated window once the original is destroyed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct WindowHandle(pub usize);

impl fmt::Display for WindowHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "0x{:016X}", self.0)
    }
}

/// Error returned when parsing an invalid window handle literal
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParseHandleError;

impl fmt::Display for ParseHandleError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "invalid window handle")
    }
}

impl std::error::Error for ParseHandleError {}

impl FromStr for WindowHandle {
    type Err = ParseHandleError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        let digits = s
            .strip_prefix("0x")
            .or_else(|| s.strip_prefix("0X"))
            .unwrap_or(s);
        if digits.is_empty() {
            return Err(ParseHandleError);
        }
        usize::from_str_radix(digits, 16)
            .map(WindowHandle)
            .map_err(|_| ParseHandleError)
    }
}

bitflags! {
    /// Raw window style bits (Win32 `GWL_STYLE` layout).
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
    pub struct WindowStyle: u32 {
        const POPUP = 0x8000_0000;
        const VISIBLE = 0x1000_0000;
        const BORDER = 0x0080_0000;
        const DLGFRAME = 0x0040_0000;
        const CAPTION = Self::BORDER.bits() | Self::DLGFRAME.bits();
    }

    /// Raw extended window style bits (Win32 `GWL_EXSTYLE` layout).
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
    pub struct ExtendedStyle: u32 {
        const TOOLWINDOW = 0x0000_0080;
        const TOPMOST = 0x0000_0008;
    }
}

/// Bounding rectangle in screen coordinates.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Rect {
    pub left: i32,
    pub top: i32,
    pub right: i32,
    pub bottom: i32,
}

impl Rect {
    pub fn new(left: i32, top: i32, width: i32, height: i32) -> Self {
        Rect {
            left,
            top,
            right: left + width,
            bottom: top + height,
        }
    }

    pub fn width(&self) -> i32 {
        self.right - self.left
    }

    pub fn height(&self) -> i32 {
        self.bottom - self.top
    }
}

/// Snapshot of the attributes the classifier looks at.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct WindowAttributes {
    /// Result of the OS "is visible" query
    pub visible: bool,
    pub title: String,
    pub class_name: String,
    pub style: WindowStyle,
    pub ex_style: ExtendedStyle,
    /// `None` when the OS could not report a rectangle
    pub rect: Option<Rect>,
    pub parent: Option<WindowHandle>,
}

/// Operations the engine needs from the desktop.
pub trait WindowSystem {
    /// All top-level windows in the OS enumeration order
    fn top_level_windows(&mut self) -> Result<Vec<WindowHandle>>;

    /// Read the window's attributes fresh, `None` if the window is gone
    fn attributes(&mut self, handle: WindowHandle) -> Option<WindowAttributes>;

    /// Whether the handle still denotes a live window
    fn is_window(&mut self, handle: WindowHandle) -> bool;

    /// The window currently holding foreground focus
    fn foreground_window(&mut self) -> Option<WindowHandle>;

    /// The desktop root, if the platform has one
    fn desktop_window(&self) -> Option<WindowHandle>;

    /// The overlay's own window, if it has one
    fn overlay_window(&self) -> Option<WindowHandle>;

    fn is_minimized(&mut self, handle: WindowHandle) -> bool;

    /// Restore a minimized window
    fn restore(&mut self, handle: WindowHandle) -> Result<()>;

    /// Raise the window and give it input focus
    fn activate(&mut self, handle: WindowHandle) -> Result<()>;
}
