use anyhow::{Context, Result};
use windows::Win32::Foundation::{BOOL, HWND, LPARAM, RECT, TRUE};
use windows::Win32::UI::Input::KeyboardAndMouse::SetFocus;
use windows::Win32::UI::WindowsAndMessaging::{
    EnumWindows, GWL_EXSTYLE, GWL_STYLE, GetClassNameW, GetDesktopWindow, GetForegroundWindow,
    GetParent, GetWindowLongW, GetWindowRect, GetWindowTextLengthW, GetWindowTextW, IsIconic,
    IsWindow, IsWindowVisible, SW_RESTORE, SetForegroundWindow, ShowWindow,
};

use crate::window_system::{
    ExtendedStyle, Rect, WindowAttributes, WindowHandle, WindowStyle, WindowSystem,
};

/// Longest class name Win32 will report
const MAX_CLASS_NAME: usize = 256;

fn hwnd(handle: WindowHandle) -> HWND {
    HWND(handle.0 as *mut core::ffi::c_void)
}

fn handle(hwnd: HWND) -> WindowHandle {
    WindowHandle(hwnd.0 as usize)
}

pub struct Win32WindowSystem {
    /// The overlay's own window, when a renderer has one
    overlay: Option<WindowHandle>,
}

impl Win32WindowSystem {
    pub fn new(overlay: Option<WindowHandle>) -> Self {
        Win32WindowSystem { overlay }
    }
}

unsafe extern "system" fn collect_window(hwnd: HWND, lparam: LPARAM) -> BOOL {
    // SAFETY: lparam carries the &mut Vec passed by top_level_windows, which
    // outlives the EnumWindows call
    let handles = unsafe { &mut *(lparam.0 as *mut Vec<WindowHandle>) };
    handles.push(handle(hwnd));
    TRUE
}

fn window_text(hwnd: HWND) -> String {
    // Titles have no fixed upper bound, so size the buffer per window
    let len = unsafe { GetWindowTextLengthW(hwnd) };
    if len <= 0 {
        return String::new();
    }
    let mut buffer = vec![0u16; len as usize + 1];
    let copied = unsafe { GetWindowTextW(hwnd, &mut buffer) };
    String::from_utf16_lossy(&buffer[..copied.max(0) as usize])
}

fn class_name(hwnd: HWND) -> String {
    let mut buffer = [0u16; MAX_CLASS_NAME];
    let copied = unsafe { GetClassNameW(hwnd, &mut buffer) };
    String::from_utf16_lossy(&buffer[..copied.max(0) as usize])
}

fn window_rect(hwnd: HWND) -> Option<Rect> {
    let mut rect = RECT::default();
    unsafe { GetWindowRect(hwnd, &mut rect) }.ok()?;
    Some(Rect {
        left: rect.left,
        top: rect.top,
        right: rect.right,
        bottom: rect.bottom,
    })
}

impl WindowSystem for Win32WindowSystem {
    fn top_level_windows(&mut self) -> Result<Vec<WindowHandle>> {
        let mut handles: Vec<WindowHandle> = Vec::new();
        unsafe {
            EnumWindows(
                Some(collect_window),
                LPARAM(&mut handles as *mut Vec<WindowHandle> as isize),
            )
        }
        .context("EnumWindows failed")?;
        Ok(handles)
    }

    fn attributes(&mut self, handle: WindowHandle) -> Option<WindowAttributes> {
        let hwnd = hwnd(handle);
        if !unsafe { IsWindow(hwnd) }.as_bool() {
            return None;
        }

        let style = unsafe { GetWindowLongW(hwnd, GWL_STYLE) } as u32;
        let ex_style = unsafe { GetWindowLongW(hwnd, GWL_EXSTYLE) } as u32;
        let parent = unsafe { GetParent(hwnd) }
            .ok()
            .filter(|p| !p.0.is_null())
            .map(self::handle);

        Some(WindowAttributes {
            visible: unsafe { IsWindowVisible(hwnd) }.as_bool(),
            title: window_text(hwnd),
            class_name: class_name(hwnd),
            style: WindowStyle::from_bits_retain(style),
            ex_style: ExtendedStyle::from_bits_retain(ex_style),
            rect: window_rect(hwnd),
            parent,
        })
    }

    fn is_window(&mut self, handle: WindowHandle) -> bool {
        unsafe { IsWindow(hwnd(handle)) }.as_bool()
    }

    fn foreground_window(&mut self) -> Option<WindowHandle> {
        let hwnd = unsafe { GetForegroundWindow() };
        (!hwnd.0.is_null()).then(|| self::handle(hwnd))
    }

    fn desktop_window(&self) -> Option<WindowHandle> {
        Some(handle(unsafe { GetDesktopWindow() }))
    }

    fn overlay_window(&self) -> Option<WindowHandle> {
        self.overlay
    }

    fn is_minimized(&mut self, handle: WindowHandle) -> bool {
        unsafe { IsIconic(hwnd(handle)) }.as_bool()
    }

    fn restore(&mut self, handle: WindowHandle) -> Result<()> {
        // The return value is the previous visibility, not success
        let _ = unsafe { ShowWindow(hwnd(handle), SW_RESTORE) };
        Ok(())
    }

    fn activate(&mut self, handle: WindowHandle) -> Result<()> {
        let hwnd = hwnd(handle);
        if !unsafe { SetForegroundWindow(hwnd) }.as_bool() {
            anyhow::bail!("SetForegroundWindow refused window {}", handle);
        }
        // Focus can only move within our own thread's input queue; failure
        // here is expected for other processes' windows
        let _ = unsafe { SetFocus(hwnd) };
        Ok(())
    }
}
