use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs;
use std::path::Path;

use crate::window_system::{ExtendedStyle, WindowAttributes, WindowHandle, WindowStyle};

/// What a title pattern does when it appears in a window title.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TitleRule {
    Deny,
    Allow,
}

/// What a class pattern does when it appears in a window class name.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ClassRule {
    /// Exclude every window of this class
    Deny,
    /// Exclude only tool windows of this class
    DenyToolWindow,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Extent {
    pub width: i32,
    pub height: i32,
}

impl Extent {
    fn admits(&self, width: i32, height: i32) -> bool {
        width >= self.width && height >= self.height
    }
}

/// Pattern tables and thresholds driving [`ClassifierRules::classify`].
///
/// All patterns are case-sensitive substring matches.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ClassifierRules {
    pub titles: BTreeMap<String, TitleRule>,
    pub classes: BTreeMap<String, ClassRule>,
    /// Minimum extent for frameless or tool windows to pass as applications
    pub min_app_size: Extent,
    /// Anything smaller is treated as a system indicator
    pub min_window_size: Extent,
    /// Windows whose left or top edge lies below this are off-screen
    pub offscreen_limit: i32,
}

const DENIED_TITLES: &[&str] = &[
    "RZMonitorForegroundWindow",
    "Definições",
    "NVIDIA GeForce Overlay",
    "Program Manager",
    "Desktop Window Manager",
    "Windows Security",
    "Action Center",
    "Microsoft Text Input Application",
    "Windows Input Experience",
    "Cortana",
    "Search",
    "Windows Shell Experience Host",
    "Background Task Host",
];

const ALLOWED_TITLES: &[&str] = &[
    "Steam",
    "Discord",
    "Spotify",
    "Chrome",
    "Firefox",
    "Visual Studio",
    "Code",
    "Notepad",
    "Explorer",
];

const DENIED_CLASSES: &[&str] = &[
    "Shell_TrayWnd",
    "Shell_SecondaryTrayWnd",
    "Progman",
    "WorkerW",
    "DV2ControlHost",
    "Windows.UI.Core.CoreWindow",
    "ApplicationFrameWindow",
    "Windows.UI.Composition.DesktopWindowContentBridge",
    "ForegroundStaging",
    "MultitaskingViewFrame",
    "EdgeUiInputTopWndClass",
    "NativeHWNDHost",
    "Shell_InputSwitchTopLevelWindow",
    "Windows.Internal.CapturePicker",
    "XamlExplorerHostIslandWindow",
    "CortanaUI",
    "SearchUI",
];

const SHELL_TOOL_CLASSES: &[&str] = &["Shell_", "DV2ControlHost"];

impl Default for ClassifierRules {
    fn default() -> Self {
        let mut titles = BTreeMap::new();
        for title in DENIED_TITLES {
            titles.insert(title.to_string(), TitleRule::Deny);
        }
        for title in ALLOWED_TITLES {
            titles.insert(title.to_string(), TitleRule::Allow);
        }

        let mut classes = BTreeMap::new();
        for class in SHELL_TOOL_CLASSES {
            classes.insert(class.to_string(), ClassRule::DenyToolWindow);
        }
        // Plain deny also covers tool windows, so it overrides the entries above
        for class in DENIED_CLASSES {
            classes.insert(class.to_string(), ClassRule::Deny);
        }

        ClassifierRules {
            titles,
            classes,
            min_app_size: Extent {
                width: 200,
                height: 100,
            },
            min_window_size: Extent {
                width: 100,
                height: 50,
            },
            offscreen_limit: -1000,
        }
    }
}

/// Where a window stands in relation to the desktop.
#[derive(Debug, Clone, Copy, Default)]
pub struct ClassifyContext {
    pub overlay: Option<WindowHandle>,
    pub desktop: Option<WindowHandle>,
}

/// Why a window was left out of the application list.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ExcludeReason {
    NotVisible,
    OverlayWindow,
    EmptyTitle,
    DeniedTitle(String),
    /// Allow-listed, but owned by a window other than the desktop
    AllowedButOwned,
    DeniedClass(String),
    ShellToolWindow(String),
    SmallToolWindow,
    NotStyledVisible,
    Owned,
    Frameless,
    TooSmall,
    OffScreen,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Verdict {
    /// Passed through the allow list
    Allowlisted,
    /// Passed every heuristic
    Include,
    Exclude(ExcludeReason),
}

impl Verdict {
    pub fn is_included(&self) -> bool {
        !matches!(self, Verdict::Exclude(_))
    }
}

impl ClassifierRules {
    /// Load rules from a JSON file; missing fields keep their defaults.
    pub fn from_file(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path)
            .with_context(|| format!("Failed to read classifier rules from {}", path.display()))?;
        serde_json::from_str(&content)
            .with_context(|| format!("Invalid classifier rules in {}", path.display()))
    }

    fn title_match(&self, title: &str, rule: TitleRule) -> Option<&str> {
        self.titles
            .iter()
            .find(|(pattern, r)| **r == rule && !pattern.is_empty() && title.contains(pattern.as_str()))
            .map(|(pattern, _)| pattern.as_str())
    }

    fn class_match(&self, class_name: &str, tool_window: bool) -> Option<&str> {
        self.classes
            .iter()
            .find(|(pattern, rule)| {
                let applies = match rule {
                    ClassRule::Deny => true,
                    ClassRule::DenyToolWindow => tool_window,
                };
                applies && !pattern.is_empty() && class_name.contains(pattern.as_str())
            })
            .map(|(pattern, _)| pattern.as_str())
    }

    /// Classify one window. Pure: the same attributes always yield the same
    /// verdict.
    pub fn classify(
        &self,
        handle: WindowHandle,
        attrs: &WindowAttributes,
        context: &ClassifyContext,
    ) -> Verdict {
        use ExcludeReason::*;

        if !attrs.visible {
            return Verdict::Exclude(NotVisible);
        }
        if context.overlay == Some(handle) {
            return Verdict::Exclude(OverlayWindow);
        }
        if attrs.title.is_empty() {
            return Verdict::Exclude(EmptyTitle);
        }
        if let Some(pattern) = self.title_match(&attrs.title, TitleRule::Deny) {
            return Verdict::Exclude(DeniedTitle(pattern.to_string()));
        }

        let top_level = match attrs.parent {
            None => true,
            Some(parent) => context.desktop == Some(parent),
        };

        if self.title_match(&attrs.title, TitleRule::Allow).is_some() {
            return if top_level {
                Verdict::Allowlisted
            } else {
                Verdict::Exclude(AllowedButOwned)
            };
        }

        if let Some(pattern) = self.class_match(&attrs.class_name, false) {
            return Verdict::Exclude(DeniedClass(pattern.to_string()));
        }

        if attrs.ex_style.contains(ExtendedStyle::TOOLWINDOW) {
            if let Some(pattern) = self.class_match(&attrs.class_name, true) {
                return Verdict::Exclude(ShellToolWindow(pattern.to_string()));
            }
            // A tool window without a rectangle gets the benefit of the doubt
            if let Some(rect) = attrs.rect
                && !self.min_app_size.admits(rect.width(), rect.height())
            {
                return Verdict::Exclude(SmallToolWindow);
            }
        }

        if !attrs.style.contains(WindowStyle::VISIBLE) {
            return Verdict::Exclude(NotStyledVisible);
        }

        if !top_level {
            return Verdict::Exclude(Owned);
        }

        if !attrs.style.intersects(WindowStyle::CAPTION | WindowStyle::POPUP) {
            let big_enough = attrs
                .rect
                .is_some_and(|rect| self.min_app_size.admits(rect.width(), rect.height()));
            if !big_enough {
                return Verdict::Exclude(Frameless);
            }
        }

        if let Some(rect) = attrs.rect {
            if !self.min_window_size.admits(rect.width(), rect.height()) {
                return Verdict::Exclude(TooSmall);
            }
            if rect.left < self.offscreen_limit || rect.top < self.offscreen_limit {
                return Verdict::Exclude(OffScreen);
            }
        }

        Verdict::Include
    }

    pub fn is_included(
        &self,
        handle: WindowHandle,
        attrs: &WindowAttributes,
        context: &ClassifyContext,
    ) -> bool {
        self.classify(handle, attrs, context).is_included()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::window_system::Rect;
    use crate::window_system::fake::{DESKTOP, app_window};
    use std::io::Write;

    const HANDLE: WindowHandle = WindowHandle(0x2001);

    fn context() -> ClassifyContext {
        ClassifyContext {
            overlay: Some(WindowHandle(0x9999)),
            desktop: Some(DESKTOP),
        }
    }

    fn classify(attrs: &WindowAttributes) -> Verdict {
        ClassifierRules::default().classify(HANDLE, attrs, &context())
    }

    #[test]
    fn test_plain_application_is_included() {
        assert_eq!(classify(&app_window("Terminal")), Verdict::Include);
    }

    #[test]
    fn test_classify_is_deterministic() {
        let rules = ClassifierRules::default();
        let attrs = app_window("Some Editor");
        let first = rules.classify(HANDLE, &attrs, &context());
        for _ in 0..10 {
            assert_eq!(rules.classify(HANDLE, &attrs, &context()), first);
        }
    }

    #[test]
    fn test_invisible_window_excluded() {
        let mut attrs = app_window("Terminal");
        attrs.visible = false;
        assert_eq!(classify(&attrs), Verdict::Exclude(ExcludeReason::NotVisible));
    }

    #[test]
    fn test_overlay_window_excluded() {
        let rules = ClassifierRules::default();
        let verdict = rules.classify(WindowHandle(0x9999), &app_window("Tabs Controller"), &context());
        assert_eq!(verdict, Verdict::Exclude(ExcludeReason::OverlayWindow));
    }

    #[test]
    fn test_empty_title_excluded() {
        assert_eq!(classify(&app_window("")), Verdict::Exclude(ExcludeReason::EmptyTitle));
    }

    #[test]
    fn test_denied_title_substring() {
        assert_eq!(
            classify(&app_window("Program Manager")),
            Verdict::Exclude(ExcludeReason::DeniedTitle("Program Manager".to_string()))
        );
        // Deny runs before allow, so an allowed app with a denied word is dropped
        assert!(!classify(&app_window("Search - Google Chrome")).is_included());
    }

    #[test]
    fn test_allowlisted_skips_style_checks() {
        let mut attrs = app_window("Steam");
        attrs.style = WindowStyle::empty();
        attrs.rect = Some(Rect::new(-5000, -5000, 10, 10));
        attrs.class_name = "WorkerW".to_string();
        assert_eq!(classify(&attrs), Verdict::Allowlisted);
    }

    #[test]
    fn test_allowlisted_with_desktop_parent_is_included() {
        let mut attrs = app_window("Spotify Premium");
        attrs.parent = Some(DESKTOP);
        assert_eq!(classify(&attrs), Verdict::Allowlisted);
    }

    #[test]
    fn test_allowlisted_owned_window_excluded() {
        let mut attrs = app_window("Discord");
        attrs.parent = Some(WindowHandle(0x4242));
        assert_eq!(classify(&attrs), Verdict::Exclude(ExcludeReason::AllowedButOwned));
    }

    #[test]
    fn test_denied_class() {
        let mut attrs = app_window("Taskbar");
        attrs.class_name = "Shell_TrayWnd".to_string();
        assert_eq!(
            classify(&attrs),
            Verdict::Exclude(ExcludeReason::DeniedClass("Shell_TrayWnd".to_string()))
        );
    }

    #[test]
    fn test_shell_class_only_denied_for_tool_windows() {
        let mut attrs = app_window("Flyout");
        attrs.class_name = "Shell_FlyoutHost".to_string();
        assert_eq!(classify(&attrs), Verdict::Include);

        attrs.ex_style = ExtendedStyle::TOOLWINDOW;
        assert_eq!(
            classify(&attrs),
            Verdict::Exclude(ExcludeReason::ShellToolWindow("Shell_".to_string()))
        );
    }

    #[test]
    fn test_small_tool_window_excluded() {
        let mut attrs = app_window("Palette");
        attrs.ex_style = ExtendedStyle::TOOLWINDOW;
        attrs.rect = Some(Rect::new(0, 0, 199, 400));
        assert_eq!(classify(&attrs), Verdict::Exclude(ExcludeReason::SmallToolWindow));

        attrs.rect = Some(Rect::new(0, 0, 400, 99));
        assert_eq!(classify(&attrs), Verdict::Exclude(ExcludeReason::SmallToolWindow));
    }

    #[test]
    fn test_large_tool_window_continues() {
        let mut attrs = app_window("Palette");
        attrs.ex_style = ExtendedStyle::TOOLWINDOW;
        attrs.rect = Some(Rect::new(0, 0, 200, 100));
        assert_eq!(classify(&attrs), Verdict::Include);

        attrs.rect = None;
        assert_eq!(classify(&attrs), Verdict::Include);
    }

    #[test]
    fn test_style_visible_bit_required() {
        let mut attrs = app_window("Terminal");
        attrs.style = WindowStyle::CAPTION;
        assert_eq!(classify(&attrs), Verdict::Exclude(ExcludeReason::NotStyledVisible));
    }

    #[test]
    fn test_owned_window_excluded() {
        let mut attrs = app_window("Find and Replace");
        attrs.parent = Some(WindowHandle(0x3003));
        assert_eq!(classify(&attrs), Verdict::Exclude(ExcludeReason::Owned));

        attrs.parent = Some(DESKTOP);
        assert_eq!(classify(&attrs), Verdict::Include);
    }

    #[test]
    fn test_frameless_window_needs_application_size() {
        let mut attrs = app_window("Game");
        attrs.style = WindowStyle::VISIBLE;
        attrs.rect = Some(Rect::new(0, 0, 150, 300));
        assert_eq!(classify(&attrs), Verdict::Exclude(ExcludeReason::Frameless));

        attrs.rect = None;
        assert_eq!(classify(&attrs), Verdict::Exclude(ExcludeReason::Frameless));

        attrs.rect = Some(Rect::new(0, 0, 1024, 768));
        assert_eq!(classify(&attrs), Verdict::Include);
    }

    #[test]
    fn test_popup_counts_as_framed() {
        let mut attrs = app_window("Launcher");
        attrs.style = WindowStyle::VISIBLE | WindowStyle::POPUP;
        attrs.rect = Some(Rect::new(0, 0, 150, 60));
        assert_eq!(classify(&attrs), Verdict::Include);
    }

    #[test]
    fn test_tiny_window_excluded() {
        let mut attrs = app_window("Indicator");
        attrs.rect = Some(Rect::new(0, 0, 99, 300));
        assert_eq!(classify(&attrs), Verdict::Exclude(ExcludeReason::TooSmall));

        attrs.rect = Some(Rect::new(0, 0, 300, 49));
        assert_eq!(classify(&attrs), Verdict::Exclude(ExcludeReason::TooSmall));
    }

    #[test]
    fn test_offscreen_window_excluded() {
        let mut attrs = app_window("Hidden helper");
        attrs.rect = Some(Rect::new(-32000, -32000, 160, 28 + 50));
        assert_eq!(classify(&attrs), Verdict::Exclude(ExcludeReason::OffScreen));

        attrs.rect = Some(Rect::new(-1000, -1000, 400, 300));
        assert_eq!(classify(&attrs), Verdict::Include);

        attrs.rect = Some(Rect::new(0, -1001, 400, 300));
        assert_eq!(classify(&attrs), Verdict::Exclude(ExcludeReason::OffScreen));
    }

    #[test]
    fn test_empty_pattern_never_matches() {
        let mut rules = ClassifierRules::default();
        rules.titles.insert(String::new(), TitleRule::Deny);
        assert_eq!(rules.classify(HANDLE, &app_window("Terminal"), &context()), Verdict::Include);
    }

    #[test]
    fn test_rules_from_file_keep_defaults_for_missing_fields() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, r#"{{"titles": {{"Terminal": "deny"}}}}"#).unwrap();

        let rules = ClassifierRules::from_file(file.path()).unwrap();
        assert_eq!(rules.titles.len(), 1);
        assert_eq!(rules.min_app_size, ClassifierRules::default().min_app_size);
        assert_eq!(rules.classes, ClassifierRules::default().classes);
        assert!(!rules.is_included(HANDLE, &app_window("Terminal"), &context()));
    }

    #[test]
    fn test_rules_from_invalid_file_is_error() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, "not json").unwrap();
        assert!(ClassifierRules::from_file(file.path()).is_err());
    }

    #[test]
    fn test_default_class_table_prefers_plain_deny() {
        let rules = ClassifierRules::default();
        assert_eq!(rules.classes.get("DV2ControlHost"), Some(&ClassRule::Deny));
        assert_eq!(rules.classes.get("Shell_"), Some(&ClassRule::DenyToolWindow));
    }
}
