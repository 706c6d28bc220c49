//! UI Automation plumbing.
//!
//! Control-type taxonomy, pattern probing, framework detection, and the
//! breadth-first tree walk every query runs on.  Everything here executes
//! on the automation worker thread; COM references never escape except
//! through the element registry.

use std::collections::VecDeque;

use serde::Serialize;
use windows::core::Interface;
use windows::Win32::UI::Accessibility::{
    IUIAutomation, IUIAutomationElement, IUIAutomationTreeWalker, UIA_CONTROLTYPE_ID,
    UIA_PATTERN_ID,
};
use windows::Win32::UI::Accessibility::{
    UIA_AppBarControlTypeId, UIA_ButtonControlTypeId, UIA_CalendarControlTypeId,
    UIA_CheckBoxControlTypeId, UIA_ComboBoxControlTypeId, UIA_CustomControlTypeId,
    UIA_DataGridControlTypeId, UIA_DataItemControlTypeId, UIA_DocumentControlTypeId,
    UIA_EditControlTypeId, UIA_ExpandCollapsePatternId, UIA_GroupControlTypeId,
    UIA_HeaderControlTypeId, UIA_HeaderItemControlTypeId, UIA_HyperlinkControlTypeId,
    UIA_ImageControlTypeId, UIA_InvokePatternId, UIA_LegacyIAccessiblePatternId,
    UIA_ListControlTypeId, UIA_ListItemControlTypeId, UIA_MenuBarControlTypeId,
    UIA_MenuControlTypeId, UIA_MenuItemControlTypeId, UIA_PaneControlTypeId,
    UIA_ProgressBarControlTypeId, UIA_RadioButtonControlTypeId, UIA_ScrollBarControlTypeId,
    UIA_ScrollItemPatternId, UIA_ScrollPatternId, UIA_SelectionItemPatternId,
    UIA_SelectionPatternId, UIA_SemanticZoomControlTypeId, UIA_SeparatorControlTypeId,
    UIA_SliderControlTypeId, UIA_SpinnerControlTypeId, UIA_SplitButtonControlTypeId,
    UIA_StatusBarControlTypeId, UIA_TabControlTypeId, UIA_TabItemControlTypeId,
    UIA_TableControlTypeId, UIA_TextControlTypeId, UIA_TextPatternId, UIA_ThumbControlTypeId,
    UIA_TitleBarControlTypeId, UIA_TogglePatternId, UIA_ToolBarControlTypeId,
    UIA_ToolTipControlTypeId, UIA_TreeControlTypeId, UIA_TreeItemControlTypeId,
    UIA_ValuePatternId, UIA_WindowControlTypeId,
};

use crate::errors::WdaError;
use crate::geometry::{Point, Rect};
use crate::wait::CancelToken;

/// Children cap per node, guarding against pathological trees (a grid with
/// 100k cells).
const MAX_CHILDREN_PER_NODE: usize = 512;

/// Total nodes visited per walk.
const MAX_VISITED: usize = 4_096;

// ---------------------------------------------------------------------------
// Control-type taxonomy
// ---------------------------------------------------------------------------

const CONTROL_TYPES: &[(i32, &str)] = &[
    (UIA_AppBarControlTypeId.0, "AppBar"),
    (UIA_ButtonControlTypeId.0, "Button"),
    (UIA_CalendarControlTypeId.0, "Calendar"),
    (UIA_CheckBoxControlTypeId.0, "CheckBox"),
    (UIA_ComboBoxControlTypeId.0, "ComboBox"),
    (UIA_CustomControlTypeId.0, "Custom"),
    (UIA_DataGridControlTypeId.0, "DataGrid"),
    (UIA_DataItemControlTypeId.0, "DataItem"),
    (UIA_DocumentControlTypeId.0, "Document"),
    (UIA_EditControlTypeId.0, "Edit"),
    (UIA_GroupControlTypeId.0, "Group"),
    (UIA_HeaderControlTypeId.0, "Header"),
    (UIA_HeaderItemControlTypeId.0, "HeaderItem"),
    (UIA_HyperlinkControlTypeId.0, "Hyperlink"),
    (UIA_ImageControlTypeId.0, "Image"),
    (UIA_ListControlTypeId.0, "List"),
    (UIA_ListItemControlTypeId.0, "ListItem"),
    (UIA_MenuBarControlTypeId.0, "MenuBar"),
    (UIA_MenuControlTypeId.0, "Menu"),
    (UIA_MenuItemControlTypeId.0, "MenuItem"),
    (UIA_PaneControlTypeId.0, "Pane"),
    (UIA_ProgressBarControlTypeId.0, "ProgressBar"),
    (UIA_RadioButtonControlTypeId.0, "RadioButton"),
    (UIA_ScrollBarControlTypeId.0, "ScrollBar"),
    (UIA_SemanticZoomControlTypeId.0, "SemanticZoom"),
    (UIA_SeparatorControlTypeId.0, "Separator"),
    (UIA_SliderControlTypeId.0, "Slider"),
    (UIA_SpinnerControlTypeId.0, "Spinner"),
    (UIA_SplitButtonControlTypeId.0, "SplitButton"),
    (UIA_StatusBarControlTypeId.0, "StatusBar"),
    (UIA_TabControlTypeId.0, "Tab"),
    (UIA_TabItemControlTypeId.0, "TabItem"),
    (UIA_TableControlTypeId.0, "Table"),
    (UIA_TextControlTypeId.0, "Text"),
    (UIA_ThumbControlTypeId.0, "Thumb"),
    (UIA_TitleBarControlTypeId.0, "TitleBar"),
    (UIA_ToolBarControlTypeId.0, "ToolBar"),
    (UIA_ToolTipControlTypeId.0, "ToolTip"),
    (UIA_TreeControlTypeId.0, "Tree"),
    (UIA_TreeItemControlTypeId.0, "TreeItem"),
    (UIA_WindowControlTypeId.0, "Window"),
];

/// Map a UIA control-type id to its taxonomy name.
pub fn control_type_name(id: UIA_CONTROLTYPE_ID) -> &'static str {
    CONTROL_TYPES
        .iter()
        .find(|(raw, _)| *raw == id.0)
        .map(|(_, name)| *name)
        .unwrap_or("Unknown")
}

/// Map a taxonomy name back to its control-type id.
pub fn control_type_id(name: &str) -> Option<UIA_CONTROLTYPE_ID> {
    CONTROL_TYPES
        .iter()
        .find(|(_, n)| *n == name)
        .map(|(raw, _)| UIA_CONTROLTYPE_ID(*raw))
}

// ---------------------------------------------------------------------------
// Pattern probing
// ---------------------------------------------------------------------------

/// Patterns surfaced in `ElementInfo::patterns`, probed in this order.
pub const PATTERN_PROBES: &[(i32, &str)] = &[
    (UIA_InvokePatternId.0, "Invoke"),
    (UIA_ValuePatternId.0, "Value"),
    (UIA_TogglePatternId.0, "Toggle"),
    (UIA_SelectionPatternId.0, "Selection"),
    (UIA_SelectionItemPatternId.0, "SelectionItem"),
    (UIA_ExpandCollapsePatternId.0, "ExpandCollapse"),
    (UIA_ScrollPatternId.0, "Scroll"),
    (UIA_ScrollItemPatternId.0, "ScrollItem"),
    (UIA_TextPatternId.0, "Text"),
    (UIA_LegacyIAccessiblePatternId.0, "LegacyIAccessible"),
];

/// Names of every pattern the element currently supports.
pub fn probe_patterns(element: &IUIAutomationElement) -> Vec<String> {
    let mut patterns = Vec::new();
    for &(id, name) in PATTERN_PROBES {
        let supported = unsafe { element.GetCurrentPattern(UIA_PATTERN_ID(id)) }.is_ok();
        if supported {
            patterns.push(name.to_owned());
        }
    }
    patterns
}

/// Fetch a typed pattern interface, or `None` when unsupported.
pub fn pattern<P: Interface>(element: &IUIAutomationElement, id: i32) -> Option<P> {
    unsafe { element.GetCurrentPattern(UIA_PATTERN_ID(id)) }
        .ok()
        .and_then(|p| p.cast::<P>().ok())
}

// ---------------------------------------------------------------------------
// Framework detection
// ---------------------------------------------------------------------------

/// UI framework behind a window, detected from the root element.
///
/// The framework picks the default search depth: web-derived trees
/// (Electron/Chromium) nest far deeper than classic Win32 dialogs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Framework {
    Electron,
    WinUi,
    Wpf,
    Win32,
}

impl Framework {
    /// Detect from the root's class name and UIA framework id.
    pub fn detect(class_name: &str, framework_id: &str) -> Self {
        let fw = framework_id.to_ascii_lowercase();
        if class_name.starts_with("Chrome_WidgetWin") || fw == "chrome" {
            return Self::Electron;
        }
        if fw == "xaml"
            || class_name == "Windows.UI.Core.CoreWindow"
            || class_name == "ApplicationFrameWindow"
            || class_name == "WinUIDesktopWin32WindowClass"
        {
            return Self::WinUi;
        }
        if fw == "wpf" || class_name.starts_with("HwndWrapper") {
            return Self::Wpf;
        }
        Self::Win32
    }

    /// Default maximum walk depth for this framework.
    pub fn default_depth(&self) -> usize {
        match self {
            Self::Electron => 45,
            Self::WinUi => 35,
            Self::Wpf => 30,
            Self::Win32 => 20,
        }
    }
}

// ---------------------------------------------------------------------------
// Element property reads
// ---------------------------------------------------------------------------

pub fn element_name(element: &IUIAutomationElement) -> String {
    unsafe { element.CurrentName() }
        .map(|b| b.to_string())
        .unwrap_or_default()
}

pub fn element_automation_id(element: &IUIAutomationElement) -> String {
    unsafe { element.CurrentAutomationId() }
        .map(|b| b.to_string())
        .unwrap_or_default()
}

pub fn element_class_name(element: &IUIAutomationElement) -> String {
    unsafe { element.CurrentClassName() }
        .map(|b| b.to_string())
        .unwrap_or_default()
}

pub fn element_framework_id(element: &IUIAutomationElement) -> String {
    unsafe { element.CurrentFrameworkId() }
        .map(|b| b.to_string())
        .unwrap_or_default()
}

pub fn element_control_type(element: &IUIAutomationElement) -> String {
    unsafe { element.CurrentControlType() }
        .map(|id| control_type_name(id).to_owned())
        .unwrap_or_else(|_| "Unknown".to_owned())
}

pub fn element_bounds(element: &IUIAutomationElement) -> Rect {
    unsafe { element.CurrentBoundingRectangle() }
        .map(Rect::from)
        .unwrap_or_default()
}

pub fn element_is_enabled(element: &IUIAutomationElement) -> bool {
    unsafe { element.CurrentIsEnabled() }
        .map(|b| b.as_bool())
        .unwrap_or(false)
}

pub fn element_is_offscreen(element: &IUIAutomationElement) -> bool {
    unsafe { element.CurrentIsOffscreen() }
        .map(|b| b.as_bool())
        .unwrap_or(false)
}

/// The default click target: center of the visible part of the bounds.
///
/// When the element is clipped by the virtual screen, the center of the
/// visible intersection keeps the point on-screen; a fully off-screen
/// element falls back to its geometric center.
pub fn clickable_point(bounds: &Rect, visible_area: &Rect) -> Point {
    match bounds.intersect(visible_area) {
        Some(visible) => visible.center(),
        None => bounds.center(),
    }
}

// ---------------------------------------------------------------------------
// Tree walking
// ---------------------------------------------------------------------------

/// Children of a node in control view, capped at [`MAX_CHILDREN_PER_NODE`].
pub fn children_of(
    walker: &IUIAutomationTreeWalker,
    parent: &IUIAutomationElement,
) -> Vec<IUIAutomationElement> {
    let mut children = Vec::new();

    let mut current = match unsafe { walker.GetFirstChildElement(parent) } {
        Ok(c) => c,
        Err(_) => return children,
    };

    loop {
        children.push(current.clone());
        if children.len() >= MAX_CHILDREN_PER_NODE {
            break;
        }
        current = match unsafe { walker.GetNextSiblingElement(&current) } {
            Ok(next) => next,
            Err(_) => break,
        };
    }
    children
}

/// Breadth-first walk from `root`, invoking `visit` on every element.
///
/// `visit` returns `true` to keep walking or `false` to stop early (used
/// by `find` once enough matches accumulated).  Cancellation is checked at
/// each depth boundary.  Returns the deepest level actually reached.
pub fn walk_breadth_first<F>(
    uia: &IUIAutomation,
    root: &IUIAutomationElement,
    max_depth: usize,
    cancel: &CancelToken,
    mut visit: F,
) -> Result<usize, WdaError>
where
    F: FnMut(&IUIAutomationElement, usize) -> bool,
{
    let walker = unsafe { uia.ControlViewWalker() }
        .map_err(|e| WdaError::SystemError(format!("ControlViewWalker: {e}")))?;

    let mut queue: VecDeque<(IUIAutomationElement, usize)> = VecDeque::new();
    queue.push_back((root.clone(), 0));

    let mut visited = 0usize;
    let mut deepest = 0usize;
    let mut last_depth = 0usize;

    while let Some((element, depth)) = queue.pop_front() {
        if depth != last_depth {
            cancel.check("tree walk")?;
            last_depth = depth;
        }

        visited += 1;
        deepest = deepest.max(depth);

        if !visit(&element, depth) {
            break;
        }

        if visited >= MAX_VISITED {
            log::warn!("tree walk hit the {MAX_VISITED}-node cap; results may be partial");
            break;
        }

        if depth < max_depth {
            for child in children_of(&walker, &element) {
                queue.push_back((child, depth + 1));
            }
        }
    }

    Ok(deepest)
}

// ---------------------------------------------------------------------------
// Tree snapshots (get_tree)
// ---------------------------------------------------------------------------

/// Owned snapshot of one node for exploratory tree dumps.
#[derive(Debug, Clone, Serialize)]
pub struct TreeNode {
    pub name: String,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub automation_id: String,
    pub control_type: String,
    pub bounds: Rect,
    pub is_enabled: bool,
    pub is_offscreen: bool,
    pub depth: usize,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub children: Vec<TreeNode>,
}

/// Walk diagnostics attached to every tree dump.
#[derive(Debug, Clone, Serialize)]
pub struct TreeDiagnostics {
    pub framework: Framework,
    pub max_depth: usize,
    pub depth_reached: usize,
    pub node_count: usize,
}

/// Depth-first snapshot of a subtree, with the same node caps as the
/// breadth-first walk.
pub fn snapshot_tree(
    uia: &IUIAutomation,
    root: &IUIAutomationElement,
    max_depth: usize,
    control_type_filter: Option<&str>,
    cancel: &CancelToken,
) -> Result<(TreeNode, usize, usize), WdaError> {
    let walker = unsafe { uia.ControlViewWalker() }
        .map_err(|e| WdaError::SystemError(format!("ControlViewWalker: {e}")))?;

    let mut count = 0usize;
    let mut deepest = 0usize;
    let node = snapshot_node(
        &walker,
        root,
        0,
        max_depth,
        control_type_filter,
        cancel,
        &mut count,
        &mut deepest,
    )?;
    Ok((node, deepest, count))
}

#[allow(clippy::too_many_arguments)]
fn snapshot_node(
    walker: &IUIAutomationTreeWalker,
    element: &IUIAutomationElement,
    depth: usize,
    max_depth: usize,
    control_type_filter: Option<&str>,
    cancel: &CancelToken,
    count: &mut usize,
    deepest: &mut usize,
) -> Result<TreeNode, WdaError> {
    cancel.check("tree snapshot")?;

    *count += 1;
    *deepest = (*deepest).max(depth);

    let mut children = Vec::new();
    if depth < max_depth && *count < MAX_VISITED {
        for child in children_of(walker, element) {
            if *count >= MAX_VISITED {
                break;
            }
            let node = snapshot_node(
                walker,
                &child,
                depth + 1,
                max_depth,
                control_type_filter,
                cancel,
                count,
                deepest,
            )?;
            // The filter keeps matching nodes and any ancestor of one.
            let keep = match control_type_filter {
                None => true,
                Some(filter) => node.control_type == filter || !node.children.is_empty(),
            };
            if keep {
                children.push(node);
            }
        }
    }

    Ok(TreeNode {
        name: element_name(element),
        automation_id: element_automation_id(element),
        control_type: element_control_type(element),
        bounds: element_bounds(element),
        is_enabled: element_is_enabled(element),
        is_offscreen: element_is_offscreen(element),
        depth,
        children,
    })
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn control_type_tables_are_inverse() {
        for &(raw, name) in CONTROL_TYPES {
            assert_eq!(control_type_id(name), Some(UIA_CONTROLTYPE_ID(raw)));
            assert_eq!(control_type_name(UIA_CONTROLTYPE_ID(raw)), name);
        }
    }

    #[test]
    fn unknown_control_types() {
        assert_eq!(control_type_name(UIA_CONTROLTYPE_ID(0)), "Unknown");
        assert_eq!(control_type_id("Gizmo"), None);
        assert_eq!(control_type_id(""), None);
    }

    #[test]
    fn framework_detection() {
        assert_eq!(
            Framework::detect("Chrome_WidgetWin_1", "Chrome"),
            Framework::Electron
        );
        assert_eq!(
            Framework::detect("ApplicationFrameWindow", ""),
            Framework::WinUi
        );
        assert_eq!(
            Framework::detect("HwndWrapper[App.exe;;abc]", "WPF"),
            Framework::Wpf
        );
        assert_eq!(Framework::detect("Notepad", "Win32"), Framework::Win32);
        assert_eq!(Framework::detect("", ""), Framework::Win32);
    }

    #[test]
    fn framework_depths_deepen_for_web_trees() {
        assert!(Framework::Electron.default_depth() > Framework::Win32.default_depth());
        assert!(Framework::WinUi.default_depth() > Framework::Win32.default_depth());
    }

    #[test]
    fn clickable_point_is_visible_center() {
        let screen = Rect::new(0, 0, 1920, 1080);

        let fully_visible = Rect::new(100, 100, 200, 140);
        assert_eq!(
            clickable_point(&fully_visible, &screen),
            fully_visible.center()
        );

        // Clipped at the screen edge: the point stays on-screen.
        let clipped = Rect::new(1900, 100, 2100, 140);
        let p = clickable_point(&clipped, &screen);
        assert!(screen.contains(p));
        assert_eq!(p.x, 1910);

        // Fully off-screen falls back to the geometric center.
        let offscreen = Rect::new(3000, 100, 3100, 140);
        assert_eq!(clickable_point(&offscreen, &screen), offscreen.center());
    }

    #[test]
    fn pattern_probe_table_covers_known_patterns() {
        let names: Vec<&str> = PATTERN_PROBES.iter().map(|(_, n)| *n).collect();
        for expected in [
            "Invoke",
            "Value",
            "Toggle",
            "Selection",
            "SelectionItem",
            "ExpandCollapse",
            "Scroll",
            "Text",
            "LegacyIAccessible",
        ] {
            assert!(names.contains(&expected), "missing {expected}");
        }
    }
}
