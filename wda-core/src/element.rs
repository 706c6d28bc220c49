//! Element records and query selectors.
//!
//! [`ElementInfo`] is the owned, COM-free snapshot handed to callers;
//! [`CompactElement`] is its abbreviated wire form for annotated-capture
//! responses (short keys, nulls dropped).  [`ElementQuery`] is the selector
//! every element-bearing operation accepts.

use regex::Regex;
use serde::Serialize;

use crate::errors::WdaError;
use crate::geometry::Rect;

/// UIA toggle state, as reported by checkable controls.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ToggleState {
    Off,
    On,
    Indeterminate,
}

impl ToggleState {
    pub fn from_raw(raw: i32) -> Self {
        match raw {
            1 => Self::On,
            2 => Self::Indeterminate,
            _ => Self::Off,
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "on" | "checked" | "true" => Some(Self::On),
            "off" | "unchecked" | "false" => Some(Self::Off),
            "indeterminate" => Some(Self::Indeterminate),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Off => "off",
            Self::On => "on",
            Self::Indeterminate => "indeterminate",
        }
    }
}

/// Owned snapshot of one UIA element.
///
/// `bounds` is in virtual-screen logical coordinates; `monitor_bounds` is
/// the same rectangle relative to its monitor's origin.  `clickable_point`
/// is `[x, y, monitor_index]`.
#[derive(Debug, Clone, Serialize)]
pub struct ElementInfo {
    pub id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub automation_id: Option<String>,
    pub name: String,
    pub control_type: String,
    pub bounds: Rect,
    pub monitor_bounds: Rect,
    pub monitor_index: usize,
    pub clickable_point: [i32; 3],
    pub patterns: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub value: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub toggle_state: Option<ToggleState>,
    pub is_enabled: bool,
    pub is_offscreen: bool,
}

/// Abbreviated wire form for annotated-capture responses.
#[derive(Debug, Clone, Serialize)]
pub struct CompactElement {
    pub index: usize,
    pub name: String,
    #[serde(rename = "type")]
    pub control_type: String,
    pub id: String,
    pub click: [i32; 3],
    #[serde(skip_serializing_if = "Option::is_none")]
    pub automation_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub value: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub toggle_state: Option<ToggleState>,
}

impl CompactElement {
    /// Build the wire form, assigning the 1-based badge index.
    pub fn from_info(index: usize, info: &ElementInfo) -> Self {
        Self {
            index,
            name: info.name.clone(),
            control_type: info.control_type.clone(),
            id: info.id.clone(),
            click: info.clickable_point,
            automation_id: info.automation_id.clone(),
            value: info.value.clone(),
            toggle_state: info.toggle_state,
        }
    }
}

/// Default and hard caps on matches returned by one `find`.
pub const DEFAULT_FIND_LIMIT: usize = 20;
pub const MAX_FIND_LIMIT: usize = 100;

/// Selector for element-bearing operations.  All fields optional; an empty
/// query matches every element under the resolved root.
#[derive(Debug, Clone, Default)]
pub struct ElementQuery {
    /// Scope the search to this window; foreground window when absent.
    pub window_handle: Option<isize>,
    /// Search below a previously returned element instead of the window root.
    pub parent_element_id: Option<String>,
    /// Exact match on AutomationId.
    pub automation_id: Option<String>,
    /// Exact match on name.
    pub name: Option<String>,
    /// Case-insensitive substring match on name.
    pub name_contains: Option<String>,
    /// Regex match on name.
    pub name_pattern: Option<String>,
    /// Exact match on control type (e.g. "Button").
    pub control_type: Option<String>,
    /// 1-based index into the match list.
    pub found_index: Option<usize>,
    /// Maximum matches returned (clamped to [`MAX_FIND_LIMIT`]).
    pub max_results: Option<usize>,
    /// Order matches by decreasing bounding-rectangle area.
    pub sort_by_prominence: bool,
    pub timeout_ms: Option<u64>,
}

impl ElementQuery {
    pub fn compile(&self) -> Result<CompiledQuery, WdaError> {
        let pattern = match &self.name_pattern {
            None => None,
            Some(p) => Some(Regex::new(p).map_err(|e| {
                WdaError::InvalidRegex(format!("name_pattern {p:?} failed to compile: {e}"))
            })?),
        };
        Ok(CompiledQuery {
            automation_id: self.automation_id.clone(),
            name: self.name.clone(),
            name_contains: self.name_contains.as_deref().map(str::to_lowercase),
            pattern,
            control_type: self.control_type.clone(),
        })
    }

    /// Whether the query carries any property criterion at all.
    pub fn has_criteria(&self) -> bool {
        self.automation_id.is_some()
            || self.name.is_some()
            || self.name_contains.is_some()
            || self.name_pattern.is_some()
            || self.control_type.is_some()
    }
}

/// Pre-compiled match criteria, checked in the fixed precedence order:
/// exact name, automation id, name substring, name regex.
#[derive(Debug)]
pub struct CompiledQuery {
    automation_id: Option<String>,
    name: Option<String>,
    name_contains: Option<String>,
    pattern: Option<Regex>,
    control_type: Option<String>,
}

impl CompiledQuery {
    /// Whether an element with these properties satisfies every provided
    /// criterion.
    pub fn matches(&self, name: &str, automation_id: &str, control_type: &str) -> bool {
        if let Some(expected) = &self.name {
            if name != expected {
                return false;
            }
        }
        if let Some(expected) = &self.automation_id {
            if automation_id != expected {
                return false;
            }
        }
        if let Some(needle) = &self.name_contains {
            if !name.to_lowercase().contains(needle) {
                return false;
            }
        }
        if let Some(pattern) = &self.pattern {
            if !pattern.is_match(name) {
                return false;
            }
        }
        if let Some(expected) = &self.control_type {
            if control_type != expected {
                return false;
            }
        }
        true
    }

    pub fn control_type(&self) -> Option<&str> {
        self.control_type.as_deref()
    }
}

/// Apply prominence sorting, `found_index`, and the result cap to a match
/// list.  `area` extracts the bounding-rectangle area used for prominence
/// ordering, so callers can carry matches paired with live references.
pub fn select_matches<T>(
    mut matches: Vec<T>,
    sort_by_prominence: bool,
    found_index: Option<usize>,
    max_results: Option<usize>,
    area: impl Fn(&T) -> i64,
) -> Vec<T> {
    if sort_by_prominence {
        matches.sort_by_key(|e| std::cmp::Reverse(area(e)));
    }

    let start = found_index.map(|i| i.saturating_sub(1)).unwrap_or(0);
    let cap = max_results
        .unwrap_or(DEFAULT_FIND_LIMIT)
        .clamp(1, MAX_FIND_LIMIT);

    if start >= matches.len() {
        return Vec::new();
    }
    matches.drain(..start);
    matches.truncate(cap);
    matches
}

/// Row tolerance for reading-order numbering, in logical pixels.
const ROW_TOLERANCE: i32 = 16;

/// Sort elements top-to-bottom, then left-to-right within a row.
///
/// Elements whose clickable points are within [`ROW_TOLERANCE`] vertical
/// pixels of a row's anchor belong to that row.
pub fn sort_reading_order(elements: &mut [ElementInfo]) {
    elements.sort_by_key(|e| (e.clickable_point[1], e.clickable_point[0]));

    let mut start = 0;
    while start < elements.len() {
        let row_y = elements[start].clickable_point[1];
        let mut end = start + 1;
        while end < elements.len() && elements[end].clickable_point[1] - row_y <= ROW_TOLERANCE {
            end += 1;
        }
        elements[start..end].sort_by_key(|e| e.clickable_point[0]);
        start = end;
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    fn info(id: &str, name: &str, bounds: Rect, click: [i32; 3]) -> ElementInfo {
        ElementInfo {
            id: id.into(),
            automation_id: None,
            name: name.into(),
            control_type: "Button".into(),
            bounds,
            monitor_bounds: bounds,
            monitor_index: 0,
            clickable_point: click,
            patterns: vec!["Invoke".into()],
            value: None,
            toggle_state: None,
            is_enabled: true,
            is_offscreen: false,
        }
    }

    #[test]
    fn toggle_state_round_trip() {
        assert_eq!(ToggleState::from_raw(0), ToggleState::Off);
        assert_eq!(ToggleState::from_raw(1), ToggleState::On);
        assert_eq!(ToggleState::from_raw(2), ToggleState::Indeterminate);
        assert_eq!(ToggleState::parse("on"), Some(ToggleState::On));
        assert_eq!(ToggleState::parse("OFF"), Some(ToggleState::Off));
        assert_eq!(ToggleState::parse("maybe"), None);
        assert_eq!(ToggleState::On.as_str(), "on");
    }

    #[test]
    fn compact_element_uses_short_keys_and_drops_nulls() {
        let e = info("7", "OK", Rect::new(10, 10, 110, 40), [60, 25, 0]);
        let compact = CompactElement::from_info(1, &e);
        let json = serde_json::to_string(&compact).unwrap();
        assert!(json.contains("\"type\":\"Button\""));
        assert!(json.contains("\"click\":[60,25,0]"));
        assert!(!json.contains("automation_id"));
        assert!(!json.contains("toggle_state"));
    }

    #[test]
    fn compact_element_keeps_present_optionals() {
        let mut e = info("7", "Dark mode", Rect::new(0, 0, 10, 10), [5, 5, 0]);
        e.toggle_state = Some(ToggleState::On);
        let json = serde_json::to_string(&CompactElement::from_info(3, &e)).unwrap();
        assert!(json.contains("\"toggle_state\":\"on\""));
        assert!(json.contains("\"index\":3"));
    }

    #[test]
    fn query_criteria_are_anded() {
        let q = ElementQuery {
            name_contains: Some("save".into()),
            control_type: Some("Button".into()),
            ..Default::default()
        };
        let c = q.compile().unwrap();
        assert!(c.matches("Don't Save", "", "Button"));
        assert!(!c.matches("Don't Save", "", "MenuItem"));
        assert!(!c.matches("Cancel", "", "Button"));
    }

    #[test]
    fn exact_name_beats_substring_semantics() {
        let q = ElementQuery {
            name: Some("Save".into()),
            ..Default::default()
        };
        let c = q.compile().unwrap();
        assert!(c.matches("Save", "", "Button"));
        assert!(!c.matches("Save As", "", "Button"));
    }

    #[test]
    fn name_pattern_compiles_and_matches() {
        let q = ElementQuery {
            name_pattern: Some(r"^Item \d+$".into()),
            ..Default::default()
        };
        let c = q.compile().unwrap();
        assert!(c.matches("Item 42", "", "ListItem"));
        assert!(!c.matches("Item forty-two", "", "ListItem"));
    }

    #[test]
    fn bad_regex_is_invalid_regex() {
        let q = ElementQuery {
            name_pattern: Some("(unclosed".into()),
            ..Default::default()
        };
        assert!(matches!(q.compile(), Err(WdaError::InvalidRegex(_))));
    }

    #[test]
    fn empty_query_matches_everything() {
        let q = ElementQuery::default();
        assert!(!q.has_criteria());
        let c = q.compile().unwrap();
        assert!(c.matches("anything", "any_id", "Pane"));
    }

    #[test]
    fn select_matches_applies_found_index_and_cap() {
        let matches: Vec<ElementInfo> = (0..10)
            .map(|i| {
                info(
                    &i.to_string(),
                    "x",
                    Rect::new(0, 0, 10, 10),
                    [5, 5, 0],
                )
            })
            .collect();

        let picked = select_matches(matches.clone(), false, Some(3), Some(2), |e| {
            e.bounds.area()
        });
        assert_eq!(picked.len(), 2);
        assert_eq!(picked[0].id, "2");

        let out_of_range = select_matches(matches, false, Some(11), None, |e| e.bounds.area());
        assert!(out_of_range.is_empty());
    }

    #[test]
    fn prominence_orders_by_area_descending() {
        let matches = vec![
            info("small", "x", Rect::new(0, 0, 10, 10), [5, 5, 0]),
            info("large", "x", Rect::new(0, 0, 100, 100), [50, 50, 0]),
            info("medium", "x", Rect::new(0, 0, 50, 50), [25, 25, 0]),
        ];
        let picked = select_matches(matches, true, None, None, |e| e.bounds.area());
        assert_eq!(picked[0].id, "large");
        assert_eq!(picked[2].id, "small");
    }

    #[test]
    fn reading_order_rows_then_columns() {
        let mut elements = vec![
            info("c", "x", Rect::default(), [300, 12, 0]),
            info("a", "x", Rect::default(), [10, 5, 0]),
            info("d", "x", Rect::default(), [10, 80, 0]),
            info("b", "x", Rect::default(), [150, 14, 0]),
        ];
        sort_reading_order(&mut elements);
        let ids: Vec<&str> = elements.iter().map(|e| e.id.as_str()).collect();
        // First row (y within tolerance of 5): a, b, c by x; then d.
        assert_eq!(ids, vec!["a", "b", "c", "d"]);
    }
}
