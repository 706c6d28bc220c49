//! UI Automation operations.
//!
//! Every operation here runs its UIA work on the automation worker
//! ([`crate::worker`]), which owns the single-threaded apartment, the
//! `IUIAutomation` instance, and the element registry.  Results cross back
//! as owned snapshots; live COM references never leave the worker.
//!
//! The input and capture services are reached directly as fallbacks:
//! pattern-less clicks degrade to synthesized mouse input, and annotated
//! capture feeds element geometry into the capture pipeline.

use std::sync::Arc;
use std::time::Duration;

use serde::Serialize;
use windows::core::BSTR;
use windows::Win32::System::Com::{CoCreateInstance, CLSCTX_INPROC_SERVER};
use windows::Win32::UI::Accessibility::{
    CUIAutomation, IUIAutomation, IUIAutomationElement, IUIAutomationExpandCollapsePattern,
    IUIAutomationInvokePattern, IUIAutomationLegacyIAccessiblePattern, IUIAutomationScrollItemPattern,
    IUIAutomationScrollPattern, IUIAutomationSelectionItemPattern, IUIAutomationTextPattern,
    IUIAutomationTogglePattern, IUIAutomationValuePattern, UIA_ExpandCollapsePatternId,
    UIA_InvokePatternId, UIA_LegacyIAccessiblePatternId, UIA_ScrollItemPatternId,
    UIA_ScrollPatternId, UIA_SelectionItemPatternId, UIA_TextPatternId, UIA_TogglePatternId,
    UIA_ValuePatternId,
};

use crate::capture::{
    draw_badge, CaptureRequest, CaptureService, CaptureTarget, OutputMode, ScreenshotResult,
};
use crate::com::ComGuard;
use crate::config::AutomationConfig;
use crate::element::{
    select_matches, sort_reading_order, CompactElement, ElementInfo, ElementQuery, ToggleState,
    MAX_FIND_LIMIT,
};
use crate::errors::WdaError;
use crate::geometry::{Point, Rect};
use crate::input::{InputService, MouseButton, TargetGuard};
use crate::monitors::{self, MonitorInfo};
use crate::native;
use crate::ocr::{self, OcrText};
use crate::registry::ElementRegistry;
use crate::uia::{self, Framework, TreeDiagnostics, TreeNode};
use crate::wait::{poll_until, CancelToken};
use crate::worker::{Worker, WorkerContext};

// ---------------------------------------------------------------------------
// Worker context
// ---------------------------------------------------------------------------

/// Everything the automation worker thread owns: the STA, the UIA root
/// object, and the live-element registry.
pub struct UiaContext {
    _com: ComGuard,
    uia: IUIAutomation,
    registry: ElementRegistry,
}

impl WorkerContext for UiaContext {
    fn create() -> Result<Self, WdaError> {
        let com = ComGuard::init_sta()?;
        let uia: IUIAutomation =
            unsafe { CoCreateInstance(&CUIAutomation, None, CLSCTX_INPROC_SERVER) }.map_err(
                |e| WdaError::SystemError(format!("CoCreateInstance(CUIAutomation) failed: {e}")),
            )?;
        Ok(Self {
            _com: com,
            uia,
            registry: ElementRegistry::new(),
        })
    }
}

// ---------------------------------------------------------------------------
// Result records
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize)]
pub struct ClickResult {
    pub element_id: String,
    /// Which path performed the click ("invoke", "select", "expand",
    /// "toggle", "default_action", "mouse_click", "mouse_double_click").
    pub action: &'static str,
}

#[derive(Debug, Clone, Serialize)]
pub struct TypeIntoResult {
    pub element_id: String,
    pub typed_units: usize,
    pub cleared: bool,
}

#[derive(Debug, Clone, Serialize)]
pub struct TextResult {
    pub element_id: String,
    pub text: String,
    /// Where the text came from ("value", "text_range", "name").
    pub source: &'static str,
}

#[derive(Debug, Clone, Serialize)]
pub struct ToggleResult {
    pub element_id: String,
    pub previous_state: ToggleState,
    pub current_state: ToggleState,
}

#[derive(Debug, Clone, Serialize)]
pub struct EnsureStateResult {
    pub element_id: String,
    pub previous_state: ToggleState,
    pub current_state: ToggleState,
    /// "toggled" or "already_in_state".
    pub action_taken: &'static str,
}

#[derive(Debug, Clone, Serialize)]
pub struct ScrollIntoViewResult {
    pub element_id: String,
    pub bounds: Rect,
}

#[derive(Debug, Clone, Serialize)]
pub struct TreeResult {
    pub tree: TreeNode,
    pub diagnostics: TreeDiagnostics,
}

#[derive(Debug, Clone, Serialize)]
pub struct AnnotatedCapture {
    pub elements: Vec<CompactElement>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub image: Option<ScreenshotResult>,
}

/// Desired element condition for `wait_for_state`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ElementCondition {
    Toggle(ToggleState),
    Enabled(bool),
    Visible(bool),
}

impl ElementCondition {
    pub fn parse(s: &str) -> Option<Self> {
        if let Some(t) = ToggleState::parse(s) {
            return Some(Self::Toggle(t));
        }
        match s.trim().to_ascii_lowercase().as_str() {
            "enabled" => Some(Self::Enabled(true)),
            "disabled" => Some(Self::Enabled(false)),
            "visible" => Some(Self::Visible(true)),
            "hidden" | "offscreen" => Some(Self::Visible(false)),
            _ => None,
        }
    }
}

/// Snapshot of the observable states `wait_for_state` polls.
#[derive(Debug, Clone, Copy, Serialize)]
pub struct ObservedState {
    pub toggle_state: Option<ToggleState>,
    pub is_enabled: bool,
    pub is_offscreen: bool,
}

impl ObservedState {
    fn satisfies(&self, condition: ElementCondition) -> bool {
        match condition {
            ElementCondition::Toggle(desired) => self.toggle_state == Some(desired),
            ElementCondition::Enabled(desired) => self.is_enabled == desired,
            ElementCondition::Visible(desired) => self.is_offscreen != desired,
        }
    }

    fn describe(&self) -> String {
        let mut parts = Vec::new();
        if let Some(t) = self.toggle_state {
            parts.push(t.as_str().to_owned());
        }
        parts.push(if self.is_enabled { "enabled" } else { "disabled" }.to_owned());
        parts.push(if self.is_offscreen { "offscreen" } else { "visible" }.to_owned());
        parts.join(", ")
    }
}

/// Interactable control types for annotated capture.
const INTERACTIVE_TYPES: &[&str] = &[
    "Button",
    "Edit",
    "ComboBox",
    "CheckBox",
    "RadioButton",
    "Hyperlink",
    "ListItem",
    "MenuItem",
    "TabItem",
    "SplitButton",
    "TreeItem",
];

const INTERACTIVE_PATTERNS: &[&str] = &["Invoke", "Toggle", "Value", "SelectionItem"];

fn is_interactable(info: &ElementInfo) -> bool {
    INTERACTIVE_TYPES.contains(&info.control_type.as_str())
        || info
            .patterns
            .iter()
            .any(|p| INTERACTIVE_PATTERNS.contains(&p.as_str()))
}

// ---------------------------------------------------------------------------
// Worker-side helpers
// ---------------------------------------------------------------------------

/// Build an owned element snapshot (id assigned by the caller after
/// registry insertion).
fn build_element_info(
    element: &IUIAutomationElement,
    mons: &[MonitorInfo],
    virtual_screen: &Rect,
) -> ElementInfo {
    let bounds = uia::element_bounds(element);
    let monitor_index = monitors::monitor_index_for_rect(mons, &bounds);
    let monitor_origin = mons
        .get(monitor_index)
        .map(|m| (m.bounds.left, m.bounds.top))
        .unwrap_or((0, 0));

    let click = uia::clickable_point(&bounds, virtual_screen);
    let patterns = uia::probe_patterns(element);

    let value = if patterns.iter().any(|p| p == "Value") {
        uia::pattern::<IUIAutomationValuePattern>(element, UIA_ValuePatternId.0)
            .and_then(|p| unsafe { p.CurrentValue() }.ok())
            .map(|b| b.to_string())
    } else {
        None
    };

    let toggle_state = if patterns.iter().any(|p| p == "Toggle") {
        uia::pattern::<IUIAutomationTogglePattern>(element, UIA_TogglePatternId.0)
            .and_then(|p| unsafe { p.CurrentToggleState() }.ok())
            .map(|s| ToggleState::from_raw(s.0))
    } else {
        None
    };

    let automation_id = uia::element_automation_id(element);

    ElementInfo {
        id: String::new(),
        automation_id: (!automation_id.is_empty()).then_some(automation_id),
        name: uia::element_name(element),
        control_type: uia::element_control_type(element),
        bounds,
        monitor_bounds: Rect::new(
            bounds.left - monitor_origin.0,
            bounds.top - monitor_origin.1,
            bounds.right - monitor_origin.0,
            bounds.bottom - monitor_origin.1,
        ),
        monitor_index,
        clickable_point: [click.x, click.y, monitor_index as i32],
        patterns,
        value,
        toggle_state,
        is_enabled: uia::element_is_enabled(element),
        is_offscreen: uia::element_is_offscreen(element),
    }
}

/// Resolve the query's search root: parent element, explicit window, or
/// the foreground window.  Returns the root and its owning window handle.
fn resolve_root(
    ctx: &mut UiaContext,
    query: &ElementQuery,
) -> Result<(IUIAutomationElement, isize), WdaError> {
    if let Some(parent_id) = &query.parent_element_id {
        let entry = ctx.registry.lookup(parent_id)?;
        return Ok((entry.element.clone(), entry.window));
    }

    let handle = match query.window_handle {
        Some(h) => h,
        None => {
            let fg = native::foreground_window();
            if fg.is_invalid() {
                return Err(WdaError::WindowNotFound(
                    "no foreground window to search".into(),
                ));
            }
            fg.0 as isize
        }
    };

    if !native::is_window(native::hwnd(handle)) {
        return Err(WdaError::InvalidHandle(format!(
            "{handle} does not refer to a window"
        )));
    }

    let root = unsafe { ctx.uia.ElementFromHandle(native::hwnd(handle)) }
        .map_err(|e| WdaError::WindowNotFound(format!("ElementFromHandle({handle}): {e}")))?;
    Ok((root, handle))
}

/// Worker-side find: resolve root, detect the framework, walk, match,
/// select, and register the survivors.
fn find_on_worker(
    ctx: &mut UiaContext,
    query: &ElementQuery,
    cancel: &CancelToken,
) -> Result<Vec<ElementInfo>, WdaError> {
    let compiled = query.compile()?;
    let (root, owner) = resolve_root(ctx, query)?;

    let framework = Framework::detect(
        &uia::element_class_name(&root),
        &uia::element_framework_id(&root),
    );
    let max_depth = framework.default_depth();

    let mons = monitors::list_monitors()?;
    let virtual_screen = monitors::virtual_screen(&mons);

    let mut matches: Vec<(IUIAutomationElement, ElementInfo)> = Vec::new();
    uia::walk_breadth_first(&ctx.uia, &root, max_depth, cancel, |element, _depth| {
        let name = uia::element_name(element);
        let automation_id = uia::element_automation_id(element);
        let control_type = uia::element_control_type(element);
        if compiled.matches(&name, &automation_id, &control_type) {
            let info = build_element_info(element, &mons, &virtual_screen);
            matches.push((element.clone(), info));
        }
        matches.len() < MAX_FIND_LIMIT
    })?;

    let selected = select_matches(
        matches,
        query.sort_by_prominence,
        query.found_index,
        query.max_results,
        |(_, info)| info.bounds.area(),
    );

    let UiaContext { uia, registry, .. } = ctx;
    Ok(selected
        .into_iter()
        .map(|(element, mut info)| {
            info.id = registry.insert(uia, element, owner);
            info
        })
        .collect())
}

/// How a click was (or still needs to be) performed.
enum ClickPlan {
    Done(&'static str),
    NeedsMouse(Point),
}

/// Pattern-first click on the worker; reports a mouse fallback point when
/// no pattern applies.
fn click_on_worker(ctx: &mut UiaContext, element_id: &str) -> Result<ClickPlan, WdaError> {
    let entry = ctx.registry.lookup(element_id)?;
    let element = entry.element.clone();

    if let Some(p) =
        uia::pattern::<IUIAutomationInvokePattern>(&element, UIA_InvokePatternId.0)
    {
        unsafe { p.Invoke() }
            .map_err(|e| WdaError::SystemError(format!("Invoke failed: {e}")))?;
        return Ok(ClickPlan::Done("invoke"));
    }
    if let Some(p) =
        uia::pattern::<IUIAutomationSelectionItemPattern>(&element, UIA_SelectionItemPatternId.0)
    {
        unsafe { p.Select() }
            .map_err(|e| WdaError::SystemError(format!("Select failed: {e}")))?;
        return Ok(ClickPlan::Done("select"));
    }
    if let Some(p) = uia::pattern::<IUIAutomationExpandCollapsePattern>(
        &element,
        UIA_ExpandCollapsePatternId.0,
    ) {
        unsafe { p.Expand() }
            .map_err(|e| WdaError::SystemError(format!("Expand failed: {e}")))?;
        return Ok(ClickPlan::Done("expand"));
    }
    if let Some(p) = uia::pattern::<IUIAutomationTogglePattern>(&element, UIA_TogglePatternId.0) {
        unsafe { p.Toggle() }
            .map_err(|e| WdaError::SystemError(format!("Toggle failed: {e}")))?;
        return Ok(ClickPlan::Done("toggle"));
    }
    if let Some(p) = uia::pattern::<IUIAutomationLegacyIAccessiblePattern>(
        &element,
        UIA_LegacyIAccessiblePatternId.0,
    ) {
        if unsafe { p.DoDefaultAction() }.is_ok() {
            return Ok(ClickPlan::Done("default_action"));
        }
    }

    let bounds = uia::element_bounds(&element);
    let point = uia::clickable_point(&bounds, &native::virtual_screen_rect());
    Ok(ClickPlan::NeedsMouse(point))
}

fn toggle_on_worker(ctx: &mut UiaContext, element_id: &str) -> Result<ToggleResult, WdaError> {
    let entry = ctx.registry.lookup(element_id)?;
    let element = entry.element.clone();

    let pattern = uia::pattern::<IUIAutomationTogglePattern>(&element, UIA_TogglePatternId.0)
        .ok_or_else(|| {
            WdaError::PatternNotSupported(format!(
                "element {element_id} does not support the Toggle pattern"
            ))
        })?;

    let previous = unsafe { pattern.CurrentToggleState() }
        .map(|s| ToggleState::from_raw(s.0))
        .map_err(|e| WdaError::SystemError(format!("reading toggle state failed: {e}")))?;
    unsafe { pattern.Toggle() }
        .map_err(|e| WdaError::SystemError(format!("Toggle failed: {e}")))?;
    let current = unsafe { pattern.CurrentToggleState() }
        .map(|s| ToggleState::from_raw(s.0))
        .unwrap_or(previous);

    Ok(ToggleResult {
        element_id: element_id.to_owned(),
        previous_state: previous,
        current_state: current,
    })
}

fn observe_state_on_worker(
    ctx: &mut UiaContext,
    element_id: &str,
) -> Result<ObservedState, WdaError> {
    let entry = ctx.registry.lookup(element_id)?;
    let element = entry.element.clone();

    let toggle_state =
        uia::pattern::<IUIAutomationTogglePattern>(&element, UIA_TogglePatternId.0)
            .and_then(|p| unsafe { p.CurrentToggleState() }.ok())
            .map(|s| ToggleState::from_raw(s.0));

    Ok(ObservedState {
        toggle_state,
        is_enabled: uia::element_is_enabled(&element),
        is_offscreen: uia::element_is_offscreen(&element),
    })
}

// ---------------------------------------------------------------------------
// Service
// ---------------------------------------------------------------------------

/// The automation (UIA) service.  Thread-safe; all UIA work funnels
/// through the single worker.
pub struct AutomationService {
    worker: Arc<Worker<UiaContext>>,
    input: Arc<InputService>,
    capture: Arc<CaptureService>,
    config: AutomationConfig,
}

impl AutomationService {
    pub fn new(
        worker: Arc<Worker<UiaContext>>,
        input: Arc<InputService>,
        capture: Arc<CaptureService>,
        config: AutomationConfig,
    ) -> Self {
        Self {
            worker,
            input,
            capture,
            config,
        }
    }

    fn op_timeout(&self, timeout_ms: Option<u64>) -> Duration {
        Duration::from_millis(timeout_ms.unwrap_or(self.config.operation_timeout_ms))
    }

    fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.config.poll_interval_ms)
    }

    /// Find elements matching a query.  Zero matches is a successful empty
    /// list; `wait_for` is the retrying variant.
    pub fn find(
        &self,
        query: &ElementQuery,
        cancel: &CancelToken,
    ) -> Result<Vec<ElementInfo>, WdaError> {
        let query = query.clone();
        let token = cancel.clone();
        self.worker
            .submit(self.op_timeout(query.timeout_ms), cancel, move |ctx| {
                find_on_worker(ctx, &query, &token)
            })
    }

    /// Click an element, preferring UIA patterns and degrading to a
    /// synthesized mouse click at its clickable point.
    pub fn click(&self, element_id: &str, cancel: &CancelToken) -> Result<ClickResult, WdaError> {
        let id = element_id.to_owned();
        let plan = self
            .worker
            .submit(self.op_timeout(None), cancel, move |ctx| {
                click_on_worker(ctx, &id)
            })?;

        match plan {
            ClickPlan::Done(action) => Ok(ClickResult {
                element_id: element_id.to_owned(),
                action,
            }),
            ClickPlan::NeedsMouse(point) => {
                self.input
                    .click(point, MouseButton::Left, &TargetGuard::default())?;
                Ok(ClickResult {
                    element_id: element_id.to_owned(),
                    action: "mouse_click",
                })
            }
        }
    }

    /// `invoke` is `click` without the mouse fallback: the element must
    /// expose an invocable pattern.
    pub fn invoke(&self, element_id: &str, cancel: &CancelToken) -> Result<ClickResult, WdaError> {
        let id = element_id.to_owned();
        let plan = self
            .worker
            .submit(self.op_timeout(None), cancel, move |ctx| {
                click_on_worker(ctx, &id)
            })?;

        match plan {
            ClickPlan::Done(action) => Ok(ClickResult {
                element_id: element_id.to_owned(),
                action,
            }),
            ClickPlan::NeedsMouse(_) => Err(WdaError::PatternNotSupported(format!(
                "element {element_id} exposes no invocable pattern"
            ))),
        }
    }

    pub fn double_click(
        &self,
        element_id: &str,
        cancel: &CancelToken,
    ) -> Result<ClickResult, WdaError> {
        let id = element_id.to_owned();
        let plan = self
            .worker
            .submit(self.op_timeout(None), cancel, move |ctx| {
                let entry = ctx.registry.lookup(&id)?;
                let element = entry.element.clone();

                if let Some(p) =
                    uia::pattern::<IUIAutomationInvokePattern>(&element, UIA_InvokePatternId.0)
                {
                    unsafe { p.Invoke() }
                        .map_err(|e| WdaError::SystemError(format!("Invoke failed: {e}")))?;
                    unsafe { p.Invoke() }
                        .map_err(|e| WdaError::SystemError(format!("Invoke failed: {e}")))?;
                    return Ok(ClickPlan::Done("invoke"));
                }

                let bounds = uia::element_bounds(&element);
                Ok(ClickPlan::NeedsMouse(uia::clickable_point(
                    &bounds,
                    &native::virtual_screen_rect(),
                )))
            })?;

        match plan {
            ClickPlan::Done(action) => Ok(ClickResult {
                element_id: element_id.to_owned(),
                action,
            }),
            ClickPlan::NeedsMouse(point) => {
                self.input.double_click(point, &TargetGuard::default())?;
                Ok(ClickResult {
                    element_id: element_id.to_owned(),
                    action: "mouse_double_click",
                })
            }
        }
    }

    /// Focus the element, optionally clear its value, then type through
    /// the input service.
    pub fn type_into(
        &self,
        element_id: &str,
        text: &str,
        clear_first: bool,
        cancel: &CancelToken,
    ) -> Result<TypeIntoResult, WdaError> {
        let id = element_id.to_owned();
        let cleared = self
            .worker
            .submit(self.op_timeout(None), cancel, move |ctx| {
                let entry = ctx.registry.lookup(&id)?;
                let element = entry.element.clone();

                unsafe { element.SetFocus() }
                    .map_err(|e| WdaError::FocusFailed(format!("SetFocus failed: {e}")))?;

                if clear_first {
                    if let Some(p) =
                        uia::pattern::<IUIAutomationValuePattern>(&element, UIA_ValuePatternId.0)
                    {
                        unsafe { p.SetValue(&BSTR::from("")) }.map_err(|e| {
                            WdaError::SystemError(format!("clearing value failed: {e}"))
                        })?;
                        return Ok(true);
                    }
                }
                Ok(false)
            })?;

        let typed_units = self.input.type_text(text, &TargetGuard::default())?;
        Ok(TypeIntoResult {
            element_id: element_id.to_owned(),
            typed_units,
            cleared,
        })
    }

    pub fn focus(&self, element_id: &str, cancel: &CancelToken) -> Result<(), WdaError> {
        let id = element_id.to_owned();
        self.worker
            .submit(self.op_timeout(None), cancel, move |ctx| {
                let entry = ctx.registry.lookup(&id)?;
                unsafe { entry.element.SetFocus() }.map_err(|e| {
                    WdaError::FocusFailed(format!(
                        "SetFocus failed (cross-elevation refuses focus): {e}"
                    ))
                })
            })
    }

    /// Value pattern, then Text pattern range, then the accessible name.
    pub fn get_text(
        &self,
        element_id: &str,
        cancel: &CancelToken,
    ) -> Result<TextResult, WdaError> {
        let id = element_id.to_owned();
        self.worker
            .submit(self.op_timeout(None), cancel, move |ctx| {
                let entry = ctx.registry.lookup(&id)?;
                let element = entry.element.clone();

                if let Some(p) =
                    uia::pattern::<IUIAutomationValuePattern>(&element, UIA_ValuePatternId.0)
                {
                    if let Ok(value) = unsafe { p.CurrentValue() } {
                        return Ok(TextResult {
                            element_id: id.clone(),
                            text: value.to_string(),
                            source: "value",
                        });
                    }
                }

                if let Some(p) =
                    uia::pattern::<IUIAutomationTextPattern>(&element, UIA_TextPatternId.0)
                {
                    if let Ok(range) = unsafe { p.DocumentRange() } {
                        if let Ok(text) = unsafe { range.GetText(-1) } {
                            return Ok(TextResult {
                                element_id: id.clone(),
                                text: text.to_string(),
                                source: "text_range",
                            });
                        }
                    }
                }

                Ok(TextResult {
                    element_id: id.clone(),
                    text: uia::element_name(&element),
                    source: "name",
                })
            })
    }

    pub fn toggle(
        &self,
        element_id: &str,
        cancel: &CancelToken,
    ) -> Result<ToggleResult, WdaError> {
        let id = element_id.to_owned();
        self.worker
            .submit(self.op_timeout(None), cancel, move |ctx| {
                toggle_on_worker(ctx, &id)
            })
    }

    /// Atomic replacement for find-then-check-then-click: toggle only when
    /// the current state differs from `desired`.
    pub fn ensure_state(
        &self,
        element_id: &str,
        desired: ToggleState,
        cancel: &CancelToken,
    ) -> Result<EnsureStateResult, WdaError> {
        let id = element_id.to_owned();
        self.worker
            .submit(self.op_timeout(None), cancel, move |ctx| {
                let entry = ctx.registry.lookup(&id)?;
                let element = entry.element.clone();

                let pattern = uia::pattern::<IUIAutomationTogglePattern>(
                    &element,
                    UIA_TogglePatternId.0,
                )
                .ok_or_else(|| {
                    WdaError::PatternNotSupported(format!(
                        "element {id} does not support the Toggle pattern"
                    ))
                })?;

                let previous = unsafe { pattern.CurrentToggleState() }
                    .map(|s| ToggleState::from_raw(s.0))
                    .map_err(|e| {
                        WdaError::SystemError(format!("reading toggle state failed: {e}"))
                    })?;

                if previous == desired {
                    return Ok(EnsureStateResult {
                        element_id: id.clone(),
                        previous_state: previous,
                        current_state: previous,
                        action_taken: "already_in_state",
                    });
                }

                unsafe { pattern.Toggle() }
                    .map_err(|e| WdaError::SystemError(format!("Toggle failed: {e}")))?;
                let current = unsafe { pattern.CurrentToggleState() }
                    .map(|s| ToggleState::from_raw(s.0))
                    .unwrap_or(previous);

                Ok(EnsureStateResult {
                    element_id: id.clone(),
                    previous_state: previous,
                    current_state: current,
                    action_taken: "toggled",
                })
            })
    }

    /// Resolve a query to its first match, then ensure its toggle state.
    pub fn ensure_state_by_query(
        &self,
        query: &ElementQuery,
        desired: ToggleState,
        cancel: &CancelToken,
    ) -> Result<EnsureStateResult, WdaError> {
        let matches = self.find(query, cancel)?;
        let first = matches.into_iter().next().ok_or_else(|| {
            WdaError::ElementNotFound("no element matched the ensure_state query".into())
        })?;
        self.ensure_state(&first.id, desired, cancel)
    }

    /// Bring the element into its scroll container's viewport.
    pub fn scroll_into_view(
        &self,
        element_id: &str,
        cancel: &CancelToken,
    ) -> Result<ScrollIntoViewResult, WdaError> {
        let id = element_id.to_owned();
        self.worker
            .submit(self.op_timeout(None), cancel, move |ctx| {
                let entry = ctx.registry.lookup(&id)?;
                let element = entry.element.clone();

                // ScrollItem does the geometry for us when present.
                if let Some(p) = uia::pattern::<IUIAutomationScrollItemPattern>(
                    &element,
                    UIA_ScrollItemPatternId.0,
                ) {
                    unsafe { p.ScrollIntoView() }.map_err(|e| {
                        WdaError::SystemError(format!("ScrollIntoView failed: {e}"))
                    })?;
                    return Ok(ScrollIntoViewResult {
                        element_id: id.clone(),
                        bounds: uia::element_bounds(&element),
                    });
                }

                // Otherwise find the nearest scrollable ancestor and aim
                // its viewport at the element's rectangle.
                let walker = unsafe { ctx.uia.ControlViewWalker() }
                    .map_err(|e| WdaError::SystemError(format!("ControlViewWalker: {e}")))?;

                let mut ancestor = unsafe { walker.GetParentElement(&element) }.ok();
                while let Some(candidate) = ancestor {
                    if let Some(scroll) = uia::pattern::<IUIAutomationScrollPattern>(
                        &candidate,
                        UIA_ScrollPatternId.0,
                    ) {
                        let container = uia::element_bounds(&candidate);
                        let target = uia::element_bounds(&element);
                        let (h, v) = scroll_percentages(&container, &target);
                        unsafe { scroll.SetScrollPercent(h, v) }.map_err(|e| {
                            WdaError::SystemError(format!("SetScrollPercent failed: {e}"))
                        })?;
                        return Ok(ScrollIntoViewResult {
                            element_id: id.clone(),
                            bounds: uia::element_bounds(&element),
                        });
                    }
                    ancestor = unsafe { walker.GetParentElement(&candidate) }.ok();
                }

                Err(WdaError::PatternNotSupported(format!(
                    "element {id} has no scrollable ancestor"
                )))
            })
    }

    /// Poll `find` until it yields a match.
    pub fn wait_for(
        &self,
        query: &ElementQuery,
        timeout_ms: Option<u64>,
        cancel: &CancelToken,
    ) -> Result<ElementInfo, WdaError> {
        // Fail fast on a bad pattern before entering the loop.
        query.compile()?;

        let timeout =
            Duration::from_millis(timeout_ms.unwrap_or(self.config.wait_timeout_ms));
        let found = poll_until(timeout, self.poll_interval(), cancel, || {
            Ok(self.find(query, cancel)?.into_iter().next())
        })?;

        found.ok_or_else(|| {
            WdaError::Timeout(format!(
                "no element matched the query within {} ms",
                timeout.as_millis()
            ))
        })
    }

    /// Poll the element until it reaches `desired`, reporting the last
    /// observed state on timeout.
    pub fn wait_for_state(
        &self,
        element_id: &str,
        desired: ElementCondition,
        timeout_ms: Option<u64>,
        cancel: &CancelToken,
    ) -> Result<ObservedState, WdaError> {
        let timeout =
            Duration::from_millis(timeout_ms.unwrap_or(self.config.wait_timeout_ms));
        let mut last: Option<ObservedState> = None;

        let found = poll_until(timeout, self.poll_interval(), cancel, || {
            let id = element_id.to_owned();
            let state = self
                .worker
                .submit(self.op_timeout(None), cancel, move |ctx| {
                    observe_state_on_worker(ctx, &id)
                })?;
            last = Some(state);
            Ok(state.satisfies(desired).then_some(state))
        })?;

        found.ok_or_else(|| {
            WdaError::Timeout(format!(
                "timeout after {} ms; current state: {}",
                timeout.as_millis(),
                last.map(|s| s.describe()).unwrap_or_else(|| "unknown".into())
            ))
        })
    }

    /// Succeeds once the element leaves the tree or its window closes.
    pub fn wait_for_disappear(
        &self,
        element_id: &str,
        timeout_ms: Option<u64>,
        cancel: &CancelToken,
    ) -> Result<(), WdaError> {
        let timeout =
            Duration::from_millis(timeout_ms.unwrap_or(self.config.wait_timeout_ms));

        let gone = poll_until(timeout, self.poll_interval(), cancel, || {
            let id = element_id.to_owned();
            let result = self
                .worker
                .submit(self.op_timeout(None), cancel, move |ctx| {
                    match ctx.registry.lookup(&id) {
                        Ok(entry) => {
                            // Still registered; a dead property read means
                            // it left the tree.
                            Ok(unsafe { entry.element.CurrentBoundingRectangle() }.is_err())
                        }
                        Err(WdaError::ElementStale(_)) => Ok(true),
                        Err(e) => Err(e),
                    }
                })?;
            Ok(result.then_some(()))
        })?;

        gone.ok_or_else(|| {
            WdaError::Timeout(format!(
                "element {element_id} still present after {} ms",
                timeout.as_millis()
            ))
        })
    }

    /// Compact subtree dump for exploratory inspection.
    pub fn get_tree(
        &self,
        window_handle: isize,
        parent_element_id: Option<&str>,
        max_depth: Option<usize>,
        control_type_filter: Option<&str>,
        cancel: &CancelToken,
    ) -> Result<TreeResult, WdaError> {
        let parent_id = parent_element_id.map(str::to_owned);
        let filter = control_type_filter.map(str::to_owned);
        let token = cancel.clone();

        self.worker
            .submit(self.op_timeout(None), cancel, move |ctx| {
                let query = ElementQuery {
                    window_handle: Some(window_handle),
                    parent_element_id: parent_id.clone(),
                    ..Default::default()
                };
                let (root, _) = resolve_root(ctx, &query)?;

                let framework = Framework::detect(
                    &uia::element_class_name(&root),
                    &uia::element_framework_id(&root),
                );
                let depth = max_depth.unwrap_or_else(|| framework.default_depth());

                let (tree, depth_reached, node_count) =
                    uia::snapshot_tree(&ctx.uia, &root, depth, filter.as_deref(), &token)?;

                Ok(TreeResult {
                    tree,
                    diagnostics: TreeDiagnostics {
                        framework,
                        max_depth: depth,
                        depth_reached,
                        node_count,
                    },
                })
            })
    }

    /// Screenshot of the window with numbered badges at every
    /// interactable element's clickable point, in reading order.
    pub fn capture_annotated(
        &self,
        window_handle: isize,
        interactive_only: bool,
        output_path: Option<&str>,
        return_image_data: bool,
        cancel: &CancelToken,
    ) -> Result<AnnotatedCapture, WdaError> {
        let token = cancel.clone();

        // Phase 1 (worker): enumerate and register elements.
        let mut elements = self
            .worker
            .submit(self.op_timeout(None), cancel, move |ctx| {
                let query = ElementQuery {
                    window_handle: Some(window_handle),
                    ..Default::default()
                };
                let (root, owner) = resolve_root(ctx, &query)?;
                let framework = Framework::detect(
                    &uia::element_class_name(&root),
                    &uia::element_framework_id(&root),
                );

                let mons = monitors::list_monitors()?;
                let virtual_screen = monitors::virtual_screen(&mons);

                let mut collected: Vec<(IUIAutomationElement, ElementInfo)> = Vec::new();
                uia::walk_breadth_first(
                    &ctx.uia,
                    &root,
                    framework.default_depth(),
                    &token,
                    |element, _depth| {
                        let info = build_element_info(element, &mons, &virtual_screen);
                        let keep = !info.is_offscreen
                            && !info.bounds.is_empty()
                            && (!interactive_only || is_interactable(&info));
                        if keep {
                            collected.push((element.clone(), info));
                        }
                        collected.len() < MAX_FIND_LIMIT
                    },
                )?;

                let UiaContext { uia, registry, .. } = ctx;
                Ok(collected
                    .into_iter()
                    .map(|(element, mut info)| {
                        info.id = registry.insert(uia, element, owner);
                        info
                    })
                    .collect::<Vec<ElementInfo>>())
            })?;

        sort_reading_order(&mut elements);

        // Phase 2 (caller): capture, badge, encode.
        let want_image = return_image_data || output_path.is_some();
        let image = if want_image {
            let mut frame = self
                .capture
                .capture_raw(&CaptureTarget::Window(window_handle), false)?;

            for (i, element) in elements.iter().enumerate() {
                let x = element.clickable_point[0] - frame.origin_x;
                let y = element.clickable_point[1] - frame.origin_y;
                draw_badge(&mut frame, x, y, i + 1);
            }

            let request = CaptureRequest {
                target: CaptureTarget::Window(window_handle),
                include_cursor: false,
                format: None,
                quality: None,
                max_width: None,
                max_height: None,
                output: match output_path {
                    Some(p) => OutputMode::File(Some(p.to_owned())),
                    None => OutputMode::Inline,
                },
            };
            let format = self.capture.config().default_format;
            let quality = self.capture.config().default_quality;
            Some(self.capture.encode_frame(&frame, format, quality, &request)?)
        } else {
            None
        };

        let compact = elements
            .iter()
            .enumerate()
            .map(|(i, e)| CompactElement::from_info(i + 1, e))
            .collect();

        Ok(AnnotatedCapture {
            elements: compact,
            image,
        })
    }

    /// Render the element's rectangle and run OS text recognition on it.
    pub fn ocr_element(
        &self,
        element_id: &str,
        cancel: &CancelToken,
    ) -> Result<OcrText, WdaError> {
        let id = element_id.to_owned();
        let bounds = self
            .worker
            .submit(self.op_timeout(None), cancel, move |ctx| {
                let entry = ctx.registry.lookup(&id)?;
                let bounds = uia::element_bounds(&entry.element);
                if bounds.is_empty() {
                    return Err(WdaError::CaptureFailed(format!(
                        "element {id} has an empty rectangle"
                    )));
                }
                Ok(bounds)
            })?;

        let frame = self
            .capture
            .capture_raw(&CaptureTarget::Region(bounds), false)?;
        ocr::recognize_frame(&frame)
    }

    /// Best-effort "find one and click it" used by dialog dismissal.
    /// `Ok(false)` means nothing matched; errors are real failures.
    pub fn try_click_first(
        &self,
        query: &ElementQuery,
        cancel: &CancelToken,
    ) -> Result<bool, WdaError> {
        let mut query = query.clone();
        query.max_results = Some(1);
        let matches = self.find(&query, cancel)?;
        match matches.into_iter().next() {
            None => Ok(false),
            Some(element) => {
                self.click(&element.id, cancel)?;
                Ok(true)
            }
        }
    }
}

/// Scroll percentages that center `target` inside `container`.
/// `-1.0` (no-scroll) is used for an axis that needs no movement.
fn scroll_percentages(container: &Rect, target: &Rect) -> (f64, f64) {
    const NO_SCROLL: f64 = -1.0;

    let h = if target.left >= container.left && target.right <= container.right {
        NO_SCROLL
    } else if container.width() > 0 {
        let offset = (target.center().x - container.left) as f64 / container.width() as f64;
        (offset * 100.0).clamp(0.0, 100.0)
    } else {
        NO_SCROLL
    };

    let v = if target.top >= container.top && target.bottom <= container.bottom {
        NO_SCROLL
    } else if container.height() > 0 {
        let offset = (target.center().y - container.top) as f64 / container.height() as f64;
        (offset * 100.0).clamp(0.0, 100.0)
    } else {
        NO_SCROLL
    };

    (h, v)
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn element_condition_parse() {
        assert_eq!(
            ElementCondition::parse("on"),
            Some(ElementCondition::Toggle(ToggleState::On))
        );
        assert_eq!(
            ElementCondition::parse("enabled"),
            Some(ElementCondition::Enabled(true))
        );
        assert_eq!(
            ElementCondition::parse("hidden"),
            Some(ElementCondition::Visible(false))
        );
        assert_eq!(ElementCondition::parse("sideways"), None);
    }

    #[test]
    fn observed_state_satisfaction() {
        let state = ObservedState {
            toggle_state: Some(ToggleState::On),
            is_enabled: true,
            is_offscreen: false,
        };
        assert!(state.satisfies(ElementCondition::Toggle(ToggleState::On)));
        assert!(!state.satisfies(ElementCondition::Toggle(ToggleState::Off)));
        assert!(state.satisfies(ElementCondition::Enabled(true)));
        assert!(state.satisfies(ElementCondition::Visible(true)));
        assert!(!state.satisfies(ElementCondition::Visible(false)));
    }

    #[test]
    fn observed_state_description_lists_facets() {
        let state = ObservedState {
            toggle_state: Some(ToggleState::Off),
            is_enabled: false,
            is_offscreen: true,
        };
        let described = state.describe();
        assert!(described.contains("off"));
        assert!(described.contains("disabled"));
        assert!(described.contains("offscreen"));
    }

    fn info_with(control_type: &str, patterns: &[&str]) -> ElementInfo {
        ElementInfo {
            id: "1".into(),
            automation_id: None,
            name: "x".into(),
            control_type: control_type.into(),
            bounds: Rect::new(0, 0, 10, 10),
            monitor_bounds: Rect::new(0, 0, 10, 10),
            monitor_index: 0,
            clickable_point: [5, 5, 0],
            patterns: patterns.iter().map(|s| s.to_string()).collect(),
            value: None,
            toggle_state: None,
            is_enabled: true,
            is_offscreen: false,
        }
    }

    #[test]
    fn interactable_by_control_type() {
        assert!(is_interactable(&info_with("Button", &[])));
        assert!(is_interactable(&info_with("CheckBox", &[])));
        assert!(!is_interactable(&info_with("Text", &[])));
        assert!(!is_interactable(&info_with("Pane", &[])));
    }

    #[test]
    fn interactable_by_pattern() {
        assert!(is_interactable(&info_with("Pane", &["Invoke"])));
        assert!(is_interactable(&info_with("Custom", &["Toggle"])));
        assert!(!is_interactable(&info_with("Group", &["Scroll"])));
    }

    #[test]
    fn scroll_percentages_skip_contained_axes() {
        let container = Rect::new(0, 0, 400, 400);
        let inside = Rect::new(100, 100, 200, 200);
        assert_eq!(scroll_percentages(&container, &inside), (-1.0, -1.0));
    }

    #[test]
    fn scroll_percentages_aim_at_outlying_target() {
        let container = Rect::new(0, 0, 400, 400);
        let below = Rect::new(100, 900, 200, 950);
        let (h, v) = scroll_percentages(&container, &below);
        assert_eq!(h, -1.0);
        assert!(v > 0.0 && v <= 100.0);
    }
}
