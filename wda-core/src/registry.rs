//! Live-element registry.
//!
//! Callers never hold COM references; they hold short numeric ids issued
//! here.  The registry lives on the automation worker thread and is only
//! touched from work items, so it needs no locking.  Ids are allocated
//! from a process-lifetime counter and never reused.

use std::collections::HashMap;

use windows::Win32::UI::Accessibility::{IUIAutomation, IUIAutomationElement};

use crate::errors::WdaError;
use crate::native;

/// A live UIA element plus the top-level window that owns it.
pub struct RegisteredElement {
    pub element: IUIAutomationElement,
    pub window: isize,
}

#[derive(Default)]
pub struct ElementRegistry {
    entries: HashMap<u64, RegisteredElement>,
    next_id: u64,
}

impl ElementRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Store a live element and return its id.
    ///
    /// Re-registering an element that is already tracked returns its
    /// existing id, so two successive finds hand the caller the same id
    /// for the same control.  Fresh ids come from a process-lifetime
    /// counter and are never reused.
    pub fn insert(
        &mut self,
        uia: &IUIAutomation,
        element: IUIAutomationElement,
        window: isize,
    ) -> String {
        for (key, entry) in &self.entries {
            if entry.window != window {
                continue;
            }
            let same = unsafe { uia.CompareElements(&entry.element, &element) }
                .map(|b| b.as_bool())
                .unwrap_or(false);
            if same {
                return key.to_string();
            }
        }

        let id = self.next_id;
        self.next_id += 1;
        self.entries.insert(id, RegisteredElement { element, window });
        id.to_string()
    }

    /// Resolve an id, validating that the element is still usable.
    ///
    /// A stale entry (owning window gone, or the element no longer answers
    /// property reads) is evicted before the error is returned, so repeated
    /// lookups fail fast without touching COM again.  A closed window
    /// evicts every element it owned.
    pub fn lookup(&mut self, id: &str) -> Result<&RegisteredElement, WdaError> {
        let key: u64 = id.parse().map_err(|_| {
            WdaError::ElementNotFound(format!("malformed element id {id:?}"))
        })?;

        let (closed_window, stale) = match self.entries.get(&key) {
            None => {
                return Err(WdaError::ElementStale(format!(
                    "element {id} is not registered in this session"
                )))
            }
            Some(entry) => {
                let window_gone = !native::is_window(native::hwnd(entry.window));
                let dead =
                    window_gone || unsafe { entry.element.CurrentProcessId() }.is_err();
                (window_gone.then_some(entry.window), dead)
            }
        };

        if let Some(window) = closed_window {
            self.drop_for_window(window);
        }
        if stale {
            self.entries.remove(&key);
            return Err(WdaError::ElementStale(format!(
                "element {id} is no longer available"
            )));
        }

        Ok(&self.entries[&key])
    }

    pub fn remove(&mut self, id: &str) {
        if let Ok(key) = id.parse::<u64>() {
            self.entries.remove(&key);
        }
    }

    /// Drop every element owned by a window (used when a window closes).
    pub fn drop_for_window(&mut self, window: isize) {
        self.entries.retain(|_, entry| entry.window != window);
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
