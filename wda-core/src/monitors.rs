//! Monitor enumeration and the coordinate model.
//!
//! Monitors are indexed 0-based in enumeration order; exactly one carries
//! the primary flag.  Bounds come in two flavors: `bounds` is the
//! virtual-screen rectangle as the window manager reports it (physical
//! pixels for a per-monitor-DPI-aware process), `logical_bounds` is the
//! same rectangle divided by the monitor's DPI scale.

use serde::Serialize;
use windows::Win32::Foundation::{BOOL, LPARAM, RECT, TRUE};
use windows::Win32::Graphics::Gdi::{
    EnumDisplayMonitors, GetMonitorInfoW, MonitorFromPoint, MonitorFromWindow, HDC, HMONITOR,
    MONITORINFOEXW, MONITOR_DEFAULTTONEAREST,
};
use windows::Win32::UI::HiDpi::{GetDpiForMonitor, MDT_EFFECTIVE_DPI};

use crate::errors::WdaError;
use crate::geometry::{Point, Rect};
use crate::native;

const MONITORINFOF_PRIMARY: u32 = 1;

/// Snapshot of one attached display.
#[derive(Debug, Clone, Serialize)]
pub struct MonitorInfo {
    /// 0-based index, stable within one enumeration.
    pub index: usize,
    /// Device name, e.g. `\\.\DISPLAY1`.
    pub device_name: String,
    pub is_primary: bool,
    /// Virtual-screen rectangle in physical pixels.
    pub bounds: Rect,
    /// DPI-scaled rectangle.
    pub logical_bounds: Rect,
    /// Effective DPI divided by 96.
    pub scale: f64,
    /// Usable area excluding the taskbar, in the same space as `bounds`.
    pub work_area: Rect,
    #[serde(skip)]
    pub(crate) hmonitor: isize,
}

/// Named monitor targets accepted on the wire.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MonitorTarget {
    Primary,
    Secondary,
    Index(usize),
}

impl MonitorTarget {
    pub fn parse(name: &str) -> Option<Self> {
        match name.trim().to_ascii_lowercase().as_str() {
            "primary_screen" | "primary" => Some(Self::Primary),
            "secondary_screen" | "secondary" => Some(Self::Secondary),
            _ => None,
        }
    }
}

// ---------------------------------------------------------------------------
// Enumeration
// ---------------------------------------------------------------------------

unsafe extern "system" fn monitor_enum_proc(
    hmonitor: HMONITOR,
    _hdc: HDC,
    _clip: *mut RECT,
    lparam: LPARAM,
) -> BOOL {
    let handles = unsafe { &mut *(lparam.0 as *mut Vec<isize>) };
    handles.push(hmonitor.0 as isize);
    TRUE
}

fn read_monitor(index: usize, hmonitor: isize) -> Option<MonitorInfo> {
    let hmon = HMONITOR(hmonitor as *mut core::ffi::c_void);

    let mut info = MONITORINFOEXW::default();
    info.monitorInfo.cbSize = std::mem::size_of::<MONITORINFOEXW>() as u32;
    if !unsafe { GetMonitorInfoW(hmon, &mut info as *mut _ as *mut _) }.as_bool() {
        return None;
    }

    let device_name = String::from_utf16_lossy(
        &info
            .szDevice
            .iter()
            .copied()
            .take_while(|&c| c != 0)
            .collect::<Vec<u16>>(),
    );

    let scale = unsafe {
        let mut dpi_x = 0u32;
        let mut dpi_y = 0u32;
        match GetDpiForMonitor(hmon, MDT_EFFECTIVE_DPI, &mut dpi_x, &mut dpi_y) {
            Ok(()) if dpi_x > 0 => dpi_x as f64 / 96.0,
            _ => 1.0,
        }
    };

    let bounds: Rect = info.monitorInfo.rcMonitor.into();
    Some(MonitorInfo {
        index,
        device_name,
        is_primary: info.monitorInfo.dwFlags & MONITORINFOF_PRIMARY != 0,
        bounds,
        logical_bounds: bounds.to_logical(scale),
        scale,
        work_area: info.monitorInfo.rcWork.into(),
        hmonitor,
    })
}

/// Enumerate all attached monitors.
pub fn list_monitors() -> Result<Vec<MonitorInfo>, WdaError> {
    let mut handles: Vec<isize> = Vec::with_capacity(4);
    unsafe {
        EnumDisplayMonitors(
            None,
            None,
            Some(monitor_enum_proc),
            LPARAM(&mut handles as *mut Vec<isize> as isize),
        )
    }
    .ok()
    .map_err(|e| WdaError::EnumerationFailed(format!("EnumDisplayMonitors failed: {e}")))?;

    let monitors: Vec<MonitorInfo> = handles
        .iter()
        .enumerate()
        .filter_map(|(i, &h)| read_monitor(i, h))
        .collect();

    if monitors.is_empty() {
        return Err(WdaError::EnumerationFailed(
            "no monitors reported by the system".into(),
        ));
    }
    Ok(monitors)
}

/// The union rectangle of every monitor's bounds.
pub fn virtual_screen(monitors: &[MonitorInfo]) -> Rect {
    let mut union = monitors[0].bounds;
    for m in &monitors[1..] {
        union.left = union.left.min(m.bounds.left);
        union.top = union.top.min(m.bounds.top);
        union.right = union.right.max(m.bounds.right);
        union.bottom = union.bottom.max(m.bounds.bottom);
    }
    union
}

// ---------------------------------------------------------------------------
// Point / window resolution
// ---------------------------------------------------------------------------

/// Index of the monitor containing `point`, falling back to the nearest.
pub fn monitor_index_at(monitors: &[MonitorInfo], point: Point) -> usize {
    if let Some(m) = monitors.iter().find(|m| m.bounds.contains(point)) {
        return m.index;
    }

    let hmon = unsafe { MonitorFromPoint(point.into(), MONITOR_DEFAULTTONEAREST) };
    monitors
        .iter()
        .find(|m| m.hmonitor == hmon.0 as isize)
        .map(|m| m.index)
        .unwrap_or(0)
}

/// Index of the monitor hosting the largest share of `bounds`.
pub fn monitor_index_for_rect(monitors: &[MonitorInfo], bounds: &Rect) -> usize {
    monitors
        .iter()
        .max_by_key(|m| m.bounds.intersection_area(bounds))
        .filter(|m| m.bounds.intersection_area(bounds) > 0)
        .map(|m| m.index)
        .unwrap_or_else(|| monitor_index_at(monitors, bounds.center()))
}

/// Index of the monitor hosting a window.
pub fn monitor_index_for_window(monitors: &[MonitorInfo], handle: isize) -> usize {
    let hmon = unsafe { MonitorFromWindow(native::hwnd(handle), MONITOR_DEFAULTTONEAREST) };
    monitors
        .iter()
        .find(|m| m.hmonitor == hmon.0 as isize)
        .map(|m| m.index)
        .unwrap_or(0)
}

/// Resolve a named or numeric monitor target to an index.
///
/// `secondary_screen` is only well-defined on exactly-two-monitor setups;
/// anything else must name the index explicitly.
pub fn resolve_target(
    monitors: &[MonitorInfo],
    target: MonitorTarget,
) -> Result<usize, WdaError> {
    match target {
        MonitorTarget::Primary => monitors
            .iter()
            .find(|m| m.is_primary)
            .map(|m| m.index)
            .ok_or_else(|| {
                WdaError::EnumerationFailed("no monitor reports the primary flag".into())
            }),
        MonitorTarget::Secondary => {
            if monitors.len() != 2 {
                return Err(WdaError::MissingParameter(format!(
                    "secondary_screen requires exactly two monitors ({} attached); \
                     pass monitor_index instead",
                    monitors.len()
                )));
            }
            monitors
                .iter()
                .find(|m| !m.is_primary)
                .map(|m| m.index)
                .ok_or_else(|| {
                    WdaError::EnumerationFailed("both monitors report the primary flag".into())
                })
        }
        MonitorTarget::Index(i) => {
            if i < monitors.len() {
                Ok(i)
            } else {
                Err(WdaError::InvalidCoordinates(format!(
                    "monitor index {i} out of range; {} monitor(s) attached",
                    monitors.len()
                )))
            }
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    fn fake(index: usize, primary: bool, bounds: Rect, scale: f64) -> MonitorInfo {
        MonitorInfo {
            index,
            device_name: format!("\\\\.\\DISPLAY{}", index + 1),
            is_primary: primary,
            bounds,
            logical_bounds: bounds.to_logical(scale),
            scale,
            work_area: bounds,
            hmonitor: 0,
        }
    }

    fn dual() -> Vec<MonitorInfo> {
        vec![
            fake(0, true, Rect::new(0, 0, 2560, 1440), 1.0),
            fake(1, false, Rect::new(2560, 0, 2560 + 1920, 1080), 1.0),
        ]
    }

    #[test]
    fn virtual_screen_is_union() {
        let monitors = vec![
            fake(0, true, Rect::new(0, 0, 1920, 1080), 1.0),
            fake(1, false, Rect::new(-1920, 0, 0, 1200), 1.0),
        ];
        let vs = virtual_screen(&monitors);
        assert_eq!(vs, Rect::new(-1920, 0, 1920, 1200));
    }

    #[test]
    fn target_parse() {
        assert_eq!(
            MonitorTarget::parse("primary_screen"),
            Some(MonitorTarget::Primary)
        );
        assert_eq!(
            MonitorTarget::parse("Secondary_Screen"),
            Some(MonitorTarget::Secondary)
        );
        assert_eq!(MonitorTarget::parse("tertiary"), None);
    }

    #[test]
    fn resolve_primary() {
        assert_eq!(resolve_target(&dual(), MonitorTarget::Primary).unwrap(), 0);
    }

    #[test]
    fn resolve_secondary_with_two_monitors() {
        assert_eq!(
            resolve_target(&dual(), MonitorTarget::Secondary).unwrap(),
            1
        );
    }

    #[test]
    fn resolve_secondary_rejects_other_counts() {
        let single = vec![fake(0, true, Rect::new(0, 0, 1920, 1080), 1.0)];
        assert!(matches!(
            resolve_target(&single, MonitorTarget::Secondary),
            Err(WdaError::MissingParameter(_))
        ));

        let mut triple = dual();
        triple.push(fake(2, false, Rect::new(0, 1440, 1920, 2520), 1.0));
        assert!(resolve_target(&triple, MonitorTarget::Secondary).is_err());
    }

    #[test]
    fn resolve_index_bounds_checked() {
        assert_eq!(
            resolve_target(&dual(), MonitorTarget::Index(1)).unwrap(),
            1
        );
        assert!(matches!(
            resolve_target(&dual(), MonitorTarget::Index(2)),
            Err(WdaError::InvalidCoordinates(_))
        ));
    }

    #[test]
    fn point_containment_picks_owner() {
        let monitors = dual();
        assert_eq!(monitor_index_at(&monitors, Point::new(100, 100)), 0);
        assert_eq!(monitor_index_at(&monitors, Point::new(3000, 500)), 1);
    }

    #[test]
    fn rect_resolution_prefers_larger_overlap() {
        let monitors = dual();
        // Straddles the seam but mostly on the secondary.
        let straddling = Rect::new(2400, 100, 3400, 600);
        assert_eq!(monitor_index_for_rect(&monitors, &straddling), 1);
    }

    #[test]
    fn logical_bounds_scale_down() {
        let m = fake(0, true, Rect::new(0, 0, 3840, 2160), 2.0);
        assert_eq!(m.logical_bounds, Rect::new(0, 0, 1920, 1080));
    }
}
