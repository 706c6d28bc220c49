//! COM apartment RAII guard.
//!
//! [`ComGuard`] wraps `CoInitializeEx` / `CoUninitialize` so apartments are
//! balanced even on panic or early return.  The UIA worker thread holds an
//! STA guard for its whole lifetime; short-lived helpers (virtual-desktop
//! probe, OCR) join whatever apartment their thread already has.
//!
//! The `PhantomData<*const ()>` field enforces `!Send` + `!Sync` at compile
//! time, preventing the guard from crossing thread boundaries.

use windows::Win32::System::Com::{
    CoInitializeEx, CoUninitialize, COINIT_APARTMENTTHREADED, COINIT_MULTITHREADED,
};

use crate::errors::WdaError;

/// RAII wrapper that calls `CoUninitialize` on `Drop` when appropriate.
///
/// The guard tracks whether `CoInitializeEx` actually succeeded (vs.
/// `RPC_E_CHANGED_MODE`) and only calls `CoUninitialize` when a balancing
/// call is required per MSDN.
#[must_use = "ComGuard must be kept alive for the duration of COM usage"]
pub struct ComGuard {
    should_uninit: bool,
    _not_send: std::marker::PhantomData<*const ()>,
}

impl ComGuard {
    /// Initialise (or join) a single-threaded apartment on this thread.
    ///
    /// UI Automation requires that every element reference is used from the
    /// thread that created it; the worker pins an STA for that reason.
    pub fn init_sta() -> Result<Self, WdaError> {
        Self::init(COINIT_APARTMENTTHREADED.0 as u32)
    }

    /// Initialise (or join) the thread's MTA apartment.
    pub fn init_mta() -> Result<Self, WdaError> {
        Self::init(COINIT_MULTITHREADED.0 as u32)
    }

    fn init(model: u32) -> Result<Self, WdaError> {
        let hr = unsafe {
            CoInitializeEx(
                None,
                windows::Win32::System::Com::COINIT(model as i32),
            )
        };

        let hresult_value = hr.0 as u32;
        match hresult_value {
            // S_OK (newly initialised) or S_FALSE (already initialised).
            0x0 | 0x1 => Ok(Self {
                should_uninit: true,
                _not_send: std::marker::PhantomData,
            }),
            // RPC_E_CHANGED_MODE -- the thread already has the other
            // apartment model.  COM is usable, but we must NOT call
            // CoUninitialize since we did not successfully initialise.
            0x8001_0106 => {
                log::warn!(
                    "CoInitializeEx: RPC_E_CHANGED_MODE -- thread already has a \
                     different apartment model, joining the existing apartment"
                );
                Ok(Self {
                    should_uninit: false,
                    _not_send: std::marker::PhantomData,
                })
            }
            _ => Err(WdaError::SystemError(format!(
                "CoInitializeEx failed: HRESULT 0x{hresult_value:08X}"
            ))),
        }
    }
}

impl Drop for ComGuard {
    fn drop(&mut self) {
        if self.should_uninit {
            unsafe { CoUninitialize() };
        }
    }
}
