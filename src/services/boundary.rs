//! Call boundary around provider code.
//!
//! Every call into a bound provider goes through [`guarded`], which turns a
//! fault raised inside the call into a [`PluginFault`] value instead of
//! letting it tear down the worker thread. Two kinds of fault are contained:
//!
//! - Rust panics, caught with `catch_unwind`
//! - hardware faults inside native code (access violations, bus errors,
//!   illegal instructions, arithmetic faults), recovered by the region in
//!   `fault_guard.c`: structured exception handling under MSVC, a
//!   `sigsetjmp` region with process-wide signal handlers elsewhere
//!
//! Recovering from a hardware fault jumps straight back to the boundary.
//! Whatever the faulting call had allocated or locked at that point is
//! leaked. Windows builds without MSVC only contain panics.

use std::any::Any;
use std::ffi::{CStr, c_char, c_int, c_void};
use std::panic::{self, AssertUnwindSafe};
use std::thread::Result as CallResult;
use thiserror::Error;

type Callback = unsafe extern "C-unwind" fn(*mut c_void);

unsafe extern "C-unwind" {
    fn decoda_scc_guarded_call(callback: Callback, context: *mut c_void, fault: *mut c_int)
    -> c_int;
}

unsafe extern "C" {
    fn decoda_scc_fault_name(code: c_int) -> *const c_char;
}

/// A fault raised by provider code while executing one operation.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("source control provider faulted during {operation}: {message}")]
pub struct PluginFault {
    pub operation: &'static str,
    pub message: String,
}

impl PluginFault {
    pub fn new(operation: &'static str, message: impl Into<String>) -> Self {
        Self {
            operation,
            message: message.into(),
        }
    }
}

/// The closure and its outcome, shared with the native region.
struct Region<F, R> {
    call: Option<F>,
    outcome: Option<CallResult<R>>,
}

/// Run `call`, converting a panic or a hardware fault into a [`PluginFault`].
pub fn guarded<F, R>(operation: &'static str, call: F) -> Result<R, PluginFault>
where
    F: FnOnce() -> R,
{
    let mut region = Region {
        call: Some(call),
        outcome: None,
    };
    let mut code: c_int = 0;

    let faulted = unsafe {
        decoda_scc_guarded_call(
            enter::<F, R>,
            (&mut region as *mut Region<F, R>).cast(),
            &mut code,
        )
    };

    let fault = if faulted != 0 {
        PluginFault::new(operation, native_fault_message(code))
    } else {
        match region.outcome.take() {
            Some(Ok(value)) => return Ok(value),
            Some(Err(payload)) => PluginFault::new(operation, fault_message(payload.as_ref())),
            None => PluginFault::new(operation, "call did not run"),
        }
    };

    tracing::error!("{}", fault);
    Err(fault)
}

/// Runs inside the native region. Panics never leave this frame.
unsafe extern "C-unwind" fn enter<F, R>(context: *mut c_void)
where
    F: FnOnce() -> R,
{
    let region = unsafe { &mut *context.cast::<Region<F, R>>() };
    if let Some(call) = region.call.take() {
        region.outcome = Some(panic::catch_unwind(AssertUnwindSafe(call)));
    }
}

fn native_fault_message(code: c_int) -> String {
    let name = unsafe { CStr::from_ptr(decoda_scc_fault_name(code)) };
    format!("{} (code {:#x})", name.to_string_lossy(), code)
}

fn fault_message(payload: &(dyn Any + Send)) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        (*message).to_string()
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.clone()
    } else {
        "unknown fault".to_string()
    }
}
