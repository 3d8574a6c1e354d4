// Copyright 2025 eraflo
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

//! The symbol contract between the host and a loadable module.
//!
//! A module exports either [`MAIN_SYMBOL`], invoked once per loop iteration
//! with the shared [`Context`], or the legacy pair [`LEGACY_INIT_SYMBOL`] and
//! [`LEGACY_UPDATE_SYMBOL`]. Use [`export_main!`](crate::export_main) or
//! [`export_legacy!`](crate::export_legacy) rather than writing the exports by hand.

use crate::Context;
use std::any::Any;
use std::ffi::c_void;

/// Name of the per-iteration entry point.
pub const MAIN_SYMBOL: &str = "ember_main";
/// Name of the legacy initializer.
pub const LEGACY_INIT_SYMBOL: &str = "ember_init";
/// Name of the legacy update function.
pub const LEGACY_UPDATE_SYMBOL: &str = "ember_update";

/// Signature of [`MAIN_SYMBOL`].
pub type MainFn = unsafe extern "C" fn(ctx: *mut Context);
/// Signature of [`LEGACY_INIT_SYMBOL`]: returns the module's opaque state.
pub type InitFn = unsafe extern "C" fn() -> *mut c_void;
/// Signature of [`LEGACY_UPDATE_SYMBOL`]: `0` keeps running, `n > 0` exits with `n - 1`.
pub type UpdateFn = unsafe extern "C" fn(state: *mut c_void) -> u32;

/// Maps a legacy update result to an exit code, if it asks to stop.
pub fn legacy_exit_code(result: u32) -> Option<i32> {
    match result {
        0 => None,
        n => Some(i32::try_from(n - 1).unwrap_or(i32::MAX)),
    }
}

/// The message carried by a panic payload, if it is a string.
pub fn panic_message(payload: &(dyn Any + Send)) -> &str {
    payload
        .downcast_ref::<&str>()
        .copied()
        .or_else(|| payload.downcast_ref::<String>().map(String::as_str))
        .unwrap_or("non-string panic payload")
}

/// Ends the process after a panic caught at the module boundary.
///
/// A module links its own `std`, so the host's panic hook never sees its
/// panics, and unwinding through the `extern "C"` entry point would abort.
pub fn exit_on_panic(payload: Box<dyn Any + Send>) -> ! {
    log::error!("Fatal: module panicked: {}", panic_message(payload.as_ref()));
    log::logger().flush();
    std::process::exit(1)
}

/// Exports `$main: fn(&mut Context)` as the module entry point.
///
/// The generated export also forwards the module's `log` macros to the host on
/// the first invocation after every load. A panic in `$main` is logged and
/// exits the process with code 1.
#[macro_export]
macro_rules! export_main {
    ($main:path) => {
        #[no_mangle]
        pub unsafe extern "C" fn ember_main(ctx: *mut $crate::Context) {
            // SAFETY: the host passes its own live context and holds no other
            // reference to it for the duration of the call.
            let ctx = unsafe { &mut *ctx };
            if ctx.reloaded {
                ctx.forward_logging();
            }
            let result =
                ::std::panic::catch_unwind(::std::panic::AssertUnwindSafe(|| $main(&mut *ctx)));
            if let Err(payload) = result {
                if let Err(e) = ctx.out.flush() {
                    $crate::log::warn!("Failed to flush module output: {e}");
                }
                $crate::abi::exit_on_panic(payload);
            }
        }
    };
}

/// Exports `$init: fn() -> *mut c_void` and `$update: fn(*mut c_void) -> u32`
/// using the legacy contract. Panics exit the process with code 1.
#[macro_export]
macro_rules! export_legacy {
    ($init:path, $update:path) => {
        #[no_mangle]
        pub extern "C" fn ember_init() -> *mut ::std::ffi::c_void {
            ::std::panic::catch_unwind($init)
                .unwrap_or_else(|payload| $crate::abi::exit_on_panic(payload))
        }

        #[no_mangle]
        pub extern "C" fn ember_update(state: *mut ::std::ffi::c_void) -> u32 {
            ::std::panic::catch_unwind(::std::panic::AssertUnwindSafe(|| $update(state)))
                .unwrap_or_else(|payload| $crate::abi::exit_on_panic(payload))
        }
    };
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_legacy_exit_code() {
        assert_eq!(legacy_exit_code(0), None);
        assert_eq!(legacy_exit_code(1), Some(0));
        assert_eq!(legacy_exit_code(4), Some(3));
        assert_eq!(legacy_exit_code(u32::MAX), Some(i32::MAX));
    }

    #[test]
    fn test_panic_message() {
        let payload = std::panic::catch_unwind(|| panic!("arena allocation failed")).unwrap_err();
        assert_eq!(panic_message(payload.as_ref()), "arena allocation failed");

        let size = 3;
        let payload = std::panic::catch_unwind(|| panic!("too big: {size}")).unwrap_err();
        assert_eq!(panic_message(payload.as_ref()), "too big: 3");

        let payload: Box<dyn Any + Send> = Box::new(7u32);
        assert_eq!(panic_message(payload.as_ref()), "non-string panic payload");
    }
}
