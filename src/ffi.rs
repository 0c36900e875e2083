//! C ABI declared in `include/localnative-core.h`.
//!
//! iOS reaches these through `LocalNative-Bridging-Header.h`; Android and
//! desktop hosts load the `cdylib`. Strings returned by [`localnative_run`]
//! are owned by Rust and must be released with [`localnative_free`].

use std::ffi::{CStr, CString};
use std::os::raw::c_char;

use crate::cmd;
use crate::config::Config;

/// Runs one JSON command and returns the JSON response.
///
/// Never returns NULL.
///
/// # Safety
///
/// `json_input` must be NULL or point to a NUL-terminated string that stays
/// valid for the duration of the call.
#[no_mangle]
pub unsafe extern "C" fn localnative_run(json_input: *const c_char) -> *mut c_char {
    let response = if json_input.is_null() {
        cmd::error_json("json input is null")
    } else {
        match CStr::from_ptr(json_input).to_str() {
            Ok(text) => cmd::run_with_config(&Config::minimal(), text),
            Err(_) => cmd::error_json("json input is not valid utf-8"),
        }
    };
    into_c_string(response)
}

/// Releases a string returned by [`localnative_run`]. NULL is a no-op.
///
/// # Safety
///
/// `s` must be NULL or a pointer obtained from [`localnative_run`] that has
/// not been freed yet.
#[no_mangle]
pub unsafe extern "C" fn localnative_free(s: *mut c_char) {
    if !s.is_null() {
        drop(CString::from_raw(s));
    }
}

fn into_c_string(s: String) -> *mut c_char {
    let c = CString::new(s).unwrap_or_else(|_| {
        CString::new(cmd::error_json("response contains a NUL byte")).unwrap_or_default()
    });
    c.into_raw()
}
