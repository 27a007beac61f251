//! FFI bindings for Stepwriter
//!
//! This module provides C-compatible functions for driving the step tracker
//! from a host application. The host feeds accelerometer samples with its own
//! millisecond timestamps; persistence stays on the host side.
//! All functions use C strings (null-terminated) and return allocated memory
//! that must be freed by the caller using `stepwriter_free_string`.

use std::cell::RefCell;
use std::ffi::{CStr, CString};
use std::os::raw::c_char;
use std::ptr;

use crate::activity::ActivityKind;
use crate::config::TrackerConfig;
use crate::error::TrackerError;
use crate::metrics::MetricsRequest;
use crate::tracker::StepTracker;
use crate::types::{BodyParams, SampleVector};

// Thread-local storage for the last error message
thread_local! {
    static LAST_ERROR: RefCell<Option<CString>> = const { RefCell::new(None) };
}

fn set_last_error(msg: &str) {
    LAST_ERROR.with(|e| {
        *e.borrow_mut() = CString::new(msg).ok();
    });
}

fn clear_last_error() {
    LAST_ERROR.with(|e| {
        *e.borrow_mut() = None;
    });
}

/// Helper to convert C string to Rust string
unsafe fn cstr_to_string(ptr: *const c_char) -> Option<String> {
    if ptr.is_null() {
        return None;
    }
    CStr::from_ptr(ptr).to_str().ok().map(|s| s.to_string())
}

/// Helper to convert Rust string to C string (caller must free)
fn string_to_cstr(s: &str) -> *mut c_char {
    match CString::new(s) {
        Ok(cstr) => cstr.into_raw(),
        Err(_) => ptr::null_mut(),
    }
}

// ============================================================================
// Stateless API
// ============================================================================

/// Compute metrics for a step total.
///
/// Input is a JSON object with `totalSteps`, `activity` and optionally
/// `activeSeconds`, `body` and `dailyGoal`. Output is the metrics as JSON.
///
/// # Safety
/// - `json` must be a valid null-terminated C string.
/// - Returns a newly allocated string that must be freed with `stepwriter_free_string`.
/// - Returns NULL on error; call `stepwriter_last_error` to get the error message.
#[no_mangle]
pub unsafe extern "C" fn stepwriter_calculate_metrics(json: *const c_char) -> *mut c_char {
    clear_last_error();

    let json_str = match cstr_to_string(json) {
        Some(s) => s,
        None => {
            set_last_error("Invalid JSON string pointer");
            return ptr::null_mut();
        }
    };

    let result = MetricsRequest::from_json(&json_str)
        .and_then(|request| request.evaluate())
        .and_then(|metrics| serde_json::to_string(&metrics).map_err(TrackerError::from));

    match result {
        Ok(out) => string_to_cstr(&out),
        Err(e) => {
            set_last_error(&e.to_string());
            ptr::null_mut()
        }
    }
}

// ============================================================================
// Stateful Tracker API
// ============================================================================

/// Opaque handle to a StepTracker
pub struct StepTrackerHandle {
    tracker: StepTracker,
}

/// Create a tracker for the named activity.
///
/// A `daily_goal` of zero or less disables goal tracking.
///
/// # Safety
/// - `activity` must be a valid null-terminated C string.
/// - Returns a pointer that must be freed with `stepwriter_tracker_free`.
/// - Returns NULL on error; call `stepwriter_last_error` to get the error message.
#[no_mangle]
pub unsafe extern "C" fn stepwriter_tracker_new(
    activity: *const c_char,
    daily_goal: i64,
    height_cm: f64,
    weight_kg: f64,
) -> *mut StepTrackerHandle {
    clear_last_error();

    let name = match cstr_to_string(activity) {
        Some(s) => s,
        None => {
            set_last_error("Invalid activity string pointer");
            return ptr::null_mut();
        }
    };

    let kind: ActivityKind = match name.parse() {
        Ok(kind) => kind,
        Err(e) => {
            set_last_error(&e.to_string());
            return ptr::null_mut();
        }
    };

    let body = BodyParams::new(height_cm, weight_kg);
    if let Err(e) = body.validate() {
        set_last_error(&e.to_string());
        return ptr::null_mut();
    }

    let tracker = StepTracker::new(TrackerConfig::default(), kind, body, daily_goal);
    Box::into_raw(Box::new(StepTrackerHandle { tracker }))
}

/// Free a tracker.
///
/// # Safety
/// - `tracker` must be a valid pointer returned by `stepwriter_tracker_new`, or NULL.
/// - After calling this function, the pointer is invalid.
#[no_mangle]
pub unsafe extern "C" fn stepwriter_tracker_free(tracker: *mut StepTrackerHandle) {
    if !tracker.is_null() {
        drop(Box::from_raw(tracker));
    }
}

/// Feed one accelerometer sample taken at `now_ms` (host monotonic milliseconds).
///
/// # Safety
/// - `tracker` must be a valid pointer returned by `stepwriter_tracker_new`.
/// - Returns 1 if a step was counted, 0 if not, -1 on error.
#[no_mangle]
pub unsafe extern "C" fn stepwriter_tracker_push_sample(
    tracker: *mut StepTrackerHandle,
    x: f64,
    y: f64,
    z: f64,
    now_ms: u64,
) -> i32 {
    clear_last_error();

    if tracker.is_null() {
        set_last_error("Null tracker pointer");
        return -1;
    }

    let handle = &mut *tracker;
    match handle.tracker.on_sample(&SampleVector::new(x, y, z), now_ms) {
        Some(_) => 1,
        None => 0,
    }
}

/// Active-time tick; the host should call this periodically.
///
/// # Safety
/// - `tracker` must be a valid pointer returned by `stepwriter_tracker_new`.
/// - Returns 0 on success, -1 on error.
#[no_mangle]
pub unsafe extern "C" fn stepwriter_tracker_tick(
    tracker: *mut StepTrackerHandle,
    now_ms: u64,
) -> i32 {
    clear_last_error();

    if tracker.is_null() {
        set_last_error("Null tracker pointer");
        return -1;
    }

    (*tracker).tracker.tick(now_ms);
    0
}

/// Change the daily goal; goal status is re-evaluated immediately.
///
/// # Safety
/// - `tracker` must be a valid pointer returned by `stepwriter_tracker_new`.
/// - Returns 0 on success, -1 on error.
#[no_mangle]
pub unsafe extern "C" fn stepwriter_tracker_set_goal(
    tracker: *mut StepTrackerHandle,
    daily_goal: i64,
) -> i32 {
    clear_last_error();

    if tracker.is_null() {
        set_last_error("Null tracker pointer");
        return -1;
    }

    (*tracker).tracker.set_daily_goal(daily_goal);
    0
}

/// Replace height and weight; invalid values keep the previous ones.
///
/// # Safety
/// - `tracker` must be a valid pointer returned by `stepwriter_tracker_new`.
/// - Returns 0 on success, -1 on error.
#[no_mangle]
pub unsafe extern "C" fn stepwriter_tracker_set_body(
    tracker: *mut StepTrackerHandle,
    height_cm: f64,
    weight_kg: f64,
) -> i32 {
    clear_last_error();

    if tracker.is_null() {
        set_last_error("Null tracker pointer");
        return -1;
    }

    match (*tracker)
        .tracker
        .set_body(BodyParams::new(height_cm, weight_kg))
    {
        Ok(()) => 0,
        Err(e) => {
            set_last_error(&e.to_string());
            -1
        }
    }
}

/// Current tracker state as JSON.
///
/// # Safety
/// - `tracker` must be a valid pointer returned by `stepwriter_tracker_new`.
/// - Returns a newly allocated string that must be freed with `stepwriter_free_string`.
/// - Returns NULL on error; call `stepwriter_last_error` to get the error message.
#[no_mangle]
pub unsafe extern "C" fn stepwriter_tracker_snapshot(
    tracker: *const StepTrackerHandle,
) -> *mut c_char {
    clear_last_error();

    if tracker.is_null() {
        set_last_error("Null tracker pointer");
        return ptr::null_mut();
    }

    match serde_json::to_string((*tracker).tracker.state()) {
        Ok(json) => string_to_cstr(&json),
        Err(e) => {
            set_last_error(&e.to_string());
            ptr::null_mut()
        }
    }
}

// ============================================================================
// Memory Management
// ============================================================================

/// Free a string returned by Stepwriter functions.
///
/// # Safety
/// - `ptr` must be a valid pointer returned by a Stepwriter function, or NULL.
/// - After calling this function, the pointer is invalid.
#[no_mangle]
pub unsafe extern "C" fn stepwriter_free_string(ptr: *mut c_char) {
    if !ptr.is_null() {
        drop(CString::from_raw(ptr));
    }
}

// ============================================================================
// Error Handling
// ============================================================================

/// Get the last error message.
///
/// # Safety
/// - Returns a pointer to a thread-local error string.
/// - The returned pointer is valid until the next Stepwriter call on this thread.
/// - Do NOT free the returned pointer.
/// - Returns NULL if no error occurred.
#[no_mangle]
pub unsafe extern "C" fn stepwriter_last_error() -> *const c_char {
    LAST_ERROR.with(|e| match &*e.borrow() {
        Some(cstr) => cstr.as_ptr(),
        None => ptr::null(),
    })
}

/// Get the Stepwriter library version.
///
/// # Safety
/// - Returns a pointer to a static string. Do NOT free.
#[no_mangle]
pub unsafe extern "C" fn stepwriter_version() -> *const c_char {
    static VERSION: &[u8] = concat!(env!("CARGO_PKG_VERSION"), "\0").as_bytes();
    VERSION.as_ptr() as *const c_char
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::TrackerState;
    use std::ffi::CString;

    #[test]
    fn test_ffi_calculate_metrics() {
        let json = CString::new(
            r#"{"totalSteps": 1000, "activeSeconds": 600, "activity": "Brisk Walking", "dailyGoal": 1000}"#,
        )
        .unwrap();

        unsafe {
            let result = stepwriter_calculate_metrics(json.as_ptr());
            assert!(!result.is_null());

            let result_str = CStr::from_ptr(result).to_str().unwrap();
            let value: serde_json::Value = serde_json::from_str(result_str).unwrap();
            assert_eq!(value["goalReached"], true);
            assert!((value["kilometers"].as_f64().unwrap() - 0.765).abs() < 1e-9);

            stepwriter_free_string(result);
        }
    }

    #[test]
    fn test_ffi_tracker_lifecycle() {
        let activity = CString::new("Brisk Walking").unwrap();

        unsafe {
            let tracker = stepwriter_tracker_new(activity.as_ptr(), 5, 170.0, 70.0);
            assert!(!tracker.is_null());

            let mut steps = 0;
            for i in 0..40u64 {
                steps += stepwriter_tracker_push_sample(tracker, 0.0, 3.0, 12.0, i * 500);
            }
            // clamped at the goal
            assert_eq!(steps, 5);
            assert_eq!(stepwriter_tracker_tick(tracker, 30_000), 0);

            let snapshot = stepwriter_tracker_snapshot(tracker);
            assert!(!snapshot.is_null());
            let state: TrackerState =
                serde_json::from_str(CStr::from_ptr(snapshot).to_str().unwrap()).unwrap();
            assert_eq!(state.step_count, 5);
            assert!(state.goal_reached);
            stepwriter_free_string(snapshot);

            assert_eq!(stepwriter_tracker_set_goal(tracker, 10), 0);
            assert_eq!(stepwriter_tracker_push_sample(tracker, 0.0, 3.0, 12.0, 40_000), 1);

            assert_eq!(stepwriter_tracker_set_body(tracker, -1.0, 70.0), -1);
            assert!(!stepwriter_last_error().is_null());

            stepwriter_tracker_free(tracker);
        }
    }

    #[test]
    fn test_ffi_error_handling() {
        unsafe {
            let invalid_json = CString::new("not json").unwrap();
            let result = stepwriter_calculate_metrics(invalid_json.as_ptr());
            assert!(result.is_null());

            let error = stepwriter_last_error();
            assert!(!error.is_null());
            let error_str = CStr::from_ptr(error).to_str().unwrap();
            assert!(!error_str.is_empty());

            let unknown = CString::new("Swimming").unwrap();
            let tracker = stepwriter_tracker_new(unknown.as_ptr(), 100, 170.0, 70.0);
            assert!(tracker.is_null());
            let error_str = CStr::from_ptr(stepwriter_last_error()).to_str().unwrap();
            assert!(error_str.contains("Swimming"));

            assert_eq!(stepwriter_tracker_push_sample(ptr::null_mut(), 0.0, 0.0, 9.8, 0), -1);
        }
    }

    #[test]
    fn test_ffi_version() {
        unsafe {
            let version = stepwriter_version();
            assert!(!version.is_null());

            let version_str = CStr::from_ptr(version).to_str().unwrap();
            assert!(!version_str.is_empty());
        }
    }
}
