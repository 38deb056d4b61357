// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (c) 2025 ReifyDB

//! C interface, declared in `include/kiln.h`.
//!
//! Every function returns a status code: `0` on success, a negative code of
//! [`Error::code`] otherwise. The message of the last failure of an isolate
//! is available through [`kiln_last_error`] until the next call on it.
//! Panics never unwind into the caller, the process aborts instead.

use std::{
	ffi::{CStr, CString, c_char, c_int},
	panic::{AssertUnwindSafe, catch_unwind},
	process::abort,
	ptr, slice,
};

use kiln_native::Artifact;
use tracing::error;

use crate::{
	config::IsolateConfig,
	error::{Error, Result},
	isolate::Isolate,
};

pub const KILN_OK: i32 = 0;
pub const KILN_ERROR_NULL_HANDLE: i32 = -11;

/// Handle handed out to C callers.
pub struct KilnIsolate {
	isolate: Isolate,
	artifact: Option<KilnArtifact>,
	last_error: Option<CString>,
}

/// Compiled artifact as seen from C. Owned by its isolate and valid until
/// the next ingest, generate or compile on it.
pub struct KilnArtifact {
	path: CString,
}

impl KilnArtifact {
	fn new(artifact: &dyn Artifact) -> Self {
		Self {
			path: CString::new(artifact.path().as_os_str().as_encoded_bytes()).unwrap_or_default(),
		}
	}
}

impl KilnIsolate {
	fn record(&mut self, result: Result<()>) -> i32 {
		match result {
			Ok(()) => {
				self.last_error = None;
				KILN_OK
			}
			Err(err) => {
				let code = err.code();
				self.last_error = CString::new(err.to_string().replace('\0', " ")).ok();
				code
			}
		}
	}
}

fn guard<F: FnOnce() -> i32>(name: &str, f: F) -> i32 {
	match catch_unwind(AssertUnwindSafe(f)) {
		Ok(code) => code,
		Err(panic) => {
			let message = if let Some(s) = panic.downcast_ref::<&str>() {
				s.to_string()
			} else if let Some(s) = panic.downcast_ref::<String>() {
				s.clone()
			} else {
				"unknown panic".to_string()
			};
			error!("{} panicked: {}", name, message);
			abort();
		}
	}
}

fn with_isolate<F>(name: &str, handle: *mut KilnIsolate, f: F) -> i32
where
	F: FnOnce(&mut KilnIsolate) -> Result<()>,
{
	guard(name, || {
		// SAFETY: non-null handles come from kiln_create_isolate and are not
		// shared between threads by contract.
		let Some(handle) = (unsafe { handle.as_mut() }) else {
			return KILN_ERROR_NULL_HANDLE;
		};
		let result = f(handle);
		handle.record(result)
	})
}

/// Creates an isolate from an optional JSON configuration and stores its
/// handle in `out`.
///
/// # Safety
/// `config_json` is null or a NUL terminated string, `out` is writable.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn kiln_create_isolate(config_json: *const c_char, out: *mut *mut KilnIsolate) -> c_int {
	guard("kiln_create_isolate", || {
		if out.is_null() {
			return KILN_ERROR_NULL_HANDLE;
		}
		let config = if config_json.is_null() {
			IsolateConfig::default()
		} else {
			let json = unsafe { CStr::from_ptr(config_json) };
			match json.to_str().ok().map(IsolateConfig::from_json) {
				Some(Ok(config)) => config,
				Some(Err(err)) => {
					error!(%err, "invalid isolate configuration");
					return Error::InvalidArgument(err.to_string()).code();
				}
				None => return Error::InvalidArgument("configuration is not UTF-8".to_string()).code(),
			}
		};
		match Isolate::new(config) {
			Ok(isolate) => {
				let handle = Box::new(KilnIsolate {
					isolate,
					artifact: None,
					last_error: None,
				});
				unsafe { *out = Box::into_raw(handle) };
				KILN_OK
			}
			Err(err) => {
				error!(%err, "failed to create isolate");
				unsafe { *out = ptr::null_mut() };
				err.code()
			}
		}
	})
}

/// Ingests a binary plan of `len` bytes.
///
/// # Safety
/// `handle` comes from [`kiln_create_isolate`], `buffer` points to `len` readable bytes.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn kiln_plan(handle: *mut KilnIsolate, buffer: *const u8, len: usize) -> c_int {
	with_isolate("kiln_plan", handle, |handle| {
		if buffer.is_null() {
			if len != 0 {
				return Err(Error::InvalidArgument("null plan buffer".to_string()));
			}
			handle.artifact = None;
			return handle.isolate.ingest(&[]);
		}
		let bytes = unsafe { slice::from_raw_parts(buffer, len) };
		handle.artifact = None;
		handle.isolate.ingest(bytes)
	})
}

/// Generates code for the ingested plan.
///
/// # Safety
/// `handle` comes from [`kiln_create_isolate`].
#[unsafe(no_mangle)]
pub unsafe extern "C" fn kiln_code_gen(handle: *mut KilnIsolate, stage: c_int, flags: c_int) -> c_int {
	with_isolate("kiln_code_gen", handle, |handle| {
		handle.isolate.generate_raw(stage, flags)?;
		handle.artifact = None;
		Ok(())
	})
}

/// Compiles the generated code and stores the artifact handle in
/// `artifact_out`, or null on failure. A failed compile keeps the previous
/// artifact runnable.
///
/// # Safety
/// `handle` comes from [`kiln_create_isolate`], `artifact_out` is null or writable.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn kiln_compile(handle: *mut KilnIsolate, artifact_out: *mut *const KilnArtifact) -> c_int {
	if !artifact_out.is_null() {
		unsafe { *artifact_out = ptr::null() };
	}
	with_isolate("kiln_compile", handle, |handle| {
		let artifact = handle.isolate.compile().map(KilnArtifact::new)?;
		let artifact: *const KilnArtifact = handle.artifact.insert(artifact);
		if !artifact_out.is_null() {
			unsafe { *artifact_out = artifact };
		}
		Ok(())
	})
}

/// File of a compiled artifact, or null for a null artifact.
///
/// # Safety
/// `artifact` is null or was returned by [`kiln_compile`] and is still valid.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn kiln_artifact_path(artifact: *const KilnArtifact) -> *const c_char {
	match unsafe { artifact.as_ref() } {
		Some(artifact) => artifact.path.as_ptr(),
		None => ptr::null(),
	}
}

/// Runs the compiled program with `argc` arguments and stores its exit
/// status in `status`.
///
/// # Safety
/// `handle` comes from [`kiln_create_isolate`], `argv` holds `argc` NUL
/// terminated strings, `status` is writable.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn kiln_run_main(
	handle: *mut KilnIsolate,
	argc: c_int,
	argv: *const *const c_char,
	status: *mut c_int,
) -> c_int {
	with_isolate("kiln_run_main", handle, |handle| {
		if status.is_null() {
			return Err(Error::InvalidArgument("null status pointer".to_string()));
		}
		let count = usize::try_from(argc).map_err(|_| Error::InvalidArgument(format!("argc {}", argc)))?;
		if count > 0 && argv.is_null() {
			return Err(Error::InvalidArgument("null argv".to_string()));
		}
		let mut args = Vec::with_capacity(count);
		for index in 0..count {
			let arg = unsafe { *argv.add(index) };
			if arg.is_null() {
				return Err(Error::InvalidArgument(format!("argv[{}] is null", index)));
			}
			let arg = unsafe { CStr::from_ptr(arg) };
			let arg = arg.to_str().map_err(|_| Error::InvalidArgument(format!("argv[{}] is not UTF-8", index)))?;
			args.push(arg.to_string());
		}
		let code = handle.isolate.execute(&args)?;
		unsafe { *status = code };
		Ok(())
	})
}

/// Message of the last failed call on `handle`, or null. The pointer is
/// valid until the next call on the same handle.
///
/// # Safety
/// `handle` is null or comes from [`kiln_create_isolate`].
#[unsafe(no_mangle)]
pub unsafe extern "C" fn kiln_last_error(handle: *const KilnIsolate) -> *const c_char {
	match unsafe { handle.as_ref() } {
		Some(handle) => handle.last_error.as_ref().map_or(ptr::null(), |message| message.as_ptr()),
		None => ptr::null(),
	}
}

/// Releases the isolate and everything it holds. Null is ignored.
///
/// # Safety
/// `handle` is null or comes from [`kiln_create_isolate`] and is not used afterwards.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn kiln_destroy_isolate(handle: *mut KilnIsolate) {
	guard("kiln_destroy_isolate", || {
		if !handle.is_null() {
			drop(unsafe { Box::from_raw(handle) });
		}
		KILN_OK
	});
}
