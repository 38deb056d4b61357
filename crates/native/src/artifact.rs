// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (c) 2025 ReifyDB

use std::{
	ffi::{CString, c_char, c_int},
	path::{Path, PathBuf},
	process::Command,
	ptr,
};

use kiln_codegen::ENTRY_POINT;
use libloading::Library;
use tracing::{debug, instrument};

use crate::{
	build::BuildDir,
	error::{CompileError, ExecuteError},
};

const ENTRY_SYMBOL: &[u8] = b"run_main\0";

type EntryPoint = unsafe extern "C" fn(c_int, *mut *mut c_char) -> c_int;

/// A compiled program that can be run any number of times. Dropping it
/// releases everything the compilation produced.
pub trait Artifact: Send {
	/// Runs the program with `args` as its argument vector and returns its
	/// exit status.
	fn run(&mut self, args: &[String]) -> Result<i32, ExecuteError>;

	/// File the compiler produced.
	fn path(&self) -> &Path;
}

/// A shared library loaded into the current process.
///
/// The program runs on the calling thread. A crash inside it takes the host
/// process down.
pub struct NativeLibrary {
	entry: EntryPoint,
	// Unloaded before the build directory is removed.
	_library: Library,
	path: PathBuf,
	_build: BuildDir,
}

impl NativeLibrary {
	pub fn load(path: PathBuf, build: BuildDir) -> Result<Self, CompileError> {
		let library = unsafe { Library::new(path.as_os_str()) }.map_err(|err| CompileError::Load {
			path: path.clone(),
			reason: err.to_string(),
		})?;
		let entry = unsafe { library.get::<EntryPoint>(ENTRY_SYMBOL) }.map(|symbol| *symbol).map_err(|err| {
			CompileError::Load {
				path: path.clone(),
				reason: format!("missing `{}`: {}", ENTRY_POINT, err),
			}
		})?;
		debug!(path = %path.display(), "loaded library");
		Ok(Self {
			entry,
			_library: library,
			path,
			_build: build,
		})
	}
}

impl Artifact for NativeLibrary {
	#[instrument(name = "native::library::run", level = "debug", skip_all)]
	fn run(&mut self, args: &[String]) -> Result<i32, ExecuteError> {
		let args = c_args(args)?;
		let mut argv: Vec<*mut c_char> = args.iter().map(|arg| arg.as_ptr() as *mut c_char).collect();
		argv.push(ptr::null_mut());
		let argc = c_int::try_from(args.len()).map_err(|_| ExecuteError::InvalidArgument {
			index: args.len(),
			reason: "too many arguments".to_string(),
		})?;

		// `args` outlives the call and the loaded library keeps `entry` mapped.
		let status = unsafe { (self.entry)(argc, argv.as_mut_ptr()) };
		debug!(status, "program returned");
		Ok(status)
	}

	fn path(&self) -> &Path {
		&self.path
	}
}

impl Drop for NativeLibrary {
	fn drop(&mut self) {
		debug!(path = %self.path.display(), "unloading library");
	}
}

/// A standalone executable run as a supervised child process. A crash of the
/// program is reported as a fault instead of taking the host down.
pub struct NativeExecutable {
	path: PathBuf,
	_build: BuildDir,
}

impl NativeExecutable {
	pub fn new(path: PathBuf, build: BuildDir) -> Self {
		Self {
			path,
			_build: build,
		}
	}
}

impl Artifact for NativeExecutable {
	#[instrument(name = "native::executable::run", level = "debug", skip_all)]
	fn run(&mut self, args: &[String]) -> Result<i32, ExecuteError> {
		c_args(args)?;
		let status = Command::new(&self.path).args(args).status().map_err(|source| ExecuteError::Spawn {
			path: self.path.clone(),
			source,
		})?;
		match status.code() {
			Some(code) => {
				debug!(status = code, "program exited");
				Ok(code)
			}
			None => Err(ExecuteError::Fault {
				reason: termination(&status),
			}),
		}
	}

	fn path(&self) -> &Path {
		&self.path
	}
}

#[cfg(unix)]
fn termination(status: &std::process::ExitStatus) -> String {
	use std::os::unix::process::ExitStatusExt;

	match status.signal() {
		Some(signal) => format!("killed by signal {}", signal),
		None => status.to_string(),
	}
}

#[cfg(not(unix))]
fn termination(status: &std::process::ExitStatus) -> String {
	status.to_string()
}

fn c_args(args: &[String]) -> Result<Vec<CString>, ExecuteError> {
	args.iter()
		.enumerate()
		.map(|(index, arg)| {
			CString::new(arg.as_str()).map_err(|_| ExecuteError::InvalidArgument {
				index,
				reason: "contains a NUL byte".to_string(),
			})
		})
		.collect()
}
