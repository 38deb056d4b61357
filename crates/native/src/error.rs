// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (c) 2025 ReifyDB

use std::{io, path::PathBuf};

use thiserror::Error;

#[derive(Debug, Error)]
pub enum CompileError {
	#[error("failed to prepare build directory {path}: {source}")]
	BuildDir {
		path: PathBuf,
		#[source]
		source: io::Error,
	},

	#[error("failed to run compiler `{program}`: {source}")]
	Spawn {
		program: String,
		#[source]
		source: io::Error,
	},

	#[error("compiler exited with {}:\n{diagnostics}", exit_description(.status))]
	Failed {
		status: Option<i32>,
		diagnostics: String,
	},

	#[error("compiler reported diagnostics:\n{diagnostics}")]
	Diagnostics {
		diagnostics: String,
	},

	#[error("failed to load {path}: {reason}")]
	Load {
		path: PathBuf,
		reason: String,
	},
}

impl CompileError {
	/// Text the compiler printed, verbatim. Empty for failures that happened
	/// outside the compiler.
	pub fn diagnostics(&self) -> &str {
		match self {
			CompileError::Failed {
				diagnostics,
				..
			}
			| CompileError::Diagnostics {
				diagnostics,
			} => diagnostics,
			_ => "",
		}
	}
}

fn exit_description(status: &Option<i32>) -> String {
	match status {
		Some(code) => format!("status {}", code),
		None => "a signal".to_string(),
	}
}

#[derive(Debug, Error)]
pub enum ExecuteError {
	#[error("invalid argument {index}: {reason}")]
	InvalidArgument {
		index: usize,
		reason: String,
	},

	#[error("failed to start {path}: {source}")]
	Spawn {
		path: PathBuf,
		#[source]
		source: io::Error,
	},

	#[error("program terminated abnormally: {reason}")]
	Fault {
		reason: String,
	},
}
