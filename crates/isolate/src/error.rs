// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (c) 2025 ReifyDB

use std::{io, path::PathBuf};

use kiln_codegen::GenerateError;
use kiln_native::{CompileError, ExecuteError};
use kiln_plan::DecodeError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
	#[error("cannot create isolate work directory {path}: {source}")]
	ContextInit {
		path: PathBuf,
		#[source]
		source: io::Error,
	},

	#[error("plan parse error at offset {offset}: {reason}")]
	PlanParse {
		offset: usize,
		reason: String,
	},

	#[error("no plan has been ingested")]
	NoPlan,

	#[error("no source has been generated")]
	NoGeneratedSource,

	#[error("no artifact has been compiled")]
	NoCompiledArtifact,

	#[error("unsupported stage {stage} with flags 0x{flags:x}: {reason}")]
	UnsupportedStage {
		stage: i32,
		flags: i32,
		reason: String,
	},

	#[error("compilation failed: {message}")]
	Compile {
		message: String,
		diagnostics: String,
	},

	#[error("invalid argument: {0}")]
	InvalidArgument(String),

	#[error("execution fault: {0}")]
	ExecutionFault(String),

	#[error("isolate is poisoned by an earlier execution fault")]
	Poisoned,
}

impl Error {
	/// Status code reported across the C interface.
	pub fn code(&self) -> i32 {
		match self {
			Error::ContextInit {
				..
			} => -1,
			Error::PlanParse {
				..
			} => -2,
			Error::NoPlan => -3,
			Error::UnsupportedStage {
				..
			} => -4,
			Error::NoGeneratedSource => -5,
			Error::Compile {
				..
			} => -6,
			Error::NoCompiledArtifact => -7,
			Error::InvalidArgument(_) => -8,
			Error::ExecutionFault(_) => -9,
			Error::Poisoned => -10,
		}
	}

	pub(crate) fn unsupported(stage: i32, flags: i32, err: GenerateError) -> Self {
		Error::UnsupportedStage {
			stage,
			flags,
			reason: err.to_string(),
		}
	}
}

impl From<DecodeError> for Error {
	fn from(err: DecodeError) -> Self {
		Error::PlanParse {
			offset: err.offset,
			reason: err.reason,
		}
	}
}

impl From<CompileError> for Error {
	fn from(err: CompileError) -> Self {
		Error::Compile {
			message: err.to_string(),
			diagnostics: err.diagnostics().to_string(),
		}
	}
}

impl From<ExecuteError> for Error {
	fn from(err: ExecuteError) -> Self {
		match err {
			ExecuteError::InvalidArgument {
				..
			} => Error::InvalidArgument(err.to_string()),
			ExecuteError::Spawn {
				..
			}
			| ExecuteError::Fault {
				..
			} => Error::ExecutionFault(err.to_string()),
		}
	}
}

pub type Result<T> = std::result::Result<T, Error>;
