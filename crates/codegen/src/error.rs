// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (c) 2025 ReifyDB

use thiserror::Error;

use crate::request::Stage;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum GenerateError {
	#[error("unknown stage {stage}")]
	UnknownStage {
		stage: i32,
	},

	#[error("flags 0x{flags:x} are not supported by the {stage} stage (unsupported bits 0x{unsupported:x})")]
	UnsupportedFlags {
		stage: Stage,
		flags: u32,
		unsupported: u32,
	},

	#[error("cannot lower plan: {0}")]
	Lowering(String),
}

pub type Result<T> = std::result::Result<T, GenerateError>;
