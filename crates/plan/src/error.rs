// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (c) 2025 ReifyDB

use thiserror::Error;

use crate::operator::NodeId;

/// Failure to decode a binary plan buffer.
///
/// `offset` is the position of the offending byte, or the start of the
/// offending node when the buffer decoded but the plan did not validate.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("invalid plan at byte {offset}: {reason}")]
pub struct DecodeError {
	pub offset: usize,
	pub reason: String,
}

impl DecodeError {
	pub fn new(offset: usize, reason: impl Into<String>) -> Self {
		Self {
			offset,
			reason: reason.into(),
		}
	}
}

/// A structurally well-formed plan that breaks a typing or shape rule.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("invalid node {node}: {reason}")]
pub struct ValidationError {
	pub node: NodeId,
	pub reason: String,
}

impl ValidationError {
	pub fn new(node: NodeId, reason: impl Into<String>) -> Self {
		Self {
			node,
			reason: reason.into(),
		}
	}
}

/// Failure to parse the text plan format, `line` is 1-based.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("line {line}: {reason}")]
pub struct TextError {
	pub line: usize,
	pub reason: String,
}

impl TextError {
	pub fn new(line: usize, reason: impl Into<String>) -> Self {
		Self {
			line,
			reason: reason.into(),
		}
	}
}
