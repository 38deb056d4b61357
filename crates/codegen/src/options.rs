// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (c) 2025 ReifyDB

/// Default number of rows per batch of the vectorised stage.
pub const DEFAULT_VECTOR_SIZE: usize = 1024;

/// Largest batch the vectorised stage accepts. Larger sizes are clamped.
pub const MAX_VECTOR_SIZE: usize = 1 << 20;

/// Generator settings that are not part of a request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CodegenOptions {
	/// Rows per batch of the vectorised stage, clamped to `1..=MAX_VECTOR_SIZE`.
	pub vector_size: usize,
}

impl Default for CodegenOptions {
	fn default() -> Self {
		Self {
			vector_size: DEFAULT_VECTOR_SIZE,
		}
	}
}
