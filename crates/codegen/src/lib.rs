// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (c) 2025 ReifyDB

//! C code generation for Kiln plans.
//!
//! [`generate`] lowers a validated [`Plan`] into one self-contained C99
//! translation unit exporting `run_main`. The [`Stage`] selects the lowering
//! strategy, [`Flags`] toggle optional behaviour of the generated program.
//! Generation is deterministic.

mod emit;
mod error;
mod options;
mod request;
mod source;
mod writer;

pub use error::{GenerateError, Result};
use kiln_plan::Plan;
pub use options::{CodegenOptions, DEFAULT_VECTOR_SIZE, MAX_VECTOR_SIZE};
pub use request::{Flags, GenerationRequest, Stage};
pub use source::{CompileOptions, GeneratedSource};
use tracing::{debug, instrument};

/// Symbol every generated program exports.
pub const ENTRY_POINT: &str = "run_main";

/// Preprocessor symbol that makes a generated program define `main`.
pub const STANDALONE_DEFINE: &str = "KILN_STANDALONE";

#[instrument(name = "codegen::generate", level = "debug", skip_all, fields(stage = %request.stage(), flags = %request.flags()))]
pub fn generate(plan: &Plan, request: GenerationRequest, options: &CodegenOptions) -> Result<GeneratedSource> {
	let text = emit::lower(plan, request, options)?;
	debug!(nodes = plan.nodes().len(), bytes = text.len(), "generated source");
	Ok(GeneratedSource::new(request, text))
}
