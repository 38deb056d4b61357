// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (c) 2025 ReifyDB

use crate::request::{Flags, GenerationRequest, Stage};

/// Arguments a C compiler needs on top of its defaults to build a source.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct CompileOptions {
	args: Vec<String>,
}

impl CompileOptions {
	pub(crate) fn for_request(request: GenerationRequest) -> Self {
		let mut args = match request.stage() {
			Stage::Scalar => vec!["-O2".to_string()],
			Stage::Vectorised => vec!["-O3".to_string()],
		};
		if request.has(Flags::SIMD_HINTS) {
			args.push("-fopenmp-simd".to_string());
			args.push("-ftree-vectorize".to_string());
		}
		Self {
			args,
		}
	}

	pub fn args(&self) -> &[String] {
		&self.args
	}
}

/// The C translation unit generated for one plan and request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GeneratedSource {
	request: GenerationRequest,
	text: String,
	options: CompileOptions,
}

impl GeneratedSource {
	pub(crate) fn new(request: GenerationRequest, text: String) -> Self {
		Self {
			request,
			text,
			options: CompileOptions::for_request(request),
		}
	}

	pub fn request(&self) -> GenerationRequest {
		self.request
	}

	pub fn text(&self) -> &str {
		&self.text
	}

	pub fn compile_options(&self) -> &CompileOptions {
		&self.options
	}

	pub fn into_text(self) -> String {
		self.text
	}
}

#[cfg(test)]
pub mod tests {
	use super::*;

	#[test]
	fn test_scalar_options() {
		let request = GenerationRequest::new(Stage::Scalar, Flags::PROFILE).unwrap();
		assert_eq!(CompileOptions::for_request(request).args(), ["-O2"]);
	}

	#[test]
	fn test_simd_options() {
		let request = GenerationRequest::new(Stage::Vectorised, Flags::SIMD_HINTS).unwrap();
		assert_eq!(CompileOptions::for_request(request).args(), ["-O3", "-fopenmp-simd", "-ftree-vectorize"]);
	}
}
