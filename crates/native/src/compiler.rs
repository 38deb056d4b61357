// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (c) 2025 ReifyDB

use std::{
	env::{
		self,
		consts::{DLL_EXTENSION, EXE_SUFFIX},
	},
	fs,
	path::{Path, PathBuf},
	process::Command,
};

use kiln_codegen::{GeneratedSource, STANDALONE_DEFINE};
use serde::{Deserialize, Serialize};
use tracing::{debug, instrument, warn};

use crate::{
	artifact::{Artifact, NativeExecutable, NativeLibrary},
	build::BuildDir,
	error::CompileError,
};

/// Turns generated C source into something that can be run.
pub trait Compiler: Send {
	fn compile(&self, source: &GeneratedSource) -> Result<Box<dyn Artifact>, CompileError>;
}

/// Form of the compiled program.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ArtifactKind {
	/// A shared library whose `run_main` is called in process.
	#[default]
	SharedLibrary,
	/// A standalone executable run as a supervised child process.
	Executable,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CompilerConfig {
	pub program: String,
	pub args: Vec<String>,
	pub artifact: ArtifactKind,
	pub work_dir: PathBuf,
	pub keep_artifacts: bool,
	pub warnings_as_errors: bool,
}

impl Default for CompilerConfig {
	fn default() -> Self {
		Self {
			program: "cc".to_string(),
			args: Vec::new(),
			artifact: ArtifactKind::default(),
			work_dir: env::temp_dir(),
			keep_artifacts: false,
			warnings_as_errors: false,
		}
	}
}

/// Runs a C compiler as a subprocess, one fresh build directory per compilation.
#[derive(Debug, Clone, Default)]
pub struct CcCompiler {
	config: CompilerConfig,
}

impl CcCompiler {
	pub fn new(config: CompilerConfig) -> Self {
		Self {
			config,
		}
	}

	pub fn config(&self) -> &CompilerConfig {
		&self.config
	}

	fn command(&self, source: &GeneratedSource, input: &Path, output: &Path) -> Command {
		let mut command = Command::new(&self.config.program);
		command.arg("-std=c99").arg("-Wall");
		match self.config.artifact {
			ArtifactKind::SharedLibrary => {
				command.arg("-fPIC").arg("-shared");
			}
			ArtifactKind::Executable => {
				command.arg(format!("-D{}", STANDALONE_DEFINE));
			}
		}
		command.args(source.compile_options().args());
		command.args(&self.config.args);
		command.arg("-o").arg(output).arg(input).arg("-lm");
		command
	}
}

impl Compiler for CcCompiler {
	#[instrument(name = "native::compile", level = "debug", skip_all)]
	fn compile(&self, source: &GeneratedSource) -> Result<Box<dyn Artifact>, CompileError> {
		let build = BuildDir::create(&self.config.work_dir, self.config.keep_artifacts)?;
		let input = build.join("query.c");
		fs::write(&input, source.text()).map_err(|err| CompileError::BuildDir {
			path: input.clone(),
			source: err,
		})?;
		let output = match self.config.artifact {
			ArtifactKind::SharedLibrary => build.join(&format!("query.{}", DLL_EXTENSION)),
			ArtifactKind::Executable => build.join(&format!("query{}", EXE_SUFFIX)),
		};

		let mut command = self.command(source, &input, &output);
		debug!(?command, "running compiler");
		let result = command.output().map_err(|err| CompileError::Spawn {
			program: self.config.program.clone(),
			source: err,
		})?;
		let diagnostics = String::from_utf8_lossy(&result.stderr).into_owned();

		if !result.status.success() {
			return Err(CompileError::Failed {
				status: result.status.code(),
				diagnostics,
			});
		}
		if !diagnostics.trim().is_empty() {
			if self.config.warnings_as_errors {
				return Err(CompileError::Diagnostics {
					diagnostics,
				});
			}
			warn!(%diagnostics, "compiler reported diagnostics");
		}

		Ok(match self.config.artifact {
			ArtifactKind::SharedLibrary => Box::new(NativeLibrary::load(output, build)?),
			ArtifactKind::Executable => Box::new(NativeExecutable::new(output, build)),
		})
	}
}

#[cfg(test)]
pub mod tests {
	use kiln_codegen::{CodegenOptions, Flags, GenerationRequest, Stage, generate};
	use kiln_plan::Plan;

	use super::*;

	fn source() -> GeneratedSource {
		let plan = Plan::parse("scan t 0:int\n").unwrap();
		let request = GenerationRequest::new(Stage::Scalar, Flags::NONE).unwrap();
		generate(&plan, request, &CodegenOptions::default()).unwrap()
	}

	#[test]
	fn test_artifact_kind_serde() {
		let kind: ArtifactKind = serde_json::from_str("\"executable\"").unwrap();
		assert_eq!(kind, ArtifactKind::Executable);
		assert_eq!(serde_json::to_string(&ArtifactKind::SharedLibrary).unwrap(), "\"shared_library\"");
	}

	#[test]
	fn test_missing_compiler() {
		let compiler = CcCompiler::new(CompilerConfig {
			program: "kiln-no-such-compiler".to_string(),
			..CompilerConfig::default()
		});
		let err = compiler.compile(&source()).err().unwrap();
		assert!(
			matches!(
				err,
				CompileError::Spawn {
					..
				}
			),
			"{}",
			err
		);
		assert_eq!(err.diagnostics(), "");
	}

	#[test]
	fn test_command_line() {
		let compiler = CcCompiler::new(CompilerConfig {
			args: vec!["-g".to_string()],
			artifact: ArtifactKind::Executable,
			..CompilerConfig::default()
		});
		let command = compiler.command(&source(), &PathBuf::from("in.c"), &PathBuf::from("out"));
		let args = command.get_args().map(|arg| arg.to_string_lossy().into_owned()).collect::<Vec<_>>();
		assert_eq!(args, ["-std=c99", "-Wall", "-DKILN_STANDALONE", "-O2", "-g", "-o", "out", "in.c", "-lm"]);
	}
}
