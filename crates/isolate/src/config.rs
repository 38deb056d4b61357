// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (c) 2025 ReifyDB

use std::{env, path::PathBuf};

use kiln_codegen::{CodegenOptions, DEFAULT_VECTOR_SIZE, MAX_VECTOR_SIZE};
use kiln_native::{ArtifactKind, CompilerConfig};
use serde::{Deserialize, Deserializer, Serialize, de::Error as _};

/// Settings of one isolate. Every field has a default, so a configuration
/// file only names what it changes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct IsolateConfig {
	/// Directory build directories are created in.
	pub work_dir: PathBuf,
	/// C compiler program.
	pub compiler: String,
	/// Extra compiler arguments, appended after the generated ones.
	pub compiler_args: Vec<String>,
	pub artifact: ArtifactKind,
	/// Keep build directories after their artifact is released.
	pub keep_artifacts: bool,
	/// Treat any compiler diagnostic as a compile failure.
	pub warnings_as_errors: bool,
	/// Rows per batch of the vectorised stage, `1..=MAX_VECTOR_SIZE`.
	#[serde(deserialize_with = "deserialize_vector_size")]
	pub vector_size: usize,
}

fn deserialize_vector_size<'de, D>(deserializer: D) -> Result<usize, D::Error>
where
	D: Deserializer<'de>,
{
	let rows = usize::deserialize(deserializer)?;
	if rows == 0 || rows > MAX_VECTOR_SIZE {
		return Err(D::Error::custom(format!("vector_size must be between 1 and {}, got {}", MAX_VECTOR_SIZE, rows)));
	}
	Ok(rows)
}

impl Default for IsolateConfig {
	fn default() -> Self {
		Self {
			work_dir: env::temp_dir(),
			compiler: "cc".to_string(),
			compiler_args: Vec::new(),
			artifact: ArtifactKind::default(),
			keep_artifacts: false,
			warnings_as_errors: false,
			vector_size: DEFAULT_VECTOR_SIZE,
		}
	}
}

impl IsolateConfig {
	pub fn builder() -> IsolateConfigBuilder {
		IsolateConfigBuilder::default()
	}

	pub fn from_json(json: &str) -> serde_json::Result<Self> {
		serde_json::from_str(json)
	}

	pub fn compiler_config(&self) -> CompilerConfig {
		CompilerConfig {
			program: self.compiler.clone(),
			args: self.compiler_args.clone(),
			artifact: self.artifact,
			work_dir: self.work_dir.clone(),
			keep_artifacts: self.keep_artifacts,
			warnings_as_errors: self.warnings_as_errors,
		}
	}

	pub fn codegen_options(&self) -> CodegenOptions {
		CodegenOptions {
			vector_size: self.vector_size.clamp(1, MAX_VECTOR_SIZE),
		}
	}
}

#[derive(Debug, Default)]
pub struct IsolateConfigBuilder {
	work_dir: Option<PathBuf>,
	compiler: Option<String>,
	compiler_args: Vec<String>,
	artifact: Option<ArtifactKind>,
	keep_artifacts: bool,
	warnings_as_errors: bool,
	vector_size: Option<usize>,
}

impl IsolateConfigBuilder {
	pub fn work_dir(mut self, path: impl Into<PathBuf>) -> Self {
		self.work_dir = Some(path.into());
		self
	}

	pub fn compiler(mut self, program: impl Into<String>) -> Self {
		self.compiler = Some(program.into());
		self
	}

	pub fn compiler_arg(mut self, arg: impl Into<String>) -> Self {
		self.compiler_args.push(arg.into());
		self
	}

	pub fn artifact(mut self, kind: ArtifactKind) -> Self {
		self.artifact = Some(kind);
		self
	}

	pub fn keep_artifacts(mut self, keep: bool) -> Self {
		self.keep_artifacts = keep;
		self
	}

	pub fn warnings_as_errors(mut self, enabled: bool) -> Self {
		self.warnings_as_errors = enabled;
		self
	}

	/// Rows per vectorised batch, clamped to `1..=MAX_VECTOR_SIZE`.
	pub fn vector_size(mut self, rows: usize) -> Self {
		self.vector_size = Some(rows.clamp(1, MAX_VECTOR_SIZE));
		self
	}

	pub fn build(self) -> IsolateConfig {
		let defaults = IsolateConfig::default();
		IsolateConfig {
			work_dir: self.work_dir.unwrap_or(defaults.work_dir),
			compiler: self.compiler.unwrap_or(defaults.compiler),
			compiler_args: self.compiler_args,
			artifact: self.artifact.unwrap_or(defaults.artifact),
			keep_artifacts: self.keep_artifacts,
			warnings_as_errors: self.warnings_as_errors,
			vector_size: self.vector_size.unwrap_or(defaults.vector_size),
		}
	}
}

#[cfg(test)]
pub mod tests {
	use super::*;

	#[test]
	fn test_builder_defaults() {
		assert_eq!(IsolateConfig::builder().build(), IsolateConfig::default());
	}

	#[test]
	fn test_builder() {
		let config = IsolateConfig::builder()
			.compiler("clang")
			.compiler_arg("-g")
			.artifact(ArtifactKind::Executable)
			.vector_size(0)
			.build();
		assert_eq!(config.compiler, "clang");
		assert_eq!(config.compiler_args, ["-g"]);
		assert_eq!(config.vector_size, 1);
		assert_eq!(config.compiler_config().artifact, ArtifactKind::Executable);
	}

	#[test]
	fn test_partial_json() {
		let config = IsolateConfig::from_json(r#"{"compiler": "gcc", "vector_size": 256}"#).unwrap();
		assert_eq!(config.compiler, "gcc");
		assert_eq!(config.codegen_options().vector_size, 256);
		assert_eq!(config.artifact, ArtifactKind::SharedLibrary);
	}

	#[test]
	fn test_vector_size_bounds() {
		assert_eq!(IsolateConfig::builder().vector_size(usize::MAX).build().vector_size, MAX_VECTOR_SIZE);

		let err = IsolateConfig::from_json(r#"{"vector_size": 0}"#).unwrap_err();
		assert!(err.to_string().contains("vector_size must be between"), "{}", err);
		let json = format!("{{\"vector_size\": {}}}", MAX_VECTOR_SIZE + 1);
		assert!(IsolateConfig::from_json(&json).is_err());
		let json = format!("{{\"vector_size\": {}}}", MAX_VECTOR_SIZE);
		assert_eq!(IsolateConfig::from_json(&json).unwrap().vector_size, MAX_VECTOR_SIZE);

		let config = IsolateConfig {
			vector_size: usize::MAX,
			..IsolateConfig::default()
		};
		assert_eq!(config.codegen_options().vector_size, MAX_VECTOR_SIZE);
	}

	#[test]
	fn test_unknown_field_rejected() {
		assert!(IsolateConfig::from_json(r#"{"optimise": true}"#).is_err());
	}
}
