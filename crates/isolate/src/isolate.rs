// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (c) 2025 ReifyDB

use std::{fs, path::Path};

use kiln_codegen::{GeneratedSource, GenerationRequest, generate};
use kiln_native::{Artifact, CcCompiler, Compiler, ExecuteError};
use kiln_plan::Plan;
use tracing::{debug, error, info, instrument};

use crate::{
	config::IsolateConfig,
	error::{Error, Result},
};

/// One independent plan to execution session.
///
/// Each stage consumes the product of the previous one: a plan is
/// ingested, lowered into C source, compiled into an artifact and the
/// artifact is executed. Installing a new product releases the products of
/// all later stages, the newest first.
pub struct Isolate {
	config: IsolateConfig,
	compiler: Box<dyn Compiler>,
	artifact: Option<Box<dyn Artifact>>,
	source: Option<GeneratedSource>,
	plan: Option<Plan>,
	poisoned: bool,
}

impl Isolate {
	/// Creates an isolate compiling with [`CcCompiler`].
	pub fn new(config: IsolateConfig) -> Result<Self> {
		let compiler = CcCompiler::new(config.compiler_config());
		Self::with_compiler(config, Box::new(compiler))
	}

	pub fn with_compiler(config: IsolateConfig, compiler: Box<dyn Compiler>) -> Result<Self> {
		fs::create_dir_all(&config.work_dir).map_err(|source| Error::ContextInit {
			path: config.work_dir.clone(),
			source,
		})?;
		debug!(work_dir = %config.work_dir.display(), "created isolate");
		Ok(Self {
			config,
			compiler,
			artifact: None,
			source: None,
			plan: None,
			poisoned: false,
		})
	}

	pub fn config(&self) -> &IsolateConfig {
		&self.config
	}

	pub fn plan(&self) -> Option<&Plan> {
		self.plan.as_ref()
	}

	pub fn source(&self) -> Option<&GeneratedSource> {
		self.source.as_ref()
	}

	pub fn artifact_path(&self) -> Option<&Path> {
		self.artifact.as_ref().map(|artifact| artifact.path())
	}

	pub fn is_poisoned(&self) -> bool {
		self.poisoned
	}

	/// Decodes a binary plan and installs it. Everything derived from an
	/// earlier plan is released first, also when decoding fails.
	#[instrument(name = "isolate::ingest", level = "debug", skip_all, fields(bytes = buffer.len()))]
	pub fn ingest(&mut self, buffer: &[u8]) -> Result<()> {
		self.check_poisoned()?;
		self.release();
		let plan = Plan::decode(buffer)?;
		self.install(plan)
	}

	/// Installs an already validated plan, releasing everything derived from
	/// an earlier one.
	pub fn install(&mut self, plan: Plan) -> Result<()> {
		self.check_poisoned()?;
		self.release();
		info!(nodes = plan.nodes().len(), database = plan.database(), "plan installed");
		self.plan = Some(plan);
		Ok(())
	}

	/// Lowers the installed plan with the stage and flags received as raw
	/// integers. Invalid values leave the isolate untouched.
	pub fn generate_raw(&mut self, stage: i32, flags: i32) -> Result<()> {
		self.check_poisoned()?;
		if self.plan.is_none() {
			return Err(Error::NoPlan);
		}
		let request = GenerationRequest::from_raw(stage, flags).map_err(|err| Error::unsupported(stage, flags, err))?;
		self.generate(request)
	}

	#[instrument(name = "isolate::generate", level = "debug", skip_all, fields(stage = %request.stage(), flags = %request.flags()))]
	pub fn generate(&mut self, request: GenerationRequest) -> Result<()> {
		self.check_poisoned()?;
		let plan = self.plan.as_ref().ok_or(Error::NoPlan)?;
		let source = generate(plan, request, &self.config.codegen_options()).map_err(|err| {
			Error::unsupported(request.stage() as i32, request.flags().bits() as i32, err)
		})?;
		self.release_artifact();
		self.source = Some(source);
		Ok(())
	}

	/// Compiles the generated source and returns the installed artifact. A
	/// failure keeps the previous artifact.
	#[instrument(name = "isolate::compile", level = "debug", skip_all)]
	pub fn compile(&mut self) -> Result<&dyn Artifact> {
		self.check_poisoned()?;
		let source = self.source.as_ref().ok_or(Error::NoGeneratedSource)?;
		let artifact = self.compiler.compile(source).inspect_err(|err| error!(%err, "compilation failed"))?;
		debug!(path = %artifact.path().display(), "compiled");
		self.release_artifact();
		Ok(&**self.artifact.insert(artifact))
	}

	/// Runs the compiled program with `args` as its argument vector and
	/// returns its exit status.
	#[instrument(name = "isolate::execute", level = "debug", skip_all)]
	pub fn execute(&mut self, args: &[String]) -> Result<i32> {
		self.check_poisoned()?;
		let artifact = self.artifact.as_mut().ok_or(Error::NoCompiledArtifact)?;
		match artifact.run(args) {
			Ok(status) => {
				debug!(status, "executed");
				Ok(status)
			}
			Err(err) => {
				if matches!(
					err,
					ExecuteError::Fault {
						..
					}
				) {
					error!(%err, "execution fault, isolate poisoned");
					self.poisoned = true;
				}
				Err(err.into())
			}
		}
	}

	/// Releases the artifact, the source and the plan, in that order.
	pub fn release(&mut self) {
		self.release_artifact();
		self.source = None;
		self.plan = None;
	}

	fn release_artifact(&mut self) {
		if let Some(artifact) = self.artifact.take() {
			debug!(path = %artifact.path().display(), "releasing artifact");
		}
	}

	fn check_poisoned(&self) -> Result<()> {
		if self.poisoned {
			return Err(Error::Poisoned);
		}
		Ok(())
	}
}

impl Drop for Isolate {
	fn drop(&mut self) {
		self.release();
	}
}

#[cfg(test)]
pub mod tests {
	use super::*;

	fn assert_send<T: Send>() {}

	#[test]
	fn test_isolate_is_send() {
		assert_send::<Isolate>();
	}
}
