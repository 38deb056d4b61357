// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (c) 2025 ReifyDB

//! A compiler that never runs a C compiler, counting what happens to the
//! artifacts it hands out.

use std::{
	path::{Path, PathBuf},
	sync::{
		Arc,
		atomic::{AtomicUsize, Ordering},
	},
};

use kiln_codegen::GeneratedSource;
use kiln_native::{Artifact, CompileError, Compiler, ExecuteError};
use parking_lot::Mutex;

#[derive(Debug, Default)]
pub struct Counters {
	pub compiled: AtomicUsize,
	pub runs: AtomicUsize,
	pub released: AtomicUsize,
}

impl Counters {
	pub fn compiled(&self) -> usize {
		self.compiled.load(Ordering::SeqCst)
	}

	pub fn runs(&self) -> usize {
		self.runs.load(Ordering::SeqCst)
	}

	pub fn released(&self) -> usize {
		self.released.load(Ordering::SeqCst)
	}
}

#[derive(Debug, Clone, Default)]
pub struct FakeCompiler {
	counters: Arc<Counters>,
	status: i32,
	failure: Arc<Mutex<Option<String>>>,
}

impl FakeCompiler {
	pub fn new() -> Self {
		Self::default()
	}

	/// Artifacts exit with `status`.
	pub fn with_status(mut self, status: i32) -> Self {
		self.status = status;
		self
	}

	/// While `diagnostics` is set, every compilation by this compiler or one
	/// of its clones fails with it.
	pub fn fail_with(&self, diagnostics: Option<String>) {
		*self.failure.lock() = diagnostics;
	}

	pub fn counters(&self) -> Arc<Counters> {
		self.counters.clone()
	}
}

impl Compiler for FakeCompiler {
	fn compile(&self, source: &GeneratedSource) -> Result<Box<dyn Artifact>, CompileError> {
		if let Some(diagnostics) = self.failure.lock().clone() {
			return Err(CompileError::Failed {
				status: Some(1),
				diagnostics,
			});
		}
		let id = self.counters.compiled.fetch_add(1, Ordering::SeqCst);
		Ok(Box::new(FakeArtifact {
			path: PathBuf::from(format!("fake-{}-{}.so", source.request().stage(), id)),
			status: self.status,
			args: Vec::new(),
			counters: self.counters.clone(),
		}))
	}
}

#[derive(Debug)]
pub struct FakeArtifact {
	path: PathBuf,
	status: i32,
	args: Vec<String>,
	counters: Arc<Counters>,
}

impl Artifact for FakeArtifact {
	fn run(&mut self, args: &[String]) -> Result<i32, ExecuteError> {
		self.counters.runs.fetch_add(1, Ordering::SeqCst);
		self.args = args.to_vec();
		Ok(self.status)
	}

	fn path(&self) -> &Path {
		&self.path
	}
}

impl Drop for FakeArtifact {
	fn drop(&mut self) {
		self.counters.released.fetch_add(1, Ordering::SeqCst);
	}
}
