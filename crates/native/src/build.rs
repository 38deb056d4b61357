// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (c) 2025 ReifyDB

use std::{
	fs,
	path::{Path, PathBuf},
};

use tracing::{debug, warn};
use uuid::Uuid;

use crate::error::CompileError;

/// A uniquely named directory holding one compilation. Removed on drop
/// unless it is kept for inspection.
#[derive(Debug)]
pub struct BuildDir {
	path: PathBuf,
	keep: bool,
}

impl BuildDir {
	pub fn create(work_dir: &Path, keep: bool) -> Result<Self, CompileError> {
		let path = work_dir.join(format!("kiln-{}", Uuid::now_v7()));
		fs::create_dir_all(&path).map_err(|source| CompileError::BuildDir {
			path: path.clone(),
			source,
		})?;
		debug!(path = %path.display(), "created build directory");
		Ok(Self {
			path,
			keep,
		})
	}

	pub fn path(&self) -> &Path {
		&self.path
	}

	pub fn join(&self, name: &str) -> PathBuf {
		self.path.join(name)
	}
}

impl Drop for BuildDir {
	fn drop(&mut self) {
		if self.keep {
			debug!(path = %self.path.display(), "keeping build directory");
			return;
		}
		if let Err(err) = fs::remove_dir_all(&self.path) {
			warn!(path = %self.path.display(), %err, "failed to remove build directory");
		}
	}
}
