// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (c) 2025 ReifyDB

mod cc;
pub mod fake;
pub mod plans;
pub mod tempdir;

pub use cc::compiler_available;
pub use fake::{Counters, FakeArtifact, FakeCompiler};
pub use tempdir::{temp_dir, write_table};
