// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (c) 2025 ReifyDB

//! Native compilation and execution of generated Kiln programs.
//!
//! A [`Compiler`] turns a [`GeneratedSource`](kiln_codegen::GeneratedSource)
//! into an [`Artifact`]. The shipped [`CcCompiler`] runs a C compiler in a
//! fresh [`BuildDir`] and produces either a shared library that runs in
//! process ([`NativeLibrary`]) or an executable that runs as a child process
//! ([`NativeExecutable`]).

mod artifact;
mod build;
mod compiler;
mod error;

pub use artifact::{Artifact, NativeExecutable, NativeLibrary};
pub use build::BuildDir;
pub use compiler::{ArtifactKind, CcCompiler, Compiler, CompilerConfig};
pub use error::{CompileError, ExecuteError};
