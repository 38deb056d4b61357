// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (c) 2025 ReifyDB

//! Isolated plan to native code pipeline.
//!
//! An [`Isolate`] owns every product of one cycle: the ingested plan, the
//! generated source and the compiled artifact. Isolates share nothing. The
//! [`ffi`] module exposes the same operations to C hosts.

mod config;
mod error;
pub mod ffi;
mod isolate;

pub use config::{IsolateConfig, IsolateConfigBuilder};
pub use error::{Error, Result};
pub use isolate::Isolate;
pub use kiln_codegen::{Flags, GenerationRequest, Stage};
pub use kiln_native::ArtifactKind;
