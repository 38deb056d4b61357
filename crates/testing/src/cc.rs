// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (c) 2025 ReifyDB

use std::{process::Command, sync::OnceLock};

/// Whether a C compiler named `cc` can be run. Tests that compile generated
/// code return early when it cannot.
pub fn compiler_available() -> bool {
	static AVAILABLE: OnceLock<bool> = OnceLock::new();
	*AVAILABLE.get_or_init(|| {
		Command::new("cc").arg("--version").output().map(|output| output.status.success()).unwrap_or(false)
	})
}

#[macro_export]
macro_rules! require_cc {
	() => {
		if !$crate::compiler_available() {
			eprintln!("skipping: no C compiler available");
			return;
		}
	};
}
