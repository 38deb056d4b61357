// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (c) 2025 ReifyDB

use kiln_codegen::GeneratedSource;
use kiln_plan::Plan;

pub fn plan(plan: &Plan) {
	eprintln!("{}", plan);
}

pub fn source(source: &GeneratedSource) {
	eprintln!("/* compile with: {} */", source.compile_options().args().join(" "));
	eprintln!("{}", source.text());
}
