// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (c) 2025 ReifyDB

use std::{fs, path::Path};

use kiln_plan::Plan;
use test_each_file::test_each_path;

test_each_path! { in "crates/plan/tests/plans" as text => round_trip }

fn round_trip(path: &Path) {
	let source = fs::read_to_string(path).expect("fixture readable");
	let plan = Plan::parse(&source).unwrap_or_else(|err| panic!("{}: {}", path.display(), err));

	let printed = plan.to_string();
	assert_eq!(Plan::parse(&printed).expect("printed plan parses"), plan);

	let bytes = plan.encode();
	let decoded = Plan::decode(&bytes).expect("encoded plan decodes");
	assert_eq!(decoded, plan);
	assert_eq!(decoded.encode(), bytes);
	assert_eq!(decoded.to_string(), printed);
}
