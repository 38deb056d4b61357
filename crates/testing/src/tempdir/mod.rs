// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (c) 2025 ReifyDB

use std::{env, fs, path::Path};

use uuid::Uuid;

pub fn temp_dir<F>(f: F) -> std::io::Result<()>
where
	F: FnOnce(&Path) -> std::io::Result<()>,
{
	let mut path = env::temp_dir();
	path.push(format!("kiln-test-{}", Uuid::new_v4()));

	fs::create_dir(&path)?;
	let result = f(&path);

	let _ = fs::remove_dir_all(&path);
	result
}

/// Writes `rows` as `<dir>/<table>.csv`, one row per line.
pub fn write_table(dir: &Path, table: &str, rows: &[&str]) -> std::io::Result<()> {
	let mut text = String::new();
	for row in rows {
		text.push_str(row);
		text.push('\n');
	}
	fs::write(dir.join(format!("{}.csv", table)), text)
}
