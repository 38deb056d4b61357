// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (c) 2025 ReifyDB

use std::fmt::Write;

/// Indentation aware text buffer for one section of the generated file.
#[derive(Debug, Default)]
pub(crate) struct Block {
	text: String,
	indent: usize,
}

impl Block {
	fn with_indent(indent: usize) -> Self {
		Self {
			text: String::new(),
			indent,
		}
	}

	pub(crate) fn line(&mut self, line: impl AsRef<str>) {
		let line = line.as_ref();
		if !line.is_empty() {
			for _ in 0..self.indent {
				self.text.push('\t');
			}
			self.text.push_str(line);
		}
		self.text.push('\n');
	}

	/// Writes `head {` and indents until the matching [`Block::close`].
	pub(crate) fn open(&mut self, head: impl AsRef<str>) {
		let head = head.as_ref();
		if head.is_empty() {
			self.line("{");
		} else {
			self.line(format!("{} {{", head));
		}
		self.indent += 1;
	}

	pub(crate) fn close(&mut self) {
		self.indent = self.indent.saturating_sub(1);
		self.line("}");
	}

	pub(crate) fn is_empty(&self) -> bool {
		self.text.is_empty()
	}

	pub(crate) fn as_str(&self) -> &str {
		&self.text
	}
}

/// Sections of the generated translation unit.
///
/// `globals` holds type definitions and helper functions placed before
/// `run_main`. Inside `run_main`, `decls` holds state that must be visible to
/// the cleanup code, `body` holds the pipelines and `cleanup` releases
/// everything on every exit path.
#[derive(Debug)]
pub(crate) struct CodeWriter {
	pub(crate) globals: Block,
	pub(crate) decls: Block,
	pub(crate) setup: Block,
	pub(crate) body: Block,
	pub(crate) cleanup: Block,
}

impl CodeWriter {
	pub(crate) fn new() -> Self {
		Self {
			globals: Block::default(),
			decls: Block::with_indent(1),
			setup: Block::with_indent(1),
			body: Block::with_indent(1),
			cleanup: Block::with_indent(1),
		}
	}

	/// Declares a heap pointer in `run_main`, released by the cleanup code.
	pub(crate) fn heap(&mut self, c_type: &str, name: &str) {
		self.decls.line(format!("{} *{} = NULL;", c_type, name));
		self.cleanup.line(format!("free({});", name));
	}

	/// Declares a heap pointer holding one batch of `c_type` values.
	pub(crate) fn vector(&mut self, c_type: &str, name: &str) {
		self.heap(c_type, name);
		self.setup.line(format!("KILN_RESIZE({}, KILN_VECTOR_SIZE);", name));
	}
}

/// Quotes `value` as a C string literal.
pub(crate) fn c_string(value: &str) -> String {
	let mut out = String::with_capacity(value.len() + 2);
	out.push('"');
	for byte in value.bytes() {
		match byte {
			b'"' => out.push_str("\\\""),
			b'\\' => out.push_str("\\\\"),
			b'?' => out.push_str("\\?"),
			0x20..=0x7e => out.push(byte as char),
			_ => {
				let _ = write!(out, "\\{:03o}", byte);
			}
		}
	}
	out.push('"');
	out
}
