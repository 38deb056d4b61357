// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (c) 2025 ReifyDB

//! Hash join state shared by both stages.
//!
//! The build side (left input) is materialised into growable column buffers.
//! Once it is complete a chained index is built over the key column: `heads`
//! maps a hash bucket to the first row of its chain plus one, `next` links a
//! row to the following row of the same bucket, zero terminating the chain.

use kiln_plan::{DataType, NodeId};

use super::{
	Generator,
	expr::{Value, c_equal, c_hash, c_type},
};

pub(super) struct JoinNames {
	prefix: String,
}

impl JoinNames {
	pub(super) fn new(node: NodeId) -> Self {
		Self {
			prefix: format!("j{}", node),
		}
	}

	pub(super) fn var(&self, name: &str) -> String {
		format!("{}_{}", self.prefix, name)
	}

	pub(super) fn column(&self, position: usize) -> String {
		format!("{}_c{}", self.prefix, position)
	}
}

impl Generator<'_> {
	pub(super) fn declare_join(&mut self, names: &JoinNames, left: &[DataType]) {
		self.w.decls.line(format!("size_t {} = 0;", names.var("rows")));
		self.w.decls.line(format!("size_t {} = 0;", names.var("cap")));
		self.w.decls.line(format!("size_t {} = 0;", names.var("mask")));
		for (position, ty) in left.iter().enumerate() {
			self.w.heap(c_type(*ty), &names.column(position));
		}
		self.w.heap("size_t", &names.var("heads"));
		self.w.heap("size_t", &names.var("next"));
	}

	/// Appends one build row.
	pub(super) fn join_append(&mut self, names: &JoinNames, values: &[Value]) {
		let rows = names.var("rows");
		let cap = names.var("cap");
		let body = &mut self.w.body;
		body.open(format!("if ({} == {})", rows, cap));
		body.line(format!("{cap} = {cap} ? {cap} * 2 : 1024;", cap = cap));
		for position in 0..values.len() {
			body.line(format!("KILN_RESIZE({}, {});", names.column(position), cap));
		}
		body.close();
		for (position, value) in values.iter().enumerate() {
			body.line(format!("{}[{}] = {};", names.column(position), rows, value.code));
		}
		body.line(format!("{}++;", rows));
	}

	/// Builds the chained index over the materialised build side.
	pub(super) fn join_index(&mut self, names: &JoinNames, key: usize, key_ty: DataType) {
		let rows = names.var("rows");
		let mask = names.var("mask");
		let heads = names.var("heads");
		let next = names.var("next");
		let b = names.var("b");
		let hash = c_hash(&Value::new(format!("{}[{}]", names.column(key), b), key_ty));

		let body = &mut self.w.body;
		body.line(format!("{} = kiln_table_size({}) - 1;", mask, rows));
		body.line(format!("{} = calloc({} + 1, sizeof(size_t));", heads, mask));
		body.line(format!("if (!{})", heads));
		body.line("\tKILN_FAIL(KILN_ALLOC_ERROR);");
		body.line(format!("KILN_RESIZE({}, {} + 1);", next, rows));
		body.open(format!("for (size_t {b} = 0; {b} < {rows}; {b}++)", b = b, rows = rows));
		body.line(format!("const size_t {} = (size_t){} & {};", names.var("h"), hash, mask));
		body.line(format!("{}[{}] = {}[{}];", next, b, heads, names.var("h")));
		body.line(format!("{}[{}] = {} + 1;", heads, names.var("h"), b));
		body.close();
	}

	/// Opens the probe of one right row and returns the matching left row.
	/// The caller consumes the joined row and then calls [`Self::join_probe_close`].
	pub(super) fn join_probe_open(
		&mut self,
		names: &JoinNames,
		left: &[DataType],
		left_key: usize,
		key: &Value,
	) -> Vec<Value> {
		let k = names.var("k");
		let e = names.var("e");
		let m = names.var("m");
		let hash = c_hash(&Value::new(k.clone(), key.ty));
		let checks = self.checks();

		let body = &mut self.w.body;
		body.open("");
		body.line(format!("{} const {} = {};", c_type(key.ty), k, key.code));
		body.open(format!(
			"for (size_t {e} = {heads}[(size_t){hash} & {mask}]; {e} != 0; {e} = {next}[{e} - 1])",
			e = e,
			heads = names.var("heads"),
			hash = hash,
			mask = names.var("mask"),
			next = names.var("next"),
		));
		body.line(format!("const size_t {} = {} - 1;", m, e));
		if checks {
			body.line(format!("KILN_CHECK({} < {});", m, names.var("rows")));
		}
		let stored = format!("{}[{}]", names.column(left_key), m);
		body.line(format!("if (!{})", c_equal(&stored, &k, key.ty)));
		body.line("\tcontinue;");

		left.iter()
			.enumerate()
			.map(|(position, ty)| Value::new(format!("{}[{}]", names.column(position), m), *ty))
			.collect()
	}

	pub(super) fn join_probe_close(&mut self) {
		self.w.body.close();
		self.w.body.close();
	}
}
