// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (c) 2025 ReifyDB

//! Aggregation state shared by both stages.
//!
//! Grouped aggregation keeps a growable open addressing table per node. Slots
//! hold a group index plus one, group keys and accumulators live in dense
//! arrays indexed by group, so groups are emitted in order of first
//! appearance. Ungrouped aggregation keeps one scalar accumulator per
//! aggregate.

use kiln_plan::{Aggregate, DataType, NodeId, aggregate_type};

use super::{
	Generator,
	expr::{Value, c_equal, c_hash, c_highest, c_lowest, c_type},
};
use crate::error::{GenerateError, Result};

/// Resolved layout of one aggregation node.
pub(super) struct Groups {
	pub node: NodeId,
	pub keys: Vec<DataType>,
	pub aggregates: Vec<(Aggregate, DataType)>,
}

impl Groups {
	pub(super) fn new(node: NodeId, input: &[DataType], group_by: &[u32], aggregates: &[Aggregate]) -> Result<Self> {
		let keys = group_by
			.iter()
			.map(|column| {
				input.get(*column as usize).copied().ok_or_else(|| {
					GenerateError::Lowering(format!("group column {} out of range", column))
				})
			})
			.collect::<Result<Vec<_>>>()?;
		let aggregates = aggregates
			.iter()
			.map(|aggregate| {
				aggregate_type(*aggregate, input)
					.map(|ty| (*aggregate, ty))
					.map_err(GenerateError::Lowering)
			})
			.collect::<Result<Vec<_>>>()?;
		Ok(Self {
			node,
			keys,
			aggregates,
		})
	}

	pub(super) fn is_grouped(&self) -> bool {
		!self.keys.is_empty()
	}

	/// Name of the table variable (grouped) or accumulator prefix (ungrouped).
	pub(super) fn var(&self) -> String {
		format!("a{}", self.node)
	}

	pub(super) fn local(&self, name: &str) -> String {
		format!("a{}_{}", self.node, name)
	}

	fn struct_name(&self) -> String {
		format!("kiln_groups{}", self.node)
	}

	/// Accumulator `j` of group `group` in a grouped table.
	pub(super) fn slot(&self, j: usize, group: &str) -> String {
		format!("{}.v{}[{}]", self.var(), j, group)
	}

	/// Accumulator `j` of an ungrouped aggregation.
	pub(super) fn scalar(&self, j: usize) -> String {
		self.local(&format!("v{}", j))
	}

	/// Ungrouped min and max need to know whether any row arrived.
	pub(super) fn tracks_rows(&self) -> bool {
		!self.is_grouped()
			&& self.aggregates.iter().any(|(aggregate, _)| matches!(aggregate, Aggregate::Min(_) | Aggregate::Max(_)))
	}

	fn initial(&self, aggregate: Aggregate, ty: DataType) -> &'static str {
		match aggregate {
			Aggregate::Sum(_) | Aggregate::Count => "0",
			Aggregate::Min(_) => c_highest(ty),
			Aggregate::Max(_) => c_lowest(ty),
		}
	}

	/// Output values of group `group` of a grouped table.
	pub(super) fn group_values(&self, group: &str) -> Vec<Value> {
		let mut values: Vec<Value> = self
			.keys
			.iter()
			.enumerate()
			.map(|(k, ty)| Value::new(format!("{}.g{}[{}]", self.var(), k, group), *ty))
			.collect();
		values.extend(self.aggregates.iter().enumerate().map(|(j, (_, ty))| Value::new(self.slot(j, group), *ty)));
		values
	}

	/// Output values of an ungrouped aggregation, min and max over no rows read as zero.
	pub(super) fn scalar_values(&self) -> Vec<Value> {
		self.aggregates
			.iter()
			.enumerate()
			.map(|(j, (aggregate, ty))| match aggregate {
				Aggregate::Min(_) | Aggregate::Max(_) => Value::new(
					format!("({} ? {} : ({})0)", self.local("rows"), self.scalar(j), c_type(*ty)),
					*ty,
				),
				_ => Value::new(self.scalar(j), *ty),
			})
			.collect()
	}
}

impl Generator<'_> {
	/// Declares the accumulators, and for grouped aggregation the hash table
	/// type with its grow and find functions.
	pub(super) fn declare_groups(&mut self, groups: &Groups) {
		if !groups.is_grouped() {
			if groups.tracks_rows() {
				self.w.decls.line(format!("int64_t {} = 0;", groups.local("rows")));
			}
			for (j, (aggregate, ty)) in groups.aggregates.iter().enumerate() {
				self.w.decls.line(format!(
					"{} {} = {};",
					c_type(*ty),
					groups.scalar(j),
					groups.initial(*aggregate, *ty)
				));
			}
			return;
		}

		let name = groups.struct_name();
		let key_params = groups
			.keys
			.iter()
			.enumerate()
			.map(|(k, ty)| format!("{} k{}", c_type(*ty), k))
			.collect::<Vec<_>>()
			.join(", ");
		let dense = groups
			.keys
			.iter()
			.enumerate()
			.map(|(k, _)| format!("g{}", k))
			.chain((0..groups.aggregates.len()).map(|j| format!("v{}", j)))
			.collect::<Vec<_>>();

		let out = &mut self.w.globals;
		out.line("typedef struct {");
		out.line("\tsize_t groups;");
		out.line("\tsize_t mask;");
		out.line("\tsize_t *slots;");
		for (k, ty) in groups.keys.iter().enumerate() {
			out.line(format!("\t{} *g{};", c_type(*ty), k));
		}
		for (j, (_, ty)) in groups.aggregates.iter().enumerate() {
			out.line(format!("\t{} *v{};", c_type(*ty), j));
		}
		out.line(format!("}} {};", name));
		out.line("");

		out.line(format!("static inline uint64_t {}_hash({})", name, key_params));
		out.open("");
		out.line("uint64_t h = 0;");
		for (k, ty) in groups.keys.iter().enumerate() {
			out.line(format!("h = kiln_hash_combine(h, {});", c_hash(&Value::new(format!("k{}", k), *ty))));
		}
		out.line("return h;");
		out.close();
		out.line("");

		let stored_keys = (0..groups.keys.len()).map(|k| format!("t->g{}[i]", k)).collect::<Vec<_>>().join(", ");
		out.line(format!("static int {}_grow({} *t)", name, name));
		out.open("");
		out.line("size_t size = t->slots ? (t->mask + 1) * 2 : 1024;");
		out.line("size_t *slots = calloc(size, sizeof(size_t));");
		out.line("size_t i;");
		out.line("void *grown;");
		out.line("if (!slots)");
		out.line("\treturn 0;");
		out.open("for (i = 0; i < t->groups; i++)");
		out.line(format!("size_t h = (size_t){}_hash({}) & (size - 1);", name, stored_keys));
		out.line("while (slots[h])");
		out.line("\th = (h + 1) & (size - 1);");
		out.line("slots[h] = i + 1;");
		out.close();
		out.line("free(t->slots);");
		out.line("t->slots = slots;");
		out.line("t->mask = size - 1;");
		for field in &dense {
			out.line(format!("grown = realloc(t->{f}, (size / 2) * sizeof(*t->{f}));", f = field));
			out.line("if (!grown)");
			out.line("\treturn 0;");
			out.line(format!("t->{} = grown;", field));
		}
		out.line("return 1;");
		out.close();
		out.line("");

		let key_args = (0..groups.keys.len()).map(|k| format!("k{}", k)).collect::<Vec<_>>().join(", ");
		let key_match = groups
			.keys
			.iter()
			.enumerate()
			.map(|(k, ty)| c_equal(&format!("t->g{}[g]", k), &format!("k{}", k), *ty))
			.collect::<Vec<_>>()
			.join(" && ");
		out.line("/* Returns the index of the group, inserting it when absent, or SIZE_MAX when out of memory. */");
		out.line(format!("static size_t {}_find({} *t, {})", name, name, key_params));
		out.open("");
		out.line("size_t h, g;");
		out.line(format!("if ((t->groups + 1) * 2 > t->mask + 1 && !{}_grow(t))", name));
		out.line("\treturn SIZE_MAX;");
		out.line(format!("h = (size_t){}_hash({}) & t->mask;", name, key_args));
		out.open("while (t->slots[h])");
		out.line("g = t->slots[h] - 1;");
		out.line(format!("if ({})", key_match));
		out.line("\treturn g;");
		out.line("h = (h + 1) & t->mask;");
		out.close();
		out.line("g = t->groups++;");
		out.line("t->slots[h] = g + 1;");
		for k in 0..groups.keys.len() {
			out.line(format!("t->g{k}[g] = k{k};", k = k));
		}
		for (j, (aggregate, ty)) in groups.aggregates.iter().enumerate() {
			out.line(format!("t->v{}[g] = {};", j, groups.initial(*aggregate, *ty)));
		}
		out.line("return g;");
		out.close();
		out.line("");

		let var = groups.var();
		self.w.decls.line(format!("{} {} = {{0}};", name, var));
		self.w.cleanup.line(format!("free({}.slots);", var));
		for field in &dense {
			self.w.cleanup.line(format!("free({}.{});", var, field));
		}
	}

	/// Emits `{var} = {name}_find(...)` for the group keys of one input row.
	pub(super) fn group_find(&mut self, groups: &Groups, target: &str, input: &[Value], group_by: &[u32]) -> Result<()> {
		let keys = group_by
			.iter()
			.map(|column| {
				input.get(*column as usize).map(|value| value.code.clone()).ok_or_else(|| {
					GenerateError::Lowering(format!("group column {} out of range", column))
				})
			})
			.collect::<Result<Vec<_>>>()?;
		self.w.body.line(format!("{} = {}_find(&{}, {});", target, groups.struct_name(), groups.var(), keys.join(", ")));
		Ok(())
	}

	/// Folds one input row into accumulator `accumulator` of aggregate `j`.
	pub(super) fn accumulate(&mut self, aggregate: Aggregate, accumulator: &str, input: &[Value]) -> Result<()> {
		let operand = |column: u32| {
			input.get(column as usize).cloned().ok_or_else(|| {
				GenerateError::Lowering(format!("aggregate column {} out of range", column))
			})
		};
		let body = &mut self.w.body;
		match aggregate {
			Aggregate::Sum(column) => {
				let value = operand(column)?;
				if value.ty == DataType::Int64 {
					body.line(format!(
						"{a} = (int64_t)((uint64_t){a} + (uint64_t){v});",
						a = accumulator,
						v = value.code
					));
				} else {
					body.line(format!("{} += {};", accumulator, value.code));
				}
			}
			Aggregate::Count => body.line(format!("{} += 1;", accumulator)),
			Aggregate::Min(column) => {
				let value = operand(column)?.code;
				body.line(format!("if ({} < {})", value, accumulator));
				body.line(format!("\t{} = {};", accumulator, value));
			}
			Aggregate::Max(column) => {
				let value = operand(column)?.code;
				body.line(format!("if ({} > {})", value, accumulator));
				body.line(format!("\t{} = {};", accumulator, value));
			}
		}
		Ok(())
	}
}
