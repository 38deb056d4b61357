// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (c) 2025 ReifyDB

//! Tuple-at-a-time lowering. Every pipeline becomes one fused loop nest and
//! values flow between operators as C expressions. A projection binds each
//! of its expressions to a local for every row it sees, so a faulting
//! expression faults whether or not a parent reads it.

use kiln_plan::{NodeId, Operator};

use super::{
	Generator,
	aggregate::Groups,
	expr::{Value, c_type},
	join::JoinNames,
	runtime::{emit_printer, scan_var},
};
use crate::error::{GenerateError, Result};

type RowConsumer<'c, 'p> = dyn FnMut(&mut Generator<'p>, &[Value]) -> Result<()> + 'c;

impl<'p> Generator<'p> {
	pub(super) fn lower_scalar(&mut self) -> Result<()> {
		let plan = self.plan;
		let root = plan.root();
		let count_only = self.count_only();
		let checks = self.checks();
		if !count_only {
			emit_printer(&mut self.w.globals, plan.output_schema());
		}

		self.produce_rows(root, &mut |g: &mut Generator<'p>, values: &[Value]| {
			if checks {
				g.w.body.line("KILN_CHECK(!kiln_fault);");
			}
			if count_only {
				g.w.body.line("kiln_count++;");
			} else {
				let args = values.iter().map(|value| value.code.as_str()).collect::<Vec<_>>().join(", ");
				g.w.body.line(format!("kiln_print_row(kiln_out, {});", args));
			}
			Ok(())
		})
	}

	fn produce_rows(&mut self, id: NodeId, consume: &mut RowConsumer<'_, 'p>) -> Result<()> {
		let plan = self.plan;
		match plan.node(id) {
			Operator::Scan {
				columns,
				..
			} => {
				let scan = scan_var(id);
				let i = format!("i{}", id);
				let values = columns
					.iter()
					.enumerate()
					.map(|(position, column)| Value::new(format!("{}.c{}[{}]", scan, position, i), column.ty))
					.collect::<Vec<_>>();
				self.w.body.open(format!("for (size_t {i} = 0; {i} < {s}.rows; {i}++)", i = i, s = scan));
				consume(self, &values)?;
				self.w.body.close();
				Ok(())
			}
			Operator::Filter {
				input,
				predicate,
			} => self.produce_rows(*input, &mut |g: &mut Generator<'p>, values: &[Value]| {
				let condition = g.exprs.emit(predicate, values)?;
				g.w.body.open(format!("if ({})", condition.code));
				consume(g, values)?;
				g.w.body.close();
				Ok(())
			}),
			Operator::Project {
				input,
				expressions,
			} => self.produce_rows(*input, &mut |g: &mut Generator<'p>, values: &[Value]| {
				g.w.body.open("");
				let mut projected = Vec::with_capacity(expressions.len());
				for (position, expr) in expressions.iter().enumerate() {
					let value = g.exprs.emit(expr, values)?;
					let local = format!("p{}_v{}", id, position);
					g.w.body.line(format!("{} const {} = {};", c_type(value.ty), local, value.code));
					g.w.body.line(format!("(void){};", local));
					projected.push(Value::new(local, value.ty));
				}
				consume(g, &projected)?;
				g.w.body.close();
				Ok(())
			}),
			Operator::Join {
				left,
				right,
				left_key,
				right_key,
			} => {
				let names = JoinNames::new(id);
				let left_schema = plan.schema(*left).to_vec();
				let key_ty = *left_schema
					.get(*left_key as usize)
					.ok_or_else(|| GenerateError::Lowering(format!("join key {} out of range", left_key)))?;
				self.declare_join(&names, &left_schema);

				self.produce_rows(*left, &mut |g: &mut Generator<'p>, values: &[Value]| {
					g.join_append(&names, values);
					Ok(())
				})?;
				self.join_index(&names, *left_key as usize, key_ty);

				self.produce_rows(*right, &mut |g: &mut Generator<'p>, values: &[Value]| {
					let key = values.get(*right_key as usize).cloned().ok_or_else(|| {
						GenerateError::Lowering(format!("join key {} out of range", right_key))
					})?;
					let mut joined = g.join_probe_open(&names, &left_schema, *left_key as usize, &key);
					joined.extend_from_slice(values);
					consume(g, &joined)?;
					g.join_probe_close();
					Ok(())
				})
			}
			Operator::Aggregate {
				input,
				group_by,
				aggregates,
			} => {
				let groups = Groups::new(id, plan.schema(*input), group_by, aggregates)?;
				self.declare_groups(&groups);
				let checks = self.checks();

				self.produce_rows(*input, &mut |g: &mut Generator<'p>, values: &[Value]| {
					if groups.is_grouped() {
						let group = groups.local("g");
						g.w.body.open("");
						g.w.body.line(format!("size_t {};", group));
						g.group_find(&groups, &group, values, group_by)?;
						g.w.body.line(format!("if ({} == SIZE_MAX)", group));
						g.w.body.line("\tKILN_FAIL(KILN_ALLOC_ERROR);");
						if checks {
							g.w.body.line(format!("KILN_CHECK({} < {}.groups);", group, groups.var()));
						}
						for (j, (aggregate, _)) in groups.aggregates.iter().enumerate() {
							g.accumulate(*aggregate, &groups.slot(j, &group), values)?;
						}
						g.w.body.close();
					} else {
						if groups.tracks_rows() {
							g.w.body.line(format!("{}++;", groups.local("rows")));
						}
						for (j, (aggregate, _)) in groups.aggregates.iter().enumerate() {
							g.accumulate(*aggregate, &groups.scalar(j), values)?;
						}
					}
					Ok(())
				})?;

				if groups.is_grouped() {
					let i = groups.local("i");
					self.w.body.open(format!(
						"for (size_t {i} = 0; {i} < {t}.groups; {i}++)",
						i = i,
						t = groups.var()
					));
					let values = groups.group_values(&i);
					consume(self, &values)?;
					self.w.body.close();
				} else {
					self.w.body.open("");
					let values = groups.scalar_values();
					consume(self, &values)?;
					self.w.body.close();
				}
				Ok(())
			}
		}
	}
}
