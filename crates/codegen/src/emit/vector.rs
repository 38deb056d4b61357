// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (c) 2025 ReifyDB

//! Batch-at-a-time lowering.
//!
//! A batch holds at most `KILN_VECTOR_SIZE` rows. Filters do not move data,
//! they narrow the batch with a selection vector of active row positions.
//! Projections write dense temporary vectors, joins collect their matches in
//! an output buffer that is handed downstream in batch sized slices.

use kiln_plan::{Aggregate, DataType, NodeId, Operator};

use super::{
	Generator,
	aggregate::Groups,
	expr::{Value, c_type},
	join::JoinNames,
	runtime::{emit_printer, scan_var},
};
use crate::error::{GenerateError, Result};

/// One column of a batch: `array[offset + row]`.
#[derive(Debug, Clone)]
struct Column {
	array: String,
	offset: Option<String>,
	ty: DataType,
}

impl Column {
	fn dense(array: impl Into<String>, ty: DataType) -> Self {
		Self {
			array: array.into(),
			offset: None,
			ty,
		}
	}

	fn offset(array: impl Into<String>, offset: &str, ty: DataType) -> Self {
		Self {
			array: array.into(),
			offset: Some(offset.to_string()),
			ty,
		}
	}

	fn at(&self, row: &str) -> String {
		match &self.offset {
			Some(offset) => format!("{}[{} + {}]", self.array, offset, row),
			None => format!("{}[{}]", self.array, row),
		}
	}
}

#[derive(Debug, Clone)]
struct Batch {
	columns: Vec<Column>,
	/// C expression holding the number of active rows.
	len: String,
	/// Selection vector, `None` when rows `0..len` are all active.
	sel: Option<String>,
}

impl Batch {
	fn row(&self, i: &str) -> String {
		match &self.sel {
			Some(sel) => format!("{}[{}]", sel, i),
			None => i.to_string(),
		}
	}

	fn values(&self, i: &str) -> Vec<Value> {
		let row = self.row(i);
		self.columns.iter().map(|column| Value::new(column.at(&row), column.ty)).collect()
	}

	fn is_dense(&self) -> bool {
		self.sel.is_none()
	}
}

type BatchConsumer<'c, 'p> = dyn FnMut(&mut Generator<'p>, &Batch) -> Result<()> + 'c;

fn loop_over(i: &str, len: &str) -> String {
	format!("for (size_t {i} = 0; {i} < {len}; {i}++)", i = i, len = len)
}

fn slice_len(n: &str, total: &str, base: &str) -> String {
	format!(
		"const size_t {n} = {total} - {base} < KILN_VECTOR_SIZE ? {total} - {base} : KILN_VECTOR_SIZE;",
		n = n,
		total = total,
		base = base
	)
}

impl<'p> Generator<'p> {
	pub(super) fn lower_vectorised(&mut self) -> Result<()> {
		let plan = self.plan;
		let root = plan.root();
		let count_only = self.count_only();
		let checks = self.checks();
		if !count_only {
			emit_printer(&mut self.w.globals, plan.output_schema());
		}

		self.produce_batches(root, &mut |g: &mut Generator<'p>, batch: &Batch| {
			if checks {
				g.w.body.line("KILN_CHECK(!kiln_fault);");
			}
			if count_only {
				g.w.body.line(format!("kiln_count += (int64_t){};", batch.len));
			} else {
				g.w.body.open(loop_over("kiln_i", &batch.len));
				let args = batch.values("kiln_i").into_iter().map(|value| value.code).collect::<Vec<_>>();
				g.w.body.line(format!("kiln_print_row(kiln_out, {});", args.join(", ")));
				g.w.body.close();
			}
			Ok(())
		})
	}

	fn produce_batches(&mut self, id: NodeId, consume: &mut BatchConsumer<'_, 'p>) -> Result<()> {
		let plan = self.plan;
		match plan.node(id) {
			Operator::Scan {
				columns,
				..
			} => {
				let scan = scan_var(id);
				let base = format!("{}_base", scan);
				let n = format!("{}_n", scan);
				let rows = format!("{}.rows", scan);
				self.w.body.open(format!(
					"for (size_t {base} = 0; {base} < {rows}; {base} += KILN_VECTOR_SIZE)",
					base = base,
					rows = rows
				));
				self.w.body.line(slice_len(&n, &rows, &base));
				let batch = Batch {
					columns: columns
						.iter()
						.enumerate()
						.map(|(position, column)| {
							Column::offset(format!("{}.c{}", scan, position), &base, column.ty)
						})
						.collect(),
					len: n,
					sel: None,
				};
				consume(self, &batch)?;
				self.w.body.close();
				Ok(())
			}
			Operator::Filter {
				input,
				predicate,
			} => {
				let sel = format!("f{}_sel", id);
				let n = format!("f{}_n", id);
				let i = format!("f{}_i", id);
				self.w.vector("uint32_t", &sel);
				let branch_free = self.simd();

				self.produce_batches(*input, &mut |g: &mut Generator<'p>, batch: &Batch| {
					let condition = g.exprs.emit(predicate, &batch.values(&i))?;
					let row = batch.row(&i);
					g.w.body.line(format!("size_t {} = 0;", n));
					g.w.body.open(loop_over(&i, &batch.len));
					if branch_free {
						g.w.body.line(format!("{}[{}] = (uint32_t){};", sel, n, row));
						g.w.body.line(format!("{} += (size_t){};", n, condition.code));
					} else {
						g.w.body.line(format!("if ({})", condition.code));
						g.w.body.line(format!("\t{}[{}++] = (uint32_t){};", sel, n, row));
					}
					g.w.body.close();

					g.w.body.open(format!("if ({} != 0)", n));
					let narrowed = Batch {
						columns: batch.columns.clone(),
						len: n.clone(),
						sel: Some(sel.clone()),
					};
					consume(g, &narrowed)?;
					g.w.body.close();
					Ok(())
				})
			}
			Operator::Project {
				input,
				expressions,
			} => {
				let i = format!("p{}_i", id);
				let input_schema = plan.schema(*input);
				let mut outputs = Vec::with_capacity(expressions.len());
				for (position, expr) in expressions.iter().enumerate() {
					let ty = kiln_plan::infer_type(expr, input_schema).map_err(GenerateError::Lowering)?;
					let array = format!("p{}_c{}", id, position);
					self.w.vector(c_type(ty), &array);
					outputs.push(Column::dense(array, ty));
				}
				let simd = self.simd() && outputs.iter().all(|output| output.ty != DataType::Text);

				self.produce_batches(*input, &mut |g: &mut Generator<'p>, batch: &Batch| {
					if simd && batch.is_dense() && batch.columns.iter().all(|column| column.ty != DataType::Text) {
						g.w.body.line("#pragma omp simd");
					}
					g.w.body.open(loop_over(&i, &batch.len));
					let values = batch.values(&i);
					for (expr, output) in expressions.iter().zip(&outputs) {
						let value = g.exprs.emit(expr, &values)?;
						g.w.body.line(format!("{} = {};", output.at(&i), value.code));
					}
					g.w.body.close();
					let projected = Batch {
						columns: outputs.clone(),
						len: batch.len.clone(),
						sel: None,
					};
					consume(g, &projected)
				})
			}
			Operator::Join {
				left,
				right,
				left_key,
				right_key,
			} => self.produce_join(id, *left, *right, *left_key as usize, *right_key as usize, consume),
			Operator::Aggregate {
				input,
				group_by,
				aggregates,
			} => {
				let groups = Groups::new(id, plan.schema(*input), group_by, aggregates)?;
				self.declare_groups(&groups);
				if groups.is_grouped() {
					self.produce_grouped(*input, &groups, group_by, consume)
				} else {
					self.produce_ungrouped(*input, &groups, consume)
				}
			}
		}
	}

	fn produce_join(
		&mut self,
		id: NodeId,
		left: NodeId,
		right: NodeId,
		left_key: usize,
		right_key: usize,
		consume: &mut BatchConsumer<'_, 'p>,
	) -> Result<()> {
		let plan = self.plan;
		let names = JoinNames::new(id);
		let left_schema = plan.schema(left).to_vec();
		let key_ty = *left_schema
			.get(left_key)
			.ok_or_else(|| GenerateError::Lowering(format!("join key {} out of range", left_key)))?;
		let output_schema = plan.schema(id).to_vec();
		self.declare_join(&names, &left_schema);

		let i = names.var("i");
		self.produce_batches(left, &mut |g: &mut Generator<'p>, batch: &Batch| {
			g.w.body.open(loop_over(&i, &batch.len));
			g.join_append(&names, &batch.values(&i));
			g.w.body.close();
			Ok(())
		})?;
		self.join_index(&names, left_key, key_ty);

		let on = names.var("on");
		let ocap = names.var("ocap");
		self.w.decls.line(format!("size_t {} = 0;", on));
		self.w.decls.line(format!("size_t {} = 0;", ocap));
		let outputs = output_schema
			.iter()
			.enumerate()
			.map(|(position, ty)| {
				let array = names.var(&format!("o{}", position));
				self.w.heap(c_type(*ty), &array);
				(array, *ty)
			})
			.collect::<Vec<_>>();

		self.produce_batches(right, &mut |g: &mut Generator<'p>, batch: &Batch| {
			g.w.body.line(format!("{} = 0;", on));
			g.w.body.open(loop_over(&i, &batch.len));
			let values = batch.values(&i);
			let key = values
				.get(right_key)
				.cloned()
				.ok_or_else(|| GenerateError::Lowering(format!("join key {} out of range", right_key)))?;
			let mut joined = g.join_probe_open(&names, &left_schema, left_key, &key);
			joined.extend(values);

			g.w.body.open(format!("if ({} == {})", on, ocap));
			g.w.body.line(format!("{c} = {c} ? {c} * 2 : KILN_VECTOR_SIZE;", c = ocap));
			for (array, _) in &outputs {
				g.w.body.line(format!("KILN_RESIZE({}, {});", array, ocap));
			}
			g.w.body.close();
			for ((array, _), value) in outputs.iter().zip(&joined) {
				g.w.body.line(format!("{}[{}] = {};", array, on, value.code));
			}
			g.w.body.line(format!("{}++;", on));
			g.join_probe_close();
			g.w.body.close();

			let base = names.var("base");
			let n = names.var("n");
			g.w.body.open(format!(
				"for (size_t {base} = 0; {base} < {on}; {base} += KILN_VECTOR_SIZE)",
				base = base,
				on = on
			));
			g.w.body.line(slice_len(&n, &on, &base));
			let slice = Batch {
				columns: outputs.iter().map(|(array, ty)| Column::offset(array.clone(), &base, *ty)).collect(),
				len: n,
				sel: None,
			};
			consume(g, &slice)?;
			g.w.body.close();
			Ok(())
		})
	}

	fn produce_grouped(
		&mut self,
		input: NodeId,
		groups: &Groups,
		group_by: &[u32],
		consume: &mut BatchConsumer<'_, 'p>,
	) -> Result<()> {
		let gid = groups.local("gid");
		let i = groups.local("i");
		let group = groups.local("g");
		self.w.vector("size_t", &gid);
		let checks = self.checks();

		self.produce_batches(input, &mut |g: &mut Generator<'p>, batch: &Batch| {
			g.w.body.open(loop_over(&i, &batch.len));
			g.w.body.line(format!("size_t {};", group));
			g.group_find(groups, &group, &batch.values(&i), group_by)?;
			g.w.body.line(format!("if ({} == SIZE_MAX)", group));
			g.w.body.line("\tKILN_FAIL(KILN_ALLOC_ERROR);");
			g.w.body.line(format!("{}[{}] = {};", gid, i, group));
			g.w.body.close();

			for (j, (aggregate, ty)) in groups.aggregates.iter().enumerate() {
				g.w.body.open(loop_over(&i, &batch.len));
				g.w.body.line(format!("const size_t {} = {}[{}];", group, gid, i));
				if checks {
					g.w.body.line(format!("KILN_CHECK({} < {}.groups);", group, groups.var()));
				}
				g.accumulate(*aggregate, &groups.slot(j, &group), &batch.values(&i))?;
				g.w.body.close();
			}
			Ok(())
		})?;

		let base = groups.local("base");
		let n = groups.local("n");
		let total = format!("{}.groups", groups.var());
		self.w.body.open(format!(
			"for (size_t {base} = 0; {base} < {total}; {base} += KILN_VECTOR_SIZE)",
			base = base,
			total = total
		));
		self.w.body.line(slice_len(&n, &total, &base));
		let keys = groups.keys.iter().enumerate().map(|(k, ty)| (format!("{}.g{}", groups.var(), k), *ty));
		let accumulators =
			groups.aggregates.iter().enumerate().map(|(j, (_, ty))| (format!("{}.v{}", groups.var(), j), *ty));
		let batch = Batch {
			columns: keys.chain(accumulators).map(|(array, ty)| Column::offset(array, &base, ty)).collect(),
			len: n,
			sel: None,
		};
		consume(self, &batch)?;
		self.w.body.close();
		Ok(())
	}

	fn produce_ungrouped(&mut self, input: NodeId, groups: &Groups, consume: &mut BatchConsumer<'_, 'p>) -> Result<()> {
		let i = groups.local("i");
		let simd = self.simd();

		self.produce_batches(input, &mut |g: &mut Generator<'p>, batch: &Batch| {
			if groups.tracks_rows() {
				g.w.body.line(format!("{} += (int64_t){};", groups.local("rows"), batch.len));
			}
			for (j, (aggregate, ty)) in groups.aggregates.iter().enumerate() {
				let accumulator = groups.scalar(j);
				if *aggregate == Aggregate::Count {
					g.w.body.line(format!("{} += (int64_t){};", accumulator, batch.len));
					continue;
				}
				// integer sums wrap through unsigned casts, not a reduction form
				if simd && batch.is_dense() && matches!(aggregate, Aggregate::Sum(_)) && *ty == DataType::Float64 {
					g.w.body.line(format!("#pragma omp simd reduction(+:{})", accumulator));
				}
				g.w.body.open(loop_over(&i, &batch.len));
				g.accumulate(*aggregate, &accumulator, &batch.values(&i))?;
				g.w.body.close();
			}
			Ok(())
		})?;

		self.w.body.open("");
		let mut columns = Vec::with_capacity(groups.aggregates.len());
		for (j, value) in groups.scalar_values().into_iter().enumerate() {
			let array = groups.local(&format!("o{}", j));
			self.w.body.line(format!("{} {}[1];", c_type(value.ty), array));
			self.w.body.line(format!("{}[0] = {};", array, value.code));
			columns.push(Column::dense(array, value.ty));
		}
		let batch = Batch {
			columns,
			len: "1".to_string(),
			sel: None,
		};
		consume(self, &batch)?;
		self.w.body.close();
		Ok(())
	}
}
