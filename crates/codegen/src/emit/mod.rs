// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (c) 2025 ReifyDB

//! Lowering of a plan into one C99 translation unit.
//!
//! Both stages follow the produce/consume model: `produce` on a node emits
//! the loops that generate its rows and calls `consume` with the C
//! expressions of one row (scalar) or one batch (vectorised). Pipeline
//! breakers (join build sides and aggregations) materialise their input and
//! start a new pipeline.

mod aggregate;
pub(crate) mod expr;
mod join;
mod runtime;
mod scalar;
mod vector;

use kiln_plan::{Operator, Plan};

use self::{
	expr::ExprEmitter,
	runtime::{emit_loader, scan_struct, scan_var, text_columns},
};
use crate::{
	error::Result,
	options::{CodegenOptions, MAX_VECTOR_SIZE},
	request::{Flags, GenerationRequest, Stage},
	writer::{CodeWriter, c_string},
};

pub(crate) struct Generator<'p> {
	plan: &'p Plan,
	request: GenerationRequest,
	options: &'p CodegenOptions,
	w: CodeWriter,
	exprs: ExprEmitter,
}

impl<'p> Generator<'p> {
	fn new(plan: &'p Plan, request: GenerationRequest, options: &'p CodegenOptions) -> Self {
		let checks = !request.has(Flags::ELIDE_BOUNDS_CHECKS);
		Self {
			plan,
			request,
			options,
			w: CodeWriter::new(),
			exprs: ExprEmitter {
				checked_division: checks,
			},
		}
	}

	fn checks(&self) -> bool {
		!self.request.has(Flags::ELIDE_BOUNDS_CHECKS)
	}

	fn count_only(&self) -> bool {
		self.request.has(Flags::COUNT_ONLY)
	}

	fn simd(&self) -> bool {
		self.request.has(Flags::SIMD_HINTS)
	}

	/// Declares the column store of every scan and loads the tables up front.
	fn load_tables(&mut self) {
		let plan = self.plan;
		for (position, node) in plan.nodes().iter().enumerate() {
			if let Operator::Scan {
				table,
				columns,
			} = node
			{
				let id = position as u32;
				let var = scan_var(id);
				emit_loader(&mut self.w.globals, id, table, columns);
				self.w.decls.line(format!("{} {} = {{0}};", scan_struct(id), var));
				for column in 0..columns.len() {
					self.w.cleanup.line(format!("free({}.c{});", var, column));
				}
				for column in text_columns(columns) {
					self.w.cleanup.line(format!("free({}.o{});", var, column));
				}
				if text_columns(columns).next().is_some() {
					self.w.cleanup.line(format!("free({}.text);", var));
				}
				self.w.setup.line(format!("kiln_status = kiln_load_{}(kiln_db, &{});", var, var));
				self.w.setup.line("if (kiln_status != KILN_OK)");
				self.w.setup.line("\tgoto kiln_done;");
			}
		}
	}

	fn assemble(self) -> String {
		let plan = self.plan;
		let request = self.request;
		let checks = self.checks();
		let profile = request.has(Flags::PROFILE);
		let count_only = self.count_only();
		let w = self.w;

		let mut out = String::new();
		out.push_str(&format!(
			"/* Generated by kiln: {} stage, flags {} */\n\n",
			request.stage(),
			request.flags()
		));
		out.push_str(runtime::INCLUDES);
		out.push('\n');
		out.push_str(runtime::STATUS_CODES);
		if request.stage() == Stage::Vectorised {
			out.push_str(&format!("#define KILN_VECTOR_SIZE {}\n", self.options.vector_size.clamp(1, MAX_VECTOR_SIZE)));
		}
		out.push('\n');
		out.push_str(runtime::CONTROL_MACROS);
		out.push_str(if checks {
			runtime::CHECK_ENABLED
		} else {
			runtime::CHECK_ELIDED
		});
		out.push('\n');
		if checks {
			out.push_str(runtime::CHECKED_DIVISION);
			out.push('\n');
		}
		out.push_str(runtime::HELPERS);
		out.push('\n');
		out.push_str(w.globals.as_str());

		out.push_str("int run_main(int argc, char **argv)\n{\n");
		out.push_str("\tint kiln_status = KILN_OK;\n");
		out.push_str(&format!("\tconst char *kiln_db = {};\n", c_string(plan.database())));
		out.push_str("\tconst char *kiln_out_path = NULL;\n");
		out.push_str("\tFILE *kiln_out = stdout;\n");
		out.push_str("\tint kiln_arg;\n");
		if count_only {
			out.push_str("\tint64_t kiln_count = 0;\n");
		}
		if profile {
			out.push_str("\tclock_t kiln_started = clock();\n");
			out.push_str("\tclock_t kiln_loaded = kiln_started;\n");
		}
		out.push_str(w.decls.as_str());
		out.push('\n');

		out.push_str("\tfor (kiln_arg = 0; kiln_arg < argc; kiln_arg++) {\n");
		out.push_str("\t\tif (strcmp(argv[kiln_arg], \"--db\") == 0 && kiln_arg + 1 < argc)\n");
		out.push_str("\t\t\tkiln_db = argv[++kiln_arg];\n");
		out.push_str("\t\telse if (strcmp(argv[kiln_arg], \"--out\") == 0 && kiln_arg + 1 < argc)\n");
		out.push_str("\t\t\tkiln_out_path = argv[++kiln_arg];\n");
		out.push_str("\t}\n");
		if checks {
			out.push_str("\tkiln_fault = 0;\n");
		}
		out.push_str("\tif (kiln_out_path) {\n");
		out.push_str("\t\tkiln_out = fopen(kiln_out_path, \"w\");\n");
		out.push_str("\t\tif (!kiln_out) {\n");
		out.push_str("\t\t\tkiln_out = stdout;\n");
		out.push_str("\t\t\tKILN_FAIL(KILN_IO_ERROR);\n");
		out.push_str("\t\t}\n");
		out.push_str("\t}\n");
		out.push_str(w.setup.as_str());
		if profile {
			out.push_str("\tkiln_loaded = clock();\n");
		}
		out.push('\n');
		out.push_str(w.body.as_str());
		if !w.body.is_empty() {
			out.push('\n');
		}
		if count_only {
			out.push_str("\tfprintf(kiln_out, \"%lld\\n\", (long long)kiln_count);\n");
		}
		if checks {
			out.push_str("\tKILN_CHECK(!kiln_fault);\n");
		}
		if profile {
			out.push_str(
				"\tfprintf(stderr, \"{\\\"load\\\":%.3f,\\\"execution\\\":%.3f}\\n\",\n\
				 \t\t(double)(kiln_loaded - kiln_started) * 1000.0 / CLOCKS_PER_SEC,\n\
				 \t\t(double)(clock() - kiln_loaded) * 1000.0 / CLOCKS_PER_SEC);\n",
			);
		}
		out.push_str("kiln_done:\n");
		out.push_str(w.cleanup.as_str());
		out.push_str("\tif (kiln_out != stdout)\n");
		out.push_str("\t\tfclose(kiln_out);\n");
		out.push_str("\telse\n");
		out.push_str("\t\tfflush(kiln_out);\n");
		out.push_str("\treturn kiln_status;\n");
		out.push_str("}\n\n");

		out.push_str("#ifdef KILN_STANDALONE\n");
		out.push_str("int main(int argc, char **argv)\n{\n");
		out.push_str("\treturn run_main(argc, argv);\n");
		out.push_str("}\n");
		out.push_str("#endif\n");
		out
	}
}

/// Lowers `plan` into the C source of a standalone program.
pub(crate) fn lower(plan: &Plan, request: GenerationRequest, options: &CodegenOptions) -> Result<String> {
	let mut generator = Generator::new(plan, request, options);
	generator.load_tables();
	match request.stage() {
		Stage::Scalar => generator.lower_scalar()?,
		Stage::Vectorised => generator.lower_vectorised()?,
	}
	Ok(generator.assemble())
}
