// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (c) 2025 ReifyDB

use std::{fs, path::Path};

use kiln_codegen::{
	CodegenOptions, ENTRY_POINT, Flags, GenerationRequest, MAX_VECTOR_SIZE, STANDALONE_DEFINE, Stage, generate,
};
use kiln_plan::Plan;
use test_each_file::test_each_path;

test_each_path! { in "crates/codegen/tests/plans" as every_request => every_request }

fn load(path: &Path) -> Plan {
	let source = fs::read_to_string(path).expect("fixture readable");
	Plan::parse(&source).unwrap_or_else(|err| panic!("{}: {}", path.display(), err))
}

fn requests() -> Vec<GenerationRequest> {
	let mut requests = Vec::new();
	for stage in Stage::ALL {
		let supported = stage.supported_flags().bits();
		for bits in 0..16u32 {
			if bits & !supported == 0 {
				requests.push(GenerationRequest::new(stage, Flags::from_bits(bits)).unwrap());
			}
		}
	}
	requests
}

fn every_request(path: &Path) {
	let plan = load(path);
	let options = CodegenOptions::default();
	for request in requests() {
		let source = generate(&plan, request, &options)
			.unwrap_or_else(|err| panic!("{} {:?}: {}", path.display(), request, err));
		let text = source.text();

		assert!(text.contains(&format!("int {}(int argc, char **argv)", ENTRY_POINT)));
		assert!(text.contains(&format!("#ifdef {}", STANDALONE_DEFINE)));

		assert_eq!(request.has(Flags::COUNT_ONLY), text.contains("kiln_count"));
		assert_eq!(!request.has(Flags::COUNT_ONLY), text.contains("kiln_print_row("));
		assert_eq!(request.has(Flags::PROFILE), text.contains("\\\"execution\\\""));
		if !request.has(Flags::SIMD_HINTS) {
			assert!(!text.contains("#pragma"));
		}
		assert_eq!(!request.has(Flags::ELIDE_BOUNDS_CHECKS), text.contains("kiln_fault"));
		assert_eq!(request.stage() == Stage::Vectorised, text.contains("KILN_VECTOR_SIZE"));

		let again = generate(&plan, request, &options).unwrap();
		assert_eq!(again.text(), text, "generation is deterministic");
	}
}

fn fixture(name: &str) -> Plan {
	load(&Path::new(env!("CARGO_MANIFEST_DIR")).join("tests/plans").join(name))
}

#[test]
fn test_vector_size_is_configurable() {
	let plan = fixture("filter_project.plan");
	let request = GenerationRequest::new(Stage::Vectorised, Flags::NONE).unwrap();
	let source = generate(
		&plan,
		request,
		&CodegenOptions {
			vector_size: 64,
		},
	)
	.unwrap();
	assert!(source.text().contains("#define KILN_VECTOR_SIZE 64\n"));
}

#[test]
fn test_database_embedded() {
	let plan = fixture("join_aggregate.plan");
	let request = GenerationRequest::new(Stage::Scalar, Flags::NONE).unwrap();
	let source = generate(&plan, request, &CodegenOptions::default()).unwrap();
	assert!(source.text().contains("const char *kiln_db = \"data/shop\";"));
	assert!(source.text().contains("kiln_load_s0(kiln_db, &s0)"));
	assert!(source.text().contains("kiln_load_s1(kiln_db, &s1)"));
}

#[test]
fn test_elided_checks_use_plain_division() {
	let plan = fixture("filter_project.plan");
	let checked = generate(&plan, GenerationRequest::new(Stage::Scalar, Flags::NONE).unwrap(), &CodegenOptions::default())
		.unwrap();
	let elided = generate(
		&plan,
		GenerationRequest::new(Stage::Scalar, Flags::ELIDE_BOUNDS_CHECKS).unwrap(),
		&CodegenOptions::default(),
	)
	.unwrap();
	assert!(checked.text().contains("kiln_idiv("));
	assert!(!elided.text().contains("kiln_idiv("));
}

#[test]
fn test_compile_options_follow_request() {
	let plan = fixture("ungrouped_totals.plan");
	let request = GenerationRequest::new(Stage::Vectorised, Flags::SIMD_HINTS | Flags::COUNT_ONLY).unwrap();
	let source = generate(&plan, request, &CodegenOptions::default()).unwrap();
	assert_eq!(source.request(), request);
	assert!(source.compile_options().args().iter().any(|arg| arg == "-fopenmp-simd"));
}

#[test]
fn test_simd_hints_on_dense_batches() {
	let plan = Plan::parse("database data\nscan t 0:float 1:int\nproject 0 (* $0 2.0) (+ $1 1)\naggregate 1 group [] sum $0\n")
		.unwrap();
	let request = GenerationRequest::new(Stage::Vectorised, Flags::SIMD_HINTS).unwrap();
	let source = generate(&plan, request, &CodegenOptions::default()).unwrap();
	assert!(source.text().contains("#pragma omp simd\n"));
	assert!(source.text().contains("#pragma omp simd reduction(+:a2_v0)"));
}

#[test]
fn test_vector_size_is_clamped() {
	let plan = fixture("filter_project.plan");
	let request = GenerationRequest::new(Stage::Vectorised, Flags::NONE).unwrap();
	let source = generate(
		&plan,
		request,
		&CodegenOptions {
			vector_size: usize::MAX,
		},
	)
	.unwrap();
	assert!(source.text().contains(&format!("#define KILN_VECTOR_SIZE {}\n", MAX_VECTOR_SIZE)));
}

#[test]
fn test_scalar_projection_binds_every_expression() {
	let plan = Plan::parse("database data\nscan t 0:int\nproject 0 $0 (/ 10 (- $0 1))\naggregate 1 group [] count\n").unwrap();
	let request = GenerationRequest::new(Stage::Scalar, Flags::NONE).unwrap();
	let source = generate(&plan, request, &CodegenOptions::default()).unwrap();
	assert!(source.text().contains("int64_t const p1_v1 = kiln_idiv("));
	assert!(source.text().contains("(void)p1_v1;"));
}

#[test]
fn test_text_keys_compare_bytes() {
	let plan = fixture("text_keys.plan");
	for stage in Stage::ALL {
		let request = GenerationRequest::new(stage, Flags::NONE).unwrap();
		let source = generate(&plan, request, &CodegenOptions::default()).unwrap();
		let text = source.text();
		assert!(text.contains("kiln_like("), "{:?}", stage);
		assert!(text.contains("kiln_hash_text("), "{:?}", stage);
		assert!(text.contains("strcmp("), "{:?}", stage);
		assert!(text.contains("const char * const"), "{:?}", stage);
	}
}

#[test]
fn test_integer_sum_has_no_reduction_hint() {
	let plan = Plan::parse("database data\nscan t 0:int\naggregate 0 group [] sum $0\n").unwrap();
	let request = GenerationRequest::new(Stage::Vectorised, Flags::SIMD_HINTS).unwrap();
	let source = generate(&plan, request, &CodegenOptions::default()).unwrap();
	assert!(!source.text().contains("reduction(+:"));
	assert!(source.text().contains("a1_v0 = (int64_t)((uint64_t)a1_v0 + (uint64_t)"));
}
