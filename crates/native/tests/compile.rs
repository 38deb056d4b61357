// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (c) 2025 ReifyDB

use std::{fs, path::Path};

use kiln_codegen::{CodegenOptions, Flags, GenerationRequest, Stage, generate};
use kiln_native::{ArtifactKind, CcCompiler, CompileError, Compiler, CompilerConfig};
use kiln_plan::Plan;
use kiln_testing::{plans, require_cc, temp_dir};

fn compiler(dir: &Path, artifact: ArtifactKind) -> CcCompiler {
	CcCompiler::new(CompilerConfig {
		artifact,
		work_dir: dir.join("work"),
		warnings_as_errors: true,
		..CompilerConfig::default()
	})
}

fn every_request() -> Vec<GenerationRequest> {
	let mut requests = Vec::new();
	for stage in Stage::ALL {
		for bits in 0..16u32 {
			if let Ok(request) = GenerationRequest::new(stage, Flags::from_bits(bits)) {
				requests.push(request);
			}
		}
	}
	requests
}

#[test]
fn test_every_request_compiles_cleanly() {
	require_cc!();
	temp_dir(|dir| {
		let compiler = compiler(dir, ArtifactKind::SharedLibrary);
		let plans: Vec<Plan> = vec![
			plans::filter_project(dir),
			plans::join_sites(dir),
			plans::sites_summary(dir),
			plans::park_regions(dir),
		];
		for plan in &plans {
			for request in every_request() {
				let source = generate(plan, request, &CodegenOptions::default()).unwrap();
				if let Err(err) = compiler.compile(&source) {
					panic!("{:?}: {}\n{}", request, err, source.text());
				}
			}
		}
		Ok(())
	})
	.unwrap();
}

#[test]
fn test_library_and_executable_agree() {
	require_cc!();
	temp_dir(|dir| {
		plans::write_readings(dir)?;
		let plan = plans::sites_summary(dir);
		let request = GenerationRequest::new(Stage::Scalar, Flags::NONE).unwrap();
		let source = generate(&plan, request, &CodegenOptions::default()).unwrap();

		let mut outputs = Vec::new();
		for kind in [ArtifactKind::SharedLibrary, ArtifactKind::Executable] {
			let mut artifact = compiler(dir, kind).compile(&source).unwrap();
			let out = dir.join("out.txt");
			let status = artifact.run(&["--out".to_string(), out.display().to_string()]).unwrap();
			assert_eq!(status, 0);
			outputs.push(fs::read_to_string(&out)?);
		}
		assert_eq!(outputs[0], outputs[1]);
		assert_eq!(outputs[0], "100, 12.50, 2, 10.00\n200, 4.50, 2, 4.00\n");
		Ok(())
	})
	.unwrap();
}

#[test]
fn test_release_removes_build_directory() {
	require_cc!();
	temp_dir(|dir| {
		let plan = plans::filter_project(dir);
		let request = GenerationRequest::new(Stage::Vectorised, Flags::NONE).unwrap();
		let source = generate(&plan, request, &CodegenOptions::default()).unwrap();
		let artifact = compiler(dir, ArtifactKind::SharedLibrary).compile(&source).unwrap();
		let build = artifact.path().parent().unwrap().to_path_buf();
		assert!(build.join("query.c").is_file());
		drop(artifact);
		assert!(!build.exists());
		Ok(())
	})
	.unwrap();
}

#[test]
fn test_failure_keeps_diagnostics() {
	require_cc!();
	temp_dir(|dir| {
		let plan = plans::filter_project(dir);
		let request = GenerationRequest::new(Stage::Scalar, Flags::NONE).unwrap();
		let source = generate(&plan, request, &CodegenOptions::default()).unwrap();
		let missing = dir.join("missing.c");
		let compiler = CcCompiler::new(CompilerConfig {
			args: vec![missing.display().to_string()],
			work_dir: dir.join("work"),
			..CompilerConfig::default()
		});
		match compiler.compile(&source) {
			Err(CompileError::Failed {
				diagnostics,
				..
			}) => assert!(diagnostics.contains("missing.c"), "{}", diagnostics),
			Err(err) => panic!("unexpected error {}", err),
			Ok(_) => panic!("compilation succeeded"),
		}
		Ok(())
	})
	.unwrap();
}
