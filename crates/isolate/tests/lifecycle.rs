// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (c) 2025 ReifyDB

use std::path::Path;

use kiln_isolate::{Error, Flags, GenerationRequest, Isolate, IsolateConfig, Stage};
use kiln_testing::{FakeCompiler, plans};

fn isolate(compiler: &FakeCompiler) -> Isolate {
	Isolate::with_compiler(IsolateConfig::default(), Box::new(compiler.clone())).unwrap()
}

fn plan_bytes() -> Vec<u8> {
	plans::filter_project(Path::new("data")).encode()
}

#[test]
fn test_generate_before_ingest() {
	let mut isolate = isolate(&FakeCompiler::new());
	assert!(matches!(isolate.generate_raw(0, 0), Err(Error::NoPlan)));
}

#[test]
fn test_compile_before_generate() {
	let mut isolate = isolate(&FakeCompiler::new());
	isolate.ingest(&plan_bytes()).unwrap();
	assert!(matches!(isolate.compile(), Err(Error::NoGeneratedSource)));
}

#[test]
fn test_execute_before_compile() {
	let mut isolate = isolate(&FakeCompiler::new());
	isolate.ingest(&plan_bytes()).unwrap();
	isolate.generate_raw(0, 0).unwrap();
	assert!(matches!(isolate.execute(&[]), Err(Error::NoCompiledArtifact)));
}

#[test]
fn test_full_cycle() {
	let compiler = FakeCompiler::new().with_status(7);
	let counters = compiler.counters();
	let mut isolate = isolate(&compiler);
	isolate.ingest(&plan_bytes()).unwrap();
	isolate.generate_raw(1, (Flags::COUNT_ONLY | Flags::SIMD_HINTS).bits() as i32).unwrap();
	assert_eq!(isolate.compile().unwrap().path(), Path::new("fake-vectorised-0.so"));
	assert_eq!(isolate.execute(&["--db".to_string(), "elsewhere".to_string()]).unwrap(), 7);
	assert_eq!(isolate.execute(&[]).unwrap(), 7);
	assert_eq!(counters.compiled(), 1);
	assert_eq!(counters.runs(), 2);
	assert_eq!(counters.released(), 0);
}

#[test]
fn test_reingest_releases_artifact_once() {
	let compiler = FakeCompiler::new();
	let counters = compiler.counters();
	let mut isolate = isolate(&compiler);
	isolate.ingest(&plan_bytes()).unwrap();
	isolate.generate_raw(0, 0).unwrap();
	isolate.compile().unwrap();

	isolate.ingest(&plan_bytes()).unwrap();
	assert_eq!(counters.released(), 1);
	assert!(isolate.source().is_none());
	assert!(matches!(isolate.execute(&[]), Err(Error::NoCompiledArtifact)));

	drop(isolate);
	assert_eq!(counters.released(), 1);
}

#[test]
fn test_regenerate_releases_artifact() {
	let compiler = FakeCompiler::new();
	let counters = compiler.counters();
	let mut isolate = isolate(&compiler);
	isolate.ingest(&plan_bytes()).unwrap();
	isolate.generate_raw(0, 0).unwrap();
	isolate.compile().unwrap();
	isolate.generate_raw(0, Flags::PROFILE.bits() as i32).unwrap();
	assert_eq!(counters.released(), 1);
	assert!(matches!(isolate.execute(&[]), Err(Error::NoCompiledArtifact)));
}

#[test]
fn test_recompile_releases_previous_artifact() {
	let compiler = FakeCompiler::new();
	let counters = compiler.counters();
	let mut isolate = isolate(&compiler);
	isolate.ingest(&plan_bytes()).unwrap();
	isolate.generate_raw(0, 0).unwrap();
	isolate.compile().unwrap();
	isolate.compile().unwrap();
	assert_eq!(counters.compiled(), 2);
	assert_eq!(counters.released(), 1);
	drop(isolate);
	assert_eq!(counters.released(), 2);
}

#[test]
fn test_truncated_plan() {
	let compiler = FakeCompiler::new();
	let counters = compiler.counters();
	let mut isolate = isolate(&compiler);
	isolate.ingest(&plan_bytes()).unwrap();
	isolate.generate_raw(0, 0).unwrap();
	isolate.compile().unwrap();

	let bytes = plan_bytes();
	let err = isolate.ingest(&bytes[..bytes.len() - 3]).unwrap_err();
	assert!(
		matches!(
			err,
			Error::PlanParse {
				..
			}
		),
		"{}",
		err
	);
	assert_eq!(err.code(), -2);
	assert_eq!(counters.released(), 1);
	assert!(isolate.plan().is_none());
	assert!(matches!(isolate.generate_raw(0, 0), Err(Error::NoPlan)));
}

#[test]
fn test_unsupported_stage_keeps_state() {
	let compiler = FakeCompiler::new();
	let counters = compiler.counters();
	let mut isolate = isolate(&compiler);
	isolate.ingest(&plan_bytes()).unwrap();
	isolate.generate_raw(0, 0).unwrap();
	isolate.compile().unwrap();
	let source = isolate.source().cloned();

	for (stage, flags) in [(2, 0), (-1, 0), (0, Flags::SIMD_HINTS.bits() as i32), (1, 0x10), (0, -1)] {
		let err = isolate.generate_raw(stage, flags).unwrap_err();
		assert!(
			matches!(
				err,
				Error::UnsupportedStage {
					..
				}
			),
			"{}",
			err
		);
	}
	assert_eq!(isolate.source().cloned(), source);
	assert_eq!(counters.released(), 0);
	assert!(isolate.execute(&[]).is_ok());
}

#[test]
fn test_failed_compile_keeps_artifact() {
	let compiler = FakeCompiler::new().with_status(3);
	let counters = compiler.counters();
	let mut isolate = isolate(&compiler);
	isolate.ingest(&plan_bytes()).unwrap();
	isolate.generate_raw(0, 0).unwrap();
	let first = isolate.compile().unwrap().path().to_path_buf();

	compiler.fail_with(Some("query.c:1:1: error: boom".to_string()));
	match isolate.compile() {
		Err(Error::Compile {
			diagnostics,
			..
		}) => assert_eq!(diagnostics, "query.c:1:1: error: boom"),
		other => panic!("unexpected {:?}", other.map(|_| ())),
	}
	assert_eq!(isolate.execute(&[]).unwrap(), 3);
	assert_eq!(isolate.artifact_path(), Some(first.as_path()));
	assert_eq!(counters.compiled(), 1);
	assert_eq!(counters.released(), 0);

	compiler.fail_with(None);
	let second = isolate.compile().unwrap().path().to_path_buf();
	assert_ne!(second, first);
	assert_eq!(counters.released(), 1);
	assert_eq!(isolate.execute(&[]).unwrap(), 3);
}

#[test]
fn test_generation_is_deterministic() {
	let mut isolate = isolate(&FakeCompiler::new());
	isolate.ingest(&plan_bytes()).unwrap();
	for stage in Stage::ALL {
		let request = GenerationRequest::new(stage, Flags::PROFILE).unwrap();
		isolate.generate(request).unwrap();
		let first = isolate.source().unwrap().text().to_string();
		isolate.ingest(&plan_bytes()).unwrap();
		isolate.generate(request).unwrap();
		assert_eq!(isolate.source().unwrap().text(), first);
	}
}

#[test]
fn test_contexts_are_independent() {
	let first_compiler = FakeCompiler::new().with_status(1);
	let second_compiler = FakeCompiler::new().with_status(2);
	let mut first = isolate(&first_compiler);
	let mut second = isolate(&second_compiler);

	first.ingest(&plan_bytes()).unwrap();
	assert!(matches!(second.generate_raw(0, 0), Err(Error::NoPlan)));
	second.ingest(&plans::join_sites(Path::new("data")).encode()).unwrap();
	first.generate_raw(0, 0).unwrap();
	second.generate_raw(1, 0).unwrap();
	first.compile().unwrap();
	assert!(matches!(second.execute(&[]), Err(Error::NoCompiledArtifact)));
	second.compile().unwrap();

	assert_eq!(first.execute(&[]).unwrap(), 1);
	assert_eq!(second.execute(&[]).unwrap(), 2);
	first.release();
	assert_eq!(first_compiler.counters().released(), 1);
	assert_eq!(second_compiler.counters().released(), 0);
	assert_eq!(second.execute(&[]).unwrap(), 2);
}

#[test]
fn test_context_init_failure() {
	let blocker = std::env::temp_dir().join(format!("kiln-blocker-{}", std::process::id()));
	std::fs::write(&blocker, b"").unwrap();
	let config = IsolateConfig::builder().work_dir(blocker.join("nested")).build();
	let err = Isolate::with_compiler(config, Box::new(FakeCompiler::new())).err().unwrap();
	assert_eq!(err.code(), -1);
	std::fs::remove_file(blocker).unwrap();
}
