// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (c) 2025 ReifyDB

mod explain;

use std::{
	fs,
	path::PathBuf,
	process::ExitCode,
	time::{Duration, Instant},
};

use anyhow::{Context, Result, bail};
use clap::{Parser, ValueEnum};
use kiln_isolate::{ArtifactKind, Flags, GenerationRequest, Isolate, IsolateConfig, Stage};
use kiln_plan::Plan;
use serde_json::json;
use tracing::{debug, info};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// Compiles a query plan to native code and runs it
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
	/// Plan file, in the text format unless --binary is given
	#[arg(long)]
	plan: PathBuf,

	/// The plan file holds a binary plan
	#[arg(long)]
	binary: bool,

	/// Database directory, overriding the one named by the plan
	#[arg(long)]
	db: Option<PathBuf>,

	/// Write result rows to this file instead of stdout
	#[arg(long)]
	out: Option<PathBuf>,

	/// Code generation strategy
	#[arg(long, value_enum, default_value_t = Paradigm::Scalar)]
	paradigm: Paradigm,

	/// Print only the number of result rows
	#[arg(long)]
	count: bool,

	/// Omit runtime bounds and field checks
	#[arg(long)]
	elide_bounds_checks: bool,

	/// Emit vectorisation hints (vectorised paradigm only)
	#[arg(long)]
	simd: bool,

	/// Print stage timings as JSON on stderr
	#[arg(long)]
	profile: bool,

	/// Print the plan and the generated source on stderr
	#[arg(long)]
	print_source: bool,

	/// C compiler program
	#[arg(long)]
	compiler: Option<String>,

	/// JSON isolate configuration file
	#[arg(long)]
	config: Option<PathBuf>,

	/// Keep build directories for inspection
	#[arg(long)]
	keep_artifacts: bool,

	/// Run the program as a child process instead of loading it
	#[arg(long)]
	executable: bool,

	/// Log level
	#[arg(long, default_value = "warn")]
	log_level: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum Paradigm {
	Scalar,
	Vectorised,
}

impl From<Paradigm> for Stage {
	fn from(paradigm: Paradigm) -> Self {
		match paradigm {
			Paradigm::Scalar => Stage::Scalar,
			Paradigm::Vectorised => Stage::Vectorised,
		}
	}
}

impl Args {
	fn flags(&self) -> Flags {
		let mut flags = Flags::NONE;
		if self.count {
			flags = flags | Flags::COUNT_ONLY;
		}
		if self.elide_bounds_checks {
			flags = flags | Flags::ELIDE_BOUNDS_CHECKS;
		}
		if self.profile {
			flags = flags | Flags::PROFILE;
		}
		if self.simd {
			flags = flags | Flags::SIMD_HINTS;
		}
		flags
	}

	fn config(&self) -> Result<IsolateConfig> {
		let mut config = match &self.config {
			Some(path) => {
				let json =
					fs::read_to_string(path).with_context(|| format!("reading config {}", path.display()))?;
				IsolateConfig::from_json(&json).with_context(|| format!("parsing config {}", path.display()))?
			}
			None => IsolateConfig::default(),
		};
		if let Some(compiler) = &self.compiler {
			config.compiler = compiler.clone();
		}
		if self.keep_artifacts {
			config.keep_artifacts = true;
		}
		if self.executable {
			config.artifact = ArtifactKind::Executable;
		}
		Ok(config)
	}

	fn program_args(&self) -> Vec<String> {
		let mut args = Vec::new();
		if let Some(db) = &self.db {
			args.push("--db".to_string());
			args.push(db.display().to_string());
		}
		if let Some(out) = &self.out {
			args.push("--out".to_string());
			args.push(out.display().to_string());
		}
		args
	}
}

fn timed<T>(timings: &mut Vec<(&'static str, Duration)>, stage: &'static str, f: impl FnOnce() -> T) -> T {
	let started = Instant::now();
	let result = f();
	timings.push((stage, started.elapsed()));
	result
}

fn run(args: &Args) -> Result<i32> {
	let request = GenerationRequest::new(args.paradigm.into(), args.flags())?;
	let mut isolate = Isolate::new(args.config()?)?;
	let mut timings = Vec::new();

	let bytes = fs::read(&args.plan).with_context(|| format!("reading plan {}", args.plan.display()))?;
	timed(&mut timings, "ingest", || -> Result<()> {
		if args.binary {
			isolate.ingest(&bytes)?;
		} else {
			let text = String::from_utf8(bytes).context("plan is not UTF-8")?;
			let plan = Plan::parse(&text).with_context(|| format!("parsing plan {}", args.plan.display()))?;
			isolate.install(plan)?;
		}
		Ok(())
	})?;

	timed(&mut timings, "generate", || isolate.generate(request))?;
	if args.print_source {
		if let Some(plan) = isolate.plan() {
			explain::plan(plan);
		}
		if let Some(source) = isolate.source() {
			explain::source(source);
		}
	}

	let artifact = timed(&mut timings, "compile", || isolate.compile().map(|artifact| artifact.path().to_path_buf()))?;
	debug!(path = %artifact.display(), "compiled");

	let status = timed(&mut timings, "execute", || isolate.execute(&args.program_args()))?;
	info!(status, "program finished");

	if args.profile {
		let mut report = serde_json::Map::new();
		for (stage, elapsed) in timings {
			report.insert(stage.to_string(), json!(elapsed.as_secs_f64() * 1000.0));
		}
		eprintln!("{}", serde_json::Value::Object(report));
	}
	Ok(status)
}

fn main() -> Result<ExitCode> {
	let args = Args::parse();

	// targets match by prefix, so this also covers the kiln_* library crates
	let directive = format!("kiln={}", args.log_level);
	tracing_subscriber::registry()
		.with(tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| directive.into()))
		.with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
		.init();

	if args.simd && args.paradigm == Paradigm::Scalar {
		bail!("--simd requires --paradigm vectorised");
	}

	let status = run(&args)?;
	Ok(ExitCode::from(u8::try_from(status).unwrap_or(1)))
}
