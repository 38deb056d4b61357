// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (c) 2025 ReifyDB

//! Small plans over the tables written by [`write_readings`] and
//! [`write_stations`].

use std::path::Path;

use kiln_plan::{Aggregate, DataType, Expr, Plan, PlanBuilder};

use crate::write_table;

/// Writes `readings(id int, value float)` and
/// `sensors(id int, site int, installed date)`.
pub fn write_readings(dir: &Path) -> std::io::Result<()> {
	write_table(dir, "readings", &["1,2.5", "12,4.0", "11,1.25", "30,10.0", "7,3.0", "12,0.5"])?;
	write_table(dir, "sensors", &["1,100,2020-01-15", "12,200,2021-06-30", "30,100,2019-12-31", "99,300,2022-02-01"])
}

/// Writes `stations(id int, region text, name text)`, keyed like `readings`.
pub fn write_stations(dir: &Path) -> std::io::Result<()> {
	write_table(
		dir,
		"stations",
		&["1,north,Alder Park", "11,south,Birch Street", "12,north,Cedar Park", "30,east,Dune Road", "7,south,Elm Park"],
	)
}

/// `scan readings, filter id > 10, project id`
pub fn filter_project(database: &Path) -> Plan {
	let mut builder = PlanBuilder::new(database.display().to_string());
	let scan = builder.scan("readings", [(0, DataType::Int64)]);
	let filter = builder.filter(scan, Expr::gt(Expr::column(0), Expr::int(10)));
	builder.project(filter, vec![Expr::column(0)]);
	builder.build().expect("valid plan")
}

/// Readings joined with their sensor: `site, value`.
pub fn join_sites(database: &Path) -> Plan {
	let mut builder = PlanBuilder::new(database.display().to_string());
	let sensors = builder.scan("sensors", [(0, DataType::Int64), (1, DataType::Int64)]);
	let readings = builder.scan("readings", [(0, DataType::Int64), (1, DataType::Float64)]);
	let join = builder.join(sensors, readings, 0, 0);
	builder.project(join, vec![Expr::column(1), Expr::column(3)]);
	builder.build().expect("valid plan")
}

/// Readings per site: `site, sum(value), count, max(value)`.
pub fn sites_summary(database: &Path) -> Plan {
	let mut builder = PlanBuilder::new(database.display().to_string());
	let sensors = builder.scan("sensors", [(0, DataType::Int64), (1, DataType::Int64)]);
	let readings = builder.scan("readings", [(0, DataType::Int64), (1, DataType::Float64)]);
	let join = builder.join(sensors, readings, 0, 0);
	builder.aggregate(join, vec![1], vec![Aggregate::Sum(3), Aggregate::Count, Aggregate::Max(3)]);
	builder.build().expect("valid plan")
}

/// Readings of the park stations per region: `region, count, sum(value)`.
pub fn park_regions(database: &Path) -> Plan {
	let mut builder = PlanBuilder::new(database.display().to_string());
	let stations = builder.scan("stations", [(0, DataType::Int64), (1, DataType::Text), (2, DataType::Text)]);
	let parks = builder.filter(stations, Expr::like(Expr::column(2), "%Park"));
	let readings = builder.scan("readings", [(0, DataType::Int64), (1, DataType::Float64)]);
	let join = builder.join(parks, readings, 0, 0);
	builder.aggregate(join, vec![1], vec![Aggregate::Count, Aggregate::Sum(4)]);
	builder.build().expect("valid plan")
}
