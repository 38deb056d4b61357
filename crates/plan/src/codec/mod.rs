// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (c) 2025 ReifyDB

//! Binary plan format, version 1. All integers are little-endian.
//!
//! ```text
//! plan := "KPLN" | version u16 | database str | count u32 | node*count
//! node := tag u8 | length u32 | body[length]
//! str  := length u32 | utf-8 bytes
//! ```
//!
//! Node bodies and expression encodings are listed next to the tags below.
//! Decoding fails on the first malformed byte and reports its offset.

mod reader;
mod writer;

use reader::PlanReader;
use writer::PlanWriter;

use crate::{error::DecodeError, plan::Plan};

pub const MAGIC: &[u8; 4] = b"KPLN";
pub const VERSION: u16 = 1;

/// `column u32`
pub(crate) const EXPR_COLUMN: u8 = 0x01;
/// `value i64`
pub(crate) const EXPR_INT: u8 = 0x02;
/// `bits u64`
pub(crate) const EXPR_FLOAT: u8 = 0x03;
/// `days i32`
pub(crate) const EXPR_DATE: u8 = 0x04;
/// `value str`
pub(crate) const EXPR_TEXT: u8 = 0x05;
/// `op u8 | lhs | rhs`
pub(crate) const EXPR_BINARY: u8 = 0x10;
/// `n u32 | expr*n`
pub(crate) const EXPR_AND: u8 = 0x11;
/// `n u32 | expr*n`
pub(crate) const EXPR_OR: u8 = 0x12;
/// `expr`
pub(crate) const EXPR_NOT: u8 = 0x13;
/// `condition | then | otherwise`
pub(crate) const EXPR_CASE: u8 = 0x14;
/// `value | pattern str`
pub(crate) const EXPR_LIKE: u8 = 0x15;

pub(crate) fn encode(plan: &Plan) -> Vec<u8> {
	let mut writer = PlanWriter::new();
	writer.bytes(MAGIC);
	writer.u16(VERSION);
	writer.str(plan.database());
	writer.u32(plan.nodes().len() as u32);
	for node in plan.nodes() {
		writer.node(node);
	}
	writer.finish()
}

pub(crate) fn decode(bytes: &[u8]) -> Result<Plan, DecodeError> {
	let mut reader = PlanReader::new(bytes);

	if reader.bytes(MAGIC.len(), "magic")? != MAGIC {
		return Err(DecodeError::new(0, "bad magic, not a plan buffer"));
	}
	let version_at = reader.offset();
	let version = reader.u16("version")?;
	if version != VERSION {
		return Err(DecodeError::new(version_at, format!("unsupported plan version {}", version)));
	}

	let database = reader.str("database path")?;
	let count_at = reader.offset();
	let count = reader.u32("node count")? as usize;
	if count == 0 {
		return Err(DecodeError::new(count_at, "plan has no nodes"));
	}
	// each node takes at least its tag and length
	if count.saturating_mul(5) > reader.remaining() {
		return Err(DecodeError::new(count_at, format!("node count {} exceeds the remaining bytes", count)));
	}

	let mut starts = Vec::with_capacity(count);
	let mut nodes = Vec::with_capacity(count);
	for _ in 0..count {
		starts.push(reader.offset());
		nodes.push(reader.node()?);
	}

	if reader.remaining() != 0 {
		return Err(DecodeError::new(
			reader.offset(),
			format!("{} trailing bytes after the last node", reader.remaining()),
		));
	}

	Plan::new(database, nodes).map_err(|err| DecodeError::new(starts[err.node as usize], err.reason))
}

#[cfg(test)]
pub mod tests {
	use super::*;
	use crate::{
		expr::{BinaryOp, Expr},
		operator::{Aggregate, Operator, ScanColumn},
		plan::PlanBuilder,
		types::DataType,
		validate::MAX_EXPR_DEPTH,
	};

	fn sample() -> Plan {
		let mut builder = PlanBuilder::new("tpch");
		let orders = builder.scan("orders", [(0, DataType::Int64), (4, DataType::Date)]);
		let filter = builder.filter(
			orders,
			Expr::And(vec![
				Expr::ge(Expr::column(1), Expr::date(8_766)),
				Expr::Not(Box::new(Expr::equal(Expr::column(0), Expr::int(-3)))),
			]),
		);
		let items = builder.scan("lineitem", [(0, DataType::Int64), (5, DataType::Float64)]);
		let join = builder.join(filter, items, 0, 0);
		let project = builder.project(
			join,
			vec![
				Expr::column(1),
				Expr::case(
					Expr::Or(vec![Expr::lt(Expr::column(3), Expr::float(0.25))]),
					Expr::float(0.0),
					Expr::binary(BinaryOp::Div, Expr::column(3), Expr::int(2)),
				),
			],
		);
		builder.aggregate(project, vec![0], vec![Aggregate::Sum(1), Aggregate::Count, Aggregate::Min(1)]);
		builder.build().unwrap()
	}

	#[test]
	fn test_round_trip() {
		let plan = sample();
		let bytes = plan.encode();
		let decoded = Plan::decode(&bytes).unwrap();
		assert_eq!(decoded, plan);
		assert_eq!(decoded.encode(), bytes);
	}

	#[test]
	fn test_header() {
		let bytes = sample().encode();
		assert_eq!(&bytes[0..4], b"KPLN");
		assert_eq!(&bytes[4..6], &[1, 0]);
		assert_eq!(&bytes[6..10], &[4, 0, 0, 0]);
		assert_eq!(&bytes[10..14], b"tpch");
		assert_eq!(&bytes[14..18], &[6, 0, 0, 0]);
		assert_eq!(bytes[18], 0x01);
	}

	#[test]
	fn test_every_truncation_fails() {
		let bytes = sample().encode();
		for len in 0..bytes.len() {
			let err = Plan::decode(&bytes[..len]).unwrap_err();
			assert!(err.offset <= len, "offset {} beyond truncation {}", err.offset, len);
		}
	}

	#[test]
	fn test_trailing_bytes() {
		let mut bytes = sample().encode();
		let end = bytes.len();
		bytes.push(0);
		let err = Plan::decode(&bytes).unwrap_err();
		assert_eq!(err.offset, end);
	}

	#[test]
	fn test_bad_magic_and_version() {
		let mut bytes = sample().encode();
		bytes[5] = 2;
		assert_eq!(Plan::decode(&bytes).unwrap_err().offset, 4);
		bytes[0] = b'X';
		assert_eq!(Plan::decode(&bytes).unwrap_err().offset, 0);
	}

	#[test]
	fn test_unknown_operator_tag() {
		let mut bytes = sample().encode();
		bytes[18] = 0x7f;
		let err = Plan::decode(&bytes).unwrap_err();
		assert_eq!(err.offset, 18);
		assert!(err.reason.contains("unknown operator"));
	}

	#[test]
	fn test_validation_error_points_at_node() {
		let mut builder = PlanBuilder::new("db");
		let scan = builder.scan("t", [(0, DataType::Int64)]);
		builder.filter(scan, Expr::gt(Expr::column(0), Expr::int(1)));
		let plan = builder.build().unwrap();

		let mut bytes = plan.encode();
		// filter node starts after header (4 + 2 + 4 + 2 + 4), scan node (1 + 4 + 4 + 1 + 4 + 5)
		let filter_at = 16 + 19;
		assert_eq!(bytes[filter_at], 0x02);
		// point the column reference of the predicate at a missing column
		let column_at = filter_at + 1 + 4 + 4 + 1 + 1 + 1;
		bytes[column_at] = 9;
		let err = Plan::decode(&bytes).unwrap_err();
		assert_eq!(err.offset, filter_at);
	}

	fn encode_nodes(nodes: &[Operator]) -> Vec<u8> {
		let mut writer = PlanWriter::new();
		writer.bytes(MAGIC);
		writer.u16(VERSION);
		writer.str("db");
		writer.u32(nodes.len() as u32);
		for node in nodes {
			writer.node(node);
		}
		writer.finish()
	}

	fn scan_node() -> Operator {
		Operator::Scan {
			table: "t".to_string(),
			columns: vec![ScanColumn {
				index: 0,
				ty: DataType::Int64,
			}],
		}
	}

	#[test]
	fn test_expression_depth_limit() {
		let mut predicate = Expr::gt(Expr::column(0), Expr::int(0));
		for _ in 0..MAX_EXPR_DEPTH {
			predicate = Expr::Not(Box::new(predicate));
		}
		let bytes = encode_nodes(&[
			scan_node(),
			Operator::Filter {
				input: 0,
				predicate,
			},
		]);
		let err = Plan::decode(&bytes).unwrap_err();
		assert!(err.reason.contains("nesting"), "{}", err.reason);
	}

	#[test]
	fn test_empty_boolean_list() {
		let bytes = encode_nodes(&[
			scan_node(),
			Operator::Filter {
				input: 0,
				predicate: Expr::And(vec![]),
			},
		]);
		let err = Plan::decode(&bytes).unwrap_err();
		assert!(err.reason.contains("empty"), "{}", err.reason);
	}

	#[test]
	fn test_text_round_trip() {
		let mut builder = PlanBuilder::new("db");
		let scan = builder.scan("stations", [(0, DataType::Int64), (1, DataType::Text)]);
		let filter = builder.filter(
			scan,
			Expr::Or(vec![
				Expr::like(Expr::column(1), "%park%"),
				Expr::equal(Expr::column(1), Expr::text("it's")),
			]),
		);
		builder.aggregate(filter, vec![1], vec![Aggregate::Count]);
		let plan = builder.build().unwrap();

		let bytes = plan.encode();
		assert_eq!(Plan::decode(&bytes).unwrap(), plan);
		// scan column type tag of the text column
		assert_eq!(bytes[16 + 1 + 4 + 4 + 8 + 4 + 5 + 4], 3);
	}

	#[test]
	fn test_invalid_utf8_text_literal() {
		let mut bytes = encode_nodes(&[
			scan_node(),
			Operator::Project {
				input: 0,
				expressions: vec![Expr::text("ab")],
			},
		]);
		let end = bytes.len();
		bytes[end - 1] = 0xff;
		let err = Plan::decode(&bytes).unwrap_err();
		assert!(err.reason.contains("utf-8"), "{}", err.reason);
		assert_eq!(err.offset, end - 2);
	}

	#[test]
	fn test_node_length_mismatch() {
		let mut bytes = encode_nodes(&[scan_node()]);
		// grow the declared scan body by one byte and append it
		bytes[17] += 1;
		bytes.push(0);
		let err = Plan::decode(&bytes).unwrap_err();
		assert!(err.reason.contains("unread"), "{}", err.reason);
	}
}
