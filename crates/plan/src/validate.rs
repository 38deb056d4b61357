// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (c) 2025 ReifyDB

//! Shape and type checking of plans.
//!
//! Every node's output schema is resolved in node order, so a child is always
//! typed before its parent. Expression typing follows these rules:
//!
//! - `Int64` mixed with `Float64` in arithmetic widens to `Float64`
//! - `Date + Int64`, `Int64 + Date` and `Date - Int64` yield `Date`
//! - `Date - Date` yields the difference in days as `Int64`
//! - comparisons yield `Bool`; `Bool` operands only support `=` and `!=`
//! - `Text` supports comparisons and `like`, no arithmetic
//! - `and`, `or`, `not` and case conditions require `Bool`

use crate::{
	error::ValidationError,
	expr::{BinaryOp, Expr},
	operator::{Aggregate, NodeId, Operator},
	types::{DataType, Schema},
};

/// Deepest expression nesting accepted by the codec and the validator.
pub const MAX_EXPR_DEPTH: usize = 64;

/// Resolves the type of `expr` evaluated against a row of `input`.
pub fn infer_type(expr: &Expr, input: &[DataType]) -> Result<DataType, String> {
	match expr {
		Expr::Column(index) => input
			.get(*index as usize)
			.copied()
			.ok_or_else(|| format!("column ${} out of range, input has {} columns", index, input.len())),
		Expr::Int(_) => Ok(DataType::Int64),
		Expr::Float(_) => Ok(DataType::Float64),
		Expr::Date(_) => Ok(DataType::Date),
		Expr::Text(_) => Ok(DataType::Text),
		Expr::Binary {
			op,
			lhs,
			rhs,
		} => {
			let lhs = infer_type(lhs, input)?;
			let rhs = infer_type(rhs, input)?;
			binary_type(*op, lhs, rhs)
		}
		Expr::And(operands) | Expr::Or(operands) => {
			if operands.is_empty() {
				return Err("empty boolean list".to_string());
			}
			for operand in operands {
				expect_bool(infer_type(operand, input)?)?;
			}
			Ok(DataType::Bool)
		}
		Expr::Not(operand) => {
			expect_bool(infer_type(operand, input)?)?;
			Ok(DataType::Bool)
		}
		Expr::Case {
			condition,
			then,
			otherwise,
		} => {
			expect_bool(infer_type(condition, input)?)?;
			let then = infer_type(then, input)?;
			let otherwise = infer_type(otherwise, input)?;
			unify(then, otherwise)
				.ok_or_else(|| format!("case branches have incompatible types {} and {}", then, otherwise))
		}
		Expr::Like {
			value,
			..
		} => match infer_type(value, input)? {
			DataType::Text => Ok(DataType::Bool),
			other => Err(format!("like is not defined for {}", other)),
		},
	}
}

fn binary_type(op: BinaryOp, lhs: DataType, rhs: DataType) -> Result<DataType, String> {
	use DataType::*;

	let result = if op.is_comparison() {
		match (lhs, rhs) {
			(l, r) if l.is_numeric() && r.is_numeric() => Some(Bool),
			(Date, Date) | (Text, Text) => Some(Bool),
			(Bool, Bool) if matches!(op, BinaryOp::Eq | BinaryOp::Ne) => Some(Bool),
			_ => None,
		}
	} else {
		match (op, lhs, rhs) {
			(_, Int64, Int64) => Some(Int64),
			(_, l, r) if l.is_numeric() && r.is_numeric() => Some(Float64),
			(BinaryOp::Add, Date, Int64) | (BinaryOp::Add, Int64, Date) | (BinaryOp::Sub, Date, Int64) => {
				Some(Date)
			}
			(BinaryOp::Sub, Date, Date) => Some(Int64),
			_ => None,
		}
	};

	result.ok_or_else(|| format!("operator {} is not defined for {} and {}", op.symbol(), lhs, rhs))
}

/// Common type of two case branches.
pub fn unify(lhs: DataType, rhs: DataType) -> Option<DataType> {
	if lhs == rhs {
		Some(lhs)
	} else if lhs.is_numeric() && rhs.is_numeric() {
		Some(DataType::Float64)
	} else {
		None
	}
}

fn expect_bool(ty: DataType) -> Result<(), String> {
	if ty == DataType::Bool {
		Ok(())
	} else {
		Err(format!("expected bool, found {}", ty))
	}
}

pub(crate) fn is_valid_table_name(name: &str) -> bool {
	!name.is_empty() && name.bytes().all(|b| b.is_ascii_alphanumeric() || b == b'_')
}

/// Checks the plan shape and resolves the output schema of every node.
pub(crate) fn validate(nodes: &[Operator]) -> Result<Vec<Schema>, ValidationError> {
	if nodes.is_empty() {
		return Err(ValidationError::new(0, "plan has no nodes"));
	}

	let mut schemas: Vec<Schema> = Vec::with_capacity(nodes.len());
	let mut consumers = vec![0usize; nodes.len()];

	for (position, node) in nodes.iter().enumerate() {
		let id = position as NodeId;
		let fail = |reason: String| ValidationError::new(id, reason);

		for input in node.inputs() {
			if input >= id {
				return Err(fail(format!("input {} does not refer to an earlier node", input)));
			}
			consumers[input as usize] += 1;
		}

		let schema = resolve(node, &schemas).map_err(fail)?;
		schemas.push(schema);
	}

	let root = nodes.len() - 1;
	for (position, count) in consumers.iter().enumerate() {
		if position == root {
			if *count != 0 {
				return Err(ValidationError::new(position as NodeId, "root node is consumed by another node"));
			}
		} else if *count != 1 {
			return Err(ValidationError::new(
				position as NodeId,
				format!("node is consumed {} times, expected exactly once", count),
			));
		}
	}

	Ok(schemas)
}

fn resolve(node: &Operator, schemas: &[Schema]) -> Result<Schema, String> {
	match node {
		Operator::Scan {
			table,
			columns,
		} => {
			if !is_valid_table_name(table) {
				return Err(format!("invalid table name '{}'", table));
			}
			if columns.is_empty() {
				return Err("scan reads no columns".to_string());
			}
			columns.iter()
				.map(|column| {
					if column.ty == DataType::Bool {
						Err(format!("table column {} cannot be bool", column.index))
					} else {
						Ok(column.ty)
					}
				})
				.collect()
		}
		Operator::Filter {
			input,
			predicate,
		} => {
			let input = &schemas[*input as usize];
			check_depth(predicate)?;
			let ty = infer_type(predicate, input)?;
			if ty != DataType::Bool {
				return Err(format!("filter predicate must be bool, found {}", ty));
			}
			Ok(input.clone())
		}
		Operator::Project {
			input,
			expressions,
		} => {
			let input = &schemas[*input as usize];
			if expressions.is_empty() {
				return Err("project has no expressions".to_string());
			}
			expressions
				.iter()
				.map(|expr| {
					check_depth(expr)?;
					infer_type(expr, input)
				})
				.collect()
		}
		Operator::Join {
			left,
			right,
			left_key,
			right_key,
		} => {
			if left == right {
				return Err("join inputs must be distinct nodes".to_string());
			}
			let left = &schemas[*left as usize];
			let right = &schemas[*right as usize];
			let left_ty = column_type(left, *left_key, "left key")?;
			let right_ty = column_type(right, *right_key, "right key")?;
			if left_ty != right_ty {
				return Err(format!("join key types differ: {} and {}", left_ty, right_ty));
			}
			let mut schema = left.clone();
			schema.extend_from_slice(right);
			Ok(schema)
		}
		Operator::Aggregate {
			input,
			group_by,
			aggregates,
		} => {
			let input = &schemas[*input as usize];
			if group_by.is_empty() && aggregates.is_empty() {
				return Err("aggregate has neither groups nor aggregates".to_string());
			}
			let mut schema = Schema::with_capacity(group_by.len() + aggregates.len());
			for column in group_by {
				schema.push(column_type(input, *column, "group column")?);
			}
			for aggregate in aggregates {
				schema.push(aggregate_type(*aggregate, input)?);
			}
			Ok(schema)
		}
	}
}

/// Output type of `aggregate` over rows of `input`.
pub fn aggregate_type(aggregate: Aggregate, input: &[DataType]) -> Result<DataType, String> {
	match aggregate {
		Aggregate::Count => Ok(DataType::Int64),
		Aggregate::Sum(column) => {
			let ty = column_type(input, column, "sum column")?;
			if ty.is_numeric() {
				Ok(ty)
			} else {
				Err(format!("sum is not defined for {}", ty))
			}
		}
		Aggregate::Min(column) | Aggregate::Max(column) => {
			let ty = column_type(input, column, "min/max column")?;
			if matches!(ty, DataType::Bool | DataType::Text) {
				Err(format!("{} is not defined for {}", aggregate.name(), ty))
			} else {
				Ok(ty)
			}
		}
	}
}

fn column_type(schema: &[DataType], column: u32, what: &str) -> Result<DataType, String> {
	schema.get(column as usize)
		.copied()
		.ok_or_else(|| format!("{} {} out of range, input has {} columns", what, column, schema.len()))
}

fn check_depth(expr: &Expr) -> Result<(), String> {
	if expr.depth() > MAX_EXPR_DEPTH {
		Err(format!("expression nesting exceeds {}", MAX_EXPR_DEPTH))
	} else {
		Ok(())
	}
}

#[cfg(test)]
pub mod tests {
	use super::*;
	use crate::operator::ScanColumn;

	fn scan(columns: &[DataType]) -> Operator {
		Operator::Scan {
			table: "t".to_string(),
			columns: columns
				.iter()
				.enumerate()
				.map(|(index, ty)| ScanColumn {
					index: index as u32,
					ty: *ty,
				})
				.collect(),
		}
	}

	#[test]
	fn test_arithmetic_widening() {
		let input = [DataType::Int64, DataType::Float64, DataType::Date];
		let mixed = Expr::plus(Expr::column(0), Expr::column(1));
		assert_eq!(infer_type(&mixed, &input), Ok(DataType::Float64));

		let shifted = Expr::plus(Expr::column(2), Expr::int(7));
		assert_eq!(infer_type(&shifted, &input), Ok(DataType::Date));

		let span = Expr::binary(BinaryOp::Sub, Expr::column(2), Expr::date(0));
		assert_eq!(infer_type(&span, &input), Ok(DataType::Int64));

		let bad = Expr::times(Expr::column(2), Expr::int(2));
		assert!(infer_type(&bad, &input).is_err());
	}

	#[test]
	fn test_boolean_rules() {
		let input = [DataType::Int64];
		let cmp = Expr::gt(Expr::column(0), Expr::float(1.5));
		assert_eq!(infer_type(&cmp, &input), Ok(DataType::Bool));
		assert!(infer_type(&Expr::And(vec![]), &input).is_err());
		assert!(infer_type(&Expr::Not(Box::new(Expr::column(0))), &input).is_err());
		assert!(infer_type(&Expr::lt(cmp.clone(), cmp), &input).is_err());
	}

	#[test]
	fn test_text_rules() {
		let input = [DataType::Text, DataType::Int64];
		assert_eq!(infer_type(&Expr::like(Expr::column(0), "a%"), &input), Ok(DataType::Bool));
		assert!(infer_type(&Expr::like(Expr::column(1), "a%"), &input).is_err());
		assert_eq!(infer_type(&Expr::lt(Expr::column(0), Expr::text("m")), &input), Ok(DataType::Bool));
		assert!(infer_type(&Expr::equal(Expr::column(0), Expr::column(1)), &input).is_err());
		assert!(infer_type(&Expr::plus(Expr::column(0), Expr::text("x")), &input).is_err());
		assert!(aggregate_type(Aggregate::Max(0), &input).is_err());
		assert_eq!(aggregate_type(Aggregate::Count, &input), Ok(DataType::Int64));
	}

	#[test]
	fn test_case_unifies_branches() {
		let input = [DataType::Int64];
		let case = Expr::case(Expr::gt(Expr::column(0), Expr::int(0)), Expr::int(1), Expr::float(0.5));
		assert_eq!(infer_type(&case, &input), Ok(DataType::Float64));

		let bad = Expr::case(Expr::gt(Expr::column(0), Expr::int(0)), Expr::int(1), Expr::date(0));
		assert!(infer_type(&bad, &input).is_err());
	}

	#[test]
	fn test_node_consumed_twice() {
		let nodes = vec![
			scan(&[DataType::Int64]),
			scan(&[DataType::Int64]),
			Operator::Join {
				left: 0,
				right: 0,
				left_key: 0,
				right_key: 0,
			},
		];
		let err = validate(&nodes).unwrap_err();
		assert_eq!(err.node, 2);
	}

	#[test]
	fn test_dangling_node() {
		let nodes = vec![scan(&[DataType::Int64]), scan(&[DataType::Int64])];
		let err = validate(&nodes).unwrap_err();
		assert_eq!(err.node, 0);
	}

	#[test]
	fn test_forward_reference() {
		let nodes = vec![Operator::Filter {
			input: 0,
			predicate: Expr::gt(Expr::column(0), Expr::int(1)),
		}];
		assert_eq!(validate(&nodes).unwrap_err().node, 0);
	}

	#[test]
	fn test_aggregate_schema() {
		let nodes = vec![
			scan(&[DataType::Date, DataType::Float64, DataType::Int64]),
			Operator::Aggregate {
				input: 0,
				group_by: vec![0],
				aggregates: vec![Aggregate::Sum(1), Aggregate::Count, Aggregate::Max(2)],
			},
		];
		let schemas = validate(&nodes).unwrap();
		assert_eq!(schemas[1], vec![DataType::Date, DataType::Float64, DataType::Int64, DataType::Int64]);
	}

	#[test]
	fn test_sum_over_date() {
		let nodes = vec![
			scan(&[DataType::Date]),
			Operator::Aggregate {
				input: 0,
				group_by: vec![],
				aggregates: vec![Aggregate::Sum(0)],
			},
		];
		assert_eq!(validate(&nodes).unwrap_err().node, 1);
	}

	#[test]
	fn test_table_names() {
		assert!(is_valid_table_name("line_item2"));
		assert!(!is_valid_table_name("../etc"));
		assert!(!is_valid_table_name(""));
	}
}
