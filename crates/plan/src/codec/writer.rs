// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (c) 2025 ReifyDB

use super::{
	EXPR_AND, EXPR_BINARY, EXPR_CASE, EXPR_COLUMN, EXPR_DATE, EXPR_FLOAT, EXPR_INT, EXPR_LIKE, EXPR_NOT, EXPR_OR,
	EXPR_TEXT,
};
use crate::{expr::Expr, operator::Operator};

pub(crate) struct PlanWriter {
	buf: Vec<u8>,
}

impl PlanWriter {
	pub(crate) fn new() -> Self {
		Self {
			buf: Vec::new(),
		}
	}

	pub(crate) fn finish(self) -> Vec<u8> {
		self.buf
	}

	pub(crate) fn u8(&mut self, value: u8) {
		self.buf.push(value);
	}

	pub(crate) fn u16(&mut self, value: u16) {
		self.buf.extend_from_slice(&value.to_le_bytes());
	}

	pub(crate) fn u32(&mut self, value: u32) {
		self.buf.extend_from_slice(&value.to_le_bytes());
	}

	fn len(&mut self, len: usize) {
		self.u32(len as u32);
	}

	pub(crate) fn str(&mut self, value: &str) {
		self.len(value.len());
		self.buf.extend_from_slice(value.as_bytes());
	}

	pub(crate) fn bytes(&mut self, value: &[u8]) {
		self.buf.extend_from_slice(value);
	}

	/// Writes a node as tag, body length and body.
	pub(crate) fn node(&mut self, node: &Operator) {
		self.u8(node.tag());
		let length_at = self.buf.len();
		self.u32(0);
		let body_start = self.buf.len();

		match node {
			Operator::Scan {
				table,
				columns,
			} => {
				self.str(table);
				self.len(columns.len());
				for column in columns {
					self.u32(column.index);
					// validated plans never scan bool columns
					self.u8(column.ty.tag().unwrap_or(u8::MAX));
				}
			}
			Operator::Filter {
				input,
				predicate,
			} => {
				self.u32(*input);
				self.expr(predicate);
			}
			Operator::Project {
				input,
				expressions,
			} => {
				self.u32(*input);
				self.len(expressions.len());
				for expr in expressions {
					self.expr(expr);
				}
			}
			Operator::Join {
				left,
				right,
				left_key,
				right_key,
			} => {
				self.u32(*left);
				self.u32(*right);
				self.u32(*left_key);
				self.u32(*right_key);
			}
			Operator::Aggregate {
				input,
				group_by,
				aggregates,
			} => {
				self.u32(*input);
				self.len(group_by.len());
				for column in group_by {
					self.u32(*column);
				}
				self.len(aggregates.len());
				for aggregate in aggregates {
					self.u8(aggregate.tag());
					if let Some(column) = aggregate.column() {
						self.u32(column);
					}
				}
			}
		}

		let body_len = (self.buf.len() - body_start) as u32;
		self.buf[length_at..body_start].copy_from_slice(&body_len.to_le_bytes());
	}

	pub(crate) fn expr(&mut self, expr: &Expr) {
		match expr {
			Expr::Column(index) => {
				self.u8(EXPR_COLUMN);
				self.u32(*index);
			}
			Expr::Int(value) => {
				self.u8(EXPR_INT);
				self.bytes(&value.to_le_bytes());
			}
			Expr::Float(value) => {
				self.u8(EXPR_FLOAT);
				self.bytes(&value.to_bits().to_le_bytes());
			}
			Expr::Date(days) => {
				self.u8(EXPR_DATE);
				self.bytes(&days.to_le_bytes());
			}
			Expr::Text(value) => {
				self.u8(EXPR_TEXT);
				self.str(value);
			}
			Expr::Binary {
				op,
				lhs,
				rhs,
			} => {
				self.u8(EXPR_BINARY);
				self.u8(op.tag());
				self.expr(lhs);
				self.expr(rhs);
			}
			Expr::And(operands) | Expr::Or(operands) => {
				self.u8(if matches!(expr, Expr::And(_)) {
					EXPR_AND
				} else {
					EXPR_OR
				});
				self.len(operands.len());
				for operand in operands {
					self.expr(operand);
				}
			}
			Expr::Not(operand) => {
				self.u8(EXPR_NOT);
				self.expr(operand);
			}
			Expr::Case {
				condition,
				then,
				otherwise,
			} => {
				self.u8(EXPR_CASE);
				self.expr(condition);
				self.expr(then);
				self.expr(otherwise);
			}
			Expr::Like {
				value,
				pattern,
			} => {
				self.u8(EXPR_LIKE);
				self.expr(value);
				self.str(pattern);
			}
		}
	}
}
