// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (c) 2025 ReifyDB

use super::{
	EXPR_AND, EXPR_BINARY, EXPR_CASE, EXPR_COLUMN, EXPR_DATE, EXPR_FLOAT, EXPR_INT, EXPR_LIKE, EXPR_NOT, EXPR_OR,
	EXPR_TEXT,
};
use crate::{
	error::DecodeError,
	expr::{BinaryOp, Expr},
	operator::{Aggregate, Operator, ScanColumn},
	types::DataType,
	validate::MAX_EXPR_DEPTH,
};

type Result<T> = std::result::Result<T, DecodeError>;

/// Cursor over a plan buffer. Reads never go past `limit`, which is narrowed
/// to the end of the current node body while a node is decoded.
pub(crate) struct PlanReader<'a> {
	bytes: &'a [u8],
	offset: usize,
	limit: usize,
}

impl<'a> PlanReader<'a> {
	pub(crate) fn new(bytes: &'a [u8]) -> Self {
		Self {
			bytes,
			offset: 0,
			limit: bytes.len(),
		}
	}

	pub(crate) fn offset(&self) -> usize {
		self.offset
	}

	pub(crate) fn remaining(&self) -> usize {
		self.limit - self.offset
	}

	fn take(&mut self, n: usize, what: &str) -> Result<&'a [u8]> {
		if self.remaining() < n {
			let reason = if self.limit < self.bytes.len() {
				format!("{} runs past the end of the node body", what)
			} else {
				format!("buffer truncated while reading {}", what)
			};
			return Err(DecodeError::new(self.offset, reason));
		}
		let slice = &self.bytes[self.offset..self.offset + n];
		self.offset += n;
		Ok(slice)
	}

	fn array<const N: usize>(&mut self, what: &str) -> Result<[u8; N]> {
		let mut out = [0u8; N];
		out.copy_from_slice(self.take(N, what)?);
		Ok(out)
	}

	pub(crate) fn u8(&mut self, what: &str) -> Result<u8> {
		Ok(self.take(1, what)?[0])
	}

	pub(crate) fn u16(&mut self, what: &str) -> Result<u16> {
		Ok(u16::from_le_bytes(self.array(what)?))
	}

	pub(crate) fn u32(&mut self, what: &str) -> Result<u32> {
		Ok(u32::from_le_bytes(self.array(what)?))
	}

	/// Reads a length prefix and rejects counts that cannot fit in the remaining bytes.
	fn count(&mut self, what: &str, min_item_size: usize) -> Result<usize> {
		let at = self.offset;
		let count = self.u32(what)? as usize;
		if count.saturating_mul(min_item_size) > self.remaining() {
			return Err(DecodeError::new(at, format!("{} {} exceeds the remaining bytes", what, count)));
		}
		Ok(count)
	}

	pub(crate) fn bytes(&mut self, n: usize, what: &str) -> Result<&'a [u8]> {
		self.take(n, what)
	}

	pub(crate) fn str(&mut self, what: &str) -> Result<String> {
		let len = self.count(what, 1)?;
		let at = self.offset;
		let bytes = self.take(len, what)?;
		std::str::from_utf8(bytes)
			.map(str::to_string)
			.map_err(|_| DecodeError::new(at, format!("{} is not valid utf-8", what)))
	}

	/// Reads one node: tag, body length and a body that must be consumed exactly.
	pub(crate) fn node(&mut self) -> Result<Operator> {
		let tag_at = self.offset;
		let tag = self.u8("node tag")?;
		let length_at = self.offset;
		let length = self.u32("node length")? as usize;
		if length > self.remaining() {
			return Err(DecodeError::new(
				length_at,
				format!("node length {} exceeds the {} remaining bytes", length, self.remaining()),
			));
		}

		let outer = self.limit;
		self.limit = self.offset + length;

		let node = match tag {
			Operator::SCAN => self.scan()?,
			Operator::FILTER => Operator::Filter {
				input: self.u32("filter input")?,
				predicate: self.expr(1)?,
			},
			Operator::PROJECT => {
				let input = self.u32("project input")?;
				let n = self.count("expression count", 1)?;
				let mut expressions = Vec::with_capacity(n);
				for _ in 0..n {
					expressions.push(self.expr(1)?);
				}
				Operator::Project {
					input,
					expressions,
				}
			}
			Operator::JOIN => Operator::Join {
				left: self.u32("join left input")?,
				right: self.u32("join right input")?,
				left_key: self.u32("join left key")?,
				right_key: self.u32("join right key")?,
			},
			Operator::AGGREGATE => self.aggregate()?,
			other => {
				return Err(DecodeError::new(tag_at, format!("unknown operator tag 0x{:02x}", other)));
			}
		};

		if self.remaining() != 0 {
			return Err(DecodeError::new(
				self.offset,
				format!("{} unread bytes at the end of the {} node", self.remaining(), node.name()),
			));
		}
		self.limit = outer;
		Ok(node)
	}

	fn scan(&mut self) -> Result<Operator> {
		let table = self.str("table name")?;
		let n = self.count("column count", 5)?;
		let mut columns = Vec::with_capacity(n);
		for _ in 0..n {
			let index = self.u32("column index")?;
			let at = self.offset;
			let tag = self.u8("column type")?;
			let ty = DataType::from_tag(tag)
				.ok_or_else(|| DecodeError::new(at, format!("unknown column type {}", tag)))?;
			columns.push(ScanColumn {
				index,
				ty,
			});
		}
		Ok(Operator::Scan {
			table,
			columns,
		})
	}

	fn aggregate(&mut self) -> Result<Operator> {
		let input = self.u32("aggregate input")?;
		let g = self.count("group column count", 4)?;
		let mut group_by = Vec::with_capacity(g);
		for _ in 0..g {
			group_by.push(self.u32("group column")?);
		}
		let a = self.count("aggregate count", 1)?;
		let mut aggregates = Vec::with_capacity(a);
		for _ in 0..a {
			let at = self.offset;
			let aggregate = match self.u8("aggregate kind")? {
				0 => Aggregate::Sum(self.u32("sum column")?),
				1 => Aggregate::Count,
				2 => Aggregate::Min(self.u32("min column")?),
				3 => Aggregate::Max(self.u32("max column")?),
				other => return Err(DecodeError::new(at, format!("unknown aggregate kind {}", other))),
			};
			aggregates.push(aggregate);
		}
		Ok(Operator::Aggregate {
			input,
			group_by,
			aggregates,
		})
	}

	fn expr(&mut self, depth: usize) -> Result<Expr> {
		let at = self.offset;
		if depth > MAX_EXPR_DEPTH {
			return Err(DecodeError::new(at, format!("expression nesting exceeds {}", MAX_EXPR_DEPTH)));
		}

		let tag = self.u8("expression tag")?;
		let expr = match tag {
			EXPR_COLUMN => Expr::Column(self.u32("column reference")?),
			EXPR_INT => Expr::Int(i64::from_le_bytes(self.array("integer literal")?)),
			EXPR_FLOAT => Expr::Float(f64::from_bits(u64::from_le_bytes(self.array("float literal")?))),
			EXPR_DATE => Expr::Date(i32::from_le_bytes(self.array("date literal")?)),
			EXPR_TEXT => Expr::Text(self.str("text literal")?),
			EXPR_BINARY => {
				let op_at = self.offset;
				let tag = self.u8("binary operator")?;
				let op = BinaryOp::from_tag(tag)
					.ok_or_else(|| DecodeError::new(op_at, format!("unknown binary operator {}", tag)))?;
				let lhs = self.expr(depth + 1)?;
				let rhs = self.expr(depth + 1)?;
				Expr::binary(op, lhs, rhs)
			}
			EXPR_AND | EXPR_OR => {
				let count_at = self.offset;
				let n = self.count("operand count", 1)?;
				if n == 0 {
					return Err(DecodeError::new(count_at, "empty boolean operand list"));
				}
				let mut operands = Vec::with_capacity(n);
				for _ in 0..n {
					operands.push(self.expr(depth + 1)?);
				}
				if tag == EXPR_AND {
					Expr::And(operands)
				} else {
					Expr::Or(operands)
				}
			}
			EXPR_NOT => Expr::Not(Box::new(self.expr(depth + 1)?)),
			EXPR_CASE => {
				let condition = self.expr(depth + 1)?;
				let then = self.expr(depth + 1)?;
				let otherwise = self.expr(depth + 1)?;
				Expr::case(condition, then, otherwise)
			}
			EXPR_LIKE => {
				let value = self.expr(depth + 1)?;
				let pattern = self.str("like pattern")?;
				Expr::like(value, pattern)
			}
			other => return Err(DecodeError::new(at, format!("unknown expression tag 0x{:02x}", other))),
		};
		Ok(expr)
	}
}
