// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (c) 2025 ReifyDB

use std::fmt::{self, Display, Formatter};

use crate::types::format_date;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BinaryOp {
	Eq,
	Ne,
	Lt,
	Le,
	Gt,
	Ge,
	Add,
	Sub,
	Mul,
	Div,
}

impl BinaryOp {
	pub const ALL: [BinaryOp; 10] = [
		BinaryOp::Eq,
		BinaryOp::Ne,
		BinaryOp::Lt,
		BinaryOp::Le,
		BinaryOp::Gt,
		BinaryOp::Ge,
		BinaryOp::Add,
		BinaryOp::Sub,
		BinaryOp::Mul,
		BinaryOp::Div,
	];

	pub fn tag(self) -> u8 {
		match self {
			BinaryOp::Eq => 0,
			BinaryOp::Ne => 1,
			BinaryOp::Lt => 2,
			BinaryOp::Le => 3,
			BinaryOp::Gt => 4,
			BinaryOp::Ge => 5,
			BinaryOp::Add => 6,
			BinaryOp::Sub => 7,
			BinaryOp::Mul => 8,
			BinaryOp::Div => 9,
		}
	}

	pub fn from_tag(tag: u8) -> Option<Self> {
		Self::ALL.get(tag as usize).copied()
	}

	/// Operator symbol, shared by the text plan format and the C emitter.
	pub fn symbol(self) -> &'static str {
		match self {
			BinaryOp::Eq => "=",
			BinaryOp::Ne => "!=",
			BinaryOp::Lt => "<",
			BinaryOp::Le => "<=",
			BinaryOp::Gt => ">",
			BinaryOp::Ge => ">=",
			BinaryOp::Add => "+",
			BinaryOp::Sub => "-",
			BinaryOp::Mul => "*",
			BinaryOp::Div => "/",
		}
	}

	pub fn from_symbol(symbol: &str) -> Option<Self> {
		Self::ALL.iter().copied().find(|op| op.symbol() == symbol)
	}

	pub fn is_comparison(self) -> bool {
		matches!(
			self,
			BinaryOp::Eq | BinaryOp::Ne | BinaryOp::Lt | BinaryOp::Le | BinaryOp::Gt | BinaryOp::Ge
		)
	}
}

/// Scalar expression evaluated against the columns of an operator's input.
#[derive(Debug, Clone, PartialEq)]
pub enum Expr {
	/// Reference to an input column by position.
	Column(u32),
	Int(i64),
	Float(f64),
	/// Days since 1970-01-01.
	Date(i32),
	Text(String),
	Binary {
		op: BinaryOp,
		lhs: Box<Expr>,
		rhs: Box<Expr>,
	},
	And(Vec<Expr>),
	Or(Vec<Expr>),
	Not(Box<Expr>),
	Case {
		condition: Box<Expr>,
		then: Box<Expr>,
		otherwise: Box<Expr>,
	},
	/// SQL `LIKE` against a constant pattern: `%` matches any run of bytes,
	/// `_` exactly one byte.
	Like {
		value: Box<Expr>,
		pattern: String,
	},
}

impl Expr {
	pub fn column(index: u32) -> Self {
		Expr::Column(index)
	}

	pub fn int(value: i64) -> Self {
		Expr::Int(value)
	}

	pub fn float(value: f64) -> Self {
		Expr::Float(value)
	}

	pub fn date(days: i32) -> Self {
		Expr::Date(days)
	}

	pub fn text(value: impl Into<String>) -> Self {
		Expr::Text(value.into())
	}

	pub fn like(value: Expr, pattern: impl Into<String>) -> Self {
		Expr::Like {
			value: Box::new(value),
			pattern: pattern.into(),
		}
	}

	pub fn binary(op: BinaryOp, lhs: Expr, rhs: Expr) -> Self {
		Expr::Binary {
			op,
			lhs: Box::new(lhs),
			rhs: Box::new(rhs),
		}
	}

	pub fn equal(lhs: Expr, rhs: Expr) -> Self {
		Self::binary(BinaryOp::Eq, lhs, rhs)
	}

	pub fn lt(lhs: Expr, rhs: Expr) -> Self {
		Self::binary(BinaryOp::Lt, lhs, rhs)
	}

	pub fn gt(lhs: Expr, rhs: Expr) -> Self {
		Self::binary(BinaryOp::Gt, lhs, rhs)
	}

	pub fn ge(lhs: Expr, rhs: Expr) -> Self {
		Self::binary(BinaryOp::Ge, lhs, rhs)
	}

	pub fn plus(lhs: Expr, rhs: Expr) -> Self {
		Self::binary(BinaryOp::Add, lhs, rhs)
	}

	pub fn times(lhs: Expr, rhs: Expr) -> Self {
		Self::binary(BinaryOp::Mul, lhs, rhs)
	}

	pub fn case(condition: Expr, then: Expr, otherwise: Expr) -> Self {
		Expr::Case {
			condition: Box::new(condition),
			then: Box::new(then),
			otherwise: Box::new(otherwise),
		}
	}

	/// Nesting depth, a leaf counts as one.
	pub fn depth(&self) -> usize {
		match self {
			Expr::Column(_) | Expr::Int(_) | Expr::Float(_) | Expr::Date(_) | Expr::Text(_) => 1,
			Expr::Binary {
				lhs,
				rhs,
				..
			} => 1 + lhs.depth().max(rhs.depth()),
			Expr::And(operands) | Expr::Or(operands) => {
				1 + operands.iter().map(Expr::depth).max().unwrap_or(0)
			}
			Expr::Not(operand) => 1 + operand.depth(),
			Expr::Case {
				condition,
				then,
				otherwise,
			} => 1 + condition.depth().max(then.depth()).max(otherwise.depth()),
			Expr::Like {
				value,
				..
			} => 1 + value.depth(),
		}
	}
}

/// Prints the s-expression form used by the text plan format.
impl Display for Expr {
	fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
		match self {
			Expr::Column(index) => write!(f, "${}", index),
			Expr::Int(value) => write!(f, "{}", value),
			Expr::Float(value) => {
				if value.is_finite() && value.fract() == 0.0 {
					write!(f, "{:.1}", value)
				} else {
					write!(f, "{}", value)
				}
			}
			Expr::Date(days) => write!(f, "date'{}'", format_date(*days)),
			Expr::Text(value) => write_quoted(f, value),
			Expr::Binary {
				op,
				lhs,
				rhs,
			} => write!(f, "({} {} {})", op.symbol(), lhs, rhs),
			Expr::And(operands) => write_list(f, "and", operands),
			Expr::Or(operands) => write_list(f, "or", operands),
			Expr::Not(operand) => write!(f, "(not {})", operand),
			Expr::Case {
				condition,
				then,
				otherwise,
			} => write!(f, "(case {} {} {})", condition, then, otherwise),
			Expr::Like {
				value,
				pattern,
			} => {
				write!(f, "(like {} ", value)?;
				write_quoted(f, pattern)?;
				f.write_str(")")
			}
		}
	}
}

/// Single quoted, an embedded quote is doubled.
fn write_quoted(f: &mut Formatter<'_>, text: &str) -> fmt::Result {
	write!(f, "'{}'", text.replace('\'', "''"))
}

fn write_list(f: &mut Formatter<'_>, name: &str, operands: &[Expr]) -> fmt::Result {
	write!(f, "({}", name)?;
	for operand in operands {
		write!(f, " {}", operand)?;
	}
	f.write_str(")")
}

#[cfg(test)]
pub mod tests {
	use super::*;

	#[test]
	fn test_op_tags() {
		for op in BinaryOp::ALL {
			assert_eq!(BinaryOp::from_tag(op.tag()), Some(op));
			assert_eq!(BinaryOp::from_symbol(op.symbol()), Some(op));
		}
		assert_eq!(BinaryOp::from_tag(10), None);
	}

	#[test]
	fn test_display() {
		let expr = Expr::And(vec![
			Expr::gt(Expr::column(0), Expr::int(10)),
			Expr::Not(Box::new(Expr::equal(Expr::column(1), Expr::float(2.5)))),
		]);
		assert_eq!(expr.to_string(), "(and (> $0 10) (not (= $1 2.5)))");
		assert_eq!(Expr::float(3.0).to_string(), "3.0");
		assert_eq!(Expr::date(10_471).to_string(), "date'1998-09-02'");
		assert_eq!(Expr::like(Expr::column(2), "%o'k%").to_string(), "(like $2 '%o''k%')");
		assert_eq!(Expr::equal(Expr::column(0), Expr::text("a b")).to_string(), "(= $0 'a b')");
	}

	#[test]
	fn test_depth() {
		assert_eq!(Expr::column(0).depth(), 1);
		let nested = Expr::case(Expr::gt(Expr::column(0), Expr::int(1)), Expr::int(1), Expr::int(0));
		assert_eq!(nested.depth(), 3);
		assert_eq!(Expr::like(Expr::column(0), "%x").depth(), 2);
	}
}
