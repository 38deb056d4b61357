// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (c) 2025 ReifyDB

use kiln_plan::{BinaryOp, DataType, Expr, unify};

use crate::{
	error::{GenerateError, Result},
	writer::c_string,
};

/// A C expression together with the plan type it evaluates to.
#[derive(Debug, Clone, PartialEq)]
pub(crate) struct Value {
	pub code: String,
	pub ty: DataType,
}

impl Value {
	pub(crate) fn new(code: impl Into<String>, ty: DataType) -> Self {
		Self {
			code: code.into(),
			ty,
		}
	}
}

pub(crate) fn c_type(ty: DataType) -> &'static str {
	match ty {
		DataType::Int64 => "int64_t",
		DataType::Float64 => "double",
		DataType::Date => "int32_t",
		DataType::Text => "const char *",
		DataType::Bool => "int",
	}
}

/// Smallest value of `ty`, the starting point of a max accumulator.
pub(crate) fn c_lowest(ty: DataType) -> &'static str {
	match ty {
		DataType::Int64 => "INT64_MIN",
		DataType::Float64 => "(-HUGE_VAL)",
		DataType::Date => "INT32_MIN",
		DataType::Text => "NULL",
		DataType::Bool => "0",
	}
}

/// Largest value of `ty`, the starting point of a min accumulator.
pub(crate) fn c_highest(ty: DataType) -> &'static str {
	match ty {
		DataType::Int64 => "INT64_MAX",
		DataType::Float64 => "HUGE_VAL",
		DataType::Date => "INT32_MAX",
		DataType::Text => "NULL",
		DataType::Bool => "1",
	}
}

/// Hash of a value as `uint64_t`.
pub(crate) fn c_hash(value: &Value) -> String {
	match value.ty {
		DataType::Float64 => format!("kiln_hash_f64({})", value.code),
		DataType::Text => format!("kiln_hash_text({})", value.code),
		_ => format!("kiln_hash_i64((int64_t){})", value.code),
	}
}

/// Equality of two values of type `ty`, as used by join and group keys.
pub(crate) fn c_equal(lhs: &str, rhs: &str, ty: DataType) -> String {
	match ty {
		DataType::Text => format!("(strcmp({}, {}) == 0)", lhs, rhs),
		_ => format!("({} == {})", lhs, rhs),
	}
}

/// Lowers scalar expressions against the C expressions of the input columns.
pub(crate) struct ExprEmitter {
	/// Guard integer division against zero divisors.
	pub checked_division: bool,
}

impl ExprEmitter {
	pub(crate) fn emit(&self, expr: &Expr, input: &[Value]) -> Result<Value> {
		match expr {
			Expr::Column(index) => input.get(*index as usize).cloned().ok_or_else(|| {
				GenerateError::Lowering(format!("column ${} out of range for {} inputs", index, input.len()))
			}),
			Expr::Int(value) => Ok(Value::new(int_literal(*value), DataType::Int64)),
			Expr::Float(value) => Ok(Value::new(float_literal(*value), DataType::Float64)),
			Expr::Date(days) => Ok(Value::new(format!("((int32_t){})", days), DataType::Date)),
			Expr::Text(value) => Ok(Value::new(c_string(value), DataType::Text)),
			Expr::Binary {
				op,
				lhs,
				rhs,
			} => {
				let lhs = self.emit(lhs, input)?;
				let rhs = self.emit(rhs, input)?;
				self.binary(*op, lhs, rhs)
			}
			Expr::And(operands) => self.logical("&&", operands, input),
			Expr::Or(operands) => self.logical("||", operands, input),
			Expr::Not(operand) => {
				let operand = self.emit(operand, input)?;
				Ok(Value::new(format!("(!{})", operand.code), DataType::Bool))
			}
			Expr::Case {
				condition,
				then,
				otherwise,
			} => {
				let condition = self.emit(condition, input)?;
				let then = self.emit(then, input)?;
				let otherwise = self.emit(otherwise, input)?;
				let ty = unify(then.ty, otherwise.ty).ok_or_else(|| {
					GenerateError::Lowering(format!("case branches {} and {} differ", then.ty, otherwise.ty))
				})?;
				Ok(Value::new(
					format!("({} ? {} : {})", condition.code, widen(&then, ty), widen(&otherwise, ty)),
					ty,
				))
			}
			Expr::Like {
				value,
				pattern,
			} => {
				let value = self.emit(value, input)?;
				Ok(Value::new(format!("kiln_like({}, {})", value.code, c_string(pattern)), DataType::Bool))
			}
		}
	}

	fn logical(&self, op: &str, operands: &[Expr], input: &[Value]) -> Result<Value> {
		let parts = operands
			.iter()
			.map(|operand| self.emit(operand, input).map(|value| value.code))
			.collect::<Result<Vec<_>>>()?;
		Ok(Value::new(format!("({})", parts.join(&format!(" {} ", op))), DataType::Bool))
	}

	fn binary(&self, op: BinaryOp, lhs: Value, rhs: Value) -> Result<Value> {
		use DataType::*;

		let symbol = match op {
			BinaryOp::Eq => "==",
			other => other.symbol(),
		};

		if op.is_comparison() {
			let code = if lhs.ty == Text && rhs.ty == Text {
				format!("(strcmp({}, {}) {} 0)", lhs.code, rhs.code, symbol)
			} else if lhs.ty != rhs.ty && lhs.ty.is_numeric() && rhs.ty.is_numeric() {
				format!("({} {} {})", widen(&lhs, Float64), symbol, widen(&rhs, Float64))
			} else {
				format!("({} {} {})", lhs.code, symbol, rhs.code)
			};
			return Ok(Value::new(code, Bool));
		}

		let value = match (lhs.ty, rhs.ty) {
			(Int64, Int64) if op == BinaryOp::Div && self.checked_division => {
				Value::new(format!("kiln_idiv({}, {})", lhs.code, rhs.code), Int64)
			}
			(Int64, Int64) if op == BinaryOp::Div => {
				Value::new(format!("({} / {})", lhs.code, rhs.code), Int64)
			}
			// two's complement wrap-around instead of signed overflow
			(Int64, Int64) => Value::new(
				format!("((int64_t)((uint64_t){} {} (uint64_t){}))", lhs.code, symbol, rhs.code),
				Int64,
			),
			(l, r) if l.is_numeric() && r.is_numeric() => Value::new(
				format!("({} {} {})", widen(&lhs, Float64), symbol, widen(&rhs, Float64)),
				Float64,
			),
			(Date, Date) if op == BinaryOp::Sub => {
				Value::new(format!("((int64_t){} - (int64_t){})", lhs.code, rhs.code), Int64)
			}
			(Date, Int64) | (Int64, Date) if matches!(op, BinaryOp::Add | BinaryOp::Sub) => {
				Value::new(format!("((int32_t)({} {} {}))", lhs.code, symbol, rhs.code), Date)
			}
			(l, r) => {
				return Err(GenerateError::Lowering(format!(
					"operator {} is not defined for {} and {}",
					op.symbol(),
					l,
					r
				)));
			}
		};
		Ok(value)
	}
}

fn widen(value: &Value, ty: DataType) -> String {
	if value.ty == ty {
		value.code.clone()
	} else {
		format!("(({}){})", c_type(ty), value.code)
	}
}

fn int_literal(value: i64) -> String {
	if value == i64::MIN {
		"INT64_MIN".to_string()
	} else {
		format!("INT64_C({})", value)
	}
}

fn float_literal(value: f64) -> String {
	if value.is_nan() {
		"NAN".to_string()
	} else if value.is_infinite() {
		if value > 0.0 {
			"HUGE_VAL".to_string()
		} else {
			"(-HUGE_VAL)".to_string()
		}
	} else {
		format!("({:?})", value)
	}
}

#[cfg(test)]
pub mod tests {
	use super::*;

	fn inputs() -> Vec<Value> {
		vec![
			Value::new("a[i]", DataType::Int64),
			Value::new("b[i]", DataType::Float64),
			Value::new("c[i]", DataType::Date),
		]
	}

	fn emit(expr: &Expr) -> Value {
		ExprEmitter {
			checked_division: true,
		}
		.emit(expr, &inputs())
		.unwrap()
	}

	#[test]
	fn test_widening() {
		let value = emit(&Expr::plus(Expr::column(0), Expr::column(1)));
		assert_eq!(value.code, "(((double)a[i]) + b[i])");
		assert_eq!(value.ty, DataType::Float64);
	}

	#[test]
	fn test_comparison() {
		let value = emit(&Expr::equal(Expr::column(0), Expr::int(-3)));
		assert_eq!(value.code, "(a[i] == INT64_C(-3))");
		assert_eq!(value.ty, DataType::Bool);
	}

	#[test]
	fn test_date_arithmetic() {
		let shifted = emit(&Expr::plus(Expr::column(2), Expr::int(1)));
		assert_eq!(shifted.code, "((int32_t)(c[i] + INT64_C(1)))");
		assert_eq!(shifted.ty, DataType::Date);

		let span = emit(&Expr::binary(BinaryOp::Sub, Expr::column(2), Expr::date(5)));
		assert_eq!(span.code, "((int64_t)c[i] - (int64_t)((int32_t)5))");
	}

	#[test]
	fn test_integer_arithmetic_wraps() {
		let value = emit(&Expr::times(Expr::column(0), Expr::int(3)));
		assert_eq!(value.code, "((int64_t)((uint64_t)a[i] * (uint64_t)INT64_C(3)))");
		assert_eq!(value.ty, DataType::Int64);
	}

	#[test]
	fn test_text() {
		let inputs = vec![Value::new("t[i]", DataType::Text)];
		let emitter = ExprEmitter {
			checked_division: true,
		};
		let like = emitter.emit(&Expr::like(Expr::column(0), "%Park"), &inputs).unwrap();
		assert_eq!(like.code, "kiln_like(t[i], \"%Park\")");
		assert_eq!(like.ty, DataType::Bool);

		let cmp = emitter.emit(&Expr::lt(Expr::column(0), Expr::text("m")), &inputs).unwrap();
		assert_eq!(cmp.code, "(strcmp(t[i], \"m\") < 0)");
		assert_eq!(c_equal("a", "b", DataType::Text), "(strcmp(a, b) == 0)");
		assert_eq!(c_hash(&inputs[0]), "kiln_hash_text(t[i])");
	}

	#[test]
	fn test_division() {
		let checked = emit(&Expr::binary(BinaryOp::Div, Expr::column(0), Expr::int(2)));
		assert_eq!(checked.code, "kiln_idiv(a[i], INT64_C(2))");

		let unchecked = ExprEmitter {
			checked_division: false,
		}
		.emit(&Expr::binary(BinaryOp::Div, Expr::column(0), Expr::int(2)), &inputs())
		.unwrap();
		assert_eq!(unchecked.code, "(a[i] / INT64_C(2))");
	}

	#[test]
	fn test_case_and_logic() {
		let value = emit(&Expr::case(
			Expr::And(vec![Expr::gt(Expr::column(0), Expr::int(1)), Expr::Not(Box::new(Expr::lt(Expr::column(1), Expr::float(0.5))))]),
			Expr::int(1),
			Expr::column(1),
		));
		assert_eq!(
			value.code,
			"(((a[i] > INT64_C(1)) && (!(b[i] < (0.5)))) ? ((double)INT64_C(1)) : b[i])"
		);
		assert_eq!(value.ty, DataType::Float64);
	}

	#[test]
	fn test_float_literals() {
		assert_eq!(float_literal(3.0), "(3.0)");
		assert_eq!(float_literal(-0.25), "(-0.25)");
		assert_eq!(float_literal(f64::INFINITY), "HUGE_VAL");
		assert_eq!(int_literal(i64::MIN), "INT64_MIN");
	}
}
