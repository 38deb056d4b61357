// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (c) 2025 ReifyDB

//! Line-oriented text plan format.
//!
//! ```text
//! # comment
//! database data/tpch
//! scan lineitem 4:float 5:float 10:date
//! filter 0 (<= $2 date'1998-09-02')
//! aggregate 1 group [] sum $0 count
//! ```
//!
//! Node ids are implicit, the n-th node line declares node n. Expressions use
//! s-expression syntax: `$N`, numbers, `date'YYYY-MM-DD'`, `'text'` (a quote
//! inside text is doubled), `(op lhs rhs)`, `(and ...)`, `(or ...)`,
//! `(not e)`, `(case c t e)` and `(like e 'pattern')`.

mod explain;

use crate::{
	error::TextError,
	expr::{BinaryOp, Expr},
	operator::{Aggregate, NodeId, Operator, ScanColumn},
	plan::Plan,
	types::{DataType, parse_date},
	validate::MAX_EXPR_DEPTH,
};

type Result<T> = std::result::Result<T, String>;

const DEFAULT_DATABASE: &str = ".";

pub(crate) fn parse(source: &str) -> std::result::Result<Plan, TextError> {
	let mut database: Option<String> = None;
	let mut nodes = Vec::new();
	let mut node_lines = Vec::new();
	let mut last_line = 0;

	for (index, raw) in source.lines().enumerate() {
		let line = index + 1;
		last_line = line;
		let text = raw.trim();
		if text.is_empty() || text.starts_with('#') {
			continue;
		}

		if let Some(path) = text.strip_prefix("database") {
			if path.is_empty() || path.starts_with(char::is_whitespace) {
				let path = path.trim();
				if path.is_empty() {
					return Err(TextError::new(line, "database path missing"));
				}
				if database.replace(path.to_string()).is_some() {
					return Err(TextError::new(line, "database declared twice"));
				}
				continue;
			}
		}

		let node = parse_node(text).map_err(|reason| TextError::new(line, reason))?;
		nodes.push(node);
		node_lines.push(line);
	}

	if nodes.is_empty() {
		return Err(TextError::new(last_line.max(1), "plan has no nodes"));
	}

	let database = database.unwrap_or_else(|| DEFAULT_DATABASE.to_string());
	Plan::new(database, nodes).map_err(|err| TextError::new(node_lines[err.node as usize], err.reason))
}

fn parse_node(text: &str) -> Result<Operator> {
	let mut tokens = Tokens::new(text)?;
	let keyword = tokens.atom("operator")?;

	let node = match keyword {
		"scan" => {
			let table = tokens.atom("table name")?.to_string();
			let mut columns = Vec::new();
			while !tokens.is_empty() {
				columns.push(parse_scan_column(tokens.atom("scan column")?)?);
			}
			Operator::Scan {
				table,
				columns,
			}
		}
		"filter" => Operator::Filter {
			input: tokens.node_id()?,
			predicate: tokens.expr(1)?,
		},
		"project" => {
			let input = tokens.node_id()?;
			let mut expressions = Vec::new();
			while !tokens.is_empty() {
				expressions.push(tokens.expr(1)?);
			}
			Operator::Project {
				input,
				expressions,
			}
		}
		"join" => Operator::Join {
			left: tokens.node_id()?,
			right: tokens.node_id()?,
			left_key: tokens.number("left key")?,
			right_key: tokens.number("right key")?,
		},
		"aggregate" => {
			let input = tokens.node_id()?;
			tokens.keyword("group")?;
			let group_by = tokens.list()?;
			let mut aggregates = Vec::new();
			while !tokens.is_empty() {
				aggregates.push(tokens.aggregate()?);
			}
			Operator::Aggregate {
				input,
				group_by,
				aggregates,
			}
		}
		other => return Err(format!("unknown operator '{}'", other)),
	};

	tokens.finish()?;
	Ok(node)
}

fn parse_scan_column(text: &str) -> Result<ScanColumn> {
	let (index, ty) = text.split_once(':').ok_or_else(|| format!("expected <index>:<type>, found '{}'", text))?;
	let index = index.parse().map_err(|_| format!("invalid column index '{}'", index))?;
	let ty = DataType::from_name(ty).ok_or_else(|| format!("unknown column type '{}'", ty))?;
	Ok(ScanColumn {
		index,
		ty,
	})
}

fn parse_column_ref(text: &str) -> Result<u32> {
	text.strip_prefix('$')
		.and_then(|index| index.parse().ok())
		.ok_or_else(|| format!("expected column reference $N, found '{}'", text))
}

fn parse_literal(text: &str) -> Result<Expr> {
	if text.starts_with('$') {
		return parse_column_ref(text).map(Expr::Column);
	}
	if let Some(date) = text.strip_prefix("date'").and_then(|rest| rest.strip_suffix('\'')) {
		return parse_date(date).map(Expr::Date).ok_or_else(|| format!("invalid date '{}'", date));
	}
	if let Ok(value) = text.parse::<i64>() {
		return Ok(Expr::Int(value));
	}
	text.parse::<f64>().map(Expr::Float).map_err(|_| format!("unexpected '{}'", text))
}

#[derive(Debug, Clone, Copy, PartialEq)]
enum Token<'a> {
	Open,
	Close,
	OpenBracket,
	CloseBracket,
	Comma,
	Atom(&'a str),
	/// Quoted text without its quotes, doubled quotes still escaped.
	Quoted(&'a str),
}

impl Token<'_> {
	fn describe(&self) -> String {
		match self {
			Token::Open => "'('".to_string(),
			Token::Close => "')'".to_string(),
			Token::OpenBracket => "'['".to_string(),
			Token::CloseBracket => "']'".to_string(),
			Token::Comma => "','".to_string(),
			Token::Atom(atom) => format!("'{}'", atom),
			Token::Quoted(raw) => format!("text '{}'", raw),
		}
	}
}

fn unquote(raw: &str) -> String {
	raw.replace("''", "'")
}

struct Tokens<'a> {
	tokens: Vec<Token<'a>>,
	position: usize,
}

impl<'a> Tokens<'a> {
	fn new(text: &'a str) -> Result<Self> {
		let mut tokens = Vec::new();
		let mut start: Option<usize> = None;
		let mut chars = text.char_indices().peekable();

		while let Some((at, ch)) = chars.next() {
			if ch == '\'' && start.is_none() {
				let mut end = None;
				while let Some((position, ch)) = chars.next() {
					if ch != '\'' {
						continue;
					}
					if chars.peek().map(|(_, next)| *next) == Some('\'') {
						chars.next();
						continue;
					}
					end = Some(position);
					break;
				}
				let end = end.ok_or_else(|| format!("unterminated text starting at column {}", at + 1))?;
				tokens.push(Token::Quoted(&text[at + 1..end]));
				continue;
			}
			let punct = match ch {
				'(' => Some(Token::Open),
				')' => Some(Token::Close),
				'[' => Some(Token::OpenBracket),
				']' => Some(Token::CloseBracket),
				',' => Some(Token::Comma),
				_ => None,
			};
			if punct.is_some() || ch.is_whitespace() {
				if let Some(begin) = start.take() {
					tokens.push(Token::Atom(&text[begin..at]));
				}
				tokens.extend(punct);
			} else if start.is_none() {
				start = Some(at);
			}
		}
		if let Some(begin) = start {
			tokens.push(Token::Atom(&text[begin..]));
		}

		Ok(Self {
			tokens,
			position: 0,
		})
	}

	fn is_empty(&self) -> bool {
		self.position >= self.tokens.len()
	}

	fn next(&mut self, what: &str) -> Result<Token<'a>> {
		let token = self.tokens.get(self.position).copied().ok_or_else(|| format!("expected {}", what))?;
		self.position += 1;
		Ok(token)
	}

	fn peek(&self) -> Option<Token<'a>> {
		self.tokens.get(self.position).copied()
	}

	fn atom(&mut self, what: &str) -> Result<&'a str> {
		match self.next(what)? {
			Token::Atom(atom) => Ok(atom),
			other => Err(format!("expected {}, found {}", what, other.describe())),
		}
	}

	fn expect(&mut self, expected: Token<'a>) -> Result<()> {
		let token = self.next(&expected.describe())?;
		if token == expected {
			Ok(())
		} else {
			Err(format!("expected {}, found {}", expected.describe(), token.describe()))
		}
	}

	fn keyword(&mut self, keyword: &str) -> Result<()> {
		let atom = self.atom(keyword)?;
		if atom == keyword {
			Ok(())
		} else {
			Err(format!("expected '{}', found '{}'", keyword, atom))
		}
	}

	fn number(&mut self, what: &str) -> Result<u32> {
		let atom = self.atom(what)?;
		atom.parse().map_err(|_| format!("invalid {} '{}'", what, atom))
	}

	fn node_id(&mut self) -> Result<NodeId> {
		self.number("input node")
	}

	fn list(&mut self) -> Result<Vec<u32>> {
		self.expect(Token::OpenBracket)?;
		let mut values = Vec::new();
		if self.peek() == Some(Token::CloseBracket) {
			self.position += 1;
			return Ok(values);
		}
		loop {
			values.push(self.number("group column")?);
			match self.next("',' or ']'")? {
				Token::Comma => continue,
				Token::CloseBracket => return Ok(values),
				other => return Err(format!("expected ',' or ']', found {}", other.describe())),
			}
		}
	}

	fn aggregate(&mut self) -> Result<Aggregate> {
		let name = self.atom("aggregate")?;
		match name {
			"count" => Ok(Aggregate::Count),
			"sum" => Ok(Aggregate::Sum(parse_column_ref(self.atom("sum column")?)?)),
			"min" => Ok(Aggregate::Min(parse_column_ref(self.atom("min column")?)?)),
			"max" => Ok(Aggregate::Max(parse_column_ref(self.atom("max column")?)?)),
			other => Err(format!("unknown aggregate '{}'", other)),
		}
	}

	fn expr(&mut self, depth: usize) -> Result<Expr> {
		if depth > MAX_EXPR_DEPTH {
			return Err(format!("expression nesting exceeds {}", MAX_EXPR_DEPTH));
		}
		match self.next("expression")? {
			Token::Atom(atom) => parse_literal(atom),
			Token::Quoted(raw) => Ok(Expr::Text(unquote(raw))),
			Token::Open => {
				let head = self.atom("operator")?;
				let expr = match head {
					"and" | "or" => {
						let mut operands = Vec::new();
						while !matches!(self.peek(), Some(Token::Close) | None) {
							operands.push(self.expr(depth + 1)?);
						}
						if operands.is_empty() {
							return Err(format!("({}) needs at least one operand", head));
						}
						if head == "and" {
							Expr::And(operands)
						} else {
							Expr::Or(operands)
						}
					}
					"not" => Expr::Not(Box::new(self.expr(depth + 1)?)),
					"like" => {
						let value = self.expr(depth + 1)?;
						match self.next("like pattern")? {
							Token::Quoted(raw) => Expr::like(value, unquote(raw)),
							other => return Err(format!("expected quoted like pattern, found {}", other.describe())),
						}
					}
					"case" => {
						let condition = self.expr(depth + 1)?;
						let then = self.expr(depth + 1)?;
						let otherwise = self.expr(depth + 1)?;
						Expr::case(condition, then, otherwise)
					}
					symbol => {
						let op = BinaryOp::from_symbol(symbol)
							.ok_or_else(|| format!("unknown operator '{}'", symbol))?;
						let lhs = self.expr(depth + 1)?;
						let rhs = self.expr(depth + 1)?;
						Expr::binary(op, lhs, rhs)
					}
				};
				self.expect(Token::Close)?;
				Ok(expr)
			}
			other => Err(format!("unexpected {}", other.describe())),
		}
	}

	fn finish(&self) -> Result<()> {
		match self.peek() {
			None => Ok(()),
			Some(token) => Err(format!("unexpected {} at end of line", token.describe())),
		}
	}
}

#[cfg(test)]
pub mod tests {
	use super::*;

	const Q6: &str = "\
# revenue forecast
database data/tpch
scan lineitem 4:float 5:float 6:float 10:date
filter 0 (and (>= $3 date'1994-01-01') (< $3 date'1995-01-01') (>= $2 0.05) (<= $2 0.07) (< $0 24))
project 1 (* $1 $2)
aggregate 2 group [] sum $0
";

	#[test]
	fn test_parse() {
		let plan = Plan::parse(Q6).unwrap();
		assert_eq!(plan.database(), "data/tpch");
		assert_eq!(plan.nodes().len(), 4);
		assert_eq!(
			plan.node(0),
			&Operator::Scan {
				table: "lineitem".to_string(),
				columns: vec![
					ScanColumn {
						index: 4,
						ty: DataType::Float64,
					},
					ScanColumn {
						index: 5,
						ty: DataType::Float64,
					},
					ScanColumn {
						index: 6,
						ty: DataType::Float64,
					},
					ScanColumn {
						index: 10,
						ty: DataType::Date,
					},
				],
			}
		);
		assert_eq!(plan.output_schema(), &[DataType::Float64]);
	}

	#[test]
	fn test_display_round_trip() {
		let plan = Plan::parse(Q6).unwrap();
		let printed = plan.to_string();
		assert_eq!(Plan::parse(&printed).unwrap(), plan);
		assert!(printed.contains("aggregate 2 group [] sum $0\n"));
	}

	#[test]
	fn test_error_lines() {
		let err = Plan::parse("database x\nscan t 0:int\nfilter 0 (> $0\n").unwrap_err();
		assert_eq!(err.line, 3);

		let err = Plan::parse("scan t 0:int\n\nfilter 0 (> $4 1)\n").unwrap_err();
		assert_eq!(err.line, 3);
		assert!(err.reason.contains("out of range"), "{}", err.reason);

		let err = Plan::parse("scan t 0:bool\n").unwrap_err();
		assert_eq!(err.line, 1);

		let err = Plan::parse("# nothing\n").unwrap_err();
		assert!(err.reason.contains("no nodes"));
	}

	#[test]
	fn test_group_list() {
		let plan = Plan::parse("scan t 0:int 1:date 2:float\naggregate 0 group [1, 0] max $2 count\n").unwrap();
		assert_eq!(
			plan.node(1),
			&Operator::Aggregate {
				input: 0,
				group_by: vec![1, 0],
				aggregates: vec![Aggregate::Max(2), Aggregate::Count],
			}
		);
		assert_eq!(plan.database(), ".");
	}

	#[test]
	fn test_text_literals() {
		let plan = Plan::parse(
			"scan stations 0:int 1:text\nfilter 0 (or (like $1 '%Park') (= $1 'O''Hare Road'))\nproject 1 $1 'a, (b)'\n",
		)
		.unwrap();
		assert_eq!(
			plan.node(1),
			&Operator::Filter {
				input: 0,
				predicate: Expr::Or(vec![
					Expr::like(Expr::column(1), "%Park"),
					Expr::equal(Expr::column(1), Expr::text("O'Hare Road")),
				]),
			}
		);
		assert_eq!(
			plan.node(2),
			&Operator::Project {
				input: 1,
				expressions: vec![Expr::column(1), Expr::text("a, (b)")],
			}
		);
		assert_eq!(Plan::parse(&plan.to_string()).unwrap(), plan);
		assert_eq!(plan.output_schema(), &[DataType::Text, DataType::Text]);

		let err = Plan::parse("scan t 0:text\nfilter 0 (= $0 'open)\n").unwrap_err();
		assert_eq!(err.line, 2);
		assert!(err.reason.contains("unterminated"), "{}", err.reason);

		let err = Plan::parse("scan t 0:text\nfilter 0 (like $0 $0)\n").unwrap_err();
		assert!(err.reason.contains("pattern"), "{}", err.reason);
	}

	#[test]
	fn test_literals() {
		assert_eq!(parse_literal("-7"), Ok(Expr::Int(-7)));
		assert_eq!(parse_literal("0.5"), Ok(Expr::Float(0.5)));
		assert_eq!(parse_literal("$12"), Ok(Expr::Column(12)));
		assert!(parse_literal("date'1999-02-30'").is_err());
		assert!(parse_literal("abc").is_err());
	}
}
