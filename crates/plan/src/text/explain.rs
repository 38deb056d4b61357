// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (c) 2025 ReifyDB

use std::fmt::{self, Display, Formatter};

use crate::{
	operator::{Aggregate, Operator},
	plan::Plan,
};

/// Prints the text plan format, one node per line.
impl Display for Plan {
	fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
		writeln!(f, "database {}", self.database())?;
		for node in self.nodes() {
			writeln!(f, "{}", node)?;
		}
		Ok(())
	}
}

impl Display for Operator {
	fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
		match self {
			Operator::Scan {
				table,
				columns,
			} => {
				write!(f, "scan {}", table)?;
				for column in columns {
					write!(f, " {}:{}", column.index, column.ty)?;
				}
				Ok(())
			}
			Operator::Filter {
				input,
				predicate,
			} => write!(f, "filter {} {}", input, predicate),
			Operator::Project {
				input,
				expressions,
			} => {
				write!(f, "project {}", input)?;
				for expr in expressions {
					write!(f, " {}", expr)?;
				}
				Ok(())
			}
			Operator::Join {
				left,
				right,
				left_key,
				right_key,
			} => write!(f, "join {} {} {} {}", left, right, left_key, right_key),
			Operator::Aggregate {
				input,
				group_by,
				aggregates,
			} => {
				let group_by = group_by.iter().map(u32::to_string).collect::<Vec<_>>().join(", ");
				write!(f, "aggregate {} group [{}]", input, group_by)?;
				for aggregate in aggregates {
					write!(f, " {}", aggregate)?;
				}
				Ok(())
			}
		}
	}
}

impl Display for Aggregate {
	fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
		match self.column() {
			Some(column) => write!(f, "{} ${}", self.name(), column),
			None => f.write_str(self.name()),
		}
	}
}
