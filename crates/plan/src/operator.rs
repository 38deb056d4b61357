// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (c) 2025 ReifyDB

use crate::{expr::Expr, types::DataType};

/// Position of a node inside [`crate::Plan::nodes`].
pub type NodeId = u32;

/// A column read from a table by a scan.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ScanColumn {
	/// Position of the column in the table file.
	pub index: u32,
	pub ty: DataType,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Aggregate {
	Sum(u32),
	Count,
	Min(u32),
	Max(u32),
}

impl Aggregate {
	pub fn tag(self) -> u8 {
		match self {
			Aggregate::Sum(_) => 0,
			Aggregate::Count => 1,
			Aggregate::Min(_) => 2,
			Aggregate::Max(_) => 3,
		}
	}

	pub fn column(self) -> Option<u32> {
		match self {
			Aggregate::Sum(column) | Aggregate::Min(column) | Aggregate::Max(column) => Some(column),
			Aggregate::Count => None,
		}
	}

	pub fn name(self) -> &'static str {
		match self {
			Aggregate::Sum(_) => "sum",
			Aggregate::Count => "count",
			Aggregate::Min(_) => "min",
			Aggregate::Max(_) => "max",
		}
	}
}

#[derive(Debug, Clone, PartialEq)]
pub enum Operator {
	Scan {
		table: String,
		columns: Vec<ScanColumn>,
	},
	Filter {
		input: NodeId,
		predicate: Expr,
	},
	Project {
		input: NodeId,
		expressions: Vec<Expr>,
	},
	/// Inner equi-join, output is the left columns followed by the right columns.
	Join {
		left: NodeId,
		right: NodeId,
		left_key: u32,
		right_key: u32,
	},
	/// Output is the group-by columns followed by one column per aggregate.
	Aggregate {
		input: NodeId,
		group_by: Vec<u32>,
		aggregates: Vec<Aggregate>,
	},
}

impl Operator {
	pub const SCAN: u8 = 0x01;
	pub const FILTER: u8 = 0x02;
	pub const PROJECT: u8 = 0x03;
	pub const JOIN: u8 = 0x04;
	pub const AGGREGATE: u8 = 0x05;

	pub fn tag(&self) -> u8 {
		match self {
			Operator::Scan {
				..
			} => Self::SCAN,
			Operator::Filter {
				..
			} => Self::FILTER,
			Operator::Project {
				..
			} => Self::PROJECT,
			Operator::Join {
				..
			} => Self::JOIN,
			Operator::Aggregate {
				..
			} => Self::AGGREGATE,
		}
	}

	pub fn name(&self) -> &'static str {
		match self {
			Operator::Scan {
				..
			} => "scan",
			Operator::Filter {
				..
			} => "filter",
			Operator::Project {
				..
			} => "project",
			Operator::Join {
				..
			} => "join",
			Operator::Aggregate {
				..
			} => "aggregate",
		}
	}

	/// Child nodes in the order they are consumed.
	pub fn inputs(&self) -> Vec<NodeId> {
		match self {
			Operator::Scan {
				..
			} => Vec::new(),
			Operator::Filter {
				input,
				..
			}
			| Operator::Project {
				input,
				..
			}
			| Operator::Aggregate {
				input,
				..
			} => vec![*input],
			Operator::Join {
				left,
				right,
				..
			} => vec![*left, *right],
		}
	}
}
