// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (c) 2025 ReifyDB

use tracing::{debug, instrument};

use crate::{
	codec,
	error::{DecodeError, TextError, ValidationError},
	expr::Expr,
	operator::{Aggregate, NodeId, Operator, ScanColumn},
	text,
	types::{DataType, Schema},
	validate::validate,
};

/// A validated query plan.
///
/// Nodes are stored in dependency order: every node only refers to earlier
/// nodes and the last node is the root. The plan is a tree, every node except
/// the root feeds exactly one parent.
#[derive(Debug, Clone, PartialEq)]
pub struct Plan {
	database: String,
	nodes: Vec<Operator>,
	schemas: Vec<Schema>,
}

impl Plan {
	pub fn new(database: impl Into<String>, nodes: Vec<Operator>) -> Result<Self, ValidationError> {
		let schemas = validate(&nodes)?;
		Ok(Self {
			database: database.into(),
			nodes,
			schemas,
		})
	}

	/// Decodes and validates a binary plan buffer.
	#[instrument(name = "plan::decode", level = "debug", skip_all, fields(len = bytes.len()))]
	pub fn decode(bytes: &[u8]) -> Result<Self, DecodeError> {
		let plan = codec::decode(bytes)?;
		debug!(nodes = plan.nodes.len(), "plan decoded");
		Ok(plan)
	}

	pub fn encode(&self) -> Vec<u8> {
		codec::encode(self)
	}

	/// Parses the text plan format.
	#[instrument(name = "plan::parse", level = "debug", skip_all)]
	pub fn parse(source: &str) -> Result<Self, TextError> {
		text::parse(source)
	}

	/// Directory holding the table files.
	pub fn database(&self) -> &str {
		&self.database
	}

	pub fn nodes(&self) -> &[Operator] {
		&self.nodes
	}

	pub fn node(&self, id: NodeId) -> &Operator {
		&self.nodes[id as usize]
	}

	pub fn root(&self) -> NodeId {
		(self.nodes.len() - 1) as NodeId
	}

	/// Output schema of the node `id`.
	pub fn schema(&self, id: NodeId) -> &[DataType] {
		&self.schemas[id as usize]
	}

	pub fn output_schema(&self) -> &[DataType] {
		self.schema(self.root())
	}

	/// Distinct tables read by the plan, in order of first appearance.
	pub fn tables(&self) -> Vec<&str> {
		let mut tables: Vec<&str> = Vec::new();
		for node in &self.nodes {
			if let Operator::Scan {
				table,
				..
			} = node
			{
				if !tables.contains(&table.as_str()) {
					tables.push(table);
				}
			}
		}
		tables
	}
}

/// Builds a plan node by node, every call returns the id of the new node.
///
/// ```
/// use kiln_plan::{DataType, Expr, PlanBuilder};
///
/// let mut builder = PlanBuilder::new("data");
/// let scan = builder.scan("t", [(0, DataType::Int64)]);
/// let filter = builder.filter(scan, Expr::gt(Expr::column(0), Expr::int(10)));
/// builder.project(filter, vec![Expr::column(0)]);
/// let plan = builder.build().unwrap();
/// assert_eq!(plan.nodes().len(), 3);
/// ```
#[derive(Debug)]
pub struct PlanBuilder {
	database: String,
	nodes: Vec<Operator>,
}

impl PlanBuilder {
	pub fn new(database: impl Into<String>) -> Self {
		Self {
			database: database.into(),
			nodes: Vec::new(),
		}
	}

	fn push(&mut self, node: Operator) -> NodeId {
		self.nodes.push(node);
		(self.nodes.len() - 1) as NodeId
	}

	pub fn scan(&mut self, table: impl Into<String>, columns: impl IntoIterator<Item = (u32, DataType)>) -> NodeId {
		let columns = columns
			.into_iter()
			.map(|(index, ty)| ScanColumn {
				index,
				ty,
			})
			.collect();
		self.push(Operator::Scan {
			table: table.into(),
			columns,
		})
	}

	pub fn filter(&mut self, input: NodeId, predicate: Expr) -> NodeId {
		self.push(Operator::Filter {
			input,
			predicate,
		})
	}

	pub fn project(&mut self, input: NodeId, expressions: Vec<Expr>) -> NodeId {
		self.push(Operator::Project {
			input,
			expressions,
		})
	}

	pub fn join(&mut self, left: NodeId, right: NodeId, left_key: u32, right_key: u32) -> NodeId {
		self.push(Operator::Join {
			left,
			right,
			left_key,
			right_key,
		})
	}

	pub fn aggregate(&mut self, input: NodeId, group_by: Vec<u32>, aggregates: Vec<Aggregate>) -> NodeId {
		self.push(Operator::Aggregate {
			input,
			group_by,
			aggregates,
		})
	}

	pub fn build(self) -> Result<Plan, ValidationError> {
		Plan::new(self.database, self.nodes)
	}
}

#[cfg(test)]
pub mod tests {
	use super::*;

	#[test]
	fn test_builder_schemas() {
		let mut builder = PlanBuilder::new("db");
		let orders = builder.scan("orders", [(0, DataType::Int64), (3, DataType::Date)]);
		let items = builder.scan("items", [(0, DataType::Int64), (5, DataType::Float64)]);
		let join = builder.join(orders, items, 0, 0);
		let agg = builder.aggregate(join, vec![1], vec![Aggregate::Sum(3), Aggregate::Count]);
		let plan = builder.build().unwrap();

		assert_eq!(plan.root(), agg);
		assert_eq!(plan.schema(join), &[DataType::Int64, DataType::Date, DataType::Int64, DataType::Float64]);
		assert_eq!(plan.output_schema(), &[DataType::Date, DataType::Float64, DataType::Int64]);
		assert_eq!(plan.tables(), vec!["orders", "items"]);
	}

	#[test]
	fn test_empty_plan() {
		assert!(PlanBuilder::new("db").build().is_err());
	}
}
