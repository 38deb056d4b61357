// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (c) 2025 ReifyDB

//! Query plan IR for Kiln.
//!
//! A [`Plan`] is a validated tree of relational operators stored in
//! dependency order. Plans travel between processes in the binary format of
//! the [`codec`] module and are written by hand in the text format of the
//! [`text`] module.

pub mod codec;
mod error;
mod expr;
mod operator;
mod plan;
pub mod text;
mod types;
mod validate;

pub use error::{DecodeError, TextError, ValidationError};
pub use expr::{BinaryOp, Expr};
pub use operator::{Aggregate, NodeId, Operator, ScanColumn};
pub use plan::{Plan, PlanBuilder};
pub use types::{DataType, Schema, civil_from_days, days_from_civil, format_date, parse_date};
pub use validate::{MAX_EXPR_DEPTH, aggregate_type, infer_type, unify};
