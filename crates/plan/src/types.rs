// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (c) 2025 ReifyDB

use std::fmt::{self, Display, Formatter};

/// Type of a value flowing between plan operators.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DataType {
	Int64,
	Float64,
	/// Days since 1970-01-01.
	Date,
	/// Variable length byte string, compared bytewise.
	Text,
	/// Only produced by expressions, tables never store it.
	Bool,
}

impl DataType {
	/// Tag used by the binary plan format. `Bool` has no tag since scans cannot produce it.
	pub fn tag(self) -> Option<u8> {
		match self {
			DataType::Int64 => Some(0),
			DataType::Float64 => Some(1),
			DataType::Date => Some(2),
			DataType::Text => Some(3),
			DataType::Bool => None,
		}
	}

	pub fn from_tag(tag: u8) -> Option<Self> {
		match tag {
			0 => Some(DataType::Int64),
			1 => Some(DataType::Float64),
			2 => Some(DataType::Date),
			3 => Some(DataType::Text),
			_ => None,
		}
	}

	pub fn is_numeric(self) -> bool {
		matches!(self, DataType::Int64 | DataType::Float64)
	}

	/// Name used by the text plan format.
	pub fn name(self) -> &'static str {
		match self {
			DataType::Int64 => "int",
			DataType::Float64 => "float",
			DataType::Date => "date",
			DataType::Text => "text",
			DataType::Bool => "bool",
		}
	}

	pub fn from_name(name: &str) -> Option<Self> {
		match name {
			"int" => Some(DataType::Int64),
			"float" => Some(DataType::Float64),
			"date" => Some(DataType::Date),
			"text" => Some(DataType::Text),
			_ => None,
		}
	}
}

impl Display for DataType {
	fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
		f.write_str(self.name())
	}
}

/// Output schema of a plan node: one type per column.
pub type Schema = Vec<DataType>;

/// Converts a civil date into days since 1970-01-01.
pub fn days_from_civil(year: i32, month: u32, day: u32) -> i32 {
	let (y, mp) = if month <= 2 {
		(year - 1, month as i32 + 9)
	} else {
		(year, month as i32 - 3)
	};
	let era = y.div_euclid(400);
	let yoe = y.rem_euclid(400);
	let doy = (153 * mp + 2) / 5 + day as i32 - 1;
	let doe = yoe * 365 + yoe / 4 - yoe / 100 + doy;
	era * 146097 + doe - 719468
}

/// Converts days since 1970-01-01 back into (year, month, day).
pub fn civil_from_days(days: i32) -> (i32, u32, u32) {
	let z = days + 719468;
	let era = z.div_euclid(146097);
	let doe = z.rem_euclid(146097);
	let yoe = (doe - doe / 1460 + doe / 36524 - doe / 146096) / 365;
	let doy = doe - (365 * yoe + yoe / 4 - yoe / 100);
	let mp = (5 * doy + 2) / 153;
	let day = (doy - (153 * mp + 2) / 5 + 1) as u32;
	let month = (if mp < 10 {
		mp + 3
	} else {
		mp - 9
	}) as u32;
	let year = yoe + era * 400 + i32::from(month <= 2);
	(year, month, day)
}

/// Parses `YYYY-MM-DD` into days since 1970-01-01.
pub fn parse_date(text: &str) -> Option<i32> {
	let mut parts = text.splitn(3, '-');
	let year: i32 = parts.next()?.parse().ok()?;
	let month: u32 = parts.next()?.parse().ok()?;
	let day: u32 = parts.next()?.parse().ok()?;
	if text.len() != 10 || !(1..=12).contains(&month) || day == 0 || day > days_in_month(year, month) {
		return None;
	}
	Some(days_from_civil(year, month, day))
}

pub fn format_date(days: i32) -> String {
	let (y, m, d) = civil_from_days(days);
	format!("{:04}-{:02}-{:02}", y, m, d)
}

fn days_in_month(year: i32, month: u32) -> u32 {
	match month {
		1 | 3 | 5 | 7 | 8 | 10 | 12 => 31,
		4 | 6 | 9 | 11 => 30,
		_ => {
			if (year % 4 == 0 && year % 100 != 0) || year % 400 == 0 {
				29
			} else {
				28
			}
		}
	}
}
