// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (c) 2025 ReifyDB

use std::{
	fmt::{self, Display, Formatter},
	ops::BitOr,
};

use crate::error::GenerateError;

/// Code lowering strategy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(i32)]
pub enum Stage {
	/// Tuple-at-a-time fused loops.
	Scalar = 0,
	/// Batch-at-a-time with selection vectors.
	Vectorised = 1,
}

impl Stage {
	pub const ALL: [Stage; 2] = [Stage::Scalar, Stage::Vectorised];

	/// Flags this stage understands.
	pub fn supported_flags(self) -> Flags {
		match self {
			Stage::Scalar => Flags::COUNT_ONLY | Flags::ELIDE_BOUNDS_CHECKS | Flags::PROFILE,
			Stage::Vectorised => {
				Flags::COUNT_ONLY | Flags::ELIDE_BOUNDS_CHECKS | Flags::PROFILE | Flags::SIMD_HINTS
			}
		}
	}

	pub fn name(self) -> &'static str {
		match self {
			Stage::Scalar => "scalar",
			Stage::Vectorised => "vectorised",
		}
	}
}

impl TryFrom<i32> for Stage {
	type Error = GenerateError;

	fn try_from(value: i32) -> Result<Self, Self::Error> {
		match value {
			0 => Ok(Stage::Scalar),
			1 => Ok(Stage::Vectorised),
			stage => Err(GenerateError::UnknownStage {
				stage,
			}),
		}
	}
}

impl Display for Stage {
	fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
		f.write_str(self.name())
	}
}

/// Bitmask modifying how a stage lowers a plan.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct Flags(u32);

impl Flags {
	pub const NONE: Flags = Flags(0);
	/// Summarise the result as its row count.
	pub const COUNT_ONLY: Flags = Flags(0x1);
	/// Omit runtime bounds and field checks.
	pub const ELIDE_BOUNDS_CHECKS: Flags = Flags(0x2);
	/// Print load and execution timings as JSON on stderr.
	pub const PROFILE: Flags = Flags(0x4);
	/// Vectorisation pragmas and compiler flags.
	pub const SIMD_HINTS: Flags = Flags(0x8);

	pub const fn from_bits(bits: u32) -> Self {
		Flags(bits)
	}

	pub const fn bits(self) -> u32 {
		self.0
	}

	pub const fn contains(self, other: Flags) -> bool {
		self.0 & other.0 == other.0
	}

	pub const fn is_empty(self) -> bool {
		self.0 == 0
	}
}

impl BitOr for Flags {
	type Output = Flags;

	fn bitor(self, rhs: Flags) -> Flags {
		Flags(self.0 | rhs.0)
	}
}

impl Display for Flags {
	fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
		write!(f, "0x{:x}", self.0)
	}
}

/// A validated (stage, flags) pair.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct GenerationRequest {
	stage: Stage,
	flags: Flags,
}

impl GenerationRequest {
	pub fn new(stage: Stage, flags: Flags) -> Result<Self, GenerateError> {
		let unsupported = flags.bits() & !stage.supported_flags().bits();
		if unsupported != 0 {
			return Err(GenerateError::UnsupportedFlags {
				stage,
				flags: flags.bits(),
				unsupported,
			});
		}
		Ok(Self {
			stage,
			flags,
		})
	}

	/// Validates raw integers received across the C boundary. Out-of-range
	/// values are rejected, never clamped.
	pub fn from_raw(stage: i32, flags: i32) -> Result<Self, GenerateError> {
		let stage = Stage::try_from(stage)?;
		let flags = u32::try_from(flags).map_err(|_| GenerateError::UnsupportedFlags {
			stage,
			flags: flags as u32,
			unsupported: flags as u32,
		})?;
		Self::new(stage, Flags::from_bits(flags))
	}

	pub fn stage(&self) -> Stage {
		self.stage
	}

	pub fn flags(&self) -> Flags {
		self.flags
	}

	pub fn has(&self, flag: Flags) -> bool {
		self.flags.contains(flag)
	}
}

#[cfg(test)]
pub mod tests {
	use super::*;

	#[test]
	fn test_stage_from_raw() {
		assert_eq!(Stage::try_from(0), Ok(Stage::Scalar));
		assert_eq!(Stage::try_from(1), Ok(Stage::Vectorised));
		assert!(Stage::try_from(2).is_err());
		assert!(Stage::try_from(-1).is_err());
	}

	#[test]
	fn test_simd_only_vectorised() {
		assert!(GenerationRequest::new(Stage::Scalar, Flags::SIMD_HINTS).is_err());
		assert!(GenerationRequest::new(Stage::Vectorised, Flags::SIMD_HINTS | Flags::COUNT_ONLY).is_ok());
	}

	#[test]
	fn test_raw_flags() {
		let request = GenerationRequest::from_raw(0, 0x7).unwrap();
		assert!(request.has(Flags::COUNT_ONLY));
		assert!(request.has(Flags::PROFILE));
		assert!(!request.has(Flags::SIMD_HINTS));

		assert!(GenerationRequest::from_raw(1, 0x10).is_err());
		assert!(GenerationRequest::from_raw(1, -1).is_err());
	}
}
