//! Segmented addresses and the tagged word type stored in memory.

use crate::felt::{Felt, MathError};
use std::fmt;
use thiserror::Error;

#[derive(Error, Debug, Clone, Eq, PartialEq)]
pub enum RelocatableError {
    #[error("offset underflow: offset {offset} cannot be shifted by {delta}")]
    OffsetUnderflow { offset: usize, delta: i64 },
    #[error("addresses are in different segments ({lhs} and {rhs})")]
    SegmentMismatch { lhs: isize, rhs: isize },
    #[error("operation is not defined between these operand types")]
    TypeMismatch,
    #[error(transparent)]
    Math(#[from] MathError),
}

/// A segmented address: an index identifying the segment, plus an offset within it.
#[derive(Debug, Copy, Clone, Eq, PartialEq, PartialOrd, Ord, Hash)]
pub struct Relocatable {
    pub segment_index: isize,
    pub offset: usize,
}

impl Relocatable {
    pub fn new(segment_index: isize, offset: usize) -> Self {
        Self {
            segment_index,
            offset,
        }
    }

    /// Shifts the offset by a signed delta, failing if the result would be negative.
    pub fn offset_by(&self, delta: i64) -> Result<Self, RelocatableError> {
        let new_offset = self.offset as i64 + delta;
        if new_offset < 0 {
            return Err(RelocatableError::OffsetUnderflow {
                offset: self.offset,
                delta,
            });
        }
        Ok(Self {
            segment_index: self.segment_index,
            offset: new_offset as usize,
        })
    }

    /// Difference between two addresses in the same segment, as a field element.
    pub fn sub(&self, other: &Self) -> Result<Felt, RelocatableError> {
        if self.segment_index != other.segment_index {
            return Err(RelocatableError::SegmentMismatch {
                lhs: self.segment_index,
                rhs: other.segment_index,
            });
        }
        let diff = self.offset as i64 - other.offset as i64;
        Ok(Felt::from(diff))
    }
}

impl fmt::Display for Relocatable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({}:{})", self.segment_index, self.offset)
    }
}

impl From<(isize, usize)> for Relocatable {
    fn from(value: (isize, usize)) -> Self {
        Self::new(value.0, value.1)
    }
}

/// The tagged union stored in a memory cell: either a field element or a segmented address.
#[derive(Debug, Clone, Eq, PartialEq, Hash)]
pub enum MaybeRelocatable {
    Field(Felt),
    Ptr(Relocatable),
}

impl MaybeRelocatable {
    pub fn as_relocatable(&self) -> Result<&Relocatable, RelocatableError> {
        match self {
            Self::Ptr(r) => Ok(r),
            Self::Field(_) => Err(RelocatableError::TypeMismatch),
        }
    }

    pub fn as_felt(&self) -> Result<&Felt, RelocatableError> {
        match self {
            Self::Field(f) => Ok(f),
            Self::Ptr(_) => Err(RelocatableError::TypeMismatch),
        }
    }

    pub fn is_zero(&self) -> bool {
        matches!(self, Self::Field(f) if f.is_zero())
    }

    pub fn add(&self, other: &Self) -> Result<Self, RelocatableError> {
        match (self, other) {
            (Self::Field(a), Self::Field(b)) => Ok(Self::Field(a.add(b))),
            (Self::Ptr(r), Self::Field(f)) => {
                let delta = f.to_bigint();
                let delta: i64 = delta
                    .try_into()
                    .map_err(|_| RelocatableError::TypeMismatch)?;
                Ok(Self::Ptr(r.offset_by(delta)?))
            }
            // Field + Relocatable (this order) is undefined per the word arithmetic rules; only
            // Relocatable + Field is.
            (Self::Field(_), Self::Ptr(_)) => Err(RelocatableError::TypeMismatch),
            (Self::Ptr(_), Self::Ptr(_)) => Err(RelocatableError::TypeMismatch),
        }
    }

    pub fn sub(&self, other: &Self) -> Result<Self, RelocatableError> {
        match (self, other) {
            (Self::Field(a), Self::Field(b)) => Ok(Self::Field(a.sub(b))),
            (Self::Ptr(r), Self::Field(f)) => {
                let delta = f.to_bigint();
                let delta: i64 = delta
                    .try_into()
                    .map_err(|_| RelocatableError::TypeMismatch)?;
                Ok(Self::Ptr(r.offset_by(-delta)?))
            }
            (Self::Ptr(a), Self::Ptr(b)) => Ok(Self::Field(a.sub(b)?)),
            (Self::Field(_), Self::Ptr(_)) => Err(RelocatableError::TypeMismatch),
        }
    }

    pub fn mul(&self, other: &Self) -> Result<Self, RelocatableError> {
        match (self, other) {
            (Self::Field(a), Self::Field(b)) => Ok(Self::Field(a.mul(b))),
            _ => Err(RelocatableError::TypeMismatch),
        }
    }

    pub fn div(&self, other: &Self) -> Result<Self, RelocatableError> {
        match (self, other) {
            (Self::Field(a), Self::Field(b)) => Ok(Self::Field(a.div(b)?)),
            _ => Err(RelocatableError::TypeMismatch),
        }
    }
}

impl From<Felt> for MaybeRelocatable {
    fn from(value: Felt) -> Self {
        Self::Field(value)
    }
}

impl From<Relocatable> for MaybeRelocatable {
    fn from(value: Relocatable) -> Self {
        Self::Ptr(value)
    }
}

impl fmt::Display for MaybeRelocatable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Field(v) => write!(f, "{v}"),
            Self::Ptr(r) => write!(f, "{r}"),
        }
    }
}
