//! Write-once segmented memory.

use crate::relocatable::{MaybeRelocatable, Relocatable};
use log::trace;
use thiserror::Error;

#[derive(Error, Debug, Clone, Eq, PartialEq)]
pub enum MemoryError {
    #[error("segment {segment_index} does not exist (memory has {num_segments} segments)")]
    SegmentOutOfBounds {
        segment_index: isize,
        num_segments: usize,
    },
    #[error("cannot overwrite {address} (already holds {existing}) with {new}")]
    WriteOnce {
        address: Relocatable,
        existing: MaybeRelocatable,
        new: MaybeRelocatable,
    },
}

/// A write-once mapping from segmented addresses to words, partitioned by segment.
///
/// Segments are plain growable vectors of cells, so two [`Relocatable`]s with equal contents
/// always address the same cell: memory is keyed by value, never by instance identity.
#[derive(Debug, Default)]
pub struct Memory {
    segments: Vec<Vec<Option<MaybeRelocatable>>>,
}

impl Memory {
    pub fn new() -> Self {
        Self {
            segments: Vec::new(),
        }
    }

    pub fn num_segments(&self) -> usize {
        self.segments.len()
    }

    /// Allocates a fresh, empty segment and returns its base address.
    pub fn add_segment(&mut self) -> Relocatable {
        let segment_index = self.segments.len();
        self.segments.push(Vec::new());
        trace!("Allocated segment {segment_index}");
        Relocatable::new(segment_index as isize, 0)
    }

    /// Reads the word at `address`. Returns `None` both for a cell that has never been written
    /// and for an address in a segment that does not exist (negative index or
    /// `index >= num_segments`) — unlike `insert`, an out-of-range read is not an error; the
    /// caller's later assertion on the (still-undefined) operand is what catches it.
    pub fn get(&self, address: &Relocatable) -> Result<Option<&MaybeRelocatable>, MemoryError> {
        if address.segment_index < 0 {
            return Ok(None);
        }
        let Some(segment) = self.segments.get(address.segment_index as usize) else {
            return Ok(None);
        };
        Ok(segment.get(address.offset).and_then(Option::as_ref))
    }

    /// Writes `value` at `address`.
    ///
    /// Succeeds if the cell is empty, or if it already holds a value equal to `value` by value
    /// equality — the deduction cascade may legitimately re-derive a value already present.
    /// Fails with [`MemoryError::WriteOnce`] if the cell holds a different value.
    pub fn insert(
        &mut self,
        address: Relocatable,
        value: MaybeRelocatable,
    ) -> Result<(), MemoryError> {
        let num_segments = self.segments.len();
        let segment = self
            .segments
            .get_mut(address.segment_index as usize)
            .filter(|_| address.segment_index >= 0)
            .ok_or(MemoryError::SegmentOutOfBounds {
                segment_index: address.segment_index,
                num_segments,
            })?;
        if segment.len() <= address.offset {
            segment.resize(address.offset + 1, None);
        }
        match &segment[address.offset] {
            None => {
                trace!("Writing {value} to {address}");
                segment[address.offset] = Some(value);
                Ok(())
            }
            Some(existing) if *existing == value => Ok(()),
            Some(existing) => Err(MemoryError::WriteOnce {
                address,
                existing: existing.clone(),
                new: value,
            }),
        }
    }

    /// Sequentially inserts `words` starting at `address`, returning the address just past the
    /// last one written. This is the entry point a program loader uses.
    pub fn load_data(
        &mut self,
        address: Relocatable,
        words: &[MaybeRelocatable],
    ) -> Result<Relocatable, MemoryError> {
        let mut addr = address;
        for word in words {
            self.insert(addr, word.clone())?;
            addr = addr
                .offset_by(1)
                .expect("offsets only ever grow while loading sequential data");
        }
        Ok(addr)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::felt::Felt;

    fn felt(v: i64) -> MaybeRelocatable {
        MaybeRelocatable::Field(Felt::from(v))
    }

    #[test]
    fn read_of_unwritten_cell_is_none() {
        let mut memory = Memory::new();
        let base = memory.add_segment();
        assert_eq!(memory.get(&base).unwrap(), None);
    }

    #[test]
    fn insert_then_get_roundtrips() {
        let mut memory = Memory::new();
        let base = memory.add_segment();
        memory.insert(base, felt(7)).unwrap();
        assert_eq!(memory.get(&base).unwrap(), Some(&felt(7)));
    }

    #[test]
    fn rewriting_with_an_equal_value_succeeds() {
        let mut memory = Memory::new();
        let base = memory.add_segment();
        memory.insert(base, felt(7)).unwrap();
        assert!(memory.insert(base, felt(7)).is_ok());
    }

    #[test]
    fn rewriting_with_a_different_value_fails() {
        let mut memory = Memory::new();
        let base = memory.add_segment();
        memory.insert(base, felt(7)).unwrap();
        assert!(matches!(
            memory.insert(base, felt(8)),
            Err(MemoryError::WriteOnce { .. })
        ));
    }

    #[test]
    fn insert_into_unallocated_segment_fails() {
        let mut memory = Memory::new();
        let addr = Relocatable::new(0, 0);
        assert!(matches!(
            memory.insert(addr, felt(1)),
            Err(MemoryError::SegmentOutOfBounds { .. })
        ));
    }

    /// Unlike `insert`, reading a segment that does not exist yet is not an error: it reads the
    /// same as any other never-written cell. This is what lets a double-dereference through an
    /// operand pointing into a not-yet-allocated segment fall through to deduction instead of
    /// aborting the step.
    #[test]
    fn get_from_unallocated_segment_is_none_not_an_error() {
        let memory = Memory::new();
        assert_eq!(memory.get(&Relocatable::new(0, 0)).unwrap(), None);
        assert_eq!(memory.get(&Relocatable::new(5, 2)).unwrap(), None);
    }

    #[test]
    fn get_with_negative_segment_index_is_none_not_an_error() {
        let memory = Memory::new();
        assert_eq!(memory.get(&Relocatable::new(-1, 0)).unwrap(), None);
    }

    #[test]
    fn load_data_inserts_sequentially_and_returns_end_address() {
        let mut memory = Memory::new();
        let base = memory.add_segment();
        let end = memory
            .load_data(base, &[felt(1), felt(2), felt(3)])
            .unwrap();
        assert_eq!(end, Relocatable::new(base.segment_index, 3));
        assert_eq!(memory.get(&Relocatable::new(0, 1)).unwrap(), Some(&felt(2)));
    }

    #[test]
    fn equal_valued_relocatables_alias_the_same_cell() {
        let mut memory = Memory::new();
        memory.add_segment();
        let a = Relocatable::new(0, 3);
        let b = Relocatable::new(0, 3);
        memory.insert(a, felt(9)).unwrap();
        assert_eq!(memory.get(&b).unwrap(), Some(&felt(9)));
    }
}
