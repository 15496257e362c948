//! Growable cell tape. All cell access goes through `read`/`write` so the
//! default-zero and grow-on-write rules apply uniformly.
//!
//! Negative addresses do not belong to the tape. Programs may still resolve
//! one (e.g. a positional write to `-15` later read back relatively), so
//! they are kept in a detached sparse store that never appears in a memory
//! dump.

use crate::config::DEFAULT_MEMORY_LIMIT;
use crate::error::{Result, VmError};
use crate::program::Program;
use std::collections::BTreeMap;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Memory {
    cells: Vec<i64>,
    detached: BTreeMap<i64, i64>,
    limit: usize,
}

impl Memory {
    /// Parse program text straight into a fresh tape.
    pub fn load(text: &str) -> Result<Self> {
        Ok(Self::from_program(&Program::parse(text)?))
    }

    pub fn from_program(program: &Program) -> Self {
        Self {
            cells: program.cells().to_vec(),
            detached: BTreeMap::new(),
            limit: DEFAULT_MEMORY_LIMIT,
        }
    }

    pub fn with_limit(mut self, limit: usize) -> Self {
        self.limit = limit;
        self
    }

    pub fn len(&self) -> usize {
        self.cells.len()
    }

    pub fn is_empty(&self) -> bool {
        self.cells.is_empty()
    }

    /// Out-of-range reads yield 0 and do not grow the tape.
    pub fn read(&self, address: usize) -> i64 {
        self.cells.get(address).copied().unwrap_or(0)
    }

    /// Out-of-range writes zero-fill up to and including `address`.
    pub fn write(&mut self, address: usize, value: i64) -> Result<()> {
        if address >= self.cells.len() {
            if address >= self.limit {
                return Err(VmError::MemoryLimit {
                    address,
                    limit: self.limit,
                });
            }
            self.cells.resize(address + 1, 0);
        }
        self.cells[address] = value;
        Ok(())
    }

    /// Read a resolved address, negative ones included.
    pub fn read_signed(&self, address: i64) -> i64 {
        if address < 0 {
            return self.detached.get(&address).copied().unwrap_or(0);
        }
        usize::try_from(address).map_or(0, |a| self.read(a))
    }

    /// Write a resolved address, negative ones included.
    pub fn write_signed(&mut self, address: i64, value: i64) -> Result<()> {
        if address < 0 {
            if !self.detached.contains_key(&address)
                && self.cells.len() + self.detached.len() >= self.limit
            {
                return Err(VmError::MemoryLimit {
                    address: usize::MAX,
                    limit: self.limit,
                });
            }
            self.detached.insert(address, value);
            return Ok(());
        }
        let a = usize::try_from(address).map_err(|_| VmError::MemoryLimit {
            address: usize::MAX,
            limit: self.limit,
        })?;
        self.write(a, value)
    }

    /// Cells written at negative addresses.
    pub fn detached(&self) -> &BTreeMap<i64, i64> {
        &self.detached
    }

    pub fn cells(&self) -> &[i64] {
        &self.cells
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn read_past_end_is_zero_without_growth() {
        let m = Memory::load("1,2,3").unwrap();
        assert_eq!(m.read(2), 3);
        assert_eq!(m.read(3), 0);
        assert_eq!(m.read(1_000_000), 0);
        assert_eq!(m.len(), 3);
    }

    #[test]
    fn write_past_end_zero_fills_gap() {
        let mut m = Memory::load("7").unwrap();
        m.write(4, -9).unwrap();
        assert_eq!(m.cells(), &[7, 0, 0, 0, -9]);
        assert_eq!(m.read(4), -9);
    }

    #[test]
    fn write_then_read_any_address() {
        let mut m = Memory::load("0,0").unwrap();
        for (a, v) in [(0usize, 5i64), (1, -1), (17, 42), (3, 8)] {
            m.write(a, v).unwrap();
            assert_eq!(m.read(a), v);
        }
        // earlier writes survive later growth
        assert_eq!(m.read(0), 5);
        assert_eq!(m.read(2), 0);
        assert_eq!(m.read(17), 42);
    }

    #[test]
    fn in_place_write_does_not_grow() {
        let mut m = Memory::load("1,2,3").unwrap();
        m.write(1, 20).unwrap();
        assert_eq!(m.cells(), &[1, 20, 3]);
    }

    #[test]
    fn limit_blocks_runaway_growth() {
        let mut m = Memory::load("1,2").unwrap().with_limit(8);
        m.write(7, 1).unwrap();
        let err = m.write(8, 1).unwrap_err();
        assert_eq!(err, VmError::MemoryLimit { address: 8, limit: 8 });
        assert_eq!(m.len(), 8);
    }

    #[test]
    fn limit_counts_detached_cells() {
        let mut m = Memory::load("1,2").unwrap().with_limit(4);
        m.write_signed(-1, 1).unwrap();
        m.write_signed(-2, 2).unwrap();
        // overwriting an existing detached cell allocates nothing
        m.write_signed(-1, 3).unwrap();
        assert!(matches!(
            m.write_signed(-3, 1).unwrap_err(),
            VmError::MemoryLimit { limit: 4, .. }
        ));
        assert_eq!(m.detached().len(), 2);
        assert_eq!(m.read_signed(-1), 3);
    }

    #[test]
    fn negative_addresses_stay_off_the_tape() {
        let mut m = Memory::load("1,2,3").unwrap();
        assert_eq!(m.read_signed(-15), 0);
        m.write_signed(-15, 123).unwrap();
        assert_eq!(m.read_signed(-15), 123);
        assert_eq!(m.cells(), &[1, 2, 3]);
        assert_eq!(m.detached().get(&-15), Some(&123));
        m.write_signed(4, 5).unwrap();
        assert_eq!(m.cells(), &[1, 2, 3, 0, 5]);
        assert_eq!(m.read_signed(4), 5);
    }

    #[test]
    fn load_rejects_malformed_text() {
        assert!(matches!(
            Memory::load("1,two,3").unwrap_err(),
            VmError::MalformedProgram { index: 1, .. }
        ));
    }
}
