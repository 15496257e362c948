//! Instruction decoding.
//!
//! The decoder never knows an opcode's parameter count. Handlers pull
//! parameters one at a time from [`Operands`]; each pull consumes the next
//! mode digit (least significant first, positional once the digits run out)
//! and the next parameter slot. The instruction width is whatever was pulled.

use crate::error::{Result, VmError};
use crate::memory::Memory;
use crate::opcode::{Mode, Opcode};

/// Lazy parameter supply for the instruction at `ip`.
#[derive(Debug, Clone)]
pub struct Operands {
    ip: usize,
    code: i64,
    modes: i64,
    consumed: usize,
    relative_base: i64,
}

/// Decode the instruction word at `ip`.
pub fn decode(memory: &Memory, ip: usize, relative_base: i64) -> Result<(Opcode, Operands)> {
    let word = memory.read(ip);
    if word < 0 {
        return Err(VmError::IllegalOpcode { opcode: word, ip });
    }
    let code = word % 100;
    let opcode = Opcode::decode(code, ip)?;
    Ok((
        opcode,
        Operands {
            ip,
            code,
            modes: word / 100,
            consumed: 0,
            relative_base,
        },
    ))
}

impl Operands {
    /// Instruction width so far: the opcode cell plus every pulled parameter.
    pub fn width(&self) -> usize {
        1 + self.consumed
    }

    fn next_slot(&mut self, memory: &Memory) -> Result<(Mode, usize)> {
        let slot = self.ip + self.consumed + 1;
        if slot >= memory.len() {
            return Err(VmError::InsufficientParameters {
                opcode: self.code,
                ip: self.ip,
            });
        }
        let mode = Mode::decode(self.modes % 10, self.ip)?;
        self.modes /= 10;
        self.consumed += 1;
        Ok((mode, slot))
    }

    /// Resolve the next parameter as a value.
    pub fn read(&mut self, memory: &Memory) -> Result<i64> {
        let (mode, slot) = self.next_slot(memory)?;
        let raw = memory.read(slot);
        Ok(match mode {
            Mode::Immediate => raw,
            Mode::Positional => memory.read_signed(raw),
            Mode::Relative => memory.read_signed(raw.saturating_add(self.relative_base)),
        })
    }

    /// Resolve the next parameter as a write address. Immediate mode
    /// targets the parameter slot itself.
    pub fn dest(&mut self, memory: &Memory) -> Result<i64> {
        let (mode, slot) = self.next_slot(memory)?;
        let raw = memory.read(slot);
        Ok(match mode {
            // slot < memory.len(), which is bounded by the memory limit
            Mode::Immediate => slot as i64,
            Mode::Positional => raw,
            Mode::Relative => raw.saturating_add(self.relative_base),
        })
    }

    /// Validate a resolved value as an absolute jump target.
    pub fn jump(&self, target: i64) -> Result<usize> {
        usize::try_from(target).map_err(|_| VmError::NegativeAddress {
            address: target,
            ip: self.ip,
        })
    }
}
