use crate::error::VmError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Opcode {
    Add,
    Mul,
    Read,
    Write,
    JumpIfTrue,
    JumpIfFalse,
    LessThan,
    Equals,
    AdjustRelativeBase,
    Halt,
}

impl Opcode {
    /// Map the low two decimal digits of an instruction word. `ip` is only
    /// used to label the error.
    pub fn decode(code: i64, ip: usize) -> Result<Self, VmError> {
        Ok(match code {
            1 => Opcode::Add,
            2 => Opcode::Mul,
            3 => Opcode::Read,
            4 => Opcode::Write,
            5 => Opcode::JumpIfTrue,
            6 => Opcode::JumpIfFalse,
            7 => Opcode::LessThan,
            8 => Opcode::Equals,
            9 => Opcode::AdjustRelativeBase,
            99 => Opcode::Halt,
            _ => return Err(VmError::IllegalOpcode { opcode: code, ip }),
        })
    }

    pub fn code(self) -> i64 {
        match self {
            Opcode::Add => 1,
            Opcode::Mul => 2,
            Opcode::Read => 3,
            Opcode::Write => 4,
            Opcode::JumpIfTrue => 5,
            Opcode::JumpIfFalse => 6,
            Opcode::LessThan => 7,
            Opcode::Equals => 8,
            Opcode::AdjustRelativeBase => 9,
            Opcode::Halt => 99,
        }
    }
}

/// Per-parameter addressing mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Mode {
    /// Operand is the address held in the parameter slot.
    Positional,
    /// Operand is the parameter slot's literal value.
    Immediate,
    /// Operand address is the slot value offset by the relative base.
    Relative,
}

impl Mode {
    pub fn decode(digit: i64, ip: usize) -> Result<Self, VmError> {
        match digit {
            0 => Ok(Mode::Positional),
            1 => Ok(Mode::Immediate),
            2 => Ok(Mode::Relative),
            _ => Err(VmError::IllegalMode { mode: digit, ip }),
        }
    }
}
