use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum VmError {
    #[error("malformed program: token {index} ({token:?}) is not an integer")]
    MalformedProgram { index: usize, token: String },
    #[error("illegal opcode {opcode} at ip {ip}")]
    IllegalOpcode { opcode: i64, ip: usize },
    #[error("illegal parameter mode {mode} at ip {ip}")]
    IllegalMode { mode: i64, ip: usize },
    #[error("insufficient parameters for opcode {opcode} at ip {ip}")]
    InsufficientParameters { opcode: i64, ip: usize },
    #[error("negative address {address} at ip {ip}")]
    NegativeAddress { address: i64, ip: usize },
    #[error("memory limit: address {address} exceeds {limit} cells")]
    MemoryLimit { address: usize, limit: usize },
    #[error("circuit: unknown instance {0}")]
    UnknownInstance(usize),
    #[error("circuit: instance {0} produced no output")]
    NoOutput(usize),
    #[error("config: {0}")]
    Config(String),
}

impl VmError {
    /// Errors raised by the fetch/decode/execute loop itself, as opposed to
    /// wiring and configuration problems.
    pub fn is_fatal_execution(&self) -> bool {
        matches!(
            self,
            VmError::IllegalOpcode { .. }
                | VmError::IllegalMode { .. }
                | VmError::InsufficientParameters { .. }
                | VmError::NegativeAddress { .. }
                | VmError::MemoryLimit { .. }
        )
    }
}

pub type Result<T> = std::result::Result<T, VmError>;
