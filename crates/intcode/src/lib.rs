//! Intcode - stored-program integer VM
//!
//! - Growable memory tape with default-zero reads
//! - Positional / immediate / relative addressing, decoded lazily per parameter
//! - Suspending input queue and broadcast output stream per instance
//! - Circuits of instances wired output -> input, run concurrently on tokio

pub mod circuit;
pub mod config;
pub mod decode;
pub mod error;
pub mod exec;
pub mod io;
pub mod memory;
pub mod opcode;
pub mod program;

pub use circuit::{amplifiers, amplify, max_signal, permutations, Circuit, Topology};
pub use config::{ReportMode, VmConfig};
pub use error::{Result, VmError};
pub use exec::{Engine, Instance, Report, Status};
pub use io::{InputQueue, OutputStream, Subscription};
pub use memory::Memory;
pub use opcode::{Mode, Opcode};
pub use program::Program;
