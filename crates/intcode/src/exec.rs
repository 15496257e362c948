use crate::config::{ReportMode, VmConfig};
use crate::decode::decode;
use crate::error::Result;
use crate::io::{InputQueue, OutputStream, Subscription};
use crate::memory::Memory;
use crate::opcode::Opcode;
use crate::program::Program;
use serde::Serialize;
use tracing::Instrument;

/// Lifecycle of an instance. Waiting on input is reported as `Running`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Status {
    Ready,
    Running,
    /// Stopped on opcode 99.
    Halted,
    /// Instruction pointer ran off the end of memory.
    Exhausted,
    Failed,
}

impl Status {
    pub fn is_terminal(self) -> bool {
        matches!(self, Status::Halted | Status::Exhausted | Status::Failed)
    }
}

/// Terminal payload, shaped by [`ReportMode`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(untagged)]
pub enum Report {
    Output(Vec<i64>),
    Memory(Vec<i64>),
    Both { memory: Vec<i64>, output: Vec<i64> },
}

impl Report {
    fn build(mode: ReportMode, memory: &Memory, output: &OutputStream) -> Self {
        match mode {
            ReportMode::Output => Report::Output(output.values()),
            ReportMode::Memory => Report::Memory(memory.cells().to_vec()),
            ReportMode::Both => Report::Both {
                memory: memory.cells().to_vec(),
                output: output.values(),
            },
        }
    }

    pub fn output(&self) -> Option<&[i64]> {
        match self {
            Report::Output(o) | Report::Both { output: o, .. } => Some(o),
            Report::Memory(_) => None,
        }
    }

    pub fn memory(&self) -> Option<&[i64]> {
        match self {
            Report::Memory(m) | Report::Both { memory: m, .. } => Some(m),
            Report::Output(_) => None,
        }
    }

    pub fn last_output(&self) -> Option<i64> {
        self.output().and_then(|o| o.last().copied())
    }

    pub fn to_json(&self) -> serde_json::Value {
        serde_json::to_value(self).unwrap_or(serde_json::Value::Null)
    }
}

enum Flow {
    Advance(usize),
    Jump(usize),
    Halt,
}

/// Register file and memory of one instance. Owned by exactly one
/// `Instance`; nothing outside its run loop touches it.
#[derive(Debug, Clone)]
pub struct Engine {
    memory: Memory,
    ip: usize,
    relative_base: i64,
    steps: u64,
}

impl Engine {
    pub(crate) fn new(memory: Memory) -> Self {
        Self {
            memory,
            ip: 0,
            relative_base: 0,
            steps: 0,
        }
    }

    pub fn memory(&self) -> &Memory {
        &self.memory
    }

    pub fn ip(&self) -> usize {
        self.ip
    }

    pub fn relative_base(&self) -> i64 {
        self.relative_base
    }

    pub fn steps(&self) -> u64 {
        self.steps
    }

    async fn step(&mut self, input: &InputQueue, output: &OutputStream) -> Result<Flow> {
        let (op, mut ops) = decode(&self.memory, self.ip, self.relative_base)?;
        tracing::trace!(ip = self.ip, ?op, "step");
        let mem = &mut self.memory;
        let flow = match op {
            Opcode::Halt => Flow::Halt,
            Opcode::Add | Opcode::Mul | Opcode::LessThan | Opcode::Equals => {
                let a = ops.read(mem)?;
                let b = ops.read(mem)?;
                let dst = ops.dest(mem)?;
                let r = match op {
                    Opcode::Add => a.saturating_add(b),
                    Opcode::Mul => a.saturating_mul(b),
                    Opcode::LessThan => i64::from(a < b),
                    _ => i64::from(a == b),
                };
                mem.write_signed(dst, r)?;
                Flow::Advance(ops.width())
            }
            Opcode::Read => {
                let dst = ops.dest(mem)?;
                let v = input.recv().await;
                mem.write_signed(dst, v)?;
                Flow::Advance(ops.width())
            }
            Opcode::Write => {
                let v = ops.read(mem)?;
                output.emit(v);
                Flow::Advance(ops.width())
            }
            Opcode::JumpIfTrue | Opcode::JumpIfFalse => {
                let cond = ops.read(mem)?;
                let target = ops.read(mem)?;
                if (cond != 0) == (op == Opcode::JumpIfTrue) {
                    Flow::Jump(ops.jump(target)?)
                } else {
                    Flow::Advance(ops.width())
                }
            }
            Opcode::AdjustRelativeBase => {
                let delta = ops.read(mem)?;
                self.relative_base = self.relative_base.saturating_add(delta);
                Flow::Advance(ops.width())
            }
        };
        Ok(flow)
    }

    /// Fetch/decode/execute until a terminal state. The only suspension
    /// point is a read on an empty input queue.
    async fn execute(&mut self, input: &InputQueue, output: &OutputStream) -> Result<Status> {
        loop {
            if self.ip >= self.memory.len() {
                return Ok(Status::Exhausted);
            }
            let flow = self.step(input, output).await?;
            self.steps += 1;
            match flow {
                Flow::Halt => return Ok(Status::Halted),
                Flow::Advance(width) => self.ip += width,
                Flow::Jump(target) => self.ip = target,
            }
        }
    }
}

/// One VM: engine plus its input queue and output stream.
///
/// An instance runs its program at most once. Calling [`Instance::run`]
/// after it terminated returns the stored terminal result without executing
/// anything.
pub struct Instance {
    label: String,
    program_cid: String,
    config: VmConfig,
    engine: Engine,
    input: InputQueue,
    output: OutputStream,
    status: Status,
    terminal: Option<Result<Report>>,
}

impl Instance {
    pub fn new(program: &Program, config: VmConfig) -> Self {
        let memory = Memory::from_program(program).with_limit(config.memory_limit);
        Self {
            label: "vm".into(),
            program_cid: program.cid(),
            config,
            engine: Engine::new(memory),
            input: InputQueue::new(),
            output: OutputStream::new(),
            status: Status::Ready,
            terminal: None,
        }
    }

    /// Parse `program_text` and build an instance reporting per `report`.
    pub fn create(program_text: &str, report: ReportMode) -> Result<Self> {
        let program = Program::parse(program_text)?;
        Ok(Self::new(&program, VmConfig::with_report(report)))
    }

    pub fn with_label(mut self, label: impl Into<String>) -> Self {
        self.label = label.into();
        self
    }

    pub fn label(&self) -> &str {
        &self.label
    }

    pub fn program_cid(&self) -> &str {
        &self.program_cid
    }

    pub fn config(&self) -> &VmConfig {
        &self.config
    }

    pub fn status(&self) -> Status {
        self.status
    }

    pub fn steps(&self) -> u64 {
        self.engine.steps()
    }

    pub fn engine(&self) -> &Engine {
        &self.engine
    }

    /// Queue values for the program, in order.
    pub fn supply_input(&self, values: &[i64]) {
        self.input.supply(values);
    }

    /// Producer handle onto this instance's input queue.
    pub fn input(&self) -> InputQueue {
        self.input.clone()
    }

    pub fn output(&self) -> &OutputStream {
        &self.output
    }

    pub fn last_output(&self) -> Option<i64> {
        self.output.last()
    }

    /// Call `callback(value, index)` for every value this instance emits.
    pub fn subscribe_output<F>(&self, callback: F) -> Subscription
    where
        F: FnMut(i64, usize) + Send + 'static,
    {
        self.output.subscribe(callback)
    }

    pub async fn run(&mut self) -> Result<Report> {
        if let Some(done) = &self.terminal {
            return done.clone();
        }
        self.status = Status::Running;
        let span = tracing::debug_span!(
            "instance",
            label = %self.label,
            program = %self.program_cid
        );
        let outcome = self
            .engine
            .execute(&self.input, &self.output)
            .instrument(span)
            .await;
        let result = match outcome {
            Ok(status) => {
                self.status = status;
                tracing::debug!(
                    label = %self.label,
                    ?status,
                    steps = self.engine.steps(),
                    outputs = self.output.len(),
                    "instance terminated"
                );
                Ok(Report::build(self.config.report, &self.engine.memory, &self.output))
            }
            Err(e) => {
                self.status = Status::Failed;
                tracing::debug!(
                    label = %self.label,
                    ip = self.engine.ip,
                    error = %e,
                    "instance failed"
                );
                Err(e)
            }
        };
        self.terminal = Some(result.clone());
        result
    }
}

impl std::fmt::Debug for Instance {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Instance")
            .field("label", &self.label)
            .field("status", &self.status)
            .field("ip", &self.engine.ip)
            .field("relative_base", &self.engine.relative_base)
            .field("steps", &self.engine.steps)
            .finish()
    }
}
