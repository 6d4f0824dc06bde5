// ----------------------------
// File: src/interp/mod.rs
// ----------------------------
//! Interpreter for the emitted TAC: call frames over a global value map,
//! a positional argument-staging buffer, and a single-step execution
//! loop. `step.rs` holds the instruction dispatch.

mod frame;
mod step;
pub mod value;

pub use frame::Frame;
pub use value::Value;

use std::collections::HashMap;
use std::io::{self, Write};

use snafu::Snafu;

use crate::front::codegen::{Instruction, Op, LOCAL_BASE};
use crate::front::token::TokenKind;

#[derive(Debug, Snafu)]
pub enum RuntimeError {
    #[snafu(display("division by zero"))]
    DivisionByZero,

    #[snafu(display("modulo by zero"))]
    ModuloByZero,

    #[snafu(display("maximum steps exceeded"))]
    MaxStepsExceeded,

    #[snafu(display("unsupported immediate: {imm}"))]
    UnsupportedImmediate { imm: String },

    #[snafu(display("cannot convert {from} to {to}"))]
    Coercion { from: &'static str, to: &'static str },

    #[snafu(display("unknown function: {name}"))]
    UnknownFunction { name: String },

    #[snafu(display("unexpected operand: {operand}"))]
    UnexpectedOperand { operand: String },
}

pub struct Interpreter<'a> {
    pub(crate) pb: Vec<Instruction>,
    // instruction pointer for top-level execution (no frame active)
    ip: usize,
    pub(crate) globals: HashMap<usize, Value>,
    stack: Vec<Frame>,
    arg_buf: HashMap<usize, Value>,
    // program indices, built once on load
    labels: HashMap<usize, String>,
    func_index: HashMap<String, usize>,
    func_end: HashMap<usize, usize>,
    ret_types: HashMap<String, TokenKind>,
    pub(crate) out: Box<dyn Write + 'a>,
    max_steps: usize,
    steps: usize,
}

impl<'a> Interpreter<'a> {
    pub fn new(pb: &[Instruction]) -> Self {
        let mut it = Self {
            pb: pb.to_vec(),
            ip: 0,
            globals: HashMap::new(),
            stack: Vec::with_capacity(8),
            arg_buf: HashMap::new(),
            labels: HashMap::new(),
            func_index: HashMap::new(),
            func_end: HashMap::new(),
            ret_types: HashMap::new(),
            out: Box::new(io::stdout()),
            max_steps: 0,
            steps: 0,
        };
        it.index_program();
        it
    }

    pub fn with_writer(mut self, w: impl Write + 'a) -> Self {
        self.out = Box::new(w);
        self
    }

    /// Fail the run with `MaxStepsExceeded` after `n` steps; 0 means
    /// unlimited.
    pub fn with_max_steps(mut self, n: usize) -> Self {
        self.max_steps = n;
        self
    }

    /// Execute until halt or error.
    pub fn run(&mut self) -> Result<(), RuntimeError> {
        loop {
            if self.step()? {
                return Ok(());
            }
        }
    }

    /// Execute a single instruction; returns true once halted.
    pub fn step(&mut self) -> Result<bool, RuntimeError> {
        if self.max_steps > 0 && self.steps >= self.max_steps {
            return MaxStepsExceededSnafu.fail();
        }
        let halted = self.exec_step()?;
        self.steps += 1;
        Ok(halted)
    }

    /// Clear runtime state so the same program can run again.
    pub fn reset(&mut self) {
        self.ip = 0;
        self.globals.clear();
        self.stack.clear();
        self.arg_buf.clear();
        self.steps = 0;
    }

    pub fn program(&self) -> &[Instruction] {
        &self.pb
    }

    /// Label index: program counter of each `label` -> its name.
    pub fn labels(&self) -> &HashMap<usize, String> {
        &self.labels
    }

    /// Function name -> declared return type, from the indexing pass.
    pub fn return_types(&self) -> &HashMap<String, TokenKind> {
        &self.ret_types
    }

    pub(crate) fn pc(&self) -> usize {
        match self.stack.last() {
            Some(f) => f.ip,
            None => self.ip,
        }
    }

    pub(crate) fn set_pc(&mut self, pc: usize) {
        match self.stack.last_mut() {
            Some(f) => f.ip = pc,
            None => self.ip = pc,
        }
    }

    pub(crate) fn current_frame(&self) -> Option<&Frame> {
        self.stack.last()
    }

    pub(crate) fn current_frame_mut(&mut self) -> Option<&mut Frame> {
        self.stack.last_mut()
    }

    pub(crate) fn push_frame(&mut self, frame: Frame) {
        self.stack.push(frame);
    }

    pub(crate) fn pop_frame(&mut self) -> Option<Frame> {
        self.stack.pop()
    }

    /// Frame-aware write: addresses at or above `LOCAL_BASE` always land
    /// in the active frame; smaller addresses stay in the frame once
    /// first written there, otherwise they are globals.
    pub(crate) fn set_var(&mut self, addr: usize, v: Value) {
        if let Some(f) = self.stack.last_mut() {
            if addr >= LOCAL_BASE || f.locals.contains_key(&addr) {
                f.locals.insert(addr, v);
                return;
            }
        }
        self.globals.insert(addr, v);
    }

    pub(crate) fn get_var(&self, addr: usize) -> Option<Value> {
        if let Some(f) = self.stack.last() {
            if addr >= LOCAL_BASE {
                return f.locals.get(&addr).cloned();
            }
            if let Some(v) = f.locals.get(&addr) {
                return Some(v.clone());
            }
        }
        self.globals.get(&addr).cloned()
    }

    pub(crate) fn stage_arg(&mut self, pos: usize, v: Value) {
        self.arg_buf.insert(pos, v);
    }

    pub(crate) fn consume_arg(&mut self, pos: usize) -> Option<Value> {
        self.arg_buf.remove(&pos)
    }

    pub(crate) fn clear_args(&mut self) {
        self.arg_buf.clear();
    }

    pub(crate) fn func_start(&self, name: &str) -> Option<usize> {
        self.func_index.get(name).copied()
    }

    pub(crate) fn func_end_of(&self, label_pc: usize) -> Option<usize> {
        self.func_end.get(&label_pc).copied()
    }

    // record function labels, their body extents, and return types
    fn index_program(&mut self) {
        for (idx, ins) in self.pb.iter().enumerate() {
            if ins.op == Op::Label {
                if let Some(name) = ins.arg1.as_ref().and_then(|a| a.name()) {
                    if !name.is_empty() {
                        self.labels.insert(idx, name.to_string());
                        self.func_index.insert(name.to_string(), idx);
                    }
                }
            }
            if ins.op == Op::Call {
                if let Some(name) = ins.arg1.as_ref().and_then(|a| a.name()) {
                    self.ret_types.entry(name.to_string()).or_insert(ins.ty);
                }
            }
        }

        let mut current_label: Option<usize> = None;
        for (idx, ins) in self.pb.iter().enumerate() {
            match ins.op {
                Op::Label => current_label = Some(idx),
                Op::End => {
                    if let Some(label_pc) = current_label.take() {
                        self.func_end.insert(label_pc, idx - 1);
                    }
                }
                _ => {}
            }
        }
    }
}
