// ----------------------------
// File: src/interp/frame.rs
// ----------------------------

use std::collections::HashMap;

use crate::interp::value::Value;

/// A function call frame.
pub struct Frame {
    pub func_name: String,
    /// Instruction pointer for this frame (index into the program block).
    pub ip: usize,
    /// Local bindings, address -> value.
    pub locals: HashMap<usize, Value>,
    /// Where the caller resumes after the return value lands.
    pub return_to: usize,
    /// Caller-side address receiving the return value.
    pub ret_temp: Option<usize>,
}
