// ----------------------------
// File: src/back/arm64_macos.rs
// ----------------------------
//! Textual AArch64 assembly emission for macOS (Mach-O, Apple clang
//! toolchain). Every value lives in a 16-byte stack slot: the top-level
//! frame holds the global addresses, each function frame holds its
//! parameters first and locals after them. Floats travel through d0/d1
//! with `scvtf` conversions; printing goes through `printf`.

use std::collections::HashMap;
use std::fmt::Write as _;
use std::fs;
use std::process::Command;

use snafu::ResultExt;

use crate::back::{Assembly, BuildError, InstallSnafu, ScratchSnafu, WriteAsmSnafu};
use crate::front::codegen::{Instruction, Op, Operand, LOCAL_BASE};
use crate::front::token::TokenKind;

pub struct Arm64Macos {
    pb: Vec<Instruction>,
    types: HashMap<usize, TokenKind>,
    output: String,

    text: String,
    cstring: String,
    data: String,

    global_offsets: HashMap<usize, usize>,
    func_locals: HashMap<String, HashMap<usize, usize>>,
    global_size: usize,
    local_sizes: HashMap<String, usize>,
    current_func: String,

    // per-function address types, so reused local address ranges do not
    // leak types across functions
    func_types: HashMap<String, HashMap<usize, TokenKind>>,

    str_counter: usize,
    pb_labels: HashMap<usize, String>,
    call_args: HashMap<usize, Vec<Instruction>>,
}

impl Arm64Macos {
    pub fn new(pb: &[Instruction], types: &HashMap<usize, TokenKind>, output: &str) -> Self {
        Self {
            pb: pb.to_vec(),
            types: types.clone(),
            output: output.to_string(),
            text: String::new(),
            cstring: String::new(),
            data: String::new(),
            global_offsets: HashMap::new(),
            func_locals: HashMap::new(),
            global_size: 0,
            local_sizes: HashMap::new(),
            current_func: String::new(),
            func_types: HashMap::new(),
            str_counter: 0,
            pb_labels: HashMap::new(),
            call_args: HashMap::new(),
        }
    }

    fn add_text(&mut self, line: &str) {
        self.text.push_str(line);
        self.text.push('\n');
    }

    fn add_cstring(&mut self, line: &str) {
        self.cstring.push_str(line);
        self.cstring.push('\n');
    }

    fn instruction_addresses(ins: &Instruction) -> Vec<usize> {
        [&ins.arg1, &ins.arg2, &ins.arg3]
            .into_iter()
            .filter_map(|a| a.as_ref().and_then(Operand::addr))
            .collect()
    }

    fn find_function_end(&self, label_idx: usize) -> Option<usize> {
        (label_idx + 1..self.pb.len()).find(|&i| self.pb[i].op == Op::End).map(|i| i - 1)
    }

    // Decide which addresses belong to the global frame and which to each
    // function frame, then hand out 16-byte slot offsets (parameters
    // first, locals after).
    fn collect_stack_layout(&mut self) {
        let mut global_addrs: Vec<usize> = Vec::new();
        let mut func_addrs: HashMap<String, Vec<usize>> = HashMap::new();
        let mut func_params: HashMap<String, Vec<usize>> = HashMap::new();

        let mut curr_func = String::new();
        let mut in_func = false;

        for ins in &self.pb.clone() {
            match ins.op {
                Op::Label => {
                    if let Some(name) = ins.arg1.as_ref().and_then(|a| a.name()) {
                        curr_func = name.to_string();
                        in_func = true;
                        func_addrs.entry(curr_func.clone()).or_default();
                    }
                }
                Op::Param => {
                    if let Some(addr) = ins.arg1.as_ref().and_then(Operand::addr) {
                        if in_func && !curr_func.is_empty() {
                            func_params.entry(curr_func.clone()).or_default().push(addr);
                            self.func_types.entry(curr_func.clone()).or_default().insert(addr, ins.ty);
                        } else {
                            global_addrs.push(addr);
                        }
                    }
                }
                Op::Ret => {
                    // a function may return more than once; stay in scope
                }
                Op::End => {
                    in_func = false;
                    curr_func.clear();
                }
                _ => {
                    for addr in Self::instruction_addresses(ins) {
                        if in_func && !curr_func.is_empty() {
                            func_addrs.entry(curr_func.clone()).or_default().push(addr);
                        } else {
                            global_addrs.push(addr);
                        }
                    }
                    if in_func && !curr_func.is_empty() && ins.ty != TokenKind::Eof {
                        if let Some(dst) = ins.arg3.as_ref().and_then(Operand::addr) {
                            self.func_types.entry(curr_func.clone()).or_default().insert(dst, ins.ty);
                        }
                    }
                }
            }
        }

        global_addrs.sort_unstable();
        global_addrs.dedup();
        let mut offset = 0;
        for addr in global_addrs {
            self.global_offsets.insert(addr, offset);
            offset += 16;
        }
        self.global_size = (offset + 15) / 16 * 16;

        for (fname, addrs) in &mut func_addrs {
            let mut params = func_params.get(fname).cloned().unwrap_or_default();
            params.sort_unstable();
            params.dedup();

            let slots = self.func_locals.entry(fname.clone()).or_default();
            for (i, addr) in params.iter().enumerate() {
                slots.insert(*addr, i * 16);
            }

            addrs.sort_unstable();
            addrs.dedup();
            let mut lo = params.len() * 16;
            for addr in addrs.iter() {
                if params.contains(addr) {
                    continue;
                }
                slots.insert(*addr, lo);
                lo += 16;
            }
            self.local_sizes.insert(fname.clone(), (lo + 15) / 16 * 16);
        }
    }

    // Jump targets get local labels, function labels get underscored
    // symbols, and each call collects its staged arguments by scanning
    // backwards over the preceding `arg` instructions.
    fn collect_labels_and_call_args(&mut self) {
        for (idx, ins) in self.pb.iter().enumerate() {
            match ins.op {
                Op::Jmp | Op::Jmpf | Op::Jmpt => {
                    if let Some(t) = ins.arg3.as_ref().and_then(Operand::addr) {
                        if t <= self.pb.len() {
                            self.pb_labels.entry(t).or_insert_with(|| format!("L{t}"));
                        }
                    }
                }
                Op::Label => {
                    if let Some(name) = ins.arg1.as_ref().and_then(|a| a.name()) {
                        self.pb_labels.insert(idx, format!("_{name}"));
                    }
                }
                _ => {}
            }
        }

        for idx in 0..self.pb.len() {
            if self.pb[idx].op != Op::Call {
                continue;
            }
            let arg_count = self.pb[idx].arg2.as_ref().and_then(Operand::addr).unwrap_or(0);
            let mut args = vec![Instruction::nop(); arg_count];
            for j in (0..idx).rev() {
                if arg_count == 0 || self.pb[j].op == Op::Call {
                    break;
                }
                if self.pb[j].op != Op::Arg {
                    continue;
                }
                if let Some(pos) = self.pb[j].arg2.as_ref().and_then(Operand::addr) {
                    if pos < arg_count {
                        args[pos] = self.pb[j].clone();
                    }
                }
            }
            self.call_args.insert(idx, args);
        }
    }

    fn addr_offset(&self, addr: usize, func: &str) -> usize {
        if !func.is_empty() {
            if let Some(off) = self.func_locals.get(func).and_then(|m| m.get(&addr)) {
                return *off;
            }
        }
        self.global_offsets.get(&addr).copied().unwrap_or(0)
    }

    fn var_type(&self, addr: usize, func: &str) -> TokenKind {
        if !func.is_empty() && addr >= LOCAL_BASE {
            if let Some(t) = self.func_types.get(func).and_then(|m| m.get(&addr)) {
                return *t;
            }
        }
        self.types.get(&addr).copied().unwrap_or(TokenKind::Eof)
    }

    fn is_op_float(&self, op: &Option<Operand>, func: &str) -> bool {
        match op {
            Some(Operand::Imm(s)) => {
                let val = &s[1..];
                val.contains('.')
                    || val.contains(['e', 'E'])
                    || (val.parse::<i64>().is_err() && val.parse::<f64>().is_ok())
            }
            Some(Operand::Addr(a)) => self.var_type(*a, func) == TokenKind::Float,
            _ => false,
        }
    }

    fn load_operand_to_reg(&mut self, reg: &str, op: &Option<Operand>, func: &str) {
        match op {
            Some(Operand::Imm(s)) => {
                let val = normalize_immediate(&s[1..]);
                self.add_text(&format!("\tmov\t{reg}, #{val}"));
            }
            Some(Operand::Addr(a)) => {
                let off = self.addr_offset(*a, func);
                self.add_text(&format!("\tldr\t{reg}, [SP, #{off}]"));
            }
            _ => self.add_text("\t// operand not loadable"),
        }
    }

    fn load_operand_to_fp_reg(&mut self, reg: &str, op: &Option<Operand>, ty: TokenKind, func: &str) {
        match op {
            Some(Operand::Imm(s)) => {
                let val = normalize_immediate(&s[1..]);
                if ty == TokenKind::Float || val.contains('.') || val.contains(['e', 'E']) {
                    let label = self.store_float_constant(&val);
                    self.add_text(&format!("\tadrp\tx9, {label}@PAGE"));
                    self.add_text(&format!("\tadd\tx9, x9, {label}@PAGEOFF"));
                    self.add_text(&format!("\tldr\t{reg}, [x9]"));
                } else {
                    self.add_text(&format!("\tmov\tx9, #{val}"));
                    self.add_text(&format!("\tscvtf\t{reg}, x9"));
                }
            }
            Some(Operand::Addr(a)) => {
                let off = self.addr_offset(*a, func);
                if self.var_type(*a, func) == TokenKind::Float || ty == TokenKind::Float {
                    self.add_text(&format!("\tldr\t{reg}, [SP, #{off}]"));
                } else {
                    self.add_text(&format!("\tldr\tx9, [SP, #{off}]"));
                    self.add_text(&format!("\tscvtf\t{reg}, x9"));
                }
            }
            _ => self.add_text("\t// operand not loadable into fp reg"),
        }
    }

    fn emit_assign(&mut self, ins: &Instruction, func: &str) {
        let dst = ins.arg3.as_ref().and_then(Operand::addr).unwrap_or(0);
        let dst_off = self.addr_offset(dst, func);

        let dst_is_float =
            ins.ty == TokenKind::Float || self.var_type(dst, func) == TokenKind::Float;

        if dst_is_float {
            self.load_operand_to_fp_reg("d0", &ins.arg1, ins.ty, func);
            self.add_text(&format!("\tstr\td0, [SP, #{dst_off}]"));
            return;
        }

        if let Some(Operand::Imm(s)) = &ins.arg1 {
            let val = normalize_immediate(&s[1..]);
            if val.starts_with('"') || ins.ty == TokenKind::StrLit {
                let label = self.store_cstring(&val);
                self.add_text(&format!("\tadrp\tX0, {label}@PAGE"));
                self.add_text(&format!("\tadd\tX0, X0, {label}@PAGEOFF"));
                self.add_text(&format!("\tstr\tX0, [SP, #{dst_off}]"));
                return;
            }
        }

        self.load_operand_to_reg("X0", &ins.arg1, func);
        self.add_text(&format!("\tstr\tX0, [SP, #{dst_off}]"));
    }

    fn emit_binary(&mut self, ins: &Instruction, func: &str) {
        let dst = ins.arg3.as_ref().and_then(Operand::addr).unwrap_or(0);
        let dst_off = self.addr_offset(dst, func);

        let use_float = ins.ty == TokenKind::Float
            || self.is_op_float(&ins.arg1, func)
            || self.is_op_float(&ins.arg2, func);

        if use_float {
            self.load_operand_to_fp_reg("d0", &ins.arg1, ins.ty, func);
            self.load_operand_to_fp_reg("d1", &ins.arg2, ins.ty, func);
            match ins.op {
                Op::Add => self.add_text("\tfadd\td0, d0, d1"),
                Op::Sub => self.add_text("\tfsub\td0, d0, d1"),
                Op::Mul => self.add_text("\tfmul\td0, d0, d1"),
                Op::Div => self.add_text("\tfdiv\td0, d0, d1"),
                Op::Mod => {
                    // no fp remainder instruction; lean on libm
                    self.add_text("\tbl\t_fmod");
                }
                Op::Eq | Op::Ne | Op::Lt | Op::Le | Op::Gt | Op::Ge => {
                    self.add_text("\tfcmp\td0, d1");
                    let cond = match ins.op {
                        Op::Eq => "eq",
                        Op::Ne => "ne",
                        Op::Lt => "lt",
                        Op::Le => "le",
                        Op::Gt => "gt",
                        _ => "ge",
                    };
                    self.add_text(&format!("\tcset\tX0, {cond}"));
                    self.add_text(&format!("\tstr\tX0, [SP, #{dst_off}]"));
                    return;
                }
                _ => self.add_text("\t// unhandled float op"),
            }
            self.add_text(&format!("\tstr\td0, [SP, #{dst_off}]"));
            return;
        }

        self.load_operand_to_reg("X0", &ins.arg1, func);
        self.load_operand_to_reg("X1", &ins.arg2, func);
        match ins.op {
            Op::Add => self.add_text("\tadd\tX0, X0, X1"),
            Op::Sub => self.add_text("\tsub\tX0, X0, X1"),
            Op::Mul => self.add_text("\tmul\tX0, X0, X1"),
            Op::Div => self.add_text("\tsdiv\tX0, X0, X1"),
            Op::Mod => {
                self.add_text("\tsdiv\tX2, X0, X1");
                self.add_text("\tmul\tX2, X2, X1");
                self.add_text("\tsub\tX0, X0, X2");
            }
            Op::And => self.add_text("\tand\tX0, X0, X1"),
            Op::Or => self.add_text("\torr\tX0, X0, X1"),
            Op::Eq | Op::Ne | Op::Lt | Op::Le | Op::Gt | Op::Ge => {
                self.add_text("\tcmp\tX0, X1");
                let cond = match ins.op {
                    Op::Eq => "eq",
                    Op::Ne => "ne",
                    Op::Lt => "lt",
                    Op::Le => "le",
                    Op::Gt => "gt",
                    _ => "ge",
                };
                self.add_text(&format!("\tcset\tX0, {cond}"));
            }
            _ => self.add_text("\t// unhandled binary op"),
        }
        self.add_text(&format!("\tstr\tX0, [SP, #{dst_off}]"));
    }

    fn emit_not(&mut self, ins: &Instruction, func: &str) {
        let dst = ins.arg3.as_ref().and_then(Operand::addr).unwrap_or(0);
        let dst_off = self.addr_offset(dst, func);
        self.load_operand_to_reg("X0", &ins.arg1, func);
        self.add_text("\tcmp\tX0, #0");
        self.add_text("\tcset\tX0, eq");
        self.add_text(&format!("\tstr\tX0, [SP, #{dst_off}]"));
    }

    fn emit_print(&mut self, ins: &Instruction, func: &str) {
        match &ins.arg1 {
            Some(Operand::Imm(s)) => {
                let val = normalize_immediate(&s[1..]);
                if val.starts_with('"') {
                    let label = self.store_cstring(&val);
                    self.add_text(&format!("\tadrp\tX0, {label}@PAGE"));
                    self.add_text(&format!("\tadd\tX0, X0, {label}@PAGEOFF"));
                    self.add_text("\tbl\t_puts");
                } else {
                    let fmt = self.ensure_printf_int_format();
                    self.add_text(&format!("\tadrp\tX0, {fmt}@PAGE"));
                    self.add_text(&format!("\tadd\tX0, X0, {fmt}@PAGEOFF"));
                    self.add_text(&format!("\tmov\tX1, #{val}"));
                    self.add_text("\tsub\tSP, SP, #64");
                    self.add_text("\tstr\tX1, [SP, #0]");
                    self.add_text("\tbl\t_printf");
                    self.add_text("\tadd\tSP, SP, #64");
                }
            }
            Some(Operand::Addr(a)) => {
                let off = self.addr_offset(*a, func);
                if self.var_type(*a, func) == TokenKind::Float {
                    let fmt = self.ensure_printf_float_format();
                    self.add_text(&format!("\tadrp\tX0, {fmt}@PAGE"));
                    self.add_text(&format!("\tadd\tX0, X0, {fmt}@PAGEOFF"));
                    self.add_text(&format!("\tldr\td0, [SP, #{off}]"));
                    self.add_text("\tsub\tSP, SP, #192");
                    self.add_text("\tstr\td0, [SP]");
                    self.add_text("\tbl\t_printf");
                    self.add_text("\tadd\tSP, SP, #192");
                } else {
                    let fmt = self.ensure_printf_int_format();
                    self.add_text(&format!("\tadrp\tX0, {fmt}@PAGE"));
                    self.add_text(&format!("\tadd\tX0, X0, {fmt}@PAGEOFF"));
                    self.add_text(&format!("\tldr\tX1, [SP, #{off}]"));
                    self.add_text("\tsub\tSP, SP, #64");
                    self.add_text("\tstr\tX1, [SP, #0]");
                    self.add_text("\tbl\t_printf");
                    self.add_text("\tadd\tSP, SP, #64");
                }
            }
            _ => self.add_text("\t// print: unsupported operand"),
        }
    }

    fn emit_call(&mut self, ins: &Instruction, idx: usize, func: &str) {
        let name = ins.arg1.as_ref().and_then(|a| a.name()).unwrap_or("").to_string();
        let args = self.call_args.get(&idx).cloned().unwrap_or_default();

        // x10 keeps the caller frame stable while the 192-byte
        // register-save / vararg area is live
        self.add_text("\tmov\tx10, SP");
        self.add_text("\tsub\tSP, SP, #192");

        for (index, arg) in args.iter().enumerate() {
            let is_float = arg.ty == TokenKind::Float || self.is_op_float(&arg.arg1, func);
            if is_float {
                match &arg.arg1 {
                    Some(Operand::Imm(s)) => {
                        let val = normalize_immediate(&s[1..]);
                        if val.contains('.') || val.contains(['e', 'E']) {
                            let label = self.store_float_constant(&val);
                            self.add_text(&format!("\tadrp\tx9, {label}@PAGE"));
                            self.add_text(&format!("\tadd\tx9, x9, {label}@PAGEOFF"));
                            self.add_text("\tldr\td0, [x9]");
                        } else {
                            self.add_text(&format!("\tmov\tx9, #{val}"));
                            self.add_text("\tscvtf\td0, x9");
                        }
                    }
                    Some(Operand::Addr(a)) => {
                        let off = self.addr_offset(*a, func);
                        if self.var_type(*a, func) == TokenKind::Float {
                            self.add_text(&format!("\tldr\td0, [x10, #{off}]"));
                        } else {
                            self.add_text(&format!("\tldr\tx9, [x10, #{off}]"));
                            self.add_text("\tscvtf\td0, x9");
                        }
                    }
                    _ => {
                        self.add_text("\tmov\tx9, #0");
                        self.add_text("\tscvtf\td0, x9");
                    }
                }
                self.add_text(&format!("\tstr\td0, [SP, #{}]", index * 16));
            } else {
                match &arg.arg1 {
                    Some(Operand::Imm(s)) => {
                        let val = normalize_immediate(&s[1..]);
                        self.add_text(&format!("\tmov\tx0, #{val}"));
                    }
                    Some(Operand::Addr(a)) => {
                        let off = self.addr_offset(*a, func);
                        self.add_text(&format!("\tldr\tx0, [x10, #{off}]"));
                    }
                    _ => self.add_text("\tmov\tx0, #0"),
                }
                self.add_text(&format!("\tstr\tx0, [SP, #{}]", index * 16));
            }
        }

        self.add_text(&format!("\tbl\t_{name}"));
        self.add_text("\tadd\tSP, SP, #192");

        if let Some(ret_addr) = ins.arg3.as_ref().and_then(Operand::addr) {
            let off = self.addr_offset(ret_addr, func);
            let ret_is_float =
                ins.ty == TokenKind::Float || self.var_type(ret_addr, func) == TokenKind::Float;
            if ret_is_float {
                self.add_text(&format!("\tstr\td0, [SP, #{off}]"));
            } else {
                self.add_text(&format!("\tstr\tX0, [SP, #{off}]"));
            }
        }
    }

    fn emit_jmp(&mut self, ins: &Instruction) {
        if let Some(t) = ins.arg3.as_ref().and_then(Operand::addr) {
            if let Some(label) = self.pb_labels.get(&t) {
                let label = label.clone();
                self.add_text(&format!("\tb\t{label}"));
                return;
            }
        }
        self.add_text("\t// jmp: invalid target");
    }

    fn emit_jmp_cond(&mut self, ins: &Instruction) {
        let cond = ins.arg1.as_ref().and_then(Operand::addr).unwrap_or(0);
        let target = ins.arg3.as_ref().and_then(Operand::addr).unwrap_or(0);
        let func = self.current_func.clone();
        let off = self.addr_offset(cond, &func);
        self.add_text(&format!("\tldr\tX0, [SP, #{off}]"));
        self.add_text("\tcmp\tX0, #0");
        if let Some(label) = self.pb_labels.get(&target) {
            let label = label.clone();
            match ins.op {
                Op::Jmpt => self.add_text(&format!("\tb.ne\t{label}")),
                _ => self.add_text(&format!("\tb.eq\t{label}")),
            }
            return;
        }
        self.add_text("\t// conditional jmp: invalid target");
    }

    fn emit_ret_value(&mut self, ins: &Instruction, func: &str) {
        match &ins.arg1 {
            Some(Operand::Imm(s)) => {
                let val = normalize_immediate(&s[1..]);
                self.add_text(&format!("\tmov\tX0, #{val}"));
            }
            Some(Operand::Addr(a)) => {
                let off = self.addr_offset(*a, func);
                if ins.ty == TokenKind::Float {
                    self.add_text(&format!("\tldr\td0, [SP, #{off}]"));
                } else {
                    self.add_text(&format!("\tldr\tX0, [SP, #{off}]"));
                }
            }
            _ => {}
        }
    }

    fn emit_functions(&mut self) {
        let mut idx = 0;
        while idx < self.pb.len() {
            if self.pb[idx].op != Op::Label {
                idx += 1;
                continue;
            }
            let name = match self.pb[idx].arg1.as_ref().and_then(|a| a.name()) {
                Some(n) if !n.is_empty() => n.to_string(),
                _ => {
                    idx += 1;
                    continue;
                }
            };
            let end_idx = match self.find_function_end(idx) {
                Some(e) => e,
                None => {
                    idx += 1;
                    continue;
                }
            };

            self.add_text("");
            self.add_text(&format!("_{name}:"));
            self.add_text("\tstp\tX29, X30, [SP, #-16]!");
            self.add_text("\tmov\tX29, SP");
            let size = self.local_sizes.get(&name).copied().unwrap_or(0);
            if size > 0 {
                self.add_text(&format!("\tsub\tSP, SP, #{size}"));
            }

            self.current_func = name.clone();
            for j in idx + 1..=end_idx {
                if self.pb[j].op == Op::End {
                    continue;
                }
                if let Some(label) = self.pb_labels.get(&j) {
                    let label = label.clone();
                    self.add_text(&format!("{label}:"));
                }

                let ins = self.pb[j].clone();
                match ins.op {
                    Op::Param => {
                        let addr = ins.arg1.as_ref().and_then(Operand::addr).unwrap_or(0);
                        let pos = ins.arg2.as_ref().and_then(Operand::addr).unwrap_or(0);
                        let off = self.addr_offset(addr, &name);
                        if pos <= 7 {
                            if ins.ty == TokenKind::Float {
                                self.add_text(&format!("\tldr\td0, [X29, #{}]", 16 + pos * 16));
                                self.add_text(&format!("\tstr\td0, [SP, #{off}]"));
                            } else {
                                self.add_text(&format!("\tldr\tx0, [X29, #{}]", 16 + pos * 16));
                                self.add_text(&format!("\tstr\tx0, [SP, #{off}]"));
                            }
                        } else {
                            self.add_text("\t// parameter position beyond register save area");
                        }
                    }
                    Op::Arg => {}
                    Op::Call => self.emit_call(&ins, j, &name),
                    Op::Assign => self.emit_assign(&ins, &name),
                    Op::Add | Op::Sub | Op::Mul | Op::Div | Op::Mod | Op::And | Op::Or
                    | Op::Eq | Op::Ne | Op::Lt | Op::Le | Op::Gt | Op::Ge => {
                        self.emit_binary(&ins, &name)
                    }
                    Op::Not => self.emit_not(&ins, &name),
                    Op::Print => self.emit_print(&ins, &name),
                    Op::Jmp => self.emit_jmp(&ins),
                    Op::Jmpf | Op::Jmpt => self.emit_jmp_cond(&ins),
                    Op::Ret => self.emit_ret_value(&ins, &name),
                    Op::Nop | Op::End | Op::Label => {}
                }
            }

            if size > 0 {
                self.add_text(&format!("\tadd\tSP, SP, #{size}"));
            }
            self.add_text("\tldp\tX29, X30, [SP], #16");
            self.add_text("\tret");

            self.current_func.clear();
            idx = end_idx + 1;
        }
    }

    fn emit_main(&mut self) {
        self.add_text("_main:");
        self.add_text("\tstp\tX29, X30, [SP, #-16]!");
        self.add_text("\tmov\tX29, SP");
        if self.global_size > 0 {
            self.add_text(&format!("\tsub\tSP, SP, #{}", self.global_size));
        }

        let mut idx = 0;
        while idx < self.pb.len() {
            if self.pb[idx].op == Op::Label {
                idx = self.find_function_end(idx).map(|e| e + 1).unwrap_or(idx + 1);
                continue;
            }
            if self.pb[idx].op == Op::End {
                idx += 1;
                continue;
            }

            if let Some(label) = self.pb_labels.get(&idx) {
                let label = label.clone();
                self.add_text(&format!("{label}:"));
            }

            let ins = self.pb[idx].clone();
            match ins.op {
                Op::Arg => {}
                Op::Call => self.emit_call(&ins, idx, ""),
                Op::Assign => self.emit_assign(&ins, ""),
                Op::Add | Op::Sub | Op::Mul | Op::Div | Op::Mod | Op::And | Op::Or
                | Op::Eq | Op::Ne | Op::Lt | Op::Le | Op::Gt | Op::Ge => self.emit_binary(&ins, ""),
                Op::Not => self.emit_not(&ins, ""),
                Op::Print => self.emit_print(&ins, ""),
                Op::Jmp => self.emit_jmp(&ins),
                Op::Jmpf | Op::Jmpt => self.emit_jmp_cond(&ins),
                Op::Ret => {
                    self.emit_ret_value(&ins, "");
                    if self.global_size > 0 {
                        self.add_text(&format!("\tadd\tSP, SP, #{}", self.global_size));
                    }
                    self.add_text("\tldp\tX29, X30, [SP], #16");
                    self.add_text("\tret");
                }
                Op::Param | Op::Nop | Op::End | Op::Label => {}
            }
            idx += 1;
        }

        // branches to the index just past the program land on the epilogue
        if let Some(label) = self.pb_labels.get(&self.pb.len()) {
            let label = label.clone();
            self.add_text(&format!("{label}:"));
        }
        if self.global_size > 0 {
            self.add_text(&format!("\tadd\tSP, SP, #{}", self.global_size));
        }
        self.add_text("\tldp\tX29, X30, [SP], #16");
        self.add_text("\tret");
    }

    fn store_cstring(&mut self, lit: &str) -> String {
        let val = lit.trim_matches('"');
        let label = format!("__dolme_str_{}", self.str_counter);
        self.str_counter += 1;
        let escaped = escape_string(val);
        self.add_cstring(&format!("{label}:"));
        self.add_cstring(&format!("\t.asciz\t\"{escaped}\""));
        label
    }

    fn store_float_constant(&mut self, lit: &str) -> String {
        let label = format!("__dolme_float_{}", self.str_counter);
        self.str_counter += 1;
        let _ = writeln!(self.data, "{label}:\n\t.double\t{lit}");
        label
    }

    fn ensure_printf_int_format(&mut self) -> String {
        let label = "__dolme_printf_int";
        if !self.cstring.contains(&format!("{label}:")) {
            self.add_cstring(&format!("{label}:"));
            self.add_cstring("\t.asciz\t\"%lld\\n\"");
        }
        label.to_string()
    }

    fn ensure_printf_float_format(&mut self) -> String {
        let label = "__dolme_printf_float";
        if !self.cstring.contains(&format!("{label}:")) {
            self.add_cstring(&format!("{label}:"));
            self.add_cstring("\t.asciz\t\"%.20lf\\n\"");
        }
        label.to_string()
    }
}

impl Assembly for Arm64Macos {
    fn generate(&mut self) -> Result<(), BuildError> {
        self.collect_stack_layout();
        self.collect_labels_and_call_args();

        self.add_text("\t.text");
        self.add_text("\t.globl _main");

        self.emit_functions();
        self.emit_main();

        Ok(())
    }

    fn code(&self) -> String {
        let mut out = String::new();
        out.push_str(&self.text);
        if !self.cstring.is_empty() {
            out.push_str("\n\t.section\t__TEXT,__cstring\n");
            out.push_str(&self.cstring);
        }
        if !self.data.is_empty() {
            out.push_str("\n\t.section\t__DATA,__const\n");
            out.push_str(&self.data);
        }
        out
    }

    fn build(&self) -> Result<(), BuildError> {
        // scratch directory is removed on every exit path
        let dir = tempfile::tempdir().context(ScratchSnafu)?;

        let asm_file = dir.path().join("program.s");
        fs::write(&asm_file, self.code()).context(WriteAsmSnafu)?;

        let obj_file = dir.path().join("program.o");
        let assembled = Command::new("as")
            .args(["-arch", "arm64", "-o"])
            .arg(&obj_file)
            .arg(&asm_file)
            .output()
            .map_err(|e| BuildError::Assemble { detail: e.to_string() })?;
        if !assembled.status.success() {
            return Err(BuildError::Assemble {
                detail: String::from_utf8_lossy(&assembled.stderr).into_owned(),
            });
        }

        let exe_file = dir.path().join("program");
        let linked = Command::new("clang")
            .args(["-arch", "arm64", "-o"])
            .arg(&exe_file)
            .arg(&obj_file)
            .output()
            .map_err(|e| BuildError::Link { detail: e.to_string() })?;
        if !linked.status.success() {
            return Err(BuildError::Link {
                detail: String::from_utf8_lossy(&linked.stderr).into_owned(),
            });
        }

        fs::copy(&exe_file, &self.output).context(InstallSnafu)?;
        Ok(())
    }
}

fn normalize_immediate(val: &str) -> String {
    match val {
        "true" => "1".to_string(),
        "false" => "0".to_string(),
        _ => val.to_string(),
    }
}

fn escape_string(s: &str) -> String {
    s.replace('\\', "\\\\").replace('"', "\\\"")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::compile;

    fn generate(src: &str) -> Arm64Macos {
        let c = compile(src);
        assert!(c.is_clean(), "compile errors for {src}");
        let mut a = Arm64Macos::new(&c.instructions, &c.types, "a.out");
        a.generate().expect("generate");
        a
    }

    #[test]
    fn globals_get_distinct_slots() {
        let a = generate("let x : int = 1; let y : int = 2;");
        let x = a.global_offsets.get(&400).copied().expect("x slot");
        let y = a.global_offsets.get(&401).copied().expect("y slot");
        assert_ne!(x, y);
        assert_eq!(a.global_size % 16, 0);
    }

    #[test]
    fn code_has_main_and_function_symbols() {
        let a = generate("func add(a: int, b: int) : int { return a + b; } let r : int = add(2, 3); print(r);");
        let code = a.code();
        assert!(code.contains("\t.globl _main"));
        assert!(code.contains("_add:"));
        assert!(code.contains("_main:"));
        assert!(code.contains("\tbl\t_add"));
        assert!(code.contains("\tbl\t_printf"));
    }

    #[test]
    fn jump_targets_become_local_labels() {
        let a = generate("let i : int = 0; while (i < 3) { i = i + 1; }");
        let code = a.code();
        assert!(code.contains("\tb\tL2"), "{code}");
        assert!(code.contains("\tb.eq\t"), "{code}");
    }

    #[test]
    fn float_constants_land_in_the_data_section() {
        let a = generate("let f : float = 1.5; print(f);");
        let code = a.code();
        assert!(code.contains("__DATA,__const"));
        assert!(code.contains("\t.double\t1.5"));
        assert!(code.contains("%.20lf"));
    }
}
