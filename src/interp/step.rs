// ----------------------------
// File: src/interp/step.rs
// ----------------------------
//! Single-instruction dispatch for the interpreter.

use std::io::Write as _;

use crate::front::codegen::{Op, Operand, LOCAL_BASE};
use crate::front::token::TokenKind;
use crate::interp::value::{parse_immediate, Value};
use crate::interp::{
    DivisionByZeroSnafu, Frame, Interpreter, ModuloByZeroSnafu, RuntimeError,
    UnexpectedOperandSnafu, UnknownFunctionSnafu,
};

use snafu::OptionExt;

// missing operands in address position read as 0, matching the loose
// typing of the instruction encoding
fn addr_of(op: &Option<Operand>) -> usize {
    op.as_ref().and_then(Operand::addr).unwrap_or(0)
}

impl<'a> Interpreter<'a> {
    /// Execute the instruction at the current PC; returns true on halt.
    pub(crate) fn exec_step(&mut self) -> Result<bool, RuntimeError> {
        let pc = self.pc();
        if pc >= self.pb.len() {
            return Ok(true);
        }

        let ins = self.pb[pc].clone();
        match ins.op {
            Op::Nop | Op::End | Op::Param => {
                self.set_pc(pc + 1);
            }

            Op::Label => {
                // at top level a label heads a function body: skip it
                if self.current_frame().is_none() {
                    match self.func_end_of(pc) {
                        Some(end) => self.set_pc(end + 1),
                        None => self.set_pc(pc + 1),
                    }
                } else {
                    self.set_pc(pc + 1);
                }
            }

            Op::Assign => {
                let dst = addr_of(&ins.arg3);
                let val = self.load_operand(&ins.arg1, ins.ty)?;
                self.set_var(dst, val);
                self.set_pc(pc + 1);
            }

            Op::Add | Op::Sub | Op::Mul | Op::Div | Op::Mod | Op::And | Op::Or
            | Op::Eq | Op::Ne | Op::Lt | Op::Le | Op::Gt | Op::Ge => {
                let dst = addr_of(&ins.arg3);
                let v1 = self.load_operand(&ins.arg1, ins.ty)?;
                let v2 = self.load_operand(&ins.arg2, ins.ty)?;
                let res = eval_binary(ins.op, &v1, &v2, ins.ty)?;
                self.set_var(dst, res);
                self.set_pc(pc + 1);
            }

            Op::Not => {
                let dst = addr_of(&ins.arg3);
                let v = self.load_operand(&ins.arg1, ins.ty)?;
                let b = v.as_bool()?;
                self.set_var(dst, Value::Bool(!b));
                self.set_pc(pc + 1);
            }

            Op::Print => {
                let v = self.load_operand(&ins.arg1, ins.ty)?;
                match v {
                    Value::Float(x) => {
                        let _ = writeln!(self.out, "{x:.20}");
                    }
                    Value::Int(x) => {
                        let _ = writeln!(self.out, "{x}");
                    }
                    Value::Bool(b) => {
                        let _ = writeln!(self.out, "{}", if b { "true" } else { "false" });
                    }
                    Value::Str(s) => {
                        let _ = writeln!(self.out, "{s}");
                    }
                    Value::Unknown => {
                        let _ = writeln!(self.out, "<nil>");
                    }
                }
                self.set_pc(pc + 1);
            }

            Op::Arg => {
                let pos = addr_of(&ins.arg2);
                let val = self.load_operand(&ins.arg1, ins.ty)?;
                self.stage_arg(pos, val);
                self.set_pc(pc + 1);
            }

            Op::Call => {
                let name = ins
                    .arg1
                    .as_ref()
                    .and_then(|a| a.name())
                    .map(str::to_string)
                    .unwrap_or_default();
                let arg_count = addr_of(&ins.arg2);
                let ret_temp = ins.arg3.as_ref().and_then(Operand::addr);

                let start = self.func_start(&name).context(UnknownFunctionSnafu { name: name.clone() })?;

                let mut frame = Frame {
                    func_name: name,
                    ip: start + 1,
                    locals: Default::default(),
                    return_to: pc + 1,
                    ret_temp,
                };
                // staged arguments become parameter slots; missing
                // positions default to integer zero
                for p in 0..arg_count {
                    let v = self.consume_arg(p).unwrap_or(Value::Int(0));
                    frame.locals.insert(LOCAL_BASE + p, v);
                }
                self.clear_args();
                self.push_frame(frame);
            }

            Op::Ret => {
                let ret_val = match &ins.arg1 {
                    Some(_) => self.load_operand(&ins.arg1, ins.ty)?,
                    None => Value::Unknown,
                };
                match self.pop_frame() {
                    Some(done) => {
                        if let Some(rt) = done.ret_temp {
                            // the return temp lives in the caller's scope
                            match self.current_frame_mut() {
                                Some(caller) => {
                                    caller.locals.insert(rt, ret_val);
                                }
                                None => {
                                    self.globals.insert(rt, ret_val);
                                }
                            }
                        }
                        self.set_pc(done.return_to);
                    }
                    // top-level ret halts the program
                    None => return Ok(true),
                }
            }

            Op::Jmp => {
                self.set_pc(addr_of(&ins.arg3));
            }

            Op::Jmpf | Op::Jmpt => {
                let cond = self.get_var(addr_of(&ins.arg1)).unwrap_or_default();
                let b = cond.as_bool()?;
                let jump = if ins.op == Op::Jmpf { !b } else { b };
                if jump {
                    self.set_pc(addr_of(&ins.arg3));
                } else {
                    self.set_pc(pc + 1);
                }
            }
        }

        Ok(false)
    }

    /// Resolve an operand to a value: immediates decode by shape,
    /// addresses read through the scoping rule with default
    /// initialization per the type hint.
    fn load_operand(&self, op: &Option<Operand>, hint: TokenKind) -> Result<Value, RuntimeError> {
        match op {
            Some(Operand::Imm(s)) => parse_immediate(s),
            Some(Operand::Addr(a)) => match self.get_var(*a) {
                Some(v) => Ok(v),
                None => Ok(match hint {
                    TokenKind::Float => Value::Float(0.0),
                    TokenKind::Int | TokenKind::Bool => Value::Int(0),
                    TokenKind::StrLit => Value::Str(String::new()),
                    _ => Value::Unknown,
                }),
            },
            Some(Operand::Name(s)) => UnexpectedOperandSnafu { operand: s.clone() }.fail(),
            None => Ok(Value::Unknown),
        }
    }
}

/// Evaluate a binary operation. The float path is taken when the type
/// hint says float or either operand already is one; comparisons follow
/// the same rule and logical operations coerce through bool.
fn eval_binary(op: Op, a: &Value, b: &Value, hint: TokenKind) -> Result<Value, RuntimeError> {
    match op {
        Op::Add | Op::Sub | Op::Mul | Op::Div | Op::Mod => {
            let use_float = hint == TokenKind::Float || a.is_float() || b.is_float();
            if use_float {
                let (x, y) = (a.as_f64()?, b.as_f64()?);
                Ok(Value::Float(match op {
                    Op::Add => x + y,
                    Op::Sub => x - y,
                    Op::Mul => x * y,
                    // IEEE semantics: infinities and NaN, no trapping
                    Op::Div => x / y,
                    _ => x % y,
                }))
            } else {
                let (x, y) = (a.as_i64()?, b.as_i64()?);
                Ok(Value::Int(match op {
                    Op::Add => x.wrapping_add(y),
                    Op::Sub => x.wrapping_sub(y),
                    Op::Mul => x.wrapping_mul(y),
                    Op::Div => {
                        if y == 0 {
                            return DivisionByZeroSnafu.fail();
                        }
                        x.wrapping_div(y)
                    }
                    _ => {
                        if y == 0 {
                            return ModuloByZeroSnafu.fail();
                        }
                        x.wrapping_rem(y)
                    }
                }))
            }
        }

        Op::And | Op::Or => {
            let (x, y) = (a.as_bool()?, b.as_bool()?);
            Ok(Value::Bool(if op == Op::And { x && y } else { x || y }))
        }

        Op::Eq | Op::Ne | Op::Lt | Op::Le | Op::Gt | Op::Ge => {
            let use_float = hint == TokenKind::Float || a.is_float() || b.is_float();
            let res = if use_float {
                let (x, y) = (a.as_f64()?, b.as_f64()?);
                match op {
                    Op::Eq => x == y,
                    Op::Ne => x != y,
                    Op::Lt => x < y,
                    Op::Le => x <= y,
                    Op::Gt => x > y,
                    _ => x >= y,
                }
            } else {
                let (x, y) = (a.as_i64()?, b.as_i64()?);
                match op {
                    Op::Eq => x == y,
                    Op::Ne => x != y,
                    Op::Lt => x < y,
                    Op::Le => x <= y,
                    Op::Gt => x > y,
                    _ => x >= y,
                }
            };
            Ok(Value::Bool(res))
        }

        _ => UnexpectedOperandSnafu { operand: op.to_string() }.fail(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::front::codegen::Instruction as I;
    use crate::front::token::TokenKind as K;
    use crate::interp::Interpreter;

    fn run_capture(pb: &[I]) -> Result<String, RuntimeError> {
        let mut buf = Vec::new();
        {
            let mut it = Interpreter::new(pb).with_writer(&mut buf);
            it.run()?;
        }
        Ok(String::from_utf8(buf).expect("utf8 output"))
    }

    #[test]
    fn assign_and_print() {
        let pb = vec![
            I::assign(Operand::Imm("#2".into()), 400, K::Int),
            I::print(400, K::Int),
        ];
        assert_eq!(run_capture(&pb).expect("run"), "2\n");
    }

    #[test]
    fn integer_division_by_zero_fails() {
        let pb = vec![
            I::assign(Operand::Imm("#1".into()), 600, K::Int),
            I::assign(Operand::Imm("#0".into()), 601, K::Int),
            I::binary(Op::Div, 600, 601, 602, K::Int),
        ];
        let err = run_capture(&pb).expect_err("division must fail");
        assert_eq!(err.to_string(), "division by zero");
    }

    #[test]
    fn modulo_by_zero_fails() {
        let pb = vec![
            I::assign(Operand::Imm("#1".into()), 600, K::Int),
            I::assign(Operand::Imm("#0".into()), 601, K::Int),
            I::binary(Op::Mod, 600, 601, 602, K::Int),
        ];
        let err = run_capture(&pb).expect_err("modulo must fail");
        assert_eq!(err.to_string(), "modulo by zero");
    }

    #[test]
    fn float_division_by_zero_is_infinite() {
        let pb = vec![
            I::assign(Operand::Imm("#1.0".into()), 600, K::Float),
            I::assign(Operand::Imm("#0.0".into()), 601, K::Float),
            I::binary(Op::Div, 600, 601, 602, K::Float),
            I::print(602, K::Float),
        ];
        let out = run_capture(&pb).expect("run");
        assert!(out.starts_with("inf"), "got {out}");
    }

    #[test]
    fn floats_print_with_twenty_fraction_digits() {
        let pb = vec![
            I::assign(Operand::Imm("#3.75".into()), 600, K::Float),
            I::print(600, K::Float),
        ];
        assert_eq!(run_capture(&pb).expect("run"), "3.75000000000000000000\n");
    }

    #[test]
    fn missing_reads_default_by_type_hint() {
        let pb = vec![
            I::binary(Op::Add, 600, 601, 602, K::Int),
            I::print(602, K::Int),
        ];
        assert_eq!(run_capture(&pb).expect("run"), "0\n");
    }

    #[test]
    fn not_flips_booleans() {
        let pb = vec![
            I::assign(Operand::Imm("#true".into()), 600, K::Bool),
            I::not(600, 601),
            I::print(601, K::Bool),
        ];
        assert_eq!(run_capture(&pb).expect("run"), "false\n");
    }

    #[test]
    fn max_steps_limit_aborts() {
        // 0: jmp 0, spinning until the limit trips
        let pb = vec![I::jmp(0)];
        let mut buf = Vec::new();
        let mut it = Interpreter::new(&pb).with_writer(&mut buf).with_max_steps(100);
        let err = it.run().expect_err("limit must trip");
        assert_eq!(err.to_string(), "maximum steps exceeded");
    }

    #[test]
    fn out_of_order_arg_staging_is_tolerated() {
        // stage position 1 before position 0, then call
        let pb = vec![
            I::label("snd"),
            I::param(800, 0, K::Int),
            I::param(801, 1, K::Int),
            I::ret(Some(801), K::Int),
            I::end(),
            I::assign(Operand::Imm("#5".into()), 600, K::Int),
            I::assign(Operand::Imm("#9".into()), 601, K::Int),
            I::arg(601, 1, K::Int),
            I::arg(600, 0, K::Int),
            I::call("snd", 2, 602, K::Int),
            I::print(602, K::Int),
        ];
        assert_eq!(run_capture(&pb).expect("run"), "9\n");
    }

    #[test]
    fn indexing_records_function_labels_and_return_types() {
        let pb = vec![
            I::label("f"),
            I::ret(None, K::Eof),
            I::end(),
            I::call("f", 0, 600, K::Int),
        ];
        let it = Interpreter::new(&pb);
        assert_eq!(it.labels().get(&0).map(String::as_str), Some("f"));
        assert_eq!(it.return_types().get("f"), Some(&K::Int));
    }

    #[test]
    fn calling_an_unknown_function_errors() {
        let pb = vec![I::call("ghost", 0, 600, K::Int)];
        let err = run_capture(&pb).expect_err("unknown function");
        assert_eq!(err.to_string(), "unknown function: ghost");
    }

    #[test]
    fn wrapping_integer_arithmetic_matches_i64() {
        let pb = vec![
            I::assign(Operand::Imm(format!("#{}", i64::MAX)), 600, K::Int),
            I::assign(Operand::Imm("#1".into()), 601, K::Int),
            I::binary(Op::Add, 600, 601, 602, K::Int),
            I::print(602, K::Int),
        ];
        assert_eq!(run_capture(&pb).expect("run"), format!("{}\n", i64::MAX.wrapping_add(1)));
    }
}
