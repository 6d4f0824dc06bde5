// ----------------------------
// File: src/front/codegen/actions.rs
// ----------------------------
//! Semantic actions fired by the parser. Each action is a function of the
//! current token and the semantic stack, appending IR and/or reshaping
//! the stack. Backpatching works through slots reserved by `save`.

use crate::front::codegen::instruction::{Instruction, Op, Operand};
use crate::front::codegen::stack::Entry;
use crate::front::codegen::Codegen;
use crate::front::token::TokenKind;

/// The closed set of actions that may appear in production right-hand
/// sides. Dispatch is a `match`; an action missing here cannot be named
/// by the grammar at all.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Action {
    Label,
    LabelWhile,
    Save,
    SaveBreak,
    Jmp,
    JmpNonBackpatch,
    Jmpf,
    JmpfNormal,
    JmpfBreak,
    Add,
    Sub,
    Mul,
    Div,
    Mod,
    And,
    Or,
    Not,
    Rel,
    Push,
    Load,
    Assign,
    Define,
    Print,
    FuncStart,
    FuncEnd,
    FuncReturnType,
    Param,
    CallStart,
    CallEnd,
    Call,
    Arg,
    Return,
    Continue,
    CaptureDeclVar,
    CaptureParamName,
    CaptureType,
    CaptureAssignTarget,
    PushRelop,
}

impl Codegen {
    pub fn execute(&mut self, action: Action) {
        match action {
            Action::Label => self.label_action(),
            Action::LabelWhile => self.label_while_action(),
            Action::Save => self.save_action(),
            Action::SaveBreak => self.save_break_action(),
            Action::Jmp => self.jmp_action(),
            Action::JmpNonBackpatch => self.jmp_nonbackpatch_action(),
            Action::Jmpf => self.jmpf_action(),
            Action::JmpfNormal => self.jmpf_normal_action(),
            Action::JmpfBreak => self.jmpf_break_action(),
            Action::Add => self.binary_op_action(Op::Add),
            Action::Sub => self.binary_op_action(Op::Sub),
            Action::Mul => self.binary_op_action(Op::Mul),
            Action::Div => self.binary_op_action(Op::Div),
            Action::Mod => self.binary_op_action(Op::Mod),
            Action::And => self.binary_op_action(Op::And),
            Action::Or => self.binary_op_action(Op::Or),
            Action::Not => self.not_action(),
            Action::Rel => self.rel_action(),
            Action::Push => self.push_action(),
            Action::Load => self.load_action(),
            Action::Assign => self.assign_action(),
            Action::Define => self.define_action(),
            Action::Print => self.print_action(),
            Action::FuncStart => self.func_start_action(),
            Action::FuncEnd => self.func_end_action(),
            Action::FuncReturnType => self.func_return_type_action(),
            Action::Param => self.param_action(),
            Action::CallStart => self.call_start_action(),
            Action::CallEnd => self.call_end_action(),
            Action::Call => self.call_action(),
            Action::Arg => self.arg_action(),
            Action::Return => self.return_action(),
            Action::Continue => self.continue_action(),
            Action::CaptureDeclVar => self.capture_lexeme_action(),
            Action::CaptureParamName => self.capture_lexeme_action(),
            Action::CaptureType => self.capture_lexeme_action(),
            Action::CaptureAssignTarget => self.capture_assign_target_action(),
            Action::PushRelop => self.capture_lexeme_action(),
        }
    }

    fn addr_at(&self, offset: usize) -> Option<usize> {
        self.ss.peek_at(offset).and_then(Entry::as_addr)
    }

    fn name_at(&self, offset: usize) -> Option<String> {
        self.ss.peek_at(offset).and_then(|e| e.as_name().map(str::to_string))
    }

    fn emit(&mut self, ins: Instruction) {
        self.pb.push(ins);
        self.i += 1;
    }

    // --- control flow ---

    fn label_action(&mut self) {
        self.ss.push(Entry::Addr(self.i));
    }

    fn label_while_action(&mut self) {
        self.ss.push(Entry::WhileMark(self.i));
    }

    // reserve a slot for later backpatching
    fn save_action(&mut self) {
        let slot = self.i;
        self.emit(Instruction::nop());
        self.ss.push(Entry::Addr(slot));
    }

    fn save_break_action(&mut self) {
        let slot = self.i;
        self.emit(Instruction::nop());
        self.ss.push(Entry::BreakMark(slot));
    }

    // patch the reserved slot on top to jump to the current position
    fn jmp_action(&mut self) {
        if let Some(entry) = self.ss.pop() {
            if let Some(location) = entry.as_addr() {
                if location < self.pb.len() {
                    self.pb[location] = Instruction::jmp(self.i);
                }
            }
        }
    }

    // append an unconditional jump to the target on top of the stack;
    // loop marks carry the loop-head index
    fn jmp_nonbackpatch_action(&mut self) {
        let Some(entry) = self.ss.pop() else { return };
        let target = match entry {
            Entry::Addr(n) | Entry::WhileMark(n) | Entry::BreakMark(n) => n,
            Entry::Name(_) => return,
        };
        self.emit(Instruction::jmp(target));
    }

    // patch [slot, condition] on top to a jmpf skipping the next slot
    fn jmpf_action(&mut self) {
        if self.ss.len() >= 2 {
            let (Some(location), Some(condition)) = (self.addr_at(0), self.addr_at(1)) else {
                return;
            };
            if location < self.pb.len() {
                self.pb[location] = Instruction::jmpf(condition, self.i + 1);
            }
            self.ss.pop_n(2);
        }
    }

    // like jmpf but targets the current position and tolerates loop marks
    // sitting above the reserved slot
    fn jmpf_normal_action(&mut self) {
        let mut j = 0;
        while self.ss.len() >= 2 {
            match self.ss.peek_at(j) {
                Some(e) if e.is_mark() => {
                    j += 1;
                    continue;
                }
                Some(_) => {}
                None => break,
            }
            let (Some(location), Some(condition)) = (
                self.ss.peek_at(j).and_then(Entry::as_addr),
                self.ss.peek_at(j + 1).and_then(Entry::as_addr),
            ) else {
                break;
            };
            if location < self.pb.len() {
                self.pb[location] = Instruction::jmpf(condition, self.i);
            }
            self.ss.erase_at(j);
            self.ss.erase_at(j);
            break;
        }
    }

    // patch every pending break slot past the loop, then the exit slot
    fn jmpf_break_action(&mut self) {
        while let Some(Entry::BreakMark(slot)) = self.ss.peek() {
            let slot = *slot;
            if slot < self.pb.len() {
                self.pb[slot] = Instruction::jmp(self.i + 1);
            }
            self.ss.pop();
        }
        self.jmpf_action();
    }

    fn continue_action(&mut self) {
        let mut j = 0;
        while let Some(entry) = self.ss.peek_at(j) {
            if let Entry::WhileMark(head) = entry {
                let head = *head;
                self.emit(Instruction::jmp(head));
                return;
            }
            j += 1;
        }
        let pos = self.current.pos;
        self.add_loop_control_outside_loop("Continue", pos);
    }

    // --- expressions ---

    fn binary_op_action(&mut self, op: Op) {
        if self.ss.len() >= 2 {
            let (Some(rhs), Some(lhs)) = (self.addr_at(0), self.addr_at(1)) else {
                return;
            };
            let ty = if matches!(op, Op::And | Op::Or) {
                TokenKind::Bool
            } else if self.type_of(lhs) == TokenKind::Int && self.type_of(rhs) == TokenKind::Int {
                TokenKind::Int
            } else {
                TokenKind::Float
            };
            let t = self.new_temp();
            self.set_type(t, ty);
            self.emit(Instruction::binary(op, lhs, rhs, t, ty));
            self.ss.pop_n(2);
            self.ss.push(Entry::Addr(t));
        }
    }

    fn not_action(&mut self) {
        if self.ss.len() >= 1 {
            let Some(src) = self.addr_at(0) else { return };
            let t = self.new_temp();
            self.emit(Instruction::not(src, t));
            self.ss.pop_n(1);
            self.ss.push(Entry::Addr(t));
        }
    }

    fn rel_action(&mut self) {
        if self.ss.len() >= 3 {
            let (Some(rhs), Some(op_str), Some(lhs)) =
                (self.addr_at(0), self.name_at(1), self.addr_at(2))
            else {
                return;
            };
            let rel_op = match op_str.as_str() {
                "<" => Op::Lt,
                ">" => Op::Gt,
                "<=" => Op::Le,
                ">=" => Op::Ge,
                "==" => Op::Eq,
                "!=" => Op::Ne,
                _ => Op::Eq,
            };
            // the instruction carries the operand numeric kind; the result
            // itself is boolean
            let operand_ty = if self.type_of(lhs) == TokenKind::Int && self.type_of(rhs) == TokenKind::Int {
                TokenKind::Int
            } else {
                TokenKind::Float
            };
            let t = self.new_temp();
            self.set_type(t, TokenKind::Bool);
            self.emit(Instruction::binary(rel_op, lhs, rhs, t, operand_ty));
            self.ss.pop_n(3);
            self.ss.push(Entry::Addr(t));
        }
    }

    // materialize a literal into a fresh temp
    fn push_action(&mut self) {
        let value = match self.current.kind {
            TokenKind::True => "#true".to_string(),
            TokenKind::False => "#false".to_string(),
            _ => format!("#{}", self.current.lexeme),
        };

        let body = &value[1..];
        let ty = if body == "true" || body == "false" {
            TokenKind::Bool
        } else if body.contains('.') {
            TokenKind::Float
        } else if body.parse::<i64>().is_ok() {
            TokenKind::Int
        } else if body.parse::<f64>().is_ok() {
            TokenKind::Float
        } else if self.current.kind == TokenKind::StrLit {
            TokenKind::StrLit
        } else {
            TokenKind::Eof
        };

        let t = self.new_temp();
        self.set_type(t, ty);
        self.emit(Instruction::assign(Operand::Imm(value), t, ty));
        self.ss.push(Entry::Addr(t));
    }

    fn load_action(&mut self) {
        let name = self.current.lexeme.clone();
        match self.address_of(&name) {
            Some(addr) => self.ss.push(Entry::Addr(addr)),
            None => {
                let pos = self.current.pos;
                self.add_undefined_variable(&name, pos);
            }
        }
    }

    // --- statements ---

    fn assign_action(&mut self) {
        if self.ss.len() >= 2 {
            let (Some(value), Some(target)) = (self.addr_at(0), self.addr_at(1)) else {
                return;
            };
            if self.type_of(value) != self.type_of(target) {
                let (expected, found) = (self.type_of(target), self.type_of(value));
                let pos = self.current.pos;
                self.add_type_mismatch(expected, found, pos);
                return;
            }
            let ty = self.type_of(value);
            self.emit(Instruction::assign(Operand::Addr(value), target, ty));
            // value, target, and the target-name bookkeeping entry
            self.ss.pop_n(3);
        }
    }

    fn define_action(&mut self) {
        if self.ss.len() >= 3 {
            let (Some(value), Some(var_name)) = (self.addr_at(0), self.name_at(2)) else {
                return;
            };
            if self.is_declared(&var_name) {
                let pos = self.current.pos;
                self.add_redeclaration(&var_name, pos);
            }
            let var_addr = self.new_variable();
            self.declare(&var_name, var_addr);
            let ty = self.type_of(value);
            self.set_type(var_addr, ty);
            self.emit(Instruction::assign(Operand::Addr(value), var_addr, ty));
            self.ss.pop_n(3);
        }
    }

    fn print_action(&mut self) {
        if self.ss.len() >= 1 {
            let Some(src) = self.addr_at(0) else { return };
            let ty = self.type_of(src);
            self.emit(Instruction::print(src, ty));
            self.ss.pop_n(1);
        }
    }

    // --- functions ---

    fn func_start_action(&mut self) {
        let name = self.current.lexeme.clone();
        self.emit(Instruction::label(name.clone()));
        self.set_in_function(true);
        self.ss.push(Entry::Name(name));
    }

    fn func_return_type_action(&mut self) {
        if self.ss.len() >= 1 {
            let Some(name) = self.name_at(0) else { return };
            self.function_returns.insert(name, self.current.kind);
            self.ss.pop_n(1);
        }
    }

    fn func_end_action(&mut self) {
        if self.pb.last().map(|ins| ins.op) != Some(Op::Ret) {
            self.emit(Instruction::ret(None, TokenKind::Eof));
            self.param_counter = 0;
        }
        self.set_in_function(false);
        self.emit(Instruction::end());
    }

    fn param_action(&mut self) {
        if self.ss.len() >= 2 {
            let (Some(type_name), Some(param_name)) = (self.name_at(0), self.name_at(1)) else {
                return;
            };
            let addr = self.new_local();
            self.declare(&param_name, addr);
            let ty = TokenKind::from_keyword(&type_name).unwrap_or(TokenKind::Eof);
            self.set_type(addr, ty);
            let pos = self.param_counter;
            self.emit(Instruction::param(addr, pos, ty));
            self.param_counter += 1;
            self.ss.pop_n(2);
        }
    }

    fn call_start_action(&mut self) {
        self.ss.push(Entry::Name(self.current.lexeme.clone()));
    }

    fn call_end_action(&mut self) {
        if self.ss.len() >= 1 {
            let Some(name) = self.name_at(0) else { return };
            let ret_temp = self.new_temp();
            if !self.function_returns.contains_key(&name) {
                let pos = self.current.pos;
                self.add_undefined_function(&name, pos);
            }
            let ret = self.function_returns.get(&name).copied().unwrap_or(TokenKind::Eof);
            self.set_type(ret_temp, ret);
            let argc = self.args_counter;
            self.emit(Instruction::call(name, argc, ret_temp, ret));
            self.args_counter = 0;
            self.ss.pop_n(1);
            self.ss.push(Entry::Addr(ret_temp));
        }
    }

    // statement-form call: the capture action left [name, placeholder]
    // beneath the (already consumed) arguments; nothing reads the result,
    // so the return temp is not pushed
    fn call_action(&mut self) {
        if self.ss.len() >= 2 {
            let Some(name) = self.name_at(1) else { return };
            if !self.function_returns.contains_key(&name) {
                let pos = self.current.pos;
                self.add_undefined_function(&name, pos);
            }
            let ret = self.function_returns.get(&name).copied().unwrap_or(TokenKind::Eof);
            let ret_temp = self.new_temp();
            self.set_type(ret_temp, ret);
            let argc = self.args_counter;
            self.emit(Instruction::call(name, argc, ret_temp, ret));
            self.args_counter = 0;
            self.ss.pop_n(2);
        }
    }

    fn arg_action(&mut self) {
        if self.ss.len() >= 1 {
            let Some(src) = self.addr_at(0) else { return };
            let ty = self.type_of(src);
            let pos = self.args_counter;
            self.emit(Instruction::arg(src, pos, ty));
            self.args_counter += 1;
            self.ss.pop_n(1);
        }
    }

    fn return_action(&mut self) {
        if let Some(value) = self.addr_at(0) {
            let ty = self.type_of(value);
            self.emit(Instruction::ret(Some(value), ty));
            self.ss.pop_n(1);
        } else {
            self.emit(Instruction::ret(None, TokenKind::Eof));
        }
        self.param_counter = 0;
    }

    // --- captures ---

    fn capture_lexeme_action(&mut self) {
        self.ss.push(Entry::Name(self.current.lexeme.clone()));
    }

    // assignment targets double as statement-call callees, so record the
    // name beneath the resolved address; declared functions get a
    // placeholder address and no diagnostic
    fn capture_assign_target_action(&mut self) {
        let name = self.current.lexeme.clone();
        self.ss.push(Entry::Name(name.clone()));
        match self.address_of(&name) {
            Some(addr) => self.ss.push(Entry::Addr(addr)),
            None => {
                if !self.function_returns.contains_key(&name) {
                    let pos = self.current.pos;
                    self.add_undefined_variable(&name, pos);
                }
                self.ss.push(Entry::Addr(0));
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::front::token::{Position, Token};

    fn tok(kind: TokenKind, lexeme: &str) -> Token {
        Token::new(kind, lexeme, lexeme, Position::new(1, 1, 0))
    }

    #[test]
    fn save_then_jmp_backpatches_the_reserved_slot() {
        let mut cg = Codegen::new();
        cg.execute(Action::Save);
        assert_eq!(cg.program()[0].op, Op::Nop);
        // emit something in between
        cg.set_current_token(tok(TokenKind::Num, "1"));
        cg.execute(Action::Push);
        cg.ss.pop();
        cg.execute(Action::Jmp);
        assert_eq!(cg.program()[0], Instruction::jmp(2));
    }

    #[test]
    fn push_action_types_literals_by_shape() {
        let mut cg = Codegen::new();
        for (kind, lexeme, ty, imm) in [
            (TokenKind::Num, "42", TokenKind::Int, "#42"),
            (TokenKind::Num, "-42", TokenKind::Int, "#-42"),
            (TokenKind::Num, "2.5", TokenKind::Float, "#2.5"),
            (TokenKind::Num, "1e5", TokenKind::Float, "#1e5"),
            (TokenKind::True, "true", TokenKind::Bool, "#true"),
            (TokenKind::False, "false", TokenKind::Bool, "#false"),
        ] {
            cg.set_current_token(tok(kind, lexeme));
            cg.execute(Action::Push);
            let ins = cg.program().last().cloned().expect("instruction emitted");
            assert_eq!(ins.op, Op::Assign);
            assert_eq!(ins.arg1, Some(Operand::Imm(imm.into())));
            assert_eq!(ins.ty, ty);
            let temp = cg.ss.pop().and_then(|e| e.as_addr()).expect("temp pushed");
            assert_eq!(cg.type_of(temp), ty);
        }
    }

    #[test]
    fn binary_op_types_int_only_when_both_int() {
        let mut cg = Codegen::new();
        cg.set_current_token(tok(TokenKind::Num, "1"));
        cg.execute(Action::Push);
        cg.set_current_token(tok(TokenKind::Num, "2.5"));
        cg.execute(Action::Push);
        cg.execute(Action::Add);
        let ins = cg.program().last().cloned().expect("add emitted");
        assert_eq!(ins.op, Op::Add);
        assert_eq!(ins.ty, TokenKind::Float);
    }

    #[test]
    fn logical_ops_type_bool() {
        let mut cg = Codegen::new();
        cg.set_current_token(tok(TokenKind::True, "true"));
        cg.execute(Action::Push);
        cg.set_current_token(tok(TokenKind::False, "false"));
        cg.execute(Action::Push);
        cg.execute(Action::And);
        let ins = cg.program().last().cloned().expect("and emitted");
        assert_eq!(ins.op, Op::And);
        assert_eq!(ins.ty, TokenKind::Bool);
    }

    #[test]
    fn continue_without_loop_reports_semantic_error() {
        let mut cg = Codegen::new();
        cg.set_current_token(tok(TokenKind::Semicolon, ";"));
        cg.execute(Action::Continue);
        assert_eq!(cg.errors().len(), 1);
        assert!(cg.errors()[0].message.contains("outside of loop"));
    }

    #[test]
    fn rel_action_decodes_the_operator() {
        let mut cg = Codegen::new();
        cg.set_current_token(tok(TokenKind::Num, "1"));
        cg.execute(Action::Push);
        cg.set_current_token(tok(TokenKind::Le, "<="));
        cg.execute(Action::PushRelop);
        cg.set_current_token(tok(TokenKind::Num, "2"));
        cg.execute(Action::Push);
        cg.execute(Action::Rel);
        let ins = cg.program().last().cloned().expect("rel emitted");
        assert_eq!(ins.op, Op::Le);
        let temp = cg.ss.pop().and_then(|e| e.as_addr()).expect("temp pushed");
        assert_eq!(cg.type_of(temp), TokenKind::Bool);
    }
}
