//! The bytecode instruction set and its raw wire encoding: one opcode
//! byte followed by zero or more
//! 32-bit little-endian operands.

use crate::error::{DevaError, DevaResult};
use crate::ids::{Addr, ConstId, FunctionId, LocalId};

/// Opcode byte values. Sequential small integers, stable across file versions;
/// the exact numbering is this crate's own (the compiler that emits a
/// `.dvc` file and this crate must agree on it, which they do since both
/// live behind the same [`crate::fileformat`] module).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum Op {
    Pop = 0,
    Push = 1,
    Load = 2,
    Store = 3,
    Dup = 4,
    Swap = 5,
    NewMap = 6,
    NewVec = 7,
    NewClass = 8,
    NewInstance = 9,
    TblLoad = 10,
    TblStore = 11,
    Jmp = 12,
    Jmpf = 13,
    Call = 14,
    Return = 15,
    Enter = 16,
    Leave = 17,
    Halt = 18,
    Nop = 19,
    Defun = 20,
    Defarg = 21,
    Endf = 22,
    Eq = 23,
    Neq = 24,
    Lt = 25,
    Lte = 26,
    Gt = 27,
    Gte = 28,
    Or = 29,
    And = 30,
    Neg = 31,
    Not = 32,
    Add = 33,
    Sub = 34,
    Mul = 35,
    Div = 36,
    Mod = 37,
    LineNum = 38,
    Roll = 39,
}

impl TryFrom<u8> for Op {
    type Error = DevaError;

    fn try_from(b: u8) -> DevaResult<Op> {
        use Op::*;
        Ok(match b {
            0 => Pop,
            1 => Push,
            2 => Load,
            3 => Store,
            4 => Dup,
            5 => Swap,
            6 => NewMap,
            7 => NewVec,
            8 => NewClass,
            9 => NewInstance,
            10 => TblLoad,
            11 => TblStore,
            12 => Jmp,
            13 => Jmpf,
            14 => Call,
            15 => Return,
            16 => Enter,
            17 => Leave,
            18 => Halt,
            19 => Nop,
            20 => Defun,
            21 => Defarg,
            22 => Endf,
            23 => Eq,
            24 => Neq,
            25 => Lt,
            26 => Lte,
            27 => Gt,
            28 => Gte,
            29 => Or,
            30 => And,
            31 => Neg,
            32 => Not,
            33 => Add,
            34 => Sub,
            35 => Mul,
            36 => Div,
            37 => Mod,
            38 => LineNum,
            39 => Roll,
            other => return Err(DevaError::ice(format!("invalid opcode byte {other}"))),
        })
    }
}

/// A decoded instruction, with operands already resolved to their typed
/// id wrappers. This is what [`crate::builder::CodeBuilder`] assembles
/// from and what the disassembler in [`crate::debug`] prints; the VM
/// fetch-decode-execute loop decodes one of these at a time out of the
/// raw byte stream rather than pre-materializing a `Vec<Instr>`, so that
/// jumps always land on a real instruction boundary in the on-disk form.
#[derive(Debug, Clone, PartialEq)]
pub enum Instr {
    Pop,
    Push(ConstId),
    Load(LocalId),
    Store(LocalId),
    Dup(u32),
    Swap,
    NewMap,
    NewVec,
    NewClass,
    NewInstance,
    TblLoad,
    TblStore,
    Jmp(Addr),
    Jmpf(Addr),
    Call(u32),
    Return,
    Enter,
    Leave,
    Halt(u32),
    Nop,
    Defun(FunctionId),
    Defarg(ConstId),
    Endf,
    Eq,
    Neq,
    Lt,
    Lte,
    Gt,
    Gte,
    Or,
    And,
    Neg,
    Not,
    Add,
    Sub,
    Mul,
    Div,
    Mod,
    LineNum(u32),
    Roll(u32),
}

fn read_u32(code: &[u8], at: usize) -> DevaResult<u32> {
    let bytes = code
        .get(at..at + 4)
        .ok_or_else(|| DevaError::ice("truncated instruction operand"))?;
    Ok(u32::from_le_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]))
}

/// Decode the instruction at `ip`, returning it along with the address of
/// the next instruction.
pub fn decode_at(code: &[u8], ip: usize) -> DevaResult<(Instr, usize)> {
    let opbyte = *code
        .get(ip)
        .ok_or_else(|| DevaError::ice("instruction pointer ran off the end of code"))?;
    let op = Op::try_from(opbyte)?;
    let mut next = ip + 1;
    let mut u32_operand = || -> DevaResult<u32> {
        let v = read_u32(code, next)?;
        next += 4;
        Ok(v)
    };
    let instr = match op {
        Op::Pop => Instr::Pop,
        Op::Push => Instr::Push(ConstId(u32_operand()?)),
        Op::Load => Instr::Load(LocalId(u32_operand()?)),
        Op::Store => Instr::Store(LocalId(u32_operand()?)),
        Op::Dup => Instr::Dup(u32_operand()?),
        Op::Swap => Instr::Swap,
        Op::NewMap => Instr::NewMap,
        Op::NewVec => Instr::NewVec,
        Op::NewClass => Instr::NewClass,
        Op::NewInstance => Instr::NewInstance,
        Op::TblLoad => Instr::TblLoad,
        Op::TblStore => Instr::TblStore,
        Op::Jmp => Instr::Jmp(Addr(u32_operand()?)),
        Op::Jmpf => Instr::Jmpf(Addr(u32_operand()?)),
        Op::Call => Instr::Call(u32_operand()?),
        Op::Return => Instr::Return,
        Op::Enter => Instr::Enter,
        Op::Leave => Instr::Leave,
        Op::Halt => Instr::Halt(u32_operand()?),
        Op::Nop => Instr::Nop,
        Op::Defun => Instr::Defun(FunctionId(u32_operand()?)),
        Op::Defarg => Instr::Defarg(ConstId(u32_operand()?)),
        Op::Endf => Instr::Endf,
        Op::Eq => Instr::Eq,
        Op::Neq => Instr::Neq,
        Op::Lt => Instr::Lt,
        Op::Lte => Instr::Lte,
        Op::Gt => Instr::Gt,
        Op::Gte => Instr::Gte,
        Op::Or => Instr::Or,
        Op::And => Instr::And,
        Op::Neg => Instr::Neg,
        Op::Not => Instr::Not,
        Op::Add => Instr::Add,
        Op::Sub => Instr::Sub,
        Op::Mul => Instr::Mul,
        Op::Div => Instr::Div,
        Op::Mod => Instr::Mod,
        Op::LineNum => Instr::LineNum(u32_operand()?),
        Op::Roll => Instr::Roll(u32_operand()?),
    };
    Ok((instr, next))
}

/// Append the wire encoding of `instr` to `out`. Used by
/// [`crate::builder::CodeBuilder`] and by the `.dvc` writer.
pub fn encode(instr: &Instr, out: &mut Vec<u8>) {
    fn op(out: &mut Vec<u8>, o: Op) {
        out.push(o as u8);
    }
    fn u32_operand(out: &mut Vec<u8>, v: u32) {
        out.extend_from_slice(&v.to_le_bytes());
    }
    match *instr {
        Instr::Pop => op(out, Op::Pop),
        Instr::Push(c) => {
            op(out, Op::Push);
            u32_operand(out, c.0);
        }
        Instr::Load(l) => {
            op(out, Op::Load);
            u32_operand(out, l.0);
        }
        Instr::Store(l) => {
            op(out, Op::Store);
            u32_operand(out, l.0);
        }
        Instr::Dup(depth) => {
            op(out, Op::Dup);
            u32_operand(out, depth);
        }
        Instr::Swap => op(out, Op::Swap),
        Instr::NewMap => op(out, Op::NewMap),
        Instr::NewVec => op(out, Op::NewVec),
        Instr::NewClass => op(out, Op::NewClass),
        Instr::NewInstance => op(out, Op::NewInstance),
        Instr::TblLoad => op(out, Op::TblLoad),
        Instr::TblStore => op(out, Op::TblStore),
        Instr::Jmp(a) => {
            op(out, Op::Jmp);
            u32_operand(out, a.0);
        }
        Instr::Jmpf(a) => {
            op(out, Op::Jmpf);
            u32_operand(out, a.0);
        }
        Instr::Call(n) => {
            op(out, Op::Call);
            u32_operand(out, n);
        }
        Instr::Return => op(out, Op::Return),
        Instr::Enter => op(out, Op::Enter),
        Instr::Leave => op(out, Op::Leave),
        Instr::Halt(code) => {
            op(out, Op::Halt);
            u32_operand(out, code);
        }
        Instr::Nop => op(out, Op::Nop),
        Instr::Defun(f) => {
            op(out, Op::Defun);
            u32_operand(out, f.0);
        }
        Instr::Defarg(c) => {
            op(out, Op::Defarg);
            u32_operand(out, c.0);
        }
        Instr::Endf => op(out, Op::Endf),
        Instr::Eq => op(out, Op::Eq),
        Instr::Neq => op(out, Op::Neq),
        Instr::Lt => op(out, Op::Lt),
        Instr::Lte => op(out, Op::Lte),
        Instr::Gt => op(out, Op::Gt),
        Instr::Gte => op(out, Op::Gte),
        Instr::Or => op(out, Op::Or),
        Instr::And => op(out, Op::And),
        Instr::Neg => op(out, Op::Neg),
        Instr::Not => op(out, Op::Not),
        Instr::Add => op(out, Op::Add),
        Instr::Sub => op(out, Op::Sub),
        Instr::Mul => op(out, Op::Mul),
        Instr::Div => op(out, Op::Div),
        Instr::Mod => op(out, Op::Mod),
        Instr::LineNum(n) => {
            op(out, Op::LineNum);
            u32_operand(out, n);
        }
        Instr::Roll(depth) => {
            op(out, Op::Roll);
            u32_operand(out, depth);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn round_trips_every_operand_shape() {
        let instrs = [
            Instr::Pop,
            Instr::Push(ConstId(7)),
            Instr::Jmp(Addr(42)),
            Instr::Call(3),
            Instr::Halt(0),
            Instr::Roll(2),
        ];
        let mut bytes = Vec::new();
        for i in &instrs {
            encode(i, &mut bytes);
        }
        let mut ip = 0;
        for expected in &instrs {
            let (got, next) = decode_at(&bytes, ip).unwrap();
            assert_eq!(&got, expected);
            ip = next;
        }
        assert_eq!(ip, bytes.len());
    }
}
