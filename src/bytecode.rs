// Opcode set, instruction record, and the two serialization forms: a
// fixed binary layout and a human-readable text form. The binary
// encode/decode is hand-rolled little-endian, following the pattern in
// `other_examples`'s omglang bytecode decoder (manual `read_u32`/
// `read_i64`/`read_string` helpers and an explicit opcode `match` table)
// rather than pulling in a generic serializer for a fixed three-field
// instruction layout.

use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Opcode {
    Push,
    Pop,
    Dup,
    Add,
    Sub,
    Mul,
    Div,
    Mod,
    Eq,
    Ne,
    Lt,
    Gt,
    Le,
    Ge,
    Jump,
    JumpIfFalse,
    Load,
    Store,
    Call,
    Return,
    Print,
    Halt,
}

impl Opcode {
    pub fn has_operand(self) -> bool {
        !matches!(
            self,
            Opcode::Pop
                | Opcode::Dup
                | Opcode::Add
                | Opcode::Sub
                | Opcode::Mul
                | Opcode::Div
                | Opcode::Mod
                | Opcode::Eq
                | Opcode::Ne
                | Opcode::Lt
                | Opcode::Gt
                | Opcode::Le
                | Opcode::Ge
                | Opcode::Return
                | Opcode::Print
                | Opcode::Halt
        )
    }

    pub fn mnemonic(self) -> &'static str {
        match self {
            Opcode::Push => "PUSH",
            Opcode::Pop => "POP",
            Opcode::Dup => "DUP",
            Opcode::Add => "ADD",
            Opcode::Sub => "SUB",
            Opcode::Mul => "MUL",
            Opcode::Div => "DIV",
            Opcode::Mod => "MOD",
            Opcode::Eq => "EQ",
            Opcode::Ne => "NE",
            Opcode::Lt => "LT",
            Opcode::Gt => "GT",
            Opcode::Le => "LE",
            Opcode::Ge => "GE",
            Opcode::Jump => "JUMP",
            Opcode::JumpIfFalse => "JUMP_IF_FALSE",
            Opcode::Load => "LOAD",
            Opcode::Store => "STORE",
            Opcode::Call => "CALL",
            Opcode::Return => "RETURN",
            Opcode::Print => "PRINT",
            Opcode::Halt => "HALT",
        }
    }

    pub fn from_mnemonic(name: &str) -> Option<Opcode> {
        Some(match name.to_ascii_uppercase().as_str() {
            "PUSH" => Opcode::Push,
            "POP" => Opcode::Pop,
            "DUP" => Opcode::Dup,
            "ADD" => Opcode::Add,
            "SUB" => Opcode::Sub,
            "MUL" => Opcode::Mul,
            "DIV" => Opcode::Div,
            "MOD" => Opcode::Mod,
            "EQ" => Opcode::Eq,
            "NE" => Opcode::Ne,
            "LT" => Opcode::Lt,
            "GT" => Opcode::Gt,
            "LE" => Opcode::Le,
            "GE" => Opcode::Ge,
            "JUMP" => Opcode::Jump,
            "JUMP_IF_FALSE" => Opcode::JumpIfFalse,
            "LOAD" => Opcode::Load,
            "STORE" => Opcode::Store,
            "CALL" => Opcode::Call,
            "RETURN" => Opcode::Return,
            "PRINT" => Opcode::Print,
            "HALT" => Opcode::Halt,
            _ => return None,
        })
    }

    fn from_tag_byte(byte: u8) -> Option<Opcode> {
        Some(match byte {
            0 => Opcode::Push,
            1 => Opcode::Pop,
            2 => Opcode::Dup,
            3 => Opcode::Add,
            4 => Opcode::Sub,
            5 => Opcode::Mul,
            6 => Opcode::Div,
            7 => Opcode::Mod,
            8 => Opcode::Eq,
            9 => Opcode::Ne,
            10 => Opcode::Lt,
            11 => Opcode::Gt,
            12 => Opcode::Le,
            13 => Opcode::Ge,
            14 => Opcode::Jump,
            15 => Opcode::JumpIfFalse,
            16 => Opcode::Load,
            17 => Opcode::Store,
            18 => Opcode::Call,
            19 => Opcode::Return,
            20 => Opcode::Print,
            21 => Opcode::Halt,
            _ => return None,
        })
    }

    fn to_tag_byte(self) -> u8 {
        self as u8
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Operand {
    Absent,
    Int(i64),
    Float(f64),
    Str(String),
    Bool(bool),
}

impl fmt::Display for Operand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Operand::Absent => Ok(()),
            Operand::Int(n) => write!(f, "{}", n),
            Operand::Float(n) => write!(f, "{}", crate::value::format_number(*n)),
            Operand::Str(s) => write!(f, "{:?}", s),
            Operand::Bool(b) => write!(f, "{}", b),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Instruction {
    pub opcode: Opcode,
    pub operand: Operand,
}

impl Instruction {
    pub fn new(opcode: Opcode, operand: Operand) -> Self {
        Instruction { opcode, operand }
    }

    pub fn bare(opcode: Opcode) -> Self {
        Instruction { opcode, operand: Operand::Absent }
    }
}

impl fmt::Display for Instruction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.operand {
            Operand::Absent => write!(f, "{}", self.opcode.mnemonic()),
            operand => write!(f, "{} {}", self.opcode.mnemonic(), operand),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct Program {
    pub instructions: Vec<Instruction>,
}

impl Program {
    pub fn len(&self) -> usize {
        self.instructions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.instructions.is_empty()
    }
}

// --- Binary format ----------------------------------------------------
//
// [4-byte LE count][instruction]*, instruction = [opcode:u8][tag:u8][payload]
// tag: 0 = absent, 1 = i64 LE, 2 = f64 LE, 3 = u32-LE-length-prefixed utf8, 4 = u8 0|1.

pub fn encode_binary(program: &Program) -> Vec<u8> {
    let mut out = Vec::new();
    out.extend_from_slice(&(program.instructions.len() as u32).to_le_bytes());
    for instr in &program.instructions {
        out.push(instr.opcode.to_tag_byte());
        match &instr.operand {
            Operand::Absent => out.push(0),
            Operand::Int(n) => {
                out.push(1);
                out.extend_from_slice(&n.to_le_bytes());
            }
            Operand::Float(n) => {
                out.push(2);
                out.extend_from_slice(&n.to_le_bytes());
            }
            Operand::Str(s) => {
                out.push(3);
                out.extend_from_slice(&(s.len() as u32).to_le_bytes());
                out.extend_from_slice(s.as_bytes());
            }
            Operand::Bool(b) => {
                out.push(4);
                out.push(if *b { 1 } else { 0 });
            }
        }
    }
    out
}

#[derive(Debug, Clone, PartialEq)]
pub enum DecodeError {
    Truncated,
    UnknownOpcode(u8),
    UnknownOperandTag(u8),
    InvalidUtf8,
}

impl fmt::Display for DecodeError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DecodeError::Truncated => write!(f, "truncated bytecode"),
            DecodeError::UnknownOpcode(b) => write!(f, "unknown opcode byte {}", b),
            DecodeError::UnknownOperandTag(b) => write!(f, "unknown operand tag {}", b),
            DecodeError::InvalidUtf8 => write!(f, "invalid utf-8 in string operand"),
        }
    }
}

impl std::error::Error for DecodeError {}

fn read_u32(data: &[u8], idx: &mut usize) -> Result<u32, DecodeError> {
    let bytes: [u8; 4] = data.get(*idx..*idx + 4).ok_or(DecodeError::Truncated)?.try_into().unwrap();
    *idx += 4;
    Ok(u32::from_le_bytes(bytes))
}

fn read_i64(data: &[u8], idx: &mut usize) -> Result<i64, DecodeError> {
    let bytes: [u8; 8] = data.get(*idx..*idx + 8).ok_or(DecodeError::Truncated)?.try_into().unwrap();
    *idx += 8;
    Ok(i64::from_le_bytes(bytes))
}

fn read_f64(data: &[u8], idx: &mut usize) -> Result<f64, DecodeError> {
    let bytes: [u8; 8] = data.get(*idx..*idx + 8).ok_or(DecodeError::Truncated)?.try_into().unwrap();
    *idx += 8;
    Ok(f64::from_le_bytes(bytes))
}

fn read_u8(data: &[u8], idx: &mut usize) -> Result<u8, DecodeError> {
    let byte = *data.get(*idx).ok_or(DecodeError::Truncated)?;
    *idx += 1;
    Ok(byte)
}

fn read_string(data: &[u8], idx: &mut usize) -> Result<String, DecodeError> {
    let len = read_u32(data, idx)? as usize;
    let bytes = data.get(*idx..*idx + len).ok_or(DecodeError::Truncated)?;
    *idx += len;
    String::from_utf8(bytes.to_vec()).map_err(|_| DecodeError::InvalidUtf8)
}

pub fn decode_binary(data: &[u8]) -> Result<Program, DecodeError> {
    let mut idx = 0;
    let count = read_u32(data, &mut idx)? as usize;
    let mut instructions = Vec::with_capacity(count);
    for _ in 0..count {
        let opcode_byte = read_u8(data, &mut idx)?;
        let opcode = Opcode::from_tag_byte(opcode_byte).ok_or(DecodeError::UnknownOpcode(opcode_byte))?;
        let tag = read_u8(data, &mut idx)?;
        let operand = match tag {
            0 => Operand::Absent,
            1 => Operand::Int(read_i64(data, &mut idx)?),
            2 => Operand::Float(read_f64(data, &mut idx)?),
            3 => Operand::Str(read_string(data, &mut idx)?),
            4 => Operand::Bool(read_u8(data, &mut idx)? != 0),
            other => return Err(DecodeError::UnknownOperandTag(other)),
        };
        instructions.push(Instruction::new(opcode, operand));
    }
    Ok(Program { instructions })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn binary_round_trip_preserves_instructions() {
        let program = Program {
            instructions: vec![
                Instruction::new(Opcode::Push, Operand::Float(27.0)),
                Instruction::new(Opcode::Push, Operand::Str("hi".to_string())),
                Instruction::new(Opcode::Jump, Operand::Int(3)),
                Instruction::bare(Opcode::Halt),
            ],
        };
        let bytes = encode_binary(&program);
        let decoded = decode_binary(&bytes).unwrap();
        assert_eq!(decoded, program);
    }

    #[test]
    fn truncated_input_is_reported_not_panicked() {
        let bytes = vec![1, 0, 0, 0, 0]; // count=1 but missing the rest of the instruction
        assert_eq!(decode_binary(&bytes), Err(DecodeError::Truncated));
    }

    #[test]
    fn mnemonic_round_trips_case_insensitively() {
        assert_eq!(Opcode::from_mnemonic("add"), Some(Opcode::Add));
        assert_eq!(Opcode::from_mnemonic("ADD"), Some(Opcode::Add));
        assert_eq!(Opcode::from_mnemonic("nonsense"), None);
    }

    #[test]
    fn display_renders_opcode_and_operand() {
        let instr = Instruction::new(Opcode::Push, Operand::Float(27.0));
        assert_eq!(instr.to_string(), "PUSH 27");
    }
}
