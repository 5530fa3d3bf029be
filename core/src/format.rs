//! Binary on-disk program format: a small versioned container around a
//! flat instruction sequence, mirroring the teacher's own bytecode layout
//! (magic header, packed version, length-prefixed strings) but carrying
//! this crate's opcode set and tagged values instead.

use crate::instr::{Instr, Opcode, Operand};
use crate::value::Value;

const MAGIC: &[u8; 4] = b"RLRB";
const VERSION_MAJOR: u8 = 1;
const VERSION_MINOR: u8 = 0;
const VERSION_PATCH: u8 = 0;

pub const FORMAT_VERSION: u32 =
    ((VERSION_MAJOR as u32) << 16) | ((VERSION_MINOR as u32) << 8) | (VERSION_PATCH as u32);

const TAG_NONE: u8 = 0;
const TAG_INT: u8 = 1;
const TAG_FLOAT: u8 = 2;
const TAG_BOOL: u8 = 3;
const TAG_STR: u8 = 4;
const TAG_NAME: u8 = 5;
const TAG_ADDRESS: u8 = 6;

#[derive(Debug, Clone, PartialEq)]
pub struct FormatError(pub String);

impl std::fmt::Display for FormatError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "program format error: {}", self.0)
    }
}

impl std::error::Error for FormatError {}

/// Serializes instructions to the binary container. Line numbers are
/// preserved (0 sentinel means "absent") so a compiled-to-disk program
/// still supports debugger breakpoints after a reload.
pub fn write_program(instructions: &[Instr]) -> Vec<u8> {
    let mut out = Vec::new();
    out.extend_from_slice(MAGIC);
    out.extend_from_slice(&FORMAT_VERSION.to_le_bytes());
    out.extend_from_slice(&(instructions.len() as u32).to_le_bytes());
    for instr in instructions {
        out.push(instr.opcode.tag());
        out.extend_from_slice(&instr.line.unwrap_or(0).to_le_bytes());
        write_operand(&mut out, &instr.operand);
    }
    out
}

fn write_operand(out: &mut Vec<u8>, operand: &Operand) {
    match operand {
        Operand::None => out.push(TAG_NONE),
        Operand::Val(Value::Int(n)) => {
            out.push(TAG_INT);
            out.extend_from_slice(&n.to_le_bytes());
        }
        Operand::Val(Value::Float(x)) => {
            out.push(TAG_FLOAT);
            out.extend_from_slice(&x.to_le_bytes());
        }
        Operand::Val(Value::Bool(b)) => {
            out.push(TAG_BOOL);
            out.push(if *b { 1 } else { 0 });
        }
        Operand::Val(Value::Str(s)) => {
            out.push(TAG_STR);
            write_string(out, s);
        }
        Operand::Name(name) => {
            out.push(TAG_NAME);
            write_string(out, name);
        }
        Operand::Address(addr) => {
            out.push(TAG_ADDRESS);
            out.extend_from_slice(&addr.to_le_bytes());
        }
    }
}

fn write_string(out: &mut Vec<u8>, s: &str) {
    out.extend_from_slice(&(s.len() as u32).to_le_bytes());
    out.extend_from_slice(s.as_bytes());
}

/// Deserializes the binary container back into an instruction sequence.
/// Rejects a bad magic or an incompatible major version as a `FormatError`
/// rather than panicking on attacker-controlled or stale input.
pub fn read_program(data: &[u8]) -> Result<Vec<Instr>, FormatError> {
    let mut cursor = Cursor::new(data);
    let magic = cursor.take(4)?;
    if magic != MAGIC.as_slice() {
        return Err(FormatError("bad magic header".into()));
    }
    let version = cursor.read_u32()?;
    let major = (version >> 16) & 0xff;
    if major != VERSION_MAJOR as u32 {
        return Err(FormatError(format!(
            "incompatible format version: file is {major}, runtime supports {VERSION_MAJOR}"
        )));
    }
    let count = cursor.read_u32()? as usize;
    let mut instructions = Vec::with_capacity(count);
    for _ in 0..count {
        let tag = cursor.read_u8()?;
        let opcode = Opcode::from_tag(tag)
            .ok_or_else(|| FormatError(format!("unknown opcode tag {tag}")))?;
        let line_raw = cursor.read_u32()?;
        let line = if line_raw == 0 { None } else { Some(line_raw) };
        let operand = read_operand(&mut cursor)?;
        let mut instr = Instr::new(opcode, operand);
        instr.line = line;
        instructions.push(instr);
    }
    Ok(instructions)
}

fn read_operand(cursor: &mut Cursor) -> Result<Operand, FormatError> {
    let tag = cursor.read_u8()?;
    Ok(match tag {
        TAG_NONE => Operand::None,
        TAG_INT => Operand::Val(Value::Int(cursor.read_i64()?)),
        TAG_FLOAT => Operand::Val(Value::Float(cursor.read_f64()?)),
        TAG_BOOL => Operand::Val(Value::Bool(cursor.read_u8()? != 0)),
        TAG_STR => Operand::Val(Value::Str(cursor.read_string()?)),
        TAG_NAME => Operand::Name(cursor.read_string()?),
        TAG_ADDRESS => Operand::Address(cursor.read_i64()?),
        other => return Err(FormatError(format!("unknown operand tag {other}"))),
    })
}

struct Cursor<'a> {
    data: &'a [u8],
    pos: usize,
}

impl<'a> Cursor<'a> {
    fn new(data: &'a [u8]) -> Self {
        Cursor { data, pos: 0 }
    }

    fn take(&mut self, n: usize) -> Result<&'a [u8], FormatError> {
        if self.pos + n > self.data.len() {
            return Err(FormatError("truncated program image".into()));
        }
        let slice = &self.data[self.pos..self.pos + n];
        self.pos += n;
        Ok(slice)
    }

    fn read_u8(&mut self) -> Result<u8, FormatError> {
        Ok(self.take(1)?[0])
    }

    fn read_u32(&mut self) -> Result<u32, FormatError> {
        let bytes: [u8; 4] = self.take(4)?.try_into().unwrap();
        Ok(u32::from_le_bytes(bytes))
    }

    fn read_i64(&mut self) -> Result<i64, FormatError> {
        let bytes: [u8; 8] = self.take(8)?.try_into().unwrap();
        Ok(i64::from_le_bytes(bytes))
    }

    fn read_f64(&mut self) -> Result<f64, FormatError> {
        let bytes: [u8; 8] = self.take(8)?.try_into().unwrap();
        Ok(f64::from_le_bytes(bytes))
    }

    fn read_string(&mut self) -> Result<String, FormatError> {
        let len = self.read_u32()? as usize;
        let bytes = self.take(len)?;
        String::from_utf8(bytes.to_vec()).map_err(|e| FormatError(e.to_string()))
    }
}
