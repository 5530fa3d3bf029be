//! The instruction model: opcodes, operands, and the `Program` container
//! with its precomputed label table.

use std::collections::HashMap;
use std::fmt;

use crate::value::Value;

/// A single instruction's opcode. The operand (if any) travels alongside
/// it in `Instr`, not folded into the variant, so the binary format can
/// encode "tag + payload" uniformly.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Opcode {
    Push,
    Pop,
    Dup,
    Swap,
    Add,
    Sub,
    Mul,
    Div,
    Mod,
    Eq,
    Ne,
    Gt,
    Lt,
    Ge,
    Le,
    Jump,
    JumpIf,
    Label,
    Call,
    Return,
    Load,
    Store,
    ExternCall,
    Print,
    DebugInfo,
    Halt,
}

impl Opcode {
    pub fn name(self) -> &'static str {
        match self {
            Opcode::Push => "Push",
            Opcode::Pop => "Pop",
            Opcode::Dup => "Dup",
            Opcode::Swap => "Swap",
            Opcode::Add => "Add",
            Opcode::Sub => "Sub",
            Opcode::Mul => "Mul",
            Opcode::Div => "Div",
            Opcode::Mod => "Mod",
            Opcode::Eq => "Eq",
            Opcode::Ne => "Ne",
            Opcode::Gt => "Gt",
            Opcode::Lt => "Lt",
            Opcode::Ge => "Ge",
            Opcode::Le => "Le",
            Opcode::Jump => "Jump",
            Opcode::JumpIf => "JumpIf",
            Opcode::Label => "Label",
            Opcode::Call => "Call",
            Opcode::Return => "Return",
            Opcode::Load => "Load",
            Opcode::Store => "Store",
            Opcode::ExternCall => "ExternCall",
            Opcode::Print => "Print",
            Opcode::DebugInfo => "DebugInfo",
            Opcode::Halt => "Halt",
        }
    }

    /// Numeric tag used by the binary format. Stable across versions within
    /// a major version; new opcodes are appended, never inserted.
    pub fn tag(self) -> u8 {
        self as u8
    }

    pub fn from_tag(tag: u8) -> Option<Opcode> {
        use Opcode::*;
        const ALL: &[Opcode] = &[
            Push, Pop, Dup, Swap, Add, Sub, Mul, Div, Mod, Eq, Ne, Gt, Lt, Ge, Le, Jump, JumpIf,
            Label, Call, Return, Load, Store, ExternCall, Print, DebugInfo, Halt,
        ];
        ALL.get(tag as usize).copied()
    }
}

impl fmt::Display for Opcode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name())
    }
}

/// An instruction's operand. `Label`/`Jump`/`JumpIf`/`Call` carry a `Name`
/// (resolved against the label table at load time); `Load`/`Store` carry
/// an `Address`; `Push` carries a `Val`; `ExternCall` carries a `Name`.
#[derive(Debug, Clone, PartialEq)]
pub enum Operand {
    None,
    Val(Value),
    Name(String),
    Address(i64),
}

impl Operand {
    pub fn as_name(&self) -> Option<&str> {
        match self {
            Operand::Name(n) => Some(n),
            _ => None,
        }
    }

    pub fn as_value(&self) -> Option<&Value> {
        match self {
            Operand::Val(v) => Some(v),
            _ => None,
        }
    }

    pub fn as_address(&self) -> Option<i64> {
        match self {
            Operand::Address(a) => Some(*a),
            _ => None,
        }
    }
}

/// A single, immutable `(opcode, operand)` pair with an optional source
/// line used only by the debugger's breakpoint line map.
#[derive(Debug, Clone, PartialEq)]
pub struct Instr {
    pub opcode: Opcode,
    pub operand: Operand,
    pub line: Option<u32>,
}

impl Instr {
    pub fn new(opcode: Opcode, operand: Operand) -> Self {
        Instr {
            opcode,
            operand,
            line: None,
        }
    }

    pub fn with_line(mut self, line: u32) -> Self {
        self.line = Some(line);
        self
    }
}

/// Error raised by `Program::load` when a program fails validation: a
/// duplicate label or a binary format decoding failure. Never a panic.
#[derive(Debug, Clone, PartialEq)]
pub struct LoadError(pub String);

impl fmt::Display for LoadError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "program load error: {}", self.0)
    }
}

impl std::error::Error for LoadError {}

/// An ordered instruction sequence plus its derived label table. The
/// label table is built once by `Program::load` and never mutated after.
#[derive(Debug, Clone)]
pub struct Program {
    instructions: Vec<Instr>,
    labels: HashMap<String, usize>,
}

impl Program {
    /// Validates and loads a raw instruction sequence: scans for `Label`
    /// opcodes to build the label table, rejecting duplicate names.
    pub fn load(instructions: Vec<Instr>) -> Result<Program, LoadError> {
        let mut labels = HashMap::new();
        for (idx, instr) in instructions.iter().enumerate() {
            if instr.opcode == Opcode::Label {
                let name = instr
                    .operand
                    .as_name()
                    .ok_or_else(|| LoadError("Label instruction missing a name operand".into()))?
                    .to_string();
                if labels.insert(name.clone(), idx).is_some() {
                    return Err(LoadError(format!("duplicate label '{name}'")));
                }
            }
        }
        Ok(Program {
            instructions,
            labels,
        })
    }

    pub fn instructions(&self) -> &[Instr] {
        &self.instructions
    }

    pub fn len(&self) -> usize {
        self.instructions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.instructions.is_empty()
    }

    pub fn get(&self, pc: usize) -> Option<&Instr> {
        self.instructions.get(pc)
    }

    pub fn label_table(&self) -> &HashMap<String, usize> {
        &self.labels
    }

    pub fn resolve_label(&self, name: &str) -> Option<usize> {
        self.labels.get(name).copied()
    }

    /// Maps a source line to the earliest instruction index at that line,
    /// used by the debugger to translate `break <line>` into a pc-address.
    pub fn line_to_address(&self, line: u32) -> Option<usize> {
        self.instructions
            .iter()
            .position(|instr| instr.line == Some(line))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn duplicate_labels_rejected() {
        let program = vec![
            Instr::new(Opcode::Label, Operand::Name("a".into())),
            Instr::new(Opcode::Label, Operand::Name("a".into())),
        ];
        assert!(Program::load(program).is_err());
    }

    #[test]
    fn label_table_idempotent() {
        let program = vec![
            Instr::new(Opcode::Jump, Operand::Name("end".into())),
            Instr::new(Opcode::Label, Operand::Name("end".into())),
            Instr::new(Opcode::Halt, Operand::None),
        ];
        let p1 = Program::load(program.clone()).unwrap();
        let p2 = Program::load(program).unwrap();
        assert_eq!(p1.label_table(), p2.label_table());
        assert_eq!(p1.resolve_label("end"), Some(1));
    }
}
