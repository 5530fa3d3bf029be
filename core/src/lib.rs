//! Stack virtual machine, instruction model, error taxonomy and recovery
//! table, and integrated source-level debugger.
//!
//! Front-end compilation and the outer workflow orchestration policy are
//! not part of this crate: it consumes an already-produced [`Program`]
//! and exposes the three seams (error taxonomy, debugger, external-call
//! registry) that those surrounding components plug into.

pub mod debugger;
pub mod error;
pub mod externs;
pub mod format;
pub mod instr;
pub mod value;
pub mod vm;

pub use error::{ErrorCenter, ErrorRecord, FaultClass, RecoveryPolicy, RuntimeFault};
pub use instr::{Instr, LoadError, Opcode, Operand, Program};
pub use value::Value;
pub use vm::{MachineState, Snapshot, Vm};
