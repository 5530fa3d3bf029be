//! The stack virtual machine: operand/call/exception stacks, a linear
//! heap, and the fetch-decode-execute cycle. Per-opcode handlers live in
//! sibling `ops_*` modules and operate directly on `Vm`'s fields, mirroring
//! the dispatch shape of the interpreter this crate's VM design descends
//! from.

mod ops_arith;
mod ops_control;
mod ops_memory;
mod ops_stack;


use std::collections::HashMap;
use std::io::Write;

use crate::error::{ErrorCenter, ErrorRecord, ExceptionContext, FaultClass, RecoveryPolicy, RecoveryTable, RuntimeFault, Severity};
use crate::externs::ExternRegistry;
use crate::instr::{Instr, Opcode, Program};
use crate::value::Value;

pub const DEFAULT_HEAP_SIZE: usize = 65_536;

/// A pending call's return address, caller frame pointer, and locals.
#[derive(Debug, Clone, Default)]
pub struct Frame {
    pub return_address: usize,
    pub prior_fp: usize,
    pub locals: HashMap<String, Value>,
}

/// Where `Print`/`DebugInfo` output goes. The CLI driver wires this to
/// stdout; tests wire it to an in-memory buffer.
pub trait OutputSink: Send {
    fn emit(&mut self, line: &str);
}

/// Writes every line to a `std::io::Write`, used by the CLI driver.
pub struct WriterSink<W: Write + Send>(pub W);

impl<W: Write + Send> OutputSink for WriterSink<W> {
    fn emit(&mut self, line: &str) {
        let _ = writeln!(self.0, "{line}");
    }
}

/// Collects emitted lines in memory, used by tests and the debugger's
/// `DebugInfo` channel when no sink is supplied.
#[derive(Default)]
pub struct BufferSink(pub Vec<String>);

impl OutputSink for BufferSink {
    fn emit(&mut self, line: &str) {
        self.0.push(line.to_string());
    }
}

/// Read-only view of machine state, returned by `Vm::run`/`Vm::snapshot`.
#[derive(Debug, Clone)]
pub struct Snapshot {
    pub pc: usize,
    pub running: bool,
    pub fault_flag: bool,
    pub fault_message: Option<String>,
    pub operand_stack_depth: usize,
    pub call_depth: usize,
    /// Count of dispatched instructions, `Halt` included: the final
    /// instruction that stops the machine is itself an executed dispatch,
    /// not a sentinel skipped over.
    pub instructions_executed: u64,
    pub stack_high_water: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MachineState {
    Loaded,
    Running,
    Halted,
    Faulted,
    Suspended,
}

/// Hook the debugger implements to mediate execution at instruction
/// boundaries. The VM calls this once per tick before fetching; returning
/// `true` halts the tick loop without altering `running`, so the caller
/// (the debugger) regains control between instructions.
pub trait ExecutionObserver {
    fn before_tick(&mut self, vm: &Vm) -> bool;
}

pub struct Vm {
    program: Option<Program>,
    pub(crate) operand_stack: Vec<Value>,
    pub(crate) call_stack: Vec<Frame>,
    pub(crate) exception_stack: Vec<ExceptionContext>,
    pub(crate) heap: Vec<u8>,
    pub(crate) pc: usize,
    pub(crate) advance_pc: bool,
    running: bool,
    fault: Option<RuntimeFault>,
    error_center: ErrorCenter,
    recovery: RecoveryTable,
    pub(crate) externs: ExternRegistry,
    pub(crate) out_sink: Box<dyn OutputSink>,
    pub(crate) debug_sink: Box<dyn OutputSink>,
    instr_count: u64,
    stack_high_water: usize,
}

impl Vm {
    pub fn new(safe_mode: bool, heap_size: usize, externs: ExternRegistry) -> Self {
        Vm {
            program: None,
            operand_stack: Vec::new(),
            call_stack: Vec::new(),
            exception_stack: Vec::new(),
            heap: vec![0u8; heap_size],
            pc: 0,
            advance_pc: true,
            running: false,
            fault: None,
            error_center: ErrorCenter::new(),
            recovery: RecoveryTable::new(safe_mode),
            externs,
            out_sink: Box::new(BufferSink::default()),
            debug_sink: Box::new(BufferSink::default()),
            instr_count: 0,
            stack_high_water: 0,
        }
    }

    pub fn set_output_sink(&mut self, sink: Box<dyn OutputSink>) {
        self.out_sink = sink;
    }

    pub fn set_debug_sink(&mut self, sink: Box<dyn OutputSink>) {
        self.debug_sink = sink;
    }

    /// Resets all machine state and loads a validated program.
    pub fn load(&mut self, program: Program) {
        self.operand_stack.clear();
        self.call_stack.clear();
        self.exception_stack.clear();
        self.heap.iter_mut().for_each(|b| *b = 0);
        self.pc = 0;
        self.advance_pc = true;
        self.running = true;
        self.fault = None;
        self.error_center = ErrorCenter::new();
        self.instr_count = 0;
        self.stack_high_water = 0;
        self.program = Some(program);
        log::debug!("program loaded: {} instructions", self.program.as_ref().unwrap().len());
    }

    pub fn state(&self) -> MachineState {
        if self.program.is_none() {
            return MachineState::Loaded;
        }
        if self.fault.is_some() {
            MachineState::Faulted
        } else if !self.running {
            MachineState::Halted
        } else {
            MachineState::Running
        }
    }

    pub fn error_center(&self) -> &ErrorCenter {
        &self.error_center
    }

    pub fn call_depth(&self) -> usize {
        self.call_stack.len()
    }

    pub fn operand_stack(&self) -> &[Value] {
        &self.operand_stack
    }

    pub fn pc(&self) -> usize {
        self.pc
    }

    pub fn instructions_executed(&self) -> u64 {
        self.instr_count
    }

    pub fn is_running(&self) -> bool {
        self.running
    }

    pub fn program(&self) -> Option<&Program> {
        self.program.as_ref()
    }

    pub fn current_line(&self) -> Option<u32> {
        self.program.as_ref().and_then(|p| p.get(self.pc)).and_then(|i| i.line)
    }

    pub fn heap(&self) -> &[u8] {
        &self.heap
    }

    pub fn heap_mut(&mut self) -> &mut [u8] {
        &mut self.heap
    }

    /// Reads a 4-byte little-endian signed cell, used by the debugger's
    /// variable materialization.
    pub fn read_cell(&self, addr: usize) -> Option<i32> {
        self.heap
            .get(addr..addr + 4)
            .map(|bytes| i32::from_le_bytes(bytes.try_into().unwrap()))
    }

    pub fn snapshot(&self) -> Snapshot {
        Snapshot {
            pc: self.pc,
            running: self.running,
            fault_flag: self.fault.is_some(),
            fault_message: self.fault.as_ref().map(|f| f.to_string()),
            operand_stack_depth: self.operand_stack.len(),
            call_depth: self.call_stack.len(),
            instructions_executed: self.instr_count,
            stack_high_water: self.stack_high_water,
        }
    }

    /// Runs to completion (no observer attached). Equivalent to
    /// `run_observed` with an observer that never requests suspension.
    pub fn run(&mut self) -> Snapshot {
        self.run_observed(&mut NullObserver)
    }

    /// Runs until halted, faulted, or the observer requests suspension at
    /// an instruction boundary.
    pub fn run_observed(&mut self, observer: &mut dyn ExecutionObserver) -> Snapshot {
        while self.running {
            if observer.before_tick(self) {
                break;
            }
            self.tick();
        }
        self.snapshot()
    }

    /// Executes exactly one instruction. Used directly by the debugger's
    /// `step` command and by tests exercising single-step semantics.
    pub fn step(&mut self) {
        if self.running {
            self.tick();
        }
    }

    fn tick(&mut self) {
        let program = match &self.program {
            Some(p) => p,
            None => {
                self.running = false;
                return;
            }
        };
        if self.pc >= program.len() {
            self.running = false;
            return;
        }
        let instr = program.get(self.pc).unwrap().clone();
        self.advance_pc = true;
        let result = self.dispatch(&instr);
        self.instr_count += 1;
        self.stack_high_water = self.stack_high_water.max(self.operand_stack.len());
        if let Err(fault) = result {
            self.handle_fault(fault, &instr);
        }
        if self.running && self.advance_pc {
            self.pc += 1;
        }
    }

    fn dispatch(&mut self, instr: &Instr) -> Result<(), RuntimeFault> {
        use Opcode::*;
        match instr.opcode {
            Push => ops_stack::handle_push(self, &instr.operand),
            Pop => ops_stack::handle_pop(self),
            Dup => ops_stack::handle_dup(self),
            Swap => ops_stack::handle_swap(self),
            Add => ops_arith::handle_add(self),
            Sub => ops_arith::handle_sub(self),
            Mul => ops_arith::handle_mul(self),
            Div => ops_arith::handle_div(self),
            Mod => ops_arith::handle_mod(self),
            Eq => ops_arith::handle_cmp(self, |o| o == std::cmp::Ordering::Equal),
            Ne => ops_arith::handle_cmp(self, |o| o != std::cmp::Ordering::Equal),
            Gt => ops_arith::handle_cmp(self, |o| o == std::cmp::Ordering::Greater),
            Lt => ops_arith::handle_cmp(self, |o| o == std::cmp::Ordering::Less),
            Ge => ops_arith::handle_cmp(self, |o| o != std::cmp::Ordering::Less),
            Le => ops_arith::handle_cmp(self, |o| o != std::cmp::Ordering::Greater),
            Jump => ops_control::handle_jump(self, &instr.operand),
            JumpIf => ops_control::handle_jump_if(self, &instr.operand),
            Label => Ok(()),
            Call => ops_control::handle_call(self, &instr.operand),
            Return => ops_control::handle_return(self),
            Load => ops_memory::handle_load(self, &instr.operand),
            Store => ops_memory::handle_store(self, &instr.operand),
            ExternCall => ops_control::handle_extern_call(self, &instr.operand),
            Print => ops_control::handle_print(self),
            DebugInfo => ops_control::handle_debug_info(self),
            Halt => {
                self.running = false;
                Ok(())
            }
        }
    }

    fn handle_fault(&mut self, fault: RuntimeFault, instr: &Instr) {
        let ctx = ExceptionContext {
            message: fault.message.clone(),
            pc_at_fault: self.pc,
            operand_stack_snapshot: self.operand_stack.clone(),
            call_depth_at_fault: self.call_stack.len(),
        };
        self.exception_stack.push(ctx);
        self.error_center.record(ErrorRecord {
            message: fault.message.clone(),
            line: instr.line.unwrap_or(0),
            column: 0,
            class: fault.class,
            severity: severity_for(fault.class),
            source_file: String::new(),
            detail: String::new(),
        });

        let policy = self.recovery.policy_for(fault.class);
        log::warn!("fault {} at pc={}: recovery={:?}", fault, self.pc, policy);
        match policy {
            RecoveryPolicy::DefaultValue => {
                self.operand_stack.push(Value::Int(0));
                self.advance_pc = true;
            }
            RecoveryPolicy::Continue => {
                self.advance_pc = true;
            }
            RecoveryPolicy::Coerce => {
                let coerced = fault.coerce_candidates.iter().find_map(Value::as_f64);
                match coerced {
                    Some(n) => {
                        self.operand_stack.push(Value::Float(n));
                        self.advance_pc = true;
                    }
                    None => {
                        self.running = false;
                        self.advance_pc = false;
                        self.fault = Some(fault);
                    }
                }
            }
            RecoveryPolicy::Abort | RecoveryPolicy::PanicMode | RecoveryPolicy::SkipChar => {
                self.running = false;
                self.advance_pc = false;
                self.fault = Some(fault);
            }
        }
    }
}

fn severity_for(class: FaultClass) -> Severity {
    match class {
        FaultClass::DivideByZero | FaultClass::TypeError | FaultClass::ExternCallError => Severity::Warning,
        FaultClass::Generic => Severity::Info,
        _ => Severity::Error,
    }
}

struct NullObserver;
impl ExecutionObserver for NullObserver {
    fn before_tick(&mut self, _vm: &Vm) -> bool {
        false
    }
}

pub(crate) fn underflow(op: &str) -> RuntimeFault {
    RuntimeFault::new(FaultClass::StackUnderflow, format!("{op}: operand stack underflow"))
}
