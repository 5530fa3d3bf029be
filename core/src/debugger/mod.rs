//! The integrated source-level debugger: breakpoints, stepping modes,
//! watch expressions, and a sandboxed expression evaluator over live VM
//! state. The debugger never owns the `Vm` — it mediates one passed in by
//! the caller (the CLI driver or a test), so a single VM can be inspected
//! by different front ends without copying state.

pub mod breakpoint;
pub mod command;
pub mod eval;
pub mod watch;

#[cfg(test)]
mod tests;

use std::collections::HashMap;

use crate::instr::Program;
use crate::vm::Vm;

pub use breakpoint::Breakpoint;
pub use eval::{DebugContext, EvalError};
pub use watch::{Direction, Watch, WatchReport};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StepMode {
    Step,
    Next,
    Finish,
    Continue,
}

/// Attaches to a `Vm` and mediates its execution. No breakpoint is ever
/// set implicitly by construction; `debug_mode` only controls whether a
/// debugger is attached at all.
pub struct Debugger {
    breakpoints: HashMap<u32, Breakpoint>,
    watches: Vec<Watch>,
    symbols: HashMap<String, usize>,
    /// Set by `load_program`. Backs two lookup paths: `Program::line_to_address`
    /// (used to stamp `Breakpoint::address`) and `address_to_line` below,
    /// rebuilt here since `Program` only exposes the line-first direction.
    program: Option<Program>,
    address_to_line: HashMap<usize, u32>,
}

/// Why `drive` returned control to the caller.
#[derive(Debug, Clone, PartialEq)]
pub enum SuspendReason {
    Breakpoint(u32),
    StepComplete,
    Halted,
    Faulted,
}

impl Debugger {
    pub fn new() -> Self {
        Debugger {
            breakpoints: HashMap::new(),
            watches: Vec::new(),
            symbols: HashMap::new(),
            program: None,
            address_to_line: HashMap::new(),
        }
    }

    /// Attaches a program: rebuilds the address→line table and backfills
    /// `address` on every breakpoint already set via `Program::line_to_address`.
    /// Call this whenever a new program is attached, before setting
    /// breakpoints.
    pub fn load_program(&mut self, program: &Program) {
        self.address_to_line.clear();
        for (addr, instr) in program.instructions().iter().enumerate() {
            if let Some(line) = instr.line {
                self.address_to_line.insert(addr, line);
            }
        }
        for bp in self.breakpoints.values_mut() {
            bp.address = program.line_to_address(bp.line);
        }
        self.program = Some(program.clone());
    }

    pub fn define_symbol(&mut self, name: impl Into<String>, heap_address: usize) {
        self.symbols.insert(name.into(), heap_address);
    }

    /// Sets a breakpoint at `line`, replacing any existing condition and
    /// re-enabling it if it already existed. `address` is resolved via
    /// `Program::line_to_address` if a program has been loaded.
    pub fn set_breakpoint(&mut self, line: u32, condition: Option<String>) {
        let mut bp = Breakpoint::new(line, condition);
        bp.address = self.program.as_ref().and_then(|p| p.line_to_address(line));
        self.breakpoints.insert(line, bp);
    }

    pub fn delete_breakpoint(&mut self, line: u32) -> bool {
        self.breakpoints.remove(&line).is_some()
    }

    pub fn list_breakpoints(&self) -> Vec<&Breakpoint> {
        let mut v: Vec<_> = self.breakpoints.values().collect();
        v.sort_by_key(|b| b.line);
        v
    }

    pub fn add_watch(&mut self, expr: impl Into<String>) {
        self.watches.push(Watch::new(expr.into()));
    }

    pub fn watches(&self) -> &[Watch] {
        &self.watches
    }

    /// Builds the name→value environment expression evaluation runs
    /// against: stack contents/depths, pc, instruction count, and named
    /// variables resolved from the symbol table against the live heap.
    pub fn debug_context(&self, vm: &Vm) -> DebugContext {
        let vars = self
            .symbols
            .iter()
            .filter_map(|(name, addr)| vm.read_cell(*addr).map(|v| (name.clone(), crate::value::Value::Int(v as i64))))
            .collect();
        DebugContext {
            stack: vm.operand_stack().to_vec(),
            stack_depth: vm.operand_stack().len() as i64,
            call_depth: vm.call_depth() as i64,
            pc: vm.pc() as i64,
            instr_count: vm.instructions_executed() as i64,
            vars,
        }
    }

    pub fn evaluate(&self, vm: &Vm, expr: &str) -> Result<crate::value::Value, EvalError> {
        eval::evaluate(expr, &self.debug_context(vm))
    }

    /// Re-evaluates every watch against current VM state, returning each
    /// one's report in registration order.
    pub fn refresh_watches(&mut self, vm: &Vm) -> Vec<(String, WatchReport)> {
        let ctx = self.debug_context(vm);
        self.watches
            .iter_mut()
            .map(|w| (w.expr.clone(), w.refresh(&ctx)))
            .collect()
    }

    fn breakpoint_at(&mut self, vm: &Vm) -> Option<u32> {
        // Direct path: the current instruction carries its own line. Falls
        // back to the address→line table rebuilt at `load_program` for the
        // rare instruction with no line attached.
        let line = vm.current_line().or_else(|| self.address_to_line.get(&vm.pc()).copied())?;
        let ctx = self.debug_context(vm);
        let bp = self.breakpoints.get_mut(&line)?;
        if !bp.enabled {
            return None;
        }
        let fires = match &bp.condition {
            None => true,
            Some(cond) => eval::evaluate(cond, &ctx).map(|v| v.is_truthy()).unwrap_or(false),
        };
        if fires {
            bp.hit_count += 1;
            Some(line)
        } else {
            None
        }
    }

    /// Drives `vm` according to `mode` until it suspends. `Continue` runs
    /// until the next breakpoint or termination; `Step` executes one
    /// instruction; `Next`/`Finish` compare call-stack depth against the
    /// depth observed when stepping began.
    pub fn drive(&mut self, vm: &mut Vm, mode: StepMode) -> SuspendReason {
        let start_depth = vm.call_depth();
        match mode {
            StepMode::Step => {
                vm.step();
            }
            StepMode::Continue => loop {
                if !vm.is_running() {
                    break;
                }
                if let Some(line) = self.breakpoint_at(vm) {
                    return SuspendReason::Breakpoint(line);
                }
                vm.step();
            },
            StepMode::Next => {
                vm.step();
                while vm.is_running() && vm.call_depth() > start_depth {
                    if let Some(line) = self.breakpoint_at(vm) {
                        return SuspendReason::Breakpoint(line);
                    }
                    vm.step();
                }
            }
            StepMode::Finish => {
                vm.step();
                if start_depth > 0 {
                    while vm.is_running() && vm.call_depth() >= start_depth {
                        if let Some(line) = self.breakpoint_at(vm) {
                            return SuspendReason::Breakpoint(line);
                        }
                        vm.step();
                    }
                }
            }
        }
        if vm.snapshot().fault_flag {
            SuspendReason::Faulted
        } else if !vm.is_running() {
            SuspendReason::Halted
        } else {
            SuspendReason::StepComplete
        }
    }
}

impl Default for Debugger {
    fn default() -> Self {
        Debugger::new()
    }
}
