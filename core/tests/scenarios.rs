//! End-to-end scenarios exercised through the crate's public API only,
//! as a front end or CLI driver would use it.

use ralph_core::debugger::{Debugger, StepMode, SuspendReason};
use ralph_core::externs::{ExternPrimitive, ExternRegistry};
use ralph_core::{Instr, Opcode, Operand, Program, RuntimeFault, Value, Vm};

fn build(instrs: Vec<Instr>) -> Program {
    Program::load(instrs).expect("valid program")
}

#[test]
fn round_trip_through_binary_format() {
    let program = vec![
        Instr::new(Opcode::Push, Operand::Val(Value::Int(1))),
        Instr::new(Opcode::Push, Operand::Val(Value::Int(2))),
        Instr::new(Opcode::Add, Operand::None),
        Instr::new(Opcode::Halt, Operand::None),
    ];
    let bytes = ralph_core::format::write_program(&program);
    let decoded = ralph_core::format::read_program(&bytes).unwrap();
    assert_eq!(decoded, program);

    let mut vm = Vm::new(true, ralph_core::vm::DEFAULT_HEAP_SIZE, ExternRegistry::new());
    vm.load(build(decoded));
    vm.run();
    assert_eq!(vm.operand_stack().last(), Some(&Value::Int(3)));
}

struct FlakyVerifier {
    succeed: bool,
}

impl ExternPrimitive for FlakyVerifier {
    fn name(&self) -> &str {
        "Verifier"
    }

    fn arity(&self) -> usize {
        1
    }

    fn call(&mut self, args: &[Value]) -> Result<Value, RuntimeFault> {
        let _ = &args[0];
        Ok(Value::Int(if self.succeed { 1 } else { 0 }))
    }
}

#[test]
fn extern_call_dispatches_to_registered_primitive() {
    let mut registry = ExternRegistry::new();
    registry.register(Box::new(FlakyVerifier { succeed: true }));
    let mut vm = Vm::new(true, ralph_core::vm::DEFAULT_HEAP_SIZE, registry);
    vm.load(build(vec![
        Instr::new(Opcode::Push, Operand::Val(Value::Str("echo ok".into()))),
        Instr::new(Opcode::ExternCall, Operand::Name("Verifier".into())),
        Instr::new(Opcode::Halt, Operand::None),
    ]));
    vm.run();
    assert_eq!(vm.operand_stack().last(), Some(&Value::Int(1)));
}

#[test]
fn debugger_breakpoint_then_continue_to_halt() {
    let mut vm = Vm::new(true, ralph_core::vm::DEFAULT_HEAP_SIZE, ExternRegistry::new());
    vm.load(build(vec![
        Instr::new(Opcode::Push, Operand::Val(Value::Int(5))).with_line(1),
        Instr::new(Opcode::Push, Operand::Val(Value::Int(6))).with_line(2),
        Instr::new(Opcode::Mul, Operand::None).with_line(3),
        Instr::new(Opcode::Halt, Operand::None).with_line(4),
    ]));
    let mut debugger = Debugger::new();
    debugger.set_breakpoint(3, None);
    assert_eq!(debugger.drive(&mut vm, StepMode::Continue), SuspendReason::Breakpoint(3));
    assert_eq!(debugger.drive(&mut vm, StepMode::Continue), SuspendReason::Halted);
    assert_eq!(vm.operand_stack().last(), Some(&Value::Int(30)));
}

#[test]
fn unresolved_extern_primitive_is_extern_call_error_and_recovers() {
    let mut vm = Vm::new(true, ralph_core::vm::DEFAULT_HEAP_SIZE, ExternRegistry::new());
    vm.load(build(vec![
        Instr::new(Opcode::Push, Operand::Val(Value::Str("x".into()))),
        Instr::new(Opcode::ExternCall, Operand::Name("Nonexistent".into())),
        Instr::new(Opcode::Halt, Operand::None),
    ]));
    vm.run();
    assert_eq!(vm.operand_stack().last(), Some(&Value::Int(0)));
    assert_eq!(vm.error_center().len(), 1);
}
