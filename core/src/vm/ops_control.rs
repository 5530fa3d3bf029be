//! Control flow, call/return, external-call dispatch, and the two meta
//! opcodes (`Print`, `DebugInfo`). These handlers are the ones that set
//! `pc`/`advance_pc` directly rather than letting the tick loop advance.

use crate::error::{FaultClass, RuntimeFault};
use crate::instr::Operand;
use crate::vm::Frame;

use super::{underflow, Vm};

fn resolve(vm: &Vm, operand: &Operand, op: &str) -> Result<usize, RuntimeFault> {
    let name = operand
        .as_name()
        .ok_or_else(|| RuntimeFault::new(FaultClass::Generic, format!("{op} missing a label operand")))?;
    vm.program
        .as_ref()
        .and_then(|p| p.resolve_label(name))
        .ok_or_else(|| RuntimeFault::new(FaultClass::UnknownOpcode, format!("{op}: unresolved label '{name}'")))
}

pub(super) fn handle_jump(vm: &mut Vm, operand: &Operand) -> Result<(), RuntimeFault> {
    let target = resolve(vm, operand, "Jump")?;
    vm.pc = target;
    vm.advance_pc = false;
    Ok(())
}

pub(super) fn handle_jump_if(vm: &mut Vm, operand: &Operand) -> Result<(), RuntimeFault> {
    let cond = vm.operand_stack.pop().ok_or_else(|| underflow("JumpIf"))?;
    if cond.is_truthy() {
        let target = resolve(vm, operand, "JumpIf")?;
        vm.pc = target;
        vm.advance_pc = false;
    }
    Ok(())
}

pub(super) fn handle_call(vm: &mut Vm, operand: &Operand) -> Result<(), RuntimeFault> {
    let target = resolve(vm, operand, "Call")?;
    let frame = Frame {
        return_address: vm.pc + 1,
        prior_fp: vm.call_stack.len(),
        locals: Default::default(),
    };
    vm.call_stack.push(frame);
    vm.pc = target;
    vm.advance_pc = false;
    Ok(())
}

pub(super) fn handle_return(vm: &mut Vm) -> Result<(), RuntimeFault> {
    let frame = vm
        .call_stack
        .pop()
        .ok_or_else(|| RuntimeFault::new(FaultClass::StackUnderflow, "Return with an empty call stack"))?;
    vm.pc = frame.return_address;
    vm.advance_pc = false;
    Ok(())
}

pub(super) fn handle_extern_call(vm: &mut Vm, operand: &Operand) -> Result<(), RuntimeFault> {
    let name = operand
        .as_name()
        .ok_or_else(|| RuntimeFault::new(FaultClass::Generic, "ExternCall missing a name operand"))?
        .to_string();
    let arity = {
        let primitive = vm
            .externs
            .get_mut(&name)
            .ok_or_else(|| RuntimeFault::new(FaultClass::ExternCallError, format!("unregistered external primitive '{name}'")))?;
        primitive.arity()
    };
    if vm.operand_stack.len() < arity {
        return Err(underflow("ExternCall"));
    }
    let split_at = vm.operand_stack.len() - arity;
    let mut args: Vec<_> = vm.operand_stack.split_off(split_at);
    // `split_off` keeps push order (oldest first); the primitive contract is
    // pop order (last-pushed argument first), so reverse before dispatch.
    args.reverse();
    let primitive = vm.externs.get_mut(&name).unwrap();
    match primitive.call(&args) {
        Ok(value) => {
            vm.operand_stack.push(value);
            Ok(())
        }
        Err(e) => Err(RuntimeFault::new(FaultClass::ExternCallError, e.to_string())),
    }
}

pub(super) fn handle_print(vm: &mut Vm) -> Result<(), RuntimeFault> {
    let value = vm.operand_stack.pop().ok_or_else(|| underflow("Print"))?;
    let line = value.to_string();
    vm.out_sink.emit(&line);
    Ok(())
}

pub(super) fn handle_debug_info(vm: &mut Vm) -> Result<(), RuntimeFault> {
    let line = format!(
        "pc={} stack_depth={} call_depth={} instr_count={}",
        vm.pc,
        vm.operand_stack.len(),
        vm.call_stack.len(),
        vm.instr_count
    );
    vm.debug_sink.emit(&line);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::externs::ExternRegistry;
    use crate::instr::{Instr, Opcode, Program};
    use crate::value::Value;

    fn loaded_vm(instructions: Vec<Instr>) -> Vm {
        let mut vm = Vm::new(true, super::super::DEFAULT_HEAP_SIZE, ExternRegistry::new());
        vm.load(Program::load(instructions).unwrap());
        vm
    }

    #[test]
    fn call_then_return_restores_pc_and_depth() {
        let mut vm = loaded_vm(vec![
            Instr::new(Opcode::Call, Operand::Name("f".into())),
            Instr::new(Opcode::Halt, Operand::None),
            Instr::new(Opcode::Label, Operand::Name("f".into())),
            Instr::new(Opcode::Push, Operand::Val(Value::Int(42))),
            Instr::new(Opcode::Return, Operand::None),
        ]);
        vm.run();
        assert_eq!(vm.call_stack.len(), 0);
        assert_eq!(vm.operand_stack.last(), Some(&Value::Int(42)));
    }

    #[test]
    fn jump_if_skips_when_falsy() {
        let mut vm = loaded_vm(vec![
            Instr::new(Opcode::Push, Operand::Val(Value::Int(0))),
            Instr::new(Opcode::JumpIf, Operand::Name("end".into())),
            Instr::new(Opcode::Push, Operand::Val(Value::Int(99))),
            Instr::new(Opcode::Label, Operand::Name("end".into())),
            Instr::new(Opcode::Halt, Operand::None),
        ]);
        vm.run();
        assert_eq!(vm.operand_stack.last(), Some(&Value::Int(99)));
    }

    #[test]
    fn unresolved_label_is_unknown_opcode() {
        let mut vm = loaded_vm(vec![Instr::new(Opcode::Jump, Operand::Name("missing".into()))]);
        vm.run();
        assert_eq!(vm.error_center().log()[0].class, FaultClass::UnknownOpcode);
    }

    /// Records the args it was called with, in whatever order the VM hands
    /// them over, into a handle the test keeps so it can inspect them after
    /// `vm.run()` without downcasting the registry's trait object.
    struct RecordingPrimitive(std::rc::Rc<std::cell::RefCell<Vec<Value>>>);

    impl crate::externs::ExternPrimitive for RecordingPrimitive {
        fn name(&self) -> &str {
            "Recorder"
        }
        fn arity(&self) -> usize {
            2
        }
        fn call(&mut self, args: &[Value]) -> Result<Value, RuntimeFault> {
            self.0.borrow_mut().extend_from_slice(args);
            Ok(Value::Int(1))
        }
    }

    #[test]
    fn extern_call_delivers_args_in_pop_order() {
        let seen = std::rc::Rc::new(std::cell::RefCell::new(Vec::new()));
        let mut registry = ExternRegistry::new();
        registry.register(Box::new(RecordingPrimitive(seen.clone())));
        let mut vm = Vm::new(true, super::super::DEFAULT_HEAP_SIZE, registry);
        vm.load(
            Program::load(vec![
                Instr::new(Opcode::Push, Operand::Val(Value::Str("path.json".into()))),
                Instr::new(Opcode::Push, Operand::Val(Value::Int(42))),
                Instr::new(Opcode::ExternCall, Operand::Name("Recorder".into())),
                Instr::new(Opcode::Halt, Operand::None),
            ])
            .unwrap(),
        );
        vm.run();
        // `Int(42)` was pushed last, so the pop-order contract puts it first.
        assert_eq!(*seen.borrow(), vec![Value::Int(42), Value::Str("path.json".into())]);
    }
}
