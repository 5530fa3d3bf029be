//! Stack manipulation opcodes: `Push`, `Pop`, `Dup`, `Swap`.

use crate::error::RuntimeFault;
use crate::instr::Operand;

use super::{underflow, Vm};

pub(super) fn handle_push(vm: &mut Vm, operand: &Operand) -> Result<(), RuntimeFault> {
    let value = operand
        .as_value()
        .ok_or_else(|| RuntimeFault::new(crate::error::FaultClass::Generic, "Push without a value operand"))?
        .clone();
    vm.operand_stack.push(value);
    Ok(())
}

pub(super) fn handle_pop(vm: &mut Vm) -> Result<(), RuntimeFault> {
    vm.operand_stack.pop().ok_or_else(|| underflow("Pop")).map(|_| ())
}

pub(super) fn handle_dup(vm: &mut Vm) -> Result<(), RuntimeFault> {
    let top = vm.operand_stack.last().cloned().ok_or_else(|| underflow("Dup"))?;
    vm.operand_stack.push(top);
    Ok(())
}

pub(super) fn handle_swap(vm: &mut Vm) -> Result<(), RuntimeFault> {
    let len = vm.operand_stack.len();
    if len < 2 {
        return Err(underflow("Swap"));
    }
    vm.operand_stack.swap(len - 1, len - 2);
    Ok(())
}
