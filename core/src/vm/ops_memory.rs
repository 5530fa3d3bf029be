//! Linear heap access: `Load a` / `Store a`, each operating on a 4-byte
//! little-endian signed cell at byte offset `a`.

use crate::error::{FaultClass, RuntimeFault};
use crate::instr::Operand;

use super::{underflow, Vm};

fn cell_address(vm: &Vm, operand: &Operand, op: &str) -> Result<usize, RuntimeFault> {
    let addr = operand
        .as_address()
        .ok_or_else(|| RuntimeFault::new(FaultClass::Generic, format!("{op} missing an address operand")))?;
    if addr < 0 || (addr as usize) + 4 > vm.heap.len() {
        return Err(RuntimeFault::new(
            FaultClass::MemoryError,
            format!("{op}: address {addr} out of range (heap size {})", vm.heap.len()),
        ));
    }
    Ok(addr as usize)
}

pub(super) fn handle_load(vm: &mut Vm, operand: &Operand) -> Result<(), RuntimeFault> {
    let addr = cell_address(vm, operand, "Load")?;
    let bytes: [u8; 4] = vm.heap[addr..addr + 4].try_into().unwrap();
    vm.operand_stack.push(crate::value::Value::Int(i32::from_le_bytes(bytes) as i64));
    Ok(())
}

pub(super) fn handle_store(vm: &mut Vm, operand: &Operand) -> Result<(), RuntimeFault> {
    let addr = cell_address(vm, operand, "Store")?;
    let value = vm.operand_stack.pop().ok_or_else(|| underflow("Store"))?;
    let cell = value.as_i32_cell().ok_or_else(|| {
        RuntimeFault::new(FaultClass::TypeError, format!("Store: cannot store {} as a cell", value.type_name()))
            .with_coerce_candidates(vec![value.clone()])
    })?;
    vm.heap[addr..addr + 4].copy_from_slice(&cell.to_le_bytes());
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::externs::ExternRegistry;
    use crate::value::Value;

    #[test]
    fn store_then_load_round_trips() {
        let mut vm = Vm::new(true, super::super::DEFAULT_HEAP_SIZE, ExternRegistry::new());
        vm.operand_stack.push(Value::Int(7));
        handle_store(&mut vm, &Operand::Address(100)).unwrap();
        handle_load(&mut vm, &Operand::Address(100)).unwrap();
        assert_eq!(vm.operand_stack.last(), Some(&Value::Int(7)));
    }

    #[test]
    fn load_past_heap_end_is_memory_error() {
        let mut vm = Vm::new(true, super::super::DEFAULT_HEAP_SIZE, ExternRegistry::new());
        let addr = (super::super::DEFAULT_HEAP_SIZE - 3) as i64;
        let err = handle_load(&mut vm, &Operand::Address(addr)).unwrap_err();
        assert_eq!(err.class, FaultClass::MemoryError);
    }
}
