//! Arithmetic and comparison opcodes. Binary ops pop the right operand
//! first (it was pushed second), then the left, compute, and push one
//! result. Mixed int/float operands promote to float; comparisons always
//! push a numeric `0`/`1`, never a `Bool`, to match source semantics.

use std::cmp::Ordering;

use crate::error::{FaultClass, RuntimeFault};
use crate::value::{promote, Value};

use super::{underflow, Vm};

fn pop_two(vm: &mut Vm, op: &str) -> Result<(Value, Value), RuntimeFault> {
    let right = vm.operand_stack.pop().ok_or_else(|| underflow(op))?;
    let left = vm.operand_stack.pop().ok_or_else(|| underflow(op))?;
    Ok((left, right))
}

fn type_error(op: &str, left: &Value, right: &Value) -> RuntimeFault {
    RuntimeFault::new(
        FaultClass::TypeError,
        format!("{op}: cannot apply to {} and {}", left.type_name(), right.type_name()),
    )
    .with_coerce_candidates(vec![left.clone(), right.clone()])
}

pub(super) fn handle_add(vm: &mut Vm) -> Result<(), RuntimeFault> {
    let (left, right) = pop_two(vm, "Add")?;
    if let (Value::Int(a), Value::Int(b)) = (&left, &right) {
        vm.operand_stack.push(Value::Int(a + b));
        return Ok(());
    }
    let (a, b) = promote(&left, &right).ok_or_else(|| type_error("Add", &left, &right))?;
    vm.operand_stack.push(Value::Float(a + b));
    Ok(())
}

pub(super) fn handle_sub(vm: &mut Vm) -> Result<(), RuntimeFault> {
    let (left, right) = pop_two(vm, "Sub")?;
    if let (Value::Int(a), Value::Int(b)) = (&left, &right) {
        vm.operand_stack.push(Value::Int(a - b));
        return Ok(());
    }
    let (a, b) = promote(&left, &right).ok_or_else(|| type_error("Sub", &left, &right))?;
    vm.operand_stack.push(Value::Float(a - b));
    Ok(())
}

pub(super) fn handle_mul(vm: &mut Vm) -> Result<(), RuntimeFault> {
    let (left, right) = pop_two(vm, "Mul")?;
    if let (Value::Int(a), Value::Int(b)) = (&left, &right) {
        vm.operand_stack.push(Value::Int(a.saturating_mul(*b)));
        return Ok(());
    }
    let (a, b) = promote(&left, &right).ok_or_else(|| type_error("Mul", &left, &right))?;
    vm.operand_stack.push(Value::Float(a * b));
    Ok(())
}

/// `Div` always performs true division and yields a float, even for two
/// integer operands. Zero divisor is a `DivideByZero` fault, not a
/// `TypeError` — checked before the type coercion so the recovery table
/// sees the right class.
pub(super) fn handle_div(vm: &mut Vm) -> Result<(), RuntimeFault> {
    let (left, right) = pop_two(vm, "Div")?;
    let (a, b) = promote(&left, &right).ok_or_else(|| type_error("Div", &left, &right))?;
    if b == 0.0 {
        return Err(RuntimeFault::new(FaultClass::DivideByZero, "division by zero"));
    }
    vm.operand_stack.push(Value::Float(a / b));
    Ok(())
}

pub(super) fn handle_mod(vm: &mut Vm) -> Result<(), RuntimeFault> {
    let (left, right) = pop_two(vm, "Mod")?;
    if let (Value::Int(a), Value::Int(b)) = (&left, &right) {
        if *b == 0 {
            return Err(RuntimeFault::new(FaultClass::DivideByZero, "modulo by zero"));
        }
        vm.operand_stack.push(Value::Int(a % b));
        return Ok(());
    }
    let (a, b) = promote(&left, &right).ok_or_else(|| type_error("Mod", &left, &right))?;
    if b == 0.0 {
        return Err(RuntimeFault::new(FaultClass::DivideByZero, "modulo by zero"));
    }
    vm.operand_stack.push(Value::Float(a % b));
    Ok(())
}

fn compare(left: &Value, right: &Value) -> Result<Ordering, RuntimeFault> {
    match (left, right) {
        (Value::Str(a), Value::Str(b)) => Ok(a.cmp(b)),
        (Value::Bool(a), Value::Bool(b)) => Ok(a.cmp(b)),
        _ => {
            let (a, b) = promote(left, right).ok_or_else(|| type_error("compare", left, right))?;
            a.partial_cmp(&b)
                .ok_or_else(|| RuntimeFault::new(FaultClass::TypeError, "unordered comparison (NaN)"))
        }
    }
}

pub(super) fn handle_cmp(vm: &mut Vm, accept: impl Fn(Ordering) -> bool) -> Result<(), RuntimeFault> {
    let (left, right) = pop_two(vm, "compare")?;
    let ordering = compare(&left, &right)?;
    vm.operand_stack.push(Value::Int(if accept(ordering) { 1 } else { 0 }));
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::externs::ExternRegistry;

    fn vm_with(values: Vec<Value>) -> Vm {
        let mut vm = Vm::new(true, super::super::DEFAULT_HEAP_SIZE, ExternRegistry::new());
        vm.operand_stack = values;
        vm
    }

    #[test]
    fn add_ints_stays_int() {
        let mut vm = vm_with(vec![Value::Int(2), Value::Int(3)]);
        handle_add(&mut vm).unwrap();
        assert_eq!(vm.operand_stack.last(), Some(&Value::Int(5)));
    }

    #[test]
    fn div_promotes_to_float() {
        let mut vm = vm_with(vec![Value::Int(10), Value::Int(5)]);
        handle_div(&mut vm).unwrap();
        assert_eq!(vm.operand_stack.last(), Some(&Value::Float(2.0)));
    }

    #[test]
    fn div_by_zero_is_a_fault() {
        let mut vm = vm_with(vec![Value::Int(10), Value::Int(0)]);
        let err = handle_div(&mut vm).unwrap_err();
        assert_eq!(err.class, FaultClass::DivideByZero);
    }

    #[test]
    fn comparison_pushes_numeric_not_bool() {
        let mut vm = vm_with(vec![Value::Int(3), Value::Int(5)]);
        handle_cmp(&mut vm, |o| o == Ordering::Less).unwrap();
        assert_eq!(vm.operand_stack.last(), Some(&Value::Int(1)));
    }
}
