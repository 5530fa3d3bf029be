use super::*;
use crate::externs::ExternRegistry;
use crate::instr::{Instr, Opcode, Operand, Program};
use crate::value::Value;
use crate::vm::DEFAULT_HEAP_SIZE;

fn program_with_lines() -> Vm {
    let mut vm = Vm::new(true, DEFAULT_HEAP_SIZE, ExternRegistry::new());
    let instrs = vec![
        Instr::new(Opcode::Push, Operand::Val(Value::Int(1))).with_line(1),
        Instr::new(Opcode::Push, Operand::Val(Value::Int(2))).with_line(2),
        Instr::new(Opcode::Add, Operand::None).with_line(3),
        Instr::new(Opcode::Push, Operand::Val(Value::Int(10))).with_line(4),
        Instr::new(Opcode::Div, Operand::None).with_line(5),
        Instr::new(Opcode::Halt, Operand::None).with_line(6),
    ];
    vm.load(Program::load(instrs).unwrap());
    vm
}

#[test]
fn breakpoint_suspends_at_the_right_line_and_counts_hits() {
    let mut vm = program_with_lines();
    let mut dbg = Debugger::new();
    dbg.set_breakpoint(3, None);
    let reason = dbg.drive(&mut vm, StepMode::Continue);
    assert_eq!(reason, SuspendReason::Breakpoint(3));
    assert_eq!(vm.current_line(), Some(3));
    assert_eq!(dbg.list_breakpoints()[0].hit_count, 1);
}

#[test]
fn conditional_breakpoint_only_fires_when_condition_holds() {
    let mut vm = program_with_lines();
    let mut dbg = Debugger::new();
    dbg.set_breakpoint(4, Some("stack_depth > 3".to_string()));
    let reason = dbg.drive(&mut vm, StepMode::Continue);
    // stack_depth never exceeds 1 in this program, so the breakpoint never
    // fires and the program runs to halt.
    assert_eq!(reason, SuspendReason::Halted);
}

#[test]
fn next_steps_over_a_call_without_descending() {
    let mut vm = Vm::new(true, DEFAULT_HEAP_SIZE, ExternRegistry::new());
    vm.load(
        Program::load(vec![
            Instr::new(Opcode::Call, Operand::Name("f".into())).with_line(1),
            Instr::new(Opcode::Push, Operand::Val(Value::Int(1))).with_line(2),
            Instr::new(Opcode::Halt, Operand::None).with_line(3),
            Instr::new(Opcode::Label, Operand::Name("f".into())),
            Instr::new(Opcode::Push, Operand::Val(Value::Int(42))),
            Instr::new(Opcode::Return, Operand::None),
        ])
        .unwrap(),
    );
    let mut dbg = Debugger::new();
    let starting_depth = vm.call_depth();
    dbg.drive(&mut vm, StepMode::Next);
    assert_eq!(vm.call_depth(), starting_depth);
    assert_eq!(vm.current_line(), Some(2));
}

#[test]
fn watch_reports_change_direction() {
    let mut vm = program_with_lines();
    let mut dbg = Debugger::new();
    dbg.add_watch("stack_depth".to_string());
    dbg.drive(&mut vm, StepMode::Step);
    let first = dbg.refresh_watches(&vm);
    assert!(matches!(first[0].1, WatchReport::Value { direction: Direction::Same, .. }));
    dbg.drive(&mut vm, StepMode::Step);
    let second = dbg.refresh_watches(&vm);
    assert!(matches!(second[0].1, WatchReport::Value { direction: Direction::Up, .. }));
}

#[test]
fn no_implicit_breakpoint_on_attach() {
    let dbg = Debugger::new();
    assert!(dbg.list_breakpoints().is_empty());
}

#[test]
fn set_breakpoint_resolves_address_once_program_is_loaded() {
    let program = Program::load(vec![
        Instr::new(Opcode::Push, Operand::Val(Value::Int(1))).with_line(1),
        Instr::new(Opcode::Push, Operand::Val(Value::Int(2))).with_line(2),
        Instr::new(Opcode::Halt, Operand::None).with_line(3),
    ])
    .unwrap();

    let mut dbg = Debugger::new();
    dbg.set_breakpoint(2, None);
    assert_eq!(dbg.list_breakpoints()[0].address, None);

    dbg.load_program(&program);
    assert_eq!(dbg.list_breakpoints()[0].address, Some(1));

    // Breakpoints set after the program is loaded resolve immediately too.
    dbg.set_breakpoint(3, None);
    let addr_of_3 = dbg.list_breakpoints().iter().find(|b| b.line == 3).unwrap().address;
    assert_eq!(addr_of_3, Some(2));
}
