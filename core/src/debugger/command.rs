//! Parses the interactive debugger command line
//! (`continue|step|next|finish|break|delete|list|watch|print|info|help|quit`)
//! into a typed `Command` and renders the result of executing one back to
//! text for the REPL to print.

use crate::vm::Vm;

use super::{Debugger, StepMode, SuspendReason};

#[derive(Debug, Clone, PartialEq)]
pub enum Command {
    Continue,
    Step,
    Next,
    Finish,
    Break { line: u32, condition: Option<String> },
    Delete { line: u32 },
    List,
    Watch { expr: String },
    Print { expr: Option<String> },
    Info,
    Help,
    Quit,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ParseError(pub String);

/// Parses one line of debugger input. Unknown commands and malformed
/// arguments are reported, never panicked on.
pub fn parse(line: &str) -> Result<Command, ParseError> {
    let line = line.trim();
    let mut parts = line.splitn(2, char::is_whitespace);
    let head = parts.next().unwrap_or("").to_lowercase();
    let rest = parts.next().unwrap_or("").trim();
    match head.as_str() {
        "continue" | "c" => Ok(Command::Continue),
        "step" | "s" => Ok(Command::Step),
        "next" | "n" => Ok(Command::Next),
        "finish" | "f" => Ok(Command::Finish),
        "break" | "b" => {
            let mut args = rest.splitn(2, char::is_whitespace);
            let line_str = args.next().ok_or_else(|| ParseError("break requires a line number".into()))?;
            let line = line_str
                .parse::<u32>()
                .map_err(|_| ParseError(format!("not a line number: '{line_str}'")))?;
            let condition = args.next().map(|s| s.trim().to_string()).filter(|s| !s.is_empty());
            Ok(Command::Break { line, condition })
        }
        "delete" | "d" => {
            let line = rest
                .parse::<u32>()
                .map_err(|_| ParseError(format!("not a line number: '{rest}'")))?;
            Ok(Command::Delete { line })
        }
        "list" | "l" => Ok(Command::List),
        "watch" | "w" => {
            if rest.is_empty() {
                return Err(ParseError("watch requires an expression".into()));
            }
            Ok(Command::Watch { expr: rest.to_string() })
        }
        "print" | "p" => Ok(Command::Print {
            expr: if rest.is_empty() { None } else { Some(rest.to_string()) },
        }),
        "info" | "i" => Ok(Command::Info),
        "help" | "h" | "?" => Ok(Command::Help),
        "quit" | "q" => Ok(Command::Quit),
        "" => Err(ParseError("empty command".into())),
        other => Err(ParseError(format!("unknown command '{other}' (try 'help')"))),
    }
}

/// Executes one parsed command against `(debugger, vm)` and returns the
/// text the REPL should print.
pub fn execute(debugger: &mut Debugger, vm: &mut Vm, cmd: Command) -> String {
    match cmd {
        Command::Continue => describe(debugger.drive(vm, StepMode::Continue), vm),
        Command::Step => describe(debugger.drive(vm, StepMode::Step), vm),
        Command::Next => describe(debugger.drive(vm, StepMode::Next), vm),
        Command::Finish => describe(debugger.drive(vm, StepMode::Finish), vm),
        Command::Break { line, condition } => {
            debugger.set_breakpoint(line, condition.clone());
            match condition {
                Some(c) => format!("breakpoint set at line {line} if {c}"),
                None => format!("breakpoint set at line {line}"),
            }
        }
        Command::Delete { line } => {
            if debugger.delete_breakpoint(line) {
                format!("breakpoint at line {line} deleted")
            } else {
                format!("no breakpoint at line {line}")
            }
        }
        Command::List => {
            let bps = debugger.list_breakpoints();
            if bps.is_empty() {
                "no breakpoints set".to_string()
            } else {
                bps.iter()
                    .map(|b| format!("line {} hits={} enabled={}{}", b.line, b.hit_count, b.enabled, b.condition.as_ref().map(|c| format!(" if {c}")).unwrap_or_default()))
                    .collect::<Vec<_>>()
                    .join("\n")
            }
        }
        Command::Watch { expr } => {
            debugger.add_watch(expr.clone());
            format!("watching '{expr}'")
        }
        Command::Print { expr } => match expr {
            None => format!("{:?}", vm.snapshot()),
            Some(e) => match debugger.evaluate(vm, &e) {
                Ok(v) => v.to_string(),
                Err(err) => format!("error: {err}"),
            },
        },
        Command::Info => {
            let snap = vm.snapshot();
            format!(
                "pc={} running={} fault={:?} stack_depth={} call_depth={} instr_count={}",
                snap.pc, snap.running, snap.fault_message, snap.operand_stack_depth, snap.call_depth, snap.instructions_executed
            )
        }
        Command::Help => HELP_TEXT.to_string(),
        Command::Quit => {
            // Quitting sets `running=false` without marking a fault.
            while vm.is_running() {
                vm.step();
            }
            "goodbye".to_string()
        }
    }
}

fn describe(reason: SuspendReason, vm: &Vm) -> String {
    match reason {
        SuspendReason::Breakpoint(line) => format!("breakpoint hit at line {line} (pc={})", vm.pc()),
        SuspendReason::StepComplete => format!("stopped at pc={}", vm.pc()),
        SuspendReason::Halted => "program halted".to_string(),
        SuspendReason::Faulted => format!("program faulted: {:?}", vm.snapshot().fault_message),
    }
}

const HELP_TEXT: &str = "\
continue|c            run until the next breakpoint or termination
step|s                execute one instruction
next|n                step over a call
finish|f              run until the current call returns
break|b <line> [cond] set a breakpoint, optionally conditional
delete|d <line>       remove a breakpoint
list|l                list breakpoints
watch|w <expr>        add a watch expression
print|p [expr]        evaluate an expression, or dump state if omitted
info|i                show machine state
help|h                show this text
quit|q                stop execution and exit";

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_break_with_condition() {
        let cmd = parse("break 12 stack_depth > 2").unwrap();
        assert_eq!(
            cmd,
            Command::Break {
                line: 12,
                condition: Some("stack_depth > 2".to_string())
            }
        );
    }

    #[test]
    fn parses_bare_commands() {
        assert_eq!(parse("continue").unwrap(), Command::Continue);
        assert_eq!(parse("q").unwrap(), Command::Quit);
    }

    #[test]
    fn rejects_unknown_command() {
        assert!(parse("frobnicate").is_err());
    }
}
