//! `Verifier`: runs a shell command as a subprocess and reports success
//! by its exit status. Grounded in the same "spawn, wait, inspect exit
//! status" shape used for the interpreter's own child-process REPL, with
//! a hard timeout so a hung verification command cannot stall the VM.

use std::process::{Command, Stdio};
use std::sync::mpsc;
use std::thread;
use std::time::Duration;

use ralph_core::externs::ExternPrimitive;
use ralph_core::{RuntimeFault, Value};

pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(60);

pub struct Verifier {
    timeout: Duration,
}

impl Verifier {
    pub fn new(timeout: Duration) -> Self {
        Verifier { timeout }
    }
}

impl Default for Verifier {
    fn default() -> Self {
        Verifier::new(DEFAULT_TIMEOUT)
    }
}

impl ExternPrimitive for Verifier {
    fn name(&self) -> &str {
        "Verifier"
    }

    fn arity(&self) -> usize {
        1
    }

    fn call(&mut self, args: &[Value]) -> Result<Value, RuntimeFault> {
        let command_line = args[0].to_string();
        log::debug!("Verifier: running '{command_line}' (timeout {:?})", self.timeout);

        let (tx, rx) = mpsc::channel();
        let timeout = self.timeout;
        let cmd_for_thread = command_line.clone();
        thread::spawn(move || {
            let outcome = run_shell(&cmd_for_thread);
            // The receiver may already have timed out and dropped; ignore.
            let _ = tx.send(outcome);
        });

        match rx.recv_timeout(timeout) {
            Ok(Ok(success)) => Ok(Value::Int(if success { 1 } else { 0 })),
            Ok(Err(e)) => Err(fault(&format!("verifier spawn failed: {e}"))),
            Err(_) => Err(fault(&format!("verifier timed out after {timeout:?}"))),
        }
    }
}

fn run_shell(command_line: &str) -> std::io::Result<bool> {
    let status = Command::new("/bin/sh")
        .arg("-c")
        .arg(command_line)
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .status()?;
    Ok(status.success())
}

fn fault(message: &str) -> RuntimeFault {
    RuntimeFault::new(ralph_core::FaultClass::ExternCallError, message)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn exit_zero_is_success() {
        let mut v = Verifier::new(Duration::from_secs(5));
        let result = v.call(&[Value::Str("exit 0".into())]).unwrap();
        assert_eq!(result, Value::Int(1));
    }

    #[test]
    fn nonzero_exit_is_failure() {
        let mut v = Verifier::new(Duration::from_secs(5));
        let result = v.call(&[Value::Str("exit 1".into())]).unwrap();
        assert_eq!(result, Value::Int(0));
    }
}
