//! `Persister`: writes a value to disk as JSON/UTF-8.

use std::fs;
use std::path::Path;

use ralph_core::externs::ExternPrimitive;
use ralph_core::{FaultClass, RuntimeFault, Value};
use serde_json::Value as JsonValue;

#[derive(Default)]
pub struct Persister;

impl Persister {
    pub fn new() -> Self {
        Persister
    }
}

impl ExternPrimitive for Persister {
    fn name(&self) -> &str {
        "Persister"
    }

    fn arity(&self) -> usize {
        2
    }

    fn call(&mut self, args: &[Value]) -> Result<Value, RuntimeFault> {
        let path = args[0].to_string();
        let data = to_json(&args[1]);
        log::debug!("Persister: writing to '{path}'");
        match fs::write(Path::new(&path), data.to_string()) {
            Ok(()) => Ok(Value::Int(1)),
            Err(e) => Err(RuntimeFault::new(FaultClass::ExternCallError, format!("persist to '{path}' failed: {e}"))),
        }
    }
}

fn to_json(value: &Value) -> JsonValue {
    match value {
        Value::Int(n) => JsonValue::from(*n),
        Value::Float(f) => JsonValue::from(*f),
        Value::Bool(b) => JsonValue::from(*b),
        Value::Str(s) => JsonValue::from(s.clone()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn writes_value_as_json() {
        let dir = std::env::temp_dir().join(format!("ralph-persister-test-{}", std::process::id()));
        let path = dir.with_extension("json");
        let mut p = Persister::new();
        let result = p
            .call(&[Value::Str(path.to_string_lossy().to_string()), Value::Int(42)])
            .unwrap();
        assert_eq!(result, Value::Int(1));
        let contents = fs::read_to_string(&path).unwrap();
        assert_eq!(contents, "42");
        let _ = fs::remove_file(&path);
    }
}
