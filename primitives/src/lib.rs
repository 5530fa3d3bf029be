//! Concrete `ExternPrimitive` implementations for the three names the
//! core VM's `ExternCall` opcode recognizes: `Verifier`, `Persister`, and
//! `AiCaller`.

pub mod ai_caller;
pub mod persister;
pub mod verifier;

pub use ai_caller::{AiBackend, AiCaller};
pub use persister::Persister;
pub use verifier::Verifier;

use ralph_core::externs::ExternRegistry;
use std::time::Duration;

/// Builds a registry with all three primitives wired up with the given
/// timeouts and AI backend. This is the composition root the CLI driver
/// calls; tests construct a bare `ExternRegistry` directly when they only
/// need a subset.
pub fn default_registry(ai_backend: AiBackend, ai_endpoint: Option<String>, ai_api_key: Option<String>, verifier_timeout: Duration, ai_timeout: Duration) -> ExternRegistry {
    let mut registry = ExternRegistry::new();
    registry.register(Box::new(Verifier::new(verifier_timeout)));
    registry.register(Box::new(Persister::new()));
    registry.register(Box::new(AiCaller::new(ai_backend, ai_endpoint, ai_api_key, ai_timeout)));
    registry
}
