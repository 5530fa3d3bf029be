//! `AiCaller`: invokes an AI backend with a prompt and reports success.
//! The `mock` backend performs no network access at all, which is why it
//! is the default — the crate's own test suite never depends on a live
//! service.

use std::time::Duration;

use ralph_core::externs::ExternPrimitive;
use ralph_core::{FaultClass, RuntimeFault, Value};
use serde::Serialize;

pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(300);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AiBackend {
    Mock,
    OpenAi,
    Claude,
    DeepSeek,
}

impl AiBackend {
    pub fn parse(name: &str) -> Option<AiBackend> {
        match name.to_lowercase().as_str() {
            "mock" => Some(AiBackend::Mock),
            "openai" => Some(AiBackend::OpenAi),
            "claude" => Some(AiBackend::Claude),
            "deepseek" => Some(AiBackend::DeepSeek),
            _ => None,
        }
    }

    fn default_endpoint(self) -> &'static str {
        match self {
            AiBackend::Mock => "",
            AiBackend::OpenAi => "https://api.openai.com/v1/chat/completions",
            AiBackend::Claude => "https://api.anthropic.com/v1/messages",
            AiBackend::DeepSeek => "https://api.deepseek.com/v1/chat/completions",
        }
    }
}

#[derive(Serialize)]
struct ChatRequest<'a> {
    prompt: &'a str,
}

pub struct AiCaller {
    backend: AiBackend,
    endpoint: String,
    api_key: Option<String>,
    timeout: Duration,
    client: reqwest::blocking::Client,
}

impl AiCaller {
    pub fn new(backend: AiBackend, endpoint: Option<String>, api_key: Option<String>, timeout: Duration) -> Self {
        let endpoint = endpoint.unwrap_or_else(|| backend.default_endpoint().to_string());
        let client = reqwest::blocking::Client::builder()
            .timeout(timeout)
            .build()
            .expect("reqwest client configuration is valid");
        AiCaller {
            backend,
            endpoint,
            api_key,
            timeout,
            client,
        }
    }

    pub fn mock() -> Self {
        AiCaller::new(AiBackend::Mock, None, None, DEFAULT_TIMEOUT)
    }

    fn call_mock(&self, prompt: &str) -> bool {
        log::debug!("AiCaller(mock): prompt={prompt:?}");
        !prompt.trim().is_empty()
    }

    fn call_http(&self, prompt: &str) -> Result<bool, RuntimeFault> {
        let mut request = self.client.post(&self.endpoint).json(&ChatRequest { prompt });
        if let Some(key) = &self.api_key {
            request = request.bearer_auth(key);
        }
        let response = request
            .send()
            .map_err(|e| RuntimeFault::new(FaultClass::ExternCallError, format!("AiCaller request failed: {e}")))?;
        Ok(response.status().is_success())
    }
}

impl ExternPrimitive for AiCaller {
    fn name(&self) -> &str {
        "AiCaller"
    }

    fn arity(&self) -> usize {
        1
    }

    fn call(&mut self, args: &[Value]) -> Result<Value, RuntimeFault> {
        let prompt = args[0].to_string();
        let success = match self.backend {
            AiBackend::Mock => self.call_mock(&prompt),
            AiBackend::OpenAi | AiBackend::Claude | AiBackend::DeepSeek => self.call_http(&prompt)?,
        };
        log::debug!("AiCaller: backend={:?} timeout={:?} success={success}", self.backend, self.timeout);
        Ok(Value::Int(if success { 1 } else { 0 }))
    }
}
