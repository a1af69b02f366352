//! Invoker used when no model API key is available.
//!
//! The server still starts; every chat request fails before streaming with
//! `LlmError::NotConfigured`, which the gateway reports as unavailable.

use helpin_core::llm::{ModelInvocation, ModelInvoker};
use helpin_types::llm::{LlmError, ModelRequest};

pub struct UnconfiguredInvoker {
    model: String,
}

impl UnconfiguredInvoker {
    pub fn new(model: impl Into<String>) -> Self {
        Self {
            model: model.into(),
        }
    }
}

impl ModelInvoker for UnconfiguredInvoker {
    fn name(&self) -> &str {
        "unconfigured"
    }

    fn model(&self) -> &str {
        &self.model
    }

    async fn invoke(&self, _request: ModelRequest) -> Result<ModelInvocation, LlmError> {
        Err(LlmError::NotConfigured)
    }
}
