//! BoxModelInvoker -- object-safe dynamic dispatch wrapper for ModelInvoker.
//!
//! 1. Define an object-safe `ModelInvokerDyn` trait with boxed futures
//! 2. Blanket-impl `ModelInvokerDyn` for all `T: ModelInvoker`
//! 3. `BoxModelInvoker` wraps `Box<dyn ModelInvokerDyn>` and delegates

use std::future::Future;
use std::pin::Pin;

use helpin_types::llm::{LlmError, ModelRequest};

use super::invoker::{ModelInvocation, ModelInvoker};

/// Object-safe version of [`ModelInvoker`] with boxed futures.
pub trait ModelInvokerDyn: Send + Sync {
    fn name(&self) -> &str;

    fn model(&self) -> &str;

    fn invoke_boxed(
        &self,
        request: ModelRequest,
    ) -> Pin<Box<dyn Future<Output = Result<ModelInvocation, LlmError>> + Send + '_>>;
}

impl<T: ModelInvoker> ModelInvokerDyn for T {
    fn name(&self) -> &str {
        ModelInvoker::name(self)
    }

    fn model(&self) -> &str {
        ModelInvoker::model(self)
    }

    fn invoke_boxed(
        &self,
        request: ModelRequest,
    ) -> Pin<Box<dyn Future<Output = Result<ModelInvocation, LlmError>> + Send + '_>> {
        Box::pin(self.invoke(request))
    }
}

/// Type-erased model invoker, chosen at startup (real backend or the
/// unconfigured fallback).
pub struct BoxModelInvoker {
    inner: Box<dyn ModelInvokerDyn + Send + Sync>,
}

impl BoxModelInvoker {
    pub fn new<T: ModelInvoker + 'static>(invoker: T) -> Self {
        Self {
            inner: Box::new(invoker),
        }
    }
}

impl ModelInvoker for BoxModelInvoker {
    fn name(&self) -> &str {
        self.inner.name()
    }

    fn model(&self) -> &str {
        self.inner.model()
    }

    async fn invoke(&self, request: ModelRequest) -> Result<ModelInvocation, LlmError> {
        self.inner.invoke_boxed(request).await
    }
}
