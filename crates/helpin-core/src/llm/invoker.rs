//! ModelInvoker trait definition.
//!
//! An invocation is a lazy, finite, non-restartable sequence of text
//! fragments plus a handle that stops generation upstream. `invoke` resolves
//! only once the backend has accepted the request, so connection and
//! authentication failures surface before any response is committed.

use std::fmt;
use std::pin::Pin;

use futures_util::Stream;
use tokio_util::sync::CancellationToken;

use helpin_types::llm::{LlmError, ModelRequest};

/// Incremental model output.
pub type FragmentStream = Pin<Box<dyn Stream<Item = Result<String, LlmError>> + Send + 'static>>;

/// Stops an in-flight invocation. The underlying action runs at most once.
pub struct AbortHandle {
    action: Option<Box<dyn FnOnce() + Send + 'static>>,
    fired: bool,
}

impl AbortHandle {
    pub fn new(action: impl FnOnce() + Send + 'static) -> Self {
        Self {
            action: Some(Box::new(action)),
            fired: false,
        }
    }

    /// Abort by cancelling `token`.
    pub fn from_token(token: CancellationToken) -> Self {
        Self::new(move || token.cancel())
    }

    /// A handle with nothing to stop.
    pub fn noop() -> Self {
        Self {
            action: None,
            fired: false,
        }
    }

    /// Fire the abort. Returns `true` only on the first call.
    pub fn abort(&mut self) -> bool {
        if self.fired {
            return false;
        }
        self.fired = true;
        if let Some(action) = self.action.take() {
            action();
        }
        true
    }

    pub fn is_aborted(&self) -> bool {
        self.fired
    }
}

impl fmt::Debug for AbortHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AbortHandle")
            .field("fired", &self.fired)
            .finish_non_exhaustive()
    }
}

/// One accepted model call.
pub struct ModelInvocation {
    pub fragments: FragmentStream,
    pub abort: AbortHandle,
}

impl ModelInvocation {
    pub fn new(fragments: FragmentStream, abort: AbortHandle) -> Self {
        Self { fragments, abort }
    }

    pub fn into_parts(self) -> (FragmentStream, AbortHandle) {
        (self.fragments, self.abort)
    }
}

impl fmt::Debug for ModelInvocation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ModelInvocation")
            .field("abort", &self.abort)
            .finish_non_exhaustive()
    }
}

/// Trait for text-generation backends.
///
/// Implementations live in helpin-infra (e.g., `OpenAiInvoker`).
pub trait ModelInvoker: Send + Sync {
    /// Backend name used in logs and spans (e.g., "openai").
    fn name(&self) -> &str;

    /// Model identifier requests are sent to.
    fn model(&self) -> &str;

    /// Start generating. Resolves once the backend accepted the request.
    fn invoke(
        &self,
        request: ModelRequest,
    ) -> impl std::future::Future<Output = Result<ModelInvocation, LlmError>> + Send;
}
