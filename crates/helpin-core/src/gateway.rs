//! ChatGateway: one chat request from validation to persistence.
//!
//! `begin` runs everything that can still produce a structured error
//! (validation, quota, model connection). `stream` relays the accepted
//! invocation to the client and, once the client has seen the whole
//! response, saves the exchange. Splitting the two lets the HTTP layer map
//! early failures to status codes and hand the rest to a background task.

use std::sync::{Arc, Mutex};

use futures_util::StreamExt;
use tokio_util::sync::CancellationToken;
use tracing::{Instrument, debug, info, info_span, warn};
use uuid::Uuid;

use helpin_types::chat::{ChatMessage, ChatPhase, ChatRequest, MAX_CHAT_MESSAGES, MAX_MESSAGE_CHARS};
use helpin_types::config::ModelConfig;
use helpin_types::conversation::SavedConversation;
use helpin_types::error::GatewayError;
use helpin_types::llm::ModelRequest;
use helpin_types::principal::PrincipalId;

use crate::clock::{Clock, SystemClock};
use crate::conversation::{ConversationRepository, ConversationStore, derive_title};
use crate::llm::span::StreamInSpan;
use crate::llm::{FragmentStream, ModelInvocation, ModelInvoker};
use crate::quota::{DashMapRateStore, RateLimiter, RateWindowStore};
use crate::relay::{FragmentSink, RelayOutcome, ResponseHead, StreamRelay};

/// Model parameters applied to every request.
#[derive(Debug, Clone)]
pub struct GatewaySettings {
    pub system_prompt: String,
    pub max_output_tokens: u32,
    pub temperature: f32,
}

impl From<&ModelConfig> for GatewaySettings {
    fn from(config: &ModelConfig) -> Self {
        Self {
            system_prompt: config.system_prompt.clone(),
            max_output_tokens: config.max_output_tokens,
            temperature: config.temperature,
        }
    }
}

impl Default for GatewaySettings {
    fn default() -> Self {
        Self::from(&ModelConfig::default())
    }
}

/// One admitted chat request with an accepted model invocation.
///
/// Dropping a session without streaming it drops the invocation, which
/// releases the upstream connection.
pub struct StreamSession {
    id: Uuid,
    principal: PrincipalId,
    conversation_id: Option<Uuid>,
    history: Vec<ChatMessage>,
    invocation: ModelInvocation,
    head: ResponseHead,
    span: tracing::Span,
}

impl StreamSession {
    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn principal(&self) -> &PrincipalId {
        &self.principal
    }

    /// Metadata the transport must commit before the body.
    pub fn head(&self) -> ResponseHead {
        self.head
    }
}

/// Result of streaming a session.
#[derive(Debug)]
pub struct ChatOutcome {
    /// One of `Completed`, `Aborted`, `Failed`.
    pub phase: ChatPhase,
    pub fragments: usize,
    /// Set when the completed exchange was persisted.
    pub saved: Option<SavedConversation>,
    /// Set when the model failed after the response began.
    pub error: Option<GatewayError>,
}

/// Orchestrates quota, model invocation, relay and persistence.
pub struct ChatGateway<I, R, S = DashMapRateStore, C = SystemClock>
where
    I: ModelInvoker,
    R: ConversationRepository,
    S: RateWindowStore,
    C: Clock,
{
    invoker: I,
    limiter: Arc<RateLimiter<S, C>>,
    store: Arc<ConversationStore<R, C>>,
    relay: StreamRelay,
    settings: GatewaySettings,
}

impl<I, R, S, C> ChatGateway<I, R, S, C>
where
    I: ModelInvoker,
    R: ConversationRepository,
    S: RateWindowStore,
    C: Clock,
{
    pub fn new(
        invoker: I,
        limiter: Arc<RateLimiter<S, C>>,
        store: Arc<ConversationStore<R, C>>,
        settings: GatewaySettings,
    ) -> Self {
        Self {
            invoker,
            limiter,
            store,
            relay: StreamRelay::new(),
            settings,
        }
    }

    pub fn limiter(&self) -> &Arc<RateLimiter<S, C>> {
        &self.limiter
    }

    pub fn store(&self) -> &Arc<ConversationStore<R, C>> {
        &self.store
    }

    pub fn invoker(&self) -> &I {
        &self.invoker
    }

    /// Validate, consume quota, and open the model invocation.
    ///
    /// Invalid input is rejected before any quota is consumed. A refused
    /// quota check never reaches the model. A consumed slot is not refunded
    /// when the model then fails to start.
    pub async fn begin(
        &self,
        principal: &PrincipalId,
        request: ChatRequest,
    ) -> Result<StreamSession, GatewayError> {
        let span = info_span!(
            "gen_ai.chat",
            gen_ai.system = self.invoker.name(),
            gen_ai.request.model = %self.invoker.model(),
            gen_ai.request.max_tokens = self.settings.max_output_tokens,
            gen_ai.request.temperature = self.settings.temperature,
            principal = %principal,
            chat.phase = ChatPhase::Received.as_str(),
        );

        match self
            .admit(principal, request, &span)
            .instrument(span.clone())
            .await
        {
            Ok(session) => {
                record_phase(&session.span, ChatPhase::Streaming);
                Ok(session)
            }
            Err(e) => {
                record_phase(&span, ChatPhase::refused_by(&e));
                Err(e)
            }
        }
    }

    async fn admit(
        &self,
        principal: &PrincipalId,
        request: ChatRequest,
        span: &tracing::Span,
    ) -> Result<StreamSession, GatewayError> {
        validate_messages(&request.messages)?;

        let decision = self.limiter.check_and_consume(principal);
        if !decision.allowed {
            return Err(GatewayError::RateLimitExceeded {
                reset_in_minutes: decision.reset_in_minutes.unwrap_or(0),
                max: self.limiter.max(),
            });
        }
        record_phase(span, ChatPhase::RateChecked);

        let model_request = ModelRequest {
            system_prompt: self.settings.system_prompt.clone(),
            messages: request.messages.clone(),
            max_output_tokens: self.settings.max_output_tokens,
            temperature: self.settings.temperature,
        };

        let invocation = self.invoker.invoke(model_request).await.map_err(|e| {
            warn!(principal = %principal, error = %e, "model invocation failed before streaming");
            GatewayError::UpstreamUnavailable(e.to_string())
        })?;

        Ok(StreamSession {
            id: Uuid::now_v7(),
            principal: principal.clone(),
            conversation_id: request.conversation_id,
            history: request.messages,
            invocation,
            head: ResponseHead::plain_text(self.limiter.snapshot(&decision)),
            span: span.clone(),
        })
    }

    /// Relay the session to `sink`, then persist the exchange if it completed.
    ///
    /// The sink is closed before saving, so the client never waits on storage.
    pub async fn stream<K: FragmentSink>(
        &self,
        session: StreamSession,
        sink: K,
        cancel: &CancellationToken,
    ) -> ChatOutcome {
        let StreamSession {
            id,
            principal,
            conversation_id,
            history,
            invocation,
            head,
            span,
        } = session;

        let chat_span = span.clone();
        let transcript = Arc::new(Mutex::new(String::new()));
        let (fragments, abort) = invocation.into_parts();
        let tap = Arc::clone(&transcript);
        let fragments: FragmentStream = Box::pin(StreamInSpan::new(
            fragments.inspect(move |item| {
                if let (Ok(fragment), Ok(mut text)) = (item, tap.lock()) {
                    text.push_str(fragment);
                }
            }),
            span,
        ));

        let outcome = self
            .relay
            .relay(fragments, abort, head, sink, cancel)
            .await;
        let text = transcript
            .lock()
            .map(|mut t| std::mem::take(&mut *t))
            .unwrap_or_default();

        let outcome = match outcome {
            RelayOutcome::Completed { fragments } => {
                let saved = if text.trim().is_empty() {
                    debug!(session = %id, principal = %principal, "empty completion, nothing to save");
                    None
                } else {
                    self.persist(&principal, conversation_id, history, text).await
                };
                info!(session = %id, principal = %principal, fragments, "chat completed");
                ChatOutcome {
                    phase: ChatPhase::Completed,
                    fragments,
                    saved,
                    error: None,
                }
            }
            RelayOutcome::Aborted { fragments } => {
                info!(session = %id, principal = %principal, fragments, "chat aborted by client");
                ChatOutcome {
                    phase: ChatPhase::Aborted,
                    fragments,
                    saved: None,
                    error: None,
                }
            }
            RelayOutcome::Failed { fragments, error } => ChatOutcome {
                phase: ChatPhase::Failed,
                fragments,
                saved: None,
                error: Some(GatewayError::MidStreamFailure(error.to_string())),
            },
        };
        record_phase(&chat_span, outcome.phase);
        outcome
    }

    /// `begin` followed by `stream`.
    pub async fn run<K: FragmentSink>(
        &self,
        principal: &PrincipalId,
        request: ChatRequest,
        sink: K,
        cancel: &CancellationToken,
    ) -> Result<ChatOutcome, GatewayError> {
        let session = self.begin(principal, request).await?;
        Ok(self.stream(session, sink, cancel).await)
    }

    async fn persist(
        &self,
        principal: &PrincipalId,
        conversation_id: Option<Uuid>,
        mut messages: Vec<ChatMessage>,
        reply: String,
    ) -> Option<SavedConversation> {
        messages.push(ChatMessage::assistant(reply));
        let title = derive_title(&messages);
        match self
            .store
            .save(principal, conversation_id, &title, messages)
            .await
        {
            Ok(saved) => Some(saved),
            Err(e) => {
                warn!(principal = %principal, error = %e, "failed to save completed chat");
                None
            }
        }
    }
}

fn record_phase(span: &tracing::Span, phase: ChatPhase) {
    span.record("chat.phase", phase.as_str());
}

fn validate_messages(messages: &[ChatMessage]) -> Result<(), GatewayError> {
    if messages.is_empty() || messages.len() > MAX_CHAT_MESSAGES {
        return Err(GatewayError::Validation(format!(
            "messages must contain 1 to {MAX_CHAT_MESSAGES} entries"
        )));
    }
    for (i, message) in messages.iter().enumerate() {
        let chars = message.content.chars().count();
        if chars == 0 || chars > MAX_MESSAGE_CHARS {
            return Err(GatewayError::Validation(format!(
                "messages[{i}].content must be 1 to {MAX_MESSAGE_CHARS} characters"
            )));
        }
    }
    Ok(())
}
