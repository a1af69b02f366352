//! OpenAI-compatible model invoker.
//!
//! Works against api.openai.com or any gateway that speaks the chat
//! completions protocol (configured through `base_url`). Uses
//! [`async_openai`] for type-safe request/response handling and SSE
//! streaming.

pub mod streaming;

use async_openai::Client;
use async_openai::config::OpenAIConfig;
use async_openai::types::chat::{
    ChatCompletionRequestAssistantMessage, ChatCompletionRequestAssistantMessageContent,
    ChatCompletionRequestMessage, ChatCompletionRequestSystemMessage,
    ChatCompletionRequestSystemMessageContent, ChatCompletionRequestUserMessage,
    ChatCompletionRequestUserMessageContent, ChatCompletionStreamOptions,
    CreateChatCompletionRequest,
};
use futures_util::StreamExt;
use secrecy::{ExposeSecret, SecretString};
use tokio_util::sync::CancellationToken;
use tracing::{field, info_span};

use helpin_core::llm::{AbortHandle, FragmentStream, ModelInvocation, ModelInvoker};
use helpin_core::llm::span::StreamInSpan;
use helpin_observe::genai_attrs;
use helpin_types::chat::{ChatMessage, ChatRole};
use helpin_types::llm::{LlmError, ModelRequest};

use self::streaming::map_text_stream;

/// Default OpenAI endpoint.
pub const OPENAI_BASE_URL: &str = "https://api.openai.com/v1";

/// Invoker for OpenAI-compatible chat completion endpoints.
///
/// Does NOT derive Debug: the client holds the API key.
pub struct OpenAiInvoker {
    client: Client<OpenAIConfig>,
    model: String,
}

impl OpenAiInvoker {
    pub fn new(api_key: &SecretString, model: impl Into<String>, base_url: Option<&str>) -> Self {
        let config = OpenAIConfig::new()
            .with_api_key(api_key.expose_secret())
            .with_api_base(base_url.unwrap_or(OPENAI_BASE_URL));

        Self {
            client: Client::with_config(config),
            model: model.into(),
        }
    }

    /// Build a streaming [`CreateChatCompletionRequest`] with the system
    /// instruction first, then the conversation in order.
    fn build_request(&self, request: &ModelRequest) -> CreateChatCompletionRequest {
        let mut messages = Vec::with_capacity(request.messages.len() + 1);
        messages.push(ChatCompletionRequestMessage::System(
            ChatCompletionRequestSystemMessage {
                content: ChatCompletionRequestSystemMessageContent::Text(
                    request.system_prompt.clone(),
                ),
                name: None,
            },
        ));
        messages.extend(request.messages.iter().map(to_openai_message));

        CreateChatCompletionRequest {
            model: self.model.clone(),
            messages,
            max_completion_tokens: Some(request.max_output_tokens),
            temperature: Some(request.temperature),
            stream: Some(true),
            stream_options: Some(ChatCompletionStreamOptions {
                include_usage: Some(true),
                include_obfuscation: None,
            }),
            ..Default::default()
        }
    }
}

fn to_openai_message(message: &ChatMessage) -> ChatCompletionRequestMessage {
    match message.role {
        ChatRole::User => ChatCompletionRequestMessage::User(ChatCompletionRequestUserMessage {
            content: ChatCompletionRequestUserMessageContent::Text(message.content.clone()),
            name: None,
        }),
        ChatRole::Assistant => {
            #[allow(deprecated)]
            ChatCompletionRequestMessage::Assistant(ChatCompletionRequestAssistantMessage {
                content: Some(ChatCompletionRequestAssistantMessageContent::Text(
                    message.content.clone(),
                )),
                refusal: None,
                name: None,
                audio: None,
                tool_calls: None,
                function_call: None,
            })
        }
    }
}

impl ModelInvoker for OpenAiInvoker {
    fn name(&self) -> &str {
        genai_attrs::PROVIDER_OPENAI
    }

    fn model(&self) -> &str {
        &self.model
    }

    /// Opens the completion stream and waits for the first chunk, so a
    /// refused key or unreachable endpoint fails here rather than after the
    /// client response has started.
    async fn invoke(&self, request: ModelRequest) -> Result<ModelInvocation, LlmError> {
        let span = info_span!(
            "gen_ai.stream",
            gen_ai.operation.name = genai_attrs::OP_CHAT,
            gen_ai.provider.name = genai_attrs::PROVIDER_OPENAI,
            gen_ai.request.model = %self.model,
            gen_ai.response.model = field::Empty,
            gen_ai.response.id = field::Empty,
            gen_ai.response.finish_reasons = field::Empty,
            gen_ai.usage.input_tokens = field::Empty,
            gen_ai.usage.output_tokens = field::Empty,
        );

        let oai_request = self.build_request(&request);
        let mut raw = self
            .client
            .chat()
            .create_stream(oai_request)
            .await
            .map_err(map_openai_error)?;

        let first = match raw.next().await {
            Some(Ok(chunk)) => Some(Ok(chunk)),
            Some(Err(e)) => return Err(map_openai_error(e)),
            None => None,
        };
        let chunks = futures_util::stream::iter(first).chain(raw);

        let token = CancellationToken::new();
        let fragments: FragmentStream = Box::pin(StreamInSpan::new(
            map_text_stream(chunks, span.clone()).take_until(token.clone().cancelled_owned()),
            span,
        ));

        Ok(ModelInvocation::new(fragments, AbortHandle::from_token(token)))
    }
}

/// Map an `async_openai::error::OpenAIError` to an [`LlmError`].
pub(crate) fn map_openai_error(err: async_openai::error::OpenAIError) -> LlmError {
    use async_openai::error::OpenAIError;

    match &err {
        OpenAIError::ApiError(api_err) => {
            let code = api_err.code.as_deref().unwrap_or("");
            let error_type = api_err.r#type.as_deref().unwrap_or("");

            if code == "invalid_api_key"
                || error_type == "authentication_error"
                || api_err.message.contains("Incorrect API key")
            {
                LlmError::AuthenticationFailed
            } else if code == "rate_limit_exceeded" || error_type == "rate_limit_error" {
                LlmError::RateLimited
            } else {
                LlmError::Provider {
                    message: err.to_string(),
                }
            }
        }
        OpenAIError::Reqwest(reqwest_err) => match reqwest_err.status().map(|s| s.as_u16()) {
            Some(401) => LlmError::AuthenticationFailed,
            Some(429) => LlmError::RateLimited,
            _ => LlmError::Provider {
                message: err.to_string(),
            },
        },
        OpenAIError::StreamError(stream_err) => LlmError::Stream(stream_err.to_string()),
        OpenAIError::InvalidArgument(msg) => LlmError::InvalidRequest(msg.clone()),
        _ => LlmError::Provider {
            message: err.to_string(),
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn invoker() -> OpenAiInvoker {
        OpenAiInvoker::new(&SecretString::from("sk-test".to_string()), "gpt-4o-mini", None)
    }

    fn request() -> ModelRequest {
        ModelRequest {
            system_prompt: "אתה מורה".to_string(),
            messages: vec![
                ChatMessage::user("מה זה וקטור?"),
                ChatMessage::assistant("גודל עם כיוון."),
                ChatMessage::user("דוגמה?"),
            ],
            max_output_tokens: 800,
            temperature: 0.7,
        }
    }

    #[test]
    fn test_build_request_prepends_system_prompt() {
        let req = invoker().build_request(&request());
        assert_eq!(req.model, "gpt-4o-mini");
        assert_eq!(req.messages.len(), 4);
        assert!(matches!(
            req.messages[0],
            ChatCompletionRequestMessage::System(_)
        ));
        assert!(matches!(req.messages[1], ChatCompletionRequestMessage::User(_)));
        assert!(matches!(
            req.messages[2],
            ChatCompletionRequestMessage::Assistant(_)
        ));
        assert!(matches!(req.messages[3], ChatCompletionRequestMessage::User(_)));
    }

    #[test]
    fn test_build_request_streaming_parameters() {
        let req = invoker().build_request(&request());
        assert_eq!(req.max_completion_tokens, Some(800));
        assert_eq!(req.temperature, Some(0.7));
        assert_eq!(req.stream, Some(true));
        assert_eq!(
            req.stream_options.and_then(|o| o.include_usage),
            Some(true)
        );
    }

    #[test]
    fn test_name_and_model() {
        let invoker = invoker();
        assert_eq!(invoker.name(), "openai");
        assert_eq!(invoker.model(), "gpt-4o-mini");
    }

    #[test]
    fn test_map_invalid_argument() {
        let err = map_openai_error(async_openai::error::OpenAIError::InvalidArgument(
            "bad".into(),
        ));
        assert!(matches!(err, LlmError::InvalidRequest(m) if m == "bad"));
    }
}
