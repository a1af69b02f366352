//! OpenAI SSE chunks to text fragments.
//!
//! Only `delta.content` reaches the client. Response id, model, finish
//! reason and usage are recorded on the invocation span instead.

use futures_util::{Stream, StreamExt};

use async_openai::error::OpenAIError;
use async_openai::types::chat::CreateChatCompletionStreamResponse;

use helpin_observe::genai_attrs;
use helpin_types::llm::LlmError;

/// Map chat completion chunks to non-empty text fragments.
///
/// Ends with an error item (and nothing after it) if the upstream stream
/// fails mid-response.
pub fn map_text_stream<S>(
    chunks: S,
    span: tracing::Span,
) -> impl Stream<Item = Result<String, LlmError>> + Send + 'static
where
    S: Stream<Item = Result<CreateChatCompletionStreamResponse, OpenAIError>> + Send + Unpin + 'static,
{
    async_stream::stream! {
        let mut chunks = chunks;
        let mut recorded_id = false;

        while let Some(result) = chunks.next().await {
            let chunk = match result {
                Ok(chunk) => chunk,
                Err(e) => {
                    yield Err(LlmError::Stream(e.to_string()));
                    return;
                }
            };

            if !recorded_id {
                span.record(genai_attrs::GEN_AI_RESPONSE_ID, chunk.id.as_str());
                span.record(genai_attrs::GEN_AI_RESPONSE_MODEL, chunk.model.as_str());
                recorded_id = true;
            }

            if let Some(usage) = chunk.usage.as_ref() {
                span.record(genai_attrs::GEN_AI_USAGE_INPUT_TOKENS, usage.prompt_tokens);
                span.record(genai_attrs::GEN_AI_USAGE_OUTPUT_TOKENS, usage.completion_tokens);
            }

            for choice in chunk.choices {
                if let Some(reason) = choice.finish_reason {
                    span.record(
                        genai_attrs::GEN_AI_RESPONSE_FINISH_REASONS,
                        tracing::field::debug(reason),
                    );
                }
                if let Some(text) = choice.delta.content {
                    if !text.is_empty() {
                        yield Ok(text);
                    }
                }
            }
        }
    }
}
