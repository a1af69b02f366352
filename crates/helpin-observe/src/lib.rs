//! Observability for the HelpIN gateway: subscriber setup and the GenAI
//! semantic convention attribute names recorded on model-call spans.

pub mod genai_attrs;
pub mod tracing_setup;
