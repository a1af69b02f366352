//! Model invoker implementations.

pub mod openai;
pub mod unconfigured;

pub use openai::OpenAiInvoker;
pub use unconfigured::UnconfiguredInvoker;
