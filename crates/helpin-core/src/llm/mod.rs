//! Model invoker abstraction and helpers.

pub mod box_invoker;
pub mod invoker;
pub mod span;

pub use box_invoker::BoxModelInvoker;
pub use invoker::{AbortHandle, FragmentStream, ModelInvocation, ModelInvoker};
