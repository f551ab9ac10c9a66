//! Message pipeline: capabilities, truncation and submission.

pub mod hooks;
pub mod submit;
pub mod truncate;

pub use hooks::{ChatHooks, HookError, ResponseGenerator, TitleGenerator, TokenCounter};
pub use submit::{Reply, SubmitOutcome, submit};
pub use truncate::truncate;
