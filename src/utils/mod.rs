//! Utility modules.

pub mod retry;
pub mod text;

pub use retry::{RetryConfig, RetryResult, Retryable, with_retry};
pub use text::{content_hash, has_meaningful_content, normalize_text};
