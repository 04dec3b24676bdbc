pub mod assistants;
pub mod client;
pub mod common;
pub mod error;
pub mod files;
pub mod fine_tuning;
pub mod models;
pub mod projects;
pub mod retry;
pub mod vector_stores;

#[cfg(test)]
pub mod test_helpers;

pub use client::{Client, ClientConfig, RetryConfig, DEFAULT_BASE_URL};
pub use error::ApiError;
pub use retry::{retry_until, Poll, PollConfig};
