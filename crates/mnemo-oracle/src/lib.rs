//! HTTP oracles for mnemo.
//!
//! [`OpenAiClient`] implements both [`mnemo_core::ReasoningOracle`] and
//! [`mnemo_core::EmbeddingOracle`] against any OpenAI-compatible endpoint.

pub mod client;
pub mod config;
pub mod error;
pub mod wire;

pub use client::OpenAiClient;
pub use config::OpenAiConfig;
pub use error::{OracleHttpError, Result};
