//! The LLM gateway for the Gongbu lesson pipeline.
//!
//! One entry point ([`LlmGateway`]) serves three prompt profiles
//! (`doc_import`, `practice_generation`, `practice_validation`). The gateway
//! owns the deadline, the single retry, JSON extraction and shape
//! normalisation; callers only ever see typed payloads or an [`LlmError`].

#![allow(async_fn_in_trait)]

pub mod error;
pub mod gateway;
pub mod normalize;
pub mod practice;
pub mod profile;
pub mod provider;

#[cfg(any(test, feature = "testing"))]
pub mod testing;

pub use error::{LlmError, Result};
pub use gateway::{GatewayConfig, LlmGateway};
pub use profile::Profile;
pub use provider::{CompletionProvider, OpenAiConfig, OpenAiProvider, Prompt};
