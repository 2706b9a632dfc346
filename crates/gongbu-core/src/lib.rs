//! Core types and trait definitions for the Gongbu lesson-notes pipeline.
//!
//! This crate is deliberately free of HTTP and database dependencies.
//! The store, LLM, API and server crates depend on it; it depends on nothing
//! proprietary.

// We intentionally use native `async fn` in traits (stabilised in Rust 1.75).
// Suppress the advisory lint about `Send` bounds on the returned futures.
#![allow(async_fn_in_trait)]

pub mod analysis;
pub mod blob;
pub mod error;
pub mod model;
pub mod practice;
pub mod source;
pub mod store;
pub mod text;

pub use error::{Error, Result};
