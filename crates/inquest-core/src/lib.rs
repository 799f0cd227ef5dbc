//! # inquest-core
//!
//! Foundation types shared by every Inquest crate.
//!
//! - **Branded IDs**: `RunId`, `CallId` as newtypes for type safety
//! - **Providers**: the closed [`Provider`] set of supported model backends
//! - **Text**: bounded truncation used when preserving partial output
//! - **Logging**: `tracing` subscriber setup and log capture for tests

#![deny(unsafe_code)]

pub mod ids;
pub mod logging;
pub mod provider;
pub mod text;

pub use ids::{CallId, RunId};
pub use provider::{Provider, UnknownProviderError};
