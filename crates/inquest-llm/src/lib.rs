//! # inquest-llm
//!
//! The model side of an investigation run.
//!
//! - **Pricing**: fixed-point [`Usd`], static price table, [`estimate_cost`]
//! - **Models**: resolve the effective model once per run
//! - **Usage**: reconcile backend-specific token usage shapes
//! - **Client**: the [`ModelClient`] contract and a scripted mock for tests

#![deny(unsafe_code)]

pub mod client;
pub mod errors;
pub mod mock;
pub mod models;
pub mod pricing;
pub mod types;
pub mod usage;

pub use client::ModelClient;
pub use errors::ModelError;
pub use models::{ResolvedModel, default_model, resolve_model};
pub use pricing::{
    CostBreakdown, Usd, estimate_cost, estimate_cost_breakdown, format_cost, format_tokens,
};
pub use types::{ChatMessage, ModelRequest, ModelResponse, Role, ToolCallRequest, ToolSpec};
pub use usage::{TokenCounts, extract_usage};
