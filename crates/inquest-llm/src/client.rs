//! The model collaborator contract.

use async_trait::async_trait;

use crate::errors::ModelError;
use crate::models::ResolvedModel;
use crate::types::{ModelRequest, ModelResponse};

/// Something that can answer a model request.
///
/// Vendor SDK bindings implement this outside the runtime; tests use
/// [`ScriptedModel`](crate::mock::ScriptedModel).
#[async_trait]
pub trait ModelClient: Send + Sync {
    /// Send one request to `model` and wait for the complete response.
    async fn invoke(
        &self,
        model: &ResolvedModel,
        request: &ModelRequest,
    ) -> Result<ModelResponse, ModelError>;
}
