//! Final-artifact collaborator seam.
//!
//! Invoked once per completed request, off the transition's critical path: a
//! generation failure never rolls back the `completed` state and can be
//! retried independently.

use async_trait::async_trait;
use uuid::Uuid;

#[async_trait]
pub trait ArtifactGenerator: Send + Sync {
    /// Kick off final-document assembly for a completed request.
    async fn generate(&self, request_id: Uuid) -> Result<(), anyhow::Error>;
}

/// Default collaborator used until a real generator service is wired in.
pub struct LoggingArtifactGenerator;

#[async_trait]
impl ArtifactGenerator for LoggingArtifactGenerator {
    async fn generate(&self, request_id: Uuid) -> Result<(), anyhow::Error> {
        tracing::info!(request_id = %request_id, "Final artifact generation requested");
        Ok(())
    }
}
