//! Upload workflow
//!
//! Takes a finished selection through staging and sending and always ends
//! in exactly one `UploadResult`. Every failure is folded into the result;
//! nothing is retried and nothing escapes as a panic or error.

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use tokio::task::JoinHandle;
use tracing::Instrument;
use uuid::Uuid;

use crate::errors::UploadError;
use crate::staging::StagingArea;
use crate::types::{SelectionState, UploadResult, MISSING_IMAGE_PROMPT};
use crate::upload_client::CropUploadClient;

/// Where an attempt currently is
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AttemptPhase {
    Idle,
    Staging,
    Sending,
    Succeeded,
    ServerRejected,
    TransportFailed,
}

impl AttemptPhase {
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            AttemptPhase::Succeeded | AttemptPhase::ServerRejected | AttemptPhase::TransportFailed
        )
    }

    fn can_move_to(&self, next: AttemptPhase) -> bool {
        use AttemptPhase::*;
        matches!(
            (self, next),
            (Idle, Staging)
                | (Idle, TransportFailed)
                | (Staging, Sending)
                | (Staging, TransportFailed)
                | (Sending, Succeeded)
                | (Sending, ServerRejected)
                | (Sending, TransportFailed)
        )
    }

    /// Terminal phase matching a result
    pub fn for_result(result: &UploadResult) -> AttemptPhase {
        match result {
            UploadResult::Success(_) => AttemptPhase::Succeeded,
            UploadResult::ServerError(_) => AttemptPhase::ServerRejected,
            UploadResult::TransportError(_) => AttemptPhase::TransportFailed,
        }
    }
}

impl fmt::Display for AttemptPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(self, f)
    }
}

/// Tracks the phase of one attempt and refuses to move backwards
#[derive(Debug)]
pub struct UploadAttempt {
    id: Uuid,
    phase: AttemptPhase,
    history: Vec<AttemptPhase>,
}

impl UploadAttempt {
    pub fn new() -> Self {
        Self {
            id: Uuid::new_v4(),
            phase: AttemptPhase::Idle,
            history: vec![AttemptPhase::Idle],
        }
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn phase(&self) -> AttemptPhase {
        self.phase
    }

    /// Every phase visited so far, starting with `Idle`
    pub fn history(&self) -> &[AttemptPhase] {
        &self.history
    }

    /// Move to `next`, or return an error if that transition is not allowed
    pub fn advance(&mut self, next: AttemptPhase) -> Result<(), String> {
        if !self.phase.can_move_to(next) {
            return Err(format!("Invalid transition {} -> {}", self.phase, next));
        }
        tracing::debug!(
            attempt_id = %self.id,
            from = %self.phase,
            to = %next,
            "Attempt phase changed"
        );
        self.phase = next;
        self.history.push(next);
        Ok(())
    }

    /// Record the terminal phase for `result`
    fn finish(&mut self, result: &UploadResult) {
        let terminal = AttemptPhase::for_result(result);
        if let Err(e) = self.advance(terminal) {
            // Only reachable through a bug in the workflow itself
            tracing::error!(attempt_id = %self.id, error = %e, "Attempt finished out of order");
        }
    }
}

impl Default for UploadAttempt {
    fn default() -> Self {
        Self::new()
    }
}

/// Stages a selection and sends it to the classifier
#[derive(Debug, Clone)]
pub struct UploadWorkflow {
    client: Arc<CropUploadClient>,
    staging: StagingArea,
}

impl UploadWorkflow {
    pub fn new(client: CropUploadClient, staging: StagingArea) -> Self {
        Self {
            client: Arc::new(client),
            staging,
        }
    }

    /// Workflow for `endpoint_url` using the default staging area
    pub fn for_endpoint(endpoint_url: String, timeout: Duration) -> Self {
        Self::new(
            CropUploadClient::with_timeout(endpoint_url, timeout),
            StagingArea::default(),
        )
    }

    pub fn endpoint_url(&self) -> &str {
        self.client.endpoint_url()
    }

    /// Run one attempt to completion
    pub async fn submit(&self, selection: &SelectionState) -> UploadResult {
        self.run_attempt(selection).await.1
    }

    /// Run one attempt and also return its phase history
    pub async fn run_attempt(&self, selection: &SelectionState) -> (UploadAttempt, UploadResult) {
        let attempt = UploadAttempt::new();
        let span = tracing::info_span!(
            "upload_attempt",
            attempt_id = %attempt.id(),
            crop = %selection.crop
        );
        self.drive(attempt, selection).instrument(span).await
    }

    /// Run one attempt on the tokio runtime and hand the result to `on_complete`
    ///
    /// `on_complete` runs exactly once. The returned handle may be awaited or
    /// dropped; dropping it does not cancel the attempt.
    pub fn submit_in_background<F>(
        &self,
        selection: SelectionState,
        on_complete: F,
    ) -> JoinHandle<()>
    where
        F: FnOnce(UploadResult) + Send + 'static,
    {
        let workflow = self.clone();
        tokio::spawn(async move {
            let result = workflow.submit(&selection).await;
            on_complete(result);
        })
    }

    async fn drive(
        &self,
        mut attempt: UploadAttempt,
        selection: &SelectionState,
    ) -> (UploadAttempt, UploadResult) {
        let result = match self.stage_and_send(&mut attempt, selection).await {
            Ok(body) => UploadResult::Success(body),
            Err(e) => e.into(),
        };

        attempt.finish(&result);
        match &result {
            UploadResult::Success(_) => tracing::info!("Upload attempt succeeded"),
            other => tracing::warn!(result = %other.display_text(), "Upload attempt failed"),
        }
        (attempt, result)
    }

    async fn stage_and_send(
        &self,
        attempt: &mut UploadAttempt,
        selection: &SelectionState,
    ) -> Result<String, UploadError> {
        let image = selection
            .image
            .as_ref()
            .ok_or_else(|| UploadError::Transport(MISSING_IMAGE_PROMPT.to_string()))?;

        attempt.advance(AttemptPhase::Staging).map_err(UploadError::Transport)?;
        tracing::info!(source = %image.describe(), "Staging image");
        let staged = self.staging.stage(attempt.id(), image.as_ref()).await?;

        attempt.advance(AttemptPhase::Sending).map_err(UploadError::Transport)?;
        let outcome = self.client.upload(&staged, selection.crop).await;

        staged.discard().await;
        outcome
    }
}
