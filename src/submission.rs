//! The asynchronous edge of a flow: handing the collected fields to the
//! backend and folding its answer back into the controller.

use crate::error::FlowError;
use crate::flow::{Advance, Flow, FlowController, FlowSnapshot};
use crate::state::Fields;
use crate::step::StepId;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;
use thiserror::Error;
use tokio::sync::Mutex;
use tokio::time::timeout;
use tracing::{debug, warn};

/// Flow-level message used when the collaborator exceeds
/// [`FlowConfig::submit_timeout`](crate::FlowConfig::submit_timeout).
pub const TIMEOUT_MESSAGE: &str = "Request timed out.";

/// What the collaborator receives when a flow is submitted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SubmissionRequest {
    /// Name of the flow being submitted.
    pub flow: String,
    /// The data-entry step the submission was triggered from.
    pub step: StepId,
    /// Every field collected so far.
    pub payload: Fields,
}

/// A failed submission, as reported by the collaborator.
///
/// `message` is always shown at flow level. `field_errors` entries naming
/// a field of the flow are also shown next to that field.
///
/// # Examples
///
/// ```
/// use bankkit_flow::SubmissionRejection;
///
/// let rejection = SubmissionRejection::new("Email already registered")
///     .with_field_error("email", "This email is already registered.");
/// assert_eq!(rejection.to_string(), "Email already registered");
/// assert_eq!(rejection.field_errors.len(), 1);
/// ```
#[derive(Error, Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[error("{message}")]
pub struct SubmissionRejection {
    pub message: String,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub field_errors: BTreeMap<String, String>,
}

impl SubmissionRejection {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            field_errors: BTreeMap::new(),
        }
    }

    pub fn with_field_error(mut self, field: impl Into<String>, message: impl Into<String>) -> Self {
        self.field_errors.insert(field.into(), message.into());
        self
    }
}

/// Why a submit request did not start.
///
/// None of these are faults; a duplicate click while a request is in
/// flight lands on [`SubmitSkipped::InFlight`] and is simply ignored.
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum SubmitSkipped {
    #[error("a submission is already in flight")]
    InFlight,
    #[error("the flow has already been submitted")]
    Completed,
    #[error("the current step is not the last data-entry step")]
    NotReady,
    #[error("the current step has invalid fields")]
    Invalid,
}

/// How a started submission ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Settled {
    Succeeded,
    Failed,
    /// The flow was reset or cancelled while the request was in flight.
    Discarded,
}

/// Proof that a submission was started, tied to the controller generation
/// it was started in.
#[derive(Debug)]
pub struct SubmissionTicket {
    generation: u64,
    request: SubmissionRequest,
}

impl SubmissionTicket {
    pub(crate) fn new(generation: u64, request: SubmissionRequest) -> Self {
        Self {
            generation,
            request,
        }
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }

    pub fn request(&self) -> &SubmissionRequest {
        &self.request
    }
}

/// The backend call that finishes a flow.
///
/// Implementations see only the request and answer with either the
/// success payload or a [`SubmissionRejection`]; transport details stay on
/// their side of the boundary.
///
/// # Examples
///
/// ```
/// use bankkit_flow::{SubmissionCollaborator, SubmissionRejection, SubmissionRequest};
/// use async_trait::async_trait;
///
/// struct CardService;
///
/// #[async_trait]
/// impl SubmissionCollaborator<String> for CardService {
///     async fn submit_step(&self, request: &SubmissionRequest) -> Result<String, SubmissionRejection> {
///         match request.payload.get("tier") {
///             Some(tier) => Ok(format!("card-{tier}")),
///             None => Err(SubmissionRejection::new("Missing card tier")),
///         }
///     }
/// }
/// ```
#[async_trait]
pub trait SubmissionCollaborator<T>: Send + Sync {
    async fn submit_step(&self, request: &SubmissionRequest) -> Result<T, SubmissionRejection>;
}

/// A controller paired with its collaborator, shareable between UI
/// handlers.
///
/// The controller lock is released while the collaborator is awaited, so
/// other handlers keep working; a second [`submit`](Self::submit) during
/// that window is skipped instead of reaching the collaborator again.
pub struct FlowSession<T> {
    controller: Arc<Mutex<FlowController<T>>>,
    collaborator: Arc<dyn SubmissionCollaborator<T>>,
}

impl<T> Clone for FlowSession<T> {
    fn clone(&self) -> Self {
        Self {
            controller: Arc::clone(&self.controller),
            collaborator: Arc::clone(&self.collaborator),
        }
    }
}

impl<T> fmt::Debug for FlowSession<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FlowSession").finish_non_exhaustive()
    }
}

impl<T: Send + 'static> FlowSession<T> {
    pub fn new(
        controller: FlowController<T>,
        collaborator: Arc<dyn SubmissionCollaborator<T>>,
    ) -> Self {
        Self {
            controller: Arc::new(Mutex::new(controller)),
            collaborator,
        }
    }

    /// Starts a fresh run of `flow` backed by `collaborator`.
    pub fn start(flow: &Flow, collaborator: impl SubmissionCollaborator<T> + 'static) -> Self {
        Self::new(flow.start(), Arc::new(collaborator))
    }

    /// Runs `f` with exclusive access to the controller.
    pub async fn with<R>(&self, f: impl FnOnce(&mut FlowController<T>) -> R) -> R {
        let mut controller = self.controller.lock().await;
        f(&mut *controller)
    }

    pub async fn set_field(&self, name: impl Into<String>, value: impl Into<String>) {
        self.controller.lock().await.set_field(name, value);
    }

    pub async fn validate_field(&self, name: &str) -> bool {
        self.controller.lock().await.validate_field(name)
    }

    pub async fn back(&self) -> Advance {
        self.controller.lock().await.back()
    }

    pub async fn go_to(&self, id: &str) -> Result<Advance, FlowError> {
        self.controller.lock().await.go_to(id)
    }

    pub async fn reset(&self) {
        self.controller.lock().await.reset();
    }

    pub async fn cancel(&self) {
        self.controller.lock().await.cancel();
    }

    pub async fn snapshot(&self) -> FlowSnapshot {
        self.controller.lock().await.snapshot()
    }

    /// Moves forward; from the last data-entry step this submits and only
    /// moves to the terminal step if the collaborator accepts.
    pub async fn next(&self) -> Advance {
        let (advance, from) = {
            let mut controller = self.controller.lock().await;
            let advance = controller.next();
            (advance, controller.current_index())
        };
        if advance != Advance::ReadyToSubmit {
            return advance;
        }

        match self.submit().await {
            Ok(Settled::Succeeded) => Advance::Moved {
                from,
                to: self.controller.lock().await.current_index(),
            },
            Ok(Settled::Failed) => Advance::Rejected,
            Ok(Settled::Discarded) | Err(_) => Advance::Unchanged,
        }
    }

    /// Submits the flow.
    ///
    /// `Pending` is entered before the collaborator is called. The answer
    /// is applied only if the flow was not reset or cancelled meanwhile.
    pub async fn submit(&self) -> Result<Settled, SubmitSkipped> {
        let (ticket, limit) = {
            let mut controller = self.controller.lock().await;
            let ticket = controller.begin_submit().map_err(|skipped| {
                debug!("Submission skipped: {}", skipped);
                skipped
            })?;
            (ticket, controller.flow().config().submit_timeout)
        };

        let call = self.collaborator.submit_step(ticket.request());
        let result = match limit {
            Some(limit) => match timeout(limit, call).await {
                Ok(result) => result,
                Err(_) => {
                    warn!(
                        "Submission of flow '{}' timed out after {:?}",
                        ticket.request().flow,
                        limit
                    );
                    Err(SubmissionRejection::new(TIMEOUT_MESSAGE))
                }
            },
            None => call.await,
        };

        Ok(self.controller.lock().await.complete_submit(ticket, result))
    }
}
