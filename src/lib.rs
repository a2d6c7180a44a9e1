//! # bankkit-flow
//!
//! Headless controller for BankKit's multi-step forms: the onboarding
//! wizard, card application, identity verification, sign-in and password
//! recovery.
//!
//! A [`Flow`] is an ordered table of [`StepDefinition`]s. A
//! [`FlowController`] walks one run of it: it stores field values, shows
//! errors field by field, refuses to leave a step that does not validate
//! and hands the collected fields to a [`SubmissionCollaborator`] at the
//! end. The presentation layer only reads controller state.
//!
//! ## Features
//!
//! - **Declarative steps**: required fields and validators per step, with
//!   pass-through welcome and confirmation screens
//! - **Inline errors**: cleared as soon as a field is edited, recomputed on
//!   blur or when moving forward, every failing field marked at once
//! - **Single submission**: a second submit while one is in flight is
//!   ignored, and answers arriving after a reset are discarded
//! - **Configurable timeout**: per-flow bound on the backend call (default: 30s)
//!
//! ## Quick Start
//!
//! ```rust
//! use bankkit_flow::prelude::*;
//!
//! let mut ctrl = flows::onboarding()?.start::<String>();
//!
//! // welcome screen
//! ctrl.next();
//!
//! ctrl.set_field("email", "not-an-email");
//! ctrl.set_field("password", "short");
//! ctrl.set_field("confirm_password", "short");
//! assert_eq!(ctrl.next(), Advance::Blocked);
//! assert_eq!(ctrl.error("email"), Some("Please enter a valid email address."));
//! assert_eq!(ctrl.error("password"), Some("Password must be at least 8 characters."));
//! assert_eq!(ctrl.error("confirm_password"), None);
//! # Ok::<(), FlowError>(())
//! ```
//!
//! ## Submitting
//!
//! ```rust
//! use bankkit_flow::prelude::*;
//! use async_trait::async_trait;
//!
//! struct CardService;
//!
//! #[async_trait]
//! impl SubmissionCollaborator<String> for CardService {
//!     async fn submit_step(&self, request: &SubmissionRequest) -> Result<String, SubmissionRejection> {
//!         Ok(format!("card-{}", request.payload.value("tier")))
//!     }
//! }
//!
//! # #[tokio::main]
//! # async fn main() -> Result<(), FlowError> {
//! let session = FlowSession::start(&flows::card_application()?, CardService);
//! session.set_field("tier", "gold").await;
//!
//! assert_eq!(session.next().await, Advance::Moved { from: 0, to: 1 });
//! let card = session.with(|ctrl| ctrl.submission().data().cloned()).await;
//! assert_eq!(card.as_deref(), Some("card-gold"));
//! # Ok(())
//! # }
//! ```

mod error;
mod flow;
mod state;
mod step;
mod submission;

pub mod flows;
pub mod prelude;
pub mod validate;

pub use error::FlowError;
pub use flow::{Advance, Flow, FlowBuilder, FlowConfig, FlowController, FlowSnapshot};
pub use state::{FieldErrors, Fields, FlowState, Submission, SubmissionStatus};
pub use step::{StepDefinition, StepId, StepKind};
pub use submission::{
    FlowSession, Settled, SubmissionCollaborator, SubmissionRejection, SubmissionRequest,
    SubmissionTicket, SubmitSkipped, TIMEOUT_MESSAGE,
};
pub use validate::{PasswordStrength, ValidationResult, Validator};
