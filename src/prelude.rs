//! Commonly used types and traits

pub use crate::error::FlowError;
pub use crate::flow::{Advance, Flow, FlowController};
pub use crate::flows;
pub use crate::state::{Fields, Submission};
pub use crate::step::StepDefinition;
pub use crate::submission::{
    FlowSession, SubmissionCollaborator, SubmissionRejection, SubmissionRequest,
};
pub use crate::validate;
