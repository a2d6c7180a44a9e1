use crate::step::StepId;
use thiserror::Error;

/// Errors raised when a flow is defined or navigated incorrectly.
///
/// Validation failures and collaborator rejections are *not* reported
/// through this type: they are exposed as plain controller state
/// ([`FieldErrors`](crate::FieldErrors) and
/// [`Submission::Failed`](crate::Submission::Failed)) so the presentation
/// layer can render them.
///
/// # Non-Exhaustive
///
/// This enum is marked `#[non_exhaustive]`; include a wildcard arm when
/// matching on it:
///
/// ```
/// use bankkit_flow::FlowError;
///
/// fn describe(error: &FlowError) -> String {
///     match error {
///         FlowError::Configuration(msg) => format!("bad flow table: {msg}"),
///         FlowError::StepNotFound(id) => format!("no step named {id}"),
///         FlowError::TerminalStep(id) => format!("{id} is reached by submitting"),
///         _ => error.to_string(),
///     }
/// }
/// ```
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum FlowError {
    /// The step table is invalid.
    ///
    /// Returned by [`FlowBuilder::build`](crate::FlowBuilder::build) when
    /// the table breaks one of the structural rules (missing terminal step,
    /// misplaced intro step, duplicate ids and so on).
    #[error("Invalid flow configuration: {0}")]
    Configuration(String),

    /// A step id passed to the controller does not exist in the flow.
    #[error("Step not found: {0}")]
    StepNotFound(StepId),

    /// The terminal step can only be entered through a successful submission.
    #[error("Step '{0}' is terminal and can only be reached by submitting the flow")]
    TerminalStep(StepId),
}
