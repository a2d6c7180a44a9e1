use crate::error::FlowError;
use crate::state::{FieldErrors, Fields, FlowState, Submission, SubmissionStatus};
use crate::step::{StepDefinition, StepId, StepKind};
use crate::submission::{Settled, SubmissionRejection, SubmissionRequest, SubmissionTicket, SubmitSkipped};
use crate::validate::{password_strength, PasswordStrength};
use serde::Serialize;
use std::collections::HashSet;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};

/// Per-flow settings.
///
/// # Examples
///
/// ```
/// use bankkit_flow::FlowConfig;
/// use std::time::Duration;
///
/// let config = FlowConfig {
///     submit_timeout: Some(Duration::from_secs(10)),
/// };
/// assert_eq!(FlowConfig::default().submit_timeout, Some(Duration::from_secs(30)));
/// # let _ = config;
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FlowConfig {
    /// Upper bound on one collaborator call. `None` waits forever.
    /// Default: 30 seconds.
    pub submit_timeout: Option<Duration>,
}

impl Default for FlowConfig {
    fn default() -> Self {
        Self {
            submit_timeout: Some(Duration::from_secs(30)),
        }
    }
}

/// An immutable, validated step table.
///
/// Cheap to clone; every controller started from it shares the same table.
#[derive(Clone)]
pub struct Flow {
    inner: Arc<FlowDefinition>,
}

struct FlowDefinition {
    name: String,
    steps: Vec<StepDefinition>,
    config: FlowConfig,
}

impl fmt::Debug for Flow {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Flow")
            .field("name", &self.inner.name)
            .field(
                "steps",
                &self.inner.steps.iter().map(|s| s.id()).collect::<Vec<_>>(),
            )
            .field("config", &self.inner.config)
            .finish()
    }
}

impl Flow {
    pub fn builder(name: impl Into<String>) -> FlowBuilder {
        FlowBuilder::new(name)
    }

    pub fn name(&self) -> &str {
        &self.inner.name
    }

    pub fn config(&self) -> &FlowConfig {
        &self.inner.config
    }

    pub fn steps(&self) -> &[StepDefinition] {
        &self.inner.steps
    }

    pub fn step(&self, index: usize) -> Option<&StepDefinition> {
        self.inner.steps.get(index)
    }

    /// Index of the step with the given id.
    pub fn position(&self, id: &str) -> Option<usize> {
        self.inner.steps.iter().position(|s| s.id() == id)
    }

    pub fn len(&self) -> usize {
        self.inner.steps.len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.steps.is_empty()
    }

    /// Index of the terminal step, which is always the last one.
    pub fn terminal_index(&self) -> usize {
        self.inner.steps.len().saturating_sub(1)
    }

    /// Whether any step requires or validates `field`.
    pub fn declares(&self, field: &str) -> bool {
        self.inner.steps.iter().any(|s| s.declares(field))
    }

    /// Starts a fresh run of this flow.
    pub fn start<T>(&self) -> FlowController<T> {
        FlowController::new(self.clone())
    }
}

/// Builds a [`Flow`] from its steps, in order.
///
/// # Examples
///
/// ```
/// use bankkit_flow::{validate, Flow, StepDefinition};
///
/// let flow = Flow::builder("card-application")
///     .step(
///         StepDefinition::data_entry("card-tier", "Choose your card")
///             .require("tier", validate::one_of(&["standard", "gold"], "Please select a card tier.")),
///     )
///     .step(StepDefinition::terminal("confirmation", "Card on its way"))
///     .build()
///     .expect("valid flow");
///
/// assert_eq!(flow.len(), 2);
/// ```
pub struct FlowBuilder {
    name: String,
    steps: Vec<StepDefinition>,
    config: FlowConfig,
}

impl FlowBuilder {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            steps: Vec::new(),
            config: FlowConfig::default(),
        }
    }

    pub fn step(mut self, step: StepDefinition) -> Self {
        self.steps.push(step);
        self
    }

    pub fn config(mut self, config: FlowConfig) -> Self {
        self.config = config;
        self
    }

    /// Checks the table's shape: an optional intro step first, at least one
    /// data-entry step, exactly one terminal step last, unique ids, and no
    /// fields on pass-through steps.
    pub fn build(self) -> Result<Flow, FlowError> {
        let last = self.steps.len().checked_sub(1).ok_or_else(|| {
            FlowError::Configuration(format!("flow '{}' has no steps", self.name))
        })?;

        let mut seen = HashSet::new();
        for (index, step) in self.steps.iter().enumerate() {
            if !seen.insert(step.id().as_str()) {
                return Err(FlowError::Configuration(format!(
                    "duplicate step id '{}'",
                    step.id()
                )));
            }

            match step.kind() {
                StepKind::Intro if index != 0 => {
                    return Err(FlowError::Configuration(format!(
                        "intro step '{}' must be the first step",
                        step.id()
                    )));
                }
                StepKind::Terminal if index != last => {
                    return Err(FlowError::Configuration(format!(
                        "terminal step '{}' must be the last step",
                        step.id()
                    )));
                }
                StepKind::DataEntry if index == last => {
                    return Err(FlowError::Configuration(format!(
                        "flow '{}' must end with a terminal step",
                        self.name
                    )));
                }
                _ => {}
            }

            if step.is_pass_through() && step.field_names().next().is_some() {
                return Err(FlowError::Configuration(format!(
                    "step '{}' passes through and cannot declare fields",
                    step.id()
                )));
            }

            let mut required = HashSet::new();
            if let Some(field) = step.required_fields().iter().find(|f| !required.insert(*f)) {
                return Err(FlowError::Configuration(format!(
                    "field '{}' is required twice in step '{}'",
                    field,
                    step.id()
                )));
            }
        }

        if !self.steps.iter().any(|s| s.kind() == StepKind::DataEntry) {
            return Err(FlowError::Configuration(format!(
                "flow '{}' has no data-entry step",
                self.name
            )));
        }

        Ok(Flow {
            inner: Arc::new(FlowDefinition {
                name: self.name,
                steps: self.steps,
                config: self.config,
            }),
        })
    }
}

/// Result of a navigation request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case", tag = "outcome")]
pub enum Advance {
    /// The current step changed.
    Moved { from: usize, to: usize },
    /// A step failed validation; the offending fields now carry errors and
    /// the current step is unchanged.
    Blocked,
    /// The last data-entry step is valid; the flow must be submitted to
    /// reach the terminal step.
    ReadyToSubmit,
    /// The submission was rejected by the collaborator.
    Rejected,
    /// Nothing to do: already at a bound, or the flow is locked.
    Unchanged,
}

/// Serializable view of a controller for the presentation layer.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FlowSnapshot {
    pub flow: String,
    pub step: StepId,
    pub title: String,
    pub kind: StepKind,
    pub index: usize,
    pub total: usize,
    pub fields: Fields,
    pub errors: FieldErrors,
    pub submission: SubmissionStatus,
    pub failure: Option<SubmissionRejection>,
    pub password_strength: Option<PasswordStrength>,
}

/// Drives one run of a [`Flow`].
///
/// All operations are synchronous. The terminal submission is split into
/// [`begin_submit`](Self::begin_submit) and
/// [`complete_submit`](Self::complete_submit) so the collaborator can be
/// awaited without holding the controller; see
/// [`FlowSession`](crate::FlowSession) for the async wrapper.
///
/// # Examples
///
/// ```
/// use bankkit_flow::{flows, Advance};
///
/// let mut ctrl = flows::sign_in()?.start::<String>();
/// ctrl.set_field("email", "not-an-email");
/// assert_eq!(ctrl.next(), Advance::Blocked);
/// assert!(ctrl.error("email").is_some());
///
/// ctrl.set_field("email", "jo@bank.example");
/// assert!(ctrl.error("email").is_none());
/// # Ok::<(), bankkit_flow::FlowError>(())
/// ```
pub struct FlowController<T> {
    flow: Flow,
    state: FlowState<T>,
}

impl<T> fmt::Debug for FlowController<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FlowController")
            .field("flow", &self.flow.name())
            .field("current", &self.state.current)
            .field("fields", &self.state.fields)
            .field("errors", &self.state.errors)
            .field("submission", &self.state.submission.status())
            .finish()
    }
}

impl<T> FlowController<T> {
    pub fn new(flow: Flow) -> Self {
        Self {
            flow,
            state: FlowState::new(0),
        }
    }

    pub fn flow(&self) -> &Flow {
        &self.flow
    }

    pub fn state(&self) -> &FlowState<T> {
        &self.state
    }

    pub fn current_index(&self) -> usize {
        self.state.current
    }

    pub fn current_step(&self) -> &StepDefinition {
        &self.flow.steps()[self.state.current]
    }

    pub fn fields(&self) -> &Fields {
        &self.state.fields
    }

    pub fn field(&self, name: &str) -> &str {
        self.state.fields.value(name)
    }

    pub fn errors(&self) -> &FieldErrors {
        &self.state.errors
    }

    pub fn error(&self, name: &str) -> Option<&str> {
        self.state.errors.get(name).map(String::as_str)
    }

    pub fn submission(&self) -> &Submission<T> {
        &self.state.submission
    }

    /// `true` once the submission succeeded; the controller is then inert.
    pub fn is_complete(&self) -> bool {
        self.state.submission.is_succeeded()
    }

    /// One-based position of the current step and the number of steps.
    pub fn progress(&self) -> (usize, usize) {
        (self.state.current + 1, self.flow.len())
    }

    pub fn elapsed(&self) -> Duration {
        self.state.elapsed()
    }

    fn is_locked(&self) -> bool {
        matches!(
            self.state.submission,
            Submission::Pending | Submission::Succeeded(_)
        )
    }

    /// Stores a field value and drops any error shown for it.
    ///
    /// Ignored while a submission is in flight and once the flow is
    /// complete, so `fields` always matches what was sent.
    pub fn set_field(&mut self, name: impl Into<String>, value: impl Into<String>) {
        if self.is_locked() {
            debug!("Flow '{}' is locked, ignoring field update", self.flow.name());
            return;
        }
        let name = name.into();
        self.state.errors.remove(&name);
        self.state.fields.insert(name, value);
    }

    /// Validates a single field, as on blur.
    ///
    /// Uses the current step's rule for the field when it has one,
    /// otherwise the first step that declares it. Returns whether the field
    /// is valid; `errors` is updated either way.
    pub fn validate_field(&mut self, name: &str) -> bool {
        let steps = self.flow.steps();
        let owner = Some(&steps[self.state.current])
            .filter(|s| s.declares(name))
            .or_else(|| steps.iter().find(|s| s.declares(name)));

        let result = match owner {
            Some(step) => step.check_field(name, &self.state.fields),
            None => Ok(()),
        };

        match result {
            Ok(()) => {
                self.state.errors.remove(name);
                true
            }
            Err(message) => {
                self.state.errors.insert(name.to_string(), message);
                false
            }
        }
    }

    /// Validates every field of `steps[index]`, marking all failures at once.
    ///
    /// Pass-through steps are always valid. An index past the end is not.
    pub fn validate_step(&mut self, index: usize) -> bool {
        let Some(step) = self.flow.inner.steps.get(index) else {
            warn!(
                "Flow '{}' has no step at index {}",
                self.flow.name(),
                index
            );
            return false;
        };
        check_step(step, &self.state.fields, &mut self.state.errors)
    }

    /// Moves forward one step if the current one validates.
    ///
    /// From the last data-entry step this returns
    /// [`Advance::ReadyToSubmit`] instead of moving; the terminal step is
    /// only reached by a successful submission.
    pub fn next(&mut self) -> Advance {
        if self.is_locked() {
            return Advance::Unchanged;
        }
        let current = self.state.current;
        let kind = self.current_step().kind();
        match kind {
            StepKind::Terminal => Advance::Unchanged,
            StepKind::Intro => self.move_to(current + 1),
            StepKind::DataEntry => {
                if !self.validate_step(current) {
                    debug!(
                        "Step '{}' blocked: {:?}",
                        self.current_step().id(),
                        self.state.errors.keys().collect::<Vec<_>>()
                    );
                    return Advance::Blocked;
                }
                if current + 1 == self.flow.terminal_index() {
                    Advance::ReadyToSubmit
                } else {
                    self.move_to(current + 1)
                }
            }
        }
    }

    /// Moves back one step, keeping fields and errors. Clears a failed
    /// submission so the user can edit and retry.
    pub fn back(&mut self) -> Advance {
        if self.is_locked() {
            return Advance::Unchanged;
        }
        self.clear_failure();
        match self.state.current {
            0 => Advance::Unchanged,
            current => self.move_to(current - 1),
        }
    }

    /// Jumps to the step named `id`.
    ///
    /// Going back is unrestricted. Going forward validates each step on the
    /// way; if one is invalid the controller stays where it was and returns
    /// [`Advance::Blocked`], with that step's fields marked.
    pub fn go_to(&mut self, id: &str) -> Result<Advance, FlowError> {
        let target = self
            .flow
            .position(id)
            .ok_or_else(|| FlowError::StepNotFound(StepId::new(id)))?;
        if target == self.flow.terminal_index() {
            return Err(FlowError::TerminalStep(StepId::new(id)));
        }
        if self.is_locked() || target == self.state.current {
            return Ok(Advance::Unchanged);
        }

        let from = self.state.current;
        if target < from {
            self.clear_failure();
            return Ok(self.move_to(target));
        }

        for index in from..target {
            if !self.validate_step(index) {
                return Ok(Advance::Blocked);
            }
        }
        self.move_to(target);
        Ok(Advance::Moved { from, to: target })
    }

    /// Returns to a blank first step. Any in-flight submission is orphaned.
    pub fn reset(&mut self) {
        let generation = self.state.generation.wrapping_add(1);
        self.state = FlowState::new(generation);
        info!("Flow '{}' reset", self.flow.name());
    }

    /// Abandons an in-flight submission without touching the form.
    pub fn cancel(&mut self) {
        self.state.generation = self.state.generation.wrapping_add(1);
        if self.state.submission.is_pending() {
            self.state.submission = Submission::Idle;
            info!("Flow '{}' submission cancelled", self.flow.name());
        }
    }

    /// Enters `Pending` and snapshots the payload for the collaborator.
    ///
    /// Only allowed from the last data-entry step, once it validates, and
    /// while no other submission is in flight.
    pub fn begin_submit(&mut self) -> Result<SubmissionTicket, SubmitSkipped> {
        match self.state.submission {
            Submission::Pending => return Err(SubmitSkipped::InFlight),
            Submission::Succeeded(_) => return Err(SubmitSkipped::Completed),
            _ => {}
        }
        let current = self.state.current;
        if self.current_step().kind() != StepKind::DataEntry
            || current + 1 != self.flow.terminal_index()
        {
            return Err(SubmitSkipped::NotReady);
        }
        if !self.validate_step(current) {
            return Err(SubmitSkipped::Invalid);
        }

        self.state.submission = Submission::Pending;
        info!(
            "Flow '{}' submitting from step '{}'",
            self.flow.name(),
            self.current_step().id()
        );
        Ok(SubmissionTicket::new(
            self.state.generation,
            SubmissionRequest {
                flow: self.flow.name().to_string(),
                step: self.current_step().id().clone(),
                payload: self.state.fields.clone(),
            },
        ))
    }

    /// Applies the collaborator's answer for `ticket`.
    ///
    /// Answers for a ticket issued before the last [`reset`](Self::reset)
    /// or [`cancel`](Self::cancel) are discarded.
    pub fn complete_submit(
        &mut self,
        ticket: SubmissionTicket,
        result: Result<T, SubmissionRejection>,
    ) -> Settled {
        if ticket.generation() != self.state.generation || !self.state.submission.is_pending() {
            warn!(
                "Flow '{}' discarding stale submission result for step '{}'",
                self.flow.name(),
                ticket.request().step
            );
            return Settled::Discarded;
        }

        match result {
            Ok(data) => {
                self.state.errors.clear();
                self.state.submission = Submission::Succeeded(data);
                let terminal = self.flow.terminal_index();
                self.move_to(terminal);
                info!("Flow '{}' completed", self.flow.name());
                Settled::Succeeded
            }
            Err(rejection) => {
                warn!(
                    "Flow '{}' submission failed: {}",
                    self.flow.name(),
                    rejection
                );
                for (field, message) in &rejection.field_errors {
                    if self.flow.declares(field) {
                        self.state.errors.insert(field.clone(), message.clone());
                    }
                }
                self.state.submission = Submission::Failed(rejection);
                Settled::Failed
            }
        }
    }

    pub fn snapshot(&self) -> FlowSnapshot {
        let step = self.current_step();
        FlowSnapshot {
            flow: self.flow.name().to_string(),
            step: step.id().clone(),
            title: step.title().to_string(),
            kind: step.kind(),
            index: self.state.current,
            total: self.flow.len(),
            fields: self.state.fields.clone(),
            errors: self.state.errors.clone(),
            submission: self.state.submission.status(),
            failure: self.state.submission.failure().cloned(),
            password_strength: self
                .state
                .fields
                .get("password")
                .filter(|p| !p.is_empty())
                .map(password_strength),
        }
    }

    fn clear_failure(&mut self) {
        if matches!(self.state.submission, Submission::Failed(_)) {
            self.state.submission = Submission::Idle;
        }
    }

    fn move_to(&mut self, to: usize) -> Advance {
        let from = self.state.current;
        self.state.current = to;
        info!(
            "Flow '{}' moved from '{}' to '{}'",
            self.flow.name(),
            self.flow.steps()[from].id(),
            self.flow.steps()[to].id()
        );
        Advance::Moved { from, to }
    }
}

fn check_step(step: &StepDefinition, fields: &Fields, errors: &mut FieldErrors) -> bool {
    let mut valid = true;
    for name in step.field_names() {
        match step.check_field(name, fields) {
            Ok(()) => {
                errors.remove(name);
            }
            Err(message) => {
                errors.insert(name.to_string(), message);
                valid = false;
            }
        }
    }
    valid
}
