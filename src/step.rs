use crate::state::Fields;
use crate::validate::{ValidationResult, Validator, REQUIRED_MESSAGE};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// Stable identifier of a step within a flow.
///
/// # Examples
///
/// ```
/// use bankkit_flow::StepId;
///
/// let id = StepId::new("personal-info");
/// assert_eq!(id.as_str(), "personal-info");
///
/// let id: StepId = "credentials".into();
/// assert_eq!(id, "credentials");
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct StepId(String);

impl StepId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for StepId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<&str> for StepId {
    fn from(s: &str) -> Self {
        Self::new(s)
    }
}

impl From<String> for StepId {
    fn from(s: String) -> Self {
        Self(s)
    }
}

impl AsRef<str> for StepId {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl std::borrow::Borrow<str> for StepId {
    fn borrow(&self) -> &str {
        &self.0
    }
}

impl PartialEq<str> for StepId {
    fn eq(&self, other: &str) -> bool {
        self.0 == other
    }
}

impl PartialEq<&str> for StepId {
    fn eq(&self, other: &&str) -> bool {
        self.0 == *other
    }
}

/// Role of a step in its flow.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StepKind {
    /// Welcome screen. Always passes; only allowed as the first step.
    Intro,
    /// Collects fields and must validate before the flow moves on.
    DataEntry,
    /// Success/confirmation screen, entered only by a successful submission.
    Terminal,
}

/// One screen of a flow: which fields it requires and how they are checked.
///
/// # Examples
///
/// ```
/// use bankkit_flow::{validate, StepDefinition, StepKind};
///
/// let step = StepDefinition::data_entry("credentials", "Create your login")
///     .require("email", validate::email())
///     .require("password", validate::password())
///     .require("confirm_password", validate::confirm_password());
///
/// assert_eq!(step.kind(), StepKind::DataEntry);
/// assert_eq!(step.required_fields().len(), 3);
/// ```
pub struct StepDefinition {
    id: StepId,
    title: String,
    kind: StepKind,
    required_fields: Vec<String>,
    validators: BTreeMap<String, Box<dyn Validator>>,
}

impl fmt::Debug for StepDefinition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StepDefinition")
            .field("id", &self.id)
            .field("kind", &self.kind)
            .field("required_fields", &self.required_fields)
            .field("validators", &self.validators.keys().collect::<Vec<_>>())
            .finish()
    }
}

impl StepDefinition {
    fn new(id: impl Into<StepId>, title: impl Into<String>, kind: StepKind) -> Self {
        Self {
            id: id.into(),
            title: title.into(),
            kind,
            required_fields: Vec::new(),
            validators: BTreeMap::new(),
        }
    }

    pub fn intro(id: impl Into<StepId>, title: impl Into<String>) -> Self {
        Self::new(id, title, StepKind::Intro)
    }

    pub fn data_entry(id: impl Into<StepId>, title: impl Into<String>) -> Self {
        Self::new(id, title, StepKind::DataEntry)
    }

    pub fn terminal(id: impl Into<StepId>, title: impl Into<String>) -> Self {
        Self::new(id, title, StepKind::Terminal)
    }

    /// Adds a required field checked by `validator`.
    pub fn require(mut self, field: impl Into<String>, validator: impl Validator + 'static) -> Self {
        let field = field.into();
        self.required_fields.push(field.clone());
        self.validators.insert(field, Box::new(validator));
        self
    }

    /// Adds a required field that only has to be non-blank.
    pub fn require_present(mut self, field: impl Into<String>) -> Self {
        self.required_fields.push(field.into());
        self
    }

    /// Adds an optional field: checked only once the user has typed something.
    pub fn optional(mut self, field: impl Into<String>, validator: impl Validator + 'static) -> Self {
        self.validators.insert(field.into(), Box::new(validator));
        self
    }

    pub fn id(&self) -> &StepId {
        &self.id
    }

    pub fn title(&self) -> &str {
        &self.title
    }

    pub fn kind(&self) -> StepKind {
        self.kind
    }

    pub fn required_fields(&self) -> &[String] {
        &self.required_fields
    }

    pub fn is_required(&self, field: &str) -> bool {
        self.required_fields.iter().any(|f| f == field)
    }

    /// Whether this step requires or validates `field`.
    pub fn declares(&self, field: &str) -> bool {
        self.is_required(field) || self.validators.contains_key(field)
    }

    /// Every field this step mentions, required ones first.
    pub fn field_names(&self) -> impl Iterator<Item = &str> {
        self.required_fields.iter().map(String::as_str).chain(
            self.validators
                .keys()
                .filter(|k| !self.is_required(k))
                .map(String::as_str),
        )
    }

    /// Intro and terminal steps pass through without validation.
    pub fn is_pass_through(&self) -> bool {
        self.kind != StepKind::DataEntry
    }

    /// Checks one field of this step against `fields`.
    ///
    /// Required fields without a validator must be non-blank. Optional
    /// fields are accepted while blank.
    pub fn check_field(&self, field: &str, fields: &Fields) -> ValidationResult {
        let value = fields.value(field);
        match self.validators.get(field) {
            Some(validator) if self.is_required(field) || !value.trim().is_empty() => {
                validator.validate(value, fields)
            }
            Some(_) => Ok(()),
            None if self.is_required(field) && value.trim().is_empty() => {
                Err(REQUIRED_MESSAGE.to_string())
            }
            None => Ok(()),
        }
    }
}
