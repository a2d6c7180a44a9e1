use crate::submission::SubmissionRejection;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::time::Instant;

/// Form values collected by a flow, keyed by field name.
///
/// Missing fields read as the empty string through [`Fields::value`].
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Fields(BTreeMap<String, String>);

impl Fields {
    pub fn new() -> Self {
        Self(BTreeMap::new())
    }

    /// Sets a field, returning `true` if the stored value changed.
    pub fn insert(&mut self, name: impl Into<String>, value: impl Into<String>) -> bool {
        let value = value.into();
        match self.0.insert(name.into(), value.clone()) {
            Some(previous) => previous != value,
            None => true,
        }
    }

    pub fn get(&self, name: &str) -> Option<&str> {
        self.0.get(name).map(String::as_str)
    }

    /// Current value of `name`, or `""` if it was never set.
    pub fn value(&self, name: &str) -> &str {
        self.get(name).unwrap_or_default()
    }

    /// `true` if the field is unset or only whitespace.
    pub fn is_blank(&self, name: &str) -> bool {
        self.value(name).trim().is_empty()
    }

    pub fn contains(&self, name: &str) -> bool {
        self.0.contains_key(name)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.0.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl<K, V> FromIterator<(K, V)> for Fields
where
    K: Into<String>,
    V: Into<String>,
{
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        Self(
            iter.into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        )
    }
}

/// Per-field error messages. A field without an entry is valid or untouched.
pub type FieldErrors = BTreeMap<String, String>;

/// Where the flow's terminal submission stands.
///
/// Moves `Idle -> Pending -> Succeeded | Failed`. `Failed` may go back to
/// `Idle` or straight to `Pending` on retry. `Succeeded` is final.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum Submission<T> {
    #[default]
    Idle,
    Pending,
    Succeeded(T),
    Failed(SubmissionRejection),
}

impl<T> Submission<T> {
    pub fn is_pending(&self) -> bool {
        matches!(self, Submission::Pending)
    }

    pub fn is_succeeded(&self) -> bool {
        matches!(self, Submission::Succeeded(_))
    }

    /// The success payload, if the flow completed.
    pub fn data(&self) -> Option<&T> {
        match self {
            Submission::Succeeded(data) => Some(data),
            _ => None,
        }
    }

    /// The flow-level failure, if the last attempt was rejected.
    pub fn failure(&self) -> Option<&SubmissionRejection> {
        match self {
            Submission::Failed(rejection) => Some(rejection),
            _ => None,
        }
    }

    pub fn status(&self) -> SubmissionStatus {
        match self {
            Submission::Idle => SubmissionStatus::Idle,
            Submission::Pending => SubmissionStatus::Pending,
            Submission::Succeeded(_) => SubmissionStatus::Succeeded,
            Submission::Failed(_) => SubmissionStatus::Failed,
        }
    }
}

/// Payload-free tag of a [`Submission`], used in snapshots and logs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SubmissionStatus {
    Idle,
    Pending,
    Succeeded,
    Failed,
}

/// Mutable state of one flow run.
#[derive(Debug)]
pub struct FlowState<T> {
    pub(crate) current: usize,
    pub(crate) fields: Fields,
    pub(crate) errors: FieldErrors,
    pub(crate) submission: Submission<T>,
    pub(crate) generation: u64,
    started_at: Instant,
}

impl<T> FlowState<T> {
    pub(crate) fn new(generation: u64) -> Self {
        Self {
            current: 0,
            fields: Fields::new(),
            errors: FieldErrors::new(),
            submission: Submission::Idle,
            generation,
            started_at: Instant::now(),
        }
    }

    pub fn current(&self) -> usize {
        self.current
    }

    pub fn fields(&self) -> &Fields {
        &self.fields
    }

    pub fn errors(&self) -> &FieldErrors {
        &self.errors
    }

    pub fn submission(&self) -> &Submission<T> {
        &self.submission
    }

    pub fn elapsed(&self) -> std::time::Duration {
        self.started_at.elapsed()
    }
}
