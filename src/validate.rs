//! Field validators.
//!
//! A validator inspects one field value (plus the rest of the form, for
//! cross-field rules such as password confirmation) and either accepts it
//! or returns the message to display next to the field. Validators are
//! pure: no side effects, same input, same answer.

use crate::state::Fields;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::LazyLock;

/// `Ok(())` when the value is acceptable, `Err(message)` otherwise.
pub type ValidationResult = Result<(), String>;

pub const EMAIL_MESSAGE: &str = "Please enter a valid email address.";
pub const PASSWORD_MESSAGE: &str = "Password must be at least 8 characters.";
pub const CONFIRM_PASSWORD_MESSAGE: &str = "Passwords do not match.";
pub const PHONE_MESSAGE: &str = "Please enter a valid phone number.";
pub const REQUIRED_MESSAGE: &str = "This field is required.";

/// Minimum accepted password length, in characters.
pub const MIN_PASSWORD_LENGTH: usize = 8;

#[allow(clippy::expect_used)]
static EMAIL_REGEX: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[^\s@]+@[^\s@]+\.[^\s@]+$").expect("compile regex"));

/// A rule applied to a single form field.
///
/// Implemented for every `Fn(&str, &Fields) -> ValidationResult` closure,
/// so ad hoc rules need no wrapper type:
///
/// ```
/// use bankkit_flow::{Fields, Validator};
///
/// let no_spaces = |value: &str, _fields: &Fields| {
///     if value.contains(' ') {
///         Err("Spaces are not allowed.".to_string())
///     } else {
///         Ok(())
///     }
/// };
///
/// let fields = Fields::new();
/// assert!(no_spaces.validate("jo_li", &fields).is_ok());
/// assert!(no_spaces.validate("jo li", &fields).is_err());
/// ```
pub trait Validator: Send + Sync {
    /// Checks `value` against the rule. `fields` is the whole form as it
    /// currently stands.
    fn validate(&self, value: &str, fields: &Fields) -> ValidationResult;
}

impl<F> Validator for F
where
    F: Fn(&str, &Fields) -> ValidationResult + Send + Sync,
{
    fn validate(&self, value: &str, fields: &Fields) -> ValidationResult {
        self(value, fields)
    }
}

/// Returns `true` if `value` looks like `local@domain.tld`.
pub fn is_valid_email(value: &str) -> bool {
    EMAIL_REGEX.is_match(value)
}

/// Non-empty value in `local@domain.tld` shape.
pub fn email() -> impl Validator {
    |value: &str, _fields: &Fields| {
        if is_valid_email(value) {
            Ok(())
        } else {
            Err(EMAIL_MESSAGE.to_string())
        }
    }
}

/// At least [`MIN_PASSWORD_LENGTH`] characters.
pub fn password() -> impl Validator {
    |value: &str, _fields: &Fields| {
        if value.chars().count() >= MIN_PASSWORD_LENGTH {
            Ok(())
        } else {
            Err(PASSWORD_MESSAGE.to_string())
        }
    }
}

/// Must equal the current value of the `password` field.
pub fn confirm_password() -> impl Validator {
    |value: &str, fields: &Fields| {
        if value == fields.value("password") {
            Ok(())
        } else {
            Err(CONFIRM_PASSWORD_MESSAGE.to_string())
        }
    }
}

/// Trimmed value of at least `min` characters.
///
/// The message reads `"<label> must be at least <min> characters."`.
pub fn min_length(label: impl Into<String>, min: usize) -> impl Validator {
    let message = format!("{} must be at least {} characters.", label.into(), min);
    move |value: &str, _fields: &Fields| {
        if value.trim().chars().count() >= min {
            Ok(())
        } else {
            Err(message.clone())
        }
    }
}

/// Any non-blank value.
pub fn required(message: impl Into<String>) -> impl Validator {
    let message = message.into();
    move |value: &str, _fields: &Fields| {
        if value.trim().is_empty() {
            Err(message.clone())
        } else {
            Ok(())
        }
    }
}

/// A selection from a closed set of options.
///
/// An empty value and a value outside `options` both fail with `message`.
pub fn one_of(options: &[&str], message: impl Into<String>) -> impl Validator {
    let options: Vec<String> = options.iter().map(|o| o.to_string()).collect();
    let message = message.into();
    move |value: &str, _fields: &Fields| {
        if options.iter().any(|o| o == value) {
            Ok(())
        } else {
            Err(message.clone())
        }
    }
}

/// Exactly `len` ASCII digits.
pub fn digits(len: usize, message: impl Into<String>) -> impl Validator {
    let message = message.into();
    move |value: &str, _fields: &Fields| {
        let value = value.trim();
        if value.len() == len && value.bytes().all(|b| b.is_ascii_digit()) {
            Ok(())
        } else {
            Err(message.clone())
        }
    }
}

/// Digits plus `+ - ( )` and spaces, with at least seven digits.
pub fn phone() -> impl Validator {
    |value: &str, _fields: &Fields| {
        let allowed = value
            .chars()
            .all(|c| c.is_ascii_digit() || matches!(c, '+' | '-' | '(' | ')' | ' '));
        let digit_count = value.chars().filter(|c| c.is_ascii_digit()).count();
        if allowed && digit_count >= 7 {
            Ok(())
        } else {
            Err(PHONE_MESSAGE.to_string())
        }
    }
}

/// Trimmed value matching `regex`.
pub fn pattern(regex: Regex, message: impl Into<String>) -> impl Validator {
    let message = message.into();
    move |value: &str, _fields: &Fields| {
        if regex.is_match(value.trim()) {
            Ok(())
        } else {
            Err(message.clone())
        }
    }
}

/// Cosmetic strength rating for the password meter.
///
/// Never used to block a step; [`password`] is the blocking rule.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PasswordStrength {
    Weak,
    Medium,
    Strong,
}

impl fmt::Display for PasswordStrength {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PasswordStrength::Weak => write!(f, "weak"),
            PasswordStrength::Medium => write!(f, "medium"),
            PasswordStrength::Strong => write!(f, "strong"),
        }
    }
}

/// Rates a password: weak under 8 characters, medium under 12 characters
/// or with fewer than three of the four character classes (lowercase,
/// uppercase, digit, symbol), strong otherwise.
pub fn password_strength(value: &str) -> PasswordStrength {
    let len = value.chars().count();
    if len < MIN_PASSWORD_LENGTH {
        return PasswordStrength::Weak;
    }

    let classes = [
        value.chars().any(|c| c.is_lowercase()),
        value.chars().any(|c| c.is_uppercase()),
        value.chars().any(|c| c.is_ascii_digit()),
        value.chars().any(|c| !c.is_alphanumeric()),
    ]
    .iter()
    .filter(|present| **present)
    .count();

    if len < 12 || classes < 3 {
        PasswordStrength::Medium
    } else {
        PasswordStrength::Strong
    }
}
