//! Step tables for the BankKit flows.
//!
//! Each function builds a fresh [`Flow`]; start one controller per run.

use crate::error::FlowError;
use crate::flow::Flow;
use crate::step::StepDefinition;
use crate::validate::{self, confirm_password, digits, email, min_length, one_of, password, pattern, required};
use regex::Regex;

pub const ACCOUNT_TYPES: &[&str] = &["checking", "savings", "both"];
pub const CARD_TIERS: &[&str] = &["standard", "gold", "platinum"];
pub const DOCUMENT_TYPES: &[&str] = &["passport", "drivers_license", "state_id"];
pub const TWO_FACTOR_METHODS: &[&str] = &["sms", "email", "authenticator"];

fn regex(source: &str) -> Result<Regex, FlowError> {
    Regex::new(source).map_err(|e| FlowError::Configuration(e.to_string()))
}

/// Account opening: welcome, login credentials, personal details, account
/// type, then the success screen.
pub fn onboarding() -> Result<Flow, FlowError> {
    Flow::builder("onboarding")
        .step(StepDefinition::intro("welcome", "Welcome to BankKit"))
        .step(
            StepDefinition::data_entry("credentials", "Create your login")
                .require("email", email())
                .require("password", password())
                .require("confirm_password", confirm_password()),
        )
        .step(
            StepDefinition::data_entry("personal-info", "Tell us about yourself")
                .require("first_name", min_length("First name", 2))
                .require("last_name", min_length("Last name", 2))
                .optional("phone", validate::phone()),
        )
        .step(
            StepDefinition::data_entry("account-type", "Choose your account")
                .require("account_type", one_of(ACCOUNT_TYPES, "Please select an account type.")),
        )
        .step(StepDefinition::terminal("success", "Your account is ready"))
        .build()
}

/// Card issuance: tier selection, then confirmation. No welcome step.
pub fn card_application() -> Result<Flow, FlowError> {
    Flow::builder("card-application")
        .step(
            StepDefinition::data_entry("card-tier", "Choose your card")
                .require("tier", one_of(CARD_TIERS, "Please select a card tier."))
                .optional("card_nickname", min_length("Card nickname", 2)),
        )
        .step(StepDefinition::terminal("confirmation", "Your card is on its way"))
        .build()
}

/// Identity verification: six data-entry steps, then the verified screen.
pub fn identity_verification() -> Result<Flow, FlowError> {
    Flow::builder("identity-verification")
        .step(
            StepDefinition::data_entry("ssn", "Social Security number").require(
                "ssn",
                pattern(regex(r"^\d{3}-?\d{2}-?\d{4}$")?, "Please enter a valid 9-digit SSN."),
            ),
        )
        .step(
            StepDefinition::data_entry("document-upload", "Upload an ID document")
                .require("document_type", one_of(DOCUMENT_TYPES, "Please select a document type."))
                .require("document_file", required("Please upload a photo of your document.")),
        )
        .step(
            StepDefinition::data_entry("biometric", "Take a selfie")
                .require("selfie", required("Please capture a selfie.")),
        )
        .step(
            StepDefinition::data_entry("address", "Home address")
                .require("street", required("Please enter your street address."))
                .require("city", required("Please enter your city."))
                .require(
                    "state",
                    pattern(regex(r"^[A-Za-z]{2}$")?, "Please enter a 2-letter state code."),
                )
                .require("zip", digits(5, "Please enter a valid 5-digit ZIP code.")),
        )
        .step(
            StepDefinition::data_entry("bank-link", "Link your bank")
                .require("bank", required("Please select your bank."))
                .require(
                    "account_number",
                    pattern(regex(r"^\d{4,17}$")?, "Please enter a valid account number."),
                ),
        )
        .step(
            StepDefinition::data_entry("two-factor", "Set up two-factor authentication")
                .require("method", one_of(TWO_FACTOR_METHODS, "Please select a verification method."))
                .require("code", digits(6, "Please enter the 6-digit code.")),
        )
        .step(StepDefinition::terminal("verified", "You're verified"))
        .build()
}

/// Sign-in form. Only checks that both fields are filled in sensibly; the
/// password length rule is left to the backend.
pub fn sign_in() -> Result<Flow, FlowError> {
    Flow::builder("sign-in")
        .step(
            StepDefinition::data_entry("credentials", "Sign in")
                .require("email", email())
                .require("password", required("Please enter your password.")),
        )
        .step(StepDefinition::terminal("signed-in", "Welcome back"))
        .build()
}

/// Forgotten password: account email, then reset code and new password.
pub fn password_recovery() -> Result<Flow, FlowError> {
    Flow::builder("password-recovery")
        .step(StepDefinition::data_entry("request", "Reset your password").require("email", email()))
        .step(
            StepDefinition::data_entry("reset", "Choose a new password")
                .require("code", digits(6, "Please enter the 6-digit code."))
                .require("password", password())
                .require("confirm_password", confirm_password()),
        )
        .step(StepDefinition::terminal("done", "Password updated"))
        .build()
}
