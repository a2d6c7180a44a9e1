use async_trait::async_trait;
use bankkit_flow::prelude::*;
use bankkit_flow::{FlowConfig, Settled, StepKind, SubmissionStatus, SubmitSkipped};
use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use tokio::sync::Notify;
use tokio_test::{assert_pending, assert_ready_eq, block_on, task};

#[derive(Debug, Clone, PartialEq)]
struct CreatedAccount {
    account_id: String,
}

/// Answers with queued responses, in order, and records every request.
#[derive(Default)]
struct Scripted {
    responses: Mutex<VecDeque<Result<CreatedAccount, SubmissionRejection>>>,
    requests: Mutex<Vec<SubmissionRequest>>,
}

impl Scripted {
    fn new(responses: Vec<Result<CreatedAccount, SubmissionRejection>>) -> Arc<Self> {
        Arc::new(Self {
            responses: Mutex::new(responses.into()),
            requests: Mutex::new(Vec::new()),
        })
    }

    fn calls(&self) -> usize {
        self.requests.lock().unwrap().len()
    }
}

#[async_trait]
impl SubmissionCollaborator<CreatedAccount> for Scripted {
    async fn submit_step(
        &self,
        request: &SubmissionRequest,
    ) -> Result<CreatedAccount, SubmissionRejection> {
        self.requests.lock().unwrap().push(request.clone());
        tokio::task::yield_now().await;
        self.responses
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| Err(SubmissionRejection::new("no scripted response")))
    }
}

/// Blocks until the test releases the gate.
struct Gated {
    gate: Arc<Notify>,
    calls: Arc<AtomicUsize>,
}

#[async_trait]
impl SubmissionCollaborator<CreatedAccount> for Gated {
    async fn submit_step(
        &self,
        _request: &SubmissionRequest,
    ) -> Result<CreatedAccount, SubmissionRejection> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.gate.notified().await;
        Ok(CreatedAccount {
            account_id: "123".to_string(),
        })
    }
}

fn account(id: &str) -> CreatedAccount {
    CreatedAccount {
        account_id: id.to_string(),
    }
}

fn onboarding_session(collaborator: Arc<Scripted>) -> FlowSession<CreatedAccount> {
    let flow = flows::onboarding().unwrap();
    FlowSession::new(flow.start(), collaborator)
}

/// Fills the onboarding form up to the account-type step.
async fn fill_until_account_type(session: &FlowSession<CreatedAccount>) {
    assert_eq!(session.next().await, Advance::Moved { from: 0, to: 1 });

    session.set_field("email", "a@b.com").await;
    session.set_field("password", "longenough1").await;
    session.set_field("confirm_password", "longenough1").await;
    assert_eq!(session.next().await, Advance::Moved { from: 1, to: 2 });

    session.set_field("first_name", "Jo").await;
    session.set_field("last_name", "Li").await;
    assert_eq!(session.next().await, Advance::Moved { from: 2, to: 3 });

    session.set_field("account_type", "both").await;
}

#[test]
fn test_credentials_step_reports_every_invalid_field() {
    let mut ctrl = flows::onboarding().unwrap().start::<CreatedAccount>();
    ctrl.next();

    ctrl.set_field("email", "not-an-email");
    ctrl.set_field("password", "short");
    ctrl.set_field("confirm_password", "short");

    let before = ctrl.current_index();
    assert_eq!(ctrl.next(), Advance::Blocked);
    assert_eq!(ctrl.current_index(), before);

    let errors: Vec<(&str, &str)> = ctrl
        .errors()
        .iter()
        .map(|(k, v)| (k.as_str(), v.as_str()))
        .collect();
    assert_eq!(
        errors,
        vec![
            ("email", "Please enter a valid email address."),
            ("password", "Password must be at least 8 characters."),
        ]
    );
}

#[test]
fn test_validation_is_idempotent() {
    let mut ctrl = flows::onboarding().unwrap().start::<CreatedAccount>();
    ctrl.set_field("email", "not-an-email");

    let first = (ctrl.validate_field("email"), ctrl.error("email").map(str::to_string));
    let second = (ctrl.validate_field("email"), ctrl.error("email").map(str::to_string));
    assert_eq!(first, second);
    assert_eq!(first.1.as_deref(), Some("Please enter a valid email address."));

    ctrl.set_field("email", "a@b.com");
    assert!(ctrl.validate_field("email"));
    assert!(ctrl.validate_field("email"));
    assert_eq!(ctrl.error("email"), None);
}

#[test]
fn test_next_never_skips_or_passes_invalid_steps() {
    let invalid = [
        ("", "", ""),
        ("a@b.com", "short", "short"),
        ("a@b.com", "longenough1", "longenough2"),
        ("a@b", "longenough1", "longenough1"),
    ];

    for (email, password, confirm) in invalid {
        let mut ctrl = flows::onboarding().unwrap().start::<CreatedAccount>();
        ctrl.next();
        ctrl.set_field("email", email);
        ctrl.set_field("password", password);
        ctrl.set_field("confirm_password", confirm);
        assert_eq!(ctrl.next(), Advance::Blocked, "{email} / {password} / {confirm}");
        assert_eq!(ctrl.current_index(), 1);
        assert!(!ctrl.errors().is_empty());
    }

    let mut ctrl = flows::onboarding().unwrap().start::<CreatedAccount>();
    ctrl.next();
    ctrl.set_field("email", "a@b.com");
    ctrl.set_field("password", "longenough1");
    ctrl.set_field("confirm_password", "longenough1");
    assert_eq!(ctrl.next(), Advance::Moved { from: 1, to: 2 });
}

#[test]
fn test_editing_a_field_clears_its_error() {
    let mut ctrl = flows::onboarding().unwrap().start::<CreatedAccount>();
    ctrl.next();
    ctrl.next();
    assert!(ctrl.error("email").is_some());
    assert!(ctrl.error("password").is_some());

    ctrl.set_field("email", "still-wrong");
    assert_eq!(ctrl.error("email"), None);
    // other fields keep their errors until they are edited
    assert!(ctrl.error("password").is_some());
}

#[test]
fn test_back_then_next_keeps_fields() {
    let mut ctrl = flows::onboarding().unwrap().start::<CreatedAccount>();
    ctrl.next();
    ctrl.set_field("email", "a@b.com");
    ctrl.set_field("password", "longenough1");
    ctrl.set_field("confirm_password", "longenough1");
    ctrl.next();
    ctrl.set_field("first_name", "Jo");

    let before = ctrl.fields().clone();
    assert_eq!(ctrl.back(), Advance::Moved { from: 2, to: 1 });
    assert_eq!(ctrl.next(), Advance::Moved { from: 1, to: 2 });
    assert_eq!(ctrl.fields(), &before);
}

#[tokio::test]
async fn test_onboarding_happy_path() {
    let collaborator = Scripted::new(vec![Ok(account("123"))]);
    let session = onboarding_session(Arc::clone(&collaborator));

    fill_until_account_type(&session).await;
    assert_eq!(session.next().await, Advance::Moved { from: 3, to: 4 });

    let snapshot = session.snapshot().await;
    assert_eq!(snapshot.step, "success");
    assert_eq!(snapshot.kind, StepKind::Terminal);
    assert_eq!(snapshot.submission, SubmissionStatus::Succeeded);

    let data = session.with(|ctrl| ctrl.submission().data().cloned()).await;
    assert_eq!(data, Some(account("123")));

    let requests = collaborator.requests.lock().unwrap().clone();
    assert_eq!(requests.len(), 1);
    assert_eq!(requests[0].flow, "onboarding");
    assert_eq!(requests[0].step, "account-type");
    assert_eq!(requests[0].payload.value("account_type"), "both");
    assert_eq!(requests[0].payload.value("first_name"), "Jo");

    // absorbing
    assert_eq!(session.next().await, Advance::Unchanged);
    assert_eq!(session.back().await, Advance::Unchanged);
    assert_eq!(session.submit().await, Err(SubmitSkipped::Completed));
}

#[tokio::test]
async fn test_failure_then_retry() {
    let collaborator = Scripted::new(vec![
        Err(SubmissionRejection::new("Network error")),
        Ok(account("456")),
    ]);
    let session = onboarding_session(Arc::clone(&collaborator));
    fill_until_account_type(&session).await;

    assert_eq!(session.next().await, Advance::Rejected);
    let (index, message) = session
        .with(|ctrl| {
            (
                ctrl.current_index(),
                ctrl.submission().failure().map(|f| f.message.clone()),
            )
        })
        .await;
    assert_eq!(index, 3);
    assert_eq!(message.as_deref(), Some("Network error"));

    assert_eq!(session.submit().await, Ok(Settled::Succeeded));
    let snapshot = session.snapshot().await;
    assert_eq!(snapshot.index, 4);
    assert_eq!(snapshot.failure, None);
    assert_eq!(collaborator.calls(), 2);
}

#[tokio::test]
async fn test_unmapped_remote_error_stays_at_flow_level() {
    let collaborator = Scripted::new(vec![Err(SubmissionRejection::new("Email already registered")
        .with_field_error("email", "This email is already registered.")
        .with_field_error("account_id", "Duplicate account."))]);
    let session = onboarding_session(collaborator);
    fill_until_account_type(&session).await;

    assert_eq!(session.next().await, Advance::Rejected);
    let snapshot = session.snapshot().await;
    assert_eq!(
        snapshot.errors.get("email").map(String::as_str),
        Some("This email is already registered.")
    );
    assert!(!snapshot.errors.contains_key("account_id"));
    let failure = snapshot.failure.unwrap();
    assert_eq!(failure.message, "Email already registered");
    assert_eq!(
        failure.field_errors.get("account_id").map(String::as_str),
        Some("Duplicate account.")
    );
}

#[tokio::test]
async fn test_double_submit_invokes_collaborator_once() {
    let collaborator = Scripted::new(vec![Ok(account("123")), Ok(account("999"))]);
    let session = onboarding_session(Arc::clone(&collaborator));
    fill_until_account_type(&session).await;

    let (a, b) = tokio::join!(session.submit(), session.submit());
    assert!(matches!(
        (a, b),
        (Ok(Settled::Succeeded), Err(SubmitSkipped::InFlight))
            | (Err(SubmitSkipped::InFlight), Ok(Settled::Succeeded))
    ));
    assert_eq!(collaborator.calls(), 1);
    let data = session.with(|ctrl| ctrl.submission().data().cloned()).await;
    assert_eq!(data, Some(account("123")));
}

#[test]
fn test_pending_is_entered_before_the_call_resolves() {
    let flow = Flow::builder("card-application")
        .step(
            StepDefinition::data_entry("card-tier", "Choose your card")
                .require("tier", validate::one_of(flows::CARD_TIERS, "Please select a card tier.")),
        )
        .step(StepDefinition::terminal("confirmation", "Done"))
        .config(FlowConfig {
            submit_timeout: None,
        })
        .build()
        .unwrap();
    let gate = Arc::new(Notify::new());
    let calls = Arc::new(AtomicUsize::new(0));
    let session = FlowSession::start(
        &flow,
        Gated {
            gate: Arc::clone(&gate),
            calls: Arc::clone(&calls),
        },
    );
    block_on(session.set_field("tier", "gold"));

    let mut submit = task::spawn(session.submit());
    assert_pending!(submit.poll());
    assert_eq!(block_on(session.snapshot()).submission, SubmissionStatus::Pending);

    let mut duplicate = task::spawn(session.submit());
    assert_ready_eq!(duplicate.poll(), Err(SubmitSkipped::InFlight));
    assert_eq!(calls.load(Ordering::SeqCst), 1);

    gate.notify_one();
    assert!(submit.is_woken());
    assert_ready_eq!(submit.poll(), Ok(Settled::Succeeded));
}

#[tokio::test]
async fn test_reset_discards_late_resolution() {
    let gate = Arc::new(Notify::new());
    let calls = Arc::new(AtomicUsize::new(0));
    let session = FlowSession::start(
        &flows::card_application().unwrap(),
        Gated {
            gate: Arc::clone(&gate),
            calls: Arc::clone(&calls),
        },
    );
    session.set_field("tier", "gold").await;

    let handle = tokio::spawn({
        let session = session.clone();
        async move { session.submit().await }
    });
    while session.snapshot().await.submission != SubmissionStatus::Pending {
        tokio::task::yield_now().await;
    }

    // modal dismissed while the request is in flight
    session.reset().await;
    gate.notify_one();
    assert_eq!(handle.await.unwrap(), Ok(Settled::Discarded));

    let snapshot = session.snapshot().await;
    assert_eq!(snapshot.index, 0);
    assert_eq!(snapshot.submission, SubmissionStatus::Idle);
    assert!(snapshot.fields.is_empty());
    assert_eq!(calls.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn test_independent_flows_share_nothing() {
    let first = onboarding_session(Scripted::new(vec![]));
    let second = onboarding_session(Scripted::new(vec![]));

    first.next().await;
    first.set_field("email", "a@b.com").await;

    let snapshot = second.snapshot().await;
    assert_eq!(snapshot.index, 0);
    assert!(snapshot.fields.is_empty());
}

#[test]
fn test_snapshot_serializes_for_the_ui() {
    let mut ctrl = flows::onboarding().unwrap().start::<CreatedAccount>();
    ctrl.next();
    ctrl.set_field("password", "abc");
    ctrl.next();

    let json = serde_json::to_value(ctrl.snapshot()).unwrap();
    assert_eq!(json["flow"], "onboarding");
    assert_eq!(json["step"], "credentials");
    assert_eq!(json["kind"], "data_entry");
    assert_eq!(json["index"], 1);
    assert_eq!(json["total"], 5);
    assert_eq!(json["submission"], "idle");
    assert_eq!(json["password_strength"], "weak");
    assert_eq!(
        json["errors"]["password"],
        "Password must be at least 8 characters."
    );
    assert_eq!(json["fields"]["password"], "abc");
}

#[tokio::test]
async fn test_successful_retry_clears_remote_field_errors() {
    let collaborator = Scripted::new(vec![
        Err(SubmissionRejection::new("Email already registered")
            .with_field_error("email", "This email is already registered.")),
        Ok(account("789")),
    ]);
    let session = onboarding_session(collaborator);
    fill_until_account_type(&session).await;

    assert_eq!(session.next().await, Advance::Rejected);
    assert!(session.snapshot().await.errors.contains_key("email"));

    assert_eq!(session.submit().await, Ok(Settled::Succeeded));
    let snapshot = session.snapshot().await;
    assert_eq!(snapshot.step, "success");
    assert!(snapshot.errors.is_empty());
}

#[tokio::test]
async fn test_submit_with_invalid_final_step_is_skipped() {
    let collaborator = Scripted::new(vec![Ok(account("123"))]);
    let session = onboarding_session(Arc::clone(&collaborator));
    fill_until_account_type(&session).await;
    session.set_field("account_type", "").await;

    assert_eq!(session.submit().await, Err(SubmitSkipped::Invalid));
    assert_eq!(collaborator.calls(), 0);

    let snapshot = session.snapshot().await;
    assert_eq!(snapshot.index, 3);
    assert_eq!(snapshot.submission, SubmissionStatus::Idle);
    assert_eq!(
        snapshot.errors.get("account_type").map(String::as_str),
        Some("Please select an account type.")
    );
}

#[test]
fn test_padded_email_is_rejected() {
    let mut ctrl = flows::onboarding().unwrap().start::<CreatedAccount>();
    ctrl.next();
    ctrl.set_field("email", " a@b.com ");
    ctrl.set_field("password", "longenough1");
    ctrl.set_field("confirm_password", "longenough1");

    assert_eq!(ctrl.next(), Advance::Blocked);
    assert_eq!(ctrl.current_index(), 1);
    assert_eq!(ctrl.error("email"), Some("Please enter a valid email address."));
}

#[test]
fn test_blocked_jump_stays_on_current_step() {
    let mut ctrl = flows::onboarding().unwrap().start::<CreatedAccount>();

    assert_eq!(ctrl.go_to("account-type"), Ok(Advance::Blocked));
    assert_eq!(ctrl.current_index(), 0);
    assert!(ctrl.error("email").is_some());
}
