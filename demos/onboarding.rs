use async_trait::async_trait;
use bankkit_flow::prelude::*;
use std::sync::atomic::{AtomicBool, Ordering};

#[derive(Debug, Clone)]
struct Account {
    id: String,
}

/// Stand-in for the account service: fails the first call, then succeeds.
#[derive(Default)]
struct FlakyAccountService {
    failed_once: AtomicBool,
}

#[async_trait]
impl SubmissionCollaborator<Account> for FlakyAccountService {
    async fn submit_step(&self, request: &SubmissionRequest) -> Result<Account, SubmissionRejection> {
        if !self.failed_once.swap(true, Ordering::SeqCst) {
            return Err(SubmissionRejection::new("Network error"));
        }
        Ok(Account {
            id: format!("acct-{}", request.payload.value("email")),
        })
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt::init();

    let session = FlowSession::start(&flows::onboarding()?, FlakyAccountService::default());

    session.next().await;
    session.set_field("email", "not-an-email").await;
    session.set_field("password", "short").await;
    session.set_field("confirm_password", "short").await;
    println!("credentials: {:?}", session.next().await);
    println!("{}", serde_json::to_string_pretty(&session.snapshot().await)?);

    session.set_field("email", "jo@bank.example").await;
    session.set_field("password", "Longenough1!").await;
    session.set_field("confirm_password", "Longenough1!").await;
    println!("credentials: {:?}", session.next().await);

    session.set_field("first_name", "Jo").await;
    session.set_field("last_name", "Li").await;
    println!("personal info: {:?}", session.next().await);

    session.set_field("account_type", "both").await;
    println!("first submit: {:?}", session.next().await);
    println!("retry: {:?}", session.submit().await);

    let account = session.with(|ctrl| ctrl.submission().data().cloned()).await;
    match account {
        Some(account) => println!("Account created: {}", account.id),
        None => println!("Onboarding did not complete"),
    }

    Ok(())
}
