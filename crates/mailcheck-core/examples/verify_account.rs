#![allow(clippy::doc_markdown, clippy::uninlined_format_args)]
//! Example: verify a real account
//!
//! Generates an account from an email address, checks its derived IMAP and
//! SMTP servers and provisions local folders in an on-disk database.
//!
//! ```bash
//! export MAILCHECK_EMAIL="you@example.com"
//! export MAILCHECK_PASSWORD="app-password"
//! cargo run --package mailcheck-core --example verify_account
//! ```
//!
//! An untrusted server certificate is accepted automatically and the run
//! restarts, so a self-signed server still verifies. The certificates that
//! were accepted are printed at the end.

use std::env;

use anyhow::{Context, bail};
use mailcheck_core::{
    AccountGenerator, NetworkIncoming, SmtpOutgoing, SqliteLocalStore, VerificationGate,
    Verifier, VerifierConfig, validate_account,
};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "mailcheck_core=debug,mailcheck_probe=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let email = env::var("MAILCHECK_EMAIL").context("MAILCHECK_EMAIL is not set")?;
    let password = env::var("MAILCHECK_PASSWORD").context("MAILCHECK_PASSWORD is not set")?;

    let config = VerifierConfig::load_default().await?;
    let account = AccountGenerator::new().generate(&email, &password);
    if let Err(errors) = validate_account(&account) {
        for error in &errors {
            eprintln!("{}: {}", error.field(), error);
        }
        bail!("account settings are invalid");
    }

    let data_dir = dirs::data_dir()
        .unwrap_or_else(|| std::path::PathBuf::from("."))
        .join("mailcheck");
    std::fs::create_dir_all(&data_dir)?;
    let db_path = data_dir.join("folders.db");
    let store = SqliteLocalStore::new(db_path.to_str().unwrap_or("folders.db")).await?;

    let verifier = Verifier::new(
        NetworkIncoming::new(config.probe_config()),
        SmtpOutgoing::new(config.probe_config()),
        store,
    )
    .with_config(&config);
    let gate = VerificationGate::spawn(verifier);

    let pending = gate.submit(account, |code: mailcheck_core::ResultCode, message: &str| {
        println!("Result {}: {}", code, message);
    })?;
    let report = pending.wait().await?;

    println!(
        "Incoming: {}:{}",
        report.account.store().host(),
        report.account.store().port()
    );
    println!(
        "Outgoing: {}:{}",
        report.account.transport().host(),
        report.account.transport().port()
    );
    for cert in report.account.trusted_certificates().iter() {
        println!("Accepted {} certificate {}", cert.direction, cert.fingerprint);
    }

    gate.join().await;
    if report.is_success() {
        Ok(())
    } else {
        bail!("verification failed with code {}", report.code)
    }
}
