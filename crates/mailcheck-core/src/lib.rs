//! # mailcheck-core
//!
//! Verifies that a mail account's servers work before the account is used.
//!
//! This crate provides:
//! - Account records with their incoming and outgoing server profiles
//! - Account generation from an email address
//! - Local special-folder provisioning (`SQLite`)
//! - A two-phase verifier with a certificate-trust restart loop
//! - A gate that runs verifications one at a time
//! - Network-backed server checks on top of `mailcheck-probe`

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![forbid(unsafe_code)]

pub mod account;
pub mod config;
mod error;
pub mod service;
pub mod storage;
pub mod verify;

pub use account::{
    AccountGenerator, AccountRecord, AuthType, CertificateError, CertificateFingerprint,
    Direction, Protocol, Security, ServerProfile, SpecialFolders, TrustedCertificates,
    ValidationError, ValidationResult, split_email, validate_account,
};
pub use config::VerifierConfig;
pub use error::{Error, Result};
pub use service::{NetworkIncoming, SmtpOutgoing, TracingNotifier};
pub use storage::{
    FolderType, LocalFolder, LocalStore, SqliteLocalStore, StorageError, SyncClass,
    ensure_folder,
};
pub use verify::{
    CheckError, GateError, PendingVerification, ResultCode, ResultSink, VerificationGate,
    VerificationReport, Verifier, VerifyError,
};
