//! Services the verifier drives.
//!
//! Everything here is injected into [`Verifier`](super::Verifier); the
//! network-backed implementations live in [`crate::service`].

use std::future::Future;

use thiserror::Error;

use super::outcome::{ResultCode, VerifyError};
use crate::account::{AccountRecord, CertificateFingerprint, Direction, ServerProfile};
use crate::storage::SpecialFolder;

/// DER certificates as presented by a server, leaf first.
pub type CertificateChain = Vec<Vec<u8>>;

/// Failure of a single server check.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CheckError {
    /// The server rejected the credentials.
    #[error("Authentication failed: {0}")]
    AuthenticationFailed(String),

    /// The server's identity could not be verified.
    ///
    /// A non-empty `chain` can be trusted explicitly; without one the
    /// failure is terminal.
    #[error("Certificate invalid: {problem}")]
    CertificateInvalid {
        /// Chain the server presented.
        chain: Option<CertificateChain>,
        /// What went wrong.
        problem: String,
    },

    /// Anything else: network, protocol, timeouts.
    #[error("{0}")]
    Other(String),
}

/// Retrieval server checks.
pub trait IncomingServer: Send + Sync {
    /// Connects, authenticates and disconnects.
    fn check_settings(
        &self,
        profile: &ServerProfile,
        trusted: &[CertificateFingerprint],
    ) -> impl Future<Output = Result<(), CheckError>> + Send;

    /// Lists the remote folders once.
    fn list_folders(
        &self,
        profile: &ServerProfile,
        trusted: &[CertificateFingerprint],
    ) -> impl Future<Output = Result<Vec<String>, CheckError>> + Send;

    /// Refreshes the inbox state once.
    fn synchronize_inbox(
        &self,
        profile: &ServerProfile,
        trusted: &[CertificateFingerprint],
    ) -> impl Future<Output = Result<(), CheckError>> + Send;
}

/// A sending connection that can be opened and closed.
pub trait Transport: Send {
    /// Connects and authenticates.
    fn open(&mut self) -> impl Future<Output = Result<(), CheckError>> + Send;

    /// Closes the connection if open. Never fails.
    fn close(&mut self) -> impl Future<Output = ()> + Send;
}

/// Factory for sending connections.
pub trait OutgoingServer: Send + Sync {
    /// Connection type.
    type Transport: Transport;

    /// Creates an unopened transport for the profile.
    fn transport(
        &self,
        profile: &ServerProfile,
        trusted: &[CertificateFingerprint],
    ) -> Self::Transport;
}

/// Certificate error notifications shown to the user.
pub trait CertificateNotifier: Send + Sync {
    /// Dismisses earlier certificate errors for the account's server.
    fn clear_certificate_errors(&self, account: &AccountRecord, direction: Direction);
}

/// Receives the final result of one submission.
///
/// Consumed by the call, so it can fire only once.
pub trait ResultSink: Send + 'static {
    /// Called with the result code and a human-readable message.
    fn on_result(self: Box<Self>, code: ResultCode, message: &str);
}

impl<F> ResultSink for F
where
    F: FnOnce(ResultCode, &str) + Send + 'static,
{
    fn on_result(self: Box<Self>, code: ResultCode, message: &str) {
        (*self)(code, message);
    }
}

/// User-facing text.
pub trait MessageCatalog: Send + Sync {
    /// Message for a successful run.
    fn success(&self) -> String;

    /// Message for a failed run.
    fn failure(&self, error: &VerifyError) -> String;

    /// Display name of a special folder.
    fn special_folder_name(&self, folder: SpecialFolder) -> String;
}

/// English messages.
#[derive(Debug, Clone, Copy, Default)]
pub struct EnglishCatalog;

impl MessageCatalog for EnglishCatalog {
    fn success(&self) -> String {
        "Account settings verified".to_string()
    }

    fn failure(&self, error: &VerifyError) -> String {
        match error {
            VerifyError::Authentication(detail) => {
                format!("Username or password incorrect. ({detail})")
            }
            VerifyError::ServerUntrusted(detail) => {
                format!("Cannot connect to server. ({detail})")
            }
            VerifyError::CertificateStore(e) => {
                format!("The server certificate could not be saved. ({e})")
            }
            VerifyError::TrustRetriesExhausted(detail) => {
                format!("Cannot establish the server's identity. ({detail})")
            }
            VerifyError::Storage(e) => format!("Cannot set up local folders. ({e})"),
            VerifyError::Transport(detail) => format!("Cannot connect to server. ({detail})"),
            VerifyError::Cancelled => "Verification was cancelled".to_string(),
            VerifyError::Interrupted(detail) => {
                format!("Verification stopped unexpectedly. ({detail})")
            }
        }
    }

    fn special_folder_name(&self, folder: SpecialFolder) -> String {
        match folder {
            SpecialFolder::Outbox => "Outbox",
            SpecialFolder::Drafts => "Drafts",
            SpecialFolder::Sent => "Sent",
            SpecialFolder::Trash => "Trash",
        }
        .to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::sync::atomic::{AtomicI32, Ordering};

    #[test]
    fn closure_sink_receives_code() {
        let seen = Arc::new(AtomicI32::new(-1));
        let sink: Box<dyn ResultSink> = Box::new({
            let seen = seen.clone();
            move |code: ResultCode, _: &str| seen.store(code.as_i32(), Ordering::SeqCst)
        });
        sink.on_result(ResultCode::AuthenticationFailed, "nope");
        assert_eq!(seen.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn english_messages() {
        let catalog = EnglishCatalog;
        assert_eq!(catalog.special_folder_name(SpecialFolder::Outbox), "Outbox");
        assert!(
            catalog
                .failure(&VerifyError::Authentication("535 bad".into()))
                .contains("535 bad")
        );
        assert_eq!(
            catalog.failure(&VerifyError::Cancelled),
            "Verification was cancelled"
        );
    }
}
