//! Network-backed collaborators for the verifier.
//!
//! Provides:
//! - [`NetworkIncoming`] - IMAP or POP3 checks, depending on the store profile
//! - [`SmtpOutgoing`] - SMTP transports
//! - [`TracingNotifier`] - certificate notifications written to the log

mod incoming;
mod outgoing;

use mailcheck_probe::{AuthMechanism, Credentials, Endpoint, TlsMode};
use tracing::debug;

use crate::account::{
    AccountRecord, AuthType, CertificateFingerprint, Direction, Security, ServerProfile,
};
use crate::verify::{CertificateNotifier, CheckError};

pub use incoming::NetworkIncoming;
pub use outgoing::{SmtpOutgoing, SmtpTransport};

/// Logs certificate notification changes.
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingNotifier;

impl CertificateNotifier for TracingNotifier {
    fn clear_certificate_errors(&self, account: &AccountRecord, direction: Direction) {
        debug!(
            "Clearing {} certificate errors for {}",
            direction,
            account.email()
        );
    }
}

/// Builds a probe endpoint from a server profile.
pub(crate) fn endpoint(profile: &ServerProfile, trusted: &[CertificateFingerprint]) -> Endpoint {
    Endpoint {
        host: profile.host().to_string(),
        port: profile.port(),
        tls: match profile.security() {
            Security::None => TlsMode::Plain,
            Security::StartTlsRequired => TlsMode::StartTls,
            Security::SslTlsRequired => TlsMode::Implicit,
        },
        credentials: Credentials {
            username: profile.username().to_string(),
            secret: profile.secret().to_string(),
            mechanism: match profile.auth_type() {
                AuthType::Plain => AuthMechanism::Plain,
                AuthType::Login => AuthMechanism::Login,
                AuthType::External => AuthMechanism::External,
            },
        },
        client_certificate: profile.client_certificate_alias().map(str::to_string),
        trusted: trusted.iter().map(|f| f.as_str().to_string()).collect(),
    }
}

impl From<mailcheck_probe::Error> for CheckError {
    fn from(error: mailcheck_probe::Error) -> Self {
        match error {
            mailcheck_probe::Error::Auth(detail) => Self::AuthenticationFailed(detail),
            mailcheck_probe::Error::Certificate { chain, reason } => Self::CertificateInvalid {
                chain,
                problem: reason.to_string(),
            },
            other => Self::Other(other.to_string()),
        }
    }
}
