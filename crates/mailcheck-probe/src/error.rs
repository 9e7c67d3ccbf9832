//! Error types for the probe library.

use std::time::Duration;

use thiserror::Error;

/// Why a TLS peer or local client certificate could not be used.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CertificateReason {
    /// The server certificate failed validation.
    Untrusted(String),
    /// The configured client certificate could not be loaded.
    RetrievalFailure {
        /// Alias of the client certificate.
        alias: String,
    },
    /// Certificate authentication (SASL EXTERNAL) is not available.
    MissingCapability,
}

impl std::fmt::Display for CertificateReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Untrusted(detail) => write!(f, "untrusted server certificate: {detail}"),
            Self::RetrievalFailure { alias } => {
                write!(f, "client certificate '{alias}' could not be retrieved")
            }
            Self::MissingCapability => {
                f.write_str("certificate authentication (SASL EXTERNAL) is not available")
            }
        }
    }
}

/// Errors that can occur while probing a server.
#[derive(Debug, Error)]
pub enum Error {
    /// I/O error during network operations.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// TLS configuration error.
    #[error("TLS error: {0}")]
    Tls(#[from] rustls::Error),

    /// Invalid DNS name for TLS.
    #[error("Invalid DNS name: {0}")]
    InvalidDnsName(#[from] rustls::pki_types::InvalidDnsNameError),

    /// Certificate validation failed.
    ///
    /// `chain` holds the DER certificates the server presented, leaf first,
    /// when the failure concerns the server certificate.
    #[error("Certificate error: {reason}")]
    Certificate {
        /// Presented chain, if any.
        chain: Option<Vec<Vec<u8>>>,
        /// Failure reason.
        reason: CertificateReason,
    },

    /// The server rejected the credentials.
    #[error("Authentication failed: {0}")]
    Auth(String),

    /// Server returned an error status.
    #[error("Server rejected command: {0}")]
    Rejected(String),

    /// Server closed the session.
    #[error("Server sent BYE: {0}")]
    Bye(String),

    /// Unexpected data or missing server feature.
    #[error("Protocol error: {0}")]
    Protocol(String),

    /// Operation timed out.
    #[error("Operation timed out after {0:?}")]
    Timeout(Duration),
}

impl Error {
    /// EXTERNAL authentication requested without a usable client certificate.
    pub(crate) const fn missing_external() -> Self {
        Self::Certificate {
            chain: None,
            reason: CertificateReason::MissingCapability,
        }
    }
}

/// Result type alias using our Error type.
pub type Result<T> = std::result::Result<T, Error>;
