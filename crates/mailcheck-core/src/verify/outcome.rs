//! Run results.

use thiserror::Error;

use crate::account::{AccountRecord, CertificateError};
use crate::storage::StorageError;

/// Numeric result reported to the caller.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(i32)]
pub enum ResultCode {
    /// Both servers verified.
    Success = 0,
    /// A server rejected the credentials.
    AuthenticationFailed = 1,
    /// Server or certificate identity could not be established.
    ServerUntrusted = 2,
    /// An accepted certificate could not be stored.
    CertificateStoreFailed = 3,
    /// Any other failure.
    Unclassified = 4,
}

impl ResultCode {
    /// Integer value.
    #[must_use]
    pub const fn as_i32(self) -> i32 {
        self as i32
    }

    /// Returns true for [`ResultCode::Success`].
    #[must_use]
    pub const fn is_success(self) -> bool {
        matches!(self, Self::Success)
    }
}

impl std::fmt::Display for ResultCode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_i32())
    }
}

/// Why a verification run failed.
#[derive(Debug, Error)]
pub enum VerifyError {
    /// A server rejected the credentials.
    #[error("Authentication failed: {0}")]
    Authentication(String),

    /// A certificate problem without a chain that could be trusted.
    #[error("Server identity could not be established: {0}")]
    ServerUntrusted(String),

    /// Adding the presented certificate to the trust set failed.
    #[error("Could not store accepted certificate: {0}")]
    CertificateStore(#[from] CertificateError),

    /// Local folder provisioning failed.
    #[error("Local storage failed: {0}")]
    Storage(#[from] StorageError),

    /// Network or protocol failure.
    #[error("Connection failed: {0}")]
    Transport(String),

    /// The server kept presenting untrusted certificates.
    #[error("Certificate trust retries exhausted: {0}")]
    TrustRetriesExhausted(String),

    /// The run was cancelled at a phase boundary.
    #[error("Verification cancelled")]
    Cancelled,

    /// The run stopped without finishing, e.g. a collaborator panicked.
    #[error("Verification interrupted: {0}")]
    Interrupted(String),
}

impl VerifyError {
    /// Result code for this error.
    #[must_use]
    pub const fn code(&self) -> ResultCode {
        match self {
            Self::Authentication(_) => ResultCode::AuthenticationFailed,
            Self::ServerUntrusted(_) | Self::TrustRetriesExhausted(_) => {
                ResultCode::ServerUntrusted
            }
            Self::CertificateStore(_) => ResultCode::CertificateStoreFailed,
            Self::Storage(_) | Self::Transport(_) | Self::Cancelled | Self::Interrupted(_) => {
                ResultCode::Unclassified
            }
        }
    }
}

/// Final state of one submission.
#[derive(Debug)]
pub struct VerificationReport {
    /// Result code, as given to the sink.
    pub code: ResultCode,
    /// Message, as given to the sink.
    pub message: String,
    /// The account after the run.
    pub account: AccountRecord,
}

impl VerificationReport {
    /// Returns true if both servers were verified.
    #[must_use]
    pub const fn is_success(&self) -> bool {
        self.code.is_success()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn code_values() {
        assert_eq!(ResultCode::Success.as_i32(), 0);
        assert_eq!(ResultCode::AuthenticationFailed.as_i32(), 1);
        assert_eq!(ResultCode::ServerUntrusted.as_i32(), 2);
        assert_eq!(ResultCode::CertificateStoreFailed.as_i32(), 3);
        assert_eq!(ResultCode::Unclassified.as_i32(), 4);
        assert_eq!(ResultCode::ServerUntrusted.to_string(), "2");
    }

    #[test]
    fn error_codes() {
        assert_eq!(
            VerifyError::Authentication(String::new()).code(),
            ResultCode::AuthenticationFailed
        );
        assert_eq!(
            VerifyError::ServerUntrusted(String::new()).code(),
            ResultCode::ServerUntrusted
        );
        assert_eq!(
            VerifyError::TrustRetriesExhausted(String::new()).code(),
            ResultCode::ServerUntrusted
        );
        assert_eq!(
            VerifyError::CertificateStore(CertificateError::Empty).code(),
            ResultCode::CertificateStoreFailed
        );
        assert_eq!(
            VerifyError::Storage(StorageError::FolderNotFound("x".into())).code(),
            ResultCode::Unclassified
        );
        assert_eq!(
            VerifyError::Transport(String::new()).code(),
            ResultCode::Unclassified
        );
        assert_eq!(VerifyError::Cancelled.code(), ResultCode::Unclassified);
        assert_eq!(
            VerifyError::Interrupted(String::new()).code(),
            ResultCode::Unclassified
        );
    }
}
