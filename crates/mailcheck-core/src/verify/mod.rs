//! Account verification.
//!
//! [`Verifier`] checks the incoming server, provisions local folders, then
//! checks the outgoing server. [`VerificationGate`] runs verifications one
//! at a time on a background task.

mod collaborators;
mod controller;
mod gate;
mod outcome;

pub use collaborators::{
    CertificateChain, CertificateNotifier, CheckError, EnglishCatalog, IncomingServer,
    MessageCatalog, OutgoingServer, ResultSink, Transport,
};
pub use controller::{Phase, Verifier};
pub use gate::{GateError, PendingVerification, VerificationGate};
pub use outcome::{ResultCode, VerificationReport, VerifyError};
