//! # mailcheck-probe
//!
//! Minimal IMAP, POP3 and SMTP dialogues for proving that a mail server is
//! reachable and accepts a set of credentials.
//!
//! TLS is handled by `rustls`. Server certificates are validated against
//! the webpki roots; fingerprints listed in [`Endpoint::trusted`] are
//! accepted regardless. When validation fails, [`Error::Certificate`]
//! carries the chain the server presented so a caller can decide to trust
//! its leaf and retry.
//!
//! ```no_run
//! use mailcheck_probe::{AuthMechanism, Credentials, Endpoint, ProbeConfig, TlsMode};
//!
//! # async fn run() -> mailcheck_probe::Result<()> {
//! let endpoint = Endpoint {
//!     host: "mail.example.com".into(),
//!     port: 993,
//!     tls: TlsMode::Implicit,
//!     credentials: Credentials {
//!         username: "user".into(),
//!         secret: "secret".into(),
//!         mechanism: AuthMechanism::Plain,
//!     },
//!     client_certificate: None,
//!     trusted: Vec::new(),
//! };
//! mailcheck_probe::imap::check(&endpoint, &ProbeConfig::default()).await?;
//! # Ok(())
//! # }
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![forbid(unsafe_code)]

mod endpoint;
mod error;
pub mod imap;
pub mod pop3;
pub mod smtp;
pub mod stream;
mod verifier;

pub use endpoint::{AuthMechanism, Credentials, Endpoint, ProbeConfig, TlsMode};
pub use error::{CertificateReason, Error, Result};
pub use smtp::SmtpSession;
pub use stream::ProbeStream;
pub use verifier::{Rejection, TrustVerifier, fingerprint};
