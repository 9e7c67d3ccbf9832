//! Account data: server profiles, account records and certificate trust.
//!
//! Provides account generation from an email address and validation.

mod generate;
mod model;
mod trust;
mod validation;

pub use generate::{AccountGenerator, DefaultAccountName, NoDefaultAccount, split_email};
pub use model::{
    AccountRecord, AuthType, Direction, Protocol, Security, ServerProfile, SpecialFolders,
};
pub use trust::{CertificateError, CertificateFingerprint, TrustedCertificate, TrustedCertificates};
pub use validation::{ValidationError, ValidationResult, validate_account};
