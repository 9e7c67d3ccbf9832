//! Explicitly accepted server certificates.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use super::model::Direction;

/// Why a certificate could not be added to the trust set.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CertificateError {
    /// No certificate bytes.
    #[error("Certificate is empty")]
    Empty,
    /// Bytes are not a single DER SEQUENCE.
    #[error("Certificate is not valid DER: {0}")]
    Malformed(&'static str),
}

/// Lowercase hex SHA-256 of a DER certificate.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CertificateFingerprint(String);

impl CertificateFingerprint {
    /// Fingerprint of a DER-encoded certificate.
    #[must_use]
    pub fn of(der: &[u8]) -> Self {
        Self(mailcheck_probe::fingerprint(der))
    }

    /// Hex digest.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for CertificateFingerprint {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// One accepted certificate.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TrustedCertificate {
    /// Server side the certificate was accepted for.
    pub direction: Direction,
    /// Fingerprint of `der`.
    pub fingerprint: CertificateFingerprint,
    /// DER bytes.
    pub der: Vec<u8>,
    /// When the certificate was accepted.
    pub accepted_at: DateTime<Utc>,
}

/// Certificates the user accepted, keyed by direction and fingerprint.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TrustedCertificates {
    entries: Vec<TrustedCertificate>,
}

impl TrustedCertificates {
    /// Accepts a certificate for a direction.
    ///
    /// Adding a certificate that is already trusted refreshes nothing and
    /// returns its fingerprint.
    ///
    /// # Errors
    ///
    /// Returns an error if `der` is not a well-formed DER certificate.
    pub fn add(
        &mut self,
        direction: Direction,
        der: &[u8],
    ) -> Result<CertificateFingerprint, CertificateError> {
        check_der(der)?;
        let fingerprint = CertificateFingerprint::of(der);
        if !self.contains(direction, &fingerprint) {
            self.entries.push(TrustedCertificate {
                direction,
                fingerprint: fingerprint.clone(),
                der: der.to_vec(),
                accepted_at: Utc::now(),
            });
        }
        Ok(fingerprint)
    }

    /// Returns true if the fingerprint is trusted for the direction.
    #[must_use]
    pub fn contains(&self, direction: Direction, fingerprint: &CertificateFingerprint) -> bool {
        self.entries
            .iter()
            .any(|e| e.direction == direction && &e.fingerprint == fingerprint)
    }

    /// Fingerprints trusted for a direction.
    #[must_use]
    pub fn fingerprints(&self, direction: Direction) -> Vec<CertificateFingerprint> {
        self.entries
            .iter()
            .filter(|e| e.direction == direction)
            .map(|e| e.fingerprint.clone())
            .collect()
    }

    /// Revokes trust. Returns true if the entry existed.
    pub fn remove(&mut self, direction: Direction, fingerprint: &CertificateFingerprint) -> bool {
        let before = self.entries.len();
        self.entries
            .retain(|e| !(e.direction == direction && &e.fingerprint == fingerprint));
        self.entries.len() != before
    }

    /// Number of entries.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Returns true if nothing is trusted.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Iterates over all entries.
    pub fn iter(&self) -> impl Iterator<Item = &TrustedCertificate> {
        self.entries.iter()
    }
}

/// Checks that `der` is exactly one definite-length SEQUENCE.
fn check_der(der: &[u8]) -> Result<(), CertificateError> {
    let (&tag, rest) = der.split_first().ok_or(CertificateError::Empty)?;
    if tag != 0x30 {
        return Err(CertificateError::Malformed("expected SEQUENCE"));
    }

    let (&first, rest) = rest
        .split_first()
        .ok_or(CertificateError::Malformed("missing length"))?;
    let (length, body) = if first & 0x80 == 0 {
        (usize::from(first), rest)
    } else {
        let octets = usize::from(first & 0x7f);
        if octets == 0 || octets > std::mem::size_of::<usize>() || rest.len() < octets {
            return Err(CertificateError::Malformed("bad length"));
        }
        let (len_bytes, body) = rest.split_at(octets);
        let length = len_bytes
            .iter()
            .fold(0usize, |acc, &b| (acc << 8) | usize::from(b));
        (length, body)
    };

    if body.len() == length {
        Ok(())
    } else {
        Err(CertificateError::Malformed("length mismatch"))
    }
}
