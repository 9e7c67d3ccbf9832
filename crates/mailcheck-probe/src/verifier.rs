//! Server certificate verification with pinned exceptions.
//!
//! Certificates are validated against the webpki roots. A leaf whose
//! SHA-256 fingerprint is in the trusted list is accepted without chain
//! validation. When validation fails, the presented chain is kept so the
//! caller can offer it for trust.

use std::fmt::Write as _;
use std::sync::{Arc, Mutex, PoisonError};

use rustls::client::WebPkiServerVerifier;
use rustls::client::danger::{HandshakeSignatureValid, ServerCertVerified, ServerCertVerifier};
use rustls::pki_types::{CertificateDer, ServerName, UnixTime};
use rustls::{DigitallySignedStruct, RootCertStore, SignatureScheme};
use sha2::{Digest, Sha256};
use tracing::debug;

use crate::{Error, Result};

/// Returns the lowercase hex SHA-256 fingerprint of a DER certificate.
#[must_use]
pub fn fingerprint(der: &[u8]) -> String {
    let digest = Sha256::digest(der);
    let mut hex = String::with_capacity(digest.len() * 2);
    for byte in digest {
        let _ = write!(hex, "{byte:02x}");
    }
    hex
}

/// A rejected handshake: the chain the server sent and why it failed.
#[derive(Debug, Clone)]
pub struct Rejection {
    /// DER certificates, leaf first.
    pub chain: Vec<Vec<u8>>,
    /// Verifier error text.
    pub reason: String,
}

/// Verifier that honors pinned fingerprints and records rejections.
#[derive(Debug)]
pub struct TrustVerifier {
    inner: Arc<WebPkiServerVerifier>,
    trusted: Vec<String>,
    rejection: Mutex<Option<Rejection>>,
}

impl TrustVerifier {
    /// Creates a verifier over the webpki roots plus `trusted` fingerprints.
    ///
    /// # Errors
    ///
    /// Returns an error if the root store cannot be turned into a verifier.
    pub fn new(trusted: &[String]) -> Result<Self> {
        let roots = RootCertStore {
            roots: webpki_roots::TLS_SERVER_ROOTS.to_vec(),
        };
        let inner = WebPkiServerVerifier::builder(Arc::new(roots))
            .build()
            .map_err(|e| Error::Protocol(format!("certificate verifier: {e}")))?;

        Ok(Self {
            inner,
            trusted: trusted.iter().map(|f| f.to_ascii_lowercase()).collect(),
            rejection: Mutex::new(None),
        })
    }

    /// Takes the recorded rejection, if the last handshake was refused.
    pub fn take_rejection(&self) -> Option<Rejection> {
        self.rejection
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take()
    }
}

impl ServerCertVerifier for TrustVerifier {
    fn verify_server_cert(
        &self,
        end_entity: &CertificateDer<'_>,
        intermediates: &[CertificateDer<'_>],
        server_name: &ServerName<'_>,
        ocsp_response: &[u8],
        now: UnixTime,
    ) -> std::result::Result<ServerCertVerified, rustls::Error> {
        let leaf = fingerprint(end_entity.as_ref());
        if self.trusted.contains(&leaf) {
            debug!("Accepting pinned certificate {}", leaf);
            return Ok(ServerCertVerified::assertion());
        }

        self.inner
            .verify_server_cert(end_entity, intermediates, server_name, ocsp_response, now)
            .inspect_err(|err| {
                debug!("Rejected server certificate {}: {}", leaf, err);
                let mut chain = Vec::with_capacity(intermediates.len() + 1);
                chain.push(end_entity.as_ref().to_vec());
                chain.extend(intermediates.iter().map(|c| c.as_ref().to_vec()));
                *self
                    .rejection
                    .lock()
                    .unwrap_or_else(PoisonError::into_inner) = Some(Rejection {
                    chain,
                    reason: err.to_string(),
                });
            })
    }

    fn verify_tls12_signature(
        &self,
        message: &[u8],
        cert: &CertificateDer<'_>,
        dss: &DigitallySignedStruct,
    ) -> std::result::Result<HandshakeSignatureValid, rustls::Error> {
        self.inner.verify_tls12_signature(message, cert, dss)
    }

    fn verify_tls13_signature(
        &self,
        message: &[u8],
        cert: &CertificateDer<'_>,
        dss: &DigitallySignedStruct,
    ) -> std::result::Result<HandshakeSignatureValid, rustls::Error> {
        self.inner.verify_tls13_signature(message, cert, dss)
    }

    fn supported_verify_schemes(&self) -> Vec<SignatureScheme> {
        self.inner.supported_verify_schemes()
    }
}
