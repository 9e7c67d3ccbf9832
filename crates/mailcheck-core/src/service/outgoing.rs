//! SMTP transports.

use mailcheck_probe::{Endpoint, ProbeConfig, ProbeStream, SmtpSession};
use tracing::{debug, warn};

use super::endpoint;
use crate::account::{CertificateFingerprint, ServerProfile};
use crate::verify::{CheckError, OutgoingServer, Transport};

/// Creates SMTP transports.
#[derive(Debug, Clone, Default)]
pub struct SmtpOutgoing {
    config: ProbeConfig,
}

impl SmtpOutgoing {
    /// Creates the factory with probe settings.
    #[must_use]
    pub const fn new(config: ProbeConfig) -> Self {
        Self { config }
    }
}

impl OutgoingServer for SmtpOutgoing {
    type Transport = SmtpTransport;

    fn transport(
        &self,
        profile: &ServerProfile,
        trusted: &[CertificateFingerprint],
    ) -> SmtpTransport {
        SmtpTransport {
            endpoint: endpoint(profile, trusted),
            config: self.config.clone(),
            session: None,
        }
    }
}

/// An authenticated SMTP session, opened on demand.
pub struct SmtpTransport {
    endpoint: Endpoint,
    config: ProbeConfig,
    session: Option<SmtpSession<ProbeStream>>,
}

impl SmtpTransport {
    /// Returns true while a session is open.
    #[must_use]
    pub const fn is_open(&self) -> bool {
        self.session.is_some()
    }
}

impl Transport for SmtpTransport {
    async fn open(&mut self) -> Result<(), CheckError> {
        self.close().await;
        let session = SmtpSession::connect(&self.endpoint, &self.config).await?;
        debug!("SMTP session open to {}", self.endpoint.host);
        self.session = Some(session);
        Ok(())
    }

    async fn close(&mut self) {
        let Some(session) = self.session.take() else {
            return;
        };
        if let Err(e) = session.quit_within(&self.config).await {
            warn!("SMTP QUIT failed, dropping session: {}", e);
        }
    }
}
