//! Retrieval server checks over IMAP or POP3.

use mailcheck_probe::{ProbeConfig, imap, pop3};
use tracing::debug;

use super::endpoint;
use crate::account::{CertificateFingerprint, Protocol, ServerProfile};
use crate::verify::{CheckError, IncomingServer};

/// Checks the store server with the protocol its profile names.
#[derive(Debug, Clone, Default)]
pub struct NetworkIncoming {
    config: ProbeConfig,
}

impl NetworkIncoming {
    /// Creates the checker with probe settings.
    #[must_use]
    pub const fn new(config: ProbeConfig) -> Self {
        Self { config }
    }
}

impl IncomingServer for NetworkIncoming {
    async fn check_settings(
        &self,
        profile: &ServerProfile,
        trusted: &[CertificateFingerprint],
    ) -> Result<(), CheckError> {
        let endpoint = endpoint(profile, trusted);
        match profile.protocol() {
            Protocol::Pop3 => pop3::check(&endpoint, &self.config).await?,
            Protocol::Imap | Protocol::Smtp => imap::check(&endpoint, &self.config).await?,
        }
        Ok(())
    }

    async fn list_folders(
        &self,
        profile: &ServerProfile,
        trusted: &[CertificateFingerprint],
    ) -> Result<Vec<String>, CheckError> {
        let endpoint = endpoint(profile, trusted);
        match profile.protocol() {
            // POP3 only knows the maildrop.
            Protocol::Pop3 => Ok(vec!["INBOX".to_string()]),
            Protocol::Imap | Protocol::Smtp => {
                Ok(imap::list_folders(&endpoint, &self.config).await?)
            }
        }
    }

    async fn synchronize_inbox(
        &self,
        profile: &ServerProfile,
        trusted: &[CertificateFingerprint],
    ) -> Result<(), CheckError> {
        let endpoint = endpoint(profile, trusted);
        match profile.protocol() {
            Protocol::Pop3 => {
                let status = pop3::inbox_status(&endpoint, &self.config).await?;
                debug!("Maildrop holds {} messages", status.messages);
            }
            Protocol::Imap | Protocol::Smtp => {
                let exists = imap::examine_inbox(&endpoint, &self.config).await?;
                debug!("INBOX holds {} messages", exists);
            }
        }
        Ok(())
    }
}
