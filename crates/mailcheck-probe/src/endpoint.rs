//! Probe targets and settings.

use std::time::Duration;

use crate::{CertificateReason, Error, Result};

/// How TLS is negotiated with the server.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TlsMode {
    /// Plaintext only.
    Plain,
    /// Plaintext connect, then STARTTLS (STLS for POP3).
    StartTls,
    /// TLS from the first byte.
    Implicit,
}

/// SASL-ish mechanism used to log in.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuthMechanism {
    /// Username and password in one step.
    Plain,
    /// Username and password in separate challenges.
    Login,
    /// Identity taken from the TLS client certificate.
    External,
}

/// Login credentials.
#[derive(Clone)]
pub struct Credentials {
    /// Login name.
    pub username: String,
    /// Password or token.
    pub secret: String,
    /// Mechanism to use.
    pub mechanism: AuthMechanism,
}

impl std::fmt::Debug for Credentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Credentials")
            .field("username", &self.username)
            .field("secret", &"<redacted>")
            .field("mechanism", &self.mechanism)
            .finish()
    }
}

impl Credentials {
    /// Fails if the username or secret would not fit on one command line.
    pub(crate) fn ensure_single_line(&self) -> Result<()> {
        for (field, value) in [("username", &self.username), ("secret", &self.secret)] {
            if value.contains(['\r', '\n', '\0']) {
                return Err(Error::Protocol(format!("{field} contains a line break or NUL")));
            }
        }
        Ok(())
    }
}

/// A server to probe.
#[derive(Debug, Clone)]
pub struct Endpoint {
    /// Server hostname.
    pub host: String,
    /// Server port.
    pub port: u16,
    /// TLS negotiation mode.
    pub tls: TlsMode,
    /// Login credentials.
    pub credentials: Credentials,
    /// Client certificate alias, if the account uses one.
    pub client_certificate: Option<String>,
    /// SHA-256 fingerprints of server certificates accepted regardless of
    /// chain validation.
    pub trusted: Vec<String>,
}

impl Endpoint {
    /// Fails early for settings this library cannot honor.
    ///
    /// Client certificates live in an external key store, so an alias can
    /// never be resolved here.
    pub(crate) fn ensure_usable(&self) -> Result<()> {
        if let Some(alias) = &self.client_certificate {
            return Err(Error::Certificate {
                chain: None,
                reason: CertificateReason::RetrievalFailure {
                    alias: alias.clone(),
                },
            });
        }
        if self.credentials.mechanism == AuthMechanism::External {
            return Err(Error::missing_external());
        }
        Ok(())
    }
}

/// Probe behaviour shared by every protocol.
#[derive(Debug, Clone)]
pub struct ProbeConfig {
    /// Upper bound for one whole probe (connect through logout).
    pub timeout: Duration,
    /// Name announced in SMTP EHLO.
    pub client_hostname: String,
}

impl Default for ProbeConfig {
    fn default() -> Self {
        Self {
            timeout: Duration::from_secs(30),
            client_hostname: "localhost".to_string(),
        }
    }
}

/// Runs `fut` under the configured timeout.
pub(crate) async fn with_timeout<T>(
    config: &ProbeConfig,
    fut: impl Future<Output = Result<T>>,
) -> Result<T> {
    tokio::time::timeout(config.timeout, fut)
        .await
        .map_err(|_| Error::Timeout(config.timeout))?
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn endpoint() -> Endpoint {
        Endpoint {
            host: "mail.example.com".into(),
            port: 993,
            tls: TlsMode::Implicit,
            credentials: Credentials {
                username: "user".into(),
                secret: "hunter2".into(),
                mechanism: AuthMechanism::Plain,
            },
            client_certificate: None,
            trusted: Vec::new(),
        }
    }

    #[test]
    fn debug_redacts_secret() {
        let rendered = format!("{:?}", endpoint().credentials);
        assert!(!rendered.contains("hunter2"));
        assert!(rendered.contains("<redacted>"));
    }

    #[test]
    fn client_certificate_alias_is_chainless_certificate_error() {
        let mut endpoint = endpoint();
        endpoint.client_certificate = Some("work".into());
        match endpoint.ensure_usable() {
            Err(Error::Certificate { chain, reason }) => {
                assert!(chain.is_none());
                assert_eq!(
                    reason,
                    CertificateReason::RetrievalFailure {
                        alias: "work".into()
                    }
                );
            }
            other => panic!("unexpected: {other:?}"),
        }
    }

    #[test]
    fn external_without_certificate_is_missing_capability() {
        let mut endpoint = endpoint();
        endpoint.credentials.mechanism = AuthMechanism::External;
        assert!(matches!(
            endpoint.ensure_usable(),
            Err(Error::Certificate {
                chain: None,
                reason: CertificateReason::MissingCapability,
            })
        ));
    }

    #[test]
    fn line_breaks_in_credentials_are_refused() {
        for secret in ["x\r\na002 LOGOUT", "x\nQUIT", "x\0y"] {
            let mut credentials = endpoint().credentials;
            credentials.secret = secret.into();
            assert!(matches!(
                credentials.ensure_single_line(),
                Err(Error::Protocol(_))
            ));
        }
        let mut credentials = endpoint().credentials;
        credentials.username = "user\r\n".into();
        assert!(credentials.ensure_single_line().is_err());
        assert!(endpoint().credentials.ensure_single_line().is_ok());
    }

    #[tokio::test(start_paused = true)]
    async fn timeout_is_reported() {
        let config = ProbeConfig {
            timeout: std::time::Duration::from_secs(1),
            ..ProbeConfig::default()
        };
        let result: Result<()> = with_timeout(&config, async {
            tokio::time::sleep(std::time::Duration::from_secs(5)).await;
            Ok(())
        })
        .await;
        assert!(matches!(result, Err(Error::Timeout(_))));
    }
}
