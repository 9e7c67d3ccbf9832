//! POP3 login probe.

use tokio::io::{AsyncRead, AsyncWrite};
use tracing::debug;

use crate::endpoint::with_timeout;
use crate::stream::{LineStream, ProbeStream};
use crate::{AuthMechanism, Credentials, Endpoint, Error, ProbeConfig, Result, TlsMode};

/// Maildrop size reported by STAT.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MaildropStatus {
    /// Number of messages.
    pub messages: u32,
    /// Total size in octets.
    pub octets: u64,
}

/// A POP3 session on top of any byte stream.
pub struct Pop3Session<S> {
    conn: LineStream<S>,
}

impl<S: AsyncRead + AsyncWrite + Unpin> Pop3Session<S> {
    /// Reads the `+OK` greeting.
    ///
    /// # Errors
    ///
    /// Returns an error if the server does not greet with `+OK`.
    pub async fn greet(stream: S) -> Result<Self> {
        let mut session = Self::resume(stream);
        let greeting = session.conn.read_line().await?;
        debug!("POP3 greeting: {}", greeting);
        status(&greeting).map_err(|text| Error::Rejected(text.to_string()))?;
        Ok(session)
    }

    /// Continues a session on a new stream (after STLS).
    pub fn resume(stream: S) -> Self {
        Self {
            conn: LineStream::new(stream),
        }
    }

    /// Returns the underlying stream.
    pub fn into_inner(self) -> S {
        self.conn.into_inner()
    }

    /// Sends a command and returns the `+OK` text or the `-ERR` text.
    async fn command(&mut self, command: &str) -> Result<std::result::Result<String, String>> {
        let verb = command.split_whitespace().next().unwrap_or_default();
        debug!("POP3 > {}", verb);
        self.conn.write_line(command).await?;
        let reply = self.conn.read_line().await?;
        match status(&reply) {
            Ok(text) => Ok(Ok(text.to_string())),
            Err(text) if reply.starts_with("-ERR") => Ok(Err(text.to_string())),
            Err(_) => Err(Error::Protocol(format!("Unexpected reply: {reply}"))),
        }
    }

    /// Asks the server to begin TLS negotiation.
    ///
    /// # Errors
    ///
    /// Returns an error if the server refuses.
    pub async fn stls(&mut self) -> Result<()> {
        self.command("STLS").await?.map(|_| ()).map_err(Error::Rejected)
    }

    /// Logs in with USER/PASS.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Auth`] when either step is refused.
    pub async fn login(&mut self, credentials: &Credentials) -> Result<()> {
        if credentials.mechanism == AuthMechanism::External {
            return Err(Error::missing_external());
        }
        credentials.ensure_single_line()?;
        self.command(&format!("USER {}", credentials.username))
            .await?
            .map_err(Error::Auth)?;
        self.command(&format!("PASS {}", credentials.secret))
            .await?
            .map_err(Error::Auth)?;
        Ok(())
    }

    /// Returns the maildrop status.
    ///
    /// # Errors
    ///
    /// Returns an error if STAT is refused or malformed.
    pub async fn stat(&mut self) -> Result<MaildropStatus> {
        let text = self.command("STAT").await?.map_err(Error::Rejected)?;
        let mut parts = text.split_whitespace();
        let messages = parts.next().and_then(|p| p.parse().ok());
        let octets = parts.next().and_then(|p| p.parse().ok());
        match (messages, octets) {
            (Some(messages), Some(octets)) => Ok(MaildropStatus { messages, octets }),
            _ => Err(Error::Protocol(format!("Malformed STAT reply: {text}"))),
        }
    }

    /// Ends the session.
    ///
    /// # Errors
    ///
    /// Returns an error if the server refuses QUIT.
    pub async fn quit(mut self) -> Result<()> {
        self.command("QUIT").await?.map(|_| ()).map_err(Error::Rejected)
    }
}

/// Splits a status line into `Ok(text)` for `+OK` or `Err(text)` otherwise.
fn status(line: &str) -> std::result::Result<&str, &str> {
    if let Some(text) = line.strip_prefix("+OK") {
        Ok(text.trim())
    } else if let Some(text) = line.strip_prefix("-ERR") {
        Err(text.trim())
    } else {
        Err(line)
    }
}

async fn open_session(endpoint: &Endpoint) -> Result<Pop3Session<ProbeStream>> {
    endpoint.ensure_usable()?;
    let stream = ProbeStream::open(endpoint).await?;
    let mut session = Pop3Session::greet(stream).await?;

    if endpoint.tls == TlsMode::StartTls {
        session.stls().await?;
        let stream = session.into_inner().upgrade(endpoint).await?;
        session = Pop3Session::resume(stream);
    }

    session.login(&endpoint.credentials).await?;
    Ok(session)
}

/// Verifies that the server accepts the endpoint's credentials.
///
/// # Errors
///
/// Returns an error if connecting, TLS, or login fails.
pub async fn check(endpoint: &Endpoint, config: &ProbeConfig) -> Result<()> {
    with_timeout(config, async {
        let session = open_session(endpoint).await?;
        session.quit().await
    })
    .await
}

/// Logs in and reads the maildrop status.
///
/// # Errors
///
/// Returns an error if connecting, login, or STAT fails.
pub async fn inbox_status(endpoint: &Endpoint, config: &ProbeConfig) -> Result<MaildropStatus> {
    with_timeout(config, async {
        let mut session = open_session(endpoint).await?;
        let status = session.stat().await;
        session.quit().await?;
        status
    })
    .await
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use tokio_test::io::Builder;

    fn credentials() -> Credentials {
        Credentials {
            username: "user".into(),
            secret: "pw".into(),
            mechanism: AuthMechanism::Plain,
        }
    }

    #[test]
    fn status_lines() {
        assert_eq!(status("+OK 2 320"), Ok("2 320"));
        assert_eq!(status("-ERR nope"), Err("nope"));
        assert_eq!(status("garbage"), Err("garbage"));
    }

    #[tokio::test]
    async fn login_stat_quit() {
        let mock = Builder::new()
            .read(b"+OK POP3 ready\r\n")
            .write(b"USER user\r\n")
            .read(b"+OK\r\n")
            .write(b"PASS pw\r\n")
            .read(b"+OK logged in\r\n")
            .write(b"STAT\r\n")
            .read(b"+OK 2 320\r\n")
            .write(b"QUIT\r\n")
            .read(b"+OK bye\r\n")
            .build();

        let mut session = Pop3Session::greet(mock).await.unwrap();
        session.login(&credentials()).await.unwrap();
        assert_eq!(
            session.stat().await.unwrap(),
            MaildropStatus {
                messages: 2,
                octets: 320
            }
        );
        session.quit().await.unwrap();
    }

    #[tokio::test]
    async fn pass_rejected_is_auth_error() {
        let mock = Builder::new()
            .read(b"+OK ready\r\n")
            .write(b"USER user\r\n")
            .read(b"+OK\r\n")
            .write(b"PASS pw\r\n")
            .read(b"-ERR [AUTH] invalid password\r\n")
            .build();

        let mut session = Pop3Session::greet(mock).await.unwrap();
        match session.login(&credentials()).await {
            Err(Error::Auth(text)) => assert_eq!(text, "[AUTH] invalid password"),
            other => panic!("unexpected: {other:?}"),
        }
    }

    #[tokio::test]
    async fn line_break_in_username_is_never_sent() {
        let mock = Builder::new().read(b"+OK ready\r\n").build();
        let mut credentials = credentials();
        credentials.username = "user\r\nDELE 1".into();

        let mut session = Pop3Session::greet(mock).await.unwrap();
        assert!(matches!(
            session.login(&credentials).await,
            Err(Error::Protocol(_))
        ));
    }

    #[tokio::test]
    async fn err_greeting_is_rejected() {
        let mock = Builder::new().read(b"-ERR go away\r\n").build();
        assert!(matches!(
            Pop3Session::greet(mock).await,
            Err(Error::Rejected(_))
        ));
    }
}
