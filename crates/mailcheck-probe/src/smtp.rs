//! SMTP submission probe.
//!
//! Opens a session up to successful authentication and keeps it until
//! [`SmtpSession::quit`], so callers can hold a transport open and close
//! it explicitly.

use std::collections::HashSet;

use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use tokio::io::{AsyncRead, AsyncWrite};
use tracing::debug;

use crate::endpoint::with_timeout;
use crate::stream::{LineStream, ProbeStream};
use crate::{AuthMechanism, Credentials, Endpoint, Error, ProbeConfig, Result, TlsMode};

/// A parsed SMTP reply.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Reply {
    /// Three-digit reply code.
    pub code: u16,
    /// Text of every line, without code and separator.
    pub lines: Vec<String>,
}

impl Reply {
    /// Returns true for 2xx replies.
    #[must_use]
    pub const fn is_positive(&self) -> bool {
        self.code >= 200 && self.code < 300
    }

    /// Returns true for 3xx replies.
    #[must_use]
    pub const fn is_intermediate(&self) -> bool {
        self.code >= 300 && self.code < 400
    }

    /// Returns true for authentication rejections (530, 534, 535).
    #[must_use]
    pub const fn is_auth_failure(&self) -> bool {
        matches!(self.code, 530 | 534 | 535)
    }

    fn text(&self) -> String {
        format!("{} {}", self.code, self.lines.join(" "))
    }
}

/// An SMTP session on top of any byte stream.
pub struct SmtpSession<S> {
    conn: LineStream<S>,
    extensions: HashSet<String>,
}

impl<S: AsyncRead + AsyncWrite + Unpin> SmtpSession<S> {
    /// Reads the 220 greeting.
    ///
    /// # Errors
    ///
    /// Returns an error if the server does not greet with 2xx.
    pub async fn greet(stream: S) -> Result<Self> {
        let mut session = Self::resume(stream);
        let greeting = session.read_reply().await?;
        debug!("SMTP greeting: {}", greeting.code);
        if !greeting.is_positive() {
            return Err(Error::Rejected(greeting.text()));
        }
        Ok(session)
    }

    /// Continues a session on a new stream (after STARTTLS).
    pub fn resume(stream: S) -> Self {
        Self {
            conn: LineStream::new(stream),
            extensions: HashSet::new(),
        }
    }

    /// Returns the underlying stream.
    pub fn into_inner(self) -> S {
        self.conn.into_inner()
    }

    /// Returns true if EHLO advertised `keyword` (case-insensitive).
    #[must_use]
    pub fn supports(&self, keyword: &str) -> bool {
        self.extensions.contains(&keyword.to_ascii_uppercase())
    }

    async fn read_reply(&mut self) -> Result<Reply> {
        let mut code = None;
        let mut lines = Vec::new();
        loop {
            let line = self.conn.read_line().await?;
            let (line_code, last, text) = parse_reply_line(&line)
                .ok_or_else(|| Error::Protocol(format!("Malformed reply: {line}")))?;
            code.get_or_insert(line_code);
            lines.push(text.to_string());
            if last {
                break;
            }
        }
        Ok(Reply {
            code: code.unwrap_or_default(),
            lines,
        })
    }

    async fn command(&mut self, command: &str) -> Result<Reply> {
        let verb = command.split_whitespace().next().unwrap_or_default();
        debug!("SMTP > {}", verb);
        self.conn.write_line(command).await?;
        let reply = self.read_reply().await?;
        debug!("SMTP < {}", reply.code);
        Ok(reply)
    }

    /// Sends EHLO and records the advertised extensions.
    ///
    /// # Errors
    ///
    /// Returns an error if EHLO is refused.
    pub async fn ehlo(&mut self, client_hostname: &str) -> Result<()> {
        let reply = self.command(&format!("EHLO {client_hostname}")).await?;
        if !reply.is_positive() {
            return Err(Error::Rejected(reply.text()));
        }

        self.extensions = reply
            .lines
            .iter()
            .skip(1)
            .flat_map(|line| {
                let mut words = line.split_whitespace().map(str::to_ascii_uppercase);
                let keyword = words.next();
                // "AUTH PLAIN LOGIN" also yields "AUTH=PLAIN" and "AUTH=LOGIN".
                let mechanisms: Vec<String> = match keyword.as_deref() {
                    Some("AUTH") => words.map(|m| format!("AUTH={m}")).collect(),
                    _ => Vec::new(),
                };
                keyword.into_iter().chain(mechanisms)
            })
            .collect();
        Ok(())
    }

    /// Asks the server to begin TLS negotiation.
    ///
    /// # Errors
    ///
    /// Returns an error if STARTTLS is not offered or is refused.
    pub async fn starttls(&mut self) -> Result<()> {
        if !self.supports("STARTTLS") {
            return Err(Error::Protocol("Server does not support STARTTLS".into()));
        }
        let reply = self.command("STARTTLS").await?;
        if !reply.is_positive() {
            return Err(Error::Rejected(reply.text()));
        }
        Ok(())
    }

    /// Authenticates with PLAIN or LOGIN.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Auth`] when the server rejects the credentials.
    pub async fn authenticate(&mut self, credentials: &Credentials) -> Result<()> {
        if !self.supports("AUTH") {
            return Err(Error::Protocol(
                "Server does not advertise any authentication mechanism".into(),
            ));
        }

        credentials.ensure_single_line()?;

        let reply = match credentials.mechanism {
            AuthMechanism::Plain => {
                let token = format!("\0{}\0{}", credentials.username, credentials.secret);
                self.command(&format!("AUTH PLAIN {}", STANDARD.encode(token)))
                    .await?
            }
            AuthMechanism::Login => {
                let mut reply = self.command("AUTH LOGIN").await?;
                for answer in [&credentials.username, &credentials.secret] {
                    if !reply.is_intermediate() {
                        break;
                    }
                    reply = self.command(&STANDARD.encode(answer)).await?;
                }
                reply
            }
            AuthMechanism::External => {
                return Err(Error::missing_external());
            }
        };

        if reply.is_positive() {
            Ok(())
        } else if reply.is_auth_failure() {
            Err(Error::Auth(reply.text()))
        } else {
            Err(Error::Rejected(reply.text()))
        }
    }

    /// Ends the session.
    ///
    /// # Errors
    ///
    /// Returns an error if the QUIT exchange fails.
    pub async fn quit(mut self) -> Result<()> {
        let reply = self.command("QUIT").await?;
        if reply.is_positive() {
            Ok(())
        } else {
            Err(Error::Rejected(reply.text()))
        }
    }

    /// Ends the session, giving up once the configured timeout elapses.
    ///
    /// The session is dropped either way.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Timeout`] if the server does not answer QUIT in
    /// time, or any error from [`quit`](Self::quit).
    pub async fn quit_within(self, config: &ProbeConfig) -> Result<()> {
        with_timeout(config, self.quit()).await
    }
}

impl SmtpSession<ProbeStream> {
    /// Connects, negotiates TLS and authenticates.
    ///
    /// # Errors
    ///
    /// Returns an error if any step fails or the timeout elapses.
    pub async fn connect(endpoint: &Endpoint, config: &ProbeConfig) -> Result<Self> {
        with_timeout(config, async {
            endpoint.ensure_usable()?;
            let stream = ProbeStream::open(endpoint).await?;
            let mut session = Self::greet(stream).await?;
            session.ehlo(&config.client_hostname).await?;

            if endpoint.tls == TlsMode::StartTls {
                session.starttls().await?;
                let stream = session.into_inner().upgrade(endpoint).await?;
                session = Self::resume(stream);
                session.ehlo(&config.client_hostname).await?;
            }

            if !endpoint.credentials.username.is_empty() {
                session.authenticate(&endpoint.credentials).await?;
            }
            Ok(session)
        })
        .await
    }
}

/// Splits `250-text` / `250 text` into code, last-line flag and text.
fn parse_reply_line(line: &str) -> Option<(u16, bool, &str)> {
    let code = line.get(..3)?.parse().ok()?;
    match line.as_bytes().get(3) {
        None => Some((code, true, "")),
        Some(b' ') => Some((code, true, &line[4..])),
        Some(b'-') => Some((code, false, &line[4..])),
        Some(_) => None,
    }
}
