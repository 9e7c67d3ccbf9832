//! IMAP login probe.
//!
//! Speaks just enough IMAP4rev1 to prove a server accepts the account:
//! greeting, optional STARTTLS, LOGIN, LIST, EXAMINE and LOGOUT.

use tokio::io::{AsyncRead, AsyncWrite};
use tracing::debug;

use crate::endpoint::with_timeout;
use crate::stream::{LineStream, ProbeStream};
use crate::{AuthMechanism, Credentials, Endpoint, Error, ProbeConfig, Result, TlsMode};

/// Status word of a tagged completion.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Status {
    Ok,
    No,
    Bad,
}

/// An IMAP session on top of any byte stream.
pub struct ImapSession<S> {
    conn: LineStream<S>,
    next_tag: u32,
}

impl<S: AsyncRead + AsyncWrite + Unpin> ImapSession<S> {
    /// Reads the server greeting.
    ///
    /// # Errors
    ///
    /// Returns an error if the server says BYE or sends something else.
    pub async fn greet(stream: S) -> Result<Self> {
        let mut conn = LineStream::new(stream);
        let greeting = conn.read_line().await?;
        debug!("IMAP greeting: {}", greeting);

        if let Some(text) = greeting.strip_prefix("* BYE") {
            return Err(Error::Bye(text.trim().to_string()));
        }
        if !greeting.starts_with("* OK") && !greeting.starts_with("* PREAUTH") {
            return Err(Error::Protocol(format!("Unexpected greeting: {greeting}")));
        }

        Ok(Self { conn, next_tag: 1 })
    }

    /// Continues a session on a new stream (after a TLS upgrade).
    pub fn resume(stream: S, next_tag: u32) -> Self {
        Self {
            conn: LineStream::new(stream),
            next_tag,
        }
    }

    /// Splits the session into its stream and next tag number.
    pub fn into_parts(self) -> (S, u32) {
        (self.conn.into_inner(), self.next_tag)
    }

    /// Sends a command and collects untagged lines until its completion.
    async fn command(&mut self, command: &str) -> Result<(Status, String, Vec<String>)> {
        let tag = format!("a{:03}", self.next_tag);
        self.next_tag += 1;

        let verb = command.split_whitespace().next().unwrap_or_default();
        debug!("IMAP > {} {}", tag, verb);
        self.conn.write_line(&format!("{tag} {command}")).await?;

        let mut untagged = Vec::new();
        loop {
            let line = self.conn.read_line().await?;
            let Some(rest) = line.strip_prefix(&tag) else {
                untagged.push(line);
                continue;
            };

            let rest = rest.trim_start();
            let (word, text) = rest.split_once(' ').unwrap_or((rest, ""));
            let status = match word.to_ascii_uppercase().as_str() {
                "OK" => Status::Ok,
                "NO" => Status::No,
                "BAD" => Status::Bad,
                other => return Err(Error::Protocol(format!("Unknown status: {other}"))),
            };
            debug!("IMAP < {} {:?}", tag, status);
            return Ok((status, text.to_string(), untagged));
        }
    }

    /// Runs a command that must complete with OK.
    async fn expect_ok(&mut self, command: &str) -> Result<Vec<String>> {
        match self.command(command).await? {
            (Status::Ok, _, lines) => Ok(lines),
            (Status::No | Status::Bad, text, _) => Err(Error::Rejected(text)),
        }
    }

    /// Asks the server to begin TLS negotiation.
    ///
    /// # Errors
    ///
    /// Returns an error if the server refuses.
    pub async fn starttls(&mut self) -> Result<()> {
        self.expect_ok("STARTTLS").await.map(|_| ())
    }

    /// Logs in with the given credentials.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Auth`] when the server answers NO.
    pub async fn login(&mut self, credentials: &Credentials) -> Result<()> {
        if credentials.mechanism == AuthMechanism::External {
            return Err(Error::missing_external());
        }
        credentials.ensure_single_line()?;
        let command = format!(
            "LOGIN {} {}",
            quote(&credentials.username),
            quote(&credentials.secret)
        );
        match self.command(&command).await? {
            (Status::Ok, _, _) => Ok(()),
            (Status::No, text, _) => Err(Error::Auth(text)),
            (Status::Bad, text, _) => Err(Error::Rejected(text)),
        }
    }

    /// Lists all mailbox names.
    ///
    /// # Errors
    ///
    /// Returns an error if LIST fails.
    pub async fn list(&mut self) -> Result<Vec<String>> {
        let lines = self.expect_ok(r#"LIST "" "*""#).await?;
        Ok(lines.iter().filter_map(|l| parse_list_line(l)).collect())
    }

    /// Opens INBOX read-only and returns its message count.
    ///
    /// # Errors
    ///
    /// Returns an error if EXAMINE fails.
    pub async fn examine_inbox(&mut self) -> Result<u32> {
        let lines = self.expect_ok("EXAMINE INBOX").await?;
        Ok(lines.iter().find_map(|l| parse_exists(l)).unwrap_or(0))
    }

    /// Logs out, consuming the session.
    ///
    /// # Errors
    ///
    /// Returns an error if the server does not acknowledge.
    pub async fn logout(mut self) -> Result<()> {
        self.expect_ok("LOGOUT").await.map(|_| ())
    }
}

/// Quotes an IMAP string.
fn quote(value: &str) -> String {
    let escaped = value.replace('\\', "\\\\").replace('"', "\\\"");
    format!("\"{escaped}\"")
}

/// Extracts the mailbox name from a `* LIST` line.
fn parse_list_line(line: &str) -> Option<String> {
    let rest = line.strip_prefix("* LIST ")?;
    let rest = rest.strip_prefix('(')?;
    let (_, rest) = rest.split_once(')')?;
    let rest = rest.trim_start();

    // Hierarchy delimiter: quoted char or NIL.
    let rest = if let Some(after) = rest.strip_prefix("NIL") {
        after
    } else {
        let after = rest.strip_prefix('"')?;
        let end = if after.starts_with('\\') { 2 } else { 1 };
        after.get(end..)?.strip_prefix('"')?
    };

    let name = rest.trim();
    if let Some(quoted) = name.strip_prefix('"') {
        let inner = quoted.strip_suffix('"')?;
        Some(inner.replace("\\\"", "\"").replace("\\\\", "\\"))
    } else if name.is_empty() {
        None
    } else {
        Some(name.to_string())
    }
}

/// Extracts `N` from a `* N EXISTS` line.
fn parse_exists(line: &str) -> Option<u32> {
    let rest = line.strip_prefix("* ")?;
    let (count, word) = rest.split_once(' ')?;
    word.eq_ignore_ascii_case("EXISTS")
        .then(|| count.parse().ok())
        .flatten()
}

/// Connects, negotiates TLS and logs in.
async fn open_session(endpoint: &Endpoint) -> Result<ImapSession<ProbeStream>> {
    endpoint.ensure_usable()?;
    let stream = ProbeStream::open(endpoint).await?;
    let mut session = ImapSession::greet(stream).await?;

    if endpoint.tls == TlsMode::StartTls {
        session.starttls().await?;
        let (stream, next_tag) = session.into_parts();
        let stream = stream.upgrade(endpoint).await?;
        session = ImapSession::resume(stream, next_tag);
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
        session.logout().await
    })
    .await
}

/// Lists the account's mailboxes.
///
/// # Errors
///
/// Returns an error if connecting, login, or LIST fails.
pub async fn list_folders(endpoint: &Endpoint, config: &ProbeConfig) -> Result<Vec<String>> {
    with_timeout(config, async {
        let mut session = open_session(endpoint).await?;
        let folders = session.list().await;
        session.logout().await?;
        folders
    })
    .await
}

/// Opens INBOX read-only and returns its message count.
///
/// # Errors
///
/// Returns an error if connecting, login, or EXAMINE fails.
pub async fn examine_inbox(endpoint: &Endpoint, config: &ProbeConfig) -> Result<u32> {
    with_timeout(config, async {
        let mut session = open_session(endpoint).await?;
        let exists = session.examine_inbox().await;
        session.logout().await?;
        exists
    })
    .await
}
