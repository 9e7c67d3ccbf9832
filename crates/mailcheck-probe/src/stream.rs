//! Connection streams for probes.

use std::io;
use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};

use rustls::pki_types::ServerName;
use tokio::io::{AsyncBufReadExt, AsyncRead, AsyncWrite, AsyncWriteExt, BufReader, ReadBuf};
use tokio::net::TcpStream;
use tokio_rustls::TlsConnector;
use tokio_rustls::client::TlsStream;
use tracing::debug;

use crate::verifier::TrustVerifier;
use crate::{CertificateReason, Endpoint, Error, Result, TlsMode};

/// A stream that can be either plaintext or TLS.
pub enum ProbeStream {
    /// Plaintext TCP stream.
    Plain(TcpStream),
    /// TLS-encrypted stream (boxed to reduce enum size).
    Tls(Box<TlsStream<TcpStream>>),
}

impl ProbeStream {
    /// Connects to the endpoint, performing the TLS handshake for
    /// implicit TLS.
    ///
    /// # Errors
    ///
    /// Returns an error if the TCP connect or the handshake fails.
    pub async fn open(endpoint: &Endpoint) -> Result<Self> {
        debug!("Connecting to {}:{}", endpoint.host, endpoint.port);
        let tcp = TcpStream::connect((endpoint.host.as_str(), endpoint.port)).await?;
        match endpoint.tls {
            TlsMode::Implicit => Ok(Self::Tls(Box::new(handshake(tcp, endpoint).await?))),
            TlsMode::Plain | TlsMode::StartTls => Ok(Self::Plain(tcp)),
        }
    }

    /// Upgrades a plaintext stream to TLS after STARTTLS.
    ///
    /// # Errors
    ///
    /// Returns an error if the stream is already TLS or the handshake fails.
    pub async fn upgrade(self, endpoint: &Endpoint) -> Result<Self> {
        match self {
            Self::Plain(tcp) => Ok(Self::Tls(Box::new(handshake(tcp, endpoint).await?))),
            Self::Tls(_) => Err(Error::Protocol("Stream is already TLS".to_string())),
        }
    }

    /// Returns true if the stream is TLS-encrypted.
    #[must_use]
    pub const fn is_tls(&self) -> bool {
        matches!(self, Self::Tls(_))
    }
}

impl AsyncRead for ProbeStream {
    fn poll_read(
        self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        buf: &mut ReadBuf<'_>,
    ) -> Poll<io::Result<()>> {
        match self.get_mut() {
            Self::Plain(stream) => Pin::new(stream).poll_read(cx, buf),
            Self::Tls(stream) => Pin::new(stream).poll_read(cx, buf),
        }
    }
}

impl AsyncWrite for ProbeStream {
    fn poll_write(
        self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        buf: &[u8],
    ) -> Poll<io::Result<usize>> {
        match self.get_mut() {
            Self::Plain(stream) => Pin::new(stream).poll_write(cx, buf),
            Self::Tls(stream) => Pin::new(stream).poll_write(cx, buf),
        }
    }

    fn poll_flush(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        match self.get_mut() {
            Self::Plain(stream) => Pin::new(stream).poll_flush(cx),
            Self::Tls(stream) => Pin::new(stream).poll_flush(cx),
        }
    }

    fn poll_shutdown(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        match self.get_mut() {
            Self::Plain(stream) => Pin::new(stream).poll_shutdown(cx),
            Self::Tls(stream) => Pin::new(stream).poll_shutdown(cx),
        }
    }
}

/// Performs a TLS handshake, turning a verifier rejection into
/// [`Error::Certificate`] carrying the presented chain.
async fn handshake(tcp: TcpStream, endpoint: &Endpoint) -> Result<TlsStream<TcpStream>> {
    let verifier = Arc::new(TrustVerifier::new(&endpoint.trusted)?);
    let config = rustls::ClientConfig::builder()
        .dangerous()
        .with_custom_certificate_verifier(verifier.clone())
        .with_no_client_auth();
    let connector = TlsConnector::from(Arc::new(config));
    let server_name = ServerName::try_from(endpoint.host.clone())?;

    match connector.connect(server_name, tcp).await {
        Ok(stream) => Ok(stream),
        Err(err) => match verifier.take_rejection() {
            Some(rejection) => Err(Error::Certificate {
                chain: Some(rejection.chain),
                reason: CertificateReason::Untrusted(rejection.reason),
            }),
            None => Err(Error::Io(err)),
        },
    }
}

/// Line-oriented wrapper used by the protocol dialogues.
pub struct LineStream<S> {
    inner: BufReader<S>,
}

impl<S: AsyncRead + AsyncWrite + Unpin> LineStream<S> {
    /// Wraps a raw stream.
    pub fn new(stream: S) -> Self {
        Self {
            inner: BufReader::new(stream),
        }
    }

    /// Reads one CRLF-terminated line without its terminator.
    ///
    /// # Errors
    ///
    /// Returns an error on I/O failure or if the peer closed the connection.
    pub async fn read_line(&mut self) -> Result<String> {
        let mut line = String::new();
        let read = self.inner.read_line(&mut line).await?;
        if read == 0 {
            return Err(Error::Protocol("Connection closed by server".into()));
        }
        Ok(line.trim_end_matches(['\r', '\n']).to_string())
    }

    /// Writes `line` followed by CRLF and flushes.
    ///
    /// # Errors
    ///
    /// Returns an error if the write fails.
    pub async fn write_line(&mut self, line: &str) -> Result<()> {
        let stream = self.inner.get_mut();
        stream.write_all(format!("{line}\r\n").as_bytes()).await?;
        stream.flush().await?;
        Ok(())
    }

    /// Returns the raw stream, discarding any unread buffered input.
    pub fn into_inner(self) -> S {
        self.inner.into_inner()
    }
}
