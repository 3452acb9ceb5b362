//! Transport for SMTP connections.

use std::io;
use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};

use rustls::pki_types::ServerName;
use tokio::io::{AsyncRead, AsyncWrite, ReadBuf};
use tokio::net::TcpStream;
use tokio_rustls::client::TlsStream;
use tokio_rustls::{
    TlsConnector,
    rustls::{ClientConfig, RootCertStore},
};

use super::config::{Config, Security};
use crate::error::{Error, Result};

/// SMTP transport (TCP or TLS).
#[derive(Debug)]
pub enum SmtpStream {
    /// Plain TCP connection.
    Tcp(TcpStream),
    /// TLS-encrypted connection.
    Tls(Box<TlsStream<TcpStream>>),
}

impl SmtpStream {
    /// Upgrades a TCP stream to TLS after STARTTLS.
    ///
    /// # Errors
    ///
    /// Returns an error if the stream is already TLS or the handshake fails.
    pub async fn upgrade_to_tls(self, hostname: &str) -> Result<Self> {
        let Self::Tcp(tcp) = self else {
            return Err(Error::Protocol("Already using TLS".into()));
        };
        handshake(hostname, tcp).await
    }
}

/// Opens the transport described by `config` within its connect timeout.
///
/// # Errors
///
/// Returns an error if the connection or TLS handshake fails or times out.
pub async fn open(config: &Config) -> Result<SmtpStream> {
    let dial = async {
        let tcp = TcpStream::connect((config.host.as_str(), config.port)).await?;
        match config.security {
            Security::Implicit => handshake(&config.host, tcp).await,
            Security::StartTls | Security::None => Ok(SmtpStream::Tcp(tcp)),
        }
    };
    tokio::time::timeout(config.connect_timeout, dial)
        .await
        .map_err(|_| Error::Timeout(config.connect_timeout))?
}

async fn handshake(hostname: &str, tcp: TcpStream) -> Result<SmtpStream> {
    let server_name = ServerName::try_from(hostname.to_string())?;
    let tls = create_tls_connector().connect(server_name, tcp).await?;
    Ok(SmtpStream::Tls(Box::new(tls)))
}

/// Creates a TLS connector with the webpki root certificates.
fn create_tls_connector() -> TlsConnector {
    let root_store = RootCertStore {
        roots: webpki_roots::TLS_SERVER_ROOTS.to_vec(),
    };

    let config = ClientConfig::builder()
        .with_root_certificates(root_store)
        .with_no_client_auth();

    TlsConnector::from(Arc::new(config))
}

impl AsyncRead for SmtpStream {
    fn poll_read(
        self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        buf: &mut ReadBuf<'_>,
    ) -> Poll<io::Result<()>> {
        match self.get_mut() {
            Self::Tcp(s) => Pin::new(s).poll_read(cx, buf),
            Self::Tls(s) => Pin::new(s.as_mut()).poll_read(cx, buf),
        }
    }
}

impl AsyncWrite for SmtpStream {
    fn poll_write(
        self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        buf: &[u8],
    ) -> Poll<io::Result<usize>> {
        match self.get_mut() {
            Self::Tcp(s) => Pin::new(s).poll_write(cx, buf),
            Self::Tls(s) => Pin::new(s.as_mut()).poll_write(cx, buf),
        }
    }

    fn poll_flush(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        match self.get_mut() {
            Self::Tcp(s) => Pin::new(s).poll_flush(cx),
            Self::Tls(s) => Pin::new(s.as_mut()).poll_flush(cx),
        }
    }

    fn poll_shutdown(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        match self.get_mut() {
            Self::Tcp(s) => Pin::new(s).poll_shutdown(cx),
            Self::Tls(s) => Pin::new(s.as_mut()).poll_shutdown(cx),
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn refused_port_is_io_error() {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();
        drop(listener);

        let config = Config::new("127.0.0.1", Security::None).with_port(port);
        assert!(matches!(open(&config).await, Err(Error::Io(_))));
    }

    #[tokio::test]
    async fn plain_open_skips_tls() {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();

        let config = Config::new("127.0.0.1", Security::StartTls).with_port(port);
        let stream = open(&config).await.unwrap();
        assert!(matches!(stream, SmtpStream::Tcp(_)));
    }
}
