// Local redirect listener for external-browser (SSO) logins
//
// The identity provider sends the browser back to
// `http://localhost:<port>/?token=<sso token>`; the token plus the proof key
// from the authenticator request complete the login.
use super::error::WarehouseError;
use std::time::Duration;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};
use url::Url;

/// Largest request head accepted from the browser
const MAX_REQUEST_HEAD: usize = 16 * 1024;

const COMPLETED_PAGE: &str = "<!DOCTYPE html><html><head><title>Customer 360</title></head>\
    <body>Your identity was confirmed. You can close this window.</body></html>";

/// Token and proof key that complete an external-browser login
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SsoGrant {
    pub token: String,
    pub proof_key: String,
}

pub struct RedirectListener {
    listener: TcpListener,
    port: u16,
}

impl RedirectListener {
    /// Listen on an ephemeral loopback port
    pub async fn bind() -> Result<Self, WarehouseError> {
        let listener = TcpListener::bind(("127.0.0.1", 0)).await.map_err(|e| {
            WarehouseError::Connection {
                code: None,
                message: format!("Failed to open SSO redirect listener: {}", e),
            }
        })?;
        let port = listener
            .local_addr()
            .map_err(|e| WarehouseError::Connection {
                code: None,
                message: format!("Failed to read SSO redirect port: {}", e),
            })?
            .port();

        Ok(Self { listener, port })
    }

    pub fn port(&self) -> u16 {
        self.port
    }

    /// Wait for the browser redirect that carries the SSO token
    ///
    /// Requests without a token (such as a favicon fetch) are answered
    /// with 404 and ignored.
    pub async fn wait_for_token(self, timeout: Duration) -> Result<String, WarehouseError> {
        tokio::time::timeout(timeout, self.accept_token())
            .await
            .map_err(|_| WarehouseError::Connection {
                code: None,
                message: format!("No SSO redirect received within {:?}", timeout),
            })?
    }

    async fn accept_token(&self) -> Result<String, WarehouseError> {
        loop {
            let (stream, peer) =
                self.listener
                    .accept()
                    .await
                    .map_err(|e| WarehouseError::Connection {
                        code: None,
                        message: format!("SSO redirect listener failed: {}", e),
                    })?;

            match handle_redirect(stream).await {
                Ok(Some(token)) => return Ok(token),
                Ok(None) => tracing::debug!("Ignoring SSO redirect request from {}", peer),
                Err(e) => tracing::warn!("Bad SSO redirect request from {}: {}", peer, e),
            }
        }
    }
}

async fn handle_redirect(mut stream: TcpStream) -> std::io::Result<Option<String>> {
    let mut head = Vec::new();
    let mut buf = [0u8; 1024];
    while !head.windows(4).any(|w| w == b"\r\n\r\n") && head.len() < MAX_REQUEST_HEAD {
        let n = stream.read(&mut buf).await?;
        if n == 0 {
            break;
        }
        head.extend_from_slice(&buf[..n]);
    }

    let text = String::from_utf8_lossy(&head);
    let token = text.lines().next().and_then(token_from_request_line);

    let response = match &token {
        Some(_) => format!(
            "HTTP/1.1 200 OK\r\nContent-Type: text/html\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{}",
            COMPLETED_PAGE.len(),
            COMPLETED_PAGE
        ),
        None => "HTTP/1.1 404 Not Found\r\nContent-Length: 0\r\nConnection: close\r\n\r\n".to_string(),
    };
    stream.write_all(response.as_bytes()).await?;
    stream.shutdown().await?;

    Ok(token)
}

/// `GET /?token=abc HTTP/1.1` → `abc`
fn token_from_request_line(line: &str) -> Option<String> {
    let mut parts = line.split_whitespace();
    if parts.next()? != "GET" {
        return None;
    }
    let target = parts.next()?;
    let url = Url::parse("http://localhost").ok()?.join(target).ok()?;
    url.query_pairs()
        .find(|(key, _)| key == "token")
        .map(|(_, value)| value.into_owned())
        .filter(|token| !token.is_empty())
}
