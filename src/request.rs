use core::fmt;

use anyhow::{anyhow, bail, Result};
use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncReadExt};

use crate::headers::Headers;

/// Longest request or header line accepted, CRLF included.
const MAX_LINE_LEN: usize = 8 * 1024;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HTTPMethod {
    GET,
    HEAD,
    /// Any other syntactically valid method token.
    Other(String),
}

impl TryFrom<&str> for HTTPMethod {
    type Error = anyhow::Error;
    fn try_from(value: &str) -> Result<Self> {
        if value.is_empty() || !value.chars().all(|c| c.is_ascii_uppercase() || c == '-' || c == '_') {
            bail!("invalid method token: {}", value);
        }
        Ok(match value {
            "GET" => HTTPMethod::GET,
            "HEAD" => HTTPMethod::HEAD,
            other => HTTPMethod::Other(other.to_string()),
        })
    }
}

impl fmt::Display for HTTPMethod {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            HTTPMethod::GET => write!(f, "GET"),
            HTTPMethod::HEAD => write!(f, "HEAD"),
            HTTPMethod::Other(m) => write!(f, "{}", m),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HTTPVersion {
    HTTP10,
    HTTP11,
}

impl TryFrom<&str> for HTTPVersion {
    type Error = anyhow::Error;
    fn try_from(value: &str) -> Result<Self> {
        match value.to_uppercase().as_str() {
            "HTTP/1.0" => Ok(HTTPVersion::HTTP10),
            "HTTP/1.1" => Ok(HTTPVersion::HTTP11),
            _ => bail!("unknown HTTP version: {}", value),
        }
    }
}

impl fmt::Display for HTTPVersion {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            HTTPVersion::HTTP10 => write!(f, "HTTP/1.0"),
            HTTPVersion::HTTP11 => write!(f, "HTTP/1.1"),
        }
    }
}

#[derive(Debug, Clone)]
pub struct RequestLine {
    pub method: HTTPMethod,
    pub target: String,
    pub version: HTTPVersion,
}

impl fmt::Display for RequestLine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} {} {}", self.method, self.target, self.version)
    }
}

impl RequestLine {
    pub async fn parse_request_line<R: AsyncBufRead + Unpin>(reader: &mut R) -> Result<Self> {
        let line = read_crlf_line(reader).await?;
        let mut parts = line.split_whitespace();

        let method_raw = parts.next()
            .ok_or_else(|| anyhow!("invalid http request line: missing method"))?;
        let target_raw = parts.next()
            .ok_or_else(|| anyhow!("invalid http request line: missing target"))?;
        let version_raw = parts.next()
            .ok_or_else(|| anyhow!("invalid http request line: missing version"))?;
        if parts.next().is_some() {
            bail!("invalid http request line: too many parts");
        }

        let method = HTTPMethod::try_from(method_raw)?;
        if !target_raw.starts_with('/') {
            bail!("target must start with '/'");
        }
        let version = HTTPVersion::try_from(version_raw)?;

        Ok(Self {
            method,
            target: target_raw.to_string(),
            version,
        })
    }

    /// The target with any query string or fragment removed.
    pub fn path(&self) -> &str {
        let end = self.target.find(['?', '#']).unwrap_or(self.target.len());
        &self.target[..end]
    }
}

#[derive(Debug, Clone)]
pub struct HttpRequest {
    pub request_line: RequestLine,
    pub headers: Headers,
}

impl HttpRequest {
    /// Reads the request line and header block. Request bodies are never read.
    pub async fn parse_from<R: AsyncBufRead + Unpin>(reader: &mut R) -> Result<Self> {
        let request_line = RequestLine::parse_request_line(reader).await?;
        let headers = Headers::read_from(reader).await?;
        Ok(Self { request_line, headers })
    }

    pub fn method(&self) -> &HTTPMethod {
        &self.request_line.method
    }

    pub fn path(&self) -> &str {
        self.request_line.path()
    }
}

/// Reads one line terminated by LF (CR optional) and returns it without the terminator.
pub(crate) async fn read_crlf_line<R: AsyncBufRead + Unpin>(reader: &mut R) -> Result<String> {
    let mut line_bytes = Vec::new();
    let n = (&mut *reader)
        .take(MAX_LINE_LEN as u64)
        .read_until(b'\n', &mut line_bytes)
        .await?;
    if n == 0 {
        bail!("connection closed before a complete line was received");
    }
    if !line_bytes.ends_with(b"\n") {
        if n >= MAX_LINE_LEN {
            bail!("line exceeds {} bytes", MAX_LINE_LEN);
        }
        bail!("unexpected end of stream inside a line");
    }
    line_bytes.pop();
    if line_bytes.ends_with(b"\r") {
        line_bytes.pop();
    }
    Ok(String::from_utf8_lossy(&line_bytes).into_owned())
}
